//! Locator resolution: `(kind, value, index)` → a platform query.

use uilens_core::{Locator, LocatorKind};

/// A query against an Android uiautomator dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementQuery {
    /// The `instance`-th node (document order) whose `attribute` equals `value`.
    Attribute {
        attribute: &'static str,
        value: String,
        instance: usize,
    },
    /// First node selected by an XPath expression.
    XPath(String),
}

/// Map a locator onto uiautomator node attributes.
pub fn resolve_android(locator: &Locator) -> ElementQuery {
    let attribute = match locator.kind {
        LocatorKind::XPath => return ElementQuery::XPath(locator.value.clone()),
        LocatorKind::Text => "text",
        LocatorKind::ResourceId => "resource-id",
        LocatorKind::Description => "content-desc",
        LocatorKind::ClassName => "class",
    };
    ElementQuery::Attribute {
        attribute,
        value: locator.value.clone(),
        instance: locator.index,
    }
}

/// A WebDriverAgent element search (`POST /elements`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WdaQuery {
    pub using: &'static str,
    pub value: String,
    /// Which match to use. Always 0 for xpath.
    pub instance: usize,
}

/// Map a locator onto a WebDriverAgent search strategy.
pub fn resolve_ios(locator: &Locator) -> WdaQuery {
    let v = predicate_literal(&locator.value);
    let (using, value) = match locator.kind {
        LocatorKind::Text => ("predicate string", format!("label == {v} OR value == {v}")),
        LocatorKind::ResourceId => ("predicate string", format!("name == {v}")),
        LocatorKind::Description => ("predicate string", format!("label == {v}")),
        LocatorKind::ClassName => ("class name", locator.value.clone()),
        LocatorKind::XPath => ("xpath", locator.value.clone()),
    };
    let instance = match locator.kind {
        LocatorKind::XPath => 0,
        _ => locator.index,
    };
    WdaQuery {
        using,
        value,
        instance,
    }
}

/// Quote a string for an NSPredicate format string.
fn predicate_literal(raw: &str) -> String {
    let escaped = raw.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}
