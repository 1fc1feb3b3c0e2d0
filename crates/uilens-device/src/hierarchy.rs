//! Conversion of raw platform hierarchies into the inspector's JSON tree,
//! and element lookup over Android uiautomator dumps.

use serde_json::{Map, Value, json};
use sxd_document::dom::{ChildOfElement, ChildOfRoot, Element};
use sxd_document::{Package, parser};
use sxd_xpath::nodeset::Node;

use uilens_core::{ElementInfo, LensError, Rect, Result};

use crate::locator::ElementQuery;

/// uiautomator attributes that carry "true"/"false".
const BOOLEAN_ATTRIBUTES: [&str; 10] = [
    "selected",
    "checkable",
    "clickable",
    "scrollable",
    "focusable",
    "enabled",
    "focused",
    "long-clickable",
    "password",
    "checked",
];

/// Parse uiautomator bounds: `"[left,top][right,bottom]"`. Extents that do
/// not fit an `i32` are rejected.
pub fn parse_bounds(raw: &str) -> Option<Rect> {
    let nums: Vec<i32> = raw
        .split(|c: char| !(c.is_ascii_digit() || c == '-'))
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    let [left, top, right, bottom] = nums.as_slice() else {
        return None;
    };
    Some(Rect {
        x: *left,
        y: *top,
        width: right.checked_sub(*left)?,
        height: bottom.checked_sub(*top)?,
    })
}

fn parse_xml(xml: &str) -> Result<Package> {
    parser::parse(xml).map_err(|e| LensError::Hierarchy(format!("invalid hierarchy xml: {e:?}")))
}

fn root_element(package: &Package) -> Result<Element<'_>> {
    package
        .as_document()
        .root()
        .children()
        .into_iter()
        .find_map(|c| match c {
            ChildOfRoot::Element(e) => Some(e),
            _ => None,
        })
        .ok_or_else(|| LensError::Hierarchy("hierarchy xml has no root element".into()))
}

fn child_elements<'d>(e: Element<'d>) -> impl Iterator<Item = Element<'d>> {
    e.children().into_iter().filter_map(|c| match c {
        ChildOfElement::Element(child) => Some(child),
        _ => None,
    })
}

// ── Android ────────────────────────────────────────────────────

/// Convert a uiautomator XML dump into the inspector JSON tree.
pub fn android_hierarchy_to_json(xml: &str) -> Result<Value> {
    let package = parse_xml(xml)?;
    let root = root_element(&package)?;
    Ok(android_node_to_json(root).unwrap_or_else(|| json!({})))
}

fn android_node_to_json(e: Element<'_>) -> Option<Value> {
    let mut obj = Map::new();
    for attr in e.attributes() {
        let name = attr.name().local_part();
        let value = attr.value();
        match name {
            "bounds" => {
                if value.replace(' ', "") == "[0,0][0,0]" {
                    return None;
                }
                match parse_bounds(value) {
                    Some(rect) => obj.insert("rect".into(), json!(rect)),
                    None => obj.insert("bounds".into(), value.into()),
                };
            }
            "index" => {
                let index = value.parse::<i64>().map(Value::from);
                obj.insert("index".into(), index.unwrap_or_else(|_| value.into()));
            }
            "resource-id" => {
                obj.insert("resourceId".into(), value.into());
            }
            "content-desc" => {
                obj.insert("description".into(), value.into());
            }
            "class" => {
                obj.insert("className".into(), value.into());
            }
            name if BOOLEAN_ATTRIBUTES.contains(&name) => {
                obj.insert(name.into(), Value::Bool(value == "true"));
            }
            name => {
                obj.insert(name.into(), value.into());
            }
        }
    }

    let node_type = e
        .attribute_value("class")
        .unwrap_or_else(|| e.name().local_part());
    obj.insert("_type".into(), node_type.into());
    obj.insert("_id".into(), uuid::Uuid::new_v4().to_string().into());

    let children: Vec<Value> = child_elements(e).filter_map(android_node_to_json).collect();
    if !children.is_empty() {
        obj.insert("children".into(), Value::Array(children));
    }
    Some(Value::Object(obj))
}

fn element_info(e: Element<'_>) -> ElementInfo {
    let attr = |name: &str| e.attribute_value(name).unwrap_or_default().to_string();
    let flag = |name: &str| e.attribute_value(name) == Some("true");
    ElementInfo {
        text: attr("text"),
        class_name: attr("class"),
        resource_id: attr("resource-id"),
        description: attr("content-desc"),
        bounds: e
            .attribute_value("bounds")
            .and_then(parse_bounds)
            .unwrap_or_default(),
        selected: flag("selected"),
        enabled: flag("enabled"),
        clickable: flag("clickable"),
        focused: flag("focused"),
    }
}

fn collect_preorder<'d>(e: Element<'d>, out: &mut Vec<Element<'d>>) {
    out.push(e);
    for child in child_elements(e) {
        collect_preorder(child, out);
    }
}

/// Find the element an [`ElementQuery`] selects in a uiautomator dump.
pub fn find_android_element(xml: &str, query: &ElementQuery) -> Result<Option<ElementInfo>> {
    let package = parse_xml(xml)?;
    match query {
        ElementQuery::Attribute {
            attribute,
            value,
            instance,
        } => {
            let mut nodes = Vec::new();
            collect_preorder(root_element(&package)?, &mut nodes);
            Ok(nodes
                .into_iter()
                .filter(|n| n.name().local_part() == "node")
                .filter(|n| n.attribute_value(*attribute) == Some(value.as_str()))
                .nth(*instance)
                .map(element_info))
        }
        ElementQuery::XPath(expr) => {
            let document = package.as_document();
            let selected = sxd_xpath::evaluate_xpath(&document, expr)
                .map_err(|e| LensError::invalid_argument("xpath", format!("{expr}: {e:?}")))?;
            let sxd_xpath::Value::Nodeset(nodes) = selected else {
                return Err(LensError::invalid_argument(
                    "xpath",
                    format!("{expr} does not select nodes"),
                ));
            };
            Ok(nodes
                .document_order()
                .into_iter()
                .find_map(|n| match n {
                    Node::Element(e) => Some(element_info(e)),
                    _ => None,
                }))
        }
    }
}

// ── iOS ────────────────────────────────────────────────────────

/// Convert a WebDriverAgent JSON source tree into the inspector JSON tree,
/// scaling rects from points to screenshot pixels.
pub fn ios_source_to_json(source: &Value, scale: f64) -> Value {
    let Some(node) = source.as_object() else {
        return json!({});
    };
    let mut obj = Map::new();
    obj.insert("_id".into(), uuid::Uuid::new_v4().to_string().into());
    if let Some(t) = node.get("type") {
        obj.insert("_type".into(), t.clone());
    }
    for key in ["label", "name", "value", "rawIdentifier"] {
        if let Some(v) = node.get(key).filter(|v| !v.is_null()) {
            obj.insert(key.into(), v.clone());
        }
    }
    for (key, out) in [("isEnabled", "enabled"), ("isVisible", "visible")] {
        if let Some(v) = node.get(key) {
            obj.insert(out.into(), Value::Bool(wda_truthy(v)));
        }
    }
    if let Some(rect) = node.get("rect") {
        let scaled = |k: &str| (rect[k].as_f64().unwrap_or_default() * scale).round() as i64;
        obj.insert(
            "rect".into(),
            json!({
                "x": scaled("x"),
                "y": scaled("y"),
                "width": scaled("width"),
                "height": scaled("height"),
            }),
        );
    }
    if let Some(children) = node.get("children").and_then(Value::as_array) {
        let converted: Vec<Value> = children
            .iter()
            .map(|c| ios_source_to_json(c, scale))
            .collect();
        obj.insert("children".into(), Value::Array(converted));
    }
    Value::Object(obj)
}

/// WDA reports flags as `"1"`/`"0"`, `1`/`0` or booleans depending on version.
pub(crate) fn wda_truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64() == Some(1),
        Value::String(s) => s == "1" || s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}
