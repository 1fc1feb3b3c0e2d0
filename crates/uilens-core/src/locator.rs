use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::{LensError, Result};
use crate::input::LooseValue;

/// How a locator addresses an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorKind {
    Text,
    ResourceId,
    #[serde(rename = "xpath")]
    XPath,
    Description,
    ClassName,
}

impl LocatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocatorKind::Text => "text",
            LocatorKind::ResourceId => "resource_id",
            LocatorKind::XPath => "xpath",
            LocatorKind::Description => "description",
            LocatorKind::ClassName => "class_name",
        }
    }
}

impl fmt::Display for LocatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocatorKind {
    type Err = LensError;

    /// Accepts the snake_case names plus the camelCase spellings the
    /// inspector UI sends (`resourceId`, `className`).
    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "text" => Ok(LocatorKind::Text),
            "resource_id" | "resourceId" => Ok(LocatorKind::ResourceId),
            "xpath" => Ok(LocatorKind::XPath),
            "description" => Ok(LocatorKind::Description),
            "class_name" | "className" => Ok(LocatorKind::ClassName),
            other => Err(LensError::UnsupportedLocator(other.to_string())),
        }
    }
}

/// A `(kind, value, index)` triple addressing one UI element.
///
/// `index` picks the n-th element matching the same predicate and is
/// ignored for xpath locators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Locator {
    pub kind: LocatorKind,
    pub value: String,
    pub index: usize,
}

impl Locator {
    pub fn new(kind: LocatorKind, value: impl Into<String>, index: usize) -> Self {
        Self {
            kind,
            value: value.into(),
            index,
        }
    }

    /// Build a locator from raw request fields.
    pub fn parse(kind: &str, value: &str, index: Option<&LooseValue>) -> Result<Self> {
        let kind = kind.parse::<LocatorKind>()?;
        let index = match index {
            Some(raw) => raw.to_usize("index")?,
            None => 0,
        };
        Ok(Self::new(kind, value, index))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            LocatorKind::XPath => write!(f, "xpath={}", self.value),
            kind => write!(f, "{kind}={}[{}]", self.value, self.index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_accepts_ui_spellings() {
        assert_eq!(
            "resourceId".parse::<LocatorKind>().unwrap(),
            LocatorKind::ResourceId
        );
        assert_eq!(
            "className".parse::<LocatorKind>().unwrap(),
            LocatorKind::ClassName
        );
        assert_eq!("xpath".parse::<LocatorKind>().unwrap(), LocatorKind::XPath);
    }

    #[test]
    fn test_unknown_kind_is_an_error() {
        let err = "accessibility".parse::<LocatorKind>().unwrap_err();
        assert!(matches!(err, LensError::UnsupportedLocator(k) if k == "accessibility"));
    }

    #[test]
    fn test_parse_coerces_string_index() {
        let loc = Locator::parse("text", "Login", Some(&LooseValue::from("1"))).unwrap();
        assert_eq!(loc, Locator::new(LocatorKind::Text, "Login", 1));

        let loc = Locator::parse("text", "Login", None).unwrap();
        assert_eq!(loc.index, 0);
    }

    #[test]
    fn test_parse_rejects_bad_index() {
        let err = Locator::parse("text", "Login", Some(&LooseValue::from("-1"))).unwrap_err();
        assert!(matches!(err, LensError::InvalidArgument { .. }));
    }
}
