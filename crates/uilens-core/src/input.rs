//! Coercion of loosely-typed request arguments.
//!
//! The inspector UI sends coordinates and durations as query-string text
//! (`x=540`, `duration=0.5`) while WebSocket clients send JSON numbers. Both
//! arrive as a [`LooseValue`] and are converted here before anything reaches
//! a device.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{LensError, Result};

/// A request argument that may be a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LooseValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl LooseValue {
    /// Integer coercion. Floats truncate toward zero; strings must hold an
    /// integer literal.
    pub fn to_i64(&self, name: &str) -> Result<i64> {
        match self {
            LooseValue::Int(v) => Ok(*v),
            LooseValue::Float(v) if v.is_finite() => Ok(v.trunc() as i64),
            LooseValue::Float(v) => Err(LensError::invalid_argument(
                name,
                format!("{v} is not a finite number"),
            )),
            LooseValue::Text(s) => s.trim().parse::<i64>().map_err(|_| {
                LensError::invalid_argument(name, format!("'{s}' is not an integer"))
            }),
        }
    }

    pub fn to_i32(&self, name: &str) -> Result<i32> {
        let v = self.to_i64(name)?;
        i32::try_from(v)
            .map_err(|_| LensError::invalid_argument(name, format!("{v} is out of range")))
    }

    pub fn to_usize(&self, name: &str) -> Result<usize> {
        let v = self.to_i64(name)?;
        usize::try_from(v)
            .map_err(|_| LensError::invalid_argument(name, format!("{v} must not be negative")))
    }

    pub fn to_f64(&self, name: &str) -> Result<f64> {
        let v = match self {
            LooseValue::Int(v) => *v as f64,
            LooseValue::Float(v) => *v,
            LooseValue::Text(s) => s.trim().parse::<f64>().map_err(|_| {
                LensError::invalid_argument(name, format!("'{s}' is not a number"))
            })?,
        };
        if v.is_finite() {
            Ok(v)
        } else {
            Err(LensError::invalid_argument(
                name,
                format!("{v} is not a finite number"),
            ))
        }
    }

    /// Seconds, as a non-negative number.
    pub fn to_duration(&self, name: &str) -> Result<Duration> {
        let secs = self.to_f64(name)?;
        if secs < 0.0 {
            return Err(LensError::invalid_argument(
                name,
                format!("{secs} must not be negative"),
            ));
        }
        Duration::try_from_secs_f64(secs)
            .map_err(|e| LensError::invalid_argument(name, format!("{secs}: {e}")))
    }
}

impl From<&str> for LooseValue {
    fn from(s: &str) -> Self {
        LooseValue::Text(s.to_string())
    }
}

impl From<String> for LooseValue {
    fn from(s: String) -> Self {
        LooseValue::Text(s)
    }
}

impl From<i64> for LooseValue {
    fn from(v: i64) -> Self {
        LooseValue::Int(v)
    }
}

impl From<f64> for LooseValue {
    fn from(v: f64) -> Self {
        LooseValue::Float(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_strings_coerce() {
        assert_eq!(LooseValue::from(" 540 ").to_i32("x").unwrap(), 540);
        assert_eq!(LooseValue::from("0.5").to_f64("duration").unwrap(), 0.5);
        assert_eq!(LooseValue::from("2").to_f64("duration").unwrap(), 2.0);
    }

    #[test]
    fn test_json_numbers_coerce() {
        assert_eq!(LooseValue::from(12.9).to_i32("x").unwrap(), 12);
        assert_eq!(LooseValue::from(7_i64).to_f64("scale").unwrap(), 7.0);
    }

    #[test]
    fn test_invalid_input_is_invalid_argument() {
        for bad in ["abc", "", "12.5", "1e400"] {
            let err = LooseValue::from(bad).to_i32("x").unwrap_err();
            assert!(
                matches!(&err, LensError::InvalidArgument { name, .. } if name == "x"),
                "{bad} → {err}"
            );
        }
        assert!(LooseValue::from("nan").to_f64("scale").is_err());
        assert!(LooseValue::from(i64::MAX).to_i32("x").is_err());
    }

    #[test]
    fn test_duration_rejects_negative() {
        assert_eq!(
            LooseValue::from("1.5").to_duration("duration").unwrap(),
            Duration::from_millis(1500)
        );
        for bad in ["-1", "1e300"] {
            let err = LooseValue::from(bad).to_duration("duration").unwrap_err();
            assert!(matches!(err, LensError::InvalidArgument { .. }), "{bad} → {err}");
        }
        assert!(LooseValue::from(f64::MAX).to_duration("timeout").is_err());
    }

    #[test]
    fn test_untagged_deserialize() {
        let v: Vec<LooseValue> = serde_json::from_str(r#"[1, 2.5, "3"]"#).unwrap();
        assert_eq!(
            v,
            vec![
                LooseValue::Int(1),
                LooseValue::Float(2.5),
                LooseValue::Text("3".into())
            ]
        );
    }
}
