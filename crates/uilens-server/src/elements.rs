//! Element queries and assertions.
//!
//! `GET /api/v1/devices/{id}/element/{action}` reads or acts on one element;
//! `GET /api/v1/devices/{id}/assert/{action}` compares an element property
//! against `target`. A missing element is reported in the body, never as an
//! HTTP error.

use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

use uilens_core::{LensError, LooseValue, Result};
use uilens_device::commands::{ElementArgs, InputArgs};
use uilens_device::{DeviceAdapter, DeviceCommand, ELEMENT_MISSING_MSG};

use crate::AppState;
use crate::devices::{device, query, run_command};
use crate::error::ApiResult;

#[derive(Debug, Deserialize)]
pub struct ElementQuery {
    #[serde(alias = "kind")]
    origin: String,
    #[serde(alias = "value")]
    flag: String,
    #[serde(default)]
    index: Option<LooseValue>,
    #[serde(default)]
    input: Option<String>,
    #[serde(default)]
    target: Option<String>,
}

impl ElementQuery {
    fn element_args(&self) -> ElementArgs {
        ElementArgs {
            origin: self.origin.clone(),
            flag: self.flag.clone(),
            index: self.index.clone(),
        }
    }

    fn target(&self) -> Result<&str> {
        self.target
            .as_deref()
            .ok_or_else(|| LensError::invalid_argument("target", "missing"))
    }
}

#[derive(Clone, Copy)]
enum Flag {
    Selected,
    Enabled,
}

impl Flag {
    fn name(self) -> &'static str {
        match self {
            Flag::Selected => "selected",
            Flag::Enabled => "enabled",
        }
    }
}

/// Read a boolean element property; `None` when the element is missing.
async fn read_flag(device: &dyn DeviceAdapter, q: &ElementQuery, flag: Flag) -> Result<Option<bool>> {
    let element = device.locate(&q.element_args().locator()?);
    if !element.exists().await? {
        return Ok(None);
    }
    let info = element.info().await?;
    Ok(Some(match flag {
        Flag::Selected => info.selected,
        Flag::Enabled => info.enabled,
    }))
}

/// Parse an assertion target such as `true`, `False` or `1`.
fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(LensError::invalid_argument(
            "target",
            format!("expected true or false, got '{other}'"),
        )),
    }
}

fn unknown_action(action: &str) -> LensError {
    LensError::invalid_argument("action", format!("unknown element action '{action}'"))
}

pub async fn element(
    State(state): State<Arc<AppState>>,
    Path((id, action)): Path<(String, String)>,
    q: std::result::Result<Query<ElementQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let q = query(q)?;
    let command = match action.as_str() {
        "exists" => Some(DeviceCommand::Exists(q.element_args())),
        "text" => Some(DeviceCommand::Text(q.element_args())),
        "click" => Some(DeviceCommand::Click(q.element_args())),
        "input" => Some(DeviceCommand::Input(InputArgs {
            origin: q.origin.clone(),
            flag: q.flag.clone(),
            index: q.index.clone(),
            input: q.input.clone().unwrap_or_default(),
        })),
        "selected" | "enabled" => None,
        other => return Err(unknown_action(other).into()),
    };

    let device = device(&state, &id).await?;
    if let Some(command) = command {
        return Ok(Json(run_command(&state, device.as_ref(), &command).await?));
    }

    let flag = if action == "selected" {
        Flag::Selected
    } else {
        Flag::Enabled
    };
    let mut reply = serde_json::Map::new();
    match read_flag(device.as_ref(), &q, flag).await? {
        Some(value) => {
            info!(session = %id, flag = flag.name(), value, "element flag");
            reply.insert("success".into(), Value::Bool(true));
            reply.insert(flag.name().into(), Value::Bool(value));
        }
        None => {
            reply.insert("success".into(), Value::Bool(false));
            reply.insert(flag.name().into(), Value::Bool(false));
            reply.insert("msg".into(), ELEMENT_MISSING_MSG.into());
        }
    }
    Ok(Json(Value::Object(reply)))
}

pub async fn assert_element(
    State(state): State<Arc<AppState>>,
    Path((id, action)): Path<(String, String)>,
    q: std::result::Result<Query<ElementQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let q = query(q)?;
    let target = q.target()?.to_string();
    if !matches!(action.as_str(), "exists" | "selected" | "enabled" | "text") {
        return Err(unknown_action(&action).into());
    }
    let expected_flag = match action.as_str() {
        "text" => None,
        _ => Some(parse_bool(&target)?),
    };

    let device = device(&state, &id).await?;
    let locator = q.element_args().locator()?;
    let element = device.locate(&locator);
    let exists = element.exists().await?;

    if action == "exists" {
        let result = expected_flag == Some(exists);
        info!(session = %id, %locator, exists, result, "assert exists");
        return Ok(Json(json!({"success": true, "exists": result})));
    }
    if !exists {
        return Ok(Json(json!({"success": false, "result": false, "msg": ELEMENT_MISSING_MSG})));
    }

    let result = match action.as_str() {
        "text" => element.text().await? == target,
        "selected" => expected_flag == Some(element.info().await?.selected),
        _ => expected_flag == Some(element.info().await?.enabled),
    };
    info!(session = %id, %locator, action = %action, result, "assert");
    Ok(Json(json!({"success": true, "result": result})))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true").unwrap());
        assert!(parse_bool("True").unwrap());
        assert!(parse_bool("1").unwrap());
        assert!(!parse_bool("false").unwrap());
        assert!(!parse_bool(" 0 ").unwrap());
        assert!(parse_bool("yes").is_err());
    }
}
