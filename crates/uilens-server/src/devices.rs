//! Device REST handlers: sessions, capture, gestures and adb extras.

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection, rejection::QueryRejection},
    http::{HeaderMap, header},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::DynamicImage;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

use uilens_core::{LensError, Result};
use uilens_device::commands::{
    LongPressArgs, PressArgs, ShellArgs, SwipeArgs, SwipeExtArgs, TapArgs,
};
use uilens_device::{DeviceAdapter, DeviceCommand, HierarchySnapshot, SHELL_TIMEOUT, capture};

use crate::AppState;
use crate::error::ApiResult;

const SCREENSHOT_QUALITY: u8 = 80;

/// Unwrap a query-string extractor, reporting malformed input as
/// [`LensError::InvalidArgument`].
pub(crate) fn query<T>(q: std::result::Result<Query<T>, QueryRejection>) -> ApiResult<T> {
    q.map(|Query(v)| v)
        .map_err(|e| LensError::invalid_argument("query", e.body_text()).into())
}

pub(crate) fn body<T>(b: std::result::Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    b.map(|Json(v)| v)
        .map_err(|e| LensError::invalid_argument("body", e.body_text()).into())
}

/// JPEG-encode and base64 a frame off the async runtime.
pub(crate) async fn encode_frame(img: DynamicImage, quality: u8) -> Result<String> {
    let jpeg = tokio::task::spawn_blocking(move || capture::encode_jpeg(&img, quality))
        .await
        .map_err(std::io::Error::from)??;
    Ok(STANDARD.encode(jpeg))
}

pub(crate) async fn device(state: &AppState, id: &str) -> ApiResult<Arc<dyn DeviceAdapter>> {
    Ok(state.registry.get(id).await?)
}

/// Dispatch a command, counting it and its failure.
pub(crate) async fn run_command(
    state: &AppState,
    device: &dyn DeviceAdapter,
    command: &DeviceCommand,
) -> Result<Value> {
    state.metrics.inc_device_commands();
    command
        .dispatch(device)
        .await
        .inspect_err(|_| state.metrics.inc_device_command_errors())
}

async fn command_handler(state: &AppState, id: &str, command: DeviceCommand) -> ApiResult<Json<Value>> {
    let device = device(state, id).await?;
    Ok(Json(run_command(state, device.as_ref(), &command).await?))
}

// ── Sessions ───────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ConnectRequest {
    platform: String,
    #[serde(rename = "deviceUrl", default)]
    device_url: String,
}

pub async fn connect(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    req: std::result::Result<Json<ConnectRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let req = body(req)?;
    state.metrics.inc_device_connects();
    let id = state.registry.connect(&req.platform, &req.device_url).await?;

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(state.config.server.listen.as_str());
    let ws_url = format!(
        "ws://{host}/api/v1/devices/{}/ws",
        urlencoding::encode(id.as_str())
    );
    Ok(Json(json!({
        "deviceId": id,
        "success": true,
        "screenWebSocketUrl": ws_url,
    })))
}

pub async fn list(State(state): State<Arc<AppState>>) -> Json<Value> {
    let sessions = state.registry.list().await;
    Json(json!({"success": true, "result": sessions}))
}

// ── Capture ────────────────────────────────────────────────────

pub async fn hierarchy(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let device = device(&state, &id).await?;
    state.metrics.inc_hierarchy_dumps();
    Ok(Json(device.dump_hierarchy().await?))
}

pub async fn hierarchy_v2(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<HierarchySnapshot>> {
    let device = device(&state, &id).await?;
    state.metrics.inc_hierarchy_dumps();
    Ok(Json(device.dump_hierarchy_ext().await?))
}

pub async fn screenshot(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let device = device(&state, &id).await?;
    let img = device.screenshot().await?;
    state.metrics.inc_screenshots();
    let data = encode_frame(img, SCREENSHOT_QUALITY).await?;
    Ok(Json(json!({
        "type": "jpeg",
        "encoding": "base64",
        "data": data,
    })))
}

pub async fn window_size(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let size = device(&state, &id).await?.window_size().await?;
    Ok(Json(json!({"width": size.width, "height": size.height})))
}

// ── Gestures ───────────────────────────────────────────────────

pub async fn tap(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    args: std::result::Result<Query<TapArgs>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    command_handler(&state, &id, DeviceCommand::Tap(query(args)?)).await
}

pub async fn long_tap(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    args: std::result::Result<Query<LongPressArgs>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    command_handler(&state, &id, DeviceCommand::LongPress(query(args)?)).await
}

pub async fn swipe(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    args: std::result::Result<Query<SwipeArgs>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    command_handler(&state, &id, DeviceCommand::Swipe(query(args)?)).await
}

pub async fn swipe_ext(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    args: std::result::Result<Query<SwipeExtArgs>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    command_handler(&state, &id, DeviceCommand::SwipeExt(query(args)?)).await
}

pub async fn press(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    args: std::result::Result<Query<PressArgs>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    command_handler(&state, &id, DeviceCommand::Press(query(args)?)).await
}

pub async fn shell(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    args: std::result::Result<Json<ShellArgs>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    command_handler(&state, &id, DeviceCommand::Shell(body(args)?)).await
}

// ── Apps ───────────────────────────────────────────────────────

pub async fn app_current(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    command_handler(&state, &id, DeviceCommand::AppCurrent).await
}

#[derive(Deserialize)]
pub struct AppStartArgs {
    package: String,
    #[serde(default)]
    activity: Option<String>,
}

pub async fn app_start(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    args: std::result::Result<Query<AppStartArgs>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let args = query(args)?;
    let device = device(&state, &id).await?;
    device
        .app_start(&args.package, args.activity.as_deref().filter(|a| !a.is_empty()))
        .await?;
    info!(session = %id, package = %args.package, "app started");
    Ok(Json(json!({"success": true})))
}

#[derive(Deserialize)]
pub struct InstallArgs {
    #[serde(rename = "installUrl")]
    install_url: String,
}

pub async fn install(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    args: std::result::Result<Query<InstallArgs>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let args = query(args)?;
    let output = device(&state, &id).await?.install_app(&args.install_url).await?;
    let success = output.contains("Success");
    info!(session = %id, path = %args.install_url, success, "install");
    Ok(Json(json!({"success": success, "result": output})))
}

#[derive(Deserialize)]
pub struct UninstallArgs {
    package: String,
}

pub async fn uninstall(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    args: std::result::Result<Query<UninstallArgs>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let args = query(args)?;
    let output = device(&state, &id).await?.uninstall_app(&args.package).await?;
    let success = output.contains("Success");
    info!(session = %id, package = %args.package, success, "uninstall");
    Ok(Json(json!({"success": success, "result": output})))
}

// ── Telephony ──────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CallArgs {
    #[serde(default)]
    phone: String,
}

/// Phone numbers go into a device shell command line.
fn validate_phone(phone: &str) -> Result<()> {
    let valid = !phone.is_empty()
        && phone
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '*' | '#' | '-'));
    if valid {
        Ok(())
    } else {
        Err(LensError::invalid_argument(
            "phone",
            format!("'{phone}' is not a dialable number"),
        ))
    }
}

pub async fn call(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    args: std::result::Result<Query<CallArgs>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let args = query(args)?;
    validate_phone(&args.phone)?;
    let device = device(&state, &id).await?;
    let command = format!(
        "am start -a android.intent.action.CALL -d 'tel:{}'",
        args.phone
    );
    let out = device.run_shell(&command, SHELL_TIMEOUT).await?;
    info!(session = %id, code = out.exit_code, "call placed");
    Ok(Json(json!({"success": out.exit_code == 0, "result": out.output})))
}

pub async fn end_call(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    device(&state, &id).await?.press_key("endcall").await?;
    info!(session = %id, "call ended");
    Ok(Json(json!({"success": true})))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("+15551234567").is_ok());
        assert!(validate_phone("*#06#").is_ok());
        assert!(validate_phone("").is_err());
        assert!(validate_phone("123; reboot").is_err());
        assert!(validate_phone("12 34").is_err());
    }
}
