//! # uilens-server
//!
//! HTTP/WebSocket API for the uilens inspector. Provides:
//!
//! - REST routes for device sessions, screenshots, hierarchy dumps,
//!   gestures and element queries
//! - A per-device WebSocket streaming screen frames and accepting commands
//! - The widget catalog and its saved images
//! - Optional static serving of a built inspector UI

pub mod devices;
pub mod elements;
pub mod error;
pub mod metrics;
pub mod stream;
pub mod widgets;

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    middleware::{self, Next},
    response::{Json, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use uilens_config::UilensConfig;
use uilens_core::LensError;
use uilens_device::{Connector, DeviceRegistry, DeviceSettings, SdkConnector};

pub use error::{ApiError, ApiResult};
pub use widgets::WidgetStore;

/// Shared server state.
pub struct AppState {
    pub config: UilensConfig,
    pub registry: Arc<DeviceRegistry>,
    pub metrics: metrics::Metrics,
    pub widgets: WidgetStore,
}

impl AppState {
    pub fn new(config: UilensConfig, connector: Arc<dyn Connector>) -> Self {
        let widgets = WidgetStore::new(
            config.widgets.resolved_store_dir(),
            &config.widgets.public_url,
        );
        Self {
            registry: Arc::new(DeviceRegistry::new(connector)),
            metrics: metrics::Metrics::new(),
            widgets,
            config,
        }
    }
}

/// Session settings derived from the `[device]` table.
pub fn device_settings(config: &UilensConfig) -> DeviceSettings {
    let device = &config.device;
    DeviceSettings {
        adb_path: device.adb_path.clone(),
        wda_usb_url: device.wda_usb_url.clone(),
        idevicescreenshot_path: device.idevicescreenshot_path.clone(),
        fallback_to_blank_screenshot: device.fallback_to_blank_screenshot,
        shell_timeout: Duration::from_secs(device.shell_timeout_secs),
        command_timeout: Duration::from_secs(device.command_timeout_secs),
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_secs: u64,
    sessions: usize,
}

/// Build the Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let device_routes = Router::new()
        .route("/api/v1/devices/{id}/hierarchy", get(devices::hierarchy))
        .route("/api/v1/devices/{id}/hierarchy/v2", get(devices::hierarchy_v2))
        .route("/api/v1/devices/{id}/screenshot", get(devices::screenshot))
        .route("/api/v1/devices/{id}/window-size", get(devices::window_size))
        .route("/api/v1/devices/{id}/tap", get(devices::tap))
        .route("/api/v1/devices/{id}/long-tap", get(devices::long_tap))
        .route("/api/v1/devices/{id}/swipe", get(devices::swipe))
        .route("/api/v1/devices/{id}/swipe-ext", get(devices::swipe_ext))
        .route("/api/v1/devices/{id}/press", get(devices::press))
        .route("/api/v1/devices/{id}/shell", post(devices::shell))
        .route("/api/v1/devices/{id}/app/current", get(devices::app_current))
        .route("/api/v1/devices/{id}/app/start", get(devices::app_start))
        .route("/api/v1/devices/{id}/install", get(devices::install))
        .route("/api/v1/devices/{id}/uninstall", get(devices::uninstall))
        .route("/api/v1/devices/{id}/call", get(devices::call))
        .route("/api/v1/devices/{id}/end-call", get(devices::end_call))
        .route(
            "/api/v1/devices/{id}/element/{action}",
            get(elements::element),
        )
        .route(
            "/api/v1/devices/{id}/assert/{action}",
            get(elements::assert_element),
        )
        .route("/api/v1/devices/{id}/ws", get(stream::ws_handler));

    let api_routes = Router::new()
        .route("/api/v1/version", get(version_handler))
        .route("/api/v1/connect", post(devices::connect))
        .route("/api/v1/devices", get(devices::list))
        .route("/api/v1/widgets", post(widgets::create_handler))
        .route(
            "/api/v1/widgets/{id}",
            get(widgets::get_handler).put(widgets::update_handler),
        )
        .merge(device_routes);

    let api_routes = if state.config.server.api_key.is_some() {
        api_routes.layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
    } else {
        api_routes
    };

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        // saved widget images stay public; <img> tags can't send auth headers
        .nest_service("/widgets", ServeDir::new(state.widgets.root()))
        .merge(api_routes);

    if let Some(ref dir) = state.config.server.web_dir {
        info!(path = %dir.display(), "serving inspector UI");
        router = router.fallback_service(ServeDir::new(dir));
    }

    let mut router = router
        .layer(middleware::from_fn_with_state(
            state.clone(),
            track_requests,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    if state.config.server.cors {
        router = router.layer(CorsLayer::permissive());
    }

    router
}

/// Bearer token from the `Authorization` header, or `token` from the query
/// string for WebSocket clients that cannot set headers.
fn provided_key(headers: &HeaderMap, query: Option<&str>) -> Option<String> {
    if let Some(key) = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(key.to_string());
    }
    query?
        .split('&')
        .find_map(|pair| pair.strip_prefix("token="))
        .and_then(|raw| urlencoding::decode(raw).ok())
        .map(|key| key.into_owned())
}

async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    if let Some(ref expected_key) = state.config.server.api_key {
        match provided_key(&headers, request.uri().query()) {
            Some(key) if key == *expected_key => {}
            _ => {
                warn!(path = %request.uri().path(), "unauthorized API request");
                return Err(StatusCode::UNAUTHORIZED);
            }
        }
    }
    Ok(next.run(request).await)
}

async fn track_requests(
    State(state): State<Arc<AppState>>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    state.metrics.inc_http_requests();
    let response = next.run(request).await;
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        state.metrics.inc_http_errors();
    }
    response
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_secs: state.metrics.uptime_secs(),
        sessions: state.registry.len(),
    })
}

async fn version_handler() -> Json<Value> {
    Json(json!({
        "name": "uilens",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Prometheus-compatible metrics endpoint.
async fn metrics_handler(
    State(state): State<Arc<AppState>>,
) -> (
    StatusCode,
    [(axum::http::header::HeaderName, &'static str); 1],
    String,
) {
    let body = state.metrics.render_prometheus();
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        body,
    )
}

/// Start the HTTP server with adb/WebDriverAgent backed sessions.
pub async fn start_server(config: UilensConfig) -> uilens_core::Result<()> {
    let connector = Arc::new(SdkConnector::new(device_settings(&config)));
    serve(config, connector).await
}

/// Start the HTTP server over an arbitrary [`Connector`].
pub async fn serve(config: UilensConfig, connector: Arc<dyn Connector>) -> uilens_core::Result<()> {
    let listen = config.server.listen.clone();
    let state = Arc::new(AppState::new(config, connector));
    let router = build_router(state);

    info!(listen = %listen, "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .map_err(|e| LensError::Config(format!("failed to bind {listen}: {e}")))?;

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_provided_key_from_header() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer s3cret"));
        assert_eq!(provided_key(&headers, None).as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_provided_key_from_query() {
        let headers = HeaderMap::new();
        assert_eq!(
            provided_key(&headers, Some("a=1&token=s3%20cret")).as_deref(),
            Some("s3 cret")
        );
        assert_eq!(provided_key(&headers, Some("a=1")), None);
        assert_eq!(provided_key(&headers, None), None);
    }

    #[test]
    fn test_device_settings_from_config() {
        let mut config = UilensConfig::default();
        config.device.adb_path = "/opt/android/adb".into();
        config.device.shell_timeout_secs = 15;
        let settings = device_settings(&config);
        assert_eq!(settings.adb_path, "/opt/android/adb");
        assert_eq!(settings.shell_timeout, Duration::from_secs(15));
        assert_eq!(settings.command_timeout, Duration::from_secs(30));
    }
}
