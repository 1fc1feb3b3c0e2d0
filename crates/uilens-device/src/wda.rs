//! [`IosClient`] over the WebDriverAgent HTTP API.

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Method, Url};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

use uilens_core::{DeviceIdentity, ElementInfo, ForegroundApp, LensError, Rect, Result, WindowSize};

use crate::hierarchy::wda_truthy;
use crate::ios::{IosClient, PointF};

/// W3C element reference key.
const W3C_ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

pub struct WdaClient {
    base_url: Url,
    http: reqwest::Client,
    /// Lazily created WDA session.
    session: Mutex<Option<String>>,
}

impl WdaClient {
    /// Check that WebDriverAgent answers at `base_url`.
    pub async fn connect(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| LensError::connection(base_url, format!("invalid url: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LensError::connection(base_url.as_str(), e.to_string()))?;
        let client = Self {
            base_url,
            http,
            session: Mutex::new(None),
        };
        client
            .request(Method::GET, "/status", None)
            .await
            .map_err(|e| LensError::connection(client.base_url.as_str(), e.to_string()))?;
        debug!(url = %client.base_url, "WebDriverAgent reachable");
        Ok(client)
    }

    /// Send a request and unwrap the `value` field of the WDA envelope.
    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| LensError::sdk("ios", format!("bad path {path}: {e}")))?;
        let mut req = self.http.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| LensError::sdk("ios", format!("WebDriverAgent request failed: {e}")))?;
        let status = resp.status();
        let payload: Value = resp
            .json()
            .await
            .map_err(|e| LensError::sdk("ios", format!("invalid WebDriverAgent response: {e}")))?;
        if !status.is_success() {
            let message = payload["value"]["message"]
                .as_str()
                .or_else(|| payload["value"]["error"].as_str())
                .unwrap_or("unknown error");
            return Err(LensError::sdk("ios", format!("{path}: {status}: {message}")));
        }
        Ok(payload.get("value").cloned().unwrap_or(payload))
    }

    async fn session_id(&self) -> Result<String> {
        let mut session = self.session.lock().await;
        if let Some(id) = session.as_ref() {
            return Ok(id.clone());
        }
        let created = self
            .request(
                Method::POST,
                "/session",
                Some(json!({"capabilities": {}})),
            )
            .await?;
        let id = created["sessionId"]
            .as_str()
            .ok_or_else(|| LensError::sdk("ios", "WebDriverAgent did not return a session id"))?
            .to_string();
        debug!(session = %id, "WebDriverAgent session created");
        *session = Some(id.clone());
        Ok(id)
    }

    async fn session_request(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let sid = self.session_id().await?;
        self.request(method, &format!("/session/{sid}{path}"), body)
            .await
    }

    async fn element_attr(&self, id: &str, name: &str) -> Result<Value> {
        self.session_request(Method::GET, &format!("/element/{id}/attribute/{name}"), None)
            .await
    }
}

fn as_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn window_size_from(v: &Value) -> Result<WindowSize> {
    let dim = |k: &str| {
        v[k].as_f64()
            .map(|f| f.round() as u32)
            .ok_or_else(|| LensError::sdk("ios", format!("window size missing {k}")))
    };
    Ok(WindowSize {
        width: dim("width")?,
        height: dim("height")?,
    })
}

fn element_ids(v: &Value) -> Vec<String> {
    v.as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get(W3C_ELEMENT_KEY).or_else(|| item.get("ELEMENT")))
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl IosClient for WdaClient {
    async fn scale(&self) -> Result<f64> {
        let screen = self.request(Method::GET, "/wda/screen", None).await;
        if let Some(scale) = screen.ok().and_then(|s| s["scale"].as_f64()) {
            return Ok(scale);
        }
        // Older WDA builds lack /wda/screen: compare screenshot width to window width.
        let png = self.screenshot().await?;
        let shot = image::load_from_memory(&png)?;
        let size = self.window_size().await?;
        if size.width == 0 {
            return Err(LensError::sdk("ios", "window width is 0"));
        }
        Ok(f64::from(shot.width()) / f64::from(size.width))
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let value = self.request(Method::GET, "/screenshot", None).await?;
        let encoded = value
            .as_str()
            .ok_or_else(|| LensError::sdk("ios", "screenshot is not a base64 string"))?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.replace(['\n', '\r'], ""))
            .map_err(|e| LensError::sdk("ios", format!("screenshot is not valid base64: {e}")))
    }

    async fn source(&self) -> Result<Value> {
        self.request(Method::GET, "/source?format=json", None).await
    }

    async fn window_size(&self) -> Result<WindowSize> {
        let v = self.session_request(Method::GET, "/window/size", None).await?;
        window_size_from(&v)
    }

    async fn active_app(&self) -> Result<ForegroundApp> {
        let v = self.request(Method::GET, "/wda/activeAppInfo", None).await?;
        Ok(ForegroundApp {
            package: as_string(&v["bundleId"]),
            activity: as_string(&v["name"]),
        })
    }

    async fn launch_app(&self, bundle_id: &str) -> Result<()> {
        self.session_request(
            Method::POST,
            "/wda/apps/launch",
            Some(json!({"bundleId": bundle_id})),
        )
        .await?;
        Ok(())
    }

    async fn tap(&self, at: PointF) -> Result<()> {
        self.session_request(Method::POST, "/wda/tap/0", Some(json!({"x": at.x, "y": at.y})))
            .await?;
        Ok(())
    }

    async fn touch_and_hold(&self, at: PointF, duration: Duration) -> Result<()> {
        self.session_request(
            Method::POST,
            "/wda/touchAndHold",
            Some(json!({"x": at.x, "y": at.y, "duration": duration.as_secs_f64()})),
        )
        .await?;
        Ok(())
    }

    async fn drag(&self, from: PointF, to: PointF, duration: Duration) -> Result<()> {
        self.session_request(
            Method::POST,
            "/wda/dragfromtoforduration",
            Some(json!({
                "fromX": from.x,
                "fromY": from.y,
                "toX": to.x,
                "toY": to.y,
                "duration": duration.as_secs_f64(),
            })),
        )
        .await?;
        Ok(())
    }

    async fn press_button(&self, name: &str) -> Result<()> {
        self.session_request(Method::POST, "/wda/pressButton", Some(json!({"name": name})))
            .await?;
        Ok(())
    }

    async fn find_elements(&self, using: &str, value: &str) -> Result<Vec<String>> {
        let v = self
            .session_request(
                Method::POST,
                "/elements",
                Some(json!({"using": using, "value": value})),
            )
            .await?;
        Ok(element_ids(&v))
    }

    async fn element_info(&self, id: &str) -> Result<ElementInfo> {
        let rect = self
            .session_request(Method::GET, &format!("/element/{id}/rect"), None)
            .await?;
        let num = |k: &str| rect[k].as_f64().unwrap_or_default().round() as i32;
        let text = self
            .session_request(Method::GET, &format!("/element/{id}/text"), None)
            .await?;
        Ok(ElementInfo {
            text: as_string(&text),
            class_name: as_string(&self.element_attr(id, "type").await?),
            resource_id: as_string(&self.element_attr(id, "name").await?),
            description: as_string(&self.element_attr(id, "label").await?),
            bounds: Rect {
                x: num("x"),
                y: num("y"),
                width: num("width"),
                height: num("height"),
            },
            selected: wda_truthy(&self.element_attr(id, "selected").await?),
            enabled: wda_truthy(&self.element_attr(id, "enabled").await?),
            clickable: wda_truthy(&self.element_attr(id, "accessible").await?),
            focused: wda_truthy(&self.element_attr(id, "hasFocus").await?),
        })
    }

    async fn element_click(&self, id: &str) -> Result<()> {
        self.session_request(Method::POST, &format!("/element/{id}/click"), Some(json!({})))
            .await?;
        Ok(())
    }

    async fn element_clear(&self, id: &str) -> Result<()> {
        self.session_request(Method::POST, &format!("/element/{id}/clear"), Some(json!({})))
            .await?;
        Ok(())
    }

    async fn element_set_value(&self, id: &str, text: &str) -> Result<()> {
        let chars: Vec<String> = text.chars().map(String::from).collect();
        self.session_request(
            Method::POST,
            &format!("/element/{id}/value"),
            Some(json!({"value": chars, "text": text})),
        )
        .await?;
        Ok(())
    }

    async fn device_identity(&self) -> Result<DeviceIdentity> {
        let info = self.request(Method::GET, "/wda/device/info", None).await?;
        let status = self.request(Method::GET, "/status", None).await?;
        let udid = as_string(&info["uuid"]);
        Ok(DeviceIdentity {
            serial: udid.clone(),
            udid,
            model: as_string(&info["model"]),
            hardware_address: String::new(),
            port: self.base_url.port_or_known_default(),
            sdk_version: status["os"]["version"].as_str().map(str::to_string),
        })
    }
}
