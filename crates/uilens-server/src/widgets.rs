//! On-disk widget catalog.
//!
//! Each widget lives in `<root>/<id>/` with five-digit ids:
//!
//! ```text
//! 00001/
//!   screenshot.jpg   full device screenshot
//!   template.jpg     the widget cropped out of it
//!   meta.json        locator fields, geometry, image URLs
//!   hierarchy.xml    hierarchy dump at capture time
//! ```

use axum::{
    Json,
    extract::{Path as UrlPath, State, rejection::JsonRejection},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::GenericImageView;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use uilens_core::{LensError, Rect, Result};
use uilens_device::capture;

use crate::AppState;
use crate::devices::body;
use crate::error::ApiResult;

const SCREENSHOT_FILE: &str = "screenshot.jpg";
const TEMPLATE_FILE: &str = "template.jpg";
const META_FILE: &str = "meta.json";
const HIERARCHY_FILE: &str = "hierarchy.xml";
const JPEG_QUALITY: u8 = 75;

/// Body of `POST /api/v1/widgets`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWidget {
    /// Base64 screenshot, optionally as a `data:` URL.
    pub screenshot: String,
    /// `[left, top, right, bottom]` in screenshot pixels.
    pub bounds: [i32; 4],
    #[serde(default)]
    pub resource_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub package: String,
    #[serde(default)]
    pub activity: String,
    #[serde(default)]
    pub class_name: String,
    #[serde(default)]
    pub window_size: Value,
    #[serde(default)]
    pub xpath: String,
    #[serde(default)]
    pub hierarchy: String,
}

/// Body of `PUT /api/v1/widgets/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct WidgetUpdate {
    pub hierarchy: String,
    pub xpath: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub size: [u32; 2],
    pub url: String,
}

/// Contents of `meta.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetMeta {
    pub resource_id: String,
    pub text: String,
    pub description: String,
    pub target_size: [i32; 2],
    pub package: String,
    pub activity: String,
    pub class_name: String,
    pub rect: Rect,
    pub window_size: Value,
    pub xpath: String,
    pub target_image: ImageRef,
    pub device_image: ImageRef,
}

/// A freshly stored widget.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedWidget {
    pub id: String,
    /// Short label for the catalog list: the text, else the description.
    pub note: String,
    pub data: WidgetMeta,
}

pub struct WidgetStore {
    root: PathBuf,
    public_url: String,
    /// Serializes id allocation.
    lock: Mutex<()>,
}

impl WidgetStore {
    pub fn new(root: impl Into<PathBuf>, public_url: &str) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.trim_end_matches('/').to_string(),
            lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Next free id: one past the number of widget directories.
    fn allocate_id(&self) -> Result<String> {
        std::fs::create_dir_all(&self.root)?;
        let mut count = 0usize;
        for entry in std::fs::read_dir(&self.root)? {
            if entry?.file_type()?.is_dir() {
                count += 1;
            }
        }
        let mut next = count + 1;
        // a deleted directory leaves a gap; never reuse a live id
        while self.root.join(format!("{next:05}")).exists() {
            next += 1;
        }
        Ok(format!("{next:05}"))
    }

    fn widget_dir(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
            return Err(LensError::Widget(format!("invalid widget id '{id}'")));
        }
        let dir = self.root.join(id);
        if !dir.is_dir() {
            return Err(LensError::Widget(format!("widget {id} not found")));
        }
        Ok(dir)
    }

    fn image_url(&self, id: &str, file: &str) -> String {
        format!("{}/widgets/{id}/{file}", self.public_url)
    }

    pub fn create(&self, widget: &NewWidget) -> Result<CreatedWidget> {
        let [lx, ly, rx, ry] = widget.bounds;
        if rx <= lx || ry <= ly {
            return Err(LensError::invalid_argument(
                "bounds",
                format!("[{lx}, {ly}, {rx}, {ry}] is empty"),
            ));
        }
        let (Some(width), Some(height)) = (rx.checked_sub(lx), ry.checked_sub(ly)) else {
            return Err(LensError::invalid_argument(
                "bounds",
                format!("[{lx}, {ly}, {rx}, {ry}] is too large"),
            ));
        };
        let encoded = match widget.screenshot.split_once(";base64,") {
            Some((_, data)) => data,
            None => widget.screenshot.as_str(),
        };
        let raw = STANDARD
            .decode(encoded.trim())
            .map_err(|e| LensError::invalid_argument("screenshot", e.to_string()))?;
        let screenshot = image::load_from_memory(&raw)
            .map_err(|e| LensError::invalid_argument("screenshot", e.to_string()))?;
        let rect = Rect {
            x: lx,
            y: ly,
            width,
            height,
        };
        let template = capture::crop(&screenshot, rect)?;

        let _guard = self.lock.lock();
        let id = self.allocate_id()?;
        let dir = self.root.join(&id);
        std::fs::create_dir_all(&dir)?;

        std::fs::write(
            dir.join(SCREENSHOT_FILE),
            capture::encode_jpeg(&screenshot, JPEG_QUALITY)?,
        )?;
        std::fs::write(
            dir.join(TEMPLATE_FILE),
            capture::encode_jpeg(&template, JPEG_QUALITY)?,
        )?;

        let (width, height) = screenshot.dimensions();
        let meta = WidgetMeta {
            resource_id: widget.resource_id.clone(),
            text: widget.text.clone(),
            description: widget.description.clone(),
            target_size: [rect.width, rect.height],
            package: widget.package.clone(),
            activity: widget.activity.clone(),
            class_name: widget.class_name.clone(),
            rect,
            window_size: widget.window_size.clone(),
            xpath: widget.xpath.clone(),
            target_image: ImageRef {
                size: [rect.width as u32, rect.height as u32],
                url: self.image_url(&id, TEMPLATE_FILE),
            },
            device_image: ImageRef {
                size: [width, height],
                url: self.image_url(&id, SCREENSHOT_FILE),
            },
        };
        std::fs::write(dir.join(META_FILE), serde_json::to_string_pretty(&meta)?)?;
        std::fs::write(dir.join(HIERARCHY_FILE), &widget.hierarchy)?;
        info!(widget = %id, path = %dir.display(), "widget saved");

        let note = if widget.text.is_empty() {
            widget.description.clone()
        } else {
            widget.text.clone()
        };
        Ok(CreatedWidget { id, note, data: meta })
    }

    /// Stored metadata with the hierarchy attached under `hierarchy`.
    pub fn get(&self, id: &str) -> Result<Value> {
        let dir = self.widget_dir(id)?;
        let mut meta: Value = serde_json::from_str(&std::fs::read_to_string(dir.join(META_FILE))?)?;
        let hierarchy = std::fs::read_to_string(dir.join(HIERARCHY_FILE))?;
        if let Value::Object(ref mut map) = meta {
            map.insert("hierarchy".into(), Value::String(hierarchy));
        }
        Ok(meta)
    }

    /// Replace the stored hierarchy and the `xpath` field of the metadata.
    pub fn update(&self, id: &str, update: &WidgetUpdate) -> Result<()> {
        let dir = self.widget_dir(id)?;
        std::fs::write(dir.join(HIERARCHY_FILE), &update.hierarchy)?;

        let meta_path = dir.join(META_FILE);
        let mut meta: Value = serde_json::from_str(&std::fs::read_to_string(&meta_path)?)?;
        meta["xpath"] = Value::String(update.xpath.clone());
        std::fs::write(&meta_path, serde_json::to_string_pretty(&meta)?)?;
        info!(widget = %id, "widget updated");
        Ok(())
    }
}

// ── HTTP handlers ──────────────────────────────────────────────

/// Run a store operation on the blocking pool.
async fn blocking<T, F>(state: Arc<AppState>, op: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&WidgetStore) -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || op(&state.widgets))
        .await
        .map_err(std::io::Error::from)?
}

pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    req: std::result::Result<Json<NewWidget>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let widget = body(req)?;
    let created = blocking(state.clone(), move |store| store.create(&widget)).await?;
    state.metrics.inc_widgets_created();
    Ok(Json(json!({
        "success": true,
        "id": created.id,
        "note": created.note,
        "data": created.data,
    })))
}

pub async fn get_handler(
    State(state): State<Arc<AppState>>,
    UrlPath(id): UrlPath<String>,
) -> ApiResult<Json<Value>> {
    Ok(Json(blocking(state, move |store| store.get(&id)).await?))
}

pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    UrlPath(id): UrlPath<String>,
    req: std::result::Result<Json<WidgetUpdate>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let update = body(req)?;
    let widget = id.clone();
    blocking(state, move |store| store.update(&widget, &update)).await?;
    Ok(Json(json!({
        "success": true,
        "description": format!("widget {id} updated"),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uilens_device::mock::png_bytes;

    fn new_widget(text: &str) -> NewWidget {
        NewWidget {
            screenshot: STANDARD.encode(png_bytes(200, 400)),
            bounds: [20, 40, 120, 90],
            resource_id: "app:id/login".into(),
            text: text.into(),
            description: "Sign in".into(),
            package: "com.example.app".into(),
            activity: ".MainActivity".into(),
            class_name: "android.widget.Button".into(),
            window_size: serde_json::json!([200, 400]),
            xpath: "//*[@text=\"Login\"]".into(),
            hierarchy: "<hierarchy/>".into(),
        }
    }

    #[test]
    fn test_create_writes_all_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = WidgetStore::new(tmp.path(), "http://localhost:17310/");
        let created = store.create(&new_widget("Login")).unwrap();

        assert_eq!(created.id, "00001");
        assert_eq!(created.note, "Login");
        let dir = tmp.path().join("00001");
        for file in [SCREENSHOT_FILE, TEMPLATE_FILE, META_FILE, HIERARCHY_FILE] {
            assert!(dir.join(file).exists(), "{file} missing");
        }

        let meta = created.data;
        assert_eq!(meta.target_size, [100, 50]);
        assert_eq!(meta.rect, Rect { x: 20, y: 40, width: 100, height: 50 });
        assert_eq!(meta.device_image.size, [200, 400]);
        assert_eq!(
            meta.target_image.url,
            "http://localhost:17310/widgets/00001/template.jpg"
        );

        let template = image::open(dir.join(TEMPLATE_FILE)).unwrap();
        assert_eq!(template.dimensions(), (100, 50));
    }

    #[test]
    fn test_ids_increment_and_skip_gaps() {
        let tmp = tempfile::tempdir().unwrap();
        let store = WidgetStore::new(tmp.path(), "http://localhost:17310");
        assert_eq!(store.create(&new_widget("a")).unwrap().id, "00001");
        assert_eq!(store.create(&new_widget("b")).unwrap().id, "00002");

        std::fs::remove_dir_all(tmp.path().join("00001")).unwrap();
        // one directory left, but 00002 is taken
        assert_eq!(store.create(&new_widget("c")).unwrap().id, "00003");
    }

    #[test]
    fn test_note_falls_back_to_description() {
        let tmp = tempfile::tempdir().unwrap();
        let store = WidgetStore::new(tmp.path(), "http://localhost:17310");
        assert_eq!(store.create(&new_widget("")).unwrap().note, "Sign in");
    }

    #[test]
    fn test_get_and_update() {
        let tmp = tempfile::tempdir().unwrap();
        let store = WidgetStore::new(tmp.path(), "http://localhost:17310");
        let id = store.create(&new_widget("Login")).unwrap().id;

        let got = store.get(&id).unwrap();
        assert_eq!(got["hierarchy"], "<hierarchy/>");
        assert_eq!(got["resource_id"], "app:id/login");

        store
            .update(
                &id,
                &WidgetUpdate {
                    hierarchy: "<hierarchy rotation=\"1\"/>".into(),
                    xpath: "//node[1]".into(),
                },
            )
            .unwrap();
        let got = store.get(&id).unwrap();
        assert_eq!(got["xpath"], "//node[1]");
        assert_eq!(got["hierarchy"], "<hierarchy rotation=\"1\"/>");
        assert_eq!(got["text"], "Login");
    }

    #[test]
    fn test_unknown_or_invalid_id() {
        let tmp = tempfile::tempdir().unwrap();
        let store = WidgetStore::new(tmp.path(), "http://localhost:17310");
        assert!(matches!(store.get("00042"), Err(LensError::Widget(_))));
        assert!(matches!(store.get("../etc"), Err(LensError::Widget(_))));
    }

    #[test]
    fn test_bad_input_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let store = WidgetStore::new(tmp.path(), "http://localhost:17310");

        let mut w = new_widget("x");
        w.bounds = [50, 50, 50, 80];
        assert!(matches!(store.create(&w), Err(LensError::InvalidArgument { .. })));

        let mut w = new_widget("x");
        w.bounds = [i32::MIN, 0, i32::MAX, 10];
        assert!(matches!(store.create(&w), Err(LensError::InvalidArgument { .. })));

        let mut w = new_widget("x");
        w.screenshot = "not base64!".into();
        assert!(matches!(store.create(&w), Err(LensError::InvalidArgument { .. })));

        // nothing was allocated
        assert_eq!(std::fs::read_dir(tmp.path()).map(|d| d.count()).unwrap_or(0), 0);
    }

    #[test]
    fn test_data_url_prefix_accepted() {
        let tmp = tempfile::tempdir().unwrap();
        let store = WidgetStore::new(tmp.path(), "http://localhost:17310");
        let mut w = new_widget("x");
        w.screenshot = format!("data:image/png;base64,{}", w.screenshot);
        assert!(store.create(&w).is_ok());
    }
}
