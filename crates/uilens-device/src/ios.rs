//! iOS adapter.
//!
//! [`IosDevice`] drives a device through an [`IosClient`] (WebDriverAgent in
//! production, see [`crate::wda`]). WebDriverAgent works in points; the
//! adapter speaks screenshot pixels and converts with the scale factor read
//! at connect time.

use async_trait::async_trait;
use image::DynamicImage;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use uilens_core::{
    DeviceIdentity, ElementInfo, ForegroundApp, LensError, Locator, Platform, Point, Rect, Result,
    ShellOutput, SwipeDirection, WindowSize,
};

use crate::adapter::{DeviceAdapter, HierarchySnapshot, UiElement, not_found};
use crate::locator::{WdaQuery, resolve_ios};
use crate::{capture, gesture, hierarchy};

/// A position in WebDriverAgent points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointF {
    pub x: f64,
    pub y: f64,
}

/// Device primitives an iOS adapter delegates to. Geometry is in points.
#[async_trait]
pub trait IosClient: Send + Sync {
    /// Screenshot pixels per point.
    async fn scale(&self) -> Result<f64>;

    /// Raw PNG bytes.
    async fn screenshot(&self) -> Result<Vec<u8>>;

    /// JSON accessibility tree.
    async fn source(&self) -> Result<Value>;

    async fn window_size(&self) -> Result<WindowSize>;

    async fn active_app(&self) -> Result<ForegroundApp>;

    async fn launch_app(&self, bundle_id: &str) -> Result<()>;

    async fn tap(&self, at: PointF) -> Result<()>;

    async fn touch_and_hold(&self, at: PointF, duration: Duration) -> Result<()>;

    async fn drag(&self, from: PointF, to: PointF, duration: Duration) -> Result<()>;

    async fn press_button(&self, name: &str) -> Result<()>;

    /// Element ids matching a search, in WDA order.
    async fn find_elements(&self, using: &str, value: &str) -> Result<Vec<String>>;

    /// Element attributes; `bounds` in points.
    async fn element_info(&self, id: &str) -> Result<ElementInfo>;

    async fn element_click(&self, id: &str) -> Result<()>;

    async fn element_clear(&self, id: &str) -> Result<()>;

    async fn element_set_value(&self, id: &str, text: &str) -> Result<()>;

    async fn device_identity(&self) -> Result<DeviceIdentity>;
}

/// Capture path used when WebDriverAgent cannot take a screenshot.
#[async_trait]
pub trait SecondaryCapture: Send + Sync {
    /// Raw PNG bytes.
    async fn screenshot(&self) -> Result<Vec<u8>>;
}

pub struct IosDevice {
    client: Arc<dyn IosClient>,
    secondary: Arc<dyn SecondaryCapture>,
    scale: f64,
}

impl IosDevice {
    /// Read the scale factor and build the adapter.
    pub async fn connect(
        client: Arc<dyn IosClient>,
        secondary: Arc<dyn SecondaryCapture>,
    ) -> Result<Self> {
        let scale = client.scale().await?;
        if !(scale.is_finite() && scale > 0.0) {
            return Err(LensError::sdk("ios", format!("invalid scale factor {scale}")));
        }
        info!(scale, "ios device attached");
        Ok(Self {
            client,
            secondary,
            scale,
        })
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    fn to_points(&self, p: Point) -> PointF {
        PointF {
            x: p.x as f64 / self.scale,
            y: p.y as f64 / self.scale,
        }
    }

    async fn primary_capture(&self) -> Result<DynamicImage> {
        let raw = self.client.screenshot().await?;
        capture::decode(&raw, "ios")
    }
}

#[async_trait]
impl DeviceAdapter for IosDevice {
    fn platform(&self) -> Platform {
        Platform::Ios
    }

    async fn screenshot(&self) -> Result<DynamicImage> {
        match self.primary_capture().await {
            Ok(img) => Ok(img),
            Err(e) => {
                warn!(error = %e, "WebDriverAgent capture failed, using secondary transport");
                let raw = self.secondary.screenshot().await?;
                capture::decode(&raw, "ios")
            }
        }
    }

    async fn dump_hierarchy(&self) -> Result<Value> {
        let source = self.client.source().await?;
        Ok(hierarchy::ios_source_to_json(&source, self.scale))
    }

    async fn dump_hierarchy_ext(&self) -> Result<HierarchySnapshot> {
        Ok(HierarchySnapshot {
            xml_hierarchy: None,
            json_hierarchy: self.dump_hierarchy().await?,
            activity: None,
            package_name: None,
            window_size: self.client.window_size().await?,
        })
    }

    async fn window_size(&self) -> Result<WindowSize> {
        self.client.window_size().await
    }

    fn locate(&self, locator: &Locator) -> Box<dyn UiElement> {
        Box::new(IosElement {
            client: Arc::clone(&self.client),
            query: resolve_ios(locator),
            locator: locator.clone(),
            scale: self.scale,
        })
    }

    async fn tap(&self, at: Point) -> Result<()> {
        self.client.tap(self.to_points(at)).await
    }

    async fn long_press(&self, at: Point, duration: Duration) -> Result<()> {
        self.client
            .touch_and_hold(self.to_points(at), duration)
            .await
    }

    async fn swipe(&self, from: Point, to: Point, duration: Duration) -> Result<()> {
        self.client
            .drag(self.to_points(from), self.to_points(to), duration)
            .await
    }

    async fn directional_swipe(&self, direction: SwipeDirection, scale: f64) -> Result<()> {
        // window size is already in points
        let size = self.client.window_size().await?;
        let (from, to) = gesture::directional_swipe_path(direction, scale, size)?;
        let pt = |p: Point| PointF {
            x: p.x as f64,
            y: p.y as f64,
        };
        self.client
            .drag(pt(from), pt(to), gesture::DIRECTIONAL_SWIPE_DURATION)
            .await
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        self.client.press_button(gesture::ios_button(key)?).await
    }

    async fn run_shell(&self, _command: &str, _timeout: Duration) -> Result<ShellOutput> {
        Err(LensError::unsupported("ios", "shell"))
    }

    async fn identity(&self) -> Result<DeviceIdentity> {
        self.client.device_identity().await
    }

    async fn app_current(&self) -> Result<ForegroundApp> {
        self.client.active_app().await
    }

    async fn app_start(&self, package: &str, _activity: Option<&str>) -> Result<()> {
        self.client.launch_app(package).await
    }
}

struct IosElement {
    client: Arc<dyn IosClient>,
    locator: Locator,
    query: WdaQuery,
    scale: f64,
}

impl IosElement {
    async fn find(&self) -> Result<Option<String>> {
        let ids = self
            .client
            .find_elements(self.query.using, &self.query.value)
            .await?;
        Ok(ids.into_iter().nth(self.query.instance))
    }

    async fn require(&self) -> Result<String> {
        self.find().await?.ok_or_else(|| not_found(&self.locator))
    }
}

#[async_trait]
impl UiElement for IosElement {
    fn locator(&self) -> &Locator {
        &self.locator
    }

    async fn exists(&self) -> Result<bool> {
        Ok(self.find().await?.is_some())
    }

    async fn info(&self) -> Result<ElementInfo> {
        let id = self.require().await?;
        let mut info = self.client.element_info(&id).await?;
        let b = info.bounds;
        let px = |v: i32| (v as f64 * self.scale).round() as i32;
        info.bounds = Rect {
            x: px(b.x),
            y: px(b.y),
            width: px(b.width),
            height: px(b.height),
        };
        Ok(info)
    }

    async fn set_text(&self, text: &str) -> Result<()> {
        let id = self.require().await?;
        self.client.element_clear(&id).await?;
        self.client.element_set_value(&id, text).await
    }

    async fn click(&self) -> Result<()> {
        let id = self.require().await?;
        self.client.element_click(&id).await
    }
}
