//! Production [`Connector`]: adb for Android, WebDriverAgent for iOS.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use uilens_core::{Platform, Result};

use crate::adapter::{DeviceAdapter, SHELL_TIMEOUT};
use crate::adb::AdbClient;
use crate::android::{AndroidDevice, AndroidSettings};
use crate::idevice::IdeviceCapture;
use crate::ios::{IosClient, IosDevice};
use crate::registry::Connector;
use crate::wda::WdaClient;

/// Tool locations and limits for new sessions.
#[derive(Debug, Clone)]
pub struct DeviceSettings {
    pub adb_path: String,
    /// WebDriverAgent URL for iOS sessions with an empty address.
    pub wda_usb_url: String,
    pub idevicescreenshot_path: String,
    pub fallback_to_blank_screenshot: bool,
    pub shell_timeout: Duration,
    /// Limit for every other tool invocation or HTTP request.
    pub command_timeout: Duration,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            adb_path: "adb".into(),
            wda_usb_url: "http://127.0.0.1:8100".into(),
            idevicescreenshot_path: "idevicescreenshot".into(),
            fallback_to_blank_screenshot: true,
            shell_timeout: SHELL_TIMEOUT,
            command_timeout: Duration::from_secs(30),
        }
    }
}

pub struct SdkConnector {
    settings: DeviceSettings,
}

impl SdkConnector {
    pub fn new(settings: DeviceSettings) -> Self {
        Self { settings }
    }

    /// Turn a session address into a WebDriverAgent URL.
    fn wda_url(&self, address: &str) -> String {
        if address.is_empty() {
            self.settings.wda_usb_url.clone()
        } else if address.starts_with("http://") || address.starts_with("https://") {
            address.to_string()
        } else {
            format!("http://{address}")
        }
    }
}

#[async_trait]
impl Connector for SdkConnector {
    async fn connect(&self, platform: Platform, address: &str) -> Result<Arc<dyn DeviceAdapter>> {
        match platform {
            Platform::Android => {
                let client =
                    AdbClient::connect(&self.settings.adb_path, address, self.settings.command_timeout)
                        .await?;
                let settings = AndroidSettings {
                    fallback_to_blank_screenshot: self.settings.fallback_to_blank_screenshot,
                    shell_timeout: self.settings.shell_timeout,
                };
                Ok(Arc::new(AndroidDevice::new(Arc::new(client), settings)))
            }
            Platform::Ios => {
                let url = self.wda_url(address);
                debug!(%url, "connecting to WebDriverAgent");
                let client = Arc::new(WdaClient::connect(&url, self.settings.command_timeout).await?);
                let udid = client.device_identity().await.ok().map(|i| i.udid);
                let secondary = IdeviceCapture::new(
                    self.settings.idevicescreenshot_path.clone(),
                    udid,
                    self.settings.command_timeout,
                );
                let device = IosDevice::connect(client, Arc::new(secondary)).await?;
                Ok(Arc::new(device))
            }
        }
    }
}
