//! Secondary iOS capture through libimobiledevice's `idevicescreenshot`.

use async_trait::async_trait;
use std::time::Duration;

use uilens_core::{LensError, Result};

use crate::ios::SecondaryCapture;

pub struct IdeviceCapture {
    tool_path: String,
    /// Target device; `None` lets the tool pick the only attached device.
    udid: Option<String>,
    timeout: Duration,
}

impl IdeviceCapture {
    pub fn new(tool_path: impl Into<String>, udid: Option<String>, timeout: Duration) -> Self {
        Self {
            tool_path: tool_path.into(),
            udid: udid.filter(|u| !u.is_empty()),
            timeout,
        }
    }

    async fn run(&self, args: &[&str]) -> Result<()> {
        let output = tokio::time::timeout(
            self.timeout,
            tokio::process::Command::new(&self.tool_path)
                .args(args)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| LensError::CommandTimeout {
            command: self.tool_path.clone(),
            secs: self.timeout.as_secs(),
        })?
        .map_err(|e| LensError::sdk("ios", format!("{} failed: {e}", self.tool_path)))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(LensError::sdk(
                "ios",
                format!("{} error: {}", self.tool_path, stderr.trim()),
            ))
        }
    }
}

#[async_trait]
impl SecondaryCapture for IdeviceCapture {
    async fn screenshot(&self) -> Result<Vec<u8>> {
        // removed when `tmp` drops
        let tmp = tempfile::Builder::new()
            .prefix("uilens_ios_")
            .suffix(".png")
            .tempfile()?;
        let tmp_arg = tmp.path().to_string_lossy().to_string();

        let mut args: Vec<&str> = Vec::new();
        if let Some(udid) = self.udid.as_deref() {
            args.extend(["-u", udid]);
        }
        args.push(&tmp_arg);
        self.run(&args).await?;

        Ok(tokio::fs::read(tmp.path()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_tool_is_sdk_error() {
        let capture = IdeviceCapture::new(
            "/nonexistent/idevicescreenshot",
            Some(String::new()),
            Duration::from_secs(5),
        );
        assert!(capture.udid.is_none());
        assert!(matches!(
            capture.screenshot().await,
            Err(LensError::Sdk { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_capture_reads_and_removes_temp_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("idevicescreenshot");
        let seen = dir.path().join("seen");
        // records the target path, then writes the "image" into it
        let script = format!(
            "#!/bin/sh\necho \"$3\" > '{}'\nprintf PNGDATA > \"$3\"\n",
            seen.display()
        );
        std::fs::write(&tool, script).unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

        let capture = IdeviceCapture::new(
            tool.display().to_string(),
            Some("00008030-TEST".into()),
            Duration::from_secs(5),
        );
        assert_eq!(capture.screenshot().await.unwrap(), b"PNGDATA");

        let target = std::fs::read_to_string(&seen).unwrap();
        let target = std::path::Path::new(target.trim());
        assert!(target.to_string_lossy().ends_with(".png"));
        assert!(!target.exists());
    }
}
