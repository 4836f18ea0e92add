//! # Capture Session
//!
//! The camera tool end to end: a [`CameraLifecycle`] for the stream, an
//! [`ObjectUrlRegistry`] for the preview of the captured still, and the
//! delivery paths (download, share, copy) the host supports.
//!
//! ## Architecture
//!
//! 1. **CaptureSessionBuilder**: fluent configuration of host, camera settings
//!    and capabilities
//! 2. **CaptureSession**: drives open, capture, retake and close, keeping the
//!    preview URL in step with the captured still
//!
//! Delivery that the host cannot perform fails with `UnsupportedFeature`
//! instead of being attempted.

// Standard library imports
use std::path::{Path, PathBuf};
use std::sync::Arc;

// External crate imports
use tracing::info;

// Internal module imports
use crate::camera::{CameraLifecycle, CapturedFrame, MediaHost};
use crate::capability::Capabilities;
use crate::config::CameraConfig;
use crate::error::{ToolkitError, ToolkitResult};
use crate::export::{Asset, ObjectUrlRegistry, SharePayload};

pub const SHARE_TITLE: &str = "Image from Media Toolkit";
pub const SHARE_TEXT: &str = "Check out this image I captured!";

pub struct CaptureSession {
    lifecycle: CameraLifecycle,
    capabilities: Capabilities,
    urls: ObjectUrlRegistry,
    preview_url: Option<String>,
    captured: Option<CapturedFrame>,
}

impl CaptureSession {
    pub fn builder() -> CaptureSessionBuilder {
        CaptureSessionBuilder::new()
    }

    pub fn lifecycle(&self) -> &CameraLifecycle {
        &self.lifecycle
    }

    pub fn lifecycle_mut(&mut self) -> &mut CameraLifecycle {
        &mut self.lifecycle
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Enumerate devices and start the selected (or first) one.
    pub async fn open(&mut self) -> ToolkitResult<()> {
        self.lifecycle.list_devices().await?;
        self.lifecycle.start().await
    }

    /// Capture a still and return the object URL of its preview.
    pub async fn capture(&mut self) -> ToolkitResult<String> {
        let still = self.lifecycle.capture().await?;
        let url = self
            .urls
            .replace(self.preview_url.as_deref(), Asset::from_capture(&still));
        self.preview_url = Some(url.clone());
        self.captured = Some(still);
        Ok(url)
    }

    pub fn captured(&self) -> Option<&CapturedFrame> {
        self.captured.as_ref()
    }

    pub fn preview_url(&self) -> Option<&str> {
        self.preview_url.as_deref()
    }

    pub fn resolve(&self, url: &str) -> Option<&Asset> {
        self.urls.resolve(url)
    }

    /// Drop the still, revoke its preview URL and go live again.
    pub async fn retake(&mut self) -> ToolkitResult<()> {
        self.release_preview();
        self.lifecycle.retake().await
    }

    /// Write the captured still into `dir`.
    pub async fn download(&self, dir: &Path) -> ToolkitResult<PathBuf> {
        let asset = self.captured_asset("download")?;
        let path = asset.save_to(dir).await?;
        info!(path = %path.display(), "Downloaded capture");
        Ok(path)
    }

    /// Hand the captured still to the host's share target.
    pub async fn share(&self) -> ToolkitResult<String> {
        let target = self
            .capabilities
            .share_target()
            .ok_or_else(|| ToolkitError::unsupported_feature("Sharing"))?;
        let asset = self.captured_asset("share")?;
        let payload = SharePayload {
            title: SHARE_TITLE.to_string(),
            text: SHARE_TEXT.to_string(),
        };
        target.share(&asset, &payload).await
    }

    /// Copy the preview URL of the captured still to the clipboard.
    pub async fn copy_preview_url(&self) -> ToolkitResult<()> {
        let clipboard = self
            .capabilities
            .clipboard()
            .ok_or_else(|| ToolkitError::unsupported_feature("Clipboard"))?;
        let url = self
            .preview_url
            .as_deref()
            .ok_or_else(|| ToolkitError::invalid_state(self.lifecycle.phase().to_string(), "copy"))?;
        clipboard.write_text(url).await
    }

    /// Release the stream and every URL this session issued.
    pub fn close(&mut self) {
        self.lifecycle.shutdown();
        self.preview_url = None;
        self.captured = None;
        self.urls.revoke_all();
    }

    fn captured_asset(&self, operation: &str) -> ToolkitResult<Asset> {
        self.captured
            .as_ref()
            .map(Asset::from_capture)
            .ok_or_else(|| ToolkitError::invalid_state(self.lifecycle.phase().to_string(), operation))
    }

    fn release_preview(&mut self) {
        if let Some(url) = self.preview_url.take() {
            self.urls.revoke(&url);
        }
        self.captured = None;
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Builder for [`CaptureSession`].
#[derive(Default)]
pub struct CaptureSessionBuilder {
    host: Option<Arc<dyn MediaHost>>,
    camera: CameraConfig,
    capabilities: Capabilities,
}

impl CaptureSessionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: Arc<dyn MediaHost>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn with_camera_config(mut self, camera: CameraConfig) -> Self {
        self.camera = camera;
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn build(self) -> ToolkitResult<CaptureSession> {
        let host = self
            .host
            .ok_or_else(|| ToolkitError::config("host", "No media host specified"))?;

        Ok(CaptureSession {
            lifecycle: CameraLifecycle::new(host, self.camera)?,
            capabilities: self.capabilities,
            urls: ObjectUrlRegistry::new(),
            preview_url: None,
            captured: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraPhase;
    use crate::camera::synthetic::SyntheticHost;

    fn session(capabilities: Capabilities) -> CaptureSession {
        CaptureSession::builder()
            .with_host(Arc::new(SyntheticHost::single()))
            .with_capabilities(capabilities)
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_requires_host() {
        let err = CaptureSession::builder().build().err().unwrap();
        assert_eq!(err.category(), "config");
    }

    #[tokio::test]
    async fn test_capture_retake_cycles_preview_url() {
        let mut session = session(Capabilities::default());
        session.open().await.unwrap();

        let first = session.capture().await.unwrap();
        assert_eq!(session.lifecycle().phase(), CameraPhase::Captured);
        assert!(session.resolve(&first).is_some());

        session.retake().await.unwrap();
        assert_eq!(session.lifecycle().phase(), CameraPhase::Live);
        assert!(session.resolve(&first).is_none());
        assert!(session.captured().is_none());

        let second = session.capture().await.unwrap();
        assert_ne!(first, second);
        session.close();
        assert!(session.resolve(&second).is_none());
        assert_eq!(session.lifecycle().phase(), CameraPhase::Idle);
    }

    #[tokio::test]
    async fn test_share_without_capability_is_unsupported() {
        let mut session = session(Capabilities::default());
        session.open().await.unwrap();
        session.capture().await.unwrap();

        let err = session.share().await.unwrap_err();
        assert_eq!(err.category(), "unsupported_feature");
        let err = session.copy_preview_url().await.unwrap_err();
        assert_eq!(err.category(), "unsupported_feature");
    }

    #[tokio::test]
    async fn test_share_and_download_into_directories() {
        let dir = tempfile::tempdir().unwrap();
        let capabilities = Capabilities {
            share_dir: Some(dir.path().join("shared")),
            ..Capabilities::default()
        };
        let mut session = session(capabilities);
        session.open().await.unwrap();

        let err = session.download(dir.path()).await.unwrap_err();
        assert_eq!(err.category(), "invalid_state");

        session.capture().await.unwrap();
        let saved = session.download(dir.path()).await.unwrap();
        assert!(saved.file_name().unwrap().to_string_lossy().starts_with("capture-"));

        let shared = session.share().await.unwrap();
        assert!(std::path::Path::new(&shared).exists());
    }
}
