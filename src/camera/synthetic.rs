//! In-process camera host.
//!
//! Serves generated frames (or a fixed scene image) without touching hardware.
//! Used for tests and for running the CLI on machines without a webcam. Failure
//! modes (denied permission, busy device, unsupported exact resolution) can be
//! switched on so callers see the same errors a real host produces.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use fast_image_resize::Resizer;
use tracing::debug;

use super::capture::crop_to_display;
use super::{
    DeviceDescriptor, MediaHost, MediaStream, Orientation, ResolutionHint, RgbaFrame, Size,
    StreamRequest,
};
use crate::error::{ToolkitError, ToolkitResult};

/// Counters shared between a host and every stream it opened.
#[derive(Debug, Default)]
pub struct StreamStats {
    opened: AtomicUsize,
    active: AtomicUsize,
}

impl StreamStats {
    /// Streams opened over the host's lifetime.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Streams currently open.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
struct SyntheticDevice {
    descriptor: DeviceDescriptor,
    sensor: Size,
}

pub struct SyntheticHost {
    devices: Vec<SyntheticDevice>,
    permission: AtomicBool,
    busy: HashSet<String>,
    max_resolution: Size,
    scene: Option<Arc<image::RgbaImage>>,
    open_delay: Option<Duration>,
    stats: Arc<StreamStats>,
}

impl Default for SyntheticHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntheticHost {
    /// Host with no devices.
    pub fn new() -> Self {
        Self {
            devices: Vec::new(),
            permission: AtomicBool::new(true),
            busy: HashSet::new(),
            max_resolution: Size::new(3840, 2160),
            scene: None,
            open_delay: None,
            stats: Arc::new(StreamStats::default()),
        }
    }

    /// Host with one 1920x1080 device named `synthetic-0`.
    pub fn single() -> Self {
        Self::new().with_device("synthetic-0", "Synthetic Camera", Size::new(1920, 1080))
    }

    pub fn with_device(mut self, id: &str, label: &str, sensor: Size) -> Self {
        self.devices.push(SyntheticDevice {
            descriptor: DeviceDescriptor::video(id, label),
            sensor,
        });
        self
    }

    pub fn deny_permission(self) -> Self {
        self.permission.store(false, Ordering::SeqCst);
        self
    }

    /// Mark a device as held by another application.
    pub fn with_busy(mut self, id: &str) -> Self {
        self.busy.insert(id.to_string());
        self
    }

    /// Largest size accepted for exact resolution requests.
    pub fn with_max_resolution(mut self, size: Size) -> Self {
        self.max_resolution = size;
        self
    }

    /// Serve this image (center-cropped to the stream size) instead of a gradient.
    pub fn with_scene(mut self, scene: image::RgbaImage) -> Self {
        self.scene = Some(Arc::new(scene));
        self
    }

    /// Delay every stream open, to exercise teardown during a pending start.
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }

    pub fn stats(&self) -> Arc<StreamStats> {
        Arc::clone(&self.stats)
    }

    fn render(&self, size: Size) -> ToolkitResult<Bytes> {
        match &self.scene {
            Some(scene) => {
                let source = RgbaFrame::new(
                    Size::new(scene.width(), scene.height()),
                    scene.as_raw().clone(),
                );
                let mut resizer = Resizer::new();
                Ok(crop_to_display(&mut resizer, &source, size)?.data)
            }
            None => Ok(Bytes::from(gradient(size))),
        }
    }
}

/// Horizontal red ramp, vertical green ramp, constant blue.
fn gradient(size: Size) -> Vec<u8> {
    let mut data = Vec::with_capacity(size.rgba_len());
    for y in 0..size.h {
        for x in 0..size.w {
            let r = ((x as f32 / size.w as f32) * 255.0) as u8;
            let g = ((y as f32 / size.h as f32) * 255.0) as u8;
            data.extend_from_slice(&[r, g, 128, 255]);
        }
    }
    data
}

#[async_trait]
impl MediaHost for SyntheticHost {
    async fn request_permission(&self) -> ToolkitResult<()> {
        if self.permission.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ToolkitError::permission_denied())
        }
    }

    async fn enumerate_devices(&self) -> ToolkitResult<Vec<DeviceDescriptor>> {
        Ok(self.devices.iter().map(|d| d.descriptor.clone()).collect())
    }

    async fn open_stream(&self, request: &StreamRequest) -> ToolkitResult<Box<dyn MediaStream>> {
        self.request_permission().await?;

        let device = self
            .devices
            .iter()
            .find(|d| d.descriptor.id == request.device_id)
            .ok_or_else(|| ToolkitError::device_not_found(request.device_id.as_str()))?;

        if self.busy.contains(&request.device_id) {
            return Err(ToolkitError::device_busy(request.device_id.as_str()));
        }

        let size = match request.resolution {
            ResolutionHint::Exact(size) => {
                if size.w > self.max_resolution.w || size.h > self.max_resolution.h {
                    return Err(ToolkitError::unsupported_constraint(format!(
                        "resolution {}x{}",
                        size.w, size.h
                    )));
                }
                size
            }
            // Devices held upright deliver portrait frames.
            ResolutionHint::Ideal(_) => match request.orientation {
                Orientation::Portrait if device.sensor.w > device.sensor.h => {
                    Size::new(device.sensor.h, device.sensor.w)
                }
                _ => device.sensor,
            },
        };

        if let Some(delay) = self.open_delay {
            tokio::time::sleep(delay).await;
        }

        let frame = self.render(size)?;
        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        self.stats.active.fetch_add(1, Ordering::SeqCst);
        debug!(device = %request.device_id, width = size.w, height = size.h, "Synthetic stream opened");

        Ok(Box::new(SyntheticStream {
            device_id: request.device_id.clone(),
            size,
            frame,
            active: true,
            stats: Arc::clone(&self.stats),
        }))
    }
}

struct SyntheticStream {
    device_id: String,
    size: Size,
    frame: Bytes,
    active: bool,
    stats: Arc<StreamStats>,
}

#[async_trait]
impl MediaStream for SyntheticStream {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn native_size(&self) -> Size {
        self.size
    }

    async fn grab_frame(&mut self) -> ToolkitResult<RgbaFrame> {
        if !self.active {
            return Err(ToolkitError::invalid_state("stopped", "read a frame"));
        }
        Ok(RgbaFrame::new(self.size, self.frame.clone()))
    }

    fn stop(&mut self) {
        if self.active {
            self.active = false;
            self.stats.active.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for SyntheticStream {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: &str, resolution: ResolutionHint) -> StreamRequest {
        StreamRequest {
            device_id: id.to_string(),
            resolution,
            orientation: Orientation::Landscape,
        }
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let host = SyntheticHost::single();
        let stats = host.stats();
        let mut stream = host
            .open_stream(&request("synthetic-0", ResolutionHint::Ideal(Size::new(1920, 1080))))
            .await
            .unwrap();
        assert_eq!(stats.active(), 1);
        stream.stop();
        stream.stop();
        assert_eq!(stats.active(), 0);
        assert!(stream.grab_frame().await.is_err());
    }

    #[tokio::test]
    async fn test_exact_over_max_is_unsupported() {
        let host = SyntheticHost::single().with_max_resolution(Size::new(1280, 720));
        let err = host
            .open_stream(&request("synthetic-0", ResolutionHint::Exact(Size::new(1920, 1080))))
            .await
            .err()
            .unwrap();
        assert_eq!(err.category(), "unsupported_constraint");
    }

    #[tokio::test]
    async fn test_portrait_ideal_rotates_sensor() {
        let host = SyntheticHost::single();
        let mut req = request("synthetic-0", ResolutionHint::Ideal(Size::new(1080, 1920)));
        req.orientation = Orientation::Portrait;
        let stream = host.open_stream(&req).await.unwrap();
        assert_eq!(stream.native_size(), Size::new(1080, 1920));
    }
}
