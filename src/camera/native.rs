//! Webcam host backed by nokhwa.
//!
//! nokhwa cameras are blocking and not always `Send`, so each open stream lives
//! on its own worker thread. The stream handle talks to the worker over a
//! command channel; dropping the handle closes the channel and the worker
//! stops the device.

use std::thread;

use async_trait::async_trait;
use nokhwa::Camera;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::{
    DeviceDescriptor, MediaHost, MediaStream, ResolutionHint, RgbaFrame, Size, StreamRequest,
};
use crate::error::{ToolkitError, ToolkitResult};

const TARGET_FPS: u32 = 30;

/// Host for locally attached cameras.
#[derive(Debug, Default, Clone)]
pub struct NativeHost;

impl NativeHost {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MediaHost for NativeHost {
    async fn request_permission(&self) -> ToolkitResult<()> {
        // Enumeration is the first call that touches the device layer; a
        // refusal there is the permission failure.
        query_devices().await.map(|_| ())
    }

    async fn enumerate_devices(&self) -> ToolkitResult<Vec<DeviceDescriptor>> {
        query_devices().await
    }

    async fn open_stream(&self, request: &StreamRequest) -> ToolkitResult<Box<dyn MediaStream>> {
        let index = parse_index(&request.device_id)?;
        let resolution = request.resolution;
        let device_id = request.device_id.clone();

        let (ready_tx, ready_rx) = oneshot::channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let worker_device = device_id.clone();
        thread::Builder::new()
            .name(format!("camera-{}", device_id))
            .spawn(move || worker(worker_device, index, resolution, ready_tx, command_rx))
            .map_err(|e| ToolkitError::io("spawn camera worker", e))?;

        let size = ready_rx
            .await
            .map_err(|_| ToolkitError::device_busy(device_id.as_str()))??;

        debug!(device = %device_id, width = size.w, height = size.h, "Native stream opened");
        Ok(Box::new(NativeStream {
            device_id,
            size,
            commands: command_tx,
            active: true,
        }))
    }
}

async fn query_devices() -> ToolkitResult<Vec<DeviceDescriptor>> {
    let cameras = crate::run_blocking("query cameras", || {
        nokhwa::query(ApiBackend::Auto).map_err(|e| classify_query_error(&e.to_string()))
    })
    .await?;

    Ok(cameras
        .iter()
        .map(|info| DeviceDescriptor::video(info.index().to_string(), info.human_name()))
        .collect())
}

fn parse_index(device_id: &str) -> ToolkitResult<CameraIndex> {
    if device_id.trim().is_empty() {
        return Err(ToolkitError::device_not_found(device_id));
    }
    let raw = device_id.strip_prefix("/dev/video").unwrap_or(device_id);
    Ok(match raw.parse::<u32>() {
        Ok(i) => CameraIndex::Index(i),
        Err(_) => CameraIndex::String(device_id.to_string()),
    })
}

fn classify_query_error(message: &str) -> ToolkitError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("authoriz") {
        ToolkitError::permission_denied().with_context(message.to_string())
    } else {
        ToolkitError::no_device_found().with_context(message.to_string())
    }
}

fn classify_open_error(device_id: &str, resolution: ResolutionHint, message: &str) -> ToolkitError {
    let lower = message.to_ascii_lowercase();
    let error = if lower.contains("permission") || lower.contains("denied") {
        ToolkitError::permission_denied()
    } else if lower.contains("busy") || lower.contains("in use") {
        ToolkitError::device_busy(device_id)
    } else if matches!(resolution, ResolutionHint::Exact(_))
        && (lower.contains("format") || lower.contains("resolution"))
    {
        let size = resolution.size();
        ToolkitError::unsupported_constraint(format!("resolution {}x{}", size.w, size.h))
    } else {
        ToolkitError::device_not_found(device_id)
    };
    error.with_context(message.to_string())
}

fn requested_format(resolution: ResolutionHint) -> RequestedFormat<'static> {
    let size = resolution.size();
    let format = CameraFormat::new(Resolution::new(size.w, size.h), FrameFormat::MJPEG, TARGET_FPS);
    match resolution {
        ResolutionHint::Ideal(_) => RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(format)),
        ResolutionHint::Exact(_) => RequestedFormat::new::<RgbFormat>(RequestedFormatType::Exact(format)),
    }
}

enum Command {
    Grab(oneshot::Sender<ToolkitResult<RgbaFrame>>),
    Stop,
}

fn worker(
    device_id: String,
    index: CameraIndex,
    resolution: ResolutionHint,
    ready: oneshot::Sender<ToolkitResult<Size>>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let mut camera = match Camera::new(index, requested_format(resolution)) {
        Ok(camera) => camera,
        Err(e) => {
            let _ = ready.send(Err(classify_open_error(&device_id, resolution, &e.to_string())));
            return;
        }
    };

    if let Err(e) = camera.open_stream() {
        let _ = ready.send(Err(classify_open_error(&device_id, resolution, &e.to_string())));
        return;
    }

    let res = camera.resolution();
    if ready.send(Ok(Size::new(res.width(), res.height()))).is_err() {
        // Requester went away before the stream resolved.
        let _ = camera.stop_stream();
        return;
    }

    while let Some(command) = commands.blocking_recv() {
        match command {
            Command::Grab(reply) => {
                let _ = reply.send(grab(&mut camera));
            }
            Command::Stop => break,
        }
    }

    if let Err(e) = camera.stop_stream() {
        warn!(device = %device_id, error = %e, "Failed to stop camera stream");
    }
}

fn grab(camera: &mut Camera) -> ToolkitResult<RgbaFrame> {
    let buffer = camera
        .frame()
        .map_err(|e| ToolkitError::decode_failed(format!("Could not read a camera frame: {}", e)))?;
    let decoded = buffer
        .decode_image::<RgbFormat>()
        .map_err(|e| ToolkitError::decode_failed(format!("Could not decode a camera frame: {}", e)))?;

    let size = Size::new(decoded.width(), decoded.height());
    let rgb = decoded.into_raw();
    let mut rgba = Vec::with_capacity(size.rgba_len());
    for px in rgb.chunks_exact(3) {
        rgba.extend_from_slice(&[px[0], px[1], px[2], 255]);
    }
    Ok(RgbaFrame::new(size, rgba))
}

struct NativeStream {
    device_id: String,
    size: Size,
    commands: mpsc::UnboundedSender<Command>,
    active: bool,
}

#[async_trait]
impl MediaStream for NativeStream {
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
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Grab(reply_tx))
            .map_err(|_| ToolkitError::device_busy(self.device_id.as_str()))?;
        reply_rx
            .await
            .map_err(|_| ToolkitError::device_busy(self.device_id.as_str()))?
    }

    fn stop(&mut self) {
        if self.active {
            self.active = false;
            let _ = self.commands.send(Command::Stop);
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for NativeStream {
    fn drop(&mut self) {
        self.stop();
    }
}
