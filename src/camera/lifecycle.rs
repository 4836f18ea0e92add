//! # Camera Lifecycle Manager
//!
//! Owns at most one live stream and walks it through the states defined in
//! [`super::state`]. Every public operation turns into one state machine event;
//! the effects it yields (release the stream, open a new one) are carried out
//! here against the [`MediaHost`].
//!
//! ## Guarantees
//!
//! - After any device or orientation switch there is exactly one open stream:
//!   the old one is released before the new one is requested.
//! - `stop_stream` is idempotent and a no-op when nothing is live.
//! - Failed starts leave the manager `Idle`. Nothing is retried automatically.
//! - [`TeardownHandle::teardown`] releases the held stream right away, from any
//!   task. A stream that resolves after teardown is released immediately and
//!   never becomes live. Dropping the manager releases its stream.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::capture;
use super::state::{CameraEvent, CameraPhase, CameraState, Effect, transition};
use super::{
    CapturedFrame, DeviceDescriptor, DeviceKind, MediaHost, MediaStream, Orientation,
    ResolutionHint, RgbaFrame, Size, StreamRequest,
};
use crate::config::CameraConfig;
use crate::error::{ToolkitError, ToolkitResult};

/// The one stream a lifecycle holds, shared with its [`TeardownHandle`]s.
///
/// The lock is only held to move the stream in or out, never across an await.
#[derive(Clone, Default)]
struct StreamSlot(Arc<Mutex<Option<Box<dyn MediaStream>>>>);

impl StreamSlot {
    fn lock(&self) -> MutexGuard<'_, Option<Box<dyn MediaStream>>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_held(&self) -> bool {
        self.lock().is_some()
    }

    fn put(&self, stream: Box<dyn MediaStream>) {
        if let Some(mut previous) = self.lock().replace(stream) {
            previous.stop();
        }
    }

    fn take(&self) -> Option<Box<dyn MediaStream>> {
        self.lock().take()
    }

    fn release(&self) {
        if let Some(mut stream) = self.take() {
            debug!(device = %stream.device_id(), "Releasing camera stream");
            stream.stop();
        }
    }
}

/// Lets another task shut a [`CameraLifecycle`] down, even while a start is pending.
#[derive(Clone)]
pub struct TeardownHandle {
    token: CancellationToken,
    slot: StreamSlot,
}

impl std::fmt::Debug for TeardownHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeardownHandle")
            .field("torn_down", &self.is_torn_down())
            .finish()
    }
}

impl TeardownHandle {
    /// Refuse further operations and release the held stream now.
    pub fn teardown(&self) {
        self.token.cancel();
        self.slot.release();
    }

    pub fn is_torn_down(&self) -> bool {
        self.token.is_cancelled()
    }
}

pub struct CameraLifecycle {
    host: Arc<dyn MediaHost>,
    settings: CameraConfig,
    state: CameraState,
    stream: StreamSlot,
    devices: Vec<DeviceDescriptor>,
    selected: Option<String>,
    resolution_override: Option<ResolutionHint>,
    display_override: Option<Size>,
    teardown: CancellationToken,
}

impl CameraLifecycle {
    /// Fails with a config error when `settings` do not validate.
    pub fn new(host: Arc<dyn MediaHost>, settings: CameraConfig) -> ToolkitResult<Self> {
        settings
            .validate()
            .map_err(|reason| ToolkitError::config("camera", reason))?;
        let selected = settings.device_id.clone();
        Ok(Self {
            host,
            settings,
            state: CameraState::Idle,
            stream: StreamSlot::default(),
            devices: Vec::new(),
            selected,
            resolution_override: None,
            display_override: None,
            teardown: CancellationToken::new(),
        })
    }

    pub fn teardown_handle(&self) -> TeardownHandle {
        TeardownHandle {
            token: self.teardown.clone(),
            slot: self.stream.clone(),
        }
    }

    pub fn state(&self) -> &CameraState {
        &self.state
    }

    /// Current phase. `Idle` once torn down, even before the next operation.
    pub fn phase(&self) -> CameraPhase {
        if self.teardown.is_cancelled() {
            return CameraPhase::Idle;
        }
        self.state.phase()
    }

    /// Devices from the most recent enumeration.
    pub fn devices(&self) -> &[DeviceDescriptor] {
        &self.devices
    }

    pub fn selected_device(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn orientation(&self) -> Orientation {
        self.settings.orientation
    }

    /// Whether a stream is currently held.
    pub fn has_stream(&self) -> bool {
        self.stream.is_held()
    }

    /// Size of the preview box. Captures are written at exactly this size.
    pub fn display_size(&self) -> Size {
        self.display_override
            .unwrap_or_else(|| self.settings.display_size())
    }

    /// Record the measured size of the preview box.
    pub fn set_display_size(&mut self, size: Size) {
        self.display_override = Some(size);
    }

    /// Request permission and enumerate video inputs. Selects the first device
    /// when none is selected yet.
    pub async fn list_devices(&mut self) -> ToolkitResult<Vec<DeviceDescriptor>> {
        self.ensure_alive("list devices")?;
        self.host.request_permission().await?;

        let devices: Vec<DeviceDescriptor> = self
            .host
            .enumerate_devices()
            .await?
            .into_iter()
            .filter(|d| d.kind == DeviceKind::VideoInput)
            .collect();

        self.devices = devices.clone();
        if devices.is_empty() {
            return Err(ToolkitError::no_device_found().with_operation("list_devices"));
        }
        if self.selected.is_none() {
            self.selected = Some(devices[0].id.clone());
        }
        debug!(count = devices.len(), selected = ?self.selected, "Enumerated video inputs");
        Ok(devices)
    }

    /// Tear down any current stream, then open `device_id`.
    ///
    /// Without a `resolution` hint the ideal resolution for the current
    /// orientation is requested.
    pub async fn start_stream(
        &mut self,
        device_id: &str,
        resolution: Option<ResolutionHint>,
    ) -> ToolkitResult<()> {
        self.ensure_alive("start the stream")?;
        if resolution.is_some() {
            self.resolution_override = resolution;
        }
        self.selected = Some(device_id.to_string());
        let request = self.build_request(device_id.to_string());
        self.dispatch(CameraEvent::Start(request))
            .await
            .map_err(|e| e.with_operation("start_stream"))
    }

    /// Start the selected device, enumerating first if nothing is selected.
    pub async fn start(&mut self) -> ToolkitResult<()> {
        if self.selected.is_none() {
            self.list_devices().await?;
        }
        let device_id = self
            .selected
            .clone()
            .ok_or_else(ToolkitError::no_device_found)?;
        self.start_stream(&device_id, None).await
    }

    /// Release the stream. A no-op when nothing is live.
    pub fn stop_stream(&mut self) {
        let pending = self.apply(CameraEvent::Stop);
        debug_assert!(pending.is_empty());
    }

    /// Crop the current frame to the displayed aspect, encode it, release the
    /// stream and hold the still.
    pub async fn capture(&mut self) -> ToolkitResult<CapturedFrame> {
        self.ensure_alive("capture")?;
        self.ensure_phase(CameraPhase::Live, "capture")?;

        let (frame, device_id) = self.grab("capture").await?;

        let display = self.display_size();
        let format = self.settings.still_format;
        let quality = self.settings.jpeg_quality;
        let still = crate::run_blocking("capture", move || {
            capture::still_from_frame(&frame, display, format, quality, &device_id)
        })
        .await?;

        info!(
            device = %still.device_id,
            width = still.size.w,
            height = still.size.h,
            bytes = still.bytes.len(),
            "Captured still"
        );
        self.apply(CameraEvent::Captured(still.clone()));
        Ok(still)
    }

    /// Discard the captured still and restart the last device and orientation.
    pub async fn retake(&mut self) -> ToolkitResult<()> {
        self.ensure_alive("retake")?;
        self.ensure_phase(CameraPhase::Captured, "retake")?;
        let device_id = self
            .selected
            .clone()
            .ok_or_else(ToolkitError::no_device_found)?;
        let request = self.build_request(device_id);
        self.dispatch(CameraEvent::Retake(request)).await
    }

    /// Select another device. Restarts the stream when one is live.
    pub async fn select_device(&mut self, device_id: &str) -> ToolkitResult<()> {
        self.ensure_alive("switch camera")?;
        if !self.devices.is_empty() && !self.devices.iter().any(|d| d.id == device_id) {
            return Err(ToolkitError::device_not_found(device_id));
        }
        self.selected = Some(device_id.to_string());
        let request = self.build_request(device_id.to_string());
        self.dispatch(CameraEvent::Reconfigure(request)).await
    }

    /// Change orientation. Restarts the stream when one is live.
    pub async fn set_orientation(&mut self, orientation: Orientation) -> ToolkitResult<()> {
        self.ensure_alive("change orientation")?;
        if orientation == self.settings.orientation {
            return Ok(());
        }
        self.settings.orientation = orientation;
        self.resolution_override = None;
        self.display_override = None;
        match self.selected.clone() {
            Some(device_id) => {
                let request = self.build_request(device_id);
                self.dispatch(CameraEvent::Reconfigure(request)).await
            }
            None => Ok(()),
        }
    }

    /// Current raw frame from the live stream.
    pub async fn preview_frame(&mut self) -> ToolkitResult<RgbaFrame> {
        self.ensure_alive("read a frame")?;
        self.ensure_phase(CameraPhase::Live, "read a frame")?;
        let (frame, _) = self.grab("read a frame").await?;
        Ok(frame)
    }

    /// Unconditional cleanup. The manager refuses further operations.
    pub fn shutdown(&mut self) {
        self.teardown.cancel();
        self.apply(CameraEvent::Teardown);
    }

    fn build_request(&self, device_id: String) -> StreamRequest {
        let resolution = self.resolution_override.unwrap_or_else(|| {
            let ideal = self.settings.orientation.ideal_resolution();
            if self.settings.exact_resolution {
                ResolutionHint::Exact(ideal)
            } else {
                ResolutionHint::Ideal(ideal)
            }
        });
        StreamRequest {
            device_id,
            resolution,
            orientation: self.settings.orientation,
        }
    }

    /// Read one frame. The stream leaves the slot for the await and goes back
    /// only if no teardown happened meanwhile.
    async fn grab(&mut self, operation: &str) -> ToolkitResult<(RgbaFrame, String)> {
        let mut stream = self
            .stream
            .take()
            .ok_or_else(|| ToolkitError::invalid_state("without a stream", operation))?;
        let frame = stream.grab_frame().await;
        let device_id = stream.device_id().to_string();
        self.stream.put(stream);
        if self.teardown.is_cancelled() {
            self.stream.release();
            self.apply(CameraEvent::Teardown);
            return Err(ToolkitError::invalid_state("shut down", operation));
        }
        Ok((frame?, device_id))
    }

    fn ensure_alive(&mut self, operation: &str) -> ToolkitResult<()> {
        if self.teardown.is_cancelled() {
            self.apply(CameraEvent::Teardown);
            return Err(ToolkitError::invalid_state("shut down", operation));
        }
        Ok(())
    }

    fn ensure_phase(&self, expected: CameraPhase, operation: &str) -> ToolkitResult<()> {
        let phase = self.phase();
        if phase != expected {
            return Err(ToolkitError::invalid_state(phase.to_string(), operation));
        }
        Ok(())
    }

    /// Run one event through the state machine and carry out every effect,
    /// feeding stream outcomes back in as follow-up events.
    async fn dispatch(&mut self, event: CameraEvent) -> ToolkitResult<()> {
        let mut pending = self.apply(event);
        let mut outcome = Ok(());

        while let Some(request) = pending.pop() {
            let follow_up = match self.open(&request).await {
                Ok(()) => CameraEvent::StreamOpened,
                Err(error) => {
                    warn!(device = %request.device_id, error = %error, "Camera stream failed to start");
                    outcome = Err(error);
                    CameraEvent::StreamFailed
                }
            };
            pending.extend(self.apply(follow_up));
        }

        outcome
    }

    /// Apply an event and perform release effects. Returns the stream requests
    /// still to be opened.
    fn apply(&mut self, event: CameraEvent) -> Vec<StreamRequest> {
        let from = self.state.phase();
        let (next, effects) = transition(std::mem::take(&mut self.state), event);
        self.state = next;
        if from != self.state.phase() {
            debug!(from = %from, to = %self.state.phase(), "Camera state changed");
        }

        let mut opens = Vec::new();
        for effect in effects {
            match effect {
                Effect::ReleaseStream => self.release_stream(),
                Effect::OpenStream(request) => opens.push(request),
            }
        }
        opens
    }

    async fn open(&mut self, request: &StreamRequest) -> ToolkitResult<()> {
        info!(
            device = %request.device_id,
            orientation = %request.orientation,
            resolution = ?request.resolution,
            "Opening camera stream"
        );
        let stream = self.host.open_stream(request).await?;
        let native = stream.native_size();

        // Publish first, then check: a teardown racing with this either sees the
        // stream in the slot or is seen here.
        self.stream.put(stream);
        if self.teardown.is_cancelled() {
            self.stream.release();
            return Err(ToolkitError::invalid_state("shut down", "start the stream")
                .with_context("stream resolved after teardown and was released"));
        }

        debug!(width = native.w, height = native.h, "Camera stream live");
        Ok(())
    }

    fn release_stream(&mut self) {
        self.stream.release();
    }
}

impl Drop for CameraLifecycle {
    fn drop(&mut self) {
        self.release_stream();
    }
}
