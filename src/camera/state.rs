//! Pure camera lifecycle state machine.
//!
//! `transition` never touches a device. It returns the next state plus the
//! effects the caller must carry out, in order. Events that make no sense in
//! the current state leave it unchanged and produce no effects.

use std::fmt;

use super::{CapturedFrame, StreamRequest};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CameraState {
    /// No stream and no captured frame.
    #[default]
    Idle,
    /// A stream has been requested and has not resolved yet.
    Starting { request: StreamRequest },
    /// A stream is open and delivering frames.
    Live { request: StreamRequest },
    /// A still was taken; the stream has been released.
    Captured {
        request: StreamRequest,
        frame: CapturedFrame,
    },
}

/// State without payload, for logging and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraPhase {
    Idle,
    Starting,
    Live,
    Captured,
}

impl fmt::Display for CameraPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CameraPhase::Idle => "idle",
            CameraPhase::Starting => "starting",
            CameraPhase::Live => "live",
            CameraPhase::Captured => "showing a captured frame",
        };
        f.write_str(name)
    }
}

impl CameraState {
    pub fn phase(&self) -> CameraPhase {
        match self {
            CameraState::Idle => CameraPhase::Idle,
            CameraState::Starting { .. } => CameraPhase::Starting,
            CameraState::Live { .. } => CameraPhase::Live,
            CameraState::Captured { .. } => CameraPhase::Captured,
        }
    }

    pub fn request(&self) -> Option<&StreamRequest> {
        match self {
            CameraState::Idle => None,
            CameraState::Starting { request }
            | CameraState::Live { request }
            | CameraState::Captured { request, .. } => Some(request),
        }
    }

    pub fn captured(&self) -> Option<&CapturedFrame> {
        match self {
            CameraState::Captured { frame, .. } => Some(frame),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraEvent {
    /// Open a stream, replacing whatever is there.
    Start(StreamRequest),
    /// The pending stream request resolved.
    StreamOpened,
    /// The pending stream request failed or was abandoned.
    StreamFailed,
    /// Device or orientation changed. Restarts only while live or starting.
    Reconfigure(StreamRequest),
    Stop,
    Captured(CapturedFrame),
    /// Discard the captured frame and start again.
    Retake(StreamRequest),
    /// Unconditional cleanup.
    Teardown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Stop and drop the current stream, if any.
    ReleaseStream,
    /// Ask the host for a new stream.
    OpenStream(StreamRequest),
}

pub fn transition(state: CameraState, event: CameraEvent) -> (CameraState, Vec<Effect>) {
    use CameraEvent as E;
    use CameraState as S;

    match (state, event) {
        (_, E::Start(request)) => (
            S::Starting {
                request: request.clone(),
            },
            vec![Effect::ReleaseStream, Effect::OpenStream(request)],
        ),

        (S::Starting { request }, E::StreamOpened) => (S::Live { request }, vec![]),
        (S::Starting { .. }, E::StreamFailed) => (S::Idle, vec![Effect::ReleaseStream]),

        (S::Live { .. } | S::Starting { .. }, E::Reconfigure(request)) => (
            S::Starting {
                request: request.clone(),
            },
            vec![Effect::ReleaseStream, Effect::OpenStream(request)],
        ),

        (S::Live { .. } | S::Starting { .. }, E::Stop) => (S::Idle, vec![Effect::ReleaseStream]),

        (S::Live { request }, E::Captured(frame)) => {
            (S::Captured { request, frame }, vec![Effect::ReleaseStream])
        }

        (S::Captured { .. }, E::Retake(request)) => (
            S::Starting {
                request: request.clone(),
            },
            vec![Effect::OpenStream(request)],
        ),

        (_, E::Teardown) => (S::Idle, vec![Effect::ReleaseStream]),

        (state, _) => (state, vec![]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{Orientation, ResolutionHint, Size, StillFormat};
    use bytes::Bytes;

    fn request(device: &str) -> StreamRequest {
        StreamRequest {
            device_id: device.to_string(),
            resolution: ResolutionHint::Ideal(Size::new(1920, 1080)),
            orientation: Orientation::Landscape,
        }
    }

    fn frame() -> CapturedFrame {
        CapturedFrame {
            bytes: Bytes::from_static(b"png"),
            format: StillFormat::Png,
            size: Size::new(16, 9),
            device_id: "a".to_string(),
        }
    }

    #[test]
    fn test_start_releases_before_opening() {
        let (state, effects) = transition(CameraState::Idle, CameraEvent::Start(request("a")));
        assert_eq!(state.phase(), CameraPhase::Starting);
        assert_eq!(
            effects,
            vec![Effect::ReleaseStream, Effect::OpenStream(request("a"))]
        );
    }

    #[test]
    fn test_full_cycle() {
        let (s, _) = transition(CameraState::Idle, CameraEvent::Start(request("a")));
        let (s, fx) = transition(s, CameraEvent::StreamOpened);
        assert_eq!(s.phase(), CameraPhase::Live);
        assert!(fx.is_empty());

        let (s, fx) = transition(s, CameraEvent::Captured(frame()));
        assert_eq!(s.phase(), CameraPhase::Captured);
        assert_eq!(fx, vec![Effect::ReleaseStream]);
        assert_eq!(s.captured(), Some(&frame()));

        let (s, fx) = transition(s, CameraEvent::Retake(request("a")));
        assert_eq!(s.phase(), CameraPhase::Starting);
        assert_eq!(fx, vec![Effect::OpenStream(request("a"))]);
        assert!(s.captured().is_none());
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let (s, fx) = transition(CameraState::Idle, CameraEvent::Stop);
        assert_eq!(s, CameraState::Idle);
        assert!(fx.is_empty());
    }

    #[test]
    fn test_failed_start_returns_to_idle() {
        let (s, _) = transition(CameraState::Idle, CameraEvent::Start(request("a")));
        let (s, _) = transition(s, CameraEvent::StreamFailed);
        assert_eq!(s, CameraState::Idle);
    }

    #[test]
    fn test_reconfigure_only_restarts_live_streams() {
        let (s, fx) = transition(CameraState::Idle, CameraEvent::Reconfigure(request("b")));
        assert_eq!(s, CameraState::Idle);
        assert!(fx.is_empty());

        let live = CameraState::Live {
            request: request("a"),
        };
        let (s, fx) = transition(live, CameraEvent::Reconfigure(request("b")));
        assert_eq!(s.request(), Some(&request("b")));
        assert_eq!(fx[0], Effect::ReleaseStream);
    }

    #[test]
    fn test_capture_outside_live_is_ignored() {
        let (s, fx) = transition(CameraState::Idle, CameraEvent::Captured(frame()));
        assert_eq!(s, CameraState::Idle);
        assert!(fx.is_empty());
    }

    #[test]
    fn test_teardown_from_any_state() {
        let captured = CameraState::Captured {
            request: request("a"),
            frame: frame(),
        };
        let (s, fx) = transition(captured, CameraEvent::Teardown);
        assert_eq!(s, CameraState::Idle);
        assert_eq!(fx, vec![Effect::ReleaseStream]);
    }
}
