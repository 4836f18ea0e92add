mod common;

use std::sync::Arc;
use std::time::Duration;

use common::assertions::{assert_category, assert_decodes};
use common::recording_host::RecordingHost;
use media_toolkit::camera::synthetic::SyntheticHost;
use media_toolkit::camera::{CameraLifecycle, CameraPhase, Orientation, ResolutionHint, Size};
use media_toolkit::config::CameraConfig;

fn two_cameras() -> SyntheticHost {
    SyntheticHost::new()
        .with_device("back", "Back Camera", Size::new(1920, 1080))
        .with_device("front", "Front Camera", Size::new(1280, 720))
}

#[tokio::test]
async fn test_switching_device_keeps_exactly_one_stream() {
    let host = two_cameras();
    let stats = host.stats();
    let mut camera = CameraLifecycle::new(Arc::new(host), CameraConfig::default()).unwrap();

    camera.list_devices().await.unwrap();
    camera.start().await.unwrap();
    assert_eq!(stats.active(), 1);

    camera.select_device("front").await.unwrap();
    assert_eq!(camera.phase(), CameraPhase::Live);
    assert_eq!(stats.active(), 1);
    assert_eq!(stats.opened(), 2);

    camera.select_device("back").await.unwrap();
    assert_eq!(stats.active(), 1);
    assert_eq!(stats.opened(), 3);
}

#[tokio::test]
async fn test_orientation_switch_requests_portrait_resolution() {
    let host = RecordingHost::new(two_cameras());
    let log = host.log();
    let mut camera = CameraLifecycle::new(Arc::new(host), CameraConfig::default()).unwrap();
    camera.start().await.unwrap();

    camera.set_orientation(Orientation::Portrait).await.unwrap();
    assert_eq!(camera.phase(), CameraPhase::Live);

    let requests = log.lock().unwrap().clone();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].resolution, ResolutionHint::Ideal(Size::new(1920, 1080)));
    assert_eq!(requests[1].orientation, Orientation::Portrait);
    assert_eq!(requests[1].resolution, ResolutionHint::Ideal(Size::new(1080, 1920)));
}

#[tokio::test]
async fn test_capture_matches_displayed_aspect_not_sensor() {
    let host = SyntheticHost::single();
    let stats = host.stats();
    let mut camera = CameraLifecycle::new(Arc::new(host), CameraConfig::default()).unwrap();
    camera.start().await.unwrap();
    camera.set_display_size(Size::new(600, 600));

    let still = camera.capture().await.unwrap();
    assert_eq!(still.size, Size::new(600, 600));
    assert_eq!(assert_decodes(&still.bytes), (600, 600));
    assert_eq!(camera.phase(), CameraPhase::Captured);
    assert_eq!(stats.active(), 0);
}

#[tokio::test]
async fn test_stop_twice_is_a_noop() {
    let host = SyntheticHost::single();
    let stats = host.stats();
    let mut camera = CameraLifecycle::new(Arc::new(host), CameraConfig::default()).unwrap();

    camera.stop_stream();
    assert_eq!(camera.phase(), CameraPhase::Idle);

    camera.start().await.unwrap();
    camera.stop_stream();
    camera.stop_stream();
    assert_eq!(camera.phase(), CameraPhase::Idle);
    assert_eq!(stats.active(), 0);
    assert_eq!(stats.opened(), 1);
}

#[tokio::test]
async fn test_start_failures_leave_idle() {
    let mut camera = CameraLifecycle::new(Arc::new(SyntheticHost::single()), CameraConfig::default()).unwrap();
    let err = camera.start_stream("missing", None).await.unwrap_err();
    assert_category(&err, "device_not_found");
    assert_eq!(camera.phase(), CameraPhase::Idle);
    assert!(!camera.has_stream());

    let busy = SyntheticHost::single().with_busy("synthetic-0");
    let mut camera = CameraLifecycle::new(Arc::new(busy), CameraConfig::default()).unwrap();
    let err = camera.start().await.unwrap_err();
    assert_category(&err, "device_busy");
    assert_eq!(
        err.user_message(),
        "The camera is already in use by another application."
    );
    assert_eq!(camera.phase(), CameraPhase::Idle);

    let mut camera = CameraLifecycle::new(
        Arc::new(SyntheticHost::single().deny_permission()),
        CameraConfig::default(),
    )
    .unwrap();
    assert_category(&camera.list_devices().await.unwrap_err(), "permission_denied");
    assert_eq!(camera.phase(), CameraPhase::Idle);

    let mut camera = CameraLifecycle::new(Arc::new(SyntheticHost::single()), CameraConfig::default()).unwrap();
    let err = camera
        .start_stream("synthetic-0", Some(ResolutionHint::Exact(Size::new(7680, 4320))))
        .await
        .unwrap_err();
    assert_category(&err, "unsupported_constraint");
    assert_eq!(camera.phase(), CameraPhase::Idle);
}

#[tokio::test]
async fn test_no_devices() {
    let mut camera = CameraLifecycle::new(Arc::new(SyntheticHost::new()), CameraConfig::default()).unwrap();
    let err = camera.list_devices().await.unwrap_err();
    assert_category(&err, "no_device_found");
}

#[tokio::test]
async fn test_stream_resolving_after_teardown_is_released() {
    let host = SyntheticHost::single().with_open_delay(Duration::from_millis(100));
    let stats = host.stats();
    let mut camera = CameraLifecycle::new(Arc::new(host), CameraConfig::default()).unwrap();
    let handle = camera.teardown_handle();

    let (result, ()) = tokio::join!(camera.start_stream("synthetic-0", None), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.teardown();
    });

    assert!(result.is_err());
    assert!(handle.is_torn_down());
    assert_eq!(stats.opened(), 1);
    assert_eq!(stats.active(), 0);
    assert_eq!(camera.phase(), CameraPhase::Idle);
    assert!(!camera.has_stream());
}

#[tokio::test]
async fn test_teardown_from_another_task_releases_live_stream() {
    let host = SyntheticHost::single();
    let stats = host.stats();
    let mut camera = CameraLifecycle::new(Arc::new(host), CameraConfig::default()).unwrap();
    camera.start().await.unwrap();
    assert_eq!(stats.active(), 1);

    let handle = camera.teardown_handle();
    tokio::spawn(async move { handle.teardown() }).await.unwrap();

    assert_eq!(stats.active(), 0);
    assert!(!camera.has_stream());
    assert_eq!(camera.phase(), CameraPhase::Idle);
    assert_category(&camera.start().await.unwrap_err(), "invalid_state");
}
