mod common;

use std::sync::Arc;

use axum::{Router, routing::get};
use common::assertions::{assert_category, assert_png};
use common::test_frames::scene_with;
use media_toolkit::camera::CameraLifecycle;
use media_toolkit::camera::synthetic::SyntheticHost;
use media_toolkit::codec::barcode::{BarcodeOptions, Symbology, encode_barcode};
use media_toolkit::codec::qr::{QrErrorCorrection, QrOptions, encode_qr};
use media_toolkit::codec::{OutputFormat, scan};
use media_toolkit::config::{CameraConfig, ScannerConfig};

fn qr_png(text: &str) -> Vec<u8> {
    let options = QrOptions {
        error_correction: QrErrorCorrection::H,
        ..QrOptions::default()
    };
    encode_qr(text, &options, OutputFormat::Png).unwrap().bytes.to_vec()
}

#[test]
fn test_qr_hello_at_level_h_decodes() {
    let png = qr_png("HELLO");
    assert_png(&png);
    let result = scan::decode_bytes(&png).unwrap();
    assert_eq!(result.text, "HELLO");
    assert_eq!(result.format, "qrcode");
}

#[test]
fn test_code128_roundtrip() {
    let options = BarcodeOptions {
        symbology: Symbology::Code128,
        ..BarcodeOptions::default()
    };
    let image = encode_barcode("MEDIA-42", &options, OutputFormat::Png).unwrap();
    let result = scan::decode_bytes(&image.bytes).unwrap();
    assert_eq!(result.text, "MEDIA-42");
    assert_eq!(result.format, "code128");
}

#[test]
fn test_ean13_gets_check_digit_and_decodes() {
    let options = BarcodeOptions {
        symbology: Symbology::Ean13,
        ..BarcodeOptions::default()
    };
    let image = encode_barcode("590123412345", &options, OutputFormat::Png).unwrap();
    let result = scan::decode_bytes(&image.bytes).unwrap();
    assert_eq!(result.text, "5901234123457");
    assert_eq!(result.format, "ean13");
}

#[test]
fn test_datamatrix_roundtrip() {
    let options = BarcodeOptions {
        symbology: Symbology::DataMatrix,
        ..BarcodeOptions::default()
    };
    let image = encode_barcode("toolkit 2d", &options, OutputFormat::Png).unwrap();
    let result = scan::decode_bytes(&image.bytes).unwrap();
    assert_eq!(result.text, "toolkit 2d");
    assert_eq!(result.format, "datamatrix");
}

#[tokio::test]
async fn test_scan_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("code.png");
    std::fs::write(&path, qr_png("from a file")).unwrap();
    assert_eq!(scan::scan_file(&path).await.unwrap().text, "from a file");

    let text_file = dir.path().join("notes.txt");
    std::fs::write(&text_file, "not an image").unwrap();
    let err = scan::scan_file(&text_file).await.unwrap_err();
    assert_category(&err, "decode_failed");
    assert_eq!(err.user_message(), "Could not load the selected file as an image.");
}

#[tokio::test]
async fn test_scan_url_through_proxy_template() {
    let png = qr_png("remote");
    let app = Router::new().route("/fetch", get(move || {
        let png = png.clone();
        async move { png }
    }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    let config = ScannerConfig {
        url_proxy_template: format!("http://{}/fetch?url={{url}}", addr),
        ..ScannerConfig::default()
    };
    let client = reqwest::Client::new();
    let result = scan::scan_url(&client, &config, "https://example.com/code.png")
        .await
        .unwrap();
    assert_eq!(result.text, "remote");

    let missing = ScannerConfig {
        url_proxy_template: format!("http://{}/nothing?url={{url}}", addr),
        ..ScannerConfig::default()
    };
    let err = scan::scan_url(&client, &missing, "https://example.com/code.png")
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), scan::URL_LOAD_FAILED);
}

#[tokio::test]
async fn test_scan_camera_stops_stream() {
    let symbol = image::load_from_memory(&qr_png("live")).unwrap().to_rgba8();
    let host = SyntheticHost::single().with_scene(scene_with(&symbol, 1920, 1080));
    let stats = host.stats();
    let mut camera = CameraLifecycle::new(Arc::new(host), CameraConfig::default()).unwrap();

    let result = scan::scan_camera(&mut camera, &ScannerConfig::default()).await.unwrap();
    assert_eq!(result.text, "live");
    assert_eq!(stats.active(), 0);
    assert!(!camera.has_stream());
}

#[tokio::test]
async fn test_scan_camera_gives_up_after_attempts() {
    let host = SyntheticHost::single();
    let stats = host.stats();
    let mut camera = CameraLifecycle::new(Arc::new(host), CameraConfig::default()).unwrap();
    let config = ScannerConfig {
        camera_attempts: 2,
        attempt_interval_ms: 1,
        ..ScannerConfig::default()
    };

    let err = scan::scan_camera(&mut camera, &config).await.unwrap_err();
    assert_eq!(err.user_message(), scan::NO_SYMBOL_ON_CAMERA);
    assert_eq!(stats.active(), 0);
}
