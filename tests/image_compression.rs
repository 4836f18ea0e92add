mod common;

use bytes::Bytes;
use common::assertions::{assert_category, assert_decodes};
use common::test_frames::noise_jpeg;
use media_toolkit::imaging::compress::{CompressionOptions, compress_image, compress_many};

#[test]
fn test_large_jpeg_fits_one_megabyte_and_decodes() {
    let input = noise_jpeg(2400, 1800, 7);
    assert!(input.len() > 1024 * 1024, "fixture should exceed the budget");

    let options = CompressionOptions {
        max_size_mb: 1.0,
        ..CompressionOptions::default()
    };
    let out = compress_image(&input, &options).unwrap();

    assert!(out.fits(&options), "{} bytes over budget", out.compressed_bytes());
    assert!(out.iterations >= 1);
    assert!(out.reduction_percent() > 0.0);
    let (w, h) = assert_decodes(&out.bytes);
    assert!(w.max(h) <= 1920);
    assert_eq!((w, h), (out.size.w, out.size.h));
}

#[test]
fn test_iteration_budget_returns_best_effort() {
    // Full-resolution noise cannot reach 10 KB in three quality steps.
    let input = noise_jpeg(1600, 1200, 11);
    let options = CompressionOptions {
        max_size_mb: 0.01,
        max_iterations: 3,
        always_keep_resolution: true,
        ..CompressionOptions::default()
    };
    let out = compress_image(&input, &options).unwrap();

    assert_eq!(out.iterations, 3);
    assert!(!out.fits(&options));
    assert!(out.compressed_bytes() < input.len());
    assert_eq!(assert_decodes(&out.bytes), (1600, 1200));
}

#[test]
fn test_budget_below_minimum_is_rejected() {
    let options = CompressionOptions {
        max_size_mb: 0.001,
        ..CompressionOptions::default()
    };
    let err = compress_image(&noise_jpeg(64, 64, 3), &options).unwrap_err();
    assert_category(&err, "encode_invalid_options");
}

#[tokio::test]
async fn test_compress_many_isolates_failures() {
    let inputs = vec![
        Bytes::from(noise_jpeg(320, 240, 1)),
        Bytes::from_static(b"definitely not an image"),
        Bytes::from(noise_jpeg(240, 320, 2)),
    ];
    let results = compress_many(inputs, &CompressionOptions::default()).await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().size.w, 320);
    assert_category(results[1].as_ref().unwrap_err(), "decode_failed");
    assert_eq!(results[2].as_ref().unwrap().size.h, 320);
}
