mod common;

use common::assertions::{assert_category, assert_png};
use common::test_frames::quadrants;
use media_toolkit::camera::Size;
use media_toolkit::imaging::crop::{
    AspectPreset, CropRequest, CropShape, Flip, PixelCrop, QuarterTurn, centered_aspect_crop,
    crop_image,
};

fn png(img: &image::RgbaImage) -> Vec<u8> {
    let mut out = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

#[test]
fn test_displayed_crop_scales_to_natural_pixels() {
    let input = png(&quadrants(800, 600));
    // Drawn on a 400x300 preview: the top-left quarter.
    let request = CropRequest {
        crop: PixelCrop {
            x: 0.0,
            y: 0.0,
            width: 200.0,
            height: 150.0,
        },
        displayed: Size::new(400, 300),
        rotation: QuarterTurn::None,
        flip: Flip::default(),
        shape: CropShape::Rect,
    };
    let out = crop_image(&input, &request).unwrap();
    assert_png(&out.bytes);
    assert_eq!(out.size, Size::new(400, 300));
    assert!(out.filename.starts_with("cropped-image-"));

    let img = image::load_from_memory(&out.bytes).unwrap().to_rgba8();
    assert_eq!(img.get_pixel(10, 10).0, [255, 0, 0, 255]);
    assert_eq!(img.get_pixel(390, 290).0, [255, 0, 0, 255]);
}

#[test]
fn test_rotation_and_flip() {
    let input = png(&quadrants(400, 200));
    let request = CropRequest {
        crop: PixelCrop {
            x: 0.0,
            y: 0.0,
            width: 400.0,
            height: 200.0,
        },
        displayed: Size::new(400, 200),
        rotation: QuarterTurn::from_degrees(90),
        flip: Flip {
            horizontal: true,
            vertical: false,
        },
        shape: CropShape::Rect,
    };
    let out = crop_image(&input, &request).unwrap();
    assert_eq!(out.size, Size::new(200, 400));
}

#[test]
fn test_default_crop_and_errors() {
    let crop = centered_aspect_crop(AspectPreset::Square, 1000.0, 500.0);
    assert!((crop.width - crop.height).abs() < 1e-6);
    assert!(crop.height <= 500.0);

    let input = png(&quadrants(100, 100));
    let request = CropRequest {
        crop: PixelCrop {
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
        },
        displayed: Size::new(100, 100),
        rotation: QuarterTurn::None,
        flip: Flip::default(),
        shape: CropShape::Rect,
    };
    let err = crop_image(&input, &request).unwrap_err();
    assert_category(&err, "encode_invalid_options");
    assert_eq!(err.user_message(), "Please select a crop area first.");
}
