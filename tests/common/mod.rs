//! Shared helpers for the media-toolkit integration tests.
#![allow(dead_code)]

/// Deterministic test images
pub mod test_frames {
    use image::{ImageBuffer, Rgb, RgbaImage};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Four solid quadrants: red, green, blue, white.
    pub fn quadrants(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| match (x < w / 2, y < h / 2) {
            (true, true) => image::Rgba([255, 0, 0, 255]),
            (false, true) => image::Rgba([0, 255, 0, 255]),
            (true, false) => image::Rgba([0, 0, 255, 255]),
            (false, false) => image::Rgba([255, 255, 255, 255]),
        })
    }

    /// White canvas with `symbol` pasted in the middle.
    pub fn scene_with(symbol: &RgbaImage, w: u32, h: u32) -> RgbaImage {
        let mut scene = RgbaImage::from_pixel(w, h, image::Rgba([255, 255, 255, 255]));
        let x = (w.saturating_sub(symbol.width()) / 2) as i64;
        let y = (h.saturating_sub(symbol.height()) / 2) as i64;
        image::imageops::overlay(&mut scene, symbol, x, y);
        scene
    }

    /// Random pixels encoded as a near-lossless JPEG. Noise defeats
    /// compression, so this gets large quickly.
    pub fn noise_jpeg(w: u32, h: u32, seed: u64) -> Vec<u8> {
        let mut rng = StdRng::seed_from_u64(seed);
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_fn(w, h, |_, _| Rgb([rng.random(), rng.random(), rng.random()]));
        let mut out = Vec::new();
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, 98)
            .encode_image(&img)
            .unwrap();
        out
    }
}

/// A media host that records every stream request it receives
pub mod recording_host {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use media_toolkit::ToolkitResult;
    use media_toolkit::camera::synthetic::SyntheticHost;
    use media_toolkit::camera::{DeviceDescriptor, MediaHost, MediaStream, StreamRequest};

    pub struct RecordingHost {
        inner: SyntheticHost,
        requests: Arc<Mutex<Vec<StreamRequest>>>,
    }

    impl RecordingHost {
        pub fn new(inner: SyntheticHost) -> Self {
            Self {
                inner,
                requests: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn log(&self) -> Arc<Mutex<Vec<StreamRequest>>> {
            Arc::clone(&self.requests)
        }
    }

    #[async_trait]
    impl MediaHost for RecordingHost {
        async fn request_permission(&self) -> ToolkitResult<()> {
            self.inner.request_permission().await
        }

        async fn enumerate_devices(&self) -> ToolkitResult<Vec<DeviceDescriptor>> {
            self.inner.enumerate_devices().await
        }

        async fn open_stream(&self, request: &StreamRequest) -> ToolkitResult<Box<dyn MediaStream>> {
            self.requests.lock().unwrap().push(request.clone());
            self.inner.open_stream(request).await
        }
    }
}

/// Assertion helpers
pub mod assertions {
    use media_toolkit::ToolkitError;

    /// Decode `bytes` and return its dimensions.
    pub fn assert_decodes(bytes: &[u8]) -> (u32, u32) {
        let img = image::load_from_memory(bytes).expect("output should decode");
        (img.width(), img.height())
    }

    pub fn assert_png(bytes: &[u8]) {
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n", "expected PNG signature");
    }

    pub fn assert_category(error: &ToolkitError, category: &str) {
        assert_eq!(
            error.category(),
            category,
            "unexpected error: {}",
            error.user_message()
        );
    }
}
