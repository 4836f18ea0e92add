//! # Media Toolkit Library
//!
//! Camera capture, barcode and QR codecs, image compression and cropping, and
//! an image-generation proxy, packaged as independent tools that share one
//! error type and one configuration.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//! - `camera`: Device enumeration and the stream lifecycle manager
//! - `codec`: QR and barcode encoders, the multi-format decoder, bulk generation
//! - `imaging`: Size-budgeted compression and crop/rotate/flip
//! - `export`: Named assets, object URLs, zip archives, share and clipboard delivery
//! - `proxy` / `imagegen`: The HTTP image-generation route and its client
//! - `config`: Configuration management and validation
//! - `capability`: Host capability flags computed once at startup
//! - `session`: Capture session composing the lifecycle with delivery
//!
//! ## Example
//!
//! ```rust,no_run
//! use media_toolkit::codec::{OutputFormat, qr};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let image = qr::encode_qr("https://example.com", &qr::QrOptions::default(), OutputFormat::Png)?;
//! std::fs::write("qr.png", &image.bytes)?;
//! # Ok(())
//! # }
//! ```

// Internal module imports
pub mod camera;
pub mod capability;
pub mod codec;
pub mod config;
pub mod error;
pub mod export;
pub mod imagegen;
pub mod imaging;
pub mod proxy;
pub mod session;

/// Re-export error types for convenience
pub use error::{HasRecoverySuggestion, HasSeverity, ToolkitError, ToolkitResult};

pub use camera::CameraLifecycle;
pub use capability::Capabilities;
pub use config::ToolkitConfig;
pub use session::{CaptureSession, CaptureSessionBuilder};

/// Run CPU-bound work on the blocking pool.
///
/// Encoders and the compressor are synchronous; bulk callers fan out over
/// this so items encode concurrently. A panicking task surfaces as an
/// [`ToolkitError::Io`] tagged with `operation`.
pub async fn run_blocking<T, F>(operation: &'static str, f: F) -> ToolkitResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> ToolkitResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        ToolkitError::io(operation, std::io::Error::other(e.to_string()))
    })?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_blocking_passes_result_through() {
        assert_eq!(run_blocking("add", || Ok(2 + 2)).await.unwrap(), 4);

        let err = run_blocking::<(), _>("fail", || Err(ToolkitError::decode_failed("nope")))
            .await
            .unwrap_err();
        assert_eq!(err.category(), "decode_failed");
    }

    #[tokio::test]
    async fn test_run_blocking_maps_panics() {
        let err = run_blocking::<(), _>("explode", || panic!("boom"))
            .await
            .unwrap_err();
        assert_eq!(err.category(), "io");
    }
}
