//! # Configuration Module
//!
//! Settings for every tool, with defaults, file loading, environment overrides
//! and validation.

pub mod config;

pub use config::{
    BarcodeConfig, CameraConfig, CompressionConfig, ProxyConfig, QrConfig, QualityPreset,
    ScannerConfig, ToolkitConfig, parse_size,
};
