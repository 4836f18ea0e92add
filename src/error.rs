//! # Error Handling
//!
//! One error type, [`ToolkitError`], covers every tool in the crate. Each variant
//! carries an [`ErrorContext`] with a timestamp, the operation that failed, a
//! severity and an optional recovery suggestion, so callers can show a short
//! user-facing message and log the rest.
//!
//! ## Error Classification
//!
//! - **Device errors**: permission, missing device, busy device, unsupported constraint
//! - **Input errors**: invalid encode options, malformed JSON, undecodable images
//! - **Transport errors**: upstream HTTP failures and network problems
//! - **Host errors**: unsupported features, invalid lifecycle state, I/O
//!
//! Nothing in this crate retries automatically. A failed operation surfaces its
//! error and leaves the component in a known state.
//!
//! ## Usage
//!
//! ```rust
//! use media_toolkit::error::{HasRecoverySuggestion, ToolkitError};
//!
//! let error = ToolkitError::device_busy("cam-0")
//!     .with_operation("start_stream")
//!     .with_metadata("attempt", "1");
//!
//! assert_eq!(error.category(), "device_busy");
//! assert_eq!(
//!     error.user_message(),
//!     "The camera is already in use by another application."
//! );
//! assert!(error.recovery_suggestion().is_some());
//! ```

use std::{collections::HashMap, time::SystemTime};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Severity levels for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational errors
    Info,
    /// Expected failures caused by user input
    Warning,
    /// Errors that affect operation but leave the component usable
    Error,
    /// Errors that need user action outside the application
    Critical,
}

/// Metadata about when and where an error occurred
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// When the error occurred
    pub timestamp: SystemTime,
    /// The operation being performed when the error occurred
    pub operation: Option<String>,
    /// Additional context about the error
    pub context: Option<String>,
    /// Suggested recovery action
    pub recovery_suggestion: Option<String>,
    /// Error severity level
    pub severity: ErrorSeverity,
    /// Additional metadata as key-value pairs
    pub metadata: HashMap<String, String>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            timestamp: SystemTime::now(),
            operation: None,
            context: None,
            recovery_suggestion: None,
            severity: ErrorSeverity::Error,
            metadata: HashMap::new(),
        }
    }
}

impl ErrorContext {
    /// Create a new error context
    pub fn new() -> Self {
        Self::default()
    }

    fn with_defaults(severity: ErrorSeverity, suggestion: Option<&str>) -> Self {
        Self {
            severity,
            recovery_suggestion: suggestion.map(str::to_string),
            ..Self::default()
        }
    }
}

/// Error type shared by every tool in the crate
#[derive(Debug, thiserror::Error)]
pub enum ToolkitError {
    /// The host refused camera access
    #[error("Camera access was denied. Please allow camera access in your system settings.")]
    PermissionDenied { context: ErrorContext },

    /// Enumeration found no video inputs
    #[error("No camera was found on this device.")]
    NoDeviceFound { context: ErrorContext },

    /// The requested device id does not exist
    #[error("The selected camera ({device_id}) is no longer available.")]
    DeviceNotFound {
        device_id: String,
        context: ErrorContext,
    },

    /// Another process holds the device
    #[error("The camera is already in use by another application.")]
    DeviceBusy {
        device_id: String,
        context: ErrorContext,
    },

    /// The device cannot satisfy a hard constraint such as an exact resolution
    #[error("The camera does not support the requested {constraint}.")]
    UnsupportedConstraint {
        constraint: String,
        context: ErrorContext,
    },

    /// Input could not be loaded as an image or held no symbol
    #[error("{message}")]
    DecodeFailed {
        message: String,
        context: ErrorContext,
    },

    /// Encoder options were rejected before encoding
    #[error("{message}")]
    EncodeInvalidOptions {
        field: String,
        message: String,
        context: ErrorContext,
    },

    /// Bulk input was not the expected JSON shape
    #[error("{message}")]
    InvalidJson {
        message: String,
        context: ErrorContext,
    },

    /// HTTP transport failure or non-success upstream response
    #[error("{message}")]
    NetworkOrUpstream {
        status: Option<u16>,
        message: String,
        context: ErrorContext,
    },

    /// The host lacks a capability such as sharing or clipboard access
    #[error("{feature} is not supported on this host.")]
    UnsupportedFeature {
        feature: String,
        context: ErrorContext,
    },

    /// Operation not valid in the current lifecycle state
    #[error("Cannot {operation} while the camera is {state}.")]
    InvalidState {
        state: String,
        operation: String,
        context: ErrorContext,
    },

    /// Configuration validation errors
    #[error("Configuration error in '{field}': {reason}")]
    Config {
        field: String,
        reason: String,
        context: ErrorContext,
    },

    /// I/O errors
    #[error("I/O error during {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
        context: ErrorContext,
    },

    /// Pixel decoding or encoding failures from the `image` crate
    #[error("Image processing failed during {operation}: {source}")]
    Image {
        operation: String,
        #[source]
        source: image::ImageError,
        context: ErrorContext,
    },
}

/// Result type alias using the crate error type
pub type ToolkitResult<T> = Result<T, ToolkitError>;

impl ToolkitError {
    pub fn permission_denied() -> Self {
        Self::PermissionDenied {
            context: ErrorContext::with_defaults(
                ErrorSeverity::Critical,
                Some("Allow camera access for this application and try again."),
            ),
        }
    }

    pub fn no_device_found() -> Self {
        Self::NoDeviceFound {
            context: ErrorContext::with_defaults(
                ErrorSeverity::Critical,
                Some("Connect a camera and refresh the device list."),
            ),
        }
    }

    pub fn device_not_found(device_id: impl Into<String>) -> Self {
        Self::DeviceNotFound {
            device_id: device_id.into(),
            context: ErrorContext::with_defaults(
                ErrorSeverity::Error,
                Some("Refresh the device list and select another camera."),
            ),
        }
    }

    pub fn device_busy(device_id: impl Into<String>) -> Self {
        Self::DeviceBusy {
            device_id: device_id.into(),
            context: ErrorContext::with_defaults(
                ErrorSeverity::Error,
                Some("Close other applications using the camera and try again."),
            ),
        }
    }

    pub fn unsupported_constraint(constraint: impl Into<String>) -> Self {
        Self::UnsupportedConstraint {
            constraint: constraint.into(),
            context: ErrorContext::with_defaults(
                ErrorSeverity::Error,
                Some("Request an ideal resolution instead of an exact one."),
            ),
        }
    }

    pub fn decode_failed(message: impl Into<String>) -> Self {
        Self::DecodeFailed {
            message: message.into(),
            context: ErrorContext::with_defaults(ErrorSeverity::Warning, None),
        }
    }

    pub fn invalid_options(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EncodeInvalidOptions {
            field: field.into(),
            message: message.into(),
            context: ErrorContext::with_defaults(ErrorSeverity::Warning, None),
        }
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        Self::InvalidJson {
            message: message.into(),
            context: ErrorContext::with_defaults(
                ErrorSeverity::Warning,
                Some("Provide a JSON array of strings or objects."),
            ),
        }
    }

    /// Non-success response from an upstream service
    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        Self::NetworkOrUpstream {
            status: Some(status),
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    /// Transport-level failure with no HTTP status
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkOrUpstream {
            status: None,
            message: message.into(),
            context: ErrorContext::with_defaults(
                ErrorSeverity::Error,
                Some("Check the network connection and try again."),
            ),
        }
    }

    pub fn unsupported_feature(feature: impl Into<String>) -> Self {
        Self::UnsupportedFeature {
            feature: feature.into(),
            context: ErrorContext::with_defaults(
                ErrorSeverity::Info,
                Some("Download the file instead."),
            ),
        }
    }

    pub fn invalid_state(state: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::InvalidState {
            state: state.into(),
            operation: operation.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            reason: reason.into(),
            context: ErrorContext::with_defaults(ErrorSeverity::Critical, None),
        }
    }

    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
            context: ErrorContext::new(),
        }
    }

    pub fn image(operation: impl Into<String>, source: image::ImageError) -> Self {
        Self::Image {
            operation: operation.into(),
            source,
            context: ErrorContext::new(),
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context_mut().context = Some(context.into());
        self
    }

    /// Add operation context
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.context_mut().operation = Some(operation.into());
        self
    }

    /// Add recovery suggestion
    pub fn with_recovery_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context_mut().recovery_suggestion = Some(suggestion.into());
        self
    }

    /// Set severity
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.context_mut().severity = severity;
        self
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context_mut().metadata.insert(key.into(), value.into());
        self
    }

    /// Text suitable for showing to the user as-is
    pub fn user_message(&self) -> String {
        self.to_string()
    }

    /// Get the error context
    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::PermissionDenied { context }
            | Self::NoDeviceFound { context }
            | Self::DeviceNotFound { context, .. }
            | Self::DeviceBusy { context, .. }
            | Self::UnsupportedConstraint { context, .. }
            | Self::DecodeFailed { context, .. }
            | Self::EncodeInvalidOptions { context, .. }
            | Self::InvalidJson { context, .. }
            | Self::NetworkOrUpstream { context, .. }
            | Self::UnsupportedFeature { context, .. }
            | Self::InvalidState { context, .. }
            | Self::Config { context, .. }
            | Self::Io { context, .. }
            | Self::Image { context, .. } => context,
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Self::PermissionDenied { context }
            | Self::NoDeviceFound { context }
            | Self::DeviceNotFound { context, .. }
            | Self::DeviceBusy { context, .. }
            | Self::UnsupportedConstraint { context, .. }
            | Self::DecodeFailed { context, .. }
            | Self::EncodeInvalidOptions { context, .. }
            | Self::InvalidJson { context, .. }
            | Self::NetworkOrUpstream { context, .. }
            | Self::UnsupportedFeature { context, .. }
            | Self::InvalidState { context, .. }
            | Self::Config { context, .. }
            | Self::Io { context, .. }
            | Self::Image { context, .. } => context,
        }
    }

    /// Get the error category as a string
    pub fn category(&self) -> &'static str {
        match self {
            Self::PermissionDenied { .. } => "permission_denied",
            Self::NoDeviceFound { .. } => "no_device_found",
            Self::DeviceNotFound { .. } => "device_not_found",
            Self::DeviceBusy { .. } => "device_busy",
            Self::UnsupportedConstraint { .. } => "unsupported_constraint",
            Self::DecodeFailed { .. } => "decode_failed",
            Self::EncodeInvalidOptions { .. } => "encode_invalid_options",
            Self::InvalidJson { .. } => "invalid_json",
            Self::NetworkOrUpstream { .. } => "network_or_upstream",
            Self::UnsupportedFeature { .. } => "unsupported_feature",
            Self::InvalidState { .. } => "invalid_state",
            Self::Config { .. } => "config",
            Self::Io { .. } => "io",
            Self::Image { .. } => "image",
        }
    }
}

/// Trait for errors with severity levels
pub trait HasSeverity {
    /// Get the severity level of this error
    fn severity(&self) -> ErrorSeverity;
}

impl HasSeverity for ToolkitError {
    fn severity(&self) -> ErrorSeverity {
        self.context().severity
    }
}

/// Trait for errors that provide recovery suggestions
pub trait HasRecoverySuggestion {
    /// Get recovery suggestion for this error
    fn recovery_suggestion(&self) -> Option<&str>;
}

impl HasRecoverySuggestion for ToolkitError {
    fn recovery_suggestion(&self) -> Option<&str> {
        self.context().recovery_suggestion.as_deref()
    }
}

/// Error classification utilities
pub mod classify {
    use super::*;

    /// Errors raised by the camera host while opening or enumerating devices
    pub fn is_device_error(error: &ToolkitError) -> bool {
        matches!(
            error,
            ToolkitError::PermissionDenied { .. }
                | ToolkitError::NoDeviceFound { .. }
                | ToolkitError::DeviceNotFound { .. }
                | ToolkitError::DeviceBusy { .. }
                | ToolkitError::UnsupportedConstraint { .. }
        )
    }

    /// Errors caused by what the user typed or uploaded
    pub fn is_input_error(error: &ToolkitError) -> bool {
        matches!(
            error,
            ToolkitError::DecodeFailed { .. }
                | ToolkitError::EncodeInvalidOptions { .. }
                | ToolkitError::InvalidJson { .. }
        )
    }

    /// Check if an error requires user intervention outside the app
    pub fn requires_user_intervention(error: &ToolkitError) -> bool {
        error.severity() >= ErrorSeverity::Critical
    }

    /// Process exit status for the command line: 2 for bad input, 3 for camera
    /// problems, 1 for everything else.
    pub fn exit_code(error: &ToolkitError) -> i32 {
        if is_input_error(error) {
            2
        } else if is_device_error(error) {
            3
        } else {
            1
        }
    }

    /// Get error priority (higher numbers = higher priority)
    pub fn priority(error: &ToolkitError) -> u8 {
        match error.severity() {
            ErrorSeverity::Info => 0,
            ErrorSeverity::Warning => 1,
            ErrorSeverity::Error => 2,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl From<std::io::Error> for ToolkitError {
    fn from(error: std::io::Error) -> Self {
        Self::io("unknown", error)
    }
}

impl From<serde_json::Error> for ToolkitError {
    fn from(error: serde_json::Error) -> Self {
        Self::invalid_json(format!("Invalid JSON: {}", error))
    }
}

impl From<image::ImageError> for ToolkitError {
    fn from(error: image::ImageError) -> Self {
        Self::image("unknown", error)
    }
}

impl From<frame_scale::cpu::ScaleError> for ToolkitError {
    fn from(error: frame_scale::cpu::ScaleError) -> Self {
        use image::error::{ParameterError, ParameterErrorKind};
        Self::image(
            "scale",
            image::ImageError::Parameter(ParameterError::from_kind(ParameterErrorKind::Generic(
                error.to_string(),
            ))),
        )
    }
}

impl From<reqwest::Error> for ToolkitError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => Self::upstream(status.as_u16(), error.to_string()),
            None => Self::network(error.to_string()),
        }
    }
}

impl From<zip::result::ZipError> for ToolkitError {
    fn from(error: zip::result::ZipError) -> Self {
        Self::io("zip archive", std::io::Error::other(error))
    }
}

/// JSON error bodies for the HTTP surface: `{"error": "..."}`.
///
/// Upstream failures keep the upstream status and message. Transport failures
/// and internal errors collapse to a generic 500 so nothing internal leaks.
impl IntoResponse for ToolkitError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ToolkitError::NetworkOrUpstream {
                status: Some(code),
                message,
                ..
            } => (
                StatusCode::from_u16(*code).unwrap_or(StatusCode::BAD_GATEWAY),
                message.clone(),
            ),
            ToolkitError::InvalidJson { message, .. }
            | ToolkitError::EncodeInvalidOptions { message, .. } => {
                (StatusCode::BAD_REQUEST, message.clone())
            }
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        tracing::error!(
            status = %status,
            category = self.category(),
            error = %self,
            "Request error"
        );

        (status, Json(json!({ "error": message }))).into_response()
    }
}
