//! Error types module
//!
//! This module provides the core error type used throughout pixrelay. Component crates
//! define their own error enums (validation, assembly, messaging) and convert into
//! `AppError` at the boundary where a request is aborted.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like upstream hiccups
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata describing how an error should be presented to the caller
pub trait ErrorMetadata {
    /// Process exit code for command-line callers (sysexits-style)
    fn exit_code(&self) -> u8;

    /// Machine-readable error code (e.g., "TOO_MANY_IMAGES")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the user
    fn suggested_action(&self) -> Option<&'static str>;

    /// User-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden from the user
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("No images provided")]
    NoImages,

    #[error("Too many images: {count} supplied (max: {max})")]
    TooManyImages { count: usize, max: usize },

    #[error("Image not found: {0}")]
    ImageNotFound(String),

    #[error("Image too large: {0}")]
    ImageTooLarge(String),

    #[error("Encoded payload too large: {0}")]
    EncodedPayloadTooLarge(String),

    #[error("Invalid image format: {0}")]
    InvalidImageFormat(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

/// Static metadata for each variant: (exit_code, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u8,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::NoImages => (
            64,
            "NO_IMAGES",
            false,
            Some("Attach at least one image"),
            false,
            LogLevel::Debug,
        ),
        AppError::TooManyImages { .. } => (
            65,
            "TOO_MANY_IMAGES",
            false,
            Some("Send at most 5 images per request"),
            false,
            LogLevel::Debug,
        ),
        AppError::ImageNotFound(_) => (
            66,
            "IMAGE_NOT_FOUND",
            false,
            Some("Check the image path and upload the file again"),
            false,
            LogLevel::Debug,
        ),
        AppError::ImageTooLarge(_) => (
            65,
            "IMAGE_TOO_LARGE",
            false,
            Some("Reduce the file size or resolution and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::EncodedPayloadTooLarge(_) => (
            65,
            "ENCODED_PAYLOAD_TOO_LARGE",
            false,
            Some("Use a smaller or more compressed image"),
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidImageFormat(_) => (
            65,
            "INVALID_IMAGE_FORMAT",
            false,
            Some("Use a JPEG, PNG, GIF or WebP image"),
            false,
            LogLevel::Debug,
        ),
        AppError::ImageProcessing(_) => (
            65,
            "IMAGE_PROCESSING_ERROR",
            false,
            Some("Check image format and try a different file"),
            false,
            LogLevel::Warn,
        ),
        AppError::InvalidInput(_) => (
            64,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::Configuration(_) => (
            78,
            "CONFIGURATION_ERROR",
            false,
            Some("Check environment variables and restart"),
            true,
            LogLevel::Error,
        ),
        AppError::ExternalService(_) => (
            69,
            "EXTERNAL_SERVICE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Warn,
        ),
        AppError::Internal(_) => (
            70,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::InternalWithSource { .. } => (
            70,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error output
    pub fn error_type(&self) -> &str {
        match self {
            AppError::NoImages => "NoImages",
            AppError::TooManyImages { .. } => "TooManyImages",
            AppError::ImageNotFound(_) => "ImageNotFound",
            AppError::ImageTooLarge(_) => "ImageTooLarge",
            AppError::EncodedPayloadTooLarge(_) => "EncodedPayloadTooLarge",
            AppError::InvalidImageFormat(_) => "InvalidImageFormat",
            AppError::ImageProcessing(_) => "ImageProcessing",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::Configuration(_) => "Configuration",
            AppError::ExternalService(_) => "ExternalService",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn exit_code(&self) -> u8 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::NoImages => "No images provided".to_string(),
            AppError::TooManyImages { max, .. } => {
                format!("Too many images. Maximum allowed is {}.", max)
            }
            AppError::ImageNotFound(ref path) => format!("Image not found: {}", path),
            AppError::ImageTooLarge(ref msg) => msg.clone(),
            AppError::EncodedPayloadTooLarge(ref msg) => msg.clone(),
            AppError::InvalidImageFormat(ref path) => {
                format!("Invalid image format for file: {}", path)
            }
            AppError::ImageProcessing(ref msg) => msg.clone(),
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::Configuration(_) => "Service is not configured correctly".to_string(),
            AppError::ExternalService(_) => "Failed to reach the model service".to_string(),
            AppError::Internal(_) => "Internal error".to_string(),
            AppError::InternalWithSource { .. } => "Internal error".to_string(),
        }
    }
}
