//! pixrelay core library
//!
//! Domain models, error types and configuration shared by the processing, services and
//! CLI crates.

pub mod config;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{ChatConfig, Config, SlackConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
