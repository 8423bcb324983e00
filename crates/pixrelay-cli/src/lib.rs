//! Output and logging helpers for the pixrelay binary

use pixrelay_core::models::{ContentBlock, RequestPayload};
use pixrelay_core::{AppError, ErrorMetadata, LogLevel};
use pixrelay_processing::ValidationReport;
use serde_json::{json, Value};
use tracing_subscriber::{
    fmt::format::Format, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Initialize tracing. Logs go to stderr so stdout stays machine-readable.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .event_format(Format::default().compact().with_target(false))
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Log an error at the level its metadata asks for. Full details go to the log only.
pub fn log_error(err: &AppError) {
    let details = err.detailed_message();
    match err.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error_code = err.error_code(), error = %details, "Request rejected")
        }
        LogLevel::Warn => {
            tracing::warn!(error_code = err.error_code(), error = %details, "Request failed")
        }
        LogLevel::Error => {
            tracing::error!(error_code = err.error_code(), error = %details, "Request failed")
        }
    }
}

/// User-facing error body
pub fn error_json(err: &AppError) -> Value {
    json!({
        "error": err.client_message(),
        "error_code": err.error_code(),
        "recoverable": err.is_recoverable(),
        "suggested_action": err.suggested_action(),
    })
}

/// Payload overview: the text block plus size and preview of each image block
pub fn payload_summary(payload: &RequestPayload) -> Value {
    let images: Vec<Value> = payload
        .blocks()
        .iter()
        .filter_map(ContentBlock::as_image_url)
        .enumerate()
        .map(|(i, url)| {
            json!({
                "index": i + 1,
                "encoded_bytes": url.len(),
                "preview": truncate_string(url, 48),
            })
        })
        .collect();

    json!({
        "text": payload.text(),
        "blocks": payload.len(),
        "images": images,
    })
}

/// Collect-all validation report
pub fn report_json(report: &ValidationReport) -> Value {
    let images: Vec<Value> = report
        .outcomes()
        .iter()
        .map(|outcome| match &outcome.result {
            Ok(candidate) => json!({
                "index": outcome.index,
                "path": outcome.path,
                "valid": true,
                "size_bytes": candidate.size_bytes,
                "width": candidate.width,
                "height": candidate.height,
            }),
            Err(e) => json!({
                "index": outcome.index,
                "path": outcome.path,
                "valid": false,
                "error": e.to_string(),
            }),
        })
        .collect();

    json!({
        "valid": report.is_valid(),
        "error": report.batch_error().map(|e| e.to_string()),
        "images": images,
    })
}
