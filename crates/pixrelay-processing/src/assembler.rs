//! Builds the multimodal content sent to the chat service
//!
//! Each image is read, downscaled and re-encoded on the blocking pool. All images in a batch
//! are processed concurrently but the resulting blocks are placed by input position, so
//! `Image N` in the text block always refers to the N-th image block.

use crate::compression::ImageCompressor;
use base64::{engine::general_purpose, Engine as _};
use futures::future::join_all;
use pixrelay_core::models::{label_images, AssemblyOptions, RequestPayload};
use pixrelay_core::AppError;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssemblyError {
    #[error("Failed to process image {path}: {message}")]
    ImageProcessing { path: String, message: String },
}

impl From<AssemblyError> for AppError {
    fn from(err: AssemblyError) -> Self {
        AppError::ImageProcessing(err.to_string())
    }
}

/// Turns one local image into the URL carried by an image block
pub trait BlockEncoder: Send + Sync {
    fn encode(&self, path: &str) -> Result<String, AssemblyError>;
}

/// Default encoder: downscaled JPEG as a base64 data URL
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegDataUrlEncoder {
    options: AssemblyOptions,
}

impl JpegDataUrlEncoder {
    pub fn new(options: AssemblyOptions) -> Self {
        Self { options }
    }
}

impl BlockEncoder for JpegDataUrlEncoder {
    fn encode(&self, path: &str) -> Result<String, AssemblyError> {
        let failed = |message: String| AssemblyError::ImageProcessing {
            path: path.to_string(),
            message,
        };

        let data = std::fs::read(path).map_err(|e| failed(e.to_string()))?;
        let compressed = ImageCompressor::compress_for_model(&data, &self.options)
            .map_err(|e| failed(format!("{:#}", e)))?;

        tracing::debug!(
            path = %path,
            original_bytes = data.len(),
            compressed_bytes = compressed.data.len(),
            width = compressed.width,
            height = compressed.height,
            "Image re-encoded for model request"
        );

        Ok(format!(
            "data:image/jpeg;base64,{}",
            general_purpose::STANDARD.encode(&compressed.data)
        ))
    }
}

#[derive(Clone)]
pub struct RequestAssembler {
    encoder: Arc<dyn BlockEncoder>,
}

impl RequestAssembler {
    pub fn new(options: AssemblyOptions) -> Self {
        Self::with_encoder(Arc::new(JpegDataUrlEncoder::new(options)))
    }

    pub fn with_encoder(encoder: Arc<dyn BlockEncoder>) -> Self {
        Self { encoder }
    }

    /// Build the payload for `message` and the already-validated `paths`.
    ///
    /// Waits for every image before returning. If any image fails, the error for the
    /// earliest failing position is returned and no partial payload is produced.
    pub async fn build_payload<S: AsRef<str>>(
        &self,
        message: &str,
        paths: &[S],
    ) -> Result<RequestPayload, AssemblyError> {
        let text = label_images(message, paths);

        let tasks = paths.iter().map(|path| {
            let path = path.as_ref().to_string();
            let encoder = Arc::clone(&self.encoder);
            tokio::task::spawn_blocking(move || encoder.encode(&path))
        });
        let results = join_all(tasks).await;

        let mut data_urls = Vec::with_capacity(paths.len());
        for (path, joined) in paths.iter().zip(results) {
            let url = joined.map_err(|e| AssemblyError::ImageProcessing {
                path: path.as_ref().to_string(),
                message: format!("Image task failed: {}", e),
            })??;
            data_urls.push(url);
        }

        tracing::info!(images = data_urls.len(), "Request payload assembled");
        Ok(RequestPayload::new(text, data_urls))
    }
}
