//! Intake validation for images about to be sent to the model service
//!
//! Checks run in a fixed order and stop at the first failure: image count, then per image
//! (in input order) existence, raw size, base64 size, and resolution. When an earlier image
//! fails, later images are never looked at. Callers that need a diagnosis of the whole batch
//! use [`IntakeValidator::validate_all`] instead.

use image::{ImageError, ImageReader};
use pixrelay_core::models::{ImageCandidate, ValidationPolicy};
use pixrelay_core::AppError;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader};

/// Which limit an oversized image broke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeLimit {
    Bytes { size: u64, max: u64 },
    Pixels { pixels: u64, max: u64 },
}

impl fmt::Display for SizeLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeLimit::Bytes { size, max } => {
                write!(f, "{} bytes (max: {} bytes)", size, max)
            }
            SizeLimit::Pixels { pixels, max } => {
                write!(f, "{} pixels (max: {} pixels)", pixels, max)
            }
        }
    }
}

/// Intake validation errors. Every per-image variant names the offending path.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("No images provided")]
    NoImages,

    #[error("Too many images: {count} supplied (max: {max})")]
    TooManyImages { count: usize, max: usize },

    #[error("Image not found: {path}")]
    ImageNotFound { path: String },

    #[error("Image {path} is too large: {limit}")]
    ImageTooLarge { path: String, limit: SizeLimit },

    #[error("Base64 version of {path} is {encoded_size} bytes (max: {max} bytes)")]
    EncodedPayloadTooLarge {
        path: String,
        encoded_size: u64,
        max: u64,
    },

    #[error("Invalid image format for file: {path}")]
    InvalidImageFormat {
        path: String,
        #[source]
        source: ImageError,
    },

    #[error("Failed to read image {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl ValidationError {
    /// Path of the image that failed, if the error is about a single image
    pub fn path(&self) -> Option<&str> {
        match self {
            ValidationError::NoImages | ValidationError::TooManyImages { .. } => None,
            ValidationError::ImageNotFound { path }
            | ValidationError::ImageTooLarge { path, .. }
            | ValidationError::EncodedPayloadTooLarge { path, .. }
            | ValidationError::InvalidImageFormat { path, .. }
            | ValidationError::Io { path, .. } => Some(path),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::NoImages => AppError::NoImages,
            ValidationError::TooManyImages { count, max } => {
                AppError::TooManyImages { count, max }
            }
            ValidationError::ImageNotFound { path } => AppError::ImageNotFound(path),
            ValidationError::ImageTooLarge { path, limit } => {
                AppError::ImageTooLarge(format!("Image {} is too large: {}", path, limit))
            }
            ValidationError::EncodedPayloadTooLarge { path, max, .. } => {
                AppError::EncodedPayloadTooLarge(format!(
                    "Base64 version of {} exceeds {}MB request limit.",
                    path,
                    max / (1024 * 1024)
                ))
            }
            ValidationError::InvalidImageFormat { path, .. } => AppError::InvalidImageFormat(path),
            ValidationError::Io { path, source } => {
                AppError::Internal(format!("IO error reading {}: {}", path, source))
            }
        }
    }
}

/// Outcome of one image in a collect-all validation run
#[derive(Debug)]
pub struct ImageOutcome {
    /// 1-based position in the batch
    pub index: usize,
    pub path: String,
    pub result: Result<ImageCandidate, ValidationError>,
}

/// Result of [`IntakeValidator::validate_all`]
#[derive(Debug)]
pub struct ValidationReport {
    batch_error: Option<ValidationError>,
    outcomes: Vec<ImageOutcome>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.batch_error.is_none() && self.outcomes.iter().all(|o| o.result.is_ok())
    }

    /// Error that rejected the batch as a whole (image count)
    pub fn batch_error(&self) -> Option<&ValidationError> {
        self.batch_error.as_ref()
    }

    pub fn outcomes(&self) -> &[ImageOutcome] {
        &self.outcomes
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationError> {
        self.batch_error
            .iter()
            .chain(self.outcomes.iter().filter_map(|o| o.result.as_ref().err()))
    }

    /// Collapse into the fail-fast shape: all candidates, or the first error
    pub fn into_result(self) -> Result<Vec<ImageCandidate>, ValidationError> {
        if let Some(err) = self.batch_error {
            return Err(err);
        }
        self.outcomes.into_iter().map(|o| o.result).collect()
    }
}

/// Enforces [`ValidationPolicy`] on local image files
#[derive(Debug, Clone, Default)]
pub struct IntakeValidator {
    policy: ValidationPolicy,
}

impl IntakeValidator {
    pub fn new(policy: ValidationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    /// Validate a batch, stopping at the first failure
    pub fn validate<S: AsRef<str>>(
        &self,
        paths: &[S],
    ) -> Result<Vec<ImageCandidate>, ValidationError> {
        self.validate_count(paths.len())?;

        let mut candidates = Vec::with_capacity(paths.len());
        for path in paths {
            candidates.push(self.validate_image(path.as_ref())?);
        }

        tracing::debug!(count = candidates.len(), "Image batch passed intake validation");
        Ok(candidates)
    }

    /// Validate every image and record each outcome. The count check still rejects the
    /// batch before any file is read.
    pub fn validate_all<S: AsRef<str>>(&self, paths: &[S]) -> ValidationReport {
        if let Err(err) = self.validate_count(paths.len()) {
            return ValidationReport {
                batch_error: Some(err),
                outcomes: Vec::new(),
            };
        }

        let outcomes = paths
            .iter()
            .enumerate()
            .map(|(i, path)| ImageOutcome {
                index: i + 1,
                path: path.as_ref().to_string(),
                result: self.validate_image(path.as_ref()),
            })
            .collect();

        ValidationReport {
            batch_error: None,
            outcomes,
        }
    }

    /// Validate the number of images in a batch
    pub fn validate_count(&self, count: usize) -> Result<(), ValidationError> {
        if count == 0 {
            return Err(ValidationError::NoImages);
        }
        if count > self.policy.max_images {
            return Err(ValidationError::TooManyImages {
                count,
                max: self.policy.max_images,
            });
        }
        Ok(())
    }

    /// Validate a single image file
    pub fn validate_image(&self, path: &str) -> Result<ImageCandidate, ValidationError> {
        let result = self.check_image(path);
        if let Err(ref err) = result {
            tracing::debug!(path = %path, error = %err, "Image rejected by intake validation");
        }
        result
    }

    fn check_image(&self, path: &str) -> Result<ImageCandidate, ValidationError> {
        let not_found = || ValidationError::ImageNotFound {
            path: path.to_string(),
        };
        let io_error = |source: io::Error| ValidationError::Io {
            path: path.to_string(),
            source,
        };

        // Existence
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => not_found(),
            _ => io_error(e),
        })?;
        let metadata = file.metadata().map_err(io_error)?;
        if !metadata.is_file() {
            return Err(not_found());
        }

        // Raw size
        let size = metadata.len();
        if size > self.policy.max_file_size {
            return Err(ValidationError::ImageTooLarge {
                path: path.to_string(),
                limit: SizeLimit::Bytes {
                    size,
                    max: self.policy.max_file_size,
                },
            });
        }

        // Encoded size, measured on the transport representation
        let encoded_size = encoded_size(size);
        if encoded_size > self.policy.max_base64_size {
            return Err(ValidationError::EncodedPayloadTooLarge {
                path: path.to_string(),
                encoded_size,
                max: self.policy.max_base64_size,
            });
        }

        // Resolution, from the image header only
        let (width, height) = ImageReader::new(BufReader::new(file))
            .with_guessed_format()
            .map_err(io_error)?
            .into_dimensions()
            .map_err(|e| match e {
                ImageError::IoError(io_err)
                    if !matches!(
                        io_err.kind(),
                        io::ErrorKind::UnexpectedEof | io::ErrorKind::InvalidData
                    ) =>
                {
                    io_error(io_err)
                }
                other => ValidationError::InvalidImageFormat {
                    path: path.to_string(),
                    source: other,
                },
            })?;

        let pixels = width as u64 * height as u64;
        if pixels > self.policy.max_pixels {
            return Err(ValidationError::ImageTooLarge {
                path: path.to_string(),
                limit: SizeLimit::Pixels {
                    pixels,
                    max: self.policy.max_pixels,
                },
            });
        }

        Ok(ImageCandidate {
            path: path.to_string(),
            size_bytes: size,
            width,
            height,
        })
    }
}

/// Length of the padded standard base64 encoding of `raw_len` bytes
pub fn encoded_size(raw_len: u64) -> u64 {
    usize::try_from(raw_len)
        .ok()
        .and_then(|len| base64::encoded_len(len, true))
        .map(|len| len as u64)
        .unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use pixrelay_core::ErrorMetadata;
    use std::io::Write;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> String {
        let path = dir.join(name);
        RgbImage::from_pixel(width, height, Rgb([200, 100, 50]))
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();
        path.to_string_lossy().into_owned()
    }

    /// A file of the given length whose contents are never read
    fn write_sparse(dir: &Path, name: &str, len: u64) -> String {
        let path = dir.join(name);
        let file = File::create(&path).unwrap();
        file.set_len(len).unwrap();
        path.to_string_lossy().into_owned()
    }

    /// PPM header only: the decoder learns the dimensions without any pixel data
    fn write_ppm_header(dir: &Path, name: &str, width: u32, height: u32) -> String {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        write!(file, "P6\n{} {}\n255\n", width, height).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_accepts_valid_batch() {
        let dir = TempDir::new().unwrap();
        let a = write_png(dir.path(), "a.png", 40, 30);
        let b = write_png(dir.path(), "b.png", 10, 20);

        let candidates = IntakeValidator::default().validate(&[a.clone(), b]).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].path, a);
        assert_eq!((candidates[0].width, candidates[0].height), (40, 30));
        assert_eq!(candidates[1].pixel_count(), 200);
    }

    #[test]
    fn test_empty_batch_rejected() {
        let paths: [&str; 0] = [];
        let err = IntakeValidator::default().validate(&paths).unwrap_err();
        assert!(matches!(err, ValidationError::NoImages));
        assert!(err.path().is_none());

        let report = IntakeValidator::default().validate_all(&paths);
        assert!(!report.is_valid());
        assert!(matches!(report.batch_error(), Some(ValidationError::NoImages)));

        let app: AppError = err.into();
        assert_eq!(app.error_code(), "NO_IMAGES");
    }

    #[test]
    fn test_too_many_images_reads_nothing() {
        // None of these paths exist; the count check must fire first
        let paths: Vec<String> = (0..6).map(|i| format!("/nonexistent/{}.jpg", i)).collect();
        let err = IntakeValidator::default().validate(&paths).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::TooManyImages { count: 6, max: 5 }
        ));
    }

    #[test]
    fn test_five_images_allowed() {
        let dir = TempDir::new().unwrap();
        let paths: Vec<String> = (0..5)
            .map(|i| write_png(dir.path(), &format!("{}.png", i), 4, 4))
            .collect();
        assert_eq!(IntakeValidator::default().validate(&paths).unwrap().len(), 5);
    }

    #[test]
    fn test_missing_image() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.jpg").to_string_lossy().into_owned();
        let err = IntakeValidator::default().validate(&[missing.clone()]).unwrap_err();
        assert!(matches!(err, ValidationError::ImageNotFound { .. }));
        assert_eq!(err.path(), Some(missing.as_str()));
    }

    #[test]
    fn test_directory_is_not_an_image() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_string_lossy().into_owned();
        let err = IntakeValidator::default().validate_image(&path).unwrap_err();
        assert!(matches!(err, ValidationError::ImageNotFound { .. }));
    }

    #[test]
    fn test_raw_size_checked_before_encoded_size() {
        let dir = TempDir::new().unwrap();
        let path = write_sparse(dir.path(), "huge.jpg", 21 * 1024 * 1024);
        let err = IntakeValidator::default().validate_image(&path).unwrap_err();
        match err {
            ValidationError::ImageTooLarge {
                limit: SizeLimit::Bytes { size, max },
                ..
            } => {
                assert_eq!(size, 21 * 1024 * 1024);
                assert_eq!(max, 20 * 1024 * 1024);
            }
            other => panic!("Expected raw ImageTooLarge, got {:?}", other),
        }
    }

    #[test]
    fn test_encoded_size_limit() {
        let dir = TempDir::new().unwrap();
        // 3.5 MiB raw is well under 20 MiB but ~4.67 MiB once base64-encoded
        let path = write_sparse(dir.path(), "big.jpg", 3_670_016);
        let err = IntakeValidator::default().validate_image(&path).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::EncodedPayloadTooLarge { .. }
        ));
        assert!(err.to_string().contains("big.jpg"));

        let app: AppError = err.into();
        assert_eq!(app.error_code(), "ENCODED_PAYLOAD_TOO_LARGE");
        assert!(app.client_message().contains("exceeds 4MB request limit"));
    }

    #[test]
    fn test_resolution_limit_with_small_file() {
        let dir = TempDir::new().unwrap();
        let path = write_ppm_header(dir.path(), "wide.ppm", 6000, 6000);
        let err = IntakeValidator::default().validate_image(&path).unwrap_err();
        match err {
            ValidationError::ImageTooLarge {
                limit: SizeLimit::Pixels { pixels, max },
                ..
            } => {
                assert_eq!(pixels, 36_000_000);
                assert_eq!(max, 33_177_600);
            }
            other => panic!("Expected resolution ImageTooLarge, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_format_is_distinct_from_io() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.jpg");
        std::fs::write(&path, b"definitely not an image").unwrap();
        let err = IntakeValidator::default()
            .validate_image(&path.to_string_lossy())
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidImageFormat { .. }));

        let app: AppError = err.into();
        assert_eq!(app.error_code(), "INVALID_IMAGE_FORMAT");
    }

    #[test]
    fn test_fail_fast_stops_at_first_failure() {
        let dir = TempDir::new().unwrap();
        let good = write_png(dir.path(), "good.png", 4, 4);
        let missing = dir.path().join("gone.png").to_string_lossy().into_owned();
        let bad = dir.path().join("bad.png");
        std::fs::write(&bad, b"garbage").unwrap();
        let bad = bad.to_string_lossy().into_owned();

        let err = IntakeValidator::default()
            .validate(&[good, missing.clone(), bad])
            .unwrap_err();
        assert_eq!(err.path(), Some(missing.as_str()));
    }

    #[test]
    fn test_validate_all_collects_every_failure() {
        let dir = TempDir::new().unwrap();
        let good = write_png(dir.path(), "good.png", 4, 4);
        let missing = dir.path().join("gone.png").to_string_lossy().into_owned();
        let bad = dir.path().join("bad.png");
        std::fs::write(&bad, b"garbage").unwrap();
        let bad = bad.to_string_lossy().into_owned();

        let report = IntakeValidator::default().validate_all(&[good, missing, bad]);
        assert!(!report.is_valid());
        assert_eq!(report.outcomes().len(), 3);
        assert!(report.outcomes()[0].result.is_ok());
        assert_eq!(report.outcomes()[2].index, 3);
        assert_eq!(report.errors().count(), 2);
        assert!(matches!(
            report.into_result(),
            Err(ValidationError::ImageNotFound { .. })
        ));
    }

    #[test]
    fn test_validate_all_count_check_short_circuits() {
        let paths: Vec<String> = (0..7).map(|i| format!("/nonexistent/{}.png", i)).collect();
        let report = IntakeValidator::default().validate_all(&paths);
        assert!(report.outcomes().is_empty());
        assert!(matches!(
            report.batch_error(),
            Some(ValidationError::TooManyImages { count: 7, .. })
        ));
    }

    #[test]
    fn test_encoded_size() {
        assert_eq!(encoded_size(0), 0);
        assert_eq!(encoded_size(1), 4);
        assert_eq!(encoded_size(3), 4);
        assert_eq!(encoded_size(4), 8);
        assert_eq!(encoded_size(3 * 1024 * 1024), 4 * 1024 * 1024);
    }

    #[test]
    fn test_app_error_conversion_names_path() {
        let err = ValidationError::ImageTooLarge {
            path: "uploads/x.jpg".to_string(),
            limit: SizeLimit::Pixels {
                pixels: 36_000_000,
                max: 33_177_600,
            },
        };
        let app: AppError = err.into();
        assert_eq!(app.error_code(), "IMAGE_TOO_LARGE");
        assert!(app.client_message().contains("uploads/x.jpg"));
        assert!(app.client_message().contains("36000000"));
    }
}
