use serde::Serialize;

/// Maximum number of images accepted in one request
pub const MAX_IMAGES: usize = 5;
/// Maximum raw file size (20 MiB)
pub const MAX_FILE_SIZE: u64 = 20 * 1024 * 1024;
/// Maximum size of the base64 representation (4 MiB)
pub const MAX_BASE64_SIZE: u64 = 4 * 1024 * 1024;
/// Maximum pixel count (≈33 megapixels)
pub const MAX_PIXELS: u64 = 33_177_600;

/// Default bound applied by the request assembler when downscaling
pub const DEFAULT_MAX_DIMENSION: u32 = 800;
/// Default JPEG quality used when re-encoding for the model
pub const DEFAULT_JPEG_QUALITY: u8 = 60;

/// A local image file that passed every intake check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageCandidate {
    pub path: String,
    pub size_bytes: u64,
    pub width: u32,
    pub height: u32,
}

impl ImageCandidate {
    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Intake limits enforced before any image leaves the process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationPolicy {
    pub max_images: usize,
    pub max_file_size: u64,
    pub max_base64_size: u64,
    pub max_pixels: u64,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            max_images: MAX_IMAGES,
            max_file_size: MAX_FILE_SIZE,
            max_base64_size: MAX_BASE64_SIZE,
            max_pixels: MAX_PIXELS,
        }
    }
}

/// Which dimension the resize bound applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeBound {
    /// Bound the width only; height follows the aspect ratio
    #[default]
    Width,
    /// Bound whichever edge is longer
    LongestEdge,
}

/// Resize/re-encode settings for images sent to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblyOptions {
    pub max_dimension: u32,
    pub bound: ResizeBound,
    pub jpeg_quality: u8,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
            bound: ResizeBound::Width,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}
