use anyhow::{Context, Result};
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageReader};
use pixrelay_core::models::{AssemblyOptions, ResizeBound};
use std::io::Cursor;

/// An image re-encoded for the model service
#[derive(Debug, Clone)]
pub struct CompressedImage {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
}

/// Downscales and re-encodes images to keep request payloads small
pub struct ImageCompressor;

impl ImageCompressor {
    /// Target dimensions for an image under the given bound. Never upscales.
    pub fn calculate_dimensions(
        orig_width: u32,
        orig_height: u32,
        max_dimension: u32,
        bound: ResizeBound,
    ) -> (u32, u32) {
        let bounded_edge = match bound {
            ResizeBound::Width => orig_width,
            ResizeBound::LongestEdge => orig_width.max(orig_height),
        };

        if bounded_edge <= max_dimension || bounded_edge == 0 {
            return (orig_width, orig_height);
        }

        let scale = max_dimension as f64 / bounded_edge as f64;
        let w = (orig_width as f64 * scale).round() as u32;
        let h = (orig_height as f64 * scale).round() as u32;
        (w.max(1), h.max(1))
    }

    /// Select appropriate filter type based on resize ratio
    pub fn select_filter(
        orig_width: u32,
        orig_height: u32,
        new_width: u32,
        new_height: u32,
    ) -> FilterType {
        let width_ratio = orig_width as f32 / new_width as f32;
        let height_ratio = orig_height as f32 / new_height as f32;
        let max_ratio = width_ratio.max(height_ratio);

        if max_ratio > 2.0 {
            FilterType::Triangle
        } else if max_ratio > 1.5 {
            FilterType::CatmullRom
        } else {
            FilterType::Lanczos3
        }
    }

    /// Downscale under the configured bound, or return the image untouched
    pub fn downscale(img: DynamicImage, options: &AssemblyOptions) -> DynamicImage {
        let (orig_width, orig_height) = img.dimensions();
        let (width, height) = Self::calculate_dimensions(
            orig_width,
            orig_height,
            options.max_dimension,
            options.bound,
        );

        if (width, height) == (orig_width, orig_height) {
            return img;
        }

        let filter = Self::select_filter(orig_width, orig_height, width, height);
        img.resize_exact(width, height, filter)
    }

    /// Encode as baseline JPEG. Alpha is dropped since JPEG cannot carry it.
    pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Bytes> {
        let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
        let mut buf = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
        rgb.write_with_encoder(encoder)
            .context("Failed to encode JPEG")?;
        Ok(Bytes::from(buf))
    }

    /// Decode, downscale and re-encode raw image bytes
    pub fn compress_for_model(data: &[u8], options: &AssemblyOptions) -> Result<CompressedImage> {
        let img = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .context("Failed to detect image format")?
            .decode()
            .context("Failed to decode image")?;

        let resized = Self::downscale(img, options);
        let (width, height) = resized.dimensions();
        let data = Self::encode_jpeg(&resized, options.jpeg_quality)?;

        Ok(CompressedImage {
            data,
            width,
            height,
        })
    }
}
