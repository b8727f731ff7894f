//! Pure Rust codec built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, WebP, GIF, BMP) | `image::load_from_memory_with_format` |
//! | Encode → JPEG | `JpegEncoder::new_with_quality`, alpha flattened onto white, JFIF density |
//! | Encode → PNG | `PngEncoder` (quality ignored) |
//! | Encode → WebP | `WebPEncoder::new_lossless` over RGB quantised by quality |
//! | Encode → BMP | `BmpEncoder` (quality ignored) |

use super::backend::{ImageCodec, ImagingError};
use super::operations::flatten;
use super::params::{Color, EncodeRequest};
use super::surface::{OutputFormat, RasterSurface, SourceAsset};
use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::{JpegEncoder, PixelDensity};
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder};
use tracing::{debug, instrument};

/// Production codec.
///
/// See the [module docs](self) for the crate-to-operation mapping.
#[derive(Debug, Default, Clone, Copy)]
pub struct RustCodec;

impl RustCodec {
    pub fn new() -> Self {
        Self
    }
}

impl ImageCodec for RustCodec {
    #[instrument(skip(self, asset), fields(name = asset.name(), bytes = asset.byte_length()))]
    fn decode(&self, asset: &SourceAsset) -> Result<RasterSurface, ImagingError> {
        let format = asset
            .format()
            .ok_or_else(|| ImagingError::UnsupportedFormat(asset.mime().to_string()))?;
        let image = image::load_from_memory_with_format(asset.bytes(), format.image_format())
            .map_err(|e| ImagingError::DecodeFailure {
                name: asset.name().to_string(),
                reason: e.to_string(),
            })?;
        debug!(width = image.width(), height = image.height(), "decoded");
        RasterSurface::from_rgba(image.to_rgba8())
    }

    #[instrument(skip(self, surface), fields(width = surface.width(), height = surface.height()))]
    fn encode(
        &self,
        surface: &RasterSurface,
        request: &EncodeRequest,
    ) -> Result<Vec<u8>, ImagingError> {
        let mut buffer = Vec::new();
        let (width, height) = surface.dimensions();
        let failed = |e: image::ImageError| ImagingError::EncodeFailure {
            format: request.format,
            reason: e.to_string(),
        };

        match request.format {
            OutputFormat::Jpeg => {
                // JPEG has no alpha channel.
                let opaque = flatten(surface.clone(), Color::WHITE)?;
                let rgb = DynamicImage::ImageRgba8(opaque.into_rgba()).to_rgb8();
                let mut encoder =
                    JpegEncoder::new_with_quality(&mut buffer, request.quality.percent());
                if let Some(dpi) = request.dpi {
                    encoder.set_pixel_density(PixelDensity::dpi(dpi));
                }
                encoder
                    .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
                    .map_err(failed)?;
            }
            OutputFormat::Png => {
                PngEncoder::new(&mut buffer)
                    .write_image(
                        surface.as_rgba().as_raw(),
                        width,
                        height,
                        ExtendedColorType::Rgba8,
                    )
                    .map_err(failed)?;
            }
            OutputFormat::WebP => {
                let mut rgba = surface.as_rgba().clone();
                quantize_rgb_for_webp(rgba.as_mut(), request.quality.percent());
                WebPEncoder::new_lossless(&mut buffer)
                    .write_image(rgba.as_raw(), width, height, ExtendedColorType::Rgba8)
                    .map_err(failed)?;
            }
            OutputFormat::Bmp => {
                BmpEncoder::new(&mut buffer)
                    .write_image(
                        surface.as_rgba().as_raw(),
                        width,
                        height,
                        ExtendedColorType::Rgba8,
                    )
                    .map_err(failed)?;
            }
        }

        if buffer.is_empty() {
            return Err(ImagingError::EncodeFailure {
                format: request.format,
                reason: "encoder returned no bytes".into(),
            });
        }
        debug!(format = %request.format, bytes = buffer.len(), "encoded");
        Ok(buffer)
    }
}

/// Reduce RGB precision so the lossless WebP encoder compresses harder at
/// lower quality. Alpha is left alone. Quality 100 is a no-op.
fn quantize_rgb_for_webp(data: &mut [u8], quality: u8) {
    if quality >= 100 {
        return;
    }
    let levels = webp_levels_from_quality(quality);
    let step = 255.0 / (levels as f32 - 1.0);
    for pixel in data.chunks_exact_mut(4) {
        for channel in pixel.iter_mut().take(3) {
            let bucket = (f32::from(*channel) / step).round();
            *channel = (bucket * step).round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// Quadratic map from quality to palette levels per channel (2..=256).
fn webp_levels_from_quality(quality: u8) -> u16 {
    let normalized = f32::from(quality.clamp(1, 100)) / 100.0;
    (2.0 + normalized * normalized * 254.0).round().clamp(2.0, 256.0) as u16
}
