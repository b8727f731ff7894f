//! Raster surfaces, source assets and the format enums shared by the codec.
//!
//! A [`RasterSurface`] is the only mutable pixel buffer in the pipeline. Each
//! job acquires its own through [`RasterSurface::acquire`] (or the decoder)
//! and drops it once the encoder has produced bytes, so no two jobs can ever
//! draw into the same buffer.

use super::backend::ImagingError;
use image::{ImageFormat, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Largest upload the pipeline accepts (50 MiB).
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Upper bound on surface area. 256 Mpx of RGBA is already 1 GiB.
pub const MAX_SURFACE_PIXELS: u64 = 1 << 28;

/// Raster formats the decoder accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Jpeg,
    Png,
    WebP,
    Gif,
    Bmp,
}

impl SourceFormat {
    /// Map a declared MIME type onto an accepted format.
    ///
    /// `image/jpg` is not a registered type but browsers and upload widgets
    /// emit it, so it is accepted as an alias.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/webp" => Some(Self::WebP),
            "image/gif" => Some(Self::Gif),
            "image/bmp" => Some(Self::Bmp),
            _ => None,
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::WebP),
            "gif" => Some(Self::Gif),
            "bmp" => Some(Self::Bmp),
            _ => None,
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
        }
    }

    pub(crate) fn image_format(self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
            Self::WebP => ImageFormat::WebP,
            Self::Gif => ImageFormat::Gif,
            Self::Bmp => ImageFormat::Bmp,
        }
    }

    /// Output format used when the caller asks to keep the source format.
    /// GIF has no encoder here, so it becomes PNG.
    pub fn default_output(self) -> OutputFormat {
        match self {
            Self::Jpeg => OutputFormat::Jpeg,
            Self::Png | Self::Gif => OutputFormat::Png,
            Self::WebP => OutputFormat::WebP,
            Self::Bmp => OutputFormat::Bmp,
        }
    }
}

/// Formats the encoder can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
    Bmp,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Bmp => "bmp",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
            Self::Bmp => "image/bmp",
        }
    }

    /// Whether the quality factor changes the encoded output.
    pub fn is_lossy(self) -> bool {
        matches!(self, Self::Jpeg | Self::WebP)
    }

    /// JPEG cannot store alpha; everything else keeps it.
    pub fn supports_alpha(self) -> bool {
        !matches!(self, Self::Jpeg)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::WebP => "WebP",
            Self::Bmp => "BMP",
        };
        f.write_str(label)
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "webp" => Ok(Self::WebP),
            "bmp" => Ok(Self::Bmp),
            other => Err(format!("unsupported output format: {other}")),
        }
    }
}

/// An uploaded file: immutable bytes plus the MIME type the uploader declared.
#[derive(Debug, Clone)]
pub struct SourceAsset {
    name: String,
    mime: String,
    bytes: Arc<[u8]>,
}

impl SourceAsset {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, declaring its MIME type from the extension.
    ///
    /// Unknown extensions get `application/octet-stream` and are rejected
    /// later by [`validate`](Self::validate) or the decoder.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let mime = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(SourceFormat::from_extension)
            .map_or("application/octet-stream", SourceFormat::mime);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, mime, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn byte_length(&self) -> usize {
        self.bytes.len()
    }

    pub fn format(&self) -> Option<SourceFormat> {
        SourceFormat::from_mime(&self.mime)
    }

    /// Upload-time checks: accepted MIME type and the 50 MiB ceiling.
    pub fn validate(&self) -> Result<SourceFormat, ImagingError> {
        let format = self
            .format()
            .ok_or_else(|| ImagingError::UnsupportedFormat(self.mime.clone()))?;
        if self.bytes.len() > MAX_UPLOAD_BYTES {
            return Err(ImagingError::UnsupportedFormat(format!(
                "{} is {} bytes, limit is {MAX_UPLOAD_BYTES}",
                self.name,
                self.bytes.len()
            )));
        }
        Ok(format)
    }
}

/// An owned RGBA8 pixel grid.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterSurface {
    pixels: RgbaImage,
}

impl RasterSurface {
    /// Allocate a fully transparent surface.
    pub fn acquire(width: u32, height: u32) -> Result<Self, ImagingError> {
        check_dimensions(width, height)?;
        Ok(Self {
            pixels: RgbaImage::new(width, height),
        })
    }

    /// Allocate a surface filled with one colour.
    pub fn filled(width: u32, height: u32, color: Rgba<u8>) -> Result<Self, ImagingError> {
        check_dimensions(width, height)?;
        Ok(Self {
            pixels: RgbaImage::from_pixel(width, height, color),
        })
    }

    /// Adopt an existing pixel buffer.
    pub fn from_rgba(pixels: RgbaImage) -> Result<Self, ImagingError> {
        check_dimensions(pixels.width(), pixels.height())?;
        Ok(Self { pixels })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        *self.pixels.get_pixel(x, y)
    }

    pub fn as_rgba(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn as_rgba_mut(&mut self) -> &mut RgbaImage {
        &mut self.pixels
    }

    pub fn into_rgba(self) -> RgbaImage {
        self.pixels
    }
}

pub(crate) fn check_dimensions(width: u32, height: u32) -> Result<(), ImagingError> {
    if width == 0 || height == 0 {
        return Err(ImagingError::CanvasUnavailable(format!(
            "cannot allocate a {width}x{height} surface"
        )));
    }
    if u64::from(width) * u64::from(height) > MAX_SURFACE_PIXELS {
        return Err(ImagingError::CanvasUnavailable(format!(
            "{width}x{height} exceeds the {MAX_SURFACE_PIXELS} pixel limit"
        )));
    }
    Ok(())
}
