//! Codec trait and the imaging error taxonomy.
//!
//! The [`ImageCodec`] trait is the seam between the pipeline and the pixel
//! codecs: decode an uploaded asset into a [`RasterSurface`], encode a
//! surface back into bytes. The production implementation is
//! [`RustCodec`](super::rust_codec::RustCodec). Tests swap in a recording
//! mock that can be told to fail on specific inputs.

use super::params::EncodeRequest;
use super::surface::{OutputFormat, RasterSurface, SourceAsset};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImagingError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("failed to decode {name}: {reason}")]
    DecodeFailure { name: String, reason: String },
    #[error("crop area is empty ({width}x{height})")]
    EmptyCropArea { width: u32, height: u32 },
    #[error("{format} encoder produced no output: {reason}")]
    EncodeFailure {
        format: OutputFormat,
        reason: String,
    },
    #[error("drawing surface unavailable: {0}")]
    CanvasUnavailable(String),
}

impl ImagingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Self::DecodeFailure { .. } => ErrorKind::DecodeFailure,
            Self::EmptyCropArea { .. } => ErrorKind::EmptyCropArea,
            Self::EncodeFailure { .. } => ErrorKind::EncodeFailure,
            Self::CanvasUnavailable(_) => ErrorKind::CanvasUnavailable,
        }
    }
}

/// Fieldless discriminant of [`ImagingError`], recorded in job results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    UnsupportedFormat,
    DecodeFailure,
    EmptyCropArea,
    EncodeFailure,
    CanvasUnavailable,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::UnsupportedFormat => "UnsupportedFormat",
            Self::DecodeFailure => "DecodeFailure",
            Self::EmptyCropArea => "EmptyCropArea",
            Self::EncodeFailure => "EncodeFailure",
            Self::CanvasUnavailable => "CanvasUnavailable",
        };
        f.write_str(name)
    }
}

/// Decoder + encoder pair used by the job runner.
///
/// `Sync` so a single codec can be shared by reference across the runner
/// and the rayon pool without wrapping.
pub trait ImageCodec: Sync {
    /// Decode a fully buffered asset into a fresh surface sized to the
    /// image's natural dimensions.
    fn decode(&self, asset: &SourceAsset) -> Result<RasterSurface, ImagingError>;

    /// Serialize a surface. An empty result is an [`ImagingError::EncodeFailure`].
    fn encode(
        &self,
        surface: &RasterSurface,
        request: &EncodeRequest,
    ) -> Result<Vec<u8>, ImagingError>;
}
