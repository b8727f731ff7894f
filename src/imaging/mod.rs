//! Raster core: surfaces, codec, geometry and transform steps.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::load_from_memory_with_format` → RGBA8 |
//! | **Resize** | `image::imageops::resize` (Lanczos3 by default) |
//! | **Crop** | `image::imageops::crop_imm` |
//! | **Watermark text** | `font8x8` bitmap glyphs, composited by hand |
//! | **Feather / fill** | row-parallel loops on `rayon` |
//! | **Encode** | `image` JPEG / PNG / WebP / BMP encoders |
//!
//! The module is split into:
//! - **Surface**: [`RasterSurface`], [`SourceAsset`] and the format enums
//! - **Calculations**: pure dimension math (unit testable)
//! - **Parameters**: data structures describing each step
//! - **Backend**: [`ImageCodec`] trait + [`ImagingError`]; [`RustCodec`] implements it
//! - **Operations**: the transform steps themselves
//! - **Text**: coverage masks for glyphs, plates and shadows

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_codec;
mod surface;
pub mod text;

pub use backend::{ErrorKind, ImageCodec, ImagingError};
pub use calculations::{
    BASE_DPI, DisplayRect, Placement, anchor_origin, calculate_cover_dimensions, clamp_crop,
    contain_placement, derive_dimensions, display_scale_factors, dpi_dimensions,
    effective_target, fit_longest_edge, scale_rect_to_source, sheet_grid,
};
pub use params::{
    BackgroundFill, Color, CropRect, EncodeRequest, FeatherParams, FontStyle, FontWeight,
    Position, Quality, ResizeFilter, ResizeMode, ResizeParams, Shadow, WatermarkParams,
};
pub use rust_codec::RustCodec;
pub use surface::{
    MAX_SURFACE_PIXELS, MAX_UPLOAD_BYTES, OutputFormat, RasterSurface, SourceAsset, SourceFormat,
};
