//! Transform steps.
//!
//! Every step has the shape `(RasterSurface, &Params) -> Result<RasterSurface>`:
//! it takes ownership of the job's surface and hands back the one the next
//! step should see. Geometry comes from [`calculations`](super::calculations);
//! nothing here knows about display coordinates or output formats.

use super::backend::ImagingError;
use super::calculations::{
    anchor_origin, calculate_cover_dimensions, clamp_crop, contain_placement, effective_target,
    fit_longest_edge as fit_dimensions, sheet_grid,
};
use super::params::{
    BackgroundFill, Color, CropRect, FeatherParams, FontStyle, FontWeight, ResizeMode,
    ResizeParams, WatermarkParams,
};
use super::surface::{RasterSurface, check_dimensions};
use super::text::{self, Mask, TextStyle};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use tracing::debug;

/// Result type for transform steps.
pub type Result<T> = std::result::Result<T, ImagingError>;

/// Gap between watermark text and the edge of its plate.
pub const PLATE_PADDING: u32 = 10;

// ============================================================================
// Geometry
// ============================================================================

/// Resize into a target box according to the resize mode.
///
/// - `contain`: scale to fit, centre on a canvas of exactly the box size,
///   letterbox with [`ResizeParams::letterbox`] (transparent if unset)
/// - `cover`: scale to cover, crop the overflow symmetrically
/// - `fill`: stretch each axis
///
/// With `maintain_aspect_ratio` set, `cover` and `fill` first recompute one
/// side of the box from the source aspect ratio.
pub fn resize(surface: RasterSurface, params: &ResizeParams) -> Result<RasterSurface> {
    let source = surface.dimensions();
    let requested = (params.width, params.height);
    if requested.0 == 0 || requested.1 == 0 {
        return Err(ImagingError::CanvasUnavailable(format!(
            "cannot resize to {}x{}",
            requested.0, requested.1
        )));
    }
    let filter = params.filter.filter_type();
    debug!(?source, ?requested, mode = ?params.mode, "resize");

    match params.mode {
        ResizeMode::Fill => {
            let (w, h) = effective_target(source, requested, params.maintain_aspect_ratio);
            scale_to(surface, w, h, filter)
        }
        ResizeMode::Cover => {
            let (w, h) = effective_target(source, requested, params.maintain_aspect_ratio);
            let (cover_w, cover_h) = calculate_cover_dimensions(source, (w, h));
            let scaled = scale_to(surface, cover_w, cover_h, filter)?;
            let x = (cover_w - w) / 2;
            let y = (cover_h - h) / 2;
            let cropped = imageops::crop_imm(scaled.as_rgba(), x, y, w, h).to_image();
            RasterSurface::from_rgba(cropped)
        }
        ResizeMode::Contain => {
            let placement = contain_placement(source, requested);
            let scaled = scale_to(surface, placement.width, placement.height, filter)?;
            let background = params.letterbox.unwrap_or(Color::TRANSPARENT);
            let mut canvas =
                RasterSurface::filled(requested.0, requested.1, background.to_pixel())?;
            imageops::replace(
                canvas.as_rgba_mut(),
                scaled.as_rgba(),
                i64::from(placement.x),
                i64::from(placement.y),
            );
            Ok(canvas)
        }
    }
}

fn scale_to(surface: RasterSurface, width: u32, height: u32, filter: FilterType) -> Result<RasterSurface> {
    if surface.dimensions() == (width, height) {
        return Ok(surface);
    }
    check_dimensions(width, height)?;
    RasterSurface::from_rgba(imageops::resize(surface.as_rgba(), width, height, filter))
}

/// Copy a source-pixel rectangle into a new surface.
///
/// The rectangle is clipped to the source first. Zero area after clipping is
/// [`ImagingError::EmptyCropArea`], never a 0×0 surface.
pub fn crop(surface: RasterSurface, rect: &CropRect) -> Result<RasterSurface> {
    let clipped = clamp_crop(surface.dimensions(), *rect);
    if clipped.width == 0 || clipped.height == 0 {
        return Err(ImagingError::EmptyCropArea {
            width: clipped.width,
            height: clipped.height,
        });
    }
    debug!(?clipped, "crop");
    let out = imageops::crop_imm(
        surface.as_rgba(),
        clipped.x,
        clipped.y,
        clipped.width,
        clipped.height,
    )
    .to_image();
    RasterSurface::from_rgba(out)
}

/// Shrink so the longer edge is at most `max_edge`; smaller images pass through.
pub fn fit_longest_edge(surface: RasterSurface, max_edge: u32) -> Result<RasterSurface> {
    let (w, h) = fit_dimensions(surface.dimensions(), max_edge);
    scale_to(surface, w, h, FilterType::Lanczos3)
}

// ============================================================================
// Alpha
// ============================================================================

/// Box-blur the alpha of semi-transparent pixels.
///
/// Only pixels with `0 < alpha < 255` change; each takes the rounded mean
/// alpha of the `(2r+1)²` square around it. Pixels closer than `r` to the
/// border are left alone. Neighbourhoods read from a snapshot, so the result
/// does not depend on scan order.
pub fn feather_alpha(mut surface: RasterSurface, params: &FeatherParams) -> Result<RasterSurface> {
    let r = params.radius;
    let (w, h) = surface.dimensions();
    if r == 0 || w <= 2 * r || h <= 2 * r {
        return Ok(surface);
    }

    let alpha: Vec<u8> = surface.as_rgba().pixels().map(|p| p[3]).collect();
    let window = ((2 * r + 1) * (2 * r + 1)) as f32;
    let stride = w as usize * 4;

    surface
        .as_rgba_mut()
        .par_chunks_mut(stride)
        .enumerate()
        .filter(|(y, _)| *y as u32 >= r && (*y as u32) < h - r)
        .for_each(|(y, row)| {
            let y = y as u32;
            for x in r..w - r {
                let a = alpha[(y * w + x) as usize];
                if a == 0 || a == 255 {
                    continue;
                }
                let mut sum = 0u32;
                for ny in y - r..=y + r {
                    let base = (ny * w) as usize;
                    sum += alpha[base + (x - r) as usize..=base + (x + r) as usize]
                        .iter()
                        .map(|&v| u32::from(v))
                        .sum::<u32>();
                }
                row[x as usize * 4 + 3] = (sum as f32 / window).round() as u8;
            }
        });
    Ok(surface)
}

// ============================================================================
// Fill
// ============================================================================

/// Paint every fully transparent pixel.
///
/// `Color` writes the colour at full opacity; `Blur` writes the flat grey
/// [`BackgroundFill::BLUR_STAND_IN`]; `Transparent` leaves the surface as is.
/// Pixels with any alpha are untouched.
pub fn fill_background(mut surface: RasterSurface, fill: &BackgroundFill) -> Result<RasterSurface> {
    let color = match fill {
        BackgroundFill::Transparent => return Ok(surface),
        BackgroundFill::Color(c) => *c,
        BackgroundFill::Blur => BackgroundFill::BLUR_STAND_IN,
    };
    surface.as_rgba_mut().par_chunks_mut(4).for_each(|px| {
        if px[3] == 0 {
            px.copy_from_slice(&[color.r, color.g, color.b, 255]);
        }
    });
    Ok(surface)
}

/// Composite onto an opaque backdrop; every output pixel has alpha 255.
pub fn flatten(mut surface: RasterSurface, backdrop: Color) -> Result<RasterSurface> {
    let bg = [backdrop.r, backdrop.g, backdrop.b];
    surface.as_rgba_mut().par_chunks_mut(4).for_each(|px| {
        let a = u32::from(px[3]);
        for c in 0..3 {
            px[c] = ((u32::from(px[c]) * a + u32::from(bg[c]) * (255 - a) + 127) / 255) as u8;
        }
        px[3] = 255;
    });
    Ok(surface)
}

// ============================================================================
// Overlay
// ============================================================================

/// Straight-alpha RGBA layer built in local coordinates before placement.
struct Layer {
    pixels: RgbaImage,
}

impl Layer {
    fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
        }
    }

    /// Paint `color` through `mask`, its top-left at `(ox, oy)`.
    fn paint(&mut self, mask: &Mask, ox: i64, oy: i64, color: Color) {
        let (w, h) = self.pixels.dimensions();
        for my in 0..mask.height() {
            for mx in 0..mask.width() {
                let coverage = mask.get(mx, my);
                if coverage == 0 {
                    continue;
                }
                let (x, y) = (ox + i64::from(mx), oy + i64::from(my));
                if x < 0 || y < 0 || x >= i64::from(w) || y >= i64::from(h) {
                    continue;
                }
                let alpha = u32::from(coverage) * u32::from(color.a) / 255;
                blend_over(self.pixels.get_pixel_mut(x as u32, y as u32), color, alpha);
            }
        }
    }
}

/// Straight-alpha "over": `src` with `alpha` (0–255) onto `dst`.
fn blend_over(dst: &mut Rgba<u8>, src: Color, alpha: u32) {
    if alpha == 0 {
        return;
    }
    let src_a = alpha as f32 / 255.0;
    let dst_a = dst[3] as f32 / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);
    if out_a <= 0.0 {
        return;
    }
    let mix = |s: u8, d: u8| {
        ((s as f32 * src_a + d as f32 * dst_a * (1.0 - src_a)) / out_a)
            .round()
            .clamp(0.0, 255.0) as u8
    };
    *dst = Rgba([
        mix(src.r, dst[0]),
        mix(src.g, dst[1]),
        mix(src.b, dst[2]),
        (out_a * 255.0).round() as u8,
    ]);
}

/// Draw a text watermark.
///
/// Layers, bottom to top: plate shadow, plate, text shadow, text. They are
/// built on a local layer, then composited once with the global opacity so
/// plate and glyphs fade together. Rotation pivots on the centre of the
/// placed box (plate if present, else text).
pub fn watermark(mut surface: RasterSurface, params: &WatermarkParams) -> Result<RasterSurface> {
    if params.text.trim().is_empty() || params.opacity <= 0.0 {
        return Ok(surface);
    }

    let style = TextStyle::for_font_size(
        params.font_size,
        params.weight == FontWeight::Bold,
        params.style == FontStyle::Italic,
    );
    let inset = if params.background.is_some() {
        PLATE_PADDING
    } else {
        0
    };
    let blur_radius = params.shadow.map_or(0, |s| s.blur.div_ceil(2));
    let margin = params.shadow.map_or(Some(0), |s| {
        blur_radius.checked_add(s.offset_x.unsigned_abs().max(s.offset_y.unsigned_abs()))
    });
    let (content, margin, layer_size) =
        watermark_extent(text::measure(&params.text, style), inset, margin).ok_or_else(|| {
            ImagingError::CanvasUnavailable(format!(
                "watermark at font size {} does not fit a layer",
                params.font_size
            ))
        })?;
    check_dimensions(layer_size.0, layer_size.1)?;

    let glyphs = text::rasterize(&params.text, style)?;
    let m = i64::from(margin);
    let mut layer = Layer::new(layer_size.0, layer_size.1);

    let plate = params
        .background
        .map(|c| (text::rounded_rect(content.0, content.1, params.corner_radius), c));

    if let Some(shadow) = params.shadow {
        if let Some((mask, _)) = &plate {
            let soft = text::box_blur(mask, blur_radius);
            let r = i64::from(blur_radius);
            layer.paint(
                &soft,
                m + i64::from(shadow.offset_x) - r,
                m + i64::from(shadow.offset_y) - r,
                shadow.color,
            );
        }
    }
    if let Some((mask, color)) = &plate {
        layer.paint(mask, m, m, *color);
    }
    let text_origin = m + i64::from(inset);
    if let Some(shadow) = params.shadow {
        let soft = text::box_blur(&glyphs, blur_radius);
        let r = i64::from(blur_radius);
        layer.paint(
            &soft,
            text_origin + i64::from(shadow.offset_x) - r,
            text_origin + i64::from(shadow.offset_y) - r,
            shadow.color,
        );
    }
    layer.paint(&glyphs, text_origin, text_origin, params.color);

    let origin = anchor_origin(
        params.position,
        surface.dimensions(),
        content,
        params.padding,
        (params.custom_x, params.custom_y),
    );
    debug!(?origin, ?content, rotation = params.rotation_deg, "watermark");

    // Pivot in surface space and in layer space.
    let pivot = (
        origin.0 as f32 + content.0 as f32 / 2.0,
        origin.1 as f32 + content.1 as f32 / 2.0,
    );
    let local_pivot = (
        margin as f32 + content.0 as f32 / 2.0,
        margin as f32 + content.1 as f32 / 2.0,
    );
    composite_rotated(
        surface.as_rgba_mut(),
        &layer.pixels,
        pivot,
        local_pivot,
        params.rotation_deg.to_radians(),
        params.opacity.clamp(0.0, 1.0),
    );
    Ok(surface)
}

/// Content box and layer size for a watermark, with overflow as `None`.
fn watermark_extent(
    text: Option<(u32, u32)>,
    inset: u32,
    margin: Option<u32>,
) -> Option<((u32, u32), u32, (u32, u32))> {
    let (w, h) = text?;
    let margin = margin?;
    let pad = inset.checked_mul(2)?;
    let content = (w.checked_add(pad)?, h.checked_add(pad)?);
    let border = margin.checked_mul(2)?;
    let layer = (content.0.checked_add(border)?, content.1.checked_add(border)?);
    Some((content, margin, layer))
}

/// Composite `layer` onto `dst` rotated by `theta` about `pivot`.
///
/// Inverse-maps each destination pixel in the rotated bounding box back into
/// the layer and takes the nearest sample.
fn composite_rotated(
    dst: &mut RgbaImage,
    layer: &RgbaImage,
    pivot: (f32, f32),
    local_pivot: (f32, f32),
    theta: f32,
    opacity: f32,
) {
    let (cos_t, sin_t) = (theta.cos(), theta.sin());
    let (lw, lh) = layer.dimensions();
    let (dw, dh) = dst.dimensions();

    let corners = [(0.0, 0.0), (lw as f32, 0.0), (0.0, lh as f32), (lw as f32, lh as f32)];
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (f32::MAX, f32::MAX, f32::MIN, f32::MIN);
    for (cx, cy) in corners {
        let (dx, dy) = (cx - local_pivot.0, cy - local_pivot.1);
        let rx = dx * cos_t - dy * sin_t + pivot.0;
        let ry = dx * sin_t + dy * cos_t + pivot.1;
        min_x = min_x.min(rx);
        min_y = min_y.min(ry);
        max_x = max_x.max(rx);
        max_y = max_y.max(ry);
    }
    let x0 = min_x.floor().max(0.0) as u32;
    let y0 = min_y.floor().max(0.0) as u32;
    let x1 = (max_x.ceil().max(0.0) as u32).min(dw);
    let y1 = (max_y.ceil().max(0.0) as u32).min(dh);

    for y in y0..y1 {
        for x in x0..x1 {
            let dx = x as f32 + 0.5 - pivot.0;
            let dy = y as f32 + 0.5 - pivot.1;
            let lx = (dx * cos_t + dy * sin_t + local_pivot.0).floor();
            let ly = (-dx * sin_t + dy * cos_t + local_pivot.1).floor();
            if lx < 0.0 || ly < 0.0 || lx >= lw as f32 || ly >= lh as f32 {
                continue;
            }
            let src = layer.get_pixel(lx as u32, ly as u32);
            let alpha = (src[3] as f32 * opacity).round() as u32;
            blend_over(
                dst.get_pixel_mut(x, y),
                Color::rgb(src[0], src[1], src[2]),
                alpha,
            );
        }
    }
}

// ============================================================================
// Layout
// ============================================================================

/// Tile copies of the surface onto a sheet, row-major from the top-left.
///
/// `floor(sheet_w / w) × floor(sheet_h / h)` copies; the rest of the sheet
/// stays `background`.
pub fn tile_sheet(surface: RasterSurface, sheet: (u32, u32), background: Color) -> Result<RasterSurface> {
    let tile = surface.dimensions();
    let (cols, rows) = sheet_grid(sheet, tile);
    let mut canvas = RasterSurface::filled(sheet.0, sheet.1, background.to_pixel())?;
    for row in 0..rows {
        for col in 0..cols {
            imageops::replace(
                canvas.as_rgba_mut(),
                surface.as_rgba(),
                i64::from(col * tile.0),
                i64::from(row * tile.1),
            );
        }
    }
    debug!(cols, rows, "tile sheet");
    Ok(canvas)
}
