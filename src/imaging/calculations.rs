//! Pure geometry for the transform steps.
//!
//! All functions here are pure and testable without any I/O or images.
//! Coordinates are in source pixels unless a name says otherwise.

use super::params::{CropRect, Position};

/// Resolution every raster is assumed to have before a DPI change.
pub const BASE_DPI: u32 = 72;

/// Where a scaled image lands on the output canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Recompute the target box from the source aspect ratio.
///
/// When `maintain_aspect` is set, one of the two explicit dimensions is
/// overridden: if the box is comparatively wider than the source
/// (`tw/th > sw/sh`) the width is recomputed from the height, otherwise the
/// height is recomputed from the width.
///
/// # Examples
/// ```
/// # use pixelsmith::imaging::effective_target;
/// // 2:1 source into an 800x800 box → height follows the width
/// assert_eq!(effective_target((2000, 1000), (800, 800), true), (800, 400));
/// // without the flag the box is taken literally
/// assert_eq!(effective_target((2000, 1000), (800, 800), false), (800, 800));
/// ```
pub fn effective_target(source: (u32, u32), target: (u32, u32), maintain_aspect: bool) -> (u32, u32) {
    if !maintain_aspect {
        return target;
    }
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;
    let src_ratio = src_w as f64 / src_h as f64;
    let tgt_ratio = tgt_w as f64 / tgt_h as f64;

    if tgt_ratio > src_ratio {
        let w = (tgt_h as f64 * src_ratio).round().max(1.0) as u32;
        (w, tgt_h)
    } else {
        let h = (tgt_w as f64 / src_ratio).round().max(1.0) as u32;
        (tgt_w, h)
    }
}

/// Scale-to-fit placement inside a box, centred.
///
/// `scale = min(tw/sw, th/sh)`; the remainder of the box is letterbox.
pub fn contain_placement(source: (u32, u32), target: (u32, u32)) -> Placement {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;
    let scale = (tgt_w as f64 / src_w as f64).min(tgt_h as f64 / src_h as f64);

    let width = ((src_w as f64 * scale).round() as u32).clamp(1, tgt_w);
    let height = ((src_h as f64 * scale).round() as u32).clamp(1, tgt_h);
    Placement {
        x: (tgt_w - width) / 2,
        y: (tgt_h - height) / 2,
        width,
        height,
    }
}

/// Calculate dimensions needed to cover a target area (resize before crop).
///
/// Returns dimensions that completely cover the target area while maintaining
/// the source aspect ratio. One dimension will match exactly, the other may exceed.
///
/// # Arguments
/// * `source` - Original image dimensions (width, height)
/// * `target` - Target area dimensions (width, height)
///
/// # Returns
/// * `(width, height)` - Cover dimensions (at least one matches target)
pub fn calculate_cover_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    if src_aspect > tgt_aspect {
        // Source is wider: height matches, width overflows
        let w = ((tgt_h as f64 * src_aspect).round() as u32).max(tgt_w);
        (w, tgt_h)
    } else {
        let h = ((tgt_w as f64 / src_aspect).round() as u32).max(tgt_h);
        (tgt_w, h)
    }
}

/// A rectangle in on-screen coordinates, as drawn over a scaled preview.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Per-axis factors that map display coordinates onto source pixels.
///
/// Each axis is independent: a preview box can constrain one axis and
/// leave the other free, so the two factors need not agree.
pub fn display_scale_factors(displayed: (u32, u32), natural: (u32, u32)) -> (f64, f64) {
    let axis = |natural: u32, displayed: u32| {
        if displayed == 0 {
            1.0
        } else {
            natural as f64 / displayed as f64
        }
    };
    (axis(natural.0, displayed.0), axis(natural.1, displayed.1))
}

/// Translate an on-screen rectangle into a source-pixel crop rectangle.
///
/// # Examples
/// ```
/// # use pixelsmith::imaging::{scale_rect_to_source, CropRect, DisplayRect};
/// let on_screen = DisplayRect { x: 100.0, y: 50.0, width: 300.0, height: 300.0 };
/// let rect = scale_rect_to_source(on_screen, (500, 400), (1000, 800));
/// assert_eq!(rect, CropRect { x: 200, y: 100, width: 600, height: 600 });
/// ```
pub fn scale_rect_to_source(rect: DisplayRect, displayed: (u32, u32), natural: (u32, u32)) -> CropRect {
    let (fx, fy) = display_scale_factors(displayed, natural);
    let px = |v: f64| v.max(0.0).round() as u32;
    CropRect {
        x: px(rect.x * fx),
        y: px(rect.y * fy),
        width: px(rect.width * fx),
        height: px(rect.height * fy),
    }
}

/// Clip a crop rectangle to the source bounds.
///
/// `width = min(requested, source_width - x)`, same for height. A rectangle
/// that starts outside the source comes back with zero area.
pub fn clamp_crop(source: (u32, u32), rect: CropRect) -> CropRect {
    let (src_w, src_h) = source;
    CropRect {
        x: rect.x,
        y: rect.y,
        width: rect.width.min(src_w.saturating_sub(rect.x)),
        height: rect.height.min(src_h.saturating_sub(rect.y)),
    }
}

/// Top-left corner of a `content` box placed on a `surface`.
///
/// Named anchors keep `padding` from the edges they touch; centred axes
/// ignore it. `Custom` puts the corner at `custom` percent of the surface.
/// The result can be negative when the box is larger than the surface.
pub fn anchor_origin(
    position: Position,
    surface: (u32, u32),
    content: (u32, u32),
    padding: u32,
    custom: (f32, f32),
) -> (i32, i32) {
    let (sw, sh) = (surface.0 as i32, surface.1 as i32);
    let (cw, ch) = (content.0 as i32, content.1 as i32);
    let pad = padding as i32;

    let left = pad;
    let h_center = (sw - cw) / 2;
    let right = sw - cw - pad;
    let top = pad;
    let v_center = (sh - ch) / 2;
    let bottom = sh - ch - pad;

    match position {
        Position::TopLeft => (left, top),
        Position::TopCenter => (h_center, top),
        Position::TopRight => (right, top),
        Position::CenterLeft => (left, v_center),
        Position::Center => (h_center, v_center),
        Position::CenterRight => (right, v_center),
        Position::BottomLeft => (left, bottom),
        Position::BottomCenter => (h_center, bottom),
        Position::BottomRight => (right, bottom),
        Position::Custom => (
            (sw as f32 * custom.0 / 100.0).round() as i32,
            (sh as f32 * custom.1 / 100.0).round() as i32,
        ),
    }
}

/// Output dimensions for a DPI change: `round(w·f) × round(h·f)` with
/// `f = dpi / 72`.
pub fn dpi_dimensions(source: (u32, u32), dpi: u32) -> (u32, u32) {
    let factor = dpi as f64 / BASE_DPI as f64;
    (
        ((source.0 as f64 * factor).round() as u32).max(1),
        ((source.1 as f64 * factor).round() as u32).max(1),
    )
}

/// Shrink so the longer edge is at most `max_edge`. Never upscales.
pub fn fit_longest_edge(source: (u32, u32), max_edge: u32) -> (u32, u32) {
    let (w, h) = source;
    let longer = w.max(h);
    if longer <= max_edge || max_edge == 0 {
        return source;
    }
    let ratio = max_edge as f64 / longer as f64;
    if w >= h {
        (max_edge, ((h as f64 * ratio).round() as u32).max(1))
    } else {
        (((w as f64 * ratio).round() as u32).max(1), max_edge)
    }
}

/// Fill in whichever of width/height the caller left out.
///
/// With aspect maintained the missing side follows the source ratio;
/// without it the missing side keeps its source value. When both are given
/// they are used as-is.
pub fn derive_dimensions(
    source: (u32, u32),
    width: Option<u32>,
    height: Option<u32>,
    maintain_aspect: bool,
) -> (u32, u32) {
    let (src_w, src_h) = source;
    match (width, height) {
        (None, None) => source,
        (Some(w), None) if maintain_aspect => {
            (w, ((w as f64 * src_h as f64 / src_w as f64).round() as u32).max(1))
        }
        (None, Some(h)) if maintain_aspect => {
            (((h as f64 * src_w as f64 / src_h as f64).round() as u32).max(1), h)
        }
        (Some(w), None) => (w, src_h),
        (None, Some(h)) => (src_w, h),
        (Some(w), Some(h)) => (w, h),
    }
}

/// How many `tile` copies fit on a `sheet` as `(columns, rows)`.
pub fn sheet_grid(sheet: (u32, u32), tile: (u32, u32)) -> (u32, u32) {
    if tile.0 == 0 || tile.1 == 0 {
        return (0, 0);
    }
    (sheet.0 / tile.0, sheet.1 / tile.1)
}
