//! Coverage masks for watermark text, plates and shadows.
//!
//! Glyphs come from the `font8x8` basic set, scaled up with nearest-neighbour
//! so a watermark never depends on system fonts. A [`Mask`] is a single
//! channel of coverage (0 = empty, 255 = solid); colour is applied only when
//! the mask is composited.

use super::backend::ImagingError;
use super::surface::check_dimensions;
use font8x8::{BASIC_FONTS, UnicodeFonts};

/// Native glyph cell size of the bitmap face.
pub const GLYPH_SIZE: u32 = 8;

/// Horizontal shear applied per row for italic text.
const ITALIC_SHEAR: f32 = 0.2;

/// Single-channel coverage buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Mask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.data[(y * self.width + x) as usize]
    }

    /// Coverage at signed coordinates, zero outside the mask.
    pub fn sample(&self, x: i64, y: i64) -> u8 {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return 0;
        }
        self.get(x as u32, y as u32)
    }

    fn set(&mut self, x: u32, y: u32, value: u8) {
        let idx = (y * self.width + x) as usize;
        self.data[idx] = value;
    }

    /// Number of non-empty cells.
    pub fn covered(&self) -> usize {
        self.data.iter().filter(|&&v| v > 0).count()
    }
}

/// How glyphs are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextStyle {
    /// Pixel size of one glyph bit.
    pub scale: u32,
    pub bold: bool,
    pub italic: bool,
}

impl TextStyle {
    /// Pick the integer scale closest to a requested font size.
    pub fn for_font_size(font_size: u32, bold: bool, italic: bool) -> Self {
        let scale = ((font_size as f32 / GLYPH_SIZE as f32).round() as u32).max(1);
        Self {
            scale,
            bold,
            italic,
        }
    }

    fn bold_offset(self) -> u32 {
        if self.bold { (self.scale / 2).max(1) } else { 0 }
    }
}

fn glyph(ch: char) -> [u8; 8] {
    BASIC_FONTS
        .get(ch)
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

/// Size of the box [`rasterize`] would produce, or `None` when it does not
/// fit in `u32`. An empty string measures `(0, 0)`.
pub fn measure(text: &str, style: TextStyle) -> Option<(u32, u32)> {
    let scale = style.scale.max(1);
    let cell = GLYPH_SIZE.checked_mul(scale)?;
    let count = u32::try_from(text.chars().count()).ok()?;
    if count == 0 {
        return Some((0, 0));
    }
    let shear_extra = if style.italic {
        (cell as f32 * ITALIC_SHEAR).ceil() as u32
    } else {
        0
    };
    let width = count
        .checked_mul(cell)?
        .checked_add((count - 1).checked_mul(scale)?)?
        .checked_add(style.bold_offset())?
        .checked_add(shear_extra)?;
    Some((width, cell))
}

/// Rasterise a single line of text.
///
/// Glyphs sit `scale` pixels apart. Bold doubles each lit pixel to the right,
/// italic shears rows so the top leans right. Returns an empty mask for an
/// empty string, and `CanvasUnavailable` when the mask would be too large.
pub fn rasterize(text: &str, style: TextStyle) -> Result<Mask, ImagingError> {
    let (width, height) = measure(text, style).ok_or_else(|| {
        ImagingError::CanvasUnavailable(format!(
            "text mask at scale {} overflows",
            style.scale
        ))
    })?;
    if width == 0 {
        return Ok(Mask::new(0, 0));
    }
    check_dimensions(width, height)?;

    let scale = style.scale.max(1);
    let cell = height;
    let bold = style.bold_offset();
    let mut mask = Mask::new(width, height);

    for (idx, ch) in text.chars().enumerate() {
        let origin_x = idx as u32 * (cell + scale);
        for (row, bits) in glyph(ch).iter().enumerate() {
            for col in 0..GLYPH_SIZE {
                if (bits >> col) & 1 == 0 {
                    continue;
                }
                for dy in 0..scale {
                    let y = row as u32 * scale + dy;
                    let shear = if style.italic {
                        ((height - 1 - y) as f32 * ITALIC_SHEAR).round() as u32
                    } else {
                        0
                    };
                    for dx in 0..scale + bold {
                        let x = origin_x + col * scale + dx + shear;
                        mask.set(x, y, 255);
                    }
                }
            }
        }
    }
    Ok(mask)
}

/// Solid rectangle with rounded corners.
///
/// The radius is clamped to half the shorter side.
pub fn rounded_rect(width: u32, height: u32, radius: u32) -> Mask {
    let mut mask = Mask::new(width, height);
    let r = radius.min(width / 2).min(height / 2) as f32;
    for y in 0..height {
        for x in 0..width {
            let inside = if r <= 0.0 {
                true
            } else {
                // Distance from the nearest corner centre, if in a corner zone.
                let px = x as f32 + 0.5;
                let py = y as f32 + 0.5;
                let cx = px.clamp(r, width as f32 - r);
                let cy = py.clamp(r, height as f32 - r);
                let (dx, dy) = (px - cx, py - cy);
                dx * dx + dy * dy <= r * r
            };
            if inside {
                mask.set(x, y, 255);
            }
        }
    }
    mask
}

/// Separable box blur. The result grows by `radius` on every side so the
/// soft edge is not clipped; callers shift it back by `radius`.
pub fn box_blur(mask: &Mask, radius: u32) -> Mask {
    if radius == 0 {
        return mask.clone();
    }
    let r = radius as i64;
    let width = mask.width + 2 * radius;
    let height = mask.height + 2 * radius;
    let window = (2 * r + 1) as u32;

    // Horizontal pass over the padded grid.
    let mut horizontal = vec![0u32; width as usize * height as usize];
    for y in 0..height {
        let src_y = y as i64 - r;
        for x in 0..width {
            let center = x as i64 - r;
            let sum: u32 = (center - r..=center + r)
                .map(|sx| u32::from(mask.sample(sx, src_y)))
                .sum();
            horizontal[(y * width + x) as usize] = sum;
        }
    }

    let mut out = Mask::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let sum: u32 = (y as i64 - r..=y as i64 + r)
                .filter(|&sy| sy >= 0 && sy < height as i64)
                .map(|sy| horizontal[(sy as u32 * width + x) as usize])
                .sum();
            let value = (sum as f32 / (window * window) as f32).round() as u8;
            out.set(x, y, value);
        }
    }
    out
}
