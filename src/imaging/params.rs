//! Parameter types for transform steps and encoding.
//!
//! These structs describe *what* to do, not *how*. The composer in
//! [`pipeline`](crate::pipeline) builds them from tool settings; the
//! [`operations`](super::operations) module consumes them.
//!
//! Every geometric value here is in **source pixel space**. Converting from
//! on-screen coordinates happens before any of these are constructed.

use super::surface::OutputFormat;
use image::imageops::FilterType;
use image::Rgba;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Encoding quality as a fraction in `0.0..=1.0`.
///
/// Only lossy formats look at it; PNG and BMP ignore it.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Quality(f32);

impl Quality {
    pub fn new(fraction: f32) -> Self {
        if fraction.is_nan() {
            return Self::default();
        }
        Self(fraction.clamp(0.0, 1.0))
    }

    /// Build from a 0–100 percentage as shown on a slider.
    pub fn from_percent(percent: u32) -> Self {
        Self::new(percent as f32 / 100.0)
    }

    pub fn fraction(self) -> f32 {
        self.0
    }

    /// Percentage for encoders that take an integer, never below 1.
    pub fn percent(self) -> u8 {
        (self.0 * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(0.9)
    }
}

/// Everything the encoder needs besides the pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeRequest {
    pub format: OutputFormat,
    pub quality: Quality,
    /// Pixel density written into the file header where the format has one.
    pub dpi: Option<u16>,
}

impl EncodeRequest {
    pub fn new(format: OutputFormat, quality: Quality) -> Self {
        Self {
            format,
            quality,
            dpi: None,
        }
    }

    pub fn with_dpi(mut self, dpi: u16) -> Self {
        self.dpi = Some(dpi);
        self
    }
}

/// Straight-alpha RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const TRANSPARENT: Self = Self::rgba(0, 0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_pixel(self) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, self.a])
    }

    /// Parse `#rgb`, `#rrggbb`, `#rrggbbaa` (hash optional) or a few names.
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "white" => return Some(Self::WHITE),
            "black" => return Some(Self::BLACK),
            "transparent" => return Some(Self::TRANSPARENT),
            _ => {}
        }
        let hex = trimmed.trim_start_matches('#');
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            3 => {
                let mut parts = hex.chars().map(|c| channel(&format!("{c}{c}")));
                Some(Self::rgb(parts.next()??, parts.next()??, parts.next()??))
            }
            6 => Some(Self::rgb(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            8 => Some(Self::rgba(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
                channel(&hex[6..8])?,
            )),
            _ => None,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

/// How a source is fitted into a target box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMode {
    /// Scale to fit inside the box and letterbox the rest.
    #[default]
    Contain,
    /// Scale to cover the box and crop the overflow symmetrically.
    Cover,
    /// Stretch each axis independently.
    Fill,
}

impl FromStr for ResizeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "contain" => Ok(Self::Contain),
            "cover" => Ok(Self::Cover),
            "fill" => Ok(Self::Fill),
            other => Err(format!("unknown resize mode: {other}")),
        }
    }
}

/// Resampling filter, named after `image::imageops::FilterType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    #[default]
    Lanczos3,
}

impl ResizeFilter {
    pub(crate) fn filter_type(self) -> FilterType {
        match self {
            Self::Nearest => FilterType::Nearest,
            Self::Triangle => FilterType::Triangle,
            Self::CatmullRom => FilterType::CatmullRom,
            Self::Gaussian => FilterType::Gaussian,
            Self::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

impl FromStr for ResizeFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = toml::Value::String(s.trim().to_ascii_lowercase());
        Self::deserialize(value).map_err(|_| format!("unknown resize filter: {s}"))
    }
}

/// Parameters for the resize step.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub width: u32,
    pub height: u32,
    pub mode: ResizeMode,
    /// Recompute one side of the box from the source aspect ratio.
    /// Only affects `cover` and `fill`; `contain` already keeps aspect.
    pub maintain_aspect_ratio: bool,
    pub filter: ResizeFilter,
    /// Colour behind the letterbox in `contain` mode. `None` leaves it transparent.
    pub letterbox: Option<Color>,
}

impl ResizeParams {
    pub fn new(width: u32, height: u32, mode: ResizeMode) -> Self {
        Self {
            width,
            height,
            mode,
            maintain_aspect_ratio: false,
            filter: ResizeFilter::default(),
            letterbox: None,
        }
    }
}

/// Crop rectangle in source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Where the watermark box goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    TopLeft,
    TopCenter,
    TopRight,
    CenterLeft,
    Center,
    CenterRight,
    BottomLeft,
    BottomCenter,
    #[default]
    BottomRight,
    /// Top-left corner at `custom_x`/`custom_y` percent of the surface.
    Custom,
}

impl FromStr for Position {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = toml::Value::String(s.trim().to_ascii_lowercase());
        Self::deserialize(value).map_err(|_| format!("unknown position: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

/// Drop shadow under the plate and glyphs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shadow {
    pub color: Color,
    pub blur: u32,
    pub offset_x: i32,
    pub offset_y: i32,
}

/// Text watermark settings.
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkParams {
    pub text: String,
    /// Requested family. Glyphs come from the built-in bitmap face.
    pub font_family: String,
    pub font_size: u32,
    pub weight: FontWeight,
    pub style: FontStyle,
    pub color: Color,
    /// Plate drawn behind the text, `None` for no plate.
    pub background: Option<Color>,
    pub corner_radius: u32,
    /// Inset from the surface edge for the named anchors.
    pub padding: u32,
    /// Global alpha in `0.0..=1.0` for plate, shadow and glyphs alike.
    pub opacity: f32,
    pub rotation_deg: f32,
    pub position: Position,
    pub custom_x: f32,
    pub custom_y: f32,
    pub shadow: Option<Shadow>,
}

impl WatermarkParams {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font_family: "monospace".into(),
            font_size: 32,
            weight: FontWeight::Normal,
            style: FontStyle::Normal,
            color: Color::WHITE,
            background: None,
            corner_radius: 0,
            padding: 20,
            opacity: 0.7,
            rotation_deg: 0.0,
            position: Position::BottomRight,
            custom_x: 50.0,
            custom_y: 50.0,
            shadow: None,
        }
    }
}

/// Alpha feathering radius for matte edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatherParams {
    pub radius: u32,
}

/// Replacement for fully transparent pixels after background removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackgroundFill {
    #[default]
    Transparent,
    Color(Color),
    /// Flat light grey standing in for a blurred backdrop.
    Blur,
}

impl BackgroundFill {
    /// The constant substituted in [`BackgroundFill::Blur`] mode.
    pub const BLUR_STAND_IN: Color = Color::rgb(240, 240, 240);
}
