//! Pipeline composer: one tool, one fixed sequence of transform steps.
//!
//! A [`Tool`] describes what the user asked for in the terms they used
//! (display rectangles, presets, passport standards). [`plan`] turns it into
//! an ordered list of [`Step`]s whose parameters are all in source pixels;
//! [`compose`] runs them over the decoded surface.
//!
//! Steps carry a [`Phase`], and every plan is non-decreasing in phase:
//! geometry first, then alpha edits, then fills, overlays and layout. That
//! is what keeps e.g. a background fill from running before the feather that
//! changes which pixels are transparent.

use crate::imaging::operations::{self, Result};
use crate::imaging::{
    BackgroundFill, Color, CropRect, DisplayRect, EncodeRequest, FeatherParams, OutputFormat,
    Quality, RasterSurface, ResizeFilter, ResizeMode, ResizeParams, SourceFormat,
    WatermarkParams, derive_dimensions, dpi_dimensions, scale_rect_to_source,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Quality used by tools whose output is meant for print.
pub const PRINT_QUALITY: f32 = 0.95;

/// 4×6 inch print sheet at 300 DPI.
pub const PRINT_SHEET: (u32, u32) = (1200, 1800);

// ============================================================================
// Steps
// ============================================================================

/// Ordering class of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Geometry,
    Alpha,
    Fill,
    Overlay,
    Layout,
}

/// One transform with its parameters resolved to source pixels.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Resize(ResizeParams),
    Crop(CropRect),
    FitLongestEdge(u32),
    Feather(FeatherParams),
    FillBackground(BackgroundFill),
    Flatten(Color),
    Watermark(WatermarkParams),
    Tile { sheet: (u32, u32), background: Color },
}

impl Step {
    pub fn phase(&self) -> Phase {
        match self {
            Step::Resize(_) | Step::Crop(_) | Step::FitLongestEdge(_) => Phase::Geometry,
            Step::Feather(_) => Phase::Alpha,
            Step::FillBackground(_) | Step::Flatten(_) => Phase::Fill,
            Step::Watermark(_) => Phase::Overlay,
            Step::Tile { .. } => Phase::Layout,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Step::Resize(_) => "resize",
            Step::Crop(_) => "crop",
            Step::FitLongestEdge(_) => "fit",
            Step::Feather(_) => "feather",
            Step::FillBackground(_) => "fill",
            Step::Flatten(_) => "flatten",
            Step::Watermark(_) => "watermark",
            Step::Tile { .. } => "tile",
        }
    }

    pub fn apply(&self, surface: RasterSurface) -> Result<RasterSurface> {
        match self {
            Step::Resize(p) => operations::resize(surface, p),
            Step::Crop(rect) => operations::crop(surface, rect),
            Step::FitLongestEdge(edge) => operations::fit_longest_edge(surface, *edge),
            Step::Feather(p) => operations::feather_alpha(surface, p),
            Step::FillBackground(fill) => operations::fill_background(surface, fill),
            Step::Flatten(color) => operations::flatten(surface, *color),
            Step::Watermark(p) => operations::watermark(surface, p),
            Step::Tile { sheet, background } => operations::tile_sheet(surface, *sheet, *background),
        }
    }
}

/// Run `steps` in order over `surface`.
pub fn compose(surface: RasterSurface, steps: &[Step]) -> Result<RasterSurface> {
    debug_assert!(
        steps.windows(2).all(|w| w[0].phase() <= w[1].phase()),
        "steps out of phase order"
    );
    steps.iter().try_fold(surface, |surface, step| {
        debug!(step = step.name(), "apply");
        step.apply(surface)
    })
}

// ============================================================================
// Tools
// ============================================================================

/// Named compression presets: `(quality percent, longest edge)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressPreset {
    Web,
    Email,
    Print,
    Thumbnail,
}

impl CompressPreset {
    pub fn quality(self) -> Quality {
        Quality::from_percent(match self {
            Self::Web => 80,
            Self::Email => 70,
            Self::Print => 90,
            Self::Thumbnail => 60,
        })
    }

    pub fn max_edge(self) -> u32 {
        match self {
            Self::Web => 1920,
            Self::Email => 1200,
            Self::Print => 3000,
            Self::Thumbnail => 400,
        }
    }
}

impl FromStr for CompressPreset {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "web" => Ok(Self::Web),
            "email" => Ok(Self::Email),
            "print" => Ok(Self::Print),
            "thumbnail" => Ok(Self::Thumbnail),
            other => Err(format!("unknown preset: {other}")),
        }
    }
}

/// Passport and ID photo standards, all at 300 DPI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PassportSpec {
    Us,
    Uk,
    Eu,
    India,
    Canada,
    Australia,
    Visa,
    IdCard,
}

impl PassportSpec {
    pub const ALL: [PassportSpec; 8] = [
        Self::Us,
        Self::Uk,
        Self::Eu,
        Self::India,
        Self::Canada,
        Self::Australia,
        Self::Visa,
        Self::IdCard,
    ];

    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Self::Us | Self::India | Self::Visa => (600, 600),
            Self::Uk | Self::Eu | Self::Australia => (450, 600),
            Self::Canada => (420, 540),
            Self::IdCard => (480, 640),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Us => "US Passport",
            Self::Uk => "UK Passport",
            Self::Eu => "EU Passport",
            Self::India => "India Passport",
            Self::Canada => "Canada Passport",
            Self::Australia => "Australia Passport",
            Self::Visa => "US Visa",
            Self::IdCard => "ID Card",
        }
    }

    /// Lowercase key used on the command line and in file names.
    pub fn key(self) -> &'static str {
        match self {
            Self::Us => "us",
            Self::Uk => "uk",
            Self::Eu => "eu",
            Self::India => "india",
            Self::Canada => "canada",
            Self::Australia => "australia",
            Self::Visa => "visa",
            Self::IdCard => "id-card",
        }
    }
}

impl FromStr for PassportSpec {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|spec| spec.key() == wanted)
            .ok_or_else(|| format!("unknown passport standard: {s}"))
    }
}

/// What the user asked for, before coordinate translation.
#[derive(Debug, Clone, PartialEq)]
pub enum Tool {
    /// Re-encode, optionally shrinking the longer edge.
    Compress { max_edge: Option<u32> },
    Resize(ResizeParams),
    /// Crop a rectangle drawn over a preview of size `displayed`.
    /// `None` means the rectangle is already in source pixels.
    Crop {
        rect: DisplayRect,
        displayed: Option<(u32, u32)>,
    },
    Convert {
        width: Option<u32>,
        height: Option<u32>,
        maintain_aspect_ratio: bool,
        filter: ResizeFilter,
    },
    Watermark(WatermarkParams),
    /// Feather then fill an image whose background was already matted out.
    BackgroundFinish {
        feather: FeatherParams,
        fill: BackgroundFill,
    },
    Passport { spec: PassportSpec, sheet: bool },
    ChangeDpi { dpi: u32 },
    /// Export one page raster as-is.
    ExportPage { page: u32 },
}

impl Tool {
    pub fn name(&self) -> &'static str {
        match self {
            Tool::Compress { .. } => "compress",
            Tool::Resize(_) => "resize",
            Tool::Crop { .. } => "crop",
            Tool::Convert { .. } => "convert",
            Tool::Watermark(_) => "watermark",
            Tool::BackgroundFinish { .. } => "background",
            Tool::Passport { .. } => "passport",
            Tool::ChangeDpi { .. } => "dpi",
            Tool::ExportPage { .. } => "pages",
        }
    }

    /// File name suffix, without the leading underscore.
    pub fn suffix(&self) -> String {
        match self {
            Tool::Compress { .. } => "compressed".into(),
            Tool::Resize(_) => "resized".into(),
            Tool::Crop { .. } => "cropped".into(),
            Tool::Convert { .. } => "converted".into(),
            Tool::Watermark(_) => "watermarked".into(),
            Tool::BackgroundFinish { .. } => "no_bg".into(),
            Tool::Passport { spec, sheet: false } => format!("passport_{}", spec.key()),
            Tool::Passport { spec, sheet: true } => format!("passport_sheet_{}", spec.key()),
            Tool::ChangeDpi { dpi } => format!("{dpi}dpi"),
            Tool::ExportPage { page } => format!("page_{page}"),
        }
    }

    /// Output format when the caller has no preference.
    pub fn default_format(&self, source: SourceFormat) -> OutputFormat {
        match self {
            Tool::Compress { .. } | Tool::Passport { .. } | Tool::ChangeDpi { .. } => {
                OutputFormat::Jpeg
            }
            Tool::Watermark(_) | Tool::BackgroundFinish { .. } => OutputFormat::Png,
            _ => source.default_output(),
        }
    }

    /// Print tools always produce JPEG at print quality.
    fn forced_encoding(&self) -> Option<EncodeRequest> {
        let print = EncodeRequest::new(OutputFormat::Jpeg, Quality::new(PRINT_QUALITY));
        match self {
            Tool::Passport { .. } => Some(print.with_dpi(300)),
            Tool::ChangeDpi { dpi } => Some(print.with_dpi(u16::try_from(*dpi).unwrap_or(u16::MAX))),
            _ => None,
        }
    }
}

/// A tool plus its encoding preferences.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    pub tool: Tool,
    /// `None` picks [`Tool::default_format`].
    pub format: Option<OutputFormat>,
    pub quality: Quality,
    /// Aim for roughly this many output bytes (lossy formats only).
    pub target_size: Option<usize>,
}

impl Recipe {
    pub fn new(tool: Tool) -> Self {
        Self {
            tool,
            format: None,
            quality: Quality::default(),
            target_size: None,
        }
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_target_size(mut self, bytes: usize) -> Self {
        self.target_size = Some(bytes);
        self
    }

    /// Format, quality and density the encoder will be asked for.
    pub fn encode_request(&self, source: SourceFormat) -> EncodeRequest {
        self.tool.forced_encoding().unwrap_or_else(|| {
            let format = self
                .format
                .unwrap_or_else(|| self.tool.default_format(source));
            EncodeRequest::new(format, self.quality)
        })
    }
}

/// Resolve a tool into source-space steps for an image of `natural` size
/// that will be encoded as `output`.
///
/// Display rectangles are scaled here, once, before any step exists.
pub fn plan(tool: &Tool, natural: (u32, u32), output: OutputFormat) -> Vec<Step> {
    let mut steps = Vec::new();
    match tool {
        Tool::Compress { max_edge } => {
            if let Some(edge) = max_edge {
                steps.push(Step::FitLongestEdge(*edge));
            }
        }
        Tool::Resize(params) => {
            let mut params = params.clone();
            if params.mode == ResizeMode::Contain
                && params.letterbox.is_none()
                && !output.supports_alpha()
            {
                params.letterbox = Some(Color::WHITE);
            }
            steps.push(Step::Resize(params));
        }
        Tool::Crop { rect, displayed } => {
            let source_rect = scale_rect_to_source(*rect, displayed.unwrap_or(natural), natural);
            steps.push(Step::Crop(source_rect));
        }
        Tool::Convert {
            width,
            height,
            maintain_aspect_ratio,
            filter,
        } => {
            let (w, h) = derive_dimensions(natural, *width, *height, *maintain_aspect_ratio);
            if (w, h) != natural {
                let mut params = ResizeParams::new(w, h, ResizeMode::Fill);
                params.filter = *filter;
                steps.push(Step::Resize(params));
            }
        }
        Tool::Watermark(params) => steps.push(Step::Watermark(params.clone())),
        Tool::BackgroundFinish { feather, fill } => {
            steps.push(Step::Feather(*feather));
            steps.push(Step::FillBackground(*fill));
        }
        Tool::Passport { spec, sheet } => {
            let (w, h) = spec.dimensions();
            steps.push(Step::Resize(ResizeParams::new(w, h, ResizeMode::Cover)));
            steps.push(Step::Flatten(Color::WHITE));
            if *sheet {
                steps.push(Step::Tile {
                    sheet: PRINT_SHEET,
                    background: Color::WHITE,
                });
            }
        }
        Tool::ChangeDpi { dpi } => {
            let (w, h) = dpi_dimensions(natural, *dpi);
            if (w, h) != natural {
                steps.push(Step::Resize(ResizeParams::new(w, h, ResizeMode::Fill)));
            }
        }
        Tool::ExportPage { .. } => {}
    }
    steps
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Resize(p) => write!(f, "resize {}x{} ({:?})", p.width, p.height, p.mode),
            Step::Crop(r) => write!(f, "crop {}x{}+{}+{}", r.width, r.height, r.x, r.y),
            Step::FitLongestEdge(e) => write!(f, "fit longest edge {e}"),
            Step::Feather(p) => write!(f, "feather r={}", p.radius),
            Step::FillBackground(fill) => write!(f, "fill {fill:?}"),
            Step::Flatten(c) => write!(f, "flatten onto {c}"),
            Step::Watermark(p) => write!(f, "watermark {:?}", p.text),
            Step::Tile { sheet, .. } => write!(f, "tile onto {}x{}", sheet.0, sheet.1),
        }
    }
}
