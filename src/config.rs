//! Toolkit configuration.
//!
//! Handles loading, validating, and merging `pixelsmith.toml`. Stock defaults
//! are the base layer; a user file overrides any subset of keys, and CLI flags
//! override both.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [output]
//! format = "auto"           # auto | jpeg | png | webp | bmp
//! quality = 90              # 10-100, lossy formats only
//!
//! [resize]
//! mode = "contain"          # contain | cover | fill
//! maintain_aspect_ratio = true
//! filter = "lanczos3"
//!
//! [watermark]
//! text = "© pixelsmith"
//! position = "bottom-right"
//! opacity = 70              # percent
//!
//! [background]
//! feather_radius = 2
//! fill = "transparent"      # transparent | color | blur
//!
//! [dpi]
//! target = 300
//!
//! [processing]
//! max_threads = 4           # omit for auto = CPU cores
//!
//! [analytics]
//! enabled = true
//! path = "pixelsmith-history.json"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{
    BackgroundFill, Color, FeatherParams, FontStyle, FontWeight, OutputFormat, Position,
    Quality, ResizeFilter, ResizeMode, Shadow, WatermarkParams,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "pixelsmith.toml";

/// Toolkit configuration loaded from `pixelsmith.toml`.
///
/// All fields have defaults. User files need only specify the values they
/// want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolkitConfig {
    pub output: OutputConfig,
    pub resize: ResizeConfig,
    pub watermark: WatermarkConfig,
    pub background: BackgroundConfig,
    pub dpi: DpiConfig,
    pub processing: ProcessingConfig,
    pub analytics: AnalyticsConfig,
}

impl ToolkitConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.output.format()?;
        if !(10..=100).contains(&self.output.quality) {
            return Err(invalid("output.quality must be 10-100"));
        }

        let wm = &self.watermark;
        if wm.text.trim().is_empty() {
            return Err(invalid("watermark.text must not be empty"));
        }
        if !FONT_SIZE_RANGE.contains(&wm.font_size) {
            return Err(invalid("watermark.font_size must be 12-200"));
        }
        if wm.shadow_blur > MAX_SHADOW_BLUR {
            return Err(invalid("watermark.shadow_blur must be 0-50"));
        }
        if !SHADOW_OFFSET_RANGE.contains(&wm.shadow_offset_x)
            || !SHADOW_OFFSET_RANGE.contains(&wm.shadow_offset_y)
        {
            return Err(invalid("watermark.shadow_offset_x and shadow_offset_y must be -50 to 50"));
        }
        if wm.padding > MAX_WATERMARK_INSET || wm.corner_radius > MAX_WATERMARK_INSET {
            return Err(invalid("watermark.padding and corner_radius must be 0-1000"));
        }
        if wm.opacity > 100 {
            return Err(invalid("watermark.opacity must be 0-100"));
        }
        if !(-180.0..=180.0).contains(&wm.rotation) {
            return Err(invalid("watermark.rotation must be between -180 and 180"));
        }
        if !(0.0..=100.0).contains(&wm.custom_x) || !(0.0..=100.0).contains(&wm.custom_y) {
            return Err(invalid("watermark.custom_x and custom_y must be 0-100"));
        }
        parse_color("watermark.color", &wm.color)?;
        parse_color("watermark.background", &wm.background)?;
        parse_color("watermark.shadow_color", &wm.shadow_color)?;

        if self.background.feather_radius > 20 {
            return Err(invalid("background.feather_radius must be 0-20"));
        }
        parse_color("background.color", &self.background.color)?;

        if !(72..=2400).contains(&self.dpi.target) {
            return Err(invalid("dpi.target must be 72-2400"));
        }
        if self.processing.max_threads == Some(0) {
            return Err(invalid("processing.max_threads must be at least 1"));
        }
        Ok(())
    }
}

/// Accepted watermark font sizes in pixels.
const FONT_SIZE_RANGE: std::ops::RangeInclusive<u32> = 12..=200;
const MAX_SHADOW_BLUR: u32 = 50;
const SHADOW_OFFSET_RANGE: std::ops::RangeInclusive<i32> = -50..=50;
const MAX_WATERMARK_INSET: u32 = 1000;

fn invalid(message: &str) -> ConfigError {
    ConfigError::Validation(message.into())
}

fn parse_color(key: &str, value: &str) -> Result<Color, ConfigError> {
    Color::parse(value)
        .ok_or_else(|| ConfigError::Validation(format!("{key}: '{value}' is not a colour")))
}

// ============================================================================
// Sections
// ============================================================================

/// Output encoding defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// `auto` keeps each tool's own default; otherwise a fixed format.
    pub format: String,
    /// Lossy quality in percent.
    pub quality: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "auto".into(),
            quality: 90,
        }
    }
}

impl OutputConfig {
    /// `None` for `auto`.
    pub fn format(&self) -> Result<Option<OutputFormat>, ConfigError> {
        if self.format.eq_ignore_ascii_case("auto") {
            return Ok(None);
        }
        self.format
            .parse()
            .map(Some)
            .map_err(|e: String| ConfigError::Validation(format!("output.format: {e}")))
    }

    pub fn quality(&self) -> Quality {
        Quality::from_percent(self.quality)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResizeConfig {
    pub mode: ResizeMode,
    pub maintain_aspect_ratio: bool,
    pub filter: ResizeFilter,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            mode: ResizeMode::Contain,
            maintain_aspect_ratio: true,
            filter: ResizeFilter::Lanczos3,
        }
    }
}

/// Text watermark defaults. Colours are hex strings or `transparent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatermarkConfig {
    pub text: String,
    pub font_size: u32,
    pub font_family: String,
    pub weight: FontWeight,
    pub style: FontStyle,
    pub color: String,
    /// Plate behind the text; `transparent` disables it.
    pub background: String,
    pub padding: u32,
    pub corner_radius: u32,
    /// Percent, 0-100.
    pub opacity: u32,
    /// Degrees, -180..180.
    pub rotation: f32,
    pub position: Position,
    pub custom_x: f32,
    pub custom_y: f32,
    pub shadow: bool,
    pub shadow_color: String,
    pub shadow_blur: u32,
    pub shadow_offset_x: i32,
    pub shadow_offset_y: i32,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            text: "© pixelsmith".into(),
            font_size: 32,
            font_family: "monospace".into(),
            weight: FontWeight::Normal,
            style: FontStyle::Normal,
            color: "#ffffff".into(),
            background: "transparent".into(),
            padding: 20,
            corner_radius: 0,
            opacity: 70,
            rotation: 0.0,
            position: Position::BottomRight,
            custom_x: 50.0,
            custom_y: 50.0,
            shadow: false,
            shadow_color: "#00000080".into(),
            shadow_blur: 4,
            shadow_offset_x: 2,
            shadow_offset_y: 2,
        }
    }
}

impl WatermarkConfig {
    /// Build step parameters. Call after [`ToolkitConfig::validate`].
    pub fn to_params(&self) -> Result<WatermarkParams, ConfigError> {
        let background = parse_color("watermark.background", &self.background)?;
        let shadow = if self.shadow {
            Some(Shadow {
                color: parse_color("watermark.shadow_color", &self.shadow_color)?,
                blur: self.shadow_blur,
                offset_x: self.shadow_offset_x,
                offset_y: self.shadow_offset_y,
            })
        } else {
            None
        };
        Ok(WatermarkParams {
            text: self.text.clone(),
            font_family: self.font_family.clone(),
            font_size: self.font_size,
            weight: self.weight,
            style: self.style,
            color: parse_color("watermark.color", &self.color)?,
            background: (background.a > 0).then_some(background),
            corner_radius: self.corner_radius,
            padding: self.padding,
            opacity: self.opacity.min(100) as f32 / 100.0,
            rotation_deg: self.rotation,
            position: self.position,
            custom_x: self.custom_x,
            custom_y: self.custom_y,
            shadow,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillMode {
    #[default]
    Transparent,
    Color,
    Blur,
}

/// Finishing applied after background removal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackgroundConfig {
    pub feather_radius: u32,
    pub fill: FillMode,
    /// Used when `fill = "color"`.
    pub color: String,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            feather_radius: 2,
            fill: FillMode::Transparent,
            color: "#ffffff".into(),
        }
    }
}

impl BackgroundConfig {
    pub fn feather(&self) -> FeatherParams {
        FeatherParams {
            radius: self.feather_radius,
        }
    }

    pub fn fill(&self) -> Result<BackgroundFill, ConfigError> {
        Ok(match self.fill {
            FillMode::Transparent => BackgroundFill::Transparent,
            FillMode::Color => BackgroundFill::Color(parse_color("background.color", &self.color)?),
            FillMode::Blur => BackgroundFill::Blur,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DpiConfig {
    pub target: u32,
}

impl Default for DpiConfig {
    fn default() -> Self {
        Self { target: 300 }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Threads for row-parallel pixel loops.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_threads: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_threads.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Local usage log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyticsConfig {
    pub enabled: bool,
    pub path: PathBuf,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("pixelsmith-history.json"),
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    // Every field is a plain serde type, so this cannot fail in practice.
    toml::Value::try_from(ToolkitConfig::default())
        .unwrap_or_else(|_| toml::Value::Table(toml::map::Map::new()))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ToolkitConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ToolkitConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, falling back to stock defaults when it is absent.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(path: &Path) -> Result<ToolkitConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `pixelsmith.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Pixelsmith Configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Command-line flags override anything set here.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Output encoding
# ---------------------------------------------------------------------------
[output]
# "auto" lets each command pick: compress/passport/dpi write JPEG,
# watermark/background write PNG, the rest keep the source format.
# Otherwise one of: jpeg, png, webp, bmp.
format = "auto"

# Lossy quality in percent (10-100). Ignored for PNG and BMP.
quality = 90

# ---------------------------------------------------------------------------
# Resize
# ---------------------------------------------------------------------------
[resize]
# contain: fit inside the box and letterbox the rest.
# cover:   fill the box and crop the overflow from the centre.
# fill:    stretch to the exact box.
mode = "contain"

# Recompute the target height from the source aspect ratio (cover/fill).
maintain_aspect_ratio = true

# Resampling filter: nearest, triangle, catmull-rom, gaussian, lanczos3.
filter = "lanczos3"

# ---------------------------------------------------------------------------
# Text watermark
# ---------------------------------------------------------------------------
[watermark]
text = "© pixelsmith"
# Pixels, 12-200.
font_size = 32

# Glyphs always come from the built-in bitmap face; the family is recorded only.
font_family = "monospace"
weight = "normal"         # normal | bold
style = "normal"          # normal | italic
color = "#ffffff"

# Plate behind the text. "transparent" for none.
background = "transparent"
# Pixels, 0-1000.
padding = 20
corner_radius = 0

# Percent, applied to plate, shadow and text alike.
opacity = 70

# Degrees, -180 to 180, about the centre of the watermark.
rotation = 0.0

# top-left, top-center, top-right, center-left, center, center-right,
# bottom-left, bottom-center, bottom-right, or custom.
position = "bottom-right"

# Percent of the image size; only used with position = "custom".
custom_x = 50.0
custom_y = 50.0

shadow = false
shadow_color = "#00000080"
shadow_blur = 4           # 0-50
shadow_offset_x = 2       # -50 to 50
shadow_offset_y = 2

# ---------------------------------------------------------------------------
# Background finishing (after matting)
# ---------------------------------------------------------------------------
[background]
# Pixels of soft edge along the matte (0-20).
feather_radius = 2

# What replaces fully transparent pixels: transparent, color, blur.
fill = "transparent"
color = "#ffffff"

# ---------------------------------------------------------------------------
# Change DPI
# ---------------------------------------------------------------------------
[dpi]
# Print density to resample for (72-2400).
target = 300

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Threads for pixel loops. Omit to use every core.
# max_threads = 4

# ---------------------------------------------------------------------------
# Local history
# ---------------------------------------------------------------------------
[analytics]
# Keep the last 100 batches in a local JSON file (see `pixelsmith history`).
enabled = true
path = "pixelsmith-history.json"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // =========================================================================
    // Defaults
    // =========================================================================

    #[test]
    fn default_config_passes_validation() {
        assert!(ToolkitConfig::default().validate().is_ok());
    }

    #[test]
    fn default_output_is_auto() {
        let config = ToolkitConfig::default();
        assert_eq!(config.output.format().unwrap(), None);
        assert_eq!(config.output.quality().percent(), 90);
    }

    #[test]
    fn default_watermark_params() {
        let params = WatermarkConfig::default().to_params().unwrap();
        assert_eq!(params.color, Color::WHITE);
        assert_eq!(params.background, None);
        assert_eq!(params.shadow, None);
        assert!((params.opacity - 0.7).abs() < 1e-6);
        assert_eq!(params.position, Position::BottomRight);
    }

    // =========================================================================
    // Parsing
    // =========================================================================

    #[test]
    fn parse_sparse_config() {
        let config: ToolkitConfig = toml::from_str(
            r#"
[resize]
mode = "cover"
filter = "catmull-rom"
"#,
        )
        .unwrap();
        assert_eq!(config.resize.mode, ResizeMode::Cover);
        assert_eq!(config.resize.filter, ResizeFilter::CatmullRom);
        assert!(config.resize.maintain_aspect_ratio);
        assert_eq!(config.output.quality, 90);
    }

    #[test]
    fn parse_explicit_format() {
        let config: ToolkitConfig = toml::from_str("[output]\nformat = \"webp\"").unwrap();
        assert_eq!(config.output.format().unwrap(), Some(OutputFormat::WebP));
    }

    #[test]
    fn watermark_plate_and_shadow() {
        let config: ToolkitConfig = toml::from_str(
            r##"
[watermark]
background = "#202020"
shadow = true
shadow_color = "#000000"
opacity = 100
position = "custom"
custom_x = 10.0
"##,
        )
        .unwrap();
        let params = config.watermark.to_params().unwrap();
        assert_eq!(params.background, Some(Color::rgb(0x20, 0x20, 0x20)));
        assert_eq!(params.shadow.unwrap().color, Color::BLACK);
        assert_eq!(params.opacity, 1.0);
        assert_eq!(params.position, Position::Custom);
        assert_eq!(params.custom_x, 10.0);
    }

    #[test]
    fn background_fill_modes() {
        let mut bg = BackgroundConfig::default();
        assert_eq!(bg.fill().unwrap(), BackgroundFill::Transparent);
        bg.fill = FillMode::Color;
        bg.color = "#ff0000".into();
        assert_eq!(bg.fill().unwrap(), BackgroundFill::Color(Color::rgb(255, 0, 0)));
        bg.fill = FillMode::Blur;
        assert_eq!(bg.fill().unwrap(), BackgroundFill::Blur);
        assert_eq!(bg.feather().radius, 2);
    }

    // =========================================================================
    // Unknown key rejection
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let result: Result<ToolkitConfig, _> = toml::from_str("[output]\nqualty = 90");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown field"));
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<ToolkitConfig, _> = toml::from_str("[outptu]\nquality = 90");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_enum_value_rejected() {
        let result: Result<ToolkitConfig, _> = toml::from_str("[resize]\nmode = \"stretch\"");
        assert!(result.is_err());
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn validate_quality_bounds() {
        let mut config = ToolkitConfig::default();
        config.output.quality = 10;
        assert!(config.validate().is_ok());
        config.output.quality = 100;
        assert!(config.validate().is_ok());
        config.output.quality = 9;
        assert!(config.validate().unwrap_err().to_string().contains("quality"));
        config.output.quality = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_format_name() {
        let mut config = ToolkitConfig::default();
        config.output.format = "tiff".into();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_watermark_ranges() {
        let mut config = ToolkitConfig::default();
        config.watermark.opacity = 101;
        assert!(config.validate().is_err());

        let mut config = ToolkitConfig::default();
        config.watermark.rotation = 181.0;
        assert!(config.validate().is_err());

        let mut config = ToolkitConfig::default();
        config.watermark.custom_y = -1.0;
        assert!(config.validate().is_err());

        let mut config = ToolkitConfig::default();
        config.watermark.color = "#12345".into();
        assert!(config.validate().unwrap_err().to_string().contains("watermark.color"));
    }

    #[test]
    fn validate_font_size_bounds() {
        let mut config = ToolkitConfig::default();
        config.watermark.font_size = 12;
        assert!(config.validate().is_ok());
        config.watermark.font_size = 200;
        assert!(config.validate().is_ok());
        config.watermark.font_size = 11;
        assert!(config.validate().unwrap_err().to_string().contains("font_size"));
        config.watermark.font_size = 201;
        assert!(config.validate().is_err());
        config.watermark.font_size = u32::MAX;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_shadow_bounds() {
        let mut config = ToolkitConfig::default();
        config.watermark.shadow_blur = 51;
        assert!(config.validate().unwrap_err().to_string().contains("shadow_blur"));

        let mut config = ToolkitConfig::default();
        config.watermark.shadow_offset_x = -51;
        assert!(config.validate().is_err());

        let mut config = ToolkitConfig::default();
        config.watermark.shadow_offset_y = i32::MAX;
        assert!(config.validate().is_err());

        let mut config = ToolkitConfig::default();
        config.watermark.padding = 1001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_feather_and_dpi() {
        let mut config = ToolkitConfig::default();
        config.background.feather_radius = 21;
        assert!(config.validate().is_err());

        let mut config = ToolkitConfig::default();
        config.dpi.target = 71;
        assert!(config.validate().is_err());
        config.dpi.target = 2400;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_zero_threads() {
        let mut config = ToolkitConfig::default();
        config.processing.max_threads = Some(0);
        assert!(config.validate().is_err());
    }

    // =========================================================================
    // Processing config
    // =========================================================================

    #[test]
    fn effective_threads_auto() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&ProcessingConfig::default()), cores);
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let config = ProcessingConfig {
            max_threads: Some(99999),
        };
        assert_eq!(effective_threads(&config), cores);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_threads: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    // =========================================================================
    // merge_toml
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str("quality = 90").unwrap();
        let overlay: toml::Value = toml::from_str("quality = 70").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("quality").unwrap().as_integer(), Some(70));
    }

    #[test]
    fn merge_toml_keeps_sibling_keys() {
        let base: toml::Value = toml::from_str("[output]\nformat = \"auto\"\nquality = 90").unwrap();
        let overlay: toml::Value = toml::from_str("[output]\nquality = 60").unwrap();
        let merged = merge_toml(base, overlay);
        let output = merged.get("output").unwrap();
        assert_eq!(output.get("format").unwrap().as_str(), Some("auto"));
        assert_eq!(output.get("quality").unwrap().as_integer(), Some(60));
    }

    // =========================================================================
    // Loading
    // =========================================================================

    #[test]
    fn missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(config, ToolkitConfig::default());
    }

    #[test]
    fn user_file_overrides_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[dpi]\ntarget = 600\n[processing]\nmax_threads = 2\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.dpi.target, 600);
        assert_eq!(config.processing.max_threads, Some(2));
        assert_eq!(config.output.quality, 90);
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[output]\nquality = 5\n").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn load_config_reports_bad_toml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[output\n").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    // =========================================================================
    // stock_config_toml / stock_defaults_value
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: ToolkitConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, ToolkitConfig::default());
    }

    #[test]
    fn stock_config_toml_contains_all_sections() {
        let content = stock_config_toml();
        for section in [
            "[output]",
            "[resize]",
            "[watermark]",
            "[background]",
            "[dpi]",
            "[processing]",
            "[analytics]",
        ] {
            assert!(content.contains(section), "missing {section}");
        }
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value();
        assert!(val.is_table());
        for key in ["output", "resize", "watermark", "background", "dpi", "analytics"] {
            assert!(val.get(key).is_some(), "missing {key}");
        }
    }
}
