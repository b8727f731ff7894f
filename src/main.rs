use clap::{Args, Parser, Subcommand};
use pixelsmith::analytics::EventLog;
use pixelsmith::config::{self, ToolkitConfig};
use pixelsmith::imaging::{
    BackgroundFill, Color, DisplayRect, FontStyle, FontWeight, OutputFormat, Position, Quality,
    ResizeFilter, ResizeMode, ResizeParams, RustCodec,
};
use pixelsmith::job::{self, Job, JobReport, JobRunner};
use pixelsmith::pages::PageSelection;
use pixelsmith::pipeline::{CompressPreset, PassportSpec, Recipe, Tool};
use pixelsmith::{naming, output};
use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_subscriber::EnvFilter;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn version_string() -> &'static str {
    let on_tag = env!("PIXELSMITH_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("PIXELSMITH_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "pixelsmith")]
#[command(about = "Single-pass raster image toolkit")]
#[command(long_about = "\
Single-pass raster image toolkit

Every command decodes each input, applies one fixed sequence of steps at full
resolution, and encodes the result next to the others in the output directory
as <name>_<suffix>.<ext>. Inputs may be files or directories; directories are
searched recursively for JPEG, PNG, WebP, GIF and BMP files.

Files are processed one at a time. A file that fails is reported and the rest
of the batch continues.

Run 'pixelsmith gen-config' to generate a documented pixelsmith.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (missing file = stock defaults)
    #[arg(long, default_value = config::CONFIG_FILE_NAME, global = true)]
    config: PathBuf,

    /// Output directory
    #[arg(long, short, default_value = "pixelsmith-out", global = true)]
    output: PathBuf,

    /// More log output (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

/// Inputs and encoding flags shared by every image command.
#[derive(Args, Clone)]
struct ProcessArgs {
    /// Image files or directories
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output format: jpeg, png, webp or bmp (default: per command)
    #[arg(long)]
    format: Option<OutputFormat>,

    /// Lossy quality in percent, 10-100
    #[arg(long, short, value_parser = clap::value_parser!(u32).range(10..=100))]
    quality: Option<u32>,
}

#[derive(Subcommand)]
enum Command {
    /// Re-encode smaller, optionally shrinking to a preset size
    Compress {
        #[command(flatten)]
        args: ProcessArgs,
        /// web, email, print or thumbnail
        #[arg(long)]
        preset: Option<CompressPreset>,
        /// Shrink so the longer edge is at most this many pixels
        #[arg(long)]
        max_edge: Option<u32>,
        /// Aim for about this many kilobytes per file (lossy formats)
        #[arg(long)]
        target_kb: Option<usize>,
    },
    /// Resize to a target box
    Resize {
        #[command(flatten)]
        args: ProcessArgs,
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
        /// contain, cover or fill
        #[arg(long)]
        mode: Option<ResizeMode>,
        /// nearest, triangle, catmull-rom, gaussian or lanczos3
        #[arg(long)]
        filter: Option<ResizeFilter>,
        /// Use width and height literally (cover/fill)
        #[arg(long)]
        ignore_aspect: bool,
        /// Letterbox colour for contain mode
        #[arg(long, value_parser = parse_color)]
        letterbox: Option<Color>,
    },
    /// Crop a rectangle, optionally drawn on a scaled preview
    Crop {
        #[command(flatten)]
        args: ProcessArgs,
        #[arg(long)]
        x: f64,
        #[arg(long)]
        y: f64,
        #[arg(long)]
        width: f64,
        #[arg(long)]
        height: f64,
        /// Size of the preview the rectangle was drawn on, as WxH
        #[arg(long, value_parser = parse_size)]
        display: Option<(u32, u32)>,
    },
    /// Change format and optionally dimensions
    Convert {
        #[command(flatten)]
        args: ProcessArgs,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
        /// With a single dimension, keep the other one unchanged
        #[arg(long)]
        ignore_aspect: bool,
    },
    /// Stamp a text watermark
    Watermark {
        #[command(flatten)]
        args: ProcessArgs,
        #[arg(long)]
        text: Option<String>,
        /// top-left … bottom-right, center, or custom
        #[arg(long)]
        position: Option<Position>,
        /// Percent, 0-100
        #[arg(long, value_parser = clap::value_parser!(u32).range(0..=100))]
        opacity: Option<u32>,
        /// Degrees, -180 to 180
        #[arg(long, allow_negative_numbers = true)]
        rotation: Option<f32>,
        /// Pixels, 12-200
        #[arg(long, value_parser = clap::value_parser!(u32).range(12..=200))]
        font_size: Option<u32>,
        #[arg(long, value_parser = parse_color)]
        color: Option<Color>,
        /// Plate colour behind the text
        #[arg(long, value_parser = parse_color)]
        background: Option<Color>,
        #[arg(long)]
        bold: bool,
        #[arg(long)]
        italic: bool,
        #[arg(long)]
        shadow: bool,
    },
    /// Feather and fill an image whose background is already transparent
    Background {
        #[command(flatten)]
        args: ProcessArgs,
        /// Soft edge in pixels, 0-20
        #[arg(long, value_parser = clap::value_parser!(u32).range(0..=20))]
        feather: Option<u32>,
        /// Fill transparent pixels with this colour
        #[arg(long, value_parser = parse_color, conflicts_with = "blur")]
        fill_color: Option<Color>,
        /// Fill transparent pixels with a light backdrop
        #[arg(long)]
        blur: bool,
    },
    /// Passport and ID photos at 300 DPI
    Passport {
        /// Image files or directories
        #[arg(required_unless_present = "list")]
        inputs: Vec<PathBuf>,
        /// us, uk, eu, india, canada, australia, visa or id-card
        #[arg(long, default_value = "us")]
        spec: PassportSpec,
        /// Tile copies onto a 4×6 inch print sheet
        #[arg(long)]
        sheet: bool,
        /// List the standards and exit
        #[arg(long)]
        list: bool,
    },
    /// Resample for a print density and stamp it into the JPEG header
    Dpi {
        /// Image files or directories
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Target DPI, 72-2400
        #[arg(long, value_parser = clap::value_parser!(u32).range(72..=2400))]
        target: Option<u32>,
    },
    /// Export selected pages from an ordered set of page images
    Pages {
        #[command(flatten)]
        args: ProcessArgs,
        /// all, 3-7, or 1,3,5-9
        #[arg(long, default_value = "all")]
        select: PageSelection,
        /// Base name for the page files (default: first input's name)
        #[arg(long)]
        name: Option<String>,
    },
    /// Show or clear the local batch history
    History {
        #[arg(long)]
        clear: bool,
    },
    /// Print a stock pixelsmith.toml with all options documented
    GenConfig,
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = config::load_config(&cli.config)?;

    match &cli.command {
        Command::Compress {
            args,
            preset,
            max_edge,
            target_kb,
        } => {
            let max_edge = max_edge.or(preset.map(CompressPreset::max_edge));
            let mut recipe = recipe_for(Tool::Compress { max_edge }, args, &config)?;
            if let (Some(preset), None) = (preset, args.quality) {
                recipe = recipe.with_quality(preset.quality());
            }
            if let Some(kb) = target_kb {
                recipe = recipe.with_target_size(kb * 1024);
            }
            run_tool(&cli, &config, &args.inputs, recipe)?;
        }
        Command::Resize {
            args,
            width,
            height,
            mode,
            filter,
            ignore_aspect,
            letterbox,
        } => {
            let mut params =
                ResizeParams::new(*width, *height, mode.unwrap_or(config.resize.mode));
            params.maintain_aspect_ratio = config.resize.maintain_aspect_ratio && !ignore_aspect;
            params.filter = filter.unwrap_or(config.resize.filter);
            params.letterbox = *letterbox;
            let recipe = recipe_for(Tool::Resize(params), args, &config)?;
            run_tool(&cli, &config, &args.inputs, recipe)?;
        }
        Command::Crop {
            args,
            x,
            y,
            width,
            height,
            display,
        } => {
            let rect = DisplayRect {
                x: *x,
                y: *y,
                width: *width,
                height: *height,
            };
            let tool = Tool::Crop {
                rect,
                displayed: *display,
            };
            run_tool(&cli, &config, &args.inputs, recipe_for(tool, args, &config)?)?;
        }
        Command::Convert {
            args,
            width,
            height,
            ignore_aspect,
        } => {
            let tool = Tool::Convert {
                width: *width,
                height: *height,
                maintain_aspect_ratio: !ignore_aspect,
                filter: config.resize.filter,
            };
            let recipe = recipe_for(tool, args, &config)?;
            if recipe.format.is_none() {
                return Err("convert needs a target: pass --format or set [output] format".into());
            }
            run_tool(&cli, &config, &args.inputs, recipe)?;
        }
        Command::Watermark {
            args,
            text,
            position,
            opacity,
            rotation,
            font_size,
            color,
            background,
            bold,
            italic,
            shadow,
        } => {
            let mut wm = config.watermark.clone();
            if let Some(text) = text {
                wm.text = text.clone();
            }
            if let Some(position) = position {
                wm.position = *position;
            }
            if let Some(opacity) = opacity {
                wm.opacity = *opacity;
            }
            if let Some(rotation) = rotation {
                wm.rotation = *rotation;
            }
            if let Some(size) = font_size {
                wm.font_size = *size;
            }
            if let Some(color) = color {
                wm.color = color.to_string();
            }
            if let Some(background) = background {
                wm.background = background.to_string();
            }
            if *bold {
                wm.weight = FontWeight::Bold;
            }
            if *italic {
                wm.style = FontStyle::Italic;
            }
            wm.shadow |= *shadow;
            let overridden = ToolkitConfig {
                watermark: wm,
                ..config.clone()
            };
            overridden.validate()?;
            let tool = Tool::Watermark(overridden.watermark.to_params()?);
            run_tool(&cli, &config, &args.inputs, recipe_for(tool, args, &config)?)?;
        }
        Command::Background {
            args,
            feather,
            fill_color,
            blur,
        } => {
            let mut feather_params = config.background.feather();
            if let Some(radius) = feather {
                feather_params.radius = *radius;
            }
            let fill = match (fill_color, blur) {
                (Some(color), _) => BackgroundFill::Color(*color),
                (None, true) => BackgroundFill::Blur,
                (None, false) => config.background.fill()?,
            };
            let tool = Tool::BackgroundFinish {
                feather: feather_params,
                fill,
            };
            run_tool(&cli, &config, &args.inputs, recipe_for(tool, args, &config)?)?;
        }
        Command::Passport {
            inputs,
            spec,
            sheet,
            list,
        } => {
            if *list {
                for line in output::format_passport_specs() {
                    println!("{}", line);
                }
                return Ok(());
            }
            let recipe = Recipe::new(Tool::Passport {
                spec: *spec,
                sheet: *sheet,
            });
            run_tool(&cli, &config, inputs, recipe)?;
        }
        Command::Dpi { inputs, target } => {
            let dpi = target.unwrap_or(config.dpi.target);
            run_tool(&cli, &config, inputs, Recipe::new(Tool::ChangeDpi { dpi }))?;
        }
        Command::Pages { args, select, name } => {
            let paths = job::collect_inputs(&args.inputs)?;
            let total = u32::try_from(paths.len()).unwrap_or(u32::MAX);
            let pages = select.resolve(total)?;
            let base = match name {
                Some(name) => name.clone(),
                None => paths[0]
                    .file_name()
                    .map(|n| naming::remove_extension(&n.to_string_lossy()).to_string())
                    .unwrap_or_default(),
            };
            let mut jobs = Vec::with_capacity(pages.len());
            for page in pages {
                let recipe = recipe_for(Tool::ExportPage { page }, args, &config)?;
                let path = &paths[page as usize - 1];
                jobs.push(Job::from_path(path, recipe).with_output_base(base.clone()));
            }
            run_jobs(&cli, &config, "pages", jobs)?;
        }
        Command::History { clear } => {
            let log = EventLog::new(&config.analytics.path);
            if *clear {
                log.clear()?;
                println!("History cleared");
            } else {
                output::print_history(&log.load()?);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `-v` flags pick the level.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; users can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

fn parse_color(s: &str) -> Result<Color, String> {
    Color::parse(s).ok_or_else(|| format!("not a colour: {s}"))
}

/// Parse `WxH`.
fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got {s}"))?;
    let dim = |v: &str| {
        v.trim()
            .parse::<u32>()
            .map_err(|_| format!("bad dimension in {s}"))
    };
    Ok((dim(w)?, dim(h)?))
}

/// Apply format and quality from flags, falling back to the config file.
fn recipe_for(tool: Tool, args: &ProcessArgs, config: &ToolkitConfig) -> CliResult<Recipe> {
    let quality = args
        .quality
        .map(Quality::from_percent)
        .unwrap_or_else(|| config.output.quality());
    let mut recipe = Recipe::new(tool).with_quality(quality);
    if let Some(format) = args.format.or(config.output.format()?) {
        recipe = recipe.with_format(format);
    }
    Ok(recipe)
}

fn run_tool(cli: &Cli, config: &ToolkitConfig, inputs: &[PathBuf], recipe: Recipe) -> CliResult<()> {
    let paths = job::collect_inputs(inputs)?;
    let command = recipe.tool.name();
    let jobs = paths
        .into_iter()
        .map(|path| Job::from_path(path, recipe.clone()))
        .collect();
    run_jobs(cli, config, command, jobs)
}

/// Run a batch, writing each output as soon as it exists.
///
/// Per-file failures are printed and do not fail the command; only I/O
/// outside a job does.
fn run_jobs(cli: &Cli, config: &ToolkitConfig, command: &str, jobs: Vec<Job>) -> CliResult<()> {
    init_thread_pool(&config.processing);
    let codec = RustCodec;
    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_job_event(&event) {
                println!("{}", line);
            }
        }
    });

    let mut write_error = None;
    let report = {
        let runner = JobRunner::new(&codec).with_events(tx);
        runner.run_batch_with(&jobs, |_, outcome| {
            if write_error.is_some() {
                return;
            }
            if let Some(out) = outcome.result.output() {
                if let Err(e) = job::write_output(&cli.output, out) {
                    write_error = Some(e);
                }
            }
        })
    };
    if printer.join().is_err() {
        warn!("progress printer panicked");
    }
    if let Some(e) = write_error {
        return Err(e.into());
    }

    output::print_batch_summary(&report);
    println!("Output: {}", cli.output.display());
    record_history(config, command, &report, &cli.output);
    Ok(())
}

/// Append the batch to the local history. Failures here never fail the command.
fn record_history(config: &ToolkitConfig, command: &str, report: &JobReport, output_dir: &Path) {
    if !config.analytics.enabled {
        return;
    }
    let (input_bytes, output_bytes) = report.byte_totals();
    let properties = serde_json::json!({
        "files": report.outcomes.len(),
        "completed": report.completed(),
        "failed": report.failed(),
        "input_bytes": input_bytes,
        "output_bytes": output_bytes,
        "output_dir": output_dir.display().to_string(),
    });
    if let Err(e) = EventLog::new(&config.analytics.path).record(command, properties) {
        warn!("could not record history: {e}");
    }
}
