//! Job runner: decode → compose → encode for one file, sequential batches.
//!
//! ## Per-file lifecycle
//!
//! ```text
//! Pending ──start──▶ Running(0) ──25──▶ ──60──▶ ──90──▶ Completed | Failed
//!                     decoded   composed  encoded
//! ```
//!
//! Progress only ever moves forward. Every error raised inside a job (bad
//! MIME type, codec failure, degenerate crop, surface allocation) is caught at
//! the job boundary and becomes [`JobResult::Failed`]; a batch always runs
//! every job to the end. [`BatchError`] is reserved for the I/O around a batch
//! (finding inputs, writing outputs).
//!
//! Inputs on disk are read when their job starts, not up front, so a batch
//! holds one file in memory at a time and an unreadable file fails only its
//! own job. Output names are unique within a batch.
//!
//! ## Encode fallback
//!
//! An encoder that produces nothing is not fatal: the job completes with the
//! original, undecoded bytes and `fell_back = true`.
//!
//! ## Events
//!
//! With [`JobRunner::with_events`] every stage boundary is sent over an
//! `mpsc` channel so a printer thread can show partial progress while the
//! batch is still running.

use crate::imaging::{
    EncodeRequest, ErrorKind, ImageCodec, ImagingError, Quality, RasterSurface, SourceAsset,
    SourceFormat,
};
use crate::naming::{self, UniqueNames};
use crate::pipeline::{Recipe, compose, plan};
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{info, instrument, warn};
use walkdir::WalkDir;

/// Most encodes a target-size search may spend.
pub const MAX_SIZE_ATTEMPTS: usize = 5;

/// Accept a target-size encode within this fraction of the target.
pub const SIZE_TOLERANCE: f64 = 0.10;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot walk {path}: {source}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no input images found")]
    NoInputs,
}

// ============================================================================
// State machine
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running { percent: u8 },
    Completed,
    Failed,
}

/// Stage boundaries reported while a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Decoded,
    Composed,
    Encoded,
}

impl JobStage {
    pub fn percent(self) -> u8 {
        match self {
            JobStage::Decoded => 25,
            JobStage::Composed => 60,
            JobStage::Encoded => 90,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            JobStage::Decoded => "decoded",
            JobStage::Composed => "transformed",
            JobStage::Encoded => "encoded",
        }
    }
}

/// Enforces the lifecycle: forward-only progress, one terminal state.
#[derive(Debug)]
pub struct JobTracker {
    state: JobState,
}

impl JobTracker {
    pub fn new() -> Self {
        Self {
            state: JobState::Pending,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn start(&mut self) {
        if self.state == JobState::Pending {
            self.state = JobState::Running { percent: 0 };
        }
    }

    /// Move progress forward. Returns the percentage now in effect, which is
    /// never lower than before.
    pub fn advance(&mut self, percent: u8) -> u8 {
        if let JobState::Running { percent: current } = self.state {
            let next = current.max(percent.min(100));
            self.state = JobState::Running { percent: next };
            next
        } else {
            0
        }
    }

    pub fn finish(&mut self, success: bool) {
        if matches!(self.state, JobState::Running { .. }) {
            self.state = if success {
                JobState::Completed
            } else {
                JobState::Failed
            };
        }
    }
}

impl Default for JobTracker {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Jobs and results
// ============================================================================

/// Where a job's bytes come from.
#[derive(Debug, Clone)]
pub enum JobInput {
    Asset(SourceAsset),
    /// Read from disk when the job starts.
    File(PathBuf),
}

impl JobInput {
    pub fn name(&self) -> Cow<'_, str> {
        match self {
            JobInput::Asset(asset) => Cow::Borrowed(asset.name()),
            JobInput::File(path) => path
                .file_name()
                .map_or(Cow::Borrowed(""), |n| n.to_string_lossy()),
        }
    }

    /// The asset, reading it now for file inputs. A read error is reported
    /// as a decode failure of that file.
    fn load(&self) -> Result<Cow<'_, SourceAsset>, ImagingError> {
        match self {
            JobInput::Asset(asset) => Ok(Cow::Borrowed(asset)),
            JobInput::File(path) => SourceAsset::from_path(path).map(Cow::Owned).map_err(|e| {
                ImagingError::DecodeFailure {
                    name: self.name().into_owned(),
                    reason: format!("cannot read {}: {e}", path.display()),
                }
            }),
        }
    }
}

/// One input file and what to do with it.
#[derive(Debug, Clone)]
pub struct Job {
    pub input: JobInput,
    pub recipe: Recipe,
    /// Base for the output name; defaults to the source name without extension.
    pub output_base: Option<String>,
}

impl Job {
    pub fn new(asset: SourceAsset, recipe: Recipe) -> Self {
        Self {
            input: JobInput::Asset(asset),
            recipe,
            output_base: None,
        }
    }

    /// A job whose file is read only when it runs.
    pub fn from_path(path: impl Into<PathBuf>, recipe: Recipe) -> Self {
        Self {
            input: JobInput::File(path.into()),
            recipe,
            output_base: None,
        }
    }

    pub fn name(&self) -> Cow<'_, str> {
        self.input.name()
    }

    pub fn with_output_base(mut self, base: impl Into<String>) -> Self {
        self.output_base = Some(base.into());
        self
    }
}

/// Encoded output of a completed job.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputAsset {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
    /// Lower-case hex SHA-256 of `bytes`.
    pub sha256: String,
    pub width: u32,
    pub height: u32,
    /// The encoder failed and these are the original bytes.
    pub fell_back: bool,
}

impl OutputAsset {
    pub fn byte_length(&self) -> usize {
        self.bytes.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobResult {
    Completed(OutputAsset),
    Failed {
        error_kind: ErrorKind,
        message: String,
    },
}

impl JobResult {
    pub fn is_completed(&self) -> bool {
        matches!(self, JobResult::Completed(_))
    }

    pub fn output(&self) -> Option<&OutputAsset> {
        match self {
            JobResult::Completed(out) => Some(out),
            JobResult::Failed { .. } => None,
        }
    }
}

/// A job's result together with the input it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub source_name: String,
    pub source_bytes: usize,
    pub result: JobResult,
}

/// Every outcome of a batch, in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobReport {
    pub outcomes: Vec<JobOutcome>,
}

impl JobReport {
    pub fn completed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_completed()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.completed()
    }

    /// Input and output byte totals over completed jobs.
    pub fn byte_totals(&self) -> (usize, usize) {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.output().map(|out| (o.source_bytes, out.byte_length())))
            .fold((0, 0), |(i, o), (a, b)| (i + a, o + b))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobEventKind {
    Started,
    Progress { stage: JobStage, percent: u8 },
    Completed {
        output_name: String,
        input_bytes: usize,
        output_bytes: usize,
        fell_back: bool,
    },
    Failed {
        error_kind: ErrorKind,
        message: String,
    },
}

/// Progress notification for one job of a batch (`index` is 0-based).
#[derive(Debug, Clone, PartialEq)]
pub struct JobEvent {
    pub index: usize,
    pub total: usize,
    pub name: String,
    pub kind: JobEventKind,
}

// ============================================================================
// Runner
// ============================================================================

/// Drives jobs through a codec, one at a time.
pub struct JobRunner<'a, C: ImageCodec> {
    codec: &'a C,
    events: Option<Sender<JobEvent>>,
}

impl<'a, C: ImageCodec> JobRunner<'a, C> {
    pub fn new(codec: &'a C) -> Self {
        Self {
            codec,
            events: None,
        }
    }

    pub fn with_events(mut self, events: Sender<JobEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Run a single job.
    pub fn run(&self, job: &Job) -> JobResult {
        self.run_indexed(0, 1, job, &mut UniqueNames::new()).result
    }

    /// Run jobs strictly in order. A failure never stops the batch.
    pub fn run_batch(&self, jobs: &[Job]) -> JobReport {
        self.run_batch_with(jobs, |_, _| {})
    }

    /// Like [`run_batch`](Self::run_batch), handing each outcome to `sink` as
    /// soon as it exists so callers can persist partial batches.
    pub fn run_batch_with(
        &self,
        jobs: &[Job],
        mut sink: impl FnMut(usize, &JobOutcome),
    ) -> JobReport {
        let total = jobs.len();
        let mut names = UniqueNames::new();
        let mut report = JobReport::default();
        for (index, job) in jobs.iter().enumerate() {
            let outcome = self.run_indexed(index, total, job, &mut names);
            sink(index, &outcome);
            report.outcomes.push(outcome);
        }
        info!(
            completed = report.completed(),
            failed = report.failed(),
            "batch finished"
        );
        report
    }

    fn emit(&self, index: usize, total: usize, name: &str, kind: JobEventKind) {
        if let Some(tx) = &self.events {
            tx.send(JobEvent {
                index,
                total,
                name: name.to_string(),
                kind,
            })
            .ok();
        }
    }

    /// Load, run and name one job. `names` holds the output names already
    /// used by earlier jobs of the batch.
    fn run_indexed(
        &self,
        index: usize,
        total: usize,
        job: &Job,
        names: &mut UniqueNames,
    ) -> JobOutcome {
        let job_name = job.name();
        let name = job_name.as_ref();
        let mut tracker = JobTracker::new();
        tracker.start();
        self.emit(index, total, name, JobEventKind::Started);

        let mut report = |stage: JobStage| {
            let percent = tracker.advance(stage.percent());
            self.emit(index, total, name, JobEventKind::Progress { stage, percent });
        };
        let loaded = job.input.load();
        let source_bytes = loaded.as_ref().map_or(0, |asset| asset.byte_length());
        let result = loaded.and_then(|asset| self.execute(job, &asset, &mut report));
        tracker.finish(result.is_ok());

        let result = match result {
            Ok(mut output) => {
                output.name = names.claim(&output.name);
                info!(name, output = %output.name, bytes = output.byte_length(), "completed");
                self.emit(
                    index,
                    total,
                    name,
                    JobEventKind::Completed {
                        output_name: output.name.clone(),
                        input_bytes: source_bytes,
                        output_bytes: output.byte_length(),
                        fell_back: output.fell_back,
                    },
                );
                JobResult::Completed(output)
            }
            Err(err) => {
                warn!(name, kind = %err.kind(), "failed: {err}");
                let (error_kind, message) = (err.kind(), err.to_string());
                self.emit(
                    index,
                    total,
                    name,
                    JobEventKind::Failed {
                        error_kind,
                        message: message.clone(),
                    },
                );
                JobResult::Failed {
                    error_kind,
                    message,
                }
            }
        };
        JobOutcome {
            source_name: name.to_string(),
            source_bytes,
            result,
        }
    }

    /// The fallible part of a job. The surface lives only inside this call.
    #[instrument(skip_all, fields(name = asset.name(), tool = job.recipe.tool.name()))]
    fn execute(
        &self,
        job: &Job,
        asset: &SourceAsset,
        report: &mut impl FnMut(JobStage),
    ) -> Result<OutputAsset, ImagingError> {
        let source_format = asset.validate()?;

        let surface = self.codec.decode(asset)?;
        let natural = surface.dimensions();
        report(JobStage::Decoded);

        let request = job.recipe.encode_request(source_format);
        let steps = plan(&job.recipe.tool, surface.dimensions(), request.format);
        let surface = compose(surface, &steps)?;
        report(JobStage::Composed);

        let (width, height) = surface.dimensions();
        let base = job
            .output_base
            .clone()
            .unwrap_or_else(|| naming::remove_extension(asset.name()).to_string());
        let suffix = job.recipe.tool.suffix();

        let output = match self.encode(&surface, &request, job.recipe.target_size) {
            Ok(bytes) => OutputAsset {
                name: naming::output_name_from_base(&base, &suffix, request.format.extension()),
                mime: request.format.mime().to_string(),
                sha256: digest(&bytes),
                bytes,
                width,
                height,
                fell_back: false,
            },
            Err(err @ ImagingError::EncodeFailure { .. }) => {
                warn!(name = asset.name(), "{err}; keeping original bytes");
                fallback_output(asset, source_format, natural, &base, &suffix)
            }
            Err(err) => return Err(err),
        };
        drop(surface);
        report(JobStage::Encoded);
        Ok(output)
    }

    /// Encode once, or search quality for a target size on lossy formats.
    ///
    /// Only the first encode of a search may fail the job; a later failure
    /// keeps the last successful result.
    fn encode(
        &self,
        surface: &RasterSurface,
        request: &EncodeRequest,
        target_size: Option<usize>,
    ) -> Result<Vec<u8>, ImagingError> {
        let target = match target_size {
            Some(t) if request.format.is_lossy() && t > 0 => t,
            _ => return self.codec.encode(surface, request),
        };

        let mut current = *request;
        let mut bytes = self.codec.encode(surface, &current)?;
        let mut attempts = 1;
        while attempts < MAX_SIZE_ATTEMPTS {
            match next_quality(current.quality, bytes.len(), target) {
                None => break,
                Some(quality) => {
                    let retry = EncodeRequest { quality, ..current };
                    attempts += 1;
                    match self.codec.encode(surface, &retry) {
                        Ok(next) => {
                            current = retry;
                            bytes = next;
                        }
                        Err(err) => {
                            warn!(
                                quality = quality.percent(),
                                "{err}; keeping the previous encode"
                            );
                            break;
                        }
                    }
                }
            }
        }
        info!(
            attempts,
            bytes = bytes.len(),
            target,
            quality = current.quality.percent(),
            "target size search"
        );
        Ok(bytes)
    }
}

/// Next quality to try, or `None` when `size` is within tolerance of `target`.
///
/// Too big: quality × 0.8. Too small: quality × 1.1. Clamped to 0.1–1.0.
pub fn next_quality(current: Quality, size: usize, target: usize) -> Option<Quality> {
    let (size, target_f) = (size as f64, target as f64);
    if (size - target_f).abs() <= target_f * SIZE_TOLERANCE {
        return None;
    }
    let factor = if size > target_f { 0.8 } else { 1.1 };
    Some(Quality::new((current.fraction() * factor).clamp(0.1, 1.0)))
}

fn fallback_output(
    asset: &SourceAsset,
    format: SourceFormat,
    natural: (u32, u32),
    base: &str,
    suffix: &str,
) -> OutputAsset {
    let ext = match naming::extension(asset.name()) {
        e if e.is_empty() => format.default_output().extension().to_string(),
        e => e,
    };
    let bytes = asset.bytes().to_vec();
    OutputAsset {
        name: naming::output_name_from_base(base, suffix, &ext),
        mime: asset.mime().to_string(),
        sha256: digest(&bytes),
        bytes,
        width: natural.0,
        height: natural.1,
        fell_back: true,
    }
}

/// Lower-case hex SHA-256.
pub fn digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

// ============================================================================
// Batch I/O
// ============================================================================

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(SourceFormat::from_extension)
        .is_some()
}

/// Expand files and directories into an ordered list of input files.
///
/// Files are kept as given, whatever their extension, so that unsupported
/// inputs show up as failed jobs. Directories are walked recursively and
/// contribute only files with an image extension, sorted by path.
pub fn collect_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>, BatchError> {
    let mut inputs = Vec::new();
    for path in paths {
        let meta = std::fs::metadata(path).map_err(|source| BatchError::Read {
            path: path.clone(),
            source,
        })?;
        if meta.is_dir() {
            let mut found = Vec::new();
            for entry in WalkDir::new(path).follow_links(true) {
                let entry = entry.map_err(|source| BatchError::Walk {
                    path: path.clone(),
                    source,
                })?;
                if entry.file_type().is_file() && has_image_extension(entry.path()) {
                    found.push(entry.into_path());
                }
            }
            found.sort();
            inputs.extend(found);
        } else {
            inputs.push(path.clone());
        }
    }
    if inputs.is_empty() {
        return Err(BatchError::NoInputs);
    }
    Ok(inputs)
}

/// Write a completed output into `dir`, creating it if needed.
pub fn write_output(dir: &Path, output: &OutputAsset) -> Result<PathBuf, BatchError> {
    std::fs::create_dir_all(dir).map_err(|source| BatchError::Write {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(&output.name);
    std::fs::write(&path, &output.bytes).map_err(|source| BatchError::Write {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockCodec, RecordedOp};
    use crate::imaging::{DisplayRect, OutputFormat, ResizeMode, ResizeParams, WatermarkParams};
    use crate::pipeline::Tool;
    use std::sync::mpsc;
    use tempfile::TempDir;

    fn png(name: &str) -> SourceAsset {
        SourceAsset::new(name, "image/png", vec![7u8; 300])
    }

    fn compress() -> Recipe {
        Recipe::new(Tool::Compress { max_edge: None })
    }

    // =========================================================================
    // JobTracker
    // =========================================================================

    #[test]
    fn tracker_walks_lifecycle() {
        let mut t = JobTracker::new();
        assert_eq!(t.state(), JobState::Pending);
        t.start();
        assert_eq!(t.advance(25), 25);
        t.finish(true);
        assert_eq!(t.state(), JobState::Completed);
    }

    #[test]
    fn tracker_progress_never_goes_back() {
        let mut t = JobTracker::new();
        t.start();
        t.advance(60);
        assert_eq!(t.advance(25), 60);
        assert_eq!(t.state(), JobState::Running { percent: 60 });
    }

    #[test]
    fn tracker_terminal_state_is_final() {
        let mut t = JobTracker::new();
        t.start();
        t.finish(false);
        t.finish(true);
        t.start();
        assert_eq!(t.state(), JobState::Failed);
    }

    #[test]
    fn tracker_ignores_progress_before_start() {
        let mut t = JobTracker::new();
        assert_eq!(t.advance(50), 0);
        assert_eq!(t.state(), JobState::Pending);
    }

    // =========================================================================
    // Single jobs
    // =========================================================================

    #[test]
    fn run_completes_with_named_output() {
        let codec = MockCodec::new((64, 48));
        let runner = JobRunner::new(&codec);
        let result = runner.run(&Job::new(png("cat.png"), compress()));

        let out = result.output().unwrap();
        assert_eq!(out.name, "cat_compressed.jpg");
        assert_eq!(out.mime, "image/jpeg");
        assert_eq!((out.width, out.height), (64, 48));
        assert_eq!(out.sha256, digest(&out.bytes));
        assert!(!out.fell_back);
    }

    #[test]
    fn unsupported_mime_fails_before_decode() {
        let codec = MockCodec::new((10, 10));
        let asset = SourceAsset::new("doc.pdf", "application/pdf", vec![1u8; 10]);
        let result = JobRunner::new(&codec).run(&Job::new(asset, compress()));

        assert!(matches!(
            result,
            JobResult::Failed {
                error_kind: ErrorKind::UnsupportedFormat,
                ..
            }
        ));
        assert!(codec.get_operations().is_empty());
    }

    #[test]
    fn empty_crop_fails_job() {
        let codec = MockCodec::new((100, 100));
        let tool = Tool::Crop {
            rect: DisplayRect {
                x: 10.0,
                y: 10.0,
                width: 0.0,
                height: 50.0,
            },
            displayed: None,
        };
        let result = JobRunner::new(&codec).run(&Job::new(png("a.png"), Recipe::new(tool)));
        assert!(matches!(
            result,
            JobResult::Failed {
                error_kind: ErrorKind::EmptyCropArea,
                ..
            }
        ));
    }

    #[test]
    fn encode_failure_falls_back_to_original_bytes() {
        let codec = MockCodec::new((10, 10)).refusing_encode();
        let asset = png("keep.png");
        let result = JobRunner::new(&codec).run(&Job::new(asset.clone(), compress()));

        let out = result.output().unwrap();
        assert!(out.fell_back);
        assert_eq!(out.bytes, asset.bytes());
        assert_eq!((out.width, out.height), (10, 10));
        assert_eq!(out.mime, "image/png");
        assert_eq!(out.name, "keep_compressed.png");
    }

    #[test]
    fn output_base_overrides_source_name() {
        let codec = MockCodec::new((10, 10));
        let job = Job::new(png("scan-0001.png"), Recipe::new(Tool::ExportPage { page: 3 }))
            .with_output_base("report");
        let result = JobRunner::new(&codec).run(&job);
        assert_eq!(result.output().unwrap().name, "report_page_3.png");
    }

    #[test]
    fn resize_plan_reaches_encoder() {
        let codec = MockCodec::new((2000, 1000));
        let mut params = ResizeParams::new(800, 800, ResizeMode::Contain);
        params.maintain_aspect_ratio = true;
        let recipe = Recipe::new(Tool::Resize(params)).with_format(OutputFormat::Jpeg);
        JobRunner::new(&codec).run(&Job::new(png("wide.png"), recipe));

        let encoded = codec
            .get_operations()
            .into_iter()
            .find_map(|op| match op {
                RecordedOp::Encode { width, height, .. } => Some((width, height)),
                _ => None,
            });
        assert_eq!(encoded, Some((800, 800)));
    }

    #[test]
    fn oversize_watermark_fails_job() {
        let codec = MockCodec::new((64, 64));
        let mut params = WatermarkParams::new("HELLO");
        params.font_size = u32::MAX;
        let result = JobRunner::new(&codec).run(&Job::new(png("w.png"), Recipe::new(Tool::Watermark(params))));
        assert!(matches!(
            result,
            JobResult::Failed {
                error_kind: ErrorKind::CanvasUnavailable,
                ..
            }
        ));
    }

    // =========================================================================
    // Batches
    // =========================================================================

    #[test]
    fn batch_partial_failure_keeps_going() {
        let codec = MockCodec::new((32, 32)).with_corrupt("b.png");
        let jobs: Vec<Job> = ["a.png", "b.png", "c.png", "d.png"]
            .into_iter()
            .map(|n| Job::new(png(n), compress()))
            .collect();
        let report = JobRunner::new(&codec).run_batch(&jobs);

        assert_eq!(report.completed(), 3);
        assert_eq!(report.failed(), 1);
        let names: Vec<_> = report.outcomes.iter().map(|o| o.source_name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "b.png", "c.png", "d.png"]);
        assert!(matches!(
            report.outcomes[1].result,
            JobResult::Failed {
                error_kind: ErrorKind::DecodeFailure,
                ..
            }
        ));
    }

    #[test]
    fn batch_disambiguates_repeated_output_names() {
        let codec = MockCodec::new((8, 8));
        let jobs: Vec<Job> = ["a.png", "a.png", "a.jpg", "b.png"]
            .into_iter()
            .map(|n| Job::new(png(n), compress()))
            .collect();
        let report = JobRunner::new(&codec).run_batch(&jobs);

        let names: Vec<_> = report
            .outcomes
            .iter()
            .map(|o| o.result.output().unwrap().name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "a_compressed.jpg",
                "a_compressed_2.jpg",
                "a_compressed_3.jpg",
                "b_compressed.jpg"
            ]
        );
    }

    #[test]
    fn unique_names_reach_completed_events() {
        let codec = MockCodec::new((8, 8));
        let (tx, rx) = mpsc::channel();
        let jobs = vec![
            Job::new(png("a.png"), compress()),
            Job::new(png("a.png"), compress()),
        ];
        JobRunner::new(&codec).with_events(tx).run_batch(&jobs);
        let completed: Vec<String> = rx
            .into_iter()
            .filter_map(|e| match e.kind {
                JobEventKind::Completed { output_name, .. } => Some(output_name),
                _ => None,
            })
            .collect();
        assert_eq!(completed, vec!["a_compressed.jpg", "a_compressed_2.jpg"]);
    }

    #[test]
    fn file_jobs_read_lazily_and_fail_alone() {
        let tmp = TempDir::new().unwrap();
        let first = tmp.path().join("one.png");
        let missing = tmp.path().join("two.png");
        let third = tmp.path().join("three.png");
        std::fs::write(&first, vec![7u8; 40]).unwrap();
        std::fs::write(&missing, vec![7u8; 40]).unwrap();
        std::fs::write(&third, vec![7u8; 60]).unwrap();

        let paths = collect_inputs(&[first, missing.clone(), third]).unwrap();
        let jobs: Vec<Job> = paths.into_iter().map(|p| Job::from_path(p, compress())).collect();
        // Gone between discovery and its turn in the batch.
        std::fs::remove_file(&missing).unwrap();

        let codec = MockCodec::new((8, 8));
        let report = JobRunner::new(&codec).run_batch(&jobs);

        assert_eq!(report.completed(), 2);
        let names: Vec<_> = report.outcomes.iter().map(|o| o.source_name.as_str()).collect();
        assert_eq!(names, vec!["one.png", "two.png", "three.png"]);
        match &report.outcomes[1].result {
            JobResult::Failed {
                error_kind,
                message,
            } => {
                assert_eq!(*error_kind, ErrorKind::DecodeFailure);
                assert!(message.contains("cannot read"), "{message}");
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(report.outcomes[1].source_bytes, 0);
        assert_eq!(report.outcomes[2].source_bytes, 60);
        // the unreadable file never reached the codec
        let decoded: Vec<_> = codec
            .get_operations()
            .into_iter()
            .filter_map(|op| match op {
                RecordedOp::Decode(n) => Some(n),
                _ => None,
            })
            .collect();
        assert_eq!(decoded, vec!["one.png", "three.png"]);
    }

    #[test]
    fn batch_runs_sequentially() {
        let codec = MockCodec::new((8, 8));
        let jobs: Vec<Job> = ["x.png", "y.png"]
            .into_iter()
            .map(|n| Job::new(png(n), compress()))
            .collect();
        JobRunner::new(&codec).run_batch(&jobs);

        let ops = codec.get_operations();
        assert!(matches!(&ops[0], RecordedOp::Decode(n) if n == "x.png"));
        assert!(matches!(&ops[1], RecordedOp::Encode { .. }));
        assert!(matches!(&ops[2], RecordedOp::Decode(n) if n == "y.png"));
    }

    #[test]
    fn batch_sink_sees_each_outcome() {
        let codec = MockCodec::new((8, 8));
        let jobs: Vec<Job> = ["x.png", "y.png", "z.png"]
            .into_iter()
            .map(|n| Job::new(png(n), compress()))
            .collect();
        let mut seen = Vec::new();
        JobRunner::new(&codec).run_batch_with(&jobs, |i, o| seen.push((i, o.source_name.clone())));
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2], (2, "z.png".to_string()));
    }

    #[test]
    fn events_report_monotonic_progress() {
        let codec = MockCodec::new((8, 8)).with_corrupt("bad.png");
        let (tx, rx) = mpsc::channel();
        let jobs = vec![
            Job::new(png("ok.png"), compress()),
            Job::new(png("bad.png"), compress()),
        ];
        JobRunner::new(&codec).with_events(tx).run_batch(&jobs);
        let events: Vec<JobEvent> = rx.into_iter().collect();

        let first: Vec<_> = events.iter().filter(|e| e.index == 0).collect();
        assert_eq!(first[0].kind, JobEventKind::Started);
        let percents: Vec<u8> = first
            .iter()
            .filter_map(|e| match e.kind {
                JobEventKind::Progress { percent, .. } => Some(percent),
                _ => None,
            })
            .collect();
        assert_eq!(percents, vec![25, 60, 90]);
        assert!(matches!(first.last().unwrap().kind, JobEventKind::Completed { .. }));

        let second: Vec<_> = events.iter().filter(|e| e.index == 1).collect();
        assert_eq!(second.len(), 2);
        assert!(matches!(second[1].kind, JobEventKind::Failed { .. }));
        assert!(events.iter().all(|e| e.total == 2));
    }

    // =========================================================================
    // Target size search
    // =========================================================================

    #[test]
    fn next_quality_direction() {
        assert_eq!(next_quality(Quality::new(0.9), 1000, 1000), None);
        assert_eq!(next_quality(Quality::new(0.9), 1090, 1000), None);
        let lower = next_quality(Quality::new(0.5), 2000, 1000).unwrap();
        assert!((lower.fraction() - 0.4).abs() < 1e-6);
        let higher = next_quality(Quality::new(0.5), 100, 1000).unwrap();
        assert!((higher.fraction() - 0.55).abs() < 1e-6);
        let floor = next_quality(Quality::new(0.1), 5000, 1000).unwrap();
        assert!((floor.fraction() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn target_size_search_caps_attempts() {
        // Mock output is 1024 * quality bytes; 400 bytes takes all five encodes.
        let codec = MockCodec::new((8, 8));
        let recipe = compress().with_target_size(400);
        let result = JobRunner::new(&codec).run(&Job::new(png("t.png"), recipe));

        let encodes = codec
            .get_operations()
            .iter()
            .filter(|op| matches!(op, RecordedOp::Encode { .. }))
            .count();
        assert_eq!(encodes, MAX_SIZE_ATTEMPTS);
        let len = result.output().unwrap().byte_length();
        assert!((360..=440).contains(&len), "{len}");
    }

    #[test]
    fn target_size_search_keeps_last_good_encode() {
        // Third encode fails; the second one is the result.
        let codec = MockCodec::new((8, 8)).failing_encode_after(2);
        let recipe = compress().with_target_size(400);
        let result = JobRunner::new(&codec).run(&Job::new(png("t.png"), recipe));

        let qualities: Vec<Quality> = codec
            .get_operations()
            .into_iter()
            .filter_map(|op| match op {
                RecordedOp::Encode { quality, .. } => Some(quality),
                _ => None,
            })
            .collect();
        assert_eq!(qualities.len(), 3);

        let out = result.output().unwrap();
        assert!(!out.fell_back);
        let expected = (1024.0 * qualities[1].fraction()).round() as usize;
        assert_eq!(out.byte_length(), expected);
        assert!(out.bytes.iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn target_size_first_encode_failure_still_falls_back() {
        let codec = MockCodec::new((8, 8)).failing_encode_after(0);
        let asset = png("t.png");
        let recipe = compress().with_target_size(400);
        let result = JobRunner::new(&codec).run(&Job::new(asset.clone(), recipe));
        let out = result.output().unwrap();
        assert!(out.fell_back);
        assert_eq!(out.bytes, asset.bytes());
    }

    #[test]
    fn target_size_ignored_for_lossless() {
        let codec = MockCodec::new((8, 8));
        let recipe = compress()
            .with_format(OutputFormat::Png)
            .with_target_size(10);
        JobRunner::new(&codec).run(&Job::new(png("t.png"), recipe));
        let encodes = codec
            .get_operations()
            .iter()
            .filter(|op| matches!(op, RecordedOp::Encode { .. }))
            .count();
        assert_eq!(encodes, 1);
    }

    // =========================================================================
    // Batch I/O
    // =========================================================================

    #[test]
    fn collect_inputs_walks_directories_sorted() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("nested");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(tmp.path().join("b.jpg"), b"x").unwrap();
        std::fs::write(tmp.path().join("a.PNG"), b"x").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), b"x").unwrap();
        std::fs::write(nested.join("c.webp"), b"x").unwrap();

        let inputs = collect_inputs(&[tmp.path().to_path_buf()]).unwrap();
        let names: Vec<_> = inputs
            .iter()
            .map(|p| p.strip_prefix(tmp.path()).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.PNG", "b.jpg", "nested/c.webp"]);
    }

    #[test]
    fn collect_inputs_keeps_explicit_files() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("odd.txt");
        std::fs::write(&file, b"x").unwrap();
        assert_eq!(collect_inputs(&[file.clone()]).unwrap(), vec![file]);
    }

    #[test]
    fn collect_inputs_missing_path_is_error() {
        let tmp = TempDir::new().unwrap();
        let err = collect_inputs(&[tmp.path().join("nope.jpg")]).unwrap_err();
        assert!(matches!(err, BatchError::Read { .. }));
    }

    #[test]
    fn collect_inputs_empty_dir_is_no_inputs() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            collect_inputs(&[tmp.path().to_path_buf()]),
            Err(BatchError::NoInputs)
        ));
    }

    #[test]
    fn write_output_creates_dir() {
        let tmp = TempDir::new().unwrap();
        let out = OutputAsset {
            name: "x_compressed.jpg".into(),
            mime: "image/jpeg".into(),
            bytes: vec![1, 2, 3],
            sha256: digest(&[1, 2, 3]),
            width: 1,
            height: 1,
            fell_back: false,
        };
        let path = write_output(&tmp.path().join("out"), &out).unwrap();
        assert_eq!(std::fs::read(path).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn digest_is_hex_sha256() {
        assert_eq!(
            digest(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
