//! CLI output formatting.
//!
//! Each job leads with its positional index and source name; stage progress
//! and the result are indented context lines:
//!
//! ```text
//! 001/003 holiday.jpg
//!     decoded (25%)
//!     transformed (60%)
//!     encoded (90%)
//!     → holiday_compressed.jpg  2.31 MB → 540.12 KB (77% smaller)
//! 002/003 broken.png
//!     failed [DecodeFailure]: could not decode broken.png: ...
//! ```
//!
//! A batch ends with a summary:
//!
//! ```text
//! Processed 2 of 3 files (1 failed)
//! Total: 4.62 MB → 1.01 MB (78% smaller)
//!     sha256 9f86d0…  holiday_compressed.jpg
//! ```
//!
//! # Architecture
//!
//! Every view has a `format_*` function (returns `Vec<String>`) for
//! testability and, where the binary needs it, a `print_*` wrapper that
//! writes to stdout. Format functions are pure: no I/O, no side effects.

use crate::analytics::AnalyticsEvent;
use crate::job::{JobEvent, JobEventKind, JobReport, JobResult};
use crate::pipeline::PassportSpec;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Human-readable byte count, 1024-based, at most two decimals.
///
/// ```
/// use pixelsmith::output::format_file_size;
/// assert_eq!(format_file_size(0), "0 Bytes");
/// assert_eq!(format_file_size(1536), "1.5 KB");
/// ```
pub fn format_file_size(bytes: usize) -> String {
    const UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut exp = 0;
    while value >= 1024.0 && exp < UNITS.len() - 1 {
        value /= 1024.0;
        exp += 1;
    }
    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[exp])
}

/// Percent saved, rounded. Negative when the output grew; 0 for an empty input.
pub fn compression_ratio(original: usize, compressed: usize) -> i64 {
    if original == 0 {
        return 0;
    }
    ((original as f64 - compressed as f64) / original as f64 * 100.0).round() as i64
}

fn size_change(original: usize, compressed: usize) -> String {
    let ratio = compression_ratio(original, compressed);
    let change = match ratio {
        0 => "same size".to_string(),
        r if r > 0 => format!("{r}% smaller"),
        r => format!("{}% larger", -r),
    };
    format!(
        "{} → {} ({})",
        format_file_size(original),
        format_file_size(compressed),
        change
    )
}

// ============================================================================
// Job progress
// ============================================================================

/// Format a single job event as display lines.
pub fn format_job_event(event: &JobEvent) -> Vec<String> {
    match &event.kind {
        JobEventKind::Started => vec![format!(
            "{}/{} {}",
            format_index(event.index + 1),
            format_index(event.total),
            event.name
        )],
        JobEventKind::Progress { stage, percent } => {
            vec![format!("    {} ({}%)", stage.label(), percent)]
        }
        JobEventKind::Completed {
            output_name,
            input_bytes,
            output_bytes,
            fell_back,
        } => {
            let mut lines = vec![format!(
                "    → {}  {}",
                output_name,
                size_change(*input_bytes, *output_bytes)
            )];
            if *fell_back {
                lines.push("    encoder produced nothing; original bytes kept".to_string());
            }
            lines
        }
        JobEventKind::Failed {
            error_kind,
            message,
        } => vec![format!("    failed [{}]: {}", error_kind, message)],
    }
}

// ============================================================================
// Batch summary
// ============================================================================

/// Totals and checksums for a finished batch.
pub fn format_batch_summary(report: &JobReport) -> Vec<String> {
    let total = report.outcomes.len();
    let failed = report.failed();
    let mut lines = Vec::new();

    if failed == 0 {
        lines.push(format!("Processed {} of {} files", report.completed(), total));
    } else {
        lines.push(format!(
            "Processed {} of {} files ({} failed)",
            report.completed(),
            total,
            failed
        ));
    }

    let (input, output) = report.byte_totals();
    if report.completed() > 0 {
        lines.push(format!("Total: {}", size_change(input, output)));
    }

    for outcome in &report.outcomes {
        if let JobResult::Completed(out) = &outcome.result {
            lines.push(format!("    sha256 {}  {}", out.sha256, out.name));
        }
    }
    lines
}

pub fn print_batch_summary(report: &JobReport) {
    for line in format_batch_summary(report) {
        println!("{}", line);
    }
}

// ============================================================================
// History and listings
// ============================================================================

/// One line per recorded batch, oldest first.
pub fn format_history(events: &[AnalyticsEvent]) -> Vec<String> {
    if events.is_empty() {
        return vec!["No history recorded".to_string()];
    }
    events
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let props = match &e.properties {
                serde_json::Value::Null => String::new(),
                serde_json::Value::Object(map) if map.is_empty() => String::new(),
                other => format!("  {}", other),
            };
            format!(
                "{} {}  {}{}",
                format_index(i + 1),
                e.timestamp.format("%Y-%m-%d %H:%M:%S"),
                e.event,
                props
            )
        })
        .collect()
}

pub fn print_history(events: &[AnalyticsEvent]) {
    for line in format_history(events) {
        println!("{}", line);
    }
}

/// The passport standards, as `key  label  WxH px`.
pub fn format_passport_specs() -> Vec<String> {
    PassportSpec::ALL
        .iter()
        .map(|spec| {
            let (w, h) = spec.dimensions();
            format!("{:<10} {:<28} {}x{} px", spec.key(), spec.label(), w, h)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::ErrorKind;
    use crate::job::{JobOutcome, JobStage, OutputAsset};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn event(kind: JobEventKind) -> JobEvent {
        JobEvent {
            index: 0,
            total: 3,
            name: "holiday.jpg".into(),
            kind,
        }
    }

    fn completed(name: &str, source_bytes: usize, out_bytes: usize) -> JobOutcome {
        JobOutcome {
            source_name: name.into(),
            source_bytes,
            result: JobResult::Completed(OutputAsset {
                name: format!("{name}.out"),
                mime: "image/jpeg".into(),
                bytes: vec![0; out_bytes],
                sha256: "abc123".into(),
                width: 10,
                height: 10,
                fell_back: false,
            }),
        }
    }

    fn failed(name: &str) -> JobOutcome {
        JobOutcome {
            source_name: name.into(),
            source_bytes: 100,
            result: JobResult::Failed {
                error_kind: ErrorKind::DecodeFailure,
                message: "bad data".into(),
            },
        }
    }

    // =========================================================================
    // Sizes
    // =========================================================================

    #[test]
    fn file_size_units() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(500), "500 Bytes");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(1024 * 1024), "1 MB");
        assert_eq!(format_file_size(1_234_567), "1.18 MB");
        assert_eq!(format_file_size(3 * 1024 * 1024 * 1024), "3 GB");
    }

    #[test]
    fn ratio_rounds_and_handles_zero() {
        assert_eq!(compression_ratio(1000, 250), 75);
        assert_eq!(compression_ratio(3, 2), 33);
        assert_eq!(compression_ratio(100, 150), -50);
        assert_eq!(compression_ratio(0, 10), 0);
    }

    // =========================================================================
    // Job events
    // =========================================================================

    #[test]
    fn started_shows_position() {
        assert_eq!(
            format_job_event(&event(JobEventKind::Started)),
            vec!["001/003 holiday.jpg"]
        );
    }

    #[test]
    fn progress_shows_stage_and_percent() {
        let lines = format_job_event(&event(JobEventKind::Progress {
            stage: JobStage::Composed,
            percent: 60,
        }));
        assert_eq!(lines, vec![format!("    {} (60%)", JobStage::Composed.label())]);
    }

    #[test]
    fn completed_shows_sizes() {
        let lines = format_job_event(&event(JobEventKind::Completed {
            output_name: "holiday_compressed.jpg".into(),
            input_bytes: 2048,
            output_bytes: 512,
            fell_back: false,
        }));
        assert_eq!(
            lines,
            vec!["    → holiday_compressed.jpg  2 KB → 512 Bytes (75% smaller)"]
        );
    }

    #[test]
    fn fallback_is_called_out() {
        let lines = format_job_event(&event(JobEventKind::Completed {
            output_name: "a.png".into(),
            input_bytes: 10,
            output_bytes: 10,
            fell_back: true,
        }));
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("same size"));
        assert!(lines[1].contains("original bytes"));
    }

    #[test]
    fn failure_shows_kind() {
        let lines = format_job_event(&event(JobEventKind::Failed {
            error_kind: ErrorKind::EmptyCropArea,
            message: "nothing left".into(),
        }));
        assert_eq!(lines, vec!["    failed [EmptyCropArea]: nothing left"]);
    }

    // =========================================================================
    // Batch summary
    // =========================================================================

    #[test]
    fn summary_counts_failures_and_lists_checksums() {
        let report = JobReport {
            outcomes: vec![completed("a", 1000, 400), failed("b"), completed("c", 1000, 600)],
        };
        let lines = format_batch_summary(&report);
        assert_eq!(lines[0], "Processed 2 of 3 files (1 failed)");
        assert_eq!(lines[1], "Total: 1.95 KB → 1000 Bytes (50% smaller)");
        assert_eq!(lines[2], "    sha256 abc123  a.out");
        assert_eq!(lines[3], "    sha256 abc123  c.out");
    }

    #[test]
    fn summary_without_completions_has_no_total() {
        let report = JobReport {
            outcomes: vec![failed("x")],
        };
        assert_eq!(
            format_batch_summary(&report),
            vec!["Processed 0 of 1 files (1 failed)"]
        );
    }

    // =========================================================================
    // History
    // =========================================================================

    #[test]
    fn empty_history() {
        assert_eq!(format_history(&[]), vec!["No history recorded"]);
    }

    #[test]
    fn history_lines() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 5, 0).unwrap();
        let events = vec![
            AnalyticsEvent {
                event: "compress".into(),
                properties: json!({"files": 2}),
                timestamp: at,
            },
            AnalyticsEvent {
                event: "gen-config".into(),
                properties: json!({}),
                timestamp: at,
            },
        ];
        assert_eq!(
            format_history(&events),
            vec![
                r#"001 2024-03-01 09:05:00  compress  {"files":2}"#,
                "002 2024-03-01 09:05:00  gen-config",
            ]
        );
    }

    #[test]
    fn passport_listing_has_every_spec() {
        let lines = format_passport_specs();
        assert_eq!(lines.len(), PassportSpec::ALL.len());
        assert!(lines.iter().any(|l| l.starts_with("us ") && l.ends_with("600x600 px")));
    }
}
