//! Local usage history.
//!
//! Each batch appends one event to a JSON array on disk. Only the newest
//! [`MAX_EVENTS`] entries are kept. The log is write-mostly: the processing
//! pipeline never reads it, and only the `history` command shows it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Entries kept in the log file.
pub const MAX_EVENTS: usize = 100;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub event: String,
    #[serde(default)]
    pub properties: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Capped JSON event log at a fixed path.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an event stamped with the current time.
    pub fn record(
        &self,
        event: &str,
        properties: serde_json::Value,
    ) -> Result<AnalyticsEvent, AnalyticsError> {
        self.record_at(event, properties, Utc::now())
    }

    fn record_at(
        &self,
        event: &str,
        properties: serde_json::Value,
        timestamp: DateTime<Utc>,
    ) -> Result<AnalyticsEvent, AnalyticsError> {
        let entry = AnalyticsEvent {
            event: event.to_string(),
            properties,
            timestamp,
        };
        let mut events = self.load()?;
        events.push(entry.clone());
        if events.len() > MAX_EVENTS {
            events.drain(..events.len() - MAX_EVENTS);
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(&events)?)?;
        debug!(event, path = %self.path.display(), kept = events.len(), "recorded");
        Ok(entry)
    }

    /// All stored events, oldest first. A missing file is an empty log.
    pub fn load(&self) -> Result<Vec<AnalyticsEvent>, AnalyticsError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read(&self.path)?;
        if content.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_slice(&content)?)
    }

    /// Remove the log file. Clearing an absent log is not an error.
    pub fn clear(&self) -> Result<(), AnalyticsError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
