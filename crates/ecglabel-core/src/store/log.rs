//! File-backed annotation log.
//!
//! One event per line, tab-separated, in the fixed column order
//! `signal_id, rater_id, label, timestamp, comment`:
//!
//! ```text
//! # ecglabel annotation log v1
//! # fields: signal_id \t rater_id \t label \t timestamp \t comment
//! 201\tuser1\tNormal\t2025-03-04T10:00:00.000000Z\t
//! 201\tuser2\tFibrillation\t2025-03-04T10:02:11.250000Z\t"irregular RR"
//! ```
//!
//! The comment column is either empty or a JSON string literal, so free
//! text with tabs or line breaks still fits on one line. Appends hold an
//! advisory lock and use `O_APPEND`; reads take no lock and skip malformed
//! lines with a warning (a reader can observe a torn final line while a
//! writer is mid-append).

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, warn};

use super::{RecordStore, StoreError};
use crate::lock::AppendLock;
use crate::model::{AnnotationEvent, Label, RaterId, SignalId};

/// The header line written at the top of every annotation log.
pub const LOG_HEADER: &str = "# ecglabel annotation log v1";

/// The field comment line that follows the header.
pub const FIELD_COMMENT: &str =
    "# fields: signal_id \\t rater_id \\t label \\t timestamp \\t comment";

/// The log format version understood by this build.
pub const CURRENT_VERSION: u32 = 1;

const HEADER_PREFIX: &str = "# ecglabel annotation log v";
const FIELD_COUNT: usize = 5;

// ---------------------------------------------------------------------------
// Line codec
// ---------------------------------------------------------------------------

/// Errors for one log line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LogParseError {
    #[error("expected 5 tab-separated fields, found {0}")]
    FieldCount(usize),

    #[error("invalid signal_id: '{0}'")]
    InvalidSignalId(String),

    #[error("invalid rater_id: '{0}'")]
    InvalidRater(String),

    #[error("invalid label: '{0}'")]
    InvalidLabel(String),

    #[error("invalid timestamp (not RFC 3339): '{0}'")]
    InvalidTimestamp(String),

    #[error("invalid comment encoding: {0}")]
    InvalidComment(String),
}

/// Serialize an event to one log line, without the trailing newline.
///
/// # Errors
///
/// Returns [`StoreError::Encode`] if the comment cannot be JSON-encoded.
pub fn to_log_line(event: &AnnotationEvent) -> Result<String, StoreError> {
    let comment = match &event.comment {
        Some(text) => serde_json::to_string(text)?,
        None => String::new(),
    };

    Ok(format!(
        "{}\t{}\t{}\t{}\t{}",
        event.signal_id,
        event.rater_id,
        event.label,
        event.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
        comment,
    ))
}

/// Parse one data line (not a comment or blank line).
///
/// # Errors
///
/// Returns the first [`LogParseError`] found in the line.
pub fn parse_log_line(line: &str) -> Result<AnnotationEvent, LogParseError> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != FIELD_COUNT {
        return Err(LogParseError::FieldCount(fields.len()));
    }

    let signal_id = fields[0]
        .parse::<SignalId>()
        .map_err(|_| LogParseError::InvalidSignalId(fields[0].to_string()))?;
    let rater_id = RaterId::new(fields[1])
        .map_err(|_| LogParseError::InvalidRater(fields[1].to_string()))?;
    let label = fields[2]
        .parse::<Label>()
        .map_err(|_| LogParseError::InvalidLabel(fields[2].to_string()))?;
    let timestamp = DateTime::parse_from_rfc3339(fields[3])
        .map_err(|_| LogParseError::InvalidTimestamp(fields[3].to_string()))?
        .with_timezone(&Utc);
    let comment = if fields[4].is_empty() {
        None
    } else {
        Some(
            serde_json::from_str::<String>(fields[4])
                .map_err(|e| LogParseError::InvalidComment(e.to_string()))?,
        )
    };

    Ok(AnnotationEvent {
        signal_id,
        rater_id,
        label,
        timestamp,
        comment,
    })
}

/// Detect the log format version from its first line.
///
/// # Errors
///
/// Returns an actionable message when the header is malformed or names a
/// version newer than [`CURRENT_VERSION`].
pub fn detect_version(first_line: &str) -> Result<u32, String> {
    let line = first_line.trim();
    let Some(version_str) = line.strip_prefix(HEADER_PREFIX) else {
        return Err(format!(
            "invalid annotation log header: expected '{HEADER_PREFIX}N', got '{line}'"
        ));
    };
    let version: u32 = version_str.parse().map_err(|_| {
        format!("invalid version number '{version_str}' in annotation log header")
    })?;
    if version > CURRENT_VERSION {
        return Err(format!(
            "annotation log version {version} is newer than this build supports \
             (up to v{CURRENT_VERSION}); upgrade ecglabel"
        ));
    }
    Ok(version)
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Tuning for [`LogRecordStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogOptions {
    /// How long an append waits for a concurrent writer.
    pub lock_timeout: Duration,
    /// Call `sync_data` after each append.
    pub durable: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(2_000),
            durable: false,
        }
    }
}

/// A line skipped while reading the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineWarning {
    /// One-based line number.
    pub line_no: usize,
    pub error: LogParseError,
}

/// Events plus skipped-line warnings from one read.
#[derive(Debug, Clone, Default)]
pub struct LogRead {
    pub events: Vec<AnnotationEvent>,
    pub warnings: Vec<LineWarning>,
}

/// Append-only annotation log in a single text file.
#[derive(Debug, Clone)]
pub struct LogRecordStore {
    path: PathBuf,
    lock_path: PathBuf,
    options: LogOptions,
}

impl LogRecordStore {
    /// Open a log at `path`. The file is created lazily on first append.
    pub fn new(path: impl Into<PathBuf>, options: LogOptions) -> Self {
        let path = path.into();
        let lock_path = path.with_extension("lock");
        Self {
            path,
            lock_path,
            options,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the log with its header if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] on filesystem failure.
    pub fn init(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let _lock = AppendLock::acquire(&self.lock_path, self.options.lock_timeout)?;
        self.write_header_if_empty()
    }

    fn write_header_if_empty(&self) -> Result<(), StoreError> {
        let is_empty = !fs::metadata(&self.path).is_ok_and(|m| m.len() > 0);
        if is_empty {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            file.write_all(format!("{LOG_HEADER}\n{FIELD_COMMENT}\n").as_bytes())?;
            file.flush()?;
        }
        Ok(())
    }

    /// Read every parseable event, collecting warnings for the rest.
    ///
    /// A missing file reads as an empty log.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::VersionMismatch`] for a log written by a newer
    /// format version and [`StoreError::Io`] if the file cannot be read.
    pub fn read_log(&self) -> Result<LogRead, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(LogRead::default());
            }
            Err(err) => return Err(err.into()),
        };

        let mut out = LogRead::default();
        for (idx, line) in content.lines().enumerate() {
            let line_no = idx + 1;
            if line_no == 1 && line.starts_with(HEADER_PREFIX) {
                detect_version(line).map_err(StoreError::VersionMismatch)?;
                continue;
            }
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            match parse_log_line(line) {
                Ok(event) => out.events.push(event),
                Err(error) => {
                    warn!(path = %self.path.display(), line_no, %error, "skipping log line");
                    out.warnings.push(LineWarning { line_no, error });
                }
            }
        }

        debug!(
            events = out.events.len(),
            skipped = out.warnings.len(),
            "annotation log read"
        );
        Ok(out)
    }
}

impl RecordStore for LogRecordStore {
    fn read_all(&self) -> Result<Vec<AnnotationEvent>, StoreError> {
        Ok(self.read_log()?.events)
    }

    fn append(&self, event: &AnnotationEvent) -> Result<(), StoreError> {
        let mut line = to_log_line(event)?;
        line.push('\n');

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let _lock = AppendLock::acquire(&self.lock_path, self.options.lock_timeout)?;
        self.write_header_if_empty()?;

        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;

        if self.options.durable {
            file.sync_data()?;
        }
        Ok(())
    }
}
