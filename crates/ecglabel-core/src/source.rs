//! Signal sources: where raw dataset rows come from.
//!
//! The catalog only sees [`RawSignalRow`] values. A source is responsible
//! for locating the three required columns (identifier, amplitude list,
//! heart rate) and passing every other column through as a feature.

use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::catalog::{RawSignalRow, normalize_column};
use crate::error::ErrorCode;

/// Accepted header spellings for each required column, already normalized.
const ID_ALIASES: &[&str] = &["signalid", "id", "recordid"];
const AMPLITUDE_ALIASES: &[&str] = &["ecgsignal", "signal", "ecg", "samples", "amplitudes"];
const HEART_RATE_ALIASES: &[&str] = &["heartrate", "hr", "bpm"];

/// Errors raised while fetching rows from a source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read signal source {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV in {origin}: {source}")]
    Csv {
        origin: String,
        #[source]
        source: csv::Error,
    },

    #[error("signal source {origin} has no '{column}' column")]
    MissingColumn { origin: String, column: &'static str },
}

impl SourceError {
    /// Missing columns are a configuration problem; the rest are I/O.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::MissingColumn { .. } => ErrorCode::InvalidConfiguration,
            Self::Io { .. } | Self::Csv { .. } => ErrorCode::SourceReadFailed,
        }
    }
}

/// Anything that can hand over the full set of raw dataset rows.
pub trait SignalSource {
    /// Fetch every row currently available.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] when the source cannot be read at all or
    /// lacks a required column. Individual bad rows are not errors here.
    fn fetch_all(&self) -> Result<Vec<RawSignalRow>, SourceError>;
}

// ---------------------------------------------------------------------------
// CSV file source
// ---------------------------------------------------------------------------

/// Reads a header-bearing CSV export, one signal per record.
#[derive(Debug, Clone)]
pub struct CsvSignalSource {
    path: PathBuf,
}

impl CsvSignalSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SignalSource for CsvSignalSource {
    fn fetch_all(&self) -> Result<Vec<RawSignalRow>, SourceError> {
        let file = std::fs::File::open(&self.path).map_err(|source| SourceError::Io {
            path: self.path.clone(),
            source,
        })?;
        read_csv_rows(file, &self.path.display().to_string())
    }
}

/// Parse CSV from any reader into raw rows.
///
/// `origin` names the input in error messages.
///
/// # Errors
///
/// Returns [`SourceError::MissingColumn`] when a required column cannot be
/// found and [`SourceError::Csv`] on malformed CSV framing.
pub fn read_csv_rows<R: Read>(reader: R, origin: &str) -> Result<Vec<RawSignalRow>, SourceError> {
    let csv_err = |source: csv::Error| SourceError::Csv {
        origin: origin.to_string(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = reader.headers().map_err(csv_err)?.clone();
    let normalized: Vec<String> = headers.iter().map(normalize_column).collect();
    let find = |aliases: &[&str], column: &'static str| {
        normalized
            .iter()
            .position(|h| aliases.contains(&h.as_str()))
            .ok_or_else(|| SourceError::MissingColumn {
                origin: origin.to_string(),
                column,
            })
    };

    let id_col = find(ID_ALIASES, "signal_id")?;
    let amp_col = find(AMPLITUDE_ALIASES, "ecg_signal")?;
    let hr_col = find(HEART_RATE_ALIASES, "heart_rate")?;

    let mut rows = Vec::new();
    // Non-UTF-8 cells decode lossily and fail only their own row's parse.
    for record in reader.byte_records() {
        let record = record.map_err(csv_err)?;
        let cell = |idx: usize| {
            record
                .get(idx)
                .map(|raw| String::from_utf8_lossy(raw).into_owned())
                .unwrap_or_default()
        };

        let mut row = RawSignalRow::new(cell(id_col), cell(amp_col), cell(hr_col));
        for (idx, header) in headers.iter().enumerate() {
            if idx == id_col || idx == amp_col || idx == hr_col {
                continue;
            }
            row.features.insert(header.to_string(), cell(idx));
        }
        rows.push(row);
    }

    debug!(origin, rows = rows.len(), "read signal rows");
    Ok(rows)
}

// ---------------------------------------------------------------------------
// In-memory source
// ---------------------------------------------------------------------------

/// Fixed rows held in memory; used by tests and embedders.
#[derive(Debug, Clone, Default)]
pub struct MemorySignalSource {
    rows: Vec<RawSignalRow>,
}

impl MemorySignalSource {
    #[must_use]
    pub const fn new(rows: Vec<RawSignalRow>) -> Self {
        Self { rows }
    }
}

impl SignalSource for MemorySignalSource {
    fn fetch_all(&self) -> Result<Vec<RawSignalRow>, SourceError> {
        Ok(self.rows.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_required_and_feature_columns() {
        let csv = "SignalID,ECGSignal,HeartRate,SDNN\n\
                   201,\"0,1,2\",72,40.5\n\
                   202,\"3,4\",80,\n";
        let rows = read_csv_rows(csv.as_bytes(), "inline").unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].identifier, "201");
        assert_eq!(rows[0].amplitudes, "0,1,2");
        assert_eq!(rows[0].heart_rate, "72");
        assert_eq!(rows[0].features.get("SDNN").map(String::as_str), Some("40.5"));
        assert_eq!(rows[1].features.get("SDNN").map(String::as_str), Some(""));
    }

    #[test]
    fn non_utf8_cell_does_not_abort_the_read() {
        let csv = b"id,signal,hr\n201,\"0,1\",60\n202,\"0,\xff\",60\n203,\"2,3\",60\n";
        let rows = read_csv_rows(&csv[..], "inline").unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].identifier, "202");
        assert!(rows[1].amplitudes.contains('\u{FFFD}'));
        assert_eq!(rows[2].amplitudes, "2,3");
    }

    #[test]
    fn snake_case_headers_are_accepted() {
        let csv = "signal_id,heart_rate,ecg_signal\n7,65,\"1,2\"\n";
        let rows = read_csv_rows(csv.as_bytes(), "inline").unwrap();
        assert_eq!(rows[0].identifier, "7");
        assert_eq!(rows[0].amplitudes, "1,2");
        assert_eq!(rows[0].heart_rate, "65");
        assert!(rows[0].features.is_empty());
    }

    #[test]
    fn missing_required_column_is_configuration_error() {
        let csv = "signal_id,ecg_signal\n1,\"0\"\n";
        let err = read_csv_rows(csv.as_bytes(), "inline").unwrap_err();
        assert!(matches!(
            err,
            SourceError::MissingColumn {
                column: "heart_rate",
                ..
            }
        ));
        assert_eq!(err.code(), ErrorCode::InvalidConfiguration);
    }

    #[test]
    fn short_records_yield_empty_cells() {
        let csv = "signal_id,ecg_signal,heart_rate\n9\n";
        let rows = read_csv_rows(csv.as_bytes(), "inline").unwrap();
        assert_eq!(rows[0].identifier, "9");
        assert_eq!(rows[0].amplitudes, "");
        assert_eq!(rows[0].heart_rate, "");
    }

    #[test]
    fn missing_file_is_io_error() {
        let source = CsvSignalSource::new("/definitely/not/here.csv");
        let err = source.fetch_all().unwrap_err();
        assert!(matches!(err, SourceError::Io { .. }));
        assert_eq!(err.code(), ErrorCode::SourceReadFailed);
    }
}
