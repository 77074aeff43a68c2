//! Signal catalog: normalizes raw dataset rows into an ordered index.
//!
//! Rows arrive as loosely typed strings (spreadsheet cells, CSV fields). Each
//! row is parsed independently; a malformed row is skipped and reported as a
//! [`RowWarning`] instead of failing the whole load.
//!
//! # Ordering and duplicates
//!
//! Iteration follows the first-seen order of valid rows. When the same
//! signal ID appears again, the later row's values replace the earlier ones
//! but the entry keeps its original position (last write wins).

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use crate::error::EngineError;
use crate::model::{Signal, SignalId, SignalMetadata};

/// Sentinel token some exports write for a missing sample.
const MISSING_SAMPLE: &str = "-";

/// Dataset-wide parsing options.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogOptions {
    /// Sampling rate applied to every signal in the dataset.
    pub sampling_rate_hz: f64,
    /// Separator between samples inside the amplitude field.
    pub delimiter: char,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            sampling_rate_hz: 300.0,
            delimiter: ',',
        }
    }
}

/// One unparsed dataset row as produced by a signal source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSignalRow {
    pub identifier: String,
    pub amplitudes: String,
    pub heart_rate: String,
    /// Every other column, keyed by its header.
    pub features: BTreeMap<String, String>,
}

impl RawSignalRow {
    pub fn new(
        identifier: impl Into<String>,
        amplitudes: impl Into<String>,
        heart_rate: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            amplitudes: amplitudes.into(),
            heart_rate: heart_rate.into(),
            features: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_feature(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.features.insert(column.into(), value.into());
        self
    }
}

/// Errors for a single dataset row.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid signal identifier: '{0}'")]
    InvalidIdentifier(String),

    #[error("invalid amplitude token '{token}' at position {position}")]
    InvalidAmplitude { token: String, position: usize },

    #[error("invalid heart rate: '{0}'")]
    InvalidHeartRate(String),

    #[error("invalid value '{value}' for feature column '{column}'")]
    InvalidFeature { column: String, value: String },
}

/// A recorded problem with one input row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowWarning {
    /// Zero-based position of the row in the source.
    pub row_index: usize,
    /// Raw identifier cell, for display.
    pub identifier: String,
    pub error: ParseError,
    /// False when the row was still loaded (e.g. a bad optional feature).
    pub skipped: bool,
}

/// Result of [`SignalCatalog::load`].
#[derive(Debug, Clone)]
pub struct CatalogLoad {
    pub catalog: SignalCatalog,
    pub warnings: Vec<RowWarning>,
}

impl CatalogLoad {
    /// Number of rows dropped from the catalog.
    #[must_use]
    pub fn skipped_rows(&self) -> usize {
        self.warnings.iter().filter(|w| w.skipped).count()
    }
}

/// Ordered, immutable index of loaded signals.
#[derive(Debug, Clone, Default)]
pub struct SignalCatalog {
    signals: Vec<Signal>,
    index: HashMap<SignalId, usize>,
}

impl SignalCatalog {
    /// Parse raw rows into a catalog, collecting per-row warnings.
    pub fn load<I>(rows: I, options: &CatalogOptions) -> CatalogLoad
    where
        I: IntoIterator<Item = RawSignalRow>,
    {
        let mut catalog = Self::default();
        let mut warnings = Vec::new();

        for (row_index, row) in rows.into_iter().enumerate() {
            match parse_row(&row, options) {
                Ok((signal, feature_errors)) => {
                    for error in feature_errors {
                        warn!(row = row_index, id = %signal.id, %error, "ignoring feature value");
                        warnings.push(RowWarning {
                            row_index,
                            identifier: row.identifier.clone(),
                            error,
                            skipped: false,
                        });
                    }
                    catalog.insert(signal);
                }
                Err(error) => {
                    warn!(row = row_index, identifier = %row.identifier, %error, "skipping signal row");
                    warnings.push(RowWarning {
                        row_index,
                        identifier: row.identifier.clone(),
                        error,
                        skipped: true,
                    });
                }
            }
        }

        debug!(
            signals = catalog.len(),
            warnings = warnings.len(),
            "signal catalog loaded"
        );
        CatalogLoad { catalog, warnings }
    }

    fn insert(&mut self, signal: Signal) {
        if let Some(&pos) = self.index.get(&signal.id) {
            debug!(id = %signal.id, "duplicate signal id, keeping the later row");
            self.signals[pos] = signal;
        } else {
            self.index.insert(signal.id, self.signals.len());
            self.signals.push(signal);
        }
    }

    /// Look up a signal by ID.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] when the ID is not in the catalog.
    pub fn get(&self, id: SignalId) -> Result<&Signal, EngineError> {
        self.index
            .get(&id)
            .map(|&pos| &self.signals[pos])
            .ok_or(EngineError::NotFound(id))
    }

    #[must_use]
    pub fn contains(&self, id: SignalId) -> bool {
        self.index.contains_key(&id)
    }

    /// Zero-based catalog position of a signal.
    #[must_use]
    pub fn position(&self, id: SignalId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// Signal IDs in catalog order.
    #[must_use]
    pub fn ids(&self) -> Vec<SignalId> {
        self.signals.iter().map(|s| s.id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Signal> {
        self.signals.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.signals.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Row parsing
// ---------------------------------------------------------------------------

fn parse_row(
    row: &RawSignalRow,
    options: &CatalogOptions,
) -> Result<(Signal, Vec<ParseError>), ParseError> {
    let id = parse_identifier(&row.identifier)?;
    let heart_rate = parse_heart_rate(&row.heart_rate)?;
    let samples = parse_amplitudes(&row.amplitudes, options.delimiter)?;
    let (metadata, feature_errors) = parse_metadata(&row.features);

    Ok((
        Signal {
            id,
            samples,
            sampling_rate_hz: options.sampling_rate_hz,
            reference_heart_rate: heart_rate,
            metadata,
        },
        feature_errors,
    ))
}

/// Parse a signal identifier cell.
///
/// Spreadsheet exports often write integers as `201.0`; integral floats are
/// accepted for that reason.
///
/// # Errors
///
/// Returns [`ParseError::InvalidIdentifier`] for anything that is not an
/// integer or an integral float in `i64` range.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn parse_identifier(raw: &str) -> Result<SignalId, ParseError> {
    let trimmed = raw.trim();
    if let Ok(id) = trimmed.parse::<i64>() {
        return Ok(SignalId::new(id));
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 => {
            Ok(SignalId::new(v as i64))
        }
        _ => Err(ParseError::InvalidIdentifier(raw.to_string())),
    }
}

/// Split a delimited amplitude field into samples.
///
/// Tokens are trimmed; empty tokens and the `-` sentinel are discarded.
/// `NaN`/`inf` tokens parse successfully and are left for the renderer to
/// drop.
///
/// # Errors
///
/// Returns [`ParseError::InvalidAmplitude`] for the first token that is not
/// a number.
pub fn parse_amplitudes(raw: &str, delimiter: char) -> Result<Vec<f64>, ParseError> {
    raw.split(delimiter)
        .map(str::trim)
        .enumerate()
        .filter(|(_, token)| !token.is_empty() && *token != MISSING_SAMPLE)
        .map(|(position, token)| {
            token
                .parse::<f64>()
                .map_err(|_| ParseError::InvalidAmplitude {
                    token: token.to_string(),
                    position,
                })
        })
        .collect()
}

fn parse_heart_rate(raw: &str) -> Result<f64, ParseError> {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ParseError::InvalidHeartRate(raw.to_string())),
    }
}

/// Known feature columns after [`normalize_column`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Feature {
    Date,
    BeatCount,
    MeanBpm,
    Sdnn,
    Rmssd,
    ApproximateEntropy,
    SnrIndex,
}

fn feature_for(normalized: &str) -> Option<Feature> {
    match normalized {
        "date" | "recordingdate" => Some(Feature::Date),
        "beatcount" | "beats" | "numbeats" | "nbeats" => Some(Feature::BeatCount),
        "meanbpm" | "meanhr" | "meanheartrate" => Some(Feature::MeanBpm),
        "sdnn" => Some(Feature::Sdnn),
        "rmssd" => Some(Feature::Rmssd),
        "apen" | "approximateentropy" | "approxentropy" => Some(Feature::ApproximateEntropy),
        "snr" | "snrindex" => Some(Feature::SnrIndex),
        _ => None,
    }
}

/// Lowercase a header and strip everything but ASCII letters and digits.
///
/// `"Mean BPM"`, `"mean_bpm"` and `"MeanBPM"` all normalize to `meanbpm`.
#[must_use]
pub fn normalize_column(header: &str) -> String {
    header
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_metadata(features: &BTreeMap<String, String>) -> (SignalMetadata, Vec<ParseError>) {
    let mut metadata = SignalMetadata::default();
    let mut errors = Vec::new();

    for (column, value) in features {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        let Some(feature) = feature_for(&normalize_column(column)) else {
            metadata.extra.insert(column.clone(), value.to_string());
            continue;
        };

        let invalid = || ParseError::InvalidFeature {
            column: column.clone(),
            value: value.to_string(),
        };

        match feature {
            Feature::Date => metadata.date = Some(value.to_string()),
            Feature::BeatCount => match value.parse::<f64>() {
                Ok(v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= f64::from(u32::MAX) => {
                    metadata.beat_count = Some(v as u32);
                }
                _ => errors.push(invalid()),
            },
            numeric => match value.parse::<f64>() {
                Ok(v) if v.is_finite() => {
                    let slot = match numeric {
                        Feature::MeanBpm => &mut metadata.mean_bpm,
                        Feature::Sdnn => &mut metadata.sdnn,
                        Feature::Rmssd => &mut metadata.rmssd,
                        Feature::ApproximateEntropy => &mut metadata.approximate_entropy,
                        _ => &mut metadata.snr_index,
                    };
                    *slot = Some(v);
                }
                _ => errors.push(invalid()),
            },
        }
    }

    (metadata, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(rows: Vec<RawSignalRow>) -> CatalogLoad {
        SignalCatalog::load(rows, &CatalogOptions::default())
    }

    #[test]
    fn amplitudes_skip_empty_and_sentinel_tokens() {
        let samples = parse_amplitudes(" 1.5, -, ,-2,3e2,", ',').unwrap();
        assert_eq!(samples, vec![1.5, -2.0, 300.0]);
    }

    #[test]
    fn amplitude_error_reports_token() {
        let err = parse_amplitudes("1,abc,3", ',').unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidAmplitude {
                token: "abc".to_string(),
                position: 1
            }
        );
    }

    #[test]
    fn identifier_accepts_integral_floats() {
        assert_eq!(parse_identifier("201").unwrap(), SignalId::new(201));
        assert_eq!(parse_identifier(" 201.0 ").unwrap(), SignalId::new(201));
        assert!(parse_identifier("201.5").is_err());
        assert!(parse_identifier("abc").is_err());
        assert!(parse_identifier("").is_err());
    }

    #[test]
    fn malformed_rows_are_skipped_with_warnings() {
        let out = load(vec![
            RawSignalRow::new("1", "0,1,2", "72"),
            RawSignalRow::new("x", "0,1,2", "72"),
            RawSignalRow::new("3", "0,oops", "72"),
            RawSignalRow::new("4", "0", "fast"),
            RawSignalRow::new("5", "5,6", "60"),
        ]);

        assert_eq!(out.catalog.ids(), vec![SignalId::new(1), SignalId::new(5)]);
        assert_eq!(out.skipped_rows(), 3);
        let rows: Vec<usize> = out.warnings.iter().map(|w| w.row_index).collect();
        assert_eq!(rows, vec![1, 2, 3]);
    }

    #[test]
    fn duplicate_id_keeps_position_and_last_values() {
        let out = load(vec![
            RawSignalRow::new("10", "1,1", "70"),
            RawSignalRow::new("20", "2,2", "80"),
            RawSignalRow::new("10", "9,9,9", "90"),
        ]);
        let catalog = out.catalog;

        assert_eq!(catalog.ids(), vec![SignalId::new(10), SignalId::new(20)]);
        let ten = catalog.get(SignalId::new(10)).unwrap();
        assert_eq!(ten.samples, vec![9.0, 9.0, 9.0]);
        assert!((ten.reference_heart_rate - 90.0).abs() < f64::EPSILON);
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn empty_amplitude_field_is_still_a_signal() {
        let out = load(vec![RawSignalRow::new("7", " , - ,", "65")]);
        let signal = out.catalog.get(SignalId::new(7)).unwrap();
        assert!(signal.samples.is_empty());
    }

    #[test]
    fn missing_id_is_not_found() {
        let out = load(vec![RawSignalRow::new("1", "0", "72")]);
        let err = out.catalog.get(SignalId::new(99)).unwrap_err();
        assert!(matches!(err, EngineError::NotFound(id) if id == SignalId::new(99)));
    }

    #[test]
    fn feature_columns_are_recognized_by_alias() {
        let row = RawSignalRow::new("1", "0", "72")
            .with_feature("Date", "2024-05-01")
            .with_feature("Beat Count", "35")
            .with_feature("mean_bpm", "71.5")
            .with_feature("SDNN", "41.2")
            .with_feature("RMSSD", "30")
            .with_feature("ApEn", "0.8")
            .with_feature("SNR Index", "12.5")
            .with_feature("Site", "north")
            .with_feature("Empty", "  ");
        let out = load(vec![row]);
        let meta = &out.catalog.get(SignalId::new(1)).unwrap().metadata;

        assert_eq!(meta.date.as_deref(), Some("2024-05-01"));
        assert_eq!(meta.beat_count, Some(35));
        assert_eq!(meta.mean_bpm, Some(71.5));
        assert_eq!(meta.sdnn, Some(41.2));
        assert_eq!(meta.rmssd, Some(30.0));
        assert_eq!(meta.approximate_entropy, Some(0.8));
        assert_eq!(meta.snr_index, Some(12.5));
        assert_eq!(meta.extra.get("Site").map(String::as_str), Some("north"));
        assert!(!meta.extra.contains_key("Empty"));
    }

    #[test]
    fn bad_feature_value_warns_without_skipping() {
        let row = RawSignalRow::new("1", "0", "72").with_feature("SDNN", "n/a");
        let out = load(vec![row]);

        assert_eq!(out.catalog.len(), 1);
        assert_eq!(out.skipped_rows(), 0);
        assert_eq!(out.warnings.len(), 1);
        assert!(!out.warnings[0].skipped);
    }

    #[test]
    fn sampling_rate_comes_from_options() {
        let options = CatalogOptions {
            sampling_rate_hz: 500.0,
            delimiter: ';',
        };
        let out = SignalCatalog::load(vec![RawSignalRow::new("1", "1;2;3", "72")], &options);
        let signal = out.catalog.get(SignalId::new(1)).unwrap();
        assert_eq!(signal.samples, vec![1.0, 2.0, 3.0]);
        assert!((signal.sampling_rate_hz - 500.0).abs() < f64::EPSILON);
    }
}
