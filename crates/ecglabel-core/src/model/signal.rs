use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::{fmt, str::FromStr};

/// Integer identifier of one ECG recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalId(i64);

impl SignalId {
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SignalId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(Self)
    }
}

impl From<i64> for SignalId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

/// Optional per-recording feature columns.
///
/// Datasets differ in which of these they carry; absent columns stay `None`.
/// Columns outside the known set are kept verbatim in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beat_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_bpm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdnn: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rmssd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approximate_entropy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snr_index: Option<f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl SignalMetadata {
    /// True when no feature column was present for the recording.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// One loaded ECG recording. Immutable after the catalog builds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: SignalId,
    pub samples: Vec<f64>,
    pub sampling_rate_hz: f64,
    pub reference_heart_rate: f64,
    #[serde(default, skip_serializing_if = "SignalMetadata::is_empty")]
    pub metadata: SignalMetadata,
}

impl Signal {
    /// Samples that are neither NaN nor infinite, in recording order.
    pub fn finite_samples(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied().filter(|v| v.is_finite())
    }

    /// Recording length in seconds, counting every stored sample.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_seconds(&self) -> f64 {
        if self.sampling_rate_hz > 0.0 {
            self.samples.len() as f64 / self.sampling_rate_hz
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(samples: Vec<f64>) -> Signal {
        Signal {
            id: SignalId::new(201),
            samples,
            sampling_rate_hz: 300.0,
            reference_heart_rate: 72.0,
            metadata: SignalMetadata::default(),
        }
    }

    #[test]
    fn signal_id_parses_with_whitespace() {
        let id: SignalId = " 201 ".parse().unwrap();
        assert_eq!(id, SignalId::new(201));
        assert_eq!(id.to_string(), "201");
    }

    #[test]
    fn finite_samples_skip_nan_and_infinity() {
        let s = signal(vec![1.0, f64::NAN, 2.0, f64::INFINITY, f64::NEG_INFINITY, 3.0]);
        let finite: Vec<f64> = s.finite_samples().collect();
        assert_eq!(finite, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn duration_uses_sampling_rate() {
        let s = signal(vec![0.0; 9000]);
        assert!((s.duration_seconds() - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_metadata_is_omitted_from_json() {
        let json = serde_json::to_value(signal(vec![0.5])).unwrap();
        assert!(json.get("metadata").is_none());
        assert_eq!(json["id"], 201);
    }
}
