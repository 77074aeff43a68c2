use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Millimetres per inch.
pub const MM_PER_INCH: f64 = 25.4;

/// Fine grid pitch on ECG paper.
pub const FINE_GRID_MM: f64 = 1.0;

/// Every fifth fine line is bold.
pub const BOLD_GRID_EVERY: usize = 5;

/// Upper bound on either image side, to catch absurd layouts early.
pub const MAX_SIDE_PX: f64 = 32_768.0;

/// Paper scale and page geometry for one rendered strip.
///
/// Defaults are the clinical convention: three 10 s rows at 25 mm/s and
/// 10 mm/mV, a fixed ±1.5 mV window, microvolt input, 300 dpi.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StripLayout {
    pub seconds_per_row: f64,
    pub total_seconds: f64,
    pub mm_per_second: f64,
    pub mm_per_millivolt: f64,
    /// Half-height of the amplitude window, in millivolts.
    pub amplitude_window_mv: f64,
    /// Input units per millivolt (1000 for microvolt samples).
    pub samples_per_millivolt: f64,
    pub dpi: f64,
    pub row_gap_mm: f64,
}

impl Default for StripLayout {
    fn default() -> Self {
        Self {
            seconds_per_row: 10.0,
            total_seconds: 30.0,
            mm_per_second: 25.0,
            mm_per_millivolt: 10.0,
            amplitude_window_mv: 1.5,
            samples_per_millivolt: 1000.0,
            dpi: 300.0,
            row_gap_mm: 5.0,
        }
    }
}

impl StripLayout {
    /// Canonical layout with the four paper-scale parameters overridden.
    #[must_use]
    pub fn clinical(
        seconds_per_row: f64,
        total_seconds: f64,
        mm_per_second: f64,
        mm_per_millivolt: f64,
    ) -> Self {
        Self {
            seconds_per_row,
            total_seconds,
            mm_per_second,
            mm_per_millivolt,
            ..Self::default()
        }
    }

    /// Check every scale value and the resulting image size.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Configuration`] for non-finite or non-positive
    /// scale values, a negative row gap, or an image side above
    /// [`MAX_SIDE_PX`].
    pub fn validate(&self) -> Result<(), EngineError> {
        let positive = [
            ("seconds_per_row", self.seconds_per_row),
            ("total_seconds", self.total_seconds),
            ("mm_per_second", self.mm_per_second),
            ("mm_per_millivolt", self.mm_per_millivolt),
            ("amplitude_window_mv", self.amplitude_window_mv),
            ("samples_per_millivolt", self.samples_per_millivolt),
            ("dpi", self.dpi),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(EngineError::config(format!(
                    "render.{name} must be a positive number, got {value}"
                )));
            }
        }
        if !self.row_gap_mm.is_finite() || self.row_gap_mm < 0.0 {
            return Err(EngineError::config(format!(
                "render.row_gap_mm must be zero or positive, got {}",
                self.row_gap_mm
            )));
        }

        let width = self.row_width_mm() * self.px_per_mm();
        let height = self.page_height_mm() * self.px_per_mm();
        if width > MAX_SIDE_PX || height > MAX_SIDE_PX {
            return Err(EngineError::config(format!(
                "strip would be {width:.0}x{height:.0} px, limit is {MAX_SIDE_PX:.0} px per side"
            )));
        }
        Ok(())
    }

    /// `ceil(total_seconds / seconds_per_row)`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn row_count(&self) -> usize {
        (self.total_seconds / self.seconds_per_row).ceil().max(1.0) as usize
    }

    #[must_use]
    pub fn row_width_mm(&self) -> f64 {
        self.seconds_per_row * self.mm_per_second
    }

    #[must_use]
    pub fn row_height_mm(&self) -> f64 {
        2.0 * self.amplitude_window_mv * self.mm_per_millivolt
    }

    #[must_use]
    pub fn px_per_mm(&self) -> f64 {
        self.dpi / MM_PER_INCH
    }

    /// Horizontal paper covered by all rows laid end to end.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn trace_length_mm(&self) -> f64 {
        self.row_count() as f64 * self.row_width_mm()
    }

    /// Rows plus the gaps between them.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn page_height_mm(&self) -> f64 {
        let rows = self.row_count() as f64;
        rows * self.row_height_mm() + (rows - 1.0) * self.row_gap_mm
    }

    /// Top edge of row `row`, in mm from the top of the page.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn row_top_mm(&self, row: usize) -> f64 {
        row as f64 * (self.row_height_mm() + self.row_gap_mm)
    }

    /// Samples kept from a signal: `floor(total_seconds * rate)`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn sample_limit(&self, sampling_rate_hz: f64) -> usize {
        (self.total_seconds * sampling_rate_hz).floor().max(0.0) as usize
    }

    /// Half-open sample index range drawn on `row`.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn row_samples(&self, row: usize, sampling_rate_hz: f64) -> std::ops::Range<usize> {
        let per_row = self.seconds_per_row * sampling_rate_hz;
        let start = (row as f64 * per_row).floor() as usize;
        let end = ((row + 1) as f64 * per_row).floor() as usize;
        start..end
    }

    /// Millivolt value of one input sample, clamped to the window.
    #[must_use]
    pub fn clamp_mv(&self, sample: f64) -> f64 {
        (sample / self.samples_per_millivolt)
            .clamp(-self.amplitude_window_mv, self.amplitude_window_mv)
    }
}
