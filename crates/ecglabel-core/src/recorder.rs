//! Validating writer in front of the record store.
//!
//! The recorder is the only place events are created. It stamps each event
//! from its [`Clock`], checks it against the catalog and the configuration,
//! and appends it once. It never updates or deletes.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::catalog::SignalCatalog;
use crate::error::EngineError;
use crate::model::{AnnotationEvent, Label, LabelSet, RaterId, SignalId};
use crate::store::RecordStore;

/// Default upper bound on comment length, in characters.
pub const DEFAULT_MAX_COMMENT_CHARS: usize = 2_000;

/// Source of event timestamps.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Checks and appends annotation events.
#[derive(Debug, Clone)]
pub struct AnnotationRecorder<C = SystemClock> {
    raters: Vec<RaterId>,
    labels: LabelSet,
    max_comment_chars: usize,
    clock: C,
}

impl AnnotationRecorder<SystemClock> {
    /// Recorder accepting `raters` (classifiers and reviewers alike) and `labels`.
    #[must_use]
    pub fn new(raters: Vec<RaterId>, labels: LabelSet) -> Self {
        Self::with_clock(raters, labels, SystemClock)
    }
}

impl<C: Clock> AnnotationRecorder<C> {
    pub fn with_clock(raters: Vec<RaterId>, labels: LabelSet, clock: C) -> Self {
        Self {
            raters,
            labels,
            max_comment_chars: DEFAULT_MAX_COMMENT_CHARS,
            clock,
        }
    }

    #[must_use]
    pub fn max_comment_chars(mut self, max: usize) -> Self {
        self.max_comment_chars = max;
        self
    }

    #[must_use]
    pub const fn labels(&self) -> &LabelSet {
        &self.labels
    }

    #[must_use]
    pub fn knows_rater(&self, rater: &RaterId) -> bool {
        self.raters.contains(rater)
    }

    /// Trim a comment and map blank input to `None`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidComment`] for comments containing a tab
    /// or line break, or longer than the configured limit.
    pub fn normalize_comment(&self, comment: Option<&str>) -> Result<Option<String>, EngineError> {
        let Some(trimmed) = comment.map(str::trim).filter(|c| !c.is_empty()) else {
            return Ok(None);
        };
        if trimmed.contains(['\t', '\n', '\r']) {
            return Err(EngineError::InvalidComment(
                "comment must be a single line without tabs".to_string(),
            ));
        }
        let chars = trimmed.chars().count();
        if chars > self.max_comment_chars {
            return Err(EngineError::InvalidComment(format!(
                "comment is {chars} characters, limit is {}",
                self.max_comment_chars
            )));
        }
        Ok(Some(trimmed.to_string()))
    }

    /// Validate and append exactly one event.
    ///
    /// Checks run in order: the signal exists, the rater is known, the label
    /// is in the set, the comment is acceptable. Nothing is written unless
    /// all of them pass.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`], [`EngineError::InvalidRater`],
    /// [`EngineError::InvalidLabel`] or [`EngineError::InvalidComment`] on
    /// validation failure, and [`EngineError::Store`] if the append fails.
    pub fn record<S: RecordStore + ?Sized>(
        &self,
        catalog: &SignalCatalog,
        signal_id: SignalId,
        rater: &RaterId,
        label: Label,
        comment: Option<&str>,
        store: &S,
    ) -> Result<AnnotationEvent, EngineError> {
        catalog.get(signal_id)?;
        if !self.knows_rater(rater) {
            return Err(EngineError::InvalidRater(rater.to_string()));
        }
        if !self.labels.contains(&label) {
            return Err(self.labels.rejection(label.as_str()));
        }
        let comment = self.normalize_comment(comment)?;

        let event = AnnotationEvent {
            signal_id,
            rater_id: rater.clone(),
            label,
            timestamp: self.clock.now(),
            comment,
        };
        store.append(&event)?;

        info!(
            signal_id = %event.signal_id,
            rater = %event.rater_id,
            label = %event.label,
            "recorded annotation"
        );
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogOptions, RawSignalRow};
    use crate::error::ErrorCode;
    use crate::store::MemoryRecordStore;

    fn catalog() -> SignalCatalog {
        SignalCatalog::load(
            vec![RawSignalRow::new("201", "0,1,2", "72")],
            &CatalogOptions::default(),
        )
        .catalog
    }

    fn recorder() -> AnnotationRecorder<FixedClock> {
        AnnotationRecorder::with_clock(
            vec![RaterId::new("user1").unwrap()],
            LabelSet::standard(),
            FixedClock("2025-06-01T12:00:00Z".parse().unwrap()),
        )
    }

    fn user1() -> RaterId {
        RaterId::new("user1").unwrap()
    }

    #[test]
    fn records_one_event_with_clock_timestamp() {
        let store = MemoryRecordStore::new();
        let event = recorder()
            .record(&catalog(), SignalId::new(201), &user1(), Label::Normal, Some("  ok "), &store)
            .unwrap();

        assert_eq!(event.comment.as_deref(), Some("ok"));
        assert_eq!(event.timestamp.to_rfc3339(), "2025-06-01T12:00:00+00:00");
        assert_eq!(store.read_all().unwrap(), vec![event]);
    }

    #[test]
    fn blank_comment_is_stored_as_absent() {
        let store = MemoryRecordStore::new();
        let event = recorder()
            .record(&catalog(), SignalId::new(201), &user1(), Label::Noisy, Some("   "), &store)
            .unwrap();
        assert_eq!(event.comment, None);
    }

    #[test]
    fn unknown_signal_is_rejected_before_anything_else() {
        let store = MemoryRecordStore::new();
        let stranger = RaterId::new("nobody").unwrap();
        let err = recorder()
            .record(&catalog(), SignalId::new(999), &stranger, Label::Normal, None, &store)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::SignalNotFound);
        assert_eq!(store.len().unwrap(), 0);
    }

    #[test]
    fn unknown_rater_and_label_are_rejected() {
        let store = MemoryRecordStore::new();
        let rec = recorder();
        let err = rec
            .record(
                &catalog(),
                SignalId::new(201),
                &RaterId::new("nobody").unwrap(),
                Label::Normal,
                None,
                &store,
            )
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidRater);

        let err = rec
            .record(
                &catalog(),
                SignalId::new(201),
                &user1(),
                Label::Custom("Flutter".to_string()),
                None,
                &store,
            )
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidLabel);
        assert!(err.to_string().contains("Fibrillation, Normal, Noisy, Other"));
        assert_eq!(store.len().unwrap(), 0);
    }

    #[test]
    fn multiline_or_oversized_comments_are_rejected() {
        let store = MemoryRecordStore::new();
        let rec = recorder().max_comment_chars(5);
        for bad in ["two\nlines", "tab\there", "way too long"] {
            let err = rec
                .record(&catalog(), SignalId::new(201), &user1(), Label::Other, Some(bad), &store)
                .unwrap_err();
            assert_eq!(err.code(), ErrorCode::InvalidComment, "{bad:?}");
        }
        assert_eq!(store.len().unwrap(), 0);
    }
}
