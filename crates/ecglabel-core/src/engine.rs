//! Role-aware façade over one loaded dataset and one record store.
//!
//! Every query re-reads the store, so the answers always reflect the latest
//! snapshot. The catalog, the assignment and the renderer are fixed for the
//! lifetime of a [`Workspace`].

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogLoad, SignalCatalog};
use crate::config::ResolvedConfig;
use crate::conflict::{
    self, AgreementSummary, ConflictRecord, Quorum, ReviewProgress, review_progress,
    review_queue,
};
use crate::error::EngineError;
use crate::ledger::{RepeatedVote, VoteLedger};
use crate::model::{AnnotationEvent, Label, RaterId, RaterRole, Signal, SignalId};
use crate::partition::{Assignment, assign};
use crate::progress::{self, Progress};
use crate::recorder::{AnnotationRecorder, Clock, SystemClock};
use crate::render::{RenderOutcome, StripRenderer};
use crate::session::AnnotationSession;
use crate::source::SignalSource;
use crate::store::RecordStore;

/// Where a rater stands in their queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Status {
    Classifier(Progress),
    Reviewer {
        rater: RaterId,
        #[serde(flatten)]
        progress: ReviewProgress,
    },
}

/// Fetch every row from `source` and build a catalog.
///
/// # Errors
///
/// Returns [`EngineError::Source`] when the source cannot be read at all.
pub fn load_catalog<S: SignalSource + ?Sized>(
    source: &S,
    config: &ResolvedConfig,
) -> Result<CatalogLoad, EngineError> {
    let rows = source.fetch_all()?;
    let load = SignalCatalog::load(rows, &config.catalog);
    info!(
        signals = load.catalog.len(),
        skipped = load.skipped_rows(),
        "loaded signal catalog"
    );
    Ok(load)
}

/// A dataset, its assignment and a record store, bound together.
pub struct Workspace<S, C = SystemClock> {
    config: ResolvedConfig,
    catalog: SignalCatalog,
    assignment: Assignment,
    recorder: AnnotationRecorder<C>,
    renderer: StripRenderer,
    store: S,
}

impl<S: RecordStore> Workspace<S, SystemClock> {
    /// # Errors
    ///
    /// Returns [`EngineError::Configuration`] if the roster does not fit the
    /// partition scheme or the render layout is invalid.
    pub fn open(
        config: ResolvedConfig,
        catalog: SignalCatalog,
        store: S,
    ) -> Result<Self, EngineError> {
        Self::with_clock(config, catalog, store, SystemClock)
    }
}

impl<S: RecordStore, C: Clock> Workspace<S, C> {
    /// Like [`Workspace::open`] with an explicit timestamp source.
    ///
    /// # Errors
    ///
    /// See [`Workspace::open`].
    pub fn with_clock(
        config: ResolvedConfig,
        catalog: SignalCatalog,
        store: S,
        clock: C,
    ) -> Result<Self, EngineError> {
        let assignment = assign(&catalog.ids(), &config.classifiers, config.scheme)?;
        let renderer = StripRenderer::new(config.layout)?;
        let recorder =
            AnnotationRecorder::with_clock(config.all_raters(), config.labels.clone(), clock)
                .max_comment_chars(config.max_comment_chars);

        debug!(
            signals = catalog.len(),
            classifiers = config.classifiers.len(),
            reviewers = config.reviewers.len(),
            scheme = %config.scheme,
            "workspace opened"
        );
        Ok(Self {
            config,
            catalog,
            assignment,
            recorder,
            renderer,
            store,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    #[must_use]
    pub const fn catalog(&self) -> &SignalCatalog {
        &self.catalog
    }

    #[must_use]
    pub const fn assignment(&self) -> &Assignment {
        &self.assignment
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The configured quorum, narrowed per signal to the raters assigned it.
    #[must_use]
    pub fn quorum(&self) -> Quorum<'_> {
        Quorum::assigned(&self.config.quorum, &self.assignment)
    }

    /// # Errors
    ///
    /// Returns [`EngineError::InvalidRater`] for a rater outside the config.
    pub fn role(&self, rater: &RaterId) -> Result<RaterRole, EngineError> {
        self.config
            .role_of(rater)
            .ok_or_else(|| EngineError::InvalidRater(rater.to_string()))
    }

    /// Current log contents. Events for signals the catalog does not know
    /// are kept but logged.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] when the store cannot be read.
    pub fn snapshot(&self) -> Result<Vec<AnnotationEvent>, EngineError> {
        let log = self.store.read_all()?;
        let orphans = log
            .iter()
            .filter(|e| !self.catalog.contains(e.signal_id))
            .count();
        if orphans > 0 {
            warn!(orphans, "annotation log references signals outside the catalog");
        }
        Ok(log)
    }

    /// # Errors
    ///
    /// Returns [`EngineError::Configuration`] for an empty quorum and
    /// [`EngineError::Store`] when the store cannot be read.
    pub fn conflicts(&self) -> Result<Vec<ConflictRecord>, EngineError> {
        let log = self.snapshot()?;
        conflict::conflicts(&log, self.quorum(), self.config.vote_policy)
    }

    /// # Errors
    ///
    /// See [`Workspace::conflicts`].
    pub fn agreement(&self) -> Result<AgreementSummary, EngineError> {
        let log = self.snapshot()?;
        conflict::agreement(&log, self.quorum(), self.config.vote_policy)
    }

    /// Pairs the log holds several events for, resolved by the vote policy.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] when the store cannot be read.
    pub fn repeated_votes(&self) -> Result<Vec<RepeatedVote>, EngineError> {
        let log = self.snapshot()?;
        let repeated: Vec<RepeatedVote> = VoteLedger::build(&log, self.config.vote_policy)
            .repeated_votes()
            .collect();
        if !repeated.is_empty() {
            debug!(
                pairs = repeated.len(),
                policy = %self.config.vote_policy,
                "raters annotated some signals more than once"
            );
        }
        Ok(repeated)
    }

    /// Signals still waiting for `rater`, in the order they will be offered.
    ///
    /// Classifiers get their unclassified assigned signals; reviewers get
    /// the conflicts they have not reviewed.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidRater`] for an unknown rater and
    /// [`EngineError::Store`] when the store cannot be read.
    pub fn queue(&self, rater: &RaterId) -> Result<Vec<SignalId>, EngineError> {
        let role = self.role(rater)?;
        let log = self.snapshot()?;
        match role {
            RaterRole::Classifier => Ok(progress::remaining(rater, &self.assignment, &log)),
            RaterRole::Reviewer => {
                let found =
                    conflict::conflicts(&log, self.quorum(), self.config.vote_policy)?;
                Ok(review_queue(&log, &found, rater))
            }
        }
    }

    /// The next signal to show `rater`, or `None` when their queue is empty.
    ///
    /// # Errors
    ///
    /// See [`Workspace::queue`].
    pub fn next(&self, rater: &RaterId) -> Result<Option<&Signal>, EngineError> {
        let queue = self.queue(rater)?;
        queue
            .first()
            .map(|id| self.catalog.get(*id))
            .transpose()
    }

    /// # Errors
    ///
    /// See [`Workspace::queue`].
    pub fn status(&self, rater: &RaterId) -> Result<Status, EngineError> {
        let role = self.role(rater)?;
        let log = self.snapshot()?;
        match role {
            RaterRole::Classifier => Ok(Status::Classifier(progress::progress(
                rater,
                &self.assignment,
                &log,
            ))),
            RaterRole::Reviewer => {
                let found =
                    conflict::conflicts(&log, self.quorum(), self.config.vote_policy)?;
                Ok(Status::Reviewer {
                    rater: rater.clone(),
                    progress: review_progress(&log, &found, rater),
                })
            }
        }
    }

    /// Validate and append one annotation.
    ///
    /// Classifiers may only annotate signals assigned to them. Reviewers may
    /// annotate any catalog signal.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`], [`EngineError::InvalidRater`],
    /// [`EngineError::NotAssigned`], [`EngineError::InvalidLabel`] or
    /// [`EngineError::InvalidComment`] on validation failure, and
    /// [`EngineError::Store`] if the append fails.
    pub fn record(
        &self,
        signal_id: SignalId,
        rater: &RaterId,
        label: Label,
        comment: Option<&str>,
    ) -> Result<AnnotationEvent, EngineError> {
        self.catalog.get(signal_id)?;
        if self.role(rater)? == RaterRole::Classifier
            && !self.assignment.is_assigned(rater, signal_id)
        {
            return Err(EngineError::NotAssigned {
                signal_id,
                rater: rater.to_string(),
            });
        }
        self.recorder
            .record(&self.catalog, signal_id, rater, label, comment, &self.store)
    }

    /// Parse a label typed by the rater against the configured set.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidLabel`] for input outside the set.
    pub fn parse_label(&self, raw: &str) -> Result<Label, EngineError> {
        self.recorder.labels().parse(raw)
    }

    /// Start a session for `rater` with their next signal already presented.
    ///
    /// # Errors
    ///
    /// See [`Workspace::queue`].
    pub fn session(&self, rater: &RaterId) -> Result<AnnotationSession, EngineError> {
        let mut session = AnnotationSession::new(rater.clone());
        if let Some(signal) = self.next(rater)? {
            session.present(signal.id)?;
        }
        Ok(session)
    }

    /// Confirm the session's selection through [`Workspace::record`].
    ///
    /// # Errors
    ///
    /// Returns the session's transition error or any [`Workspace::record`]
    /// error; the session keeps its selection on failure.
    pub fn confirm(&self, session: &mut AnnotationSession) -> Result<AnnotationEvent, EngineError> {
        session.confirm(|signal_id, rater, label, comment| {
            self.record(signal_id, rater, label, comment)
        })
    }

    /// Render any catalog signal with the configured layout.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] for an unknown signal.
    pub fn render(&self, signal_id: SignalId) -> Result<RenderOutcome, EngineError> {
        self.renderer.render(self.catalog.get(signal_id)?)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::catalog::RawSignalRow;
    use crate::config::ProjectConfig;
    use crate::error::ErrorCode;
    use crate::recorder::FixedClock;
    use crate::session::SessionPhase;
    use crate::source::MemorySignalSource;
    use crate::store::MemoryRecordStore;

    fn r(name: &str) -> RaterId {
        RaterId::new(name).unwrap()
    }

    fn workspace(ids: &[&str]) -> Workspace<MemoryRecordStore, FixedClock> {
        let config = ProjectConfig::default().validate(Path::new(".")).unwrap();
        let rows: Vec<RawSignalRow> = ids
            .iter()
            .map(|id| RawSignalRow::new(*id, "0,10,-10", "70"))
            .collect();
        let load = load_catalog(&MemorySignalSource::new(rows), &config).unwrap();
        Workspace::with_clock(
            config,
            load.catalog,
            MemoryRecordStore::new(),
            FixedClock("2025-01-01T00:00:00Z".parse().unwrap()),
        )
        .unwrap()
    }

    #[test]
    fn classifier_queue_drains_in_catalog_order() {
        let ws = workspace(&["3", "1", "2"]);
        let user1 = r("user1");
        assert_eq!(ws.next(&user1).unwrap().map(|s| s.id), Some(SignalId::new(3)));

        ws.record(SignalId::new(3), &user1, Label::Normal, None).unwrap();
        assert_eq!(ws.queue(&user1).unwrap(), vec![SignalId::new(1), SignalId::new(2)]);

        let Status::Classifier(progress) = ws.status(&user1).unwrap() else {
            panic!("user1 is a classifier");
        };
        assert_eq!((progress.classified, progress.assigned), (1, 3));
    }

    #[test]
    fn reviewer_queue_is_the_unreviewed_conflicts() {
        let ws = workspace(&["10", "20"]);
        ws.record(SignalId::new(10), &r("user1"), Label::Normal, None).unwrap();
        ws.record(SignalId::new(10), &r("user2"), Label::Noisy, None).unwrap();
        ws.record(SignalId::new(20), &r("user1"), Label::Normal, None).unwrap();
        ws.record(SignalId::new(20), &r("user2"), Label::Normal, None).unwrap();

        let reviewer = r("user3");
        assert_eq!(ws.role(&reviewer).unwrap(), RaterRole::Reviewer);
        assert_eq!(ws.queue(&reviewer).unwrap(), vec![SignalId::new(10)]);

        ws.record(SignalId::new(10), &reviewer, Label::Noisy, Some("artifact")).unwrap();
        assert!(ws.next(&reviewer).unwrap().is_none());
        assert_eq!(
            ws.status(&reviewer).unwrap(),
            Status::Reviewer {
                rater: reviewer.clone(),
                progress: ReviewProgress {
                    reviewed: 1,
                    total: 1
                }
            }
        );
        assert_eq!(ws.agreement().unwrap().agreed, 1);
    }

    #[test]
    fn unknown_rater_is_rejected_everywhere() {
        let ws = workspace(&["1"]);
        let ghost = r("ghost");
        assert_eq!(ws.queue(&ghost).unwrap_err().code(), ErrorCode::InvalidRater);
        assert_eq!(
            ws.record(SignalId::new(1), &ghost, Label::Normal, None)
                .unwrap_err()
                .code(),
            ErrorCode::InvalidRater
        );
    }

    #[test]
    fn unknown_signal_is_not_found() {
        let ws = workspace(&["1"]);
        let err = ws.record(SignalId::new(2), &r("user1"), Label::Normal, None).unwrap_err();
        assert_eq!(err.code(), ErrorCode::SignalNotFound);
        assert_eq!(ws.render(SignalId::new(2)).unwrap_err().code(), ErrorCode::SignalNotFound);
    }

    #[test]
    fn session_confirm_records_and_advances() {
        let ws = workspace(&["5", "6"]);
        let user2 = r("user2");
        let mut session = ws.session(&user2).unwrap();
        assert_eq!(session.signal(), Some(SignalId::new(5)));

        session.select_label(ws.parse_label("fibrillation").unwrap()).unwrap();
        let event = ws.confirm(&mut session).unwrap();
        assert_eq!(event.label, Label::Fibrillation);
        assert_eq!(session.phase(), SessionPhase::Confirmed);
        session.advance().unwrap();

        assert_eq!(ws.session(&user2).unwrap().signal(), Some(SignalId::new(6)));
    }

    #[test]
    fn empty_queue_session_has_no_signal() {
        let ws = workspace(&[]);
        let session = ws.session(&r("user1")).unwrap();
        assert_eq!(session.signal(), None);
    }
}
