//! Disagreement detection across the rater quorum, and the reviewer queue.
//!
//! A signal is a conflict iff every quorum rater responsible for it has a
//! resolved vote on it and those votes are not all the same label. A signal
//! only one of them has seen so far is never a conflict; it may become one
//! after a later append, so the queue is always recomputed from a snapshot.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::error::EngineError;
use crate::ledger::{VoteLedger, VotePolicy, classified};
use crate::model::{AnnotationEvent, Label, RaterId, SignalId};
use crate::partition::Assignment;

/// A signal on which the quorum disagreed, with each quorum rater's vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictRecord {
    pub signal_id: SignalId,
    pub votes: BTreeMap<RaterId, Label>,
}

impl ConflictRecord {
    /// Distinct labels among the votes, sorted.
    #[must_use]
    pub fn labels(&self) -> Vec<&Label> {
        let mut labels: Vec<&Label> = self.votes.values().collect();
        labels.sort();
        labels.dedup();
        labels
    }
}

/// Inter-rater agreement over signals the whole quorum has voted on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AgreementSummary {
    /// Signals with a vote from every quorum rater.
    pub both_voted: usize,
    pub agreed: usize,
    pub disagreed: usize,
}

impl AgreementSummary {
    /// Fraction of fully-voted signals on which the quorum agreed.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn agreement_ratio(&self) -> Option<f64> {
        if self.both_voted == 0 {
            None
        } else {
            Some(self.agreed as f64 / self.both_voted as f64)
        }
    }
}

/// How far the reviewer has worked through the conflict set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReviewProgress {
    pub reviewed: usize,
    pub total: usize,
}

impl ReviewProgress {
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.reviewed >= self.total
    }
}

/// The raters whose votes decide a signal.
///
/// A fixed quorum judges every signal by the same raters. An assigned quorum
/// judges each signal only by the quorum raters it is assigned to, so under
/// the overlapping-tertile scheme every block is decided by its own pair.
#[derive(Debug, Clone, Copy)]
pub struct Quorum<'a> {
    raters: &'a [RaterId],
    assignment: Option<&'a Assignment>,
}

impl<'a> Quorum<'a> {
    #[must_use]
    pub const fn fixed(raters: &'a [RaterId]) -> Self {
        Self {
            raters,
            assignment: None,
        }
    }

    #[must_use]
    pub const fn assigned(raters: &'a [RaterId], assignment: &'a Assignment) -> Self {
        Self {
            raters,
            assignment: Some(assignment),
        }
    }

    #[must_use]
    pub const fn raters(&self) -> &'a [RaterId] {
        self.raters
    }

    /// Quorum raters responsible for `signal_id`, in quorum order.
    #[must_use]
    pub fn for_signal(&self, signal_id: SignalId) -> Vec<&'a RaterId> {
        self.raters
            .iter()
            .filter(|rater| {
                self.assignment
                    .is_none_or(|a| a.is_assigned(rater, signal_id))
            })
            .collect()
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.raters.is_empty() {
            return Err(EngineError::config("conflict quorum is empty"));
        }
        Ok(())
    }
}

/// Votes of the signal's quorum raters, or `None` while one of them has not
/// voted or fewer than two raters decide the signal.
fn quorum_votes(
    ledger: &VoteLedger,
    signal_id: SignalId,
    quorum: Quorum<'_>,
) -> Option<BTreeMap<RaterId, Label>> {
    let voters = quorum.for_signal(signal_id);
    if voters.len() < 2 {
        return None;
    }
    voters
        .into_iter()
        .map(|rater| {
            ledger
                .vote(signal_id, rater)
                .map(|label| (rater.clone(), label.clone()))
        })
        .collect()
}

fn is_unanimous(votes: &BTreeMap<RaterId, Label>) -> bool {
    let mut labels = votes.values();
    labels
        .next()
        .is_none_or(|first| labels.all(|label| label == first))
}

/// Signals on which the quorum disagrees, in first-appearance order in the log.
///
/// # Errors
///
/// Returns [`EngineError::Configuration`] for an empty quorum.
pub fn conflicts(
    log: &[AnnotationEvent],
    quorum: Quorum<'_>,
    policy: VotePolicy,
) -> Result<Vec<ConflictRecord>, EngineError> {
    quorum.validate()?;
    let ledger = VoteLedger::build(log, policy);

    let out: Vec<ConflictRecord> = ledger
        .iter()
        .filter_map(|signal| {
            let votes = quorum_votes(&ledger, signal.signal_id, quorum)?;
            (!is_unanimous(&votes)).then(|| ConflictRecord {
                signal_id: signal.signal_id,
                votes,
            })
        })
        .collect();

    debug!(
        %policy,
        quorum = quorum.raters().len(),
        conflicts = out.len(),
        "computed conflict set"
    );
    Ok(out)
}

/// Count agreement among signals every responsible quorum rater has voted on.
///
/// # Errors
///
/// Returns [`EngineError::Configuration`] for an empty quorum.
pub fn agreement(
    log: &[AnnotationEvent],
    quorum: Quorum<'_>,
    policy: VotePolicy,
) -> Result<AgreementSummary, EngineError> {
    quorum.validate()?;
    let ledger = VoteLedger::build(log, policy);

    let mut summary = AgreementSummary::default();
    for signal in ledger.iter() {
        if let Some(votes) = quorum_votes(&ledger, signal.signal_id, quorum) {
            summary.both_voted += 1;
            if is_unanimous(&votes) {
                summary.agreed += 1;
            } else {
                summary.disagreed += 1;
            }
        }
    }
    Ok(summary)
}

/// Conflicts the reviewer has not annotated yet, in conflict order.
#[must_use]
pub fn review_queue(
    log: &[AnnotationEvent],
    conflicts: &[ConflictRecord],
    reviewer: &RaterId,
) -> Vec<SignalId> {
    let done = classified(reviewer, log);
    conflicts
        .iter()
        .map(|c| c.signal_id)
        .filter(|id| !done.contains(id))
        .collect()
}

/// Reviewed vs. total conflicts for the reviewer.
#[must_use]
pub fn review_progress(
    log: &[AnnotationEvent],
    conflicts: &[ConflictRecord],
    reviewer: &RaterId,
) -> ReviewProgress {
    let done = classified(reviewer, log);
    let ids: HashSet<SignalId> = conflicts.iter().map(|c| c.signal_id).collect();
    ReviewProgress {
        reviewed: ids.iter().filter(|id| done.contains(id)).count(),
        total: ids.len(),
    }
}
