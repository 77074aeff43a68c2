//! Per-rater work queue over a log snapshot.
//!
//! `remaining = assigned − classified`, kept in catalog order. The rater is
//! always offered the earliest unclassified signal. A stale snapshot (one
//! that misses a very recent append) only delays the signal dropping out of
//! the queue; it never causes an error.

use serde::Serialize;

use crate::ledger::classified;
use crate::model::{AnnotationEvent, RaterId, SignalId};
use crate::partition::Assignment;

/// Classification progress for one rater.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    pub rater: RaterId,
    pub classified: usize,
    pub assigned: usize,
    pub ratio: f64,
}

impl Progress {
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.classified >= self.assigned
    }
}

/// Assigned signals the rater has not classified, in catalog order.
#[must_use]
pub fn remaining(rater: &RaterId, assignment: &Assignment, log: &[AnnotationEvent]) -> Vec<SignalId> {
    let done = classified(rater, log);
    assignment
        .assigned(rater)
        .iter()
        .copied()
        .filter(|id| !done.contains(id))
        .collect()
}

/// The earliest unclassified signal for the rater.
#[must_use]
pub fn next_signal(
    rater: &RaterId,
    assignment: &Assignment,
    log: &[AnnotationEvent],
) -> Option<SignalId> {
    let done = classified(rater, log);
    assignment
        .assigned(rater)
        .iter()
        .copied()
        .find(|id| !done.contains(id))
}

/// Counts of classified vs. assigned signals.
///
/// Events for signals outside the rater's assignment are not counted. An
/// empty assignment is vacuously complete (ratio 1.0).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn progress(rater: &RaterId, assignment: &Assignment, log: &[AnnotationEvent]) -> Progress {
    let done = classified(rater, log);
    let assigned = assignment.assigned(rater);
    let classified = assigned.iter().filter(|id| done.contains(id)).count();
    let ratio = if assigned.is_empty() {
        1.0
    } else {
        classified as f64 / assigned.len() as f64
    };

    Progress {
        rater: rater.clone(),
        classified,
        assigned: assigned.len(),
        ratio,
    }
}

/// `|classified| / |assigned|`, see [`progress`].
#[must_use]
pub fn progress_ratio(rater: &RaterId, assignment: &Assignment, log: &[AnnotationEvent]) -> f64 {
    progress(rater, assignment, log).ratio
}
