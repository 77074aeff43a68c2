//! Static assignment of signals to raters.
//!
//! The partition is a pure function of the catalog order, the roster order
//! and the scheme: recomputing it on the same inputs always yields the same
//! mapping, so it is never stored.
//!
//! # Schemes
//!
//! - **Uniform**: every rater sees every signal (independent double-blind
//!   labeling before conflict review).
//! - **Overlapping tertile**: the catalog is cut into three contiguous
//!   blocks A, B, C of `n / 3` signals each, the remainder going to C. The
//!   three raters cover the block pairs {A,B}, {B,C}, {A,C}, so every block
//!   is double-rated and every pair of raters shares exactly one block.

use std::collections::HashSet;
use std::ops::Range;
use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EngineError;
use crate::model::{RaterId, SignalId};

// ---------------------------------------------------------------------------
// Scheme
// ---------------------------------------------------------------------------

/// How signals are distributed across the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PartitionScheme {
    #[default]
    Uniform,
    OverlappingTertile,
}

impl PartitionScheme {
    /// Exact roster size the scheme needs, or `None` for any non-empty roster.
    #[must_use]
    pub const fn required_raters(self) -> Option<usize> {
        match self {
            Self::Uniform => None,
            Self::OverlappingTertile => Some(3),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uniform => "uniform",
            Self::OverlappingTertile => "overlapping-tertile",
        }
    }
}

impl fmt::Display for PartitionScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PartitionScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uniform" => Ok(Self::Uniform),
            "overlapping-tertile" | "tertile" => Ok(Self::OverlappingTertile),
            _ => Err(format!("unknown partition scheme: {s}")),
        }
    }
}

/// One of the three contiguous catalog blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tertile {
    A,
    B,
    C,
}

impl Tertile {
    /// Zero-based, half-open position range of this block in a catalog of `n`.
    #[must_use]
    pub const fn bounds(self, n: usize) -> Range<usize> {
        let size = n / 3;
        match self {
            Self::A => 0..size,
            Self::B => size..2 * size,
            Self::C => 2 * size..n,
        }
    }
}

/// Block pair owned by each roster slot.
pub const TERTILE_COVER: [[Tertile; 2]; 3] = [
    [Tertile::A, Tertile::B],
    [Tertile::B, Tertile::C],
    [Tertile::A, Tertile::C],
];

// ---------------------------------------------------------------------------
// Assignment
// ---------------------------------------------------------------------------

/// Signals owned by one rater.
#[derive(Debug, Clone)]
pub struct RaterAssignment {
    pub rater: RaterId,
    /// Assigned IDs in catalog order.
    pub signals: Vec<SignalId>,
    members: HashSet<SignalId>,
}

impl RaterAssignment {
    fn new(rater: RaterId, signals: Vec<SignalId>) -> Self {
        let members = signals.iter().copied().collect();
        Self {
            rater,
            signals,
            members,
        }
    }

    #[must_use]
    pub fn contains(&self, id: SignalId) -> bool {
        self.members.contains(&id)
    }
}

/// Derived rater → signals relation, in roster order.
#[derive(Debug, Clone)]
pub struct Assignment {
    scheme: PartitionScheme,
    entries: Vec<RaterAssignment>,
}

impl Assignment {
    #[must_use]
    pub const fn scheme(&self) -> PartitionScheme {
        self.scheme
    }

    /// Signals assigned to `rater`, in catalog order. Unknown raters get none.
    #[must_use]
    pub fn assigned(&self, rater: &RaterId) -> &[SignalId] {
        match self.entry(rater) {
            Some(entry) => &entry.signals,
            None => &[],
        }
    }

    #[must_use]
    pub fn is_assigned(&self, rater: &RaterId, id: SignalId) -> bool {
        self.entry(rater).is_some_and(|e| e.contains(id))
    }

    #[must_use]
    pub fn has_rater(&self, rater: &RaterId) -> bool {
        self.entry(rater).is_some()
    }

    /// Raters responsible for a signal, in roster order.
    #[must_use]
    pub fn raters_for(&self, id: SignalId) -> Vec<&RaterId> {
        self.entries
            .iter()
            .filter(|e| e.contains(id))
            .map(|e| &e.rater)
            .collect()
    }

    pub fn roster(&self) -> impl Iterator<Item = &RaterId> {
        self.entries.iter().map(|e| &e.rater)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RaterAssignment> {
        self.entries.iter()
    }

    fn entry(&self, rater: &RaterId) -> Option<&RaterAssignment> {
        self.entries.iter().find(|e| &e.rater == rater)
    }
}

/// Partition catalog IDs across the roster.
///
/// IDs are re-indexed stably: a repeated ID keeps its first position.
///
/// # Errors
///
/// Returns [`EngineError::Configuration`] when the roster is empty, repeats
/// a rater, or does not have the size the scheme requires.
pub fn assign(
    catalog_ids: &[SignalId],
    roster: &[RaterId],
    scheme: PartitionScheme,
) -> Result<Assignment, EngineError> {
    validate_roster(roster, scheme)?;

    let mut seen = HashSet::with_capacity(catalog_ids.len());
    let ids: Vec<SignalId> = catalog_ids
        .iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .collect();

    let entries: Vec<RaterAssignment> = match scheme {
        PartitionScheme::Uniform => roster
            .iter()
            .map(|rater| RaterAssignment::new(rater.clone(), ids.clone()))
            .collect(),
        PartitionScheme::OverlappingTertile => roster
            .iter()
            .zip(TERTILE_COVER)
            .map(|(rater, blocks)| {
                let mut positions: Vec<usize> = blocks
                    .iter()
                    .flat_map(|block| block.bounds(ids.len()))
                    .collect();
                positions.sort_unstable();
                let signals = positions.into_iter().map(|pos| ids[pos]).collect();
                RaterAssignment::new(rater.clone(), signals)
            })
            .collect(),
    };

    debug!(
        %scheme,
        signals = ids.len(),
        raters = entries.len(),
        "computed assignment"
    );
    Ok(Assignment { scheme, entries })
}

fn validate_roster(roster: &[RaterId], scheme: PartitionScheme) -> Result<(), EngineError> {
    if roster.is_empty() {
        return Err(EngineError::config("rater roster is empty"));
    }
    if let Some(required) = scheme.required_raters() {
        if roster.len() != required {
            return Err(EngineError::config(format!(
                "{scheme} scheme needs exactly {required} raters, roster has {}",
                roster.len()
            )));
        }
    }
    let mut seen = HashSet::new();
    for rater in roster {
        if !seen.insert(rater) {
            return Err(EngineError::config(format!(
                "rater '{rater}' appears more than once in the roster"
            )));
        }
    }
    Ok(())
}
