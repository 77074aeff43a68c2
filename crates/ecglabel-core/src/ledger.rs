//! Per-signal vote resolution over the annotation log.
//!
//! The log may hold several events for one `(signal, rater)` pair: a rater
//! correcting themselves, or a double submit. [`VotePolicy`] decides which
//! of those events is the rater's vote. The choice is made once here so the
//! progress tracker and the conflict detector can never disagree about it.
//!
//! Whether a rater has *classified* a signal does not depend on the policy:
//! any event counts.

use std::collections::{HashMap, HashSet};
use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::model::{AnnotationEvent, Label, RaterId, SignalId};

/// Which of a rater's repeated events is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VotePolicy {
    /// The earliest event in log order wins; later ones are ignored.
    #[default]
    First,
    /// The latest event in log order wins.
    Last,
}

impl VotePolicy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Last => "last",
        }
    }
}

impl fmt::Display for VotePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VotePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first" => Ok(Self::First),
            "last" => Ok(Self::Last),
            _ => Err(format!("unknown vote policy: {s}")),
        }
    }
}

/// One rater's resolved vote on one signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    pub rater: RaterId,
    pub label: Label,
    /// How many events this rater logged for the signal.
    pub events: usize,
}

/// A `(signal, rater)` pair the log holds more than one event for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepeatedVote {
    pub signal_id: SignalId,
    pub rater: RaterId,
    pub events: usize,
}

/// All resolved votes on one signal, in first-vote order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalVotes {
    pub signal_id: SignalId,
    pub votes: Vec<Vote>,
}

impl SignalVotes {
    #[must_use]
    pub fn vote_of(&self, rater: &RaterId) -> Option<&Label> {
        self.votes
            .iter()
            .find(|v| &v.rater == rater)
            .map(|v| &v.label)
    }
}

/// Votes grouped by signal, in first-appearance order of the signal.
#[derive(Debug, Clone, Default)]
pub struct VoteLedger {
    policy: VotePolicy,
    signals: Vec<SignalVotes>,
    index: HashMap<SignalId, usize>,
}

impl VoteLedger {
    /// Fold the log into resolved votes.
    #[must_use]
    pub fn build(log: &[AnnotationEvent], policy: VotePolicy) -> Self {
        let mut ledger = Self {
            policy,
            ..Self::default()
        };

        for event in log {
            let pos = *ledger.index.entry(event.signal_id).or_insert_with(|| {
                ledger.signals.push(SignalVotes {
                    signal_id: event.signal_id,
                    votes: Vec::new(),
                });
                ledger.signals.len() - 1
            });
            let entry = &mut ledger.signals[pos];

            match entry.votes.iter_mut().find(|v| v.rater == event.rater_id) {
                Some(vote) => {
                    vote.events += 1;
                    if policy == VotePolicy::Last {
                        vote.label = event.label.clone();
                    }
                }
                None => entry.votes.push(Vote {
                    rater: event.rater_id.clone(),
                    label: event.label.clone(),
                    events: 1,
                }),
            }
        }

        ledger
    }

    #[must_use]
    pub const fn policy(&self) -> VotePolicy {
        self.policy
    }

    pub fn iter(&self) -> impl Iterator<Item = &SignalVotes> {
        self.signals.iter()
    }

    #[must_use]
    pub fn get(&self, id: SignalId) -> Option<&SignalVotes> {
        self.index.get(&id).map(|&pos| &self.signals[pos])
    }

    /// The authoritative label `rater` gave `id`, if any.
    #[must_use]
    pub fn vote(&self, id: SignalId, rater: &RaterId) -> Option<&Label> {
        self.get(id).and_then(|s| s.vote_of(rater))
    }

    /// Signals with at least one event from `rater`.
    #[must_use]
    pub fn classified_by(&self, rater: &RaterId) -> HashSet<SignalId> {
        self.signals
            .iter()
            .filter(|s| s.vote_of(rater).is_some())
            .map(|s| s.signal_id)
            .collect()
    }

    /// Every pair annotated more than once; the policy picked one event each.
    pub fn repeated_votes(&self) -> impl Iterator<Item = RepeatedVote> {
        self.signals.iter().flat_map(|s| {
            s.votes
                .iter()
                .filter(|v| v.events > 1)
                .map(move |v| RepeatedVote {
                    signal_id: s.signal_id,
                    rater: v.rater.clone(),
                    events: v.events,
                })
        })
    }
}

/// Signals with at least one event from `rater`, straight from the log.
#[must_use]
pub fn classified(rater: &RaterId, log: &[AnnotationEvent]) -> HashSet<SignalId> {
    log.iter()
        .filter(|e| &e.rater_id == rater)
        .map(|e| e.signal_id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(id: i64, rater: &str, label: Label) -> AnnotationEvent {
        AnnotationEvent {
            signal_id: SignalId::new(id),
            rater_id: RaterId::new(rater).unwrap(),
            label,
            timestamp: "2025-01-01T00:00:00Z".parse().unwrap(),
            comment: None,
        }
    }

    fn r(name: &str) -> RaterId {
        RaterId::new(name).unwrap()
    }

    #[test]
    fn first_policy_ignores_revotes() {
        let log = vec![
            ev(1, "a", Label::Normal),
            ev(1, "a", Label::Noisy),
        ];
        let ledger = VoteLedger::build(&log, VotePolicy::First);
        assert_eq!(ledger.vote(SignalId::new(1), &r("a")), Some(&Label::Normal));
    }

    #[test]
    fn last_policy_takes_latest_revote() {
        let log = vec![
            ev(1, "a", Label::Normal),
            ev(1, "a", Label::Noisy),
            ev(1, "a", Label::Other),
        ];
        let ledger = VoteLedger::build(&log, VotePolicy::Last);
        assert_eq!(ledger.vote(SignalId::new(1), &r("a")), Some(&Label::Other));
    }

    #[test]
    fn signals_follow_first_appearance_order() {
        let log = vec![
            ev(30, "a", Label::Normal),
            ev(10, "b", Label::Normal),
            ev(30, "b", Label::Normal),
            ev(20, "a", Label::Normal),
        ];
        let ledger = VoteLedger::build(&log, VotePolicy::First);
        let order: Vec<i64> = ledger.iter().map(|s| s.signal_id.get()).collect();
        assert_eq!(order, vec![30, 10, 20]);
    }

    #[test]
    fn classified_is_policy_independent() {
        let log = vec![ev(1, "a", Label::Normal), ev(2, "b", Label::Noisy)];
        for policy in [VotePolicy::First, VotePolicy::Last] {
            let ledger = VoteLedger::build(&log, policy);
            assert_eq!(ledger.classified_by(&r("a")), classified(&r("a"), &log));
        }
    }

    #[test]
    fn repeated_votes_are_reported() {
        let log = vec![
            ev(1, "a", Label::Normal),
            ev(1, "a", Label::Normal),
            ev(1, "b", Label::Normal),
        ];
        let ledger = VoteLedger::build(&log, VotePolicy::First);
        let repeated: Vec<RepeatedVote> = ledger.repeated_votes().collect();
        assert_eq!(
            repeated,
            vec![RepeatedVote {
                signal_id: SignalId::new(1),
                rater: r("a"),
                events: 2,
            }]
        );
    }
}
