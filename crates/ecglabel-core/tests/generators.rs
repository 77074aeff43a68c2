//! Proptest strategies shared by the property suites.

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use ecglabel_core::model::{AnnotationEvent, Label, RaterId, SignalId};
use proptest::prelude::*;

pub fn rater(name: &str) -> RaterId {
    RaterId::new(name).unwrap()
}

/// Distinct catalog IDs in arbitrary order.
pub fn arb_catalog(max: usize) -> impl Strategy<Value = Vec<SignalId>> {
    prop::collection::hash_set(-1_000i64..1_000, 0..max)
        .prop_map(|ids| ids.into_iter().map(SignalId::new).collect::<Vec<_>>())
        .prop_shuffle()
}

pub fn arb_label() -> impl Strategy<Value = Label> {
    prop_oneof![
        Just(Label::Normal),
        Just(Label::Fibrillation),
        Just(Label::Noisy),
        Just(Label::Other),
    ]
}

/// Log events drawn from a small ID space so raters collide often.
pub fn arb_log(raters: &'static [&'static str], max: usize) -> impl Strategy<Value = Vec<AnnotationEvent>> {
    prop::collection::vec(
        (0i64..12, prop::sample::select(raters), arb_label()),
        0..max,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (id, name, label))| AnnotationEvent {
                signal_id: SignalId::new(id),
                rater_id: rater(name),
                label,
                timestamp: Utc
                    .timestamp_opt(1_700_000_000 + i64::try_from(i).unwrap_or(0), 0)
                    .unwrap(),
                comment: None,
            })
            .collect()
    })
}
