//! Domain types shared by every engine component.

pub mod annotation;
pub mod signal;

pub use annotation::{AnnotationEvent, Label, LabelSet, RaterId, RaterRole};
pub use signal::{Signal, SignalId, SignalMetadata};
