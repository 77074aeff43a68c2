//! Record stores: the append-only annotation log behind the engine.
//!
//! The engine never edits or deletes events. A store only has to return
//! everything written so far and append one event atomically.

pub mod log;
pub mod memory;

pub use log::{LineWarning, LogOptions, LogParseError, LogRead, LogRecordStore};
pub use memory::MemoryRecordStore;

use crate::error::ErrorCode;
use crate::lock::LockError;
use crate::model::AnnotationEvent;

/// Errors raised by a record store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("annotation log I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("annotation log lock error: {0}")]
    Lock(#[from] LockError),

    #[error("failed to encode annotation: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("annotation log version mismatch: {0}")]
    VersionMismatch(String),

    #[error("annotation store is unavailable after a writer panicked")]
    Poisoned,
}

impl StoreError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Io(_) | Self::Encode(_) => ErrorCode::LogWriteFailed,
            Self::Lock(err) => err.code(),
            Self::VersionMismatch(_) => ErrorCode::LogReadFailed,
            Self::Poisoned => ErrorCode::InternalUnexpected,
        }
    }
}

/// Append-only storage for annotation events.
pub trait RecordStore {
    /// Return every stored event in append order.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the log cannot be read at all.
    fn read_all(&self) -> Result<Vec<AnnotationEvent>, StoreError>;

    /// Append exactly one event.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the event could not be durably appended.
    fn append(&self, event: &AnnotationEvent) -> Result<(), StoreError>;
}

impl<S: RecordStore + ?Sized> RecordStore for &S {
    fn read_all(&self) -> Result<Vec<AnnotationEvent>, StoreError> {
        (**self).read_all()
    }

    fn append(&self, event: &AnnotationEvent) -> Result<(), StoreError> {
        (**self).append(event)
    }
}
