use std::sync::Mutex;

use super::{RecordStore, StoreError};
use crate::model::AnnotationEvent;

/// Process-local record store.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    events: Mutex<Vec<AnnotationEvent>>,
}

impl MemoryRecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing events, e.g. a fetched snapshot.
    #[must_use]
    pub fn with_events(events: Vec<AnnotationEvent>) -> Self {
        Self {
            events: Mutex::new(events),
        }
    }

    /// Number of stored events.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if a writer panicked mid-append.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.events.lock().map_err(|_| StoreError::Poisoned)?.len())
    }
}

impl RecordStore for MemoryRecordStore {
    fn read_all(&self) -> Result<Vec<AnnotationEvent>, StoreError> {
        let events = self.events.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(events.clone())
    }

    fn append(&self, event: &AnnotationEvent) -> Result<(), StoreError> {
        let mut events = self.events.lock().map_err(|_| StoreError::Poisoned)?;
        events.push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Label, RaterId, SignalId};

    #[test]
    fn append_then_read_preserves_order() {
        let store = MemoryRecordStore::new();
        for (id, label) in [(1, Label::Normal), (2, Label::Noisy)] {
            store
                .append(&AnnotationEvent {
                    signal_id: SignalId::new(id),
                    rater_id: RaterId::new("user1").unwrap(),
                    label,
                    timestamp: "2025-01-01T00:00:00Z".parse().unwrap(),
                    comment: None,
                })
                .unwrap();
        }

        let events = store.read_all().unwrap();
        assert_eq!(store.len().unwrap(), 2);
        assert_eq!(events[0].signal_id, SignalId::new(1));
        assert_eq!(events[1].label, Label::Noisy);
    }
}
