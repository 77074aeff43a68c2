//! Per-rater annotation session.
//!
//! ```text
//!            select_label           confirm
//!   Idle ───────────────▶ LabelSelected ─────────▶ Confirmed
//!    ▲                     │  ▲  select_label         │
//!    │                     └──┘  set_comment          │
//!    └────────────────────────────────────────────────┘
//!                         advance
//! ```
//!
//! `cancel` returns to `Idle` from any state. Every other move is an
//! [`SessionError::InvalidTransition`].

use std::fmt;

use crate::error::EngineError;
use crate::model::{AnnotationEvent, Label, RaterId, SignalId};

/// Where the session is, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    Idle,
    LabelSelected,
    Confirmed,
}

impl SessionPhase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::LabelSelected => "label-selected",
            Self::Confirmed => "confirmed",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A session operation, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionAction {
    Present,
    SelectLabel,
    SetComment,
    Confirm,
    Advance,
}

impl SessionAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present a signal",
            Self::SelectLabel => "select a label",
            Self::SetComment => "edit the comment",
            Self::Confirm => "confirm",
            Self::Advance => "advance",
        }
    }
}

impl fmt::Display for SessionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("cannot {action} while the session is {from}")]
    InvalidTransition {
        from: SessionPhase,
        action: SessionAction,
    },

    #[error("no signal is being presented")]
    NoSignal,
}

/// Session state with its payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    LabelSelected {
        label: Label,
        comment: Option<String>,
    },
    Confirmed {
        event: AnnotationEvent,
    },
}

impl SessionState {
    #[must_use]
    pub const fn phase(&self) -> SessionPhase {
        match self {
            Self::Idle => SessionPhase::Idle,
            Self::LabelSelected { .. } => SessionPhase::LabelSelected,
            Self::Confirmed { .. } => SessionPhase::Confirmed,
        }
    }
}

/// One rater working through signals one at a time.
#[derive(Debug, Clone)]
pub struct AnnotationSession {
    rater: RaterId,
    signal: Option<SignalId>,
    state: SessionState,
}

impl AnnotationSession {
    #[must_use]
    pub const fn new(rater: RaterId) -> Self {
        Self {
            rater,
            signal: None,
            state: SessionState::Idle,
        }
    }

    #[must_use]
    pub const fn rater(&self) -> &RaterId {
        &self.rater
    }

    #[must_use]
    pub const fn signal(&self) -> Option<SignalId> {
        self.signal
    }

    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub const fn phase(&self) -> SessionPhase {
        self.state.phase()
    }

    const fn invalid(&self, action: SessionAction) -> SessionError {
        SessionError::InvalidTransition {
            from: self.state.phase(),
            action,
        }
    }

    /// Put a signal in front of the rater. Only allowed while idle.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidTransition`] outside `Idle`.
    pub fn present(&mut self, signal: SignalId) -> Result<(), SessionError> {
        if self.phase() != SessionPhase::Idle {
            return Err(self.invalid(SessionAction::Present));
        }
        self.signal = Some(signal);
        Ok(())
    }

    /// Pick a label, or replace the one already picked (keeping the comment).
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoSignal`] before [`present`](Self::present)
    /// and [`SessionError::InvalidTransition`] from `Confirmed`.
    pub fn select_label(&mut self, label: Label) -> Result<(), SessionError> {
        if self.signal.is_none() {
            return Err(SessionError::NoSignal);
        }
        self.state = match std::mem::take(&mut self.state) {
            SessionState::Idle => SessionState::LabelSelected {
                label,
                comment: None,
            },
            SessionState::LabelSelected { comment, .. } => {
                SessionState::LabelSelected { label, comment }
            }
            confirmed @ SessionState::Confirmed { .. } => {
                self.state = confirmed;
                return Err(self.invalid(SessionAction::SelectLabel));
            }
        };
        Ok(())
    }

    /// Replace the free-text comment. Only allowed once a label is selected.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidTransition`] outside `LabelSelected`.
    pub fn set_comment(&mut self, text: Option<String>) -> Result<(), SessionError> {
        match &mut self.state {
            SessionState::LabelSelected { comment, .. } => {
                *comment = text;
                Ok(())
            }
            _ => Err(self.invalid(SessionAction::SetComment)),
        }
    }

    /// Hand the selection to `record` and move to `Confirmed` if it succeeds.
    ///
    /// On failure the session stays in `LabelSelected` so the rater can fix
    /// the label or comment and try again.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Session`] outside `LabelSelected`, or whatever
    /// `record` returns.
    pub fn confirm<F>(&mut self, record: F) -> Result<AnnotationEvent, EngineError>
    where
        F: FnOnce(SignalId, &RaterId, Label, Option<&str>) -> Result<AnnotationEvent, EngineError>,
    {
        let SessionState::LabelSelected { label, comment } = &self.state else {
            return Err(self.invalid(SessionAction::Confirm).into());
        };
        let signal = self.signal.ok_or(SessionError::NoSignal)?;

        let event = record(signal, &self.rater, label.clone(), comment.as_deref())?;
        self.state = SessionState::Confirmed {
            event: event.clone(),
        };
        Ok(event)
    }

    /// Leave a confirmed signal behind and return to `Idle`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidTransition`] outside `Confirmed`.
    pub fn advance(&mut self) -> Result<AnnotationEvent, SessionError> {
        match std::mem::take(&mut self.state) {
            SessionState::Confirmed { event } => {
                self.signal = None;
                Ok(event)
            }
            other => {
                self.state = other;
                Err(self.invalid(SessionAction::Advance))
            }
        }
    }

    /// Drop any selection and return to `Idle`. The presented signal stays.
    pub fn cancel(&mut self) {
        self.state = SessionState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(signal_id: SignalId, rater: &RaterId, label: Label, comment: Option<&str>) -> AnnotationEvent {
        AnnotationEvent {
            signal_id,
            rater_id: rater.clone(),
            label,
            timestamp: "2025-01-01T00:00:00Z".parse().unwrap(),
            comment: comment.map(str::to_string),
        }
    }

    fn session() -> AnnotationSession {
        let mut s = AnnotationSession::new(RaterId::new("user1").unwrap());
        s.present(SignalId::new(7)).unwrap();
        s
    }

    #[test]
    fn happy_path_walks_every_phase() {
        let mut s = session();
        assert_eq!(s.phase(), SessionPhase::Idle);

        s.select_label(Label::Noisy).unwrap();
        s.set_comment(Some("baseline wander".to_string())).unwrap();
        s.select_label(Label::Other).unwrap();
        assert_eq!(
            s.state(),
            &SessionState::LabelSelected {
                label: Label::Other,
                comment: Some("baseline wander".to_string())
            }
        );

        let recorded = s
            .confirm(|id, rater, label, comment| Ok(event(id, rater, label, comment)))
            .unwrap();
        assert_eq!(recorded.label, Label::Other);
        assert_eq!(recorded.comment.as_deref(), Some("baseline wander"));
        assert_eq!(s.phase(), SessionPhase::Confirmed);

        let advanced = s.advance().unwrap();
        assert_eq!(advanced, recorded);
        assert_eq!(s.phase(), SessionPhase::Idle);
        assert_eq!(s.signal(), None);
    }

    #[test]
    fn comment_before_label_is_rejected() {
        let mut s = session();
        let err = s.set_comment(Some("x".to_string())).unwrap_err();
        assert_eq!(
            err,
            SessionError::InvalidTransition {
                from: SessionPhase::Idle,
                action: SessionAction::SetComment
            }
        );
        assert_eq!(err.to_string(), "cannot edit the comment while the session is idle");
    }

    #[test]
    fn confirm_from_idle_is_rejected() {
        let mut s = session();
        let err = s
            .confirm(|id, rater, label, comment| Ok(event(id, rater, label, comment)))
            .unwrap_err();
        assert!(matches!(err, EngineError::Session(SessionError::InvalidTransition { .. })));
    }

    #[test]
    fn select_without_signal_is_rejected() {
        let mut s = AnnotationSession::new(RaterId::new("user1").unwrap());
        assert_eq!(s.select_label(Label::Normal), Err(SessionError::NoSignal));
    }

    #[test]
    fn confirmed_session_only_advances_or_cancels() {
        let mut s = session();
        s.select_label(Label::Normal).unwrap();
        s.confirm(|id, rater, label, comment| Ok(event(id, rater, label, comment)))
            .unwrap();

        assert!(s.select_label(Label::Noisy).is_err());
        assert!(s.set_comment(None).is_err());
        assert!(s.present(SignalId::new(8)).is_err());
        assert_eq!(s.phase(), SessionPhase::Confirmed);

        s.cancel();
        assert_eq!(s.phase(), SessionPhase::Idle);
        assert_eq!(s.signal(), Some(SignalId::new(7)));
    }

    #[test]
    fn failed_record_keeps_selection() {
        let mut s = session();
        s.select_label(Label::Normal).unwrap();
        let err = s
            .confirm(|_, _, _, _| Err(EngineError::InvalidComment("too long".to_string())))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidComment(_)));
        assert_eq!(s.phase(), SessionPhase::LabelSelected);
    }

    #[test]
    fn advance_requires_confirmation() {
        let mut s = session();
        s.select_label(Label::Normal).unwrap();
        assert!(s.advance().is_err());
        assert_eq!(s.phase(), SessionPhase::LabelSelected);
    }
}
