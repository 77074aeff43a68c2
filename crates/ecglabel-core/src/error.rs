use std::fmt;

use crate::model::SignalId;
use crate::session::SessionError;
use crate::source::SourceError;
use crate::store::StoreError;

/// Machine-readable error codes for scripted callers and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    InvalidConfiguration,
    SignalNotFound,
    SignalNotAssigned,
    InvalidRater,
    InvalidLabel,
    InvalidComment,
    InvalidTransition,
    RenderFailed,
    SourceReadFailed,
    LogReadFailed,
    LogWriteFailed,
    LockContention,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::InvalidConfiguration => "E1003",
            Self::SignalNotFound => "E2001",
            Self::SignalNotAssigned => "E2002",
            Self::InvalidRater => "E2003",
            Self::InvalidLabel => "E2004",
            Self::InvalidComment => "E2005",
            Self::InvalidTransition => "E2006",
            Self::RenderFailed => "E3001",
            Self::SourceReadFailed => "E4001",
            Self::LogReadFailed => "E4002",
            Self::LogWriteFailed => "E5001",
            Self::LockContention => "E5002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Project not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::InvalidConfiguration => "Invalid configuration",
            Self::SignalNotFound => "Signal not found",
            Self::SignalNotAssigned => "Signal not assigned to rater",
            Self::InvalidRater => "Unknown or malformed rater",
            Self::InvalidLabel => "Label not in configured label set",
            Self::InvalidComment => "Comment rejected",
            Self::InvalidTransition => "Invalid session transition",
            Self::RenderFailed => "Strip rendering failed",
            Self::SourceReadFailed => "Signal source read failed",
            Self::LogReadFailed => "Annotation log read failed",
            Self::LogWriteFailed => "Annotation log write failed",
            Self::LockContention => "Lock contention",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `ecgl init` to initialize this directory."),
            Self::ConfigParseError => Some("Fix syntax in .ecglabel/config.toml and retry."),
            Self::InvalidConfiguration => {
                Some("Check the rater roster, partition scheme and quorum in .ecglabel/config.toml.")
            }
            Self::SignalNotFound => Some("Run `ecgl catalog` to list the loaded signal IDs."),
            Self::SignalNotAssigned => Some("Run `ecgl assign` to see which signals you own."),
            Self::InvalidRater => Some("Use a rater ID declared under [[raters]] in config.toml."),
            Self::InvalidLabel => {
                Some("Use one of the labels listed under [annotation] in config.toml.")
            }
            Self::InvalidComment => Some("Shorten the comment and retry."),
            Self::InvalidTransition => {
                Some("Follow the session flow: select a label, then confirm.")
            }
            Self::RenderFailed => None,
            Self::SourceReadFailed => Some("Check that the signal file exists and is valid CSV."),
            Self::LogReadFailed => Some("Inspect .ecglabel/annotations.log for a bad header."),
            Self::LogWriteFailed => Some("Check disk space and write permissions."),
            Self::LockContention => Some("Retry after the other `ecgl` process finishes writing."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors surfaced by engine operations.
///
/// Row-level parse failures never show up here: the catalog and the log
/// reader collect them as warnings and keep going.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("signal {0} not found in catalog")]
    NotFound(SignalId),

    #[error("signal {signal_id} is not assigned to rater '{rater}'")]
    NotAssigned { signal_id: SignalId, rater: String },

    #[error("invalid rater '{0}'")]
    InvalidRater(String),

    #[error("label '{label}' is not one of: {allowed}")]
    InvalidLabel { label: String, allowed: String },

    #[error("invalid comment: {0}")]
    InvalidComment(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("failed to encode strip image: {0}")]
    Render(#[from] png::EncodingError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Configuration(_) => ErrorCode::InvalidConfiguration,
            Self::NotFound(_) => ErrorCode::SignalNotFound,
            Self::NotAssigned { .. } => ErrorCode::SignalNotAssigned,
            Self::InvalidRater(_) => ErrorCode::InvalidRater,
            Self::InvalidLabel { .. } => ErrorCode::InvalidLabel,
            Self::InvalidComment(_) => ErrorCode::InvalidComment,
            Self::Session(_) => ErrorCode::InvalidTransition,
            Self::Render(_) => ErrorCode::RenderFailed,
            Self::Source(err) => err.code(),
            Self::Store(err) => err.code(),
        }
    }

    /// Shorthand for a fail-fast configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// True for errors that must halt a session before any signal is offered.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self.code(), ErrorCode::InvalidConfiguration)
    }
}
