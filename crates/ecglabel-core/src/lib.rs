//! ecglabel-core library.
//!
//! Multi-rater annotation of ECG strips: a signal catalog, a static
//! assignment of signals to raters, progress and conflict computation over
//! an append-only annotation log, and a clinically scaled strip renderer.
//!
//! # Conventions
//!
//! - **Errors**: typed [`error::EngineError`] from every engine operation;
//!   `anyhow::Result` only where config files are loaded.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `debug!`).
//! - **Snapshots**: progress and conflict queries are pure functions of a
//!   fetched log; nothing is cached between calls.

pub mod catalog;
pub mod config;
pub mod conflict;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod lock;
pub mod model;
pub mod partition;
pub mod progress;
pub mod recorder;
pub mod render;
pub mod session;
pub mod source;
pub mod store;

pub use engine::{Status, Workspace, load_catalog};
pub use error::{EngineError, ErrorCode};
