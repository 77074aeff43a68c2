//! `ecgl record`: label one signal as the acting rater.
//!
//! Runs the annotation session for a single signal: present, select the
//! label, attach the comment, confirm. Nothing is written unless every
//! check passes.

use std::io::Write;
use std::path::Path;

use clap::Args;
use ecglabel_core::model::{AnnotationEvent, RaterId, SignalId};
use ecglabel_core::session::AnnotationSession;
use ecglabel_core::store::RecordStore;
use ecglabel_core::{EngineError, Workspace};
use serde::Serialize;
use tracing::debug;

use crate::cmd::{Globals, open_workspace};
use crate::output::{fail, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct RecordArgs {
    /// Signal to label.
    #[arg(long, value_name = "ID")]
    pub signal: SignalId,

    /// One of the configured labels (case-insensitive for the standard four).
    #[arg(long)]
    pub label: String,

    /// Optional free-text note; a single line.
    #[arg(long)]
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
struct RecordReport {
    event: AnnotationEvent,
    remaining: usize,
}

fn annotate<S: RecordStore>(
    ws: &Workspace<S>,
    rater: &RaterId,
    args: &RecordArgs,
) -> Result<AnnotationEvent, EngineError> {
    let mut session = AnnotationSession::new(rater.clone());
    session.present(args.signal)?;
    session.select_label(ws.parse_label(&args.label)?)?;
    session.set_comment(args.comment.clone())?;
    ws.confirm(&mut session)?;
    debug!(phase = %session.phase(), "session confirmed");
    Ok(session.advance()?)
}

pub fn run_record(args: &RecordArgs, globals: Globals<'_>, project_root: &Path) -> anyhow::Result<()> {
    let output = globals.output;
    let rater = globals.rater()?;
    let ws = open_workspace(project_root, output)?;

    let event = annotate(&ws, &rater, args).map_err(|err| fail(output, err))?;

    let remaining = ws.queue(&rater).map_err(|err| fail(output, err))?.len();
    let report = RecordReport { event, remaining };
    render_mode(
        output,
        &report,
        |r, w| {
            writeln!(
                w,
                "recorded\t{}\t{}\t{}",
                r.event.signal_id, r.event.rater_id, r.event.label
            )
        },
        |r, w| {
            pretty_section(w, &format!("Recorded signal {}", r.event.signal_id))?;
            pretty_kv(w, "Rater", r.event.rater_id.as_str())?;
            pretty_kv(w, "Label", r.event.label.as_str())?;
            if let Some(comment) = &r.event.comment {
                pretty_kv(w, "Comment", comment)?;
            }
            pretty_kv(w, "At", r.event.timestamp.to_rfc3339())?;
            pretty_kv(w, "Remaining", r.remaining.to_string())
        },
    )
}
