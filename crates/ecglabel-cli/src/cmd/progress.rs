//! `ecgl progress`: how far a rater (or everyone) has got.

use std::io::Write;
use std::path::Path;

use clap::Args;
use ecglabel_core::Status;
use serde::Serialize;

use crate::cmd::{Globals, open_workspace};
use crate::output::{fail, pretty_section, render_mode};

#[derive(Args, Debug, Default)]
pub struct ProgressArgs {
    /// Report every configured rater instead of the acting one.
    #[arg(long)]
    pub all: bool,
}

#[derive(Debug, Serialize)]
struct ProgressReport {
    raters: Vec<Status>,
}

pub fn run_progress(
    args: &ProgressArgs,
    globals: Globals<'_>,
    project_root: &Path,
) -> anyhow::Result<()> {
    let output = globals.output;
    let raters = if args.all {
        None
    } else {
        Some(globals.rater()?)
    };
    let ws = open_workspace(project_root, output)?;

    let raters = raters.map_or_else(|| ws.config().all_raters(), |r| vec![r]);
    let statuses = raters
        .iter()
        .map(|r| ws.status(r))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| fail(output, err))?;

    let report = ProgressReport { raters: statuses };
    render_mode(
        output,
        &report,
        |r, w| {
            for status in &r.raters {
                writeln!(w, "{}", status_line(status))?;
            }
            Ok(())
        },
        |r, w| {
            pretty_section(w, "Progress")?;
            for status in &r.raters {
                let (name, done, total) = counts(status);
                writeln!(w, "  {name:<12} {}  {}", bar(done, total), status_line(status))?;
            }
            Ok(())
        },
    )
}

fn counts(status: &Status) -> (&str, usize, usize) {
    match status {
        Status::Classifier(p) => (p.rater.as_str(), p.classified, p.assigned),
        Status::Reviewer { rater, progress } => (rater.as_str(), progress.reviewed, progress.total),
    }
}

fn status_line(status: &Status) -> String {
    match status {
        Status::Classifier(p) => {
            format!("{}\tSignals classified {}/{}", p.rater, p.classified, p.assigned)
        }
        Status::Reviewer { rater, progress } => format!(
            "{rater}\tConflict signals reviewed {}/{}",
            progress.reviewed, progress.total
        ),
    }
}

/// Fixed-width completion bar; an empty queue reads as full.
fn bar(done: usize, total: usize) -> String {
    const WIDTH: usize = 20;
    let filled = if total == 0 {
        WIDTH
    } else {
        (done.min(total) * WIDTH) / total
    };
    format!("[{}{}]", "#".repeat(filled), ".".repeat(WIDTH - filled))
}
