//! `ecgl assign`: show which signals each classifier owns.

use std::io::Write;
use std::path::Path;

use clap::Args;
use ecglabel_core::model::{RaterId, SignalId};
use ecglabel_core::partition::PartitionScheme;
use serde::Serialize;

use crate::cmd::open_workspace;
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

/// Longest ID list printed inline in pretty mode.
const PRETTY_ID_PREVIEW: usize = 12;

#[derive(Args, Debug, Default)]
pub struct AssignArgs {}

#[derive(Debug, Serialize)]
struct AssignReport {
    scheme: PartitionScheme,
    signals: usize,
    raters: Vec<RaterRow>,
    reviewers: Vec<RaterId>,
}

#[derive(Debug, Serialize)]
struct RaterRow {
    rater: RaterId,
    count: usize,
    signals: Vec<SignalId>,
}

pub fn run_assign(_args: &AssignArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let ws = open_workspace(project_root, output)?;
    let assignment = ws.assignment();

    let report = AssignReport {
        scheme: assignment.scheme(),
        signals: ws.catalog().len(),
        raters: assignment
            .iter()
            .map(|a| RaterRow {
                rater: a.rater.clone(),
                count: a.signals.len(),
                signals: a.signals.clone(),
            })
            .collect(),
        reviewers: ws.config().reviewers.clone(),
    };

    render_mode(
        output,
        &report,
        |r, w| {
            for row in &r.raters {
                let ids: Vec<String> = row.signals.iter().map(ToString::to_string).collect();
                writeln!(w, "{}\t{}\t{}", row.rater, row.count, ids.join(","))?;
            }
            Ok(())
        },
        |r, w| {
            pretty_section(w, "Assignment")?;
            pretty_kv(w, "Scheme", r.scheme.as_str())?;
            pretty_kv(w, "Signals", r.signals.to_string())?;
            writeln!(w)?;
            for row in &r.raters {
                let mut ids: Vec<String> = row
                    .signals
                    .iter()
                    .take(PRETTY_ID_PREVIEW)
                    .map(ToString::to_string)
                    .collect();
                if row.count > PRETTY_ID_PREVIEW {
                    ids.push(format!("… +{}", row.count - PRETTY_ID_PREVIEW));
                }
                writeln!(w, "  {:<12} {:>6}  {}", row.rater, row.count, ids.join(" "))?;
            }
            if !r.reviewers.is_empty() {
                writeln!(w)?;
                let names: Vec<&str> = r.reviewers.iter().map(RaterId::as_str).collect();
                pretty_kv(w, "Reviewers", names.join(", "))?;
            }
            Ok(())
        },
    )
}
