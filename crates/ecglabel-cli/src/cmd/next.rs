//! `ecgl next`: the signal a rater should look at now.
//!
//! Classifiers are offered the earliest unclassified signal in their
//! assignment; reviewers the earliest conflict they have not reviewed.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Args;
use ecglabel_core::model::{RaterId, RaterRole, SignalId, SignalMetadata};
use ecglabel_core::render::RenderOutcome;
use serde::Serialize;
use tracing::warn;

use crate::cmd::{Globals, open_workspace};
use crate::output::{fail, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug, Default)]
pub struct NextArgs {
    /// Also render the strip to this PNG file.
    #[arg(long, value_name = "PATH")]
    pub png: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct NextReport {
    rater: RaterId,
    role: RaterRole,
    remaining: usize,
    signal: Option<NextSignal>,
}

#[derive(Debug, Serialize)]
struct NextSignal {
    id: SignalId,
    heart_rate: f64,
    samples: usize,
    duration_seconds: f64,
    #[serde(skip_serializing_if = "SignalMetadata::is_empty")]
    metadata: SignalMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    png: Option<PathBuf>,
}

pub fn run_next(args: &NextArgs, globals: Globals<'_>, project_root: &Path) -> anyhow::Result<()> {
    let output = globals.output;
    let rater = globals.rater()?;
    let ws = open_workspace(project_root, output)?;
    let role = ws.role(&rater).map_err(|err| fail(output, err))?;
    let queue = ws.queue(&rater).map_err(|err| fail(output, err))?;

    let signal = match queue.first() {
        None => None,
        Some(&id) => {
            let signal = ws.catalog().get(id).map_err(|err| fail(output, err))?;
            let png = match &args.png {
                None => None,
                Some(path) => match ws.render(id).map_err(|err| fail(output, err))? {
                    RenderOutcome::Rendered(strip) => {
                        strip.save_png(path).map_err(|err| fail(output, err))?;
                        Some(path.clone())
                    }
                    RenderOutcome::Empty { signal_id } => {
                        warn!(%signal_id, "nothing to draw; no PNG written");
                        None
                    }
                },
            };
            Some(NextSignal {
                id,
                heart_rate: signal.reference_heart_rate,
                samples: signal.samples.len(),
                duration_seconds: signal.duration_seconds(),
                metadata: signal.metadata.clone(),
                png,
            })
        }
    };

    let report = NextReport {
        rater,
        role,
        remaining: queue.len(),
        signal,
    };
    render_mode(output, &report, render_next_text, render_next_pretty)
}

fn render_next_text(report: &NextReport, w: &mut dyn Write) -> std::io::Result<()> {
    match &report.signal {
        None => writeln!(w, "none\t{}\t{}", report.rater, report.role),
        Some(s) => writeln!(
            w,
            "{}\t{:.0}\t{}\t{}",
            s.id, s.heart_rate, report.remaining, report.role
        ),
    }
}

fn render_next_pretty(report: &NextReport, w: &mut dyn Write) -> std::io::Result<()> {
    let Some(signal) = &report.signal else {
        let what = match report.role {
            RaterRole::Classifier => "assigned signals",
            RaterRole::Reviewer => "conflicts",
        };
        return writeln!(w, "No {what} left for {}.", report.rater);
    };

    pretty_section(w, &format!("Signal {}", signal.id))?;
    pretty_kv(w, "Heart rate", format!("{:.0} bpm", signal.heart_rate))?;
    pretty_kv(
        w,
        "Length",
        format!("{} samples ({:.1} s)", signal.samples, signal.duration_seconds),
    )?;
    if let Some(bpm) = signal.metadata.mean_bpm {
        pretty_kv(w, "Mean BPM", format!("{bpm:.1}"))?;
    }
    if let Some(snr) = signal.metadata.snr_index {
        pretty_kv(w, "SNR index", format!("{snr:.2}"))?;
    }
    pretty_kv(
        w,
        "Queue",
        format!("{} left for {} ({})", report.remaining, report.rater, report.role),
    )?;
    if let Some(png) = &signal.png {
        pretty_kv(w, "Strip", png.display().to_string())?;
    }
    Ok(())
}
