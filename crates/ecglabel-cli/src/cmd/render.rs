//! `ecgl render`: draw any catalog signal as a clinical strip PNG.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Args;
use ecglabel_core::ErrorCode;
use ecglabel_core::model::SignalId;
use ecglabel_core::render::{RenderOutcome, StripGeometry};
use serde::Serialize;

use crate::cmd::open_workspace;
use crate::output::{CliError, OutputMode, fail, pretty_kv, pretty_section, render_error, render_mode};

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Signal to draw.
    #[arg(long, value_name = "ID")]
    pub signal: SignalId,

    /// Destination PNG file.
    #[arg(long, value_name = "PATH")]
    pub out: PathBuf,
}

#[derive(Debug, Serialize)]
struct RenderReport {
    signal_id: SignalId,
    path: PathBuf,
    geometry: StripGeometry,
}

pub fn run_render(args: &RenderArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let ws = open_workspace(project_root, output)?;
    let strip = match ws.render(args.signal).map_err(|err| fail(output, err))? {
        RenderOutcome::Rendered(strip) => strip,
        RenderOutcome::Empty { signal_id } => {
            let msg = format!("signal {signal_id} has no finite samples to draw");
            render_error(
                output,
                &CliError::coded(&msg, ErrorCode::RenderFailed)
                    .suggest("Check the amplitude column for this signal in the dataset."),
            )?;
            anyhow::bail!(msg);
        }
    };
    strip.save_png(&args.out).map_err(|err| fail(output, err))?;

    let report = RenderReport {
        signal_id: strip.signal_id,
        path: args.out.clone(),
        geometry: strip.geometry,
    };
    render_mode(
        output,
        &report,
        |r, w| {
            writeln!(
                w,
                "{}\t{}\t{}x{}",
                r.signal_id,
                r.path.display(),
                r.geometry.width_px,
                r.geometry.height_px
            )
        },
        |r, w| {
            let g = &r.geometry;
            pretty_section(w, &format!("Strip for signal {}", r.signal_id))?;
            pretty_kv(w, "File", r.path.display().to_string())?;
            pretty_kv(w, "Image", format!("{} x {} px", g.width_px, g.height_px))?;
            pretty_kv(
                w,
                "Rows",
                format!(
                    "{} x {:.0} mm ({:.0} mm of trace)",
                    g.row_count, g.row_width_mm, g.trace_length_mm
                ),
            )?;
            pretty_kv(w, "Samples", g.samples_drawn.to_string())
        },
    )
}
