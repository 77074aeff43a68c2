//! `ecgl catalog`: load the configured signal CSV and report what made it in.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Args;
use serde::Serialize;

use crate::cmd::{load_config, load_dataset};
use crate::output::{OutputMode, pretty_kv, pretty_rule, pretty_section, render_mode};

#[derive(Args, Debug, Default)]
pub struct CatalogArgs {
    /// List every loaded signal, not just the totals.
    #[arg(long)]
    pub list: bool,
}

#[derive(Debug, Serialize)]
struct CatalogReport {
    source: PathBuf,
    signals: usize,
    skipped: usize,
    warnings: Vec<WarningRow>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    entries: Vec<SignalRow>,
}

#[derive(Debug, Serialize)]
struct WarningRow {
    row: usize,
    identifier: String,
    skipped: bool,
    error: String,
}

#[derive(Debug, Serialize)]
struct SignalRow {
    id: i64,
    samples: usize,
    duration_seconds: f64,
    heart_rate: f64,
}

pub fn run_catalog(args: &CatalogArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let config = load_config(project_root, output)?;
    let load = load_dataset(&config, output)?;

    let entries = if args.list {
        load.catalog
            .iter()
            .map(|signal| SignalRow {
                id: signal.id.get(),
                samples: signal.samples.len(),
                duration_seconds: signal.duration_seconds(),
                heart_rate: signal.reference_heart_rate,
            })
            .collect()
    } else {
        Vec::new()
    };

    let report = CatalogReport {
        source: config.signals_path.clone(),
        signals: load.catalog.len(),
        skipped: load.skipped_rows(),
        warnings: load
            .warnings
            .iter()
            .map(|w| WarningRow {
                row: w.row_index,
                identifier: w.identifier.clone(),
                skipped: w.skipped,
                error: w.error.to_string(),
            })
            .collect(),
        entries,
    };

    render_mode(output, &report, render_catalog_text, render_catalog_pretty)
}

fn render_catalog_text(report: &CatalogReport, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "signals\t{}\tskipped\t{}", report.signals, report.skipped)?;
    for warning in &report.warnings {
        let action = if warning.skipped { "skipped" } else { "loaded" };
        writeln!(
            w,
            "warning\t{}\t{}\t{action}\t{}",
            warning.row, warning.identifier, warning.error
        )?;
    }
    for entry in &report.entries {
        writeln!(
            w,
            "{}\t{}\t{:.1}\t{:.0}",
            entry.id, entry.samples, entry.duration_seconds, entry.heart_rate
        )?;
    }
    Ok(())
}

fn render_catalog_pretty(report: &CatalogReport, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, "Signal catalog")?;
    pretty_kv(w, "Source", report.source.display().to_string())?;
    pretty_kv(w, "Signals", report.signals.to_string())?;
    pretty_kv(w, "Skipped rows", report.skipped.to_string())?;

    if !report.warnings.is_empty() {
        writeln!(w)?;
        pretty_section(w, "Row warnings")?;
        for warning in &report.warnings {
            let action = if warning.skipped { "skipped" } else { "kept" };
            writeln!(
                w,
                "  row {:<5} {:<10} {action:<8} {}",
                warning.row, warning.identifier, warning.error
            )?;
        }
    }

    if !report.entries.is_empty() {
        writeln!(w)?;
        writeln!(w, "{:<10} {:>8} {:>9} {:>6}", "ID", "SAMPLES", "SECONDS", "HR")?;
        pretty_rule(w)?;
        for entry in &report.entries {
            writeln!(
                w,
                "{:<10} {:>8} {:>9.1} {:>6.0}",
                entry.id, entry.samples, entry.duration_seconds, entry.heart_rate
            )?;
        }
    }
    Ok(())
}
