use anyhow::{Context as _, Result};
use clap::Args;
use ecglabel_core::config::{self, PROJECT_DIR};
use ecglabel_core::store::{LogOptions, LogRecordStore};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite the config of an existing `.ecglabel/` directory.
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
struct InitOutput {
    project_dir: PathBuf,
    config: PathBuf,
    log: PathBuf,
    reinitialized: bool,
}

/// Execute `ecgl init`. Creates the project skeleton:
///
/// ```text
/// .ecglabel/
///   config.toml        (default roster, labels and strip layout)
///   annotations.log    (versioned header, no records)
/// ```
///
/// An existing annotation log is kept as is, even with `--force`.
///
/// # Errors
///
/// Returns an error if `.ecglabel/` already exists and `--force` is not set,
/// or if any filesystem operation fails.
pub fn run_init(args: &InitArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let project_dir = project_root.join(PROJECT_DIR);
    let reinitialized = project_dir.exists();
    if reinitialized && !args.force {
        anyhow::bail!("{PROJECT_DIR}/ already exists. Use `ecgl init --force` to reinitialize.");
    }

    std::fs::create_dir_all(&project_dir)
        .with_context(|| format!("Failed to create {}", project_dir.display()))?;

    let config_path = config::config_path(project_root);
    std::fs::write(&config_path, config::default_config_toml()?)
        .with_context(|| format!("Failed to write config: {}", config_path.display()))?;

    let defaults = config::ProjectConfig::default();
    let log_path = project_dir.join(&defaults.store.log);
    LogRecordStore::new(&log_path, LogOptions::default())
        .init()
        .with_context(|| format!("Failed to create log: {}", log_path.display()))?;

    let report = InitOutput {
        project_dir,
        config: config_path,
        log: log_path,
        reinitialized,
    };
    render_mode(
        output,
        &report,
        |r, w| writeln!(w, "initialized\t{}", r.project_dir.display()),
        |r, w| {
            pretty_section(w, "Initialized ecglabel project")?;
            pretty_kv(w, "Config", r.config.display().to_string())?;
            pretty_kv(w, "Log", r.log.display().to_string())?;
            writeln!(w)?;
            writeln!(w, "Next steps:")?;
            writeln!(w, "  Point [dataset] signals at your CSV export, then:")?;
            writeln!(w, "    ecgl catalog")?;
            writeln!(w, "    ecgl --rater user1 next")
        },
    )
}
