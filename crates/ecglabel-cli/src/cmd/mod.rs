//! Command handlers plus the project loading they share.

pub mod assign;
pub mod catalog;
pub mod conflicts;
pub mod init;
pub mod next;
pub mod progress;
pub mod record;
pub mod render;

use std::path::Path;

use ecglabel_core::catalog::CatalogLoad;
use ecglabel_core::config::{self, PROJECT_DIR, ResolvedConfig};
use ecglabel_core::model::RaterId;
use ecglabel_core::source::CsvSignalSource;
use ecglabel_core::store::LogRecordStore;
use ecglabel_core::{ErrorCode, Workspace, load_catalog};
use tracing::warn;

use crate::output::{CliError, OutputMode, fail, render_error};
use crate::rater;

/// Flags every command sees.
#[derive(Debug, Clone, Copy)]
pub struct Globals<'a> {
    pub output: OutputMode,
    pub rater_flag: Option<&'a str>,
    pub default_rater: Option<&'a RaterId>,
}

impl Globals<'_> {
    /// Resolve the acting rater or report why there is none.
    pub fn rater(&self) -> anyhow::Result<RaterId> {
        rater::require_rater(self.rater_flag, self.default_rater).map_err(|e| {
            let _ = render_error(self.output, &e.to_cli_error());
            anyhow::Error::new(e)
        })
    }
}

/// Load and validate `.ecglabel/config.toml` under `project_root`.
pub fn load_config(project_root: &Path, output: OutputMode) -> anyhow::Result<ResolvedConfig> {
    if !project_root.join(PROJECT_DIR).is_dir() {
        let msg = format!("Not an ecglabel project: {PROJECT_DIR}/ not found");
        let _ = render_error(output, &CliError::coded(&msg, ErrorCode::NotInitialized));
        anyhow::bail!(msg);
    }

    let project = config::load_project_config(project_root).map_err(|err| {
        let _ = render_error(
            output,
            &CliError::coded(format!("{err:#}"), ErrorCode::ConfigParseError),
        );
        err
    })?;
    project
        .validate(project_root)
        .map_err(|err| fail(output, err))
}

/// Read the configured signal CSV into a catalog, logging row warnings.
pub fn load_dataset(config: &ResolvedConfig, output: OutputMode) -> anyhow::Result<CatalogLoad> {
    let source = CsvSignalSource::new(&config.signals_path);
    let load = load_catalog(&source, config).map_err(|err| fail(output, err))?;
    for warning in &load.warnings {
        warn!(
            row = warning.row_index,
            identifier = %warning.identifier,
            skipped = warning.skipped,
            "{}",
            warning.error
        );
    }
    Ok(load)
}

/// Open the project in `project_root` for querying and recording.
pub fn open_workspace(
    project_root: &Path,
    output: OutputMode,
) -> anyhow::Result<Workspace<LogRecordStore>> {
    let config = load_config(project_root, output)?;
    let load = load_dataset(&config, output)?;
    let store = LogRecordStore::new(&config.log_path, config.log);
    Workspace::open(config, load.catalog, store).map_err(|err| fail(output, err))
}
