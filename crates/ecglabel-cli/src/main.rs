#![forbid(unsafe_code)]

mod cmd;
mod output;
mod rater;

use clap::{Parser, Subcommand};
use ecglabel_core::config::{self, UserConfig};
use output::{OutputMode, resolve_output_mode};
use std::env;
use tracing::{debug, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::cmd::Globals;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "ecgl: multi-rater ECG strip annotation",
    long_about = None
)]
struct Cli {
    /// Emit JSON output (same as `--format json`).
    #[arg(long, global = true)]
    json: bool,

    /// Output format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Act as this rater (overrides `ECGLABEL_RATER`).
    #[arg(long, global = true)]
    rater: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Initialize an ecglabel project",
        long_about = "Create .ecglabel/ with a default config.toml and an empty annotation log.",
        after_help = "EXAMPLES:\n    # Initialize in the current directory\n    ecgl init\n\n    # Rewrite the config, keeping recorded annotations\n    ecgl init --force"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Read",
        about = "Load the signal CSV and report it",
        long_about = "Load the configured signal CSV, reporting the signal count and every skipped or degraded row.",
        after_help = "EXAMPLES:\n    # Totals and row warnings\n    ecgl catalog\n\n    # Every loaded signal\n    ecgl catalog --list"
    )]
    Catalog(cmd::catalog::CatalogArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show each classifier's assigned signals",
        after_help = "EXAMPLES:\n    ecgl assign\n    ecgl assign --json"
    )]
    Assign(cmd::assign::AssignArgs),

    #[command(
        next_help_heading = "Annotate",
        about = "Show the next signal for a rater",
        long_about = "Show the next signal in the rater's queue: unclassified assigned signals for classifiers, unreviewed conflicts for reviewers.",
        after_help = "EXAMPLES:\n    # Next signal for user1, with a strip image\n    ecgl --rater user1 next --png strip.png"
    )]
    Next(cmd::next::NextArgs),

    #[command(
        next_help_heading = "Annotate",
        about = "Label a signal",
        long_about = "Record one annotation for the acting rater. Classifiers may only label their assigned signals.",
        after_help = "EXAMPLES:\n    ecgl --rater user1 record --signal 201 --label normal\n    ecgl --rater user3 record --signal 201 --label noisy --comment \"baseline wander\""
    )]
    Record(cmd::record::RecordArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show annotation progress",
        after_help = "EXAMPLES:\n    ecgl --rater user1 progress\n    ecgl progress --all"
    )]
    Progress(cmd::progress::ProgressArgs),

    #[command(
        next_help_heading = "Read",
        about = "List signals the quorum disagreed on",
        after_help = "EXAMPLES:\n    ecgl conflicts\n    ecgl conflicts --json"
    )]
    Conflicts(cmd::conflicts::ConflictsArgs),

    #[command(
        next_help_heading = "Read",
        about = "Render a signal as a strip PNG",
        after_help = "EXAMPLES:\n    ecgl render --signal 201 --out 201.png"
    )]
    Render(cmd::render::RenderArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("ECGLABEL_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "ecglabel_core=debug,ecgl=debug,info"
        } else {
            "ecglabel_core=info,ecgl=info,warn"
        })
    });

    let format = env::var("ECGLABEL_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let user = config::load_user_config().unwrap_or_else(|err| {
        warn!("ignoring user config: {err:#}");
        UserConfig::default()
    });
    let output = resolve_output_mode(cli.format, cli.json, user.output.as_deref());

    let project_root = env::current_dir()?;
    let globals = Globals {
        output,
        rater_flag: cli.rater.as_deref(),
        default_rater: user.rater.as_ref(),
    };
    debug!(?output, root = %project_root.display(), "dispatching command");

    match &cli.command {
        Commands::Init(args) => cmd::init::run_init(args, output, &project_root),
        Commands::Catalog(args) => cmd::catalog::run_catalog(args, output, &project_root),
        Commands::Assign(args) => cmd::assign::run_assign(args, output, &project_root),
        Commands::Next(args) => cmd::next::run_next(args, globals, &project_root),
        Commands::Record(args) => cmd::record::run_record(args, globals, &project_root),
        Commands::Progress(args) => cmd::progress::run_progress(args, globals, &project_root),
        Commands::Conflicts(args) => cmd::conflicts::run_conflicts(args, output, &project_root),
        Commands::Render(args) => cmd::render::run_render(args, output, &project_root),
    }
}
