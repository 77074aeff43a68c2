//! Output layer shared by every command.
//!
//! A command builds one serializable report and hands it to [`render_mode`]
//! together with a text renderer (tab-separated rows for scripts) and a
//! pretty renderer (framed sections for people). JSON needs no renderer.
//!
//! The mode is picked by [`resolve_output_mode`], first match wins:
//! `--format`, then `--json`, then the `FORMAT` env var, then `output` in the
//! user config, then pretty on a terminal and text otherwise.

use clap::ValueEnum;
use ecglabel_core::{EngineError, ErrorCode};
use serde::Serialize;
use std::io::{self, IsTerminal, Write};

/// Width of the rule under pretty section headings.
pub const RULE_WIDTH: usize = 72;

pub fn pretty_rule(w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{}", "-".repeat(RULE_WIDTH))
}

pub fn pretty_section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}")?;
    pretty_rule(w)
}

/// One `key: value` line with the values lined up.
pub fn pretty_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    let key = format!("{key}:");
    writeln!(w, "{key:<14} {}", value.as_ref())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Framed sections for people at a terminal.
    Pretty,
    /// Tab-separated rows for scripts and pipes.
    Text,
    /// Pretty-printed JSON on stdout, JSON errors on stderr.
    Json,
}

impl OutputMode {
    fn parse_loose(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "text" | "plain" => Some(Self::Text),
            "pretty" | "human" => Some(Self::Pretty),
            _ => None,
        }
    }
}

fn pick_output_mode(
    format_flag: Option<OutputMode>,
    json_flag: bool,
    format_env: Option<&str>,
    user_output: Option<&str>,
    stdout_is_tty: bool,
) -> OutputMode {
    let from_flags = format_flag.or(json_flag.then_some(OutputMode::Json));
    let from_settings = || {
        format_env
            .and_then(OutputMode::parse_loose)
            .or_else(|| user_output.and_then(OutputMode::parse_loose))
    };
    let from_terminal = || {
        if stdout_is_tty {
            OutputMode::Pretty
        } else {
            OutputMode::Text
        }
    };
    from_flags.or_else(from_settings).unwrap_or_else(from_terminal)
}

/// Resolve the output mode for this invocation.
pub fn resolve_output_mode(
    format_flag: Option<OutputMode>,
    json_flag: bool,
    user_output: Option<&str>,
) -> OutputMode {
    let format_env = std::env::var("FORMAT").ok();
    pick_output_mode(
        format_flag,
        json_flag,
        format_env.as_deref(),
        user_output,
        io::stdout().is_terminal(),
    )
}

fn write_report<T: Serialize>(
    out: &mut dyn Write,
    mode: OutputMode,
    report: &T,
    text_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
    pretty_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut *out, report)?;
            writeln!(out)?;
        }
        OutputMode::Text => text_fn(report, out)?,
        OutputMode::Pretty => pretty_fn(report, out)?,
    }
    Ok(())
}

/// Write `report` to stdout in `mode`.
pub fn render_mode<T: Serialize>(
    mode: OutputMode,
    report: &T,
    text_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
    pretty_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let mut out = io::stdout().lock();
    write_report(&mut out, mode, report, text_fn, pretty_fn)
}

/// A failure as shown to the user: message, stable code, remediation.
#[derive(Debug, Serialize)]
pub struct CliError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl CliError {
    /// An error carrying `code` and its stock hint.
    pub fn coded(message: impl Into<String>, code: ErrorCode) -> Self {
        Self {
            message: message.into(),
            suggestion: code.hint().map(str::to_string),
            error_code: Some(code.code().to_string()),
        }
    }

    /// Replace the suggestion.
    #[must_use]
    pub fn suggest(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl From<&EngineError> for CliError {
    fn from(err: &EngineError) -> Self {
        Self::coded(err.to_string(), err.code())
    }
}

fn write_error(out: &mut dyn Write, mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    if mode == OutputMode::Json {
        serde_json::to_writer_pretty(&mut *out, &serde_json::json!({ "error": error }))?;
        writeln!(out)?;
        return Ok(());
    }

    let code = error
        .error_code
        .as_deref()
        .map(|c| format!("[{c}]"))
        .unwrap_or_default();
    writeln!(out, "error{code}: {}", error.message)?;
    if let Some(suggestion) = &error.suggestion {
        writeln!(out, "  hint: {suggestion}")?;
    }
    Ok(())
}

/// Write `error` to stderr in `mode`.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    let mut out = io::stderr().lock();
    write_error(&mut out, mode, error)
}

/// Show an engine error, then hand it back for `?` propagation.
pub fn fail(mode: OutputMode, err: EngineError) -> anyhow::Error {
    // A broken stderr must not mask the original failure.
    let _ = render_error(mode, &CliError::from(&err));
    err.into()
}
