//! `ecgl conflicts`: signals on which the quorum disagreed.

use std::io::Write;
use std::path::Path;

use clap::Args;
use ecglabel_core::conflict::{AgreementSummary, ConflictRecord};
use ecglabel_core::ledger::{RepeatedVote, VotePolicy};
use ecglabel_core::model::RaterId;
use serde::Serialize;

use crate::cmd::open_workspace;
use crate::output::{OutputMode, fail, pretty_kv, pretty_rule, pretty_section, render_mode};

#[derive(Args, Debug, Default)]
pub struct ConflictsArgs {}

#[derive(Debug, Serialize)]
struct ConflictsReport {
    quorum: Vec<RaterId>,
    vote_policy: VotePolicy,
    agreement: AgreementSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    agreement_ratio: Option<f64>,
    conflicts: Vec<ConflictRecord>,
    repeated_votes: Vec<RepeatedVote>,
}

pub fn run_conflicts(
    _args: &ConflictsArgs,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let ws = open_workspace(project_root, output)?;
    let conflicts = ws.conflicts().map_err(|err| fail(output, err))?;
    let agreement = ws.agreement().map_err(|err| fail(output, err))?;
    let repeated_votes = ws.repeated_votes().map_err(|err| fail(output, err))?;

    let report = ConflictsReport {
        quorum: ws.config().quorum.clone(),
        vote_policy: ws.config().vote_policy,
        agreement,
        agreement_ratio: agreement.agreement_ratio(),
        conflicts,
        repeated_votes,
    };
    render_mode(output, &report, render_conflicts_text, render_conflicts_pretty)
}

fn votes_inline(record: &ConflictRecord) -> String {
    record
        .votes
        .iter()
        .map(|(rater, label)| format!("{rater}={label}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn render_conflicts_text(report: &ConflictsReport, w: &mut dyn Write) -> std::io::Result<()> {
    for record in &report.conflicts {
        writeln!(w, "{}\t{}", record.signal_id, votes_inline(record))?;
    }
    Ok(())
}

fn render_conflicts_pretty(report: &ConflictsReport, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, "Conflicts")?;
    let quorum: Vec<&str> = report.quorum.iter().map(RaterId::as_str).collect();
    pretty_kv(w, "Quorum", quorum.join(", "))?;
    pretty_kv(w, "Vote policy", report.vote_policy.as_str())?;
    let summary = &report.agreement;
    let ratio = report
        .agreement_ratio
        .map_or_else(|| "n/a".to_string(), |r| format!("{:.1}%", r * 100.0));
    pretty_kv(
        w,
        "Agreement",
        format!(
            "{}/{} signals ({ratio})",
            summary.agreed, summary.both_voted
        ),
    )?;
    if !report.repeated_votes.is_empty() {
        pretty_kv(
            w,
            "Repeated votes",
            format!(
                "{} rater/signal pairs ({} vote counts)",
                report.repeated_votes.len(),
                report.vote_policy
            ),
        )?;
    }

    if report.conflicts.is_empty() {
        writeln!(w)?;
        return writeln!(w, "No conflicts.");
    }

    writeln!(w)?;
    writeln!(w, "{:<10} VOTES", "SIGNAL")?;
    pretty_rule(w)?;
    for record in &report.conflicts {
        writeln!(w, "{:<10} {}", record.signal_id, votes_inline(record))?;
    }
    Ok(())
}
