use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use pasta_core::cluster::{ClusterStore, FalsePositives};
use pasta_core::config::PastaConfig;
use pasta_core::corpus::PatchSnapshot;
use pasta_core::evaluate::EvaluationResult;
use pasta_core::rating::{
    ConsoleDecisions, DecisionSource, RatingSession, ScriptedDecisions, SessionReport,
};

use super::GlobalOpts;

#[derive(Args, Debug)]
pub struct RateArgs {
    /// Evaluation result to rate (default: the configured evaluation path)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Apply automatic decisions only and skip every borderline pair
    #[arg(long)]
    pub non_interactive: bool,
}

pub fn run(args: RateArgs, global: &GlobalOpts) -> anyhow::Result<()> {
    let config = super::load_config(global)?;
    let input = args.input.unwrap_or_else(|| config.paths.evaluation.clone());
    let result = EvaluationResult::load(&input)
        .with_context(|| format!("Cannot load evaluation result {}", input.display()))?;

    let snapshot = super::load_snapshot(&config.paths.snapshot)?;
    let mut store = super::load_clusters(&config.paths.clusters, false)?;
    snapshot.seed_store(&mut store);
    let mut false_positives = super::load_false_positives(&config.paths.false_positives)?;

    let report = rate_interactively(
        &config,
        &snapshot,
        &mut store,
        &mut false_positives,
        &result,
        args.non_interactive,
    )?;
    finish(&config, &mut store, &false_positives, &report, global)
}

/// Drive a rating session on stdin/stdout, or non-interactively.
pub fn rate_interactively(
    config: &PastaConfig,
    snapshot: &PatchSnapshot,
    store: &mut ClusterStore,
    false_positives: &mut FalsePositives,
    result: &EvaluationResult,
    non_interactive: bool,
) -> anyhow::Result<SessionReport> {
    let mut scripted = ScriptedDecisions::default();
    let mut console = ConsoleDecisions::new(std::io::stdin().lock(), std::io::stdout().lock());
    let decisions: &mut dyn DecisionSource = if non_interactive {
        &mut scripted
    } else {
        &mut console
    };

    RatingSession::new(store, false_positives, snapshot, config.thresholds)
        .check_commit_date(config.analysis.check_commit_date)
        .run(result, decisions)
        .context("Rating session failed")
}

/// Print the summary and persist unless the session was discarded.
pub fn finish(
    config: &PastaConfig,
    store: &mut ClusterStore,
    false_positives: &FalsePositives,
    report: &SessionReport,
    global: &GlobalOpts,
) -> anyhow::Result<()> {
    if report.end.should_persist() {
        super::persist(config, store, false_positives)?;
    }
    if !global.quiet {
        print!("{}", report.summary);
        println!("Session {}.", report.end);
    }
    Ok(())
}
