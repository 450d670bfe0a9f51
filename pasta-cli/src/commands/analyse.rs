use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, ValueEnum};
use tracing::info;

use pasta_core::evaluate::{AnalysisMode, EvaluationResult, analyse};

use super::GlobalOpts;

#[derive(Args, Debug)]
pub struct AnalyseArgs {
    /// What to compare against what
    #[arg(value_enum)]
    pub mode: Mode,

    /// Write the result here instead of the configured evaluation path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Merge into an existing result instead of replacing it
    #[arg(long)]
    pub merge: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum Mode {
    /// Every stack against its successor stack
    Succ,
    /// Cluster representatives against each other
    Rep,
    /// Cluster representatives against upstream patches
    Upstream,
}

impl From<Mode> for AnalysisMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Succ => Self::Succ,
            Mode::Rep => Self::Rep,
            Mode::Upstream => Self::Upstream,
        }
    }
}

pub fn run(args: AnalyseArgs, global: &GlobalOpts) -> anyhow::Result<()> {
    let config = super::load_config(global)?;
    super::configure_workers(&config);

    let snapshot = super::load_snapshot(&config.paths.snapshot)?;
    let mut store = super::load_clusters(&config.paths.clusters, false)?;
    let added = snapshot.seed_store(&mut store);
    info!(added, clusters = store.len(), "Cluster store seeded from snapshot");

    let mode = AnalysisMode::from(args.mode);
    let progress = super::reporter(global);
    let mut result = analyse(
        mode,
        &snapshot,
        &store,
        &config.thresholds,
        &super::scorer(&config),
        progress.as_ref(),
    );

    let output = args.output.unwrap_or_else(|| config.paths.evaluation.clone());
    if args.merge && output.exists() {
        let mut previous = EvaluationResult::load(&output)
            .with_context(|| format!("Cannot load evaluation result {}", output.display()))?;
        previous.merge(result);
        result = previous;
    }
    result
        .save(&output)
        .with_context(|| format!("Cannot write evaluation result {}", output.display()))?;

    if !global.quiet {
        println!(
            "{mode}: {} pairs for {} patches written to {}",
            result.candidate_count(),
            result.len(),
            output.display()
        );
    }
    Ok(())
}
