pub mod analyse;
pub mod compare;
pub mod export;
pub mod init;
pub mod rate;
pub mod ripup;
pub mod status;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Subcommand;
use tracing::debug;

use pasta_core::cluster::{ClusterStore, FalsePositives};
use pasta_core::config::PastaConfig;
use pasta_core::corpus::PatchSnapshot;
use pasta_core::progress::{BarReporter, NoopReporter, ProgressReporter};
use pasta_core::similarity::TokenSortRatio;

const DEFAULT_CONFIG: &str = "pasta.toml";

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a default pasta.toml
    Init(init::InitArgs),
    /// Pre-select and score candidate pairs
    Analyse(analyse::AnalyseArgs),
    /// Merge scored pairs into clusters, asking about borderline ones
    Rate(rate::RateArgs),
    /// Dissolve clusters and re-rate their members
    Ripup(ripup::RipupArgs),
    /// Score a single pair of patches
    Compare(compare::CompareArgs),
    /// Show cluster and false-positive statistics
    Status(status::StatusArgs),
    /// Print clusters as text or JSON
    Export(export::ExportArgs),
}

/// Options shared by every subcommand.
#[derive(Debug, Clone)]
pub struct GlobalOpts {
    pub config: Option<PathBuf>,
    pub quiet: bool,
}

pub fn run(cmd: Command, global: &GlobalOpts) -> anyhow::Result<()> {
    match cmd {
        Command::Init(args) => init::run(args),
        Command::Analyse(args) => analyse::run(args, global),
        Command::Rate(args) => rate::run(args, global),
        Command::Ripup(args) => ripup::run(args, global),
        Command::Compare(args) => compare::run(args, global),
        Command::Status(args) => status::run(args, global),
        Command::Export(args) => export::run(args, global),
    }
}

// ── Shared helpers ─────────────────────────────────────────────────

/// Load the config named on the command line, or `./pasta.toml` if present.
pub fn load_config(global: &GlobalOpts) -> anyhow::Result<PastaConfig> {
    let (path, required) = match &global.config {
        Some(path) => (path.clone(), true),
        None => (PathBuf::from(DEFAULT_CONFIG), false),
    };
    let config = PastaConfig::load(&path, required)
        .with_context(|| format!("Cannot load config {}", path.display()))?;
    debug!(path = %path.display(), thresholds = ?config.thresholds, "Configuration loaded");
    Ok(config)
}

pub fn load_snapshot(path: &Path) -> anyhow::Result<PatchSnapshot> {
    PatchSnapshot::load(path).with_context(|| format!("Cannot load snapshot {}", path.display()))
}

pub fn load_clusters(path: &Path, must_exist: bool) -> anyhow::Result<ClusterStore> {
    ClusterStore::from_file(path, must_exist)
        .with_context(|| format!("Cannot load clusters {}", path.display()))
}

pub fn load_false_positives(path: &Path) -> anyhow::Result<FalsePositives> {
    FalsePositives::load(path, false)
        .with_context(|| format!("Cannot load false positives {}", path.display()))
}

/// Write the store and false-positive memory back to their files.
pub fn persist(
    config: &PastaConfig,
    store: &mut ClusterStore,
    false_positives: &FalsePositives,
) -> anyhow::Result<()> {
    let paths = &config.paths;
    store
        .to_file(&paths.clusters)
        .with_context(|| format!("Cannot write clusters {}", paths.clusters.display()))?;
    false_positives
        .save(&paths.false_positives)
        .with_context(|| {
            format!(
                "Cannot write false positives {}",
                paths.false_positives.display()
            )
        })?;
    Ok(())
}

pub fn scorer(config: &PastaConfig) -> TokenSortRatio {
    TokenSortRatio::new(Duration::from_millis(config.analysis.scorer_timeout_ms))
}

pub fn reporter(global: &GlobalOpts) -> Box<dyn ProgressReporter> {
    if global.quiet {
        Box::new(NoopReporter)
    } else {
        Box::new(BarReporter::new())
    }
}

/// Size the global rayon pool. `0` keeps rayon's default.
pub fn configure_workers(config: &PastaConfig) {
    let workers = config.analysis.workers;
    if workers == 0 {
        return;
    }
    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build_global()
    {
        debug!(error = %e, "Worker pool already configured");
    }
}
