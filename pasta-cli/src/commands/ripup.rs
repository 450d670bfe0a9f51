use std::collections::BTreeSet;

use clap::Args;
use tracing::{info, warn};

use pasta_core::evaluate::{EvaluationType, evaluate};
use pasta_core::preselect::{preselect, retain_forward_pairs};
use pasta_core::types::PatchId;

use super::GlobalOpts;
use super::rate::{finish, rate_interactively};

#[derive(Args, Debug)]
pub struct RipupArgs {
    /// Any member of each cluster to dissolve
    #[arg(required = true)]
    pub ids: Vec<String>,

    /// Apply automatic decisions only and skip every borderline pair
    #[arg(long)]
    pub non_interactive: bool,
}

pub fn run(args: RipupArgs, global: &GlobalOpts) -> anyhow::Result<()> {
    let config = super::load_config(global)?;
    super::configure_workers(&config);

    let snapshot = super::load_snapshot(&config.paths.snapshot)?;
    let mut store = super::load_clusters(&config.paths.clusters, true)?;
    let mut false_positives = super::load_false_positives(&config.paths.false_positives)?;

    let mut members: BTreeSet<PatchId> = BTreeSet::new();
    for id in &args.ids {
        let ripped = store.ripup_cluster(id);
        if ripped.is_empty() {
            warn!(id = %id, "Not tracked, nothing to rip up");
        }
        members.extend(ripped);
    }
    if members.is_empty() {
        anyhow::bail!("None of the given patches were found in the cluster store");
    }
    info!(members = members.len(), "Clusters dissolved");

    let members: Vec<PatchId> = members.into_iter().collect();
    let scorer = super::scorer(&config);
    let progress = super::reporter(global);
    let mut candidates = preselect(
        &snapshot,
        &members,
        &members,
        &config.thresholds,
        &scorer,
        progress.as_ref(),
    );
    retain_forward_pairs(&mut candidates);
    let result = evaluate(
        &snapshot,
        &candidates,
        &config.thresholds,
        &scorer,
        EvaluationType::PatchStack,
        progress.as_ref(),
    );

    let report = rate_interactively(
        &config,
        &snapshot,
        &mut store,
        &mut false_positives,
        &result,
        args.non_interactive,
    )?;
    if !global.quiet {
        println!("Re-rated {} members of {} clusters.", members.len(), args.ids.len());
    }
    finish(&config, &mut store, &false_positives, &report, global)
}
