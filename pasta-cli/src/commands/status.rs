use clap::Args;

use pasta_core::evaluate::EvaluationResult;

use super::GlobalOpts;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Also list the largest clusters
    #[arg(long, default_value_t = 0)]
    pub top: usize,
}

pub fn run(args: StatusArgs, global: &GlobalOpts) -> anyhow::Result<()> {
    let config = super::load_config(global)?;
    let paths = &config.paths;
    let store = super::load_clusters(&paths.clusters, true)?;
    let false_positives = super::load_false_positives(&paths.false_positives)?;

    let (mut mixed, mut downstream_only, mut upstream_only) = (0usize, 0usize, 0usize);
    for (down, up) in store.iter_split() {
        match (down.is_empty(), up.is_empty()) {
            (false, false) => mixed += 1,
            (false, true) => downstream_only += 1,
            (true, false) => upstream_only += 1,
            (true, true) => {}
        }
    }

    println!("PaStA status for {}", paths.clusters.display());
    println!();
    println!("  Patches:  {} tracked", store.id_count());
    println!("    {:<20} {:>8}", "upstream", store.get_upstream(None).len());
    println!("    {:<20} {:>8}", "downstream", store.get_downstream(None).len());
    println!();
    println!("  Clusters: {} total", store.len());
    println!("    {:<20} {:>8}", "with upstream", mixed);
    println!("    {:<20} {:>8}", "downstream only", downstream_only);
    println!("    {:<20} {:>8}", "upstream only", upstream_only);
    println!();
    println!("  False positives: {}", false_positives.len());

    if paths.evaluation.exists() {
        match EvaluationResult::load(&paths.evaluation) {
            Ok(result) => println!(
                "  Evaluation:      {} pairs ({})",
                result.candidate_count(),
                result.eval_type
            ),
            Err(e) => println!("  Evaluation:      unreadable ({e})"),
        }
    } else {
        println!("  Evaluation:      none");
    }

    if args.top > 0 {
        let mut clusters: Vec<_> = store.clusters().collect();
        clusters.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.first().cmp(&b.first())));
        println!();
        println!("  Largest clusters:");
        for cluster in clusters.into_iter().take(args.top) {
            let rep = cluster.first().map_or("", |id| id.as_str());
            println!("    {rep:<40} {:>6}", cluster.len());
        }
    }

    Ok(())
}
