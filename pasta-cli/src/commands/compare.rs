use anyhow::Context;
use clap::Args;

use pasta_core::corpus::PatchProvider;
use pasta_core::similarity::rate;

use super::GlobalOpts;

#[derive(Args, Debug)]
pub struct CompareArgs {
    /// First patch id
    pub original: String,
    /// Second patch id
    pub candidate: String,

    /// Print the rating as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: CompareArgs, global: &GlobalOpts) -> anyhow::Result<()> {
    let config = super::load_config(global)?;
    let snapshot = super::load_snapshot(&config.paths.snapshot)?;

    let lhs = snapshot
        .require(&args.original)
        .context("Cannot compare")?;
    let rhs = snapshot
        .require(&args.candidate)
        .context("Cannot compare")?;

    let thresholds = &config.thresholds;
    let rating = rate(thresholds, &super::scorer(&config), lhs, rhs);
    let combined = rating.combined(thresholds.message_diff_weight);
    let verdict = if rating.diff_lines_ratio < thresholds.diff_lines_ratio {
        "skip (diff size ratio)"
    } else if combined >= thresholds.autoaccept {
        "accept"
    } else if combined < thresholds.interactive {
        "decline"
    } else {
        "review"
    };

    if args.json {
        let value = serde_json::json!({
            "original": args.original,
            "candidate": args.candidate,
            "rating": rating,
            "combined": combined,
            "verdict": verdict,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{} vs {}", args.original, args.candidate);
        println!("  {rating}");
        println!("  combined={combined:.3} → {verdict}");
    }
    Ok(())
}
