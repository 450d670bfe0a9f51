use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, ValueEnum};

use super::GlobalOpts;

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: Format,

    /// Write to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum Format {
    /// The cluster file format: `downstream... => upstream...`
    Text,
    /// One object per cluster with `downstream` and `upstream` arrays
    Json,
}

pub fn run(args: ExportArgs, global: &GlobalOpts) -> anyhow::Result<()> {
    let config = super::load_config(global)?;
    let mut store = super::load_clusters(&config.paths.clusters, true)?;
    store.optimize();

    let rendered = match args.format {
        Format::Text => store.to_text(),
        Format::Json => {
            let clusters: Vec<serde_json::Value> = store
                .iter_split()
                .map(|(downstream, upstream)| {
                    serde_json::json!({
                        "downstream": downstream,
                        "upstream": upstream,
                    })
                })
                .collect();
            let mut text = serde_json::to_string_pretty(&clusters)?;
            text.push('\n');
            text
        }
    };

    match args.output {
        Some(path) => std::fs::write(&path, rendered)
            .with_context(|| format!("Cannot write {}", path.display()))?,
        None => print!("{rendered}"),
    }
    Ok(())
}
