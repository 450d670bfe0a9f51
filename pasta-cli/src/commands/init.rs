use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use pasta_core::config::PastaConfig;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory to write pasta.toml into (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite an existing pasta.toml
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: InitArgs) -> anyhow::Result<()> {
    let target = args.path.join("pasta.toml");
    if target.exists() && !args.force {
        anyhow::bail!(
            "{} already exists. Use --force to overwrite.",
            target.display()
        );
    }

    std::fs::create_dir_all(&args.path)
        .with_context(|| format!("Cannot create directory {}", args.path.display()))?;
    let text = toml::to_string_pretty(&PastaConfig::default())
        .context("Cannot serialize default config")?;
    std::fs::write(&target, text)
        .with_context(|| format!("Cannot write {}", target.display()))?;

    println!("Wrote {}", target.display());
    Ok(())
}
