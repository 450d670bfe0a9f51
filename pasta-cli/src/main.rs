use std::path::PathBuf;

use clap::Parser;

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "pasta",
    version,
    about = "Cluster patches across stacks, mailing lists and upstream"
)]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,

    /// Path to pasta.toml (default: ./pasta.toml, optional)
    #[arg(short, long, global = true, env = "PASTA_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,
}

/// Classify an error into a process exit code.
///
///   0 — success
///   1 — general/unknown error
///   2 — configuration error
///   3 — missing input file (snapshot, cluster file, evaluation result)
///   4 — corrupted cluster file
fn classify_exit_code(err: &anyhow::Error) -> i32 {
    let msg = format!("{err:#}");
    let lower = msg.to_lowercase();

    if lower.contains("malformed cluster line") {
        4 // corrupted cluster file
    } else if lower.contains("config") || lower.contains("threshold") {
        2 // config error
    } else if lower.contains("not found") || lower.contains("no such file") {
        3 // missing input
    } else {
        1 // general error
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    let filter = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (_, 0) => "warn",
        (_, 1) => "info",
        (_, 2) => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let global = commands::GlobalOpts {
        config: cli.config,
        quiet: cli.quiet,
    };

    match commands::run(cli.command, &global) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(classify_exit_code(&e));
        }
    }
}
