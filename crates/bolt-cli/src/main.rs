mod commands;
mod executor;
mod input;
mod opts;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::classify::ClassifyArgs;
use commands::parse::ParseArgs;
use commands::patch::PatchArgs;
use commands::run::RunArgs;
use opts::GlobalOpts;

#[derive(Parser, Debug)]
#[command(name = "bolt", version, about = "Replay model output through the artifact pipeline")]
struct Cli {
    #[command(flatten)]
    opts: GlobalOpts,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract boltArtifact/boltAction blocks from a transcript
    Parse(ParseArgs),

    /// Find file and command blocks in free-form markdown
    Classify(ClassifyArgs),

    /// Apply SEARCH/REPLACE blocks to a file
    Patch(PatchArgs),

    /// Feed a transcript through the full pipeline
    Run(RunArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.opts);
    let opts = &cli.opts;

    match cli.command {
        Command::Parse(args) => commands::parse::cmd_parse(opts, &args),
        Command::Classify(args) => commands::classify::cmd_classify(opts, &args),
        Command::Patch(args) => commands::patch::cmd_patch(opts, &args),
        Command::Run(args) => commands::run::cmd_run(opts, &args).await,
    }
}

/// Logs go to stderr; `RUST_LOG` wins over `--log-level`.
fn setup_logging(opts: &GlobalOpts) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&opts.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .init();
}
