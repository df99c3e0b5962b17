mod metrics;
mod pretty;

use metrics::Metrics;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "telemetry-admin")]
#[command(about = "CLI for inspecting telemetry exposed by cluster hosts", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "List available metric types and query their current values")]
    Metrics(Metrics),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so table and json output stay clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Metrics(metrics) => metrics::handle_command(metrics).await,
    }
}
