//! resale-price - experiment driver entry point

use clap::Parser;
use resale_price::cli::Cli;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resale_price=info".into()),
        )
        .init();

    let cli = Cli::parse();
    cli.command.run()
}
