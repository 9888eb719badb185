//! Waprov CLI binary entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;
use waprov::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("waprov=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Session(args) => waprov::cli::commands::handle_session(args.command).await,
        Commands::Instances(args) => waprov::cli::commands::handle_instances(args.command).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
