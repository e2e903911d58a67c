use clap::Parser;
use reaction_award::commands::{self, Output};
use reaction_award::{Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("reaction_award=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Award {
            year,
            post_channel,
            dry_run,
            json,
        } => {
            let output = if json {
                Output::Json
            } else if dry_run {
                Output::DryRun
            } else {
                Output::Post
            };
            commands::run_award(&cli.config, year, post_channel, output).await
        }
        Commands::Channels => commands::run_channels(&cli.config).await,
        Commands::Window { year } => commands::run_window(&cli.config, year),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
