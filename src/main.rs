use blackbox::cli::{Cli, Commands};
use blackbox::commands;
use blackbox::config::ClientConfig;
use blackbox::logging;
use clap::Parser;
use dotenv::dotenv;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    let cli = Cli::parse();

    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = logging::init_tracing(&cli.verbose, cli.log_file.as_deref())?;

    let mut config = ClientConfig::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);

    match cli.command {
        Commands::Run {
            health_port,
            duration,
            ..
        } => commands::run_client(config, health_port, duration).await?,
        Commands::ShowConfig => commands::show_config(&config)?,
    }

    Ok(())
}
