//! Phoenix task board entry point.

use clap::Parser;

use phoenix_board::cli::{handle_error, load_config, Cli, Commands};
use phoenix_board::infrastructure::LoggerImpl;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli.command, cli.config.as_deref(), cli.json).await {
        handle_error(err, cli.json);
    }
}

async fn run(command: Commands, config_path: Option<&std::path::Path>, json_mode: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    match command {
        Commands::Config => phoenix_board::cli::commands::config::execute(&config, json_mode),
        Commands::Migrate => {
            let _logger = LoggerImpl::init(&config.logging)?;
            phoenix_board::cli::commands::migrate::execute(&config, json_mode).await
        }
        Commands::Serve(args) => {
            let _logger = LoggerImpl::init(&config.logging)?;
            phoenix_board::cli::commands::serve::execute(args, config).await
        }
    }
}
