use anyhow::Result;
use clap::Parser;
use codecloak_cli::cli::{self, Cli, Commands};
use codecloak_cli::logger;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init_logging(cli.log_json);

    match cli.command {
        Commands::Obfuscate(args) => cli::obfuscate_command(args).await,
        Commands::Presets { preset, config } => cli::presets_command(preset, config),
    }
}
