//! Skiff CLI entry point.

use anyhow::Result;
use clap::Parser;
use skiff::cli::{commands, Cli, Commands};
use skiff::config::Settings;
use skiff::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.as_deref().map(Settings::expand_path);
    let settings = Settings::load_from(config_path.as_deref())?;

    // Initialize logging
    let log_level = match cli.verbose {
        0 => settings.general.log_level.clone(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("skiff={}", log_level)),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let command = cli.command.unwrap_or(Commands::Chat {
        provider: None,
        model: None,
        resume: None,
    });

    match command {
        Commands::Chat {
            provider,
            model,
            resume,
        } => {
            commands::run_chat(Runtime::new(settings)?, provider, model, resume).await?;
        }

        Commands::Ask {
            question,
            provider,
            model,
        } => {
            commands::run_ask(&question, provider, model, Runtime::new(settings)?).await?;
        }

        Commands::Providers => {
            commands::run_providers(&settings)?;
        }

        Commands::Tools => {
            commands::run_tools()?;
        }

        Commands::Sessions { action } => {
            commands::run_sessions(&action, &Runtime::new(settings)?).await?;
        }

        Commands::Config { action } => {
            commands::run_config(&action, settings, config_path.as_deref())?;
        }

        Commands::Doctor => {
            let path = config_path.unwrap_or_else(Settings::default_config_path);
            commands::run_doctor(&settings, &path)?;
        }
    }

    Ok(())
}

