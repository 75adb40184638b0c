//! Chatforms demo - serves the demo wizards over Slack.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chatforms_core::SetupOptions;
use chatforms_demo::{COMMANDS, Dispatcher};
use chatforms_slack::{SlackConfig, SlackPlatform};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Chatforms demo bot
#[derive(Parser)]
#[command(name = "chatforms-demo")]
#[command(about = "Serve the register, login and auth wizards over Slack")]
#[command(version)]
struct Args {
    /// TOML file with form options (timeouts, labels)
    #[arg(short, long, env = "CHATFORMS_OPTIONS")]
    options: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    json_logs: bool,
}

fn setup_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn load_options(path: Option<&PathBuf>) -> Result<SetupOptions> {
    let Some(path) = path else {
        return Ok(SetupOptions::default());
    };
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    SetupOptions::from_toml_str(&source)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(&args.log_level, args.json_logs);

    let options = load_options(args.options.as_ref())?;
    let config = SlackConfig::from_env().context("Failed to load Slack configuration")?;
    let platform = Arc::new(SlackPlatform::new(config)?);

    let shutdown = CancellationToken::new();
    let dispatcher = Dispatcher::new(platform.clone(), options);
    let serving = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { dispatcher.run(shutdown).await }
    });

    info!("Listening for {:?}. Press Ctrl+C to stop", COMMANDS);

    tokio::select! {
        result = platform.start() => {
            if let Err(e) = result {
                error!("Slack connection failed: {}", e);
            }
        }
        result = signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl+C")?;
            info!("Received Ctrl+C, shutting down");
        }
    }

    platform.shutdown();
    shutdown.cancel();
    serving.await.context("Dispatcher task panicked")?;

    info!("Demo stopped");
    Ok(())
}
