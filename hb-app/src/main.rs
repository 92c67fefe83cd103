//! Hortabot: horticultural therapy advisor on Telegram.
//!
//! One binary, three long-running processes (`relay`, `gateway`, `bot`) plus
//! a `doctor` config check.

mod agents;
mod bot;
mod commands;
mod config;
mod error;
mod http_auth;
mod routes;
mod routine;
mod server;

use clap::{Parser, Subcommand};
use config::HortabotConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Debug, Parser)]
#[command(
    name = "hortabot",
    version,
    about = "Horticultural therapy advisor bot with Google Tasks integration"
)]
struct Cli {
    /// TOML config file. Defaults to ./hortabot.toml when present.
    #[arg(long, global = true, env = "HORTABOT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the instruction relay (POST /ia -> generation endpoint).
    Relay,
    /// Run the Google Tasks gateway (OAuth2 + task endpoints).
    Gateway,
    /// Run the Telegram bot front-end.
    Bot,
    /// Validate config and report which processes can start.
    Doctor,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();
    init_tracing()?;
    install_panic_hook();
    match dotenv {
        Ok(path) => tracing::debug!(path = %path.display(), ".env loaded"),
        Err(e) if e.not_found() => tracing::debug!("no .env file found"),
        Err(e) => tracing::warn!(error = %e, ".env could not be loaded"),
    }

    let cli = Cli::parse();
    let cfg = HortabotConfig::load(cli.config).await?;

    match cli.command {
        Command::Relay => server::serve_relay(&cfg).await,
        Command::Gateway => server::serve_gateway(&cfg).await,
        Command::Bot => bot::run(&cfg).await,
        Command::Doctor => server::doctor(&cfg).await,
    }
}

fn init_tracing() -> anyhow::Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(v) => v,
        Err(_) => EnvFilter::new(
            "info,hortabot=debug,hb_app=debug,hb_llm=debug,hb_tasks=debug,hb_channels=debug,tower_http=info",
        ),
    };
    let log_format = std::env::var("HORTABOT_LOG_FORMAT")
        .unwrap_or_else(|_| "json".to_string())
        .to_ascii_lowercase();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    match log_format.as_str() {
        "json" => builder
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(true)
            .init(),
        "pretty" => builder.pretty().init(),
        "compact" => builder.compact().init(),
        other => {
            return Err(anyhow::anyhow!(
                "unsupported HORTABOT_LOG_FORMAT={other:?}; expected one of: json, pretty, compact"
            ));
        }
    }

    tracing::info!(
        log_format = %log_format,
        env_filter = ?std::env::var("RUST_LOG").ok(),
        "tracing initialized"
    );
    Ok(())
}

fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = panic_payload_to_string(panic_info.payload());
        tracing::error!(
            panic_location = %location,
            panic_payload = %payload,
            "panic captured"
        );
        default_hook(panic_info);
    }));
}

fn panic_payload_to_string(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        return msg.to_string();
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg.clone();
    }
    "non-string panic payload".to_string()
}
