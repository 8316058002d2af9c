//! Allergen relay CLI - EU allergen analysis of recipes through an LLM.

use allergen_relay::api::{create_router_with_state, AppState};
use allergen_relay::config::{Config, LogVerbosity};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::signal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "allergen-relay")]
#[command(about = "Relay recipes to an LLM and report the EU allergens they contain")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay server
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Log verbosity level (defaults to the config file value)
        #[arg(short, long, value_enum)]
        log_level: Option<LogLevel>,

        /// Config file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show current configuration
    Config {
        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum LogLevel {
    Minimal,
    Compact,
    Verbose,
}

impl From<LogLevel> for LogVerbosity {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Minimal => LogVerbosity::Minimal,
            LogLevel::Compact => LogVerbosity::Compact,
            LogLevel::Verbose => LogVerbosity::Verbose,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is normal in production.
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { port, log_level, config }) => {
            run_server(port, log_level, config).await?;
        }
        Some(Commands::Config { path }) => {
            show_config(path)?;
        }
        None => {
            run_server(None, None, None).await?;
        }
    }

    Ok(())
}

async fn run_server(
    port_override: Option<u16>,
    log_level: Option<LogLevel>,
    config_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut config = match config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    }
    .with_env_overrides();

    if let Some(port) = port_override {
        config.server.port = port;
    }
    if let Some(level) = log_level {
        config.app.log_verbosity = level.into();
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.server.host, config.server.port))?;

    let state = AppState::from_config(&config).context("Failed to build HTTP client")?;
    let key_configured = state.analyzer.is_configured();
    let app = create_router_with_state(state);

    let verbosity = config.app.log_verbosity;
    match verbosity {
        LogVerbosity::Minimal => {
            println!("allergen-relay:{}", config.server.port);
        }
        LogVerbosity::Compact => {
            println!("→ Allergen relay starting on http://{}", addr);
            println!("→ Model: {} via {}", config.upstream.model, config.upstream.base_url);
        }
        LogVerbosity::Verbose => {
            println!("────────────────────────────────────────");
            println!("Allergen relay v{}", env!("CARGO_PKG_VERSION"));
            println!("────────────────────────────────────────");
            println!("Server:     http://{}", addr);
            println!("Health:     http://{}/health", addr);
            println!("Analyze:    http://{}/analyze", addr);
            println!("Upload:     http://{}/analyze/upload", addr);
            println!("Labels:     http://{}/labels", addr);
            println!("Upstream:   {}", config.upstream.base_url);
            println!("Model:      {}", config.upstream.model);
            println!("────────────────────────────────────────");
            println!("Log Level:  {:?}", verbosity);
            println!("────────────────────────────────────────");
        }
    }

    if !key_configured {
        print_missing_key_banner();
        tracing::warn!("OPENAI_API_KEY is not set, /analyze will answer 500 until it is");
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Relay listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    println!("\nRelay stopped.");
    Ok(())
}

fn print_missing_key_banner() {
    println!("========================================");
    println!("  CONFIGURATION REQUIRED");
    println!("========================================");
    println!("  No OpenAI API key found.");
    println!("  Set OPENAI_API_KEY in the environment,");
    println!("  in a .env file, or under [upstream]");
    println!("  api_key in {}", Config::default_path().display());
    println!("========================================");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

fn show_config(show_path: bool) -> anyhow::Result<()> {
    if show_path {
        println!("{}", Config::default_path().display());
        return Ok(());
    }

    let config = Config::load()?.with_env_overrides();
    println!("{}", toml::to_string_pretty(&config.redacted())?);
    Ok(())
}
