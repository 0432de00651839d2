//! cast-server - HTTP API for Crosscast
//!
//! Serves the OAuth connect/callback endpoints, the publish endpoint and
//! account management until SIGINT or SIGTERM.

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use libcrosscast::error::ConfigError;
use libcrosscast::logging::{LogFormat, LoggingConfig};
use libcrosscast::platforms::{build_http_client, AdapterRegistry};
use libcrosscast::server::start_server;
use libcrosscast::{AppState, Config, CrosscastError, Database, SecretCipher};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "cast-server")]
#[command(version)]
#[command(about = "HTTP API for connecting social accounts and publishing posts")]
#[command(long_about = "\
cast-server - HTTP API for connecting social accounts and publishing posts

ENDPOINTS:
    GET    /api/oauth-connect?platform=&user_id=   Redirect to the provider consent page
    GET    /api/oauth-callback?code=&state=        Provider redirect target
    POST   /api/publish                            Publish to one or more platforms
    GET    /api/accounts?user_id=                  List connected accounts
    DELETE /api/accounts?id=                       Disconnect an account
    GET    /api/health                             Liveness and registered platforms

ENVIRONMENT:
    ENCRYPTION_KEY                   Base64 32-byte key for token encryption (required)
    <PLATFORM>_CLIENT_ID/_SECRET     OAuth app credentials, e.g. TWITTER_CLIENT_ID
    OAUTH_REDIRECT_URI               Callback URL registered with every provider
    FRONTEND_URL                     Where users land after connecting
    CROSSCAST_LOG_FORMAT             text, json or pretty
    CROSSCAST_LOG_LEVEL              error, warn, info, debug or trace

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (in-flight requests finish)

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error
")]
struct Cli {
    /// Config file (defaults to ~/.config/crosscast/config.toml)
    #[arg(long, env = "CROSSCAST_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Address to listen on (overrides config)
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,

    /// Log format: text, json or pretty
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<LogFormat>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        let code = e
            .downcast_ref::<CrosscastError>()
            .map(CrosscastError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

fn init_logging(cli: &Cli) {
    let mut logging = LoggingConfig::from_env(|key| std::env::var(key).ok());
    if let Some(format) = cli.log_format {
        logging.format = format;
    }
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    logging.init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }

    let addr: SocketAddr = config.server.bind.parse().map_err(|e| {
        CrosscastError::from(ConfigError::InvalidValue {
            field: "server.bind".to_string(),
            reason: format!("{}", e),
        })
    })?;

    let cipher = SecretCipher::from_configured_key(config.secrets.encryption_key.as_ref())?;
    let db = Database::new(&config.database.path).await?;
    info!("Using database at {}", config.expand_database_path().display());

    let registry = AdapterRegistry::from_config(&config, build_http_client(&config)?);
    let state = AppState::new(&config, registry, db, cipher)?;

    let shutdown = shutdown_signal().context("failed to install signal handlers")?;
    let (_, server) = start_server(addr, state, shutdown).await?;

    server.await.context("server task failed")?;
    info!("cast-server stopped");
    Ok(())
}

#[cfg(unix)]
fn shutdown_signal() -> anyhow::Result<impl Future<Output = ()> + Send + 'static> {
    use futures::StreamExt;
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook_tokio::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let handle = signals.handle();

    Ok(async move {
        if let Some(signal) = signals.next().await {
            info!(signal, "Received shutdown signal, stopping gracefully...");
        }
        handle.close();
    })
}

#[cfg(not(unix))]
fn shutdown_signal() -> anyhow::Result<impl Future<Output = ()> + Send + 'static> {
    Ok(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, stopping gracefully...");
        }
    })
}
