//! cast-accounts - Connected account management for Crosscast
//!
//! Lists and disconnects accounts in the token store, prints registered
//! platform adapters, and generates encryption keys.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use libcrosscast::platforms::{build_http_client, AdapterKind, AdapterRegistry};
use libcrosscast::{Config, CrosscastError, Database, Platform, SecretCipher};
use serde_json::json;
use tracing::error;

#[derive(Parser)]
#[command(name = "cast-accounts")]
#[command(version)]
#[command(about = "Inspect and manage Crosscast connected accounts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.config/crosscast/config.toml)
    #[arg(long, global = true, env = "CROSSCAST_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List a user's connected accounts (tokens are never shown)
    List {
        /// User id the accounts belong to
        #[arg(long)]
        user: String,
    },

    /// Remove a connected account and its stored tokens
    Disconnect {
        /// Account id as shown by `list`
        #[arg(required_unless_present = "platform")]
        id: Option<String>,

        /// Remove every account the user holds on this platform instead
        #[arg(long, requires = "user", conflicts_with = "id")]
        platform: Option<String>,

        /// User id, with --platform
        #[arg(long)]
        user: Option<String>,
    },

    /// Print a fresh base64 key for ENCRYPTION_KEY
    Keygen,

    /// Show registered platform adapters and their content limits
    Platforms,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    libcrosscast::logging::LoggingConfig::new(libcrosscast::logging::LogFormat::Text, level).init();

    if let Err(e) = run_command(&cli).await {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        let code = e
            .downcast_ref::<CrosscastError>()
            .map(CrosscastError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    Ok(config)
}

async fn run_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::List { user } => list_accounts(cli, user).await,
        Commands::Disconnect { id, platform, user } => {
            disconnect(cli, id.as_deref(), platform.as_deref(), user.as_deref()).await
        }
        Commands::Keygen => {
            keygen(cli.format);
            Ok(())
        }
        Commands::Platforms => list_platforms(cli),
    }
}

async fn list_accounts(cli: &Cli, user: &str) -> Result<()> {
    let config = load_config(cli)?;
    let db = Database::new(&config.database.path).await?;
    let accounts = db.list_accounts(user).await?;
    let summaries: Vec<_> = accounts.iter().map(|a| a.summary()).collect();

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summaries)?),
        OutputFormat::Text => {
            if summaries.is_empty() {
                println!("No connected accounts for user '{}'", user);
                return Ok(());
            }

            println!("Connected accounts for '{}':", user);
            println!();
            for summary in &summaries {
                let expiry = summary
                    .expires_at
                    .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "  {} {} ({})",
                    summary.platform, summary.external_account_name, summary.external_account_id
                );
                println!("    id:        {}", summary.id);
                println!("    expires:   {}", expiry);
                println!(
                    "    refresh:   {}",
                    if summary.has_refresh_token { "yes" } else { "no" }
                );
            }
        }
    }

    Ok(())
}

async fn disconnect(
    cli: &Cli,
    id: Option<&str>,
    platform: Option<&str>,
    user: Option<&str>,
) -> Result<()> {
    let config = load_config(cli)?;
    let db = Database::new(&config.database.path).await?;

    let removed = match (id, platform, user) {
        (Some(id), _, _) => u64::from(db.delete_account(id).await?),
        (None, Some(platform), Some(user)) => {
            let platform: Platform = platform.parse()?;
            db.delete_accounts_for(user, platform).await?
        }
        _ => {
            return Err(CrosscastError::InvalidInput(
                "give an account id, or --platform with --user".to_string(),
            )
            .into())
        }
    };

    match cli.format {
        OutputFormat::Json => println!("{}", json!({ "removed": removed })),
        OutputFormat::Text if removed == 0 => println!("No matching account found"),
        OutputFormat::Text => println!("✓ Disconnected {} account(s)", removed),
    }

    if removed == 0 {
        return Err(CrosscastError::InvalidInput("no matching account".to_string()).into());
    }
    Ok(())
}

fn keygen(format: OutputFormat) {
    let key = SecretCipher::generate_key();
    match format {
        OutputFormat::Json => println!("{}", json!({ "encryption_key": key })),
        OutputFormat::Text => println!("{}", key),
    }
}

fn list_platforms(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let registry = AdapterRegistry::from_config(&config, build_http_client(&config)?);

    let rows: Vec<_> = registry
        .platforms()
        .into_iter()
        .filter_map(|platform| registry.get(platform))
        .map(|adapter| {
            let limits = adapter.limits();
            json!({
                "platform": adapter.platform(),
                "kind": match adapter.kind() {
                    AdapterKind::Live => "live",
                    AdapterKind::Stub => "stub",
                },
                "max_chars": limits.max_chars,
                "requires_media": limits.requires_media,
                "refresh": adapter.supports_refresh(),
            })
        })
        .collect();

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Text => {
            println!("Registered platforms:");
            println!();
            for row in &rows {
                println!(
                    "  {:<10} {:<5} max {} chars{}{}",
                    row["platform"].as_str().unwrap_or_default(),
                    row["kind"].as_str().unwrap_or_default(),
                    row["max_chars"],
                    if row["requires_media"] == true { ", media required" } else { "" },
                    if row["refresh"] == true { ", refreshes tokens" } else { "" },
                );
            }

            let unsupported: Vec<_> = Platform::ALL
                .iter()
                .filter(|p| !registry.is_supported(**p))
                .map(|p| p.as_str())
                .collect();
            if !unsupported.is_empty() {
                println!();
                println!("Unsupported (no credentials): {}", unsupported.join(", "));
            }
        }
    }

    Ok(())
}
