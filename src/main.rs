use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use localshare::config::{format_config, Config, ConfigKey};
use localshare::logging::{init_logging, LogConfig, Verbosity};
use localshare::server::{human_size, run_server, ServerConfig};
use localshare::share::{Reaper, ShareService, ShareToken};

#[derive(Parser)]
#[command(name = "localshare")]
#[command(version)]
#[command(about = "Share files on your local network")]
#[command(
    long_about = "Upload files through a local web page and hand out links that expire after a chosen time or until you revoke them. Expired and revoked shares are deleted in the background."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Also write JSON logs to this file
    #[arg(long, global = true)]
    log_file: Option<String>,
}

/// Where shares live; shared by every subcommand that touches storage.
#[derive(clap::Args, Clone)]
struct StorageArgs {
    /// Directory holding one subdirectory per share
    #[arg(long, env = "LOCALSHARE_UPLOAD_DIR")]
    storage_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web server and the background reaper
    Serve {
        #[command(flatten)]
        storage: StorageArgs,

        /// Port to listen on (default: 8000)
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind (default: 0.0.0.0)
        #[arg(long)]
        bind: Option<String>,

        /// Base URL used in share links (default: http://localhost:<port>)
        #[arg(long, env = "PUBLIC_BASE_URL")]
        base_url: Option<String>,

        /// Seconds between sweeps for expired and revoked shares
        #[arg(long)]
        reap_interval: Option<u64>,

        /// Open the sender page in a browser
        #[arg(long)]
        open: bool,
    },
    /// List stored shares with their status
    List {
        #[command(flatten)]
        storage: StorageArgs,
    },
    /// Revoke a share so its link stops working
    Revoke {
        /// Token of the share
        token: String,

        #[command(flatten)]
        storage: StorageArgs,
    },
    /// Delete expired and revoked shares now
    Sweep {
        #[command(flatten)]
        storage: StorageArgs,
    },
    /// Manage configuration settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key
        #[arg(value_enum)]
        key: ConfigKey,
        /// Value to set
        value: String,
    },
    /// Remove a configuration value (revert to default)
    Unset {
        /// Configuration key
        #[arg(value_enum)]
        key: ConfigKey,
    },
    /// Print the configuration file path
    Path,
}

/// Open the share service for commands that work on storage directly.
async fn open_service(config: &Config, storage: StorageArgs) -> Result<ShareService> {
    let root = config.effective_storage_dir(storage.storage_dir);
    let base_url = config.effective_base_url(None, config.effective_port(None));
    ShareService::open(&root, base_url)
        .await
        .with_context(|| format!("Failed to open storage at {}", root.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = init_logging(&LogConfig {
        verbosity: Verbosity::from_flags(cli.quiet, cli.verbose),
        log_file: cli.log_file.clone(),
    });

    let config = Config::load().context("Failed to load configuration")?;

    match cli.command {
        Commands::Serve {
            storage,
            port,
            bind,
            base_url,
            reap_interval,
            open,
        } => {
            let port = config.effective_port(port);
            let bind: IpAddr = config
                .effective_bind_address(bind.as_deref())
                .parse()
                .context("Invalid bind address")?;
            let root = config.effective_storage_dir(storage.storage_dir);
            let base_url = config.effective_base_url(base_url.as_deref(), port);

            let shares = ShareService::open(&root, base_url)
                .await
                .with_context(|| format!("Failed to open storage at {}", root.display()))?;

            let server_config = ServerConfig {
                bind,
                base_port: port,
                reap_interval: config.effective_reap_interval(reap_interval),
                default_duration: config.effective_default_duration(),
                open_browser: open,
            };

            run_server(Arc::new(shares), server_config).await?;
        }
        Commands::List { storage } => {
            let shares = open_service(&config, storage).await?;
            let summaries = shares.list_shares().await?;

            if summaries.is_empty() {
                println!("No shares stored.");
            }
            for summary in summaries {
                let expires = match summary.record.and_then(|r| r.expires_at) {
                    Some(at) => at.to_rfc3339(),
                    None => "never".to_string(),
                };
                println!(
                    "{}  {:<8}  expires: {}  files: {}  size: {}",
                    summary.token,
                    summary.validity.as_str(),
                    expires,
                    summary.file_count,
                    human_size(summary.total_bytes)
                );
            }
        }
        Commands::Revoke { token, storage } => {
            let token = ShareToken::parse(&token)?;
            let shares = open_service(&config, storage).await?;
            shares
                .revoke(&token)
                .await
                .with_context(|| format!("Failed to revoke {token}"))?;
            println!("Revoked {}", token);
        }
        Commands::Sweep { storage } => {
            let shares = Arc::new(open_service(&config, storage).await?);
            let interval = config.effective_reap_interval(None);
            let report = Reaper::new(shares, interval).run_cycle().await;
            println!(
                "Scanned {} shares, removed {}, failed {}",
                report.scanned, report.removed, report.failed
            );
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                println!("{}", format_config(&config));
            }
            ConfigAction::Set { key, value } => {
                let mut config = config;
                config.set(key, &value)?;
                config.save().context("Failed to save configuration")?;
                println!("Set {} = {}", key.as_str(), value);
            }
            ConfigAction::Unset { key } => {
                let mut config = config;
                config.unset(key);
                config.save().context("Failed to save configuration")?;
                println!("Unset {}", key.as_str());
            }
            ConfigAction::Path => {
                println!("{}", Config::config_path()?.display());
            }
        },
    }

    Ok(())
}
