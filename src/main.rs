use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

use repomirror::credentials;
use repomirror::daemon::{self, Daemon};
use repomirror::health::HealthCheck;
use repomirror::logging;
use repomirror::{inventory, ActionKind, Config, GitHubLister, RepositoryLister, SyncEngine, SyncError};

#[derive(Parser)]
#[command(name = "repomirror")]
#[command(about = "Mirror every repository of a GitHub account into public/private folders")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a configuration file and create the storage layout
    Init {
        /// Root directory for the public/ and private/ partitions
        #[arg(short, long, default_value = "~/github-repos")]
        storage_root: String,
    },

    /// Manage the GitHub token
    Auth {
        #[command(subcommand)]
        auth_command: AuthCommands,
    },

    /// Run one reconciliation pass
    Sync {
        /// Print the plan without changing anything
        #[arg(long)]
        dry_run: bool,

        /// GitHub token; stored for later runs if none is stored yet
        #[arg(long)]
        token: Option<String>,

        /// Store --token even if a token is already stored
        #[arg(long, requires = "token")]
        store_token: bool,
    },

    /// List the remote repositories and their visibility
    List,

    /// Run a sync pass on a fixed interval until interrupted
    Daemon {
        /// Override the configured interval (e.g. "30m", "1h")
        #[arg(long)]
        interval: Option<String>,
    },

    /// System health check and diagnostics
    Doctor,
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Store a token in the configured credential store
    SetToken {
        /// Personal access token
        token: String,
    },

    /// Show which account the stored token belongs to
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match (&cli.command, &cli.config) {
        // init may be pointed at a config file it is about to create
        (Commands::Init { .. }, Some(path)) if !path.exists() => Config::default(),
        _ => load_config(cli.config.as_deref())?,
    };
    logging::init(cli.verbose, &config.logging)?;
    info!("Starting repomirror v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Init { storage_root } => cmd_init(storage_root, cli.config.as_deref(), &config),
        Commands::Auth { auth_command } => cmd_auth(auth_command, &config).await,
        Commands::Sync {
            dry_run,
            token,
            store_token,
        } => cmd_sync(dry_run, token, store_token, &config).await,
        Commands::List => cmd_list(&config).await,
        Commands::Daemon { interval } => cmd_daemon(interval, &config).await,
        Commands::Doctor => cmd_doctor(&config),
    }
}

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load(path),
        None => Config::load_or_default(),
    }
}

/// Token for the configured account, or a message saying how to add one
fn resolve_token(config: &Config) -> Result<String> {
    let store = credentials::from_config(config)?;
    credentials::require_token(store.as_ref(), credentials::account_key(config))
}

fn cmd_init(storage_root: String, config_path: Option<&Path>, config: &Config) -> Result<()> {
    let expanded = shellexpand::full(&storage_root)?.into_owned();
    inventory::ensure_layout(Path::new(&expanded))
        .with_context(|| format!("Failed to create storage layout under {}", expanded))?;

    let mut new_config = config.clone();
    new_config.storage_root = storage_root;

    let config_path = match config_path {
        Some(path) => path.to_path_buf(),
        None => Config::default_config_path()?,
    };
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    new_config.save(&config_path)?;

    println!("✅ repomirror initialized");
    println!("   Config: {:?}", config_path);
    println!("   Storage root: {}", expanded);
    println!("   Next: repomirror auth set-token <TOKEN> && repomirror sync");

    Ok(())
}

async fn cmd_auth(auth_command: AuthCommands, config: &Config) -> Result<()> {
    match auth_command {
        AuthCommands::SetToken { token } => {
            let store = credentials::from_config(config)?;
            let account = credentials::account_key(config);
            store.set(account, token.trim())?;
            println!("✅ Token stored for account '{}' ({})", account, store.name());
            Ok(())
        }
        AuthCommands::Status => {
            let token = resolve_token(config)?;
            let lister = GitHubLister::new(token, &config.github)?;
            match lister.current_login().await {
                Ok(login) => {
                    println!("✅ Authentication successful");
                    println!("   Username: {}", login);
                    Ok(())
                }
                Err(e) => bail!("Authentication check failed: {}", e),
            }
        }
    }
}

async fn cmd_sync(
    dry_run: bool,
    token: Option<String>,
    store_token: bool,
    config: &Config,
) -> Result<()> {
    let token = match token {
        Some(token) => {
            remember_token(config, &token, store_token)?;
            token
        }
        None => resolve_token(config)?,
    };

    let engine = SyncEngine::from_config(config, token)?;

    if dry_run {
        let plan = engine.plan().await.map_err(explain_fatal)?;

        println!("📋 Plan for {}", engine.storage_root().display());
        for action in &plan.actions {
            println!("   {}", action);
        }
        for conflict in &plan.conflicts {
            println!("   ⚠️  {}", conflict);
        }
        for name in &plan.rejected {
            println!("   ⚠️  skipping unusable repository name {:?}", name);
        }
        println!(
            "\n   {} clone, {} update, {} move, {} delete, {} conflicts",
            plan.count(ActionKind::Clone),
            plan.count(ActionKind::Update),
            plan.count(ActionKind::Move),
            plan.count(ActionKind::Delete),
            plan.conflicts.len()
        );
        return Ok(());
    }

    let report = engine.run().await.map_err(explain_fatal)?;
    let stats = &report.stats;

    println!("\n🎉 Synchronization complete in {:.2}s", report.duration.as_secs_f64());
    println!("   📥 Cloned:  {}", stats.cloned);
    println!("   🔄 Updated: {}", stats.updated);
    println!("   📦 Moved:   {}", stats.moved);
    println!("   🗑️  Deleted: {}", stats.deleted);
    println!("   ❌ Errors:  {}", stats.errors);

    if stats.is_degraded() {
        println!("\n🔍 Failed operations:");
        for record in report.failures() {
            println!(
                "   ❌ {} {}: {}",
                record.kind,
                record.name,
                record.error.as_deref().unwrap_or("unknown error")
            );
        }
        for conflict in &report.conflicts {
            println!("   ❌ {}", conflict);
        }
        for name in &report.rejected {
            println!("   ❌ unusable repository name {:?}", name);
        }
    }

    Ok(())
}

/// Store a token passed on the command line unless one is already stored
fn remember_token(config: &Config, token: &str, force: bool) -> Result<()> {
    let store = credentials::from_config(config)?;
    let account = credentials::account_key(config);

    if force || store.get(account)?.is_none() {
        store.set(account, token)?;
        println!("🔐 Token stored for account '{}'", account);
    }
    Ok(())
}

fn explain_fatal(error: SyncError) -> anyhow::Error {
    if error.is_authentication() {
        anyhow::Error::new(error)
            .context("GitHub rejected the token. Check it or run: repomirror auth set-token <TOKEN>")
    } else {
        anyhow::Error::new(error)
    }
}

async fn cmd_list(config: &Config) -> Result<()> {
    let lister = GitHubLister::new(resolve_token(config)?, &config.github)?;
    let repositories = lister.list_repositories().await.map_err(|e| explain_fatal(e.into()))?;

    println!("Repositories ({}):", repositories.len());
    for repo in repositories {
        println!("  📁 {:<40} {}", repo.name, repo.target_partition());
    }

    Ok(())
}

async fn cmd_daemon(interval: Option<String>, config: &Config) -> Result<()> {
    let interval = daemon::parse_interval(interval.as_deref().unwrap_or(&config.daemon.interval))
        .context("Failed to parse daemon sync interval")?;

    let engine = SyncEngine::from_config(config, resolve_token(config)?)?;
    Daemon::new(engine, interval).run().await
}

fn cmd_doctor(config: &Config) -> Result<()> {
    let health = HealthCheck::run(config);

    println!("🔍 repomirror System Diagnostics");
    println!();

    for (name, result) in health.all_checks() {
        println!("{}:", name);
        let icon = if result.passed {
            if result.is_warning {
                "⚠️ "
            } else {
                "✅"
            }
        } else {
            "❌"
        };
        println!("  {} {}", icon, result.message);
        if let Some(details) = &result.details {
            for line in details.lines() {
                println!("     {}", line);
            }
        }
        println!();
    }

    if health.all_passed() {
        println!("✅ All checks passed");
        Ok(())
    } else {
        bail!("Some checks failed")
    }
}
