mod cli;
mod config;
mod storage;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use werecord_core::{account::Account, config::ConfigCache};
use werecord_env::{Environment, EnvironmentHost};
use werecord_storage::{key_info::decrypt_key_info_file, passphrase::derive_passphrase};

use crate::cli::{Command, ConfigCommand};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = config::load()?;
    match cli.command.unwrap_or(Command::Open { json: false }) {
        Command::Open { json } => run_open(&config, json).await?,
        Command::Accounts => run_accounts(&config).await?,
        Command::Passphrase { secret, uin } => println!("{}", derive_passphrase(&secret, &uin)),
        Command::KeyInfo { path } => println!("{}", decrypt_key_info_file(&path)?),
        Command::Backup => run_backup(&config).await?,
        Command::Edit { state } => set_edit_mode(&config, state.enabled()).await?,
        Command::Diagnostics => run_diagnostics(&config).await?,
        Command::Version => print_version(),
        Command::Config(ConfigCommand::Init) => init_config(&config)?,
    }

    Ok(())
}

fn init_tracing() {
    // Respect user-provided filters, default to info to avoid noisy stdout.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn print_version() {
    println!("werecord {}", env!("CARGO_PKG_VERSION"));
}

fn init_config(config: &config::Config) -> Result<()> {
    let path = config::write_default_if_missing(config)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}

/// Create and initialize an environment from config. A successful run marks
/// the cached device secret as trusted.
async fn start(host: &mut EnvironmentHost, config: &config::Config) -> Result<()> {
    let prefs = storage::preferences_from_config(config)?;
    let env = host.create(
        storage::channel_from_config(config),
        prefs.clone(),
        storage::settings_from_config(config)?,
    )?;
    initialize(env).await?;
    prefs
        .set_intro_done(true)
        .await
        .map_err(|e| eyre!(e.to_string()))?;
    Ok(())
}

async fn initialize(env: &mut Environment) -> Result<()> {
    env.initialize().await.map_err(|err| match err.failure() {
        Some(failure) => eyre!("initialization failed (code {}): {failure}", failure.code()),
        None => eyre!("initialization failed: {err}"),
    })
}

async fn run_open(config: &config::Config, json: bool) -> Result<()> {
    let mut host = EnvironmentHost::new();
    start(&mut host, config).await?;
    let account = host.current()?.current_account()?;
    if json {
        println!("{}", serde_json::to_string_pretty(account)?);
    } else {
        print!("{}", render_account(account));
    }
    host.destroy()?;
    Ok(())
}

async fn run_accounts(config: &config::Config) -> Result<()> {
    let mut host = EnvironmentHost::new();
    start(&mut host, config).await?;
    let env = host.current()?;
    let current = env.current_account()?;
    for uin in env.known_uins()? {
        let marker = if *uin == current.uin { "*" } else { " " };
        println!("{marker} {uin}");
    }
    if env.known_uins()?.is_empty() {
        println!("* {}", current.uin);
    }
    host.destroy()?;
    Ok(())
}

async fn run_backup(config: &config::Config) -> Result<()> {
    let mut host = EnvironmentHost::new();
    start(&mut host, config).await?;
    let path = host.current_mut()?.backup_original_store().await?;
    println!("Backup written to {}", path.display());
    host.destroy()?;
    Ok(())
}

async fn set_edit_mode(config: &config::Config, enabled: bool) -> Result<()> {
    let prefs = storage::preferences_from_config(config)?;
    prefs
        .set_edit_mode_enabled(enabled)
        .await
        .map_err(|e| eyre!(e.to_string()))?;
    info!(enabled, "edit mode updated");
    println!("Edit mode {}", if enabled { "on" } else { "off" });
    Ok(())
}

async fn run_diagnostics(config: &config::Config) -> Result<()> {
    let mut host = EnvironmentHost::new();
    if let Err(err) = start(&mut host, config).await {
        warn!("continuing without a started environment: {err}");
    }
    print!("{}", host.diagnostics());
    host.destroy()?;
    Ok(())
}

fn render_account(account: &Account) -> String {
    let mut out = format!("{} ({})\n", account.display_name(), account.uin);
    let fields = [
        ("account id", account.account_id.as_deref()),
        ("alias", account.alias.as_deref()),
        ("phone", account.phone_number.as_deref()),
    ];
    for (label, value) in fields {
        if let Some(value) = value {
            out.push_str(&format!("  {label}: {value}\n"));
        }
    }
    if account.is_last_login {
        out.push_str("  last login\n");
    }
    out
}
