use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// CLI surface definition.
#[derive(Parser, Debug)]
#[command(
    name = "werecord",
    about = "Read-only access to a messaging app's encrypted local store",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Optional subcommand; defaults to `open` when absent.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Initialize an environment and print the current account.
    Open {
        /// Print the account as JSON.
        #[arg(long)]
        json: bool,
    },
    /// List discovered and known accounts.
    Accounts,
    /// Derive a store passphrase from a device secret and uin.
    Passphrase {
        #[arg(long)]
        secret: String,
        #[arg(long)]
        uin: String,
    },
    /// Decrypt a key-material file and print the device secret.
    KeyInfo { path: PathBuf },
    /// Copy the current account's original store to the backup location.
    Backup,
    /// Toggle read-write access for later sessions.
    Edit { state: Toggle },
    /// Print a status report.
    Diagnostics,
    /// Print version and exit.
    Version,
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    pub fn enabled(self) -> bool {
        matches!(self, Toggle::On)
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}
