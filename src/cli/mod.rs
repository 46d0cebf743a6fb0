//! CLI module: Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod env_parser;
pub mod output;

use std::path::PathBuf;

use clap::Parser;
use zeroize::Zeroizing;

use crate::config::{DataDir, Settings};
use crate::errors::{CofferError, Result};
use crate::vault::Vault;

/// Minimum password length to prevent trivially weak passwords.
const MIN_PASSWORD_LEN: usize = 8;

/// Environment variable consulted before prompting for the master password.
pub const PASSWORD_ENV: &str = "COFFER_PASSWORD";

/// Coffer CLI: local secrets manager with environment inheritance.
#[derive(Parser)]
#[command(
    name = "coffer",
    about = "Local secrets manager with environment inheritance and version history",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Data directory (default: ~/.coffer)
    #[arg(long, env = "COFFER_DIR", global = true)]
    pub data_dir: Option<PathBuf>,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Create a new vault and unlock it
    Init,

    /// Unlock the vault for 8 hours
    Unlock {
        /// Only use the key stored in the OS keychain
        #[arg(long, conflicts_with = "prompt")]
        keychain: bool,
        /// Always ask for the password, even if keychain unlock is enabled
        #[arg(long)]
        prompt: bool,
    },

    /// Lock the vault (forget the session key)
    Lock,

    /// Show vault, session, and keychain status
    Status,

    /// Manage projects (create, list, use, delete)
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Manage environments (create, branch, list, delete)
    Env {
        #[command(subcommand)]
        action: EnvAction,
    },

    /// Set a secret (add or update)
    Set {
        /// Secret name (e.g. DATABASE_URL)
        key: String,
        /// Secret value (omit for interactive prompt)
        value: Option<String>,
        #[arg(short, long)]
        env: String,
        /// Read the value from stdin
        #[arg(long, conflicts_with = "value")]
        stdin: bool,
    },

    /// Print a secret's value (following inheritance)
    Get {
        /// Secret name
        key: String,
        #[arg(short, long)]
        env: String,
    },

    /// List secrets visible in an environment
    List {
        #[arg(short, long)]
        env: String,
        /// Show decrypted values (use with caution)
        #[arg(long)]
        show_values: bool,
    },

    /// Delete a secret from an environment
    Delete {
        /// Secret name
        key: String,
        #[arg(short, long)]
        env: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Show the version history of a secret
    History {
        /// Secret name
        key: String,
        #[arg(short, long)]
        env: String,
        /// Number of versions to show (default: history_limit setting)
        #[arg(short, long)]
        limit: Option<usize>,
        /// Show decrypted values
        #[arg(long)]
        show_values: bool,
    },

    /// Restore a secret to a previous version
    Restore {
        /// Secret name
        key: String,
        #[arg(short, long)]
        env: String,
        /// Version to restore
        #[arg(long = "version", value_name = "N")]
        to_version: i64,
    },

    /// Run a command with secrets injected
    Run {
        #[arg(short, long)]
        env: String,
        /// Command and arguments (after --)
        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },

    /// Export secrets to a file or stdout
    Export {
        #[arg(short, long)]
        env: String,
        /// Output format: env (default) or json
        #[arg(short, long, default_value = "env")]
        format: String,
        /// Expand ${VAR} references
        #[arg(long)]
        resolve: bool,
        /// Output file path (prints to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Import secrets from a file
    Import {
        /// Path to the file to import
        file: String,
        #[arg(short, long)]
        env: String,
        /// Import format: env or json (auto-detected if omitted)
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Manage OS keychain unlock
    Keychain {
        #[command(subcommand)]
        action: KeychainAction,
    },

    /// View the audit log of vault operations
    Audit {
        /// Number of entries to show (default: 50)
        #[arg(long, default_value = "50")]
        last: usize,
    },
}

/// Project subcommands.
#[derive(clap::Subcommand)]
pub enum ProjectAction {
    /// Create a project and make it active
    Create {
        name: String,
        /// Project description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// List all projects
    List,

    /// Switch the active project
    Use { name: String },

    /// Delete a project with all its environments and secrets
    Delete {
        name: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

/// Env subcommands for environment management.
#[derive(clap::Subcommand)]
pub enum EnvAction {
    /// Create a root environment in the active project
    Create { name: String },

    /// Create an environment that inherits from a parent
    Branch {
        /// Parent environment
        parent: String,
        /// Name of the new environment
        name: String,
    },

    /// List environments of the active project
    List,

    /// Delete an environment (must have no children)
    Delete {
        name: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

/// Keychain subcommands.
#[derive(clap::Subcommand)]
pub enum KeychainAction {
    /// Store the vault key in the OS keychain
    Enable,
    /// Remove the vault key from the OS keychain
    Disable,
    /// Show whether keychain unlock is available and enabled
    Status,
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Resolve the data directory from `--data-dir` / `COFFER_DIR`.
pub fn data_dir(cli: &Cli) -> Result<DataDir> {
    DataDir::resolve(cli.data_dir.as_deref())
}

/// Load `coffer.toml` from the data directory.
pub fn load_settings(cli: &Cli) -> Result<Settings> {
    Settings::load(data_dir(cli)?.root())
}

/// Open the vault in the data directory.
pub fn open_vault(cli: &Cli) -> Result<Vault> {
    let dir = data_dir(cli)?;
    let settings = Settings::load(dir.root())?;
    Vault::open(&dir, &settings)
}

/// Open the vault and require an unexpired session.
pub fn unlocked_vault(cli: &Cli) -> Result<Vault> {
    let vault = open_vault(cli)?;
    if !vault.is_initialized()? {
        return Err(CofferError::NotInitialized);
    }
    vault.get_key()?;
    Ok(vault)
}

/// Get the master password, trying in order:
/// 1. `COFFER_PASSWORD` env var (CI/CD)
/// 2. Interactive prompt
///
/// Returns `Zeroizing<String>` so the password is wiped from memory on drop.
pub fn prompt_password() -> Result<Zeroizing<String>> {
    if let Ok(pw) = std::env::var(PASSWORD_ENV) {
        if !pw.is_empty() {
            return Ok(Zeroizing::new(pw));
        }
    }

    let pw = dialoguer::Password::new()
        .with_prompt("Enter master password")
        .interact()
        .map_err(|e| CofferError::CommandFailed(format!("password prompt: {e}")))?;
    Ok(Zeroizing::new(pw))
}

/// Prompt for a new password with confirmation (used during `init`).
///
/// Also respects `COFFER_PASSWORD` for scripted/CI usage.
/// Enforces a minimum password length.
pub fn prompt_new_password() -> Result<Zeroizing<String>> {
    if let Ok(pw) = std::env::var(PASSWORD_ENV) {
        if !pw.is_empty() {
            if pw.len() < MIN_PASSWORD_LEN {
                return Err(CofferError::CommandFailed(format!(
                    "password must be at least {MIN_PASSWORD_LEN} characters"
                )));
            }
            return Ok(Zeroizing::new(pw));
        }
    }

    loop {
        let password = dialoguer::Password::new()
            .with_prompt("Choose master password")
            .with_confirmation(
                "Confirm master password",
                "Passwords do not match, try again",
            )
            .interact()
            .map_err(|e| CofferError::CommandFailed(format!("password prompt: {e}")))?;

        if password.len() < MIN_PASSWORD_LEN {
            output::warning(&format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters. Try again."
            ));
            continue;
        }

        return Ok(Zeroizing::new(password));
    }
}

/// Ask a yes/no question unless `force` is set.  Declining is `UserCancelled`.
pub fn confirm(force: bool, prompt: &str) -> Result<()> {
    if force {
        return Ok(());
    }

    let confirmed = dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| CofferError::CommandFailed(format!("confirm prompt: {e}")))?;

    if confirmed {
        Ok(())
    } else {
        Err(CofferError::UserCancelled)
    }
}
