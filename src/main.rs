use clap::Parser;
use tracing_subscriber::EnvFilter;

use coffer::cli::commands;
use coffer::cli::{load_settings, output, Cli, Commands};
use coffer::errors::CofferError;

fn main() {
    let cli = Cli::parse();

    init_tracing(&cli);

    let result = match cli.command {
        Commands::Init => commands::init::execute(&cli),
        Commands::Unlock { keychain, prompt } => commands::unlock::execute(&cli, keychain, prompt),
        Commands::Lock => commands::lock::execute(&cli),
        Commands::Status => commands::status::execute(&cli),
        Commands::Project { ref action } => commands::project::execute(&cli, action),
        Commands::Env { ref action } => commands::env::execute(&cli, action),
        Commands::Set {
            ref key,
            ref value,
            ref env,
            stdin,
        } => commands::set::execute(&cli, key, value.as_deref(), env, stdin),
        Commands::Get { ref key, ref env } => commands::get::execute(&cli, key, env),
        Commands::List {
            ref env,
            show_values,
        } => commands::list::execute(&cli, env, show_values),
        Commands::Delete {
            ref key,
            ref env,
            force,
        } => commands::delete::execute(&cli, key, env, force),
        Commands::History {
            ref key,
            ref env,
            limit,
            show_values,
        } => commands::history::execute(&cli, key, env, limit, show_values),
        Commands::Restore {
            ref key,
            ref env,
            to_version,
        } => commands::restore::execute(&cli, key, env, to_version),
        Commands::Run {
            ref env,
            ref command,
        } => commands::run::execute(&cli, env, command),
        Commands::Export {
            ref env,
            ref format,
            resolve,
            ref output,
        } => commands::export::execute(&cli, env, format, resolve, output.as_deref()),
        Commands::Import {
            ref file,
            ref env,
            ref format,
        } => commands::import_cmd::execute(&cli, file, env, format.as_deref()),
        Commands::Keychain { ref action } => commands::keychain::execute(&cli, action),
        Commands::Audit { last } => commands::audit_cmd::execute(&cli, last),
    };

    match result {
        Ok(()) => {}
        // The child already reported its own failure.
        Err(CofferError::ChildProcessFailed(code)) => std::process::exit(code),
        Err(e) => {
            output::error(&e.to_string());
            std::process::exit(1);
        }
    }
}

/// Log to stderr, filtered by `RUST_LOG` or the `log_level` setting.
fn init_tracing(cli: &Cli) {
    let fallback = load_settings(cli)
        .map(|s| s.log_level)
        .unwrap_or_else(|_| "warn".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
