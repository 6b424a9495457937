//! # echo-cli
//!
//! Command-line interface for Echo delegated spending authority.
//!
//! A human signs one bounded policy; an agent's actions are then authorized
//! or rejected against it without asking again:
//! - `echo wallet connect/disconnect/status` — the simulated wallet identity
//! - `echo policy sign/show/clear/presets/typed-data` — the signed authority
//! - `echo act` / `echo run` — evaluate agent actions
//! - `echo demo` — play the built-in scenario
//! - `echo audit verify/tail` — inspect the hash-chained activity log

mod commands;
mod playback;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use echo_authority::EchoConfig;
use tracing_subscriber::EnvFilter;

/// Echo — sign once, let the agent act within bounds.
#[derive(Parser)]
#[command(name = "echo", version, about)]
struct Cli {
    /// Project root directory (defaults to current directory).
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect, switch or disconnect the wallet identity.
    Wallet {
        #[command(subcommand)]
        command: commands::wallet::WalletCommands,
    },
    /// Sign, inspect and clear the spending policy.
    Policy {
        #[command(subcommand)]
        command: commands::policy::PolicyCommands,
    },
    /// Evaluate one agent action against the active policy.
    Act(commands::act::ActArgs),
    /// Evaluate a JSON array of agent actions with one shared ledger.
    Run {
        /// Path to a JSON file holding `[{ "purpose", "target", "amount"?, "token"? }, ...]`.
        #[arg(long)]
        actions: PathBuf,
        /// Print each decision as a JSON line instead of a table row.
        #[arg(long)]
        json: bool,
    },
    /// Play the built-in scenario against a throwaway demo wallet.
    Demo {
        /// Pause between events, in milliseconds.
        #[arg(long, default_value = "0")]
        step_ms: u64,
        /// Play the scenario this many times, rewinding in between.
        #[arg(long, default_value = "1")]
        repeat: u32,
    },
    /// Inspect the activity log.
    Audit {
        #[command(subcommand)]
        command: commands::audit::AuditCommands,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("echo_authority=info".parse()?)
                .add_directive("echo_policy=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let project_root = cli.project_root.canonicalize().unwrap_or(cli.project_root);
    let config = EchoConfig::load(&project_root)?;

    match &cli.command {
        Commands::Wallet { command } => commands::wallet::execute(command, &config),
        Commands::Policy { command } => commands::policy::execute(command, &config),
        Commands::Act(args) => commands::act::execute(args, &config),
        Commands::Run { actions, json } => commands::run::execute(&config, actions, *json),
        Commands::Demo { step_ms, repeat } => commands::demo::execute(&config, *step_ms, *repeat),
        Commands::Audit { command } => commands::audit::execute(command, &config),
    }
}
