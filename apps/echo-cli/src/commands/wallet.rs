// wallet.rs — Wallet subcommands: connect, disconnect, status.
//
// The wallet is simulated: a seed label derives a deterministic local key, so
// `--seed alice` is the same identity on every invocation. Switching to a
// different identity, or disconnecting, drops the active policy.

use chrono::Utc;
use clap::Subcommand;
use echo_audit::RecordKind;
use echo_authority::EchoConfig;
use echo_typed_data::{LocalSigner, PolicySigner};

use super::Authority;

#[derive(Subcommand)]
pub enum WalletCommands {
    /// Connect (or switch to) a wallet identity.
    Connect {
        /// Seed label for a deterministic local key.
        #[arg(long, required_unless_present = "random")]
        seed: Option<String>,
        /// Connect a fresh, randomly labelled identity.
        #[arg(long, conflicts_with = "seed")]
        random: bool,
    },
    /// Disconnect the wallet. Any active policy is invalidated.
    Disconnect,
    /// Show the connected identity, the active policy and today's counters.
    Status,
}

pub fn execute(cmd: &WalletCommands, config: &EchoConfig) -> anyhow::Result<()> {
    let mut authority = Authority::open(config)?;

    match cmd {
        WalletCommands::Connect { seed, random } => {
            let label = match (seed, random) {
                (Some(label), _) => label.clone(),
                (None, true) => format!("random-{}", uuid::Uuid::new_v4()),
                (None, false) => anyhow::bail!("Pass --seed <label> or --random."),
            };
            let signer = LocalSigner::from_seed_label(&label)?;
            let previous = authority.ctx.identity();

            let invalidated = authority.ctx.connect(signer.address())?;
            authority.session.wallet_label = Some(label.clone());
            if previous != Some(signer.address()) {
                authority.record_lifecycle(
                    RecordKind::IdentityChanged,
                    format!(
                        "connected {} (was {})",
                        signer.address(),
                        previous.map(|a| a.to_string()).unwrap_or_else(|| "disconnected".to_string())
                    ),
                )?;
            }
            authority.save(config)?;

            println!("Connected wallet {} (seed label: {})", signer.address(), label);
            if invalidated {
                println!("The previous policy was signed by another identity and is no longer in force.");
            }
        }

        WalletCommands::Disconnect => {
            let Some(previous) = authority.ctx.identity() else {
                println!("No wallet connected.");
                return Ok(());
            };
            let invalidated = authority.ctx.disconnect()?;
            authority.session.wallet_label = None;
            authority.record_lifecycle(RecordKind::IdentityChanged, format!("disconnected {}", previous))?;
            authority.save(config)?;

            println!("Disconnected {}", previous);
            if invalidated {
                println!("Active policy invalidated.");
            }
        }

        WalletCommands::Status => {
            match (authority.ctx.identity(), &authority.session.wallet_label) {
                (Some(address), Some(label)) => println!("Wallet:   {} (seed label: {})", address, label),
                (Some(address), None) => println!("Wallet:   {}", address),
                (None, _) => {
                    println!("Wallet:   not connected");
                    return Ok(());
                }
            }

            let symbol = authority.settlement_symbol().to_string();
            let Some(active) = authority.ctx.active_policy() else {
                println!("Policy:   none (run `echo policy sign`)");
                return Ok(());
            };
            let limits = *active.policy().rate_limits();
            let spend = *active.policy().spend_limits();
            println!("Policy:   {} ({:?} schema)", active.policy_hash(), active.schema());

            if let Some(counters) = authority.ctx.counters(Utc::now()) {
                println!(
                    "Today:    {} / {} {} spent, {} / {} actions",
                    counters.day_spend, spend.max_daily_spend, symbol, counters.day_count, limits.max_per_day
                );
                println!(
                    "This hour: {} / {} actions, {} / {} in flight",
                    counters.hour_count, limits.max_per_hour, counters.in_flight, limits.max_concurrent
                );
            }
        }
    }

    Ok(())
}
