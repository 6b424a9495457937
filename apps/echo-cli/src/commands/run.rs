// run.rs — Evaluate a batch of agent actions in one process.
//
// Each decision is logged and saved before the next is evaluated, so a batch
// that fails part way leaves the ledger matching the log.

use std::path::Path;

use anyhow::Context;
use echo_authority::EchoConfig;
use echo_policy::ActionRequest;

use super::{decision_header, decision_line, Authority};

pub fn execute(config: &EchoConfig, actions: &Path, json: bool) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(actions)
        .with_context(|| format!("Failed to read actions file {}", actions.display()))?;
    let requests: Vec<ActionRequest> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of actions", actions.display()))?;

    let mut authority = Authority::open(config)?;
    let symbol = authority.settlement_symbol().to_string();

    if !json {
        println!("{}", decision_header());
        println!("{}", "-".repeat(120));
    }

    let mut authorized = 0;
    let total = requests.len();
    for request in requests {
        let event = authority.act(request)?;
        // Counters hit disk with every committed decision, not once per batch.
        authority.save(config)?;
        if event.is_authorized() {
            authorized += 1;
        }
        if json {
            println!("{}", serde_json::to_string(&event)?);
        } else {
            println!("{}", decision_line(&event, &symbol));
        }
    }

    if !json {
        println!();
        println!("{} action(s): {} authorized, {} rejected.", total, authorized, total - authorized);
    }
    Ok(())
}
