// demo.rs — Play the built-in scenario end to end.
//
// A throwaway "echo-demo" wallet signs the balanced preset, then the scripted
// agent acts against it. With `--repeat`, the playback is rewound and every
// round starts from empty counters. No project state is touched.

use std::time::Duration;

use chrono::{NaiveTime, Utc};
use echo_authority::{sign_policy, EchoConfig, PolicyVerifier};
use echo_policy::{Catalog, Preset, RejectionRule};
use echo_typed_data::{LocalSigner, PolicySigner};

use crate::playback::{demo_script, Playback};

use super::{decision_header, decision_line};

const DEMO_TASK: &str = "Monitor market sentiment and place bids when conditions are favorable. \
     Operate automatically within my signed authority.";

pub fn execute(config: &EchoConfig, step_ms: u64, repeat: u32) -> anyhow::Result<()> {
    let settings = &config.settings;
    let verifier = PolicyVerifier::new(
        Catalog::builtin(),
        settings.bounds.clone(),
        settings.deployment.clone(),
    );
    let symbol = settings.deployment.token.symbol.clone();

    let wallet = LocalSigner::from_seed_label("echo-demo")?;
    let preset = Preset::named("balanced")?;
    let signed = sign_policy(
        &preset.draft,
        &verifier,
        settings.schema,
        &wallet,
        wallet.address(),
        Utc::now(),
    )?;

    println!("Task: {}", DEMO_TASK);
    println!();
    println!("Signed once by {} ({} preset)", signed.signer(), preset.name);
    println!("  Policy hash: {}", signed.policy_hash());
    println!(
        "  Limits:      {} {} per action, {} {} per day, {}/hour",
        preset.draft.spend_limits.max_per_action,
        symbol,
        preset.draft.spend_limits.max_daily_spend,
        symbol,
        preset.draft.rate_limits.max_per_hour
    );
    println!();

    let start = Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc() + chrono::Duration::hours(10);
    let mut playback = Playback::new(
        demo_script(),
        signed.policy().clone(),
        signed.policy_id(),
        symbol.clone(),
        start,
    );

    for round in 1..=repeat.max(1) {
        if round > 1 {
            playback.restart();
            println!();
            println!("Round {} of {}", round, repeat);
        }
        println!("{}", decision_header());
        println!("{}", "-".repeat(120));
        let mut authorized = 0;
        for event in playback.by_ref() {
            println!("{}", decision_line(&event, &symbol));
            match event.violated_rule {
                Some(rule) => println!("    agent: {}", agent_reaction(rule)),
                None => authorized += 1,
            }
            if step_ms > 0 {
                std::thread::sleep(Duration::from_millis(step_ms));
            }
        }

        println!();
        println!(
            "{} payment(s) authorized without asking again; every rejection was explained to the agent.",
            authorized
        );
    }
    Ok(())
}

/// How the scripted agent adapts after a rejection.
fn agent_reaction(rule: RejectionRule) -> &'static str {
    match rule {
        RejectionRule::PurposeNotAllowed => "Treasury operations are not permitted. Adjusting strategy.",
        RejectionRule::EndpointNotWhitelisted => {
            "Only approved x402 endpoints can receive payments. Switching to a whitelisted provider."
        }
        RejectionRule::RateLimitExceeded => "Hourly budget of actions used up. Waiting for the next window.",
        RejectionRule::SpendLimitExceeded => "Amount is over my limit. Trying a smaller bid.",
        RejectionRule::PolicyExpired | RejectionRule::PolicyNotYetActive => {
            "My authority is not in force. Pausing until the user signs again."
        }
    }
}
