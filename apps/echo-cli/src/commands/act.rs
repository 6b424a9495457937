// act.rs — Evaluate a single agent action.
//
// A rejection is a normal outcome and exits successfully; only a missing
// wallet, a missing policy or an identity mismatch is an error.

use chrono::Utc;
use clap::Args;
use echo_authority::EchoConfig;
use echo_policy::{ActionRequest, TokenAmount};

use super::{decision_header, decision_line, Authority};

#[derive(Args)]
pub struct ActArgs {
    /// Intent id the action serves (e.g. sentiment.fetch).
    #[arg(long)]
    pub purpose: String,
    /// Endpoint id or URL the action pays.
    #[arg(long)]
    pub target: String,
    /// Amount in the settlement token (e.g. 0.03).
    #[arg(long)]
    pub amount: Option<TokenAmount>,
    /// Token symbol (defaults to the settlement token).
    #[arg(long)]
    pub token: Option<String>,
    /// Print the ordered checks that led to the decision.
    #[arg(long)]
    pub trace: bool,
    /// Print the decision as JSON.
    #[arg(long)]
    pub json: bool,
}

impl ActArgs {
    fn request(&self) -> ActionRequest {
        let mut action = ActionRequest::new(&self.purpose, &self.target);
        if let Some(amount) = self.amount {
            action = action.with_amount(amount);
        }
        if let Some(token) = &self.token {
            action = action.with_token(token);
        }
        action
    }
}

pub fn execute(args: &ActArgs, config: &EchoConfig) -> anyhow::Result<()> {
    let mut authority = Authority::open(config)?;

    let event = if args.trace {
        let (evaluation, trace) = authority.ctx.evaluate_with_trace(args.request(), Utc::now())?;
        if let Some(reservation) = evaluation.reservation {
            authority.ctx.complete(reservation);
        }
        authority.record_decision(&evaluation.event)?;
        for step in &trace.steps {
            println!(
                "  {:<10} {}{}",
                step.check,
                step.outcome,
                if step.terminal { "  (final)" } else { "" }
            );
        }
        if let Some(endpoint) = &trace.resolved_endpoint {
            println!("  endpoint   {}", endpoint);
        }
        println!();
        evaluation.event
    } else {
        authority.act(args.request())?
    };
    authority.save(config)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&event)?);
    } else {
        println!("{}", decision_header());
        println!("{}", decision_line(&event, authority.settlement_symbol()));
    }
    Ok(())
}
