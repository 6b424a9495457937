// policy.rs — Policy subcommands: sign, show, clear, presets, typed-data.
//
// A draft starts from a preset (balanced unless told otherwise) and any flag
// given overrides that field, so `--preset conservative --max-per-hour 1`
// and a fully custom `--intents .. --endpoints ..` both work.

use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use echo_audit::RecordKind;
use echo_authority::EchoConfig;
use echo_policy::{Catalog, PolicyDraft, Preset, TokenAmount, Validity};
use echo_typed_data::typed_data;

use super::Authority;

#[derive(Subcommand)]
pub enum PolicyCommands {
    /// Sign a policy with the connected wallet and make it active.
    Sign(DraftArgs),
    /// Show the active signed policy.
    Show {
        /// Print the persisted record as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Revoke the active policy.
    Clear,
    /// List the built-in presets and the intent/endpoint catalog.
    Presets,
    /// Print the typed-data request a wallet would be asked to sign.
    TypedData(DraftArgs),
}

/// A policy draft, as a preset plus overrides.
#[derive(Args, Debug, Clone)]
pub struct DraftArgs {
    /// Preset to start from (conservative, balanced, permissive).
    #[arg(long, default_value = "balanced")]
    pub preset: String,
    /// Allowed intent ids, comma separated.
    #[arg(long, value_delimiter = ',')]
    pub intents: Vec<String>,
    /// Whitelisted endpoint ids, comma separated.
    #[arg(long, value_delimiter = ',')]
    pub endpoints: Vec<String>,
    #[arg(long)]
    pub max_per_hour: Option<u32>,
    #[arg(long)]
    pub max_per_day: Option<u32>,
    #[arg(long)]
    pub max_concurrent: Option<u32>,
    /// Largest single action, in the settlement token (e.g. 12.5).
    #[arg(long)]
    pub max_per_action: Option<TokenAmount>,
    /// Daily spend ceiling, in the settlement token.
    #[arg(long)]
    pub max_daily_spend: Option<TokenAmount>,
    /// Start of the validity window (RFC 3339).
    #[arg(long)]
    pub not_before: Option<DateTime<Utc>>,
    /// End of the validity window (RFC 3339).
    #[arg(long)]
    pub not_after: Option<DateTime<Utc>>,
}

impl DraftArgs {
    pub fn to_draft(&self) -> anyhow::Result<PolicyDraft> {
        let mut draft = Preset::named(&self.preset)?.draft;
        if !self.intents.is_empty() {
            draft.allowed_intents = self.intents.clone();
        }
        if !self.endpoints.is_empty() {
            draft.allowed_endpoints = self.endpoints.clone();
        }
        if let Some(n) = self.max_per_hour {
            draft.rate_limits.max_per_hour = n;
        }
        if let Some(n) = self.max_per_day {
            draft.rate_limits.max_per_day = n;
        }
        if let Some(n) = self.max_concurrent {
            draft.rate_limits.max_concurrent = n;
        }
        if let Some(amount) = self.max_per_action {
            draft.spend_limits.max_per_action = amount;
        }
        if let Some(amount) = self.max_daily_spend {
            draft.spend_limits.max_daily_spend = amount;
        }
        if self.not_before.is_some() || self.not_after.is_some() {
            draft.validity = Some(Validity {
                not_before: self.not_before,
                not_after: self.not_after,
            });
        }
        Ok(draft)
    }
}

pub fn execute(cmd: &PolicyCommands, config: &EchoConfig) -> anyhow::Result<()> {
    match cmd {
        PolicyCommands::Sign(args) => sign(args, config),
        PolicyCommands::Show { json } => show(config, *json),
        PolicyCommands::Clear => clear(config),
        PolicyCommands::Presets => {
            presets();
            Ok(())
        }
        PolicyCommands::TypedData(args) => {
            let authority = Authority::open(config)?;
            let verifier = authority.ctx.store().verifier();
            let policy = verifier.validate(&args.to_draft()?)?;
            let schema = authority.ctx.schema();
            let request = typed_data(&policy, &verifier.deployment, schema);
            println!("{}", serde_json::to_string_pretty(&request)?);
            eprintln!("digest: {}", verifier.digest(&policy, schema));
            Ok(())
        }
    }
}

fn sign(args: &DraftArgs, config: &EchoConfig) -> anyhow::Result<()> {
    let mut authority = Authority::open(config)?;
    let signer = authority.signer()?;
    let draft = args.to_draft()?;

    let signed = authority.ctx.sign_policy(&draft, &signer, Utc::now())?.clone();
    authority.record_lifecycle(
        RecordKind::PolicySigned,
        format!("signed from preset '{}' ({:?} schema)", args.preset, signed.schema()),
    )?;
    authority.save(config)?;

    println!("Policy signed and active.");
    println!("  Signer:      {}", signed.signer());
    println!("  Policy hash: {}", signed.policy_hash());
    println!("  Signature:   {}", signed.signature());
    print_policy(&draft, authority.settlement_symbol());
    Ok(())
}

fn show(config: &EchoConfig, json: bool) -> anyhow::Result<()> {
    let authority = Authority::open(config)?;
    let Some(active) = authority.ctx.active_policy() else {
        println!("No active policy.");
        return Ok(());
    };

    if json {
        let record = active.to_record(&authority.ctx.store().verifier().deployment);
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    println!("Signer:      {}", active.signer());
    println!("Signed at:   {}", active.signed_at().format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Schema:      {:?}", active.schema());
    println!("Policy hash: {}", active.policy_hash());
    print_policy(&active.policy().to_draft(), authority.settlement_symbol());
    Ok(())
}

fn clear(config: &EchoConfig) -> anyhow::Result<()> {
    let mut authority = Authority::open(config)?;
    let Some(revoked) = authority.ctx.active_policy().map(|p| p.policy_hash().to_string()) else {
        println!("No active policy.");
        return Ok(());
    };
    authority.ctx.clear_policy()?;
    authority.record_cleared(revoked, "revoked by user")?;
    authority.save(config)?;
    println!("Active policy cleared. Agent actions will be refused until a new policy is signed.");
    Ok(())
}

fn presets() {
    for preset in Preset::all() {
        let d = &preset.draft;
        println!("{:<14} {}", preset.name, preset.description);
        println!("  intents:   {}", d.allowed_intents.join(", "));
        println!("  endpoints: {}", d.allowed_endpoints.join(", "));
        println!(
            "  limits:    {} per action, {} per day, {} actions/hour",
            d.spend_limits.max_per_action, d.spend_limits.max_daily_spend, d.rate_limits.max_per_hour
        );
    }

    let catalog = Catalog::builtin();
    println!();
    println!("{:<20} {:<9} DESCRIPTION", "INTENT", "STATUS");
    println!("{}", "-".repeat(80));
    for intent in catalog.intents() {
        let status = if intent.enabled { "enabled" } else { "forbidden" };
        println!("{:<20} {:<9} {}", intent.id, status, intent.description);
    }

    println!();
    println!("{:<18} {:<44} PRICING", "ENDPOINT", "URI");
    println!("{}", "-".repeat(80));
    for endpoint in catalog.endpoints() {
        println!("{:<18} {:<44} {}", endpoint.id, endpoint.uri, endpoint.pricing_hint);
    }
}

fn print_policy(draft: &PolicyDraft, symbol: &str) {
    println!("  Intents:     {}", draft.allowed_intents.join(", "));
    println!("  Endpoints:   {}", draft.allowed_endpoints.join(", "));
    println!(
        "  Rate:        {}/hour, {}/day, {} concurrent",
        draft.rate_limits.max_per_hour, draft.rate_limits.max_per_day, draft.rate_limits.max_concurrent
    );
    println!(
        "  Spend:       {} {} per action, {} {} per day",
        draft.spend_limits.max_per_action, symbol, draft.spend_limits.max_daily_spend, symbol
    );
    if let Some(validity) = &draft.validity {
        let fmt = |t: Option<DateTime<Utc>>| {
            t.map(|t| t.to_rfc3339()).unwrap_or_else(|| "open".to_string())
        };
        println!("  Valid:       {} .. {}", fmt(validity.not_before), fmt(validity.not_after));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use echo_audit::ActivityLog;
    use echo_typed_data::{LocalSigner, PolicySigner};

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        draft: DraftArgs,
    }

    fn parse(args: &[&str]) -> PolicyDraft {
        let mut argv = vec!["echo"];
        argv.extend_from_slice(args);
        Wrapper::parse_from(argv).draft.to_draft().unwrap()
    }

    #[test]
    fn defaults_to_balanced_preset() {
        assert_eq!(parse(&[]), Preset::named("balanced").unwrap().draft);
    }

    #[test]
    fn flags_override_preset_fields() {
        let draft = parse(&[
            "--preset",
            "conservative",
            "--intents",
            "sentiment.fetch,auction.bid",
            "--max-per-action",
            "12.5",
            "--max-per-hour",
            "1",
        ]);
        assert_eq!(draft.allowed_intents, vec!["sentiment.fetch", "auction.bid"]);
        assert_eq!(draft.allowed_endpoints, vec!["genvox-sentiment"]);
        assert_eq!(draft.spend_limits.max_per_action, TokenAmount::from_units(12_500_000));
        assert_eq!(draft.rate_limits.max_per_hour, 1);
        assert!(draft.validity.is_none());
    }

    #[test]
    fn validity_flags_build_a_window() {
        let draft = parse(&["--not-after", "2030-01-01T00:00:00Z"]);
        let validity = draft.validity.unwrap();
        assert!(validity.not_before.is_none());
        assert_eq!(validity.not_after.unwrap().to_rfc3339(), "2030-01-01T00:00:00+00:00");
    }

    #[test]
    fn unknown_preset_is_an_error() {
        let args = Wrapper::parse_from(["echo", "--preset", "reckless"]).draft;
        assert!(args.to_draft().is_err());
    }

    #[test]
    fn clear_logs_the_revoked_hash_once_cleared() {
        let project = tempfile::tempdir().unwrap();
        let config = EchoConfig::load(project.path()).unwrap();
        let alice = LocalSigner::from_seed_label("alice").unwrap();

        let revoked = {
            let mut authority = Authority::open(&config).unwrap();
            authority.ctx.connect(alice.address()).unwrap();
            authority.session.wallet_label = Some("alice".to_string());
            let hash = authority
                .ctx
                .sign_policy(&Preset::named("balanced").unwrap().draft, &alice, Utc::now())
                .unwrap()
                .policy_hash()
                .to_string();
            authority.save(&config).unwrap();
            hash
        };

        clear(&config).unwrap();
        assert!(!config.authority_file.exists());

        let records = ActivityLog::read_all(&config.activity_log).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, RecordKind::PolicyCleared);
        assert_eq!(records[0].policy_hash.as_deref(), Some(revoked.as_str()));
        assert_eq!(records[0].signer.as_deref(), Some(alice.address().to_string().as_str()));

        // Nothing left to revoke: no second record.
        clear(&config).unwrap();
        assert_eq!(ActivityLog::read_all(&config.activity_log).unwrap().len(), 1);
    }
}
