// authority_flow.rs — End-to-end integration test for delegated spending authority.
//
// Flow:
//   1. Connect a wallet identity (deterministic local key)
//   2. Sign a policy once → persisted, verified signed authority
//   3. Agent acts repeatedly → each decision logged to the hash-chained log
//   4. Restart (reopen everything from disk) → authority and counters survive
//   5. Switch identity → authority dropped, agent refused
//   6. Verify the activity log, then tamper with it and detect the change

use std::fs;

use chrono::Utc;
use echo_audit::{ActivityLog, ActivityRecord, AuditError, RecordKind};
use echo_authority::{
    AuthorityError, AuthorityStore, EchoConfig, PolicyVerifier, Session, SignedPolicyRecord, SignerContext,
};
use echo_policy::{ActionRequest, Catalog, Preset, RejectionRule, TokenAmount};
use echo_typed_data::{recover_signer, LocalSigner, PolicySigner};
use tempfile::TempDir;

fn open_context(config: &EchoConfig) -> SignerContext {
    let verifier = PolicyVerifier::new(
        Catalog::builtin(),
        config.settings.bounds.clone(),
        config.settings.deployment.clone(),
    );
    let store = AuthorityStore::open(&config.authority_file, verifier).unwrap();
    let session = Session::load(&config.session_file).unwrap();
    SignerContext::resume(store, config.settings.schema, session.address, session.ledger).unwrap()
}

fn save_session(config: &EchoConfig, ctx: &SignerContext, label: Option<&str>) {
    Session {
        wallet_label: label.map(str::to_string),
        address: ctx.identity(),
        ledger: ctx.ledger_snapshot(),
    }
    .save(&config.session_file)
    .unwrap();
}

fn act(ctx: &SignerContext, log: &mut ActivityLog, action: ActionRequest) -> echo_policy::ActivityEvent {
    let evaluation = ctx.evaluate(action, Utc::now()).unwrap();
    if let Some(reservation) = evaluation.reservation {
        ctx.complete(reservation);
    }
    let mut record = ActivityRecord::decision(evaluation.event.clone());
    log.append(&mut record).unwrap();
    evaluation.event
}

fn usdc(amount: &str) -> TokenAmount {
    amount.parse().unwrap()
}

/// Full flow: connect, sign once, act, restart, switch identity, audit.
#[test]
fn authority_flow_sign_once_act_many() {
    let project = TempDir::new().unwrap();
    let config = EchoConfig::load(project.path()).unwrap();
    let alice = LocalSigner::from_seed_label("alice").unwrap();

    // =========================================================
    // 1–2. Connect and sign the balanced preset
    // =========================================================

    let mut ctx = open_context(&config);
    ctx.connect(alice.address()).unwrap();
    let signed = ctx
        .sign_policy(&Preset::named("balanced").unwrap().draft, &alice, Utc::now())
        .unwrap()
        .clone();
    assert_eq!(signed.signer(), alice.address());
    assert_eq!(
        recover_signer(signed.policy_hash(), signed.signature()).unwrap(),
        alice.address()
    );
    assert!(config.authority_file.exists());

    // The persisted record carries the flat signed fields.
    let persisted: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&config.authority_file).unwrap()).unwrap();
    assert_eq!(persisted["maxAmount"], "50");
    assert_eq!(persisted["endpointTag"], "demo-merchant");
    assert!(persisted["signature"].as_str().unwrap().starts_with("0x"));

    let mut log = ActivityLog::open(&config.activity_log).unwrap();
    let mut record = ActivityRecord::lifecycle(RecordKind::PolicySigned, "balanced")
        .with_signer(alice.address().to_string())
        .with_policy_hash(signed.policy_hash().to_string());
    log.append(&mut record).unwrap();

    // =========================================================
    // 3. Agent acts: two rejections, two payments
    // =========================================================

    let rejected = act(
        &ctx,
        &mut log,
        ActionRequest::new("treasury.transfer", "internal treasury").with_amount(usdc("40")),
    );
    assert_eq!(rejected.violated_rule, Some(RejectionRule::PurposeNotAllowed));

    let rejected = act(&ctx, &mut log, ActionRequest::new("sentiment.fetch", "https://random-api.com"));
    assert_eq!(rejected.violated_rule, Some(RejectionRule::EndpointNotWhitelisted));

    let ok = act(
        &ctx,
        &mut log,
        ActionRequest::new("sentiment.fetch", "https://api.genvox.io/v1/sentiment").with_amount(usdc("0.03")),
    );
    assert!(ok.is_authorized());
    let ok = act(
        &ctx,
        &mut log,
        ActionRequest::new("auction.bid", "auction-bid").with_amount(usdc("12.5")),
    );
    assert_eq!(ok.running_spend, Some(usdc("12.53")));
    save_session(&config, &ctx, Some("alice"));
    drop(ctx);

    // =========================================================
    // 4. Restart: authority and counters come back from disk
    // =========================================================

    let ctx = open_context(&config);
    assert_eq!(ctx.identity(), Some(alice.address()));
    assert_eq!(ctx.active_policy(), Some(&signed));

    let ok = act(
        &ctx,
        &mut log,
        ActionRequest::new("auction.bid", "https://asterpay.xyz/api/settle").with_amount(usdc("8.25")),
    );
    assert_eq!(ok.running_spend, Some(usdc("20.78")));

    // maxPerHour = 3: the fourth authorized-shaped action this hour is refused.
    let limited = act(
        &ctx,
        &mut log,
        ActionRequest::new("sentiment.fetch", "genvox-sentiment").with_amount(usdc("0.03")),
    );
    assert_eq!(limited.violated_rule, Some(RejectionRule::RateLimitExceeded));
    assert_eq!(ctx.counters(Utc::now()).unwrap().hour_count, 3);
    save_session(&config, &ctx, Some("alice"));
    drop(ctx);

    // =========================================================
    // 5. Switch identity: the policy no longer applies
    // =========================================================

    let bob = LocalSigner::from_seed_label("bob").unwrap();
    let mut ctx = open_context(&config);
    assert!(ctx.connect(bob.address()).unwrap());
    assert!(ctx.active_policy().is_none());
    assert!(!config.authority_file.exists());
    assert!(matches!(
        ctx.evaluate(ActionRequest::new("sentiment.fetch", "genvox-sentiment"), Utc::now()),
        Err(AuthorityError::NoActivePolicy)
    ));
    save_session(&config, &ctx, Some("bob"));

    // Reconnecting alice does not bring the old authority back.
    let mut ctx = open_context(&config);
    assert!(!ctx.connect(alice.address()).unwrap());
    assert!(ctx.active_policy().is_none());

    // =========================================================
    // 6. Audit: chain verifies, then tampering is detected
    // =========================================================

    drop(log);
    assert_eq!(ActivityLog::verify_chain(&config.activity_log).unwrap(), 7);

    let records = ActivityLog::read_all(&config.activity_log).unwrap();
    let decisions: Vec<_> = records.iter().filter_map(|r| r.event.as_ref()).collect();
    assert_eq!(decisions.len(), 6);
    assert_eq!(decisions.iter().filter(|e| e.is_authorized()).count(), 3);

    // Turn a rejection into an authorization after the fact.
    let content = fs::read_to_string(&config.activity_log).unwrap();
    let tampered = content.replacen("\"status\":\"rejected\"", "\"status\":\"authorized\"", 1);
    assert_ne!(content, tampered);
    fs::write(&config.activity_log, tampered).unwrap();
    assert!(matches!(
        ActivityLog::verify_chain(&config.activity_log),
        Err(AuditError::IntegrityViolation { line: 3, .. })
    ));
}

/// A hand-edited authority file is never honoured.
#[test]
fn tampered_authority_file_grants_nothing() {
    let project = TempDir::new().unwrap();
    let config = EchoConfig::load(project.path()).unwrap();
    let alice = LocalSigner::from_seed_label("alice").unwrap();

    let mut ctx = open_context(&config);
    ctx.connect(alice.address()).unwrap();
    ctx.sign_policy(&Preset::named("conservative").unwrap().draft, &alice, Utc::now())
        .unwrap();
    save_session(&config, &ctx, Some("alice"));
    drop(ctx);

    // Grant a forbidden intent without re-signing.
    let mut record: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&config.authority_file).unwrap()).unwrap();
    record["policy"]["allowedIntents"] = serde_json::json!(["sentiment.fetch", "auction.bid"]);
    fs::write(&config.authority_file, record.to_string()).unwrap();

    let ctx = open_context(&config);
    assert!(ctx.active_policy().is_none());
    assert!(matches!(
        ctx.evaluate(ActionRequest::new("auction.bid", "auction-bid"), Utc::now()),
        Err(AuthorityError::NoActivePolicy)
    ));
}

/// Settings in `.echo/config.toml` change what gets signed.
#[test]
fn config_overrides_reach_the_signed_record() {
    let project = TempDir::new().unwrap();
    fs::create_dir_all(project.path().join(".echo")).unwrap();
    fs::write(
        project.path().join(".echo/config.toml"),
        "schema = \"baseline\"\n\n[deployment]\nendpointTag = \"acme-merchant\"\n",
    )
    .unwrap();
    let config = EchoConfig::load(project.path()).unwrap();
    let alice = LocalSigner::from_seed_label("alice").unwrap();

    let mut ctx = open_context(&config);
    ctx.connect(alice.address()).unwrap();
    let signed = ctx
        .sign_policy(&Preset::named("balanced").unwrap().draft, &alice, Utc::now())
        .unwrap()
        .clone();
    assert_eq!(signed.schema(), echo_typed_data::SigningSchema::Baseline);
    save_session(&config, &ctx, Some("alice"));
    drop(ctx);

    let json = fs::read_to_string(&config.authority_file).unwrap();
    let persisted: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(persisted["endpointTag"], "acme-merchant");

    // Reopened with the same settings, it verifies.
    let ctx = open_context(&config);
    assert_eq!(ctx.identity(), Some(alice.address()));
    assert_eq!(ctx.active_policy(), Some(&signed));
    drop(ctx);

    // Checked under the default deployment, the recomputed hash differs.
    let record: SignedPolicyRecord = serde_json::from_str(&json).unwrap();
    assert!(matches!(
        PolicyVerifier::default().verify(&record),
        Err(AuthorityError::PolicyHashMismatch { .. })
    ));
}
