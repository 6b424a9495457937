// mod.rs — Subcommands, plus the state they reopen on every invocation.
//
// Each invocation rebuilds the signer context from `.echo/`: the verified
// authority record and the session (wallet label and ledger counters).
// Commands that change anything append to the activity log and save the
// session before returning.
//
// The project lock is taken before anything is read and held until the
// `Authority` is dropped, so concurrent invocations run one after another
// and each sees the counters the previous one saved.

pub mod act;
pub mod audit;
pub mod demo;
pub mod policy;
pub mod run;
pub mod wallet;

use std::path::PathBuf;

use echo_audit::{ActivityLog, ActivityRecord, RecordKind};
use echo_authority::{AuthorityStore, EchoConfig, PolicyVerifier, ProjectLock, Session, SignerContext};
use echo_policy::{ActionRequest, ActivityEvent, Catalog};
use echo_typed_data::{LocalSigner, PolicySigner};

/// Everything a command needs to act on the project's authority.
pub struct Authority {
    pub session: Session,
    pub ctx: SignerContext,
    log_path: PathBuf,
    log: Option<ActivityLog>,
    _lock: ProjectLock,
}

impl Authority {
    pub fn open(config: &EchoConfig) -> anyhow::Result<Self> {
        let lock = ProjectLock::acquire(&config.lock_file)?;
        let verifier = PolicyVerifier::new(
            Catalog::builtin(),
            config.settings.bounds.clone(),
            config.settings.deployment.clone(),
        );
        let store = AuthorityStore::open(&config.authority_file, verifier)?;
        let session = Session::load(&config.session_file)?;
        let ctx = SignerContext::resume(
            store,
            config.settings.schema,
            session.address,
            session.ledger.clone(),
        )?;
        tracing::debug!(
            identity = ?ctx.identity().map(|a| a.to_string()),
            active_policy = ctx.active_policy().is_some(),
            "authority state loaded"
        );
        Ok(Self {
            session,
            ctx,
            log_path: config.activity_log.clone(),
            log: None,
            _lock: lock,
        })
    }

    /// The local key for the connected wallet.
    pub fn signer(&self) -> anyhow::Result<LocalSigner> {
        let Some(label) = &self.session.wallet_label else {
            anyhow::bail!("No wallet connected. Run `echo wallet connect --seed <label>` first.");
        };
        let signer = LocalSigner::from_seed_label(label)?;
        if Some(signer.address()) != self.ctx.identity() {
            anyhow::bail!(
                "Session wallet {} does not match its seed label; reconnect the wallet.",
                self.ctx
                    .identity()
                    .map(|a| a.to_string())
                    .unwrap_or_else(|| "(none)".to_string())
            );
        }
        Ok(signer)
    }

    /// Evaluate one action, complete it, and record the decision.
    pub fn act(&mut self, action: ActionRequest) -> anyhow::Result<ActivityEvent> {
        let evaluation = self.ctx.evaluate(action, chrono::Utc::now())?;
        if let Some(reservation) = evaluation.reservation {
            self.ctx.complete(reservation);
        }
        self.record_decision(&evaluation.event)?;
        Ok(evaluation.event)
    }

    pub fn record_decision(&mut self, event: &ActivityEvent) -> anyhow::Result<()> {
        let mut record = ActivityRecord::decision(event.clone());
        if let Some(active) = self.ctx.active_policy() {
            record = record
                .with_signer(active.signer().to_string())
                .with_policy_hash(active.policy_hash().to_string());
        }
        self.append(record)
    }

    pub fn record_lifecycle(&mut self, kind: RecordKind, detail: impl Into<String>) -> anyhow::Result<()> {
        let mut record = ActivityRecord::lifecycle(kind, detail);
        if let Some(identity) = self.ctx.identity() {
            record = record.with_signer(identity.to_string());
        }
        if let Some(active) = self.ctx.active_policy() {
            record = record.with_policy_hash(active.policy_hash().to_string());
        }
        self.append(record)
    }

    /// Record a revocation that has already happened. The policy is gone from
    /// the context by now, so its hash is passed in.
    pub fn record_cleared(&mut self, policy_hash: String, detail: impl Into<String>) -> anyhow::Result<()> {
        let mut record = ActivityRecord::lifecycle(RecordKind::PolicyCleared, detail).with_policy_hash(policy_hash);
        if let Some(identity) = self.ctx.identity() {
            record = record.with_signer(identity.to_string());
        }
        self.append(record)
    }

    /// Opens the log on first use, so read-only commands never create it.
    fn append(&mut self, mut record: ActivityRecord) -> anyhow::Result<()> {
        let log = match self.log.take() {
            Some(log) => log,
            None => ActivityLog::open(&self.log_path)?,
        };
        self.log.insert(log).append(&mut record)?;
        Ok(())
    }

    /// Persist the connected identity and the current ledger counters.
    pub fn save(&mut self, config: &EchoConfig) -> anyhow::Result<()> {
        self.session.address = self.ctx.identity();
        self.session.ledger = self.ctx.ledger_snapshot();
        self.session.save(&config.session_file)?;
        Ok(())
    }

    pub fn settlement_symbol(&self) -> &str {
        &self.ctx.store().verifier().deployment.token.symbol
    }
}

/// One table row for a decision.
pub fn decision_line(event: &ActivityEvent, symbol: &str) -> String {
    let amount = event
        .action
        .amount
        .map(|a| format!("{} {}", a, event.action.token.as_deref().unwrap_or(symbol)))
        .unwrap_or_else(|| "-".to_string());
    let outcome = match (&event.violated_rule, &event.running_spend) {
        (Some(rule), _) => format!("REJECTED  {} ({})", rule, rule.explanation()),
        (None, Some(spend)) => format!("AUTHORIZED  spend today {} {}", spend, symbol),
        (None, None) => "AUTHORIZED".to_string(),
    };
    format!(
        "{:<20} {:<18} {:<36} {:<14} {}",
        event.timestamp.format("%Y-%m-%d %H:%M:%S"),
        event.action.purpose,
        truncate(&event.action.target, 36),
        amount,
        outcome,
    )
}

pub fn decision_header() -> String {
    format!(
        "{:<20} {:<18} {:<36} {:<14} DECISION",
        "TIMESTAMP", "PURPOSE", "TARGET", "AMOUNT"
    )
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let kept: String = s.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", kept)
}
