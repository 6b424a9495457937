// context.rs — SignerContext: the authority in force for one wallet identity.
//
// The context owns the connected identity, the authority store and the
// decision engine (with its ledger). It is passed explicitly to whoever
// evaluates actions; there is no global "current policy".
//
// When the identity changes or disconnects, the store invalidates the active
// policy and the engine is replaced with a fresh one, before any further
// decision can be made. Signing or clearing a policy does the same, so the
// ledger only ever holds counters for the policy in force.

use chrono::{DateTime, Utc};
use echo_policy::{
    ActionRequest, DecisionEngine, Evaluation, EvaluationTrace, Ledger, LedgerCounters, PolicyDraft,
    Reservation,
};
use echo_typed_data::{Address, PolicySigner, SigningSchema};

use crate::ceremony;
use crate::error::AuthorityError;
use crate::signed::SignedPolicy;
use crate::store::AuthorityStore;

pub struct SignerContext {
    identity: Option<Address>,
    store: AuthorityStore,
    engine: DecisionEngine,
    schema: SigningSchema,
}

impl SignerContext {
    /// A disconnected context around an opened store.
    pub fn new(store: AuthorityStore, schema: SigningSchema) -> Self {
        let engine = new_engine(&store, Ledger::default());
        Self {
            identity: None,
            store,
            engine,
            schema,
        }
    }

    /// Resume with the given identity and persisted ledger counters.
    ///
    /// The identity is observed first, so a stored policy belonging to
    /// someone else is dropped before the counters are adopted.
    pub fn resume(
        store: AuthorityStore,
        schema: SigningSchema,
        identity: Option<Address>,
        ledger: Ledger,
    ) -> Result<Self, AuthorityError> {
        let mut ctx = Self::new(store, schema);
        let cleared = ctx.store.observe_identity(identity)?;
        ctx.identity = identity;
        if !cleared && identity.is_some() {
            ctx.engine = new_engine(&ctx.store, ledger);
        }
        Ok(ctx)
    }

    pub fn identity(&self) -> Option<Address> {
        self.identity
    }

    pub fn schema(&self) -> SigningSchema {
        self.schema
    }

    pub fn store(&self) -> &AuthorityStore {
        &self.store
    }

    pub fn active_policy(&self) -> Option<&SignedPolicy> {
        self.store.get()
    }

    /// Connect (or switch to) a wallet identity.
    ///
    /// Returns true if an active policy was invalidated.
    pub fn connect(&mut self, identity: Address) -> Result<bool, AuthorityError> {
        self.observe(Some(identity))
    }

    /// Returns true if an active policy was invalidated.
    pub fn disconnect(&mut self) -> Result<bool, AuthorityError> {
        self.observe(None)
    }

    fn observe(&mut self, identity: Option<Address>) -> Result<bool, AuthorityError> {
        let changed = identity != self.identity;
        let cleared = self.store.observe_identity(identity)?;
        self.identity = identity;
        if changed || cleared {
            self.engine = new_engine(&self.store, Ledger::default());
        }
        Ok(cleared)
    }

    /// Run the signing ceremony and, on success, make the result active with
    /// empty counters.
    ///
    /// On any failure the previously active policy (if any) stays in force,
    /// counters included.
    pub fn sign_policy(
        &mut self,
        draft: &PolicyDraft,
        signer: &dyn PolicySigner,
        now: DateTime<Utc>,
    ) -> Result<&SignedPolicy, AuthorityError> {
        let connected = self.identity.ok_or(AuthorityError::NotConnected)?;
        let signed = ceremony::sign_policy(
            draft,
            self.store.verifier(),
            self.schema,
            signer,
            connected,
            now,
        )?;
        self.store.set(signed)?;
        self.engine = new_engine(&self.store, Ledger::default());
        self.store.get().ok_or(AuthorityError::NoActivePolicy)
    }

    pub fn clear_policy(&mut self) -> Result<(), AuthorityError> {
        self.store.clear()?;
        self.engine = new_engine(&self.store, Ledger::default());
        Ok(())
    }

    /// Evaluate one agent action against the active policy.
    pub fn evaluate(&self, action: ActionRequest, now: DateTime<Utc>) -> Result<Evaluation, AuthorityError> {
        let active = self.authority()?;
        Ok(self
            .engine
            .evaluate(active.policy(), &active.policy_id(), action, now))
    }

    pub fn evaluate_with_trace(
        &self,
        action: ActionRequest,
        now: DateTime<Utc>,
    ) -> Result<(Evaluation, EvaluationTrace), AuthorityError> {
        let active = self.authority()?;
        Ok(self
            .engine
            .evaluate_with_trace(active.policy(), &active.policy_id(), action, now))
    }

    /// Mark an authorized action as finished.
    pub fn complete(&self, reservation: Reservation) {
        self.engine.complete(reservation);
    }

    /// Counters for the active policy.
    pub fn counters(&self, now: DateTime<Utc>) -> Option<LedgerCounters> {
        self.store
            .get()
            .map(|active| self.engine.counters(&active.policy_id(), now))
    }

    pub fn ledger_snapshot(&self) -> Ledger {
        self.engine.ledger_snapshot()
    }

    fn authority(&self) -> Result<&SignedPolicy, AuthorityError> {
        let identity = self.identity.ok_or(AuthorityError::NotConnected)?;
        let active = self.store.get().ok_or(AuthorityError::NoActivePolicy)?;
        if active.signer() != identity {
            return Err(AuthorityError::IdentityMismatch {
                connected: identity.to_string(),
                policy_signer: active.signer().to_string(),
            });
        }
        Ok(active)
    }
}

fn new_engine(store: &AuthorityStore, ledger: Ledger) -> DecisionEngine {
    DecisionEngine::with_ledger(ledger)
        .with_settlement_symbol(store.verifier().deployment.token.symbol.clone())
}
