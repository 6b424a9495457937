// engine.rs — The decision engine: evaluates agent actions against a policy.
//
// Checks run in a fixed order and stop at the first failure:
//
//   purpose → endpoint → rate → amount → validity
//
// The ledger lock is held from the rate check until the commit, so two
// concurrent actions can never both pass a limit that only one of them fits
// under. A rejected action never touches the counters.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::amount::TokenAmount;
use crate::event::{ActionRequest, ActivityEvent, DecisionStatus, RejectionRule};
use crate::ledger::{try_reserve, Ledger, LedgerCheck, LedgerCounters, PolicyId};
use crate::policy::Policy;

/// A single step in the evaluation trace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvaluationStep {
    /// Which check was performed (e.g., "purpose", "endpoint", "rate").
    pub check: String,
    /// The outcome of this check (e.g., "passed", "failed: ...").
    pub outcome: String,
    /// Whether this step was the terminal decision point.
    pub terminal: bool,
}

/// Full trace of one evaluation, for `--explain` style output and debugging.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvaluationTrace {
    pub decision: DecisionStatus,
    pub violated_rule: Option<RejectionRule>,
    /// Ordered steps the engine evaluated.
    pub steps: Vec<EvaluationStep>,
    /// Endpoint the target resolved to, if any.
    pub resolved_endpoint: Option<String>,
}

/// Handle for an authorized action that still occupies an in-flight slot.
///
/// Pass it back to [`DecisionEngine::complete`] when the action finishes,
/// whether it succeeded or failed.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "an unreleased reservation holds an in-flight slot"]
pub struct Reservation {
    policy_id: PolicyId,
    event_id: Uuid,
}

impl Reservation {
    pub fn policy_id(&self) -> &PolicyId {
        &self.policy_id
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }
}

/// Result of evaluating one action.
#[derive(Debug)]
pub struct Evaluation {
    pub event: ActivityEvent,
    /// Present iff the action was authorized.
    pub reservation: Option<Reservation>,
}

/// Evaluates actions and owns the rate/spend ledger for one signer context.
#[derive(Debug, Default)]
pub struct DecisionEngine {
    ledger: Mutex<Ledger>,
    settlement_symbol: Option<String>,
}

impl DecisionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from previously persisted counters.
    pub fn with_ledger(ledger: Ledger) -> Self {
        Self {
            ledger: Mutex::new(ledger),
            settlement_symbol: None,
        }
    }

    /// Reject actions paying in any token other than `symbol`.
    pub fn with_settlement_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.settlement_symbol = Some(symbol.into());
        self
    }

    /// Evaluate one action. Exactly one event is produced.
    pub fn evaluate(
        &self,
        policy: &Policy,
        policy_id: &PolicyId,
        action: ActionRequest,
        now: DateTime<Utc>,
    ) -> Evaluation {
        self.run(policy, policy_id, action, now).0
    }

    /// Evaluate one action and return the ordered check trace alongside it.
    pub fn evaluate_with_trace(
        &self,
        policy: &Policy,
        policy_id: &PolicyId,
        action: ActionRequest,
        now: DateTime<Utc>,
    ) -> (Evaluation, EvaluationTrace) {
        let (evaluation, trace) = self.run(policy, policy_id, action, now);
        let trace = EvaluationTrace {
            decision: evaluation.event.status,
            violated_rule: evaluation.event.violated_rule,
            steps: trace.steps,
            resolved_endpoint: trace.resolved_endpoint,
        };
        (evaluation, trace)
    }

    /// Release the in-flight slot held by an authorized action.
    pub fn complete(&self, reservation: Reservation) {
        self.lock().release(&reservation.policy_id);
        tracing::debug!(
            policy = %reservation.policy_id,
            event = %reservation.event_id,
            "action completed, in-flight slot released"
        );
    }

    /// Current counters for a policy.
    pub fn counters(&self, policy_id: &PolicyId, now: DateTime<Utc>) -> LedgerCounters {
        self.lock().counters(policy_id, now)
    }

    /// Forget all counters for a policy (used when a new policy is activated).
    pub fn reset(&self, policy_id: &PolicyId) {
        self.lock().reset(policy_id);
    }

    /// Copy of the whole ledger, for persistence.
    pub fn ledger_snapshot(&self) -> Ledger {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        // Counters are plain data; a panic elsewhere cannot leave them torn.
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run(
        &self,
        policy: &Policy,
        policy_id: &PolicyId,
        action: ActionRequest,
        now: DateTime<Utc>,
    ) -> (Evaluation, TraceBuilder) {
        let mut trace = TraceBuilder::default();

        // 1. Purpose
        if !policy.allows_intent(&action.purpose) {
            trace.fail("purpose", format!("'{}' is not an allowed intent", action.purpose));
            return (reject(action, now, RejectionRule::PurposeNotAllowed), trace);
        }
        trace.pass("purpose", "passed".to_string());

        // 2. Endpoint
        let Some(endpoint) = policy.resolve_endpoint(&action.target) else {
            trace.fail(
                "endpoint",
                format!("'{}' does not resolve to an allowed endpoint", action.target),
            );
            return (reject(action, now, RejectionRule::EndpointNotWhitelisted), trace);
        };
        trace.pass("endpoint", format!("passed: resolved to '{}'", endpoint.id));
        trace.resolved_endpoint = Some(endpoint.id.clone());

        let amount = action.amount.unwrap_or(TokenAmount::ZERO);

        // 3 + 4 under the ledger lock, committed only after validity passes.
        let mut ledger = self.lock();
        let current = ledger.counters(policy_id, now);
        let reserve = try_reserve(&current, policy, amount, now);

        if let Some((check, rule)) = reserve.violation {
            drop(ledger);
            let detail = describe(check, &current, policy, amount);
            match check {
                LedgerCheck::Rate => trace.fail("rate", detail),
                LedgerCheck::Spend => {
                    trace.pass("rate", "passed".to_string());
                    trace.fail("amount", detail);
                }
            }
            return (reject(action, now, rule), trace);
        }
        trace.pass("rate", "passed".to_string());

        if let (Some(expected), Some(token)) = (&self.settlement_symbol, &action.token) {
            if !token.eq_ignore_ascii_case(expected) {
                drop(ledger);
                trace.fail(
                    "amount",
                    format!("token {} is not the settlement token {}", token, expected),
                );
                return (reject(action, now, RejectionRule::SpendLimitExceeded), trace);
            }
        }
        trace.pass(
            "amount",
            format!("passed: day spend would be {}", reserve.counters.day_spend),
        );

        // 5. Validity
        if let Err(rule) = policy.validity().check(now) {
            drop(ledger);
            trace.fail("validity", rule.to_string());
            return (reject(action, now, rule), trace);
        }
        trace.steps.push(EvaluationStep {
            check: "validity".to_string(),
            outcome: "passed".to_string(),
            terminal: true,
        });

        ledger.commit(policy_id, reserve.counters);
        drop(ledger);

        let event = ActivityEvent::authorized(action, now, reserve.counters.day_spend);
        tracing::debug!(
            purpose = %event.action.purpose,
            target = %event.action.target,
            spend = %reserve.counters.day_spend,
            "action authorized"
        );
        let reservation = Reservation {
            policy_id: policy_id.clone(),
            event_id: event.id,
        };
        let evaluation = Evaluation {
            event,
            reservation: Some(reservation),
        };
        (evaluation, trace)
    }
}

#[derive(Default)]
struct TraceBuilder {
    steps: Vec<EvaluationStep>,
    resolved_endpoint: Option<String>,
}

impl TraceBuilder {
    fn pass(&mut self, check: &str, outcome: String) {
        self.steps.push(EvaluationStep {
            check: check.to_string(),
            outcome,
            terminal: false,
        });
    }

    fn fail(&mut self, check: &str, reason: String) {
        self.steps.push(EvaluationStep {
            check: check.to_string(),
            outcome: format!("failed: {}", reason),
            terminal: true,
        });
    }
}

fn reject(action: ActionRequest, now: DateTime<Utc>, rule: RejectionRule) -> Evaluation {
    tracing::debug!(
        purpose = %action.purpose,
        target = %action.target,
        rule = %rule,
        "action rejected"
    );
    Evaluation {
        event: ActivityEvent::rejected(action, now, rule),
        reservation: None,
    }
}

fn describe(check: LedgerCheck, c: &LedgerCounters, policy: &Policy, amount: TokenAmount) -> String {
    match check {
        LedgerCheck::Rate => {
            let l = policy.rate_limits();
            format!(
                "hour {}/{}, day {}/{}, in flight {}/{}",
                c.hour_count, l.max_per_hour, c.day_count, l.max_per_day, c.in_flight, l.max_concurrent
            )
        }
        LedgerCheck::Spend => {
            let l = policy.spend_limits();
            format!(
                "amount {} (max {}), day spend {} of {}",
                amount, l.max_per_action, c.day_spend, l.max_daily_spend
            )
        }
    }
}
