//! # echo-policy
//!
//! Spending-authority policies for autonomous agents, and the engine that
//! decides each agent action against them.
//!
//! A [`PolicyDraft`] is validated against a closed [`Catalog`] into a
//! [`Policy`]. The [`DecisionEngine`] evaluates every [`ActionRequest`]
//! against the active policy and produces exactly one [`ActivityEvent`]:
//! authorized, or rejected with a single [`RejectionRule`].
//!
//! ## Key invariants
//!
//! - **Closed catalog**: a policy can only grant enabled intents and
//!   whitelisted endpoints. Disabled intents cannot be represented.
//! - **Fixed check order**: purpose, endpoint, rate, amount, validity.
//!   The first failure decides.
//! - **Atomic accounting**: the ledger check and increment happen under one
//!   lock. Rejections never change the counters.
//! - **Integer money**: amounts are held in smallest token units.

pub mod amount;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod event;
pub mod ledger;
pub mod policy;

pub use amount::TokenAmount;
pub use catalog::{Catalog, Endpoint, IntentId, IntentType};
pub use engine::{DecisionEngine, Evaluation, EvaluationStep, EvaluationTrace, Reservation};
pub use error::PolicyError;
pub use event::{ActionRequest, ActivityEvent, DecisionStatus, RejectionRule};
pub use ledger::{Ledger, LedgerCounters, PolicyId};
pub use policy::{Bound, Policy, PolicyBounds, PolicyDraft, Preset, RateLimits, SpendLimits, Validity};
