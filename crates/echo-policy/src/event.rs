// event.rs — Agent action requests and the decision records they produce.
//
// Every evaluated action yields exactly one ActivityEvent. Events are
// immutable once created and are kept for audit and rendering only; nothing
// in the decision core reads them back.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::amount::TokenAmount;

/// An action an agent wants to take, as submitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionRequest {
    /// Intent identifier (e.g. "sentiment.fetch").
    pub purpose: String,
    /// Endpoint id or URL the value would go to.
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<TokenAmount>,
    /// Token symbol the agent intends to pay in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl ActionRequest {
    pub fn new(purpose: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            purpose: purpose.into(),
            target: target.into(),
            amount: None,
            token: None,
        }
    }

    pub fn with_amount(mut self, amount: TokenAmount) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

/// The rule an action violated. Exactly one per rejected action.
///
/// These are expected outputs, not engine failures.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RejectionRule {
    PurposeNotAllowed,
    EndpointNotWhitelisted,
    RateLimitExceeded,
    SpendLimitExceeded,
    PolicyExpired,
    PolicyNotYetActive,
}

impl RejectionRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionRule::PurposeNotAllowed => "PurposeNotAllowed",
            RejectionRule::EndpointNotWhitelisted => "EndpointNotWhitelisted",
            RejectionRule::RateLimitExceeded => "RateLimitExceeded",
            RejectionRule::SpendLimitExceeded => "SpendLimitExceeded",
            RejectionRule::PolicyExpired => "PolicyExpired",
            RejectionRule::PolicyNotYetActive => "PolicyNotYetActive",
        }
    }

    /// Short human explanation, suitable for an agent adapting its next attempt.
    pub fn explanation(&self) -> &'static str {
        match self {
            RejectionRule::PurposeNotAllowed => "this action is outside what was authorized",
            RejectionRule::EndpointNotWhitelisted => "this endpoint is not on the approved list",
            RejectionRule::RateLimitExceeded => "too many actions in the current window",
            RejectionRule::SpendLimitExceeded => "amount exceeds the per-action or daily limit",
            RejectionRule::PolicyExpired => "the signed authority has expired",
            RejectionRule::PolicyNotYetActive => "the signed authority is not active yet",
        }
    }
}

impl fmt::Display for RejectionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Authorized,
    Rejected,
}

/// The decision record for one evaluated action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub status: DecisionStatus,
    pub action: ActionRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violated_rule: Option<RejectionRule>,
    /// Cumulative day spend after this action (authorized actions only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running_spend: Option<TokenAmount>,
}

impl ActivityEvent {
    pub fn authorized(action: ActionRequest, timestamp: DateTime<Utc>, running_spend: TokenAmount) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            status: DecisionStatus::Authorized,
            action,
            violated_rule: None,
            running_spend: Some(running_spend),
        }
    }

    pub fn rejected(action: ActionRequest, timestamp: DateTime<Utc>, rule: RejectionRule) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            status: DecisionStatus::Rejected,
            action,
            violated_rule: Some(rule),
            running_spend: None,
        }
    }

    pub fn is_authorized(&self) -> bool {
        self.status == DecisionStatus::Authorized
    }
}
