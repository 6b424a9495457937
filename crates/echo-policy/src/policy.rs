// policy.rs — The spending-authority policy and its validation boundary.
//
// A `PolicyDraft` is raw, untrusted input (a form, a JSON file, a preset).
// `PolicyDraft::validate()` is the only way to obtain a `Policy`; everything
// downstream (hashing, signing, decisions) can therefore rely on:
//
// - every intent is an enabled catalog member,
// - every endpoint is a catalog member,
// - every numeric field is within its configured bound,
// - neither set is empty.
//
// `maxPerAction <= maxDailySpend` is not enforced here. The decision engine
// checks both limits on every action.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::amount::TokenAmount;
use crate::catalog::{Catalog, Endpoint, IntentId};
use crate::error::PolicyError;
use crate::event::RejectionRule;

/// Inclusive numeric bound for a policy field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Bound {
    pub min: u64,
    pub max: u64,
}

impl Bound {
    pub const fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    fn check(&self, field: &'static str, value: u64) -> Result<(), PolicyError> {
        if value < self.min || value > self.max {
            return Err(out_of_bounds(field, value, self.min, self.max));
        }
        Ok(())
    }

    /// Amount bounds are expressed in whole tokens.
    fn check_amount(&self, field: &'static str, value: TokenAmount) -> Result<(), PolicyError> {
        let min = TokenAmount::whole(self.min);
        let max = TokenAmount::whole(self.max);
        if value < min || value > max {
            return Err(out_of_bounds(field, value, self.min, self.max));
        }
        Ok(())
    }
}

fn out_of_bounds(field: &'static str, value: impl Display, min: u64, max: u64) -> PolicyError {
    PolicyError::OutOfBounds {
        field,
        value: value.to_string(),
        min: min.to_string(),
        max: max.to_string(),
    }
}

/// Configured bounds for every numeric policy field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct PolicyBounds {
    pub max_per_hour: Bound,
    pub max_per_day: Bound,
    pub max_concurrent: Bound,
    pub max_per_action: Bound,
    pub max_daily_spend: Bound,
}

impl Default for PolicyBounds {
    fn default() -> Self {
        Self {
            max_per_hour: Bound::new(1, 10),
            max_per_day: Bound::new(1, 100),
            max_concurrent: Bound::new(1, 5),
            max_per_action: Bound::new(1, 1000),
            max_daily_spend: Bound::new(1, 10_000),
        }
    }
}

/// Execution-rate constraints.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RateLimits {
    pub max_per_hour: u32,
    pub max_per_day: u32,
    pub max_concurrent: u32,
}

/// Financial constraints, in the settlement token.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SpendLimits {
    pub max_per_action: TokenAmount,
    pub max_daily_spend: TokenAmount,
}

/// Optional validity window. Either end may be open.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Validity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_after: Option<DateTime<Utc>>,
}

impl Validity {
    pub fn between(not_before: DateTime<Utc>, not_after: DateTime<Utc>) -> Self {
        Self {
            not_before: Some(not_before),
            not_after: Some(not_after),
        }
    }

    /// Check `now` against the window (both ends inclusive).
    pub fn check(&self, now: DateTime<Utc>) -> Result<(), RejectionRule> {
        if let Some(nb) = self.not_before {
            if now < nb {
                return Err(RejectionRule::PolicyNotYetActive);
            }
        }
        if let Some(na) = self.not_after {
            if now > na {
                return Err(RejectionRule::PolicyExpired);
            }
        }
        Ok(())
    }
}

/// Raw, unvalidated policy input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDraft {
    pub allowed_intents: Vec<String>,
    pub allowed_endpoints: Vec<String>,
    pub rate_limits: RateLimits,
    pub spend_limits: SpendLimits,
    #[serde(default)]
    pub validity: Option<Validity>,
}

impl PolicyDraft {
    /// Validate against a catalog and bounds, producing an immutable [`Policy`].
    ///
    /// Pure: no side effects. Fails on the first offending field.
    pub fn validate(&self, catalog: &Catalog, bounds: &PolicyBounds) -> Result<Policy, PolicyError> {
        if self.allowed_intents.is_empty() {
            return Err(PolicyError::EmptySet {
                field: "allowedIntents",
            });
        }
        if self.allowed_endpoints.is_empty() {
            return Err(PolicyError::EmptySet {
                field: "allowedEndpoints",
            });
        }

        let allowed_intents = self
            .allowed_intents
            .iter()
            .map(|id| catalog.enabled_intent(id))
            .collect::<Result<BTreeSet<_>, _>>()?;

        let allowed_endpoints = self
            .allowed_endpoints
            .iter()
            .map(|id| catalog.endpoint(id).map(|e| (e.id.clone(), e.clone())))
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        let rl = &self.rate_limits;
        bounds.max_per_hour.check("maxPerHour", rl.max_per_hour.into())?;
        bounds.max_per_day.check("maxPerDay", rl.max_per_day.into())?;
        bounds.max_concurrent.check("maxConcurrent", rl.max_concurrent.into())?;

        let sl = &self.spend_limits;
        bounds.max_per_action.check_amount("maxPerAction", sl.max_per_action)?;
        bounds.max_daily_spend.check_amount("maxDailySpend", sl.max_daily_spend)?;

        if let Some(validity) = &self.validity {
            signable_bound("notBefore", validity.not_before)?;
            signable_bound("notAfter", validity.not_after)?;
        }

        if let Some(Validity {
            not_before: Some(nb),
            not_after: Some(na),
        }) = self.validity
        {
            if nb > na {
                return Err(PolicyError::InvertedValidity {
                    not_before: nb.to_rfc3339(),
                    not_after: na.to_rfc3339(),
                });
            }
        }

        Ok(Policy {
            allowed_intents,
            allowed_endpoints,
            rate_limits: self.rate_limits,
            spend_limits: self.spend_limits,
            validity: self.validity.unwrap_or_default(),
        })
    }
}

/// Validity bounds are signed as unix seconds, with 0 meaning "open".
fn signable_bound(field: &'static str, bound: Option<DateTime<Utc>>) -> Result<(), PolicyError> {
    let Some(t) = bound else {
        return Ok(());
    };
    let reason = if t.timestamp() < 0 {
        "is before 1970-01-01T00:00:00Z"
    } else if t.timestamp_subsec_nanos() != 0 {
        "is not a whole second"
    } else {
        return Ok(());
    };
    Err(PolicyError::UnsignableValidity {
        field,
        value: t.to_rfc3339(),
        reason,
    })
}

/// A validated spending-authority policy.
///
/// Fields are private: a `Policy` can only come out of
/// [`PolicyDraft::validate`], so its invariants hold everywhere.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    allowed_intents: BTreeSet<IntentId>,
    allowed_endpoints: BTreeMap<String, Endpoint>,
    rate_limits: RateLimits,
    spend_limits: SpendLimits,
    validity: Validity,
}

impl Policy {
    /// Allowed intents, sorted by id.
    pub fn allowed_intents(&self) -> impl Iterator<Item = &IntentId> {
        self.allowed_intents.iter()
    }

    /// Allowed endpoints, sorted by id.
    pub fn allowed_endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        self.allowed_endpoints.values()
    }

    pub fn allows_intent(&self, purpose: &str) -> bool {
        self.allowed_intents.iter().any(|i| i.as_str() == purpose)
    }

    /// Resolve an action target to one of the allowed endpoints.
    pub fn resolve_endpoint(&self, target: &str) -> Option<&Endpoint> {
        self.allowed_endpoints
            .values()
            .find(|e| e.matches_target(target))
    }

    pub fn rate_limits(&self) -> &RateLimits {
        &self.rate_limits
    }

    pub fn spend_limits(&self) -> &SpendLimits {
        &self.spend_limits
    }

    pub fn validity(&self) -> &Validity {
        &self.validity
    }

    /// Back to raw input form (used when persisting and re-validating).
    pub fn to_draft(&self) -> PolicyDraft {
        PolicyDraft {
            allowed_intents: self.allowed_intents.iter().map(|i| i.to_string()).collect(),
            allowed_endpoints: self.allowed_endpoints.keys().cloned().collect(),
            rate_limits: self.rate_limits,
            spend_limits: self.spend_limits,
            validity: if self.validity == Validity::default() {
                None
            } else {
                Some(self.validity)
            },
        }
    }
}

/// A named, ready-made policy configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Preset {
    pub name: &'static str,
    pub description: &'static str,
    pub draft: PolicyDraft,
}

impl Preset {
    /// The built-in presets, most restrictive first.
    pub fn all() -> Vec<Preset> {
        let draft = |intents: &[&str], endpoints: &[&str], per_action: u64, daily: u64, per_hour: u32| {
            PolicyDraft {
                allowed_intents: intents.iter().map(|s| s.to_string()).collect(),
                allowed_endpoints: endpoints.iter().map(|s| s.to_string()).collect(),
                rate_limits: RateLimits {
                    max_per_hour: per_hour,
                    max_per_day: 10,
                    max_concurrent: 1,
                },
                spend_limits: SpendLimits {
                    max_per_action: TokenAmount::whole(per_action),
                    max_daily_spend: TokenAmount::whole(daily),
                },
                validity: None,
            }
        };

        vec![
            Preset {
                name: "conservative",
                description: "Read-only data + minimal spend",
                draft: draft(&["sentiment.fetch"], &["genvox-sentiment"], 10, 50, 2),
            },
            Preset {
                name: "balanced",
                description: "Data + trading within limits",
                draft: draft(
                    &["sentiment.fetch", "auction.bid"],
                    &["genvox-sentiment", "auction-bid", "asterpay-settle"],
                    50,
                    120,
                    3,
                ),
            },
            Preset {
                name: "permissive",
                description: "Full automation capabilities",
                draft: draft(
                    &["sentiment.fetch", "auction.bid", "nft.mint", "custom.analytics"],
                    &["genvox-sentiment", "auction-bid", "nft-mint", "asterpay-settle"],
                    100,
                    500,
                    10,
                ),
            },
        ]
    }

    pub fn named(name: &str) -> Result<Preset, PolicyError> {
        Self::all()
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| PolicyError::UnknownPreset {
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn draft() -> PolicyDraft {
        PolicyDraft {
            allowed_intents: vec!["sentiment.fetch".to_string(), "auction.bid".to_string()],
            allowed_endpoints: vec!["genvox-sentiment".to_string()],
            rate_limits: RateLimits {
                max_per_hour: 3,
                max_per_day: 10,
                max_concurrent: 1,
            },
            spend_limits: SpendLimits {
                max_per_action: TokenAmount::whole(50),
                max_daily_spend: TokenAmount::whole(120),
            },
            validity: None,
        }
    }

    fn validate(d: &PolicyDraft) -> Result<Policy, PolicyError> {
        d.validate(&Catalog::builtin(), &PolicyBounds::default())
    }

    #[test]
    fn valid_draft_produces_policy() {
        let policy = validate(&draft()).unwrap();
        assert!(policy.allows_intent("sentiment.fetch"));
        assert!(policy.allows_intent("auction.bid"));
        assert!(!policy.allows_intent("nft.mint"));
        assert_eq!(policy.allowed_endpoints().count(), 1);
    }

    #[test]
    fn disabled_intent_is_invalid() {
        let mut d = draft();
        d.allowed_intents.push("treasury.transfer".to_string());
        assert_eq!(
            validate(&d),
            Err(PolicyError::DisabledIntent {
                id: "treasury.transfer".to_string()
            })
        );
    }

    #[test]
    fn unknown_endpoint_is_invalid() {
        let mut d = draft();
        d.allowed_endpoints.push("https://random-api.com".to_string());
        assert!(matches!(validate(&d), Err(PolicyError::UnknownEndpoint { .. })));
    }

    #[test]
    fn empty_sets_are_invalid() {
        let mut d = draft();
        d.allowed_intents.clear();
        assert_eq!(
            validate(&d),
            Err(PolicyError::EmptySet {
                field: "allowedIntents"
            })
        );

        let mut d = draft();
        d.allowed_endpoints.clear();
        assert_eq!(
            validate(&d),
            Err(PolicyError::EmptySet {
                field: "allowedEndpoints"
            })
        );
    }

    #[test]
    fn numeric_bounds_are_enforced_at_both_ends() {
        let cases: Vec<(&str, Box<dyn Fn(&mut PolicyDraft)>)> = vec![
            ("maxPerHour", Box::new(|d: &mut PolicyDraft| d.rate_limits.max_per_hour = 0)),
            ("maxPerHour", Box::new(|d: &mut PolicyDraft| d.rate_limits.max_per_hour = 11)),
            ("maxPerDay", Box::new(|d: &mut PolicyDraft| d.rate_limits.max_per_day = 101)),
            ("maxConcurrent", Box::new(|d: &mut PolicyDraft| d.rate_limits.max_concurrent = 6)),
            (
                "maxPerAction",
                Box::new(|d: &mut PolicyDraft| d.spend_limits.max_per_action = TokenAmount::from_units(999_999)),
            ),
            (
                "maxPerAction",
                Box::new(|d: &mut PolicyDraft| d.spend_limits.max_per_action = TokenAmount::whole(1001)),
            ),
            (
                "maxDailySpend",
                Box::new(|d: &mut PolicyDraft| d.spend_limits.max_daily_spend = TokenAmount::whole(10_001)),
            ),
        ];

        for (expected_field, mutate) in cases {
            let mut d = draft();
            mutate(&mut d);
            match validate(&d) {
                Err(PolicyError::OutOfBounds { field, .. }) => assert_eq!(field, expected_field),
                other => panic!("expected OutOfBounds for {}, got {:?}", expected_field, other),
            }
        }
    }

    #[test]
    fn bounds_are_inclusive() {
        let mut d = draft();
        d.rate_limits.max_per_hour = 10;
        d.rate_limits.max_per_day = 100;
        d.rate_limits.max_concurrent = 5;
        d.spend_limits.max_per_action = TokenAmount::whole(1000);
        d.spend_limits.max_daily_spend = TokenAmount::whole(10_000);
        assert!(validate(&d).is_ok());
    }

    #[test]
    fn per_action_above_daily_is_allowed_at_model_layer() {
        let mut d = draft();
        d.spend_limits.max_per_action = TokenAmount::whole(500);
        d.spend_limits.max_daily_spend = TokenAmount::whole(100);
        assert!(validate(&d).is_ok());
    }

    #[test]
    fn inverted_validity_is_invalid() {
        let mut d = draft();
        d.validity = Some(Validity::between(
            Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap(),
        ));
        assert!(matches!(validate(&d), Err(PolicyError::InvertedValidity { .. })));
    }

    #[test]
    fn validity_bounds_must_be_whole_seconds_after_epoch() {
        let mut d = draft();
        d.validity = Some(Validity {
            not_before: Some(Utc.with_ymd_and_hms(1969, 12, 31, 23, 59, 59).unwrap()),
            not_after: None,
        });
        assert!(matches!(
            validate(&d),
            Err(PolicyError::UnsignableValidity { field: "notBefore", .. })
        ));

        let fractional = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap() + chrono::Duration::milliseconds(250);
        d.validity = Some(Validity {
            not_before: None,
            not_after: Some(fractional),
        });
        assert!(matches!(
            validate(&d),
            Err(PolicyError::UnsignableValidity { field: "notAfter", .. })
        ));

        d.validity = Some(Validity {
            not_before: Some(Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap()),
            not_after: Some(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()),
        });
        assert!(validate(&d).is_ok());
    }

    #[test]
    fn validity_window_check() {
        let v = Validity::between(
            Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 2, 28, 23, 59, 59).unwrap(),
        );
        assert_eq!(
            v.check(Utc.with_ymd_and_hms(2026, 1, 31, 12, 0, 0).unwrap()),
            Err(RejectionRule::PolicyNotYetActive)
        );
        assert_eq!(v.check(Utc.with_ymd_and_hms(2026, 2, 14, 12, 0, 0).unwrap()), Ok(()));
        assert_eq!(
            v.check(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()),
            Err(RejectionRule::PolicyExpired)
        );
        assert_eq!(Validity::default().check(Utc::now()), Ok(()));
    }

    #[test]
    fn draft_round_trips_through_policy() {
        let policy = validate(&draft()).unwrap();
        let again = validate(&policy.to_draft()).unwrap();
        assert_eq!(policy, again);
    }

    #[test]
    fn every_preset_validates() {
        for preset in Preset::all() {
            assert!(
                validate(&preset.draft).is_ok(),
                "preset {} should validate",
                preset.name
            );
        }
        assert!(Preset::named("balanced").is_ok());
        assert!(matches!(
            Preset::named("yolo"),
            Err(PolicyError::UnknownPreset { .. })
        ));
    }

    #[test]
    fn draft_parses_from_json() {
        let json = r#"{
            "allowedIntents": ["sentiment.fetch"],
            "allowedEndpoints": ["genvox-sentiment"],
            "rateLimits": { "maxPerHour": 3, "maxPerDay": 10, "maxConcurrent": 1 },
            "spendLimits": { "maxPerAction": 50, "maxDailySpend": "120" },
            "validity": { "notAfter": "2026-02-28T23:59:59Z" }
        }"#;
        let d: PolicyDraft = serde_json::from_str(json).unwrap();
        let policy = validate(&d).unwrap();
        assert_eq!(policy.spend_limits().max_daily_spend, TokenAmount::whole(120));
        assert!(policy.validity().not_before.is_none());
        assert!(policy.validity().not_after.is_some());
    }
}
