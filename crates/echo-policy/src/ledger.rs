// ledger.rs — Rolling rate and spend counters per active policy.
//
// Counters are bucketed by epoch hour and epoch day. Moving into a new bucket
// resets only the counter for that bucket; the in-flight count is not
// time-based and only drops when an action completes.
//
// `try_reserve` is a pure function of (counters, policy, amount, now). The
// decision engine calls it and commits the result while holding its lock, so
// check and increment form one atomic step.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::amount::TokenAmount;
use crate::event::RejectionRule;
use crate::policy::Policy;

const SECONDS_PER_HOUR: i64 = 3_600;
const SECONDS_PER_DAY: i64 = 86_400;

/// Identifies the policy a set of counters belongs to (its canonical hash, hex).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyId(String);

impl PolicyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn epoch_hour(now: DateTime<Utc>) -> i64 {
    now.timestamp().div_euclid(SECONDS_PER_HOUR)
}

pub fn epoch_day(now: DateTime<Utc>) -> i64 {
    now.timestamp().div_euclid(SECONDS_PER_DAY)
}

/// Usage counters for one policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerCounters {
    pub hour_bucket: i64,
    pub day_bucket: i64,
    pub hour_count: u32,
    pub day_count: u32,
    pub in_flight: u32,
    pub day_spend: TokenAmount,
}

impl LedgerCounters {
    /// Fresh counters positioned at the buckets containing `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            hour_bucket: epoch_hour(now),
            day_bucket: epoch_day(now),
            hour_count: 0,
            day_count: 0,
            in_flight: 0,
            day_spend: TokenAmount::ZERO,
        }
    }

    /// These counters as seen at `now`, with any elapsed bucket reset.
    pub fn rolled_to(&self, now: DateTime<Utc>) -> Self {
        let mut next = *self;
        let hour = epoch_hour(now);
        if hour != next.hour_bucket {
            next.hour_bucket = hour;
            next.hour_count = 0;
        }
        let day = epoch_day(now);
        if day != next.day_bucket {
            next.day_bucket = day;
            next.day_count = 0;
            next.day_spend = TokenAmount::ZERO;
        }
        next
    }

    fn check_rate(&self, policy: &Policy) -> Result<(), RejectionRule> {
        let limits = policy.rate_limits();
        if self.hour_count.saturating_add(1) > limits.max_per_hour
            || self.day_count.saturating_add(1) > limits.max_per_day
            || self.in_flight.saturating_add(1) > limits.max_concurrent
        {
            return Err(RejectionRule::RateLimitExceeded);
        }
        Ok(())
    }

    fn check_spend(&self, policy: &Policy, amount: TokenAmount) -> Result<TokenAmount, RejectionRule> {
        let limits = policy.spend_limits();
        if amount > limits.max_per_action {
            return Err(RejectionRule::SpendLimitExceeded);
        }
        match self.day_spend.checked_add(amount) {
            Some(total) if total <= limits.max_daily_spend => Ok(total),
            _ => Err(RejectionRule::SpendLimitExceeded),
        }
    }

    fn reserved(&self, day_spend: TokenAmount) -> Self {
        Self {
            hour_count: self.hour_count + 1,
            day_count: self.day_count + 1,
            in_flight: self.in_flight + 1,
            day_spend,
            ..*self
        }
    }

    fn released(&self) -> Self {
        Self {
            in_flight: self.in_flight.saturating_sub(1),
            ..*self
        }
    }
}

/// Which ledger check failed, for the evaluation trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerCheck {
    Rate,
    Spend,
}

/// Outcome of a reservation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reserve {
    pub ok: bool,
    /// Counters to commit when `ok`; the unchanged (rolled) counters otherwise.
    pub counters: LedgerCounters,
    pub violation: Option<(LedgerCheck, RejectionRule)>,
}

/// Pure reservation check: rate first, then spend.
pub fn try_reserve(
    current: &LedgerCounters,
    policy: &Policy,
    amount: TokenAmount,
    now: DateTime<Utc>,
) -> Reserve {
    let rolled = current.rolled_to(now);

    if let Err(rule) = rolled.check_rate(policy) {
        return Reserve {
            ok: false,
            counters: rolled,
            violation: Some((LedgerCheck::Rate, rule)),
        };
    }

    match rolled.check_spend(policy, amount) {
        Ok(day_spend) => Reserve {
            ok: true,
            counters: rolled.reserved(day_spend),
            violation: None,
        },
        Err(rule) => Reserve {
            ok: false,
            counters: rolled,
            violation: Some((LedgerCheck::Spend, rule)),
        },
    }
}

/// Counters for every policy seen by one signer context.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ledger {
    counters: HashMap<PolicyId, LedgerCounters>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counters for a policy, rolled to `now`.
    pub fn counters(&self, policy_id: &PolicyId, now: DateTime<Utc>) -> LedgerCounters {
        self.counters
            .get(policy_id)
            .map(|c| c.rolled_to(now))
            .unwrap_or_else(|| LedgerCounters::new(now))
    }

    pub fn commit(&mut self, policy_id: &PolicyId, counters: LedgerCounters) {
        self.counters.insert(policy_id.clone(), counters);
    }

    /// Release one in-flight slot.
    pub fn release(&mut self, policy_id: &PolicyId) {
        if let Some(c) = self.counters.get_mut(policy_id) {
            *c = c.released();
        }
    }

    /// Forget the counters of one policy.
    pub fn reset(&mut self, policy_id: &PolicyId) {
        self.counters.remove(policy_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::policy::{PolicyBounds, PolicyDraft, RateLimits, SpendLimits};
    use chrono::TimeZone;

    fn policy(per_hour: u32, per_day: u32, concurrent: u32) -> Policy {
        PolicyDraft {
            allowed_intents: vec!["sentiment.fetch".to_string()],
            allowed_endpoints: vec!["genvox-sentiment".to_string()],
            rate_limits: RateLimits {
                max_per_hour: per_hour,
                max_per_day: per_day,
                max_concurrent: concurrent,
            },
            spend_limits: SpendLimits {
                max_per_action: TokenAmount::whole(50),
                max_daily_spend: TokenAmount::whole(120),
            },
            validity: None,
        }
        .validate(&Catalog::builtin(), &PolicyBounds::default())
        .unwrap()
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 14, h, m, 0).unwrap()
    }

    #[test]
    fn reserve_increments_every_counter() {
        let p = policy(3, 10, 2);
        let r = try_reserve(&LedgerCounters::new(at(10, 0)), &p, TokenAmount::whole(5), at(10, 1));
        assert!(r.ok);
        assert_eq!(r.counters.hour_count, 1);
        assert_eq!(r.counters.day_count, 1);
        assert_eq!(r.counters.in_flight, 1);
        assert_eq!(r.counters.day_spend, TokenAmount::whole(5));
    }

    #[test]
    fn failed_reserve_leaves_counters_unchanged() {
        let p = policy(3, 10, 5);
        let mut c = LedgerCounters::new(at(10, 0));
        c.day_spend = TokenAmount::whole(100);
        let r = try_reserve(&c, &p, TokenAmount::whole(30), at(10, 5));
        assert!(!r.ok);
        assert_eq!(r.counters, c);
        assert_eq!(r.violation, Some((LedgerCheck::Spend, RejectionRule::SpendLimitExceeded)));
    }

    #[test]
    fn per_action_cap_applies_before_daily_total() {
        let p = policy(3, 10, 5);
        let r = try_reserve(&LedgerCounters::new(at(10, 0)), &p, TokenAmount::whole(51), at(10, 0));
        assert_eq!(r.violation, Some((LedgerCheck::Spend, RejectionRule::SpendLimitExceeded)));
    }

    #[test]
    fn rate_is_checked_before_spend() {
        let p = policy(1, 10, 5);
        let mut c = LedgerCounters::new(at(10, 0));
        c.hour_count = 1;
        let r = try_reserve(&c, &p, TokenAmount::whole(500), at(10, 30));
        assert_eq!(r.violation, Some((LedgerCheck::Rate, RejectionRule::RateLimitExceeded)));
    }

    #[test]
    fn hour_rollover_resets_only_hour_counter() {
        let mut c = LedgerCounters::new(at(10, 0));
        c.hour_count = 3;
        c.day_count = 3;
        c.in_flight = 1;
        c.day_spend = TokenAmount::whole(20);

        let rolled = c.rolled_to(at(11, 0));
        assert_eq!(rolled.hour_count, 0);
        assert_eq!(rolled.day_count, 3);
        assert_eq!(rolled.in_flight, 1);
        assert_eq!(rolled.day_spend, TokenAmount::whole(20));
    }

    #[test]
    fn day_rollover_resets_day_counters_and_spend() {
        let mut c = LedgerCounters::new(at(23, 30));
        c.hour_count = 2;
        c.day_count = 9;
        c.day_spend = TokenAmount::whole(119);

        let next_day = Utc.with_ymd_and_hms(2026, 2, 15, 0, 5, 0).unwrap();
        let rolled = c.rolled_to(next_day);
        assert_eq!(rolled.hour_count, 0);
        assert_eq!(rolled.day_count, 0);
        assert_eq!(rolled.day_spend, TokenAmount::ZERO);
    }

    #[test]
    fn in_flight_blocks_until_released() {
        let p = policy(10, 10, 1);
        let id = PolicyId::new("p1");
        let mut ledger = Ledger::new();

        let first = try_reserve(&ledger.counters(&id, at(9, 0)), &p, TokenAmount::ZERO, at(9, 0));
        assert!(first.ok);
        ledger.commit(&id, first.counters);

        let second = try_reserve(&ledger.counters(&id, at(9, 1)), &p, TokenAmount::ZERO, at(9, 1));
        assert_eq!(second.violation.map(|(_, r)| r), Some(RejectionRule::RateLimitExceeded));

        ledger.release(&id);
        let third = try_reserve(&ledger.counters(&id, at(9, 2)), &p, TokenAmount::ZERO, at(9, 2));
        assert!(third.ok);
    }

    #[test]
    fn reset_forgets_a_policy() {
        let id = PolicyId::new("p1");
        let mut ledger = Ledger::new();
        let mut c = LedgerCounters::new(at(9, 0));
        c.day_count = 4;
        ledger.commit(&id, c);
        ledger.reset(&id);
        assert_eq!(ledger.counters(&id, at(9, 0)).day_count, 0);
    }
}
