// playback.rs — The scripted demo: a lazy, restartable stream of decisions.
//
// Each `next()` evaluates one scripted agent action against a real decision
// engine, at a fixed offset from the start of the scenario. Nothing is
// evaluated ahead of time, and `restart()` rewinds both the script and the
// ledger so the same sequence plays again.

use chrono::{DateTime, Duration, Utc};
use echo_policy::{ActionRequest, ActivityEvent, DecisionEngine, Policy, PolicyId, TokenAmount};

/// One step of the scenario.
#[derive(Debug, Clone)]
pub struct ScriptedAction {
    /// Minutes after the start of the scenario.
    pub at_minute: i64,
    pub action: ActionRequest,
}

/// The agent's morning: two mistakes it learns from, then three payments.
pub fn demo_script() -> Vec<ScriptedAction> {
    let usdc = |units: u64| TokenAmount::from_units(units);
    let step = |at_minute: i64, action: ActionRequest| ScriptedAction { at_minute, action };
    vec![
        step(
            2,
            ActionRequest::new("treasury.transfer", "internal treasury")
                .with_amount(TokenAmount::whole(40))
                .with_token("USDC"),
        ),
        step(3, ActionRequest::new("sentiment.fetch", "https://random-api.com")),
        step(
            4,
            ActionRequest::new("sentiment.fetch", "https://api.genvox.io/v1/sentiment")
                .with_amount(usdc(30_000))
                .with_token("USDC"),
        ),
        step(
            5,
            ActionRequest::new("auction.bid", "https://api.yourdemo.com/auction")
                .with_amount(usdc(12_500_000))
                .with_token("USDC"),
        ),
        step(
            6,
            ActionRequest::new("auction.bid", "https://asterpay.xyz/api/settle")
                .with_amount(usdc(8_250_000))
                .with_token("USDC"),
        ),
    ]
}

pub struct Playback {
    script: Vec<ScriptedAction>,
    policy: Policy,
    policy_id: PolicyId,
    engine: DecisionEngine,
    start: DateTime<Utc>,
    cursor: usize,
}

impl Playback {
    pub fn new(
        script: Vec<ScriptedAction>,
        policy: Policy,
        policy_id: PolicyId,
        settlement_symbol: impl Into<String>,
        start: DateTime<Utc>,
    ) -> Self {
        Self {
            script,
            policy,
            policy_id,
            engine: DecisionEngine::new().with_settlement_symbol(settlement_symbol),
            start,
            cursor: 0,
        }
    }

    /// Rewind to the first step with empty counters.
    pub fn restart(&mut self) {
        self.engine.reset(&self.policy_id);
        self.cursor = 0;
    }
}

impl Iterator for Playback {
    type Item = ActivityEvent;

    fn next(&mut self) -> Option<ActivityEvent> {
        let step = self.script.get(self.cursor)?.clone();
        self.cursor += 1;
        let now = self.start + Duration::minutes(step.at_minute);
        let evaluation = self.engine.evaluate(&self.policy, &self.policy_id, step.action, now);
        if let Some(reservation) = evaluation.reservation {
            self.engine.complete(reservation);
        }
        Some(evaluation.event)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.script.len().saturating_sub(self.cursor);
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use echo_policy::{Catalog, PolicyBounds, Preset, RejectionRule};

    fn playback() -> Playback {
        let policy = Preset::named("balanced")
            .unwrap()
            .draft
            .validate(&Catalog::builtin(), &PolicyBounds::default())
            .unwrap();
        let start = Utc.with_ymd_and_hms(2026, 3, 14, 10, 0, 0).unwrap();
        Playback::new(demo_script(), policy, PolicyId::new("demo"), "USDC", start)
    }

    #[test]
    fn scenario_rejects_twice_then_spends_20_78() {
        let events: Vec<ActivityEvent> = playback().collect();
        assert_eq!(events.len(), 5);
        assert_eq!(events[0].violated_rule, Some(RejectionRule::PurposeNotAllowed));
        assert_eq!(events[1].violated_rule, Some(RejectionRule::EndpointNotWhitelisted));
        assert!(events[2..].iter().all(|e| e.is_authorized()));
        assert_eq!(events[2].running_spend, Some(TokenAmount::from_units(30_000)));
        assert_eq!(events[3].running_spend, Some(TokenAmount::from_units(12_530_000)));
        assert_eq!(events[4].running_spend, Some(TokenAmount::from_units(20_780_000)));
        assert_eq!(events[4].running_spend.unwrap().to_string(), "20.78");
    }

    #[test]
    fn playback_is_lazy_and_restartable() {
        let mut playback = playback();
        assert_eq!(playback.size_hint(), (5, Some(5)));
        let first = playback.next().unwrap();
        assert_eq!(playback.size_hint(), (4, Some(4)));

        let rest: Vec<_> = playback.by_ref().collect();
        assert_eq!(rest.len(), 4);
        assert!(playback.next().is_none());

        playback.restart();
        let again: Vec<_> = playback.collect();
        assert_eq!(again.len(), 5);
        assert_eq!(again[0].action, first.action);
        assert_eq!(again[4].running_spend, Some(TokenAmount::from_units(20_780_000)));
    }

    #[test]
    fn events_follow_the_script_clock() {
        let events: Vec<_> = playback().collect();
        assert_eq!(events[0].timestamp.format("%H:%M").to_string(), "10:02");
        assert_eq!(events[4].timestamp.format("%H:%M").to_string(), "10:06");
    }
}
