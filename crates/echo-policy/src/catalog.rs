// catalog.rs — The closed catalog of intent types and whitelisted endpoints.
//
// A policy may only name intents and endpoints that appear here. Disabled
// intents (treasury transfers, arbitrary payments, withdrawals) are listed so
// that they can be *recognized* and refused, but an `IntentId` can only be
// obtained for an enabled member: there is no public constructor, so a Policy
// holding a disabled intent cannot be built, not even by hand.

use std::collections::BTreeMap;
use std::fmt;

use glob::Pattern;
use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

/// One entry in the intent catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IntentType {
    pub id: String,
    pub description: String,
    /// Disabled intents can never be granted.
    pub enabled: bool,
}

/// A whitelisted paid endpoint an agent may send value to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub id: String,
    pub label: String,
    pub uri: String,
    pub category: String,
    pub pricing_hint: String,
}

impl Endpoint {
    /// `scheme://host[:port]` of the endpoint URI, if it has one.
    pub fn origin(&self) -> Option<&str> {
        let (_, rest) = self.uri.split_once("://")?;
        let host_len = rest.find('/').unwrap_or(rest.len());
        if host_len == 0 {
            return None;
        }
        let scheme_len = self.uri.len() - rest.len();
        Some(&self.uri[..scheme_len + host_len])
    }

    /// Does an action target resolve to this endpoint?
    ///
    /// A target resolves when it is the endpoint id, the exact URI, or any
    /// URL on the same origin. Targets containing ".." never resolve.
    pub fn matches_target(&self, target: &str) -> bool {
        if contains_path_traversal(target) {
            return false;
        }
        if target == self.id || target == self.uri {
            return true;
        }
        match self.origin() {
            Some(origin) => {
                target == origin || matches_origin_pattern(origin, target)
            }
            None => false,
        }
    }
}

/// A catalog intent id that is known to be enabled.
///
/// Only [`Catalog::enabled_intent`] can produce one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct IntentId(String);

impl IntentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The closed catalog: every intent and endpoint a policy may refer to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    intents: BTreeMap<String, IntentType>,
    endpoints: BTreeMap<String, Endpoint>,
}

impl Catalog {
    /// Build a catalog from explicit entries (later duplicates win).
    pub fn new(intents: Vec<IntentType>, endpoints: Vec<Endpoint>) -> Self {
        Self {
            intents: intents.into_iter().map(|i| (i.id.clone(), i)).collect(),
            endpoints: endpoints.into_iter().map(|e| (e.id.clone(), e)).collect(),
        }
    }

    /// The catalog shipped with the default deployment.
    pub fn builtin() -> Self {
        let intent = |id: &str, description: &str, enabled: bool| IntentType {
            id: id.to_string(),
            description: description.to_string(),
            enabled,
        };
        let endpoint = |id: &str, label: &str, uri: &str, category: &str, pricing: &str| Endpoint {
            id: id.to_string(),
            label: label.to_string(),
            uri: uri.to_string(),
            category: category.to_string(),
            pricing_hint: pricing.to_string(),
        };

        Self::new(
            vec![
                intent("sentiment.fetch", "Query market sentiment data from analytics services", true),
                intent("auction.bid", "Place bids in agent-to-agent auctions", true),
                intent("nft.mint", "Mint tokens via x402-protected minting services", true),
                intent("custom.analytics", "Access custom analytics and data processing", true),
                intent("treasury.transfer", "Direct treasury transfers", false),
                intent("arbitrary.payment", "Arbitrary payments to any address", false),
                intent("wallet.withdraw", "Withdraw funds from wallet", false),
            ],
            vec![
                endpoint(
                    "genvox-sentiment",
                    "Crypto Sentiment API",
                    "https://api.genvox.io/v1/sentiment/BTC",
                    "Market Data / Analytics",
                    "0.03 USDC/query",
                ),
                endpoint(
                    "auction-bid",
                    "x402 Auction Bid",
                    "https://api.yourdemo.com/auction/bid",
                    "Auction / Agent Economy",
                    "Variable bid price",
                ),
                endpoint(
                    "nft-mint",
                    "NFT Mint Service",
                    "https://x402scan.com/server/mint-small",
                    "Minting / Token Services",
                    "0.50 USDC/mint",
                ),
                endpoint(
                    "asterpay-settle",
                    "AsterPay Settlement Relay",
                    "https://asterpay.xyz/api/settle",
                    "Fiat off-ramp / Settlement",
                    "0.10 USDC + 0.5%",
                ),
            ],
        )
    }

    /// Look up an intent and return its id only if it is enabled.
    pub fn enabled_intent(&self, id: &str) -> Result<IntentId, PolicyError> {
        match self.intents.get(id) {
            Some(intent) if intent.enabled => Ok(IntentId(intent.id.clone())),
            Some(_) => Err(PolicyError::DisabledIntent { id: id.to_string() }),
            None => Err(PolicyError::UnknownIntent { id: id.to_string() }),
        }
    }

    pub fn endpoint(&self, id: &str) -> Result<&Endpoint, PolicyError> {
        self.endpoints
            .get(id)
            .ok_or_else(|| PolicyError::UnknownEndpoint { id: id.to_string() })
    }

    /// All intents, enabled or not, in id order.
    pub fn intents(&self) -> impl Iterator<Item = &IntentType> {
        self.intents.values()
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.values()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Glob-match a target against `<origin>/**`. Invalid patterns never match.
fn matches_origin_pattern(origin: &str, target: &str) -> bool {
    let pattern = format!("{}/**", Pattern::escape(origin));
    match Pattern::new(&pattern) {
        Ok(p) => p.matches(target),
        Err(_) => false,
    }
}

fn contains_path_traversal(target: &str) -> bool {
    target.contains("..") || target.contains("%2e%2e") || target.contains("%2E%2E")
}
