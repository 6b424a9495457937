// hasher.rs — Canonical EIP-712 hashing of spending-authority policies.
//
// digest = keccak256(0x19 ‖ 0x01 ‖ domainSeparator ‖ hashStruct(message))
//
// Two message schemas exist. `Baseline` signs only the amount cap, token and
// endpoint tag, and is byte-compatible with wallets that already sign the
// `Policy` struct. `Full` binds every field the decision engine enforces.
//
// Encoding rules (EIP-712 `encodeData`):
// - `string`   → keccak256(utf8 bytes)
// - `string[]` → keccak256(concat(keccak256(item) for item in array))
// - `uintN`    → 32-byte big-endian word
// - `address`  → left-padded to 32 bytes
//
// Sets are encoded in sorted order, so two policies that differ only in the
// order their input listed intents or endpoints hash identically.

use std::collections::BTreeMap;

use alloy_primitives::{keccak256, Address, B256, U256};
use chrono::{DateTime, Utc};
use echo_policy::Policy;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::domain::{Deployment, Eip712Domain};

/// Which struct is signed for a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigningSchema {
    /// `Policy(uint256 maxAmount,address tokenAddress,string endpointTag)`.
    Baseline,
    /// Every enforced field.
    #[default]
    Full,
}

const BASELINE_TYPE: &str = "Policy(uint256 maxAmount,address tokenAddress,string endpointTag)";

const FULL_TYPE: &str = "AuthorityPolicy(string[] allowedIntents,string[] allowedEndpoints,\
uint32 maxPerHour,uint32 maxPerDay,uint32 maxConcurrent,uint256 maxPerAction,\
uint256 maxDailySpend,uint64 notBefore,uint64 notAfter,address tokenAddress,string endpointTag)";

impl SigningSchema {
    pub fn primary_type(&self) -> &'static str {
        match self {
            SigningSchema::Baseline => "Policy",
            SigningSchema::Full => "AuthorityPolicy",
        }
    }

    /// The canonical EIP-712 type string for the primary struct.
    pub fn type_string(&self) -> &'static str {
        match self {
            SigningSchema::Baseline => BASELINE_TYPE,
            SigningSchema::Full => FULL_TYPE,
        }
    }

    /// `(name, type)` pairs of the primary struct, in declaration order.
    fn fields(&self) -> Vec<(&'static str, &'static str)> {
        let body = self
            .type_string()
            .split_once('(')
            .and_then(|(_, rest)| rest.strip_suffix(')'))
            .unwrap_or_default();
        body.split(',')
            .filter_map(|field| {
                let (ty, name) = field.split_once(' ')?;
                Some((name, ty))
            })
            .collect()
    }
}

/// One member of an EIP-712 struct type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedField {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// A signing request in the `eth_signTypedData_v4` JSON shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedDataRequest {
    pub types: BTreeMap<String, Vec<TypedField>>,
    pub primary_type: String,
    pub domain: Eip712Domain,
    pub message: serde_json::Value,
}

/// Build the typed-data request a wallet would be asked to sign.
pub fn typed_data(policy: &Policy, deployment: &Deployment, schema: SigningSchema) -> TypedDataRequest {
    let to_fields = |pairs: Vec<(&str, &str)>| {
        pairs
            .into_iter()
            .map(|(name, kind)| TypedField {
                name: name.to_string(),
                kind: kind.to_string(),
            })
            .collect::<Vec<_>>()
    };

    let mut types = BTreeMap::new();
    types.insert(
        "EIP712Domain".to_string(),
        to_fields(vec![
            ("name", "string"),
            ("version", "string"),
            ("chainId", "uint256"),
            ("verifyingContract", "address"),
        ]),
    );
    types.insert(schema.primary_type().to_string(), to_fields(schema.fields()));

    let limits = policy.spend_limits();
    let token = deployment.token.address.to_checksum(None);
    let message = match schema {
        SigningSchema::Baseline => json!({
            "maxAmount": limits.max_per_action.units().to_string(),
            "tokenAddress": token,
            "endpointTag": deployment.endpoint_tag,
        }),
        SigningSchema::Full => {
            let rates = policy.rate_limits();
            let (not_before, not_after) = validity_seconds(policy);
            json!({
                "allowedIntents": policy.allowed_intents().map(|i| i.as_str()).collect::<Vec<_>>(),
                "allowedEndpoints": policy.allowed_endpoints().map(|e| e.id.as_str()).collect::<Vec<_>>(),
                "maxPerHour": rates.max_per_hour,
                "maxPerDay": rates.max_per_day,
                "maxConcurrent": rates.max_concurrent,
                "maxPerAction": limits.max_per_action.units().to_string(),
                "maxDailySpend": limits.max_daily_spend.units().to_string(),
                "notBefore": not_before,
                "notAfter": not_after,
                "tokenAddress": token,
                "endpointTag": deployment.endpoint_tag,
            })
        }
    };

    TypedDataRequest {
        types,
        primary_type: schema.primary_type().to_string(),
        domain: deployment.domain.clone(),
        message,
    }
}

/// `hashStruct(message)` for the chosen schema.
pub fn struct_hash(policy: &Policy, deployment: &Deployment, schema: SigningSchema) -> B256 {
    let mut buf = Vec::with_capacity(32 * 12);
    buf.extend_from_slice(keccak256(schema.type_string().as_bytes()).as_slice());

    let limits = policy.spend_limits();
    match schema {
        SigningSchema::Baseline => {
            buf.extend_from_slice(&uint(limits.max_per_action.units()));
        }
        SigningSchema::Full => {
            let rates = policy.rate_limits();
            let (not_before, not_after) = validity_seconds(policy);
            buf.extend_from_slice(hash_string_array(policy.allowed_intents().map(|i| i.as_str())).as_slice());
            buf.extend_from_slice(hash_string_array(policy.allowed_endpoints().map(|e| e.id.as_str())).as_slice());
            buf.extend_from_slice(&uint(rates.max_per_hour.into()));
            buf.extend_from_slice(&uint(rates.max_per_day.into()));
            buf.extend_from_slice(&uint(rates.max_concurrent.into()));
            buf.extend_from_slice(&uint(limits.max_per_action.units()));
            buf.extend_from_slice(&uint(limits.max_daily_spend.units()));
            buf.extend_from_slice(&uint(not_before));
            buf.extend_from_slice(&uint(not_after));
        }
    }
    buf.extend_from_slice(address_word(deployment.token.address).as_slice());
    buf.extend_from_slice(keccak256(deployment.endpoint_tag.as_bytes()).as_slice());
    keccak256(&buf)
}

/// The 32-byte digest a signer signs for this policy.
///
/// Deterministic: logically equal policies hash identically, and changing
/// any signed field changes the digest.
pub fn hash_policy(policy: &Policy, deployment: &Deployment, schema: SigningSchema) -> B256 {
    let mut buf = Vec::with_capacity(2 + 32 + 32);
    buf.extend_from_slice(b"\x19\x01");
    buf.extend_from_slice(deployment.domain.separator().as_slice());
    buf.extend_from_slice(struct_hash(policy, deployment, schema).as_slice());
    keccak256(&buf)
}

fn uint(value: u64) -> [u8; 32] {
    U256::from(value).to_be_bytes::<32>()
}

fn address_word(address: Address) -> B256 {
    address.into_word()
}

fn hash_string_array<'a>(items: impl Iterator<Item = &'a str>) -> B256 {
    let mut buf = Vec::new();
    for item in items {
        buf.extend_from_slice(keccak256(item.as_bytes()).as_slice());
    }
    keccak256(&buf)
}

/// Validity bounds as unix seconds; an open end encodes as 0.
///
/// `PolicyDraft::validate` only admits whole-second bounds at or after the
/// epoch, so nothing is lost here.
fn validity_seconds(policy: &Policy) -> (u64, u64) {
    let secs = |t: Option<DateTime<Utc>>| {
        t.map(|t| u64::try_from(t.timestamp()).unwrap_or(0)).unwrap_or(0)
    };
    let v = policy.validity();
    (secs(v.not_before), secs(v.not_after))
}
