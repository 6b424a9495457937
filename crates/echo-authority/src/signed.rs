// signed.rs — A policy together with the signature that authorizes it.
//
// `SignedPolicy` is the verified in-memory form: its policy passed
// validation, its hash is the canonical digest of that policy, and its
// signature recovers to `signer`. `SignedPolicyRecord` is the persisted
// form; turning a record back into a `SignedPolicy` re-runs every check.

use chrono::{DateTime, Utc};
use echo_policy::{Catalog, Policy, PolicyBounds, PolicyDraft, PolicyId, TokenAmount};
use echo_typed_data::{
    hash_policy, recover_signer, Address, Deployment, PolicySignature, SigningSchema, B256,
};
use serde::{Deserialize, Serialize};

use crate::error::AuthorityError;

/// Everything needed to check a policy and its signature.
#[derive(Debug, Clone, Default)]
pub struct PolicyVerifier {
    pub catalog: Catalog,
    pub bounds: PolicyBounds,
    pub deployment: Deployment,
}

impl PolicyVerifier {
    pub fn new(catalog: Catalog, bounds: PolicyBounds, deployment: Deployment) -> Self {
        Self {
            catalog,
            bounds,
            deployment,
        }
    }

    pub fn validate(&self, draft: &PolicyDraft) -> Result<Policy, AuthorityError> {
        Ok(draft.validate(&self.catalog, &self.bounds)?)
    }

    pub fn digest(&self, policy: &Policy, schema: SigningSchema) -> B256 {
        hash_policy(policy, &self.deployment, schema)
    }

    /// Rebuild a verified `SignedPolicy` from its persisted record.
    pub fn verify(&self, record: &SignedPolicyRecord) -> Result<SignedPolicy, AuthorityError> {
        let policy = self.validate(&record.policy)?;
        let digest = self.digest(&policy, record.schema);
        if digest != record.policy_hash {
            return Err(AuthorityError::PolicyHashMismatch {
                stored: record.policy_hash.to_string(),
                computed: digest.to_string(),
            });
        }
        let recovered = recover_signer(digest, &record.signature)?;
        if recovered != record.signer_address {
            return Err(AuthorityError::SignatureMismatch {
                expected: record.signer_address.to_string(),
                recovered: recovered.to_string(),
            });
        }
        Ok(SignedPolicy {
            policy,
            schema: record.schema,
            signature: record.signature,
            policy_hash: digest,
            signer: recovered,
            signed_at: record.signed_at,
        })
    }
}

/// A validated policy bound to its signer by a verified signature.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedPolicy {
    policy: Policy,
    schema: SigningSchema,
    signature: PolicySignature,
    policy_hash: B256,
    signer: Address,
    signed_at: DateTime<Utc>,
}

impl SignedPolicy {
    /// Only the ceremony and the verifier construct these.
    pub(crate) fn new(
        policy: Policy,
        schema: SigningSchema,
        signature: PolicySignature,
        policy_hash: B256,
        signer: Address,
        signed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            policy,
            schema,
            signature,
            policy_hash,
            signer,
            signed_at,
        }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn schema(&self) -> SigningSchema {
        self.schema
    }

    pub fn signature(&self) -> &PolicySignature {
        &self.signature
    }

    pub fn policy_hash(&self) -> B256 {
        self.policy_hash
    }

    pub fn signer(&self) -> Address {
        self.signer
    }

    pub fn signed_at(&self) -> DateTime<Utc> {
        self.signed_at
    }

    /// Ledger key for this policy.
    pub fn policy_id(&self) -> PolicyId {
        PolicyId::new(self.policy_hash.to_string())
    }

    pub fn to_record(&self, deployment: &Deployment) -> SignedPolicyRecord {
        SignedPolicyRecord {
            max_amount: self.policy.spend_limits().max_per_action,
            token_address: deployment.token.address,
            endpoint_tag: deployment.endpoint_tag.clone(),
            signature: self.signature,
            policy_hash: self.policy_hash,
            signer_address: self.signer,
            schema: self.schema,
            policy: self.policy.to_draft(),
            signed_at: self.signed_at,
        }
    }
}

/// Persisted form of a signed policy.
///
/// The first six fields keep the flat shape wallets and existing tooling
/// already read (`maxAmount` in human units).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedPolicyRecord {
    pub max_amount: TokenAmount,
    pub token_address: Address,
    pub endpoint_tag: String,
    pub signature: PolicySignature,
    pub policy_hash: B256,
    pub signer_address: Address,
    #[serde(default)]
    pub schema: SigningSchema,
    pub policy: PolicyDraft,
    pub signed_at: DateTime<Utc>,
}
