// ceremony.rs — The one-time signing ceremony.
//
//   validate draft → build typed data → sign (once) → verify recovery
//
// The signer is called exactly once and never retried. Any failure leaves
// the caller's state untouched: this function does not write anywhere, and
// the caller only stores the result on success.

use chrono::{DateTime, Utc};
use echo_policy::PolicyDraft;
use echo_typed_data::{recover_signer, typed_data, Address, PolicySigner, SigningSchema};

use crate::error::AuthorityError;
use crate::signed::{PolicyVerifier, SignedPolicy};

/// Run the signing ceremony for `draft` as the `connected` identity.
pub fn sign_policy(
    draft: &PolicyDraft,
    verifier: &PolicyVerifier,
    schema: SigningSchema,
    signer: &dyn PolicySigner,
    connected: Address,
    now: DateTime<Utc>,
) -> Result<SignedPolicy, AuthorityError> {
    if signer.address() != connected {
        return Err(AuthorityError::SignerIdentityMismatch {
            connected: connected.to_string(),
            signer: signer.address().to_string(),
        });
    }

    let policy = verifier.validate(draft)?;
    let request = typed_data(&policy, &verifier.deployment, schema);
    let digest = verifier.digest(&policy, schema);

    let signature = match signer.sign_typed_data(&request, digest) {
        Ok(sig) => sig,
        Err(e) => {
            tracing::debug!(error = %e, "policy signing cancelled or failed");
            return Err(e.into());
        }
    };

    let recovered = recover_signer(digest, &signature)?;
    if recovered != connected {
        return Err(AuthorityError::SignatureMismatch {
            expected: connected.to_string(),
            recovered: recovered.to_string(),
        });
    }

    tracing::info!(
        signer = %connected,
        policy_hash = %digest,
        schema = ?schema,
        "policy signed"
    );
    Ok(SignedPolicy::new(policy, schema, signature, digest, connected, now))
}
