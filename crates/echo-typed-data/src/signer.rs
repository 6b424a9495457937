// signer.rs — The signer seam and a local secp256k1 implementation.
//
// A `PolicySigner` is the wallet: it sees the full typed-data request (so a
// real wallet can render it) and returns a 65-byte `r ‖ s ‖ v` signature over
// the digest. The local signer signs the prehashed digest directly.

use std::fmt;

use alloy_primitives::{keccak256, Address, B256};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{SignerError, TypedDataError};
use crate::hasher::TypedDataRequest;

/// A 65-byte recoverable ECDSA signature (`r ‖ s ‖ v`, `v ∈ {27, 28}`).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PolicySignature([u8; 65]);

impl PolicySignature {
    pub fn from_bytes(bytes: [u8; 65]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 65] {
        &self.0
    }

    /// `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex(s: &str) -> Result<Self, TypedDataError> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(raw).map_err(|e| TypedDataError::InvalidSignature(e.to_string()))?;
        let bytes: [u8; 65] = bytes.try_into().map_err(|b: Vec<u8>| {
            TypedDataError::InvalidSignature(format!("expected 65 bytes, got {}", b.len()))
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for PolicySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PolicySignature({})", self.to_hex())
    }
}

impl fmt::Display for PolicySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for PolicySignature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PolicySignature {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PolicySignature::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Anything that can sign a policy on behalf of a wallet identity.
///
/// Called exactly once per signing ceremony; callers never retry.
pub trait PolicySigner {
    /// The address this signer signs as.
    fn address(&self) -> Address;

    /// Sign `digest`, the EIP-712 hash of `request`.
    fn sign_typed_data(
        &self,
        request: &TypedDataRequest,
        digest: B256,
    ) -> Result<PolicySignature, SignerError>;
}

/// A secp256k1 key held in process.
pub struct LocalSigner {
    key: SigningKey,
    address: Address,
}

impl LocalSigner {
    /// Deterministic key from a label: the same label always yields the same
    /// address.
    pub fn from_seed_label(label: &str) -> Result<Self, TypedDataError> {
        let mut hasher = Sha256::new();
        hasher.update(b"echo local signer seed v1:");
        hasher.update(label.as_bytes());
        let seed: [u8; 32] = hasher.finalize().into();
        let key = SigningKey::from_bytes((&seed).into())
            .map_err(|e| TypedDataError::KeyDerivation(e.to_string()))?;
        Ok(Self::from_key(key))
    }

    /// A fresh random key.
    pub fn random() -> Self {
        loop {
            let seed: [u8; 32] = rand::random();
            // Out-of-range scalars are astronomically rare; draw again.
            if let Ok(key) = SigningKey::from_bytes((&seed).into()) {
                return Self::from_key(key);
            }
        }
    }

    fn from_key(key: SigningKey) -> Self {
        let address = evm_address(key.verifying_key());
        Self { key, address }
    }
}

impl fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl PolicySigner for LocalSigner {
    fn address(&self) -> Address {
        self.address
    }

    fn sign_typed_data(
        &self,
        request: &TypedDataRequest,
        digest: B256,
    ) -> Result<PolicySignature, SignerError> {
        let (sig, recovery_id) = self
            .key
            .sign_prehash_recoverable(digest.as_slice())
            .map_err(|e| SignerError::SignerUnavailable(e.to_string()))?;

        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&sig.to_bytes());
        out[64] = recovery_id.to_byte() + 27;

        tracing::debug!(
            signer = %self.address,
            primary_type = %request.primary_type,
            "signed typed data"
        );
        Ok(PolicySignature(out))
    }
}

/// Recover the address that produced `signature` over `digest`.
///
/// Accepts `v` as 27/28 or 0/1.
pub fn recover_signer(digest: B256, signature: &PolicySignature) -> Result<Address, TypedDataError> {
    let bytes = signature.as_bytes();
    let sig = Signature::from_slice(&bytes[..64])
        .map_err(|e| TypedDataError::InvalidSignature(e.to_string()))?;
    let v = match bytes[64] {
        v @ (27 | 28) => v - 27,
        v @ (0 | 1) => v,
        other => {
            return Err(TypedDataError::InvalidSignature(format!(
                "unsupported recovery byte {}",
                other
            )))
        }
    };
    let recovery_id = RecoveryId::from_byte(v)
        .ok_or_else(|| TypedDataError::InvalidSignature(format!("bad recovery id {}", v)))?;
    let key = VerifyingKey::recover_from_prehash(digest.as_slice(), &sig, recovery_id)
        .map_err(|e| TypedDataError::RecoveryFailed(e.to_string()))?;
    Ok(evm_address(&key))
}

/// `keccak256(uncompressed_pubkey[1..])[12..]`
fn evm_address(key: &VerifyingKey) -> Address {
    let encoded = key.to_encoded_point(false);
    let hash = keccak256(&encoded.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Deployment;
    use crate::hasher::{hash_policy, typed_data, SigningSchema};
    use echo_policy::{Catalog, PolicyBounds, Preset};

    fn request_and_digest() -> (TypedDataRequest, B256) {
        let policy = Preset::named("balanced")
            .unwrap()
            .draft
            .validate(&Catalog::builtin(), &PolicyBounds::default())
            .unwrap();
        let deployment = Deployment::default();
        (
            typed_data(&policy, &deployment, SigningSchema::Full),
            hash_policy(&policy, &deployment, SigningSchema::Full),
        )
    }

    #[test]
    fn seed_labels_are_deterministic() {
        let a = LocalSigner::from_seed_label("alice").unwrap();
        let b = LocalSigner::from_seed_label("alice").unwrap();
        let c = LocalSigner::from_seed_label("bob").unwrap();
        assert_eq!(a.address(), b.address());
        assert_ne!(a.address(), c.address());
    }

    #[test]
    fn signature_recovers_to_signer() {
        let signer = LocalSigner::from_seed_label("alice").unwrap();
        let (request, digest) = request_and_digest();
        let sig = signer.sign_typed_data(&request, digest).unwrap();

        assert!(sig.as_bytes()[64] == 27 || sig.as_bytes()[64] == 28);
        assert_eq!(recover_signer(digest, &sig).unwrap(), signer.address());
    }

    #[test]
    fn signature_does_not_recover_for_another_digest() {
        let signer = LocalSigner::random();
        let (request, digest) = request_and_digest();
        let sig = signer.sign_typed_data(&request, digest).unwrap();
        let other = keccak256(b"something else");
        match recover_signer(other, &sig) {
            Ok(addr) => assert_ne!(addr, signer.address()),
            Err(_) => {}
        }
    }

    #[test]
    fn signature_hex_round_trip() {
        let signer = LocalSigner::from_seed_label("alice").unwrap();
        let (request, digest) = request_and_digest();
        let sig = signer.sign_typed_data(&request, digest).unwrap();

        let hex = sig.to_hex();
        assert_eq!(hex.len(), 2 + 130);
        assert_eq!(PolicySignature::from_hex(&hex).unwrap(), sig);
        assert!(PolicySignature::from_hex("0xdeadbeef").is_err());
        assert!(recover_signer(digest, &PolicySignature::from_bytes([0u8; 65])).is_err());
    }
}
