// error.rs — Error types for typed-data hashing and signing.

use thiserror::Error;

/// Errors from a policy signer.
///
/// Both are recoverable: the signing ceremony returns to its pre-signing
/// state and nothing is stored.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignerError {
    /// The wallet holder declined the signature request.
    #[error("signature request rejected by user")]
    UserRejected,

    /// No signer is reachable, or it failed to produce a signature.
    #[error("signer unavailable: {0}")]
    SignerUnavailable(String),
}

/// Errors decoding or verifying typed-data artifacts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypedDataError {
    /// Signature hex was malformed or not 65 bytes.
    #[error("invalid signature encoding: {0}")]
    InvalidSignature(String),

    /// The signature is well formed but no public key recovers from it.
    #[error("signature recovery failed: {0}")]
    RecoveryFailed(String),

    /// Key material could not be derived.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
}
