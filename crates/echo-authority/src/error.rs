// error.rs — Error types for the authority layer.
//
// Decision outcomes (authorized / rejected) are never errors. The variants
// here are construction, signing and context failures: when one is returned
// no decision was produced and nothing was stored.

use echo_policy::PolicyError;
use echo_typed_data::{SignerError, TypedDataError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthorityError {
    /// The policy input failed validation. Never signed or stored.
    #[error("invalid policy: {0}")]
    InvalidPolicy(#[from] PolicyError),

    /// The signer declined or was unreachable. The store is unchanged.
    #[error(transparent)]
    Signer(#[from] SignerError),

    #[error(transparent)]
    TypedData(#[from] TypedDataError),

    /// No wallet identity is connected.
    #[error("no wallet connected")]
    NotConnected,

    /// No signed policy is active for the connected identity.
    #[error("no active signed policy")]
    NoActivePolicy,

    /// The signer offered for a ceremony is not the connected identity.
    #[error("signer {signer} is not the connected identity {connected}")]
    SignerIdentityMismatch { connected: String, signer: String },

    /// The returned signature does not recover to the signer.
    #[error("signature recovers to {recovered}, expected {expected}")]
    SignatureMismatch { expected: String, recovered: String },

    /// A persisted policy does not hash to the digest stored with it.
    #[error("stored policy hash {stored} does not match recomputed {computed}")]
    PolicyHashMismatch { stored: String, computed: String },

    /// The active policy belongs to a different identity than the connected one.
    #[error("active policy was signed by {policy_signer}, but {connected} is connected")]
    IdentityMismatch {
        connected: String,
        policy_signer: String,
    },

    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: String,
        source: std::io::Error,
    },

    /// Failed to serialize or deserialize persisted state.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// A state file exists but cannot be parsed. Never treated as empty.
    #[error("unreadable state file {path}: {message}")]
    CorruptState { path: String, message: String },

    /// The config file could not be parsed.
    #[error("invalid config at {path}: {message}")]
    ConfigError { path: String, message: String },
}
