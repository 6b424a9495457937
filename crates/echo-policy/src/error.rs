// error.rs — Error types for the policy subsystem.

use thiserror::Error;

/// Errors raised while constructing a policy or parsing amounts.
///
/// These are local construction errors: a policy that fails validation is
/// surfaced to the person configuring it and is never signed or stored.
/// Decision-time rejections are *not* errors. See [`crate::RejectionRule`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    /// The intent id is not in the catalog at all.
    #[error("unknown intent '{id}'")]
    UnknownIntent { id: String },

    /// The intent id exists in the catalog but is disabled (forbidden).
    #[error("intent '{id}' is disabled and cannot be granted")]
    DisabledIntent { id: String },

    /// The endpoint id is not in the whitelist catalog.
    #[error("unknown endpoint '{id}'")]
    UnknownEndpoint { id: String },

    /// `allowedIntents` or `allowedEndpoints` is empty.
    #[error("{field} must not be empty")]
    EmptySet { field: &'static str },

    /// A numeric field is outside its configured bound.
    #[error("{field} = {value} is outside the allowed range {min}..={max}")]
    OutOfBounds {
        field: &'static str,
        value: String,
        min: String,
        max: String,
    },

    /// The validity window ends before it starts.
    #[error("validity window is inverted: notBefore {not_before} is after notAfter {not_after}")]
    InvertedValidity {
        not_before: String,
        not_after: String,
    },

    /// A validity bound cannot be signed as whole unix seconds.
    #[error("{field} {value} {reason}")]
    UnsignableValidity {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    /// An amount could not be parsed or is negative / non-finite.
    #[error("invalid amount '{input}': {reason}")]
    InvalidAmount { input: String, reason: String },

    /// A named preset does not exist.
    #[error("unknown preset '{name}'")]
    UnknownPreset { name: String },
}
