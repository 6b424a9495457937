//! # echo-typed-data
//!
//! Canonical EIP-712 hashing of Echo spending-authority policies, and the
//! signer seam a wallet plugs into.
//!
//! [`hash_policy`] produces the 32-byte digest for a [`Policy`] under a
//! [`Deployment`] (domain, settlement token, endpoint tag) and a
//! [`SigningSchema`]. A [`PolicySigner`] signs it; [`recover_signer`] checks
//! that a signature really came from the claimed address.
//!
//! [`Policy`]: echo_policy::Policy

pub mod domain;
pub mod error;
pub mod hasher;
pub mod signer;

pub use alloy_primitives::{Address, B256};
pub use domain::{Deployment, Eip712Domain, SettlementToken};
pub use error::{SignerError, TypedDataError};
pub use hasher::{hash_policy, struct_hash, typed_data, SigningSchema, TypedDataRequest, TypedField};
pub use signer::{recover_signer, LocalSigner, PolicySignature, PolicySigner};
