//! # echo-authority
//!
//! Turns a policy into delegated spending authority and keeps it honest.
//!
//! - [`sign_policy`]: the one-time signing ceremony (validate, hash, sign
//!   once, verify recovery).
//! - [`AuthorityStore`]: the single active [`SignedPolicy`], persisted and
//!   re-verified on load, invalidated when the wallet identity changes.
//! - [`SignerContext`]: the connected identity, its store and its decision
//!   engine, passed explicitly to whatever evaluates agent actions.
//! - [`EchoConfig`]: the `.echo/` project layout and optional settings.
//! - [`ProjectLock`]: one process at a time reads and rewrites `.echo/`.

pub mod ceremony;
pub mod config;
pub mod context;
pub mod error;
pub mod persist;
pub mod session;
pub mod signed;
pub mod store;

pub use ceremony::sign_policy;
pub use config::{EchoConfig, EchoSettings};
pub use context::SignerContext;
pub use error::AuthorityError;
pub use persist::ProjectLock;
pub use session::Session;
pub use signed::{PolicyVerifier, SignedPolicy, SignedPolicyRecord};
pub use store::AuthorityStore;
