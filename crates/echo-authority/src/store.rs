// store.rs — AuthorityStore: the single active signed policy.
//
// At most one SignedPolicy is active, scoped to the identity that signed it.
// It is persisted as one JSON file, atomically replaced on `set` and removed
// on `clear`, so it survives restarts.
//
// Loading re-verifies the record (validation, hash, signature recovery).
// Anything that fails, including unreadable JSON, is discarded and the store
// starts empty.

use std::fs;
use std::path::{Path, PathBuf};

use echo_typed_data::Address;

use crate::error::AuthorityError;
use crate::persist::write_atomic;
use crate::signed::{PolicyVerifier, SignedPolicy, SignedPolicyRecord};

pub struct AuthorityStore {
    path: PathBuf,
    verifier: PolicyVerifier,
    active: Option<SignedPolicy>,
}

impl AuthorityStore {
    /// Open the store at `path`, loading and verifying any persisted record.
    pub fn open(path: impl AsRef<Path>, verifier: PolicyVerifier) -> Result<Self, AuthorityError> {
        let path = path.as_ref().to_path_buf();
        let mut store = Self {
            path,
            verifier,
            active: None,
        };
        store.active = store.load()?;
        Ok(store)
    }

    pub fn get(&self) -> Option<&SignedPolicy> {
        self.active.as_ref()
    }

    pub fn verifier(&self) -> &PolicyVerifier {
        &self.verifier
    }

    /// Replace the active policy and persist it.
    pub fn set(&mut self, signed: SignedPolicy) -> Result<(), AuthorityError> {
        let record = signed.to_record(&self.verifier.deployment);
        let json = serde_json::to_string_pretty(&record)?;
        write_atomic(&self.path, json.as_bytes())?;
        tracing::info!(
            signer = %signed.signer(),
            policy_hash = %signed.policy_hash(),
            "active policy set"
        );
        self.active = Some(signed);
        Ok(())
    }

    /// Drop the active policy, in memory and on disk.
    pub fn clear(&mut self) -> Result<(), AuthorityError> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|source| AuthorityError::IoError {
                path: self.path.display().to_string(),
                source,
            })?;
        }
        if self.active.take().is_some() {
            tracing::info!("active policy cleared");
        }
        Ok(())
    }

    /// Invalidate the active policy if the observed identity no longer
    /// matches its signer. `None` means disconnected.
    ///
    /// Returns true if a policy was cleared.
    pub fn observe_identity(&mut self, identity: Option<Address>) -> Result<bool, AuthorityError> {
        let Some(active) = &self.active else {
            return Ok(false);
        };
        if identity == Some(active.signer()) {
            return Ok(false);
        }
        tracing::info!(
            policy_signer = %active.signer(),
            identity = ?identity.map(|a| a.to_string()),
            "identity changed, invalidating active policy"
        );
        self.clear()?;
        Ok(true)
    }

    fn load(&self) -> Result<Option<SignedPolicy>, AuthorityError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&self.path).map_err(|source| AuthorityError::IoError {
            path: self.path.display().to_string(),
            source,
        })?;

        let verified = serde_json::from_str::<SignedPolicyRecord>(&json)
            .map_err(AuthorityError::from)
            .and_then(|record| self.verifier.verify(&record));

        match verified {
            Ok(signed) => Ok(Some(signed)),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "discarding persisted policy that failed verification"
                );
                fs::remove_file(&self.path).map_err(|source| AuthorityError::IoError {
                    path: self.path.display().to_string(),
                    source,
                })?;
                Ok(None)
            }
        }
    }
}
