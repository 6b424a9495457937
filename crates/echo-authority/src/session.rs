// session.rs — What survives between CLI invocations besides the policy.
//
// The connected wallet (by seed label, so the same key can be re-derived)
// and the ledger counters. A missing file is a fresh, disconnected session.
// A file that exists but does not parse is an error: reading it as empty
// would disconnect the wallet and drop the signed policy.

use std::fs;
use std::path::Path;

use echo_policy::Ledger;
use echo_typed_data::Address;
use serde::{Deserialize, Serialize};

use crate::error::AuthorityError;
use crate::persist::write_atomic;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(default)]
    pub ledger: Ledger,
}

impl Session {
    /// Load a session; a missing file is an empty session.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AuthorityError> {
        let path = path.as_ref();
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(AuthorityError::IoError {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        serde_json::from_str(&json).map_err(|e| AuthorityError::CorruptState {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), AuthorityError> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(path.as_ref(), json.as_bytes())
    }
}
