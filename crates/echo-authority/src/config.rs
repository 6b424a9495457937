// config.rs — Where Echo keeps its state, and what it signs for.
//
// `EchoConfig::for_project()` lays out everything under `.echo/` in the
// project root. `EchoConfig::load()` additionally reads an optional
// `.echo/config.toml`; every setting in it has a default, so the file may be
// absent or list only what it overrides:
//
//   schema = "baseline"
//
//   [deployment]
//   endpointTag = "acme-merchant"
//
//   [deployment.domain]
//   chainId = 1
//
//   [bounds.maxPerHour]
//   min = 1
//   max = 20
//
// Keys are camelCase throughout, like the signed records. The settlement
// token's `decimals` is fixed by `TokenAmount`; any other value is refused.

use std::path::{Path, PathBuf};

use echo_policy::{PolicyBounds, TokenAmount};
use echo_typed_data::{Deployment, SigningSchema};
use serde::{Deserialize, Serialize};

use crate::error::AuthorityError;

/// Tunable settings, as read from `.echo/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EchoSettings {
    pub deployment: Deployment,
    pub bounds: PolicyBounds,
    pub schema: SigningSchema,
}

/// Paths and settings for one Echo project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EchoConfig {
    /// Root directory of the project.
    pub project_root: PathBuf,

    /// The `.echo/` state directory.
    pub echo_dir: PathBuf,

    /// The persisted signed policy (one record, overwritten on set).
    pub authority_file: PathBuf,

    /// Append-only, hash-chained activity log.
    pub activity_log: PathBuf,

    /// Connected wallet and ledger counters between invocations.
    pub session_file: PathBuf,

    /// Optional settings overrides.
    pub config_file: PathBuf,

    /// Held exclusively while a command reads and rewrites `.echo/`.
    pub lock_file: PathBuf,

    #[serde(default)]
    pub settings: EchoSettings,
}

impl EchoConfig {
    /// Standard `.echo/` layout with default settings.
    pub fn for_project(project_root: impl AsRef<Path>) -> Self {
        let root = project_root.as_ref().to_path_buf();
        let echo_dir = root.join(".echo");
        Self {
            project_root: root,
            authority_file: echo_dir.join("authority.json"),
            activity_log: echo_dir.join("activity.jsonl"),
            session_file: echo_dir.join("session.json"),
            config_file: echo_dir.join("config.toml"),
            lock_file: echo_dir.join("lock"),
            echo_dir,
            settings: EchoSettings::default(),
        }
    }

    /// Standard layout plus any overrides from `.echo/config.toml`.
    pub fn load(project_root: impl AsRef<Path>) -> Result<Self, AuthorityError> {
        let mut config = Self::for_project(project_root);
        if config.config_file.exists() {
            let content = std::fs::read_to_string(&config.config_file).map_err(|source| {
                AuthorityError::IoError {
                    path: config.config_file.display().to_string(),
                    source,
                }
            })?;
            config.settings = toml::from_str(&content).map_err(|e| AuthorityError::ConfigError {
                path: config.config_file.display().to_string(),
                message: e.to_string(),
            })?;
            let decimals = config.settings.deployment.token.decimals;
            if decimals != TokenAmount::DECIMALS {
                return Err(AuthorityError::ConfigError {
                    path: config.config_file.display().to_string(),
                    message: format!(
                        "deployment.token.decimals = {} is not supported; amounts use {} decimals",
                        decimals,
                        TokenAmount::DECIMALS
                    ),
                });
            }
            tracing::debug!(path = %config.config_file.display(), "loaded settings");
        }
        Ok(config)
    }
}
