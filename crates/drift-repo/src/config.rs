//! Repository configuration stored in `.drift/config`.

use crate::{RepoError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Name used in commits when `user.name` is empty.
const FALLBACK_NAME: &str = "anonymous";

/// Email used in commits when `user.email` is empty.
const FALLBACK_EMAIL: &str = "anonymous@drift";

/// Repo-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Commit identity.
    #[serde(default)]
    pub user: UserConfig,
    /// Network identity.
    #[serde(default)]
    pub peer: PeerConfig,
}

/// The `[user]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    /// Author name.
    #[serde(default)]
    pub name: String,
    /// Author email.
    #[serde(default)]
    pub email: String,
}

/// The `[peer]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Identifier generated at init.
    #[serde(default)]
    pub id: String,
    /// Public repository address, set by `host init`.
    #[serde(default)]
    pub address: String,
}

impl RepoConfig {
    /// Creates the initial configuration for a new repository.
    pub fn with_peer_id(id: impl Into<String>) -> Self {
        Self {
            user: UserConfig::default(),
            peer: PeerConfig {
                id: id.into(),
                address: String::new(),
            },
        }
    }

    /// Loads the configuration file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(RepoError::io("read", path)(e)),
        };
        toml::from_str(&content).map_err(|e| RepoError::Config(e.to_string()))
    }

    /// Saves the configuration file atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| RepoError::Config(e.to_string()))?;
        drift_storage::write_atomic(path, content.as_bytes())?;
        Ok(())
    }

    /// Returns the value for a key.
    pub fn get(&self, key: ConfigKey) -> &str {
        match key {
            ConfigKey::UserName => &self.user.name,
            ConfigKey::UserEmail => &self.user.email,
            ConfigKey::PeerId => &self.peer.id,
            ConfigKey::PeerAddress => &self.peer.address,
        }
    }

    /// Sets the value for a writable key.
    pub fn set(&mut self, key: ConfigKey, value: impl Into<String>) -> Result<()> {
        let slot = match key {
            ConfigKey::UserName => &mut self.user.name,
            ConfigKey::UserEmail => &mut self.user.email,
            ConfigKey::PeerAddress => &mut self.peer.address,
            ConfigKey::PeerId => return Err(RepoError::ReadOnlyConfigKey(key.to_string())),
        };
        *slot = value.into();
        Ok(())
    }

    /// Returns the commit identity, substituting placeholders for empty values.
    pub fn identity(&self) -> (&str, &str) {
        let name = if self.user.name.is_empty() {
            FALLBACK_NAME
        } else {
            &self.user.name
        };
        let email = if self.user.email.is_empty() {
            FALLBACK_EMAIL
        } else {
            &self.user.email
        };
        (name, email)
    }
}

/// A configuration key addressable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    /// `user.name`
    UserName,
    /// `user.email`
    UserEmail,
    /// `peer.id` (read-only)
    PeerId,
    /// `peer.address`
    PeerAddress,
}

impl FromStr for ConfigKey {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user.name" | "name" => Ok(Self::UserName),
            "user.email" | "email" => Ok(Self::UserEmail),
            "peer.id" => Ok(Self::PeerId),
            "peer.address" => Ok(Self::PeerAddress),
            _ => Err(RepoError::UnsupportedConfigKey(s.to_string())),
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::UserName => "user.name",
            Self::UserEmail => "user.email",
            Self::PeerId => "peer.id",
            Self::PeerAddress => "peer.address",
        })
    }
}
