//! Address parsing.

use crate::{P2pError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const SCHEME: &str = "dft";
const SUFFIX: &str = "drift";

/// A public repository address of the form `dft@<repo-name>.drift`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoAddress {
    name: String,
}

impl RepoAddress {
    /// Parses an address.
    ///
    /// # Errors
    ///
    /// Returns [`P2pError::InvalidAddress`] unless the input is exactly
    /// `dft@<name>.drift` with a non-empty name containing neither `@`
    /// nor `.`.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || {
            P2pError::InvalidAddress(format!(
                "{s}: expected {SCHEME}@<repo-name>.{SUFFIX}"
            ))
        };

        let (scheme, rest) = s.split_once('@').ok_or_else(invalid)?;
        if scheme != SCHEME || rest.contains('@') {
            return Err(invalid());
        }
        let (name, suffix) = rest.split_once('.').ok_or_else(invalid)?;
        if suffix != SUFFIX || name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(invalid());
        }

        Ok(Self {
            name: name.to_string(),
        })
    }

    /// Returns the repository name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl FromStr for RepoAddress {
    type Err = P2pError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RepoAddress {
    type Error = P2pError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<RepoAddress> for String {
    fn from(addr: RepoAddress) -> Self {
        addr.to_string()
    }
}

impl fmt::Display for RepoAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}@{}.{SUFFIX}", self.name)
    }
}

/// Checks that `addr` is a dialable `host:port` pair.
///
/// # Errors
///
/// Returns [`P2pError::InvalidAddress`] if the host is empty or the port is
/// not a number.
pub fn validate_peer_addr(addr: &str) -> Result<()> {
    let invalid = || P2pError::InvalidAddress(format!("{addr}: expected <host>:<port>"));
    let (host, port) = addr.rsplit_once(':').ok_or_else(invalid)?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() || host.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    port.parse::<u16>().map_err(|_| invalid())?;
    Ok(())
}
