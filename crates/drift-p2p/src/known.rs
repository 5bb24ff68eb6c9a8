//! The list of peers a repository has been connected to.

use crate::{validate_peer_addr, Result};
use std::path::{Path, PathBuf};

const KNOWN_FILE: &str = "known";

/// Peer addresses persisted one per line in `<peers-dir>/known`.
#[derive(Debug, Clone)]
pub struct KnownPeers {
    path: PathBuf,
}

impl KnownPeers {
    /// Opens the list stored under a repository's peers directory.
    pub fn open(peers_dir: impl AsRef<Path>) -> Self {
        Self {
            path: peers_dir.as_ref().join(KNOWN_FILE),
        }
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the known addresses in insertion order.
    pub fn list(&self) -> Result<Vec<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Records an address. Returns false if it was already known.
    pub fn add(&self, addr: &str) -> Result<bool> {
        validate_peer_addr(addr)?;
        let mut peers = self.list()?;
        if peers.iter().any(|p| p == addr) {
            return Ok(false);
        }
        peers.push(addr.to_string());
        self.save(&peers)?;
        Ok(true)
    }

    /// Forgets an address. Returns false if it was not known.
    pub fn remove(&self, addr: &str) -> Result<bool> {
        let mut peers = self.list()?;
        let before = peers.len();
        peers.retain(|p| p != addr);
        if peers.len() == before {
            return Ok(false);
        }
        self.save(&peers)?;
        Ok(true)
    }

    fn save(&self, peers: &[String]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut content = peers.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        drift_storage::write_atomic(&self.path, content.as_bytes())?;
        Ok(())
    }
}
