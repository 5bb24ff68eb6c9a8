//! Commit objects.

use crate::{ObjectId, Result, StorageError};
use std::fmt;

/// Who made a commit, and when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
}

impl Signature {
    /// Creates a signature stamped with the current time.
    pub fn now(name: impl Into<String>, email: impl Into<String>) -> Self {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        Self {
            name: name.into(),
            email: email.into(),
            timestamp,
        }
    }

    fn parse(s: &str) -> Result<Self> {
        let invalid = || StorageError::InvalidObject(format!("malformed signature: {}", s));

        let open = s.find('<').ok_or_else(invalid)?;
        let close = s[open..].find('>').map(|i| open + i).ok_or_else(invalid)?;
        let name = s[..open].trim_end().to_string();
        let email = s[open + 1..close].to_string();

        let mut rest = s[close + 1..].split_whitespace();
        let timestamp = rest
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or_else(invalid)?;

        Ok(Self {
            name,
            email,
            timestamp,
        })
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}> {} +0000", self.name, self.email, self.timestamp)
    }
}

/// A commit: a tree snapshot plus metadata.
///
/// Commits do not record a parent, so only the latest commit of a branch
/// is reachable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Root tree of the snapshot.
    pub tree: ObjectId,
    /// Author signature.
    pub author: Signature,
    /// Committer signature.
    pub committer: Signature,
    /// Commit message, without the trailing newline.
    pub message: String,
}

impl Commit {
    /// Serializes the commit payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        format!(
            "tree {}\nauthor {}\ncommitter {}\n\n{}\n",
            self.tree, self.author, self.committer, self.message
        )
        .into_bytes()
    }

    /// Parses a commit payload.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|_| StorageError::InvalidObject("commit is not utf-8".to_string()))?;
        let (headers, message) = text
            .split_once("\n\n")
            .ok_or_else(|| StorageError::InvalidObject("commit has no message".to_string()))?;

        let mut tree = None;
        let mut author = None;
        let mut committer = None;
        for line in headers.lines() {
            match line.split_once(' ') {
                Some(("tree", id)) => tree = Some(ObjectId::from_hex(id)?),
                Some(("author", sig)) => author = Some(Signature::parse(sig)?),
                Some(("committer", sig)) => committer = Some(Signature::parse(sig)?),
                _ => {
                    return Err(StorageError::InvalidObject(format!(
                        "unexpected commit header: {}",
                        line
                    )))
                }
            }
        }

        let missing = |field: &str| StorageError::InvalidObject(format!("commit missing {}", field));
        Ok(Self {
            tree: tree.ok_or_else(|| missing("tree"))?,
            author: author.ok_or_else(|| missing("author"))?,
            committer: committer.ok_or_else(|| missing("committer"))?,
            message: message.strip_suffix('\n').unwrap_or(message).to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signature() -> Signature {
        Signature {
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            timestamp: 1234567890,
        }
    }

    #[test]
    fn test_commit_payload_format() {
        let tree = ObjectId::from_bytes([1u8; 32]);
        let commit = Commit {
            tree,
            author: signature(),
            committer: signature(),
            message: "Initial commit".to_string(),
        };

        let expected = format!(
            "tree {}\n\
             author Alice <alice@example.com> 1234567890 +0000\n\
             committer Alice <alice@example.com> 1234567890 +0000\n\
             \n\
             Initial commit\n",
            tree
        );
        assert_eq!(String::from_utf8(commit.to_bytes()).unwrap(), expected);
    }

    #[test]
    fn test_commit_parse() {
        let commit = Commit {
            tree: ObjectId::from_bytes([2u8; 32]),
            author: signature(),
            committer: Signature {
                name: "Bob Builder".to_string(),
                ..signature()
            },
            message: "multi\nline message".to_string(),
        };

        assert_eq!(Commit::parse(&commit.to_bytes()).unwrap(), commit);
    }

    #[test]
    fn test_commit_parse_rejects_missing_tree() {
        let data = b"author A <a@b> 1 +0000\ncommitter A <a@b> 1 +0000\n\nmsg\n";
        assert!(Commit::parse(data).is_err());
    }

    #[test]
    fn test_signature_now_is_recent() {
        let sig = Signature::now("n", "e");
        assert!(sig.timestamp > 1_600_000_000);
    }
}
