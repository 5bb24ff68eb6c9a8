//! CLI command implementations.
//!
//! Every command takes the directory it was invoked from so it can be run
//! against scratch repositories in tests.

use drift_p2p::{HostConfig, KnownPeers, P2pError, PeerHost, PeerId, RepoAddress};
use drift_repo::{ConfigKey, RepoError, Repository, StatusReport};
use drift_storage::StorageError;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// CLI errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    P2p(#[from] P2pError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Usage(String),
}

pub type Result<T> = std::result::Result<T, CliError>;

/// Initialize a new repository in `cwd`.
pub async fn init(cwd: &Path) -> Result<()> {
    tracing::info!(path = %cwd.display(), "Initializing repository");

    let repo = Repository::init(cwd).await?;
    println!(
        "Initialized empty Drift repository in {}",
        repo.marker_dir().display()
    );
    Ok(())
}

/// Stage a file or directory.
pub fn add(cwd: &Path, path: &str) -> Result<()> {
    let repo = Repository::discover(cwd)?;
    let report = repo.add(cwd.join(path))?;

    tracing::info!(
        staged = report.staged,
        unchanged = report.unchanged,
        removed = report.removed,
        "Staged path"
    );
    println!("Added {path} to Drift repository");
    Ok(())
}

/// Show the working-tree status.
pub fn status(cwd: &Path) -> Result<()> {
    let repo = Repository::discover(cwd)?;
    print!("{}", format_status(&repo.status()?));
    Ok(())
}

/// Renders a status report the way `drift status` prints it.
pub fn format_status(report: &StatusReport) -> String {
    let mut out = String::new();
    match &report.branch {
        Some(branch) => out.push_str(&format!("On branch {branch}\n")),
        None => out.push_str("HEAD detached\n"),
    }
    out.push('\n');

    section(
        &mut out,
        "Changes to be committed:",
        &[r#"  (use "drift commit <message>" to record them)"#],
        "staged:     ",
        &report.staged,
    );
    section(
        &mut out,
        "Changes not staged for commit:",
        &[r#"  (use "drift add <file>..." to update what will be committed)"#],
        "modified:   ",
        &report.modified,
    );
    section(
        &mut out,
        "Untracked files:",
        &[r#"  (use "drift add <file>..." to include in what will be committed)"#],
        "",
        &report.untracked,
    );
    section(
        &mut out,
        "Deleted files:",
        &[r#"  (use "drift add <file>..." to record the removal)"#],
        "deleted:    ",
        &report.deleted,
    );

    if report.staged.is_empty() {
        if report.is_clean() {
            out.push_str("nothing to commit, working tree clean\n");
        } else {
            out.push_str("no changes added to commit (use \"drift add\")\n");
        }
    }
    out
}

fn section(out: &mut String, title: &str, hints: &[&str], label: &str, paths: &[String]) {
    if paths.is_empty() {
        return;
    }
    out.push_str(title);
    out.push('\n');
    for hint in hints {
        out.push_str(hint);
        out.push('\n');
    }
    for path in paths {
        out.push_str(&format!("        {label}{path}\n"));
    }
    out.push('\n');
}

/// Record the staged snapshot as a commit.
pub fn commit(cwd: &Path, message: &str) -> Result<()> {
    if message.trim().is_empty() {
        return Err(CliError::Usage(
            "Aborting commit due to empty commit message".into(),
        ));
    }
    let repo = Repository::discover(cwd)?;
    let id = repo.commit(message)?;
    println!("Committed as {id}");
    Ok(())
}

/// Read a config value, or set it when `value` is given.
pub fn config(cwd: &Path, key: &str, value: Option<&str>) -> Result<()> {
    let repo = Repository::discover(cwd)?;
    let key: ConfigKey = key.parse()?;
    let mut config = repo.config()?;

    match value {
        None => println!("{key} = {}", config.get(key)),
        Some(value) => {
            config.set(key, value)?;
            repo.save_config(&config)?;
            println!("Set {key} to {value}");
        }
    }
    Ok(())
}

/// List known peers.
pub fn connect_list(cwd: &Path) -> Result<()> {
    let repo = Repository::discover(cwd)?;
    let peers = KnownPeers::open(repo.peers_dir()).list()?;
    if peers.is_empty() {
        println!("No known peers. Use 'drift connect add <address>' to add one.");
    }
    for peer in peers {
        println!("{peer}");
    }
    Ok(())
}

/// Dial a peer and remember it.
pub async fn connect_add(cwd: &Path, addr: &str, timeout: Option<Duration>) -> Result<()> {
    let repo = Repository::discover(cwd)?;
    let host = open_host(&repo, timeout)?;

    let peer = host.connect(addr).await;
    host.shutdown();
    let peer = peer?;

    KnownPeers::open(repo.peers_dir()).add(addr)?;
    println!("Connected to {} at {}", peer.id, peer.addr);
    Ok(())
}

/// Forget a known peer.
pub fn connect_remove(cwd: &Path, addr: &str) -> Result<()> {
    let repo = Repository::discover(cwd)?;
    if KnownPeers::open(repo.peers_dir()).remove(addr)? {
        println!("Removed {addr}");
    } else {
        println!("{addr} is not a known peer");
    }
    Ok(())
}

/// Set the address this repository is published under.
pub fn host_init(cwd: &Path, address: &str) -> Result<()> {
    let address = RepoAddress::parse(address)?;
    let repo = Repository::discover(cwd)?;
    let mut config = repo.config()?;
    config.set(ConfigKey::PeerAddress, address.to_string())?;
    repo.save_config(&config)?;
    println!("Hosting repository as {address}");
    Ok(())
}

/// Accept objects from peers until Ctrl+C.
pub async fn host_serve(cwd: &Path, listen: &str) -> Result<()> {
    let repo = Repository::discover(cwd)?;
    let host = open_host(&repo, None)?;
    let addr = host.listen(listen).await?;

    println!("Listening on {addr} as {}", host.peer_id());
    println!("Press Ctrl+C to stop.");

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
        }
        () = host.stopped() => {}
    }
    host.shutdown();
    tracing::info!("Peer host stopped");
    Ok(())
}

/// Send every local object to a peer.
pub async fn sync(cwd: &Path, addr: &str, timeout: Option<Duration>) -> Result<()> {
    let repo = Repository::discover(cwd)?;
    let ids = repo.objects().list()?;
    let host = open_host(&repo, timeout)?;

    let result = async {
        let peer = host.connect(addr).await?;
        host.send_objects(&peer, &ids).await
    }
    .await;
    host.shutdown();
    let report = result?;

    println!(
        "Sent {} objects ({} bytes) to {addr}, {} bytes stored",
        report.objects, report.bytes_sent, report.bytes_acknowledged
    );
    Ok(())
}

fn open_host(repo: &Repository, timeout: Option<Duration>) -> Result<PeerHost> {
    let config = repo.config()?;
    let mut host_config = HostConfig::new(PeerId::new(config.peer.id));
    host_config.connect_timeout = timeout;
    host_config.transfer_timeout = timeout;
    Ok(PeerHost::new(host_config, repo.objects().clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        init(dir.path()).await.unwrap();
        dir
    }

    #[tokio::test]
    async fn test_add_commit_from_subdirectory() {
        let dir = temp_repo().await;
        let sub = dir.path().join("src");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("lib.rs"), "fn main() {}").unwrap();

        add(&sub, "lib.rs").unwrap();
        commit(&sub, "first").unwrap();

        let repo = Repository::open(dir.path()).unwrap();
        assert!(repo.head().unwrap().commit.is_some());
    }

    #[tokio::test]
    async fn test_add_records_deleted_file() {
        let dir = temp_repo().await;
        std::fs::write(dir.path().join("old.txt"), "old").unwrap();
        add(dir.path(), "old.txt").unwrap();
        std::fs::remove_file(dir.path().join("old.txt")).unwrap();

        add(dir.path(), "old.txt").unwrap();
        let repo = Repository::open(dir.path()).unwrap();
        assert!(repo.index().is_empty().unwrap());
        assert!(repo.status().unwrap().deleted.is_empty());
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let dir = temp_repo().await;
        assert!(matches!(commit(dir.path(), "  "), Err(CliError::Usage(_))));
    }

    #[tokio::test]
    async fn test_config_set_and_alias() {
        let dir = temp_repo().await;
        config(dir.path(), "name", Some("Ada")).unwrap();

        let repo = Repository::open(dir.path()).unwrap();
        assert_eq!(repo.config().unwrap().user.name, "Ada");
        assert!(matches!(
            config(dir.path(), "core.editor", None),
            Err(CliError::Repo(RepoError::UnsupportedConfigKey(_)))
        ));
    }

    #[tokio::test]
    async fn test_host_init_validates_address() {
        let dir = temp_repo().await;
        assert!(matches!(
            host_init(dir.path(), "example.drift"),
            Err(CliError::P2p(P2pError::InvalidAddress(_)))
        ));

        host_init(dir.path(), "dft@example.drift").unwrap();
        let repo = Repository::open(dir.path()).unwrap();
        assert_eq!(repo.config().unwrap().peer.address, "dft@example.drift");
    }

    #[tokio::test]
    async fn test_connect_remove_unknown_is_ok() {
        let dir = temp_repo().await;
        connect_remove(dir.path(), "127.0.0.1:9418").unwrap();
        connect_list(dir.path()).unwrap();
    }

    #[test]
    fn test_outside_repository() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            status(dir.path()),
            Err(CliError::Repo(RepoError::NotARepository(_)))
        ));
    }

    #[test]
    fn test_format_clean() {
        let report = StatusReport {
            branch: Some("main".into()),
            ..StatusReport::default()
        };
        assert_eq!(
            format_status(&report),
            "On branch main\n\nnothing to commit, working tree clean\n"
        );
    }

    #[test]
    fn test_format_sections() {
        let report = StatusReport {
            branch: None,
            staged: vec![],
            modified: vec!["a.txt".into()],
            deleted: vec!["c.txt".into()],
            untracked: vec!["b.txt".into()],
        };
        let out = format_status(&report);
        assert!(out.starts_with("HEAD detached\n"));
        assert!(out.contains("        modified:   a.txt\n"));
        assert!(out.contains("        b.txt\n"));
        assert!(out.contains("        deleted:    c.txt\n"));
        assert!(out.contains(r#"(use "drift add <file>..." to record the removal)"#));
        assert!(out.ends_with("no changes added to commit (use \"drift add\")\n"));
        assert!(!out.contains("Changes to be committed"));
    }
}
