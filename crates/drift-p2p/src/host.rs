//! The peer host: listens for and dials other repository copies.

use crate::protocol::{self, Protocol, DEFAULT_MAX_FRAME_LEN};
use crate::{validate_peer_addr, P2pError, PeerHandle, PeerId, Result};
use drift_storage::{ObjectId, ObjectStore};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Configuration for a peer host.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Identifier announced during the hello exchange.
    pub peer_id: PeerId,
    /// Deadline for dialing and the hello exchange. `None` waits forever.
    pub connect_timeout: Option<Duration>,
    /// Deadline for a whole object transfer. `None` waits forever.
    pub transfer_timeout: Option<Duration>,
    /// Largest accepted object frame.
    pub max_frame_len: usize,
}

impl HostConfig {
    /// Creates a configuration with no deadlines.
    pub fn new(peer_id: PeerId) -> Self {
        Self {
            peer_id,
            connect_timeout: None,
            transfer_timeout: None,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

/// Whether the host accepts inbound streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    /// Not listening.
    Idle,
    /// Accepting connections on the given address.
    Listening(SocketAddr),
}

/// Outcome of sending objects to a peer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferReport {
    /// Number of objects written to the stream.
    pub objects: usize,
    /// Compressed bytes written to the stream, excluding framing.
    pub bytes_sent: u64,
    /// Bytes the receiver reported as persisted.
    pub bytes_acknowledged: u64,
}

struct Shared {
    config: HostConfig,
    store: ObjectStore,
    state: RwLock<HostState>,
    peers: RwLock<HashMap<PeerId, PeerHandle>>,
    shutdown: CancellationToken,
}

/// A peer host bound to one object store.
///
/// Cloning yields another handle to the same host.
#[derive(Clone)]
pub struct PeerHost {
    shared: Arc<Shared>,
}

impl PeerHost {
    /// Creates an idle host persisting received objects into `store`.
    pub fn new(config: HostConfig, store: ObjectStore) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                store,
                state: RwLock::new(HostState::Idle),
                peers: RwLock::new(HashMap::new()),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Returns this host's peer identifier.
    #[must_use]
    pub fn peer_id(&self) -> &PeerId {
        &self.shared.config.peer_id
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> HostState {
        *self.shared.state.read()
    }

    /// Returns the address being listened on.
    ///
    /// # Errors
    ///
    /// Returns [`P2pError::NotListening`] if the host is idle.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        match self.state() {
            HostState::Listening(addr) => Ok(addr),
            HostState::Idle => Err(P2pError::NotListening),
        }
    }

    /// Returns the peers that completed a hello exchange, in either
    /// direction.
    #[must_use]
    pub fn peers(&self) -> Vec<PeerHandle> {
        let mut peers: Vec<_> = self.shared.peers.read().values().cloned().collect();
        peers.sort_by(|a, b| a.id.cmp(&b.id));
        peers
    }

    /// Returns the number of connected peers.
    #[must_use]
    pub fn peer_count(&self) -> usize {
        self.shared.peers.read().len()
    }

    /// Starts accepting connections on `addr`.
    ///
    /// Each accepted connection is handled on its own task. Returns the
    /// bound address, which differs from `addr` when port 0 was requested.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is already listening, has been shut
    /// down, or binding fails.
    pub async fn listen(&self, addr: &str) -> Result<SocketAddr> {
        if self.shared.shutdown.is_cancelled() {
            return Err(P2pError::Connection("host has been shut down".into()));
        }
        if let HostState::Listening(current) = self.state() {
            return Err(P2pError::Connection(format!("already listening on {current}")));
        }

        let listener = TcpListener::bind(addr).await?;
        let local = listener.local_addr()?;
        *self.shared.state.write() = HostState::Listening(local);

        info!(peer_id = %self.peer_id(), listen_addr = %local, "Peer host listening");

        let shared = self.shared.clone();
        tokio::spawn(async move {
            accept_loop(shared, listener).await;
        });
        Ok(local)
    }

    /// Dials a peer and performs the hello exchange.
    ///
    /// # Errors
    ///
    /// Returns [`P2pError::InvalidAddress`] for a malformed address and
    /// [`P2pError::Connection`] if dialing or the exchange fails.
    pub async fn connect(&self, addr: &str) -> Result<PeerHandle> {
        validate_peer_addr(addr)?;
        let shared = self.shared.clone();
        let addr_owned = addr.to_string();
        let listen_port = match self.state() {
            HostState::Listening(local) => local.port(),
            HostState::Idle => 0,
        };

        let exchange = async move {
            let stream = TcpStream::connect(&addr_owned).await?;
            let remote = stream.peer_addr()?;
            let mut stream = BufReader::new(stream);

            protocol::write_protocol(&mut stream, Protocol::Hello).await?;
            protocol::write_frame(&mut stream, shared.config.peer_id.as_str().as_bytes()).await?;
            protocol::write_frame(&mut stream, &listen_port.to_be_bytes()).await?;
            stream.flush().await?;

            let remote_id = read_peer_id(&mut stream).await?;
            Ok::<_, P2pError>(PeerHandle {
                id: remote_id,
                addr: remote,
            })
        };

        let handle = with_deadline(self.shared.config.connect_timeout, exchange)
            .await
            .map_err(|e| P2pError::Connection(format!("{addr}: {e}")))?;

        self.shared
            .peers
            .write()
            .insert(handle.id.clone(), handle.clone());
        info!(peer = %handle.id, addr = %handle.addr, "Connected to peer");
        Ok(handle)
    }

    /// Removes a peer from the connected set.
    pub fn disconnect(&self, id: &PeerId) -> Option<PeerHandle> {
        let removed = self.shared.peers.write().remove(id);
        if removed.is_some() {
            debug!(peer = %id, "Disconnected from peer");
        }
        removed
    }

    /// Streams objects to a peer over a new object-transfer stream.
    ///
    /// # Errors
    ///
    /// Any failure aborts the transfer and is reported as
    /// [`P2pError::Transfer`]. Nothing is retried.
    pub async fn send_objects(&self, peer: &PeerHandle, ids: &[ObjectId]) -> Result<TransferReport> {
        let store = self.shared.store.clone();
        let addr = peer.addr;
        let ids = ids.to_vec();

        let transfer = async move {
            let mut stream = TcpStream::connect(addr).await?;
            protocol::write_protocol(&mut stream, Protocol::ObjectTransfer).await?;

            let mut report = TransferReport::default();
            for id in &ids {
                let compressed = {
                    let store = store.clone();
                    let id = *id;
                    tokio::task::spawn_blocking(move || store.read_raw(&id)).await??
                };
                protocol::write_frame(&mut stream, &compressed).await?;
                report.objects += 1;
                report.bytes_sent += compressed.len() as u64;
                debug!(id = %id, bytes = compressed.len(), "Sent object");
            }
            protocol::write_end(&mut stream).await?;
            stream.flush().await?;

            report.bytes_acknowledged = stream.read_u64().await?;
            Ok::<_, P2pError>(report)
        };

        let report = with_deadline(self.shared.config.transfer_timeout, transfer)
            .await
            .map_err(|e| P2pError::Transfer(format!("to {}: {}", peer.id, e)))?;

        if report.bytes_acknowledged != report.bytes_sent {
            return Err(P2pError::Transfer(format!(
                "peer {} acknowledged {} of {} bytes",
                peer.id, report.bytes_acknowledged, report.bytes_sent
            )));
        }

        info!(
            peer = %peer.id,
            objects = report.objects,
            bytes = report.bytes_sent,
            "Sent objects"
        );
        Ok(report)
    }

    /// Stops accepting connections and forgets connected peers. A stopped
    /// host cannot listen again.
    pub fn shutdown(&self) {
        self.shared.shutdown.cancel();
        *self.shared.state.write() = HostState::Idle;
        self.shared.peers.write().clear();
        info!(peer_id = %self.peer_id(), "Peer host stopped");
    }

    /// Resolves when [`PeerHost::shutdown`] has been called.
    pub async fn stopped(&self) {
        self.shared.shutdown.cancelled().await;
    }
}

impl std::fmt::Debug for PeerHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerHost")
            .field("peer_id", self.peer_id())
            .field("state", &self.state())
            .field("peer_count", &self.peer_count())
            .finish()
    }
}

async fn accept_loop(shared: Arc<Shared>, listener: TcpListener) {
    loop {
        tokio::select! {
            _ = shared.shutdown.cancelled() => {
                debug!("Accept loop shutting down");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, remote)) => {
                    let shared = shared.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_stream(&shared, stream, remote).await {
                            error!(remote = %remote, error = %e, "Stream handler failed");
                        }
                    });
                }
                Err(e) => warn!(error = %e, "Failed to accept connection"),
            }
        }
    }
}

/// Serves one inbound stream. The stream is dropped, and so closed, when
/// this returns.
async fn handle_stream(shared: &Shared, stream: TcpStream, remote: SocketAddr) -> Result<()> {
    let mut stream = BufReader::new(stream);
    let protocol = protocol::read_protocol(&mut stream).await?;
    debug!(remote = %remote, protocol = %protocol, "Incoming stream");

    match protocol {
        Protocol::Hello => {
            let remote_id = read_peer_id(&mut stream).await?;
            let listen_port = read_listen_port(&mut stream).await?;
            protocol::write_frame(&mut stream, shared.config.peer_id.as_str().as_bytes()).await?;
            stream.flush().await?;

            // Only a dialer that listens can be reached by a new stream.
            let Some(port) = listen_port else {
                info!(peer = %remote_id, remote = %remote, "Peer connected without listening");
                return Ok(());
            };
            let addr = SocketAddr::new(remote.ip(), port);
            info!(peer = %remote_id, addr = %addr, "Peer connected");
            shared.peers.write().insert(
                remote_id.clone(),
                PeerHandle {
                    id: remote_id,
                    addr,
                },
            );
        }
        Protocol::ObjectTransfer => {
            info!(remote = %remote, "Incoming object transfer");
            let mut objects = 0usize;
            let mut bytes = 0u64;
            while let Some(frame) =
                protocol::read_frame(&mut stream, shared.config.max_frame_len).await?
            {
                let id = {
                    let store = shared.store.clone();
                    let frame = frame.clone();
                    tokio::task::spawn_blocking(move || store.write_raw(&frame)).await??
                };
                objects += 1;
                bytes += frame.len() as u64;
                debug!(id = %id, bytes = frame.len(), "Stored object");
            }
            stream.write_u64(bytes).await?;
            stream.flush().await?;
            info!(remote = %remote, objects, bytes, "Received objects");
        }
    }
    Ok(())
}

async fn read_peer_id<R: tokio::io::AsyncRead + Unpin>(reader: &mut R) -> Result<PeerId> {
    let frame = protocol::read_frame(reader, 256)
        .await?
        .ok_or_else(|| P2pError::Protocol("empty peer id".into()))?;
    let id = std::str::from_utf8(&frame)
        .map_err(|_| P2pError::Protocol("peer id is not UTF-8".into()))?;
    Ok(PeerId::new(id))
}

/// Reads the dialer's listen port. Port 0 means it is not listening.
async fn read_listen_port<R>(reader: &mut R) -> Result<Option<u16>>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let frame = protocol::read_frame(reader, 2)
        .await?
        .ok_or_else(|| P2pError::Protocol("missing listen port".into()))?;
    let port: [u8; 2] = frame[..]
        .try_into()
        .map_err(|_| P2pError::Protocol("listen port must be two bytes".into()))?;
    Ok(Some(u16::from_be_bytes(port)).filter(|&p| p != 0))
}

async fn with_deadline<T>(
    deadline: Option<Duration>,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match deadline {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| P2pError::Io(std::io::ErrorKind::TimedOut.into()))?,
        None => fut.await,
    }
}
