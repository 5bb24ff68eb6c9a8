//! Object transfer between two hosts over loopback.

use drift_p2p::protocol::{self, Protocol};
use drift_p2p::{HostConfig, P2pError, PeerHandle, PeerHost, PeerId};
use drift_storage::{ObjectId, ObjectStore, ObjectType};
use flate2::{write::ZlibEncoder, Compression};
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

fn host_with_store() -> (tempfile::TempDir, ObjectStore, PeerHost) {
    let dir = tempfile::tempdir().unwrap();
    let store = ObjectStore::open(dir.path().join("objects"));
    let host = PeerHost::new(HostConfig::new(PeerId::random()), store.clone());
    (dir, store, host)
}

#[tokio::test]
async fn test_send_objects_end_to_end() {
    let (_d1, sender_store, sender) = host_with_store();
    let (_d2, receiver_store, receiver) = host_with_store();

    let blob = sender_store.write_blob(&b"hello, peer"[..]).unwrap();
    let tree = sender_store
        .write(ObjectType::Tree, format!("100644 blob {} greeting\n", blob))
        .unwrap();

    let addr = receiver.listen("127.0.0.1:0").await.unwrap();
    let peer = sender.connect(&addr.to_string()).await.unwrap();

    let report = sender.send_objects(&peer, &[blob, tree]).await.unwrap();
    assert_eq!(report.objects, 2);
    assert_eq!(report.bytes_acknowledged, report.bytes_sent);
    let expected = sender_store.read_raw(&blob).unwrap().len()
        + sender_store.read_raw(&tree).unwrap().len();
    assert_eq!(report.bytes_sent, expected as u64);

    assert_eq!(receiver_store.read(&blob).unwrap().data, &b"hello, peer"[..]);
    assert!(receiver_store.exists(&tree));
    receiver.shutdown();
}

#[tokio::test]
async fn test_send_nothing() {
    let (_d1, _s1, sender) = host_with_store();
    let (_d2, receiver_store, receiver) = host_with_store();
    let addr = receiver.listen("127.0.0.1:0").await.unwrap();
    let peer = sender.connect(&addr.to_string()).await.unwrap();

    let report = sender.send_objects(&peer, &[]).await.unwrap();
    assert_eq!(report.objects, 0);
    assert_eq!(report.bytes_acknowledged, 0);
    assert!(receiver_store.list().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_local_object_fails_transfer() {
    let (_d1, _s1, sender) = host_with_store();
    let (_d2, _s2, receiver) = host_with_store();
    let addr = receiver.listen("127.0.0.1:0").await.unwrap();
    let peer = sender.connect(&addr.to_string()).await.unwrap();

    let missing = drift_storage::ObjectId::hash_object(ObjectType::Blob, b"never stored");
    assert!(matches!(
        sender.send_objects(&peer, &[missing]).await,
        Err(P2pError::Transfer(_))
    ));
}

#[tokio::test]
async fn test_send_to_stopped_peer_fails() {
    let (_d1, store, sender) = host_with_store();
    let (_d2, _s2, receiver) = host_with_store();
    let addr = receiver.listen("127.0.0.1:0").await.unwrap();
    let peer = sender.connect(&addr.to_string()).await.unwrap();
    receiver.shutdown();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let id = store.write_blob(&b"x"[..]).unwrap();
    let stale = PeerHandle {
        id: peer.id.clone(),
        addr: peer.addr,
    };
    assert!(matches!(
        sender.send_objects(&stale, &[id]).await,
        Err(P2pError::Transfer(_))
    ));
}

#[tokio::test]
async fn test_listener_sends_back_to_dialer() {
    let (_d1, store_a, a) = host_with_store();
    let (_d2, store_b, b) = host_with_store();
    let addr_a = a.listen("127.0.0.1:0").await.unwrap();
    let addr_b = b.listen("127.0.0.1:0").await.unwrap();

    b.connect(&addr_a.to_string()).await.unwrap();
    for _ in 0..50 {
        if a.peer_count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let peer = a.peers().into_iter().next().unwrap();
    assert_eq!(peer.id, *b.peer_id());
    assert_eq!(peer.addr, addr_b);

    let id = store_a.write_blob(&b"reply"[..]).unwrap();
    let report = a.send_objects(&peer, &[id]).await.unwrap();
    assert_eq!(report.objects, 1);
    assert_eq!(store_b.read(&id).unwrap().data, &b"reply"[..]);

    a.shutdown();
    b.shutdown();
}

fn zlib(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

/// Sends one frame over a raw object-transfer stream and returns the ack,
/// if the receiver sent one.
async fn send_raw_frame(addr: std::net::SocketAddr, frame: &[u8]) -> Option<u64> {
    let mut request = Vec::new();
    protocol::write_protocol(&mut request, Protocol::ObjectTransfer).await.unwrap();
    protocol::write_frame(&mut request, frame).await.unwrap();
    protocol::write_end(&mut request).await.unwrap();

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(&request).await.unwrap();
    stream.flush().await.unwrap();
    stream.read_u64().await.ok()
}

#[tokio::test]
async fn test_tampered_frames_are_not_persisted() {
    let (_d, receiver_store, receiver) = host_with_store();
    let addr = receiver.listen("127.0.0.1:0").await.unwrap();

    // The header claims more bytes than the payload carries.
    let lying_header = zlib(b"blob 99\0short");
    // Not a zlib stream at all.
    let garbage = b"definitely not zlib".to_vec();

    for frame in [lying_header, garbage] {
        assert_eq!(send_raw_frame(addr, &frame).await, None);
    }
    assert!(receiver_store.list().unwrap().is_empty());
    assert!(!receiver_store.exists(&ObjectId::hash_object(ObjectType::Blob, b"short")));

    // An intact frame on a fresh stream is still accepted.
    let intact = zlib(b"blob 5\0short");
    assert_eq!(send_raw_frame(addr, &intact).await, Some(intact.len() as u64));
    assert!(receiver_store.exists(&ObjectId::hash_object(ObjectType::Blob, b"short")));
    receiver.shutdown();
}
