//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Integration tests for TLS links handshaking over an in-memory pipe.

mod common;

use common::{Event, connected_pair, identity, pair, peer};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tlslink::engine::{PeerVerification, Role, SessionInfo};
use tlslink::transport::{MemoryTransport, TlsConfig, Transport, TransportError, TransportState};

#[tokio::test(flavor = "multi_thread")]
async fn test_ping_reaches_server() {
    let (mut client, mut server) = pair(TlsConfig::new(), TlsConfig::new());
    server.tls.start().unwrap();
    client.tls.start().unwrap();

    assert_eq!(client.next_event().await, Event::State(TransportState::Connecting));
    assert_eq!(client.next_event().await, Event::State(TransportState::Connected));
    assert_eq!(server.next_event().await, Event::State(TransportState::Connecting));
    assert_eq!(server.next_event().await, Event::State(TransportState::Connected));

    assert!(client.tls.send(Some(b"ping".to_vec())).unwrap());
    assert_eq!(server.next_data().await, Some(b"ping".to_vec()));

    server.tls.send(Some(b"pong".to_vec())).unwrap();
    assert_eq!(client.next_data().await, Some(b"pong".to_vec()));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_records_arrive_in_order_after_connected() {
    let (mut client, mut server) = pair(TlsConfig::new(), TlsConfig::new());
    server.tls.start().unwrap();
    client.tls.start().unwrap();
    assert!(client.wait_for_state(TransportState::Connected).await.is_empty());

    let mut expected = Vec::new();
    for i in 0..200 {
        let record = format!("record-{i:04}|").repeat(i % 7 + 1).into_bytes();
        expected.extend_from_slice(&record);
        client.tls.send(Some(record)).unwrap();
    }

    // No cleartext may precede the Connected notification.
    assert!(server.wait_for_state(TransportState::Connected).await.is_empty());
    assert_eq!(server.read_bytes(expected.len()).await, expected);
    assert_eq!(server.tls.metrics().bytes_decrypted(), expected.len() as u64);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_large_message_spans_records() {
    let (client, mut server) = connected_pair(TlsConfig::new().with_record_buffer_size(1024)).await;

    let message: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
    client.tls.send(Some(message.clone())).unwrap();
    assert_eq!(server.read_bytes(message.len()).await, message);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_lower_close_disconnects_client() {
    let (mut client, server) = connected_pair(TlsConfig::new()).await;

    server.lower.close();

    let before = client.wait_for_state(TransportState::Disconnected).await;
    assert!(before.is_empty());
    assert_eq!(client.next_data().await, None);
    assert_eq!(client.tls.state(), TransportState::Disconnected);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(client.drain().is_empty());
    assert!(matches!(
        client.tls.send(Some(b"late".to_vec())),
        Err(TransportError::SendRejected {
            state: TransportState::Disconnected
        })
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_peer_stop_closes_both_sides() {
    let (mut client, mut server) = connected_pair(TlsConfig::new()).await;

    server.tls.stop();
    server.wait_for_state(TransportState::Disconnected).await;
    assert_eq!(server.next_data().await, None);

    // The server's close-notify reaches the client as a clean close.
    client.wait_for_state(TransportState::Disconnected).await;
    assert_eq!(client.next_data().await, None);
    assert!(client.tls.failure().is_none());
    assert!(server.tls.failure().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_server_without_identity_fails_client() {
    let (client_lower, server_lower) = MemoryTransport::pair();
    let mut server = peer(server_lower, |b| b);
    let mut client = peer(client_lower, |b| b.config(TlsConfig::new().with_host("localhost")));

    server.tls.start().unwrap();
    client.tls.start().unwrap();

    let before = client.wait_for_state(TransportState::Failed).await;
    assert!(before.is_empty());
    server.wait_for_state(TransportState::Failed).await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(client.drain().is_empty(), "no data or end-of-stream after failure");
    assert!(server.drain().is_empty());
    assert_eq!(client.tls.metrics().handshakes_failed(), 1);
    assert!(matches!(client.tls.failure(), Some(TransportError::HandshakeFailed { .. })));
    assert!(matches!(server.tls.failure(), Some(TransportError::HandshakeFailed { .. })));
    assert!(matches!(
        client.tls.send(Some(b"x".to_vec())),
        Err(TransportError::SendRejected {
            state: TransportState::Failed
        })
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_verification_failure_is_advisory() {
    let seen: Arc<Mutex<Option<SessionInfo>>> = Arc::new(Mutex::new(None));
    let (client_lower, server_lower) = MemoryTransport::pair();
    let identity = identity();
    let mut server = peer(server_lower, |b| b.identity(identity));
    let hook_seen = Arc::clone(&seen);
    let mut client = peer(client_lower, move |b| {
        b.config(TlsConfig::new().with_host("localhost"))
            .on_handshake(move |info| *hook_seen.lock().unwrap() = Some(info.clone()))
    });

    server.tls.start().unwrap();
    client.tls.start().unwrap();
    client.wait_for_state(TransportState::Connected).await;
    server.wait_for_state(TransportState::Connected).await;

    // A self-signed certificate is not trusted, yet the link is up.
    let info = client.tls.session_info();
    assert_eq!(info.role, Role::Client);
    assert_eq!(info.host.as_deref(), Some("localhost"));
    assert!(matches!(info.peer_verification, PeerVerification::Failed { .. }));

    // The hook runs right after the Connected notification.
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while seen.lock().unwrap().is_none() && std::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(seen.lock().unwrap().as_ref(), Some(&info));

    let server_info = server.tls.session_info();
    assert_eq!(server_info.role, Role::Server);
    assert_eq!(server_info.peer_verification, PeerVerification::NotPerformed);
    assert_eq!(server_info.protocol_version, info.protocol_version);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_handshake_metrics() {
    let (client, server) = connected_pair(TlsConfig::new()).await;
    for peer in [&client, &server] {
        let metrics = peer.tls.metrics();
        assert_eq!(metrics.handshakes_started(), 1);
        assert_eq!(metrics.handshakes_completed(), 1);
        assert_eq!(metrics.handshakes_failed(), 0);
        assert!(metrics.max_concurrent_tasks() <= 1);
    }
}
