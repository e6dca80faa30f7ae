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

//! Integration tests for stop, passthrough, task coalescing and flow
//! control.

mod common;

use common::{Event, connected_pair, pair};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tlslink::transport::{TlsConfig, Transport, TransportState};

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_stop_reports_once() {
    let (mut client, _server) = connected_pair(TlsConfig::new()).await;

    let tls = &client.tls;
    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(move || tls.stop());
        }
    });

    client.wait_for_state(TransportState::Disconnected).await;
    assert_eq!(client.next_data().await, None);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(client.drain().is_empty());
    client.tls.stop();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(client.drain().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_zero_length_messages_pass_through_in_order() {
    let (client, mut server) = connected_pair(TlsConfig::new()).await;

    client.tls.send(Some(b"a".to_vec())).unwrap();
    client.lower.send(Some(Vec::new())).unwrap();
    client.tls.send(Some(b"b".to_vec())).unwrap();
    client.tls.send(Some(Vec::new())).unwrap();
    client.tls.send(Some(b"c".to_vec())).unwrap();

    assert_eq!(server.next_data().await, Some(b"a".to_vec()));
    assert_eq!(server.next_data().await, Some(Vec::new()));
    assert_eq!(server.next_data().await, Some(b"b".to_vec()));
    assert_eq!(server.next_data().await, Some(Vec::new()));
    assert_eq!(server.next_data().await, Some(b"c".to_vec()));

    assert_eq!(client.tls.metrics().passthrough_messages(), 1);
    assert_eq!(server.tls.metrics().passthrough_messages(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_at_most_one_receive_task_per_link() {
    let (_client, mut server) = connected_pair(TlsConfig::new()).await;

    const PRODUCERS: usize = 8;
    const PER_PRODUCER: usize = 100;
    let tls = &server.tls;
    std::thread::scope(|scope| {
        for _ in 0..PRODUCERS {
            scope.spawn(move || {
                for _ in 0..PER_PRODUCER {
                    tls.incoming(Some(Vec::new()));
                }
            });
        }
    });

    for _ in 0..PRODUCERS * PER_PRODUCER {
        assert_eq!(server.next_data().await, Some(Vec::new()));
    }

    let metrics = server.tls.metrics();
    assert_eq!(metrics.max_concurrent_tasks(), 1);
    assert!(metrics.tasks_scheduled() <= metrics.tasks_run() + 1);
    assert_eq!(server.tls.state(), TransportState::Connected);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_slow_consumer_bounds_incoming_queue() {
    const LIMIT: usize = 1024;
    const MESSAGES: usize = 200;
    const SIZE: usize = 100;

    let (mut client, mut server) = pair(TlsConfig::new(), TlsConfig::new().with_queue_limit(LIMIT));
    server.tls.start().unwrap();
    client.tls.start().unwrap();
    client.wait_for_state(TransportState::Connected).await;
    server.wait_for_state(TransportState::Connected).await;

    let received = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&received);
    server.tls.on_recv(Some(Arc::new(move |message| {
        if let Some(message) = message {
            std::thread::sleep(Duration::from_millis(1));
            counter.fetch_add(message.len(), Ordering::SeqCst);
        }
    })));

    for i in 0..MESSAGES {
        client.tls.send(Some(vec![(i % 251) as u8; SIZE])).unwrap();
    }

    let deadline = Instant::now() + common::TIMEOUT;
    while received.load(Ordering::SeqCst) < MESSAGES * SIZE {
        assert!(Instant::now() < deadline, "timed out waiting for records");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let queue = server.tls.queue_metrics();
    assert!(queue.peak_bytes <= LIMIT, "peak {} over limit", queue.peak_bytes);
    assert!(queue.blocked_pushes > 0);
    assert_eq!(queue.capacity, LIMIT);
    assert!(!server.drain().iter().any(|event| matches!(event, Event::Data(_))));
}
