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

//! Shared helpers for TLS link integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use tlslink::engine::Identity;
use tlslink::transport::{
    MemoryTransport, Message, TlsConfig, TlsTransport, TlsTransportBuilder, Transport,
    TransportState,
};
use tokio::sync::mpsc;

pub const TIMEOUT: Duration = Duration::from_secs(10);

/// Something a link reported upward, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    State(TransportState),
    Data(Option<Message>),
}

/// A TLS link over one end of a memory pipe, with its observed events.
pub struct Peer {
    pub lower: Arc<MemoryTransport>,
    pub tls: Arc<TlsTransport>,
    pub events: mpsc::UnboundedReceiver<Event>,
}

impl Peer {
    /// Waits for the next event.
    pub async fn next_event(&mut self) -> Event {
        tokio::time::timeout(TIMEOUT, self.events.recv())
            .await
            .expect("timed out waiting for an event")
            .expect("event channel closed")
    }

    /// Waits for `state`, returning the data delivered before it.
    pub async fn wait_for_state(&mut self, state: TransportState) -> Vec<Option<Message>> {
        let mut data = Vec::new();
        loop {
            match self.next_event().await {
                Event::State(seen) if seen == state => return data,
                Event::State(_) => {}
                Event::Data(message) => data.push(message),
            }
        }
    }

    /// Waits for the next data delivery, skipping state changes.
    pub async fn next_data(&mut self) -> Option<Message> {
        loop {
            if let Event::Data(message) = self.next_event().await {
                return message;
            }
        }
    }

    /// Collects delivered bytes until `len` bytes arrived.
    pub async fn read_bytes(&mut self, len: usize) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(len);
        while bytes.len() < len {
            match self.next_data().await {
                Some(message) => bytes.extend_from_slice(&message),
                None => panic!("end of stream after {} of {len} bytes", bytes.len()),
            }
        }
        bytes
    }

    /// Returns the events already queued, without waiting.
    pub fn drain(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Routes log output through the test harness. Set `RUST_LOG` to see it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Self-signed identity for `localhost`.
pub fn identity() -> Arc<Identity> {
    let generated = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    Arc::new(
        Identity::from_der(
            vec![generated.cert.der().to_vec()],
            generated.key_pair.serialize_der(),
        )
        .unwrap(),
    )
}

/// Builds a link over `lower`, recording its events.
pub fn peer(
    lower: Arc<MemoryTransport>,
    configure: impl FnOnce(TlsTransportBuilder) -> TlsTransportBuilder,
) -> Peer {
    init_tracing();
    let (tx, events) = mpsc::unbounded_channel();

    let state_tx = tx.clone();
    let builder = TlsTransport::builder(lower.clone()).on_state_change(move |state| {
        let _ = state_tx.send(Event::State(state));
    });
    let tls = configure(builder).build().unwrap();
    tls.on_recv(Some(Arc::new(move |message| {
        let _ = tx.send(Event::Data(message));
    })));

    Peer { lower, tls, events }
}

/// Client and server links over a fresh memory pipe, not yet started.
pub fn pair(client_config: TlsConfig, server_config: TlsConfig) -> (Peer, Peer) {
    let (client_lower, server_lower) = MemoryTransport::pair();
    let identity = identity();
    let server = peer(server_lower, |b| b.config(server_config).identity(identity));
    let client = peer(client_lower, |b| b.config(client_config));
    (client, server)
}

/// Starts both links and waits until both report `Connected`.
pub async fn connected_pair(client_config: TlsConfig) -> (Peer, Peer) {
    let (mut client, mut server) = pair(client_config, TlsConfig::new());
    server.tls.start().unwrap();
    client.tls.start().unwrap();

    assert!(client.wait_for_state(TransportState::Connected).await.is_empty());
    assert!(server.wait_for_state(TransportState::Connected).await.is_empty());
    (client, server)
}
