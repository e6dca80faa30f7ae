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

//! In-memory transport implementation for testing.
//!
//! [`MemoryTransport::pair`] returns two lower transports joined by an
//! in-memory byte pipe. Each direction is drained by its own forwarding
//! thread so that a send never runs the receiving side's callback on the
//! sender's stack, just like a socket.

use crate::transport::inbox::Inbox;
use crate::transport::{
    Message, RecvCallback, Transport, TransportError, TransportId, TransportMetadata,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

#[cfg(feature = "observability")]
use tracing::{debug, trace};

/// In-memory lower transport.
///
/// # Examples
///
/// ```rust
/// use tlslink::transport::{MemoryTransport, Transport};
/// use std::sync::mpsc;
/// use std::sync::Arc;
///
/// let (client, server) = MemoryTransport::pair();
/// assert!(client.is_active());
/// assert!(!server.is_active());
///
/// let (tx, rx) = mpsc::channel();
/// let tx = std::sync::Mutex::new(tx);
/// server.on_recv(Some(Arc::new(move |message| {
///     tx.lock().unwrap().send(message).unwrap();
/// })));
///
/// client.send(Some(b"hello".to_vec())).unwrap();
/// assert_eq!(rx.recv().unwrap(), Some(b"hello".to_vec()));
/// ```
pub struct MemoryTransport {
    metadata: TransportMetadata,
    active: bool,
    outbound: mpsc::UnboundedSender<Option<Message>>,
    inbox: Arc<Inbox>,
    closed: AtomicBool,
}

impl MemoryTransport {
    /// Creates a pair of connected memory transports.
    ///
    /// The first transport is the active (initiating) side, the second the
    /// passive (accepting) side.
    pub fn pair() -> (Arc<Self>, Arc<Self>) {
        let (tx1, rx1) = mpsc::unbounded_channel();
        let (tx2, rx2) = mpsc::unbounded_channel();

        let inbox1 = Arc::new(Inbox::default());
        let inbox2 = Arc::new(Inbox::default());

        let first = Arc::new(Self {
            metadata: TransportMetadata::new(TransportId::next(), "memory"),
            active: true,
            outbound: tx1,
            inbox: Arc::clone(&inbox1),
            closed: AtomicBool::new(false),
        });
        let second = Arc::new(Self {
            metadata: TransportMetadata::new(TransportId::next(), "memory"),
            active: false,
            outbound: tx2,
            inbox: Arc::clone(&inbox2),
            closed: AtomicBool::new(false),
        });

        // first -> second, second -> first
        spawn_forwarder(rx1, inbox2);
        spawn_forwarder(rx2, inbox1);

        #[cfg(feature = "observability")]
        debug!(
            first = %first.metadata.id,
            second = %second.metadata.id,
            "Created memory transport pair"
        );

        (first, second)
    }

    /// Closes this side: the peer receives the end-of-stream sentinel.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.outbound.send(None);
        }
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

fn spawn_forwarder(mut rx: mpsc::UnboundedReceiver<Option<Message>>, inbox: Arc<Inbox>) {
    let spawned = std::thread::Builder::new()
        .name("tlslink-memory".to_string())
        .spawn(move || {
            while let Some(message) = rx.blocking_recv() {
                let end = message.is_none();
                inbox.deliver(message);
                if end {
                    return;
                }
            }
            // Sender dropped without an explicit close.
            inbox.deliver(None);
        });
    if let Err(_error) = spawned {
        #[cfg(feature = "observability")]
        tracing::error!(error = %_error, "Failed to spawn memory transport forwarder");
    }
}

impl Transport for MemoryTransport {
    fn metadata(&self) -> &TransportMetadata {
        &self.metadata
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn send(&self, message: Option<Message>) -> Result<bool, TransportError> {
        if self.is_closed() {
            return Ok(false);
        }
        match message {
            None => {
                self.close();
                Ok(true)
            }
            Some(message) => {
                #[cfg(feature = "observability")]
                trace!(transport_id = %self.metadata.id, size = message.len(), "Memory send");
                Ok(self.outbound.send(Some(message)).is_ok())
            }
        }
    }

    fn on_recv(&self, callback: Option<RecvCallback>) {
        self.inbox.register(callback);
    }

    fn stop(&self) {
        self.close();
    }
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("metadata", &self.metadata)
            .field("active", &self.active)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::mpsc as std_mpsc;
    use std::time::Duration;

    fn collector() -> (RecvCallback, std_mpsc::Receiver<Option<Message>>) {
        let (tx, rx) = std_mpsc::channel();
        let tx = Mutex::new(tx);
        let callback: RecvCallback = Arc::new(move |message| {
            let _ = tx.lock().unwrap().send(message);
        });
        (callback, rx)
    }

    #[test]
    fn test_pair_roles() {
        let (a, b) = MemoryTransport::pair();
        assert!(a.is_active());
        assert!(!b.is_active());
        assert_ne!(a.metadata().id, b.metadata().id);
        assert_eq!(a.metadata().transport_type, "memory");
    }

    #[test]
    fn test_messages_are_delivered_in_order() {
        let (a, b) = MemoryTransport::pair();
        let (callback, rx) = collector();
        b.on_recv(Some(callback));

        for i in 0u8..10 {
            assert!(a.send(Some(vec![i; 3])).unwrap());
        }
        for i in 0u8..10 {
            let message = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            assert_eq!(message, Some(vec![i; 3]));
        }
    }

    #[test]
    fn test_backlog_flushed_on_registration() {
        let (a, b) = MemoryTransport::pair();
        a.send(Some(b"early".to_vec())).unwrap();
        a.send(Some(Vec::new())).unwrap();
        std::thread::sleep(Duration::from_millis(50));

        let (callback, rx) = collector();
        b.on_recv(Some(callback));
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            Some(b"early".to_vec())
        );
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), Some(Vec::new()));
    }

    #[test]
    fn test_close_delivers_end_of_stream_once() {
        let (a, b) = MemoryTransport::pair();
        let (callback, rx) = collector();
        b.on_recv(Some(callback));

        a.close();
        a.close();
        assert!(a.is_closed());
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), None);
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert!(!a.send(Some(b"late".to_vec())).unwrap());
    }

    #[test]
    fn test_drop_delivers_end_of_stream() {
        let (a, b) = MemoryTransport::pair();
        let (callback, rx) = collector();
        b.on_recv(Some(callback));

        drop(a);
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), None);
    }
}
