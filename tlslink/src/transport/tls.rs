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

//! TLS link for transport chains.
//!
//! [`TlsTransport`] sits between a lower transport carrying ciphertext and
//! an upper consumer exchanging cleartext, and implements [`Transport`] on
//! its upper side. It never blocks a caller thread on the protocol:
//!
//! - Ciphertext from the lower transport is pushed into a byte-bounded
//!   [`IncomingQueue`] and a receive task is scheduled on a [`WorkerPool`].
//! - The receive task drives the handshake and decrypts records until the
//!   engine runs out of input, then simply ends. The next arrival schedules
//!   a new one.
//! - Scheduling is coalesced: at most one receive task per link is queued or
//!   running at any time.
//!
//! # Examples
//!
//! ```rust,no_run
//! use tlslink::engine::Identity;
//! use tlslink::transport::{MemoryTransport, TlsConfig, TlsTransport, Transport};
//! use std::sync::Arc;
//!
//! # fn example(cert_pem: &[u8], key_pem: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
//! let (client_lower, server_lower) = MemoryTransport::pair();
//!
//! let server = TlsTransport::builder(server_lower)
//!     .identity(Arc::new(Identity::from_pem(cert_pem, key_pem)?))
//!     .build()?;
//! let client = TlsTransport::builder(client_lower)
//!     .config(TlsConfig::new().with_host("localhost"))
//!     .on_state_change(|state| println!("client is now {state}"))
//!     .build()?;
//!
//! server.on_recv(Some(Arc::new(|message| println!("server got {message:?}"))));
//! server.start()?;
//! client.start()?;
//! # Ok(())
//! # }
//! ```

use crate::backpressure::{IncomingQueue, QueueMetrics};
use crate::engine::{
    EngineError, EngineIo, HandshakeStatus, Identity, RecordStatus, Role, SessionInfo, TlsEngine,
};
use crate::observability::TlsMetrics;
use crate::pool::{WorkerPool, default_pool};
use crate::transport::inbox::Inbox;
use crate::transport::{
    Message, RecvCallback, StateCallback, StateMachine, TlsConfig, Transport, TransportError,
    TransportId, TransportMetadata, TransportState,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

#[cfg(feature = "observability")]
use tracing::{debug, error, info, trace};

/// Hook invoked once, right after the link reports `Connected`.
pub type HandshakeHook = Arc<dyn Fn(&SessionInfo) + Send + Sync>;

/// Whether a receive task suspended for input or ended the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Progress {
    Suspended,
    Ended,
}

/// Fatal backend error that ended the session.
#[derive(Debug, Clone)]
enum Fault {
    Handshake(String),
    Record(String),
}

/// A TLS link layered over another [`Transport`].
///
/// Built with [`TlsTransport::builder`]. The link takes the client role if
/// the lower transport initiated the connection, and the server role
/// otherwise.
pub struct TlsTransport {
    metadata: TransportMetadata,
    this: Weak<TlsTransport>,
    lower: Arc<dyn Transport>,
    role: Role,

    queue: Arc<IncomingQueue>,
    /// Locked per engine operation, never across an upward delivery.
    engine: Mutex<TlsEngine>,
    /// Receive tasks queued or running: 0 or 1.
    pending: AtomicUsize,
    /// Held for the whole body of a receive task.
    task_lock: Mutex<()>,

    state: StateMachine,
    upper: Inbox,
    pool: Arc<dyn WorkerPool>,
    on_handshake: Option<HandshakeHook>,
    metrics: TlsMetrics,
    /// First fatal error reported by the engine, if any.
    fault: Mutex<Option<Fault>>,
}

impl TlsTransport {
    /// Starts building a link over `lower`.
    pub fn builder(lower: Arc<dyn Transport>) -> TlsTransportBuilder {
        TlsTransportBuilder::new(lower)
    }

    /// Builds a link over `lower` with `config` and no identity.
    ///
    /// # Errors
    ///
    /// See [`TlsTransportBuilder::build`].
    pub fn new(lower: Arc<dyn Transport>, config: TlsConfig) -> Result<Arc<Self>, TransportError> {
        Self::builder(lower).config(config).build()
    }

    /// Client if the lower transport initiated the connection.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Current connection state.
    pub fn state(&self) -> TransportState {
        self.state.state()
    }

    /// Counters for this link.
    pub fn metrics(&self) -> &TlsMetrics {
        &self.metrics
    }

    /// Snapshot of the incoming queue's flow-control counters.
    pub fn queue_metrics(&self) -> QueueMetrics {
        self.queue.metrics()
    }

    /// Negotiated session parameters and the advisory verification result.
    pub fn session_info(&self) -> SessionInfo {
        self.engine().session_info()
    }

    /// The error that ended the session, if the backend reported one.
    ///
    /// [`TransportError::HandshakeFailed`] when the link failed before
    /// connecting, [`TransportError::RecordError`] when a record fault closed
    /// a connected link. `None` for orderly closes and local stops that
    /// interrupted nothing.
    pub fn failure(&self) -> Option<TransportError> {
        let fault = self.fault.lock().unwrap_or_else(PoisonError::into_inner);
        fault.clone().map(|fault| match fault {
            Fault::Handshake(reason) => TransportError::HandshakeFailed { reason },
            Fault::Record(reason) => TransportError::RecordError { reason },
        })
    }

    fn record_fault(&self, fault: Fault) {
        self.fault
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_or_insert(fault);
    }

    /// Accepts data from the lower transport.
    ///
    /// `None` is end-of-stream. Blocks the calling thread while the incoming
    /// queue is full. Data arriving after the link stopped is dropped.
    pub fn incoming(&self, message: Option<Message>) {
        match message {
            Some(message) => {
                #[cfg(feature = "observability")]
                trace!(transport_id = %self.metadata.id, size = message.len(), "Incoming");
                if !self.queue.push(message) {
                    #[cfg(feature = "observability")]
                    trace!(transport_id = %self.metadata.id, "Incoming data after stop dropped");
                }
            }
            None => {
                #[cfg(feature = "observability")]
                debug!(transport_id = %self.metadata.id, "Lower transport closed");
                self.queue.stop();
            }
        }
        self.schedule();
    }

    fn engine(&self) -> MutexGuard<'_, TlsEngine> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs one engine operation, then delivers any zero-length input it
    /// skipped.
    fn with_engine<R>(&self, op: impl FnOnce(&mut TlsEngine) -> R) -> R {
        let (result, passthrough) = {
            let mut engine = self.engine();
            let result = op(&mut *engine);
            (result, engine.take_passthrough())
        };
        for message in passthrough {
            self.metrics.record_passthrough();
            self.upper.deliver(Some(message));
        }
        result
    }

    /// Requests a receive task. Only the request that finds none pending
    /// submits one.
    fn schedule(&self) {
        if self
            .pending
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.metrics.record_schedule_coalesced();
            return;
        }

        // The task owns a strong handle so the link outlives it.
        let Some(this) = self.this.upgrade() else {
            self.pending.store(0, Ordering::Release);
            return;
        };
        self.metrics.record_task_scheduled();
        self.pool.submit(Box::new(move || this.run_receive_task()));
    }

    fn run_receive_task(&self) {
        let _task = self.task_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.pending.fetch_sub(1, Ordering::AcqRel);
        let _running = self.metrics.enter_task();

        match self.state.state() {
            TransportState::Connecting | TransportState::Connected => {}
            TransportState::Disconnected | TransportState::Failed => return,
        }

        if self.drive() == Progress::Ended {
            self.resolve();
        }
    }

    fn drive(&self) -> Progress {
        if self.state.state() == TransportState::Connecting {
            loop {
                match self.with_engine(TlsEngine::step) {
                    HandshakeStatus::WouldBlock => return Progress::Suspended,
                    HandshakeStatus::Progressed => {}
                    HandshakeStatus::Completed => {
                        self.handshake_completed();
                        break;
                    }
                    HandshakeStatus::Failed(reason) => {
                        #[cfg(feature = "observability")]
                        error!(transport_id = %self.metadata.id, %reason, "TLS handshake error");
                        self.metrics.record_handshake_failed();
                        self.record_fault(Fault::Handshake(reason));
                        return Progress::Ended;
                    }
                }
            }
        }

        if self.state.state() == TransportState::Connected {
            loop {
                match self.with_engine(TlsEngine::decrypt_next) {
                    RecordStatus::Record(record) => {
                        #[cfg(feature = "observability")]
                        trace!(transport_id = %self.metadata.id, size = record.len(), "Decrypted record");
                        self.metrics.record_record_decrypted(record.len());
                        self.upper.deliver(Some(record));
                    }
                    RecordStatus::WouldBlock => return Progress::Suspended,
                    RecordStatus::Closed => {
                        #[cfg(feature = "observability")]
                        debug!(transport_id = %self.metadata.id, "TLS connection closed by peer");
                        return Progress::Ended;
                    }
                    // Treated like a peer close once connected.
                    RecordStatus::Failed(reason) => {
                        #[cfg(feature = "observability")]
                        error!(transport_id = %self.metadata.id, %reason, "TLS recv error");
                        self.record_fault(Fault::Record(reason));
                        return Progress::Ended;
                    }
                }
            }
        }

        Progress::Ended
    }

    fn handshake_completed(&self) {
        let session = self.engine().session_info();
        #[cfg(feature = "observability")]
        info!(
            transport_id = %self.metadata.id,
            role = %self.role,
            version = session.protocol_version.as_deref().unwrap_or("unknown"),
            cipher = session.cipher_suite.as_deref().unwrap_or("unknown"),
            verification = ?session.peer_verification,
            "TLS handshake finished"
        );
        self.metrics.record_handshake_completed();
        self.state.transition(TransportState::Connected);
        if let Some(hook) = &self.on_handshake {
            hook(&session);
        }
    }

    /// Closes the session and moves to the terminal state.
    fn resolve(&self) {
        self.with_engine(TlsEngine::shutdown);

        if self.state.was_connected() {
            if self.state.transition(TransportState::Disconnected) {
                #[cfg(feature = "observability")]
                info!(transport_id = %self.metadata.id, "TLS closed");
                self.upper.deliver(None);
            }
        } else if self.state.transition(TransportState::Failed) {
            #[cfg(feature = "observability")]
            error!(transport_id = %self.metadata.id, "TLS handshake failed");
        }

        // Releases producers blocked on a full queue.
        self.queue.stop();
    }
}

impl Transport for TlsTransport {
    fn metadata(&self) -> &TransportMetadata {
        &self.metadata
    }

    fn is_active(&self) -> bool {
        self.lower.is_active()
    }

    /// Encrypts and sends `message`.
    ///
    /// `None` and zero-length messages are passed to the lower transport
    /// without encryption. Returns the lower transport's result for the
    /// last ciphertext push.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::SendRejected`] unless the link is
    /// `Connected`, and [`TransportError::RecordError`] if encryption or
    /// the lower transport failed.
    fn send(&self, message: Option<Message>) -> Result<bool, TransportError> {
        let state = self.state.state();
        if state != TransportState::Connected {
            return Err(TransportError::SendRejected { state });
        }

        let size = message.as_ref().map_or(0, Vec::len);
        #[cfg(feature = "observability")]
        trace!(transport_id = %self.metadata.id, size, "Send");

        match self.engine().encrypt_and_send(message) {
            Ok(accepted) => {
                if size > 0 {
                    self.metrics.record_record_encrypted(size);
                } else {
                    self.metrics.record_passthrough();
                }
                Ok(accepted)
            }
            Err(EngineError::NotConnected { .. }) => Err(TransportError::SendRejected {
                state: self.state.state(),
            }),
            Err(EngineError::SendFailed { reason }) => {
                #[cfg(feature = "observability")]
                error!(transport_id = %self.metadata.id, %reason, "TLS send failed");
                Err(TransportError::RecordError { reason })
            }
        }
    }

    fn on_recv(&self, callback: Option<RecvCallback>) {
        self.upper.register(callback);
    }

    /// Registers with the lower transport and starts the handshake.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::AlreadyStarted`] if the link is not in its
    /// initial state.
    fn start(&self) -> Result<(), TransportError> {
        #[cfg(feature = "observability")]
        debug!(transport_id = %self.metadata.id, role = %self.role, "Starting TLS transport");

        if !self.state.transition(TransportState::Connecting) {
            return Err(TransportError::AlreadyStarted {
                state: self.state.state(),
            });
        }
        self.metrics.record_handshake_started();

        let this = self.this.clone();
        self.lower.on_recv(Some(Arc::new(move |message| {
            if let Some(transport) = this.upgrade() {
                transport.incoming(message);
            }
        })));

        self.schedule();
        Ok(())
    }

    /// Ends input, unregisters from the lower transport, and lets the
    /// receive task reach the terminal state. Idempotent.
    fn stop(&self) {
        #[cfg(feature = "observability")]
        debug!(transport_id = %self.metadata.id, "Stopping TLS transport");
        self.queue.stop();
        self.lower.on_recv(None);
        self.schedule();
    }
}

impl Drop for TlsTransport {
    fn drop(&mut self) {
        self.queue.stop();
        self.lower.on_recv(None);
    }
}

impl std::fmt::Debug for TlsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsTransport")
            .field("metadata", &self.metadata)
            .field("role", &self.role)
            .field("state", &self.state.state())
            .field("lower", self.lower.metadata())
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

/// Builder for [`TlsTransport`].
///
/// Only the lower transport is required. Without a worker pool the link
/// runs on the current tokio runtime, or on a process-wide one outside a
/// runtime.
pub struct TlsTransportBuilder {
    lower: Arc<dyn Transport>,
    config: TlsConfig,
    identity: Option<Arc<Identity>>,
    pool: Option<Arc<dyn WorkerPool>>,
    on_state_change: Option<StateCallback>,
    on_handshake: Option<HandshakeHook>,
}

impl TlsTransportBuilder {
    fn new(lower: Arc<dyn Transport>) -> Self {
        Self {
            lower,
            config: TlsConfig::default(),
            identity: None,
            pool: None,
            on_state_change: None,
            on_handshake: None,
        }
    }

    /// Plain-data options. Defaults to [`TlsConfig::default`].
    pub fn config(mut self, config: TlsConfig) -> Self {
        self.config = config;
        self
    }

    /// Local certificate and key. Required in practice for the server role.
    pub fn identity(mut self, identity: Arc<Identity>) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Worker pool that runs receive tasks.
    pub fn pool(mut self, pool: Arc<dyn WorkerPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Observer called synchronously on every state transition.
    ///
    /// It must not block and must not call back into the link.
    pub fn on_state_change(
        mut self,
        observer: impl Fn(TransportState) + Send + Sync + 'static,
    ) -> Self {
        self.on_state_change = Some(Arc::new(observer));
        self
    }

    /// Hook called once the handshake completed, after the `Connected`
    /// notification.
    pub fn on_handshake(mut self, hook: impl Fn(&SessionInfo) + Send + Sync + 'static) -> Self {
        self.on_handshake = Some(Arc::new(hook));
        self
    }

    /// Builds the link. It stays idle until [`Transport::start`].
    ///
    /// # Errors
    ///
    /// - [`TransportError::InvalidConfiguration`] for an invalid
    ///   configuration
    /// - [`TransportError::CredentialError`] if the identity is rejected by
    ///   the backend
    /// - [`TransportError::Io`] if no worker pool was given and the shared
    ///   one cannot start
    pub fn build(self) -> Result<Arc<TlsTransport>, TransportError> {
        self.config.validate()?;

        let role = Role::for_initiator(self.lower.is_active());
        let pool = match self.pool {
            Some(pool) => pool,
            None => default_pool()?,
        };

        let queue = Arc::new(IncomingQueue::new(self.config.queue_limit()));
        let io = EngineIo::new(Arc::clone(&queue), Arc::clone(&self.lower));
        let engine = TlsEngine::new(role, &self.config, self.identity.as_deref(), io)?;

        let metadata = TransportMetadata::new(TransportId::next(), "tls");
        #[cfg(feature = "observability")]
        debug!(
            transport_id = %metadata.id,
            lower = %self.lower.metadata().id,
            %role,
            backend = %self.config.backend(),
            "Initializing TLS transport"
        );

        Ok(Arc::new_cyclic(|this| TlsTransport {
            metadata,
            this: this.clone(),
            lower: self.lower,
            role,
            queue,
            engine: Mutex::new(engine),
            pending: AtomicUsize::new(0),
            task_lock: Mutex::new(()),
            state: StateMachine::new(self.on_state_change),
            upper: Inbox::default(),
            pool,
            on_handshake: self.on_handshake,
            metrics: TlsMetrics::new(),
            fault: Mutex::new(None),
        }))
    }
}

impl std::fmt::Debug for TlsTransportBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsTransportBuilder")
            .field("lower", self.lower.metadata())
            .field("config", &self.config)
            .field("identity", &self.identity)
            .field("has_pool", &self.pool.is_some())
            .finish_non_exhaustive()
    }
}
