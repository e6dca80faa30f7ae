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

//! Backend-independent TLS handshake and record driver.
//!
//! # Overview
//!
//! A [`TlsEngine`] drives one TLS session without ever blocking:
//!
//! - [`step`](TlsEngine::step) advances the handshake by one round.
//! - [`encrypt_and_send`](TlsEngine::encrypt_and_send) seals application
//!   bytes and pushes the records to the lower transport.
//! - [`decrypt_next`](TlsEngine::decrypt_next) yields the next cleartext
//!   record from buffered ciphertext.
//! - [`shutdown`](TlsEngine::shutdown) sends close-notify, best effort.
//!
//! Every operation that runs out of input returns a `WouldBlock` status
//! instead of waiting. The caller retries once more ciphertext is queued.
//!
//! # Backends
//!
//! The protocol itself is implemented by a [`TlsBackend`], selected once at
//! construction through [`BackendKind`]:
//!
//! - **rustls** (always available)
//! - **OpenSSL** (`openssl` feature)
//!
//! Both run with the same posture: TLS 1.2 as the minimum version, no
//! legacy or weak cipher families, elliptic-curve key exchange, and
//! certificate verification that is recorded in [`SessionInfo`] but never
//! aborts the handshake.

mod backend;
mod identity;
mod io;
#[cfg(feature = "openssl")]
mod openssl_backend;
mod rustls_backend;
mod trust;

pub use backend::{BackendKind, Decoded, TlsBackend};
pub use identity::Identity;
pub use io::{EngineIo, Pull};
pub use trust::default_roots;

use crate::transport::{Message, TlsConfig, TransportError};
use thiserror::Error;

#[cfg(feature = "observability")]
use tracing::debug;

/// Which side of the handshake an engine plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Role {
    /// Sends the first flight
    Client,
    /// Answers the client's hello
    Server,
}

impl Role {
    /// The role taken above a lower transport: the initiator is the client.
    pub fn for_initiator(is_active: bool) -> Self {
        if is_active { Role::Client } else { Role::Server }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Client => write!(f, "client"),
            Role::Server => write!(f, "server"),
        }
    }
}

/// Progress of the session through handshake and record phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Created, handshake not started
    Idle,

    /// Handshake in progress
    Handshaking,

    /// Handshake complete, records may flow
    Connected,

    /// Input ended (peer close-notify or end of stream); our close-notify
    /// is still owed
    Draining,

    /// Close-notify sent, or the session never started
    Closed,

    /// Handshake or record layer failed
    Failed,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Idle => write!(f, "Idle"),
            Phase::Handshaking => write!(f, "Handshaking"),
            Phase::Connected => write!(f, "Connected"),
            Phase::Draining => write!(f, "Draining"),
            Phase::Closed => write!(f, "Closed"),
            Phase::Failed => write!(f, "Failed"),
        }
    }
}

/// Outcome of one [`TlsEngine::step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeStatus {
    /// Needs more ciphertext from the peer.
    WouldBlock,

    /// Made progress; call again.
    Progressed,

    /// Handshake finished successfully.
    Completed,

    /// Handshake failed; the session is unusable.
    Failed(String),
}

/// Outcome of one [`TlsEngine::decrypt_next`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordStatus {
    /// The next cleartext record, in order.
    Record(Message),

    /// Needs more ciphertext from the peer.
    WouldBlock,

    /// The peer closed the session, with or without close-notify.
    Closed,

    /// Fatal record-layer fault.
    Failed(String),
}

/// Advisory result of checking the peer's certificate.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PeerVerification {
    /// The chain and hostname checked out against the trust store.
    Verified,

    /// The check failed. The handshake went ahead regardless.
    Failed {
        /// Why the check failed
        reason: String,
    },

    /// No check ran: no host was configured, or this is the server role.
    #[default]
    NotPerformed,
}

/// Parameters of an established (or establishing) session.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionInfo {
    /// Backend running the session
    pub backend: BackendKind,
    /// Side of the handshake this end played
    pub role: Role,
    /// Host used for SNI and verification (client role only)
    pub host: Option<String>,
    /// Negotiated protocol version, once known
    pub protocol_version: Option<String>,
    /// Negotiated cipher suite, once known
    pub cipher_suite: Option<String>,
    /// Outcome of the advisory certificate check
    pub peer_verification: PeerVerification,
}

/// Errors returned by [`TlsEngine::encrypt_and_send`].
#[derive(Debug, Error)]
pub enum EngineError {
    /// Records can only be sent in the `Connected` phase.
    #[error("TLS engine is not connected (phase: {phase})")]
    NotConnected {
        /// Phase the engine was in
        phase: Phase,
    },

    /// The record layer or the lower transport failed.
    #[error("TLS send failed: {reason}")]
    SendFailed {
        /// Description reported by the backend
        reason: String,
    },
}

/// A TLS session driven in non-blocking steps.
///
/// The engine is not reentrant: callers serialize access to it.
pub struct TlsEngine {
    role: Role,
    phase: Phase,
    backend: Box<dyn TlsBackend>,
    record_buffer: Vec<u8>,
}

impl TlsEngine {
    /// Creates an engine using the backend selected in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::CredentialError`] if the identity cannot be
    /// loaded into the backend, or [`TransportError::InvalidConfiguration`]
    /// if the configuration is invalid.
    pub fn new(
        role: Role,
        config: &TlsConfig,
        identity: Option<&Identity>,
        io: EngineIo,
    ) -> Result<Self, TransportError> {
        config.validate()?;
        let backend: Box<dyn TlsBackend> = match config.backend() {
            BackendKind::Rustls => Box::new(rustls_backend::RustlsBackend::new(
                role,
                config.host(),
                identity,
                io,
            )?),
            #[cfg(feature = "openssl")]
            BackendKind::OpenSsl => Box::new(openssl_backend::OpenSslBackend::new(
                role,
                config.host(),
                identity,
                io,
            )?),
        };

        #[cfg(feature = "observability")]
        debug!(%role, backend = %config.backend(), "Initializing TLS engine");

        Ok(Self::with_backend(role, backend, config.record_buffer_size()))
    }

    /// Creates an engine around an already constructed backend.
    pub fn with_backend(role: Role, backend: Box<dyn TlsBackend>, record_buffer_size: usize) -> Self {
        Self {
            role,
            phase: Phase::Idle,
            backend,
            record_buffer: vec![0; record_buffer_size.max(1)],
        }
    }

    /// Side of the handshake this engine plays.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Current session phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Backend implementing this session.
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Advances the handshake by one round.
    ///
    /// May be called repeatedly; once the handshake has finished it keeps
    /// returning the final outcome.
    pub fn step(&mut self) -> HandshakeStatus {
        let status = match self.phase {
            Phase::Idle => {
                self.phase = Phase::Handshaking;
                self.backend.start_handshake()
            }
            Phase::Handshaking => self.backend.continue_handshake(),
            Phase::Connected => return HandshakeStatus::Completed,
            Phase::Draining | Phase::Closed | Phase::Failed => {
                return HandshakeStatus::Failed(format!("TLS session is {}", self.phase));
            }
        };

        match &status {
            HandshakeStatus::Completed => self.phase = Phase::Connected,
            HandshakeStatus::Failed(_) => self.phase = Phase::Failed,
            HandshakeStatus::Progressed if self.backend.is_complete() => {
                self.phase = Phase::Connected;
                return HandshakeStatus::Completed;
            }
            HandshakeStatus::Progressed | HandshakeStatus::WouldBlock => {}
        }
        status
    }

    /// Encrypts `message` and pushes it to the lower transport.
    ///
    /// `None` and zero-length messages bypass the record layer and are
    /// handed to the lower transport unchanged, which is how end-of-stream
    /// travels down the chain. Returns the lower transport's result for the
    /// last push.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotConnected`] outside the `Connected` phase.
    pub fn encrypt_and_send(&mut self, message: Option<Message>) -> Result<bool, EngineError> {
        if self.phase != Phase::Connected {
            return Err(EngineError::NotConnected { phase: self.phase });
        }

        match message {
            Some(message) if !message.is_empty() => {
                self.backend
                    .encode(&message)
                    .map_err(|reason| EngineError::SendFailed { reason })?;
                Ok(self.backend.io().last_outgoing_result())
            }
            passthrough => self
                .backend
                .io_mut()
                .forward(passthrough)
                .map_err(|e| EngineError::SendFailed {
                    reason: e.to_string(),
                }),
        }
    }

    /// Decrypts the next cleartext record from buffered ciphertext.
    ///
    /// Repeated calls produce the records in order until the buffered input
    /// runs out ([`RecordStatus::WouldBlock`]) or the peer closes.
    pub fn decrypt_next(&mut self) -> RecordStatus {
        match self.phase {
            Phase::Connected => {}
            Phase::Draining | Phase::Closed => return RecordStatus::Closed,
            phase => return RecordStatus::Failed(format!("TLS session is {phase}")),
        }

        match self.backend.decode(&mut self.record_buffer) {
            Decoded::Data(len) => RecordStatus::Record(self.record_buffer[..len].to_vec()),
            Decoded::WouldBlock => RecordStatus::WouldBlock,
            Decoded::Closed => {
                self.phase = Phase::Draining;
                RecordStatus::Closed
            }
            Decoded::Failed(reason) => {
                self.phase = Phase::Failed;
                RecordStatus::Failed(reason)
            }
        }
    }

    /// Sends close-notify unless it was already sent or the session failed.
    /// Errors are ignored.
    pub fn shutdown(&mut self) {
        match self.phase {
            Phase::Handshaking | Phase::Connected | Phase::Draining => {
                self.backend.close_notify();
                self.phase = Phase::Closed;
            }
            Phase::Idle => self.phase = Phase::Closed,
            Phase::Closed | Phase::Failed => {}
        }
    }

    /// Takes the zero-length input buffers skipped since the last call.
    pub fn take_passthrough(&mut self) -> Vec<Message> {
        self.backend.io_mut().take_passthrough()
    }

    /// Negotiated parameters so far.
    pub fn session_info(&self) -> SessionInfo {
        self.backend.session_info()
    }
}

impl std::fmt::Debug for TlsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsEngine")
            .field("role", &self.role)
            .field("phase", &self.phase)
            .field("backend", &self.backend.kind())
            .field("io", self.backend.io())
            .finish()
    }
}
