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

//! Capability set every TLS backend provides.

use crate::engine::{EngineIo, HandshakeStatus, SessionInfo};

/// TLS implementation behind an engine.
///
/// # Examples
///
/// ```rust
/// use tlslink::engine::BackendKind;
///
/// assert_eq!(BackendKind::default(), BackendKind::Rustls);
/// assert_eq!(BackendKind::Rustls.as_str(), "rustls");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BackendKind {
    /// Pure-Rust backend, always available
    #[default]
    Rustls,

    /// OpenSSL backend
    #[cfg(feature = "openssl")]
    OpenSsl,
}

impl BackendKind {
    /// Returns the string name of this backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rustls => "rustls",
            #[cfg(feature = "openssl")]
            Self::OpenSsl => "openssl",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a single [`TlsBackend::decode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// This many cleartext bytes were written to the caller's buffer.
    Data(usize),

    /// More ciphertext is needed.
    WouldBlock,

    /// The peer closed the session, cleanly or not.
    Closed,

    /// Fatal record-layer fault.
    Failed(String),
}

/// Protocol driver plugged into a [`TlsEngine`](crate::engine::TlsEngine).
///
/// A backend owns its [`EngineIo`] and performs all of its input and output
/// through it, so that the engine's queue, scheduling and state handling
/// stay independent of the backend. Retryable backend-internal conditions
/// must be absorbed here and never surface as failures.
pub trait TlsBackend: Send {
    /// Which implementation this is.
    fn kind(&self) -> BackendKind;

    /// Runs the first handshake round.
    fn start_handshake(&mut self) -> HandshakeStatus;

    /// Runs the next handshake round.
    fn continue_handshake(&mut self) -> HandshakeStatus;

    /// Returns `true` once the handshake has completed.
    fn is_complete(&self) -> bool;

    /// Encrypts `plaintext` and pushes the resulting records.
    ///
    /// # Errors
    ///
    /// Returns a description of the fault if the record layer or the lower
    /// transport failed.
    fn encode(&mut self, plaintext: &[u8]) -> Result<(), String>;

    /// Decrypts the next cleartext chunk into `buf`.
    fn decode(&mut self, buf: &mut [u8]) -> Decoded;

    /// Sends close-notify on a best-effort basis.
    fn close_notify(&mut self);

    /// Describes the negotiated session.
    fn session_info(&self) -> SessionInfo;

    /// Endpoint the backend reads ciphertext from and writes it to.
    fn io(&self) -> &EngineIo;

    /// Mutable access to the backend's endpoint.
    fn io_mut(&mut self) -> &mut EngineIo;
}
