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

//! Transport layer error types.
//!
//! Errors are split by the phase in which they can occur:
//!
//! - **Construction**: [`TransportError::CredentialError`] and
//!   [`TransportError::InvalidConfiguration`] make the instance unusable.
//! - **Handshake**: [`TransportError::HandshakeFailed`] ends the link in the
//!   `Failed` state. It is reported through the state observer and
//!   `TlsTransport::failure()`, never through the data path.
//! - **Record layer**: [`TransportError::RecordError`] is folded into a
//!   regular close once the link has been connected, and kept for
//!   `TlsTransport::failure()`.
//! - **Misuse**: [`TransportError::SendRejected`] is returned synchronously
//!   from `send()` outside the `Connected` state.
//!
//! "Would block" is not an error in this crate. Backends report it through
//! status enums and the receive task simply ends until more input arrives.

use crate::transport::TransportState;
use std::io;
use thiserror::Error;

/// Errors that can occur in a TLS link or the transports around it.
///
/// # Examples
///
/// ```rust
/// use tlslink::transport::{TransportError, TransportState};
///
/// let error = TransportError::SendRejected {
///     state: TransportState::Connecting,
/// };
/// assert!(!error.is_recoverable());
/// assert!(!error.should_close_transport());
/// ```
#[derive(Debug, Error)]
pub enum TransportError {
    /// `send()` was called while the link was not connected.
    ///
    /// The caller must not retry on this instance; a new connection is needed.
    #[error("TLS is not open (state: {state})")]
    SendRejected {
        /// State of the link when the send was attempted
        state: TransportState,
    },

    /// `start()` was called on a link that already left its initial state.
    #[error("TLS transport already started (state: {state})")]
    AlreadyStarted {
        /// State of the link when the start was attempted
        state: TransportState,
    },

    /// The TLS handshake failed with a fatal protocol error or alert.
    #[error("TLS handshake failed: {reason}")]
    HandshakeFailed {
        /// Description reported by the backend
        reason: String,
    },

    /// A fatal fault in the record layer after the handshake completed.
    #[error("TLS record error: {reason}")]
    RecordError {
        /// Description reported by the backend
        reason: String,
    },

    /// The local certificate or private key could not be used.
    #[error("invalid TLS credentials: {reason}")]
    CredentialError {
        /// Description of what was wrong with the identity
        reason: String,
    },

    /// The link was configured with invalid parameters.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Description of the configuration error
        reason: String,
    },

    /// The transport has been closed.
    #[error("transport is closed")]
    Closed,

    /// An I/O error reported by a lower transport.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl TransportError {
    /// Returns `true` if retrying the same operation later may succeed.
    ///
    /// Only transient I/O conditions qualify. Every TLS-level error is final
    /// for the instance that produced it.
    pub fn is_recoverable(&self) -> bool {
        match self {
            TransportError::Io { source } => matches!(
                source.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ),
            TransportError::SendRejected { .. }
            | TransportError::AlreadyStarted { .. }
            | TransportError::HandshakeFailed { .. }
            | TransportError::RecordError { .. }
            | TransportError::CredentialError { .. }
            | TransportError::InvalidConfiguration { .. }
            | TransportError::Closed => false,
        }
    }

    /// Returns `true` if this error means the link can no longer carry data.
    ///
    /// A rejected send is a misuse signal and does not by itself tear
    /// anything down; configuration and credential errors happen before a
    /// link exists.
    pub fn should_close_transport(&self) -> bool {
        match self {
            TransportError::HandshakeFailed { .. }
            | TransportError::RecordError { .. }
            | TransportError::Closed => true,

            TransportError::SendRejected { .. }
            | TransportError::AlreadyStarted { .. }
            | TransportError::CredentialError { .. }
            | TransportError::InvalidConfiguration { .. } => false,

            TransportError::Io { source } => !matches!(
                source.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
            ),
        }
    }

    /// Returns `true` for errors raised while loading the local identity.
    pub fn is_credential_error(&self) -> bool {
        matches!(self, TransportError::CredentialError { .. })
    }

    pub(crate) fn credential(reason: impl std::fmt::Display) -> Self {
        TransportError::CredentialError {
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid_configuration(reason: impl Into<String>) -> Self {
        TransportError::InvalidConfiguration {
            reason: reason.into(),
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(error: io::Error) -> Self {
        TransportError::Io { source: error }
    }
}
