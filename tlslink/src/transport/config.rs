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

//! Construction options for a TLS link.
//!
//! [`TlsConfig`] holds the plain-data options. Runtime collaborators (the
//! lower transport, local identity, worker pool and observers) are wired
//! through [`TlsTransportBuilder`](crate::transport::TlsTransportBuilder).

use crate::engine::BackendKind;
use crate::transport::TransportError;

/// Default byte limit of the incoming ciphertext queue (1 MiB).
pub const DEFAULT_QUEUE_LIMIT: usize = 1024 * 1024;

/// Default size of the buffer a single decrypted record is read into.
pub const DEFAULT_RECORD_BUFFER_SIZE: usize = 4096;

/// Configuration for a [`TlsTransport`](crate::transport::TlsTransport).
///
/// The role is not part of the configuration: a link takes the client role
/// when its lower transport initiated the connection and the server role
/// otherwise.
///
/// # Examples
///
/// ```rust
/// use tlslink::engine::BackendKind;
/// use tlslink::transport::TlsConfig;
///
/// let config = TlsConfig::new()
///     .with_host("example.com")
///     .with_queue_limit(64 * 1024)
///     .with_backend(BackendKind::Rustls);
///
/// assert_eq!(config.host(), Some("example.com"));
/// assert_eq!(config.queue_limit(), 64 * 1024);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TlsConfig {
    /// Peer hostname for SNI and hostname verification (client role only)
    host: Option<String>,

    /// Maximum number of buffered incoming ciphertext bytes
    queue_limit: usize,

    /// Size of the buffer each decrypted record is read into
    record_buffer_size: usize,

    /// Backend implementing the protocol
    backend: BackendKind,
}

impl TlsConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the peer hostname.
    ///
    /// Enables SNI and hostname verification when acting as a client. Ignored
    /// in the server role.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the byte limit of the incoming queue.
    pub fn with_queue_limit(mut self, limit: usize) -> Self {
        self.queue_limit = limit;
        self
    }

    /// Sets the size of the decrypted record buffer.
    pub fn with_record_buffer_size(mut self, size: usize) -> Self {
        self.record_buffer_size = size;
        self
    }

    /// Selects the TLS backend.
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Peer hostname, if any.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Byte limit of the incoming queue.
    pub fn queue_limit(&self) -> usize {
        self.queue_limit
    }

    /// Size of the decrypted record buffer.
    pub fn record_buffer_size(&self) -> usize {
        self.record_buffer_size
    }

    /// Selected TLS backend.
    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    /// Checks the configuration for values that cannot work.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidConfiguration`] for a zero queue
    /// limit, a zero record buffer, or an empty host name.
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.queue_limit == 0 {
            return Err(TransportError::invalid_configuration(
                "queue limit must be greater than 0",
            ));
        }
        if self.record_buffer_size == 0 {
            return Err(TransportError::invalid_configuration(
                "record buffer size must be greater than 0",
            ));
        }
        if self.host.as_deref().is_some_and(str::is_empty) {
            return Err(TransportError::invalid_configuration(
                "host must not be empty",
            ));
        }
        Ok(())
    }
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            host: None,
            queue_limit: DEFAULT_QUEUE_LIMIT,
            record_buffer_size: DEFAULT_RECORD_BUFFER_SIZE,
            backend: BackendKind::default(),
        }
    }
}
