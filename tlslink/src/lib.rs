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

#![doc = include_str!("../../README.md")]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

//! # tlslink - Non-blocking TLS link
//!
//! tlslink inserts TLS into a message-oriented transport chain without ever
//! blocking a caller thread on the protocol:
//!
//! - **One state machine, several backends**: rustls by default, OpenSSL
//!   with the `openssl` feature
//! - **Non-blocking**: handshake and record processing run as short tasks on
//!   a shared worker pool and end whenever input runs out
//! - **Coalesced scheduling**: at most one receive task per link at a time
//! - **Bounded memory**: incoming ciphertext is capped in bytes and fast
//!   producers are blocked instead of buffered without limit
//! - **Advisory verification**: certificate checks are recorded for the
//!   layer above and never abort a handshake
//!
//! ## Architecture
//!
//! - **[`transport`]**: the [`Transport`] chain contract, [`TlsTransport`],
//!   connection state, errors, and an in-memory lower transport
//! - **[`engine`]**: backend-independent handshake and record driver
//! - **[`backpressure`]**: the byte-bounded incoming queue
//! - **[`pool`]**: worker pools that run receive tasks
//! - **[`observability`]**: metrics and logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tlslink::engine::Identity;
//! use tlslink::transport::{MemoryTransport, TlsConfig, TlsTransport, Transport};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let (cert_pem, key_pem) = (Vec::new(), Vec::new());
//! let (client_lower, server_lower) = MemoryTransport::pair();
//!
//! let server = TlsTransport::builder(server_lower)
//!     .identity(Arc::new(Identity::from_pem(&cert_pem, &key_pem)?))
//!     .build()?;
//! let client = TlsTransport::builder(client_lower)
//!     .config(TlsConfig::new().with_host("localhost"))
//!     .build()?;
//!
//! server.on_recv(Some(Arc::new(|message| {
//!     if let Some(bytes) = message {
//!         println!("server received {} bytes", bytes.len());
//!     }
//! })));
//! server.start()?;
//! client.start()?;
//! # Ok(())
//! # }
//! ```

pub mod backpressure;
pub mod engine;
pub mod observability;
pub mod pool;
pub mod transport;

pub use backpressure::{IncomingQueue, QueueMetrics};
pub use engine::{BackendKind, Identity, PeerVerification, SessionInfo};
pub use observability::TlsMetrics;
pub use pool::{TokioPool, WorkerPool};
pub use transport::{
    MemoryTransport, TlsConfig, TlsTransport, Transport, TransportError, TransportState,
};
