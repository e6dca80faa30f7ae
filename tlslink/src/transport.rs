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

//! Transport chain abstractions and the TLS link.
//!
//! A transport chain is a stack of message-oriented links. Every link
//! implements [`Transport`] towards the link above it and consumes the same
//! contract from the link below:
//!
//! - [`MemoryTransport`]: in-memory lower transport pair for testing and
//!   in-process use
//! - [`TlsTransport`]: TLS link encrypting everything that passes through
//!
//! # Architecture
//!
//! - **Downward**: the upper side calls [`Transport::send`]; the TLS link
//!   encrypts and forwards the records to its lower transport.
//! - **Upward**: the lower transport invokes the registered
//!   [`RecvCallback`]; the TLS link queues the ciphertext, decrypts it on a
//!   worker pool, and invokes its own upper callback with cleartext.
//! - **End of stream**: `None` travels through both directions as the
//!   closed sentinel.
//!
//! # Examples
//!
//! ```rust
//! use tlslink::transport::{MemoryTransport, Transport, TransportState};
//!
//! let (client, server) = MemoryTransport::pair();
//! assert!(client.is_active());
//! assert!(!server.is_active());
//! assert_eq!(TransportState::Connected.to_string(), "Connected");
//! ```
//!
//! # Error Handling
//!
//! Fallible operations return [`TransportError`]. Handshake failures are
//! never returned from a call; they are reported through the state observer
//! as a transition to [`TransportState::Failed`]:
//!
//! ```rust
//! use tlslink::transport::{TransportError, TransportState};
//!
//! fn describe(error: &TransportError) -> &'static str {
//!     match error {
//!         TransportError::SendRejected { state: TransportState::Connecting, .. } => "too early",
//!         TransportError::SendRejected { .. } => "not open",
//!         _ => "other",
//!     }
//! }
//! # assert_eq!(describe(&TransportError::Closed), "other");
//! ```

mod config;
mod error;
mod inbox;
mod memory;
mod state;
mod tls;
mod traits;
mod types;

pub use config::{DEFAULT_QUEUE_LIMIT, DEFAULT_RECORD_BUFFER_SIZE, TlsConfig};
pub use error::TransportError;
pub use memory::MemoryTransport;
pub use state::{StateCallback, StateMachine, TransportState};
pub use tls::{HandshakeHook, TlsTransport, TlsTransportBuilder};
pub use traits::{Message, RecvCallback, Transport};
pub use types::{TransportId, TransportMetadata};
