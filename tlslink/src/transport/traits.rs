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

use crate::transport::{TransportError, TransportMetadata};
use std::sync::Arc;

/// An opaque chunk of bytes travelling through a transport chain.
pub type Message = Vec<u8>;

/// Callback through which a transport delivers data to the link above it.
///
/// `Some(message)` carries bytes (possibly zero-length); `None` is the
/// end-of-stream sentinel.
pub type RecvCallback = Arc<dyn Fn(Option<Message>) + Send + Sync>;

/// One link of a message-oriented transport chain.
///
/// Every link exposes the same bidirectional contract on its upper side:
/// the link above calls [`send`](Transport::send) to push bytes down and
/// registers a [`RecvCallback`] through [`on_recv`](Transport::on_recv) to
/// have bytes delivered up. A TLS link consumes this contract from the
/// transport below it and implements it again for the link above.
///
/// # Implementing a custom transport
///
/// ```rust
/// use tlslink::transport::{
///     Message, RecvCallback, Transport, TransportError, TransportId, TransportMetadata,
/// };
/// use std::sync::Mutex;
///
/// struct Loopback {
///     metadata: TransportMetadata,
///     callback: Mutex<Option<RecvCallback>>,
/// }
///
/// impl Transport for Loopback {
///     fn metadata(&self) -> &TransportMetadata {
///         &self.metadata
///     }
///
///     fn is_active(&self) -> bool {
///         true
///     }
///
///     fn send(&self, message: Option<Message>) -> Result<bool, TransportError> {
///         let callback = self.callback.lock().unwrap().clone();
///         match callback {
///             Some(callback) => {
///                 callback(message);
///                 Ok(true)
///             }
///             None => Ok(false),
///         }
///     }
///
///     fn on_recv(&self, callback: Option<RecvCallback>) {
///         *self.callback.lock().unwrap() = callback;
///     }
/// }
///
/// let loopback = Loopback {
///     metadata: TransportMetadata::new(TransportId::next(), "loopback"),
///     callback: Mutex::new(None),
/// };
/// assert_eq!(loopback.send(Some(b"hello".to_vec())).unwrap(), false);
/// ```
pub trait Transport: Send + Sync + 'static {
    /// Returns metadata about this transport.
    fn metadata(&self) -> &TransportMetadata;

    /// Returns `true` if this side initiated the connection.
    ///
    /// A TLS link above an active transport takes the client role.
    fn is_active(&self) -> bool;

    /// Sends a message down the chain.
    ///
    /// `None` propagates end-of-stream. The returned flag reports whether the
    /// bytes were accepted by the bottom of the chain.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot currently carry data.
    fn send(&self, message: Option<Message>) -> Result<bool, TransportError>;

    /// Registers (or with `None`, removes) the callback receiving data from
    /// this transport.
    fn on_recv(&self, callback: Option<RecvCallback>);

    /// Starts the transport.
    fn start(&self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Stops the transport. Must be idempotent.
    fn stop(&self) {}
}
