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

//! Byte plumbing between a TLS backend and the transports around it.
//!
//! A backend never talks to the queue or the lower transport directly. It
//! reads ciphertext through [`EngineIo::pull`] and writes ciphertext through
//! [`EngineIo::push`], or through the [`Read`]/[`Write`] impls that wrap
//! them in the `std::io` convention most TLS libraries expect:
//!
//! | Primitive | `std::io` form |
//! |-----------|----------------|
//! | `Pull::Data(n)` | `Ok(n)` |
//! | `Pull::WouldBlock` | `Err(ErrorKind::WouldBlock)` |
//! | `Pull::Eof` | `Ok(0)` |
//! | failed push | `Err(ErrorKind::ConnectionReset)` |

use crate::backpressure::{IncomingQueue, Popped};
use crate::transport::{Message, Transport};
use std::io::{self, IoSlice, Read, Write};
use std::sync::Arc;

#[cfg(feature = "observability")]
use tracing::{trace, warn};

/// Result of a single [`EngineIo::pull`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    /// This many bytes were copied into the caller's buffer.
    Data(usize),

    /// No ciphertext is available yet.
    WouldBlock,

    /// The queue was stopped and fully drained.
    Eof,
}

/// Read position inside the buffer at the head of the incoming queue.
///
/// A buffer is popped from the queue once and then served across as many
/// pulls as the backend needs. A partially consumed buffer survives the end
/// of a receive task and is resumed by the next one.
#[derive(Debug, Default)]
pub(crate) struct Cursor {
    current: Option<Message>,
    position: usize,
}

impl Cursor {
    fn remaining(&self) -> &[u8] {
        match &self.current {
            Some(message) => &message[self.position..],
            None => &[],
        }
    }

    fn has_remaining(&self) -> bool {
        !self.remaining().is_empty()
    }

    fn load(&mut self, message: Message) {
        self.current = Some(message);
        self.position = 0;
    }

    fn take_into(&mut self, buf: &mut [u8]) -> usize {
        let remaining = self.remaining();
        let len = remaining.len().min(buf.len());
        buf[..len].copy_from_slice(&remaining[..len]);
        self.position += len;
        if !self.has_remaining() {
            self.current = None;
            self.position = 0;
        }
        len
    }
}

/// I/O endpoint owned by a TLS backend.
pub struct EngineIo {
    cursor: Cursor,
    queue: Arc<IncomingQueue>,
    lower: Arc<dyn Transport>,
    /// Result of the most recent send to the lower transport.
    outgoing_result: bool,
    /// Zero-length buffers found while pulling, waiting to go upward.
    passthrough: Vec<Message>,
}

impl EngineIo {
    /// Creates an endpoint reading from `queue` and writing to `lower`.
    pub fn new(queue: Arc<IncomingQueue>, lower: Arc<dyn Transport>) -> Self {
        Self {
            cursor: Cursor::default(),
            queue,
            lower,
            outgoing_result: false,
            passthrough: Vec::new(),
        }
    }

    /// Copies up to `buf.len()` ciphertext bytes into `buf`.
    ///
    /// Zero-length buffers at the head of the queue are never returned as
    /// data; they are set aside for [`take_passthrough`](Self::take_passthrough).
    pub fn pull(&mut self, buf: &mut [u8]) -> Pull {
        if buf.is_empty() {
            return Pull::Data(0);
        }
        loop {
            if self.cursor.has_remaining() {
                return Pull::Data(self.cursor.take_into(buf));
            }
            match self.queue.pop() {
                Popped::Message(message) if message.is_empty() => self.passthrough.push(message),
                Popped::Message(message) => self.cursor.load(message),
                Popped::Empty => return Pull::WouldBlock,
                Popped::Stopped => return Pull::Eof,
            }
        }
    }

    /// Hands ciphertext to the lower transport, synchronously.
    ///
    /// # Errors
    ///
    /// Returns the lower transport's error if it refused the call. A
    /// successful call whose bytes were not accepted is not an error; it is
    /// recorded in [`last_outgoing_result`](Self::last_outgoing_result).
    pub fn push(&mut self, bytes: &[u8]) -> Result<(), crate::transport::TransportError> {
        #[cfg(feature = "observability")]
        trace!(transport_id = %self.lower.metadata().id, size = bytes.len(), "Ciphertext out");
        self.forward(Some(bytes.to_vec())).map(|_| ())
    }

    /// Sends `message` to the lower transport without touching the record
    /// layer.
    pub(crate) fn forward(
        &mut self,
        message: Option<Message>,
    ) -> Result<bool, crate::transport::TransportError> {
        let result = self.lower.send(message)?;
        self.outgoing_result = result;
        Ok(result)
    }

    /// Returns `true` if a pull would currently yield data or a queued
    /// buffer.
    pub fn has_pending_input(&self) -> bool {
        self.cursor.has_remaining() || !self.queue.is_empty()
    }

    /// Result of the most recent send to the lower transport.
    pub fn last_outgoing_result(&self) -> bool {
        self.outgoing_result
    }

    /// Takes the zero-length buffers collected since the last call.
    pub fn take_passthrough(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.passthrough)
    }
}

impl Read for EngineIo {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.pull(buf) {
            Pull::Data(len) => Ok(len),
            Pull::WouldBlock => Err(io::ErrorKind::WouldBlock.into()),
            Pull::Eof => Ok(0),
        }
    }
}

impl Write for EngineIo {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.push(buf) {
            Ok(()) => Ok(buf.len()),
            Err(_error) => {
                #[cfg(feature = "observability")]
                warn!(
                    transport_id = %self.lower.metadata().id,
                    error = %_error,
                    "Lower transport rejected ciphertext"
                );
                Err(io::ErrorKind::ConnectionReset.into())
            }
        }
    }

    /// Concatenates the slices so one flush is one push.
    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        let joined = bufs.iter().flat_map(|buf| buf.iter().copied()).collect::<Vec<u8>>();
        self.write(&joined)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for EngineIo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineIo")
            .field("cursor", &self.cursor)
            .field("lower", self.lower.metadata())
            .field("outgoing_result", &self.outgoing_result)
            .field("passthrough", &self.passthrough.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{RecvCallback, TransportError, TransportId, TransportMetadata};
    use std::sync::Mutex;

    /// Lower transport that records what is sent to it.
    struct Sink {
        metadata: TransportMetadata,
        sent: Mutex<Vec<Option<Message>>>,
        accept: bool,
        fail: bool,
    }

    impl Sink {
        fn new(accept: bool, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                metadata: TransportMetadata::new(TransportId::next(), "sink"),
                sent: Mutex::new(Vec::new()),
                accept,
                fail,
            })
        }
    }

    impl Transport for Sink {
        fn metadata(&self) -> &TransportMetadata {
            &self.metadata
        }

        fn is_active(&self) -> bool {
            true
        }

        fn send(&self, message: Option<Message>) -> Result<bool, TransportError> {
            if self.fail {
                return Err(TransportError::Closed);
            }
            self.sent.lock().unwrap().push(message);
            Ok(self.accept)
        }

        fn on_recv(&self, _callback: Option<RecvCallback>) {}
    }

    fn io_with(limit: usize, sink: Arc<Sink>) -> (EngineIo, Arc<IncomingQueue>) {
        let queue = Arc::new(IncomingQueue::new(limit));
        (EngineIo::new(Arc::clone(&queue), sink), queue)
    }

    #[test]
    fn test_pull_serves_buffer_across_calls() {
        let (mut io, queue) = io_with(1024, Sink::new(true, false));
        queue.push(b"abcdef".to_vec());
        queue.push(b"gh".to_vec());

        let mut buf = [0u8; 4];
        assert_eq!(io.pull(&mut buf), Pull::Data(4));
        assert_eq!(&buf, b"abcd");
        assert!(io.has_pending_input());
        assert_eq!(io.pull(&mut buf), Pull::Data(2));
        assert_eq!(&buf[..2], b"ef");
        assert_eq!(io.pull(&mut buf), Pull::Data(2));
        assert_eq!(&buf[..2], b"gh");
        assert!(!io.has_pending_input());
        assert_eq!(io.pull(&mut buf), Pull::WouldBlock);

        queue.stop();
        assert_eq!(io.pull(&mut buf), Pull::Eof);
    }

    #[test]
    fn test_zero_length_buffers_are_set_aside() {
        let (mut io, queue) = io_with(1024, Sink::new(true, false));
        queue.push(Vec::new());
        queue.push(b"xy".to_vec());
        queue.push(Vec::new());

        let mut buf = [0u8; 8];
        assert_eq!(io.pull(&mut buf), Pull::Data(2));
        assert_eq!(io.take_passthrough(), vec![Vec::<u8>::new()]);
        assert_eq!(io.pull(&mut buf), Pull::WouldBlock);
        assert_eq!(io.take_passthrough(), vec![Vec::<u8>::new()]);
        assert!(io.take_passthrough().is_empty());
    }

    #[test]
    fn test_read_write_convention() {
        let sink = Sink::new(true, false);
        let (mut io, queue) = io_with(1024, Arc::clone(&sink));
        let mut buf = [0u8; 8];

        let error = io.read(&mut buf).unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::WouldBlock);

        assert_eq!(io.write(b"cipher").unwrap(), 6);
        assert!(io.last_outgoing_result());
        let parts = [IoSlice::new(b"ab"), IoSlice::new(b"cd")];
        assert_eq!(io.write_vectored(&parts).unwrap(), 4);
        assert_eq!(
            *sink.sent.lock().unwrap(),
            vec![Some(b"cipher".to_vec()), Some(b"abcd".to_vec())]
        );

        queue.stop();
        assert_eq!(io.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_unaccepted_push_is_recorded_not_failed() {
        let (mut io, _queue) = io_with(1024, Sink::new(false, false));
        assert_eq!(io.write(b"x").unwrap(), 1);
        assert!(!io.last_outgoing_result());
    }

    #[test]
    fn test_failed_push_maps_to_connection_reset() {
        let (mut io, _queue) = io_with(1024, Sink::new(true, true));
        let error = io.write(b"x").unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::ConnectionReset);
    }

    #[test]
    fn test_forward_passes_end_of_stream() {
        let sink = Sink::new(true, false);
        let (mut io, _queue) = io_with(1024, Arc::clone(&sink));
        assert!(io.forward(None).unwrap());
        assert_eq!(*sink.sent.lock().unwrap(), vec![None]);
    }
}
