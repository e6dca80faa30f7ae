//! Byte-bounded queue of incoming ciphertext.
//!
//! Producers are lower-transport I/O threads, the sole consumer is the
//! receive task. Producers block when the queue is full so that a record
//! layer slower than the network never makes memory grow without bound.

use super::QueueMetrics;
use crate::transport::Message;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Outcome of a non-blocking [`IncomingQueue::pop`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Popped {
    /// The next buffer, in arrival order.
    Message(Message),

    /// Nothing buffered yet, but more may come: try again later.
    Empty,

    /// Nothing buffered and the queue was stopped: end of stream.
    Stopped,
}

#[derive(Debug)]
struct QueueState {
    items: VecDeque<Message>,
    buffered: usize,
    peak: usize,
    running: bool,
}

/// Ordered, byte-bounded buffer with a half-close signal.
///
/// - [`push`](Self::push) blocks the calling thread while the queue holds
///   data and the new buffer would take it past its byte limit. A single
///   buffer larger than the whole limit is admitted into an empty queue so
///   the consumer can always make progress.
/// - [`pop`](Self::pop) never blocks.
/// - [`stop`](Self::stop) refuses further pushes and wakes blocked
///   producers; buffers already queued are still handed out.
///
/// # Examples
///
/// ```rust
/// use tlslink::backpressure::{IncomingQueue, Popped};
///
/// let queue = IncomingQueue::new(1024);
/// assert!(queue.push(b"hello".to_vec()));
/// queue.stop();
/// assert!(!queue.push(b"dropped".to_vec()));
///
/// assert_eq!(queue.pop(), Popped::Message(b"hello".to_vec()));
/// assert_eq!(queue.pop(), Popped::Stopped);
/// ```
#[derive(Debug)]
pub struct IncomingQueue {
    /// Maximum number of buffered bytes
    limit: usize,

    state: Mutex<QueueState>,

    /// Signalled whenever bytes leave the queue or it is stopped
    space: Condvar,

    messages_pushed: AtomicU64,
    messages_popped: AtomicU64,
    blocked_pushes: AtomicU64,
    wait_time_ms: AtomicU64,
}

impl IncomingQueue {
    /// Creates a running queue that buffers at most `limit` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `limit` is 0.
    pub fn new(limit: usize) -> Self {
        assert!(limit > 0, "Queue limit must be greater than 0");

        Self {
            limit,
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                buffered: 0,
                peak: 0,
                running: true,
            }),
            space: Condvar::new(),
            messages_pushed: AtomicU64::new(0),
            messages_popped: AtomicU64::new(0),
            blocked_pushes: AtomicU64::new(0),
            wait_time_ms: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a buffer, blocking while the queue is full.
    ///
    /// Returns `false` if the queue was stopped before the buffer could be
    /// accepted; the buffer is dropped in that case.
    pub fn push(&self, message: Message) -> bool {
        let len = message.len();
        let mut state = self.lock();

        let mut waited_since = None;
        while state.running && !state.items.is_empty() && state.buffered + len > self.limit {
            if waited_since.is_none() {
                waited_since = Some(Instant::now());
                self.blocked_pushes.fetch_add(1, Ordering::Relaxed);
            }
            state = self
                .space
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if let Some(since) = waited_since {
            self.wait_time_ms
                .fetch_add(since.elapsed().as_millis() as u64, Ordering::Relaxed);
        }

        if !state.running {
            return false;
        }

        state.buffered += len;
        state.peak = state.peak.max(state.buffered);
        state.items.push_back(message);
        self.messages_pushed.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Takes the next buffer without blocking.
    pub fn pop(&self) -> Popped {
        let mut state = self.lock();
        match state.items.pop_front() {
            Some(message) => {
                state.buffered -= message.len();
                drop(state);
                self.messages_popped.fetch_add(1, Ordering::Relaxed);
                self.space.notify_all();
                Popped::Message(message)
            }
            None if state.running => Popped::Empty,
            None => Popped::Stopped,
        }
    }

    /// Stops accepting pushes. Idempotent.
    pub fn stop(&self) {
        self.lock().running = false;
        self.space.notify_all();
    }

    /// Returns `false` once [`stop`](Self::stop) has been called.
    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Returns `true` if no buffer is queued.
    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Number of queued buffers.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// Number of queued bytes.
    pub fn buffered_bytes(&self) -> usize {
        self.lock().buffered
    }

    /// Byte limit this queue was created with.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Returns a snapshot of the queue's flow-control counters.
    pub fn metrics(&self) -> QueueMetrics {
        let state = self.lock();
        QueueMetrics {
            buffered_bytes: state.buffered,
            capacity: self.limit,
            peak_bytes: state.peak,
            messages_pushed: self.messages_pushed.load(Ordering::Relaxed),
            messages_popped: self.messages_popped.load(Ordering::Relaxed),
            blocked_pushes: self.blocked_pushes.load(Ordering::Relaxed),
            wait_time_ms: self.wait_time_ms.load(Ordering::Relaxed),
        }
    }
}
