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

//! Metrics for TLS links.
//!
//! Counters are plain atomics so they can be read in tests and by callers
//! without any exporter. When the `observability` feature is enabled every
//! update is mirrored to the `metrics` crate facade under `tlslink.*`.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters for one TLS link.
///
/// # Examples
///
/// ```rust
/// use tlslink::observability::TlsMetrics;
///
/// let metrics = TlsMetrics::new();
/// metrics.record_handshake_started();
/// metrics.record_handshake_completed();
/// metrics.record_record_decrypted(128);
///
/// assert_eq!(metrics.handshakes_completed(), 1);
/// assert_eq!(metrics.bytes_decrypted(), 128);
/// ```
#[derive(Debug, Default)]
pub struct TlsMetrics {
    handshakes_started: AtomicU64,
    handshakes_completed: AtomicU64,
    handshakes_failed: AtomicU64,
    records_decrypted: AtomicU64,
    bytes_decrypted: AtomicU64,
    records_encrypted: AtomicU64,
    bytes_encrypted: AtomicU64,
    passthrough_messages: AtomicU64,
    /// Receive tasks submitted to the pool
    tasks_scheduled: AtomicU64,
    /// Receive tasks that ran
    tasks_run: AtomicU64,
    /// Schedule requests absorbed by an already pending task
    schedules_coalesced: AtomicU64,
    running_tasks: AtomicUsize,
    max_concurrent_tasks: AtomicUsize,
}

impl TlsMetrics {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a handshake start.
    pub fn record_handshake_started(&self) {
        self.handshakes_started.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        metrics::counter!("tlslink.handshakes.started").increment(1);
    }

    /// Counts a successful handshake.
    pub fn record_handshake_completed(&self) {
        self.handshakes_completed.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        metrics::counter!("tlslink.handshakes.completed").increment(1);
    }

    /// Counts a failed handshake.
    pub fn record_handshake_failed(&self) {
        self.handshakes_failed.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        metrics::counter!("tlslink.handshakes.failed").increment(1);
    }

    /// Records one cleartext record delivered upward.
    pub fn record_record_decrypted(&self, bytes: usize) {
        self.records_decrypted.fetch_add(1, Ordering::Relaxed);
        self.bytes_decrypted
            .fetch_add(bytes as u64, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        {
            metrics::counter!("tlslink.records.decrypted").increment(1);
            metrics::counter!("tlslink.bytes.decrypted").increment(bytes as u64);
        }
    }

    /// Records one application message sealed and sent downward.
    pub fn record_record_encrypted(&self, bytes: usize) {
        self.records_encrypted.fetch_add(1, Ordering::Relaxed);
        self.bytes_encrypted
            .fetch_add(bytes as u64, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        {
            metrics::counter!("tlslink.records.encrypted").increment(1);
            metrics::counter!("tlslink.bytes.encrypted").increment(bytes as u64);
        }
    }

    /// Records a zero-length message that bypassed the record layer.
    pub fn record_passthrough(&self) {
        self.passthrough_messages.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        metrics::counter!("tlslink.passthrough").increment(1);
    }

    /// Counts a receive task submitted to the pool.
    pub fn record_task_scheduled(&self) {
        self.tasks_scheduled.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        metrics::counter!("tlslink.tasks.scheduled").increment(1);
    }

    /// Counts a schedule request absorbed by a pending task.
    pub fn record_schedule_coalesced(&self) {
        self.schedules_coalesced.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        metrics::counter!("tlslink.tasks.coalesced").increment(1);
    }

    /// Marks a receive task as running until the returned guard is dropped.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tlslink::observability::TlsMetrics;
    ///
    /// let metrics = TlsMetrics::new();
    /// {
    ///     let _task = metrics.enter_task();
    ///     assert_eq!(metrics.running_tasks(), 1);
    /// }
    /// assert_eq!(metrics.running_tasks(), 0);
    /// assert_eq!(metrics.max_concurrent_tasks(), 1);
    /// ```
    pub fn enter_task(&self) -> TaskGuard<'_> {
        self.tasks_run.fetch_add(1, Ordering::Relaxed);
        let running = self.running_tasks.fetch_add(1, Ordering::AcqRel) + 1;
        self.max_concurrent_tasks
            .fetch_max(running, Ordering::AcqRel);
        #[cfg(feature = "observability")]
        metrics::counter!("tlslink.tasks.run").increment(1);
        TaskGuard { metrics: self }
    }

    /// Handshakes started.
    pub fn handshakes_started(&self) -> u64 {
        self.handshakes_started.load(Ordering::Relaxed)
    }

    /// Handshakes completed.
    pub fn handshakes_completed(&self) -> u64 {
        self.handshakes_completed.load(Ordering::Relaxed)
    }

    /// Handshakes failed.
    pub fn handshakes_failed(&self) -> u64 {
        self.handshakes_failed.load(Ordering::Relaxed)
    }

    /// Records decrypted.
    pub fn records_decrypted(&self) -> u64 {
        self.records_decrypted.load(Ordering::Relaxed)
    }

    /// Cleartext bytes delivered upward.
    pub fn bytes_decrypted(&self) -> u64 {
        self.bytes_decrypted.load(Ordering::Relaxed)
    }

    /// Messages encrypted.
    pub fn records_encrypted(&self) -> u64 {
        self.records_encrypted.load(Ordering::Relaxed)
    }

    /// Cleartext bytes encrypted.
    pub fn bytes_encrypted(&self) -> u64 {
        self.bytes_encrypted.load(Ordering::Relaxed)
    }

    /// Zero-length messages passed through.
    pub fn passthrough_messages(&self) -> u64 {
        self.passthrough_messages.load(Ordering::Relaxed)
    }

    /// Receive tasks submitted.
    pub fn tasks_scheduled(&self) -> u64 {
        self.tasks_scheduled.load(Ordering::Relaxed)
    }

    /// Receive tasks run.
    pub fn tasks_run(&self) -> u64 {
        self.tasks_run.load(Ordering::Relaxed)
    }

    /// Schedule requests coalesced.
    pub fn schedules_coalesced(&self) -> u64 {
        self.schedules_coalesced.load(Ordering::Relaxed)
    }

    /// Receive tasks running right now.
    pub fn running_tasks(&self) -> usize {
        self.running_tasks.load(Ordering::Acquire)
    }

    /// Highest number of receive tasks ever observed running at once.
    pub fn max_concurrent_tasks(&self) -> usize {
        self.max_concurrent_tasks.load(Ordering::Acquire)
    }
}

/// Guard returned by [`TlsMetrics::enter_task`].
#[derive(Debug)]
pub struct TaskGuard<'a> {
    metrics: &'a TlsMetrics,
}

impl Drop for TaskGuard<'_> {
    fn drop(&mut self) {
        self.metrics.running_tasks.fetch_sub(1, Ordering::AcqRel);
    }
}
