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

//! Worker pool running receive tasks.
//!
//! A pool executes submitted jobs exactly once, on some thread, in no
//! particular order across jobs. Per-transport ordering is the transport's
//! own business. Jobs may block briefly (they hold locks and call into TLS
//! backends), so the tokio pool runs them on the runtime's blocking pool.

use std::sync::{Arc, OnceLock};
use tokio::runtime::{Builder, Handle, Runtime};

#[cfg(feature = "observability")]
use tracing::debug;

/// A unit of work submitted to a [`WorkerPool`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fire-and-forget executor shared by transports.
pub trait WorkerPool: Send + Sync + 'static {
    /// Schedules `job` to run once.
    fn submit(&self, job: Job);
}

/// Runs jobs on a tokio runtime's blocking thread pool.
///
/// # Examples
///
/// ```rust
/// use tlslink::pool::{TokioPool, WorkerPool};
/// use std::sync::mpsc;
///
/// let pool = TokioPool::shared()?;
/// let (tx, rx) = mpsc::channel();
/// pool.submit(Box::new(move || tx.send(42).unwrap()));
/// assert_eq!(rx.recv().unwrap(), 42);
/// # Ok::<(), std::io::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct TokioPool {
    handle: Handle,
}

impl TokioPool {
    /// Uses the runtime behind `handle`.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Uses the runtime the caller is running on.
    ///
    /// Returns `None` outside a tokio runtime.
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }

    /// Uses a process-wide runtime created on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be started.
    pub fn shared() -> std::io::Result<Self> {
        shared_runtime().map(|runtime| Self::new(runtime.handle().clone()))
    }
}

impl WorkerPool for TokioPool {
    fn submit(&self, job: Job) {
        drop(self.handle.spawn_blocking(job));
    }
}

fn shared_runtime() -> std::io::Result<&'static Runtime> {
    static RUNTIME: OnceLock<Runtime> = OnceLock::new();
    if let Some(runtime) = RUNTIME.get() {
        return Ok(runtime);
    }

    #[cfg(feature = "observability")]
    debug!("Starting shared tlslink worker runtime");
    let runtime = Builder::new_multi_thread()
        .thread_name("tlslink-worker")
        .enable_all()
        .build()?;
    // A racing initializer may win; the loser's runtime is dropped here.
    Ok(RUNTIME.get_or_init(|| runtime))
}

/// Returns the pool used when a transport is built without one.
///
/// Inside a tokio runtime this is that runtime; otherwise the shared
/// process-wide runtime.
///
/// # Errors
///
/// Returns an error if the shared runtime cannot be started.
pub fn default_pool() -> std::io::Result<Arc<dyn WorkerPool>> {
    let pool = match TokioPool::current() {
        Some(pool) => pool,
        None => TokioPool::shared()?,
    };
    Ok(Arc::new(pool))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_shared_pool_runs_jobs() {
        let pool = TokioPool::shared().unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel();
        for _ in 0..16 {
            let counter = Arc::clone(&counter);
            let tx = tx.clone();
            pool.submit(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                tx.send(()).unwrap();
            }));
        }
        for _ in 0..16 {
            rx.recv_timeout(Duration::from_secs(5)).unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 16);
    }

    #[test]
    fn test_current_outside_runtime() {
        assert!(TokioPool::current().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_default_pool_inside_runtime() {
        let pool = default_pool().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();
        pool.submit(Box::new(move || {
            let _ = tx.send(std::thread::current().name().map(str::to_string));
        }));
        assert!(rx.await.is_ok());
    }
}
