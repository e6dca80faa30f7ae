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

//! Observability support for tlslink.
//!
//! # Overview
//!
//! - **[`TlsMetrics`]**: per-link counters for handshakes, records, and
//!   receive-task scheduling
//! - **Logging**: with the `observability` feature (on by default) every
//!   link emits `tracing` events tagged with its `transport_id`
//!
//! # Logging
//!
//! Install any `tracing` subscriber to see link activity:
//!
//! ```rust,ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("tlslink=debug")
//!     .init();
//! ```
//!
//! Lifecycle events are logged at `debug`, handshake completion and
//! closure at `info`, per-message sizes at `trace`, and handshake or record
//! failures at `error`.
//!
//! # Metrics
//!
//! ```rust
//! use tlslink::observability::TlsMetrics;
//!
//! let metrics = TlsMetrics::new();
//! metrics.record_task_scheduled();
//! metrics.record_schedule_coalesced();
//!
//! assert_eq!(metrics.tasks_scheduled(), 1);
//! assert_eq!(metrics.schedules_coalesced(), 1);
//! ```

mod metrics;

pub use metrics::{TaskGuard, TlsMetrics};
