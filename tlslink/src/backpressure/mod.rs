//! Flow control for ciphertext arriving from the lower transport.
//!
//! # Overview
//!
//! The lower transport may deliver bytes faster than the record layer can
//! decrypt them. [`IncomingQueue`] caps the number of buffered bytes and
//! blocks producer threads when the cap is reached, so memory stays bounded
//! without dropping data.
//!
//! The queue doubles as the half-close signal: once stopped it refuses new
//! buffers, keeps handing out the ones already queued, and then reports
//! [`Popped::Stopped`].

mod incoming_queue;
mod metrics;

pub use incoming_queue::{IncomingQueue, Popped};
pub use metrics::QueueMetrics;
