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

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for generating unique transport IDs.
static NEXT_TRANSPORT_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a transport in a chain.
///
/// IDs are used to correlate log lines and metrics for one link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransportId(u64);

impl TransportId {
    /// Creates a transport ID from a raw value.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates the next process-unique transport ID.
    pub fn next() -> Self {
        Self(NEXT_TRANSPORT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Transport({})", self.0)
    }
}

/// Metadata associated with a transport in a chain.
#[derive(Debug, Clone)]
pub struct TransportMetadata {
    /// Unique identifier for this transport
    pub id: TransportId,

    /// Transport type (e.g., "memory", "tls")
    pub transport_type: String,

    /// When the transport was created
    pub created_at: std::time::Instant,
}

impl TransportMetadata {
    /// Creates new transport metadata.
    pub fn new(id: TransportId, transport_type: impl Into<String>) -> Self {
        Self {
            id,
            transport_type: transport_type.into(),
            created_at: std::time::Instant::now(),
        }
    }

    /// Returns the age of this transport.
    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_id_display() {
        assert_eq!(TransportId::new(42).to_string(), "Transport(42)");
    }

    #[test]
    fn test_transport_ids_are_unique() {
        let a = TransportId::next();
        let b = TransportId::next();
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
    }

    #[test]
    fn test_metadata() {
        let metadata = TransportMetadata::new(TransportId::new(7), "tls");
        assert_eq!(metadata.id.as_u64(), 7);
        assert_eq!(metadata.transport_type, "tls");
        assert!(metadata.age() < std::time::Duration::from_secs(5));
    }
}
