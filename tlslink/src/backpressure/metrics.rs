//! Queue metrics.

/// Snapshot of an [`IncomingQueue`](super::IncomingQueue)'s flow control.
///
/// Depth and capacity are measured in bytes, not messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueMetrics {
    /// Bytes currently buffered
    pub buffered_bytes: usize,

    /// Maximum number of bytes the queue admits before blocking producers
    pub capacity: usize,

    /// Highest number of bytes ever buffered at once
    pub peak_bytes: usize,

    /// Total number of messages pushed
    pub messages_pushed: u64,

    /// Total number of messages popped
    pub messages_popped: u64,

    /// Number of pushes that had to wait for space
    pub blocked_pushes: u64,

    /// Total time producers spent waiting for space (milliseconds)
    pub wait_time_ms: u64,
}

impl QueueMetrics {
    /// Create new metrics with zero values.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffered_bytes: 0,
            capacity,
            peak_bytes: 0,
            messages_pushed: 0,
            messages_popped: 0,
            blocked_pushes: 0,
            wait_time_ms: 0,
        }
    }

    /// Calculate the current utilization as a percentage (0-100).
    pub fn utilization_percent(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            (self.buffered_bytes as f64 / self.capacity as f64) * 100.0
        }
    }

    /// Check if the queue is at capacity.
    pub fn is_full(&self) -> bool {
        self.buffered_bytes >= self.capacity
    }

    /// Check if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.buffered_bytes == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utilization() {
        let mut metrics = QueueMetrics::new(200);
        assert!(metrics.is_empty());
        assert_eq!(metrics.utilization_percent(), 0.0);

        metrics.buffered_bytes = 50;
        assert_eq!(metrics.utilization_percent(), 25.0);
        assert!(!metrics.is_full());

        metrics.buffered_bytes = 200;
        assert!(metrics.is_full());
    }

    #[test]
    fn test_zero_capacity_utilization() {
        let metrics = QueueMetrics::new(0);
        assert_eq!(metrics.utilization_percent(), 0.0);
    }
}
