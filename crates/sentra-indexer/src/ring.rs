//! Fallback-endpoint rotation.

use tracing::warn;

/// A ring of equivalent endpoints with a per-endpoint failure counter.
/// Reaching the failure threshold rotates to the next endpoint and resets
/// the counter; the ring never runs out, it only wraps.
#[derive(Clone, Debug)]
pub struct EndpointRing {
    endpoints: Vec<String>,
    current: usize,
    failures: u32,
    max_failures: u32,
}

impl EndpointRing {
    pub fn new(endpoints: Vec<String>, max_failures: u32) -> Self {
        assert!(!endpoints.is_empty(), "endpoint ring requires at least one endpoint");
        Self { endpoints, current: 0, failures: 0, max_failures }
    }

    pub fn current(&self) -> &str {
        &self.endpoints[self.current]
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Record a failure on the current endpoint. Returns `true` when the
    /// threshold was hit and the ring rotated.
    pub fn record_failure(&mut self) -> bool {
        self.failures += 1;
        if self.failures >= self.max_failures {
            let from = self.current;
            self.current = (self.current + 1) % self.endpoints.len();
            self.failures = 0;
            warn!(
                from = %self.endpoints[from],
                to = %self.endpoints[self.current],
                "endpoint failure threshold reached; rotating"
            );
            return true;
        }
        false
    }

    pub fn record_success(&mut self) {
        self.failures = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotates_after_threshold_and_wraps() {
        let mut ring = EndpointRing::new(vec!["a".into(), "b".into()], 3);
        assert_eq!(ring.current(), "a");
        assert!(!ring.record_failure());
        assert!(!ring.record_failure());
        assert!(ring.record_failure());
        assert_eq!(ring.current(), "b");
        for _ in 0..3 {
            ring.record_failure();
        }
        assert_eq!(ring.current(), "a");
    }

    #[test]
    fn success_resets_the_counter() {
        let mut ring = EndpointRing::new(vec!["a".into(), "b".into()], 2);
        ring.record_failure();
        ring.record_success();
        assert!(!ring.record_failure(), "counter restarted after success");
        assert_eq!(ring.current(), "a");
    }
}
