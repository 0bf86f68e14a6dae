//! Client configuration

use std::time::Duration;

/// Configuration for a client context and its loader
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Upper bound on any single remote call
    pub remote_timeout: Duration,

    /// Capacity of the broadcast channel behind the event bus
    pub event_bus_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            remote_timeout: Duration::from_secs(30),
            event_bus_capacity: 256,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }

    pub fn with_event_bus_capacity(mut self, capacity: usize) -> Self {
        // broadcast::channel panics on zero capacity
        self.event_bus_capacity = capacity.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides_defaults() {
        let config = ClientConfig::new()
            .with_remote_timeout(Duration::from_millis(250))
            .with_event_bus_capacity(0);

        assert_eq!(config.remote_timeout, Duration::from_millis(250));
        assert_eq!(config.event_bus_capacity, 1);
    }
}
