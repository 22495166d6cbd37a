//! Driver Configuration
//!
//! Flow-control knobs for the call drivers, with presets in the usual
//! default/testing/hardened shapes.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Inbound Queue Capacity
// ----------------------------------------------------------------------------

/// Capacity policy for the streaming driver's inbound queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueCapacity {
    /// No limit; pacing relies on the transport honouring `request(1)` credit
    #[default]
    Unbounded,
    /// At most this many undelivered messages; overflow fails the call
    /// with `RESOURCE_EXHAUSTED`
    Bounded(usize),
}

impl QueueCapacity {
    pub fn limit(&self) -> Option<usize> {
        match self {
            QueueCapacity::Unbounded => None,
            QueueCapacity::Bounded(capacity) => Some(*capacity),
        }
    }
}

// ----------------------------------------------------------------------------
// Driver Configuration
// ----------------------------------------------------------------------------

/// Configuration shared by the unary and streaming call drivers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Messages requested up front for unary-input calls. Requesting more than
    /// one lets a second message arrive so it can be rejected.
    pub unary_request_credit: usize,
    /// Messages requested when a streaming-input call starts
    pub streaming_initial_credit: usize,
    /// Messages re-requested after each inbound message on a streaming call
    pub streaming_refill_credit: usize,
    /// Inbound queue policy for streaming-input calls
    pub inbound_queue: QueueCapacity,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            unary_request_credit: 2,
            streaming_initial_credit: 1,
            streaming_refill_credit: 1,
            inbound_queue: QueueCapacity::Unbounded,
        }
    }
}

impl DriverConfig {
    /// Create configuration optimized for testing
    pub fn testing() -> Self {
        Self {
            inbound_queue: QueueCapacity::Bounded(64),
            ..Self::default()
        }
    }

    /// Bound the inbound queue so a transport ignoring credit cannot grow it
    /// without limit
    pub fn hardened() -> Self {
        Self {
            inbound_queue: QueueCapacity::Bounded(1024),
            ..Self::default()
        }
    }

    pub fn with_inbound_queue(mut self, capacity: QueueCapacity) -> Self {
        self.inbound_queue = capacity;
        self
    }

    pub fn with_streaming_credit(mut self, initial: usize, refill: usize) -> Self {
        self.streaming_initial_credit = initial;
        self.streaming_refill_credit = refill;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.unary_request_credit < 2 {
            return Err(ConfigError::UnaryCreditTooLow(self.unary_request_credit));
        }
        if self.streaming_initial_credit == 0 {
            return Err(ConfigError::ZeroCredit {
                field: "streaming_initial_credit",
            });
        }
        if self.streaming_refill_credit == 0 {
            return Err(ConfigError::ZeroCredit {
                field: "streaming_refill_credit",
            });
        }
        if self.inbound_queue == QueueCapacity::Bounded(0) {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        assert!(DriverConfig::default().validate().is_ok());
        assert!(DriverConfig::testing().validate().is_ok());
        assert!(DriverConfig::hardened().validate().is_ok());
    }

    #[test]
    fn test_rejects_single_unary_credit() {
        let config = DriverConfig {
            unary_request_credit: 1,
            ..DriverConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::UnaryCreditTooLow(1)));
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let config = DriverConfig::default().with_inbound_queue(QueueCapacity::Bounded(0));
        assert_eq!(config.validate(), Err(ConfigError::ZeroQueueCapacity));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: DriverConfig = toml::from_str("streaming_refill_credit = 4").unwrap();
        assert_eq!(config.streaming_refill_credit, 4);
        assert_eq!(config.unary_request_credit, 2);
        assert_eq!(config.inbound_queue, QueueCapacity::Unbounded);
    }

    #[test]
    fn test_bounded_queue_from_toml() {
        let config: DriverConfig = toml::from_str("inbound_queue = { bounded = 16 }").unwrap();
        assert_eq!(config.inbound_queue, QueueCapacity::Bounded(16));
    }
}
