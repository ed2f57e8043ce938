//! Message sink - best-effort per-entry emission
//!
//! When a sink is configured, the full-scan dispatcher emits every entry's
//! key to a topic on a message bus. Delivery is synchronous with internal
//! retries; across a process restart nothing is replayed, so the channel
//! is best-effort by contract.
//!
//! A sink that fails to initialize downgrades the scan to no-sink: the
//! failure is logged and the scan continues.

mod redis;

pub use self::redis::RedisSink;

use crate::error::SinkResult;
use std::sync::Arc;
use tracing::{info, warn};

/// Sink settings carried by the job context
#[derive(Debug, Clone)]
pub struct SinkConfig {
    pub enabled: bool,
    pub url: String,
    pub topic: String,
    pub concurrency: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            topic: String::new(),
            concurrency: 5,
        }
    }
}

impl SinkConfig {
    /// A sink participates in dispatch only when enabled with a topic
    pub fn is_active(&self) -> bool {
        self.enabled && !self.topic.is_empty()
    }
}

/// Capability interface for the outbound message channel
pub trait Sink: Send + Sync {
    /// Send one payload to a topic, waiting for full acknowledgement
    fn send(&self, topic: &str, payload: &str) -> SinkResult<()>;

    /// Flush and release the connection
    fn close(&self) -> SinkResult<()>;
}

/// Initialize the configured sink, downgrading to `None` on any failure
pub fn init_sink(config: &SinkConfig) -> Option<Arc<dyn Sink>> {
    if !config.enabled {
        return None;
    }
    if config.url.is_empty() {
        let err = crate::error::SinkError::InvalidConfig {
            reason: "no broker url configured".into(),
        };
        warn!(error = %err, "sink misconfigured, continuing without sink");
        return None;
    }
    match RedisSink::connect(&config.url) {
        Ok(sink) => {
            info!(url = %config.url, topic = %config.topic, "sink connected");
            Some(Arc::new(sink))
        }
        Err(e) => {
            warn!(url = %config.url, error = %e, "sink initialization failed, continuing without sink");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_requires_topic() {
        let mut config = SinkConfig {
            enabled: true,
            url: "redis://localhost".into(),
            topic: String::new(),
            concurrency: 5,
        };
        assert!(!config.is_active());
        config.topic = "scan-events".into();
        assert!(config.is_active());
        config.enabled = false;
        assert!(!config.is_active());
    }

    #[test]
    fn test_disabled_sink_is_none() {
        assert!(init_sink(&SinkConfig::default()).is_none());
    }

    #[test]
    fn test_unreachable_broker_downgrades() {
        let config = SinkConfig {
            enabled: true,
            url: "redis://127.0.0.1:1".into(),
            topic: "t".into(),
            concurrency: 1,
        };
        assert!(init_sink(&config).is_none());
    }
}
