//! Redis Streams sink
//!
//! Each message is one `XADD <topic> * key <payload>` on a shared
//! synchronous connection. Redis acknowledges the append with the new
//! stream id, which gives the "waits for full acknowledgement" semantics
//! the dispatcher relies on. I/O timeouts are 2 seconds and each send is
//! retried up to 3 times before the failure is reported.

use super::Sink;
use crate::error::{SinkError, SinkResult};
use redis::{Client, Connection};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// Connect/read/write timeout per I/O operation
const IO_TIMEOUT: Duration = Duration::from_secs(2);

/// Delivery attempts per message
const SEND_ATTEMPTS: u32 = 3;

pub struct RedisSink {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for RedisSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisSink").finish_non_exhaustive()
    }
}

impl RedisSink {
    /// Open a synchronous connection with the sink timeouts applied
    pub fn connect(url: &str) -> SinkResult<Self> {
        let client = Client::open(url).map_err(|e| SinkError::ConnectFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let conn = client
            .get_connection_with_timeout(IO_TIMEOUT)
            .map_err(|e| SinkError::ConnectFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        conn.set_read_timeout(Some(IO_TIMEOUT))?;
        conn.set_write_timeout(Some(IO_TIMEOUT))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl Sink for RedisSink {
    fn send(&self, topic: &str, payload: &str) -> SinkResult<()> {
        let mut last_err = String::new();
        for attempt in 1..=SEND_ATTEMPTS {
            let result: redis::RedisResult<String> = {
                let mut conn = self.conn.lock().expect("sink connection poisoned");
                redis::cmd("XADD")
                    .arg(topic)
                    .arg("*")
                    .arg("key")
                    .arg(payload)
                    .query(&mut *conn)
            };
            match result {
                Ok(id) => {
                    debug!(topic = %topic, id = %id, attempt, "message acknowledged");
                    return Ok(());
                }
                Err(e) => {
                    last_err = e.to_string();
                    debug!(topic = %topic, attempt, error = %last_err, "send attempt failed");
                }
            }
        }
        Err(SinkError::SendFailed {
            topic: topic.to_string(),
            attempts: SEND_ATTEMPTS,
            reason: last_err,
        })
    }

    fn close(&self) -> SinkResult<()> {
        // Sends are synchronously acknowledged; nothing is buffered
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Delivery tests need a live broker; connection failure paths are
    // covered here and in the sink module tests.

    #[test]
    fn test_connect_refused() {
        let err = RedisSink::connect("redis://127.0.0.1:1").unwrap_err();
        assert!(matches!(err, SinkError::ConnectFailed { .. }));
    }

    #[test]
    fn test_connect_bad_url() {
        let err = RedisSink::connect("not-a-url").unwrap_err();
        assert!(matches!(err, SinkError::ConnectFailed { .. }));
    }
}
