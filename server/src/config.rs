//! Process-wide server settings
//!
//! Built once at startup and shared immutably by every connection.

use shared::codec::MAX_MESSAGE_SIZE;
use std::time::Duration;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;

/// Shortest liveness window accepted; keeps the ping period above zero.
pub const MIN_PONG_WAIT: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listener binds to, "IP:PORT"
    pub bind_address: String,
    /// Longest silence tolerated from a peer before its reader gives up
    pub pong_wait: Duration,
    /// Keep-alive probe interval, always shorter than `pong_wait`
    pub ping_period: Duration,
    /// Deadline for a single socket write
    pub write_wait: Duration,
    /// Largest inbound message accepted from a peer
    pub max_message_size: usize,
    /// Capacity of each connection's outbound queue
    pub send_queue_capacity: usize,
    /// World simulation updates per second
    pub tick_rate: u32,
}

impl ServerConfig {
    pub fn new(bind_address: impl Into<String>) -> Self {
        Self {
            bind_address: bind_address.into(),
            ..Self::default()
        }
    }

    /// Sets the liveness window and derives the probe interval from it.
    pub fn with_pong_wait(mut self, pong_wait: Duration) -> Self {
        let pong_wait = pong_wait.max(MIN_PONG_WAIT);
        self.pong_wait = pong_wait;
        self.ping_period = pong_wait * 9 / 10;
        self
    }

    pub fn with_write_wait(mut self, write_wait: Duration) -> Self {
        self.write_wait = write_wait;
        self
    }

    pub fn with_send_queue_capacity(mut self, capacity: usize) -> Self {
        self.send_queue_capacity = capacity.max(1);
        self
    }

    pub fn with_tick_rate(mut self, tick_rate: u32) -> Self {
        self.tick_rate = tick_rate.max(1);
        self
    }

    /// Socket settings applied to every upgraded connection.
    pub fn websocket_config(&self) -> WebSocketConfig {
        WebSocketConfig::default()
            .max_message_size(Some(self.max_message_size))
            .max_frame_size(Some(self.max_message_size))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        let pong_wait = Duration::from_secs(60);
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            pong_wait,
            ping_period: pong_wait * 9 / 10,
            write_wait: Duration::from_secs(10),
            max_message_size: MAX_MESSAGE_SIZE,
            send_queue_capacity: 256,
            tick_rate: 30,
        }
    }
}
