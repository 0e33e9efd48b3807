//! Common configuration types for transports

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Generic transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Address to bind (server) or connect (client)
    pub address: String,

    /// High water mark for send buffer (0 = unlimited)
    pub send_hwm: usize,

    /// High water mark for receive buffer (0 = unlimited)
    pub recv_hwm: usize,

    /// Linger time on close (None = immediate)
    pub linger: Option<Duration>,

    /// Maximum message size (None = unlimited)
    pub max_message_size: Option<usize>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            address: "tcp://127.0.0.1:5557".to_string(),
            send_hwm: 1000,
            recv_hwm: 1000,
            linger: None,
            max_message_size: Some(64 * 1024), // control messages are short text
        }
    }
}

impl TransportConfig {
    /// Create a new config with the given address
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }

    pub fn with_send_hwm(mut self, hwm: usize) -> Self {
        self.send_hwm = hwm;
        self
    }

    pub fn with_recv_hwm(mut self, hwm: usize) -> Self {
        self.recv_hwm = hwm;
        self
    }

    pub fn with_linger(mut self, linger: Duration) -> Self {
        self.linger = Some(linger);
        self
    }

    pub fn with_no_linger(mut self) -> Self {
        self.linger = None;
        self
    }

    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = Some(size);
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.address.is_empty() {
            return Err("Address cannot be empty".to_string());
        }

        if let Some(max_size) = self.max_message_size {
            if max_size == 0 {
                return Err("Maximum message size must be greater than 0".to_string());
            }
        }

        Ok(())
    }

    pub(crate) fn linger_ms(&self) -> i32 {
        self.linger.map(|l| l.as_millis() as i32).unwrap_or(0)
    }
}

/// Server-specific configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(flatten)]
    pub base: TransportConfig,
}

impl ServerConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            base: TransportConfig::new(address),
        }
    }
}

/// Client-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(flatten)]
    pub base: TransportConfig,

    /// Default wait for a reply in `request`
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base: TransportConfig::default(),
            request_timeout: Duration::from_secs(2),
        }
    }
}

impl ClientConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            base: TransportConfig::new(address),
            ..Default::default()
        }
    }
}
