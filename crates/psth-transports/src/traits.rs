// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Transport trait definitions

use crate::common::{ReplyHandle, TransportResult};

/// Base transport trait - implemented by all transports
pub trait Transport: Send + Sync {
    /// Start the transport (bind or connect)
    fn start(&mut self) -> TransportResult<()>;

    /// Stop the transport and release its socket
    fn stop(&mut self) -> TransportResult<()>;

    fn is_running(&self) -> bool;

    /// Get transport name/type
    fn transport_type(&self) -> &str;
}

/// Request-Reply pattern (server side)
pub trait RequestReplyServer: Transport {
    /// Receive a request and get a reply handle (blocks indefinitely)
    fn receive(&self) -> TransportResult<(Vec<u8>, Box<dyn ReplyHandle>)>;

    /// Receive with timeout; `TransportError::Timeout` when nothing arrived
    fn receive_timeout(&self, timeout_ms: u64) -> TransportResult<(Vec<u8>, Box<dyn ReplyHandle>)>;

    /// Poll for incoming messages (non-blocking beyond `timeout_ms`)
    fn poll(&self, timeout_ms: u64) -> TransportResult<bool>;
}

/// Request-Reply pattern (client side)
pub trait RequestReplyClient: Transport {
    /// Send a request and wait for reply
    fn request(&self, data: &[u8]) -> TransportResult<Vec<u8>>;

    /// Send a request with timeout
    fn request_timeout(&self, data: &[u8], timeout_ms: u64) -> TransportResult<Vec<u8>>;
}
