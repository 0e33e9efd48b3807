// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! ZMQ REQ pattern (client-side request-reply)
//!
//! REQ sockets must read a reply before sending again. A request that times
//! out leaves the socket unusable, so it is closed and reconnected.

use crate::common::{ClientConfig, TransportError, TransportResult};
use crate::traits::{RequestReplyClient, Transport};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};

/// ZMQ REQ socket implementation (client-side)
pub struct ZmqReq {
    context: Arc<zmq::Context>,
    config: ClientConfig,
    socket: Arc<Mutex<Option<zmq::Socket>>>,
    running: Arc<Mutex<bool>>,
}

impl ZmqReq {
    /// Create a new REQ socket
    pub fn new(context: Arc<zmq::Context>, config: ClientConfig) -> TransportResult<Self> {
        config
            .base
            .validate()
            .map_err(TransportError::InvalidConfig)?;

        Ok(Self {
            context,
            config,
            socket: Arc::new(Mutex::new(None)),
            running: Arc::new(Mutex::new(false)),
        })
    }

    /// Create with default context
    pub fn with_address(address: impl Into<String>) -> TransportResult<Self> {
        let context = Arc::new(zmq::Context::new());
        let config = ClientConfig::new(address);
        Self::new(context, config)
    }

    fn open_socket(&self) -> TransportResult<zmq::Socket> {
        let socket = self.context.socket(zmq::REQ)?;

        socket.set_linger(self.config.base.linger_ms())?;
        socket.set_rcvhwm(self.config.base.recv_hwm as i32)?;
        socket.set_sndhwm(self.config.base.send_hwm as i32)?;

        socket
            .connect(&self.config.base.address)
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;

        Ok(socket)
    }
}

impl Transport for ZmqReq {
    fn start(&mut self) -> TransportResult<()> {
        if *self.running.lock() {
            return Err(TransportError::AlreadyRunning);
        }

        let socket = self.open_socket()?;
        *self.socket.lock() = Some(socket);
        *self.running.lock() = true;

        info!("[ZMQ-REQ] Connected to {}", self.config.base.address);

        Ok(())
    }

    fn stop(&mut self) -> TransportResult<()> {
        *self.running.lock() = false;
        *self.socket.lock() = None;
        Ok(())
    }

    fn is_running(&self) -> bool {
        *self.running.lock()
    }

    fn transport_type(&self) -> &str {
        "zmq-req"
    }
}

impl RequestReplyClient for ZmqReq {
    fn request(&self, data: &[u8]) -> TransportResult<Vec<u8>> {
        self.request_timeout(data, self.config.request_timeout.as_millis() as u64)
    }

    fn request_timeout(&self, data: &[u8], timeout_ms: u64) -> TransportResult<Vec<u8>> {
        let mut sock_guard = self.socket.lock();
        let sock = sock_guard.as_ref().ok_or(TransportError::NotRunning)?;

        if let Some(max_size) = self.config.base.max_message_size {
            if data.len() > max_size {
                return Err(TransportError::MessageTooLarge {
                    size: data.len(),
                    max_size,
                });
            }
        }

        sock.send(data, 0)
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;

        if timeout_ms > 0 {
            let poll_items = &mut [sock.as_poll_item(zmq::POLLIN)];
            zmq::poll(poll_items, timeout_ms as i64)?;

            if !poll_items[0].is_readable() {
                warn!(
                    "[ZMQ-REQ] No reply from {} within {}ms, reconnecting",
                    self.config.base.address, timeout_ms
                );
                *sock_guard = Some(self.open_socket()?);
                return Err(TransportError::Timeout);
            }
        }

        let mut reply = Vec::new();
        let mut more = true;

        while more {
            let mut msg = zmq::Message::new();
            sock.recv(&mut msg, 0)
                .map_err(|e| TransportError::ReceiveFailed(e.to_string()))?;
            reply.extend_from_slice(&msg);
            more = sock.get_rcvmore()?;
        }

        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_req_creation() {
        let context = Arc::new(zmq::Context::new());
        let config = ClientConfig::new("tcp://127.0.0.1:35600");
        let req = ZmqReq::new(context, config);
        assert!(req.is_ok());
    }

    #[test]
    fn test_req_start_stop() {
        let mut req = ZmqReq::with_address("tcp://127.0.0.1:35601").unwrap();
        assert!(!req.is_running());

        req.start().unwrap();
        assert!(req.is_running());

        req.stop().unwrap();
        assert!(!req.is_running());
        assert!(matches!(
            req.request_timeout(b"TrialEnd", 10),
            Err(TransportError::NotRunning)
        ));
    }

    #[test]
    fn test_req_timeout_reconnects() {
        // Nothing listens on this port; the request queues and times out.
        let mut req = ZmqReq::with_address("tcp://127.0.0.1:35602").unwrap();
        req.start().unwrap();

        assert!(matches!(
            req.request_timeout(b"TrialAlign", 50),
            Err(TransportError::Timeout)
        ));
        // A fresh socket accepts another send instead of failing with EFSM.
        assert!(matches!(
            req.request_timeout(b"TrialAlign", 50),
            Err(TransportError::Timeout)
        ));
    }

    #[test]
    fn test_req_message_too_large() {
        let context = Arc::new(zmq::Context::new());
        let mut config = ClientConfig::new("tcp://127.0.0.1:35603");
        config.base.max_message_size = Some(4);
        let mut req = ZmqReq::new(context, config).unwrap();
        req.start().unwrap();

        assert!(matches!(
            req.request_timeout(b"TrialAlign", 10),
            Err(TransportError::MessageTooLarge { size: 10, max_size: 4 })
        ));
    }
}
