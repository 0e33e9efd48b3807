// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! ZMQ REP pattern (server-side request-reply)
//!
//! A REP socket alternates strictly between receiving one request and sending
//! one reply. Multipart requests are concatenated into a single payload.

use crate::common::{ReplyHandle, ServerConfig, TransportError, TransportResult};
use crate::traits::{RequestReplyServer, Transport};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

/// ZMQ REP socket implementation (server-side)
pub struct ZmqRep {
    context: Arc<zmq::Context>,
    config: ServerConfig,
    socket: Arc<Mutex<Option<zmq::Socket>>>,
    running: Arc<Mutex<bool>>,
}

impl ZmqRep {
    /// Create a new REP socket
    pub fn new(context: Arc<zmq::Context>, config: ServerConfig) -> TransportResult<Self> {
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
        let config = ServerConfig::new(address);
        Self::new(context, config)
    }

    /// Create with default context and a prepared config
    pub fn with_config(config: ServerConfig) -> TransportResult<Self> {
        Self::new(Arc::new(zmq::Context::new()), config)
    }

    pub fn address(&self) -> &str {
        &self.config.base.address
    }
}

impl Transport for ZmqRep {
    fn start(&mut self) -> TransportResult<()> {
        if *self.running.lock() {
            return Err(TransportError::AlreadyRunning);
        }

        let socket = self.context.socket(zmq::REP)?;

        socket.set_linger(self.config.base.linger_ms())?;
        socket.set_rcvhwm(self.config.base.recv_hwm as i32)?;
        socket.set_sndhwm(self.config.base.send_hwm as i32)?;
        if let Some(max_size) = self.config.base.max_message_size {
            socket.set_maxmsgsize(max_size as i64)?;
        }

        socket
            .bind(&self.config.base.address)
            .map_err(|e| TransportError::BindFailed(format!("{}: {}", self.config.base.address, e)))?;

        *self.socket.lock() = Some(socket);
        *self.running.lock() = true;

        info!("[ZMQ-REP] Listening on {}", self.config.base.address);

        Ok(())
    }

    fn stop(&mut self) -> TransportResult<()> {
        *self.running.lock() = false;
        if self.socket.lock().take().is_some() {
            debug!("[ZMQ-REP] Closed {}", self.config.base.address);
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        *self.running.lock()
    }

    fn transport_type(&self) -> &str {
        "zmq-rep"
    }
}

impl RequestReplyServer for ZmqRep {
    fn receive(&self) -> TransportResult<(Vec<u8>, Box<dyn ReplyHandle>)> {
        self.receive_timeout(0) // 0 = blocking
    }

    fn receive_timeout(
        &self,
        timeout_ms: u64,
    ) -> TransportResult<(Vec<u8>, Box<dyn ReplyHandle>)> {
        let sock_guard = self.socket.lock();
        let sock = sock_guard.as_ref().ok_or(TransportError::NotRunning)?;

        if timeout_ms > 0 {
            let poll_items = &mut [sock.as_poll_item(zmq::POLLIN)];
            zmq::poll(poll_items, timeout_ms as i64)?;

            if !poll_items[0].is_readable() {
                return Err(TransportError::Timeout);
            }
        }

        let mut request = Vec::new();
        let mut more = true;

        while more {
            let mut msg = zmq::Message::new();
            sock.recv(&mut msg, 0)
                .map_err(|e| TransportError::ReceiveFailed(e.to_string()))?;
            request.extend_from_slice(&msg);
            more = sock.get_rcvmore()?;
        }

        let reply = ZmqRepReplyHandle {
            socket: Arc::clone(&self.socket),
        };

        Ok((request, Box::new(reply)))
    }

    fn poll(&self, timeout_ms: u64) -> TransportResult<bool> {
        let sock_guard = self.socket.lock();
        let sock = sock_guard.as_ref().ok_or(TransportError::NotRunning)?;

        let poll_items = &mut [sock.as_poll_item(zmq::POLLIN)];
        zmq::poll(poll_items, timeout_ms as i64)?;

        Ok(poll_items[0].is_readable())
    }
}

/// Reply handle for REP socket
struct ZmqRepReplyHandle {
    socket: Arc<Mutex<Option<zmq::Socket>>>,
}

impl ReplyHandle for ZmqRepReplyHandle {
    fn send(&self, data: &[u8]) -> TransportResult<()> {
        let sock_guard = self.socket.lock();
        let sock = sock_guard.as_ref().ok_or(TransportError::NotRunning)?;

        sock.send(data, 0)
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rep_creation() {
        let context = Arc::new(zmq::Context::new());
        let config = ServerConfig::new("tcp://127.0.0.1:35500");
        let rep = ZmqRep::new(context, config);
        assert!(rep.is_ok());
        assert!(ZmqRep::with_address("").is_err());
    }

    #[test]
    fn test_rep_start_stop() {
        let mut rep = ZmqRep::with_address("tcp://127.0.0.1:35501").unwrap();
        assert!(!rep.is_running());

        rep.start().unwrap();
        assert!(rep.is_running());
        assert!(matches!(rep.start(), Err(TransportError::AlreadyRunning)));

        rep.stop().unwrap();
        assert!(!rep.is_running());
        assert!(matches!(
            rep.receive_timeout(10),
            Err(TransportError::NotRunning)
        ));
    }

    #[test]
    fn test_rep_receive_timeout() {
        let mut rep = ZmqRep::with_address("tcp://127.0.0.1:35502").unwrap();
        rep.start().unwrap();

        assert!(matches!(
            rep.receive_timeout(20),
            Err(TransportError::Timeout)
        ));
        assert!(!rep.poll(10).unwrap());
    }

    #[test]
    fn test_rep_bind_conflict() {
        let mut first = ZmqRep::with_address("tcp://127.0.0.1:35503").unwrap();
        first.start().unwrap();

        let mut second = ZmqRep::with_address("tcp://127.0.0.1:35503").unwrap();
        assert!(matches!(second.start(), Err(TransportError::BindFailed(_))));
        assert!(!second.is_running());
    }

    #[cfg(feature = "zmq-client")]
    #[test]
    fn test_rep_round_trip() {
        use crate::traits::RequestReplyClient;
        use crate::zmq::client::ZmqReq;

        let mut rep = ZmqRep::with_address("tcp://127.0.0.1:35504").unwrap();
        rep.start().unwrap();

        let server = std::thread::spawn(move || {
            let (request, reply) = rep.receive_timeout(2000).unwrap();
            reply.acknowledge().unwrap();
            request
        });

        let mut req = ZmqReq::with_address("tcp://127.0.0.1:35504").unwrap();
        req.start().unwrap();
        let ack = req.request_timeout(b"TrialAlign", 2000).unwrap();

        assert!(ack.is_empty());
        assert_eq!(server.join().unwrap(), b"TrialAlign".to_vec());
    }
}
