// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Errors raised by the control-channel sockets

use thiserror::Error;

pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("bind failed: {0}")]
    BindFailed(String),

    #[error("connect failed: {0}")]
    ConnectFailed(String),

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Nothing arrived within the poll window. Callers poll again.
    #[error("timed out waiting for the peer")]
    Timeout,

    #[error("socket is not started")]
    NotRunning,

    #[error("socket is already started")]
    AlreadyRunning,

    #[error("invalid socket configuration: {0}")]
    InvalidConfig(String),

    #[error("message of {size} bytes exceeds the {max_size} byte limit")]
    MessageTooLarge { size: usize, max_size: usize },

    #[cfg(any(feature = "zmq-server", feature = "zmq-client"))]
    #[error("zmq: {0}")]
    Zmq(#[source] zmq::Error),
}

/// `EAGAIN` from a non-blocking call is an expired poll, not a failure.
#[cfg(any(feature = "zmq-server", feature = "zmq-client"))]
impl From<zmq::Error> for TransportError {
    fn from(err: zmq::Error) -> Self {
        match err {
            zmq::Error::EAGAIN => Self::Timeout,
            _ => Self::Zmq(err),
        }
    }
}
