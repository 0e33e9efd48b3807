// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! ZMQ transport implementations
//!
//! Strict request-reply: REP (server) ↔ REQ (client). Every request must be
//! answered before the REP socket will accept the next one.
//!
//! ## Example (Client)
//!
//! ```no_run
//! use psth_transports::zmq::client::ZmqReq;
//! use psth_transports::traits::{Transport, RequestReplyClient};
//!
//! let mut client = ZmqReq::with_address("tcp://localhost:5557")?;
//! client.start()?;
//!
//! let ack = client.request(b"TrialType 3")?;
//! assert!(ack.is_empty());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#[cfg(feature = "zmq-server")]
pub mod server;

#[cfg(feature = "zmq-client")]
pub mod client;

#[cfg(feature = "zmq-server")]
pub use server::ZmqRep;

#[cfg(feature = "zmq-client")]
pub use client::ZmqReq;
