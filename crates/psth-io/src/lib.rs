// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # psth-io
//!
//! Feeds control messages from an external message transport into a shared
//! [`PsthEngine`](psth_engine::PsthEngine).
//!
//! The [`ControlListener`] owns a ZMQ REP socket on its own thread. Each
//! request is one UTF-8 control message; it is applied to the engine and
//! acknowledged with an empty reply.
//!
//! ```no_run
//! use psth_engine::PsthEngine;
//! use psth_io::{ControlListener, ControlListenerConfig};
//! use std::sync::Arc;
//!
//! let engine = Arc::new(PsthEngine::default());
//! let listener = ControlListener::start(
//!     ControlListenerConfig::new("tcp://*:5557"),
//!     Arc::clone(&engine),
//! )?;
//!
//! // ... record spikes from the acquisition thread ...
//!
//! listener.stop()?;
//! # Ok::<(), psth_io::ListenerError>(())
//! ```

pub mod error;

#[cfg(feature = "zmq-transport")]
pub mod control_listener;

pub use error::{ListenerError, ListenerResult};

#[cfg(feature = "zmq-transport")]
pub use control_listener::{ControlListener, ControlListenerConfig, ListenerStats};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
