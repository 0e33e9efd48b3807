//! # psth-transports
//!
//! Transport primitives for the PSTH control channel: one UTF-8 text message
//! per request, acknowledged with a reply.
//!
//! ## Feature Flags
//!
//! - `zmq-server`: REP socket (`ZmqRep`)
//! - `zmq-client`: REQ socket (`ZmqReq`)
//! - `zmq`: both
//!
//! ## Example
//!
//! ```no_run
//! use psth_transports::zmq::server::ZmqRep;
//! use psth_transports::traits::{Transport, RequestReplyServer};
//!
//! let mut server = ZmqRep::with_address("tcp://*:5557")?;
//! server.start()?;
//!
//! loop {
//!     let (request, reply_handle) = server.receive_timeout(100)?;
//!     println!("Received: {}", String::from_utf8_lossy(&request));
//!     reply_handle.acknowledge()?;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod common;
pub mod traits;

#[cfg(any(feature = "zmq-server", feature = "zmq-client"))]
pub mod zmq;

pub use common::{
    ClientConfig, ReplyHandle, ServerConfig, TransportConfig, TransportError, TransportResult,
};
pub use traits::{RequestReplyClient, RequestReplyServer, Transport};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::common::*;
    pub use crate::traits::*;

    #[cfg(feature = "zmq-server")]
    pub use crate::zmq::server::*;

    #[cfg(feature = "zmq-client")]
    pub use crate::zmq::client::*;
}
