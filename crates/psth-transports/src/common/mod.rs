//! Common types and utilities for all transports

pub mod config;
pub mod error;
pub mod reply;

pub use config::{ClientConfig, ServerConfig, TransportConfig};
pub use error::{TransportError, TransportResult};
pub use reply::ReplyHandle;
