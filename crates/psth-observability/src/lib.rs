// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # psth-observability
//!
//! Logging setup shared by the PSTH binaries and tests, with per-crate debug
//! flag support.
//!
//! ## Features
//! - `file-logging`: timestamped run folders of JSON log files with retention

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod init;

pub use cli::*;
pub use init::*;

/// Crate names accepted by `--debug-<crate>` and `PSTH_DEBUG`
pub const KNOWN_CRATES: &[&str] = &[
    "psth",
    "psth-engine",
    "psth-transports",
    "psth-io",
    "psth-config",
    "psth-observability",
];
