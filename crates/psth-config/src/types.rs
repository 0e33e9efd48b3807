// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! Each struct maps to one section of `psth_configuration.toml`. Missing
//! sections and keys fall back to their defaults.

use crate::{ConfigError, ConfigResult};
use psth_engine::{BinningConfig, DEFAULT_BIN_SIZE, DEFAULT_MAX_PLOTS, DEFAULT_N_BINS};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PsthConfig {
    pub engine: EngineConfig,
    pub listener: ListenerConfig,
    pub logging: LoggingConfig,
}

/// Histogram geometry and display bounds
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub n_bins: usize,
    /// Bin width in timestamp units (ms)
    pub bin_size: i64,
    /// Display units kept by the plot board
    pub max_plots: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            n_bins: DEFAULT_N_BINS,
            bin_size: DEFAULT_BIN_SIZE,
            max_plots: DEFAULT_MAX_PLOTS,
        }
    }
}

impl EngineConfig {
    pub fn binning(&self) -> ConfigResult<BinningConfig> {
        BinningConfig::new(self.n_bins, self.bin_size)
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))
    }
}

/// Control-message listener (ZMQ REP)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub poll_timeout_ms: u64,
    pub recv_hwm: usize,
    pub send_hwm: usize,
    pub linger_ms: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "*".to_string(),
            port: 5557,
            poll_timeout_ms: 100,
            recv_hwm: 1000,
            send_hwm: 1000,
            linger_ms: 0,
        }
    }
}

impl ListenerConfig {
    /// ZMQ endpoint, e.g. `tcp://*:5557`
    pub fn endpoint(&self) -> String {
        format!("tcp://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub log_dir: PathBuf,
    pub file_logging: bool,
    pub retention_days: u64,
    pub retention_runs: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: PathBuf::from("./logs"),
            file_logging: false,
            retention_days: 30,
            retention_runs: 10,
        }
    }
}
