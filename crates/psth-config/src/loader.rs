// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! Three tiers, later wins:
//! 1. TOML file
//! 2. Environment variables (`PSTH_*`)
//! 3. CLI arguments

use crate::{ConfigError, ConfigResult, PsthConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "psth_configuration.toml";

/// Find the configuration file
///
/// Search order:
/// 1. `PSTH_CONFIG_PATH` environment variable
/// 2. Current working directory: `./psth_configuration.toml`
/// 3. Parent directories (up to 5 levels)
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("PSTH_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        } else {
            return Err(ConfigError::FileNotFound(format!(
                "Config file specified by PSTH_CONFIG_PATH not found: {}",
                path.display()
            )));
        }
    }

    let mut search_paths = Vec::new();

    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));

        let mut current = cwd.clone();
        for _ in 0..5 {
            if let Some(parent) = current.parent() {
                search_paths.push(parent.join(CONFIG_FILE_NAME));
                current = parent.to_path_buf();
            }
        }
    }

    for path in &search_paths {
        if path.exists() {
            return Ok(path.clone());
        }
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet PSTH_CONFIG_PATH environment variable to specify custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from a TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if the config file is not found or contains invalid TOML.
/// Validation is separate; see [`validate_config`](crate::validate_config).
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<PsthConfig> {
    let config_file = if let Some(path) = config_path {
        path.to_path_buf()
    } else {
        find_config_file()?
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: PsthConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config);

    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }

    Ok(config)
}

fn parse_flag(value: &str) -> bool {
    let lowered = value.to_lowercase();
    lowered == "true" || lowered == "1" || lowered == "yes"
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `PSTH_N_BINS` -> `engine.n_bins`
/// - `PSTH_BIN_SIZE` -> `engine.bin_size`
/// - `PSTH_MAX_PLOTS` -> `engine.max_plots`
/// - `PSTH_LISTENER_HOST` -> `listener.host`
/// - `PSTH_LISTENER_PORT` -> `listener.port`
/// - `PSTH_LISTENER_ENABLED` -> `listener.enabled`
/// - `PSTH_POLL_TIMEOUT_MS` -> `listener.poll_timeout_ms`
/// - `PSTH_LOG_LEVEL` -> `logging.level`
/// - `PSTH_LOG_DIR` -> `logging.log_dir`
///
/// Values that fail to parse are ignored.
pub fn apply_environment_overrides(config: &mut PsthConfig) {
    // Engine settings
    if let Ok(value) = env::var("PSTH_N_BINS") {
        if let Ok(n_bins) = value.parse::<usize>() {
            config.engine.n_bins = n_bins;
        }
    }
    if let Ok(value) = env::var("PSTH_BIN_SIZE") {
        if let Ok(bin_size) = value.parse::<i64>() {
            config.engine.bin_size = bin_size;
        }
    }
    if let Ok(value) = env::var("PSTH_MAX_PLOTS") {
        if let Ok(max_plots) = value.parse::<usize>() {
            config.engine.max_plots = max_plots;
        }
    }

    // Listener settings
    if let Ok(value) = env::var("PSTH_LISTENER_HOST") {
        config.listener.host = value;
    }
    if let Ok(value) = env::var("PSTH_LISTENER_PORT") {
        if let Ok(port) = value.parse::<u16>() {
            config.listener.port = port;
        }
    }
    if let Ok(value) = env::var("PSTH_LISTENER_ENABLED") {
        config.listener.enabled = parse_flag(&value);
    }
    if let Ok(value) = env::var("PSTH_POLL_TIMEOUT_MS") {
        if let Ok(timeout) = value.parse::<u64>() {
            config.listener.poll_timeout_ms = timeout;
        }
    }

    // Logging settings
    if let Ok(value) = env::var("PSTH_LOG_LEVEL") {
        config.logging.level = value;
    }
    if let Ok(value) = env::var("PSTH_LOG_DIR") {
        config.logging.log_dir = PathBuf::from(value);
    }
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - HashMap of CLI arguments (e.g., `{"listener_port": "6000", "n_bins": "100"}`)
pub fn apply_cli_overrides(config: &mut PsthConfig, cli_args: &HashMap<String, String>) {
    if let Some(value) = cli_args.get("n_bins") {
        if let Ok(n_bins) = value.parse::<usize>() {
            config.engine.n_bins = n_bins;
        }
    }
    if let Some(value) = cli_args.get("bin_size") {
        if let Ok(bin_size) = value.parse::<i64>() {
            config.engine.bin_size = bin_size;
        }
    }
    if let Some(value) = cli_args.get("max_plots") {
        if let Ok(max_plots) = value.parse::<usize>() {
            config.engine.max_plots = max_plots;
        }
    }

    if let Some(value) = cli_args.get("listener_host") {
        config.listener.host = value.clone();
    }
    if let Some(value) = cli_args.get("listener_port") {
        if let Ok(port) = value.parse::<u16>() {
            config.listener.port = port;
        }
    }
    if let Some(value) = cli_args.get("poll_timeout_ms") {
        if let Ok(timeout) = value.parse::<u64>() {
            config.listener.poll_timeout_ms = timeout;
        }
    }

    if let Some(value) = cli_args.get("log_level") {
        config.logging.level = value.clone();
    }
}
