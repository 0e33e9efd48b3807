// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! All violations are collected and reported together.

use crate::{ConfigError, ConfigResult, PsthConfig};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "warning", "error", "off"];

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    InvalidPortRange { port_name: String, port: u16 },
    MissingRequired { field: String },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPortRange { port_name, port } => {
                write!(
                    f,
                    "Port {} = {} is outside valid range (1024-65535)",
                    port_name, port
                )
            }
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every violation
pub fn validate_config(config: &PsthConfig) -> ConfigResult<()> {
    let errors = collect_errors(config);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

/// Every violation in `config`, in section order
pub fn collect_errors(config: &PsthConfig) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();
    validate_engine(config, &mut errors);
    validate_listener(config, &mut errors);
    validate_logging(config, &mut errors);
    errors
}

fn validate_engine(config: &PsthConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.engine.n_bins == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "engine.n_bins".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    if config.engine.bin_size < 1 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "engine.bin_size".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    if config.engine.max_plots == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "engine.max_plots".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
}

fn validate_listener(config: &PsthConfig, errors: &mut Vec<ConfigValidationError>) {
    let listener = &config.listener;

    if listener.host.trim().is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "listener.host".to_string(),
        });
    }
    if listener.port < 1024 {
        errors.push(ConfigValidationError::InvalidPortRange {
            port_name: "listener.port".to_string(),
            port: listener.port,
        });
    }
    if listener.poll_timeout_ms == 0 || listener.poll_timeout_ms > 5000 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "listener.poll_timeout_ms".to_string(),
            reason: "must be between 1 and 5000".to_string(),
        });
    }
}

fn validate_logging(config: &PsthConfig, errors: &mut Vec<ConfigValidationError>) {
    let level = config.logging.level.to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "logging.level".to_string(),
            reason: format!("must be one of {}", LOG_LEVELS.join(", ")),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PsthConfig::default();
        let result = validate_config(&config);
        if let Err(e) = &result {
            eprintln!("Validation error: {}", e);
        }
        assert!(result.is_ok());
    }

    #[test]
    fn test_invalid_port_range() {
        let mut config = PsthConfig::default();
        config.listener.port = 80;

        let result = validate_config(&config);
        match result {
            Err(ConfigError::ValidationError(msg)) => {
                assert!(msg.contains("listener.port"));
                assert!(msg.contains("1024-65535"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_all_violations_reported() {
        let mut config = PsthConfig::default();
        config.engine.n_bins = 0;
        config.engine.bin_size = -3;
        config.listener.host = " ".to_string();
        config.listener.poll_timeout_ms = 0;
        config.logging.level = "loud".to_string();

        let errors = collect_errors(&config);
        assert_eq!(errors.len(), 5);
        assert!(errors.contains(&ConfigValidationError::MissingRequired {
            field: "listener.host".to_string()
        }));
    }

    #[test]
    fn test_log_level_case_insensitive() {
        let mut config = PsthConfig::default();
        config.logging.level = "WARN".to_string();
        assert!(validate_config(&config).is_ok());
    }
}
