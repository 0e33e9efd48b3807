// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Operator tool: runs a PSTH engine behind the ZMQ control listener.
//!
//! Control messages arrive over ZMQ and on stdin. Stdin lines are:
//!
//! ```text
//! spike <channel> <unit> [<timestamp>]   record one spike
//! at <timestamp> <message>               control message with its own timestamp
//! param <name> <value>                   plot / nbins / binsize
//! dump                                   print plot frames as JSON
//! stats                                  print engine counters as JSON
//! <anything else>                        broadcast control message
//! ```
//!
//! Timestamps are milliseconds on the engine clock, which starts at zero when
//! the tool starts. A spike without a timestamp and a control message without
//! `at` are stamped with the current engine time.
//!
//! EOF on stdin shuts the listener down and exits.

use std::collections::HashMap;
use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use psth::config::{
    apply_cli_overrides, apply_environment_overrides, load_config, validate_config, ConfigError,
    PsthConfig,
};
use psth::engine::{EngineObserver, PlotBoard, PsthEngine};
use psth::io::{ControlListener, ControlListenerConfig};
use psth::observability::{debug_flags_help, init_logging, parse_debug_flags, LoggingOptions};
use tracing::{error, info, warn};

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: psth_listener [--config <path>] [--set <key>=<value>]... [--debug-<crate>]...\n\n\
         Override keys: n_bins, bin_size, max_plots, listener_host, listener_port,\n\
         poll_timeout_ms, log_level\n\n{}",
        debug_flags_help()
    );
    process::exit(2);
}

fn parse_args() -> (Option<PathBuf>, HashMap<String, String>) {
    let mut config_path = None;
    let mut overrides = HashMap::new();

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let v = args.next().unwrap_or_else(|| usage_and_exit());
                config_path = Some(PathBuf::from(v));
            }
            "--set" => {
                let v = args.next().unwrap_or_else(|| usage_and_exit());
                let Some((key, value)) = v.split_once('=') else {
                    eprintln!("Expected <key>=<value>, got: {v}");
                    usage_and_exit();
                };
                overrides.insert(key.trim().to_string(), value.trim().to_string());
            }
            "-h" | "--help" => usage_and_exit(),
            // Consumed by parse_debug_flags
            other if other.starts_with("--debug-") => {}
            other => {
                eprintln!("Unknown argument: {other}");
                usage_and_exit();
            }
        }
    }

    (config_path, overrides)
}

fn resolve_config(
    config_path: Option<PathBuf>,
    overrides: &HashMap<String, String>,
) -> Result<PsthConfig> {
    let config = match load_config(config_path.as_deref(), Some(overrides)) {
        Ok(config) => config,
        Err(ConfigError::FileNotFound(_)) if config_path.is_none() => {
            eprintln!("No psth_configuration.toml found, using defaults");
            let mut config = PsthConfig::default();
            apply_environment_overrides(&mut config);
            apply_cli_overrides(&mut config, overrides);
            config
        }
        Err(e) => return Err(e).context("Failed to load configuration"),
    };

    validate_config(&config)?;
    Ok(config)
}

fn handle_line(line: &str, engine: &PsthEngine, board: &PlotBoard) -> Result<()> {
    let mut tokens = line.split_whitespace();
    match tokens.next() {
        Some("spike") => {
            let fields: Vec<i64> = tokens
                .map(str::parse)
                .collect::<Result<_, _>>()
                .with_context(|| format!("Invalid spike line: {line}"))?;
            let (channel, unit, timestamp) = match fields[..] {
                [channel, unit] => (channel, unit, engine.now()),
                [channel, unit, timestamp] => (channel, unit, timestamp),
                _ => anyhow::bail!("Expected: spike <channel> <unit> [<timestamp>]"),
            };
            let (Ok(channel), Ok(unit)) = (usize::try_from(channel), usize::try_from(unit)) else {
                anyhow::bail!("Channel and unit must be non-negative");
            };
            engine.record_spike(channel, unit, timestamp);
        }
        Some("at") => {
            let Some((timestamp, message)) = line["at".len()..].trim_start().split_once(' ')
            else {
                anyhow::bail!("Expected: at <timestamp> <message>");
            };
            let timestamp: i64 = timestamp
                .parse()
                .with_context(|| format!("Invalid timestamp: {timestamp}"))?;
            engine.handle_broadcast_message_at(message.trim(), timestamp);
        }
        Some("param") => {
            let (Some(name), Some(value)) = (tokens.next(), tokens.next()) else {
                anyhow::bail!("Expected: param <name> <value>");
            };
            engine.apply_parameter(name, value)?;
        }
        Some("dump") => {
            let frames = board.frames(engine);
            println!("{}", serde_json::to_string_pretty(&frames)?);
        }
        Some("stats") => {
            println!("{}", serde_json::to_string(&engine.stats())?);
        }
        _ => engine.handle_broadcast_message(line),
    }
    io::stdout().flush()?;
    Ok(())
}

fn main() -> Result<()> {
    let (config_path, overrides) = parse_args();
    let config = resolve_config(config_path, &overrides)?;

    let debug_flags = parse_debug_flags();
    let _logging_guard = init_logging(
        &debug_flags,
        &LoggingOptions {
            level: config.logging.level.clone(),
            log_dir: Some(config.logging.log_dir.clone()),
            file_logging: config.logging.file_logging,
            retention_days: Some(config.logging.retention_days),
            retention_runs: Some(config.logging.retention_runs),
        },
    )?;

    info!(
        "psth_listener {} ({} bins x {} ms)",
        psth::engine::VERSION,
        config.engine.n_bins,
        config.engine.bin_size
    );

    let board = Arc::new(PlotBoard::new(config.engine.max_plots));
    let observer: Arc<dyn EngineObserver> = Arc::clone(&board) as Arc<dyn EngineObserver>;
    let engine = Arc::new(PsthEngine::new(config.engine.binning()?).with_observer(observer));

    let listener = if config.listener.enabled {
        let listener_config = ControlListenerConfig {
            endpoint: config.listener.endpoint(),
            poll_timeout_ms: config.listener.poll_timeout_ms,
            recv_hwm: config.listener.recv_hwm,
            send_hwm: config.listener.send_hwm,
            linger_ms: config.listener.linger_ms,
        };
        match ControlListener::start(listener_config, Arc::clone(&engine)) {
            Ok(listener) => Some(listener),
            Err(e) => {
                error!("Control listener unavailable, continuing on stdin only: {}", e);
                None
            }
        }
    } else {
        info!("Control listener disabled");
        None
    };

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read stdin")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Err(e) = handle_line(line, &engine, &board) {
            warn!("{:#}", e);
        }
    }

    if let Some(listener) = listener {
        listener.stop()?;
    }

    let stats = engine.stats();
    info!(
        "Shutting down: {} messages, {} spikes recorded, {} dropped",
        stats.messages_handled, stats.spikes_recorded, stats.spikes_dropped
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use psth::engine::{BinningConfig, Clock, ManualClock};

    fn engine_at(now: i64) -> (PsthEngine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(now));
        let engine = PsthEngine::new(BinningConfig::new(10, 10).unwrap())
            .with_clock(Arc::clone(&clock) as Arc<dyn Clock>);
        engine.handle_message("AddCondition,A,0,1,0,G,a1").unwrap();
        engine.handle_message("TrialType a1").unwrap();
        (engine, clock)
    }

    #[test]
    fn test_spike_without_timestamp_uses_engine_clock() {
        let (engine, clock) = engine_at(5000);
        let board = PlotBoard::default();

        handle_line("TrialAlign", &engine, &board).unwrap();
        clock.set(5025);
        handle_line("spike 1 0", &engine, &board).unwrap();

        assert_eq!(engine.get_histogram(1, 0, 0)[2], 1.0);
    }

    #[test]
    fn test_at_prefix_stamps_control_messages() {
        let (engine, _clock) = engine_at(5000);
        let board = PlotBoard::default();

        handle_line("at 1000 TrialAlign", &engine, &board).unwrap();
        handle_line("spike 2 0 1015", &engine, &board).unwrap();
        handle_line("at 1100 TrialEnd", &engine, &board).unwrap();

        assert_eq!(engine.get_histogram(2, 0, 0)[1], 0.5);
        assert_eq!(engine.stats().spikes_recorded, 1);
    }

    #[test]
    fn test_bad_lines_are_rejected() {
        let (engine, _clock) = engine_at(0);
        let board = PlotBoard::default();

        assert!(handle_line("spike 1", &engine, &board).is_err());
        assert!(handle_line("spike -1 0 5", &engine, &board).is_err());
        assert!(handle_line("spike a b", &engine, &board).is_err());
        assert!(handle_line("at soon TrialAlign", &engine, &board).is_err());
        assert!(handle_line("at 10", &engine, &board).is_err());
        assert!(handle_line("param nbins", &engine, &board).is_err());
        assert_eq!(engine.stats().spikes_recorded, 0);
    }

    #[test]
    fn test_param_and_plot_reach_the_board() {
        let (engine, _clock) = engine_at(0);
        let board = Arc::new(PlotBoard::default());
        let engine = engine.with_observer(Arc::clone(&board) as Arc<dyn EngineObserver>);

        handle_line("param nbins 20", &engine, &board).unwrap();
        handle_line("param plot 3,1", &engine, &board).unwrap();

        assert_eq!(engine.n_bins(), 20);
        assert_eq!(board.len(), 1);
    }
}
