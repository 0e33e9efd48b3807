// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Logging initialization
//!
//! Console output always; with the `file-logging` feature each run also gets
//! its own timestamped folder of JSON log files:
//!
//! ```text
//! ./logs/
//!   └── run_20250101_120000/
//!       ├── psth-engine.log
//!       ├── psth-io.log
//!       └── psth.log (combined)
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;

const RUN_PREFIX: &str = "run_";
const RUN_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Where and how long to keep log files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingOptions {
    /// Level for crates without a debug flag
    pub level: String,
    /// Base directory for run folders (default: `./logs`)
    pub log_dir: Option<PathBuf>,
    /// Write JSON files in addition to the console
    pub file_logging: bool,
    /// Keep logs for N days (default: 30)
    pub retention_days: Option<u64>,
    /// Keep N most recent runs (default: 10)
    pub retention_runs: Option<usize>,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
            file_logging: false,
            retention_days: None,
            retention_runs: None,
        }
    }
}

/// Keeps file writers alive; logs are flushed when it drops
pub struct LoggingGuard {
    #[cfg(feature = "file-logging")]
    _file_guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
    log_dir: Option<PathBuf>,
}

impl LoggingGuard {
    /// Run folder receiving log files, if file logging is active
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initialize logging for a process
///
/// # Arguments
/// * `debug_flags` - Per-crate debug flags for filtering
/// * `options` - Default level, file output and retention
pub fn init_logging(debug_flags: &CrateDebugFlags, options: &LoggingOptions) -> Result<LoggingGuard> {
    let filter = debug_flags.to_filter_string(&options.level);
    let env_filter = EnvFilter::try_new(&filter)
        .with_context(|| format!("Invalid log filter: {}", filter))?;

    let mut layers: Vec<BoxedLayer> = Vec::new();

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .with_filter(env_filter)
        .boxed();
    layers.push(console_layer);

    #[cfg_attr(not(feature = "file-logging"), allow(unused_mut))]
    let mut guard = LoggingGuard {
        #[cfg(feature = "file-logging")]
        _file_guards: Vec::new(),
        log_dir: None,
    };

    if options.file_logging {
        #[cfg(feature = "file-logging")]
        {
            let run_folder = file_layers(&filter, options, &mut layers, &mut guard._file_guards)?;
            guard.log_dir = Some(run_folder);
        }
        #[cfg(not(feature = "file-logging"))]
        eprintln!("Warning: file logging requested but the `file-logging` feature is disabled");
    }

    Registry::default()
        .with(layers)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    Ok(guard)
}

#[cfg(feature = "file-logging")]
fn file_layers(
    filter: &str,
    options: &LoggingOptions,
    layers: &mut Vec<BoxedLayer>,
    file_guards: &mut Vec<tracing_appender::non_blocking::WorkerGuard>,
) -> Result<PathBuf> {
    use tracing_appender::rolling;

    let base_log_dir = options
        .log_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("./logs"));

    let timestamp = Utc::now().format(RUN_TIMESTAMP_FORMAT);
    let run_folder = base_log_dir.join(format!("{}{}", RUN_PREFIX, timestamp));
    std::fs::create_dir_all(&run_folder)
        .with_context(|| format!("Failed to create log directory: {}", run_folder.display()))?;

    cleanup_old_logs(&base_log_dir, options.retention_days, options.retention_runs)?;

    for crate_name in crate::KNOWN_CRATES {
        let file_appender = rolling::daily(&run_folder, format!("{}.log", crate_name));
        let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);
        file_guards.push(file_guard);

        let target = crate_name.replace('-', "_");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .json()
            .with_filter(EnvFilter::try_new(format!("off,{}=debug", target))?)
            .boxed();
        layers.push(file_layer);
    }

    let combined_appender = rolling::daily(&run_folder, "psth.log");
    let (combined_non_blocking, combined_guard) = tracing_appender::non_blocking(combined_appender);
    file_guards.push(combined_guard);

    let combined_layer = tracing_subscriber::fmt::layer()
        .with_writer(combined_non_blocking)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .json()
        .with_filter(EnvFilter::try_new(filter)?)
        .boxed();
    layers.push(combined_layer);

    Ok(run_folder)
}

/// Console-only logging at `level`, for tools and tests
///
/// Returns an error if a global subscriber is already installed.
pub fn init_console_logging(level: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_new(level).with_context(|| format!("Invalid log level: {}", level))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install console logger: {}", e))
}

/// Initialize logging with default settings
pub fn init_logging_default(debug_flags: &CrateDebugFlags) -> Result<LoggingGuard> {
    init_logging(debug_flags, &LoggingOptions::default())
}

fn parse_run_timestamp(dir_name: &str) -> Option<DateTime<Utc>> {
    let timestamp_str = dir_name.strip_prefix(RUN_PREFIX)?;
    NaiveDateTime::parse_from_str(timestamp_str, RUN_TIMESTAMP_FORMAT)
        .ok()
        .map(|dt| dt.and_utc())
}

/// Remove `run_*` folders older than `retention_days`, then trim to the
/// `retention_runs` most recent. Returns the number of folders removed.
pub fn cleanup_old_logs(
    base_log_dir: &Path,
    retention_days: Option<u64>,
    retention_runs: Option<usize>,
) -> Result<usize> {
    if !base_log_dir.exists() {
        return Ok(0);
    }

    let retention_days = retention_days.unwrap_or(30);
    let retention_runs = retention_runs.unwrap_or(10);
    let cutoff_date = Utc::now() - chrono::Duration::days(retention_days as i64);

    let mut runs: Vec<(PathBuf, DateTime<Utc>)> = Vec::new();

    for entry in std::fs::read_dir(base_log_dir)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let started = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_run_timestamp);
        if let Some(started) = started {
            runs.push((path, started));
        }
    }

    // Newest first
    runs.sort_by(|a, b| b.1.cmp(&a.1));

    let mut removed = 0;
    for (index, (path, started)) in runs.iter().enumerate() {
        if *started >= cutoff_date && index < retention_runs {
            continue;
        }
        match std::fs::remove_dir_all(path) {
            Ok(()) => removed += 1,
            Err(e) => eprintln!(
                "Warning: Failed to remove old log directory {}: {}",
                path.display(),
                e
            ),
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_run(base: &Path, started: DateTime<Utc>) -> PathBuf {
        let path = base.join(format!("{}{}", RUN_PREFIX, started.format(RUN_TIMESTAMP_FORMAT)));
        std::fs::create_dir_all(&path).unwrap();
        path
    }

    #[test]
    fn test_parse_run_timestamp() {
        let parsed = parse_run_timestamp("run_20250101_120000").unwrap();
        assert_eq!(parsed.format("%Y-%m-%d %H:%M:%S").to_string(), "2025-01-01 12:00:00");
        assert!(parse_run_timestamp("run_garbage").is_none());
        assert!(parse_run_timestamp("notes").is_none());
    }

    #[test]
    fn test_cleanup_removes_expired_runs() {
        let dir = tempdir().unwrap();
        let now = Utc::now();
        let expired = make_run(dir.path(), now - chrono::Duration::days(40));
        let recent = make_run(dir.path(), now - chrono::Duration::days(1));
        std::fs::create_dir_all(dir.path().join("keep_me")).unwrap();

        let removed = cleanup_old_logs(dir.path(), Some(30), Some(10)).unwrap();

        assert_eq!(removed, 1);
        assert!(!expired.exists());
        assert!(recent.exists());
        assert!(dir.path().join("keep_me").exists());
    }

    #[test]
    fn test_cleanup_keeps_most_recent_runs() {
        let dir = tempdir().unwrap();
        let now = Utc::now();
        let runs: Vec<PathBuf> = (1..=4)
            .map(|hours| make_run(dir.path(), now - chrono::Duration::hours(hours)))
            .collect();

        let removed = cleanup_old_logs(dir.path(), Some(30), Some(2)).unwrap();

        assert_eq!(removed, 2);
        assert!(runs[0].exists());
        assert!(runs[1].exists());
        assert!(!runs[2].exists());
        assert!(!runs[3].exists());
    }

    #[test]
    fn test_cleanup_missing_dir() {
        let dir = tempdir().unwrap();
        assert_eq!(
            cleanup_old_logs(&dir.path().join("absent"), None, None).unwrap(),
            0
        );
    }
}
