// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # PSTH - Online Peri-Stimulus Time Histograms
//!
//! Aggregates a live stream of spike events into per (channel, unit,
//! stimulus condition) histograms, aligned to trial events announced by
//! text control messages, and normalized by trial count.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! psth = "0.1"  # Default: engine + listener + config + logging
//! ```
//!
//! ## Feature Flags
//!
//! - **`io`** (default): ZMQ control-message listener (`psth-io`, `psth-transports`)
//! - **`config`** (default): TOML configuration loader (`psth-config`)
//! - **`observability`** (default): logging setup (`psth-observability`)
//! - **`file-logging`**: JSON log files with retention
//!
//! The engine itself (`psth-engine`) is always available.
//!
//! ## Usage
//!
//! ```rust
//! use psth::prelude::*;
//!
//! let engine = PsthEngine::new(BinningConfig::new(50, 10)?);
//! engine.handle_message("AddCondition,Grating,0,1,0,Visual,img1")?;
//! engine.handle_message("TrialType img1")?;
//! engine.handle_message_at("TrialAlign", 0)?;
//! engine.record_spike(3, 1, 25);
//! engine.handle_message("TrialEnd")?;
//!
//! assert_eq!(engine.get_histogram(3, 1, 0)[2], 0.5);
//! # Ok::<(), EngineError>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────┐    ┌──────────────────────────┐
//! │  psth-io: ControlListener    │    │  acquisition thread      │
//! │  (ZMQ REP, own thread)       │    │  record_spike(s)         │
//! └──────────────┬───────────────┘    └────────────┬─────────────┘
//!                ↓                                 ↓
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  psth-engine: registry + trial state + spike tensor (one lock)  │
//! └─────────────────────────────────────────────────────────────────┘
//!                                 ↓
//!               renderer: get_histogram / snapshot / PlotBoard
//! ```
//!
//! ## License
//!
//! Apache-2.0

// Re-export core
pub use psth_engine as engine;

// Re-export I/O layer
#[cfg(feature = "io")]
pub use psth_io as io;

#[cfg(feature = "io")]
pub use psth_transports as transports;

// Re-export foundation
#[cfg(feature = "config")]
pub use psth_config as config;

#[cfg(feature = "observability")]
pub use psth_observability as observability;

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use crate::engine::{
        BinningConfig, Clock, Condition, ConditionDefinition, EngineError, EngineObserver,
        EngineResult, HistogramKey, LegendEntry, ManualClock, MessageOutcome, MonotonicClock,
        PlotBoard, PlotFrame, PsthEngine, PsthSnapshot, SpikeEvent, StimulusClass, Timestamp,
        TrialState,
    };

    #[cfg(feature = "io")]
    pub use crate::io::{ControlListener, ControlListenerConfig, ListenerError};

    #[cfg(feature = "config")]
    pub use crate::config::{load_config, validate_config, ConfigError, PsthConfig};

    #[cfg(feature = "observability")]
    pub use crate::observability::{
        init_console_logging, init_logging, parse_debug_flags, CrateDebugFlags, LoggingGuard,
        LoggingOptions,
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_facade_imports() {
        use crate::prelude::*;
        let engine = PsthEngine::default();
        assert_eq!(engine.n_bins(), crate::engine::DEFAULT_N_BINS);
        assert_eq!(engine.trial_state(), TrialState::Idle);
    }
}
