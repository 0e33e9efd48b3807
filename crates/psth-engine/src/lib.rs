// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # psth-engine
//!
//! Online event-to-histogram aggregation for neural recording experiments.
//!
//! Spike events and experiment-control messages stream in; per
//! (channel, unit, stimulus condition) peri-stimulus time histograms come out,
//! normalized by trial count.
//!
//! ## Data flow
//!
//! ```text
//! control messages ──► trial state machine ──► condition registry
//! spike events ──────► spike tensor (gated by trial state)
//! renderer ──────────► query interface ──► histogram snapshots
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use psth_engine::{BinningConfig, PsthEngine};
//!
//! let engine = PsthEngine::new(BinningConfig::new(50, 10)?);
//! engine.handle_message("AddCondition,CondA,0,1,0,GroupA,img1,img2")?;
//! engine.handle_message("TrialType img1")?;
//! engine.handle_message_at("TrialAlign", 1000)?;
//! engine.record_spike(0, 0, 1010);
//! assert_eq!(engine.get_histogram(0, 0, 0)[1], 1.0);
//!
//! engine.handle_message("TrialEnd")?;
//! assert_eq!(engine.get_histogram(0, 0, 0)[1], 0.5);
//! # Ok::<(), psth_engine::EngineError>(())
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod clock;
pub mod engine;
pub mod error;
pub mod message;
pub mod observer;
pub mod plot;
pub mod registry;
pub mod tensor;
pub mod trial;

pub use clock::{Clock, ManualClock, MonotonicClock, Timestamp};
pub use engine::{
    EngineState, EngineStats, MessageOutcome, PsthEngine, PsthSnapshot, SnapshotTrace, SpikeEvent,
};
pub use error::{EngineError, EngineResult};
pub use message::ControlMessage;
pub use observer::{EngineObserver, NoopObserver, Notification, NotificationLog};
pub use plot::{
    class_color, LegendEntry, PlotBoard, PlotFrame, PlotRequest, PlotTrace, PlotUnit, Rgb,
    DEFAULT_MAX_PLOTS, PALETTE,
};
pub use registry::{Condition, ConditionDefinition, ConditionRegistry, StimulusClass};
pub use tensor::{BinningConfig, HistogramKey, SpikeTensor, DEFAULT_BIN_SIZE, DEFAULT_N_BINS};
pub use trial::{TrialSession, TrialState};
