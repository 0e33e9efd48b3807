// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! The PSTH engine
//!
//! All mutable state (registry, trial session, tensor, binning, counters)
//! lives in one `EngineState` behind one lock. Message handling, spike
//! recording and queries each take the lock once, so a `TrialEnd`
//! normalization pass is never observed half-applied. Observer callbacks run
//! after the lock is released.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::{Clock, MonotonicClock, Timestamp};
use crate::error::{EngineError, EngineResult};
use crate::message::ControlMessage;
use crate::observer::{EngineObserver, NoopObserver, Notification};
use crate::plot::{class_color, LegendEntry, PlotRequest};
use crate::registry::{Condition, ConditionRegistry, StimulusClass};
use crate::tensor::{BinningConfig, HistogramKey, SpikeTensor};
use crate::trial::{TrialSession, TrialState};

/// One sorted spike from the acquisition pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpikeEvent {
    pub channel: usize,
    pub unit: usize,
    pub timestamp: Timestamp,
}

impl SpikeEvent {
    pub fn new(channel: usize, unit: usize, timestamp: Timestamp) -> Self {
        Self {
            channel,
            unit,
            timestamp,
        }
    }
}

/// What a control message did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    ClearedDesign,
    ConditionDefined(StimulusClass),
    TrialSelected {
        stimulus_class: StimulusClass,
        n_trials: u64,
    },
    TrialAligned(Timestamp),
    TrialEnded {
        stimulus_class: Option<StimulusClass>,
    },
    /// Unknown prefix, or a transition not valid from the current state
    Ignored,
}

/// Running counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub messages_handled: u64,
    pub messages_ignored: u64,
    pub malformed_inputs: u64,
    pub unmapped_trial_types: u64,
    pub spikes_recorded: u64,
    pub spikes_dropped: u64,
}

/// One class's histogram inside a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotTrace {
    pub stimulus_class: StimulusClass,
    pub label: String,
    pub trial_count: u32,
    pub histogram: Vec<f64>,
}

/// Consistent read of several histograms for one (channel, unit)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsthSnapshot {
    pub channel: usize,
    pub unit: usize,
    pub n_bins: usize,
    pub bin_size: Timestamp,
    pub n_trials: u64,
    pub traces: Vec<SnapshotTrace>,
}

impl PsthSnapshot {
    pub fn to_json(&self) -> EngineResult<String> {
        serde_json::to_string(self).map_err(|e| EngineError::Serialization(e.to_string()))
    }
}

/// State guarded by the engine lock
#[derive(Debug, Default)]
pub struct EngineState {
    registry: ConditionRegistry,
    session: TrialSession,
    tensor: SpikeTensor,
    n_trials: u64,
    stats: EngineStats,
}

impl EngineState {
    pub fn new(binning: BinningConfig) -> Self {
        Self {
            tensor: SpikeTensor::new(binning),
            ..Default::default()
        }
    }

    pub fn registry(&self) -> &ConditionRegistry {
        &self.registry
    }

    pub fn session(&self) -> &TrialSession {
        &self.session
    }

    pub fn tensor(&self) -> &SpikeTensor {
        &self.tensor
    }

    pub fn n_trials(&self) -> u64 {
        self.n_trials
    }

    fn apply(
        &mut self,
        message: ControlMessage,
        now: Timestamp,
        notes: &mut Vec<Notification>,
    ) -> EngineResult<MessageOutcome> {
        match message {
            ControlMessage::ClearDesign => {
                self.registry.clear();
                self.tensor.clear();
                self.session.reset();
                self.n_trials = 0;
                info!("[PSTH-ENGINE] Design cleared");
                notes.push(Notification::DataChanged);
                notes.push(Notification::LegendChanged);
                Ok(MessageOutcome::ClearedDesign)
            }
            ControlMessage::AddCondition(definition) => {
                let label = definition.label.clone();
                let ids = definition.trial_type_ids.len();
                let class = self.registry.define_condition(definition);
                info!(
                    "[PSTH-ENGINE] Condition '{}' -> class {} ({} trial types)",
                    label, class, ids
                );
                notes.push(Notification::LegendChanged);
                Ok(MessageOutcome::ConditionDefined(class))
            }
            ControlMessage::TrialType(id) => {
                let class = self.registry.resolve_trial_type(&id)?;
                self.session.select(class);
                self.n_trials += 1;
                self.registry.increment_trial_count(class);
                debug!(
                    "[PSTH-ENGINE] Trial type '{}' -> class {} (trial {})",
                    id, class, self.n_trials
                );
                Ok(MessageOutcome::TrialSelected {
                    stimulus_class: class,
                    n_trials: self.n_trials,
                })
            }
            ControlMessage::TrialAlign => {
                self.session.align(now);
                debug!("[PSTH-ENGINE] Trial aligned at {}", now);
                Ok(MessageOutcome::TrialAligned(now))
            }
            ControlMessage::TrialEnd => {
                if self.session.state() != TrialState::InTrial {
                    debug!("[PSTH-ENGINE] TrialEnd outside a trial, ignored");
                    return Ok(MessageOutcome::Ignored);
                }
                let class = self.session.current_stimulus_class;
                if let Some(class) = class {
                    self.normalize(class);
                }
                self.session.finish();
                notes.push(Notification::DataChanged);
                Ok(MessageOutcome::TrialEnded {
                    stimulus_class: class,
                })
            }
        }
    }

    /// Rescale the just-completed class by n / (n + 1)
    fn normalize(&mut self, class: StimulusClass) {
        let Some(n) = self.registry.trial_count(class).filter(|&n| n > 0) else {
            return;
        };
        let factor = n as f64 / (n as f64 + 1.0);
        let touched = self.tensor.rescale_class(class, factor);
        debug!(
            "[PSTH-ENGINE] Normalized class {} by {:.4} ({} histograms)",
            class, factor, touched
        );
    }

    fn record(&mut self, spike: SpikeEvent) -> bool {
        let recorded = self.try_record(spike);
        if recorded {
            self.stats.spikes_recorded += 1;
        } else {
            self.stats.spikes_dropped += 1;
        }
        recorded
    }

    fn try_record(&mut self, spike: SpikeEvent) -> bool {
        let Some(class) = self.session.current_stimulus_class else {
            return false;
        };
        let Some(count) = self.registry.trial_count(class).filter(|&n| n > 0) else {
            return false;
        };
        let Some(offset) = self.session.offset(spike.timestamp) else {
            return false;
        };
        let Some(bin) = self.tensor.binning().bin_index(offset) else {
            return false;
        };
        self.tensor.add(
            HistogramKey::new(spike.channel, spike.unit, class),
            bin,
            1.0 / count as f64,
            self.registry.num_conditions(),
        );
        true
    }

    fn reset_tensor(&mut self) {
        self.tensor.zero_and_resize();
        self.n_trials = 0;
    }

    fn rebin(&mut self, binning: BinningConfig) {
        self.tensor.rebin(binning);
        self.n_trials = 0;
    }

    fn snapshot(&self, channel: usize, unit: usize, classes: &[StimulusClass]) -> PsthSnapshot {
        let binning = self.tensor.binning();
        PsthSnapshot {
            channel,
            unit,
            n_bins: binning.n_bins,
            bin_size: binning.bin_size,
            n_trials: self.n_trials,
            traces: classes
                .iter()
                .map(|&class| SnapshotTrace {
                    stimulus_class: class,
                    label: self.registry.label_of(class),
                    trial_count: self.registry.trial_count(class).unwrap_or(0),
                    histogram: self.tensor.histogram(&HistogramKey::new(channel, unit, class)),
                })
                .collect(),
        }
    }
}

/// Thread-safe engine shared by the pipeline, the listener and the renderer
pub struct PsthEngine {
    state: Mutex<EngineState>,
    observer: Arc<dyn EngineObserver>,
    clock: Arc<dyn Clock>,
}

impl Default for PsthEngine {
    fn default() -> Self {
        Self::new(BinningConfig::default())
    }
}

impl std::fmt::Debug for PsthEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PsthEngine")
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl PsthEngine {
    pub fn new(binning: BinningConfig) -> Self {
        Self {
            state: Mutex::new(EngineState::new(binning)),
            observer: Arc::new(NoopObserver),
            clock: Arc::new(MonotonicClock::new()),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn EngineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Current reading of the clock that stamps control messages
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    fn notify(&self, notes: Vec<Notification>) {
        for note in notes {
            note.dispatch(self.observer.as_ref());
        }
    }

    /// Handle a control message stamped with the engine clock
    pub fn handle_message(&self, text: &str) -> EngineResult<MessageOutcome> {
        self.handle_message_at(text, self.clock.now())
    }

    /// Handle a control message carrying its own timestamp
    pub fn handle_message_at(&self, text: &str, timestamp: Timestamp) -> EngineResult<MessageOutcome> {
        let parsed = ControlMessage::parse(text);
        let mut notes = Vec::new();
        let result = {
            let mut state = self.state.lock();
            let result = match parsed {
                Ok(Some(message)) => state.apply(message, timestamp, &mut notes),
                Ok(None) => Ok(MessageOutcome::Ignored),
                Err(e) => Err(e),
            };
            match &result {
                Ok(MessageOutcome::Ignored) => state.stats.messages_ignored += 1,
                Ok(_) => state.stats.messages_handled += 1,
                Err(EngineError::UnmappedTrialType(_)) => state.stats.unmapped_trial_types += 1,
                Err(_) => state.stats.malformed_inputs += 1,
            }
            result
        };
        self.notify(notes);
        result
    }

    /// Broadcast entry point for producers: errors are logged, never returned
    pub fn handle_broadcast_message(&self, text: &str) {
        self.handle_broadcast_message_at(text, self.clock.now());
    }

    pub fn handle_broadcast_message_at(&self, text: &str, timestamp: Timestamp) {
        if let Err(e) = self.handle_message_at(text, timestamp) {
            warn!("[PSTH-ENGINE] {}", e);
        }
    }

    /// Bin one spike; `false` when it was dropped
    pub fn record_spike(&self, channel: usize, unit: usize, timestamp: Timestamp) -> bool {
        self.state.lock().record(SpikeEvent::new(channel, unit, timestamp))
    }

    /// Bin a processing cycle's worth of spikes under one lock acquisition
    pub fn record_spikes(&self, spikes: &[SpikeEvent]) -> usize {
        let mut state = self.state.lock();
        spikes.iter().filter(|&&spike| state.record(spike)).count()
    }

    /// Zero all bins and the global trial count; conditions are kept
    pub fn reset_tensor(&self) {
        self.state.lock().reset_tensor();
        info!("[PSTH-ENGINE] Tensor reset");
        self.notify(vec![Notification::DataChanged]);
    }

    /// Change bin count and width; clears counts and the global trial count
    pub fn rebin(&self, n_bins: usize, bin_size: Timestamp) -> EngineResult<()> {
        self.rebin_with(|_| BinningConfig::new(n_bins, bin_size))
    }

    /// Derive the new binning from the current one and apply it under one lock
    fn rebin_with(
        &self,
        update: impl FnOnce(BinningConfig) -> EngineResult<BinningConfig>,
    ) -> EngineResult<()> {
        let binning = {
            let mut state = self.state.lock();
            let binning = update(state.tensor.binning())?;
            state.rebin(binning);
            binning
        };
        info!(
            "[PSTH-ENGINE] Rebinned to {} bins of {}",
            binning.n_bins, binning.bin_size
        );
        self.notify(vec![Notification::DataChanged]);
        Ok(())
    }

    /// Parse a `"channel,unit[,class]"` request and forward it to the observer
    pub fn request_plot(&self, text: &str) -> EngineResult<(usize, usize, Vec<StimulusClass>)> {
        let request = match PlotRequest::parse(text) {
            Ok(request) => request,
            Err(e) => {
                self.state.lock().stats.malformed_inputs += 1;
                return Err(e);
            }
        };
        let classes = match request.stimulus_class {
            Some(class) => vec![class],
            None => self.get_stimulus_classes(),
        };
        info!(
            "[PSTH-ENGINE] Plot requested: chan-{} unit-{} classes {:?}",
            request.channel, request.unit, classes
        );
        self.notify(vec![Notification::PlotRequested {
            channel: request.channel,
            unit: request.unit,
            stimulus_classes: classes.clone(),
        }]);
        Ok((request.channel, request.unit, classes))
    }

    /// Apply a host parameter (`plot`, `nbins`, `binsize`)
    pub fn apply_parameter(&self, name: &str, value: &str) -> EngineResult<()> {
        let invalid = |reason: &str| EngineError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        };
        let result = match name.to_ascii_lowercase().as_str() {
            "plot" => self.request_plot(value).map(|_| ()),
            "nbins" => match value.trim().parse::<usize>() {
                Ok(n_bins) => {
                    self.rebin_with(|current| BinningConfig::new(n_bins, current.bin_size))
                }
                Err(_) => Err(invalid("expected a positive integer")),
            },
            "binsize" => match value.trim().parse::<Timestamp>() {
                Ok(bin_size) => {
                    self.rebin_with(|current| BinningConfig::new(current.n_bins, bin_size))
                }
                Err(_) => Err(invalid("expected a positive integer")),
            },
            _ => Err(invalid("unknown parameter")),
        };
        if let Err(e) = &result {
            if !matches!(e, EngineError::MalformedPlotRequest(_)) {
                self.state.lock().stats.malformed_inputs += 1;
            }
        }
        result
    }

    pub fn get_histogram(&self, channel: usize, unit: usize, stimulus_class: StimulusClass) -> Vec<f64> {
        self.state
            .lock()
            .tensor
            .histogram(&HistogramKey::new(channel, unit, stimulus_class))
    }

    pub fn get_trial_count(&self) -> u64 {
        self.state.lock().n_trials
    }

    pub fn get_stimulus_classes(&self) -> Vec<StimulusClass> {
        self.state.lock().registry.stimulus_classes()
    }

    pub fn get_condition_label(&self, stimulus_class: StimulusClass) -> String {
        self.state.lock().registry.label_of(stimulus_class)
    }

    pub fn condition_trial_count(&self, stimulus_class: StimulusClass) -> Option<u32> {
        self.state.lock().registry.trial_count(stimulus_class)
    }

    pub fn conditions(&self) -> Vec<Condition> {
        self.state.lock().registry.conditions().to_vec()
    }

    pub fn num_conditions(&self) -> usize {
        self.state.lock().registry.num_conditions()
    }

    pub fn n_bins(&self) -> usize {
        self.state.lock().tensor.binning().n_bins
    }

    pub fn bin_size(&self) -> Timestamp {
        self.state.lock().tensor.binning().bin_size
    }

    pub fn binning(&self) -> BinningConfig {
        self.state.lock().tensor.binning()
    }

    pub fn trial_state(&self) -> TrialState {
        self.state.lock().session.state()
    }

    pub fn trial_session(&self) -> TrialSession {
        self.state.lock().session.clone()
    }

    pub fn current_stimulus_class(&self) -> Option<StimulusClass> {
        self.state.lock().session.current_stimulus_class
    }

    pub fn histogram_keys(&self) -> Vec<HistogramKey> {
        self.state.lock().tensor.keys()
    }

    pub fn legend(&self) -> Vec<LegendEntry> {
        self.state
            .lock()
            .registry
            .conditions()
            .iter()
            .map(|c| LegendEntry {
                stimulus_class: c.stimulus_class,
                label: c.label.clone(),
                color: class_color(c.stimulus_class),
            })
            .collect()
    }

    /// Histograms for several classes read under a single lock acquisition
    pub fn snapshot(&self, channel: usize, unit: usize, classes: &[StimulusClass]) -> PsthSnapshot {
        self.state.lock().snapshot(channel, unit, classes)
    }

    pub fn stats(&self) -> EngineStats {
        self.state.lock().stats.clone()
    }

    /// Run a read-only closure against the locked state
    pub fn with_state<R>(&self, f: impl FnOnce(&EngineState) -> R) -> R {
        f(&self.state.lock())
    }
}
