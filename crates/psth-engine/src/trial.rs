// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Transient per-trial state

use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;
use crate::registry::StimulusClass;

/// Trial lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialState {
    /// No design loaded or between trials
    Idle,
    /// Aligned; spikes are being binned
    InTrial,
}

/// The one active trial session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrialSession {
    pub current_stimulus_class: Option<StimulusClass>,
    pub trial_start_time: Option<Timestamp>,
    pub in_trial: bool,
}

impl TrialSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TrialState {
        if self.in_trial {
            TrialState::InTrial
        } else {
            TrialState::Idle
        }
    }

    pub fn select(&mut self, class: StimulusClass) {
        self.current_stimulus_class = Some(class);
    }

    pub fn align(&mut self, timestamp: Timestamp) {
        self.trial_start_time = Some(timestamp);
        self.in_trial = true;
    }

    /// Offset of `timestamp` from the alignment point, if aligned and
    /// representable
    pub fn offset(&self, timestamp: Timestamp) -> Option<Timestamp> {
        match (self.in_trial, self.trial_start_time) {
            (true, Some(start)) => timestamp.checked_sub(start),
            _ => None,
        }
    }

    /// Close the trial, returning the class that was active
    pub fn finish(&mut self) -> Option<StimulusClass> {
        let class = self.current_stimulus_class.take();
        self.trial_start_time = None;
        self.in_trial = false;
        class
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
