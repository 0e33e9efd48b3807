// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Notifications pushed to the rendering collaborator
//!
//! The engine never calls an observer while holding its state lock, so an
//! observer may query the engine from inside a callback.

use parking_lot::Mutex;

use crate::registry::StimulusClass;

/// Outward notification interface
pub trait EngineObserver: Send + Sync {
    /// Histogram data changed; redraw
    fn on_data_changed(&self) {}

    /// Condition labels changed; redraw the legend
    fn on_legend_changed(&self) {}

    /// Materialize a display unit for these histograms
    fn on_plot_requested(&self, _channel: usize, _unit: usize, _stimulus_classes: &[StimulusClass]) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl EngineObserver for NoopObserver {}

/// A queued notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    DataChanged,
    LegendChanged,
    PlotRequested {
        channel: usize,
        unit: usize,
        stimulus_classes: Vec<StimulusClass>,
    },
}

impl Notification {
    pub fn dispatch(&self, observer: &dyn EngineObserver) {
        match self {
            Notification::DataChanged => observer.on_data_changed(),
            Notification::LegendChanged => observer.on_legend_changed(),
            Notification::PlotRequested {
                channel,
                unit,
                stimulus_classes,
            } => observer.on_plot_requested(*channel, *unit, stimulus_classes),
        }
    }
}

/// Observer that records every notification, in order
#[derive(Debug, Default)]
pub struct NotificationLog {
    entries: Mutex<Vec<Notification>>,
}

impl NotificationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Notification> {
        self.entries.lock().clone()
    }

    pub fn drain(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.entries.lock())
    }

    pub fn count(&self, wanted: &Notification) -> usize {
        self.entries.lock().iter().filter(|n| *n == wanted).count()
    }
}

impl EngineObserver for NotificationLog {
    fn on_data_changed(&self) {
        self.entries.lock().push(Notification::DataChanged);
    }

    fn on_legend_changed(&self) {
        self.entries.lock().push(Notification::LegendChanged);
    }

    fn on_plot_requested(&self, channel: usize, unit: usize, stimulus_classes: &[StimulusClass]) {
        self.entries.lock().push(Notification::PlotRequested {
            channel,
            unit,
            stimulus_classes: stimulus_classes.to_vec(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_reaches_log() {
        let log = NotificationLog::new();
        Notification::DataChanged.dispatch(&log);
        Notification::PlotRequested {
            channel: 1,
            unit: 2,
            stimulus_classes: vec![0, 1],
        }
        .dispatch(&log);
        assert_eq!(log.count(&Notification::DataChanged), 1);
        assert_eq!(log.drain().len(), 2);
        assert!(log.entries().is_empty());
    }
}
