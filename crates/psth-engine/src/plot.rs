// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Plot requests, legend colours, and the bounded plot board
//!
//! `PlotBoard` is a reference rendering collaborator: it keeps the most recent
//! display units (oldest evicted first) and turns engine queries into frames
//! ready for drawing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::PsthEngine;
use crate::error::{EngineError, EngineResult};
use crate::observer::EngineObserver;
use crate::registry::StimulusClass;

/// Display units shown at once unless configured otherwise
pub const DEFAULT_MAX_PLOTS: usize = 8;

/// Grid columns used to lay out display slots
pub const GRID_COLUMNS: usize = 4;

/// 8-bit RGB colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// Legend colours, cycled by stimulus class
pub const PALETTE: [Rgb; 10] = [
    Rgb(30, 118, 179),
    Rgb(255, 126, 13),
    Rgb(43, 159, 43),
    Rgb(213, 38, 39),
    Rgb(147, 102, 188),
    Rgb(139, 85, 74),
    Rgb(226, 118, 193),
    Rgb(126, 126, 126),
    Rgb(187, 188, 33),
    Rgb(22, 189, 206),
];

pub fn class_color(class: StimulusClass) -> Rgb {
    PALETTE[class % PALETTE.len()]
}

/// One legend row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegendEntry {
    pub stimulus_class: StimulusClass,
    pub label: String,
    pub color: Rgb,
}

/// Parsed `"channel,unit[,stimulus-class]"` request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlotRequest {
    pub channel: usize,
    pub unit: usize,
    /// `None` means every known class
    pub stimulus_class: Option<StimulusClass>,
}

impl PlotRequest {
    pub fn parse(text: &str) -> EngineResult<Self> {
        let malformed = || EngineError::MalformedPlotRequest(text.to_string());
        let fields: Vec<&str> = text.split(',').map(str::trim).collect();
        if fields.len() < 2 || fields.len() > 3 {
            return Err(malformed());
        }
        let channel = fields[0].parse().map_err(|_| malformed())?;
        let unit = fields[1].parse().map_err(|_| malformed())?;
        let stimulus_class = match fields.get(2) {
            Some(class) => Some(class.parse().map_err(|_| malformed())?),
            None => None,
        };
        Ok(Self {
            channel,
            unit,
            stimulus_class,
        })
    }
}

/// A display unit held by the board
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlotUnit {
    pub sequence: u64,
    pub slot: usize,
    pub channel: usize,
    pub unit: usize,
    pub stimulus_classes: Vec<StimulusClass>,
}

impl PlotUnit {
    /// (column, row) of this unit's slot
    pub fn grid_cell(&self) -> (usize, usize) {
        (self.slot % GRID_COLUMNS, self.slot / GRID_COLUMNS)
    }

    pub fn title(&self) -> String {
        format!("PSTH chan-{} unit-{}", self.channel, self.unit)
    }
}

/// One class's curve within a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotTrace {
    pub stimulus_class: StimulusClass,
    pub color: Rgb,
    pub histogram: Vec<f64>,
}

/// Drawable content of one display unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotFrame {
    pub title: String,
    pub slot: usize,
    pub traces: Vec<PlotTrace>,
    /// Shared y scale across all traces
    pub y_max: f64,
}

/// Units in arrival order; sequence numbers are handed out under the same lock
#[derive(Debug, Default)]
struct PlotQueue {
    next_sequence: u64,
    units: VecDeque<PlotUnit>,
}

/// Fixed-capacity FIFO of display units
#[derive(Debug)]
pub struct PlotBoard {
    capacity: usize,
    queue: Mutex<PlotQueue>,
    data_revision: AtomicU64,
    legend_revision: AtomicU64,
}

impl Default for PlotBoard {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PLOTS)
    }
}

impl PlotBoard {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            queue: Mutex::new(PlotQueue::default()),
            data_revision: AtomicU64::new(0),
            legend_revision: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Add a unit, evicting the oldest beyond capacity
    pub fn add(&self, channel: usize, unit: usize, stimulus_classes: Vec<StimulusClass>) -> PlotUnit {
        let mut queue = self.queue.lock();
        let sequence = queue.next_sequence;
        queue.next_sequence += 1;
        let plot = PlotUnit {
            sequence,
            slot: (sequence % self.capacity as u64) as usize,
            channel,
            unit,
            stimulus_classes,
        };

        queue.units.push_back(plot.clone());
        while queue.units.len() > self.capacity {
            if let Some(evicted) = queue.units.pop_front() {
                debug!("[PLOT-BOARD] Evicted {} from slot {}", evicted.title(), evicted.slot);
            }
        }
        plot
    }

    pub fn units(&self) -> Vec<PlotUnit> {
        self.queue.lock().units.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().units.is_empty()
    }

    pub fn clear(&self) {
        self.queue.lock().units.clear();
    }

    /// Redraw requests received so far
    pub fn data_revision(&self) -> u64 {
        self.data_revision.load(Ordering::SeqCst)
    }

    pub fn legend_revision(&self) -> u64 {
        self.legend_revision.load(Ordering::SeqCst)
    }

    /// Build frames for every live unit from one engine snapshot each
    pub fn frames(&self, engine: &PsthEngine) -> Vec<PlotFrame> {
        self.units()
            .into_iter()
            .map(|plot| {
                let snapshot = engine.snapshot(plot.channel, plot.unit, &plot.stimulus_classes);
                let traces: Vec<PlotTrace> = snapshot
                    .traces
                    .into_iter()
                    .map(|trace| PlotTrace {
                        stimulus_class: trace.stimulus_class,
                        color: class_color(trace.stimulus_class),
                        histogram: trace.histogram,
                    })
                    .collect();
                let y_max = traces
                    .iter()
                    .flat_map(|t| t.histogram.iter().copied())
                    .fold(0.0_f64, f64::max);
                PlotFrame {
                    title: plot.title(),
                    slot: plot.slot,
                    traces,
                    y_max,
                }
            })
            .collect()
    }
}

impl EngineObserver for PlotBoard {
    fn on_data_changed(&self) {
        self.data_revision.fetch_add(1, Ordering::SeqCst);
    }

    fn on_legend_changed(&self) {
        self.legend_revision.fetch_add(1, Ordering::SeqCst);
    }

    fn on_plot_requested(&self, channel: usize, unit: usize, stimulus_classes: &[StimulusClass]) {
        self.add(channel, unit, stimulus_classes.to_vec());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plot_request() {
        assert_eq!(
            PlotRequest::parse("3,1").unwrap(),
            PlotRequest {
                channel: 3,
                unit: 1,
                stimulus_class: None
            }
        );
        assert_eq!(PlotRequest::parse(" 3 , 1 , 2 ").unwrap().stimulus_class, Some(2));
        assert!(PlotRequest::parse("3").is_err());
        assert!(PlotRequest::parse("a,1").is_err());
        assert!(PlotRequest::parse("1,2,3,4").is_err());
        assert!(PlotRequest::parse("1,-2").is_err());
    }

    #[test]
    fn test_board_evicts_oldest() {
        let board = PlotBoard::new(8);
        for channel in 0..10 {
            board.add(channel, 0, vec![0]);
        }
        let units = board.units();
        assert_eq!(units.len(), 8);
        assert_eq!(units.first().unwrap().channel, 2);
        assert_eq!(units.last().unwrap().channel, 9);
        // Slots wrap with the request counter
        assert_eq!(units.last().unwrap().slot, 1);
        assert_eq!(units.last().unwrap().grid_cell(), (1, 0));
    }

    #[test]
    fn test_concurrent_adds_keep_sequence_order() {
        let board = PlotBoard::new(8);
        std::thread::scope(|scope| {
            for worker in 0..4 {
                let board = &board;
                scope.spawn(move || {
                    for i in 0..250 {
                        board.add(worker, i, vec![]);
                    }
                });
            }
        });

        let units = board.units();
        assert_eq!(units.len(), 8);
        assert_eq!(units.last().unwrap().sequence, 999);
        for pair in units.windows(2) {
            assert_eq!(pair[1].sequence, pair[0].sequence + 1);
        }
        for unit in &units {
            assert_eq!(unit.slot, (unit.sequence % 8) as usize);
        }
    }

    #[test]
    fn test_grid_cell() {
        let board = PlotBoard::new(8);
        let mut last = None;
        for _ in 0..6 {
            last = Some(board.add(0, 0, vec![]));
        }
        assert_eq!(last.unwrap().grid_cell(), (1, 1));
    }

    #[test]
    fn test_palette_cycles() {
        assert_eq!(class_color(0), class_color(10));
        assert_ne!(class_color(0), class_color(1));
    }
}
