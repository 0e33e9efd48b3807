// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Spike tensor store
//!
//! Sparse map from (channel, unit, stimulus class) to a fixed-length bin
//! vector. Every stored vector has exactly `n_bins` entries; re-binning zeroes
//! and resizes them all instead of merging old bins.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;
use crate::error::{EngineError, EngineResult};
use crate::registry::StimulusClass;

/// Default number of bins per histogram
pub const DEFAULT_N_BINS: usize = 50;

/// Default bin width (timestamp units)
pub const DEFAULT_BIN_SIZE: Timestamp = 10;

/// Histogram addressing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HistogramKey {
    pub channel: usize,
    pub unit: usize,
    pub stimulus_class: StimulusClass,
}

impl HistogramKey {
    pub fn new(channel: usize, unit: usize, stimulus_class: StimulusClass) -> Self {
        Self {
            channel,
            unit,
            stimulus_class,
        }
    }
}

/// Bin count and width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinningConfig {
    pub n_bins: usize,
    pub bin_size: Timestamp,
}

impl Default for BinningConfig {
    fn default() -> Self {
        Self {
            n_bins: DEFAULT_N_BINS,
            bin_size: DEFAULT_BIN_SIZE,
        }
    }
}

impl BinningConfig {
    pub fn new(n_bins: usize, bin_size: Timestamp) -> EngineResult<Self> {
        let config = Self { n_bins, bin_size };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.n_bins == 0 || self.bin_size <= 0 {
            return Err(EngineError::InvalidBinning {
                n_bins: self.n_bins,
                bin_size: self.bin_size,
            });
        }
        Ok(())
    }

    /// Bin for an offset from trial alignment; `None` outside the window
    pub fn bin_index(&self, offset: Timestamp) -> Option<usize> {
        if offset < 0 {
            return None;
        }
        let bin = (offset / self.bin_size) as usize;
        (bin < self.n_bins).then_some(bin)
    }

    /// Window length covered by all bins, saturating at `Timestamp::MAX`
    pub fn window(&self) -> Timestamp {
        Timestamp::try_from(self.n_bins)
            .unwrap_or(Timestamp::MAX)
            .saturating_mul(self.bin_size)
    }
}

/// Growable (channel, unit, class, bin) counter store
#[derive(Debug, Default)]
pub struct SpikeTensor {
    binning: BinningConfig,
    counts: AHashMap<HistogramKey, Vec<f64>>,
}

impl SpikeTensor {
    pub fn new(binning: BinningConfig) -> Self {
        Self {
            binning,
            counts: AHashMap::new(),
        }
    }

    pub fn binning(&self) -> BinningConfig {
        self.binning
    }

    /// Add `amount` to one bin.
    ///
    /// Touching a (channel, unit) pair allocates zeroed vectors for every class
    /// below `max(key.stimulus_class + 1, num_conditions)`.
    pub fn add(&mut self, key: HistogramKey, bin: usize, amount: f64, num_conditions: usize) {
        if bin >= self.binning.n_bins {
            return;
        }
        let n_bins = self.binning.n_bins;
        let upper = num_conditions.max(key.stimulus_class + 1);
        for class in 0..upper {
            self.counts
                .entry(HistogramKey::new(key.channel, key.unit, class))
                .or_insert_with(|| vec![0.0; n_bins]);
        }
        if let Some(bins) = self.counts.get_mut(&key) {
            bins[bin] += amount;
        }
    }

    /// Multiply every bin of every vector belonging to `class`
    pub fn rescale_class(&mut self, class: StimulusClass, factor: f64) -> usize {
        let mut touched = 0;
        for (key, bins) in self.counts.iter_mut() {
            if key.stimulus_class == class {
                bins.iter_mut().for_each(|b| *b *= factor);
                touched += 1;
            }
        }
        touched
    }

    /// Zero every stored bin and size every vector to the current `n_bins`
    pub fn zero_and_resize(&mut self) {
        let n_bins = self.binning.n_bins;
        for bins in self.counts.values_mut() {
            bins.clear();
            bins.resize(n_bins, 0.0);
        }
    }

    /// Switch to a new binning and zero everything
    pub fn rebin(&mut self, binning: BinningConfig) {
        self.binning = binning;
        self.zero_and_resize();
    }

    /// Stored vector or a zero vector of length `n_bins`
    pub fn histogram(&self, key: &HistogramKey) -> Vec<f64> {
        self.counts
            .get(key)
            .cloned()
            .unwrap_or_else(|| vec![0.0; self.binning.n_bins])
    }

    pub fn contains(&self, key: &HistogramKey) -> bool {
        self.counts.contains_key(key)
    }

    /// Stored keys in sorted order
    pub fn keys(&self) -> Vec<HistogramKey> {
        let mut keys: Vec<_> = self.counts.keys().copied().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bin_index_window() {
        let binning = BinningConfig::new(5, 10).unwrap();
        assert_eq!(binning.bin_index(0), Some(0));
        assert_eq!(binning.bin_index(9), Some(0));
        assert_eq!(binning.bin_index(10), Some(1));
        assert_eq!(binning.bin_index(49), Some(4));
        assert_eq!(binning.bin_index(50), None);
        assert_eq!(binning.bin_index(-1), None);
        assert_eq!(binning.window(), 50);
        assert_eq!(binning.bin_index(Timestamp::MAX), None);

        let wide = BinningConfig::new(usize::MAX, Timestamp::MAX).unwrap();
        assert_eq!(wide.window(), Timestamp::MAX);
    }

    #[test]
    fn test_invalid_binning() {
        assert!(BinningConfig::new(0, 10).is_err());
        assert!(BinningConfig::new(10, 0).is_err());
        assert!(BinningConfig::new(10, -5).is_err());
    }

    #[test]
    fn test_lazy_growth_fills_lower_classes() {
        let mut tensor = SpikeTensor::new(BinningConfig::new(4, 10).unwrap());
        tensor.add(HistogramKey::new(3, 1, 2), 1, 0.5, 2);
        assert_eq!(tensor.len(), 3);
        assert!(tensor.contains(&HistogramKey::new(3, 1, 0)));
        assert!(tensor.contains(&HistogramKey::new(3, 1, 1)));
        assert_eq!(tensor.histogram(&HistogramKey::new(3, 1, 2)), vec![0.0, 0.5, 0.0, 0.0]);
        assert_eq!(tensor.histogram(&HistogramKey::new(3, 1, 0)), vec![0.0; 4]);
    }

    #[test]
    fn test_missing_histogram_is_zero() {
        let tensor = SpikeTensor::new(BinningConfig::new(7, 10).unwrap());
        assert_eq!(tensor.histogram(&HistogramKey::new(99, 99, 99)), vec![0.0; 7]);
    }

    #[test]
    fn test_rescale_only_touches_class() {
        let mut tensor = SpikeTensor::new(BinningConfig::new(2, 10).unwrap());
        tensor.add(HistogramKey::new(0, 0, 0), 0, 1.0, 2);
        tensor.add(HistogramKey::new(0, 0, 1), 0, 1.0, 2);
        assert_eq!(tensor.rescale_class(1, 0.5), 1);
        assert_eq!(tensor.histogram(&HistogramKey::new(0, 0, 0))[0], 1.0);
        assert_eq!(tensor.histogram(&HistogramKey::new(0, 0, 1))[0], 0.5);
    }

    #[test]
    fn test_rebin_zeroes_and_resizes() {
        let mut tensor = SpikeTensor::new(BinningConfig::new(3, 10).unwrap());
        tensor.add(HistogramKey::new(0, 0, 0), 2, 1.0, 1);
        tensor.add(HistogramKey::new(1, 0, 0), 0, 1.0, 1);
        tensor.rebin(BinningConfig::new(6, 5).unwrap());
        for key in tensor.keys() {
            assert_eq!(tensor.histogram(&key), vec![0.0; 6]);
        }
        assert_eq!(tensor.binning().bin_size, 5);
    }
}
