// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Concurrent producers against one engine.
//!
//! Every spike batch covers all channels in the same bin, so at any instant
//! all channels must hold identical histograms. A torn normalization pass or
//! a torn batch would show up as channels disagreeing.

use psth::engine::HistogramKey;
use psth::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const CHANNELS: usize = 16;
const TRIALS: u64 = 200;

fn all_channels(engine: &PsthEngine) -> Vec<Vec<f64>> {
    engine.with_state(|state| {
        (0..CHANNELS)
            .map(|channel| state.tensor().histogram(&HistogramKey::new(channel, 0, 0)))
            .collect()
    })
}

fn assert_uniform(histograms: &[Vec<f64>]) {
    for histogram in histograms {
        assert_eq!(histogram, &histograms[0], "channels diverged");
        assert!(histogram.iter().all(|v| v.is_finite() && *v >= 0.0));
    }
}

#[test]
fn test_spikes_and_trial_messages_never_tear() {
    let engine = Arc::new(PsthEngine::new(BinningConfig::new(20, 10).unwrap()));
    engine
        .handle_message("AddCondition,Stim,0,1,0,G,s1")
        .unwrap();
    let done = AtomicBool::new(false);

    let batch: Vec<SpikeEvent> = (0..CHANNELS).map(|c| SpikeEvent::new(c, 0, 5)).collect();

    thread::scope(|scope| {
        scope.spawn(|| {
            for _ in 0..TRIALS {
                engine.handle_message("TrialType s1").unwrap();
                engine.handle_message_at("TrialAlign", 0).unwrap();
                thread::yield_now();
                engine.handle_message("TrialEnd").unwrap();
            }
            done.store(true, Ordering::SeqCst);
        });

        scope.spawn(|| {
            while !done.load(Ordering::SeqCst) {
                let recorded = engine.record_spikes(&batch);
                assert!(recorded == 0 || recorded == CHANNELS);
            }
        });

        scope.spawn(|| {
            while !done.load(Ordering::SeqCst) {
                assert_uniform(&all_channels(&engine));
                let snapshot = engine.snapshot(0, 0, &[0]);
                assert_eq!(snapshot.traces[0].histogram.len(), 20);
            }
        });
    });

    assert_uniform(&all_channels(&engine));
    assert_eq!(engine.get_trial_count(), TRIALS);
    assert_eq!(engine.condition_trial_count(0), Some(TRIALS as u32));
    assert_eq!(engine.trial_state(), TrialState::Idle);
}

#[test]
fn test_design_changes_under_spike_load() {
    let engine = Arc::new(PsthEngine::default());
    let done = Arc::new(AtomicBool::new(false));

    let spikers: Vec<_> = (0..4)
        .map(|worker| {
            let engine = Arc::clone(&engine);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut t = 0;
                while !done.load(Ordering::SeqCst) {
                    engine.record_spike(worker, worker % 2, t % 400);
                    t += 7;
                }
            })
        })
        .collect();

    for round in 0..50 {
        engine.handle_broadcast_message("ClearDesign");
        engine.handle_broadcast_message("AddCondition,A,0,1,0,G,a");
        engine.handle_broadcast_message("AddCondition,B,1,1,0,G,b");
        engine.handle_broadcast_message(if round % 2 == 0 { "TrialType a" } else { "TrialType b" });
        engine.handle_broadcast_message_at("TrialAlign", 0);
        thread::sleep(Duration::from_micros(200));
        engine.handle_broadcast_message("TrialEnd");
        if round % 10 == 0 {
            engine.rebin(50 + round, 10).unwrap();
        }
    }

    done.store(true, Ordering::SeqCst);
    for spiker in spikers {
        spiker.join().unwrap();
    }

    let n_bins = engine.n_bins();
    for key in engine.histogram_keys() {
        assert_eq!(
            engine.get_histogram(key.channel, key.unit, key.stimulus_class).len(),
            n_bins
        );
    }
    assert_eq!(engine.num_conditions(), 2);
    let stats = engine.stats();
    assert_eq!(stats.malformed_inputs + stats.unmapped_trial_types, 0);
}

#[test]
fn test_concurrent_parameter_updates_are_not_lost() {
    for _ in 0..200 {
        let engine = PsthEngine::default();
        thread::scope(|scope| {
            scope.spawn(|| engine.apply_parameter("nbins", "37").unwrap());
            scope.spawn(|| engine.apply_parameter("binsize", "3").unwrap());
        });
        assert_eq!((engine.n_bins(), engine.bin_size()), (37, 3));
    }
}
