//! Common utilities for thermoscope integration tests.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use thermoscope::timeline::{AttrMap, AttrValue, CommandedState};
use thermoscope::TimeSeries;

/// Parameters for synthetic telemetry generation.
#[derive(Debug, Clone)]
pub struct SyntheticTelemetryConfig {
    pub start: f64,
    pub cadence_s: f64,
    pub samples: usize,
    pub noise_std: f64,
    pub seed: u64,
}

impl Default for SyntheticTelemetryConfig {
    fn default() -> Self {
        Self {
            start: 0.0,
            cadence_s: 300.0,
            samples: 500,
            noise_std: 0.2,
            seed: 42,
        }
    }
}

/// Generates telemetry tracking `truth` with uniform noise.
///
/// NOTE: This is not meant to be a realistic telemetry stream. It only
/// exists to give the validation engine observations that deviate from the
/// model by a bounded, reproducible amount.
pub fn synthetic_telemetry<F>(config: &SyntheticTelemetryConfig, truth: F) -> TimeSeries
where
    F: Fn(f64) -> f64,
{
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    TimeSeries::from_points((0..config.samples).map(|i| {
        let t = config.start + i as f64 * config.cadence_s;
        let noise = rng.gen_range(-config.noise_std..config.noise_std);
        (t, truth(t) + noise)
    }))
}

/// A fully specified seed state carrying the whole timeline schema.
pub fn full_seed_state(tstart: f64, tstop: f64, pitch: f64) -> CommandedState {
    let mut attrs = AttrMap::new();
    attrs.insert("pitch".into(), AttrValue::Float(pitch));
    attrs.insert("sim_pos".into(), AttrValue::Float(75616.0));
    attrs.insert("ccd_count".into(), AttrValue::Int(6));
    attrs.insert("fep_count".into(), AttrValue::Int(6));
    attrs.insert("vid_board".into(), AttrValue::Int(1));
    attrs.insert("clocking".into(), AttrValue::Int(1));
    attrs.insert("dh_heater".into(), AttrValue::Bool(false));
    CommandedState::new(tstart, tstop, attrs)
}
