//! Simulation driving.
//!
//! The thermal simulator itself is opaque: the pipeline only depends on the
//! [`ThermalSimulator`] trait, which takes named step-function inputs over a
//! run window and returns output series on a grid of the simulator's own
//! choosing. The driver binds a commanded-state timeline and initial
//! conditions onto those inputs, checks coverage, and screens the output
//! for divergence.

use std::collections::BTreeMap;

use log::{debug, info};

use crate::config::{CH_T_PRIMARY, CH_T_SECONDARY, TIMELINE_ATTRS};
use crate::error::{Error, Result};
use crate::series::{TimeInterval, TimeSeries};
use crate::timeline::StateTimeline;

/// One named simulator input with step-function semantics: the value at any
/// grid point is the latest sample at or before it.
#[derive(Debug, Clone)]
pub struct SimInput {
    /// Input channel name.
    pub name: String,
    /// Input data.
    pub series: TimeSeries,
}

/// Raw simulator output on the simulator-chosen grid.
#[derive(Debug, Clone)]
pub struct SimOutput {
    /// Output grid, strictly increasing.
    pub times: Vec<f64>,
    /// Output values per channel, aligned with `times`.
    pub channels: BTreeMap<String, Vec<f64>>,
    /// Known bad intervals declared by the model specification.
    pub bad_times: Vec<TimeInterval>,
}

/// Contract for the opaque thermal simulator.
///
/// A simulator instance is single-use: `run` consumes it, so state cannot
/// leak between a validation run and a forecast run.
pub trait ThermalSimulator {
    /// Human-readable model name, used in logs and run headers.
    fn name(&self) -> &str;

    /// Runs the model over `[start, stop]` driven by `inputs`.
    fn run(self: Box<Self>, start: f64, stop: f64, inputs: &[SimInput]) -> Result<SimOutput>;
}

/// Dense predicted series per channel plus the bad-time intervals excluded
/// from validation.
#[derive(Debug, Clone)]
pub struct PredictionResult {
    /// The simulator-chosen output grid.
    pub times: Vec<f64>,
    /// Predicted series per channel, all sharing the output grid.
    pub channels: BTreeMap<String, TimeSeries>,
    /// Intervals excluded from validation statistics.
    pub bad_times: Vec<TimeInterval>,
}

impl PredictionResult {
    /// Predicted series for one channel.
    pub fn channel(&self, name: &str) -> Option<&TimeSeries> {
        self.channels.get(name)
    }
}

/// Initial conditions supplied alongside the commanded-state timeline.
#[derive(Debug, Clone)]
pub struct InitialConditions {
    /// Starting primary temperature, degrees C.
    pub t_primary: f64,
    /// Starting secondary temperature, degrees C.
    pub t_secondary: f64,
    /// Externally maintained heater on/off history. When present it drives
    /// the heater input instead of the commanded-state attribute.
    pub heater_history: Option<TimeSeries>,
}

/// Runs one simulation over `timeline` and screens the result.
///
/// Each timeline attribute becomes an input with two boundary samples per
/// state; initial temperatures become single-sample inputs at `start`.
/// Fails with [`Error::SimulationConfig`] if any input cannot supply a
/// value at `start`, and with [`Error::SimulationDivergence`] if the
/// simulator reports a non-finite output anywhere.
pub fn run_prediction(
    simulator: Box<dyn ThermalSimulator>,
    timeline: &StateTimeline,
    start: f64,
    stop: f64,
    init: &InitialConditions,
) -> Result<PredictionResult> {
    if start >= stop {
        return Err(Error::InvalidWindow { start, stop });
    }

    info!(
        "running thermal model '{}' over [{start:.1}, {stop:.1}) with {} states",
        simulator.name(),
        timeline.len()
    );
    let inputs = bind_inputs(timeline, start, stop, init)?;
    let output = simulator.run(start, stop, &inputs)?;
    screen_output(&output)?;

    let channels = output
        .channels
        .into_iter()
        .map(|(name, values)| {
            let series = TimeSeries::from_points(output.times.iter().copied().zip(values));
            (name, series)
        })
        .collect();
    Ok(PredictionResult {
        times: output.times,
        channels,
        bad_times: output.bad_times,
    })
}

fn bind_inputs(
    timeline: &StateTimeline,
    start: f64,
    stop: f64,
    init: &InitialConditions,
) -> Result<Vec<SimInput>> {
    let mut inputs = Vec::new();

    for attribute in TIMELINE_ATTRS {
        if attribute == "dh_heater" && init.heater_history.is_some() {
            continue;
        }
        let series = timeline.attribute_series(attribute).ok_or_else(|| {
            Error::SimulationConfig {
                channel: attribute.to_string(),
                start,
                stop,
            }
        })?;
        inputs.push(SimInput {
            name: attribute.to_string(),
            series,
        });
    }
    if let Some(heater) = &init.heater_history {
        inputs.push(SimInput {
            name: "dh_heater".to_string(),
            series: heater.clone(),
        });
    }
    inputs.push(SimInput {
        name: CH_T_PRIMARY.to_string(),
        series: TimeSeries::from_points([(start, init.t_primary)]),
    });
    inputs.push(SimInput {
        name: CH_T_SECONDARY.to_string(),
        series: TimeSeries::from_points([(start, init.t_secondary)]),
    });

    for input in &inputs {
        if input.series.value_at_or_before(start).is_none() {
            return Err(Error::SimulationConfig {
                channel: input.name.clone(),
                start,
                stop,
            });
        }
        debug!(
            "bound simulator input '{}' with {} samples",
            input.name,
            input.series.len()
        );
    }
    Ok(inputs)
}

fn screen_output(output: &SimOutput) -> Result<()> {
    for (name, values) in &output.channels {
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(Error::SimulationDivergence {
                channel: name.clone(),
                time: output.times.get(i).copied().unwrap_or(f64::NAN),
            });
        }
    }
    Ok(())
}
