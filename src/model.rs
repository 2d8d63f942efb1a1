//! Built-in reference thermal model.
//!
//! A small two-node first-order lag model that implements
//! [`ThermalSimulator`], loaded from a JSON specification file. It stands in
//! for the external model library in self-contained runs and tests; the
//! trait remains the seam for swapping in the real simulator.
//!
//! Each node relaxes toward a driven equilibrium temperature with its own
//! time constant:
//!
//! ```text
//! T_eq = base + sum(gain_ch * input_ch(t)) + sum(w_node * T_node)
//! dT/dt = (T_eq - T) / tau
//! ```
//!
//! integrated with explicit Euler steps on a fixed internal grid.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::series::TimeInterval;
use crate::sim::{SimInput, SimOutput, ThermalSimulator};

/// One thermal node of the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Node name; doubles as its output channel name and the name of the
    /// input supplying its initial temperature.
    pub name: String,
    /// Relaxation time constant, seconds.
    pub tau_s: f64,
    /// Equilibrium base temperature with all drives at zero, degrees C.
    pub base_c: f64,
    /// Gains applied to named input channels, degrees C per input unit.
    #[serde(default)]
    pub gains: BTreeMap<String, f64>,
    /// Couplings toward other nodes' current temperatures, dimensionless
    /// weights.
    #[serde(default)]
    pub couplings: BTreeMap<String, f64>,
}

/// Model specification loaded from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Model name for logs and run headers.
    pub name: String,
    /// Internal integration step, seconds.
    pub dt_s: f64,
    /// Thermal nodes, integrated in order.
    pub nodes: Vec<NodeSpec>,
    /// Input channels echoed onto the output grid for validation against
    /// telemetry.
    #[serde(default)]
    pub echo: Vec<String>,
    /// Known bad intervals excluded from validation statistics.
    #[serde(default)]
    pub bad_times: Vec<TimeInterval>,
}

impl ModelSpec {
    /// Loads a model specification file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let spec: ModelSpec = serde_json::from_str(&raw).map_err(|e| Error::Malformed {
            what: format!("model spec {}", path.display()),
            detail: e.to_string(),
        })?;
        if spec.dt_s <= 0.0 {
            return Err(Error::Malformed {
                what: format!("model spec {}", path.display()),
                detail: format!("dt_s must be positive, got {}", spec.dt_s),
            });
        }
        Ok(spec)
    }
}

/// Reference model instance. Single-use, like every [`ThermalSimulator`].
pub struct ReferenceModel {
    spec: ModelSpec,
}

impl ReferenceModel {
    /// Creates an instance from a parsed specification.
    pub fn new(spec: ModelSpec) -> Self {
        Self { spec }
    }

    /// Convenience constructor loading the specification from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self::new(ModelSpec::from_file(path)?))
    }
}

impl ThermalSimulator for ReferenceModel {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn run(self: Box<Self>, start: f64, stop: f64, inputs: &[SimInput]) -> Result<SimOutput> {
        let spec = &self.spec;
        let lookup = |name: &str| inputs.iter().find(|i| i.name == name);
        let input_at = |name: &str, t: f64| -> Result<f64> {
            lookup(name)
                .and_then(|i| i.series.value_at_or_before(t))
                .ok_or_else(|| Error::SimulationConfig {
                    channel: name.to_string(),
                    start,
                    stop,
                })
        };

        // Simulator-chosen grid: fixed steps with the final point clamped
        // to the stop time.
        let mut times = Vec::new();
        let mut t = start;
        loop {
            times.push(t);
            if t >= stop {
                break;
            }
            t = (t + spec.dt_s).min(stop);
        }

        let mut temps: Vec<f64> = spec
            .nodes
            .iter()
            .map(|n| input_at(&n.name, start))
            .collect::<Result<_>>()?;
        let mut series: Vec<Vec<f64>> = vec![Vec::with_capacity(times.len()); spec.nodes.len()];

        for (k, &tk) in times.iter().enumerate() {
            if k > 0 {
                let dt = tk - times[k - 1];
                let previous = temps.clone();
                for (j, node) in spec.nodes.iter().enumerate() {
                    let mut t_eq = node.base_c;
                    for (channel, gain) in &node.gains {
                        t_eq += gain * input_at(channel, tk)?;
                    }
                    for (other, weight) in &node.couplings {
                        let idx = spec
                            .nodes
                            .iter()
                            .position(|n| &n.name == other)
                            .ok_or_else(|| Error::Malformed {
                                what: format!("model spec {}", spec.name),
                                detail: format!("unknown coupling target '{other}'"),
                            })?;
                        t_eq += weight * previous[idx];
                    }
                    temps[j] += dt * (t_eq - temps[j]) / node.tau_s;
                }
            }
            for (j, value) in temps.iter().enumerate() {
                series[j].push(*value);
            }
        }

        let mut channels = BTreeMap::new();
        for (node, values) in spec.nodes.iter().zip(series) {
            channels.insert(node.name.clone(), values);
        }
        for name in &spec.echo {
            let echo_series = lookup(name).map(|i| &i.series).ok_or_else(|| {
                Error::SimulationConfig {
                    channel: name.clone(),
                    start,
                    stop,
                }
            })?;
            let values = times
                .iter()
                .map(|&t| {
                    echo_series
                        .value_at_or_before(t)
                        .ok_or_else(|| Error::SimulationConfig {
                            channel: name.clone(),
                            start,
                            stop,
                        })
                })
                .collect::<Result<Vec<f64>>>()?;
            channels.insert(name.clone(), values);
        }

        Ok(SimOutput {
            times,
            channels,
            bad_times: spec.bad_times.clone(),
        })
    }
}

/// A minimal two-node specification used by tests and demos.
pub fn demo_spec() -> ModelSpec {
    let mut primary_gains = BTreeMap::new();
    primary_gains.insert("pitch".to_string(), -0.08);
    primary_gains.insert("ccd_count".to_string(), 2.0);
    primary_gains.insert("fep_count".to_string(), 0.5);
    primary_gains.insert("clocking".to_string(), 1.0);
    primary_gains.insert("dh_heater".to_string(), 1.5);

    let mut secondary_couplings = BTreeMap::new();
    secondary_couplings.insert("t_primary".to_string(), 0.8);

    ModelSpec {
        name: "demo-two-node".to_string(),
        dt_s: 328.0,
        nodes: vec![
            NodeSpec {
                name: "t_primary".to_string(),
                tau_s: 20_000.0,
                base_c: 30.0,
                gains: primary_gains,
                couplings: BTreeMap::new(),
            },
            NodeSpec {
                name: "t_secondary".to_string(),
                tau_s: 40_000.0,
                base_c: 2.0,
                gains: BTreeMap::new(),
                couplings: secondary_couplings,
            },
        ],
        echo: vec!["pitch".to_string(), "sim_pos".to_string()],
        bad_times: vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::TimeSeries;
    use approx::assert_relative_eq;

    fn constant_input(name: &str, value: f64) -> SimInput {
        SimInput {
            name: name.to_string(),
            series: TimeSeries::from_points([(0.0, value)]),
        }
    }

    fn single_node_spec(tau_s: f64, base_c: f64) -> ModelSpec {
        ModelSpec {
            name: "single".to_string(),
            dt_s: 100.0,
            nodes: vec![NodeSpec {
                name: "t_primary".to_string(),
                tau_s,
                base_c,
                gains: BTreeMap::new(),
                couplings: BTreeMap::new(),
            }],
            echo: vec![],
            bad_times: vec![],
        }
    }

    #[test]
    fn test_grid_covers_window_and_ends_at_stop() {
        let model = Box::new(ReferenceModel::new(single_node_spec(10_000.0, 25.0)));
        let out = model
            .run(0.0, 950.0, &[constant_input("t_primary", 25.0)])
            .unwrap();
        assert_eq!(out.times.first(), Some(&0.0));
        assert_eq!(out.times.last(), Some(&950.0));
        assert!(out.times.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_equilibrium_is_fixed_point() {
        let model = Box::new(ReferenceModel::new(single_node_spec(5000.0, 25.0)));
        let out = model
            .run(0.0, 50_000.0, &[constant_input("t_primary", 25.0)])
            .unwrap();
        for &v in &out.channels["t_primary"] {
            assert_relative_eq!(v, 25.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_relaxation_toward_equilibrium() {
        let model = Box::new(ReferenceModel::new(single_node_spec(5000.0, 25.0)));
        let out = model
            .run(0.0, 50_000.0, &[constant_input("t_primary", 45.0)])
            .unwrap();
        let values = &out.channels["t_primary"];
        assert_relative_eq!(values[0], 45.0, epsilon = 1e-12);
        // Monotonic decay toward the 25 C equilibrium, most of the way
        // there after ten time constants.
        assert!(values.windows(2).all(|w| w[1] <= w[0]));
        assert!((values.last().unwrap() - 25.0).abs() < 0.1);
    }

    #[test]
    fn test_gain_shifts_equilibrium() {
        let mut spec = single_node_spec(2000.0, 30.0);
        spec.nodes[0]
            .gains
            .insert("pitch".to_string(), -0.1);
        let model = Box::new(ReferenceModel::new(spec));
        let out = model
            .run(
                0.0,
                40_000.0,
                &[
                    constant_input("t_primary", 20.0),
                    constant_input("pitch", 100.0),
                ],
            )
            .unwrap();
        // Equilibrium is 30 - 0.1 * 100 = 20, which matches the start.
        for &v in &out.channels["t_primary"] {
            assert_relative_eq!(v, 20.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_echo_channels_follow_inputs() {
        let mut spec = single_node_spec(2000.0, 25.0);
        spec.echo = vec!["pitch".to_string()];
        let model = Box::new(ReferenceModel::new(spec));
        let pitch = SimInput {
            name: "pitch".to_string(),
            series: TimeSeries::from_points([(0.0, 150.0), (500.0, 90.0)]),
        };
        let out = model
            .run(0.0, 1000.0, &[constant_input("t_primary", 25.0), pitch])
            .unwrap();
        let echoed = &out.channels["pitch"];
        assert_eq!(echoed[0], 150.0);
        assert_eq!(*echoed.last().unwrap(), 90.0);
    }

    #[test]
    fn test_missing_initial_temperature_fails() {
        let model = Box::new(ReferenceModel::new(single_node_spec(2000.0, 25.0)));
        let err = model.run(0.0, 1000.0, &[]).unwrap_err();
        assert!(matches!(err, Error::SimulationConfig { .. }));
    }

    #[test]
    fn test_two_node_coupling() {
        let model = Box::new(ReferenceModel::new(demo_spec()));
        let inputs = vec![
            constant_input("t_primary", 35.0),
            constant_input("t_secondary", 25.0),
            constant_input("pitch", 150.0),
            constant_input("sim_pos", 75616.0),
            constant_input("ccd_count", 6.0),
            constant_input("fep_count", 6.0),
            constant_input("vid_board", 1.0),
            constant_input("clocking", 1.0),
            constant_input("dh_heater", 0.0),
        ];
        let out = model.run(0.0, 200_000.0, &inputs).unwrap();
        let primary = &out.channels["t_primary"];
        let secondary = &out.channels["t_secondary"];
        // Primary equilibrium: 30 - 0.08*150 + 2*6 + 0.5*6 + 1 = 34.
        assert_relative_eq!(*primary.last().unwrap(), 34.0, epsilon = 0.05);
        // Secondary equilibrium: 2 + 0.8 * 34 = 29.2.
        assert_relative_eq!(*secondary.last().unwrap(), 29.2, epsilon = 0.1);
        assert!(out.channels.contains_key("pitch"));
    }
}
