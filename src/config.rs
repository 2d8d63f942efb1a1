//! Run and channel configuration.
//!
//! All run-wide options are explicit structs threaded through the pipeline;
//! nothing reads ambient global state. Channel behavior (limits, margins,
//! quantile levels, residual predicates) is data-driven so that adding a
//! channel is a configuration change, not a code change.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Attribute names every commanded state must carry.
pub const TIMELINE_ATTRS: [&str; 7] = [
    "pitch",
    "sim_pos",
    "ccd_count",
    "fep_count",
    "vid_board",
    "clocking",
    "dh_heater",
];

/// Modeled primary temperature channel.
pub const CH_T_PRIMARY: &str = "t_primary";
/// Modeled secondary temperature channel.
pub const CH_T_SECONDARY: &str = "t_secondary";
/// Commanded pitch channel, validated against attitude telemetry.
pub const CH_PITCH: &str = "pitch";
/// Commanded SIM translation position channel.
pub const CH_SIM_POS: &str = "sim_pos";

/// Per-channel validation and limit-checking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel name, matching both the simulator output and the telemetry
    /// channel it validates against.
    pub name: String,
    /// Planning limit for violation detection. `None` for channels that are
    /// validated but carry no safety limit (attitude, SIM position).
    pub planning_limit: Option<f64>,
    /// Margin subtracted from the planning limit to form the violation
    /// threshold.
    pub margin: f64,
    /// Residual mask floor: when set, only samples whose raw telemetry
    /// exceeds this value enter the quantile statistics.
    pub residual_floor: Option<f64>,
    /// Validation limits as (quantile level, max absolute residual) pairs.
    pub validation_limits: Vec<(u8, f64)>,
    /// Decimal places used when formatting this channel in output tables.
    pub decimals: usize,
}

/// Validation engine configuration: the quantile level set plus the channel
/// table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Quantile levels reported per channel, each in `1..=99`.
    pub quantile_levels: Vec<u8>,
    /// Channels to validate, in output order.
    pub channels: Vec<ChannelConfig>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            quantile_levels: vec![1, 5, 16, 50, 84, 95, 99],
            channels: vec![
                ChannelConfig {
                    name: CH_T_PRIMARY.to_string(),
                    planning_limit: Some(55.0),
                    margin: 2.5,
                    residual_floor: Some(30.0),
                    validation_limits: vec![(1, 2.5), (50, 1.0), (99, 5.5)],
                    decimals: 2,
                },
                ChannelConfig {
                    name: CH_T_SECONDARY.to_string(),
                    planning_limit: Some(38.0),
                    margin: 2.5,
                    residual_floor: None,
                    validation_limits: vec![(1, 5.5), (99, 5.5)],
                    decimals: 2,
                },
                ChannelConfig {
                    name: CH_PITCH.to_string(),
                    planning_limit: None,
                    margin: 0.0,
                    residual_floor: None,
                    validation_limits: vec![(1, 3.0), (99, 3.0)],
                    decimals: 3,
                },
                ChannelConfig {
                    name: CH_SIM_POS.to_string(),
                    planning_limit: None,
                    margin: 0.0,
                    residual_floor: None,
                    validation_limits: vec![(1, 2.5), (99, 2.5)],
                    decimals: 0,
                },
            ],
        }
    }
}

impl ValidationConfig {
    /// Channel configuration by name.
    pub fn channel(&self, name: &str) -> Option<&ChannelConfig> {
        self.channels.iter().find(|c| c.name == name)
    }
}

/// Optional overrides applied on top of the derived seed state.
///
/// Any field left `None` falls back to the derivation policy in
/// [`crate::seed`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedOverrides {
    /// Starting pitch, degrees.
    pub pitch: Option<f64>,
    /// Starting SIM translation position, steps.
    pub sim_pos: Option<f64>,
    /// Initial number of active CCDs.
    pub ccd_count: Option<i64>,
    /// Initial number of active FEPs.
    pub fep_count: Option<i64>,
    /// Initial video board state.
    pub vid_board: Option<i64>,
    /// Initial clocking state.
    pub clocking: Option<i64>,
    /// Initial detector housing heater state.
    pub dh_heater: Option<bool>,
    /// Starting primary temperature, degrees C.
    pub t_primary: Option<f64>,
    /// Starting secondary temperature, degrees C.
    pub t_secondary: Option<f64>,
}

impl SeedOverrides {
    /// True when every field is supplied and no derivation is needed.
    pub fn is_complete(&self) -> bool {
        self.pitch.is_some()
            && self.sim_pos.is_some()
            && self.ccd_count.is_some()
            && self.fep_count.is_some()
            && self.vid_board.is_some()
            && self.clocking.is_some()
            && self.dh_heater.is_some()
            && self.t_primary.is_some()
            && self.t_secondary.is_some()
    }
}

/// Run-wide options for one invocation of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Output directory for report artifacts.
    pub outdir: PathBuf,
    /// Path to the thermal model specification file.
    pub model_spec: PathBuf,
    /// Length of the validation telemetry window, days.
    pub days: f64,
    /// Verbosity: 0 quiet, 1 normal, 2 debug.
    pub verbose: u8,
    /// Seed-state overrides.
    pub overrides: SeedOverrides,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            outdir: PathBuf::from("out"),
            model_spec: PathBuf::from("model_spec.json"),
            days: 21.0,
            verbose: 1,
            overrides: SeedOverrides::default(),
        }
    }
}
