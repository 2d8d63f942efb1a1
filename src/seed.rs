//! Seed-state resolution for forecast runs.
//!
//! When the run is not fully specified by explicit overrides, the initial
//! state is derived from command history and telemetry using a legacy
//! empirical policy. The policy constants are named and swappable here
//! rather than inlined in the pipeline.

use log::{debug, info};

use crate::config::{SeedOverrides, TIMELINE_ATTRS};
use crate::error::{Error, Result};
use crate::provider::CommandProvider;
use crate::series::TimeSeries;
use crate::timeline::{AttrValue, CommandedState};

/// Constants governing seed derivation.
///
/// These values are empirical policy carried over from operational use, not
/// physics derived from the model. In particular `floor_c` exists to satisfy
/// a simulator precondition (the active-heater state is inferred from the
/// initial temperature) and should be confirmed with a domain expert before
/// being changed.
#[derive(Debug, Clone)]
pub struct SeedPolicy {
    /// Half-width of the telemetry averaging window around the selected
    /// state's start, seconds.
    pub window_s: f64,
    /// Hard floor applied to the derived primary temperature, degrees C.
    pub floor_c: f64,
    /// How many samples back from the end of telemetry the state-selection
    /// cutoff sits.
    pub cutoff_samples_back: usize,
    /// Offset from the derived primary temperature used to seed the
    /// secondary node, degrees C.
    pub secondary_offset_c: f64,
    /// Duration of the synthetic seed interval built from explicit
    /// overrides, seconds.
    pub override_state_s: f64,
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            window_s: 700.0,
            floor_c: 15.0,
            cutoff_samples_back: 5,
            secondary_offset_c: -10.0,
            override_state_s: 30.0,
        }
    }
}

/// Fully resolved starting point for a forecast run: the seed commanded
/// state plus the initial node temperatures.
#[derive(Debug, Clone)]
pub struct InitialState {
    /// Seed commanded state carrying the full timeline attribute schema.
    pub state: CommandedState,
    /// Starting primary temperature, degrees C.
    pub t_primary: f64,
    /// Starting secondary temperature, degrees C.
    pub t_secondary: f64,
}

/// Resolves the seed state for a forecast starting at `run_start`.
///
/// With complete overrides the seed is built directly from them. Otherwise
/// the most recent commanded state starting before the telemetry cutoff is
/// selected, any override fields are applied on top, and unresolved
/// temperatures come from the mean of `primary_telemetry` in a symmetric
/// window around that state's start. The primary temperature is clamped to
/// `policy.floor_c` in all cases.
pub fn resolve_seed(
    overrides: &SeedOverrides,
    run_start: f64,
    commands: &dyn CommandProvider,
    primary_telemetry: &TimeSeries,
    policy: &SeedPolicy,
) -> Result<InitialState> {
    let mut initial = if overrides.is_complete() {
        seed_from_overrides(overrides, run_start, policy)
    } else {
        derive_seed(overrides, commands, primary_telemetry, policy)?
    };

    if initial.t_primary < policy.floor_c {
        info!(
            "clamping seed primary temperature {:.2} to floor {:.1}",
            initial.t_primary, policy.floor_c
        );
        initial.t_primary = policy.floor_c;
    }
    debug!(
        "seed state at {:.1}: t_primary={:.2} t_secondary={:.2}",
        initial.state.tstart, initial.t_primary, initial.t_secondary
    );
    Ok(initial)
}

fn seed_from_overrides(
    overrides: &SeedOverrides,
    run_start: f64,
    policy: &SeedPolicy,
) -> InitialState {
    let mut attrs = crate::timeline::AttrMap::new();
    attrs.insert("pitch".into(), AttrValue::Float(overrides.pitch.unwrap()));
    attrs.insert("sim_pos".into(), AttrValue::Float(overrides.sim_pos.unwrap()));
    attrs.insert("ccd_count".into(), AttrValue::Int(overrides.ccd_count.unwrap()));
    attrs.insert("fep_count".into(), AttrValue::Int(overrides.fep_count.unwrap()));
    attrs.insert("vid_board".into(), AttrValue::Int(overrides.vid_board.unwrap()));
    attrs.insert("clocking".into(), AttrValue::Int(overrides.clocking.unwrap()));
    attrs.insert("dh_heater".into(), AttrValue::Bool(overrides.dh_heater.unwrap()));
    InitialState {
        state: CommandedState::new(run_start - policy.override_state_s, run_start, attrs),
        t_primary: overrides.t_primary.unwrap(),
        t_secondary: overrides.t_secondary.unwrap(),
    }
}

fn derive_seed(
    overrides: &SeedOverrides,
    commands: &dyn CommandProvider,
    primary_telemetry: &TimeSeries,
    policy: &SeedPolicy,
) -> Result<InitialState> {
    let n = primary_telemetry.len();
    if n <= policy.cutoff_samples_back {
        return Err(Error::DataUnavailable(format!(
            "need more than {} telemetry samples to derive a seed state, have {n}",
            policy.cutoff_samples_back
        )));
    }
    let cutoff = primary_telemetry.times()[n - policy.cutoff_samples_back];
    let mut state = commands.state_at(cutoff)?;

    apply_overrides(&mut state, overrides);
    for attribute in TIMELINE_ATTRS {
        if !state.attrs.contains_key(attribute) {
            return Err(Error::InsufficientSeed {
                attribute: attribute.to_string(),
                until: cutoff,
            });
        }
    }

    let t_primary = match overrides.t_primary {
        Some(t) => t,
        None => primary_telemetry
            .mean_in_window(state.tstart, policy.window_s)
            .ok_or_else(|| Error::InsufficientSeed {
                attribute: "t_primary".to_string(),
                until: state.tstart + policy.window_s,
            })?,
    };
    let t_secondary = overrides
        .t_secondary
        .unwrap_or(t_primary + policy.secondary_offset_c);

    Ok(InitialState {
        state,
        t_primary,
        t_secondary,
    })
}

fn apply_overrides(state: &mut CommandedState, overrides: &SeedOverrides) {
    let mut set = |name: &str, value: Option<AttrValue>| {
        if let Some(v) = value {
            state.attrs.insert(name.to_string(), v);
        }
    };
    set("pitch", overrides.pitch.map(AttrValue::Float));
    set("sim_pos", overrides.sim_pos.map(AttrValue::Float));
    set("ccd_count", overrides.ccd_count.map(AttrValue::Int));
    set("fep_count", overrides.fep_count.map(AttrValue::Int));
    set("vid_board", overrides.vid_board.map(AttrValue::Int));
    set("clocking", overrides.clocking.map(AttrValue::Int));
    set("dh_heater", overrides.dh_heater.map(AttrValue::Bool));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::JsonCommandLog;
    use crate::timeline::{AttrMap, Command};
    use approx::assert_relative_eq;

    fn full_state(tstart: f64, tstop: f64, pitch: f64) -> CommandedState {
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

    fn provider() -> JsonCommandLog {
        JsonCommandLog::from_parts(
            full_state(0.0, 500.0, 150.0),
            vec![Command::set(10_000.0, "pitch", AttrValue::Float(90.0))],
        )
        .unwrap()
    }

    fn telemetry(n: usize, value: f64) -> TimeSeries {
        TimeSeries::from_points((0..n).map(|i| (i as f64 * 300.0, value)))
    }

    fn complete_overrides() -> SeedOverrides {
        SeedOverrides {
            pitch: Some(150.0),
            sim_pos: Some(75616.0),
            ccd_count: Some(6),
            fep_count: Some(6),
            vid_board: Some(1),
            clocking: Some(1),
            dh_heater: Some(false),
            t_primary: Some(35.0),
            t_secondary: Some(25.0),
        }
    }

    #[test]
    fn test_complete_overrides_skip_derivation() {
        let seed = resolve_seed(
            &complete_overrides(),
            100_000.0,
            &provider(),
            &TimeSeries::new(),
            &SeedPolicy::default(),
        )
        .unwrap();
        assert_eq!(seed.state.tstart, 100_000.0 - 30.0);
        assert_eq!(seed.state.tstop, 100_000.0);
        assert_eq!(seed.t_primary, 35.0);
        assert_eq!(seed.t_secondary, 25.0);
    }

    #[test]
    fn test_derived_seed_uses_window_mean() {
        let tlm = telemetry(400, 42.0);
        let seed = resolve_seed(
            &SeedOverrides::default(),
            200_000.0,
            &provider(),
            &tlm,
            &SeedPolicy::default(),
        )
        .unwrap();
        assert_relative_eq!(seed.t_primary, 42.0, epsilon = 1e-12);
        assert_relative_eq!(seed.t_secondary, 32.0, epsilon = 1e-12);
        // The selected state starts at the last command before the cutoff.
        assert_eq!(seed.state.tstart, 10_000.0);
        assert_eq!(seed.state.attr("pitch"), Some(AttrValue::Float(90.0)));
    }

    #[test]
    fn test_partial_overrides_layer_on_derived_state() {
        let tlm = telemetry(400, 42.0);
        let overrides = SeedOverrides {
            pitch: Some(110.0),
            t_primary: Some(50.0),
            ..SeedOverrides::default()
        };
        let seed = resolve_seed(
            &overrides,
            200_000.0,
            &provider(),
            &tlm,
            &SeedPolicy::default(),
        )
        .unwrap();
        assert_eq!(seed.state.attr("pitch"), Some(AttrValue::Float(110.0)));
        assert_eq!(seed.t_primary, 50.0);
        // Unspecified secondary still derives from the window mean.
        assert_relative_eq!(seed.t_secondary, 32.0, epsilon = 1e-12);
    }

    #[test]
    fn test_floor_clamp_applies() {
        let tlm = telemetry(400, 5.0);
        let seed = resolve_seed(
            &SeedOverrides::default(),
            200_000.0,
            &provider(),
            &tlm,
            &SeedPolicy::default(),
        )
        .unwrap();
        assert_eq!(seed.t_primary, 15.0);
        // The secondary derives from the unclamped mean.
        assert_relative_eq!(seed.t_secondary, -5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_floor_clamp_applies_to_explicit_override_too() {
        let seed = resolve_seed(
            &SeedOverrides {
                t_primary: Some(3.0),
                ..complete_overrides()
            },
            100_000.0,
            &provider(),
            &TimeSeries::new(),
            &SeedPolicy::default(),
        )
        .unwrap();
        assert_eq!(seed.t_primary, 15.0);
    }

    #[test]
    fn test_insufficient_telemetry_fails() {
        let tlm = telemetry(5, 42.0);
        let err = resolve_seed(
            &SeedOverrides::default(),
            200_000.0,
            &provider(),
            &tlm,
            &SeedPolicy::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::DataUnavailable(_)));
    }
}
