//! Commanded-state timeline construction.
//!
//! A `StateTimeline` is the contiguous sequence of commanded states that
//! drives a thermal simulation. It is built once per run by merging an
//! initial seed state with historical and planned command streams, and is
//! never mutated afterward apart from the terminal boundary clamp applied
//! during construction.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::series::TimeSeries;

/// Value of a commanded attribute.
///
/// Deserialization is untagged, so JSON `true`, `6`, and `150.0` map to the
/// expected variants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// Boolean flag, for example a heater on/off state.
    Bool(bool),
    /// Integer count, for example the number of active CCDs.
    Int(i64),
    /// Scalar, for example pitch in degrees.
    Float(f64),
}

impl AttrValue {
    /// Numeric form used when binding attributes onto simulator inputs.
    /// Booleans map to 0.0/1.0.
    pub fn as_f64(&self) -> f64 {
        match self {
            AttrValue::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            AttrValue::Int(i) => *i as f64,
            AttrValue::Float(f) => *f,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(b) => write!(f, "{}", *b as u8),
            AttrValue::Int(i) => write!(f, "{i}"),
            AttrValue::Float(v) => write!(f, "{v:.3}"),
        }
    }
}

/// Attribute snapshot keyed by attribute name.
///
/// A `BTreeMap` keeps attribute iteration deterministic, which keeps output
/// tables diffable across runs.
pub type AttrMap = BTreeMap<String, AttrValue>;

/// A timestamped command carrying only the attributes it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Execution time in seconds.
    pub time: f64,
    /// Attribute delta applied at `time`.
    #[serde(rename = "set")]
    pub deltas: AttrMap,
}

impl Command {
    /// Convenience constructor for a single-attribute command.
    pub fn set(time: f64, attribute: &str, value: AttrValue) -> Self {
        let mut deltas = AttrMap::new();
        deltas.insert(attribute.to_string(), value);
        Self { time, deltas }
    }
}

/// An interval `[tstart, tstop)` over which all commanded attributes are
/// constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandedState {
    /// Inclusive interval start, seconds.
    pub tstart: f64,
    /// Exclusive interval stop, seconds.
    pub tstop: f64,
    /// Attribute values held over the interval.
    pub attrs: AttrMap,
}

impl CommandedState {
    /// Creates a state. Panics if `tstop <= tstart`.
    pub fn new(tstart: f64, tstop: f64, attrs: AttrMap) -> Self {
        assert!(tstop > tstart, "CommandedState tstop must be after tstart");
        Self {
            tstart,
            tstop,
            attrs,
        }
    }

    /// Attribute value by name.
    pub fn attr(&self, name: &str) -> Option<AttrValue> {
        self.attrs.get(name).copied()
    }
}

/// Ordered, contiguous, schema-homogeneous sequence of commanded states.
#[derive(Debug, Clone, PartialEq)]
pub struct StateTimeline {
    states: Vec<CommandedState>,
}

impl StateTimeline {
    /// The commanded states in time order.
    pub fn states(&self) -> &[CommandedState] {
        &self.states
    }

    /// Number of states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// True if the timeline holds no states. Never true for a timeline
    /// produced by [`TimelineBuilder::build`].
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Start of the covered interval.
    pub fn start(&self) -> f64 {
        self.states.first().map(|s| s.tstart).unwrap_or(0.0)
    }

    /// End of the covered interval.
    pub fn end(&self) -> f64 {
        self.states.last().map(|s| s.tstop).unwrap_or(0.0)
    }

    /// True if consecutive states share boundaries with no gaps or overlaps.
    pub fn is_contiguous(&self) -> bool {
        self.states
            .windows(2)
            .all(|w| w[0].tstop == w[1].tstart)
    }

    /// Extracts one attribute as a step-function series with two boundary
    /// samples per state.
    ///
    /// At a shared boundary the opening state's value wins, matching the
    /// half-open `[tstart, tstop)` state semantics. This is the form bound
    /// onto simulator inputs.
    pub fn attribute_series(&self, name: &str) -> Option<TimeSeries> {
        let mut out = TimeSeries::with_capacity(self.states.len() * 2);
        for state in &self.states {
            let value = state.attr(name)?.as_f64();
            out.push(state.tstart, value);
            out.push(state.tstop, value);
        }
        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }
}

/// Builds a [`StateTimeline`] from a seed state plus merged command streams.
///
/// The builder is configured once with the attribute schema the timeline
/// must carry; [`TimelineBuilder::build`] can then be called per run.
#[derive(Debug, Clone)]
pub struct TimelineBuilder {
    required: Vec<String>,
    forecast: bool,
}

impl TimelineBuilder {
    /// Creates a builder requiring the given attributes in every state.
    pub fn new<I, S>(required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required: required.into_iter().map(Into::into).collect(),
            forecast: false,
        }
    }

    /// Requires a non-empty planned command stream (forecast mode).
    pub fn forecast(mut self) -> Self {
        self.forecast = true;
        self
    }

    /// Merges command streams and applies them onto the seed state.
    ///
    /// Commands outside `[seed.tstop, timeline_end)` are discarded, as is
    /// any historical command at or after the first planned command time:
    /// from that point on the planned stream is the source of truth. The
    /// final state's stop is force-clamped to `timeline_end`.
    pub fn build(
        &self,
        seed: &CommandedState,
        historical: &[Command],
        planned: &[Command],
        timeline_end: f64,
    ) -> Result<StateTimeline> {
        if self.forecast && planned.is_empty() {
            return Err(Error::EmptyCommandTimeline);
        }
        if timeline_end <= seed.tstart {
            return Err(Error::InvalidWindow {
                start: seed.tstart,
                stop: timeline_end,
            });
        }

        let merged = merge_commands(seed.tstop, historical, planned, timeline_end);
        let snapshot = self.seed_snapshot(seed, &merged, timeline_end)?;
        Ok(apply_commands(seed.tstart, snapshot, &merged, timeline_end))
    }

    /// Resolves the initial attribute snapshot, backfilling any required
    /// attribute the seed lacks from the first in-range command that sets
    /// it. Backfilling keeps the attribute schema identical across all
    /// states.
    fn seed_snapshot(
        &self,
        seed: &CommandedState,
        merged: &[Command],
        timeline_end: f64,
    ) -> Result<AttrMap> {
        let mut snapshot = seed.attrs.clone();
        for attribute in &self.required {
            if snapshot.contains_key(attribute) {
                continue;
            }
            match merged.iter().find_map(|c| c.deltas.get(attribute)) {
                Some(value) => {
                    snapshot.insert(attribute.clone(), *value);
                }
                None => {
                    return Err(Error::InsufficientSeed {
                        attribute: attribute.clone(),
                        until: timeline_end,
                    })
                }
            }
        }
        Ok(snapshot)
    }
}

/// Merges the two command streams into one time-ordered stream.
///
/// Historical commands at or after the first planned command are dropped;
/// the planned load supersedes the as-flown history from its own start.
fn merge_commands(
    window_start: f64,
    historical: &[Command],
    planned: &[Command],
    timeline_end: f64,
) -> Vec<Command> {
    let in_window = |c: &&Command| c.time >= window_start && c.time < timeline_end;
    let planned_start = planned.iter().find(|c| in_window(c)).map(|c| c.time);

    let mut merged: Vec<Command> = historical
        .iter()
        .filter(in_window)
        .filter(|c| planned_start.map_or(true, |t| c.time < t))
        .chain(planned.iter().filter(in_window))
        .cloned()
        .collect();
    merged.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap_or(std::cmp::Ordering::Equal));
    merged
}

/// Applies deltas sequentially onto the running snapshot. Each command
/// boundary closes the preceding state; commands sharing a timestamp
/// coalesce into one boundary.
fn apply_commands(
    timeline_start: f64,
    mut snapshot: AttrMap,
    commands: &[Command],
    timeline_end: f64,
) -> StateTimeline {
    let mut states = Vec::with_capacity(commands.len() + 1);
    let mut current_start = timeline_start;

    for command in commands {
        if command.time > current_start {
            states.push(CommandedState::new(
                current_start,
                command.time,
                snapshot.clone(),
            ));
            current_start = command.time;
        }
        for (name, value) in &command.deltas {
            snapshot.insert(name.clone(), *value);
        }
    }

    // Terminal clamp: the last state always runs to the timeline end.
    states.push(CommandedState::new(current_start, timeline_end, snapshot));
    StateTimeline { states }
}
