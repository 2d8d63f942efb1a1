//! Collaborator interfaces for commanded-state and telemetry data.
//!
//! The core pipeline never talks to a database directly; it consumes these
//! traits. File-backed implementations are provided so the pipeline runs
//! from archived JSON exports, and double as fixtures for testing.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::series::TimeSeries;
use crate::timeline::{Command, CommandedState};

/// Source of commanded-state history: ordered command records plus an
/// initial-state lookup by reference time.
pub trait CommandProvider {
    /// Ordered command records with execution times in `[start, stop)`.
    fn commands(&self, start: f64, stop: f64) -> Result<Vec<Command>>;

    /// The most recent commanded state whose start time precedes `time`.
    fn state_at(&self, time: f64) -> Result<CommandedState>;
}

/// Source of observed telemetry, one series per channel, already resampled
/// to a single cadence by the upstream archive.
pub trait TelemetryProvider {
    /// Fetches `days` of telemetry ending at `stop` for each channel.
    /// A missing channel is fatal.
    fn fetch(&self, channels: &[&str], stop: f64, days: f64) -> Result<BTreeMap<String, TimeSeries>>;
}

#[derive(Debug, Deserialize)]
struct CommandLogFile {
    initial_state: CommandedState,
    #[serde(default)]
    commands: Vec<Command>,
}

/// Command history loaded from a JSON export.
///
/// The file carries one fully specified initial state and the command
/// stream that follows it:
///
/// ```json
/// {
///   "initial_state": {"tstart": 0.0, "tstop": 30.0, "attrs": {"pitch": 150.0}},
///   "commands": [{"time": 1000.0, "set": {"pitch": 90.0}}]
/// }
/// ```
#[derive(Debug, Clone)]
pub struct JsonCommandLog {
    initial: CommandedState,
    commands: Vec<Command>,
}

impl JsonCommandLog {
    /// Loads and validates a command log file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let file: CommandLogFile =
            serde_json::from_str(&raw).map_err(|e| Error::Malformed {
                what: format!("command log {}", path.display()),
                detail: e.to_string(),
            })?;
        Self::from_parts(file.initial_state, file.commands)
    }

    /// Builds a provider from an in-memory initial state and command stream.
    pub fn from_parts(initial: CommandedState, mut commands: Vec<Command>) -> Result<Self> {
        commands
            .sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap_or(std::cmp::Ordering::Equal));
        if let Some(first) = commands.first() {
            if first.time < initial.tstop {
                return Err(Error::Malformed {
                    what: "command log".to_string(),
                    detail: format!(
                        "command at {:.1} precedes initial state stop {:.1}",
                        first.time, initial.tstop
                    ),
                });
            }
        }
        Ok(Self { initial, commands })
    }
}

impl CommandProvider for JsonCommandLog {
    fn commands(&self, start: f64, stop: f64) -> Result<Vec<Command>> {
        Ok(self
            .commands
            .iter()
            .filter(|c| c.time >= start && c.time < stop)
            .cloned()
            .collect())
    }

    fn state_at(&self, time: f64) -> Result<CommandedState> {
        if self.initial.tstart >= time {
            return Err(Error::DataUnavailable(format!(
                "no commanded state starts before {time:.1}"
            )));
        }

        // Replay the command stream up to the reference time.
        let mut attrs = self.initial.attrs.clone();
        let mut tstart = self.initial.tstart;
        let mut tstop = self.initial.tstop;
        for command in &self.commands {
            if command.time >= time {
                tstop = tstop.min(command.time);
                break;
            }
            for (name, value) in &command.deltas {
                attrs.insert(name.clone(), *value);
            }
            tstart = command.time;
            tstop = time;
        }
        // The state open at the reference time extends at least to it.
        Ok(CommandedState::new(tstart, tstop.max(time), attrs))
    }
}

#[derive(Debug, Deserialize)]
struct TelemetryFile {
    channels: BTreeMap<String, Vec<(f64, f64)>>,
}

/// Telemetry archive loaded from a JSON export of (time, value) pairs per
/// channel.
#[derive(Debug, Clone)]
pub struct JsonTelemetryArchive {
    channels: BTreeMap<String, TimeSeries>,
}

impl JsonTelemetryArchive {
    /// Loads a telemetry archive file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let file: TelemetryFile = serde_json::from_str(&raw).map_err(|e| Error::Malformed {
            what: format!("telemetry archive {}", path.display()),
            detail: e.to_string(),
        })?;
        Ok(Self::from_channels(
            file.channels
                .into_iter()
                .map(|(name, points)| (name, TimeSeries::from_points(points))),
        ))
    }

    /// Builds an archive from in-memory channel series.
    pub fn from_channels<I>(channels: I) -> Self
    where
        I: IntoIterator<Item = (String, TimeSeries)>,
    {
        Self {
            channels: channels.into_iter().collect(),
        }
    }
}

impl TelemetryProvider for JsonTelemetryArchive {
    fn fetch(&self, channels: &[&str], stop: f64, days: f64) -> Result<BTreeMap<String, TimeSeries>> {
        let start = stop - days * 86400.0;
        let mut out = BTreeMap::new();
        for &name in channels {
            let full = self.channels.get(name).ok_or_else(|| {
                Error::DataUnavailable(format!("telemetry channel '{name}' not in archive"))
            })?;
            let windowed = TimeSeries::from_points(
                full.iter()
                    .filter(|s| s.time >= start && s.time <= stop)
                    .map(|s| (s.time, s.value)),
            );
            if windowed.is_empty() {
                return Err(Error::DataUnavailable(format!(
                    "telemetry channel '{name}' has no samples in [{start:.1}, {stop:.1}]"
                )));
            }
            out.insert(name.to_string(), windowed);
        }
        Ok(out)
    }
}
