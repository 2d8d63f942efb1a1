use thiserror::Error;

/// Errors produced by the thermal check pipeline.
///
/// All variants except `Malformed` are fatal for the run that raised them.
/// Malformed rows in auxiliary input files are skipped, counted, and
/// reported by the component that encountered them.
#[derive(Error, Debug)]
pub enum Error {
    /// A collaborator (command or telemetry provider) could not supply
    /// required data.
    #[error("required data unavailable: {0}")]
    DataUnavailable(String),

    /// The seed state is missing a required attribute and no command before
    /// the end of the timeline supplies it.
    #[error("seed state missing required attribute '{attribute}' and no command before {until:.1} supplies it")]
    InsufficientSeed {
        /// Name of the missing attribute.
        attribute: String,
        /// End of the searched command window, in seconds.
        until: f64,
    },

    /// Forecast mode requires a planned command timeline but none was given.
    #[error("planned command timeline is empty")]
    EmptyCommandTimeline,

    /// A run window with start not strictly before stop.
    #[error("invalid run window: start {start:.1} is not before stop {stop:.1}")]
    InvalidWindow { start: f64, stop: f64 },

    /// A required simulator input channel has no usable data over the run
    /// window.
    #[error("simulator input '{channel}' has no data covering [{start:.1}, {stop:.1})")]
    SimulationConfig {
        channel: String,
        start: f64,
        stop: f64,
    },

    /// The simulator reported a non-finite output value.
    #[error("simulator produced non-finite output for '{channel}' at t={time:.1}")]
    SimulationDivergence { channel: String, time: f64 },

    /// An externally imposed wall-clock limit expired during simulation.
    #[error("simulation exceeded wall-clock limit of {limit_s:.0} s")]
    SimulationTimeout { limit_s: f64 },

    /// An input file could not be parsed at all (as opposed to individual
    /// bad rows, which are skipped).
    #[error("malformed {what}: {detail}")]
    Malformed { what: String, detail: String },

    /// Underlying I/O failure while reading inputs or writing artifacts.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;
