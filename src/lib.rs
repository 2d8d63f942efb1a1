//! Spacecraft thermal model validation and limit forecasting.
//!
//! This crate builds a contiguous commanded-state timeline from
//! heterogeneous command sources, drives an opaque thermal simulator over
//! it, and evaluates both the model's agreement with historical telemetry
//! (residual quantiles) and its predicted compliance with safety limits
//! (violation intervals). The pipeline is synchronous and single-threaded;
//! each run constructs its own simulator instance.
//!
//! Pipeline: timeline construction -> simulation -> validation and
//! violation detection -> report aggregation.

pub mod config;
pub mod error;
pub mod heater;
pub mod mock_sim;
pub mod model;
pub mod provider;
pub mod report;
pub mod seed;
pub mod series;
pub mod sim;
pub mod timeline;
pub mod validate;
pub mod violation;

// Re-exports for easier access
pub use config::{ChannelConfig, RunConfig, SeedOverrides, ValidationConfig};
pub use error::{Error, Result};
pub use report::RunReport;
pub use seed::{resolve_seed, InitialState, SeedPolicy};
pub use series::{Sample, TimeInterval, TimeSeries};
pub use sim::{run_prediction, InitialConditions, PredictionResult, SimInput, SimOutput, ThermalSimulator};
pub use timeline::{AttrValue, Command, CommandedState, StateTimeline, TimelineBuilder};
pub use validate::{validate, ValidationQuantile, ValidationReport};
pub use violation::{detect, detect_all, ViolationInterval};
