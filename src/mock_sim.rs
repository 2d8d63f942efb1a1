//! Scripted simulator implementation for testing.

use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::sim::{SimInput, SimOutput, ThermalSimulator};

/// Simulator that returns a pre-scripted output and records the inputs it
/// was driven with.
///
/// Because [`ThermalSimulator::run`] consumes the instance, callers that
/// want to inspect the captured inputs must take a handle with
/// [`MockSimulator::captured_inputs`] before boxing the mock.
pub struct MockSimulator {
    output: SimOutput,
    captured: Arc<Mutex<Vec<SimInput>>>,
}

impl MockSimulator {
    /// Creates a mock returning `output` from every run.
    pub fn new(output: SimOutput) -> Self {
        Self {
            output,
            captured: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Handle to the inputs recorded by `run`.
    pub fn captured_inputs(&self) -> Arc<Mutex<Vec<SimInput>>> {
        Arc::clone(&self.captured)
    }
}

impl ThermalSimulator for MockSimulator {
    fn name(&self) -> &str {
        "mock"
    }

    fn run(self: Box<Self>, _start: f64, _stop: f64, inputs: &[SimInput]) -> Result<SimOutput> {
        *self.captured.lock().unwrap() = inputs.to_vec();
        Ok(self.output)
    }
}
