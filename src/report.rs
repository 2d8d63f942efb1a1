//! Report aggregation and artifact writing.
//!
//! `RunReport` collects the outputs of one run into a single structure for
//! downstream rendering. The writers here produce the stable text artifacts
//! (states table, temperature table, quantile CSV, violations listing);
//! column order and headers do not change between runs, so outputs diff
//! cleanly. Every file write is atomic: content goes to a temporary file in
//! the target directory which is then renamed into place, so a failed run
//! never leaves a partially written artifact.

use std::fmt::Write as _;
use std::fs;
use std::io::Write as _;
use std::path::Path;

use log::info;

use crate::config::ValidationConfig;
use crate::error::Result;
use crate::series::TimeInterval;
use crate::sim::PredictionResult;
use crate::timeline::StateTimeline;
use crate::validate::ValidationReport;
use crate::violation::ViolationInterval;

/// Aggregated outputs of one run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Run window attempted, reported with errors and in headers.
    pub window: Option<TimeInterval>,
    /// Commanded-state timeline driving the forecast, when one was built.
    pub timeline: Option<StateTimeline>,
    /// Forecast prediction, when a planned load was supplied.
    pub prediction: Option<PredictionResult>,
    /// Limit violations found in the forecast.
    pub violations: Vec<ViolationInterval>,
    /// Validation results over the telemetry window.
    pub validation: Option<ValidationReport>,
    /// Malformed heater-history rows skipped while loading inputs.
    pub skipped_heater_rows: usize,
}

impl RunReport {
    /// Writes all artifacts for this report into `outdir`.
    ///
    /// The directory is created if needed. Which files appear depends on
    /// which sections of the report are populated.
    pub fn write_all(&self, outdir: &Path, config: &ValidationConfig) -> Result<()> {
        fs::create_dir_all(outdir)?;
        if let Some(timeline) = &self.timeline {
            atomic_write(&outdir.join("states.dat"), &states_table(timeline))?;
        }
        if let Some(prediction) = &self.prediction {
            atomic_write(&outdir.join("temperatures.dat"), &temperature_table(prediction))?;
        }
        if let Some(validation) = &self.validation {
            atomic_write(
                &outdir.join("validation_quant.csv"),
                &quantile_table(validation, config),
            )?;
            for (name, residuals) in &validation.residuals {
                let mut table = String::from("time residual\n");
                for sample in residuals.iter() {
                    let _ = writeln!(table, "{:.1} {:.3}", sample.time, sample.value);
                }
                atomic_write(&outdir.join(format!("{name}_residuals.dat")), &table)?;
            }
        }
        atomic_write(&outdir.join("violations.dat"), &violations_table(&self.violations))?;
        info!("wrote report artifacts to {}", outdir.display());
        Ok(())
    }
}

/// Writes `contents` to `path` atomically via a sibling temporary file.
pub fn atomic_write(path: &Path, contents: &str) -> Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Formats the commanded-state table: `tstart tstop` plus one column per
/// attribute in schema order.
pub fn states_table(timeline: &StateTimeline) -> String {
    let mut out = String::new();
    let Some(first) = timeline.states().first() else {
        return out;
    };
    let columns: Vec<&str> = first.attrs.keys().map(String::as_str).collect();
    out.push_str("tstart tstop");
    for name in &columns {
        let _ = write!(out, " {name}");
    }
    out.push('\n');
    for state in timeline.states() {
        let _ = write!(out, "{:.1} {:.1}", state.tstart, state.tstop);
        for name in &columns {
            let _ = write!(out, " {}", state.attrs[*name]);
        }
        out.push('\n');
    }
    out
}

/// Formats the predicted temperature table: `time` plus one column per
/// channel in name order.
pub fn temperature_table(prediction: &PredictionResult) -> String {
    let mut out = String::new();
    out.push_str("time");
    for name in prediction.channels.keys() {
        let _ = write!(out, " {name}");
    }
    out.push('\n');
    for (i, &t) in prediction.times.iter().enumerate() {
        let _ = write!(out, "{t:.1}");
        for series in prediction.channels.values() {
            let _ = write!(out, " {:.3}", series.values()[i]);
        }
        out.push('\n');
    }
    out
}

/// Formats the quantile CSV with the stable header
/// `channel,quant1,quant5,...` derived from the configured level set.
pub fn quantile_table(validation: &ValidationReport, config: &ValidationConfig) -> String {
    let mut out = String::from("channel");
    for level in &config.quantile_levels {
        let _ = write!(out, ",quant{level}");
    }
    out.push('\n');

    for channel in &config.channels {
        let rows: Vec<_> = validation
            .quantiles
            .iter()
            .filter(|q| q.channel == channel.name)
            .collect();
        if rows.is_empty() {
            continue;
        }
        out.push_str(&channel.name);
        for level in &config.quantile_levels {
            let residual = rows
                .iter()
                .find(|q| q.level == *level)
                .map(|q| q.residual)
                .unwrap_or(f64::NAN);
            let _ = write!(out, ",{residual:.prec$}", prec = channel.decimals);
        }
        out.push('\n');
    }
    out
}

/// Formats the violation listing.
pub fn violations_table(violations: &[ViolationInterval]) -> String {
    let mut out = String::from("channel tstart tstop peak limit\n");
    for v in violations {
        let _ = writeln!(
            out,
            "{} {:.1} {:.1} {:.2} {:.2}",
            v.channel, v.tstart, v.tstop, v.peak, v.limit
        );
    }
    out
}
