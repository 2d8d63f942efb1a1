//! Model-against-telemetry validation.
//!
//! Aligns predicted series with observed telemetry on the prediction grid,
//! masks out bad-time intervals and per-channel value predicates, and
//! reduces the residuals to nearest-rank quantiles. Quantile output is
//! bit-for-bit reproducible for identical inputs: the sort is stable and
//! the rank index is integer arithmetic.

use std::collections::BTreeMap;

use log::{debug, info};

use crate::config::ValidationConfig;
use crate::error::{Error, Result};
use crate::series::{TimeInterval, TimeSeries};
use crate::sim::PredictionResult;

/// One residual quantile row: channel, level, value.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationQuantile {
    /// Channel name.
    pub channel: String,
    /// Quantile level in `1..=99`.
    pub level: u8,
    /// Residual (telemetry minus model) at that level.
    pub residual: f64,
}

/// A quantile that exceeded its configured validation limit.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationViolation {
    /// Channel name.
    pub channel: String,
    /// Quantile level that failed.
    pub level: u8,
    /// Observed residual at that level.
    pub residual: f64,
    /// Configured maximum absolute residual.
    pub limit: f64,
}

/// Output of one validation pass.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    /// Quantile rows in channel-configuration order.
    pub quantiles: Vec<ValidationQuantile>,
    /// Quantiles exceeding their configured limits.
    pub violations: Vec<ValidationViolation>,
    /// Retained residual series per channel, for downstream rendering.
    pub residuals: BTreeMap<String, TimeSeries>,
}

/// Sample-retention mask over `times`: false inside any bad interval.
pub fn good_mask(times: &[f64], bad_times: &[TimeInterval]) -> Vec<bool> {
    times
        .iter()
        .map(|&t| !bad_times.iter().any(|iv| iv.contains(t)))
        .collect()
}

/// Nearest-rank quantile of an ascending-sorted slice: level `q` maps to
/// index `floor(N * q / 100)`.
///
/// Panics on an empty slice or a level of 100 or more; callers validate
/// both.
pub fn nearest_rank(sorted: &[f64], level: u8) -> f64 {
    assert!(!sorted.is_empty(), "quantile of empty residuals");
    assert!(level < 100, "quantile level must be below 100");
    sorted[sorted.len() * level as usize / 100]
}

/// Validates predicted series against telemetry.
///
/// Channels listed in `config` but absent from the prediction are skipped;
/// a configured channel with no telemetry is fatal, as is a channel left
/// with zero retained samples after masking. Output is all-or-nothing: any
/// error means no partial quantile table.
pub fn validate(
    prediction: &PredictionResult,
    telemetry: &BTreeMap<String, TimeSeries>,
    config: &ValidationConfig,
) -> Result<ValidationReport> {
    let mask = good_mask(&prediction.times, &prediction.bad_times);
    let mut quantiles = Vec::new();
    let mut violations = Vec::new();
    let mut residuals = BTreeMap::new();

    for channel in &config.channels {
        let Some(predicted) = prediction.channel(&channel.name) else {
            debug!("channel '{}' not in prediction, skipping", channel.name);
            continue;
        };
        let observed = telemetry.get(&channel.name).ok_or_else(|| {
            Error::DataUnavailable(format!("no telemetry for channel '{}'", channel.name))
        })?;
        if observed.is_empty() {
            return Err(Error::DataUnavailable(format!(
                "telemetry for channel '{}' is empty",
                channel.name
            )));
        }
        let aligned = observed.resample_nearest(&prediction.times);

        let mut retained = TimeSeries::with_capacity(prediction.times.len());
        for (i, &t) in prediction.times.iter().enumerate() {
            if !mask[i] {
                continue;
            }
            let raw = aligned.values()[i];
            if channel.residual_floor.is_some_and(|floor| raw <= floor) {
                continue;
            }
            retained.push(t, raw - predicted.values()[i]);
        }
        if retained.is_empty() {
            return Err(Error::DataUnavailable(format!(
                "channel '{}' has no samples retained for validation",
                channel.name
            )));
        }

        let mut sorted: Vec<f64> = retained
            .values()
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        for &level in &config.quantile_levels {
            let residual = nearest_rank(&sorted, level);
            quantiles.push(ValidationQuantile {
                channel: channel.name.clone(),
                level,
                residual,
            });
        }
        for &(level, limit) in &channel.validation_limits {
            let residual = nearest_rank(&sorted, level);
            if residual.abs() > limit {
                violations.push(ValidationViolation {
                    channel: channel.name.clone(),
                    level,
                    residual,
                    limit,
                });
            }
        }
        info!(
            "validated '{}': {} of {} samples retained",
            channel.name,
            retained.len(),
            prediction.times.len()
        );
        residuals.insert(channel.name.clone(), retained);
    }

    Ok(ValidationReport {
        quantiles,
        violations,
        residuals,
    })
}
