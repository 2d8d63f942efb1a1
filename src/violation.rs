//! Limit-violation detection.
//!
//! Scans a temperature series against a high-side threshold of
//! `limit - margin` and merges adjacent violating samples into contiguous
//! intervals. Masked-out samples are transparent to merging: a non-violating
//! value inside an excluded zone does not end a run.

use log::info;

use crate::config::ValidationConfig;
use crate::series::TimeSeries;
use crate::sim::PredictionResult;
use crate::validate::good_mask;

/// One contiguous limit excursion.
#[derive(Debug, Clone, PartialEq)]
pub struct ViolationInterval {
    /// Channel name.
    pub channel: String,
    /// Time of the first violating sample.
    pub tstart: f64,
    /// Time of the last violating sample. An excursion still open at the
    /// end of the series closes at its last sample.
    pub tstop: f64,
    /// Peak value over the excursion.
    pub peak: f64,
    /// The planning limit the excursion was checked against.
    pub limit: f64,
}

/// Scans one series for excursions above `limit - margin`.
///
/// `mask` marks samples eligible for checking; it must be the same length
/// as the series. A masked-out sample neither starts, extends, nor ends an
/// excursion.
pub fn detect(
    channel: &str,
    series: &TimeSeries,
    limit: f64,
    margin: f64,
    mask: &[bool],
) -> Vec<ViolationInterval> {
    assert_eq!(
        mask.len(),
        series.len(),
        "mask length must match series length"
    );
    let threshold = limit - margin;
    let mut intervals = Vec::new();
    let mut open: Option<ViolationInterval> = None;

    for (i, sample) in series.iter().enumerate() {
        if !mask[i] {
            continue;
        }
        if sample.value > threshold {
            match open.as_mut() {
                Some(interval) => {
                    interval.tstop = sample.time;
                    interval.peak = interval.peak.max(sample.value);
                }
                None => {
                    open = Some(ViolationInterval {
                        channel: channel.to_string(),
                        tstart: sample.time,
                        tstop: sample.time,
                        peak: sample.value,
                        limit,
                    });
                }
            }
        } else if let Some(interval) = open.take() {
            intervals.push(interval);
        }
    }
    if let Some(interval) = open {
        intervals.push(interval);
    }
    intervals
}

/// Scans every configured channel of a prediction that carries a planning
/// limit, using the prediction's bad times as the mask.
pub fn detect_all(prediction: &PredictionResult, config: &ValidationConfig) -> Vec<ViolationInterval> {
    let mask = good_mask(&prediction.times, &prediction.bad_times);
    let mut all = Vec::new();
    for channel in &config.channels {
        let Some(limit) = channel.planning_limit else {
            continue;
        };
        let Some(series) = prediction.channel(&channel.name) else {
            continue;
        };
        let found = detect(&channel.name, series, limit, channel.margin, &mask);
        if !found.is_empty() {
            info!(
                "channel '{}': {} violation interval(s) above {:.1}",
                channel.name,
                found.len(),
                limit - channel.margin
            );
        }
        all.extend(found);
    }
    all
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series_of(values: &[f64]) -> TimeSeries {
        TimeSeries::from_points(values.iter().enumerate().map(|(i, &v)| (i as f64 * 10.0, v)))
    }

    #[test]
    fn test_no_violations_below_threshold() {
        let s = series_of(&[50.0, 51.0, 52.0]);
        let found = detect("t_primary", &s, 55.0, 2.5, &[true; 3]);
        assert!(found.is_empty());
    }

    #[test]
    fn test_threshold_is_limit_minus_margin() {
        // 52.5 exactly does not violate; strictly above does.
        let s = series_of(&[52.5, 52.6]);
        let found = detect("t_primary", &s, 55.0, 2.5, &[true; 2]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].tstart, 10.0);
    }

    #[test]
    fn test_adjacent_samples_merge() {
        let s = series_of(&[50.0, 53.0, 53.5, 53.0, 50.0]);
        let found = detect("t_primary", &s, 55.0, 2.5, &[true; 5]);
        assert_eq!(found.len(), 1);
        let v = &found[0];
        assert_eq!(v.tstart, 10.0);
        assert_eq!(v.tstop, 30.0);
        assert_eq!(v.peak, 53.5);
        assert_eq!(v.limit, 55.0);
    }

    #[test]
    fn test_masked_gap_is_transparent() {
        // Synthetic series [limit+1, limit+1, limit-1(masked), limit+1]
        // with margin 0 must yield exactly one interval spanning all four
        // samples.
        let limit = 55.0;
        let s = series_of(&[56.0, 56.0, 54.0, 56.0]);
        let mask = [true, true, false, true];
        let found = detect("t_primary", &s, limit, 0.0, &mask);
        assert_eq!(found.len(), 1);
        let v = &found[0];
        assert_eq!(v.tstart, 0.0);
        assert_eq!(v.tstop, 30.0);
        assert_eq!(v.peak, 56.0);
    }

    #[test]
    fn test_unmasked_dip_splits_intervals() {
        let s = series_of(&[56.0, 54.0, 56.0]);
        let found = detect("t_primary", &s, 55.0, 0.0, &[true; 3]);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].tstart, 0.0);
        assert_eq!(found[0].tstop, 0.0);
        assert_eq!(found[1].tstart, 20.0);
    }

    #[test]
    fn test_open_interval_closes_at_last_sample() {
        let s = series_of(&[50.0, 56.0, 57.0]);
        let found = detect("t_primary", &s, 55.0, 0.0, &[true; 3]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].tstop, 20.0);
        assert_eq!(found[0].peak, 57.0);
    }

    #[test]
    fn test_masked_tail_does_not_extend() {
        let s = series_of(&[56.0, 56.0, 56.0]);
        let mask = [true, true, false];
        let found = detect("t_primary", &s, 55.0, 0.0, &mask);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].tstop, 10.0);
    }

    #[test]
    #[should_panic(expected = "mask length")]
    fn test_mask_length_mismatch_panics() {
        let s = series_of(&[50.0, 51.0]);
        detect("t_primary", &s, 55.0, 0.0, &[true]);
    }
}
