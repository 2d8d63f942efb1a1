//! Time-indexed sample storage with nearest-neighbor resampling.
//!
//! `TimeSeries` is the common container for telemetry, heater history, and
//! simulator output. Timestamps are strictly increasing; ingesting a
//! duplicate timestamp replaces the stored value (last write wins).
//! Resampling treats a series as a step function between samples and never
//! interpolates.

use serde::{Deserialize, Serialize};

/// A single time-tagged measurement.
///
/// Boolean channels (for example the heater flag) encode as 0.0/1.0 so that
/// resampling and masking work uniformly across channel types.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Time in seconds.
    pub time: f64,
    /// Measured or modeled value.
    pub value: f64,
}

/// A half-open time range `[start, stop)`.
///
/// Used for bad-data exclusion windows and for run windows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeInterval {
    /// Inclusive start, seconds.
    pub start: f64,
    /// Exclusive stop, seconds.
    pub stop: f64,
}

impl TimeInterval {
    /// Creates an interval. Panics if `stop <= start`.
    pub fn new(start: f64, stop: f64) -> Self {
        assert!(stop > start, "TimeInterval stop must be after start");
        Self { start, stop }
    }

    /// True if `t` falls inside `[start, stop)`.
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t < self.stop
    }

    /// Interval length in seconds.
    pub fn duration(&self) -> f64 {
        self.stop - self.start
    }
}

/// Ordered sequence of samples keyed by strictly increasing timestamp.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    times: Vec<f64>,
    values: Vec<f64>,
}

impl TimeSeries {
    /// Creates an empty series.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty series with reserved capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            times: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
        }
    }

    /// Builds a series from arbitrary (time, value) points.
    ///
    /// Points are sorted by time; points sharing a timestamp collapse to the
    /// last one given (last write wins).
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut pts: Vec<(f64, f64)> = points.into_iter().collect();
        pts.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        let mut series = Self::with_capacity(pts.len());
        for (t, v) in pts {
            series.push(t, v);
        }
        series
    }

    /// Appends a sample.
    ///
    /// A sample at the current last timestamp replaces the stored value.
    /// Panics if `time` is before the last timestamp; callers with unordered
    /// data should use [`TimeSeries::from_points`].
    pub fn push(&mut self, time: f64, value: f64) {
        if let Some(&last) = self.times.last() {
            assert!(
                time >= last,
                "TimeSeries push out of order: {time} < {last}"
            );
            if time == last {
                *self.values.last_mut().unwrap() = value;
                return;
            }
        }
        self.times.push(time);
        self.values.push(value);
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// True if the series holds no samples.
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Timestamps, strictly increasing.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Values, aligned with [`TimeSeries::times`].
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// First sample, if any.
    pub fn first(&self) -> Option<Sample> {
        self.get(0)
    }

    /// Last sample, if any.
    pub fn last(&self) -> Option<Sample> {
        self.len().checked_sub(1).and_then(|i| self.get(i))
    }

    /// Sample at index `i`, if in bounds.
    pub fn get(&self, i: usize) -> Option<Sample> {
        if i < self.len() {
            Some(Sample {
                time: self.times[i],
                value: self.values[i],
            })
        } else {
            None
        }
    }

    /// Iterates over samples in time order.
    pub fn iter(&self) -> impl Iterator<Item = Sample> + '_ {
        self.times
            .iter()
            .zip(self.values.iter())
            .map(|(&time, &value)| Sample { time, value })
    }

    /// Index of the sample nearest to `t`.
    ///
    /// Ties between two equidistant samples resolve to the earlier one so
    /// that repeated lookups are deterministic. Returns `None` on an empty
    /// series.
    pub fn nearest_index(&self, t: f64) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        let i = self.times.partition_point(|&x| x < t);
        if i == 0 {
            return Some(0);
        }
        if i == self.len() {
            return Some(self.len() - 1);
        }
        let d_left = t - self.times[i - 1];
        let d_right = self.times[i] - t;
        if d_right < d_left {
            Some(i)
        } else {
            Some(i - 1)
        }
    }

    /// Value of the sample nearest to `t`.
    pub fn value_nearest(&self, t: f64) -> Option<f64> {
        self.nearest_index(t).map(|i| self.values[i])
    }

    /// Value of the latest sample at or before `t` (step-function lookup).
    pub fn value_at_or_before(&self, t: f64) -> Option<f64> {
        let i = self.times.partition_point(|&x| x <= t);
        i.checked_sub(1).map(|i| self.values[i])
    }

    /// Resamples this series onto `grid` with nearest-neighbor lookup.
    ///
    /// Resampling an already-aligned series onto its own grid returns it
    /// unchanged. Panics if this series is empty or `grid` is not strictly
    /// increasing.
    pub fn resample_nearest(&self, grid: &[f64]) -> TimeSeries {
        assert!(!self.is_empty(), "cannot resample an empty series");
        let mut out = TimeSeries::with_capacity(grid.len());
        for &t in grid {
            let i = self.nearest_index(t).unwrap();
            out.push(t, self.values[i]);
        }
        out
    }

    /// Mean of values within `[center - half_width, center + half_width]`.
    ///
    /// Returns `None` when no samples fall in the window.
    pub fn mean_in_window(&self, center: f64, half_width: f64) -> Option<f64> {
        let lo = self.times.partition_point(|&x| x < center - half_width);
        let hi = self.times.partition_point(|&x| x <= center + half_width);
        if lo >= hi {
            return None;
        }
        let slice = &self.values[lo..hi];
        Some(slice.iter().sum::<f64>() / slice.len() as f64)
    }
}
