//! Heater-command history file parsing.
//!
//! The detector housing heater log is an externally maintained text file of
//! `timestamp flag` rows. Malformed rows are skipped with a warning and
//! counted; they never fail the run.

use std::path::Path;

use log::warn;

use crate::error::Result;
use crate::series::TimeSeries;

/// Parsed heater on/off history.
#[derive(Debug, Clone)]
pub struct HeaterHistory {
    /// Heater state over time, 0.0 off and 1.0 on.
    pub series: TimeSeries,
    /// Number of rows skipped as malformed.
    pub skipped_rows: usize,
}

/// Reads a heater history file.
///
/// Blank lines and lines starting with `#` are ignored. Each remaining row
/// must be `timestamp flag` with the flag one of `0`, `1`, `true`, `false`.
pub fn read_heater_history(path: &Path) -> Result<HeaterHistory> {
    let raw = std::fs::read_to_string(path)?;
    let mut points = Vec::new();
    let mut skipped_rows = 0;

    for (lineno, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_row(line) {
            Some(point) => points.push(point),
            None => {
                warn!(
                    "skipping malformed heater history row {} in {}: '{line}'",
                    lineno + 1,
                    path.display()
                );
                skipped_rows += 1;
            }
        }
    }

    Ok(HeaterHistory {
        series: TimeSeries::from_points(points),
        skipped_rows,
    })
}

fn parse_row(line: &str) -> Option<(f64, f64)> {
    let mut fields = line.split_whitespace();
    let time: f64 = fields.next()?.parse().ok()?;
    let flag = match fields.next()? {
        "0" | "false" => 0.0,
        "1" | "true" => 1.0,
        _ => return None,
    };
    if fields.next().is_some() || !time.is_finite() {
        return None;
    }
    Some((time, flag))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_reads_well_formed_rows() {
        let file = write_temp("# heater log\n100.0 0\n200.0 1\n300.0 false\n400.0 true\n");
        let history = read_heater_history(file.path()).unwrap();
        assert_eq!(history.skipped_rows, 0);
        assert_eq!(history.series.len(), 4);
        assert_eq!(history.series.values(), &[0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_malformed_rows_skipped_and_counted() {
        let file = write_temp("100.0 0\nnot-a-row\n200.0 maybe\n300.0 1 extra\n400.0 1\n");
        let history = read_heater_history(file.path()).unwrap();
        assert_eq!(history.skipped_rows, 3);
        assert_eq!(history.series.len(), 2);
    }

    #[test]
    fn test_out_of_order_rows_are_sorted() {
        let file = write_temp("300.0 1\n100.0 0\n");
        let history = read_heater_history(file.path()).unwrap();
        assert_eq!(history.series.times(), &[100.0, 300.0]);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = read_heater_history(Path::new("/nonexistent/heater.log")).unwrap_err();
        assert!(matches!(err, crate::error::Error::Io(_)));
    }
}
