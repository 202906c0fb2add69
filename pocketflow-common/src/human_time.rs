//! Human-readable duration formatting for batch summaries
//!
//! Format is picked from the magnitude of the value:
//! - `< 100s` → `X.XXs`
//! - `< 100m` → `M:SS.Ss`
//! - otherwise → `H:MM:SS`

use std::time::Duration;

const SHORT_FORMAT_MAX: f64 = 100.0;
const MEDIUM_FORMAT_MAX: f64 = 6000.0;

/// Format a number of seconds for console output.
///
/// # Examples
///
/// ```
/// use pocketflow_common::human_time::format_seconds;
///
/// assert_eq!(format_seconds(4.5), "4.50s");
/// assert_eq!(format_seconds(330.0), "5:30.0s");
/// assert_eq!(format_seconds(3661.0), "1:01:01");
/// ```
pub fn format_seconds(seconds: f64) -> String {
    if !seconds.is_finite() {
        return "n/a".to_string();
    }

    let is_negative = seconds < 0.0;
    let abs_seconds = seconds.abs();

    let formatted = if abs_seconds < SHORT_FORMAT_MAX {
        format!("{:.2}s", abs_seconds)
    } else if abs_seconds < MEDIUM_FORMAT_MAX {
        let minutes = (abs_seconds / 60.0).floor();
        let secs = abs_seconds - minutes * 60.0;
        format!("{}:{:04.1}s", minutes as u64, secs)
    } else {
        let whole = abs_seconds.round() as u64;
        format!("{}:{:02}:{:02}", whole / 3600, (whole % 3600) / 60, whole % 60)
    };

    if is_negative {
        format!("-{}", formatted)
    } else {
        formatted
    }
}

/// Format a [`Duration`] for console output
pub fn format_duration(duration: Duration) -> String {
    format_seconds(duration.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_format() {
        assert_eq!(format_seconds(0.0), "0.00s");
        assert_eq!(format_seconds(0.126), "0.13s");
        assert_eq!(format_seconds(99.0), "99.00s");
    }

    #[test]
    fn test_medium_format() {
        assert_eq!(format_seconds(100.0), "1:40.0s");
        assert_eq!(format_seconds(125.5), "2:05.5s");
        assert_eq!(format_seconds(5999.0), "99:59.0s");
    }

    #[test]
    fn test_long_format() {
        assert_eq!(format_seconds(6000.0), "1:40:00");
        assert_eq!(format_seconds(7200.0), "2:00:00");
        assert_eq!(format_seconds(90061.0), "25:01:01");
    }

    #[test]
    fn test_negative_and_non_finite() {
        assert_eq!(format_seconds(-5.0), "-5.00s");
        assert_eq!(format_seconds(f64::NAN), "n/a");
    }

    #[test]
    fn test_duration_wrapper() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }
}
