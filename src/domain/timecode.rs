/// Formats a duration in seconds as `HH:MM:SS`.
///
/// Fractional seconds are truncated, never rounded, so `59.9` renders as
/// `00:00:59`. Hours are not wrapped at 24. Negative or non-finite input
/// renders as `00:00:00`.
pub fn format_hms(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.trunc() as u64
    } else {
        0
    };

    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_hour_minute_second() {
        assert_eq!(format_hms(3661.0), "01:01:01");
    }

    #[test]
    fn test_format_truncates_fraction() {
        assert_eq!(format_hms(59.9), "00:00:59");
        assert_eq!(format_hms(119.999), "00:01:59");
    }

    #[test]
    fn test_format_hours_unbounded() {
        assert_eq!(format_hms(100.0 * 3600.0 + 5.0), "100:00:05");
    }

    #[test]
    fn test_format_degenerate_values() {
        assert_eq!(format_hms(0.0), "00:00:00");
        assert_eq!(format_hms(-12.0), "00:00:00");
        assert_eq!(format_hms(f64::NAN), "00:00:00");
    }
}
