use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, Utc};

/// Short calendar date used once a comment is a day old (en-US style `1/15/2024`)
pub const DEFAULT_DATE_FORMAT: &str = "%-m/%-d/%Y";

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;

/// Human label for how long ago `timestamp` was, as seen at `now`
pub fn relative_time(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    relative_time_with_format(timestamp, now, DEFAULT_DATE_FORMAT)
}

/// Whether `pattern` is a strftime pattern chrono can render
pub fn is_valid_date_format(pattern: &str) -> bool {
    !StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error))
}

/// Same as [`relative_time`], with a strftime pattern for the calendar date.
///
/// An invalid pattern falls back to [`DEFAULT_DATE_FORMAT`].
pub fn relative_time_with_format(
    timestamp: DateTime<Utc>,
    now: DateTime<Utc>,
    date_format: &str,
) -> String {
    let elapsed = (now - timestamp).num_seconds();

    if elapsed < MINUTE {
        "just now".to_string()
    } else if elapsed < HOUR {
        format!("{} minutes ago", elapsed / MINUTE)
    } else if elapsed < DAY {
        format!("{} hours ago", elapsed / HOUR)
    } else {
        let pattern = if is_valid_date_format(date_format) {
            date_format
        } else {
            DEFAULT_DATE_FORMAT
        };
        timestamp.with_timezone(&Local).format(pattern).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn label(elapsed: i64) -> String {
        relative_time(base(), base() + Duration::seconds(elapsed))
    }

    #[test]
    fn test_thresholds() {
        assert_eq!(label(0), "just now");
        assert_eq!(label(45), "just now");
        assert_eq!(label(59), "just now");
        assert_eq!(label(60), "1 minutes ago");
        assert_eq!(label(125), "2 minutes ago");
        assert_eq!(label(3599), "59 minutes ago");
        assert_eq!(label(3600), "1 hours ago");
        assert_eq!(label(7300), "2 hours ago");
        assert_eq!(label(86_399), "23 hours ago");
    }

    #[test]
    fn test_future_timestamp_is_just_now() {
        assert_eq!(label(-300), "just now");
    }

    #[test]
    fn test_old_comment_shows_date() {
        let text = label(90_000);
        assert!(!text.ends_with("ago"));
        assert!(text.ends_with("2024"));

        let year = relative_time_with_format(base(), base() + Duration::seconds(90_000), "%Y");
        assert_eq!(year, "2024");
    }

    #[test]
    fn test_invalid_date_format_falls_back() {
        assert!(is_valid_date_format(DEFAULT_DATE_FORMAT));
        assert!(!is_valid_date_format("%Q"));

        let later = base() + Duration::seconds(90_000);
        assert_eq!(
            relative_time_with_format(base(), later, "%Q"),
            relative_time_with_format(base(), later, DEFAULT_DATE_FORMAT)
        );
        // recent comments never look at the pattern
        assert_eq!(relative_time_with_format(base(), base(), "%Q"), "just now");
    }
}
