//! Natural-language elapsed-time phrases
//!
//! Accepted forms (case-insensitive):
//! - `N unit` with seconds, minutes, hours, days or weeks (`"30 minutes"`, `"2h"`)
//! - compound sequences of those (`"1 hour 30 minutes"`, `"2h, 15m"`, `"1 day and 3 hours"`)
//! - clock form `H:MM` or `H:MM:SS` (`"1:30"` is ninety minutes)
//!
//! Signs are accepted so a negative phrase parses and is rejected later by
//! the positivity check on the timeline cursor.

use chrono::Duration;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::errors::StoryError;

static CLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([+-]?)(\d+):([0-5]\d)(?::([0-5]\d))?$").expect("valid regex"));

static TERM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([+-]?\d+(?:\.\d+)?)\s*([a-z]+)").expect("valid regex"));

static SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\s|,|\band\b)*$").expect("valid regex"));

/// A parsed, signed span of story time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StoryDuration(Duration);

impl StoryDuration {
    pub fn parse(phrase: &str) -> Result<Self, StoryError> {
        let text = phrase.trim().to_lowercase();
        if text.is_empty() {
            return Err(StoryError::DurationParse(phrase.to_string()));
        }

        if let Some(caps) = CLOCK.captures(&text) {
            let hours: i64 = caps[2]
                .parse()
                .map_err(|_| StoryError::DurationParse(phrase.to_string()))?;
            let minutes: i64 = caps[3]
                .parse()
                .map_err(|_| StoryError::DurationParse(phrase.to_string()))?;
            let seconds: i64 = match caps.get(4) {
                Some(s) => s
                    .as_str()
                    .parse()
                    .map_err(|_| StoryError::DurationParse(phrase.to_string()))?,
                None => 0,
            };
            let total = hours
                .checked_mul(3600)
                .and_then(|h| h.checked_add(minutes * 60 + seconds))
                .map(|t| if &caps[1] == "-" { -t } else { t })
                .and_then(Duration::try_seconds)
                .ok_or_else(|| StoryError::DurationParse(phrase.to_string()))?;
            return Ok(Self(total));
        }

        let mut total_ms: f64 = 0.0;
        let mut cursor = 0;
        let mut terms = 0;
        for caps in TERM.captures_iter(&text) {
            let whole = caps.get(0).ok_or_else(|| StoryError::DurationParse(phrase.to_string()))?;
            if !SEPARATOR.is_match(&text[cursor..whole.start()]) {
                return Err(StoryError::DurationParse(phrase.to_string()));
            }
            let amount: f64 = caps[1]
                .parse()
                .map_err(|_| StoryError::DurationParse(phrase.to_string()))?;
            let unit_ms = unit_millis(&caps[2])
                .ok_or_else(|| StoryError::DurationParse(phrase.to_string()))?;
            total_ms += amount * unit_ms as f64;
            cursor = whole.end();
            terms += 1;
        }

        if terms == 0 || !SEPARATOR.is_match(&text[cursor..]) {
            return Err(StoryError::DurationParse(phrase.to_string()));
        }
        if !total_ms.is_finite() || total_ms.abs() > i64::MAX as f64 / 2.0 {
            return Err(StoryError::DurationParse(phrase.to_string()));
        }

        Duration::try_milliseconds(total_ms.round() as i64)
            .map(Self)
            .ok_or_else(|| StoryError::DurationParse(phrase.to_string()))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Duration::zero()
    }
}

impl From<Duration> for StoryDuration {
    fn from(duration: Duration) -> Self {
        Self(duration)
    }
}

fn unit_millis(unit: &str) -> Option<i64> {
    let ms = match unit {
        "s" | "sec" | "secs" | "second" | "seconds" => 1_000,
        "m" | "min" | "mins" | "minute" | "minutes" => 60_000,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3_600_000,
        "d" | "day" | "days" => 86_400_000,
        "w" | "wk" | "wks" | "week" | "weeks" => 604_800_000,
        _ => return None,
    };
    Some(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minutes(phrase: &str) -> i64 {
        StoryDuration::parse(phrase).unwrap().as_duration().num_minutes()
    }

    #[test]
    fn test_simple_units() {
        assert_eq!(minutes("30 minutes"), 30);
        assert_eq!(minutes("1 minute"), 1);
        assert_eq!(minutes("2 hours"), 120);
        assert_eq!(minutes("3h"), 180);
        assert_eq!(minutes("1 day"), 1440);
        assert_eq!(minutes("2 weeks"), 20160);
        assert_eq!(
            StoryDuration::parse("45 secs").unwrap().as_duration(),
            Duration::seconds(45)
        );
    }

    #[test]
    fn test_case_and_whitespace() {
        assert_eq!(minutes("  90 Minutes "), 90);
        assert_eq!(minutes("1 HOUR"), 60);
    }

    #[test]
    fn test_compound_phrases() {
        assert_eq!(minutes("1 hour 30 minutes"), 90);
        assert_eq!(minutes("2h 15m"), 135);
        assert_eq!(minutes("1 day, 2 hours"), 1560);
        assert_eq!(minutes("1 hour and 5 minutes"), 65);
        assert_eq!(minutes("1.5 hours"), 90);
    }

    #[test]
    fn test_clock_form() {
        assert_eq!(minutes("1:30"), 90);
        assert_eq!(
            StoryDuration::parse("0:00:45").unwrap().as_duration(),
            Duration::seconds(45)
        );
    }

    #[test]
    fn test_negative_and_zero_parse_but_are_not_positive() {
        let negative = StoryDuration::parse("-5 minutes").unwrap();
        assert!(!negative.is_positive());
        assert_eq!(negative.as_duration(), Duration::minutes(-5));

        let zero = StoryDuration::parse("0 minutes").unwrap();
        assert!(!zero.is_positive());
    }

    #[test]
    fn test_out_of_range_clock_is_a_parse_error() {
        for phrase in [
            "10000000000000:00",
            "9223372036854775807:00",
            "99999999999999999999:00",
        ] {
            assert!(
                matches!(
                    StoryDuration::parse(phrase),
                    Err(StoryError::DurationParse(_))
                ),
                "{:?} should be rejected",
                phrase
            );
        }
    }

    #[test]
    fn test_unrecognized_phrases() {
        for phrase in ["", "a while", "soon", "5 fortnights", "minutes", "5 minutes later", "1:75"] {
            let err = StoryDuration::parse(phrase).unwrap_err();
            assert!(
                matches!(err, StoryError::DurationParse(_)),
                "{:?} should not parse",
                phrase
            );
        }
    }
}
