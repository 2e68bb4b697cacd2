use anyhow::{anyhow, Result};
use chrono::{
    DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;
use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

/// Hour that "sunset" maps to when the plan text uses it as a time
const SUNSET_HOUR: u32 = 19;

fn clock_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d{1,2})(?::(\d{2}))?\s*(am|pm)?$").expect("clock pattern is valid")
    })
}

/// Parse a human-entered time token into a naive local date-time anchored
/// to the given calendar day.
///
/// Accepted shapes, tried in order:
/// - full RFC3339/ISO date-times (only their time of day is kept)
/// - the literal "sunset", mapped to 19:00
/// - `H`, `HH`, `H:MM`, `HH:MM` with an optional am/pm suffix
///
/// With a meridiem suffix 12-hour rules apply (12am is midnight, pm adds
/// twelve); without one the hour is read as 24-hour time. Seconds are
/// always zeroed.
pub fn parse_time_string(raw: &str, date: NaiveDate) -> Result<NaiveDateTime> {
    let trimmed = raw.trim();

    // LLM output often carries a full ISO timestamp even when only the
    // time of day is meaningful; re-anchor it to the requested day.
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return anchor(date, parsed.hour(), parsed.minute());
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        return anchor(date, parsed.hour(), parsed.minute());
    }

    let cleaned = trimmed.to_lowercase();

    if cleaned == "sunset" {
        return anchor(date, SUNSET_HOUR, 0);
    }

    let captures = clock_pattern()
        .captures(&cleaned)
        .ok_or_else(|| anyhow!("Unrecognized time format: '{}'", raw))?;

    let mut hours: u32 = captures[1]
        .parse()
        .map_err(|e| anyhow!("Invalid hour in '{}': {}", raw, e))?;
    let minutes: u32 = captures
        .get(2)
        .map(|m| m.as_str().parse())
        .transpose()
        .map_err(|e| anyhow!("Invalid minutes in '{}': {}", raw, e))?
        .unwrap_or(0);

    if let Some(period) = captures.get(3) {
        match period.as_str() {
            "pm" if hours < 12 => hours += 12,
            "am" if hours == 12 => hours = 0,
            _ => {}
        }
    }

    anchor(date, hours, minutes)
}

fn anchor(date: NaiveDate, hours: u32, minutes: u32) -> Result<NaiveDateTime> {
    let time = NaiveTime::from_hms_opt(hours, minutes, 0)
        .ok_or_else(|| anyhow!("Invalid time values: hours={}, minutes={}", hours, minutes))?;
    Ok(date.and_time(time))
}

/// Derive an event's end time from an optional raw token.
///
/// Missing or unparseable end tokens fall back to `start + default_duration`
/// rather than failing the whole itinerary. An end that parses to a
/// wall-clock time before the start is taken to cross midnight and rolls
/// forward one day, so the result is never earlier than the start.
pub fn derive_end_time(
    start: NaiveDateTime,
    raw_end: Option<&str>,
    default_duration: Duration,
) -> NaiveDateTime {
    let fallback = start + default_duration;

    let Some(raw) = raw_end else {
        return fallback;
    };

    match parse_time_string(raw, start.date()) {
        Ok(mut end) => {
            if end < start {
                end += Duration::days(1);
            }
            end
        }
        Err(e) => {
            warn!("Could not parse end time '{}', defaulting to {} minutes: {}",
                  raw, default_duration.num_minutes(), e);
            fallback
        }
    }
}

/// Convert a place-local wall-clock time to UTC for storage.
///
/// Ambiguous local times (DST fall-back) resolve to the earlier instant.
/// Nonexistent local times (spring-forward gap) shift forward to the first
/// valid wall-clock time.
pub fn local_to_utc(naive: NaiveDateTime, tz: Tz) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earlier, _) => earlier.with_timezone(&Utc),
        LocalResult::None => {
            let shifted = naive + Duration::hours(1);
            match tz.from_local_datetime(&shifted).earliest() {
                Some(dt) => dt.with_timezone(&Utc),
                // Unreachable for real IANA zones; treat the input as UTC
                None => Utc.from_utc_datetime(&naive),
            }
        }
    }
}

/// Convert a stored UTC instant back into a place's local time for display
pub fn utc_to_local(utc: DateTime<Utc>, tz: Tz) -> DateTime<Tz> {
    utc.with_timezone(&tz)
}

/// Render an event time in the place's timezone as `h:mm AM/PM`
pub fn format_event_time(utc: DateTime<Utc>, tz: Tz) -> String {
    utc_to_local(utc, tz).format("%-I:%M %p").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::Detroit;
    use chrono_tz::America::Los_Angeles;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 14).unwrap()
    }

    fn hm(dt: NaiveDateTime) -> (u32, u32) {
        (dt.hour(), dt.minute())
    }

    #[test]
    fn test_twelve_hour_tokens() {
        assert_eq!(hm(parse_time_string("11am", day()).unwrap()), (11, 0));
        assert_eq!(hm(parse_time_string("2pm", day()).unwrap()), (14, 0));
        assert_eq!(hm(parse_time_string("2:30pm", day()).unwrap()), (14, 30));
        assert_eq!(hm(parse_time_string("7:05 pm", day()).unwrap()), (19, 5));
    }

    #[test]
    fn test_midnight_and_noon_disambiguation() {
        assert_eq!(hm(parse_time_string("12am", day()).unwrap()), (0, 0));
        assert_eq!(hm(parse_time_string("12pm", day()).unwrap()), (12, 0));
    }

    #[test]
    fn test_twenty_four_hour_tokens() {
        assert_eq!(hm(parse_time_string("14:00", day()).unwrap()), (14, 0));
        assert_eq!(hm(parse_time_string("9:15", day()).unwrap()), (9, 15));
        assert_eq!(hm(parse_time_string("0:00", day()).unwrap()), (0, 0));
    }

    #[test]
    fn test_sunset_maps_to_seven_pm() {
        let parsed = parse_time_string("Sunset", day()).unwrap();
        assert_eq!(hm(parsed), (19, 0));
        assert_eq!(parsed.date(), day());
    }

    #[test]
    fn test_iso_timestamp_reanchored_to_day() {
        let parsed = parse_time_string("2024-01-02T15:30:00Z", day()).unwrap();
        assert_eq!(hm(parsed), (15, 30));
        assert_eq!(parsed.date(), day());

        let naive = parse_time_string("2024-01-02T08:45:00", day()).unwrap();
        assert_eq!(hm(naive), (8, 45));
        assert_eq!(naive.date(), day());
    }

    #[test]
    fn test_invalid_tokens_rejected() {
        assert!(parse_time_string("later", day()).is_err());
        assert!(parse_time_string("25:00", day()).is_err());
        assert!(parse_time_string("9:75", day()).is_err());
        assert!(parse_time_string("", day()).is_err());
    }

    #[test]
    fn test_end_time_defaults_to_one_hour() {
        let start = day().and_hms_opt(12, 0, 0).unwrap();
        let end = derive_end_time(start, None, Duration::minutes(60));
        assert_eq!(end, start + Duration::minutes(60));
    }

    #[test]
    fn test_end_before_start_rolls_to_next_day() {
        let start = day().and_hms_opt(22, 0, 0).unwrap();
        let end = derive_end_time(start, Some("1am"), Duration::minutes(60));
        assert_eq!(end.date(), day() + Duration::days(1));
        assert_eq!(hm(end), (1, 0));
        assert!(end >= start);
    }

    #[test]
    fn test_unparseable_end_falls_back_to_default() {
        let start = day().and_hms_opt(12, 0, 0).unwrap();
        let end = derive_end_time(start, Some("whenever"), Duration::minutes(45));
        assert_eq!(end, start + Duration::minutes(45));
    }

    #[test]
    fn test_local_utc_round_trip() {
        let naive = day().and_hms_opt(11, 30, 0).unwrap();
        let utc = local_to_utc(naive, Detroit);
        let back = utc_to_local(utc, Detroit);
        assert_eq!(back.naive_local(), naive);
    }

    #[test]
    fn test_spring_forward_gap_shifts_forward() {
        // 2:30 AM does not exist in Detroit on 2025-03-09
        let gap = NaiveDate::from_ymd_opt(2025, 3, 9)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        let utc = local_to_utc(gap, Detroit);
        let local = utc_to_local(utc, Detroit);
        assert_eq!(local.hour(), 3);
    }

    #[test]
    fn test_fall_back_ambiguity_prefers_earlier_instant() {
        // 1:30 AM occurs twice in Los Angeles on 2025-11-02
        let ambiguous = NaiveDate::from_ymd_opt(2025, 11, 2)
            .unwrap()
            .and_hms_opt(1, 30, 0)
            .unwrap();
        let utc = local_to_utc(ambiguous, Los_Angeles);
        // Earlier instant is still PDT (UTC-7)
        assert_eq!(utc.hour(), 8);
    }

    #[test]
    fn test_format_event_time() {
        let naive = day().and_hms_opt(14, 5, 0).unwrap();
        let utc = local_to_utc(naive, Detroit);
        assert_eq!(format_event_time(utc, Detroit), "2:05 PM");
    }
}
