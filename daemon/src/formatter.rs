use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::database::StoredEvent;
use crate::itinerary::ScheduleStatus;
use crate::time_parse;

/// Terminal formatter for itinerary output with color support
pub struct TerminalFormatter {
    pub use_colors: bool,
}

impl TerminalFormatter {
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.use_colors {
            match color {
                "red" => format!("\x1b[31m{}\x1b[0m", text),
                "green" => format!("\x1b[32m{}\x1b[0m", text),
                "blue" => format!("\x1b[34m{}\x1b[0m", text),
                "gray" => format!("\x1b[90m{}\x1b[0m", text),
                "bold" => format!("\x1b[1m{}\x1b[0m", text),
                _ => text.to_string(),
            }
        } else {
            text.to_string()
        }
    }

    fn event_timezone(&self, event: &StoredEvent, home_tz: Tz) -> Tz {
        event.timezone.parse::<Tz>().unwrap_or(home_tz)
    }

    /// Render a day's itinerary as a list of event cards
    pub fn format_itinerary(&self, events: &[StoredEvent], home_tz: Tz) -> String {
        if events.is_empty() {
            return self.format_empty();
        }

        let mut output = String::new();

        output.push_str(&self.colorize("Today's Plan", "bold"));
        output.push('\n');
        output.push_str(&self.colorize("════════════", "gray"));
        output.push_str("\n\n");

        for (i, event) in events.iter().enumerate() {
            let tz = self.event_timezone(event, home_tz);
            let start = Utc.timestamp_opt(event.start_time, 0).single();
            let end = Utc.timestamp_opt(event.end_time, 0).single();

            if let Some(minutes) = event.travel_minutes {
                output.push_str(&self.colorize(&format!("   │ {} min travel", minutes), "gray"));
                output.push('\n');
            }

            let check = if event.completed { "✔" } else { " " };
            let check_color = if event.completed { "green" } else { "gray" };
            output.push_str(&format!("{}. [{}] ", i + 1, self.colorize(check, check_color)));
            output.push_str(&self.colorize(&event.title, "bold"));
            output.push('\n');
            output.push_str(&format!("       {}\n", event.location));

            if let (Some(start), Some(end)) = (start, end) {
                let line = format!(
                    "       {} to {}",
                    time_parse::format_event_time(start, tz),
                    time_parse::format_event_time(end, tz),
                );
                output.push_str(&self.colorize(&line, "blue"));
                output.push('\n');
            }

            if let Some(photo_url) = &event.photo_url {
                output.push_str(&self.colorize(&format!("       {}", photo_url), "gray"));
                output.push('\n');
            }

            if i < events.len() - 1 {
                output.push('\n');
            }
        }

        output
    }

    /// Render schedule status the way the status header shows it
    pub fn format_status(&self, status: &ScheduleStatus, home_tz: Tz, now: DateTime<Utc>) -> String {
        let mut output = String::new();

        let clock = now.with_timezone(&home_tz).format("%-I:%M %p").to_string();
        output.push_str(&self.colorize(&format!("🕐 {}", clock), "bold"));
        output.push('\n');

        match status {
            ScheduleStatus::NoPlan => {
                output.push_str(&self.colorize("No plan for today yet", "gray"));
            }
            ScheduleStatus::OnTrack { next } => {
                output.push_str(&self.colorize("You're on track", "green"));
                if let Some(event) = next {
                    let tz = self.event_timezone(event, home_tz);
                    if let Some(start) = Utc.timestamp_opt(event.start_time, 0).single() {
                        output.push('\n');
                        output.push_str(&format!(
                            "Next: {} at {}",
                            event.title,
                            time_parse::format_event_time(start, tz)
                        ));
                    }
                }
            }
            ScheduleStatus::Behind { event, minutes_late } => {
                output.push_str(&self.colorize("You're running behind schedule", "red"));
                output.push('\n');
                output.push_str(&format!(
                    "\"{}\" ended {} minutes ago and isn't checked off",
                    event.title, minutes_late
                ));
            }
            ScheduleStatus::Done => {
                output.push_str(&self.colorize("All done for today", "green"));
            }
        }

        output.push('\n');
        output
    }

    fn format_empty(&self) -> String {
        let mut output = String::new();
        output.push_str(&self.colorize("📅 Lark", "bold"));
        output.push('\n');
        output.push_str(&self.colorize("No plan for today. Submit one with 'lark-daemon plan'.", "gray"));
        output.push('\n');
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::Los_Angeles;

    fn event(title: &str, start: i64, travel: Option<i64>) -> StoredEvent {
        StoredEvent {
            id: 1,
            plan_id: 1,
            position: 0,
            title: title.to_string(),
            location: "Ferry Building, San Francisco".to_string(),
            start_time: start,
            end_time: start + 3600,
            timezone: "America/Los_Angeles".to_string(),
            place_id: None,
            photo_url: Some("https://example.com/photo.jpg".to_string()),
            latitude: None,
            longitude: None,
            travel_minutes: travel,
            completed: false,
        }
    }

    #[test]
    fn test_itinerary_shows_local_times() {
        let formatter = TerminalFormatter::new(false);
        // 2025-06-14 19:00 UTC == 12:00 PM in Los Angeles
        let output = formatter.format_itinerary(&[event("Get lunch", 1_749_927_600, None)], Los_Angeles);

        assert!(output.contains("Get lunch"));
        assert!(output.contains("Ferry Building"));
        assert!(output.contains("12:00 PM to 1:00 PM"));
        assert!(output.contains("https://example.com/photo.jpg"));
    }

    #[test]
    fn test_travel_time_rendered_between_stops() {
        let formatter = TerminalFormatter::new(false);
        let output = formatter.format_itinerary(
            &[event("Get lunch", 1_749_927_600, None), event("Visit museum", 1_749_934_800, Some(25))],
            Los_Angeles,
        );
        assert!(output.contains("25 min travel"));
    }

    #[test]
    fn test_empty_itinerary_message() {
        let formatter = TerminalFormatter::new(false);
        let output = formatter.format_itinerary(&[], Los_Angeles);
        assert!(output.contains("No plan for today"));
    }

    #[test]
    fn test_status_lines() {
        let formatter = TerminalFormatter::new(false);
        let now = Utc::now();

        let behind = ScheduleStatus::Behind { event: event("Get lunch", 0, None), minutes_late: 30 };
        let output = formatter.format_status(&behind, Los_Angeles, now);
        assert!(output.contains("You're running behind schedule"));
        assert!(output.contains("30 minutes"));

        let on_track = ScheduleStatus::OnTrack { next: None };
        assert!(formatter.format_status(&on_track, Los_Angeles, now).contains("You're on track"));
    }
}
