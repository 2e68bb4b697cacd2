use anyhow::Result;
use chrono::{DateTime, Utc};
use notify_rust::{Notification, Timeout, Urgency};
use std::sync::Arc;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::config::NotificationSettings;

/// Notification types raised by the schedule watch loop
#[derive(Debug, Clone)]
pub enum ScheduleNotification {
    BehindSchedule { event_title: String, minutes_late: i64 },
    BackOnTrack,
    Test,
}

/// Service for desktop notifications about schedule status changes
pub struct NotificationService {
    settings: NotificationSettings,
    last_notification: Arc<RwLock<Option<DateTime<Utc>>>>,
}

impl NotificationService {
    pub fn new(settings: NotificationSettings) -> Self {
        Self {
            settings,
            last_notification: Arc::new(RwLock::new(None)),
        }
    }

    /// Send a notification if configured and not on cooldown
    pub fn notify(&self, notification: ScheduleNotification) -> Result<()> {
        if !self.settings.enabled {
            debug!("Notifications disabled, skipping");
            return Ok(());
        }

        let should_send = match &notification {
            ScheduleNotification::BehindSchedule { .. } => self.settings.notify_behind_schedule,
            ScheduleNotification::BackOnTrack => self.settings.notify_behind_schedule,
            ScheduleNotification::Test => true,
        };

        if !should_send {
            debug!("Notification type disabled in config: {:?}", notification);
            return Ok(());
        }

        // Test notifications bypass the cooldown so the CLI command always fires
        if !matches!(notification, ScheduleNotification::Test) && !self.is_cooldown_expired() {
            debug!("Notification on cooldown, skipping");
            return Ok(());
        }

        match self.send_desktop_notification(&notification) {
            Ok(_) => {
                self.update_last_notification_time();
                debug!("Notification sent: {:?}", notification);
            }
            Err(e) => {
                warn!("Failed to send notification: {}", e);
            }
        }

        Ok(())
    }

    fn send_desktop_notification(&self, notification: &ScheduleNotification) -> Result<()> {
        let (summary, body, urgency) = self.format_notification(notification);

        Notification::new()
            .appname("Lark")
            .summary(&summary)
            .body(&body)
            .urgency(urgency)
            .timeout(Timeout::Milliseconds(self.settings.notification_timeout))
            .show()?;

        Ok(())
    }

    fn format_notification(&self, notification: &ScheduleNotification) -> (String, String, Urgency) {
        match notification {
            ScheduleNotification::BehindSchedule { event_title, minutes_late } => (
                "Running behind schedule".to_string(),
                format!("\"{}\" ended {} minutes ago and isn't checked off yet.", event_title, minutes_late),
                Urgency::Normal,
            ),
            ScheduleNotification::BackOnTrack => (
                "Back on track".to_string(),
                "You've caught up with today's plan.".to_string(),
                Urgency::Low,
            ),
            ScheduleNotification::Test => (
                "Lark notification test".to_string(),
                "If you can read this, schedule notifications are working.".to_string(),
                Urgency::Low,
            ),
        }
    }

    fn is_cooldown_expired(&self) -> bool {
        let last = self.last_notification.read();
        match *last {
            Some(timestamp) => {
                let cooldown = chrono::Duration::minutes(self.settings.cooldown_minutes as i64);
                Utc::now() - timestamp >= cooldown
            }
            None => true,
        }
    }

    fn update_last_notification_time(&self) {
        *self.last_notification.write() = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> NotificationSettings {
        NotificationSettings {
            enabled: true,
            notify_behind_schedule: true,
            notification_timeout: 5000,
            cooldown_minutes: 15,
        }
    }

    #[test]
    fn test_cooldown_starts_expired() {
        let service = NotificationService::new(settings());
        assert!(service.is_cooldown_expired());
    }

    #[test]
    fn test_cooldown_blocks_after_send() {
        let service = NotificationService::new(settings());
        service.update_last_notification_time();
        assert!(!service.is_cooldown_expired());
    }

    #[test]
    fn test_disabled_notifications_are_noops() {
        let mut disabled = settings();
        disabled.enabled = false;
        let service = NotificationService::new(disabled);

        // Must not error even without a notification daemon present
        service.notify(ScheduleNotification::BackOnTrack).unwrap();
        assert!(service.last_notification.read().is_none());
    }

    #[test]
    fn test_behind_schedule_formatting() {
        let service = NotificationService::new(settings());
        let (summary, body, _) = service.format_notification(&ScheduleNotification::BehindSchedule {
            event_title: "Get lunch".to_string(),
            minutes_late: 25,
        });
        assert_eq!(summary, "Running behind schedule");
        assert!(body.contains("Get lunch"));
        assert!(body.contains("25 minutes"));
    }
}
