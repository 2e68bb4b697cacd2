use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::itinerary::ScheduleStatus;
use crate::notification::{NotificationService, ScheduleNotification};
use super::{Command, CommandContext};

/// Command to start the schedule-watch daemon loop
pub struct StartCommand;

/// Command to drop the cached plan parse
pub struct ClearCacheCommand;

/// Command to remove all stored plans and events
pub struct CleanDatabaseCommand;

/// Command to test the notification system
pub struct TestNotificationCommand;

#[async_trait]
impl Command for StartCommand {
    async fn execute(&mut self, context: &CommandContext) -> Result<()> {
        info!("Starting Lark schedule watch");

        let (interval_minutes, settings) = {
            let config = context.config.read();
            (
                config.general.status_check_interval_minutes.max(1) as u64,
                config.get_notification_settings().cloned().unwrap_or_default(),
            )
        };

        let notifications = NotificationService::new(settings);
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_minutes * 60));
        let mut was_behind = false;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match context.itinerary.schedule_status(Utc::now()) {
                        Ok(status) => {
                            was_behind = handle_status(&notifications, status, was_behind);
                        }
                        Err(e) => warn!("Schedule status check failed: {}", e),
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received, stopping daemon");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Raise notifications on status transitions; returns whether the user is
/// currently behind.
fn handle_status(
    notifications: &NotificationService,
    status: ScheduleStatus,
    was_behind: bool,
) -> bool {
    match status {
        ScheduleStatus::Behind { event, minutes_late } => {
            debug!("Behind schedule: '{}' is {} minutes overdue", event.title, minutes_late);
            if let Err(e) = notifications.notify(ScheduleNotification::BehindSchedule {
                event_title: event.title,
                minutes_late,
            }) {
                warn!("Failed to send behind-schedule notification: {}", e);
            }
            true
        }
        ScheduleStatus::OnTrack { .. } | ScheduleStatus::Done => {
            if was_behind {
                if let Err(e) = notifications.notify(ScheduleNotification::BackOnTrack) {
                    warn!("Failed to send back-on-track notification: {}", e);
                }
            }
            false
        }
        ScheduleStatus::NoPlan => false,
    }
}

#[async_trait]
impl Command for ClearCacheCommand {
    async fn execute(&mut self, context: &CommandContext) -> Result<()> {
        context.itinerary.api_manager().clear_cache();
        info!("Parse cache cleared");
        println!("✅ Parse cache cleared");
        Ok(())
    }
}

#[async_trait]
impl Command for CleanDatabaseCommand {
    async fn execute(&mut self, context: &CommandContext) -> Result<()> {
        let removed = context.database.clear_all()?;
        println!("✅ Removed {} stored plans", removed);
        Ok(())
    }
}

#[async_trait]
impl Command for TestNotificationCommand {
    async fn execute(&mut self, context: &CommandContext) -> Result<()> {
        info!("Testing notification system...");

        let settings = context.config.read()
            .get_notification_settings()
            .cloned()
            .unwrap_or_default();

        if !settings.enabled {
            println!("❌ Notifications are disabled in the config");
            return Ok(());
        }

        let notifications = NotificationService::new(settings);
        notifications.notify(ScheduleNotification::Test)?;
        println!("✅ Test notification sent");
        Ok(())
    }
}
