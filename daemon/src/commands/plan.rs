use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use crate::formatter::TerminalFormatter;
use super::{Command, CommandContext};

/// Command to build today's itinerary from free-text plans
pub struct PlanCommand {
    pub text: String,
}

/// Command to print today's itinerary
pub struct ShowCommand;

/// Command to print schedule status
pub struct StatusCommand;

/// Command to check off an event by its position in the itinerary
pub struct DoneCommand {
    pub position: i64,
}

#[async_trait]
impl Command for PlanCommand {
    async fn execute(&mut self, context: &CommandContext) -> Result<()> {
        info!("Building itinerary from plan text");

        let events = context.itinerary.build_itinerary(&self.text).await?;
        println!("✅ Planned {} events for today", events.len());
        println!();

        let home_tz = context.config.read().get_timezone();
        let formatter = TerminalFormatter::new(true);
        print!("{}", formatter.format_itinerary(&events, home_tz));

        Ok(())
    }
}

#[async_trait]
impl Command for ShowCommand {
    async fn execute(&mut self, context: &CommandContext) -> Result<()> {
        let events = context.itinerary.todays_events(Utc::now())?;
        let home_tz = context.config.read().get_timezone();

        let formatter = TerminalFormatter::new(true);
        print!("{}", formatter.format_itinerary(&events, home_tz));

        Ok(())
    }
}

#[async_trait]
impl Command for StatusCommand {
    async fn execute(&mut self, context: &CommandContext) -> Result<()> {
        let now = Utc::now();
        let status = context.itinerary.schedule_status(now)?;
        let home_tz = context.config.read().get_timezone();

        let formatter = TerminalFormatter::new(true);
        print!("{}", formatter.format_status(&status, home_tz, now));

        Ok(())
    }
}

#[async_trait]
impl Command for DoneCommand {
    async fn execute(&mut self, context: &CommandContext) -> Result<()> {
        // CLI positions are 1-based to match the printed itinerary
        let position = self.position - 1;
        if position < 0 {
            println!("❌ Event numbers start at 1");
            return Ok(());
        }

        if context.itinerary.complete_event(position, Utc::now())? {
            println!("✅ Event {} checked off", self.position);
        } else {
            println!("❌ No event {} in today's plan", self.position);
        }

        Ok(())
    }
}
