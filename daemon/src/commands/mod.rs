use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::config::Config;
use crate::database::Database;
use crate::itinerary::ItineraryService;

pub mod auth;
pub mod daemon_ops;
pub mod plan;

/// Trait for all command implementations
#[async_trait]
pub trait Command {
    /// Execute the command with the provided context
    async fn execute(&mut self, context: &CommandContext) -> Result<()>;
}

/// Shared context for all commands
pub struct CommandContext {
    pub config: Arc<RwLock<Config>>,
    pub database: Database,
    pub itinerary: ItineraryService,
    pub debug: bool,
}

impl CommandContext {
    pub fn new(
        config: Arc<RwLock<Config>>,
        database: Database,
        itinerary: ItineraryService,
        debug: bool,
    ) -> Self {
        Self {
            config,
            database,
            itinerary,
            debug,
        }
    }
}
