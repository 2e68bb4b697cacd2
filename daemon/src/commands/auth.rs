use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::{Command, CommandContext};

/// Command to set the LLM API key
pub struct SetApiKeyCommand {
    pub api_key: String,
}

/// Command to set the Google Maps Platform API key
pub struct SetMapsKeyCommand {
    pub api_key: String,
}

#[async_trait]
impl Command for SetApiKeyCommand {
    async fn execute(&mut self, context: &CommandContext) -> Result<()> {
        if self.api_key.trim().is_empty() {
            println!("❌ API key cannot be empty");
            return Ok(());
        }

        let config = {
            let mut config_guard = context.config.write();
            config_guard.ai.api_key = Some(self.api_key.trim().to_string());
            config_guard.clone()
        };
        config.save().await?;

        info!("LLM API key updated");
        println!("✅ API key saved to {:?}", crate::config::Config::get_config_path()?);
        Ok(())
    }
}

#[async_trait]
impl Command for SetMapsKeyCommand {
    async fn execute(&mut self, context: &CommandContext) -> Result<()> {
        if self.api_key.trim().is_empty() {
            println!("❌ API key cannot be empty");
            return Ok(());
        }

        let config = {
            let mut config_guard = context.config.write();
            config_guard.places.api_key = Some(self.api_key.trim().to_string());
            config_guard.places.enabled = true;
            config_guard.clone()
        };
        config.save().await?;

        info!("Google Maps API key updated");
        println!("✅ Maps key saved to {:?}", crate::config::Config::get_config_path()?);
        Ok(())
    }
}
