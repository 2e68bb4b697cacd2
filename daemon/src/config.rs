use anyhow::{Result, Context};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::fs;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub general: GeneralConfig,
    pub ai: AiConfig,
    pub places: PlacesConfig,
    pub notifications: Option<NotificationSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Home timezone, used when a place lookup cannot resolve one
    pub timezone: String,
    /// Event duration to assume when the plan text omits an end time (minutes)
    pub default_event_duration_minutes: u32,
    /// How long past an event's end before the user counts as behind (minutes)
    pub late_grace_minutes: u32,
    /// How often the daemon loop re-checks schedule status (minutes)
    pub status_check_interval_minutes: u32,
    /// Log level
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// LLM provider: "anthropic"
    pub provider: String,
    /// Model name
    pub model: String,
    /// Maximum tokens for LLM responses
    pub max_tokens: u32,
    /// Temperature for LLM
    pub temperature: f32,
    /// API key for the AI provider (optional - falls back to environment variable)
    pub api_key: Option<String>,
    /// Daily cap on parse calls
    pub daily_call_limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacesConfig {
    /// Whether to enrich events with Google Places/Directions data
    pub enabled: bool,
    /// Google Maps Platform API key (optional - falls back to environment variable)
    pub api_key: Option<String>,
    /// Travel mode for directions: "driving", "walking", "bicycling", "transit"
    pub travel_mode: String,
    /// Maximum width for place photos (pixels)
    pub photo_max_width: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSettings {
    pub enabled: bool,
    pub notify_behind_schedule: bool,
    pub notification_timeout: u32, // milliseconds
    pub cooldown_minutes: u32,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            notify_behind_schedule: true,
            notification_timeout: 5000, // 5 seconds
            cooldown_minutes: 15,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig {
                timezone: "America/Detroit".to_string(),
                default_event_duration_minutes: 60,
                late_grace_minutes: 10,
                status_check_interval_minutes: 5,
                log_level: "info".to_string(),
            },
            ai: AiConfig {
                provider: "anthropic".to_string(),
                model: "claude-sonnet-4-20250514".to_string(),
                max_tokens: 1024,
                temperature: 0.2,
                api_key: None, // Falls back to ANTHROPIC_API_KEY environment variable
                daily_call_limit: 200,
            },
            places: PlacesConfig {
                enabled: true,
                api_key: None, // Falls back to GOOGLE_MAPS_API_KEY environment variable
                travel_mode: "driving".to_string(),
                photo_max_width: 400,
            },
            notifications: Some(NotificationSettings::default()),
        }
    }
}

impl Config {
    pub async fn load() -> Result<Arc<RwLock<Config>>> {
        let config_path = Self::get_config_path()?;

        let config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).await
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

            toml::from_str(&content)
                .with_context(|| "Failed to parse config file")?
        } else {
            info!("Config file not found, creating default configuration");
            let default_config = Config::default();
            default_config.save().await?;
            default_config
        };

        Ok(Arc::new(RwLock::new(config)))
    }

    pub async fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;

        // Ensure config directory exists
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).await
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        fs::write(&config_path, content).await
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        info!("Configuration saved to {:?}", config_path);
        Ok(())
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("lark");

        Ok(config_dir.join("config.toml"))
    }

    pub fn get_database_path(&self) -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap().join(".local/share"))
            .join("lark")
            .join("itinerary.db")
    }

    /// Get home timezone as parsed Tz object, falling back to UTC if invalid
    pub fn get_timezone(&self) -> chrono_tz::Tz {
        self.general.timezone.parse::<chrono_tz::Tz>()
            .unwrap_or(chrono_tz::UTC)
    }

    /// Get LLM API key from config or environment variable
    pub fn get_api_key(&self) -> Option<String> {
        self.ai.api_key.clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
    }

    /// Get Google Maps API key from config or environment variable
    pub fn get_maps_api_key(&self) -> Option<String> {
        self.places.api_key.clone()
            .or_else(|| std::env::var("GOOGLE_MAPS_API_KEY").ok())
    }

    /// Get API configuration (model, max_tokens, temperature)
    pub fn get_api_config(&self) -> (String, u32, f32) {
        (
            self.ai.model.clone(),
            self.ai.max_tokens,
            self.ai.temperature,
        )
    }

    /// Get default event duration as chrono Duration
    pub fn get_default_event_duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.general.default_event_duration_minutes as i64)
    }

    /// Get the grace period before an unfinished event counts as running late
    pub fn get_late_grace(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.general.late_grace_minutes as i64)
    }

    /// Get travel mode, normalized to the values the Directions API accepts
    pub fn get_travel_mode(&self) -> String {
        match self.places.travel_mode.as_str() {
            mode @ ("driving" | "walking" | "bicycling" | "transit") => mode.to_string(),
            _ => "driving".to_string(),
        }
    }

    /// Get notification settings
    pub fn get_notification_settings(&self) -> Option<&NotificationSettings> {
        self.notifications.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.general.timezone, config.general.timezone);
        assert_eq!(parsed.ai.model, config.ai.model);
        assert_eq!(parsed.places.travel_mode, config.places.travel_mode);
    }

    #[test]
    fn test_invalid_timezone_falls_back_to_utc() {
        let mut config = Config::default();
        config.general.timezone = "Not/AZone".to_string();
        assert_eq!(config.get_timezone(), chrono_tz::UTC);
    }

    #[test]
    fn test_unknown_travel_mode_defaults_to_driving() {
        let mut config = Config::default();
        config.places.travel_mode = "teleport".to_string();
        assert_eq!(config.get_travel_mode(), "driving");
    }
}
