use std::sync::Arc;
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::api_manager::ApiManager;
use crate::config::Config;
use crate::errors::{LarkError, LarkResult};
use crate::http_utils::{handle_api_response, parse_json_response};

/// One event as extracted from the plan text by the LLM. Times are raw
/// strings; normalization happens later in the itinerary pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedEvent {
    pub activity: String,
    pub location: String,
    #[serde(rename = "startTime")]
    pub start_time: String,
    #[serde(rename = "endTime")]
    pub end_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}

fn json_array_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)\[.*\]").expect("array pattern is valid"))
}

/// Client for the LLM plan-parsing endpoint (Anthropic messages API)
#[derive(Clone)]
pub struct PlanParser {
    config: Arc<RwLock<Config>>,
    http_client: reqwest::Client,
    api_manager: ApiManager,
}

impl PlanParser {
    pub fn new(config: Arc<RwLock<Config>>, api_manager: ApiManager) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
            api_manager,
        }
    }

    /// Parse free-text daily plans into structured events.
    ///
    /// Resubmitting identical text returns the cached result without
    /// spending API budget.
    pub async fn parse_plan(&self, plan_text: &str) -> LarkResult<Vec<ParsedEvent>> {
        if plan_text.trim().is_empty() {
            return Err(LarkError::Validation {
                field: "plan_text".to_string(),
                message: "plan text is empty".to_string(),
            });
        }

        let plan_hash = ApiManager::plan_hash(plan_text);
        if let Some(cached) = self.api_manager.get_cached_parse(&plan_hash) {
            let events: Vec<ParsedEvent> = serde_json::from_str(&cached)?;
            return Ok(events);
        }

        if !self.api_manager.can_make_api_call() {
            return Err(LarkError::ServiceUnavailable {
                service: "plan parser (daily call limit reached)".to_string(),
            });
        }

        let (api_key, model, max_tokens, temperature) = {
            let config = self.config.read();
            let api_key = config.get_api_key().ok_or_else(|| LarkError::Config {
                message: "API key not found. Set ai.api_key or the ANTHROPIC_API_KEY environment variable.".to_string(),
            })?;
            let (model, max_tokens, temperature) = config.get_api_config();
            (api_key, model, max_tokens, temperature)
        };

        let prompt = create_parse_prompt(plan_text);
        debug!("Sending plan parse request ({} chars of plan text)", plan_text.len());

        let request_body = serde_json::json!({
            "model": model,
            "max_tokens": max_tokens,
            "temperature": temperature,
            "messages": [{
                "role": "user",
                "content": prompt
            }]
        });

        let response = self.http_client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", api_key.as_str())
            .header("Content-Type", "application/json")
            .header("anthropic-version", "2023-06-01")
            .json(&request_body)
            .send()
            .await?;

        let response = handle_api_response(response, "Anthropic").await?;
        let messages: MessagesResponse = parse_json_response(response, "plan parse response").await?;

        let tokens_used = messages.usage.as_ref()
            .map(|u| u.input_tokens.unwrap_or(0) + u.output_tokens.unwrap_or(0))
            .unwrap_or(0);
        self.api_manager.record_api_call(tokens_used);

        let content = messages.content.first()
            .and_then(|block| block.text.as_deref())
            .ok_or_else(|| LarkError::Api {
                service: "Anthropic".to_string(),
                message: "response contained no text content".to_string(),
            })?;

        let events = parse_events_from_response(content)?;
        debug!("Parsed {} events from plan text", events.len());

        self.api_manager.cache_parse(plan_hash, serde_json::to_string(&events)?);
        Ok(events)
    }
}

/// Extract and validate the JSON event array from the model's reply.
/// The model is told to answer with only the array, but prose around it
/// is tolerated.
fn parse_events_from_response(content: &str) -> LarkResult<Vec<ParsedEvent>> {
    let json_text = json_array_pattern()
        .find(content)
        .map(|m| m.as_str())
        .ok_or_else(|| {
            warn!("No JSON array found in model response: {}", content);
            LarkError::Parsing {
                format: "JSON".to_string(),
                message: "no JSON array found in model response".to_string(),
            }
        })?;

    let events: Vec<ParsedEvent> = serde_json::from_str(json_text)?;

    for (index, event) in events.iter().enumerate() {
        if event.activity.trim().is_empty()
            || event.location.trim().is_empty()
            || event.start_time.trim().is_empty()
        {
            return Err(LarkError::Validation {
                field: format!("events[{}]", index),
                message: "activity, location and startTime are required".to_string(),
            });
        }
    }

    Ok(events)
}

fn create_parse_prompt(plan_text: &str) -> String {
    format!(r#"Parse this daily plan into structured events. For each event:
1. Create a simplified activity title by:
   - Removing location names from the activity
   - Using concise action verbs (e.g., "Get lunch" instead of "Get lunch at Restaurant X")
   - Keeping only the core activity description
2. Store the full location separately

Return ONLY a JSON array of objects with these exact fields:
- activity (string, simplified title)
- location (string, full location name)
- startTime (time of day, e.g. "11am" or "14:00")
- endTime (time of day; omit the field if the plan gives no end time)

Plan text: {plan_text}

Example transformations:
"Take the cable car to Ghirardelli Square for chocolate sampling" -> activity: "Sample chocolate"
"Get lunch at House of Prime Rib" -> activity: "Get lunch"
"Visit Golden Gate Bridge for photos" -> activity: "Take photos"

Important: Return ONLY the JSON array, no other text or explanation."#)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_array_from_surrounding_prose() {
        let content = r#"Here is the plan:
[{"activity": "Get lunch", "location": "House of Prime Rib", "startTime": "12pm"}]
Let me know if you need anything else."#;

        let events = parse_events_from_response(content).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].activity, "Get lunch");
        assert_eq!(events[0].end_time, None);
    }

    #[test]
    fn test_parses_end_time_when_present() {
        let content = r#"[{"activity": "Visit museum", "location": "SFMOMA", "startTime": "2pm", "endTime": "4pm"}]"#;
        let events = parse_events_from_response(content).unwrap();
        assert_eq!(events[0].end_time.as_deref(), Some("4pm"));
    }

    #[test]
    fn test_rejects_response_without_array() {
        let result = parse_events_from_response("I could not find any events in that plan.");
        assert!(matches!(result, Err(LarkError::Parsing { .. })));
    }

    #[test]
    fn test_rejects_events_with_blank_required_fields() {
        let content = r#"[{"activity": "", "location": "Somewhere", "startTime": "9am"}]"#;
        let result = parse_events_from_response(content);
        assert!(matches!(result, Err(LarkError::Validation { .. })));
    }

    #[test]
    fn test_missing_required_field_is_a_parse_error() {
        // serde enforces presence of activity/location/startTime
        let content = r#"[{"location": "Somewhere", "startTime": "9am"}]"#;
        assert!(parse_events_from_response(content).is_err());
    }
}
