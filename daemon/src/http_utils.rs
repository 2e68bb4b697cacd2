//! HTTP utility functions for consistent error handling across API clients

use reqwest::Response;
use tracing::warn;

use crate::errors::{LarkError, LarkResult};

/// Handle a REST API response with consistent logging and error formatting
pub async fn handle_api_response(response: Response, service: &str) -> LarkResult<Response> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        warn!("{} API error: {} - {}", service, status, error_text);
        return Err(LarkError::Api {
            service: service.to_string(),
            message: format!("{} - {}", status, error_text),
        });
    }
    Ok(response)
}

/// Parse a JSON response body with consistent error handling
pub async fn parse_json_response<T>(response: Response, context: &str) -> LarkResult<T>
where
    T: serde::de::DeserializeOwned,
{
    response.json().await
        .map_err(|e| LarkError::Parsing {
            format: "JSON".to_string(),
            message: format!("{}: {}", context, e),
        })
}
