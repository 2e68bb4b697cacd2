use thiserror::Error;

/// Structured error types for the Lark itinerary daemon
#[derive(Error, Debug, Clone)]
#[allow(dead_code)]
pub enum LarkError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Database operation errors
    #[error("Database error: {operation} failed: {message}")]
    Database {
        operation: String,
        message: String,
    },

    /// API call errors (plan parsing LLM, Google Maps, etc.)
    #[error("API error: {service} API call failed: {message}")]
    Api { service: String, message: String },

    /// Network connectivity errors
    #[error("Network error: {message}")]
    Network { message: String },

    /// File system errors
    #[error("File system error: {operation} failed for path '{path}': {message}")]
    FileSystem {
        operation: String,
        path: String,
        message: String,
    },

    /// Parsing errors (JSON, TOML, time tokens)
    #[error("Parsing error: Failed to parse {format}: {message}")]
    Parsing {
        format: String,
        message: String,
    },

    /// Timeout errors
    #[error("Timeout error: {operation} timed out after {timeout_seconds}s")]
    Timeout {
        operation: String,
        timeout_seconds: u64,
    },

    /// Validation errors
    #[error("Validation error: {field} is invalid: {message}")]
    Validation { field: String, message: String },

    /// Service unavailable errors
    #[error("Service unavailable: {service} is not configured or not available")]
    ServiceUnavailable { service: String },

    /// Internal errors that shouldn't happen
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Result type alias using LarkError
pub type LarkResult<T> = std::result::Result<T, LarkError>;

/// Convert anyhow::Error to LarkError
impl From<anyhow::Error> for LarkError {
    fn from(error: anyhow::Error) -> Self {
        Self::Internal {
            message: error.to_string(),
        }
    }
}

/// Convert std::io::Error to LarkError
impl From<std::io::Error> for LarkError {
    fn from(error: std::io::Error) -> Self {
        Self::FileSystem {
            operation: "unknown".to_string(),
            path: "unknown".to_string(),
            message: error.to_string(),
        }
    }
}

/// Convert rusqlite::Error to LarkError
impl From<rusqlite::Error> for LarkError {
    fn from(error: rusqlite::Error) -> Self {
        Self::Database {
            operation: "sql_operation".to_string(),
            message: error.to_string(),
        }
    }
}

/// Convert serde_json::Error to LarkError
impl From<serde_json::Error> for LarkError {
    fn from(error: serde_json::Error) -> Self {
        Self::Parsing {
            format: "JSON".to_string(),
            message: error.to_string(),
        }
    }
}

/// Convert toml::de::Error to LarkError
impl From<toml::de::Error> for LarkError {
    fn from(error: toml::de::Error) -> Self {
        Self::Parsing {
            format: "TOML".to_string(),
            message: error.to_string(),
        }
    }
}

/// Convert reqwest::Error to LarkError
impl From<reqwest::Error> for LarkError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout {
                operation: "HTTP request".to_string(),
                timeout_seconds: 30, // Default assumption
            }
        } else if error.is_connect() {
            Self::Network {
                message: format!("Connection failed: {}", error),
            }
        } else {
            Self::Api {
                service: "HTTP".to_string(),
                message: error.to_string(),
            }
        }
    }
}
