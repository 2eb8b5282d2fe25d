//! Failure reasons shared by the forecast and holiday clients.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Transport failure or a non-success status other than an auth rejection.
    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to parse response: {0}")]
    Parsing(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Unexpected error: {0}")]
    Unknown(String),
}

impl ApiError {
    /// Message suitable for a status line.
    pub fn user_message(&self, resource: &str) -> String {
        match self {
            Self::Network(_) => "Check your internet connection.".to_string(),
            Self::Parsing(_) => format!("Could not read {resource} data, retrying shortly."),
            Self::Unauthorized(_) => format!("{resource} API key was rejected."),
            Self::Unknown(_) => format!("{resource} information is unavailable."),
        }
    }

    /// Whether the refresher should schedule a retry itself.
    ///
    /// Network failures are left to the connectivity monitor.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Parsing(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Parsing(err.to_string())
        } else if err.is_builder() {
            Self::Unknown(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parsing(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_parsing_is_retryable() {
        assert!(ApiError::Parsing("x".into()).is_retryable());
        assert!(!ApiError::Network("x".into()).is_retryable());
        assert!(!ApiError::Unauthorized("x".into()).is_retryable());
        assert!(!ApiError::Unknown("x".into()).is_retryable());
    }

    #[test]
    fn user_messages_name_the_resource() {
        assert!(ApiError::Unauthorized("401".into()).user_message("Weather").contains("Weather"));
        assert!(ApiError::Parsing("eof".into()).user_message("Holiday").contains("Holiday"));
        assert!(ApiError::Network("dns".into()).user_message("Holiday").contains("connection"));
    }

    #[test]
    fn json_errors_map_to_parsing() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(ApiError::from(err), ApiError::Parsing(_)));
    }
}
