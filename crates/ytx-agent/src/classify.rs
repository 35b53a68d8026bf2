//! Mapping of vendor HTTP failures to user-facing categories.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ytx_core::YtxError;

use crate::config::LlmProvider;

/// Longest body excerpt echoed by the fallback category.
const MAX_BODY_EXCERPT: usize = 200;

const AUTH_WORDS: &[&str] = &[
    "invalid api key",
    "invalid_api_key",
    "invalid x-api-key",
    "api key not valid",
    "unauthorized",
    "authentication_error",
];
const QUOTA_WORDS: &[&str] = &["quota", "billing", "exceeded", "insufficient"];
const LENGTH_WORDS: &[&str] = &["token", "too long", "context length", "context_length", "length"];

/// What went wrong, in terms a user can act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Key missing from the request; detected before any network call.
    MissingApiKey,
    /// Key rejected by the vendor.
    Auth,
    /// Billing or quota exhausted.
    Quota,
    /// Too many requests; try again shortly.
    RateLimit,
    /// Prompt plus completion exceeds the model's context.
    ContextTooLong,
    /// Model id unknown or not available to this key.
    ModelUnavailable,
    /// Vendor-side outage (5xx).
    ServerError,
    /// The request never reached the vendor.
    Network,
    /// The request exceeded its deadline.
    Timeout,
    /// Anything else; the message echoes the response body.
    Unknown,
}

impl ErrorCategory {
    /// Whether re-issuing the same request may succeed.
    ///
    /// Nothing in ytx retries automatically; this only shapes the message.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorCategory::RateLimit
                | ErrorCategory::ServerError
                | ErrorCategory::Network
                | ErrorCategory::Timeout
        )
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCategory::MissingApiKey => "missing_api_key",
            ErrorCategory::Auth => "auth",
            ErrorCategory::Quota => "quota",
            ErrorCategory::RateLimit => "rate_limit",
            ErrorCategory::ContextTooLong => "context_too_long",
            ErrorCategory::ModelUnavailable => "model_unavailable",
            ErrorCategory::ServerError => "server_error",
            ErrorCategory::Network => "network",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A categorized failure with its rendered message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ClassifiedError {
    pub category: ErrorCategory,
    /// HTTP status, absent for failures before a response.
    pub status: Option<u16>,
    pub message: String,
}

impl ClassifiedError {
    pub fn new(category: ErrorCategory, status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            category,
            status,
            message: message.into(),
        }
    }

    pub fn missing_api_key(provider: LlmProvider) -> Self {
        Self::new(
            ErrorCategory::MissingApiKey,
            None,
            format!("No {provider} API key configured; add one in the settings"),
        )
    }

    pub fn network(detail: impl fmt::Display) -> Self {
        Self::new(
            ErrorCategory::Network,
            None,
            format!("Network unreachable; check your connection ({detail})"),
        )
    }

    pub fn timeout(after: std::time::Duration) -> Self {
        Self::new(
            ErrorCategory::Timeout,
            None,
            format!("Request timed out after {after:?}"),
        )
    }
}

impl From<ClassifiedError> for YtxError {
    fn from(err: ClassifiedError) -> Self {
        match (err.category, err.status) {
            (ErrorCategory::MissingApiKey, _) => YtxError::Config(err.message),
            (ErrorCategory::Network, _) => YtxError::Network(err.message),
            (ErrorCategory::Timeout, _) => YtxError::Timeout(err.message),
            (_, Some(status)) => YtxError::Api {
                status,
                message: err.message,
            },
            (_, None) => YtxError::Http(err.message),
        }
    }
}

/// Classifies a non-success response. Pure; first match wins.
pub fn classify(status: u16, body: &str, provider: LlmProvider) -> ClassifiedError {
    let lower = body.to_lowercase();
    let mentions = |words: &[&str]| words.iter().any(|w| lower.contains(*w));

    let (category, message) = if status == 401 || status == 403 || mentions(AUTH_WORDS) {
        (
            ErrorCategory::Auth,
            format!("{provider} rejected the API key; check it in the settings"),
        )
    } else if status == 429 && mentions(QUOTA_WORDS) {
        (
            ErrorCategory::Quota,
            format!("{provider} quota or billing limit reached; check your plan"),
        )
    } else if status == 429 {
        (
            ErrorCategory::RateLimit,
            format!("{provider} rate limit hit; wait a moment and try again"),
        )
    } else if status == 400 && mentions(LENGTH_WORDS) {
        (
            ErrorCategory::ContextTooLong,
            "The transcript is too long for this model; try a model with a larger context".to_string(),
        )
    } else if (status == 400 && lower.contains("model")) || status == 404 {
        (
            ErrorCategory::ModelUnavailable,
            format!("The selected {provider} model is unavailable; pick another model"),
        )
    } else if status >= 500 {
        (
            ErrorCategory::ServerError,
            format!("{provider} is having trouble ({status}); try again later"),
        )
    } else {
        (
            ErrorCategory::Unknown,
            format!("API error ({status}): {}", truncate(body.trim(), MAX_BODY_EXCERPT)),
        )
    };

    ClassifiedError::new(category, Some(status), message)
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_converts_into_ytx_error() {
        let err: YtxError = ClassifiedError::missing_api_key(LlmProvider::Claude).into();
        assert!(matches!(err, YtxError::Config(_)));

        let err: YtxError = classify(401, "invalid x-api-key", LlmProvider::Claude).into();
        assert!(matches!(err, YtxError::Api { status: 401, .. }));

        let err: YtxError = ClassifiedError::timeout(Duration::from_secs(5)).into();
        assert!(matches!(err, YtxError::Timeout(_)));

        let err: YtxError = ClassifiedError::network("connection refused").into();
        assert!(matches!(err, YtxError::Network(_)));

        let err: YtxError = ClassifiedError::new(ErrorCategory::Unknown, None, "empty").into();
        assert!(matches!(err, YtxError::Http(_)));
    }

    #[test]
    fn test_display_is_user_message() {
        let err = ClassifiedError::timeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "Request timed out after 250ms");
    }

    #[test]
    fn test_auth_by_status() {
        for body in ["", "anything", "{\"error\":\"quota\"}"] {
            let c = classify(401, body, LlmProvider::Claude);
            assert_eq!(c.category, ErrorCategory::Auth);
            assert_eq!(c, classify(401, body, LlmProvider::Claude));
        }
        assert_eq!(classify(403, "", LlmProvider::Gemini).category, ErrorCategory::Auth);
    }

    #[test]
    fn test_auth_by_body() {
        let body = r#"{"error":{"message":"API key not valid. Please pass a valid API key."}}"#;
        assert_eq!(classify(400, body, LlmProvider::Gemini).category, ErrorCategory::Auth);
    }

    #[test]
    fn test_quota_beats_rate_limit() {
        let body = r#"{"error":{"message":"You exceeded your current quota","type":"insufficient_quota"}}"#;
        assert_eq!(classify(429, body, LlmProvider::OpenAi).category, ErrorCategory::Quota);
        assert_eq!(
            classify(429, "slow down", LlmProvider::OpenAi).category,
            ErrorCategory::RateLimit
        );
    }

    #[test]
    fn test_context_length() {
        let body = r#"{"error":{"message":"prompt is too long: 250000 tokens > 200000 maximum"}}"#;
        assert_eq!(
            classify(400, body, LlmProvider::Claude).category,
            ErrorCategory::ContextTooLong
        );
    }

    #[test]
    fn test_model_unavailable() {
        assert_eq!(
            classify(400, "model: gpt-9 does not exist", LlmProvider::OpenAi).category,
            ErrorCategory::ModelUnavailable
        );
        assert_eq!(
            classify(404, "not found", LlmProvider::Gemini).category,
            ErrorCategory::ModelUnavailable
        );
    }

    #[test]
    fn test_server_error() {
        let c = classify(529, "overloaded", LlmProvider::Claude);
        assert_eq!(c.category, ErrorCategory::ServerError);
        assert!(c.category.is_retryable());
        assert_eq!(c.status, Some(529));
    }

    #[test]
    fn test_unknown_echoes_truncated_body() {
        let body = "é".repeat(300);
        let c = classify(418, &body, LlmProvider::Claude);
        assert_eq!(c.category, ErrorCategory::Unknown);
        assert!(c.message.starts_with("API error (418): "));
        assert!(c.message.ends_with("..."));
        assert_eq!(c.message.chars().filter(|&ch| ch == 'é').count(), 200);
    }

    #[test]
    fn test_timeout_message() {
        let c = ClassifiedError::timeout(std::time::Duration::from_secs(300));
        assert_eq!(c.message, "Request timed out after 300s");
        assert_eq!(c.category, ErrorCategory::Timeout);
    }

    #[test]
    fn test_retryable() {
        assert!(!ErrorCategory::Auth.is_retryable());
        assert!(!ErrorCategory::Quota.is_retryable());
        assert!(ErrorCategory::RateLimit.is_retryable());
        assert!(ErrorCategory::Timeout.is_retryable());
    }
}
