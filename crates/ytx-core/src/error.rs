use thiserror::Error;

/// A convenience `Result` alias using [`YtxError`].
pub type YtxResult<T> = Result<T, YtxError>;

/// Top-level error type for ytx.
///
/// Each variant corresponds to one reported failure class. None of them are
/// retried automatically; retry is always a user-initiated re-invocation.
#[derive(Error, Debug)]
pub enum YtxError {
    /// Missing or invalid configuration (e.g. no API key), detected before
    /// any network call.
    #[error("Config error: {0}")]
    Config(String),

    /// The vendor answered with a non-success HTTP status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// An HTTP-level failure that is not a vendor status error.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The request never reached the vendor (DNS, connect, reset).
    #[error("Network unreachable: {0}")]
    Network(String),

    /// The request exceeded its configured deadline.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Structured output could not be recovered from model text.
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// A cross-context send or route failed.
    #[error("Channel error: {0}")]
    Channel(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display_includes_status() {
        let err = YtxError::Api {
            status: 429,
            message: "slow down".into(),
        };
        assert_eq!(err.to_string(), "API error (429): slow down");
    }

    #[test]
    fn test_json_error_conversion() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: YtxError = parse.unwrap_err().into();
        assert!(matches!(err, YtxError::Json(_)));
    }
}
