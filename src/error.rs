// =============================================================================
// Engine Error Taxonomy
// =============================================================================
//
// Validation and resource errors are raised before any upstream I/O starts.
// Upstream errors come from the exchange (REST or websocket). Malformed
// upstream payloads are a separate kind because the live feed logs and drops
// them instead of tearing the connection down.
//
// Numeric edge cases are never errors: indicators return NaN or their
// documented sentinel instead.
// =============================================================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed symbol / interval / window parameters.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A batch stream asked for more symbols than one request may carry.
    /// Kept apart from `Validation` so callers can chunk and retry.
    #[error("too many symbols: requested {requested}, maximum is {max}")]
    TooManySymbols { requested: usize, max: usize },

    /// Oversized request (candle count, window length).
    #[error("request too large: {0}")]
    RequestTooLarge(String),

    /// Exchange REST / websocket failure.
    #[error("upstream failure: {0}")]
    Upstream(String),

    /// A single upstream message could not be decoded.
    #[error("malformed upstream message: {0}")]
    Malformed(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Stable machine-readable kind, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::TooManySymbols { .. } => "too_many_symbols",
            Self::RequestTooLarge(_) => "request_too_large",
            Self::Upstream(_) => "upstream",
            Self::Malformed(_) => "malformed",
            Self::Internal(_) => "internal",
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether a retry with the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Upstream(_))
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        Self::Upstream(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for EngineError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Upstream(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        Self::Malformed(e.to_string())
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_distinct_for_resource_and_validation() {
        let too_many = EngineError::TooManySymbols { requested: 80, max: 50 };
        let invalid = EngineError::validation("bad interval");
        assert_eq!(too_many.kind(), "too_many_symbols");
        assert_eq!(invalid.kind(), "validation");
        assert!(too_many.to_string().contains("80"));
    }

    #[test]
    fn only_upstream_is_retryable() {
        assert!(EngineError::Upstream("timeout".into()).is_retryable());
        assert!(!EngineError::Malformed("x".into()).is_retryable());
        assert!(!EngineError::validation("x").is_retryable());
    }

    #[test]
    fn json_errors_map_to_malformed() {
        let err: EngineError = serde_json::from_str::<serde_json::Value>("{oops")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), "malformed");
    }
}
