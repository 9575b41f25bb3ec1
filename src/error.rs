//! Error taxonomy for the recognition core.
//!
//! Only provider and negotiation failures reach the caller of
//! `Recognizer::recognize`. Classification and post-analysis have their own
//! error types (see `llm::classify` and `analysis`) which the orchestrator
//! handles by carrying on without the optional output.

use thiserror::Error;

/// Longest slice of a response body quoted in an error message.
const BODY_EXCERPT_CHARS: usize = 300;

/// One failed negotiation attempt, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    /// Human-readable candidate label, e.g. `gemini body + bearer`.
    pub candidate: String,
    pub reason: String,
}

/// Terminal errors of a recognition call.
#[derive(Debug, Error)]
pub enum RecognitionError {
    /// Missing key, endpoint or adapter. Never retryable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Every dialect/auth candidate failed against a self-hosted endpoint.
    #[error(
        "no request format was accepted by {endpoint} after {} attempts; last error: {last}",
        .attempts.len()
    )]
    NegotiationExhausted {
        endpoint: String,
        attempts: Vec<AttemptFailure>,
        last: String,
    },

    /// Timeout, refused connection, dropped stream.
    #[error("network error: {0}")]
    TransientNetwork(String),

    /// HTTP 4xx/5xx from the provider. `message` is forwarded verbatim.
    #[error("{} (HTTP {status}): {message}", rejection_label(.status))]
    ProviderRejection { status: u16, message: String },
}

fn rejection_label(status: &u16) -> &'static str {
    match *status {
        429 => "rate limited by provider",
        401 | 403 => "provider rejected credentials",
        500..=599 => "provider error",
        _ => "provider rejected request",
    }
}

impl RecognitionError {
    /// Build a `ProviderRejection` from a non-success status and its body.
    pub fn from_status(status: u16, body: &str) -> Self {
        Self::ProviderRejection {
            status,
            message: extract_error_message(body),
        }
    }

    /// Whether retrying the same call unchanged may succeed.
    pub fn retryable(&self) -> bool {
        match self {
            Self::TransientNetwork(_) => true,
            Self::ProviderRejection { status, .. } => *status == 429 || *status >= 500,
            Self::Configuration(_) | Self::NegotiationExhausted { .. } => false,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::ProviderRejection { status: 429, .. })
    }

    /// HTTP status of a provider rejection, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ProviderRejection { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Pull the provider's own error text out of an error body.
///
/// Understands `{"error": {"message": ..}}`, `{"error": ".."}` and
/// `{"message": ..}`; anything else is quoted as a trimmed excerpt.
pub fn extract_error_message(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        let candidates = [
            json.pointer("/error/message"),
            json.get("error"),
            json.get("message"),
            json.get("detail"),
        ];
        for value in candidates.into_iter().flatten() {
            if let Some(text) = value.as_str() {
                if !text.trim().is_empty() {
                    return text.trim().to_string();
                }
            }
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    trimmed.chars().take(BODY_EXCERPT_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_is_retryable() {
        let err = RecognitionError::from_status(429, r#"{"error":{"message":"quota exceeded"}}"#);
        assert!(err.retryable());
        assert!(err.is_rate_limited());
        assert!(err.to_string().contains("rate limited"));
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn unauthorized_is_not_retryable() {
        let err = RecognitionError::from_status(401, r#"{"message":"bad key"}"#);
        assert!(!err.retryable());
        assert!(!err.is_rate_limited());
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn server_errors_are_retryable() {
        assert!(RecognitionError::from_status(503, "upstream down").retryable());
    }

    #[test]
    fn error_message_falls_back_to_excerpt() {
        let long = "x".repeat(1000);
        assert_eq!(extract_error_message(&long).len(), BODY_EXCERPT_CHARS);
        assert_eq!(extract_error_message("  "), "empty response body");
        assert_eq!(extract_error_message(r#"{"error":"nope"}"#), "nope");
    }

    #[test]
    fn exhaustion_names_last_error() {
        let err = RecognitionError::NegotiationExhausted {
            endpoint: "https://relay.example".to_string(),
            attempts: vec![AttemptFailure {
                candidate: "generic body + query key".to_string(),
                reason: "HTTP 401".to_string(),
            }],
            last: "HTTP 401".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("after 1 attempts"));
        assert!(text.ends_with("HTTP 401"));
        assert!(!err.retryable());
    }
}
