//! Error taxonomy for the review engine.
//!
//! Only pre-dispatch conditions ([`EngineError`]) fail a review call.
//! Everything that happens after dispatch (network failures, timeouts,
//! bad status codes, malformed envelopes) is classified as a
//! [`TransportError`], flattened into the failing provider's result, and
//! never escalated to the caller.

use thiserror::Error;

/// Errors that fail an entire review call before any provider is contacted.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Input code exceeds the configured token budget (bytes ≈ tokens × 4).
    #[error("code is {actual} bytes, exceeding the {limit}-byte budget for {token_limit} tokens")]
    CodeTooLarge {
        actual: usize,
        limit: usize,
        token_limit: usize,
    },

    /// A provider entry failed structural validation at registry load time.
    #[error("invalid provider `{id}`: {reason}")]
    InvalidProvider { id: String, reason: String },
}

/// Per-provider failure classification.
///
/// These are absorbed by the orchestrator into
/// `ProviderReviewResult { success: false, error: Some(..) }`; a caller
/// never sees them as `Err`.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The provider did not answer within its configured `timeout_ms`.
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The provider answered with a non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// Connection-level failure (DNS, TLS, refused, reset).
    #[error("network error: {0}")]
    Network(String),

    /// The configured auth environment variable is unset or empty.
    #[error("secret environment variable `{env_var}` is not set")]
    MissingSecret { env_var: String },

    /// The response body did not match the provider family's envelope shape.
    #[error("malformed response envelope: {0}")]
    Envelope(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_error_names_both_budgets() {
        let err = EngineError::CodeTooLarge {
            actual: 401,
            limit: 400,
            token_limit: 100,
        };
        let msg = err.to_string();
        assert!(msg.contains("401"));
        assert!(msg.contains("400"));
        assert!(msg.contains("100"));
    }

    #[test]
    fn transport_errors_render_context() {
        let err = TransportError::HttpStatus {
            status: 429,
            body: "rate limited".into(),
        };
        assert!(err.to_string().contains("429"));

        let err = TransportError::MissingSecret {
            env_var: "ANTHROPIC_API_KEY".into(),
        };
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }
}
