//! Failures of a Claude request, as seen by the assistant's tool loop.
//!
//! The chat service never surfaces these to shoppers; it falls back to a
//! composed reply. What matters is whether a failure is transient (log and
//! move on) or a standing problem with the key, model, or request shape.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClaudeError {
    /// The request never got an HTTP response.
    #[error("request to Claude failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Claude is rate limiting us, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    /// Claude answered with a non-success status.
    #[error("Claude rejected the request ({status}, {kind}): {message}")]
    Rejected {
        status: u16,
        /// The `error.type` field, or `unknown` for unstructured bodies.
        kind: String,
        message: String,
    },

    /// A 2xx body that isn't a messages response.
    #[error("unreadable Claude response: {0}")]
    MalformedResponse(#[from] serde_json::Error),

    #[error("invalid Claude configuration: {0}")]
    Config(String),
}

impl ClaudeError {
    /// Whether the same request may succeed later without any change.
    ///
    /// Bad keys, unknown models and malformed tool definitions are not
    /// transient: they fail every turn until someone fixes them.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::RateLimited { .. } => true,
            Self::Rejected { status, .. } => *status >= 500,
            Self::MalformedResponse(_) | Self::Config(_) => false,
        }
    }

    /// Build a `Rejected` error from a status and response body.
    #[must_use]
    pub fn rejected(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => Self::Rejected {
                status,
                kind: envelope.error.kind,
                message: envelope.error.message,
            },
            Err(_) => Self::Rejected {
                status,
                kind: "unknown".to_owned(),
                message: body.chars().take(200).collect(),
            },
        }
    }
}

/// `{"type": "error", "error": {"type": ..., "message": ...}}`
#[derive(Debug, serde::Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, serde::Deserialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_reads_error_envelope() {
        let err = ClaudeError::rejected(
            400,
            r#"{"type":"error","error":{"type":"invalid_request_error","message":"tools.3.input_schema: invalid"}}"#,
        );
        assert!(matches!(
            &err,
            ClaudeError::Rejected { status: 400, kind, .. } if kind == "invalid_request_error"
        ));
        assert_eq!(
            err.to_string(),
            "Claude rejected the request (400, invalid_request_error): tools.3.input_schema: invalid"
        );
        assert!(!err.is_transient());
    }

    #[test]
    fn test_rejected_truncates_unstructured_bodies() {
        let body = "x".repeat(1000);
        let err = ClaudeError::rejected(502, &body);
        let ClaudeError::Rejected { kind, message, .. } = &err else {
            panic!("expected Rejected");
        };
        assert_eq!(kind, "unknown");
        assert_eq!(message.len(), 200);
        assert!(err.is_transient());
    }

    #[test]
    fn test_transient_classification() {
        assert!(ClaudeError::RateLimited { retry_after: 30 }.is_transient());
        assert!(ClaudeError::rejected(529, "overloaded").is_transient());
        assert!(!ClaudeError::rejected(401, "").is_transient());
        assert!(!ClaudeError::Config("bad key".to_owned()).is_transient());
    }
}
