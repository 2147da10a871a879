use crate::util::{collapse_whitespace, truncate_chars};

/// Longest body excerpt embedded in the error message.
pub const MAX_BODY_EXCERPT_CHARS: usize = 700;
const DEFAULT_STATUS: u16 = 500;

/// The remote call could not be completed. Aborts the routing run; never
/// produced by tool execution.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct RoutingError {
    pub message: String,
    pub status_code: u16,
    pub sanitized_body: String,
}

/// What went wrong on the wire, before classification.
#[derive(Debug)]
pub enum TransportFailure {
    /// The service answered with a non-success status.
    Http { status: u16, body: String },
    /// The request never produced a usable response.
    Request(reqwest::Error),
    /// The response arrived but its envelope could not be understood.
    Protocol(String),
}

impl RoutingError {
    pub fn classify(api_url: &str, model: &str, failure: TransportFailure) -> Self {
        let (status_code, raw_body) = match failure {
            TransportFailure::Http { status, body } => (status, body),
            TransportFailure::Request(error) => (
                error.status().map(|s| s.as_u16()).unwrap_or(DEFAULT_STATUS),
                describe_request_error(&error),
            ),
            TransportFailure::Protocol(detail) => (DEFAULT_STATUS, detail),
        };

        let sanitized_body = collapse_whitespace(&raw_body);
        let excerpt = truncate_chars(&sanitized_body, MAX_BODY_EXCERPT_CHARS);

        tracing::warn!(
            status = status_code,
            url = api_url,
            model,
            body = excerpt,
            "upstream routing request failed"
        );

        let message = format!(
            "Intent routing failed ({status_code}): {}",
            if excerpt.is_empty() {
                "no response body"
            } else {
                excerpt
            }
        );

        Self {
            message,
            status_code,
            sanitized_body,
        }
    }
}

fn describe_request_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        return format!("request timed out: {error}");
    }
    if error.is_connect() {
        return format!("cannot reach endpoint: {error}");
    }
    error.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_failure_keeps_status_and_collapses_body() {
        let error = RoutingError::classify(
            "https://example.test/responses",
            "m",
            TransportFailure::Http {
                status: 429,
                body: "  rate\n\n limited \t now ".to_string(),
            },
        );
        assert_eq!(error.status_code, 429);
        assert_eq!(error.sanitized_body, "rate limited now");
        assert_eq!(error.message, "Intent routing failed (429): rate limited now");
    }

    #[test]
    fn test_message_excerpt_is_capped() {
        let body = "x".repeat(2_000);
        let error = RoutingError::classify(
            "u",
            "m",
            TransportFailure::Http { status: 400, body },
        );
        assert_eq!(error.sanitized_body.len(), 2_000);
        let prefix = "Intent routing failed (400): ";
        assert_eq!(error.message.len(), prefix.len() + MAX_BODY_EXCERPT_CHARS);
    }

    #[test]
    fn test_empty_body_is_reported() {
        let error = RoutingError::classify(
            "u",
            "m",
            TransportFailure::Http {
                status: 503,
                body: "   ".to_string(),
            },
        );
        assert_eq!(error.message, "Intent routing failed (503): no response body");
    }

    #[test]
    fn test_protocol_failure_defaults_status() {
        let error = RoutingError::classify(
            "u",
            "m",
            TransportFailure::Protocol("reply was not JSON".to_string()),
        );
        assert_eq!(error.status_code, 500);
        assert!(error.to_string().contains("reply was not JSON"));
    }
}
