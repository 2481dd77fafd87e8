//! Normalization of transport and HTTP failures into [`AppError`]
//!
//! Rules are applied in priority order:
//!
//! | Outcome | Kind |
//! |---------|------|
//! | timeout, aborted connection, unreachable host | `Network` |
//! | 401 | `Auth` |
//! | 403 | `Auth` (permission) |
//! | 400 | `Validation` |
//! | 5xx | `Server` |
//! | anything else | `Unknown` |

use serde_json::Value;
use tether_domain::{ApiResponse, AppError, ErrorKind, TransportFailure};

/// Plain-text bodies longer than this are not used as messages
const MAX_PLAIN_TEXT_MESSAGE: usize = 200;

/// Result of a transport call that did not succeed
#[derive(Debug, Clone, Copy)]
pub enum TransportOutcome<'a> {
    /// No response was received
    Failure(&'a TransportFailure),
    /// A response with a non-2xx status
    Response(&'a ApiResponse),
}

/// Classify a failed transport outcome
pub fn classify(outcome: TransportOutcome<'_>) -> AppError {
    match outcome {
        TransportOutcome::Failure(failure) => classify_failure(failure),
        TransportOutcome::Response(response) => classify_response(response),
    }
}

/// Classify a failure where no response was received
pub fn classify_failure(failure: &TransportFailure) -> AppError {
    match failure {
        TransportFailure::Timeout => AppError::network("Request timed out"),
        TransportFailure::Aborted(reason) => {
            AppError::network(format!("Connection aborted: {reason}"))
        }
        TransportFailure::Unreachable(reason) => {
            AppError::network(format!("Host unreachable: {reason}"))
        }
        TransportFailure::Other(reason) => AppError::unknown(format!("Request failed: {reason}")),
    }
}

/// Classify a response by status code, taking the message from its body
pub fn classify_response(response: &ApiResponse) -> AppError {
    let status = response.status;
    let kind = match status {
        401 | 403 => ErrorKind::Auth,
        400 => ErrorKind::Validation,
        s if s >= 500 => ErrorKind::Server,
        _ => ErrorKind::Unknown,
    };

    let details = parse_json_body(&response.body);
    let message = details
        .as_ref()
        .and_then(message_from_json)
        .or_else(|| message_from_text(&response.body))
        .unwrap_or_else(|| generic_message(status).to_string());

    let error = AppError::new(kind, message).with_status(status);
    match details {
        Some(details) => error.with_details(details),
        None => error,
    }
}

fn parse_json_body(body: &[u8]) -> Option<Value> {
    match serde_json::from_slice::<Value>(body) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Some(value),
        _ => None,
    }
}

fn message_from_json(body: &Value) -> Option<String> {
    ["message", "error", "error_description"].iter().find_map(|field| match body.get(field) {
        Some(Value::String(text)) if !text.trim().is_empty() => Some(text.trim().to_string()),
        // {"error": {"message": "..."}}
        Some(nested @ Value::Object(_)) => message_from_json(nested),
        _ => None,
    })
}

fn message_from_text(body: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(body).ok()?.trim();
    let usable = !text.is_empty()
        && text.chars().count() <= MAX_PLAIN_TEXT_MESSAGE
        && !text.starts_with('<')
        && !text.starts_with('{')
        && !text.starts_with('[');
    usable.then(|| text.to_string())
}

fn generic_message(status: u16) -> &'static str {
    match status {
        401 => "Authentication required",
        403 => "Access denied",
        400 => "Invalid request",
        s if s >= 500 => "Server error",
        _ => "Unexpected response",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn response(status: u16, body: &str) -> ApiResponse {
        ApiResponse::new(status, body)
    }

    #[test]
    fn transport_failures_map_to_network_or_unknown() {
        for failure in [
            TransportFailure::Timeout,
            TransportFailure::Aborted("reset by peer".into()),
            TransportFailure::Unreachable("dns".into()),
        ] {
            let err = classify(TransportOutcome::Failure(&failure));
            assert_eq!(err.kind, ErrorKind::Network, "{failure}");
            assert_eq!(err.http_status, None);
        }

        let err = classify_failure(&TransportFailure::Other("invalid header".into()));
        assert_eq!(err.kind, ErrorKind::Unknown);
    }

    #[test]
    fn status_codes_follow_priority_rules() {
        let cases = [
            (401, ErrorKind::Auth),
            (403, ErrorKind::Auth),
            (400, ErrorKind::Validation),
            (500, ErrorKind::Server),
            (503, ErrorKind::Server),
            (404, ErrorKind::Unknown),
            (409, ErrorKind::Unknown),
            (302, ErrorKind::Unknown),
        ];

        for (status, kind) in cases {
            let err = classify_response(&response(status, ""));
            assert_eq!(err.kind, kind, "status {status}");
            assert_eq!(err.http_status, Some(status));
        }
    }

    #[test]
    fn json_message_and_details_are_extracted() {
        let body = json!({"message": "Token expired", "code": "E_TOKEN"}).to_string();
        let err = classify_response(&response(401, &body));

        assert_eq!(err.message, "Token expired");
        assert_eq!(err.details, Some(json!({"message": "Token expired", "code": "E_TOKEN"})));
    }

    #[test]
    fn json_message_falls_back_through_fields() {
        let err = classify_response(&response(400, r#"{"error_description":"bad grant"}"#));
        assert_eq!(err.message, "bad grant");

        let err = classify_response(&response(400, r#"{"error":{"message":"nested"}}"#));
        assert_eq!(err.message, "nested");

        let err = classify_response(&response(400, r#"{"code":42}"#));
        assert_eq!(err.message, "Invalid request");
        assert!(err.details.is_some());
    }

    #[test]
    fn plain_text_body_is_used_when_short() {
        let err = classify_response(&response(503, "  maintenance window  "));
        assert_eq!(err.message, "maintenance window");
        assert_eq!(err.details, None);

        let long = "x".repeat(MAX_PLAIN_TEXT_MESSAGE + 1);
        assert_eq!(classify_response(&response(503, &long)).message, "Server error");

        let html = "<html><body>Bad Gateway</body></html>";
        assert_eq!(classify_response(&response(502, html)).message, "Server error");
    }

    #[test]
    fn classification_is_deterministic() {
        let res = response(403, r#"{"error":"forbidden"}"#);
        assert_eq!(classify_response(&res), classify_response(&res));
    }
}
