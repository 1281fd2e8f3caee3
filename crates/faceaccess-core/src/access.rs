//! Access-check response interpretation.
//!
//! The backend signals a lockout two ways: a truthy `locked` flag in the
//! body (with any status), or a bare HTTP 429 whose body carries only a
//! `detail`/`message`. Both normalize into the same locked
//! [`AccessAttemptResult`] through [`normalize_lockout`].

use crate::types::{is_truthy, seconds_from_value, AccessAttemptResult, DEFAULT_LOCK_SECONDS};
use serde_json::Value;
use thiserror::Error;

/// HTTP status used by the backend for rate-limited attempts.
pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// Message used when a body flags a lockout without explaining it.
pub const LOCKED_MESSAGE: &str = "Access temporarily blocked.";

/// Message used when a 429 arrives without a usable `message` or `detail`.
pub const RATE_LIMITED_MESSAGE: &str = "Access temporarily blocked. Try again shortly.";

const MAX_DETAIL_CHARS: usize = 200;

#[derive(Error, Debug)]
pub enum CheckResponseError {
    #[error("access check returned HTTP {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("malformed access check response: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// How the backend signalled a lockout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockSignal {
    /// Truthy `locked` field in the response body.
    BodyFlag,
    /// HTTP 429, whether returned as a response or raised by the transport.
    TooManyRequests,
}

/// Interpret one `POST /access/check` response.
///
/// Order matters: a truthy body flag wins over any status, then 429, then
/// 2xx bodies pass through verbatim. Every other status is an error.
pub fn interpret_check_response(
    status: u16,
    body: &[u8],
) -> Result<AccessAttemptResult, CheckResponseError> {
    let parsed = serde_json::from_slice::<Value>(body).unwrap_or(Value::Null);

    if parsed.get("locked").is_some_and(is_truthy) {
        return Ok(normalize_lockout(&parsed, LockSignal::BodyFlag));
    }

    if status == STATUS_TOO_MANY_REQUESTS {
        return Ok(normalize_lockout(&parsed, LockSignal::TooManyRequests));
    }

    if (200..300).contains(&status) {
        return Ok(serde_json::from_slice(body)?);
    }

    Err(CheckResponseError::Status {
        status,
        detail: error_detail(&parsed).unwrap_or_else(|| body_excerpt(body)),
    })
}

/// Build the locked result for either lockout signal.
pub fn normalize_lockout(body: &Value, signal: LockSignal) -> AccessAttemptResult {
    let message = match signal {
        LockSignal::BodyFlag => non_empty_str(body, "message").unwrap_or(LOCKED_MESSAGE),
        LockSignal::TooManyRequests => non_empty_str(body, "message")
            .or_else(|| non_empty_str(body, "detail"))
            .unwrap_or(RATE_LIMITED_MESSAGE),
    };
    let remaining = lockout_remaining_secs(body);

    tracing::debug!(?signal, remaining, "normalized lockout");
    AccessAttemptResult::locked_out(message, remaining)
}

/// Remaining lockout seconds named in a body, or the default.
pub fn lockout_remaining_secs(body: &Value) -> u64 {
    body.get("lock_remaining_seconds")
        .and_then(seconds_from_value)
        .unwrap_or(DEFAULT_LOCK_SECONDS)
}

/// Human-readable reason from an error body (`detail` first, then `message`).
///
/// Validation errors carry a structured `detail`; those are rendered as
/// compact JSON.
pub fn error_detail(body: &Value) -> Option<String> {
    if let Some(detail) = body.get("detail") {
        match detail {
            Value::String(s) if !s.is_empty() => return Some(s.clone()),
            Value::Array(_) | Value::Object(_) => return Some(detail.to_string()),
            _ => {}
        }
    }
    non_empty_str(body, "message").map(str::to_string)
}

fn non_empty_str<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn body_excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        return "no detail".to_string();
    }
    text.chars().take(MAX_DETAIL_CHARS).collect()
}
