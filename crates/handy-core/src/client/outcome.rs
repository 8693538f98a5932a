//! Response classification.
//!
//! Every HTTP exchange ends in exactly one [`Outcome`]. Callers never look
//! at raw status codes or response shapes.

use std::fmt;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Result category of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// 2xx
    Ok,
    /// 4xx other than 401, or a request refused before sending: bad input,
    /// shown inline, recoverable
    ValidationError,
    /// 401: missing, invalid or expired credential
    AuthError,
    /// 5xx or an unexpected status
    ServerError,
    /// Transport failure (connect, timeout, broken body)
    NetworkError,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Ok => write!(f, "ok"),
            Outcome::ValidationError => write!(f, "validation_error"),
            Outcome::AuthError => write!(f, "auth_error"),
            Outcome::ServerError => write!(f, "server_error"),
            Outcome::NetworkError => write!(f, "network_error"),
        }
    }
}

/// What one submission attempt produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionResult {
    pub outcome: Outcome,
    /// HTTP status, absent for transport failures
    pub status: Option<u16>,
    /// Parsed JSON body, if the server sent one
    pub payload: Option<Value>,
    /// One-line message suitable for display
    pub message: Option<String>,
}

impl SubmissionResult {
    pub fn ok(status: u16, payload: Option<Value>) -> Self {
        Self {
            outcome: Outcome::Ok,
            status: Some(status),
            payload,
            message: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::NetworkError,
            status: None,
            payload: None,
            message: Some(message.into()),
        }
    }

    /// A request that was refused before anything was sent.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::ValidationError,
            status: None,
            payload: None,
            message: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome == Outcome::Ok
    }

    /// Reads a string field from the payload (numbers are stringified).
    pub fn payload_str(&self, field: &str) -> Option<String> {
        match self.payload.as_ref()?.get(field)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Converts into the payload, or an [`ApiError`] for any non-ok outcome.
    ///
    /// # Errors
    /// Returns an [`ApiError`] when the outcome is not [`Outcome::Ok`].
    pub fn into_payload(self) -> Result<Option<Value>, ApiError> {
        if self.outcome == Outcome::Ok {
            return Ok(self.payload);
        }
        let message = self
            .message
            .unwrap_or_else(|| default_message(self.outcome, self.status));
        Err(ApiError {
            outcome: self.outcome,
            status: self.status,
            message,
        })
    }

    /// Decodes the payload into `T`.
    ///
    /// # Errors
    /// Returns an [`ApiError`] for non-ok outcomes, or a decode error when the
    /// payload is missing or has the wrong shape.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T> {
        let payload = self.into_payload()?.context("Server returned an empty response")?;
        serde_json::from_value(payload).context("Unexpected response format")
    }
}

/// A non-ok outcome surfaced as an error value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub outcome: Outcome,
    pub status: Option<u16>,
    pub message: String,
}

impl ApiError {
    pub fn is_auth(&self) -> bool {
        self.outcome == Outcome::AuthError
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ApiError {}

/// Classifies a completed HTTP exchange.
pub fn classify(status: u16, body: &[u8]) -> SubmissionResult {
    let payload = parse_payload(body);
    let outcome = match status {
        200..=299 => return SubmissionResult::ok(status, payload),
        401 => Outcome::AuthError,
        400..=499 => Outcome::ValidationError,
        _ => Outcome::ServerError,
    };

    let message = payload
        .as_ref()
        .and_then(extract_message)
        .unwrap_or_else(|| default_message(outcome, Some(status)));

    SubmissionResult {
        outcome,
        status: Some(status),
        payload,
        message: Some(message),
    }
}

/// Empty or non-JSON bodies yield no payload.
fn parse_payload(body: &[u8]) -> Option<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Null) => None,
        Ok(value) => Some(value),
        Err(err) => {
            tracing::debug!("response body is not JSON: {err}");
            None
        }
    }
}

/// Pulls a display message out of an error body.
///
/// Accepts `{"message": ...}`, `{"detail": "..."}`, FastAPI's
/// `{"detail": [{"msg": ...}]}` and `{"error": {"message": ...}}`.
fn extract_message(payload: &Value) -> Option<String> {
    let non_empty = |v: &Value| {
        v.as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    if let Some(msg) = payload.get("message").and_then(non_empty) {
        return Some(msg);
    }
    match payload.get("detail") {
        Some(Value::String(_)) => return payload.get("detail").and_then(non_empty),
        Some(Value::Array(items)) => {
            if let Some(msg) = items.iter().find_map(|item| item.get("msg").and_then(non_empty)) {
                return Some(msg);
            }
        }
        _ => {}
    }
    payload
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(non_empty)
}

fn default_message(outcome: Outcome, status: Option<u16>) -> String {
    let status = status.map_or_else(String::new, |s| format!(" (HTTP {s})"));
    match outcome {
        Outcome::Ok => "Done".to_string(),
        Outcome::AuthError => "Please sign in to continue".to_string(),
        Outcome::ValidationError => format!("Request was rejected{status}"),
        Outcome::ServerError => format!("Server error{status}. Please try again later"),
        Outcome::NetworkError => "Could not reach the server".to_string(),
    }
}
