//! Normalization of backend error bodies.
//!
//! Backends disagree on the shape of their error payloads, sometimes within a single API. The
//! normalizer tries the shapes seen in the wild, most structured first, and falls back to
//! whatever string is available. It never fails.

use std::fmt::Display;

use http::StatusCode;
use serde_json::Value;

/// A remote error, normalized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiError {
    /// HTTP status of the response, when the error came with one.
    pub http_status: Option<u16>,
    /// Symbolic status, e.g. `INVALID_ARGUMENT` or `invalid_request_error`.
    pub status: String,
    /// Backend error code, numeric or symbolic.
    pub code: String,
    pub message: String,
    /// Where to get a working credential, reported on authentication failures.
    pub help_url: Option<String>,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        ApiError {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_http_status(mut self, status: StatusCode) -> Self {
        self.http_status = Some(status.as_u16());
        self
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self.http_status, Some(401 | 403))
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(status) = self.http_status {
            write!(f, "http {status}: ")?;
        }
        match (self.status.is_empty(), self.code.is_empty()) {
            (false, false) => write!(f, "{} ({}): ", self.status, self.code)?,
            (false, true) => write!(f, "{}: ", self.status)?,
            (true, false) => write!(f, "{}: ", self.code)?,
            (true, true) => {}
        }
        f.write_str(self.message.trim())?;
        if let Some(url) = &self.help_url {
            write!(f, ". You can get a new API key at {url}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

/// Classify an error body returned with `status`.
///
/// Shapes are tried in order:
/// 1. `{"error": {"code", "message", "status" | "type"}}`
/// 2. `{"message", "type", "code"}` or `{"error": "..."}`
/// 3. `{"detail": {"msg" | "message", "type"}}` or `{"detail": "..."}`
/// 4. `{"detail": [{"msg", "loc", "type"}]}`
/// 5. `{"message": {"detail": ...}}`
///
/// then the trimmed raw body, then the canonical reason of `status`.
pub fn normalize_error_body(status: StatusCode, body: &[u8]) -> ApiError {
    let parsed = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| from_value(&value));
    let mut error = parsed.unwrap_or_else(|| {
        let raw = String::from_utf8_lossy(body);
        let raw = raw.trim();
        if raw.is_empty() {
            ApiError::new(status.canonical_reason().unwrap_or("unknown error"))
        } else {
            ApiError::new(raw)
        }
    });
    error.http_status = Some(status.as_u16());
    error
}

fn from_value(value: &Value) -> Option<ApiError> {
    let obj = value.as_object()?;

    match obj.get("error") {
        Some(Value::Object(inner)) => {
            let message = string_field(inner, "message")?;
            return Some(ApiError {
                status: string_field(inner, "status")
                    .or_else(|| string_field(inner, "type"))
                    .unwrap_or_default(),
                code: string_field(inner, "code").unwrap_or_default(),
                message,
                ..Default::default()
            });
        }
        Some(Value::String(message)) if !message.is_empty() => {
            return Some(ApiError {
                code: string_field(obj, "code").unwrap_or_default(),
                ..ApiError::new(message.clone())
            });
        }
        _ => {}
    }

    if let Some(Value::String(message)) = obj.get("message") {
        return Some(ApiError {
            status: string_field(obj, "type").unwrap_or_default(),
            code: string_field(obj, "code").unwrap_or_default(),
            ..ApiError::new(message.clone())
        });
    }

    if let Some(detail) = obj.get("detail") {
        let mut error = from_detail(detail)?;
        if let Some(kind) = string_field(obj, "type") {
            error.status = kind;
        }
        return Some(error);
    }

    if let Some(Value::Object(message)) = obj.get("message") {
        let mut error = from_detail(message.get("detail")?)?;
        error.status = string_field(obj, "type").unwrap_or(error.status);
        error.code = string_field(obj, "code").unwrap_or(error.code);
        return Some(error);
    }

    None
}

fn from_detail(detail: &Value) -> Option<ApiError> {
    match detail {
        Value::String(message) if !message.is_empty() => Some(ApiError::new(message.clone())),
        Value::Object(obj) => {
            let message = string_field(obj, "msg").or_else(|| string_field(obj, "message"))?;
            Some(ApiError {
                status: string_field(obj, "type").unwrap_or_default(),
                ..ApiError::new(message)
            })
        }
        Value::Array(items) => {
            let messages: Vec<String> = items.iter().filter_map(detail_item).collect();
            if messages.is_empty() {
                return None;
            }
            Some(ApiError::new(messages.join("; ")))
        }
        _ => None,
    }
}

/// `type: msg at loc.path`, or the bare string for string items.
fn detail_item(item: &Value) -> Option<String> {
    let obj = match item {
        Value::String(s) => return Some(s.clone()),
        Value::Object(obj) => obj,
        _ => return None,
    };
    let msg = string_field(obj, "msg").or_else(|| string_field(obj, "message"))?;
    let loc = obj
        .get("loc")
        .and_then(Value::as_array)
        .map(|loc| {
            loc.iter()
                .map(|l| match l {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(".")
        })
        .unwrap_or_default();
    let mut out = match string_field(obj, "type") {
        Some(kind) => format!("{kind}: {msg}"),
        None => msg,
    };
    if !loc.is_empty() {
        out.push_str(" at ");
        out.push_str(&loc);
    }
    Some(out)
}

/// A string, or a number rendered as one; codes come as either.
fn string_field(obj: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn normalize(status: u16, body: Value) -> ApiError {
        let status = StatusCode::from_u16(status).unwrap();
        normalize_error_body(status, body.to_string().as_bytes())
    }

    #[test]
    fn test_nested_error_object() {
        let err = normalize(
            400,
            json!({"error": {"code": 400, "message": "bad field", "status": "INVALID_ARGUMENT"}}),
        );
        assert_eq!(err.code, "400");
        assert_eq!(err.status, "INVALID_ARGUMENT");
        assert_eq!(err.message, "bad field");
        assert_eq!(err.to_string(), "http 400: INVALID_ARGUMENT (400): bad field");
    }

    #[test]
    fn test_flat_message() {
        let err = normalize(
            429,
            json!({"message": "slow down", "type": "rate_limit", "code": "too_many"}),
        );
        assert_eq!(err.message, "slow down");
        assert_eq!(err.status, "rate_limit");
        assert_eq!(err.code, "too_many");

        let err = normalize(500, json!({"error": "boom"}));
        assert_eq!(err.message, "boom");
    }

    #[test]
    fn test_detail_object_and_string() {
        let err = normalize(404, json!({"detail": {"msg": "no such model", "type": "not_found"}}));
        assert_eq!(err.message, "no such model");
        assert_eq!(err.status, "not_found");

        let err = normalize(401, json!({"detail": "Unauthorized"}));
        assert_eq!(err.message, "Unauthorized");
        assert!(err.is_unauthorized());
    }

    #[test]
    fn test_detail_array() {
        let err = normalize(
            422,
            json!({"detail": [
                {"type": "missing", "msg": "Field required", "loc": ["body", "messages", 0]},
                {"type": "string_type", "msg": "Input should be a string", "loc": ["body", "model"]}
            ]}),
        );
        assert_eq!(
            err.message,
            "missing: Field required at body.messages.0; string_type: Input should be a string at body.model"
        );
    }

    #[test]
    fn test_nested_message_detail() {
        let err = normalize(
            400,
            json!({"object": "error", "type": "invalid_request", "message": {"detail": [{"msg": "too long", "loc": ["body"], "type": "value_error"}]}}),
        );
        assert_eq!(err.message, "value_error: too long at body");
        assert_eq!(err.status, "invalid_request");
    }

    #[test]
    fn test_fallbacks() {
        let status = StatusCode::BAD_GATEWAY;
        let err = normalize_error_body(status, b"  <html>upstream down</html>\n");
        assert_eq!(err.message, "<html>upstream down</html>");

        let err = normalize_error_body(status, b"");
        assert_eq!(err.message, "Bad Gateway");
        assert_eq!(err.to_string(), "http 502: Bad Gateway");

        // Valid JSON in an unknown shape keeps the raw text.
        let err = normalize_error_body(status, br#"{"oops": true}"#);
        assert_eq!(err.message, r#"{"oops": true}"#);
    }

    #[test]
    fn test_help_url_on_display() {
        let err = ApiError {
            help_url: Some("https://example.com/keys".into()),
            ..normalize(401, json!({"error": {"message": "API key not valid"}}))
        };
        assert_eq!(
            err.to_string(),
            "http 401: API key not valid. You can get a new API key at https://example.com/keys"
        );
    }
}
