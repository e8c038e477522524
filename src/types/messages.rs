//! NATS message types

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

/// Generic request wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request<T> {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub token: Option<String>,  // JWT access token
    pub payload: T,
}

impl<T> Request<T> {
    pub fn with_token(token: String, payload: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            token: Some(token),
            payload,
        }
    }
}

/// Generic success response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessResponse<T> {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: T,
}

impl<T> SuccessResponse<T> {
    pub fn new(request_id: Uuid, payload: T) -> Self {
        Self {
            id: request_id,
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(request_id: Uuid, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: request_id,
            timestamp: Utc::now(),
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_with_token_sets_fields() {
        let req = Request::with_token("abc".to_string(), 42);
        assert_eq!(req.token.as_deref(), Some("abc"));
        assert_eq!(req.payload, 42);
    }

    #[test]
    fn test_request_without_token_deserializes() {
        let json = format!(
            r#"{{"id":"{}","timestamp":"2025-03-14T10:00:00Z","payload":{{}}}}"#,
            Uuid::nil()
        );
        let req: Request<serde_json::Value> = serde_json::from_str(&json).unwrap();
        assert!(req.token.is_none());
    }

    #[test]
    fn test_error_response_serializes_code() {
        let resp = ErrorResponse::new(Uuid::nil(), "EMPTY_FILE", "Dosya boş");
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["error"]["code"], "EMPTY_FILE");
        assert_eq!(json["error"]["message"], "Dosya boş");
    }
}
