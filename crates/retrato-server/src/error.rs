use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ApiErrorCode {
    InvalidRequest,
    Unauthorized,
    PaymentRequired,
    Forbidden,
    NotFound,
    PayloadTooLarge,
    UpstreamFailed,
    Internal,
}

impl ApiErrorCode {
    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::InvalidRequest => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::PaymentRequired => StatusCode::PAYMENT_REQUIRED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UpstreamFailed => StatusCode::BAD_GATEWAY,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Wire error envelope. Every handler failure resolves to one of these so
/// clients always see `{ "error": { code, message, details, request_id } }`.
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
    pub details: Value,
    pub request_id: String,
}

impl ApiError {
    #[must_use]
    pub fn new(code: ApiErrorCode, message: impl Into<String>, request_id: &str) -> Self {
        Self {
            code,
            message: message.into(),
            details: Value::Null,
            request_id: request_id.to_string(),
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    #[must_use]
    pub fn invalid(message: impl Into<String>, request_id: &str) -> Self {
        Self::new(ApiErrorCode::InvalidRequest, message, request_id)
    }

    #[must_use]
    pub fn unauthorized(request_id: &str) -> Self {
        Self::new(ApiErrorCode::Unauthorized, "unauthorized", request_id)
    }

    #[must_use]
    pub fn not_found(what: &str, request_id: &str) -> Self {
        Self::new(ApiErrorCode::NotFound, format!("{what} not found"), request_id)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>, request_id: &str) -> Self {
        Self::new(ApiErrorCode::Internal, message, request_id)
    }

    #[must_use]
    pub fn upstream(message: impl Into<String>, request_id: &str) -> Self {
        Self::new(ApiErrorCode::UpstreamFailed, message, request_id)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status();
        (status, Json(json!({ "error": self }))).into_response()
    }
}

impl From<retrato_store::StoreError> for ApiError {
    fn from(err: retrato_store::StoreError) -> Self {
        use retrato_store::StoreErrorCode;
        let code = match err.code {
            StoreErrorCode::NotFound => ApiErrorCode::NotFound,
            StoreErrorCode::Validation => ApiErrorCode::InvalidRequest,
            StoreErrorCode::Conflict | StoreErrorCode::Io | StoreErrorCode::Internal => {
                ApiErrorCode::Internal
            }
            _ => ApiErrorCode::Internal,
        };
        Self::new(code, err.message, "req-unknown")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_map_to_expected_statuses() {
        assert_eq!(ApiErrorCode::InvalidRequest.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiErrorCode::PaymentRequired.status(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(ApiErrorCode::UpstreamFailed.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn envelope_serializes_snake_case_codes() {
        let err = ApiError::invalid("bad payload", "req-1");
        let value = serde_json::to_value(&err).expect("serialize");
        assert_eq!(value["code"], "invalid_request");
        assert_eq!(value["request_id"], "req-1");
    }
}
