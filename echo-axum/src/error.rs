use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use echo_core::errors::EchoError;
use serde_json::json;

/// Renders any `anyhow::Error` as a JSON error body.
#[derive(Debug)]
pub struct EchoAxumError(pub anyhow::Error);

impl From<anyhow::Error> for EchoAxumError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

impl From<EchoError> for EchoAxumError {
    fn from(e: EchoError) -> Self {
        Self(e.into_anyhow())
    }
}

impl EchoAxumError {
    /// Status the error renders with.
    pub fn status(&self) -> StatusCode {
        EchoError::from_anyhow(&self.0)
            .and_then(|e| StatusCode::from_u16(e.code()).ok())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for EchoAxumError {
    fn into_response(self) -> Response {
        let safe = match EchoError::from_anyhow(&self.0) {
            Some(echo) => echo.sanitize_for_client(),
            None => {
                tracing::error!(error = ?self.0, "unhandled error");
                EchoError::general_error("Internal server error")
            }
        };
        if safe.code() >= 500 {
            tracing::error!(error = %self.0, "request failed");
        }
        let status = StatusCode::from_u16(safe.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(safe.to_json())).into_response()
    }
}

pub fn map_json_rejection(rejection: JsonRejection) -> EchoAxumError {
    EchoError::bad_request("Failed to parse the request body as JSON")
        .with_errors(json!({"_schema": [rejection.body_text()]}))
        .into()
}
