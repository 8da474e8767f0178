use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::{http::{StatusCode, HeaderValue}, response::{IntoResponse, Response}, Json};
use serde::Serialize;

pub mod metrics;

pub use metrics::{track_http_errors, HttpErrorMetrics, MAX_ERROR_CODES};

pub const ERROR_CODE_HEADER: &str = "x-error-code";

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Transport-level error. Every variant renders `{code, message}` and the
/// `X-Error-Code` header.
#[derive(Debug)]
pub enum ApiError {
    BadRequest { code: &'static str, message: String },
    Unauthorized { code: &'static str, message: String },
    Forbidden { message: String },
    NotFound { code: String, message: String },
    Conflict { code: &'static str, message: String },
    BadGateway { code: &'static str, message: String },
    /// The message is logged, never sent to the client.
    Internal { message: String },
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(e: E) -> Self { Self::Internal { message: e.to_string() } }
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self { Self::BadRequest { code, message: message.into() } }
    pub fn unauthorized(message: impl Into<String>) -> Self { Self::Unauthorized { code: "unauthenticated", message: message.into() } }
    pub fn forbidden() -> Self { Self::Forbidden { message: "insufficient permissions".into() } }
    pub fn not_found(entity: &str, message: impl Into<String>) -> Self { Self::NotFound { code: format!("{entity}_not_found"), message: message.into() } }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::BadGateway { .. } => StatusCode::BAD_GATEWAY,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::BadRequest { code, message }
            | ApiError::Unauthorized { code, message }
            | ApiError::Conflict { code, message }
            | ApiError::BadGateway { code, message } => ErrorBody { code: code.into(), message },
            ApiError::Forbidden { message } => ErrorBody { code: "forbidden".into(), message },
            ApiError::NotFound { code, message } => ErrorBody { code, message },
            ApiError::Internal { message } => {
                tracing::error!(error = %message, "request failed with internal error");
                ErrorBody { code: "internal_error".into(), message: "internal server error".into() }
            }
        };
        let header = HeaderValue::from_str(&body.code).ok();
        let mut resp = (status, Json(body)).into_response();
        if let Some(val) = header {
            resp.headers_mut().insert(ERROR_CODE_HEADER, val);
        }
        resp
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self { Self::bad_request("invalid_body", rejection.body_text()) }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self { Self::bad_request("invalid_query", rejection.body_text()) }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self { Self::bad_request("invalid_path", rejection.body_text()) }
}

pub type ApiResult<T> = Result<T, ApiError>;
