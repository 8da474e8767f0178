use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token service misconfigured: {0}")]
    Config(String),
    #[error("failed to sign token: {0}")]
    Signing(String),
    #[error("token verification failed: {0}")]
    Verification(String),
    #[error("invalid claim '{0}' with value '{1}'")]
    InvalidClaim(&'static str, String),
    #[error("authorization header missing")]
    MissingAuthorization,
    #[error("authorization header malformed")]
    InvalidAuthorization,
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        Self::Verification(value.to_string())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AuthError::MissingAuthorization | AuthError::InvalidAuthorization => {
                (StatusCode::UNAUTHORIZED, "AUTH_HEADER", self.to_string())
            }
            AuthError::Verification(_) | AuthError::InvalidClaim(_, _) => (
                StatusCode::UNAUTHORIZED,
                "AUTH_TOKEN",
                "invalid or expired token".to_string(),
            ),
            AuthError::Config(_) | AuthError::Signing(_) => {
                tracing::error!(error = %self, "token service failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "AUTH_CONFIG",
                    "internal server error".to_string(),
                )
            }
        };

        let mut response = (status, Json(ErrorBody { code, message })).into_response();
        response
            .headers_mut()
            .insert("x-error-code", HeaderValue::from_static(code));
        response
    }
}
