use common_http_errors::ApiError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SecurityError {
    #[error("authentication required")]    Unauthenticated,
    #[error("admin role required")]        Forbidden,
    #[error("not authorized to access this resource")]    NotOwner,
}

impl From<SecurityError> for ApiError {
    fn from(e: SecurityError) -> Self {
        match e {
            SecurityError::Unauthenticated | SecurityError::NotOwner => ApiError::unauthorized(e.to_string()),
            SecurityError::Forbidden => ApiError::Forbidden { message: e.to_string() },
        }
    }
}
