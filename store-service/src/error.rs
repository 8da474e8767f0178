use common_http_errors::ApiError;
use common_security::SecurityError;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use crate::store::StoreError;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("cart is empty")]
    EmptyCart,
    #[error("{0}")]
    Unauthenticated(String),
    #[error("admin role required")]
    Forbidden,
    #[error("{entity} not found")]
    NotFound { entity: &'static str, id: Uuid },
    #[error("email is already registered")]
    EmailTaken,
    #[error("insufficient stock for product '{product}' (requested {requested}, available {available})")]
    InsufficientStock {
        product: String,
        requested: i32,
        available: i32,
    },
    #[error("product '{product}' is no longer available; remove it from the cart")]
    ProductUnavailable { product: String },
    #[error("order is not awaiting payment")]
    PaymentState,
    #[error("payment provider unavailable: {0}")]
    Upstream(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }

    /// Short stable tag used for metric labels and error codes.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "validation_error",
            ServiceError::EmptyCart => "empty_cart",
            ServiceError::Unauthenticated(_) => "unauthenticated",
            ServiceError::Forbidden => "forbidden",
            ServiceError::NotFound { .. } => "not_found",
            ServiceError::EmailTaken => "email_taken",
            ServiceError::InsufficientStock { .. } => "insufficient_stock",
            ServiceError::ProductUnavailable { .. } => "product_unavailable",
            ServiceError::PaymentState => "order_not_pending",
            ServiceError::Upstream(_) => "upstream_error",
            ServiceError::Store(_) | ServiceError::Internal(_) => "internal_error",
        }
    }
}

impl From<SecurityError> for ServiceError {
    fn from(err: SecurityError) -> Self {
        match err {
            SecurityError::Forbidden => ServiceError::Forbidden,
            other => ServiceError::Unauthenticated(other.to_string()),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::Validation(_) => ApiError::bad_request("validation_error", message),
            ServiceError::EmptyCart => ApiError::bad_request("empty_cart", message),
            ServiceError::Unauthenticated(_) => ApiError::unauthorized(message),
            ServiceError::Forbidden => ApiError::Forbidden { message },
            ServiceError::NotFound { entity, id } => {
                tracing::debug!(entity, %id, "entity not found");
                ApiError::not_found(entity.replace(' ', "_").as_str(), message)
            }
            ServiceError::EmailTaken => ApiError::Conflict { code: "email_taken", message },
            ServiceError::InsufficientStock { .. } => ApiError::Conflict { code: "insufficient_stock", message },
            ServiceError::ProductUnavailable { .. } => ApiError::Conflict { code: "product_unavailable", message },
            ServiceError::PaymentState => ApiError::Conflict { code: "order_not_pending", message },
            ServiceError::Upstream(_) => ApiError::BadGateway { code: "upstream_error", message },
            ServiceError::Store(store) => {
                error!(error = %store, "store operation failed");
                ApiError::internal(store)
            }
            ServiceError::Internal(_) => ApiError::internal(message),
        }
    }
}
