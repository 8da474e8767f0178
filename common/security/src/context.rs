use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use tracing::Span;
use uuid::Uuid;

use common_auth::{Claims, Role};
use common_http_errors::ApiError;

use crate::error::SecurityError;

/// Caller identity attached to a request once its bearer token has been validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityContext {
    pub user_id: Uuid,
    pub role: Role,
}

impl SecurityContext {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

impl From<Claims> for SecurityContext {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            role: claims.role,
        }
    }
}

/// Reads the context placed by [`crate::authenticate`]. Absent context means
/// the route was not behind the authentication gate, reported as 401.
pub struct SecurityCtxExtractor(pub SecurityContext);

#[async_trait]
impl<S> FromRequestParts<S> for SecurityCtxExtractor where S: Send + Sync {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ctx = parts
            .extensions
            .get::<SecurityContext>()
            .copied()
            .ok_or(SecurityError::Unauthenticated)?;

        Span::current().record("user_id", tracing::field::display(ctx.user_id));
        Ok(SecurityCtxExtractor(ctx))
    }
}
