use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header::AUTHORIZATION, request::Parts, HeaderValue};
use uuid::Uuid;

use crate::claims::Claims;
use crate::error::{AuthError, AuthResult};
use crate::roles::Role;
use crate::tokens::TokenService;

/// Validated bearer credential pulled from the `Authorization` header.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub claims: Claims,
    pub token: String,
}

impl AuthContext {
    pub fn user_id(&self) -> Uuid {
        self.claims.user_id
    }

    pub fn role(&self) -> Role {
        self.claims.role
    }

    pub fn into_claims(self) -> Claims {
        self.claims
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    Arc<TokenService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let tokens = Arc::<TokenService>::from_ref(state);

        let header_value = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthorization)?;

        let token = parse_bearer(header_value)?;
        let claims = tokens.validate(&token)?;

        Ok(Self { claims, token })
    }
}

pub fn parse_bearer(value: &HeaderValue) -> AuthResult<String> {
    let raw = value
        .to_str()
        .map_err(|_| AuthError::InvalidAuthorization)?
        .trim();

    let token = raw
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidAuthorization)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::InvalidAuthorization);
    }

    Ok(token.to_owned())
}
