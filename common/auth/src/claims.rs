use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::roles::Role;

/// Verified identity carried by a bearer token.
#[derive(Debug, Clone, Serialize)]
pub struct Claims {
    pub user_id: Uuid,
    pub role: Role,
    pub issued_at: DateTime<Utc>,
    pub not_before: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Wire form of the token payload.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ClaimsRepr {
    pub sub: String,
    pub role: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

impl From<&Claims> for ClaimsRepr {
    fn from(value: &Claims) -> Self {
        Self {
            sub: value.user_id.to_string(),
            role: value.role.as_str().to_string(),
            iat: value.issued_at.timestamp(),
            nbf: value.not_before.timestamp(),
            exp: value.expires_at.timestamp(),
        }
    }
}

fn timestamp(name: &'static str, secs: i64) -> AuthResult<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| AuthError::InvalidClaim(name, secs.to_string()))
}

impl TryFrom<ClaimsRepr> for Claims {
    type Error = AuthError;

    fn try_from(value: ClaimsRepr) -> AuthResult<Self> {
        let user_id = Uuid::parse_str(&value.sub)
            .map_err(|_| AuthError::InvalidClaim("sub", value.sub.clone()))?;
        let role = value
            .role
            .parse::<Role>()
            .map_err(|_| AuthError::InvalidClaim("role", value.role.clone()))?;

        Ok(Self {
            user_id,
            role,
            issued_at: timestamp("iat", value.iat)?,
            not_before: timestamp("nbf", value.nbf)?,
            expires_at: timestamp("exp", value.exp)?,
        })
    }
}
