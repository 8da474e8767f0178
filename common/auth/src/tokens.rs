use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;
use uuid::Uuid;

use crate::claims::{Claims, ClaimsRepr};
use crate::config::JwtConfig;
use crate::error::{AuthError, AuthResult};
use crate::roles::Role;

/// Issues and validates HMAC-signed identity tokens.
///
/// Read-only after construction; share it behind an `Arc`.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
    leeway_seconds: u64,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl", &self.ttl)
            .field("leeway_seconds", &self.leeway_seconds)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(config: JwtConfig) -> AuthResult<Self> {
        if config.secret.trim().is_empty() {
            return Err(AuthError::Config("JWT secret must not be empty".into()));
        }
        if config.ttl <= Duration::zero() {
            return Err(AuthError::Config(
                "token expiration must be a positive duration".into(),
            ));
        }

        let secret = config.secret.as_bytes();
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl: config.ttl,
            leeway_seconds: config.leeway_seconds,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, user_id: Uuid, role: Role) -> AuthResult<String> {
        self.issue_at(user_id, role, Utc::now())
    }

    /// Issue a token as if it had been minted at `issued_at`.
    pub fn issue_at(
        &self,
        user_id: Uuid,
        role: Role,
        issued_at: DateTime<Utc>,
    ) -> AuthResult<String> {
        let claims = Claims {
            user_id,
            role,
            issued_at,
            not_before: issued_at,
            expires_at: issued_at + self.ttl,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &ClaimsRepr::from(&claims),
            &self.encoding_key,
        )
        .map_err(|err| AuthError::Signing(err.to_string()))
    }

    pub fn validate(&self, token: &str) -> AuthResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.validate_nbf = true;
        validation.leeway = self.leeway_seconds;
        validation.set_required_spec_claims(&["exp", "nbf", "iat", "sub"]);

        let data = decode::<ClaimsRepr>(token, &self.decoding_key, &validation)?;
        let claims = Claims::try_from(data.claims)?;
        debug!(user_id = %claims.user_id, role = %claims.role, "validated token");
        Ok(claims)
    }
}
