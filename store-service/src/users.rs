use std::sync::Arc;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use common_auth::{Role, TokenService};
use rand_core::OsRng;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::models::User;
use crate::store::{StoreError, UserStore};

pub const MIN_PASSWORD_LEN: usize = 6;
const INVALID_CREDENTIALS: &str = "invalid email or password";

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
}

pub struct UserService {
    store: Arc<dyn UserStore>,
    tokens: Arc<TokenService>,
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>, tokens: Arc<TokenService>) -> Self {
        Self { store, tokens }
    }

    /// Creates a `user`-role account and returns a token for it.
    pub async fn register(&self, req: RegisterRequest) -> ServiceResult<String> {
        let name = required("name", &req.name)?;
        let phone = required("phone", &req.phone)?;
        let email = normalize_email(&req.email)?;
        check_password(&req.password)?;

        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(ServiceError::EmailTaken);
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name,
            email,
            password_hash: hash_password(&req.password)?,
            phone,
            role: Role::User,
            created_at: now,
            updated_at: now,
        };

        match self.store.insert_user(&user).await {
            Ok(()) => {}
            Err(StoreError::UniqueViolation(_)) => return Err(ServiceError::EmailTaken),
            Err(err) => return Err(err.into()),
        }
        info!(user_id = %user.id, "user registered");
        self.issue(&user)
    }

    pub async fn login(&self, req: LoginRequest) -> ServiceResult<String> {
        let email = req.email.trim().to_lowercase();
        let user = match self.store.find_user_by_email(&email).await? {
            Some(user) => user,
            None => return Err(ServiceError::Unauthenticated(INVALID_CREDENTIALS.into())),
        };
        if !verify_password(&req.password, &user.password_hash) {
            warn!(user_id = %user.id, "login rejected: bad password");
            return Err(ServiceError::Unauthenticated(INVALID_CREDENTIALS.into()));
        }
        self.issue(&user)
    }

    pub async fn profile(&self, user_id: Uuid) -> ServiceResult<User> {
        self.store
            .find_user(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("user", user_id))
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        req: UpdateProfileRequest,
    ) -> ServiceResult<User> {
        let mut user = self.profile(user_id).await?;

        if let Some(name) = req.name.as_deref() {
            user.name = required("name", name)?;
        }
        if let Some(phone) = req.phone.as_deref() {
            user.phone = required("phone", phone)?;
        }
        if let Some(password) = req.password.as_deref() {
            check_password(password)?;
            user.password_hash = hash_password(password)?;
        }
        user.updated_at = Utc::now();

        if !self.store.update_user(&user).await? {
            return Err(ServiceError::not_found("user", user_id));
        }
        Ok(user)
    }

    pub async fn delete_account(&self, user_id: Uuid) -> ServiceResult<()> {
        if !self.store.soft_delete_user(user_id).await? {
            return Err(ServiceError::not_found("user", user_id));
        }
        info!(%user_id, "user account deleted");
        Ok(())
    }

    fn issue(&self, user: &User) -> ServiceResult<String> {
        self.tokens.issue(user.id, user.role).map_err(|err| {
            tracing::error!(error = %err, user_id = %user.id, "token issuance failed");
            ServiceError::Internal("could not issue token".into())
        })
    }
}

fn required(field: &str, value: &str) -> ServiceResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn normalize_email(raw: &str) -> ServiceResult<String> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(ServiceError::validation("email is not valid"));
    }
    Ok(email)
}

fn check_password(password: &str) -> ServiceResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ServiceError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn hash_password(password: &str) -> ServiceResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| ServiceError::Internal(format!("failed to hash password: {err}")))
}

fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape_is_checked() {
        assert_eq!(normalize_email(" Ada@Example.COM ").unwrap(), "ada@example.com");
        for bad in ["", "ada", "@example.com", "ada@", "ada@localhost", "a da@x.io"] {
            assert!(normalize_email(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn hashes_are_salted_and_verifiable() {
        let first = hash_password("hunter22").unwrap();
        let second = hash_password("hunter22").unwrap();
        assert_ne!(first, second);
        assert!(verify_password("hunter22", &first));
        assert!(!verify_password("hunter23", &first));
        assert!(!verify_password("hunter22", "hunter22"));
    }

    #[test]
    fn short_passwords_are_rejected() {
        assert!(check_password("12345").is_err());
        assert!(check_password("123456").is_ok());
    }
}
