use chrono::Duration;

use crate::error::{AuthError, AuthResult};

/// Runtime configuration for HMAC token issuance and validation.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    /// Lifetime of issued tokens.
    pub ttl: Duration,
    /// Allowable clock skew in seconds when validating exp/nbf.
    pub leeway_seconds: u64,
}

impl JwtConfig {
    pub fn new(secret: impl Into<String>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
            leeway_seconds: 0,
        }
    }

    pub fn with_leeway(mut self, seconds: u64) -> Self {
        self.leeway_seconds = seconds;
        self
    }
}

/// Parse a token lifetime such as `90`, `45s`, `30m`, `24h` or `7d`.
/// Bare numbers are seconds. Zero and negative values are rejected.
pub fn parse_ttl(raw: &str) -> AuthResult<Duration> {
    let raw = raw.trim();
    let invalid = || AuthError::Config(format!("invalid token expiration '{raw}'"));

    let (digits, unit) = match raw.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => (&raw[..idx], c.to_ascii_lowercase()),
        Some(_) => (raw, 's'),
        None => return Err(invalid()),
    };

    let amount: i64 = digits.trim().parse().map_err(|_| invalid())?;
    if amount <= 0 {
        return Err(invalid());
    }

    let ttl = match unit {
        's' => Duration::try_seconds(amount),
        'm' => Duration::try_minutes(amount),
        'h' => Duration::try_hours(amount),
        'd' => Duration::try_days(amount),
        _ => None,
    };
    ttl.ok_or_else(invalid)
}
