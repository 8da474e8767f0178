use std::env;
use std::net::{IpAddr, SocketAddr};

use anyhow::{anyhow, Context, Result};
use chrono::Duration;
use common_auth::{parse_ttl, JwtConfig};

const DEFAULT_TOKEN_EXPIRATION: &str = "24h";
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub host: IpAddr,
    pub port: u16,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub jwt_leeway_seconds: u64,
    pub payment_api_key: Option<String>,
    pub payment_provider: String,
    pub cors_allowed_origins: Vec<String>,
}

impl StoreConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }

    pub fn jwt_config(&self) -> JwtConfig {
        JwtConfig::new(self.jwt_secret.clone(), self.token_ttl).with_leeway(self.jwt_leeway_seconds)
    }
}

pub fn load_store_config() -> Result<StoreConfig> {
    load_from(|key| env::var(key).ok())
}

/// Builds the config from an arbitrary variable source.
pub fn load_from<F>(var: F) -> Result<StoreConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let host = var("HOST")
        .and_then(|value| normalize_optional(&value))
        .unwrap_or_else(|| "0.0.0.0".to_string())
        .parse::<IpAddr>()
        .context("Failed to parse HOST")?;
    let port = parse_or("PORT", var("PORT"), 8080u16)?;

    let database_url = var("DATABASE_URL").and_then(|value| normalize_optional(&value));
    let database_max_connections =
        parse_or("DATABASE_MAX_CONNECTIONS", var("DATABASE_MAX_CONNECTIONS"), 10u32)?;

    let jwt_secret = var("JWT_SECRET")
        .and_then(|value| normalize_optional(&value))
        .ok_or_else(|| anyhow!("JWT_SECRET must be set"))?;
    let expiration = var("TOKEN_EXPIRATION")
        .and_then(|value| normalize_optional(&value))
        .unwrap_or_else(|| DEFAULT_TOKEN_EXPIRATION.to_string());
    let token_ttl = parse_ttl(&expiration).context("Failed to parse TOKEN_EXPIRATION")?;
    let jwt_leeway_seconds = parse_or("JWT_LEEWAY_SECONDS", var("JWT_LEEWAY_SECONDS"), 0u64)?;

    let payment_api_key = var("PAYMENT_API_KEY").and_then(|value| normalize_optional(&value));
    let payment_provider = var("PAYMENT_PROVIDER")
        .and_then(|value| normalize_optional(&value))
        .unwrap_or_else(|| "stripe".to_string());

    let cors_allowed_origins = var("CORS_ALLOWED_ORIGINS")
        .and_then(|value| normalize_optional(&value))
        .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.to_string())
        .split(',')
        .filter_map(normalize_optional)
        .collect();

    Ok(StoreConfig {
        host,
        port,
        database_url,
        database_max_connections,
        jwt_secret,
        token_ttl,
        jwt_leeway_seconds,
        payment_api_key,
        payment_provider,
        cors_allowed_origins,
    })
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw.and_then(|value| normalize_optional(&value)) {
        Some(value) => value
            .parse::<T>()
            .with_context(|| format!("Failed to parse {key}")),
        None => Ok(default),
    }
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
