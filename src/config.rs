use std::fmt;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

#[derive(Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("ttl_minutes", &self.ttl_minutes)
            .finish()
    }
}

/// Argon2 cost knobs; `None` keeps the crate defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HashConfig {
    pub memory_kib: Option<u32>,
    pub iterations: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl StoreBackend {
    fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(Self::Postgres),
            "memory" | "mem" => Ok(Self::Memory),
            other => anyhow::bail!("unknown APP_STORE backend: {other}"),
        }
    }
}

/// 30 days.
const MAX_TTL_MINUTES: i64 = 30 * 24 * 60;
/// 10 minutes.
const MAX_STORAGE_TIMEOUT_MS: u64 = 600_000;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub backend: StoreBackend,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub storage_timeout_ms: u64,
    pub jwt: JwtConfig,
    pub hash: HashConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let backend = match std::env::var("APP_STORE") {
            Ok(v) => StoreBackend::parse(&v)?,
            Err(_) => StoreBackend::Postgres,
        };
        let database_url = std::env::var("DATABASE_URL").ok();
        if backend == StoreBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL is required when APP_STORE=postgres");
        }

        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "planner".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "planner-users".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES").unwrap_or(60),
        };
        let config = Self {
            backend,
            database_url,
            db_max_connections: env_parse("DB_MAX_CONNECTIONS").unwrap_or(10),
            storage_timeout_ms: env_parse("STORAGE_TIMEOUT_MS").unwrap_or(5_000),
            jwt,
            hash: HashConfig {
                memory_kib: env_parse("ARGON2_MEMORY_KIB"),
                iterations: env_parse("ARGON2_ITERATIONS"),
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that would make every token expire immediately or
    /// overflow clock arithmetic at request time.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.jwt.secret.is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }
        if !(1..=MAX_TTL_MINUTES).contains(&self.jwt.ttl_minutes) {
            anyhow::bail!(
                "JWT_TTL_MINUTES must be between 1 and {MAX_TTL_MINUTES}, got {}",
                self.jwt.ttl_minutes
            );
        }
        if !(1..=MAX_STORAGE_TIMEOUT_MS).contains(&self.storage_timeout_ms) {
            anyhow::bail!(
                "STORAGE_TIMEOUT_MS must be between 1 and {MAX_STORAGE_TIMEOUT_MS}, got {}",
                self.storage_timeout_ms
            );
        }
        if self.db_max_connections == 0 {
            anyhow::bail!("DB_MAX_CONNECTIONS must be at least 1");
        }
        Ok(())
    }

    pub fn storage_timeout(&self) -> Duration {
        Duration::from_millis(self.storage_timeout_ms)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}
