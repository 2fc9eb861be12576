use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub remember_ttl_days: i64,
    pub cookie_secure: bool,
}

/// Argon2 cost parameters used for passwords and token digests.
#[derive(Debug, Clone, Deserialize)]
pub struct HashConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub from: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub session: SessionConfig,
    pub hashing: HashConfig,
    pub mail: MailConfig,
    pub reset_expiry_minutes: i64,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let session = SessionConfig {
            secret: std::env::var("SESSION_SECRET")?,
            issuer: std::env::var("SESSION_ISSUER").unwrap_or_else(|_| "sharepost".into()),
            audience: std::env::var("SESSION_AUDIENCE")
                .unwrap_or_else(|_| "sharepost-users".into()),
            ttl_minutes: env_or("SESSION_TTL_MINUTES", 120),
            // Twenty years, the usual "permanent" cookie lifetime.
            remember_ttl_days: env_or("REMEMBER_TTL_DAYS", 365 * 20),
            cookie_secure: env_or("COOKIE_SECURE", false),
        };
        let hashing = HashConfig {
            memory_kib: env_or("HASH_MEMORY_KIB", argon2::Params::DEFAULT_M_COST),
            iterations: env_or("HASH_ITERATIONS", argon2::Params::DEFAULT_T_COST),
            parallelism: env_or("HASH_PARALLELISM", argon2::Params::DEFAULT_P_COST),
        };
        let mail = MailConfig {
            from: std::env::var("MAIL_FROM").unwrap_or_else(|_| "noreply@sharepost.local".into()),
            base_url: std::env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
        };
        url::Url::parse(&mail.base_url).context("APP_BASE_URL must be an absolute URL")?;
        Ok(Self {
            database_url,
            session,
            hashing,
            mail,
            reset_expiry_minutes: env_or("RESET_EXPIRY_MINUTES", 120),
        })
    }
}
