use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use phonenumber::country::Id as CountryId;
use std::time::Duration;

/// Runtime configuration, loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    /// Base64-encoded 32 byte AES-256 key for encrypted document fields.
    pub field_encryption_key: String,
    pub default_page_limit: u32,
    pub max_page_limit: u32,
    pub default_phone_region: CountryId,
    pub integration_timeout: Duration,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
    pub white_label_cache_ttl: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DATABASE_URL")
                .or_else(|_| std::env::var("DB_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("DATABASE_URL or DB_URL environment variable required")
                })
                .and_then(|url| {
                    validate_database_url(&url)?;
                    Ok(url)
                })?,
            port: parse_var("PORT", 3000u16)
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", 10u32)
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a positive number"))?,
            jwt_secret: std::env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable required"))
                .and_then(|secret| {
                    if secret.trim().len() < 32 {
                        anyhow::bail!("JWT_SECRET must be at least 32 characters");
                    }
                    Ok(secret)
                })?,
            field_encryption_key: std::env::var("FIELD_ENCRYPTION_KEY")
                .map_err(|_| {
                    anyhow::anyhow!("FIELD_ENCRYPTION_KEY environment variable required")
                })
                .and_then(|key| {
                    validate_encryption_key(&key)?;
                    Ok(key)
                })?,
            default_page_limit: parse_var("DEFAULT_PAGE_LIMIT", 20u32)
                .map_err(|_| anyhow::anyhow!("DEFAULT_PAGE_LIMIT must be a positive number"))?,
            max_page_limit: parse_var("MAX_PAGE_LIMIT", 100u32)
                .map_err(|_| anyhow::anyhow!("MAX_PAGE_LIMIT must be a positive number"))?,
            default_phone_region: std::env::var("DEFAULT_PHONE_REGION")
                .unwrap_or_else(|_| "US".to_string())
                .trim()
                .to_uppercase()
                .parse()
                .map_err(|_| {
                    anyhow::anyhow!("DEFAULT_PHONE_REGION must be an ISO 3166 alpha-2 code")
                })?,
            integration_timeout: Duration::from_secs(
                parse_var("INTEGRATION_TIMEOUT_SECS", 5u64).map_err(|_| {
                    anyhow::anyhow!("INTEGRATION_TIMEOUT_SECS must be a positive number")
                })?,
            ),
            rate_limit_per_second: parse_var("RATE_LIMIT_PER_SECOND", 10u64)
                .map_err(|_| anyhow::anyhow!("RATE_LIMIT_PER_SECOND must be a positive number"))?,
            rate_limit_burst: parse_var("RATE_LIMIT_BURST", 20u32)
                .map_err(|_| anyhow::anyhow!("RATE_LIMIT_BURST must be a positive number"))?,
            white_label_cache_ttl: Duration::from_secs(
                parse_var("WHITE_LABEL_CACHE_TTL_SECS", 300u64).map_err(|_| {
                    anyhow::anyhow!("WHITE_LABEL_CACHE_TTL_SECS must be a positive number")
                })?,
            ),
        };

        if config.default_page_limit == 0 || config.default_page_limit > config.max_page_limit {
            anyhow::bail!("DEFAULT_PAGE_LIMIT must be between 1 and MAX_PAGE_LIMIT");
        }

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Database URL: {}...", url_prefix(&config.database_url));
        tracing::debug!("Server Port: {}", config.port);
        tracing::debug!(
            "Page limits: default {}, max {}",
            config.default_page_limit,
            config.max_page_limit
        );

        Ok(config)
    }

    /// Whether the configured store is the in-process one.
    pub fn uses_memory_store(&self) -> bool {
        self.database_url.starts_with("memory://")
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, T::Err> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse(),
        _ => Ok(default),
    }
}

fn validate_database_url(url: &str) -> anyhow::Result<()> {
    if url.trim().is_empty() {
        anyhow::bail!("DATABASE_URL cannot be empty");
    }
    if !url.starts_with("postgresql://")
        && !url.starts_with("postgres://")
        && !url.starts_with("memory://")
    {
        anyhow::bail!("DATABASE_URL must start with postgresql://, postgres:// or memory://");
    }
    Ok(())
}

fn validate_encryption_key(key: &str) -> anyhow::Result<()> {
    let bytes = BASE64
        .decode(key.trim())
        .map_err(|e| anyhow::anyhow!("FIELD_ENCRYPTION_KEY is not valid base64: {}", e))?;
    if bytes.len() != 32 {
        anyhow::bail!(
            "FIELD_ENCRYPTION_KEY must decode to 32 bytes, got {}",
            bytes.len()
        );
    }
    Ok(())
}

/// First 20 characters of a connection string, for logs.
fn url_prefix(url: &str) -> String {
    url.chars().take(20).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_url_schemes() {
        assert!(validate_database_url("postgres://localhost/mewayz").is_ok());
        assert!(validate_database_url("postgresql://localhost/mewayz").is_ok());
        assert!(validate_database_url("memory://").is_ok());
        assert!(validate_database_url("mongodb://localhost").is_err());
        assert!(validate_database_url("  ").is_err());
    }

    #[test]
    fn test_encryption_key_must_be_32_bytes() {
        let good = BASE64.encode([7u8; 32]);
        let short = BASE64.encode([7u8; 16]);
        assert!(validate_encryption_key(&good).is_ok());
        assert!(validate_encryption_key(&short).is_err());
        assert!(validate_encryption_key("not base64 !!").is_err());
    }

    #[test]
    fn test_url_prefix_respects_char_boundaries() {
        let url = "postgres://üüüüüüüüüü@db.example/mewayz";
        let prefix = url_prefix(url);
        assert_eq!(prefix.chars().count(), 20);
        assert!(url.starts_with(&prefix));
        assert_eq!(url_prefix("memory://"), "memory://");
    }
}
