use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::net::SocketAddr;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub http_addr: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_connect_timeout_seconds: u64,
    pub redis_url: Option<String>,
    pub index_cache_seconds: u64,
    pub media_root: String,
    pub media_url: String,
    pub s3_bucket: Option<String>,
    pub s3_endpoint: Option<String>,
    pub s3_public_endpoint: Option<String>,
    pub s3_region: String,
    pub paseto_access_key: [u8; 32],
    pub access_ttl_minutes: u64,
    pub upload_max_bytes: usize,
    pub admin_token: Option<String>,
    pub secure_cookies: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup, so callers other than
    /// the binary (tests, embedding) never have to mutate the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let http_addr = env.or("HTTP_ADDR", "0.0.0.0:8080");
        let _parsed_http_addr = SocketAddr::from_str(&http_addr)
            .map_err(|err| anyhow!("invalid HTTP_ADDR: {}", err))?;

        let mut media_url = env.or("MEDIA_URL", "/media/");
        if !media_url.ends_with('/') {
            media_url.push('/');
        }

        Ok(Self {
            http_addr,
            database_url: env.or("DATABASE_URL", "sqlite://yatube.db?mode=rwc"),
            db_max_connections: env.or_parse("DB_MAX_CONNECTIONS", "5")?,
            db_connect_timeout_seconds: env.or_parse("DB_CONNECT_TIMEOUT_SECONDS", "5")?,
            redis_url: env.optional("REDIS_URL"),
            index_cache_seconds: env.or_parse("INDEX_CACHE_SECONDS", "20")?,
            media_root: env.or("MEDIA_ROOT", "media"),
            media_url,
            s3_bucket: env.optional("S3_BUCKET"),
            s3_endpoint: env.optional("S3_ENDPOINT"),
            s3_public_endpoint: env.optional("S3_PUBLIC_ENDPOINT"),
            s3_region: env.or("S3_REGION", "us-east-1"),
            paseto_access_key: env.key_32("PASETO_ACCESS_KEY")?,
            access_ttl_minutes: env.or_parse("ACCESS_TTL_MINUTES", "20160")?,
            upload_max_bytes: env.or_parse("UPLOAD_MAX_BYTES", "10485760")?,
            admin_token: env.optional("ADMIN_TOKEN"),
            secure_cookies: env.or_parse("SECURE_COOKIES", "false")?,
        })
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|value| !value.trim().is_empty())
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn or_err(&self, key: &str) -> Result<String> {
        self.optional(key)
            .ok_or_else(|| anyhow!("missing required env var: {}", key))
    }

    fn or_parse<T>(&self, key: &str, default: &str) -> Result<T>
    where
        T: FromStr,
        <T as FromStr>::Err: std::fmt::Display,
    {
        self.or(key, default)
            .parse::<T>()
            .map_err(|err| anyhow!("invalid {}: {}", key, err))
    }

    fn key_32(&self, key: &str) -> Result<[u8; 32]> {
        let value = self.or_err(key)?;
        let decoded = STANDARD
            .decode(value.as_bytes())
            .map_err(|err| anyhow!("invalid {}: {}", key, err))?;
        if decoded.len() != 32 {
            return Err(anyhow!("invalid {}: expected 32 bytes", key));
        }
        let mut key_bytes = [0u8; 32];
        key_bytes.copy_from_slice(&decoded);
        Ok(key_bytes)
    }
}
