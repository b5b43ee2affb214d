pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use crate::config::AppConfig;
use crate::http::templates::Templates;
use crate::infra::{cache::PageCache, db::Db, storage::MediaStorage};

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub cache: PageCache,
    pub storage: MediaStorage,
    pub templates: Templates,
    pub index_cache_seconds: u64,
    pub upload_max_bytes: usize,
    pub admin_token: Option<String>,
    pub paseto_access_key: [u8; 32],
    pub access_ttl_minutes: u64,
    pub secure_cookies: bool,
}

impl AppState {
    /// Connects every backing service named by the config and runs pending
    /// migrations.
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let db = Db::connect(config).await?;
        let cache = PageCache::connect(config.redis_url.as_deref()).await?;
        let storage = MediaStorage::new(config).await?;
        let templates = Templates::load()?;

        Ok(Self {
            db,
            cache,
            storage,
            templates,
            index_cache_seconds: config.index_cache_seconds,
            upload_max_bytes: config.upload_max_bytes,
            admin_token: config.admin_token.clone(),
            paseto_access_key: config.paseto_access_key,
            access_ttl_minutes: config.access_ttl_minutes,
            secure_cookies: config.secure_cookies,
        })
    }
}
