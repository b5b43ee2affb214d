use anyhow::{anyhow, Result};
use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};

use crate::config::AppConfig;

/// Where uploaded post images live. Keys are relative paths such as
/// `posts/3f2a..._cat.png`; `base_url() + key` is the public URL.
#[derive(Clone)]
pub enum MediaStorage {
    Local(LocalStorage),
    S3(ObjectStorage),
}

impl MediaStorage {
    pub async fn new(config: &AppConfig) -> Result<Self> {
        match &config.s3_bucket {
            Some(_) => Ok(Self::S3(ObjectStorage::new(config).await?)),
            None => Ok(Self::Local(LocalStorage::new(
                &config.media_root,
                &config.media_url,
            ))),
        }
    }

    pub async fn save(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<()> {
        match self {
            Self::Local(storage) => storage.save(key, bytes).await,
            Self::S3(storage) => storage.save(key, bytes, content_type).await,
        }
    }

    pub fn base_url(&self) -> &str {
        match self {
            Self::Local(storage) => &storage.base_url,
            Self::S3(storage) => &storage.base_url,
        }
    }
}

#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: &str) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn save(&self, key: &str, bytes: Bytes) -> Result<()> {
        let relative = Path::new(key);
        if relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_)))
        {
            return Err(anyhow!("invalid media key: {}", key));
        }

        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes).await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct ObjectStorage {
    client: Client,
    bucket: String,
    base_url: String,
}

impl ObjectStorage {
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let bucket = config
            .s3_bucket
            .clone()
            .ok_or_else(|| anyhow!("missing required env var: S3_BUCKET"))?;
        let endpoint = config
            .s3_endpoint
            .clone()
            .ok_or_else(|| anyhow!("missing required env var: S3_ENDPOINT"))?;

        let region_provider = RegionProviderChain::first_try(Region::new(config.s3_region.clone()));
        let shared_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;

        let mut s3_builder = aws_sdk_s3::config::Builder::from(&shared_config)
            .region(shared_config.region().cloned())
            .endpoint_url(endpoint.clone())
            .force_path_style(true);
        if let Some(provider) = shared_config.credentials_provider() {
            s3_builder = s3_builder.credentials_provider(provider);
        }
        let client = Client::from_conf(s3_builder.build());

        let public = config.s3_public_endpoint.as_deref().unwrap_or(&endpoint);
        let base_url = format!("{}/{}/", public.trim_end_matches('/'), bucket);

        Ok(Self {
            client,
            bucket,
            base_url,
        })
    }

    async fn save(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await?;
        Ok(())
    }
}
