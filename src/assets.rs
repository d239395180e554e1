use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Where site files (translation catalogs, nav partials) come from.
/// Paths are site-root relative, e.g. `i18n/en.json`. `Ok(None)` means not found.
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn fetch(&self, path: &str) -> Result<Option<String>>;
}

pub struct FsAssets {
    root: PathBuf,
}

impl FsAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl AssetSource for FsAssets {
    async fn fetch(&self, path: &str) -> Result<Option<String>> {
        let rel = path.trim_start_matches('/');
        if rel.split('/').any(|seg| seg == "..") {
            anyhow::bail!("asset path escapes the site root: {path}");
        }
        let full = self.root.join(rel);
        match tokio::fs::read_to_string(&full).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("couldn't read asset {}", full.display())),
        }
    }
}

pub struct HttpAssets {
    base: url::Url,
    client: reqwest::Client,
}

impl HttpAssets {
    pub fn new(base: &str) -> Result<Self> {
        // A base without a trailing slash would drop its last segment on join.
        let base = if base.ends_with('/') { base.to_string() } else { format!("{base}/") };
        let base = url::Url::parse(&base).with_context(|| format!("bad asset base url '{base}'"))?;
        let client = reqwest::Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self { base, client })
    }
}

#[async_trait]
impl AssetSource for HttpAssets {
    async fn fetch(&self, path: &str) -> Result<Option<String>> {
        let url = self.base.join(path.trim_start_matches('/'))?;
        let resp = self.client.get(url.clone()).send().await.with_context(|| format!("GET {url}"))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = resp.error_for_status().with_context(|| format!("GET {url}"))?;
        Ok(Some(resp.text().await?))
    }
}

/// `[site] assets` is either an http(s) base URL or a directory.
pub fn from_config(site: &crate::config::Site) -> Result<Arc<dyn AssetSource>> {
    let src = site.assets.trim();
    if src.starts_with("http://") || src.starts_with("https://") {
        Ok(Arc::new(HttpAssets::new(src)?))
    } else {
        Ok(Arc::new(FsAssets::new(src)))
    }
}
