//! HTTP manifest fetching for native hosts

use super::parse_master_playlist;
use crate::{error::Error, QualityRendition, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Anything that can turn a manifest URL into a rendition ladder
#[async_trait]
pub trait ManifestSource: Send + Sync {
    /// Fetch and parse the manifest at `url`
    async fn load(&self, url: &Url) -> Result<Vec<QualityRendition>>;
}

/// Fetches manifests over HTTP, sending cookies like a browser would with
/// `withCredentials`
pub struct ManifestFetcher {
    client: Client,
}

impl ManifestFetcher {
    /// HLS content type served by the platform
    pub const CONTENT_TYPE: &'static str = "application/vnd.apple.mpegurl";

    pub fn new(with_credentials: bool, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(with_credentials)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ManifestSource for ManifestFetcher {
    #[instrument(skip(self))]
    async fn load(&self, url: &Url) -> Result<Vec<QualityRendition>> {
        debug!("Fetching HLS manifest: {}", url);

        let response = self
            .client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, Self::CONTENT_TYPE)
            .send()
            .await
            .map_err(|e| Error::ManifestFetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::ManifestFetch(format!("{} returned {}", url, status)));
        }

        let content = response
            .bytes()
            .await
            .map_err(|e| Error::ManifestFetch(e.to_string()))?;

        parse_master_playlist(&content)
    }
}
