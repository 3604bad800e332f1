use anyhow::{Context, Result, bail};
use reqwest::StatusCode;

use nutrilog_core::models::Snapshot;
use nutrilog_core::remote::RemoteStore;

const SYNC_PATH: &str = "/api/sync";

/// [`RemoteStore`] backed by a `nutrilog serve` instance.
pub struct HttpRemoteStore {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpRemoteStore {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("nutrilog/{}", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(10))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            url: format!("{}{SYNC_PATH}", base_url.trim_end_matches('/')),
            api_key,
        })
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    /// `Ok(None)` when the server has no document yet.
    pub async fn try_fetch(&self) -> Result<Option<Snapshot>> {
        let resp = self
            .authorize(self.client.get(&self.url))
            .send()
            .await
            .context("Failed to reach sync server")?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => {
                let snapshot = resp
                    .json::<Snapshot>()
                    .await
                    .context("Failed to parse sync document")?;
                Ok(Some(snapshot))
            }
            s => bail!("Sync server returned {s}"),
        }
    }

    pub async fn try_push(&self, snapshot: &Snapshot) -> Result<()> {
        let resp = self
            .authorize(self.client.post(&self.url))
            .json(snapshot)
            .send()
            .await
            .context("Failed to reach sync server")?;
        let status = resp.status();
        if !status.is_success() {
            bail!("Sync server returned {status}");
        }
        Ok(())
    }
}

impl RemoteStore for HttpRemoteStore {
    async fn fetch_remote(&self) -> Option<Snapshot> {
        match self.try_fetch().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::warn!("Remote fetch failed: {e:#}");
                None
            }
        }
    }

    async fn push_remote(&self, snapshot: &Snapshot) -> bool {
        match self.try_push(snapshot).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Remote push failed: {e:#}");
                false
            }
        }
    }
}
