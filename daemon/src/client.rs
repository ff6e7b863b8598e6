use crate::metadata::DaemonMetadata;
use anyhow::Context;
use anyhow::bail;
use lore_protocol::QueryOutput;
use lore_protocol::SearchRequest;
use lore_protocol::StatusResponse;
use std::path::Path;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Caller side of the daemon protocol: loads the discovery metadata,
/// checks compatibility, and issues authenticated JSON requests over
/// loopback.
#[derive(Debug)]
pub struct DaemonClient {
    base_url: String,
    secret: String,
    http: reqwest::Client,
}

impl DaemonClient {
    pub fn connect(metadata_path: &Path) -> anyhow::Result<Self> {
        let metadata = DaemonMetadata::load(metadata_path)
            .with_context(|| format!("no daemon metadata at {}", metadata_path.display()))?;
        if !metadata.is_compatible() {
            bail!(
                "daemon at port {} speaks protocol v{}, this client requires v{}",
                metadata.port,
                metadata.schema_version,
                lore_protocol::PROTOCOL_VERSION,
            );
        }

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: format!("http://127.0.0.1:{}", metadata.port),
            secret: metadata.secret,
            http,
        })
    }

    pub async fn search(&self, request: &SearchRequest) -> anyhow::Result<QueryOutput> {
        let response = self
            .http
            .post(format!("{}/v1/search", self.base_url))
            .bearer_auth(&self.secret)
            .json(request)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    pub async fn health(&self) -> anyhow::Result<StatusResponse> {
        let response = self
            .http
            .get(format!("{}/health", self.base_url))
            .bearer_auth(&self.secret)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}
