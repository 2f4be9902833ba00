use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::api::model::{BatchResp, ListBatchesResp};
use crate::config::Config;
use crate::model::{Batch, BatchId, BatchPatch, StatusFilter};

pub mod model;

/// The remote batch service. It is the source of truth; the manager only
/// ever reflects what it confirms.
#[async_trait]
pub trait BatchService: Send + Sync {
    async fn list_batches(&self, filter: StatusFilter) -> Result<Vec<Batch>>;

    async fn update_batch(&self, id: &BatchId, patch: &BatchPatch) -> Result<Batch>;

    async fn delete_batch(&self, id: &BatchId) -> Result<()>;

    async fn create_batch(&self, fields: &Map<String, Value>) -> Result<Batch>;
}

#[derive(Clone)]
pub struct HttpBatchClient {
    http: Client,
    base_url: Url,
    batches_path: String,
    token: Option<String>,
}

impl fmt::Debug for HttpBatchClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpBatchClient")
            .field("base_url", &self.base_url)
            .field("batches_path", &self.batches_path)
            .finish_non_exhaustive()
    }
}

impl HttpBatchClient {
    pub fn new(base_url: Url, batches_path: String, token: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("batch-lifecycle/", env!("CARGO_PKG_VERSION")))
            .no_proxy()
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: with_trailing_slash(base_url),
            batches_path: batches_path.trim_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let base_url = Url::parse(&cfg.api.base_url).context("invalid api.base_url")?;
        Self::new(base_url, cfg.api.batches_path.clone(), cfg.resolved_token())
    }

    fn collection_url(&self) -> Result<Url> {
        self.base_url
            .join(&self.batches_path)
            .context("invalid batch service URL")
    }

    fn item_url(&self, id: &BatchId) -> Result<Url> {
        let mut url = self.collection_url()?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("batch service URL cannot take a path"))?
            .push(id.as_str());
        Ok(url)
    }

    pub fn build_list_request(&self, filter: StatusFilter) -> Result<reqwest::Request> {
        let mut url = self.collection_url()?;
        if let Some(status) = filter.status() {
            url.query_pairs_mut().append_pair("status", status.as_str());
        }
        self.build_request::<()>(Method::GET, url, None)
    }

    pub fn build_update_request(&self, id: &BatchId, patch: &BatchPatch) -> Result<reqwest::Request> {
        self.build_request(Method::PUT, self.item_url(id)?, Some(patch))
    }

    pub fn build_delete_request(&self, id: &BatchId) -> Result<reqwest::Request> {
        self.build_request::<()>(Method::DELETE, self.item_url(id)?, None)
    }

    pub fn build_create_request(&self, fields: &Map<String, Value>) -> Result<reqwest::Request> {
        self.build_request(Method::POST, self.collection_url()?, Some(fields))
    }

    fn build_request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<reqwest::Request> {
        let mut builder = self
            .http
            .request(method, url)
            .header("X-Request-Id", Uuid::new_v4().to_string());
        if let Some(token) = &self.token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        if let Some(body) = body {
            builder = builder
                .header("Content-Type", "application/json")
                .json(body);
        }
        builder.build().context("failed to build batch service request")
    }

    async fn execute(&self, request: reqwest::Request) -> Result<String> {
        let method = request.method().clone();
        let url = request.url().clone();
        let request_id = request
            .headers()
            .get("X-Request-Id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        debug!(%method, %url, %request_id, authorized = self.token.is_some(), "batch service request");

        let res = self
            .http
            .execute(request)
            .await
            .with_context(|| format!("failed to reach batch service ({method} {url})"))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!(%method, %url, %request_id, %status, "batch service error");
            return Err(anyhow!("batch service error {}: {}", status, body));
        }
        let body = res
            .text()
            .await
            .context("failed to read batch service response")?;
        debug!(%method, %url, %request_id, %status, bytes = body.len(), "batch service response");
        Ok(body)
    }
}

#[async_trait]
impl BatchService for HttpBatchClient {
    async fn list_batches(&self, filter: StatusFilter) -> Result<Vec<Batch>> {
        let body = self.execute(self.build_list_request(filter)?).await?;
        let resp: ListBatchesResp =
            serde_json::from_str(&body).context("invalid batch list JSON")?;
        Ok(resp.into_batches())
    }

    async fn update_batch(&self, id: &BatchId, patch: &BatchPatch) -> Result<Batch> {
        let body = self.execute(self.build_update_request(id, patch)?).await?;
        let resp: BatchResp = serde_json::from_str(&body).context("invalid batch JSON")?;
        Ok(resp.into_batch())
    }

    async fn delete_batch(&self, id: &BatchId) -> Result<()> {
        self.execute(self.build_delete_request(id)?).await?;
        Ok(())
    }

    async fn create_batch(&self, fields: &Map<String, Value>) -> Result<Batch> {
        let body = self.execute(self.build_create_request(fields)?).await?;
        let resp: BatchResp = serde_json::from_str(&body).context("invalid batch JSON")?;
        Ok(resp.into_batch())
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
