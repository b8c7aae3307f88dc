pub mod cached;

use anyhow::{anyhow, Context, Result};
use reqwest::{Client as ReqwestClient, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use shared_types::{ConfigurationPatch, ConfigurationRecord, Envelope, HistoryEntry};
use std::time::Duration;
use tracing::debug;

/// Header the server accepts a static API token in
pub const API_TOKEN_HEADER: &str = "x-api-token";

#[derive(Debug, Clone)]
enum Credential {
    Bearer(String),
    ApiToken(String),
}

/// Client for interacting with the remote config service
#[derive(Debug, Clone)]
pub struct ConfigClient {
    client: ReqwestClient,
    base_url: String,
    credential: Option<Credential>,
}

impl ConfigClient {
    /// Create a new client instance
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = ReqwestClient::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credential: None,
        })
    }

    /// Sends writes with `Authorization: Bearer <token>`
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.credential = Some(Credential::Bearer(token.into()));
        self
    }

    /// Sends writes with the static API token header
    #[must_use]
    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.credential = Some(Credential::ApiToken(token.into()));
        self
    }

    /// Joins percent-encoded path segments onto the base URL
    fn url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid base URL: {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|()| anyhow!("Base URL cannot carry a path: {}", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credential {
            Some(Credential::Bearer(token)) => request.bearer_auth(token),
            Some(Credential::ApiToken(token)) => request.header(API_TOKEN_HEADER, token),
            None => request,
        }
    }

    /// Fails with the server's message for any non-success status
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<Envelope<Value>>()
            .await
            .ok()
            .and_then(|envelope| envelope.message)
            .unwrap_or_else(|| status.to_string());
        anyhow::bail!("Request failed with {}: {}", status, message)
    }

    /// Unwraps an enveloped body, mapping 404 to `None`
    async fn envelope<T: DeserializeOwned>(response: Response) -> Result<Option<T>> {
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let envelope: Envelope<T> = Self::check(response).await?.json().await?;
        envelope
            .data
            .map(Some)
            .ok_or_else(|| anyhow!("Response envelope carries no data"))
    }

    /// List every configuration record
    pub async fn list_configs(&self) -> Result<Vec<ConfigurationRecord>> {
        let response = self.client.get(self.url(["config"])?).send().await?;
        let envelope: Envelope<Vec<ConfigurationRecord>> =
            Self::check(response).await?.json().await?;
        Ok(envelope.data.unwrap_or_default())
    }

    /// Get a configuration record, `None` when it does not exist
    pub async fn get_config(&self, name: &str) -> Result<Option<ConfigurationRecord>> {
        let response = self.client.get(self.url(["config", name])?).send().await?;
        Self::envelope(response).await
    }

    /// Create or update a configuration
    pub async fn save_config(
        &self,
        name: &str,
        patch: &ConfigurationPatch,
    ) -> Result<ConfigurationRecord> {
        debug!("Saving configuration: {}", name);
        let request = self.client.post(self.url(["config", name])?).json(patch);
        let response = self.authorize(request).send().await?;

        let envelope: Envelope<ConfigurationRecord> = Self::check(response).await?.json().await?;
        envelope
            .data
            .ok_or_else(|| anyhow!("Save of '{}' returned no record", name))
    }

    /// Delete a configuration. Returns `false` when there was nothing to delete.
    pub async fn delete_config(&self, name: &str) -> Result<bool> {
        let request = self.client.delete(self.url(["config", name])?);
        let response = self.authorize(request).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::check(response).await?;
        Ok(true)
    }

    /// Name to resolved value, as seen from `country` when given
    pub async fn resolved(&self, country: Option<&str>) -> Result<Map<String, Value>> {
        let mut request = self.client.get(self.url(["config", "json"])?);
        if let Some(country) = country {
            request = request.query(&[("country", country)]);
        }

        let response = request.send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// One record as a country sees it
    pub async fn country_view(
        &self,
        name: &str,
        country: &str,
    ) -> Result<Option<Map<String, Value>>> {
        let url = self.url(["config", name, "country", country])?;
        let response = self.client.get(url).send().await?;
        Self::envelope(response).await
    }

    /// Archived snapshots of a configuration, oldest first
    pub async fn history(&self, name: &str) -> Result<Vec<HistoryEntry>> {
        let url = self.url(["config", name, "history"])?;
        let response = self.client.get(url).send().await?;
        let envelope: Envelope<Vec<HistoryEntry>> = Self::check(response).await?.json().await?;
        Ok(envelope.data.unwrap_or_default())
    }

    pub async fn history_entry(&self, name: &str, version: u64) -> Result<Option<HistoryEntry>> {
        let version = version.to_string();
        let url = self.url(["config", name, "history", version.as_str()])?;
        let response = self.client.get(url).send().await?;
        Self::envelope(response).await
    }

    /// Check if the service is healthy
    pub async fn health_check(&self) -> Result<bool> {
        let response = self.client.get(self.url(["health"])?).send().await?;

        Ok(response.status() == StatusCode::OK)
    }
}
