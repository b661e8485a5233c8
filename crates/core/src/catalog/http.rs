use reqwest::Client;
use tracing::debug;

use crate::config::CatalogConfig;

use super::{CatalogError, CatalogRecord, CatalogResolver};

/// Catalog client for a PostgREST-style endpoint (`/rest/v1/<table>`).
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpCatalog {
    /// Build a client from configuration. Every request is bounded by the configured timeout.
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self::with_client(client, config))
    }

    /// Use a preconfigured client; the caller is responsible for its timeouts.
    pub fn with_client(client: Client, config: &CatalogConfig) -> Self {
        Self {
            client,
            endpoint: format!(
                "{}/rest/v1/{}",
                config.base_url.trim_end_matches('/'),
                config.table
            ),
            api_key: config.api_key.clone().filter(|key| !key.is_empty()),
        }
    }

    /// URL queried for every lookup.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn fetch(&self, column: &str, value: &str) -> Result<Vec<CatalogRecord>, CatalogError> {
        let mut request = self
            .client
            .get(&self.endpoint)
            .query(&[("select", "*".to_string()), (column, format!("eq.{value}"))]);
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key).bearer_auth(key);
        }

        let response = request.send().await.map_err(classify)?;
        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status(status.as_u16()));
        }
        let records: Vec<CatalogRecord> = response.json().await.map_err(classify)?;
        debug!("catalog {column}={value}: {} records", records.len());
        Ok(records)
    }
}

fn classify(err: reqwest::Error) -> CatalogError {
    if err.is_timeout() {
        CatalogError::Timeout
    } else {
        CatalogError::Http(err)
    }
}

impl CatalogResolver for HttpCatalog {
    async fn resolve_by_id(&self, steam_id: &str) -> Result<Vec<CatalogRecord>, CatalogError> {
        self.fetch("steam_id", steam_id).await
    }

    async fn resolve_by_name(&self, name: &str) -> Result<Vec<CatalogRecord>, CatalogError> {
        self.fetch("name", name).await
    }
}
