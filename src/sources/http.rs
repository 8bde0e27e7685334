//! Thin JSON-over-HTTP helper shared by the provider clients.

use crate::error::FetchError;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

const USER_AGENT: &str = concat!("genelink/", env!("CARGO_PKG_VERSION"));

/// A provider base URL plus a shared HTTP client.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSource {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build the shared client used by every provider.
    pub fn default_client() -> Result<reqwest::Client, FetchError> {
        reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(FetchError::from_reqwest)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        if path.is_empty() {
            self.base_url.clone()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    /// `GET {base}/{path}?{query}` decoded as JSON.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let url = self.url(path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .query(query)
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        decode(response).await
    }

    /// `POST {base}/{path}` with a JSON body, decoded as JSON.
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, FetchError> {
        let url = self.url(path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, FetchError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(FetchError::from_status(status.as_u16(), body));
    }

    let bytes = response.bytes().await.map_err(FetchError::from_reqwest)?;
    serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))
}
