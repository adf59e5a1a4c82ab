//! REST backend client with bearer credentials

use std::time::Duration;

use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};

use crate::config::Config;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for the account backend. Only two calls are consumed: loadout
/// fetch and match-result submission.
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    /// `None` when no backend is configured
    pub fn from_config(config: &Config) -> Option<Self> {
        config
            .backend_url
            .as_ref()
            .map(|url| Self::new(url.clone(), config.backend_token.clone()))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the API URL for a path
    fn api_url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }

    /// Make an authenticated GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let request = self
            .client
            .get(self.api_url(path))
            .header("Accept", "application/json");

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(BackendError::Request)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response.json().await.map_err(BackendError::Parse)
    }

    /// Make an authenticated POST request with a JSON body
    pub async fn post<T: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        data: &T,
    ) -> Result<R, BackendError> {
        let request = self
            .client
            .post(self.api_url(path))
            .header("Content-Type", "application/json")
            .json(data);

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(BackendError::Request)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response.json().await.map_err(BackendError::Parse)
    }
}

/// Backend errors
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(reqwest::Error),
}
