use reqwest::Client;
use serde::de::DeserializeOwned;
use shared::{domain::CraneId, error::ApiError, protocol::CraneDetails};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiClientError {
    #[error("failed to connect to the server; are you sure it is running?")]
    Unreachable,
    #[error("{0}")]
    Api(ApiError),
    #[error("request failed: {0}")]
    Transport(String),
}

/// Fetch-and-map client for the static crane metadata endpoints. Out of the
/// realtime core: plain request/response, no session state.
pub struct RobotApi {
    http: Client,
    base_url: String,
}

impl RobotApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: Client::new(),
            base_url,
        }
    }

    pub async fn list_cranes(&self) -> Result<Vec<CraneDetails>, ApiClientError> {
        self.get_json(format!("{}/v1/robot", self.base_url)).await
    }

    pub async fn crane_details(&self, id: &CraneId) -> Result<CraneDetails, ApiClientError> {
        self.get_json(format!("{}/v1/robot/{id}", self.base_url))
            .await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, ApiClientError> {
        let response = self.http.get(&url).send().await.map_err(classify)?;
        let status = response.status();
        if !status.is_success() {
            // Prefer the server's error envelope when one is present.
            return Err(match response.json::<ApiError>().await {
                Ok(api) => ApiClientError::Api(api),
                Err(_) => ApiClientError::Transport(format!("unexpected status {status}")),
            });
        }
        response.json().await.map_err(classify)
    }
}

fn classify(err: reqwest::Error) -> ApiClientError {
    if err.is_connect() {
        ApiClientError::Unreachable
    } else {
        ApiClientError::Transport(err.to_string())
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
