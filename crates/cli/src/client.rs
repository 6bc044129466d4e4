//! API client for the Vitals query API

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("not logged in; run `vitals login` first")]
    NotLoggedIn,
    #[error("unauthorized: {0}; run `vitals login` again")]
    Unauthorized(String),
    #[error("API error ({status}): {body}")]
    Api { status: StatusCode, body: String },
}

pub struct ApiClient {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self {
            client,
            base_url,
            token: None,
        })
    }

    /// Send `token` as a bearer token on every request
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        self.request(builder)
            .send()
            .await
            .context("Failed to send request")
    }

    async fn check(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED {
            if !self.has_token() {
                return Err(ClientError::NotLoggedIn.into());
            }
            let message = serde_json::from_str::<MessageBody>(&body)
                .ok()
                .and_then(|b| b.msg)
                .unwrap_or(body);
            return Err(ClientError::Unauthorized(message).into());
        }

        Err(ClientError::Api { status, body }.into())
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).context("Invalid path")
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(self.client.get(self.url(path)?)).await?;
        let response = self.check(response).await?;
        response.json().await.context("Failed to parse response")
    }

    /// GET returning the raw body
    pub async fn get_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let response = self.send(self.client.get(self.url(path)?)).await?;
        let response = self.check(response).await?;
        let bytes = response.bytes().await.context("Failed to read response body")?;
        Ok(bytes.to_vec())
    }

    /// GET that parses the body whatever the status, for health probes
    pub async fn get_with_status<T: DeserializeOwned>(&self, path: &str) -> Result<(StatusCode, T)> {
        let response = self.send(self.client.get(self.url(path)?)).await?;
        let status = response.status();
        let body = response.json().await.context("Failed to parse response")?;
        Ok((status, body))
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response = self.send(self.client.post(self.url("login")?).json(&request)).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            let body: MessageBody = response.json().await.unwrap_or_default();
            anyhow::bail!(
                "{}",
                body.msg.unwrap_or_else(|| "Bad username or password".to_string())
            );
        }

        let response: LoginResponse = self
            .check(response)
            .await?
            .json()
            .await
            .context("Failed to parse response")?;
        Ok(response.access_token)
    }
}

// API request and response types

#[derive(Debug, Default, Deserialize)]
struct MessageBody {
    msg: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
}

/// Recent values per metric
pub type MetricHistories = BTreeMap<String, Vec<serde_json::Value>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub prediction: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: BTreeMap<String, ComponentHealth>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
