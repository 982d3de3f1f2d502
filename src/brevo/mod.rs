use std::{sync::Arc, time::Duration};

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum_extra::headers::{self, HeaderMapExt};
use serde::Serialize;

use crate::{
    brevo::error::BrevoError,
    config::BrevoConfig,
    mask,
};

/// Contact creation
pub mod contacts;
/// Transactional email
pub mod email;
pub mod error;

pub type Result<T> = std::result::Result<T, BrevoError>;

/// Client for the email and contacts provider, configured once at startup.
#[derive(Debug, Clone)]
pub struct BrevoClient {
    client: reqwest::Client,
    config: Arc<BrevoConfig>,
    timeout: Duration,
}

fn api_key_headers(api_key: &str) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    let value = HeaderValue::from_str(api_key).map_err(|_| BrevoError::InvalidApiKey)?;
    map.insert(HeaderName::from_static("api-key"), value);
    map.typed_insert(headers::ContentType::json());
    map.insert(
        axum::http::header::ACCEPT,
        HeaderValue::from_static("application/json"),
    );
    Ok(map)
}

impl BrevoClient {
    pub fn new(client: reqwest::Client, config: BrevoConfig, timeout: Duration) -> Self {
        Self {
            client,
            config: Arc::new(config),
            timeout,
        }
    }

    pub fn config(&self) -> &BrevoConfig {
        &self.config
    }

    /// POSTs `payload` to `path` and returns the parsed body of a 2xx response.
    async fn post(&self, path: &str, payload: &impl Serialize) -> Result<serde_json::Value> {
        let url = format!("{}/{path}", self.config.base_url);
        tracing::debug!(%url, data = %mask::secure_serializable(payload), "Provider API request");
        let res = self
            .client
            .post(&url)
            .headers(api_key_headers(&self.config.api_key)?)
            .json(payload)
            .send()
            .await?;
        let status = res.status();
        let body = res.text().await?;
        let response = serde_json::from_str::<serde_json::Value>(&body)
            .unwrap_or(serde_json::Value::String(body));
        tracing::debug!(%url, %status, response = %mask::secure_value(&response), "Provider API response");

        if status.is_success() {
            return Ok(response);
        }
        Err(BrevoError::ProviderResponse {
            status: status.as_u16(),
            details: response,
        })
    }
}
