use std::{sync::Arc, time::Duration};

use axum::http::{HeaderMap, HeaderValue, header};
use base64::{Engine, prelude::BASE64_STANDARD};
use time::OffsetDateTime;
use tokio::sync::Mutex;

use crate::{bounded, mask, mpesa::error::AuthError};

/// Tokens are refreshed this long before the expiry the gateway states.
const REFRESH_SKEW: time::Duration = time::Duration::seconds(60);

pub fn basic_auth_headers(consumer_key: &str, consumer_secret: &str) -> HeaderMap {
    let credential = BASE64_STANDARD.encode(format!("{consumer_key}:{consumer_secret}"));
    let mut map = HeaderMap::new();
    map.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Basic {credential}")).expect("base64 is ascii"),
    );
    map
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    /// `None` when the gateway did not state a lifetime, such tokens are never reused
    pub expires_at: Option<OffsetDateTime>,
}

impl AccessToken {
    fn is_fresh(&self, now: OffsetDateTime) -> bool {
        self.expires_at
            .is_some_and(|expires_at| now + REFRESH_SKEW < expires_at)
    }
}

#[derive(Debug, serde::Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<ExpiresIn>,
}

/// The gateway reports `expires_in` as a string of seconds.
#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
enum ExpiresIn {
    Seconds(i64),
    Text(String),
}

impl ExpiresIn {
    fn seconds(&self) -> Option<i64> {
        match self {
            ExpiresIn::Seconds(s) => Some(*s),
            ExpiresIn::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Issues and caches bearer tokens for the payment gateway.
///
/// The cache lock is held for the duration of a fetch, concurrent callers share one fetch.
#[derive(Debug, Clone)]
pub struct TokenProvider {
    client: reqwest::Client,
    url: String,
    consumer_key: String,
    consumer_secret: String,
    timeout: Duration,
    cache: Arc<Mutex<Option<AccessToken>>>,
}

impl TokenProvider {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        consumer_key: &str,
        consumer_secret: &str,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            url: format!("{base_url}/oauth/v1/generate?grant_type=client_credentials"),
            consumer_key: consumer_key.to_string(),
            consumer_secret: consumer_secret.to_string(),
            timeout,
            cache: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn access_token(&self) -> Result<AccessToken, AuthError> {
        let mut cache = self.cache.lock().await;
        if let Some(token) = cache
            .as_ref()
            .filter(|token| token.is_fresh(OffsetDateTime::now_utc()))
        {
            tracing::trace!("Using cached gateway access token");
            return Ok(token.clone());
        }

        let token = bounded::call("mpesa_oauth", self.timeout, self.fetch()).await?;
        *cache = token.expires_at.is_some().then(|| token.clone());
        Ok(token)
    }

    async fn fetch(&self) -> Result<AccessToken, AuthError> {
        tracing::debug!(url = %self.url, "Gateway API token request");
        let res = self
            .client
            .get(&self.url)
            .headers(basic_auth_headers(&self.consumer_key, &self.consumer_secret))
            .send()
            .await?;
        let status = res.status();
        let body = res.text().await?;
        if !status.is_success() {
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let response: serde_json::Value = serde_json::from_str(&body)?;
        tracing::debug!(%status, response = %mask::secure_value(&response), "Gateway API token response");
        let response: TokenResponse = serde_json::from_value(response)?;
        let value = response
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingToken)?;
        let issued_at = OffsetDateTime::now_utc();
        // a lifetime that is not positive or overflows the clock counts as none
        let expires_at = response
            .expires_in
            .and_then(|expires_in| expires_in.seconds())
            .filter(|seconds| *seconds > 0)
            .and_then(|seconds| issued_at.checked_add(time::Duration::seconds(seconds)));

        Ok(AccessToken { value, expires_at })
    }
}
