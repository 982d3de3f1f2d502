use std::fmt::Display;

use tokio::time::error::Elapsed;

/// Error body of a non-2xx provider response.
#[derive(Debug, serde::Deserialize)]
pub struct ErrorResponse {
    pub code: String,
}

#[derive(Debug)]
pub enum BrevoError {
    RequestError(reqwest::Error),
    /// Non-2xx response, `details` holds the body as JSON when it parses, text otherwise
    ProviderResponse { status: u16, details: serde_json::Value },
    /// Contact with this email already exists
    DuplicateContact,
    InvalidApiKey,
    Timeout,
}

impl BrevoError {
    /// Raw diagnostic payload returned by the provider, if any.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            BrevoError::ProviderResponse { details, .. } => Some(details.clone()),
            _ => None,
        }
    }

    /// Provider error code of a rejected request, e.g. `duplicate_parameter`.
    pub fn code(&self) -> Option<String> {
        let BrevoError::ProviderResponse { details, .. } = self else {
            return None;
        };
        serde_json::from_value::<ErrorResponse>(details.clone())
            .ok()
            .map(|e| e.code)
    }
}

impl From<reqwest::Error> for BrevoError {
    fn from(value: reqwest::Error) -> Self {
        Self::RequestError(value)
    }
}

impl From<Elapsed> for BrevoError {
    fn from(_: Elapsed) -> Self {
        Self::Timeout
    }
}

impl std::error::Error for BrevoError {}

impl Display for BrevoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BrevoError::RequestError(e) => write!(f, "http request error: {e}"),
            BrevoError::ProviderResponse { status, details } => {
                write!(f, "provider responded with {status}: {details}")
            }
            BrevoError::DuplicateContact => f.write_str("contact already exists"),
            BrevoError::InvalidApiKey => f.write_str("api key is not a valid header value"),
            BrevoError::Timeout => f.write_str("provider request timed out"),
        }
    }
}
