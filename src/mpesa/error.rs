use std::fmt::Display;

use tokio::time::error::Elapsed;

/// Failure to obtain a bearer token from the OAuth endpoint.
#[derive(Debug)]
pub enum AuthError {
    RequestError(reqwest::Error),
    /// Non-2xx response from the token endpoint
    Rejected { status: u16, body: String },
    Deserialization(serde_json::Error),
    MissingToken,
    Timeout,
}

impl From<reqwest::Error> for AuthError {
    fn from(value: reqwest::Error) -> Self {
        Self::RequestError(value)
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(value: serde_json::Error) -> Self {
        Self::Deserialization(value)
    }
}

impl From<Elapsed> for AuthError {
    fn from(_: Elapsed) -> Self {
        Self::Timeout
    }
}

impl std::error::Error for AuthError {}

impl Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::RequestError(e) => write!(f, "token request error: {e}"),
            AuthError::Rejected { status, body } => {
                write!(f, "token endpoint responded with {status}: {body}")
            }
            AuthError::Deserialization(e) => write!(f, "token response deserialization: {e}"),
            AuthError::MissingToken => f.write_str("token response has no access_token"),
            AuthError::Timeout => f.write_str("token request timed out"),
        }
    }
}

/// Failure of the payment initiation call.
#[derive(Debug)]
pub enum GatewayError {
    RequestError(reqwest::Error),
    /// Non-2xx response, `details` holds the body as JSON when it parses, text otherwise
    GatewayResponse { status: u16, details: serde_json::Value },
    GatewayDeserialization { source: serde_json::Error, body: String },
    InvalidToken,
    Timeout,
}

impl GatewayError {
    /// Raw diagnostic payload returned by the gateway, if any.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            GatewayError::GatewayResponse { details, .. } => Some(details.clone()),
            GatewayError::GatewayDeserialization { body, .. } if !body.is_empty() => {
                Some(serde_json::Value::String(body.clone()))
            }
            _ => None,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(value: reqwest::Error) -> Self {
        Self::RequestError(value)
    }
}

impl From<Elapsed> for GatewayError {
    fn from(_: Elapsed) -> Self {
        Self::Timeout
    }
}

impl std::error::Error for GatewayError {}

impl Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayError::RequestError(e) => write!(f, "http request error: {e}"),
            GatewayError::GatewayResponse { status, details } => {
                write!(f, "gateway responded with {status}: {details}")
            }
            GatewayError::GatewayDeserialization { source, .. } => {
                write!(f, "gateway response deserialization: {source}")
            }
            GatewayError::InvalidToken => f.write_str("access token is not a valid bearer token"),
            GatewayError::Timeout => f.write_str("gateway request timed out"),
        }
    }
}

/// Failure anywhere in the token → build → initiate flow.
#[derive(Debug)]
pub enum StkPushError {
    Auth(AuthError),
    Gateway(GatewayError),
}

impl From<AuthError> for StkPushError {
    fn from(value: AuthError) -> Self {
        Self::Auth(value)
    }
}

impl From<GatewayError> for StkPushError {
    fn from(value: GatewayError) -> Self {
        Self::Gateway(value)
    }
}

impl std::error::Error for StkPushError {}

impl Display for StkPushError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StkPushError::Auth(e) => write!(f, "authentication: {e}"),
            StkPushError::Gateway(e) => write!(f, "initiation: {e}"),
        }
    }
}
