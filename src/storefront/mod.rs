use axum::response::IntoResponse;
use reqwest::StatusCode;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    brevo::error::BrevoError,
    mask,
    mpesa::error::{AuthError, GatewayError, StkPushError},
};

pub mod api;
/// Pricing and order emails
pub mod order;

pub type Result<T> = std::result::Result<T, ApiError>;

/// Caller-facing failure. Full diagnostics are logged where the error is raised,
/// the response body only carries a generic message and the provider's raw payload.
#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    Auth,
    Gateway {
        message: &'static str,
        details: Option<serde_json::Value>,
    },
    NotFound(&'static str),
    Internal,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Auth | ApiError::Gateway { .. } | ApiError::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn body(self) -> ErrorBody {
        let (message, details) = match self {
            ApiError::Validation(message) => (message, None),
            ApiError::Auth => (
                "Failed to authenticate with payment gateway.".to_string(),
                None,
            ),
            ApiError::Gateway { message, details } => (message.to_string(), details),
            ApiError::NotFound(message) => (message.to_string(), None),
            ApiError::Internal => ("Something went wrong.".to_string(), None),
        };
        ErrorBody {
            success: false,
            message,
            details,
        }
    }
}

impl std::error::Error for ApiError {}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Validation(message) => write!(f, "validation: {message}"),
            ApiError::Auth => f.write_str("payment gateway authentication failed"),
            ApiError::Gateway { message, .. } => write!(f, "gateway: {message}"),
            ApiError::NotFound(message) => write!(f, "not found: {message}"),
            ApiError::Internal => f.write_str("internal error"),
        }
    }
}

impl From<StkPushError> for ApiError {
    fn from(value: StkPushError) -> Self {
        match value {
            StkPushError::Auth(e) => e.into(),
            StkPushError::Gateway(e) => e.into(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(value: AuthError) -> Self {
        tracing::error!("Payment gateway authentication failed: {value}");
        ApiError::Auth
    }
}

impl From<GatewayError> for ApiError {
    fn from(value: GatewayError) -> Self {
        let details = value.details();
        tracing::error!(
            details = %details.as_ref().map(mask::secure_value).unwrap_or_default(),
            "Payment initiation failed: {value}"
        );
        ApiError::Gateway {
            message: "Failed to initiate payment.",
            details,
        }
    }
}

impl ApiError {
    pub fn from_provider(message: &'static str, error: BrevoError) -> Self {
        let details = error.details();
        tracing::error!(
            details = %details.as_ref().map(mask::secure_value).unwrap_or_default(),
            "{message} {error}"
        );
        ApiError::Gateway { message, details }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let body = self.body();
        tracing::debug!(%status, data = %mask::secure_serializable(&body), "Storefront API error response payload");
        (status, axum::Json(body)).into_response()
    }
}

/// Successful storefront response: `{"success": true, "message": ..}` plus any extra fields.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    #[serde(flatten)]
    data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(message: Option<&'static str>, data: T) -> Self {
        Self {
            success: true,
            message,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> axum::response::Response {
        axum::Json(self).into_response()
    }
}

/// `Json` extractor wrapper that turns body rejections into validation errors
pub struct Json<T>(pub T);

impl<S, T> axum::extract::FromRequest<S> for Json<T>
where
    T: serde::de::DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(
        req: axum::http::Request<axum::body::Body>,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(Self(value)),
            Err(e) => {
                tracing::debug!("Rejected request body: {e}");
                Err(ApiError::Validation(
                    "Request body is not valid JSON for this endpoint.".to_string(),
                ))
            }
        }
    }
}

/// Trimmed value of an optional string field, `None` when absent or blank.
pub fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Accepts a whole number given either as a JSON number or a numeric string.
/// Blank strings and `null` read as absent.
pub fn lenient_u64<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Whole(u64),
        Fractional(f64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Whole(n)) => Ok(Some(n)),
        Some(Raw::Fractional(n)) if n.fract() == 0.0 && n >= 0.0 => Ok(Some(n as u64)),
        Some(Raw::Fractional(_)) => Err(D::Error::custom("expected a whole number")),
        Some(Raw::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(Raw::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom("expected a whole number")),
    }
}
