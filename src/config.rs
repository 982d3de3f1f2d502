use std::{env, time::Duration};

use url::Url;

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/storefront.db";
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CALLBACK_WINDOW_SECS: u64 = 180;
const DEFAULT_BREVO_BASE_URL: &str = "https://api.brevo.com/v3";
const DEFAULT_SENDER_NAME: &str = "44 Bulldogs Store";
const DEFAULT_ACCOUNT_REFERENCE: &str = "44Bulldogs";
const DEFAULT_ALLOWED_ORIGINS: [&str; 3] = [
    "http://localhost:5173",
    "https://www.ujananaujuzi.org",
    "https://ujana-na-ujuzi.vercel.app",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingRequired(&'static str),

    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("invalid URL in {name}: {value}")]
    InvalidUrl { name: &'static str, value: String },
}

/// Payment gateway deployment the merchant credentials belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpesaEnvironment {
    Sandbox,
    Production,
}

impl MpesaEnvironment {
    pub fn base_url(self) -> &'static str {
        match self {
            Self::Sandbox => "https://sandbox.safaricom.co.ke",
            Self::Production => "https://api.safaricom.co.ke",
        }
    }
}

impl std::str::FromStr for MpesaEnvironment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sandbox" => Ok(Self::Sandbox),
            "production" | "live" => Ok(Self::Production),
            _ => Err(ConfigError::InvalidValue {
                name: "MPESA_ENV",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Clone)]
pub struct MpesaConfig {
    pub environment: MpesaEnvironment,
    /// Resolved from `environment` unless overridden with `MPESA_BASE_URL`
    pub base_url: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub short_code: String,
    pub passkey: String,
    /// Public URL the gateway posts payment results to
    pub callback_url: String,
    pub account_reference: String,
    /// How long an initiated payment may wait for its callback
    pub callback_window: Duration,
}

impl std::fmt::Debug for MpesaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MpesaConfig")
            .field("environment", &self.environment)
            .field("base_url", &self.base_url)
            .field("consumer_key", &"[REDACTED]")
            .field("consumer_secret", &"[REDACTED]")
            .field("short_code", &self.short_code)
            .field("passkey", &"[REDACTED]")
            .field("callback_url", &self.callback_url)
            .field("account_reference", &self.account_reference)
            .field("callback_window", &self.callback_window)
            .finish()
    }
}

#[derive(Clone)]
pub struct BrevoConfig {
    pub api_key: String,
    pub base_url: String,
    pub sender_email: String,
    pub sender_name: String,
    pub admin_email: String,
    pub admin_name: String,
    /// Contact list new newsletter subscribers are added to
    pub list_id: Option<u64>,
}

impl std::fmt::Debug for BrevoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrevoConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("sender_email", &self.sender_email)
            .field("sender_name", &self.sender_name)
            .field("admin_email", &self.admin_email)
            .field("admin_name", &self.admin_name)
            .field("list_id", &self.list_id)
            .finish()
    }
}

/// Manual payment instructions printed in order confirmation emails.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub paybill: String,
    pub account_number: String,
    pub account_name: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub allowed_origins: Vec<String>,
    /// Upper bound applied to every outbound provider call
    pub provider_timeout: Duration,
    pub mpesa: MpesaConfig,
    pub brevo: BrevoConfig,
    pub store: StoreConfig,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::MissingRequired(name))
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        None => Ok(default),
    }
}

fn validated_url(name: &'static str, value: String) -> Result<String, ConfigError> {
    Url::parse(&value).map_err(|_| ConfigError::InvalidUrl {
        name,
        value: value.clone(),
    })?;
    Ok(value.trim_end_matches('/').to_string())
}

pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = match optional("MPESA_ENV") {
            Some(v) => v.parse()?,
            None => MpesaEnvironment::Sandbox,
        };
        let mpesa_base_url = match optional("MPESA_BASE_URL") {
            Some(v) => validated_url("MPESA_BASE_URL", v)?,
            None => environment.base_url().to_string(),
        };
        let mpesa = MpesaConfig {
            environment,
            base_url: mpesa_base_url,
            consumer_key: required("MPESA_CONSUMER_KEY")?,
            consumer_secret: required("MPESA_CONSUMER_SECRET")?,
            short_code: required("MPESA_SHORTCODE")?,
            passkey: required("MPESA_PASSKEY")?,
            callback_url: validated_url("MPESA_CALLBACK_URL", required("MPESA_CALLBACK_URL")?)?,
            account_reference: optional("MPESA_ACCOUNT_REFERENCE")
                .unwrap_or_else(|| DEFAULT_ACCOUNT_REFERENCE.to_string()),
            callback_window: Duration::from_secs(parsed(
                "MPESA_CALLBACK_WINDOW_SECS",
                DEFAULT_CALLBACK_WINDOW_SECS,
            )?),
        };

        let list_id = match optional("BREVO_LIST_ID") {
            Some(value) => Some(
                value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        name: "BREVO_LIST_ID",
                        value,
                    })?,
            ),
            None => None,
        };
        let brevo = BrevoConfig {
            api_key: required("BREVO_API_KEY")?,
            base_url: validated_url(
                "BREVO_BASE_URL",
                optional("BREVO_BASE_URL").unwrap_or_else(|| DEFAULT_BREVO_BASE_URL.to_string()),
            )?,
            sender_email: required("FROM_EMAIL")?,
            sender_name: optional("FROM_NAME").unwrap_or_else(|| DEFAULT_SENDER_NAME.to_string()),
            admin_email: required("ADMIN_EMAIL")?,
            admin_name: optional("ADMIN_NAME").unwrap_or_else(|| "Store Admin".to_string()),
            list_id,
        };

        let store = StoreConfig {
            paybill: optional("STORE_PAYBILL").unwrap_or_else(|| "600100".to_string()),
            account_number: optional("STORE_ACCOUNT_NUMBER")
                .unwrap_or_else(|| "440047".to_string()),
            account_name: optional("STORE_ACCOUNT_NAME")
                .unwrap_or_else(|| "Ujana na Ujuzi".to_string()),
        };

        let allowed_origins = optional("ALLOWED_ORIGINS")
            .map(|raw| parse_origins(&raw))
            .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.map(String::from).to_vec());
        if allowed_origins.iter().any(|o| o == "*") {
            tracing::warn!("Wildcard CORS origin configured, any site may call the storefront API");
        }

        Ok(Self {
            port: parsed("PORT", DEFAULT_PORT)?,
            database_url: optional("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            allowed_origins,
            provider_timeout: Duration::from_secs(parsed(
                "PROVIDER_TIMEOUT_SECS",
                DEFAULT_PROVIDER_TIMEOUT_SECS,
            )?),
            mpesa,
            brevo,
            store,
        })
    }
}

#[cfg(test)]
impl Config {
    /// Configuration pointing both providers at local mock servers.
    pub fn for_tests(mpesa_base_url: &str, brevo_base_url: &str) -> Self {
        Self {
            port: 0,
            database_url: "sqlite::memory:".into(),
            allowed_origins: DEFAULT_ALLOWED_ORIGINS.map(String::from).to_vec(),
            provider_timeout: Duration::from_secs(2),
            mpesa: MpesaConfig {
                environment: MpesaEnvironment::Sandbox,
                base_url: mpesa_base_url.into(),
                consumer_key: "consumer-key".into(),
                consumer_secret: "consumer-secret".into(),
                short_code: "174379".into(),
                passkey: "bfb279f9aa9bdbcf158e97dd71a467cd2e0c893059b10f78e6b72ada1ed2c919".into(),
                callback_url: "https://shop.example.com/mpesa/callback".into(),
                account_reference: DEFAULT_ACCOUNT_REFERENCE.into(),
                callback_window: Duration::from_secs(180),
            },
            brevo: BrevoConfig {
                api_key: "brevo-key".into(),
                base_url: brevo_base_url.into(),
                sender_email: "store@example.com".into(),
                sender_name: DEFAULT_SENDER_NAME.into(),
                admin_email: "admin@example.com".into(),
                admin_name: "Admin".into(),
                list_id: Some(3),
            },
            store: StoreConfig {
                paybill: "600100".into(),
                account_number: "440047".into(),
                account_name: "Ujana na Ujuzi".into(),
            },
        }
    }
}
