use std::sync::Arc;

use crate::{brevo::BrevoClient, config::Config, db::Db, mpesa::MpesaGateway};

#[derive(Debug, Clone, axum::extract::FromRef)]
pub struct AppState {
    pub db: Db,
    pub mpesa: MpesaGateway,
    pub brevo: BrevoClient,
    pub config: Arc<Config>,
}

impl AppState {
    /// Builds every provider client once from `config`, they are never mutated afterwards.
    pub fn new(config: Config, db: Db) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let mpesa = MpesaGateway::new(client.clone(), config.mpesa.clone(), config.provider_timeout);
        let brevo = BrevoClient::new(client, config.brevo.clone(), config.provider_timeout);
        Ok(Self {
            db,
            mpesa,
            brevo,
            config: Arc::new(config),
        })
    }
}
