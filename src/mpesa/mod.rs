use std::{sync::Arc, time::Duration};

use axum::http::HeaderMap;
use axum_extra::headers::{self, HeaderMapExt};
use time::OffsetDateTime;

use crate::{
    bounded,
    config::MpesaConfig,
    db::{Db, NewPayment},
    mask,
    mpesa::{
        auth::{AccessToken, TokenProvider},
        error::{GatewayError, StkPushError},
        stk::{InitiationAck, MerchantCredentials, PaymentRequest, StkPushParams},
    },
};

pub mod api;
pub mod auth;
/// Asynchronous payment result sent by the gateway
pub mod callback;
pub mod error;
/// Payment request construction and signing
pub mod stk;

#[derive(Debug, Clone)]
pub struct MpesaGateway {
    client: reqwest::Client,
    config: Arc<MpesaConfig>,
    tokens: TokenProvider,
    timeout: Duration,
}

impl MpesaGateway {
    pub fn new(client: reqwest::Client, config: MpesaConfig, timeout: Duration) -> Self {
        let tokens = TokenProvider::new(
            client.clone(),
            &config.base_url,
            &config.consumer_key,
            &config.consumer_secret,
            timeout,
        );
        Self {
            client,
            config: Arc::new(config),
            tokens,
            timeout,
        }
    }

    pub fn config(&self) -> &MpesaConfig {
        &self.config
    }

    fn merchant(&self) -> MerchantCredentials<'_> {
        MerchantCredentials {
            short_code: &self.config.short_code,
            passkey: &self.config.passkey,
            callback_url: &self.config.callback_url,
            account_reference: &self.config.account_reference,
        }
    }

    /// Sends a built payment request and returns the gateway acknowledgement unmodified.
    ///
    /// The response code is not interpreted here, a 2xx body is a successful call
    /// whatever it says.
    pub async fn initiate(
        &self,
        token: &AccessToken,
        request: &PaymentRequest,
    ) -> Result<serde_json::Value, GatewayError> {
        bounded::call("mpesa_stk_push", self.timeout, self.send_initiation(token, request)).await
    }

    async fn send_initiation(
        &self,
        token: &AccessToken,
        request: &PaymentRequest,
    ) -> Result<serde_json::Value, GatewayError> {
        let url = format!("{}/mpesa/stkpush/v1/processrequest", self.config.base_url);
        tracing::debug!(%url, data = %mask::secure_serializable(request), "Gateway API STK push request");

        let mut request_headers = HeaderMap::new();
        request_headers.typed_insert(
            headers::Authorization::bearer(&token.value).map_err(|_| GatewayError::InvalidToken)?,
        );
        let res = self
            .client
            .post(&url)
            .headers(request_headers)
            .json(request)
            .send()
            .await?;
        let status = res.status();
        let body = res.text().await?;
        let parsed = serde_json::from_str::<serde_json::Value>(&body);

        if !status.is_success() {
            let details = parsed.unwrap_or(serde_json::Value::String(body));
            tracing::debug!(%status, response = %mask::secure_value(&details), "Gateway API STK push rejected");
            return Err(GatewayError::GatewayResponse {
                status: status.as_u16(),
                details,
            });
        }

        let response =
            parsed.map_err(|source| GatewayError::GatewayDeserialization { source, body })?;
        tracing::debug!(%status, response = %mask::secure_value(&response), "Gateway API STK push response");
        Ok(response)
    }

    /// Full payment initiation: token, signed request, initiation call, then a durable
    /// record keyed by the checkout request id so the callback can be matched later.
    pub async fn stk_push(
        &self,
        db: &Db,
        params: &StkPushParams<'_>,
    ) -> Result<serde_json::Value, StkPushError> {
        let token = self.tokens.access_token().await?;
        let request = stk::build_request(&self.merchant(), params, OffsetDateTime::now_utc());
        let response = self.initiate(&token, &request).await?;

        match serde_json::from_value::<InitiationAck>(response.clone()) {
            Ok(ack) => {
                let payment = NewPayment {
                    checkout_request_id: &ack.checkout_request_id,
                    merchant_request_id: ack.merchant_request_id.as_deref(),
                    phone: params.phone,
                    amount: params.amount,
                    item: params.description,
                };
                // payer already has the prompt, a lost record must not fail the request
                if let Err(e) = db.insert_payment(&payment).await {
                    tracing::error!(
                        checkout_request_id = %ack.checkout_request_id,
                        "Failed to persist initiated payment: {e}"
                    );
                } else {
                    tracing::info!(
                        checkout_request_id = %ack.checkout_request_id,
                        response_code = ack.response_code.as_deref().unwrap_or_default(),
                        "Initiated STK push"
                    );
                }
            }
            Err(e) => {
                tracing::warn!("STK push acknowledgement has no checkout request id, result cannot be correlated: {e}");
            }
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use axum::http::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::{
        config::Config,
        db::PaymentStatus,
        testing::{MockMpesaOptions, STK_ACK, mock_mpesa},
    };

    fn gateway(base_url: &str, timeout: Duration) -> MpesaGateway {
        let config = Config::for_tests(base_url, "http://127.0.0.1:1");
        MpesaGateway::new(reqwest::Client::new(), config.mpesa, timeout)
    }

    const PARAMS: StkPushParams<'static> = StkPushParams {
        phone: "254712345678",
        amount: 100,
        description: Some("Jersey"),
    };

    #[tokio::test]
    async fn stk_push_passes_ack_through_and_records_payment() {
        let mock = mock_mpesa(MockMpesaOptions::default()).await;
        let db = Db::in_memory().await;
        let gateway = gateway(&mock.base_url, Duration::from_secs(2));

        let response = gateway.stk_push(&db, &PARAMS).await.unwrap();
        assert_eq!(response, serde_json::from_str::<serde_json::Value>(STK_ACK).unwrap());

        let requests = mock.stk_requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].authorization.as_deref(), Some("Bearer sandbox-token"));
        assert_eq!(requests[0].body["Amount"], 100);
        assert_eq!(requests[0].body["PartyA"], "254712345678");
        assert_eq!(requests[0].body["CallBackURL"], "https://shop.example.com/mpesa/callback");

        let record = db
            .get_payment("ws_CO_191220191020363925")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, PaymentStatus::Initiated);
        assert_eq!(record.merchant_request_id.as_deref(), Some("29115-34620561-1"));
    }

    #[tokio::test]
    async fn token_is_reused_across_initiations() {
        let mock = mock_mpesa(MockMpesaOptions {
            stk_body: json!({"ResponseCode": "0"}).to_string(),
            ..Default::default()
        })
        .await;
        let db = Db::in_memory().await;
        let gateway = gateway(&mock.base_url, Duration::from_secs(2));
        gateway.stk_push(&db, &PARAMS).await.unwrap();
        gateway.stk_push(&db, &PARAMS).await.unwrap();
        assert_eq!(mock.oauth_calls.load(Ordering::SeqCst), 1);
        assert_eq!(mock.stk_requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn rejected_initiation_keeps_diagnostic_body() {
        let body = json!({
            "requestId": "4788-81090592-1",
            "errorCode": "400.002.02",
            "errorMessage": "Bad Request - Invalid PhoneNumber"
        });
        let mock = mock_mpesa(MockMpesaOptions {
            stk_status: StatusCode::BAD_REQUEST,
            stk_body: body.to_string(),
            ..Default::default()
        })
        .await;
        let db = Db::in_memory().await;
        let err = gateway(&mock.base_url, Duration::from_secs(2))
            .stk_push(&db, &PARAMS)
            .await
            .unwrap_err();
        let StkPushError::Gateway(err) = err else {
            panic!("expected gateway error, got {err}");
        };
        assert!(matches!(err, GatewayError::GatewayResponse { status: 400, .. }));
        assert_eq!(err.details(), Some(body));
    }

    #[tokio::test]
    async fn malformed_acknowledgement_is_gateway_error() {
        let mock = mock_mpesa(MockMpesaOptions {
            stk_body: "<html>upstream error</html>".into(),
            ..Default::default()
        })
        .await;
        let db = Db::in_memory().await;
        let err = gateway(&mock.base_url, Duration::from_secs(2))
            .stk_push(&db, &PARAMS)
            .await
            .unwrap_err();
        let StkPushError::Gateway(err) = err else {
            panic!("expected gateway error, got {err}");
        };
        assert!(matches!(err, GatewayError::GatewayDeserialization { .. }));
        assert_eq!(
            err.details(),
            Some(serde_json::Value::String("<html>upstream error</html>".into()))
        );
    }

    #[tokio::test]
    async fn slow_initiation_times_out() {
        let mock = mock_mpesa(MockMpesaOptions {
            stk_delay: Duration::from_secs(5),
            ..Default::default()
        })
        .await;
        let db = Db::in_memory().await;
        let err = gateway(&mock.base_url, Duration::from_millis(200))
            .stk_push(&db, &PARAMS)
            .await
            .unwrap_err();
        assert!(matches!(err, StkPushError::Gateway(GatewayError::Timeout)), "{err}");
    }

    #[tokio::test]
    async fn auth_failure_stops_before_initiation() {
        let mock = mock_mpesa(MockMpesaOptions {
            token: json!({}),
            ..Default::default()
        })
        .await;
        let db = Db::in_memory().await;
        let err = gateway(&mock.base_url, Duration::from_secs(2))
            .stk_push(&db, &PARAMS)
            .await
            .unwrap_err();
        assert!(matches!(err, StkPushError::Auth(_)), "{err}");
        assert!(mock.stk_requests.lock().unwrap().is_empty());
    }
}
