//! In-process stand-ins for the payment gateway and the email provider.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Router,
    http::{HeaderMap, StatusCode, header},
    routing::{get, post},
};
use serde_json::{Value, json};

use crate::{config::Config, db::Db, state::AppState};

pub const STK_ACK: &str = r#"{
    "MerchantRequestID": "29115-34620561-1",
    "CheckoutRequestID": "ws_CO_191220191020363925",
    "ResponseCode": "0",
    "ResponseDescription": "Success. Request accepted for processing",
    "CustomerMessage": "Success. Request accepted for processing"
}"#;

/// Serves `router` on an ephemeral local port and returns its base url.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn header_string(headers: &HeaderMap, name: impl header::AsHeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

#[derive(Debug, Clone)]
pub struct MockMpesaOptions {
    pub token: Value,
    pub token_status: StatusCode,
    pub token_delay: Duration,
    pub stk_status: StatusCode,
    pub stk_body: String,
    pub stk_delay: Duration,
}

impl Default for MockMpesaOptions {
    fn default() -> Self {
        Self {
            token: json!({"access_token": "sandbox-token", "expires_in": "3599"}),
            token_status: StatusCode::OK,
            token_delay: Duration::ZERO,
            stk_status: StatusCode::OK,
            stk_body: STK_ACK.to_string(),
            stk_delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Debug, Clone)]
pub struct MockMpesa {
    pub base_url: String,
    pub oauth_calls: Arc<AtomicUsize>,
    pub oauth_authorizations: Arc<Mutex<Vec<String>>>,
    pub stk_requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

pub async fn mock_mpesa(options: MockMpesaOptions) -> MockMpesa {
    let oauth_calls = Arc::new(AtomicUsize::new(0));
    let oauth_authorizations = Arc::new(Mutex::new(Vec::new()));
    let stk_requests = Arc::new(Mutex::new(Vec::new()));

    let token_route = {
        let options = options.clone();
        let calls = oauth_calls.clone();
        let authorizations = oauth_authorizations.clone();
        move |headers: HeaderMap| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            if let Some(auth) = header_string(&headers, header::AUTHORIZATION) {
                authorizations.lock().unwrap().push(auth);
            }
            tokio::time::sleep(options.token_delay).await;
            (options.token_status, axum::Json(options.token))
        }
    };
    let stk_route = {
        let requests = stk_requests.clone();
        move |headers: HeaderMap, axum::Json(body): axum::Json<Value>| async move {
            requests.lock().unwrap().push(RecordedRequest {
                authorization: header_string(&headers, header::AUTHORIZATION),
                body,
            });
            tokio::time::sleep(options.stk_delay).await;
            (
                options.stk_status,
                [(header::CONTENT_TYPE, "application/json")],
                options.stk_body,
            )
        }
    };

    let router = Router::new()
        .route("/oauth/v1/generate", get(token_route))
        .route("/mpesa/stkpush/v1/processrequest", post(stk_route));

    MockMpesa {
        base_url: serve(router).await,
        oauth_calls,
        oauth_authorizations,
        stk_requests,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MockBrevoOptions {
    pub email_status: StatusCode,
    /// `code` of the error body returned when `email_status` is not a success
    pub email_error_code: &'static str,
    pub contact_delay: Duration,
}

impl Default for MockBrevoOptions {
    fn default() -> Self {
        Self {
            email_status: StatusCode::CREATED,
            email_error_code: "unauthorized",
            contact_delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MockBrevo {
    pub base_url: String,
    pub emails: Arc<Mutex<Vec<Value>>>,
    pub contacts: Arc<Mutex<Vec<Value>>>,
    pub api_keys: Arc<Mutex<Vec<String>>>,
}

pub async fn mock_brevo(options: MockBrevoOptions) -> MockBrevo {
    let emails = Arc::new(Mutex::new(Vec::new()));
    let contacts = Arc::new(Mutex::new(Vec::<Value>::new()));
    let api_keys = Arc::new(Mutex::new(Vec::new()));

    let email_route = {
        let emails = emails.clone();
        let api_keys = api_keys.clone();
        move |headers: HeaderMap, axum::Json(body): axum::Json<Value>| async move {
            if let Some(key) = header_string(&headers, "api-key") {
                api_keys.lock().unwrap().push(key);
            }
            if !options.email_status.is_success() {
                return (
                    options.email_status,
                    axum::Json(json!({"code": options.email_error_code, "message": "Request rejected"})),
                );
            }
            let mut emails = emails.lock().unwrap();
            emails.push(body);
            let message_id = format!("<{}@smtp-relay.mailin.fr>", emails.len());
            (options.email_status, axum::Json(json!({"messageId": message_id})))
        }
    };
    let contact_route = {
        let contacts = contacts.clone();
        let api_keys = api_keys.clone();
        move |headers: HeaderMap, axum::Json(body): axum::Json<Value>| async move {
            if let Some(key) = header_string(&headers, "api-key") {
                api_keys.lock().unwrap().push(key);
            }
            tokio::time::sleep(options.contact_delay).await;
            let mut contacts = contacts.lock().unwrap();
            if contacts.iter().any(|c| c["email"] == body["email"]) {
                return (
                    StatusCode::BAD_REQUEST,
                    axum::Json(json!({"code": "duplicate_parameter", "message": "Contact already exist"})),
                );
            }
            contacts.push(body);
            (StatusCode::CREATED, axum::Json(json!({"id": contacts.len()})))
        }
    };

    let router = Router::new()
        .route("/smtp/email", post(email_route))
        .route("/contacts", post(contact_route));

    MockBrevo {
        base_url: serve(router).await,
        emails,
        contacts,
        api_keys,
    }
}

/// The full application wired to mock providers and an in-memory database.
pub struct TestApp {
    pub base_url: String,
    pub db: Db,
    pub client: reqwest::Client,
    pub mpesa: MockMpesa,
    pub brevo: MockBrevo,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(MockMpesaOptions::default(), MockBrevoOptions::default(), |_| {}).await
    }

    pub async fn spawn_with(
        mpesa: MockMpesaOptions,
        brevo: MockBrevoOptions,
        configure: impl FnOnce(&mut Config),
    ) -> Self {
        let mpesa = mock_mpesa(mpesa).await;
        let brevo = mock_brevo(brevo).await;
        let mut config = Config::for_tests(&mpesa.base_url, &brevo.base_url);
        configure(&mut config);
        let db = Db::in_memory().await;
        let state = AppState::new(config, db.clone()).unwrap();
        let base_url = serve(crate::app(state)).await;
        Self {
            base_url,
            db,
            client: reqwest::Client::new(),
            mpesa,
            brevo,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn post(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client.post(self.url(path)).json(body).send().await.unwrap()
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }
}
