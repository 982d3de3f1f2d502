use axum::{
    extract::{Path, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::instrument;

use crate::{
    brevo::{email::Mailbox, error::BrevoError},
    db::{PaymentRecord, PaymentStatus},
    mask::{MaskPolicy, PhoneMask},
    mpesa::stk::StkPushParams,
    state::AppState,
    storefront::{
        ApiError, ApiResponse, Json, Result, lenient_u64,
        order::{self, Order},
        present,
    },
};

#[derive(Debug, Deserialize)]
pub struct OrderRequest {
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    item: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    quantity: Option<u64>,
    size: Option<String>,
    color: Option<String>,
}

impl OrderRequest {
    fn validate(&self) -> Result<Order<'_>> {
        let (Some(name), Some(email), Some(phone), Some(item), Some(quantity)) = (
            present(&self.name),
            present(&self.email),
            present(&self.phone),
            present(&self.item),
            self.quantity.filter(|q| *q > 0),
        ) else {
            return Err(ApiError::Validation("All fields are required.".into()));
        };
        Ok(Order {
            name,
            email,
            phone,
            item,
            quantity,
            size: present(&self.size),
            color: present(&self.color),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct OrderPlaced {
    total: u64,
}

#[instrument(skip_all)]
pub async fn place_order(
    State(AppState { brevo, config, .. }): State<AppState>,
    Json(request): Json<OrderRequest>,
) -> Result<ApiResponse<OrderPlaced>> {
    let order = request.validate()?;
    let total = order::total(order.item, order.size, order.quantity)
        .ok_or_else(|| ApiError::Validation("Quantity is too large.".into()))?;
    tracing::info!(
        item = %order.item,
        quantity = order.quantity,
        size = order.size.unwrap_or_default(),
        phone = %PhoneMask::mask(order.phone),
        total,
        "New order received"
    );

    let year = OffsetDateTime::now_utc().year();
    let customer = order::customer_email(&order, total, &config.store, year);
    brevo
        .send_email(&customer)
        .await
        .map_err(|e| ApiError::from_provider("Failed to send confirmation email.", e))?;

    let admin = Mailbox {
        email: &brevo.config().admin_email,
        name: &brevo.config().admin_name,
    };
    let notification = order::admin_email(&order, total, &config.store, admin);
    brevo
        .send_email(&notification)
        .await
        .map_err(|e| ApiError::from_provider("Failed to send confirmation email.", e))?;

    Ok(ApiResponse::new(
        Some("Order submitted! Check your email for confirmation."),
        OrderPlaced { total },
    ))
}

#[derive(Debug, Deserialize)]
pub struct StkPushRequest {
    phone: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    amount: Option<u64>,
    item: Option<String>,
}

/// Responds with the gateway acknowledgement exactly as received.
#[instrument(skip_all)]
pub async fn stk_push(
    State(AppState { mpesa, db, .. }): State<AppState>,
    Json(request): Json<StkPushRequest>,
) -> Result<axum::Json<serde_json::Value>> {
    let (Some(phone), Some(amount)) = (
        present(&request.phone),
        request.amount.filter(|a| *a > 0),
    ) else {
        return Err(ApiError::Validation("Phone and amount are required.".into()));
    };
    if i64::try_from(amount).is_err() {
        return Err(ApiError::Validation("Amount is too large.".into()));
    }
    let params = StkPushParams {
        phone,
        amount,
        description: present(&request.item),
    };
    tracing::debug!(phone = %PhoneMask::mask(phone), amount, "STK push requested");
    let response = mpesa.stk_push(&db, &params).await?;
    Ok(axum::Json(response))
}

#[derive(Debug, Serialize)]
pub struct PaymentView {
    #[serde(flatten)]
    record: PaymentRecord,
    #[serde(with = "time::serde::rfc3339")]
    initiated_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct PaymentStatusResponse {
    payment: PaymentView,
}

/// Lets the storefront poll a payment, an unanswered one past the callback window
/// is settled as timed out here.
#[instrument(skip_all)]
pub async fn payment_status(
    State(AppState { mpesa, db, .. }): State<AppState>,
    Path(checkout_request_id): Path<String>,
) -> Result<ApiResponse<PaymentStatusResponse>> {
    let window = mpesa.config().callback_window.as_secs() as i64;
    let deadline = OffsetDateTime::now_utc().unix_timestamp() - window;
    let record = db
        .expire_payment(&checkout_request_id, deadline)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load payment: {e}");
            ApiError::Internal
        })?
        .ok_or(ApiError::NotFound("Payment not found."))?;
    if record.status == PaymentStatus::TimedOut {
        tracing::debug!(%checkout_request_id, "Payment has no result within the callback window");
    }
    let initiated_at =
        OffsetDateTime::from_unix_timestamp(record.created_at).map_err(|_| ApiError::Internal)?;
    Ok(ApiResponse::new(
        None,
        PaymentStatusResponse {
            payment: PaymentView {
                record,
                initiated_at,
            },
        },
    ))
}

#[derive(Debug, Deserialize)]
pub struct NewsletterRequest {
    email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Subscribed {}

/// Subscribes an email, signing up twice is reported as success.
#[instrument(skip_all)]
pub async fn subscribe(
    State(AppState { brevo, .. }): State<AppState>,
    Json(request): Json<NewsletterRequest>,
) -> Result<ApiResponse<Subscribed>> {
    let Some(email) = present(&request.email) else {
        return Err(ApiError::Validation("Email is required.".into()));
    };
    match brevo.create_contact(email).await {
        Ok(()) => {
            tracing::info!("New newsletter subscriber");
            Ok(ApiResponse::new(Some("Subscribed successfully!"), Subscribed {}))
        }
        Err(BrevoError::DuplicateContact) => {
            tracing::debug!("Newsletter subscriber already exists");
            Ok(ApiResponse::new(Some("You're already subscribed!"), Subscribed {}))
        }
        Err(e) => Err(ApiError::from_provider("Subscription failed.", e)),
    }
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/order", post(place_order))
        .route("/stkpush", post(stk_push))
        .route("/stkpush/{checkout_request_id}", get(payment_status))
        .route("/newsletter", post(subscribe))
}
