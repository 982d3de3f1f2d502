use axum::{Json, extract::State, routing::post};
use reqwest::StatusCode;
use tracing::instrument;

use crate::{
    db::{Db, Resolution},
    mask,
    mpesa::callback::{CallbackAck, CallbackPayload},
    state::AppState,
};

#[instrument(skip_all)]
async fn callback_handler(
    State(db): State<Db>,
    Json(callback): Json<serde_json::Value>,
) -> (StatusCode, Json<CallbackAck>) {
    tracing::trace!(
        data = %mask::secure_value(&callback),
        "Received callback from payment gateway"
    );
    let Ok(CallbackPayload { body }) = serde_json::from_value::<CallbackPayload>(callback) else {
        tracing::warn!("Failed to deserialize callback body");
        return (
            StatusCode::BAD_REQUEST,
            Json(CallbackAck::rejected("Malformed callback")),
        );
    };
    let callback = body.stk_callback;
    let checkout_request_id = callback.checkout_request_id.as_str();

    let record = match db.get_payment(checkout_request_id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            tracing::warn!(%checkout_request_id, "Callback for unknown checkout request");
            return (
                StatusCode::NOT_FOUND,
                Json(CallbackAck::rejected("Unknown checkout request")),
            );
        }
        Err(e) => {
            tracing::error!("Failed to retrieve payment from the database: {e}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CallbackAck::rejected("Internal error")),
            );
        }
    };

    if record
        .merchant_request_id
        .as_deref()
        .is_some_and(|id| id != callback.merchant_request_id)
    {
        tracing::warn!(
            %checkout_request_id,
            expected = record.merchant_request_id.as_deref().unwrap_or_default(),
            received = %callback.merchant_request_id,
            "Callback merchant request id differs from the initiated payment"
        );
    }

    if callback.is_success() {
        match callback.amount() {
            Some(amount) if u64::try_from(record.amount).ok() != Some(amount) => tracing::warn!(
                %checkout_request_id,
                requested = record.amount,
                confirmed = amount,
                "Confirmed amount differs from the requested amount"
            ),
            None => tracing::warn!(%checkout_request_id, "Successful callback without an amount"),
            _ => {}
        }
    }

    match db.resolve_payment(checkout_request_id, &callback.outcome()).await {
        Ok(Resolution::Applied) => {
            tracing::info!(
                %checkout_request_id,
                result_code = callback.result_code,
                result_desc = %callback.result_desc,
                "Payment resolved"
            );
            (StatusCode::OK, Json(CallbackAck::accepted()))
        }
        Ok(Resolution::AlreadyFinal(status)) => {
            tracing::warn!(
                %checkout_request_id,
                ?status,
                result_code = callback.result_code,
                receipt = callback.receipt().unwrap_or_default(),
                "Callback for a payment that is already final, ignoring"
            );
            (StatusCode::OK, Json(CallbackAck::accepted()))
        }
        Ok(Resolution::NotFound) => (
            StatusCode::NOT_FOUND,
            Json(CallbackAck::rejected("Unknown checkout request")),
        ),
        Err(e) => {
            tracing::error!("Failed to store payment result: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CallbackAck::rejected("Internal error")),
            )
        }
    }
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route("/callback", post(callback_handler))
}
