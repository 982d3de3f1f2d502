use base64::{Engine, prelude::BASE64_STANDARD};
use serde::{Deserialize, Serialize};
use time::{
    OffsetDateTime, UtcOffset, format_description::BorrowedFormatItem,
    macros::format_description,
};

pub const TRANSACTION_TYPE: &str = "CustomerPayBillOnline";
/// Gateway limit on `AccountReference`
const ACCOUNT_REFERENCE_MAX: usize = 12;
/// Gateway limit on `TransactionDesc`
const DESCRIPTION_MAX: usize = 13;
const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year][month][day][hour][minute][second]");

/// Merchant side of an STK push, fixed for the lifetime of the process.
#[derive(Debug, Clone, Copy)]
pub struct MerchantCredentials<'a> {
    pub short_code: &'a str,
    pub passkey: &'a str,
    pub callback_url: &'a str,
    pub account_reference: &'a str,
}

/// Payer side of an STK push.
#[derive(Debug, Clone, Copy)]
pub struct StkPushParams<'a> {
    pub phone: &'a str,
    /// Passed through untouched, the gateway interprets it in whole shillings
    pub amount: u64,
    pub description: Option<&'a str>,
}

/// Signed STK push payload, field names follow the gateway's convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PaymentRequest {
    pub business_short_code: String,
    pub password: String,
    pub timestamp: String,
    pub transaction_type: &'static str,
    pub amount: u64,
    /// Payer phone
    pub party_a: String,
    /// Receiving short code
    pub party_b: String,
    pub phone_number: String,
    #[serde(rename = "CallBackURL")]
    pub callback_url: String,
    pub account_reference: String,
    pub transaction_desc: String,
}

/// Typed view of the synchronous acknowledgement, used only to extract correlation ids.
#[derive(Debug, Deserialize)]
pub struct InitiationAck {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResponseCode")]
    pub response_code: Option<String>,
}

/// `YYYYMMDDHHMMSS` of `now` in UTC.
///
/// The gateway validates the password against this exact string, so the timezone
/// must not depend on where the server runs.
pub fn timestamp(now: OffsetDateTime) -> String {
    now.to_offset(UtcOffset::UTC)
        .format(TIMESTAMP_FORMAT)
        .expect("offset date time has every timestamp component")
}

pub fn password(short_code: &str, passkey: &str, timestamp: &str) -> String {
    BASE64_STANDARD.encode(format!("{short_code}{passkey}{timestamp}"))
}

fn truncated(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

pub fn build_request(
    merchant: &MerchantCredentials<'_>,
    params: &StkPushParams<'_>,
    now: OffsetDateTime,
) -> PaymentRequest {
    let timestamp = timestamp(now);
    PaymentRequest {
        business_short_code: merchant.short_code.to_string(),
        password: password(merchant.short_code, merchant.passkey, &timestamp),
        timestamp,
        transaction_type: TRANSACTION_TYPE,
        amount: params.amount,
        party_a: params.phone.to_string(),
        party_b: merchant.short_code.to_string(),
        phone_number: params.phone.to_string(),
        callback_url: merchant.callback_url.to_string(),
        account_reference: truncated(merchant.account_reference, ACCOUNT_REFERENCE_MAX),
        transaction_desc: truncated(params.description.unwrap_or("Payment"), DESCRIPTION_MAX),
    }
}
