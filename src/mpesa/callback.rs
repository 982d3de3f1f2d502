use serde::{Deserialize, Serialize};

use crate::db::{PaymentOutcome, PaymentStatus};

/// Result body the gateway posts to the callback URL.
#[derive(Debug, Deserialize)]
pub struct CallbackPayload {
    #[serde(rename = "Body")]
    pub body: CallbackBody,
}

#[derive(Debug, Deserialize)]
pub struct CallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Deserialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    /// 0 on success, anything else is a failure (1032 cancelled, 1037 unreachable, ...)
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
    #[serde(rename = "CallbackMetadata", default)]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    pub items: Vec<MetadataItem>,
}

#[derive(Debug, Deserialize)]
pub struct MetadataItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default)]
    pub value: Option<serde_json::Value>,
}

impl StkCallback {
    fn metadata(&self, name: &str) -> Option<&serde_json::Value> {
        self.callback_metadata
            .as_ref()?
            .items
            .iter()
            .find(|item| item.name == name)?
            .value
            .as_ref()
    }

    pub fn is_success(&self) -> bool {
        self.result_code == 0
    }

    pub fn receipt(&self) -> Option<&str> {
        self.metadata("MpesaReceiptNumber")?.as_str()
    }

    /// Amount the payer actually authorized.
    pub fn amount(&self) -> Option<u64> {
        let value = self.metadata("Amount")?;
        value
            .as_u64()
            .or_else(|| value.as_f64().filter(|a| a.fract() == 0.0 && *a >= 0.0).map(|a| a as u64))
    }

    pub fn outcome(&self) -> PaymentOutcome<'_> {
        PaymentOutcome {
            status: if self.is_success() {
                PaymentStatus::Confirmed
            } else {
                PaymentStatus::Failed
            },
            result_code: self.result_code,
            result_desc: &self.result_desc,
            receipt: self.receipt(),
        }
    }
}

/// Body returned to the gateway after a callback.
#[derive(Debug, Serialize)]
pub struct CallbackAck {
    #[serde(rename = "ResultCode")]
    pub result_code: u8,
    #[serde(rename = "ResultDesc")]
    pub result_desc: &'static str,
}

impl CallbackAck {
    pub fn accepted() -> Self {
        Self {
            result_code: 0,
            result_desc: "Accepted",
        }
    }

    pub fn rejected(result_desc: &'static str) -> Self {
        Self {
            result_code: 1,
            result_desc,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn successful_callback() {
        let payload: CallbackPayload = serde_json::from_value(json!({
            "Body": {"stkCallback": {
                "MerchantRequestID": "29115-34620561-1",
                "CheckoutRequestID": "ws_CO_191220191020363925",
                "ResultCode": 0,
                "ResultDesc": "The service request is processed successfully.",
                "CallbackMetadata": {"Item": [
                    {"Name": "Amount", "Value": 100.00},
                    {"Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV"},
                    {"Name": "Balance"},
                    {"Name": "TransactionDate", "Value": 20191219102115u64},
                    {"Name": "PhoneNumber", "Value": 254712345678u64}
                ]}
            }}
        }))
        .unwrap();
        let callback = payload.body.stk_callback;
        assert!(callback.is_success());
        assert_eq!(callback.amount(), Some(100));
        assert_eq!(callback.receipt(), Some("NLJ7RT61SV"));

        let outcome = callback.outcome();
        assert_eq!(outcome.status, PaymentStatus::Confirmed);
        assert_eq!(outcome.receipt, Some("NLJ7RT61SV"));
    }

    #[test]
    fn cancelled_callback_has_no_metadata() {
        let payload: CallbackPayload = serde_json::from_value(json!({
            "Body": {"stkCallback": {
                "MerchantRequestID": "29115-34620561-1",
                "CheckoutRequestID": "ws_CO_191220191020363925",
                "ResultCode": 1032,
                "ResultDesc": "Request cancelled by user"
            }}
        }))
        .unwrap();
        let callback = payload.body.stk_callback;
        assert!(!callback.is_success());
        assert_eq!(callback.amount(), None);

        let outcome = callback.outcome();
        assert_eq!(outcome.status, PaymentStatus::Failed);
        assert_eq!(outcome.result_code, 1032);
        assert_eq!(outcome.receipt, None);
    }
}
