use serde::Serialize;

pub trait MaskPolicy {
    fn mask(value: &str) -> String;
}

/// Keeps the trailing digits of a phone number visible.
pub struct PhoneMask;

impl MaskPolicy for PhoneMask {
    fn mask(value: &str) -> String {
        let len = value.chars().count();
        if len > 3 {
            let tail: String = value.chars().skip(len - 3).collect();
            "*".repeat(len - 3) + &tail
        } else {
            value.to_string()
        }
    }
}

/// Return true if a key name likely holds a payer phone number.
fn is_phone_key(key: &str) -> bool {
    let k = key.to_lowercase();
    k.contains("phone") || k == "partya" || k == "msisdn"
}

/// Return true if a key name likely holds a credential.
fn is_secret_key(key: &str) -> bool {
    let k = key.to_lowercase();
    k.contains("password")
        || k.contains("passkey")
        || k.contains("secret")
        || k.contains("token")
        || k.contains("api-key")
        || k.contains("api_key")
        || k == "authorization"
}

pub fn secure_serializable(v: impl Serialize) -> serde_json::Value {
    match serde_json::to_value(v) {
        Ok(value) => secure_value(&value),
        Err(_) => serde_json::Value::Null,
    }
}

pub fn secure_value(v: &serde_json::Value) -> serde_json::Value {
    use serde_json::Value;

    match v {
        Value::Object(map) => {
            // callback metadata items look like {"Name": "PhoneNumber", "Value": 2547..}
            let named_phone = map
                .get("Name")
                .and_then(Value::as_str)
                .is_some_and(is_phone_key);
            let mut new = serde_json::Map::with_capacity(map.len());
            for (k, val) in map {
                let key = if named_phone && k == "Value" { "PhoneNumber" } else { k.as_str() };
                let new_val = match val {
                    Value::String(_) | Value::Number(_) if is_secret_key(key) => {
                        Value::String("***".to_string())
                    }
                    Value::String(s) if is_phone_key(key) => Value::String(PhoneMask::mask(s)),
                    Value::Number(n) if is_phone_key(key) => {
                        Value::String(PhoneMask::mask(&n.to_string()))
                    }
                    _ => secure_value(val),
                };
                new.insert(k.clone(), new_val);
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(secure_value).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn masks_stk_push_payload() {
        let payload = json!({
            "BusinessShortCode": "174379",
            "Password": "MTc0Mzc5YmZiMjc5",
            "PartyA": "254712345678",
            "PhoneNumber": 254712345678u64,
            "Amount": 100,
        });
        let masked = secure_value(&payload);
        assert_eq!(masked["Password"], "***");
        assert_eq!(masked["PartyA"], "*********678");
        assert_eq!(masked["PhoneNumber"], "*********678");
        assert_eq!(masked["BusinessShortCode"], "174379");
        assert_eq!(masked["Amount"], 100);
    }

    #[test]
    fn masks_nested_values() {
        let payload = json!({
            "access_token": "abc",
            "Body": {"stkCallback": {"CallbackMetadata": {"Item": [
                {"Name": "PhoneNumber", "Value": 254708374149u64}
            ]}}}
        });
        let masked = secure_value(&payload);
        assert_eq!(masked["access_token"], "***");
        let item = &masked["Body"]["stkCallback"]["CallbackMetadata"]["Item"][0];
        assert_eq!(item["Name"], "PhoneNumber");
        assert_eq!(item["Value"], "*********149");
    }

    #[test]
    fn short_values_are_kept() {
        assert_eq!(PhoneMask::mask("123"), "123");
        assert_eq!(PhoneMask::mask("0712"), "*712");
    }
}
