use serde_json::Value;

/// Masks signed gateway messages and credentials before a payload is logged.
pub fn sanitize_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sanitized = serde_json::Map::new();
            for (key, val) in map {
                let sanitized_val = if is_sensitive_field(key) {
                    mask_value(val)
                } else {
                    sanitize_json(val)
                };
                sanitized.insert(key.clone(), sanitized_val);
            }
            Value::Object(sanitized)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sanitize_json).collect()),
        _ => value.clone(),
    }
}

/// Renders a raw body for logs: JSON gets masked, anything else is summarised.
pub fn describe_body(bytes: &[u8]) -> String {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(json) => serde_json::to_string(&sanitize_json(&json))
            .unwrap_or_else(|_| "[invalid json]".to_string()),
        Err(_) => format!("[non-json, {} bytes]", bytes.len()),
    }
}

fn is_sensitive_field(key: &str) -> bool {
    matches!(
        key.to_lowercase().as_str(),
        "signpaynotifymsg" | "requestpacket" | "password" | "secret" | "token" | "authorization"
    )
}

fn mask_value(value: &Value) -> Value {
    match value {
        Value::String(s) if s.chars().count() > 8 => {
            let head: String = s.chars().take(4).collect();
            let tail: String = s.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
            Value::String(format!("{}****{}", head, tail))
        }
        _ => Value::String("****".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sanitize_signed_notification() {
        let input = json!({
            "code": 0,
            "data": {
                "signPayNotifyMsg": "SIGNED-PAYLOAD-0123456789",
                "order_id": "ABC",
                "result": 0
            }
        });

        let sanitized = sanitize_json(&input);
        let msg = sanitized["data"]["signPayNotifyMsg"].as_str().unwrap();

        assert_eq!(msg, "SIGN****6789");
        assert_eq!(sanitized["data"]["order_id"], "ABC");
        assert_eq!(sanitized["code"], 0);
    }

    #[test]
    fn test_short_and_non_string_values_are_fully_masked() {
        let sanitized = sanitize_json(&json!({"token": "abc", "secret": 42}));
        assert_eq!(sanitized["token"], "****");
        assert_eq!(sanitized["secret"], "****");
    }

    #[test]
    fn test_describe_non_json_body() {
        assert_eq!(describe_body(b"<xml/>"), "[non-json, 6 bytes]");
    }
}
