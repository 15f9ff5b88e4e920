use std::time::Duration;

use hmac::{Hmac, Mac};
use reqwest::Client;
use serde_json::Value;
use sha2::Sha512;

use crate::config::AppConfig;
use crate::error::AppError;

type HmacSha512 = Hmac<Sha512>;

const API_BASE: &str = "https://api.paystack.co";
const FETCH_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 500;

/// Verify a Paystack webhook: HMAC-SHA512 of the raw body with the secret
/// key, hex-encoded in the `x-paystack-signature` header. Constant-time
/// comparison via the mac itself.
pub fn verify_webhook_signature(payload: &[u8], signature_hex: &str, secret_key: &str) -> bool {
    let Ok(mut mac) = HmacSha512::new_from_slice(secret_key.as_bytes()) else {
        return false;
    };
    mac.update(payload);

    let Ok(expected) = hex_decode(signature_hex.trim()) else {
        return false;
    };

    mac.verify_slice(&expected).is_ok()
}

/// Fetch a subscription object by code. Paystack wraps responses in
/// `{status, message, data}`; the `data` object is returned. Transient
/// failures are retried with exponential backoff.
pub async fn fetch_subscription(
    client: &Client,
    config: &AppConfig,
    subscription_code: &str,
) -> Result<Value, AppError> {
    let secret = secret_key(config)?;
    let url = format!("{API_BASE}/subscription/{subscription_code}");

    let mut delay = Duration::from_millis(INITIAL_BACKOFF_MS);
    let mut last_error = String::from("Paystack request failed.");

    for attempt in 0..FETCH_RETRIES {
        if attempt > 0 {
            tokio::time::sleep(delay).await;
            delay *= 2;
        }

        let response = match client.get(&url).bearer_auth(secret).send().await {
            Ok(response) => response,
            Err(error) => {
                last_error = format!("Paystack request failed: {error}");
                continue;
            }
        };

        let status = response.status();
        if status.is_server_error() {
            last_error = format!("Paystack returned {status}");
            continue;
        }

        let body: Value = response.json().await.unwrap_or(Value::Null);
        if status.is_success() {
            return body
                .get("data")
                .cloned()
                .filter(|data| !data.is_null())
                .ok_or_else(|| {
                    AppError::Dependency("Paystack response is missing data.".to_string())
                });
        }

        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown Paystack error");
        return Err(AppError::Dependency(format!(
            "Paystack API error ({status}): {message}"
        )));
    }

    Err(AppError::Dependency(last_error))
}

/// Stop future charges on a subscription. Paystack requires both the
/// subscription code and its email token.
pub async fn disable_subscription(
    client: &Client,
    config: &AppConfig,
    subscription_code: &str,
    email_token: &str,
) -> Result<(), AppError> {
    let secret = secret_key(config)?;

    let response = client
        .post(format!("{API_BASE}/subscription/disable"))
        .bearer_auth(secret)
        .json(&serde_json::json!({
            "code": subscription_code,
            "token": email_token,
        }))
        .send()
        .await
        .map_err(|error| {
            tracing::error!(error = %error, "Paystack disable request failed");
            AppError::Dependency("Paystack request failed.".to_string())
        })?;

    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body: Value = response.json().await.unwrap_or(Value::Null);
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("Unknown Paystack error");
    Err(AppError::Dependency(format!(
        "Paystack API error ({status}): {message}"
    )))
}

fn secret_key(config: &AppConfig) -> Result<&str, AppError> {
    config
        .paystack_secret_key
        .as_deref()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::Dependency("PAYSTACK_SECRET_KEY is not configured.".to_string()))
}

fn hex_decode(hex: &str) -> Result<Vec<u8>, ()> {
    if hex.len() % 2 != 0 {
        return Err(());
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| ()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{hex_decode, verify_webhook_signature};
    use hmac::{Hmac, Mac};
    use sha2::Sha512;

    fn sign(payload: &[u8], key: &str) -> String {
        let mut mac = Hmac::<Sha512>::new_from_slice(key.as_bytes()).expect("valid key");
        mac.update(payload);
        mac.finalize()
            .into_bytes()
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect()
    }

    #[test]
    fn accepts_a_valid_signature() {
        let payload = br#"{"event":"charge.success","data":{"reference":"TXN-ABC123"}}"#;
        let signature = sign(payload, "sk_test_secret");
        assert!(verify_webhook_signature(payload, &signature, "sk_test_secret"));
    }

    #[test]
    fn rejects_a_tampered_payload() {
        let payload = br#"{"event":"charge.success","amount":1000}"#;
        let signature = sign(payload, "sk_test_secret");
        let tampered = br#"{"event":"charge.success","amount":9999}"#;
        assert!(!verify_webhook_signature(tampered, &signature, "sk_test_secret"));
    }

    #[test]
    fn rejects_the_wrong_key() {
        let payload = br#"{"event":"charge.success"}"#;
        let signature = sign(payload, "sk_test_secret");
        assert!(!verify_webhook_signature(payload, &signature, "sk_live_other"));
    }

    #[test]
    fn rejects_malformed_hex() {
        let payload = b"{}";
        assert!(!verify_webhook_signature(payload, "zz", "sk_test_secret"));
        assert!(!verify_webhook_signature(payload, "abc", "sk_test_secret"));
        assert!(hex_decode("0g").is_err());
    }
}
