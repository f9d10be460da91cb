//! Stripe REST client.

use hmac::{Hmac, Mac};
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use sha2::Sha256;
use tracing::{debug, error, instrument};

use super::error::StripeError;
use super::types::{CheckoutLine, CheckoutSession, ErrorBody, Event, Refund};
use crate::config::StripeConfig;

/// Maximum age of a webhook signature timestamp, in seconds.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: SecretString,
    webhook_secret: SecretString,
    api_base: String,
    currency: String,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("secret_key", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("currency", &self.currency)
            .finish_non_exhaustive()
    }
}

impl StripeClient {
    /// Create a new Stripe client.
    #[must_use]
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            client: Client::new(),
            secret_key: config.secret_key.clone(),
            webhook_secret: config.webhook_secret.clone(),
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            currency: config.currency.clone(),
        }
    }

    /// Create a Checkout Session for an order.
    ///
    /// The order and user IDs are stored in the session metadata and in the
    /// payment intent metadata, so webhook events of either kind can be
    /// mapped back to the order.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails or Stripe returns an error.
    #[instrument(skip(self, lines, success_url, cancel_url), fields(order_id = order_id, lines = lines.len()))]
    pub async fn create_checkout_session(
        &self,
        order_id: i32,
        user_id: i32,
        lines: &[CheckoutLine],
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, StripeError> {
        let params = self.checkout_params(order_id, user_id, lines, success_url, cancel_url);

        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(self.secret_key.expose_secret())
            .form(&params)
            .send()
            .await
            .map_err(|e| StripeError::Request(e.to_string()))?;

        let session: CheckoutSession = parse_response(response).await?;

        debug!(session_id = %session.id, "Checkout session created");

        Ok(session)
    }

    /// Refund a payment intent in full.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails or Stripe returns an error.
    #[instrument(skip(self))]
    pub async fn create_refund(&self, payment_intent: &str) -> Result<Refund, StripeError> {
        let response = self
            .client
            .post(format!("{}/v1/refunds", self.api_base))
            .bearer_auth(self.secret_key.expose_secret())
            .header("Idempotency-Key", format!("refund-{payment_intent}"))
            .form(&[("payment_intent", payment_intent)])
            .send()
            .await
            .map_err(|e| StripeError::Request(e.to_string()))?;

        let refund: Refund = parse_response(response).await?;

        debug!(refund_id = %refund.id, status = ?refund.status, "Refund created");

        Ok(refund)
    }

    /// Verify a webhook signature and parse the event.
    ///
    /// # Arguments
    ///
    /// * `payload` - The raw request body
    /// * `signature` - The `Stripe-Signature` header value
    ///
    /// # Errors
    ///
    /// Returns `StripeError::InvalidSignature` if verification fails and
    /// `StripeError::InvalidPayload` if the body is not an event.
    pub fn construct_event(&self, payload: &str, signature: &str) -> Result<Event, StripeError> {
        self.verify_signature(payload, signature, chrono::Utc::now().timestamp())?;

        serde_json::from_str(payload).map_err(|e| StripeError::InvalidPayload(e.to_string()))
    }

    /// Verify a `Stripe-Signature` header (`t=<ts>,v1=<hex>[,v1=...]`).
    ///
    /// The signed payload is `"{t}.{body}"`, HMAC-SHA256 with the endpoint
    /// secret. Any matching `v1` entry is accepted.
    fn verify_signature(&self, payload: &str, header: &str, now: i64) -> Result<(), StripeError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = Some(value),
                Some(("v1", value)) => signatures.push(value),
                _ => {}
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| StripeError::InvalidSignature("Missing timestamp".to_string()))?;
        if signatures.is_empty() {
            return Err(StripeError::InvalidSignature(
                "Missing v1 signature".to_string(),
            ));
        }

        let ts: i64 = timestamp
            .parse()
            .map_err(|_| StripeError::InvalidSignature("Invalid timestamp".to_string()))?;

        if (now - ts).abs() > SIGNATURE_TOLERANCE_SECS {
            return Err(StripeError::InvalidSignature(
                "Timestamp outside tolerance".to_string(),
            ));
        }

        let mut mac =
            Hmac::<Sha256>::new_from_slice(self.webhook_secret.expose_secret().as_bytes())
                .map_err(|e| StripeError::InvalidSignature(e.to_string()))?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        let expected = hex::encode(mac.finalize().into_bytes());

        if !signatures
            .iter()
            .any(|sig| constant_time_compare(&expected, sig))
        {
            return Err(StripeError::InvalidSignature(
                "Signature mismatch".to_string(),
            ));
        }

        debug!("Stripe signature verified");

        Ok(())
    }

    /// Form parameters for a Checkout Session in Stripe's bracket notation.
    fn checkout_params(
        &self,
        order_id: i32,
        user_id: i32,
        lines: &[CheckoutLine],
        success_url: &str,
        cancel_url: &str,
    ) -> Vec<(String, String)> {
        let mut params = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), success_url.to_string()),
            ("cancel_url".to_string(), cancel_url.to_string()),
            ("client_reference_id".to_string(), order_id.to_string()),
            ("metadata[orderId]".to_string(), order_id.to_string()),
            ("metadata[userId]".to_string(), user_id.to_string()),
            (
                "payment_intent_data[metadata][orderId]".to_string(),
                order_id.to_string(),
            ),
            (
                "payment_intent_data[metadata][userId]".to_string(),
                user_id.to_string(),
            ),
        ];

        for (i, line) in lines.iter().enumerate() {
            let prefix = format!("line_items[{i}]");
            params.push((
                format!("{prefix}[price_data][currency]"),
                self.currency.clone(),
            ));
            params.push((
                format!("{prefix}[price_data][product_data][name]"),
                line.name.clone(),
            ));
            params.push((
                format!("{prefix}[price_data][unit_amount]"),
                line.unit_amount.to_string(),
            ));
            params.push((format!("{prefix}[quantity]"), line.quantity.to_string()));
        }

        params
    }
}

/// Decode a successful response or turn a Stripe error body into `StripeError::Api`.
async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T, StripeError> {
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.error.message)
            .unwrap_or(body);

        error!(status = %status, message = %message, "Stripe API error");

        return Err(StripeError::Api {
            status: status.as_u16(),
            message,
        });
    }

    response
        .json()
        .await
        .map_err(|e| StripeError::Response(e.to_string()))
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test123secret456";

    fn test_client() -> StripeClient {
        StripeClient::new(&StripeConfig {
            secret_key: SecretString::from("sk_test_xxx".to_string()),
            webhook_secret: SecretString::from(SECRET.to_string()),
            api_base: "https://api.stripe.com/".to_string(),
            currency: "eur".to_string(),
        })
    }

    fn sign(payload: &str, secret: &str, timestamp: i64) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.{payload}").as_bytes());
        format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    const NOW: i64 = 1_760_000_000;
    const PAYLOAD: &str = r#"{"id":"evt_1","type":"checkout.session.completed","data":{"object":{}}}"#;

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("hello", "hello"));
        assert!(!constant_time_compare("hello", "world"));
        assert!(!constant_time_compare("hello", "hell"));
    }

    #[test]
    fn test_valid_signature() {
        let client = test_client();
        let header = sign(PAYLOAD, SECRET, NOW);
        assert!(client.verify_signature(PAYLOAD, &header, NOW).is_ok());
    }

    #[test]
    fn test_any_v1_signature_may_match() {
        let client = test_client();
        let valid = sign(PAYLOAD, SECRET, NOW);
        let v1 = valid.split_once(",v1=").unwrap().1;
        let header = format!("t={NOW},v1=deadbeef,v1={v1}");
        assert!(client.verify_signature(PAYLOAD, &header, NOW).is_ok());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let client = test_client();
        let header = sign(PAYLOAD, "wrong_secret", NOW);
        assert!(matches!(
            client.verify_signature(PAYLOAD, &header, NOW),
            Err(StripeError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_modified_payload_rejected() {
        let client = test_client();
        let header = sign(PAYLOAD, SECRET, NOW);
        let tampered = PAYLOAD.replace("evt_1", "evt_2");
        assert!(client.verify_signature(&tampered, &header, NOW).is_err());
    }

    #[test]
    fn test_old_timestamp_rejected() {
        let client = test_client();
        let header = sign(PAYLOAD, SECRET, NOW - 600);
        assert!(client.verify_signature(PAYLOAD, &header, NOW).is_err());
    }

    #[test]
    fn test_malformed_headers_rejected() {
        let client = test_client();
        for header in ["", "garbage", "v1=abc", "t=123", "t=abc,v1=abc"] {
            assert!(
                client.verify_signature(PAYLOAD, header, NOW).is_err(),
                "header {header:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_construct_event_with_current_timestamp() {
        let client = test_client();
        let header = sign(PAYLOAD, SECRET, chrono::Utc::now().timestamp());
        let event = client.construct_event(PAYLOAD, &header).unwrap();
        assert_eq!(event.id, "evt_1");
        assert_eq!(event.event_type, "checkout.session.completed");
    }

    #[test]
    fn test_checkout_params() {
        let client = test_client();
        let lines = vec![
            CheckoutLine {
                name: "T-shirt".to_string(),
                unit_amount: 1999,
                quantity: 2,
            },
            CheckoutLine {
                name: "Casquette".to_string(),
                unit_amount: 1500,
                quantity: 1,
            },
        ];

        let params = client.checkout_params(42, 7, &lines, "https://shop/ok", "https://shop/ko");
        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("mode"), Some("payment"));
        assert_eq!(get("metadata[orderId]"), Some("42"));
        assert_eq!(get("metadata[userId]"), Some("7"));
        assert_eq!(get("payment_intent_data[metadata][orderId]"), Some("42"));
        assert_eq!(get("line_items[0][price_data][unit_amount]"), Some("1999"));
        assert_eq!(get("line_items[0][quantity]"), Some("2"));
        assert_eq!(get("line_items[1][price_data][product_data][name]"), Some("Casquette"));
        assert_eq!(get("line_items[1][price_data][currency]"), Some("eur"));
    }

    #[test]
    fn test_api_base_trailing_slash_trimmed() {
        assert_eq!(test_client().api_base, "https://api.stripe.com");
    }
}
