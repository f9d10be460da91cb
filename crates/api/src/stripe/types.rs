//! Stripe API request and response types.

use std::collections::HashMap;

use serde::Deserialize;

/// One line of a Checkout Session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLine {
    pub name: String,
    /// Unit price in minor units (cents).
    pub unit_amount: i64,
    pub quantity: u32,
}

/// A Checkout Session as returned by `POST /v1/checkout/sessions`.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    /// Hosted payment page. Absent once the session is complete.
    pub url: Option<String>,
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSession {
    /// The `orderId` metadata value.
    #[must_use]
    pub fn order_id(&self) -> Option<i32> {
        self.metadata.get("orderId")?.parse().ok()
    }
}

/// A Payment Intent, as carried by `payment_intent.*` events.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl PaymentIntent {
    /// The `orderId` metadata value.
    #[must_use]
    pub fn order_id(&self) -> Option<i32> {
        self.metadata.get("orderId")?.parse().ok()
    }
}

/// A refund as returned by `POST /v1/refunds`.
#[derive(Debug, Clone, Deserialize)]
pub struct Refund {
    pub id: String,
    pub status: Option<String>,
    pub payment_intent: Option<String>,
}

/// A webhook event. `data.object` is decoded lazily according to `event_type`.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

/// Payload of a webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

impl Event {
    /// Decode `data.object` into a concrete Stripe object.
    ///
    /// # Errors
    ///
    /// Returns an error if the object doesn't have the expected shape.
    pub fn object<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data.object)
    }
}

/// Error body returned by the Stripe API.
#[derive(Debug, Deserialize)]
pub(super) struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(super) struct ErrorDetail {
    pub message: Option<String>,
}
