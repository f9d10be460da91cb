//! Stripe integration.
//!
//! Only the small slice of the Stripe API the shop needs:
//! - Checkout Sessions for paying an order
//! - Refunds
//! - Webhook signature verification and event parsing
//!
//! Requests are form-encoded against `STRIPE_API_BASE` with the secret key as
//! bearer token.

mod client;
mod error;
pub mod types;

pub use client::StripeClient;
pub use error::StripeError;
pub use types::{CheckoutLine, CheckoutSession, Event, Refund};
