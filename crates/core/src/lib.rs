//! Boutique Core - Shared domain types.
//!
//! This crate provides the types shared by every Boutique component:
//! - `api` - The REST backend (auth, catalog, cart, orders, payments)
//! - `cli` - Command-line tools for migrations and user management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Order status rules and order total arithmetic live
//! here so that every caller enforces them the same way.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, emails, roles and statuses
//! - [`pricing`] - Order line and order total computation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod pricing;
pub mod types;

pub use pricing::{LineAmount, PricingError, order_total};
pub use types::*;
