//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Registration, login, token issuance and rotation
//! - `users` - Own profile management
//! - `catalog` - Products and variants, with vendor ownership checks
//! - `cart` - Per-user cart with stock checks
//! - `favorites` - Favorite products
//! - `orders` - Order placement, cancellation and status changes
//! - `payments` - Stripe checkout, webhook handling, confirmation and refunds
//! - `notifications` - In-app notifications and their messages
//! - `vendor` - Vendor dashboard figures
//! - `admin` - Admin dashboard and user management
//!
//! Services borrow the pool (and Stripe client where needed) from `AppState`
//! and are built per request.

pub mod admin;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod favorites;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod users;
pub mod vendor;
