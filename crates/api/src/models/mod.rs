//! Domain models returned by the API.
//!
//! These are validated domain objects, separate from the database row types
//! in `crate::db`.

pub mod analytics;
pub mod cart;
pub mod notification;
pub mod order;
pub mod pagination;
pub mod payment;
pub mod product;
pub mod user;

pub use analytics::{AdminStats, CountBy, SalesPeriod, SalesPoint, TopProduct, VendorDashboard, VendorOrder};
pub use cart::{Cart, CartItem, Favorite};
pub use notification::Notification;
pub use order::{Order, OrderDetail, OrderLine};
pub use pagination::{PageParams, Paginated};
pub use payment::Payment;
pub use product::{Product, ProductDetail, Variant};
pub use user::{CurrentUser, User, Vendor};
