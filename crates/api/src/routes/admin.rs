//! Admin dashboard API.
//!
//! Every route requires the `admin` role. Product, order and payment routes
//! share their services with the customer and vendor surfaces.

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
};
use serde::Deserialize;

use boutique_core::{
    OrderId, OrderStatus, PaymentId, PaymentStatus, Price, ProductId, Role, UserId, VendorId,
};

use crate::db::products::{NewProduct, ProductFilter, ProductUpdate};
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::{
    AdminStats, Order, PageParams, Paginated, Payment, Product, SalesPoint, User,
};
use crate::routes::extract::{Json, Query};
use crate::routes::vendor::SalesQuery;
use crate::services::admin::{AdminService, RoleChange};
use crate::services::catalog::CatalogService;
use crate::services::orders::OrderService;
use crate::services::payments::PaymentService;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard/stats", get(stats))
        .route("/dashboard/sales", get(sales))
        .route("/users", get(users))
        .route("/users/{id}/role", put(set_role))
        .route("/users/{id}", delete(delete_user))
        .route("/products", get(products).post(create_product))
        .route("/products/{id}", put(update_product).delete(delete_product))
        .route("/orders", get(orders))
        .route("/orders/{id}/status", put(set_order_status))
        .route("/orders/{id}/confirm-payment", post(confirm_payment))
        .route("/payments/{id}/status", put(set_payment_status))
        .route("/payments/{id}/refund", post(refund))
}

/// `?role=` filter for the user list.
#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub role: Option<Role>,
}

/// `?status=` filter for the order list.
#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
}

/// A product created on behalf of a vendor.
#[derive(Debug, Deserialize)]
pub struct AdminNewProduct {
    pub vendor_id: VendorId,
    pub name: String,
    pub description: Option<String>,
    pub price: Price,
    pub image_url: Option<String>,
    pub category: Option<String>,
}

impl From<AdminNewProduct> for NewProduct {
    fn from(p: AdminNewProduct) -> Self {
        Self {
            name: p.name,
            description: p.description,
            price: p.price,
            image_url: p.image_url,
            category: p.category,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OrderStatusChange {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct PaymentStatusChange {
    pub status: PaymentStatus,
}

fn payments(state: &AppState) -> PaymentService<'_> {
    PaymentService::new(state.pool(), state.stripe(), &state.config().frontend_url)
}

async fn stats(_: RequireAdmin, State(state): State<AppState>) -> Result<Json<AdminStats>> {
    Ok(Json(AdminService::new(state.pool()).stats().await?))
}

async fn sales(
    _: RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<SalesQuery>,
) -> Result<Json<Vec<SalesPoint>>> {
    Ok(Json(AdminService::new(state.pool()).sales(query.period).await?))
}

async fn users(
    _: RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
    Query(params): Query<PageParams>,
) -> Result<Json<Paginated<User>>> {
    Ok(Json(
        AdminService::new(state.pool())
            .users(query.role, params)
            .await?,
    ))
}

async fn set_role(
    _: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(change): Json<RoleChange>,
) -> Result<Json<User>> {
    Ok(Json(
        AdminService::new(state.pool()).set_role(id, &change).await?,
    ))
}

async fn delete_user(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<StatusCode> {
    AdminService::new(state.pool())
        .delete_user(&admin, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn products(
    _: RequireAdmin,
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
    Query(params): Query<PageParams>,
) -> Result<Json<Paginated<Product>>> {
    Ok(Json(
        CatalogService::new(state.pool()).list(&filter, params).await?,
    ))
}

async fn create_product(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(body): Json<AdminNewProduct>,
) -> Result<(StatusCode, Json<Product>)> {
    let vendor_id = body.vendor_id;
    let product = CatalogService::new(state.pool())
        .create(&admin, Some(vendor_id), &body.into())
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn update_product(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(update): Json<ProductUpdate>,
) -> Result<Json<Product>> {
    Ok(Json(
        CatalogService::new(state.pool())
            .update(&admin, id, &update)
            .await?,
    ))
}

async fn delete_product(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    CatalogService::new(state.pool()).delete(&admin, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn orders(
    _: RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<OrderQuery>,
    Query(params): Query<PageParams>,
) -> Result<Json<Paginated<Order>>> {
    Ok(Json(
        OrderService::new(state.pool())
            .list_all(query.status, params)
            .await?,
    ))
}

async fn set_order_status(
    _: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(change): Json<OrderStatusChange>,
) -> Result<Json<Order>> {
    Ok(Json(
        OrderService::new(state.pool())
            .set_status(id, change.status)
            .await?,
    ))
}

async fn confirm_payment(
    _: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(
        OrderService::new(state.pool()).confirm_payment(id).await?,
    ))
}

async fn set_payment_status(
    _: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<PaymentId>,
    Json(change): Json<PaymentStatusChange>,
) -> Result<Json<Payment>> {
    Ok(Json(payments(&state).set_status(id, change.status).await?))
}

async fn refund(
    _: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<PaymentId>,
) -> Result<Json<Payment>> {
    Ok(Json(payments(&state).refund(id).await?))
}
