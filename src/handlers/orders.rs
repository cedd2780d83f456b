use std::str::FromStr;

use actix_web::{web, HttpResponse};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{AuthenticatedUser, Role};
use crate::domain::order::{Order, OrderFilter, OrderStatus, PlaceOrderInput};
use crate::errors::AppError;
use crate::AppState;

use super::ReasonRequest;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub crop_id: Uuid,
    pub quantity: i32,
    pub delivery_address: String,
    pub expected_delivery_date: Option<NaiveDate>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: Uuid,
    pub crop_id: Uuid,
    pub farmer_id: Uuid,
    pub trader_id: Uuid,
    pub transport_id: Option<Uuid>,
    pub quantity: i32,
    pub price_per_unit: String,
    pub total_price: String,
    pub delivery_address: String,
    pub expected_delivery_date: Option<NaiveDate>,
    pub payment_method: String,
    pub payment_status: String,
    pub order_status: String,
    pub notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub cancellation_reason: Option<String>,
    /// Events the lifecycle accepts from the current status.
    pub allowed_actions: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Order> for OrderResponse {
    fn from(o: Order) -> Self {
        Self {
            allowed_actions: o
                .order_status
                .allowed_events()
                .into_iter()
                .map(|e| e.as_str().to_string())
                .collect(),
            id: o.id,
            crop_id: o.crop_id,
            farmer_id: o.farmer_id,
            trader_id: o.trader_id,
            transport_id: o.transport_id,
            quantity: o.quantity,
            price_per_unit: o.price_per_unit.to_string(),
            total_price: o.total_price.to_string(),
            delivery_address: o.delivery_address,
            expected_delivery_date: o.expected_delivery_date,
            payment_method: o.payment_method,
            payment_status: o.payment_status.to_string(),
            order_status: o.order_status.to_string(),
            notes: o.notes,
            rejection_reason: o.rejection_reason,
            cancellation_reason: o.cancellation_reason,
            created_at: o.created_at.to_rfc3339(),
            updated_at: o.updated_at.to_rfc3339(),
        }
    }
}

// ── Pagination ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct ListOrdersParams {
    /// Page number (1-based). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: i64,
    /// Number of items per page. Defaults to 20, maximum 100.
    #[serde(default = "default_limit")]
    pub limit: i64,
    /// Only orders in this status, e.g. "Both Agreed".
    pub status: Option<String>,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListOrdersResponse {
    pub items: Vec<OrderResponse>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /api/orders/create
///
/// A trader orders from a crop listing. The quantity is reserved against
/// the crop in the same write as the order insert.
#[utoipa::path(
    post,
    path = "/api/orders/create",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order placed", body = OrderResponse),
        (status = 400, description = "Invalid order or not enough stock"),
        (status = 404, description = "Crop not found"),
        (status = 409, description = "Stock was taken concurrently"),
    ),
    tag = "orders"
)]
pub async fn create_order(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let trader_id = user.require(Role::Trader)?;
    let body = body.into_inner();
    let input = PlaceOrderInput {
        crop_id: body.crop_id,
        quantity: body.quantity,
        delivery_address: body.delivery_address,
        expected_delivery_date: body.expected_delivery_date,
        payment_method: body.payment_method,
        notes: body.notes,
    };

    let orders = state.orders.clone();
    let order = web::block(move || orders.place_order(trader_id, input))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Created().json(OrderResponse::from(order)))
}

/// GET /api/orders/{id}
///
/// Returns the order with the actions its current status allows.
#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(("id" = Uuid, Path, description = "Order UUID")),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 403, description = "Caller is not a party to the order"),
        (status = 404, description = "Order not found"),
    ),
    tag = "orders"
)]
pub async fn get_order(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();

    let orders = state.orders.clone();
    let order = web::block(move || orders.get_order(order_id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    if !order.is_party(user.user_id) {
        return Err(AppError::Forbidden(format!(
            "not a party to order {order_id}"
        )));
    }
    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// GET /api/orders
///
/// Orders the caller takes part in, newest first.
#[utoipa::path(
    get,
    path = "/api/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number (default 1)"),
        ("limit" = Option<i64>, Query, description = "Page size (default 20, max 100)"),
        ("status" = Option<String>, Query, description = "Filter by order status"),
    ),
    responses(
        (status = 200, description = "Paginated list of orders", body = ListOrdersResponse),
        (status = 400, description = "Unknown status filter"),
    ),
    tag = "orders"
)]
pub async fn list_orders(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    query: web::Query<ListOrdersParams>,
) -> Result<HttpResponse, AppError> {
    let params = query.into_inner();
    let page = params.page.max(1);
    let limit = params.limit.clamp(1, 100);
    let status = params
        .status
        .map(|s| {
            OrderStatus::from_str(&s)
                .map_err(|_| AppError::Validation(format!("unknown order status '{s}'")))
        })
        .transpose()?;
    let filter = OrderFilter {
        participant: Some(user.user_id),
        status,
    };

    let orders = state.orders.clone();
    let result = web::block(move || orders.list_orders(&filter, page, limit))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(ListOrdersResponse {
        items: result.items.into_iter().map(OrderResponse::from).collect(),
        total: result.total,
        page,
        limit,
    }))
}

/// PUT /api/orders/reject/{id}
#[utoipa::path(
    put,
    path = "/api/orders/reject/{id}",
    params(("id" = Uuid, Path, description = "Order UUID")),
    request_body = ReasonRequest,
    responses(
        (status = 200, description = "Order rejected", body = OrderResponse),
        (status = 409, description = "Order can no longer be rejected"),
    ),
    tag = "orders"
)]
pub async fn reject_order(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    body: web::Json<ReasonRequest>,
) -> Result<HttpResponse, AppError> {
    let farmer_id = user.require(Role::Farmer)?;
    let order_id = path.into_inner();
    let reason = body.into_inner().reason;

    let orders = state.orders.clone();
    let order = web::block(move || orders.reject(order_id, farmer_id, &reason))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// PUT /api/orders/ready/{id}
#[utoipa::path(
    put,
    path = "/api/orders/ready/{id}",
    params(("id" = Uuid, Path, description = "Order UUID")),
    responses(
        (status = 200, description = "Order ready for pickup", body = OrderResponse),
        (status = 409, description = "Advance not paid yet"),
    ),
    tag = "orders"
)]
pub async fn mark_ready(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let farmer_id = user.require(Role::Farmer)?;
    let order_id = path.into_inner();

    let orders = state.orders.clone();
    let order = web::block(move || orders.mark_ready(order_id, farmer_id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// PUT /api/orders/cancel/{id}
///
/// Farmer or trader cancels before any payment has completed.
#[utoipa::path(
    put,
    path = "/api/orders/cancel/{id}",
    params(("id" = Uuid, Path, description = "Order UUID")),
    request_body = ReasonRequest,
    responses(
        (status = 200, description = "Order cancelled", body = OrderResponse),
        (status = 409, description = "Order is past the point of cancellation"),
    ),
    tag = "orders"
)]
pub async fn cancel_order(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    body: web::Json<ReasonRequest>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    let reason = body.into_inner().reason;

    let orders = state.orders.clone();
    let order = web::block(move || orders.cancel(order_id, user.user_id, &reason))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}
