use std::str::FromStr;

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::transport_service::DEFAULT_LOCATION_LIMIT;
use crate::auth::{AuthenticatedUser, Role};
use crate::domain::delivery::{AcceptDeliveryInput, Delivery, DeliveryStatus};
use crate::domain::location::{LocationInput, LocationUpdate};
use crate::errors::AppError;
use crate::AppState;

use super::parse_money;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AcceptDeliveryRequest {
    pub vehicle_type: String,
    pub vehicle_number: String,
    /// Decimal fee as a string, e.g. "250"
    pub delivery_fee: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DeliveryStatusRequest {
    /// "Picked Up", "In Transit", "Delivered" or "Failed"
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub transport_user_id: Uuid,
    pub vehicle_type: String,
    pub vehicle_number: String,
    pub delivery_fee: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Delivery> for DeliveryResponse {
    fn from(d: Delivery) -> Self {
        Self {
            id: d.id,
            order_id: d.order_id,
            transport_user_id: d.transport_user_id,
            vehicle_type: d.vehicle_type,
            vehicle_number: d.vehicle_number,
            delivery_fee: d.delivery_fee.to_string(),
            status: d.status.to_string(),
            created_at: d.created_at.to_rfc3339(),
            updated_at: d.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LocationRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocationResponse {
    pub id: Uuid,
    pub delivery_id: Uuid,
    pub order_id: Uuid,
    pub transport_user_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub status: Option<String>,
    pub recorded_at: String,
}

impl From<LocationUpdate> for LocationResponse {
    fn from(l: LocationUpdate) -> Self {
        Self {
            id: l.id,
            delivery_id: l.delivery_id,
            order_id: l.order_id,
            transport_user_id: l.transport_user_id,
            latitude: l.latitude,
            longitude: l.longitude,
            accuracy: l.accuracy,
            heading: l.heading,
            speed: l.speed,
            status: l.status,
            recorded_at: l.recorded_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LocationQuery {
    /// Number of updates to return. Defaults to 50.
    #[serde(default = "default_location_limit")]
    pub limit: i64,
}

fn default_location_limit() -> i64 {
    DEFAULT_LOCATION_LIMIT
}

/// POST /api/transport/accept/{orderId}
#[utoipa::path(
    post,
    path = "/api/transport/accept/{orderId}",
    params(("orderId" = Uuid, Path, description = "Order UUID")),
    request_body = AcceptDeliveryRequest,
    responses(
        (status = 201, description = "Delivery assigned", body = DeliveryResponse),
        (status = 409, description = "Order not ready, already assigned, or vehicle busy"),
    ),
    tag = "transport"
)]
pub async fn accept_delivery(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    body: web::Json<AcceptDeliveryRequest>,
) -> Result<HttpResponse, AppError> {
    let transporter_id = user.require(Role::Transporter)?;
    let order_id = path.into_inner();
    let body = body.into_inner();
    let input = AcceptDeliveryInput {
        delivery_fee: parse_money("deliveryFee", &body.delivery_fee)?,
        vehicle_type: body.vehicle_type,
        vehicle_number: body.vehicle_number,
    };

    let transport = state.transport.clone();
    let delivery = web::block(move || transport.accept_delivery(order_id, transporter_id, input))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Created().json(DeliveryResponse::from(delivery)))
}

/// PUT /api/transport/status/{deliveryId}
///
/// Moves the delivery one step forward, or to "Failed".
#[utoipa::path(
    put,
    path = "/api/transport/status/{deliveryId}",
    params(("deliveryId" = Uuid, Path, description = "Delivery UUID")),
    request_body = DeliveryStatusRequest,
    responses(
        (status = 200, description = "Delivery updated", body = DeliveryResponse),
        (status = 409, description = "Status would skip or go backwards"),
    ),
    tag = "transport"
)]
pub async fn update_delivery_status(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    body: web::Json<DeliveryStatusRequest>,
) -> Result<HttpResponse, AppError> {
    let transporter_id = user.require(Role::Transporter)?;
    let delivery_id = path.into_inner();
    let status = DeliveryStatus::from_str(&body.status).map_err(|_| {
        AppError::Validation(format!("unknown delivery status '{}'", body.status))
    })?;

    let transport = state.transport.clone();
    let delivery =
        web::block(move || transport.update_delivery_status(delivery_id, transporter_id, status))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(DeliveryResponse::from(delivery)))
}

/// GET /api/transport/delivery/{orderId}
#[utoipa::path(
    get,
    path = "/api/transport/delivery/{orderId}",
    params(("orderId" = Uuid, Path, description = "Order UUID")),
    responses(
        (status = 200, description = "Delivery for the order", body = DeliveryResponse),
        (status = 404, description = "No delivery assigned yet"),
    ),
    tag = "transport"
)]
pub async fn get_delivery(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();

    let transport = state.transport.clone();
    let delivery = web::block(move || transport.get_delivery_for_order(order_id, user.user_id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(DeliveryResponse::from(delivery)))
}

/// POST /api/transport/location/{deliveryId}
#[utoipa::path(
    post,
    path = "/api/transport/location/{deliveryId}",
    params(("deliveryId" = Uuid, Path, description = "Delivery UUID")),
    request_body = LocationRequest,
    responses(
        (status = 201, description = "Location recorded", body = LocationResponse),
        (status = 409, description = "Delivery is no longer active"),
    ),
    tag = "transport"
)]
pub async fn record_location(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    body: web::Json<LocationRequest>,
) -> Result<HttpResponse, AppError> {
    let transporter_id = user.require(Role::Transporter)?;
    let delivery_id = path.into_inner();
    let body = body.into_inner();
    let input = LocationInput {
        latitude: body.latitude,
        longitude: body.longitude,
        accuracy: body.accuracy,
        heading: body.heading,
        speed: body.speed,
        status: body.status,
    };

    let transport = state.transport.clone();
    let update = web::block(move || transport.record_location(delivery_id, transporter_id, input))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Created().json(LocationResponse::from(update)))
}

/// GET /api/transport/location/order/{orderId}
///
/// Most recent location updates first.
#[utoipa::path(
    get,
    path = "/api/transport/location/order/{orderId}",
    params(
        ("orderId" = Uuid, Path, description = "Order UUID"),
        ("limit" = Option<i64>, Query, description = "Number of updates (default 50)"),
    ),
    responses(
        (status = 200, description = "Recent locations", body = [LocationResponse]),
    ),
    tag = "transport"
)]
pub async fn order_locations(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    query: web::Query<LocationQuery>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    let limit = query.into_inner().limit;

    let transport = state.transport.clone();
    let updates = web::block(move || transport.recent_locations(order_id, user.user_id, limit))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    let updates: Vec<LocationResponse> = updates.into_iter().map(LocationResponse::from).collect();
    Ok(HttpResponse::Ok().json(updates))
}
