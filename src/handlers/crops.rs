use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::crop_service::ListCropInput;
use crate::auth::{AuthenticatedUser, Role};
use crate::domain::crop::Crop;
use crate::errors::AppError;
use crate::AppState;

use super::parse_money;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCropRequest {
    pub name: String,
    pub unit: String,
    pub quantity: i32,
    /// Decimal price as a string, e.g. "42.50"
    pub price_per_unit: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CropResponse {
    pub id: Uuid,
    pub farmer_id: Uuid,
    pub name: String,
    pub unit: String,
    pub quantity: i32,
    pub reserved_quantity: i32,
    pub available_quantity: i32,
    pub price_per_unit: String,
    pub created_at: String,
}

impl From<Crop> for CropResponse {
    fn from(c: Crop) -> Self {
        Self {
            available_quantity: c.available_quantity(),
            id: c.id,
            farmer_id: c.farmer_id,
            name: c.name,
            unit: c.unit,
            quantity: c.quantity,
            reserved_quantity: c.reserved_quantity,
            price_per_unit: c.price_per_unit.to_string(),
            created_at: c.created_at.to_rfc3339(),
        }
    }
}

/// POST /api/crops
///
/// Lists a crop for sale. Only farmers may list.
#[utoipa::path(
    post,
    path = "/api/crops",
    request_body = CreateCropRequest,
    responses(
        (status = 201, description = "Crop listed", body = CropResponse),
        (status = 400, description = "Invalid listing"),
        (status = 403, description = "Caller is not a farmer"),
    ),
    tag = "crops"
)]
pub async fn create_crop(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    body: web::Json<CreateCropRequest>,
) -> Result<HttpResponse, AppError> {
    let farmer_id = user.require(Role::Farmer)?;
    let body = body.into_inner();
    let input = ListCropInput {
        price_per_unit: parse_money("pricePerUnit", &body.price_per_unit)?,
        name: body.name,
        unit: body.unit,
        quantity: body.quantity,
    };

    let crops = state.crops.clone();
    let crop = web::block(move || crops.list_crop(farmer_id, input))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Created().json(CropResponse::from(crop)))
}

/// GET /api/crops/{id}
#[utoipa::path(
    get,
    path = "/api/crops/{id}",
    params(("id" = Uuid, Path, description = "Crop UUID")),
    responses(
        (status = 200, description = "Crop found", body = CropResponse),
        (status = 404, description = "Crop not found"),
    ),
    tag = "crops"
)]
pub async fn get_crop(
    state: web::Data<AppState>,
    _user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let crop_id = path.into_inner();

    let crops = state.crops.clone();
    let crop = web::block(move || crops.get_crop(crop_id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(CropResponse::from(crop)))
}
