use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{AuthenticatedUser, Role};
use crate::domain::agreement::{Agreement, FarmerSignInput};
use crate::errors::AppError;
use crate::AppState;

use super::orders::OrderResponse;
use super::ReasonRequest;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FarmerSignRequest {
    pub quality_commitment: String,
    pub quality_grade: String,
    pub quality_description: Option<String>,
    /// Typed name of the signer.
    pub digital_signature: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TraderSignRequest {
    pub digital_signature: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FarmerSignatureResponse {
    pub quality_commitment: String,
    pub quality_grade: String,
    pub quality_description: Option<String>,
    pub digital_signature: String,
    pub signed_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TraderSignatureResponse {
    pub digital_signature: String,
    pub signed_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgreementResponse {
    pub order_id: Uuid,
    pub farmer_agreement: Option<FarmerSignatureResponse>,
    pub trader_agreement: Option<TraderSignatureResponse>,
    pub fully_signed: bool,
    pub voided_at: Option<String>,
    pub void_reason: Option<String>,
}

impl From<Agreement> for AgreementResponse {
    fn from(a: Agreement) -> Self {
        Self {
            fully_signed: a.is_fully_signed(),
            order_id: a.order_id,
            farmer_agreement: a.farmer_agreement.map(|f| FarmerSignatureResponse {
                quality_commitment: f.quality_commitment,
                quality_grade: f.quality_grade,
                quality_description: f.quality_description,
                digital_signature: f.digital_signature,
                signed_at: f.signed_at.to_rfc3339(),
            }),
            trader_agreement: a.trader_agreement.map(|t| TraderSignatureResponse {
                digital_signature: t.digital_signature,
                signed_at: t.signed_at.to_rfc3339(),
            }),
            voided_at: a.voided_at.map(|t| t.to_rfc3339()),
            void_reason: a.void_reason,
        }
    }
}

/// POST /api/agreements/farmer-sign/{orderId}
///
/// The farmer commits to a quality grade and signs first.
#[utoipa::path(
    post,
    path = "/api/agreements/farmer-sign/{orderId}",
    params(("orderId" = Uuid, Path, description = "Order UUID")),
    request_body = FarmerSignRequest,
    responses(
        (status = 200, description = "Farmer signature recorded", body = AgreementResponse),
        (status = 403, description = "Caller is not the order's farmer"),
        (status = 409, description = "Order is not awaiting the farmer or already signed"),
    ),
    tag = "agreements"
)]
pub async fn farmer_sign(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    body: web::Json<FarmerSignRequest>,
) -> Result<HttpResponse, AppError> {
    let farmer_id = user.require(Role::Farmer)?;
    let order_id = path.into_inner();
    let body = body.into_inner();
    let input = FarmerSignInput {
        quality_commitment: body.quality_commitment,
        quality_grade: body.quality_grade,
        quality_description: body.quality_description,
        digital_signature: body.digital_signature,
    };

    let agreements = state.agreements.clone();
    let agreement = web::block(move || agreements.farmer_sign(order_id, farmer_id, input))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(AgreementResponse::from(agreement)))
}

/// POST /api/agreements/trader-sign/{orderId}
#[utoipa::path(
    post,
    path = "/api/agreements/trader-sign/{orderId}",
    params(("orderId" = Uuid, Path, description = "Order UUID")),
    request_body = TraderSignRequest,
    responses(
        (status = 200, description = "Agreement fully signed", body = AgreementResponse),
        (status = 403, description = "Caller is not the order's trader"),
        (status = 409, description = "Farmer has not signed yet"),
    ),
    tag = "agreements"
)]
pub async fn trader_sign(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    body: web::Json<TraderSignRequest>,
) -> Result<HttpResponse, AppError> {
    let trader_id = user.require(Role::Trader)?;
    let order_id = path.into_inner();
    let signature = body.into_inner().digital_signature;

    let agreements = state.agreements.clone();
    let agreement = web::block(move || agreements.trader_sign(order_id, trader_id, signature))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(AgreementResponse::from(agreement)))
}

/// GET /api/agreements/{orderId}
#[utoipa::path(
    get,
    path = "/api/agreements/{orderId}",
    params(("orderId" = Uuid, Path, description = "Order UUID")),
    responses(
        (status = 200, description = "Agreement found", body = AgreementResponse),
        (status = 404, description = "No agreement yet"),
    ),
    tag = "agreements"
)]
pub async fn get_agreement(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();

    let agreements = state.agreements.clone();
    let agreement = web::block(move || agreements.get_agreement(order_id, user.user_id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(AgreementResponse::from(agreement)))
}

/// POST /api/agreements/cancel/{orderId}
///
/// Cancels the order and voids its agreement.
#[utoipa::path(
    post,
    path = "/api/agreements/cancel/{orderId}",
    params(("orderId" = Uuid, Path, description = "Order UUID")),
    request_body = ReasonRequest,
    responses(
        (status = 200, description = "Order cancelled", body = OrderResponse),
        (status = 409, description = "Order is past the point of cancellation"),
    ),
    tag = "agreements"
)]
pub async fn cancel_agreement(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    body: web::Json<ReasonRequest>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    let reason = body.into_inner().reason;

    let agreements = state.agreements.clone();
    let order = web::block(move || agreements.cancel(order_id, user.user_id, &reason))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}
