use std::str::FromStr;

use actix_web::{web, HttpRequest, HttpResponse};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{verify_webhook_signature, AuthenticatedUser, Role, SIGNATURE_HEADER};
use crate::domain::payment::{GatewayEvent, GatewayStatus, Payment, PaymentType, WebhookOutcome};
use crate::errors::AppError;
use crate::AppState;

use super::parse_money;

#[derive(Debug, Deserialize, ToSchema)]
pub struct InitiatePaymentRequest {
    /// "advance", "final" or "transport"
    #[serde(rename = "type")]
    pub payment_type: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub paid_by: Uuid,
    pub paid_to: Uuid,
    #[serde(rename = "type")]
    pub payment_type: String,
    pub amount: String,
    pub percentage: i32,
    pub status: String,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub created_at: String,
}

impl From<Payment> for PaymentResponse {
    fn from(p: Payment) -> Self {
        Self {
            id: p.id,
            order_id: p.order_id,
            paid_by: p.paid_by,
            paid_to: p.paid_to,
            payment_type: p.payment_type.to_string(),
            amount: p.amount.to_string(),
            percentage: p.percentage,
            status: p.status.to_string(),
            gateway_order_id: p.gateway_order_id,
            gateway_payment_id: p.gateway_payment_id,
            created_at: p.created_at.to_rfc3339(),
        }
    }
}

/// Callback body posted by the payment gateway.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRequest {
    pub order_id: Uuid,
    #[serde(rename = "type")]
    pub payment_type: String,
    /// "processing", "completed" or "failed"
    pub status: String,
    pub gateway_payment_id: String,
    /// Settled amount, as a decimal string or number.
    #[schema(value_type = Option<String>)]
    pub amount: Option<Value>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    /// "applied" or "duplicate"
    pub outcome: String,
    pub payment: PaymentResponse,
}

fn parse_payment_type(value: &str) -> Result<PaymentType, AppError> {
    PaymentType::from_str(value)
        .map_err(|_| AppError::Validation(format!("unknown payment type '{value}'")))
}

fn parse_gateway_status(value: &str) -> Result<GatewayStatus, AppError> {
    match value {
        "processing" => Ok(GatewayStatus::Processing),
        "completed" => Ok(GatewayStatus::Completed),
        "failed" => Ok(GatewayStatus::Failed),
        other => Err(AppError::Validation(format!(
            "unknown gateway status '{other}'"
        ))),
    }
}

fn parse_amount(value: Option<Value>) -> Result<Option<BigDecimal>, AppError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => parse_money("amount", &s).map(Some),
        Some(Value::Number(n)) => parse_money("amount", &n.to_string()).map(Some),
        Some(other) => Err(AppError::Validation(format!(
            "amount {other} is not a decimal amount"
        ))),
    }
}

impl TryFrom<WebhookRequest> for GatewayEvent {
    type Error = AppError;

    fn try_from(body: WebhookRequest) -> Result<Self, Self::Error> {
        Ok(GatewayEvent {
            order_id: body.order_id,
            payment_type: parse_payment_type(&body.payment_type)?,
            status: parse_gateway_status(&body.status)?,
            gateway_payment_id: body.gateway_payment_id,
            amount: parse_amount(body.amount)?,
        })
    }
}

/// POST /api/payments/initiate/{orderId}
///
/// Opens a checkout for the advance (30%), final (remaining) or transport
/// (delivery fee) payment.
#[utoipa::path(
    post,
    path = "/api/payments/initiate/{orderId}",
    params(("orderId" = Uuid, Path, description = "Order UUID")),
    request_body = InitiatePaymentRequest,
    responses(
        (status = 201, description = "Checkout opened", body = PaymentResponse),
        (status = 409, description = "Order is not at a paying step"),
    ),
    tag = "payments"
)]
pub async fn initiate_payment(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    body: web::Json<InitiatePaymentRequest>,
) -> Result<HttpResponse, AppError> {
    let trader_id = user.require(Role::Trader)?;
    let order_id = path.into_inner();
    let payment_type = parse_payment_type(&body.payment_type)?;

    let payments = state.payments.clone();
    let payment = web::block(move || payments.initiate(order_id, trader_id, payment_type))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Created().json(PaymentResponse::from(payment)))
}

/// GET /api/payments/order/{orderId}
#[utoipa::path(
    get,
    path = "/api/payments/order/{orderId}",
    params(("orderId" = Uuid, Path, description = "Order UUID")),
    responses(
        (status = 200, description = "Payments for the order", body = [PaymentResponse]),
        (status = 403, description = "Caller is not a party to the order"),
    ),
    tag = "payments"
)]
pub async fn list_payments(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();

    let payments = state.payments.clone();
    let items = web::block(move || payments.list_payments(order_id, user.user_id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    let items: Vec<PaymentResponse> = items.into_iter().map(PaymentResponse::from).collect();
    Ok(HttpResponse::Ok().json(items))
}

/// POST /api/payments/webhook
///
/// Gateway callback, signed with an HMAC-SHA256 of the raw body in
/// `X-Gateway-Signature`. Redelivered events are acknowledged as duplicates.
#[utoipa::path(
    post,
    path = "/api/payments/webhook",
    request_body = WebhookRequest,
    responses(
        (status = 200, description = "Event applied or acknowledged", body = WebhookResponse),
        (status = 400, description = "Malformed event or amount mismatch"),
        (status = 401, description = "Missing or invalid signature"),
        (status = 409, description = "Event does not fit the order's status"),
    ),
    tag = "payments"
)]
pub async fn payment_webhook(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    verify_webhook_signature(&state.webhook_secret, &body, signature)?;

    let request: WebhookRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("malformed webhook body: {e}")))?;
    let event = GatewayEvent::try_from(request)?;

    let payments = state.payments.clone();
    let outcome = web::block(move || payments.handle_gateway_event(event))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    let response = match outcome {
        WebhookOutcome::Applied(payment) => WebhookResponse {
            outcome: "applied".to_string(),
            payment: payment.into(),
        },
        WebhookOutcome::Duplicate(payment) => WebhookResponse {
            outcome: "duplicate".to_string(),
            payment: payment.into(),
        },
    };
    Ok(HttpResponse::Ok().json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn amount_accepts_strings_and_numbers() {
        assert_eq!(
            parse_amount(Some(json!("300.00"))).unwrap(),
            Some(BigDecimal::from(300))
        );
        assert_eq!(parse_amount(Some(json!(300))).unwrap(), Some(BigDecimal::from(300)));
        assert_eq!(parse_amount(None).unwrap(), None);
        assert!(parse_amount(Some(json!(true))).is_err());
    }

    #[test]
    fn unknown_status_and_type_are_validation_errors() {
        assert!(matches!(
            parse_gateway_status("refunded"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            parse_payment_type("deposit"),
            Err(AppError::Validation(_))
        ));
    }
}
