use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::agreement::{Agreement, FarmerAgreement, TraderAgreement};
use crate::domain::crop::Crop;
use crate::domain::delivery::Delivery;
use crate::domain::errors::DomainError;
use crate::domain::location::LocationUpdate;
use crate::domain::order::Order;
use crate::domain::payment::Payment;
use crate::schema::{
    agreements, crops, deliveries, farmconnect_outbox, location_updates, orders, payments,
};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = crops)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CropRow {
    pub id: Uuid,
    pub farmer_id: Uuid,
    pub name: String,
    pub unit: String,
    pub quantity: i32,
    pub reserved_quantity: i32,
    pub price_per_unit: BigDecimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CropRow> for Crop {
    fn from(row: CropRow) -> Self {
        Crop {
            id: row.id,
            farmer_id: row.farmer_id,
            name: row.name,
            unit: row.unit,
            quantity: row.quantity,
            reserved_quantity: row.reserved_quantity,
            price_per_unit: row.price_per_unit,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crops)]
pub struct NewCropRow {
    pub id: Uuid,
    pub farmer_id: Uuid,
    pub name: String,
    pub unit: String,
    pub quantity: i32,
    pub reserved_quantity: i32,
    pub price_per_unit: BigDecimal,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderRow {
    pub id: Uuid,
    pub crop_id: Uuid,
    pub farmer_id: Uuid,
    pub trader_id: Uuid,
    pub transport_id: Option<Uuid>,
    pub quantity: i32,
    pub price_per_unit: BigDecimal,
    pub total_price: BigDecimal,
    pub delivery_address: String,
    pub expected_delivery_date: Option<NaiveDate>,
    pub payment_method: String,
    pub payment_status: String,
    pub order_status: String,
    pub notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = DomainError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            id: row.id,
            crop_id: row.crop_id,
            farmer_id: row.farmer_id,
            trader_id: row.trader_id,
            transport_id: row.transport_id,
            quantity: row.quantity,
            price_per_unit: row.price_per_unit,
            total_price: row.total_price,
            delivery_address: row.delivery_address,
            expected_delivery_date: row.expected_delivery_date,
            payment_method: row.payment_method,
            payment_status: row.payment_status.parse()?,
            order_status: row.order_status.parse()?,
            notes: row.notes,
            rejection_reason: row.rejection_reason,
            cancellation_reason: row.cancellation_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = orders)]
pub struct NewOrderRow {
    pub id: Uuid,
    pub crop_id: Uuid,
    pub farmer_id: Uuid,
    pub trader_id: Uuid,
    pub quantity: i32,
    pub price_per_unit: BigDecimal,
    pub total_price: BigDecimal,
    pub delivery_address: String,
    pub expected_delivery_date: Option<NaiveDate>,
    pub payment_method: String,
    pub payment_status: String,
    pub order_status: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = agreements)]
#[diesel(primary_key(order_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AgreementRow {
    pub order_id: Uuid,
    pub quality_commitment: Option<String>,
    pub quality_grade: Option<String>,
    pub quality_description: Option<String>,
    pub farmer_signature: Option<String>,
    pub farmer_signed_at: Option<DateTime<Utc>>,
    pub trader_signature: Option<String>,
    pub trader_signed_at: Option<DateTime<Utc>>,
    pub voided_at: Option<DateTime<Utc>>,
    pub void_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<AgreementRow> for Agreement {
    fn from(row: AgreementRow) -> Self {
        let farmer_agreement = match (row.farmer_signature, row.farmer_signed_at) {
            (Some(digital_signature), Some(signed_at)) => Some(FarmerAgreement {
                quality_commitment: row.quality_commitment.unwrap_or_default(),
                quality_grade: row.quality_grade.unwrap_or_default(),
                quality_description: row.quality_description,
                digital_signature,
                signed_at,
            }),
            _ => None,
        };
        let trader_agreement = match (row.trader_signature, row.trader_signed_at) {
            (Some(digital_signature), Some(signed_at)) => Some(TraderAgreement {
                digital_signature,
                signed_at,
            }),
            _ => None,
        };
        Agreement {
            order_id: row.order_id,
            farmer_agreement,
            trader_agreement,
            voided_at: row.voided_at,
            void_reason: row.void_reason,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = agreements)]
pub struct NewAgreementRow {
    pub order_id: Uuid,
    pub quality_commitment: Option<String>,
    pub quality_grade: Option<String>,
    pub quality_description: Option<String>,
    pub farmer_signature: Option<String>,
    pub farmer_signed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = payments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PaymentRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub paid_by: Uuid,
    pub paid_to: Uuid,
    pub payment_type: String,
    pub amount: BigDecimal,
    pub percentage: i32,
    pub status: String,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = DomainError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: row.id,
            order_id: row.order_id,
            paid_by: row.paid_by,
            paid_to: row.paid_to,
            payment_type: row.payment_type.parse()?,
            amount: row.amount,
            percentage: row.percentage,
            status: row.status.parse()?,
            gateway_order_id: row.gateway_order_id,
            gateway_payment_id: row.gateway_payment_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = payments)]
pub struct NewPaymentRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub paid_by: Uuid,
    pub paid_to: Uuid,
    pub payment_type: String,
    pub amount: BigDecimal,
    pub percentage: i32,
    pub status: String,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = deliveries)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DeliveryRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub transport_user_id: Uuid,
    pub vehicle_type: String,
    pub vehicle_number: String,
    pub delivery_fee: BigDecimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DeliveryRow> for Delivery {
    type Error = DomainError;

    fn try_from(row: DeliveryRow) -> Result<Self, Self::Error> {
        Ok(Delivery {
            id: row.id,
            order_id: row.order_id,
            transport_user_id: row.transport_user_id,
            vehicle_type: row.vehicle_type,
            vehicle_number: row.vehicle_number,
            delivery_fee: row.delivery_fee,
            status: row.status.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = deliveries)]
pub struct NewDeliveryRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub transport_user_id: Uuid,
    pub vehicle_type: String,
    pub vehicle_number: String,
    pub delivery_fee: BigDecimal,
    pub status: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Insertable)]
#[diesel(table_name = location_updates)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct LocationUpdateRow {
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
    pub recorded_at: DateTime<Utc>,
}

impl From<LocationUpdateRow> for LocationUpdate {
    fn from(row: LocationUpdateRow) -> Self {
        LocationUpdate {
            id: row.id,
            delivery_id: row.delivery_id,
            order_id: row.order_id,
            transport_user_id: row.transport_user_id,
            latitude: row.latitude,
            longitude: row.longitude,
            accuracy: row.accuracy,
            heading: row.heading,
            speed: row.speed,
            status: row.status,
            recorded_at: row.recorded_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = farmconnect_outbox)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OutboxEventRow {
    pub id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub event_type: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = farmconnect_outbox)]
pub struct NewOutboxEventRow {
    pub id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub event_type: String,
    pub payload: Value,
}
