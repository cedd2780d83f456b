use serde_json::{json, Value};
use uuid::Uuid;

use super::crop::NewCrop;
use super::delivery::DeliveryStatus;
use super::order::{NewOrder, OrderEvent, OrderStatus};
use super::payment::{PaymentRecordStatus, PaymentType};

/// Row destined for the outbox table, written in the same transaction as the
/// change it describes. CDC picks it up and routes it by `aggregate_type`.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxMessage {
    pub aggregate_type: &'static str,
    pub aggregate_id: String,
    pub event_type: &'static str,
    pub payload: Value,
}

impl OutboxMessage {
    pub fn crop_listed(crop: &NewCrop) -> Self {
        Self {
            aggregate_type: "Crop",
            aggregate_id: crop.id.to_string(),
            event_type: "crop-listed",
            payload: json!({
                "cropId": crop.id,
                "farmerId": crop.farmer_id,
                "name": crop.name,
                "quantity": crop.quantity,
                "unit": crop.unit,
                "pricePerUnit": crop.price_per_unit.to_string(),
            }),
        }
    }

    pub fn order_created(order: &NewOrder) -> Self {
        Self {
            aggregate_type: "Order",
            aggregate_id: order.id.to_string(),
            event_type: "order-created",
            payload: json!({
                "orderId": order.id,
                "cropId": order.crop_id,
                "farmerId": order.farmer_id,
                "traderId": order.trader_id,
                "quantity": order.quantity,
                "totalPrice": order.total_price.to_string(),
                "orderStatus": OrderStatus::Pending,
            }),
        }
    }

    pub fn status_changed(
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        event: OrderEvent,
        actor_id: Option<Uuid>,
    ) -> Self {
        Self {
            aggregate_type: "Order",
            aggregate_id: order_id.to_string(),
            event_type: "order-status-changed",
            payload: json!({
                "orderId": order_id,
                "from": from,
                "to": to,
                "event": event,
                "actorId": actor_id,
            }),
        }
    }

    pub fn agreement_updated(order_id: Uuid, change: &str, actor_id: Uuid) -> Self {
        Self {
            aggregate_type: "Order",
            aggregate_id: order_id.to_string(),
            event_type: "agreement-updated",
            payload: json!({
                "orderId": order_id,
                "change": change,
                "actorId": actor_id,
            }),
        }
    }

    pub fn payment_updated(
        order_id: Uuid,
        payment_id: Uuid,
        payment_type: PaymentType,
        status: PaymentRecordStatus,
    ) -> Self {
        Self {
            aggregate_type: "Order",
            aggregate_id: order_id.to_string(),
            event_type: "payment-updated",
            payload: json!({
                "orderId": order_id,
                "paymentId": payment_id,
                "type": payment_type,
                "status": status,
            }),
        }
    }

    pub fn delivery_updated(order_id: Uuid, delivery_id: Uuid, status: DeliveryStatus) -> Self {
        Self {
            aggregate_type: "Order",
            aggregate_id: order_id.to_string(),
            event_type: "delivery-updated",
            payload: json!({
                "orderId": order_id,
                "deliveryId": delivery_id,
                "status": status,
            }),
        }
    }
}
