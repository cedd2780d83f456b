pub mod agreement_service;
pub mod crop_service;
pub mod order_service;
pub mod payment_service;
pub mod transport_service;

use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::events::OutboxMessage;
use crate::domain::order::{next_status, Order, OrderEvent};
use crate::domain::ports::{MarketplaceStore, Transition};

pub(crate) fn load_order<S: MarketplaceStore>(store: &S, id: Uuid) -> Result<Order, DomainError> {
    store
        .find_order(id)?
        .ok_or_else(|| DomainError::NotFound(format!("order {id}")))
}

/// Starts a transition for `event` from the order's current status, already
/// carrying the `order-status-changed` outbox event.
pub(crate) fn begin(
    order: &Order,
    event: OrderEvent,
    actor_id: Option<Uuid>,
) -> Result<Transition, DomainError> {
    let next = next_status(order.order_status, event).map_err(|e| {
        log::warn!("order {} rejected {}: {}", order.id, event, e);
        e
    })?;
    Ok(Transition::new(order.id, order.order_status, next).emit(
        OutboxMessage::status_changed(order.id, order.order_status, next, event, actor_id),
    ))
}

/// A transition that keeps the current status but still fails if it moved.
/// Terminal orders take no further writes.
pub(crate) fn hold(order: &Order, action: &str) -> Result<Transition, DomainError> {
    if order.order_status.is_terminal() {
        log::warn!("order {} rejected {}: it is {}", order.id, action, order.order_status);
        return Err(DomainError::invalid_transition(order.order_status, action));
    }
    Ok(Transition::new(order.id, order.order_status, order.order_status))
}

pub(crate) fn commit<S: MarketplaceStore>(
    store: &S,
    transition: Transition,
) -> Result<Order, DomainError> {
    let (order_id, from, to) = (transition.order_id, transition.expected, transition.next);
    match store.apply(transition) {
        Ok(order) => {
            if from != to {
                log::info!("order {order_id}: {from} -> {to}");
            }
            Ok(order)
        }
        Err(e) => {
            log::warn!("order {order_id}: transition {from} -> {to} not applied: {e}");
            Err(e)
        }
    }
}

pub(crate) fn require_text(field: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::Validation(format!("{field} is required")));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use std::str::FromStr;

    use bigdecimal::BigDecimal;
    use uuid::Uuid;

    use super::agreement_service::AgreementService;
    use super::crop_service::{CropService, ListCropInput};
    use super::order_service::OrderService;
    use super::payment_service::PaymentService;
    use super::transport_service::TransportService;
    use crate::domain::agreement::FarmerSignInput;
    use crate::domain::delivery::{AcceptDeliveryInput, DeliveryStatus};
    use crate::domain::order::{Order, PlaceOrderInput};
    use crate::domain::payment::{GatewayEvent, GatewayStatus, PaymentType};
    use crate::infrastructure::memory_store::MemoryStore;

    pub struct World {
        pub store: Arc<MemoryStore>,
        pub crops: CropService<Arc<MemoryStore>>,
        pub orders: OrderService<Arc<MemoryStore>>,
        pub agreements: AgreementService<Arc<MemoryStore>>,
        pub payments: PaymentService<Arc<MemoryStore>>,
        pub transport: TransportService<Arc<MemoryStore>>,
        pub farmer: Uuid,
        pub trader: Uuid,
        pub transporter: Uuid,
    }

    impl World {
        pub fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            Self {
                crops: CropService::new(Arc::clone(&store)),
                orders: OrderService::new(Arc::clone(&store)),
                agreements: AgreementService::new(Arc::clone(&store)),
                payments: PaymentService::new(Arc::clone(&store)),
                transport: TransportService::new(Arc::clone(&store)),
                store,
                farmer: Uuid::new_v4(),
                trader: Uuid::new_v4(),
                transporter: Uuid::new_v4(),
            }
        }

        pub fn crop(&self, quantity: i32, price: i64) -> Uuid {
            self.crops
                .list_crop(
                    self.farmer,
                    ListCropInput {
                        name: "Basmati rice".to_string(),
                        unit: "kg".to_string(),
                        quantity,
                        price_per_unit: BigDecimal::from(price),
                    },
                )
                .expect("crop listed")
                .id
        }

        pub fn order(&self, crop_id: Uuid, quantity: i32) -> Order {
            self.orders
                .place_order(
                    self.trader,
                    PlaceOrderInput {
                        crop_id,
                        quantity,
                        delivery_address: "APMC yard, gate 2".to_string(),
                        expected_delivery_date: None,
                        payment_method: None,
                        notes: None,
                    },
                )
                .expect("order placed")
        }

        pub fn farmer_terms() -> FarmerSignInput {
            FarmerSignInput {
                quality_commitment: "Grade A, moisture below 14%".to_string(),
                quality_grade: "A".to_string(),
                quality_description: None,
                digital_signature: "Ramesh Kumar".to_string(),
            }
        }

        /// Pending order of 100 units at 10 each, signed by both parties.
        pub fn both_agreed(&self) -> Order {
            let crop_id = self.crop(500, 10);
            let order = self.order(crop_id, 100);
            self.agreements
                .farmer_sign(order.id, self.farmer, Self::farmer_terms())
                .expect("farmer signs");
            self.agreements
                .trader_sign(order.id, self.trader, "Suresh Traders".to_string())
                .expect("trader signs");
            self.orders.get_order(order.id).expect("order exists")
        }

        /// Initiates a checkout and settles it through the gateway callback.
        pub fn pay(&self, order_id: Uuid, payment_type: PaymentType, amount: &str) {
            self.payments
                .initiate(order_id, self.trader, payment_type)
                .expect("checkout opened");
            self.payments
                .handle_gateway_event(GatewayEvent {
                    order_id,
                    payment_type,
                    status: GatewayStatus::Completed,
                    gateway_payment_id: format!("pay_{}", Uuid::new_v4().simple()),
                    amount: Some(BigDecimal::from_str(amount).expect("amount")),
                })
                .expect("payment settled");
        }

        /// Takes an `Advance Paid` order through pickup to `Delivered`, with a
        /// delivery fee of 250.
        pub fn deliver(&self, order_id: Uuid) -> Order {
            self.orders
                .mark_ready(order_id, self.farmer)
                .expect("marked ready");
            let delivery = self
                .transport
                .accept_delivery(
                    order_id,
                    self.transporter,
                    AcceptDeliveryInput {
                        vehicle_type: "truck".to_string(),
                        vehicle_number: format!("MH{}", &Uuid::new_v4().simple().to_string()[..8]),
                        delivery_fee: BigDecimal::from(250),
                    },
                )
                .expect("delivery accepted");
            for status in [
                DeliveryStatus::PickedUp,
                DeliveryStatus::InTransit,
                DeliveryStatus::Delivered,
            ] {
                self.transport
                    .update_delivery_status(delivery.id, self.transporter, status)
                    .expect("delivery advanced");
            }
            self.orders.get_order(order_id).expect("order exists")
        }
    }
}
