use bigdecimal::BigDecimal;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::events::OutboxMessage;
use crate::domain::order::{
    ListResult, NewOrder, Order, OrderEvent, OrderFilter, PlaceOrderInput,
};
use crate::domain::payment::{PaymentRecordStatus, PaymentType};
use crate::domain::ports::{Effect, MarketplaceStore};

use super::{begin, commit, load_order, require_text};

const DEFAULT_PAYMENT_METHOD: &str = "online";

/// The order lifecycle engine: placement, rejection, readiness and
/// cancellation. Signing, payment and transport steps live in their own
/// services but go through the same transition table.
#[derive(Clone)]
pub struct OrderService<S> {
    store: S,
}

impl<S: MarketplaceStore> OrderService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn place_order(&self, trader_id: Uuid, input: PlaceOrderInput) -> Result<Order, DomainError> {
        if input.quantity <= 0 {
            return Err(DomainError::Validation(
                "quantity must be positive".to_string(),
            ));
        }
        require_text("deliveryAddress", &input.delivery_address)?;

        let crop = self
            .store
            .find_crop(input.crop_id)?
            .ok_or_else(|| DomainError::NotFound(format!("crop {}", input.crop_id)))?;
        if crop.farmer_id == trader_id {
            return Err(DomainError::Validation(
                "cannot order your own crop".to_string(),
            ));
        }
        if crop.available_quantity() < input.quantity {
            return Err(DomainError::Validation(format!(
                "only {} {} of {} available, {} requested",
                crop.available_quantity(),
                crop.unit,
                crop.name,
                input.quantity
            )));
        }

        let total_price = &crop.price_per_unit * BigDecimal::from(input.quantity);
        let order = NewOrder {
            id: Uuid::new_v4(),
            crop_id: crop.id,
            farmer_id: crop.farmer_id,
            trader_id,
            quantity: input.quantity,
            price_per_unit: crop.price_per_unit,
            total_price,
            delivery_address: input.delivery_address.trim().to_string(),
            expected_delivery_date: input.expected_delivery_date,
            payment_method: input
                .payment_method
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string()),
            notes: input.notes,
        };
        let event = OutboxMessage::order_created(&order);
        let order = self.store.place_order(order, event)?;
        log::info!(
            "order {} placed by trader {} for {} units of crop {}",
            order.id,
            trader_id,
            order.quantity,
            order.crop_id
        );
        Ok(order)
    }

    pub fn get_order(&self, id: Uuid) -> Result<Order, DomainError> {
        load_order(&self.store, id)
    }

    pub fn list_orders(
        &self,
        filter: &OrderFilter,
        page: i64,
        limit: i64,
    ) -> Result<ListResult, DomainError> {
        self.store.list_orders(filter, page, limit)
    }

    pub fn reject(&self, order_id: Uuid, farmer_id: Uuid, reason: &str) -> Result<Order, DomainError> {
        require_text("reason", reason)?;
        let order = load_order(&self.store, order_id)?;
        require_farmer(&order, farmer_id)?;

        let transition = begin(&order, OrderEvent::FarmerReject, Some(farmer_id))?
            .with(Effect::SetRejectionReason(reason.trim().to_string()))
            .with(Effect::ReleaseReservation {
                crop_id: order.crop_id,
                quantity: order.quantity,
            });
        commit(&self.store, transition)
    }

    pub fn mark_ready(&self, order_id: Uuid, farmer_id: Uuid) -> Result<Order, DomainError> {
        let order = load_order(&self.store, order_id)?;
        require_farmer(&order, farmer_id)?;

        let transition = begin(&order, OrderEvent::MarkReady, Some(farmer_id))?;
        commit(&self.store, transition)
    }

    pub fn cancel(&self, order_id: Uuid, actor_id: Uuid, reason: &str) -> Result<Order, DomainError> {
        cancel_order(&self.store, order_id, actor_id, reason)
    }
}

pub(crate) fn require_farmer(order: &Order, actor_id: Uuid) -> Result<(), DomainError> {
    if order.farmer_id != actor_id {
        return Err(DomainError::Unauthorized(format!(
            "only the farmer of order {} may do this",
            order.id
        )));
    }
    Ok(())
}

pub(crate) fn require_trader(order: &Order, actor_id: Uuid) -> Result<(), DomainError> {
    if order.trader_id != actor_id {
        return Err(DomainError::Unauthorized(format!(
            "only the trader of order {} may do this",
            order.id
        )));
    }
    Ok(())
}

/// Cancels a pre-payment order on behalf of its farmer or trader. The crop
/// reservation is released, the agreement (if any) is voided and any open
/// checkout is failed so it cannot complete afterwards.
pub(crate) fn cancel_order<S: MarketplaceStore>(
    store: &S,
    order_id: Uuid,
    actor_id: Uuid,
    reason: &str,
) -> Result<Order, DomainError> {
    require_text("reason", reason)?;
    let order = load_order(store, order_id)?;
    if order.farmer_id != actor_id && order.trader_id != actor_id {
        return Err(DomainError::Unauthorized(format!(
            "only the farmer or trader of order {order_id} may cancel it"
        )));
    }

    let mut transition = begin(&order, OrderEvent::Cancel, Some(actor_id))?;

    let payments = store.list_payments(order_id)?;
    if payments
        .iter()
        .any(|p| p.status == PaymentRecordStatus::Completed)
    {
        return Err(DomainError::InvalidState(format!(
            "order {order_id} already has a completed payment"
        )));
    }
    for open in payments.iter().filter(|p| p.status.is_open()) {
        transition = transition
            .with(Effect::UpdatePayment {
                payment_id: open.id,
                from: open.status,
                to: PaymentRecordStatus::Failed,
                gateway_payment_id: None,
            })
            .emit(OutboxMessage::payment_updated(
                order_id,
                open.id,
                open.payment_type,
                PaymentRecordStatus::Failed,
            ));
    }

    transition = transition
        .with(Effect::SetCancellationReason(reason.trim().to_string()))
        .with(Effect::ReleaseReservation {
            crop_id: order.crop_id,
            quantity: order.quantity,
        });

    if store.find_agreement(order_id)?.is_some() {
        transition = transition
            .with(Effect::VoidAgreement {
                reason: reason.trim().to_string(),
                at: Utc::now(),
            })
            .emit(OutboxMessage::agreement_updated(order_id, "voided", actor_id));
    }

    commit(store, transition)
}

/// Completed amount of a given payment type, zero when none.
pub(crate) fn completed_amount(
    payments: &[crate::domain::payment::Payment],
    payment_type: PaymentType,
) -> BigDecimal {
    payments
        .iter()
        .filter(|p| p.payment_type == payment_type && p.status == PaymentRecordStatus::Completed)
        .fold(BigDecimal::from(0), |acc, p| acc + &p.amount)
}
