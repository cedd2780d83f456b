use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::agreement::{Agreement, FarmerAgreement, TraderAgreement};
use super::crop::{Crop, NewCrop};
use super::delivery::{Delivery, DeliveryStatus, NewDelivery};
use super::errors::DomainError;
use super::events::OutboxMessage;
use super::location::{LocationScope, LocationUpdate, NewLocationUpdate};
use super::order::{ListResult, NewOrder, Order, OrderFilter, OrderStatus, PaymentStatus};
use super::payment::{NewPayment, Payment, PaymentRecordStatus};

/// A side effect that must land together with an order status change.
#[derive(Debug, Clone)]
pub enum Effect {
    SetPaymentStatus(PaymentStatus),
    SetRejectionReason(String),
    SetCancellationReason(String),
    ReleaseReservation { crop_id: Uuid, quantity: i32 },
    ConsumeReservation { crop_id: Uuid, quantity: i32 },
    RecordFarmerSignature(FarmerAgreement),
    RecordTraderSignature(TraderAgreement),
    VoidAgreement { reason: String, at: DateTime<Utc> },
    /// Inserts the delivery and points `orders.transport_id` at its transporter.
    AssignDelivery(NewDelivery),
    AdvanceDelivery {
        delivery_id: Uuid,
        from: DeliveryStatus,
        to: DeliveryStatus,
    },
    RecordPayment(NewPayment),
    UpdatePayment {
        payment_id: Uuid,
        from: PaymentRecordStatus,
        to: PaymentRecordStatus,
        gateway_payment_id: Option<String>,
    },
}

/// Compare-and-swap on `orders.order_status` plus everything that has to
/// happen with it. Stores apply it all or nothing; a status that no longer
/// matches `expected` is a `Conflict`.
///
/// `expected == next` is allowed and is how effects that leave the status
/// alone (payment initiation, pickup) still get guarded by it.
#[derive(Debug, Clone)]
pub struct Transition {
    pub order_id: Uuid,
    pub expected: OrderStatus,
    pub next: OrderStatus,
    pub effects: Vec<Effect>,
    pub events: Vec<OutboxMessage>,
}

impl Transition {
    pub fn new(order_id: Uuid, expected: OrderStatus, next: OrderStatus) -> Self {
        Self {
            order_id,
            expected,
            next,
            effects: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn with(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn emit(mut self, message: OutboxMessage) -> Self {
        self.events.push(message);
        self
    }
}

pub trait MarketplaceStore: Send + Sync + 'static {
    fn insert_crop(&self, crop: NewCrop, event: OutboxMessage) -> Result<Crop, DomainError>;
    fn find_crop(&self, id: Uuid) -> Result<Option<Crop>, DomainError>;

    /// Inserts the order and reserves its quantity against the crop in one
    /// write. Fails with `Conflict` if the crop no longer has enough stock.
    fn place_order(&self, order: NewOrder, event: OutboxMessage) -> Result<Order, DomainError>;
    fn find_order(&self, id: Uuid) -> Result<Option<Order>, DomainError>;
    fn list_orders(
        &self,
        filter: &OrderFilter,
        page: i64,
        limit: i64,
    ) -> Result<ListResult, DomainError>;
    fn apply(&self, transition: Transition) -> Result<Order, DomainError>;

    fn find_agreement(&self, order_id: Uuid) -> Result<Option<Agreement>, DomainError>;

    fn find_payment_by_gateway_id(
        &self,
        gateway_payment_id: &str,
    ) -> Result<Option<Payment>, DomainError>;
    fn list_payments(&self, order_id: Uuid) -> Result<Vec<Payment>, DomainError>;

    fn find_delivery(&self, id: Uuid) -> Result<Option<Delivery>, DomainError>;
    fn find_delivery_for_order(&self, order_id: Uuid) -> Result<Option<Delivery>, DomainError>;
    fn vehicle_has_active_delivery(&self, vehicle_number: &str) -> Result<bool, DomainError>;
    fn transporter_has_active_delivery(&self, transporter_id: Uuid) -> Result<bool, DomainError>;

    fn append_location(&self, update: NewLocationUpdate) -> Result<LocationUpdate, DomainError>;
    /// Most recent first.
    fn recent_locations(
        &self,
        scope: LocationScope,
        limit: i64,
    ) -> Result<Vec<LocationUpdate>, DomainError>;
    fn purge_locations_before(&self, cutoff: DateTime<Utc>) -> Result<usize, DomainError>;
}

impl<T: MarketplaceStore + ?Sized> MarketplaceStore for Arc<T> {
    fn insert_crop(&self, crop: NewCrop, event: OutboxMessage) -> Result<Crop, DomainError> {
        (**self).insert_crop(crop, event)
    }

    fn find_crop(&self, id: Uuid) -> Result<Option<Crop>, DomainError> {
        (**self).find_crop(id)
    }

    fn place_order(&self, order: NewOrder, event: OutboxMessage) -> Result<Order, DomainError> {
        (**self).place_order(order, event)
    }

    fn find_order(&self, id: Uuid) -> Result<Option<Order>, DomainError> {
        (**self).find_order(id)
    }

    fn list_orders(
        &self,
        filter: &OrderFilter,
        page: i64,
        limit: i64,
    ) -> Result<ListResult, DomainError> {
        (**self).list_orders(filter, page, limit)
    }

    fn apply(&self, transition: Transition) -> Result<Order, DomainError> {
        (**self).apply(transition)
    }

    fn find_agreement(&self, order_id: Uuid) -> Result<Option<Agreement>, DomainError> {
        (**self).find_agreement(order_id)
    }

    fn find_payment_by_gateway_id(
        &self,
        gateway_payment_id: &str,
    ) -> Result<Option<Payment>, DomainError> {
        (**self).find_payment_by_gateway_id(gateway_payment_id)
    }

    fn list_payments(&self, order_id: Uuid) -> Result<Vec<Payment>, DomainError> {
        (**self).list_payments(order_id)
    }

    fn find_delivery(&self, id: Uuid) -> Result<Option<Delivery>, DomainError> {
        (**self).find_delivery(id)
    }

    fn find_delivery_for_order(&self, order_id: Uuid) -> Result<Option<Delivery>, DomainError> {
        (**self).find_delivery_for_order(order_id)
    }

    fn vehicle_has_active_delivery(&self, vehicle_number: &str) -> Result<bool, DomainError> {
        (**self).vehicle_has_active_delivery(vehicle_number)
    }

    fn transporter_has_active_delivery(&self, transporter_id: Uuid) -> Result<bool, DomainError> {
        (**self).transporter_has_active_delivery(transporter_id)
    }

    fn append_location(&self, update: NewLocationUpdate) -> Result<LocationUpdate, DomainError> {
        (**self).append_location(update)
    }

    fn recent_locations(
        &self,
        scope: LocationScope,
        limit: i64,
    ) -> Result<Vec<LocationUpdate>, DomainError> {
        (**self).recent_locations(scope, limit)
    }

    fn purge_locations_before(&self, cutoff: DateTime<Utc>) -> Result<usize, DomainError> {
        (**self).purge_locations_before(cutoff)
    }
}
