use bigdecimal::BigDecimal;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::delivery::{
    next_delivery_status, AcceptDeliveryInput, Delivery, DeliveryStatus, NewDelivery,
};
use crate::domain::errors::DomainError;
use crate::domain::events::OutboxMessage;
use crate::domain::location::{
    retention_cutoff, LocationInput, LocationScope, LocationUpdate, NewLocationUpdate,
};
use crate::domain::order::OrderEvent;
use crate::domain::ports::{Effect, MarketplaceStore};

use super::{begin, commit, hold, load_order, require_text};

pub const DEFAULT_LOCATION_LIMIT: i64 = 50;
const MAX_LOCATION_LIMIT: i64 = 500;

#[derive(Clone)]
pub struct TransportService<S> {
    store: S,
}

impl<S: MarketplaceStore> TransportService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Assigns the transporter and vehicle to a ready order. One delivery
    /// per order, and a vehicle or transporter carries one active delivery
    /// at a time.
    pub fn accept_delivery(
        &self,
        order_id: Uuid,
        transporter_id: Uuid,
        input: AcceptDeliveryInput,
    ) -> Result<Delivery, DomainError> {
        require_text("vehicleType", &input.vehicle_type)?;
        require_text("vehicleNumber", &input.vehicle_number)?;
        if input.delivery_fee < BigDecimal::from(0) {
            return Err(DomainError::Validation(
                "deliveryFee must not be negative".to_string(),
            ));
        }

        let order = load_order(&self.store, order_id)?;
        if order.farmer_id == transporter_id || order.trader_id == transporter_id {
            return Err(DomainError::Unauthorized(format!(
                "a party to order {order_id} cannot also transport it"
            )));
        }
        if self.store.find_delivery_for_order(order_id)?.is_some() {
            return Err(DomainError::InvalidState(format!(
                "order {order_id} already has a delivery"
            )));
        }
        let vehicle_number = input.vehicle_number.trim().to_uppercase();
        if self.store.vehicle_has_active_delivery(&vehicle_number)? {
            return Err(DomainError::InvalidState(format!(
                "vehicle {vehicle_number} is already on an active delivery"
            )));
        }
        if self.store.transporter_has_active_delivery(transporter_id)? {
            return Err(DomainError::InvalidState(format!(
                "transporter {transporter_id} is already on an active delivery"
            )));
        }

        let delivery_id = Uuid::new_v4();
        let transition = begin(&order, OrderEvent::TransportAccept, Some(transporter_id))?
            .with(Effect::AssignDelivery(NewDelivery {
                id: delivery_id,
                order_id,
                transport_user_id: transporter_id,
                vehicle_type: input.vehicle_type.trim().to_string(),
                vehicle_number,
                delivery_fee: input.delivery_fee,
            }))
            .emit(OutboxMessage::delivery_updated(
                order_id,
                delivery_id,
                DeliveryStatus::Assigned,
            ));
        commit(&self.store, transition)?;

        self.load_delivery(delivery_id)
    }

    /// Moves a delivery one step forward (or to `Failed`). `In Transit` and
    /// `Delivered` are mirrored into the order in the same write.
    pub fn update_delivery_status(
        &self,
        delivery_id: Uuid,
        actor_id: Uuid,
        requested: DeliveryStatus,
    ) -> Result<Delivery, DomainError> {
        let delivery = self.load_delivery(delivery_id)?;
        if delivery.transport_user_id != actor_id {
            return Err(DomainError::Unauthorized(format!(
                "only the assigned transporter may update delivery {delivery_id}"
            )));
        }
        let next = next_delivery_status(delivery.status, requested)?;

        let order = load_order(&self.store, delivery.order_id)?;
        let transition = match next.order_event() {
            Some(event) => begin(&order, event, Some(actor_id))?,
            None => hold(&order, "update delivery")?,
        };
        if next == DeliveryStatus::Failed {
            log::warn!(
                "delivery {delivery_id} for order {} failed while {}",
                order.id,
                delivery.status
            );
        }
        let transition = transition
            .with(Effect::AdvanceDelivery {
                delivery_id,
                from: delivery.status,
                to: next,
            })
            .emit(OutboxMessage::delivery_updated(order.id, delivery_id, next));
        commit(&self.store, transition)?;

        self.load_delivery(delivery_id)
    }

    pub fn get_delivery_for_order(&self, order_id: Uuid, viewer_id: Uuid) -> Result<Delivery, DomainError> {
        let order = load_order(&self.store, order_id)?;
        if !order.is_party(viewer_id) {
            return Err(DomainError::Unauthorized(format!(
                "not a party to order {order_id}"
            )));
        }
        self.store
            .find_delivery_for_order(order_id)?
            .ok_or_else(|| DomainError::NotFound(format!("delivery for order {order_id}")))
    }

    pub fn record_location(
        &self,
        delivery_id: Uuid,
        actor_id: Uuid,
        input: LocationInput,
    ) -> Result<LocationUpdate, DomainError> {
        if !input.has_valid_coordinates() {
            return Err(DomainError::Validation(format!(
                "coordinates ({}, {}) are out of range",
                input.latitude, input.longitude
            )));
        }
        let delivery = self.load_delivery(delivery_id)?;
        if delivery.transport_user_id != actor_id {
            return Err(DomainError::Unauthorized(format!(
                "only the assigned transporter may report location for delivery {delivery_id}"
            )));
        }
        if !delivery.is_active() {
            return Err(DomainError::InvalidState(format!(
                "delivery {delivery_id} is {} and no longer tracked",
                delivery.status
            )));
        }

        self.store.append_location(NewLocationUpdate {
            id: Uuid::new_v4(),
            delivery_id,
            order_id: delivery.order_id,
            transport_user_id: actor_id,
            latitude: input.latitude,
            longitude: input.longitude,
            accuracy: input.accuracy,
            heading: input.heading,
            speed: input.speed,
            status: input.status,
            recorded_at: Utc::now(),
        })
    }

    /// Most recent location updates for an order, newest first.
    pub fn recent_locations(
        &self,
        order_id: Uuid,
        viewer_id: Uuid,
        limit: i64,
    ) -> Result<Vec<LocationUpdate>, DomainError> {
        let order = load_order(&self.store, order_id)?;
        if !order.is_party(viewer_id) {
            return Err(DomainError::Unauthorized(format!(
                "not a party to order {order_id}"
            )));
        }
        self.store.recent_locations(
            LocationScope::Order(order_id),
            limit.clamp(1, MAX_LOCATION_LIMIT),
        )
    }

    pub fn purge_expired(&self, retention_hours: i64) -> Result<usize, DomainError> {
        let cutoff = retention_cutoff(Utc::now(), retention_hours);
        let purged = self.store.purge_locations_before(cutoff)?;
        if purged > 0 {
            log::info!("purged {purged} location updates recorded before {cutoff}");
        }
        Ok(purged)
    }

    fn load_delivery(&self, delivery_id: Uuid) -> Result<Delivery, DomainError> {
        self.store
            .find_delivery(delivery_id)?
            .ok_or_else(|| DomainError::NotFound(format!("delivery {delivery_id}")))
    }
}
