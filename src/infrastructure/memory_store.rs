use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::agreement::Agreement;
use crate::domain::crop::{Crop, NewCrop};
use crate::domain::delivery::{Delivery, DeliveryStatus};
use crate::domain::errors::DomainError;
use crate::domain::events::OutboxMessage;
use crate::domain::location::{LocationScope, LocationUpdate, NewLocationUpdate};
use crate::domain::order::{
    page_offset, ListResult, NewOrder, Order, OrderFilter, OrderStatus, PaymentStatus,
};
use crate::domain::payment::Payment;
use crate::domain::ports::{Effect, MarketplaceStore, Transition};

#[derive(Debug, Clone, Default)]
struct State {
    crops: HashMap<Uuid, Crop>,
    orders: HashMap<Uuid, Order>,
    agreements: HashMap<Uuid, Agreement>,
    payments: Vec<Payment>,
    deliveries: HashMap<Uuid, Delivery>,
    locations: Vec<LocationUpdate>,
    outbox: Vec<OutboxMessage>,
}

/// Process-local store with the same atomicity as the Postgres one: each
/// write works on a copy of the state and swaps it in only if every step
/// succeeded.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written to the outbox so far, oldest first.
    pub fn outbox(&self) -> Vec<OutboxMessage> {
        self.lock().map(|s| s.outbox.clone()).unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, DomainError> {
        self.state
            .lock()
            .map_err(|_| DomainError::Internal("memory store lock poisoned".to_string()))
    }
}

fn conflict(msg: impl Into<String>) -> DomainError {
    DomainError::Conflict(msg.into())
}

impl State {
    fn crop_mut(&mut self, crop_id: Uuid) -> Result<&mut Crop, DomainError> {
        self.crops
            .get_mut(&crop_id)
            .ok_or_else(|| DomainError::NotFound(format!("crop {crop_id}")))
    }

    fn apply_effect(
        &mut self,
        order_id: Uuid,
        effect: Effect,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        match effect {
            Effect::SetPaymentStatus(status) => {
                self.order_mut(order_id)?.payment_status = status;
            }
            Effect::SetRejectionReason(reason) => {
                self.order_mut(order_id)?.rejection_reason = Some(reason);
            }
            Effect::SetCancellationReason(reason) => {
                self.order_mut(order_id)?.cancellation_reason = Some(reason);
            }
            Effect::ReleaseReservation { crop_id, quantity } => {
                let crop = self.crop_mut(crop_id)?;
                if crop.reserved_quantity < quantity {
                    return Err(DomainError::Internal(format!(
                        "crop {crop_id} has only {} reserved, cannot release {quantity}",
                        crop.reserved_quantity
                    )));
                }
                crop.reserved_quantity -= quantity;
                crop.updated_at = now;
            }
            Effect::ConsumeReservation { crop_id, quantity } => {
                let crop = self.crop_mut(crop_id)?;
                if crop.reserved_quantity < quantity {
                    return Err(DomainError::Internal(format!(
                        "crop {crop_id} has only {} reserved, cannot consume {quantity}",
                        crop.reserved_quantity
                    )));
                }
                crop.reserved_quantity -= quantity;
                crop.quantity -= quantity;
                crop.updated_at = now;
            }
            Effect::RecordFarmerSignature(farmer) => {
                if self.agreements.contains_key(&order_id) {
                    return Err(conflict(format!("agreement for order {order_id} already exists")));
                }
                self.agreements.insert(
                    order_id,
                    Agreement {
                        order_id,
                        farmer_agreement: Some(farmer),
                        trader_agreement: None,
                        voided_at: None,
                        void_reason: None,
                        created_at: now,
                    },
                );
            }
            Effect::RecordTraderSignature(trader) => {
                let agreement = self
                    .agreements
                    .get_mut(&order_id)
                    .filter(|a| a.farmer_agreement.is_some() && a.trader_agreement.is_none())
                    .ok_or_else(|| {
                        conflict(format!("agreement for order {order_id} is not awaiting the trader"))
                    })?;
                agreement.trader_agreement = Some(trader);
            }
            Effect::VoidAgreement { reason, at } => {
                if let Some(agreement) = self.agreements.get_mut(&order_id) {
                    if agreement.voided_at.is_none() {
                        agreement.voided_at = Some(at);
                        agreement.void_reason = Some(reason);
                    }
                }
            }
            Effect::AssignDelivery(new) => {
                if self.deliveries.values().any(|d| d.order_id == new.order_id) {
                    return Err(conflict(format!("order {} already has a delivery", new.order_id)));
                }
                if self
                    .deliveries
                    .values()
                    .any(|d| d.is_active() && d.vehicle_number == new.vehicle_number)
                {
                    return Err(conflict(format!(
                        "vehicle {} is already on an active delivery",
                        new.vehicle_number
                    )));
                }
                if self
                    .deliveries
                    .values()
                    .any(|d| d.is_active() && d.transport_user_id == new.transport_user_id)
                {
                    return Err(conflict(format!(
                        "transporter {} is already on an active delivery",
                        new.transport_user_id
                    )));
                }
                self.order_mut(order_id)?.transport_id = Some(new.transport_user_id);
                self.deliveries.insert(
                    new.id,
                    Delivery {
                        id: new.id,
                        order_id: new.order_id,
                        transport_user_id: new.transport_user_id,
                        vehicle_type: new.vehicle_type,
                        vehicle_number: new.vehicle_number,
                        delivery_fee: new.delivery_fee,
                        status: DeliveryStatus::Assigned,
                        created_at: now,
                        updated_at: now,
                    },
                );
            }
            Effect::AdvanceDelivery {
                delivery_id,
                from,
                to,
            } => {
                let delivery = self
                    .deliveries
                    .get_mut(&delivery_id)
                    .filter(|d| d.status == from)
                    .ok_or_else(|| conflict(format!("delivery {delivery_id} is no longer {from}")))?;
                delivery.status = to;
                delivery.updated_at = now;
            }
            Effect::RecordPayment(new) => {
                if let Some(gid) = &new.gateway_payment_id {
                    if self.has_gateway_id(gid) {
                        return Err(conflict(format!("gateway payment {gid} already recorded")));
                    }
                }
                if new.status.is_open()
                    && self.payments.iter().any(|p| {
                        p.order_id == new.order_id
                            && p.payment_type == new.payment_type
                            && p.status.is_open()
                    })
                {
                    return Err(conflict(format!(
                        "order {} already has an open {} payment",
                        new.order_id, new.payment_type
                    )));
                }
                self.payments.push(Payment {
                    id: new.id,
                    order_id: new.order_id,
                    paid_by: new.paid_by,
                    paid_to: new.paid_to,
                    payment_type: new.payment_type,
                    amount: new.amount,
                    percentage: new.percentage,
                    status: new.status,
                    gateway_order_id: new.gateway_order_id,
                    gateway_payment_id: new.gateway_payment_id,
                    created_at: now,
                    updated_at: now,
                });
            }
            Effect::UpdatePayment {
                payment_id,
                from,
                to,
                gateway_payment_id,
            } => {
                if let Some(gid) = &gateway_payment_id {
                    if self
                        .payments
                        .iter()
                        .any(|p| p.id != payment_id && p.gateway_payment_id.as_deref() == Some(gid))
                    {
                        return Err(conflict(format!("gateway payment {gid} already recorded")));
                    }
                }
                let payment = self
                    .payments
                    .iter_mut()
                    .find(|p| p.id == payment_id && p.status == from)
                    .ok_or_else(|| conflict(format!("payment {payment_id} is no longer {from}")))?;
                payment.status = to;
                if gateway_payment_id.is_some() {
                    payment.gateway_payment_id = gateway_payment_id;
                }
                payment.updated_at = now;
            }
        }
        Ok(())
    }

    fn order_mut(&mut self, order_id: Uuid) -> Result<&mut Order, DomainError> {
        self.orders
            .get_mut(&order_id)
            .ok_or_else(|| DomainError::NotFound(format!("order {order_id}")))
    }

    fn has_gateway_id(&self, gateway_payment_id: &str) -> bool {
        self.payments
            .iter()
            .any(|p| p.gateway_payment_id.as_deref() == Some(gateway_payment_id))
    }
}

impl MarketplaceStore for MemoryStore {
    fn insert_crop(&self, crop: NewCrop, event: OutboxMessage) -> Result<Crop, DomainError> {
        let mut state = self.lock()?;
        if state.crops.contains_key(&crop.id) {
            return Err(conflict(format!("crop {} already exists", crop.id)));
        }
        let now = Utc::now();
        let stored = Crop {
            id: crop.id,
            farmer_id: crop.farmer_id,
            name: crop.name,
            unit: crop.unit,
            quantity: crop.quantity,
            reserved_quantity: 0,
            price_per_unit: crop.price_per_unit,
            created_at: now,
            updated_at: now,
        };
        state.crops.insert(stored.id, stored.clone());
        state.outbox.push(event);
        Ok(stored)
    }

    fn find_crop(&self, id: Uuid) -> Result<Option<Crop>, DomainError> {
        Ok(self.lock()?.crops.get(&id).cloned())
    }

    fn place_order(&self, order: NewOrder, event: OutboxMessage) -> Result<Order, DomainError> {
        let mut state = self.lock()?;
        let now = Utc::now();

        let crop = state.crop_mut(order.crop_id)?;
        if crop.available_quantity() < order.quantity {
            return Err(conflict(format!(
                "crop {} has {} available, {} requested",
                crop.id,
                crop.available_quantity(),
                order.quantity
            )));
        }
        crop.reserved_quantity += order.quantity;
        crop.updated_at = now;

        let stored = Order {
            id: order.id,
            crop_id: order.crop_id,
            farmer_id: order.farmer_id,
            trader_id: order.trader_id,
            transport_id: None,
            quantity: order.quantity,
            price_per_unit: order.price_per_unit,
            total_price: order.total_price,
            delivery_address: order.delivery_address,
            expected_delivery_date: order.expected_delivery_date,
            payment_method: order.payment_method,
            payment_status: PaymentStatus::Pending,
            order_status: OrderStatus::Pending,
            notes: order.notes,
            rejection_reason: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        };
        state.orders.insert(stored.id, stored.clone());
        state.outbox.push(event);
        Ok(stored)
    }

    fn find_order(&self, id: Uuid) -> Result<Option<Order>, DomainError> {
        Ok(self.lock()?.orders.get(&id).cloned())
    }

    fn list_orders(
        &self,
        filter: &OrderFilter,
        page: i64,
        limit: i64,
    ) -> Result<ListResult, DomainError> {
        let state = self.lock()?;
        let mut matching: Vec<Order> = state
            .orders
            .values()
            .filter(|o| filter.participant.map_or(true, |u| o.is_party(u)))
            .filter(|o| filter.status.map_or(true, |s| o.order_status == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as i64;
        let offset = usize::try_from(page_offset(page, limit)).unwrap_or(usize::MAX);
        let items = matching
            .into_iter()
            .skip(offset)
            .take(limit.max(0) as usize)
            .collect();
        Ok(ListResult { items, total })
    }

    fn apply(&self, transition: Transition) -> Result<Order, DomainError> {
        let mut state = self.lock()?;
        let mut draft = state.clone();
        let now = Utc::now();
        let order_id = transition.order_id;

        let order = draft.order_mut(order_id)?;
        if order.order_status != transition.expected {
            return Err(conflict(format!(
                "order {order_id} is {}, expected {}",
                order.order_status, transition.expected
            )));
        }
        if transition.next != transition.expected {
            order.order_status = transition.next;
            order.updated_at = now;
        }

        for effect in transition.effects {
            draft.apply_effect(order_id, effect, now)?;
        }
        draft.outbox.extend(transition.events);

        let updated = draft.order_mut(order_id)?.clone();
        *state = draft;
        Ok(updated)
    }

    fn find_agreement(&self, order_id: Uuid) -> Result<Option<Agreement>, DomainError> {
        Ok(self.lock()?.agreements.get(&order_id).cloned())
    }

    fn find_payment_by_gateway_id(
        &self,
        gateway_payment_id: &str,
    ) -> Result<Option<Payment>, DomainError> {
        Ok(self
            .lock()?
            .payments
            .iter()
            .find(|p| p.gateway_payment_id.as_deref() == Some(gateway_payment_id))
            .cloned())
    }

    fn list_payments(&self, order_id: Uuid) -> Result<Vec<Payment>, DomainError> {
        Ok(self
            .lock()?
            .payments
            .iter()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect())
    }

    fn find_delivery(&self, id: Uuid) -> Result<Option<Delivery>, DomainError> {
        Ok(self.lock()?.deliveries.get(&id).cloned())
    }

    fn find_delivery_for_order(&self, order_id: Uuid) -> Result<Option<Delivery>, DomainError> {
        Ok(self
            .lock()?
            .deliveries
            .values()
            .find(|d| d.order_id == order_id)
            .cloned())
    }

    fn vehicle_has_active_delivery(&self, vehicle_number: &str) -> Result<bool, DomainError> {
        Ok(self
            .lock()?
            .deliveries
            .values()
            .any(|d| d.is_active() && d.vehicle_number == vehicle_number))
    }

    fn transporter_has_active_delivery(&self, transporter_id: Uuid) -> Result<bool, DomainError> {
        Ok(self
            .lock()?
            .deliveries
            .values()
            .any(|d| d.is_active() && d.transport_user_id == transporter_id))
    }

    fn append_location(&self, update: NewLocationUpdate) -> Result<LocationUpdate, DomainError> {
        let stored = LocationUpdate {
            id: update.id,
            delivery_id: update.delivery_id,
            order_id: update.order_id,
            transport_user_id: update.transport_user_id,
            latitude: update.latitude,
            longitude: update.longitude,
            accuracy: update.accuracy,
            heading: update.heading,
            speed: update.speed,
            status: update.status,
            recorded_at: update.recorded_at,
        };
        self.lock()?.locations.push(stored.clone());
        Ok(stored)
    }

    fn recent_locations(
        &self,
        scope: LocationScope,
        limit: i64,
    ) -> Result<Vec<LocationUpdate>, DomainError> {
        let state = self.lock()?;
        let mut matching: Vec<LocationUpdate> = state
            .locations
            .iter()
            .filter(|l| match scope {
                LocationScope::Order(id) => l.order_id == id,
                LocationScope::Transporter(id) => l.transport_user_id == id,
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        matching.truncate(limit.max(0) as usize);
        Ok(matching)
    }

    fn purge_locations_before(&self, cutoff: DateTime<Utc>) -> Result<usize, DomainError> {
        let mut state = self.lock()?;
        let before = state.locations.len();
        state.locations.retain(|l| l.recorded_at >= cutoff);
        Ok(before - state.locations.len())
    }
}

#[cfg(test)]
mod tests {
    use bigdecimal::BigDecimal;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::MemoryStore;
    use crate::domain::agreement::TraderAgreement;
    use crate::domain::crop::NewCrop;
    use crate::domain::delivery::NewDelivery;
    use crate::domain::errors::DomainError;
    use crate::domain::events::OutboxMessage;
    use crate::domain::location::{LocationScope, NewLocationUpdate};
    use crate::domain::order::{NewOrder, Order, OrderEvent, OrderStatus};
    use crate::domain::ports::{Effect, MarketplaceStore, Transition};

    fn seed(store: &MemoryStore, quantity: i32) -> Uuid {
        let crop = NewCrop {
            id: Uuid::new_v4(),
            farmer_id: Uuid::new_v4(),
            name: "Wheat".to_string(),
            unit: "kg".to_string(),
            quantity,
            price_per_unit: BigDecimal::from(10),
        };
        let event = OutboxMessage::crop_listed(&crop);
        store.insert_crop(crop, event).unwrap().id
    }

    fn place(store: &MemoryStore, crop_id: Uuid, quantity: i32) -> Result<Order, DomainError> {
        let crop = store.find_crop(crop_id).unwrap().unwrap();
        let order = NewOrder {
            id: Uuid::new_v4(),
            crop_id,
            farmer_id: crop.farmer_id,
            trader_id: Uuid::new_v4(),
            quantity,
            price_per_unit: crop.price_per_unit.clone(),
            total_price: crop.price_per_unit * BigDecimal::from(quantity),
            delivery_address: "Market yard 4".to_string(),
            expected_delivery_date: None,
            payment_method: "online".to_string(),
            notes: None,
        };
        let event = OutboxMessage::order_created(&order);
        store.place_order(order, event)
    }

    #[test]
    fn oversell_is_a_conflict() {
        let store = MemoryStore::new();
        let crop_id = seed(&store, 100);
        place(&store, crop_id, 70).unwrap();

        assert!(matches!(place(&store, crop_id, 31), Err(DomainError::Conflict(_))));
        assert_eq!(store.find_crop(crop_id).unwrap().unwrap().reserved_quantity, 70);
    }

    #[test]
    fn stale_expected_status_changes_nothing() {
        let store = MemoryStore::new();
        let crop_id = seed(&store, 10);
        let order = place(&store, crop_id, 5).unwrap();
        let outbox_before = store.outbox().len();

        let stale = Transition::new(order.id, OrderStatus::BothAgreed, OrderStatus::Cancelled)
            .with(Effect::ReleaseReservation {
                crop_id,
                quantity: 5,
            })
            .emit(OutboxMessage::status_changed(
                order.id,
                OrderStatus::BothAgreed,
                OrderStatus::Cancelled,
                OrderEvent::Cancel,
                None,
            ));
        assert!(matches!(store.apply(stale), Err(DomainError::Conflict(_))));

        assert_eq!(
            store.find_order(order.id).unwrap().unwrap().order_status,
            OrderStatus::Pending
        );
        assert_eq!(store.find_crop(crop_id).unwrap().unwrap().reserved_quantity, 5);
        assert_eq!(store.outbox().len(), outbox_before);
    }

    #[test]
    fn failing_effect_rolls_back_the_status() {
        let store = MemoryStore::new();
        let crop_id = seed(&store, 10);
        let order = place(&store, crop_id, 5).unwrap();

        let forged = Transition::new(order.id, OrderStatus::Pending, OrderStatus::BothAgreed).with(
            Effect::RecordTraderSignature(TraderAgreement {
                digital_signature: "T. Rader".to_string(),
                signed_at: Utc::now(),
            }),
        );
        assert!(matches!(store.apply(forged), Err(DomainError::Conflict(_))));
        assert_eq!(
            store.find_order(order.id).unwrap().unwrap().order_status,
            OrderStatus::Pending
        );
        assert!(store.find_agreement(order.id).unwrap().is_none());
    }

    #[test]
    fn hold_keeps_status_and_timestamp() {
        let store = MemoryStore::new();
        let crop_id = seed(&store, 10);
        let order = place(&store, crop_id, 5).unwrap();

        let held = store
            .apply(Transition::new(order.id, OrderStatus::Pending, OrderStatus::Pending))
            .unwrap();
        assert_eq!(held.order_status, OrderStatus::Pending);
        assert_eq!(held.updated_at, order.updated_at);
    }

    #[test]
    fn transporter_holds_one_active_delivery() {
        let store = MemoryStore::new();
        let crop_id = seed(&store, 10);
        let first = place(&store, crop_id, 2).unwrap();
        let second = place(&store, crop_id, 2).unwrap();
        let transporter = Uuid::new_v4();
        let assign = |order: &Order, vehicle: &str| {
            Transition::new(order.id, OrderStatus::Pending, OrderStatus::Pending).with(
                Effect::AssignDelivery(NewDelivery {
                    id: Uuid::new_v4(),
                    order_id: order.id,
                    transport_user_id: transporter,
                    vehicle_type: "truck".to_string(),
                    vehicle_number: vehicle.to_string(),
                    delivery_fee: BigDecimal::from(150),
                }),
            )
        };

        store.apply(assign(&first, "KA01")).unwrap();
        assert!(store.transporter_has_active_delivery(transporter).unwrap());
        assert!(!store.transporter_has_active_delivery(Uuid::new_v4()).unwrap());
        assert!(matches!(
            store.apply(assign(&second, "KA02")),
            Err(DomainError::Conflict(_))
        ));
        assert!(store.find_delivery_for_order(second.id).unwrap().is_none());
    }

    #[test]
    fn purge_drops_only_old_locations() {
        let store = MemoryStore::new();
        let order_id = Uuid::new_v4();
        let location = |age: Duration| NewLocationUpdate {
            id: Uuid::new_v4(),
            delivery_id: Uuid::new_v4(),
            order_id,
            transport_user_id: Uuid::new_v4(),
            latitude: 18.5,
            longitude: 73.8,
            accuracy: None,
            heading: None,
            speed: None,
            status: None,
            recorded_at: Utc::now() - age,
        };
        store.append_location(location(Duration::hours(200))).unwrap();
        store.append_location(location(Duration::hours(1))).unwrap();

        let purged = store
            .purge_locations_before(Utc::now() - Duration::hours(168))
            .unwrap();
        assert_eq!(purged, 1);
        assert_eq!(
            store
                .recent_locations(LocationScope::Order(order_id), 10)
                .unwrap()
                .len(),
            1
        );
    }
}
