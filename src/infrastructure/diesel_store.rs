use chrono::{DateTime, Utc};
use diesel::pg::{Pg, PgConnection};
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use uuid::Uuid;

use crate::db::DbPool;
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
use crate::schema::{
    agreements, crops, deliveries, farmconnect_outbox, location_updates, orders, payments,
};

use super::models::{
    AgreementRow, CropRow, DeliveryRow, LocationUpdateRow, NewAgreementRow, NewCropRow,
    NewDeliveryRow, NewOrderRow, NewOutboxEventRow, NewPaymentRow, OrderRow, PaymentRow,
};

const ACTIVE_DELIVERY_STATUSES: [&str; 3] = ["Assigned", "Picked Up", "In Transit"];

// ── Error conversions (infrastructure concern only) ──────────────────────────

impl From<diesel::result::Error> for DomainError {
    fn from(e: diesel::result::Error) -> Self {
        match e {
            diesel::result::Error::NotFound => DomainError::NotFound("record".to_string()),
            diesel::result::Error::DatabaseError(
                DatabaseErrorKind::UniqueViolation | DatabaseErrorKind::CheckViolation,
                info,
            ) => DomainError::Conflict(info.message().to_string()),
            other => DomainError::Internal(other.to_string()),
        }
    }
}

impl From<r2d2::Error> for DomainError {
    fn from(e: r2d2::Error) -> Self {
        DomainError::Internal(e.to_string())
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn write_outbox(conn: &mut PgConnection, events: Vec<OutboxMessage>) -> Result<(), DomainError> {
    if events.is_empty() {
        return Ok(());
    }
    let rows: Vec<NewOutboxEventRow> = events
        .into_iter()
        .map(|e| NewOutboxEventRow {
            id: Uuid::new_v4(),
            aggregate_type: e.aggregate_type.to_string(),
            aggregate_id: e.aggregate_id,
            event_type: e.event_type.to_string(),
            payload: e.payload,
        })
        .collect();
    diesel::insert_into(farmconnect_outbox::table)
        .values(&rows)
        .execute(conn)?;
    Ok(())
}

fn load_order(conn: &mut PgConnection, id: Uuid) -> Result<Option<Order>, DomainError> {
    orders::table
        .find(id)
        .select(OrderRow::as_select())
        .first(conn)
        .optional()?
        .map(Order::try_from)
        .transpose()
}

fn filtered_orders(filter: &OrderFilter) -> orders::BoxedQuery<'static, Pg> {
    let mut query = orders::table.into_boxed();
    if let Some(user) = filter.participant {
        query = query.filter(
            orders::farmer_id
                .eq(user)
                .or(orders::trader_id.eq(user))
                .or(orders::transport_id.assume_not_null().eq(user)),
        );
    }
    if let Some(status) = filter.status {
        query = query.filter(orders::order_status.eq(status.as_str()));
    }
    query
}

fn apply_effect(
    conn: &mut PgConnection,
    order_id: Uuid,
    effect: Effect,
    now: DateTime<Utc>,
) -> Result<(), DomainError> {
    match effect {
        Effect::SetPaymentStatus(status) => {
            diesel::update(orders::table.find(order_id))
                .set(orders::payment_status.eq(status.as_str()))
                .execute(conn)?;
        }
        Effect::SetRejectionReason(reason) => {
            diesel::update(orders::table.find(order_id))
                .set(orders::rejection_reason.eq(Some(reason)))
                .execute(conn)?;
        }
        Effect::SetCancellationReason(reason) => {
            diesel::update(orders::table.find(order_id))
                .set(orders::cancellation_reason.eq(Some(reason)))
                .execute(conn)?;
        }
        Effect::ReleaseReservation { crop_id, quantity } => {
            let updated = diesel::update(
                crops::table
                    .find(crop_id)
                    .filter(crops::reserved_quantity.ge(quantity)),
            )
            .set((
                crops::reserved_quantity.eq(crops::reserved_quantity - quantity),
                crops::updated_at.eq(now),
            ))
            .execute(conn)?;
            if updated == 0 {
                return Err(DomainError::Internal(format!(
                    "crop {crop_id} cannot release {quantity} reserved units"
                )));
            }
        }
        Effect::ConsumeReservation { crop_id, quantity } => {
            let updated = diesel::update(
                crops::table
                    .find(crop_id)
                    .filter(crops::reserved_quantity.ge(quantity)),
            )
            .set((
                crops::quantity.eq(crops::quantity - quantity),
                crops::reserved_quantity.eq(crops::reserved_quantity - quantity),
                crops::updated_at.eq(now),
            ))
            .execute(conn)?;
            if updated == 0 {
                return Err(DomainError::Internal(format!(
                    "crop {crop_id} cannot consume {quantity} reserved units"
                )));
            }
        }
        Effect::RecordFarmerSignature(farmer) => {
            diesel::insert_into(agreements::table)
                .values(&NewAgreementRow {
                    order_id,
                    quality_commitment: Some(farmer.quality_commitment),
                    quality_grade: Some(farmer.quality_grade),
                    quality_description: farmer.quality_description,
                    farmer_signature: Some(farmer.digital_signature),
                    farmer_signed_at: Some(farmer.signed_at),
                })
                .execute(conn)?;
        }
        Effect::RecordTraderSignature(trader) => {
            let updated = diesel::update(
                agreements::table
                    .find(order_id)
                    .filter(agreements::farmer_signed_at.is_not_null())
                    .filter(agreements::trader_signed_at.is_null()),
            )
            .set((
                agreements::trader_signature.eq(Some(trader.digital_signature)),
                agreements::trader_signed_at.eq(Some(trader.signed_at)),
            ))
            .execute(conn)?;
            if updated == 0 {
                return Err(DomainError::Conflict(format!(
                    "agreement for order {order_id} is not awaiting the trader"
                )));
            }
        }
        Effect::VoidAgreement { reason, at } => {
            diesel::update(
                agreements::table
                    .find(order_id)
                    .filter(agreements::voided_at.is_null()),
            )
            .set((
                agreements::voided_at.eq(Some(at)),
                agreements::void_reason.eq(Some(reason)),
            ))
            .execute(conn)?;
        }
        Effect::AssignDelivery(new) => {
            diesel::insert_into(deliveries::table)
                .values(&NewDeliveryRow {
                    id: new.id,
                    order_id: new.order_id,
                    transport_user_id: new.transport_user_id,
                    vehicle_type: new.vehicle_type,
                    vehicle_number: new.vehicle_number,
                    delivery_fee: new.delivery_fee,
                    status: DeliveryStatus::Assigned.as_str().to_string(),
                })
                .execute(conn)?;
            diesel::update(orders::table.find(order_id))
                .set(orders::transport_id.eq(Some(new.transport_user_id)))
                .execute(conn)?;
        }
        Effect::AdvanceDelivery {
            delivery_id,
            from,
            to,
        } => {
            let updated = diesel::update(
                deliveries::table
                    .find(delivery_id)
                    .filter(deliveries::status.eq(from.as_str())),
            )
            .set((
                deliveries::status.eq(to.as_str()),
                deliveries::updated_at.eq(now),
            ))
            .execute(conn)?;
            if updated == 0 {
                return Err(DomainError::Conflict(format!(
                    "delivery {delivery_id} is no longer {from}"
                )));
            }
        }
        Effect::RecordPayment(new) => {
            diesel::insert_into(payments::table)
                .values(&NewPaymentRow {
                    id: new.id,
                    order_id: new.order_id,
                    paid_by: new.paid_by,
                    paid_to: new.paid_to,
                    payment_type: new.payment_type.as_str().to_string(),
                    amount: new.amount,
                    percentage: new.percentage,
                    status: new.status.as_str().to_string(),
                    gateway_order_id: new.gateway_order_id,
                    gateway_payment_id: new.gateway_payment_id,
                })
                .execute(conn)?;
        }
        Effect::UpdatePayment {
            payment_id,
            from,
            to,
            gateway_payment_id,
        } => {
            let target = payments::table
                .find(payment_id)
                .filter(payments::status.eq(from.as_str()));
            let updated = match gateway_payment_id {
                Some(gid) => diesel::update(target)
                    .set((
                        payments::status.eq(to.as_str()),
                        payments::gateway_payment_id.eq(Some(gid)),
                        payments::updated_at.eq(now),
                    ))
                    .execute(conn)?,
                None => diesel::update(target)
                    .set((
                        payments::status.eq(to.as_str()),
                        payments::updated_at.eq(now),
                    ))
                    .execute(conn)?,
            };
            if updated == 0 {
                return Err(DomainError::Conflict(format!(
                    "payment {payment_id} is no longer {from}"
                )));
            }
        }
    }
    Ok(())
}

// ── Store ────────────────────────────────────────────────────────────────────

pub struct DieselStore {
    pool: DbPool,
}

impl DieselStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl MarketplaceStore for DieselStore {
    fn insert_crop(&self, crop: NewCrop, event: OutboxMessage) -> Result<Crop, DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            let row = diesel::insert_into(crops::table)
                .values(&NewCropRow {
                    id: crop.id,
                    farmer_id: crop.farmer_id,
                    name: crop.name,
                    unit: crop.unit,
                    quantity: crop.quantity,
                    reserved_quantity: 0,
                    price_per_unit: crop.price_per_unit,
                })
                .returning(CropRow::as_returning())
                .get_result(conn)?;
            write_outbox(conn, vec![event])?;
            Ok(row.into())
        })
    }

    fn find_crop(&self, id: Uuid) -> Result<Option<Crop>, DomainError> {
        let mut conn = self.pool.get()?;

        let row = crops::table
            .find(id)
            .select(CropRow::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(row.map(Crop::from))
    }

    fn place_order(&self, order: NewOrder, event: OutboxMessage) -> Result<Order, DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            // 1. Reserve stock; the WHERE clause is the availability guard.
            let reserved = diesel::update(
                crops::table
                    .find(order.crop_id)
                    .filter(crops::quantity.ge(crops::reserved_quantity + order.quantity)),
            )
            .set((
                crops::reserved_quantity.eq(crops::reserved_quantity + order.quantity),
                crops::updated_at.eq(Utc::now()),
            ))
            .execute(conn)?;
            if reserved == 0 {
                return Err(DomainError::Conflict(format!(
                    "crop {} no longer has {} units available",
                    order.crop_id, order.quantity
                )));
            }

            // 2. Insert the order
            let row = diesel::insert_into(orders::table)
                .values(&NewOrderRow {
                    id: order.id,
                    crop_id: order.crop_id,
                    farmer_id: order.farmer_id,
                    trader_id: order.trader_id,
                    quantity: order.quantity,
                    price_per_unit: order.price_per_unit,
                    total_price: order.total_price,
                    delivery_address: order.delivery_address,
                    expected_delivery_date: order.expected_delivery_date,
                    payment_method: order.payment_method,
                    payment_status: PaymentStatus::Pending.as_str().to_string(),
                    order_status: OrderStatus::Pending.as_str().to_string(),
                    notes: order.notes,
                })
                .returning(OrderRow::as_returning())
                .get_result(conn)?;

            // 3. Outbox event in the same transaction.
            write_outbox(conn, vec![event])?;

            Order::try_from(row)
        })
    }

    fn find_order(&self, id: Uuid) -> Result<Option<Order>, DomainError> {
        let mut conn = self.pool.get()?;
        load_order(&mut conn, id)
    }

    fn list_orders(
        &self,
        filter: &OrderFilter,
        page: i64,
        limit: i64,
    ) -> Result<ListResult, DomainError> {
        let mut conn = self.pool.get()?;

        let offset = page_offset(page, limit);
        conn.transaction::<_, DomainError, _>(|conn| {
            let total: i64 = filtered_orders(filter).count().get_result(conn)?;

            let rows = filtered_orders(filter)
                .select(OrderRow::as_select())
                .order(orders::created_at.desc())
                .limit(limit)
                .offset(offset)
                .load(conn)?;

            Ok(ListResult {
                items: rows
                    .into_iter()
                    .map(Order::try_from)
                    .collect::<Result<_, _>>()?,
                total,
            })
        })
    }

    fn apply(&self, transition: Transition) -> Result<Order, DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            let now = Utc::now();
            let order_id = transition.order_id;

            // a hold still takes the row lock, it just leaves updated_at alone
            let target = orders::table
                .find(order_id)
                .filter(orders::order_status.eq(transition.expected.as_str()));
            let swapped = if transition.next == transition.expected {
                diesel::update(target)
                    .set(orders::order_status.eq(transition.next.as_str()))
                    .execute(conn)?
            } else {
                diesel::update(target)
                    .set((
                        orders::order_status.eq(transition.next.as_str()),
                        orders::updated_at.eq(now),
                    ))
                    .execute(conn)?
            };

            if swapped == 0 {
                return Err(match load_order(conn, order_id)? {
                    None => DomainError::NotFound(format!("order {order_id}")),
                    Some(current) => DomainError::Conflict(format!(
                        "order {order_id} is {}, expected {}",
                        current.order_status, transition.expected
                    )),
                });
            }

            for effect in transition.effects {
                apply_effect(conn, order_id, effect, now)?;
            }
            write_outbox(conn, transition.events)?;

            load_order(conn, order_id)?
                .ok_or_else(|| DomainError::NotFound(format!("order {order_id}")))
        })
    }

    fn find_agreement(&self, order_id: Uuid) -> Result<Option<Agreement>, DomainError> {
        let mut conn = self.pool.get()?;

        let row = agreements::table
            .find(order_id)
            .select(AgreementRow::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(row.map(Agreement::from))
    }

    fn find_payment_by_gateway_id(
        &self,
        gateway_payment_id: &str,
    ) -> Result<Option<Payment>, DomainError> {
        let mut conn = self.pool.get()?;

        payments::table
            .filter(payments::gateway_payment_id.eq(gateway_payment_id))
            .select(PaymentRow::as_select())
            .first(&mut conn)
            .optional()?
            .map(Payment::try_from)
            .transpose()
    }

    fn list_payments(&self, order_id: Uuid) -> Result<Vec<Payment>, DomainError> {
        let mut conn = self.pool.get()?;

        payments::table
            .filter(payments::order_id.eq(order_id))
            .select(PaymentRow::as_select())
            .order(payments::created_at.asc())
            .load(&mut conn)?
            .into_iter()
            .map(Payment::try_from)
            .collect()
    }

    fn find_delivery(&self, id: Uuid) -> Result<Option<Delivery>, DomainError> {
        let mut conn = self.pool.get()?;

        deliveries::table
            .find(id)
            .select(DeliveryRow::as_select())
            .first(&mut conn)
            .optional()?
            .map(Delivery::try_from)
            .transpose()
    }

    fn find_delivery_for_order(&self, order_id: Uuid) -> Result<Option<Delivery>, DomainError> {
        let mut conn = self.pool.get()?;

        deliveries::table
            .filter(deliveries::order_id.eq(order_id))
            .select(DeliveryRow::as_select())
            .first(&mut conn)
            .optional()?
            .map(Delivery::try_from)
            .transpose()
    }

    fn vehicle_has_active_delivery(&self, vehicle_number: &str) -> Result<bool, DomainError> {
        let mut conn = self.pool.get()?;

        let active = diesel::select(diesel::dsl::exists(
            deliveries::table
                .filter(deliveries::vehicle_number.eq(vehicle_number))
                .filter(deliveries::status.eq_any(ACTIVE_DELIVERY_STATUSES)),
        ))
        .get_result::<bool>(&mut conn)?;
        Ok(active)
    }

    fn transporter_has_active_delivery(&self, transporter_id: Uuid) -> Result<bool, DomainError> {
        let mut conn = self.pool.get()?;

        let active = diesel::select(diesel::dsl::exists(
            deliveries::table
                .filter(deliveries::transport_user_id.eq(transporter_id))
                .filter(deliveries::status.eq_any(ACTIVE_DELIVERY_STATUSES)),
        ))
        .get_result::<bool>(&mut conn)?;
        Ok(active)
    }

    fn append_location(&self, update: NewLocationUpdate) -> Result<LocationUpdate, DomainError> {
        let mut conn = self.pool.get()?;

        let row = diesel::insert_into(location_updates::table)
            .values(&LocationUpdateRow {
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
            })
            .returning(LocationUpdateRow::as_returning())
            .get_result(&mut conn)?;
        Ok(row.into())
    }

    fn recent_locations(
        &self,
        scope: LocationScope,
        limit: i64,
    ) -> Result<Vec<LocationUpdate>, DomainError> {
        let mut conn = self.pool.get()?;

        let mut query = location_updates::table.into_boxed();
        query = match scope {
            LocationScope::Order(id) => query.filter(location_updates::order_id.eq(id)),
            LocationScope::Transporter(id) => {
                query.filter(location_updates::transport_user_id.eq(id))
            }
        };
        let rows = query
            .select(LocationUpdateRow::as_select())
            .order(location_updates::recorded_at.desc())
            .limit(limit)
            .load(&mut conn)?;
        Ok(rows.into_iter().map(LocationUpdate::from).collect())
    }

    fn purge_locations_before(&self, cutoff: DateTime<Utc>) -> Result<usize, DomainError> {
        let mut conn = self.pool.get()?;

        let deleted = diesel::delete(
            location_updates::table.filter(location_updates::recorded_at.lt(cutoff)),
        )
        .execute(&mut conn)?;
        Ok(deleted)
    }
}
