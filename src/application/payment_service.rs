use bigdecimal::BigDecimal;
use uuid::Uuid;

use crate::domain::delivery::DeliveryStatus;
use crate::domain::errors::DomainError;
use crate::domain::events::OutboxMessage;
use crate::domain::order::{Order, OrderEvent, OrderStatus, PaymentStatus};
use crate::domain::payment::{
    advance_amount, final_amount, GatewayEvent, GatewayStatus, NewPayment, Payment,
    PaymentRecordStatus, PaymentType, WebhookOutcome,
};
use crate::domain::ports::{Effect, MarketplaceStore, Transition};

use super::order_service::{completed_amount, require_trader};
use super::{begin, commit, hold, load_order, require_text};

/// Initiates checkouts and settles them from gateway callbacks. Callbacks
/// are deduplicated by gateway payment id so redelivery never applies a
/// transition twice.
#[derive(Clone)]
pub struct PaymentService<S> {
    store: S,
}

impl<S: MarketplaceStore> PaymentService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Opens a pending payment of `payment_type` for the order. An already
    /// open payment of that type is returned as is.
    pub fn initiate(
        &self,
        order_id: Uuid,
        trader_id: Uuid,
        payment_type: PaymentType,
    ) -> Result<Payment, DomainError> {
        let order = load_order(&self.store, order_id)?;
        require_trader(&order, trader_id)?;

        let payments = self.store.list_payments(order_id)?;
        if let Some(open) = open_payment(&payments, payment_type) {
            return Ok(open.clone());
        }
        if completed_amount(&payments, payment_type) > BigDecimal::from(0) {
            return Err(DomainError::InvalidState(format!(
                "{payment_type} payment for order {order_id} is already completed"
            )));
        }

        let (transition, amount, paid_to) = match payment_type {
            PaymentType::Advance => {
                if order.order_status != OrderStatus::BothAgreed {
                    return Err(DomainError::invalid_transition(
                        order.order_status,
                        "initiate advance payment",
                    ));
                }
                (
                    hold(&order, "initiate advance payment")?,
                    advance_amount(&order.total_price),
                    order.farmer_id,
                )
            }
            PaymentType::Final => {
                let advance_paid = completed_amount(&payments, PaymentType::Advance);
                if advance_paid == BigDecimal::from(0) {
                    return Err(DomainError::InvalidState(format!(
                        "order {order_id} has no completed advance payment"
                    )));
                }
                let transition = match order.order_status {
                    OrderStatus::Delivered => {
                        begin(&order, OrderEvent::FinalPaymentInitiated, Some(trader_id))?
                    }
                    OrderStatus::AwaitingFinalPayment => hold(&order, "initiate final payment")?,
                    current => {
                        return Err(DomainError::invalid_transition(
                            current,
                            "initiate final payment",
                        ))
                    }
                };
                (
                    transition,
                    final_amount(&order.total_price, &advance_paid),
                    order.farmer_id,
                )
            }
            PaymentType::Transport => {
                let delivery = self
                    .store
                    .find_delivery_for_order(order_id)?
                    .filter(|d| d.status == DeliveryStatus::Delivered)
                    .ok_or_else(|| {
                        DomainError::InvalidState(format!(
                            "order {order_id} has no completed delivery to pay for"
                        ))
                    })?;
                (
                    payment_hold(&order, payment_type, "initiate transport payment")?,
                    delivery.delivery_fee,
                    delivery.transport_user_id,
                )
            }
        };

        let payment_id = Uuid::new_v4();
        let new_payment = NewPayment {
            id: payment_id,
            order_id,
            paid_by: trader_id,
            paid_to,
            payment_type,
            amount,
            percentage: payment_type.percentage(),
            status: PaymentRecordStatus::Pending,
            gateway_order_id: Some(format!("gw_{}", payment_id.simple())),
            gateway_payment_id: None,
        };
        let transition = transition
            .with(Effect::RecordPayment(new_payment))
            .emit(OutboxMessage::payment_updated(
                order_id,
                payment_id,
                payment_type,
                PaymentRecordStatus::Pending,
            ));

        match commit(&self.store, transition) {
            Ok(_) => {
                log::info!("{payment_type} payment {payment_id} initiated for order {order_id}");
                self.find_payment(order_id, payment_id)
            }
            Err(DomainError::Conflict(msg)) => {
                // a concurrent initiation may have opened the same checkout
                let payments = self.store.list_payments(order_id)?;
                open_payment(&payments, payment_type)
                    .cloned()
                    .ok_or(DomainError::Conflict(msg))
            }
            Err(e) => Err(e),
        }
    }

    /// Applies a gateway callback. An event repeating the stored status of its
    /// gateway payment is acknowledged as a duplicate without touching
    /// anything; one that contradicts a settled payment is a `Conflict`.
    pub fn handle_gateway_event(&self, event: GatewayEvent) -> Result<WebhookOutcome, DomainError> {
        require_text("gatewayPaymentId", &event.gateway_payment_id)?;

        if let Some(duplicate) = self.settled_duplicate(&event)? {
            return Ok(WebhookOutcome::Duplicate(duplicate));
        }

        match self.apply_gateway_event(&event) {
            Ok(payment) => Ok(WebhookOutcome::Applied(payment)),
            // a concurrent delivery of the same event may have settled it first
            Err(e) => match self.settled_duplicate(&event)? {
                Some(duplicate) => Ok(WebhookOutcome::Duplicate(duplicate)),
                None => Err(e),
            },
        }
    }

    pub fn list_payments(&self, order_id: Uuid, viewer_id: Uuid) -> Result<Vec<Payment>, DomainError> {
        let order = load_order(&self.store, order_id)?;
        if !order.is_party(viewer_id) {
            return Err(DomainError::Unauthorized(format!(
                "not a party to order {order_id}"
            )));
        }
        self.store.list_payments(order_id)
    }

    fn settled_duplicate(&self, event: &GatewayEvent) -> Result<Option<Payment>, DomainError> {
        let Some(existing) = self
            .store
            .find_payment_by_gateway_id(&event.gateway_payment_id)?
        else {
            return Ok(None);
        };
        // a late progress report for a settled payment contradicts nothing
        let stale_progress =
            event.status == GatewayStatus::Processing && !existing.status.is_open();
        if existing.status != event.status.record_status() && !stale_progress {
            return Ok(None);
        }
        log::info!(
            "duplicate gateway event {} for payment {} ({})",
            event.gateway_payment_id,
            existing.id,
            existing.status
        );
        Ok(Some(existing))
    }

    fn apply_gateway_event(&self, event: &GatewayEvent) -> Result<Payment, DomainError> {
        let order = load_order(&self.store, event.order_id)?;
        let payments = self.store.list_payments(order.id)?;

        let target = match self
            .store
            .find_payment_by_gateway_id(&event.gateway_payment_id)?
        {
            Some(p) if p.order_id != order.id || p.payment_type != event.payment_type => {
                return Err(DomainError::Validation(format!(
                    "gateway payment {} belongs to a different checkout",
                    event.gateway_payment_id
                )));
            }
            Some(p) if !p.status.is_open() => {
                return Err(self.contradicts_settled(&order, &p, event));
            }
            Some(p) => Some(p),
            None => open_payment(&payments, event.payment_type).cloned(),
        };

        let (transition, settled) = match event.status {
            GatewayStatus::Processing => (
                payment_hold(&order, event.payment_type, "record a processing payment")?,
                PaymentRecordStatus::Processing,
            ),
            GatewayStatus::Failed => {
                let mut transition =
                    payment_hold(&order, event.payment_type, "record a failed payment")?;
                if at_paying_step(&order, event.payment_type) {
                    transition = transition.with(Effect::SetPaymentStatus(PaymentStatus::Failed));
                }
                log::warn!(
                    "{} payment for order {} failed at the gateway ({})",
                    event.payment_type,
                    order.id,
                    event.gateway_payment_id
                );
                (transition, PaymentRecordStatus::Failed)
            }
            GatewayStatus::Completed => {
                let expected = self.expected_amount(&order, &payments, target.as_ref(), event)?;
                if let Some(amount) = &event.amount {
                    if *amount != expected {
                        return Err(DomainError::Validation(format!(
                            "{} payment of {amount} does not match the expected {expected}",
                            event.payment_type
                        )));
                    }
                }
                (self.completion(&order, event.payment_type)?, PaymentRecordStatus::Completed)
            }
        };

        let payment_id = match &target {
            Some(p) => p.id,
            None => Uuid::new_v4(),
        };
        let effect = match target {
            Some(p) => Effect::UpdatePayment {
                payment_id: p.id,
                from: p.status,
                to: settled,
                gateway_payment_id: Some(event.gateway_payment_id.clone()),
            },
            None => Effect::RecordPayment(self.unsolicited(&order, event, payment_id, settled)?),
        };
        let transition = transition
            .with(effect)
            .emit(OutboxMessage::payment_updated(
                order.id,
                payment_id,
                event.payment_type,
                settled,
            ));
        commit(&self.store, transition)?;

        self.find_payment(order.id, payment_id)
    }

    /// Order transition a completed payment of `payment_type` drives.
    fn completion(&self, order: &Order, payment_type: PaymentType) -> Result<Transition, DomainError> {
        let transition = match payment_type {
            PaymentType::Advance => begin(order, OrderEvent::AdvancePaymentCompleted, None)?
                .with(Effect::SetPaymentStatus(PaymentStatus::AdvancePaid)),
            PaymentType::Final => begin(order, OrderEvent::FinalPaymentCompleted, None)?
                .with(Effect::SetPaymentStatus(PaymentStatus::FullPaid))
                .with(Effect::ConsumeReservation {
                    crop_id: order.crop_id,
                    quantity: order.quantity,
                }),
            PaymentType::Transport => payment_hold(order, payment_type, "settle transport payment")?,
        };
        Ok(transition)
    }

    /// Error for an event that contradicts a settled payment. Money captured
    /// against a checkout that was already failed (e.g. by cancellation) is
    /// marked `refunded` so it can be paid back.
    fn contradicts_settled(&self, order: &Order, payment: &Payment, event: &GatewayEvent) -> DomainError {
        if event.status == GatewayStatus::Completed && payment.status == PaymentRecordStatus::Failed {
            let transition = Transition::new(order.id, order.order_status, order.order_status)
                .with(Effect::UpdatePayment {
                    payment_id: payment.id,
                    from: PaymentRecordStatus::Failed,
                    to: PaymentRecordStatus::Refunded,
                    gateway_payment_id: None,
                })
                .emit(OutboxMessage::payment_updated(
                    order.id,
                    payment.id,
                    payment.payment_type,
                    PaymentRecordStatus::Refunded,
                ));
            match commit(&self.store, transition) {
                Ok(_) => log::warn!(
                    "gateway captured {} after payment {} failed; marked for refund",
                    event.gateway_payment_id,
                    payment.id
                ),
                Err(e) => log::error!("could not mark payment {} for refund: {e}", payment.id),
            }
        }
        DomainError::Conflict(format!(
            "gateway payment {} is {} but payment {} is {} and order {} is {}",
            event.gateway_payment_id,
            event.status.record_status(),
            payment.id,
            payment.status,
            order.id,
            order.order_status
        ))
    }

    fn expected_amount(
        &self,
        order: &Order,
        payments: &[Payment],
        target: Option<&Payment>,
        event: &GatewayEvent,
    ) -> Result<BigDecimal, DomainError> {
        let expected = match event.payment_type {
            PaymentType::Advance => advance_amount(&order.total_price),
            PaymentType::Final => final_amount(
                &order.total_price,
                &completed_amount(payments, PaymentType::Advance),
            ),
            PaymentType::Transport => match target {
                Some(p) => p.amount.clone(),
                None => self.transport_fee(order)?.0,
            },
        };
        Ok(expected)
    }

    fn transport_fee(&self, order: &Order) -> Result<(BigDecimal, Uuid), DomainError> {
        let delivery = self
            .store
            .find_delivery_for_order(order.id)?
            .ok_or_else(|| DomainError::NotFound(format!("delivery for order {}", order.id)))?;
        Ok((delivery.delivery_fee, delivery.transport_user_id))
    }

    /// Payment row for a callback that arrived without a matching checkout.
    fn unsolicited(
        &self,
        order: &Order,
        event: &GatewayEvent,
        payment_id: Uuid,
        status: PaymentRecordStatus,
    ) -> Result<NewPayment, DomainError> {
        let (amount, paid_to) = match event.payment_type {
            PaymentType::Advance => (advance_amount(&order.total_price), order.farmer_id),
            PaymentType::Final => (
                final_amount(
                    &order.total_price,
                    &completed_amount(&self.store.list_payments(order.id)?, PaymentType::Advance),
                ),
                order.farmer_id,
            ),
            PaymentType::Transport => self.transport_fee(order)?,
        };
        Ok(NewPayment {
            id: payment_id,
            order_id: order.id,
            paid_by: order.trader_id,
            paid_to,
            payment_type: event.payment_type,
            amount: event.amount.clone().unwrap_or(amount),
            percentage: event.payment_type.percentage(),
            status,
            gateway_order_id: None,
            gateway_payment_id: Some(event.gateway_payment_id.clone()),
        })
    }

    fn find_payment(&self, order_id: Uuid, payment_id: Uuid) -> Result<Payment, DomainError> {
        self.store
            .list_payments(order_id)?
            .into_iter()
            .find(|p| p.id == payment_id)
            .ok_or_else(|| DomainError::NotFound(format!("payment {payment_id}")))
    }
}

/// Guard for payment writes that leave the order status alone. Transport fees
/// may still settle on a completed order.
fn payment_hold(order: &Order, payment_type: PaymentType, action: &str) -> Result<Transition, DomainError> {
    if payment_type == PaymentType::Transport && order.order_status == OrderStatus::Completed {
        return Ok(Transition::new(order.id, OrderStatus::Completed, OrderStatus::Completed));
    }
    hold(order, action)
}

/// Whether the order is waiting on a payment of this type, so a failure of
/// it is the order's payment outcome.
fn at_paying_step(order: &Order, payment_type: PaymentType) -> bool {
    match payment_type {
        PaymentType::Advance => order.order_status == OrderStatus::BothAgreed,
        PaymentType::Final => matches!(
            order.order_status,
            OrderStatus::Delivered | OrderStatus::AwaitingFinalPayment
        ),
        PaymentType::Transport => false,
    }
}

fn open_payment(payments: &[Payment], payment_type: PaymentType) -> Option<&Payment> {
    payments
        .iter()
        .find(|p| p.payment_type == payment_type && p.status.is_open())
}
