use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

/// Lifecycle state of an order. Persisted as the display string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    #[serde(rename = "Farmer Agreed")]
    FarmerAgreed,
    #[serde(rename = "Both Agreed")]
    BothAgreed,
    #[serde(rename = "Advance Paid")]
    AdvancePaid,
    /// Legacy status kept for records created before agreements existed.
    /// Nothing transitions into it; the farmer may still mark it ready.
    Accepted,
    #[serde(rename = "Ready for Pickup")]
    ReadyForPickup,
    #[serde(rename = "Transport Assigned")]
    TransportAssigned,
    #[serde(rename = "In Transit")]
    InTransit,
    Delivered,
    #[serde(rename = "Awaiting Final Payment")]
    AwaitingFinalPayment,
    Completed,
    Rejected,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 13] = [
        OrderStatus::Pending,
        OrderStatus::FarmerAgreed,
        OrderStatus::BothAgreed,
        OrderStatus::AdvancePaid,
        OrderStatus::Accepted,
        OrderStatus::ReadyForPickup,
        OrderStatus::TransportAssigned,
        OrderStatus::InTransit,
        OrderStatus::Delivered,
        OrderStatus::AwaitingFinalPayment,
        OrderStatus::Completed,
        OrderStatus::Rejected,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::FarmerAgreed => "Farmer Agreed",
            OrderStatus::BothAgreed => "Both Agreed",
            OrderStatus::AdvancePaid => "Advance Paid",
            OrderStatus::Accepted => "Accepted",
            OrderStatus::ReadyForPickup => "Ready for Pickup",
            OrderStatus::TransportAssigned => "Transport Assigned",
            OrderStatus::InTransit => "In Transit",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::AwaitingFinalPayment => "Awaiting Final Payment",
            OrderStatus::Completed => "Completed",
            OrderStatus::Rejected => "Rejected",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Rejected | OrderStatus::Cancelled
        )
    }

    /// Statuses before any money has moved; cancellation is only possible here.
    pub fn is_pre_payment(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::FarmerAgreed | OrderStatus::BothAgreed
        )
    }

    /// Events the transition table accepts from this status.
    pub fn allowed_events(&self) -> Vec<OrderEvent> {
        OrderEvent::ALL
            .into_iter()
            .filter(|event| next_status(*self, *event).is_ok())
            .collect()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::Internal(format!("unknown order status '{s}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    #[serde(rename = "Advance Paid")]
    AdvancePaid,
    #[serde(rename = "Full Paid")]
    FullPaid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::AdvancePaid => "Advance Paid",
            PaymentStatus::FullPaid => "Full Paid",
            PaymentStatus::Failed => "Failed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(PaymentStatus::Pending),
            "Advance Paid" => Ok(PaymentStatus::AdvancePaid),
            "Full Paid" => Ok(PaymentStatus::FullPaid),
            "Failed" => Ok(PaymentStatus::Failed),
            other => Err(DomainError::Internal(format!(
                "unknown payment status '{other}'"
            ))),
        }
    }
}

/// Something that happened to an order and may move it to another status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderEvent {
    FarmerSign,
    FarmerReject,
    TraderSign,
    AdvancePaymentCompleted,
    MarkReady,
    TransportAccept,
    DeliveryInTransit,
    DeliveryDelivered,
    FinalPaymentInitiated,
    FinalPaymentCompleted,
    Cancel,
}

impl OrderEvent {
    pub const ALL: [OrderEvent; 11] = [
        OrderEvent::FarmerSign,
        OrderEvent::FarmerReject,
        OrderEvent::TraderSign,
        OrderEvent::AdvancePaymentCompleted,
        OrderEvent::MarkReady,
        OrderEvent::TransportAccept,
        OrderEvent::DeliveryInTransit,
        OrderEvent::DeliveryDelivered,
        OrderEvent::FinalPaymentInitiated,
        OrderEvent::FinalPaymentCompleted,
        OrderEvent::Cancel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderEvent::FarmerSign => "farmer-sign",
            OrderEvent::FarmerReject => "farmer-reject",
            OrderEvent::TraderSign => "trader-sign",
            OrderEvent::AdvancePaymentCompleted => "advance-payment-completed",
            OrderEvent::MarkReady => "mark-ready",
            OrderEvent::TransportAccept => "transport-accept",
            OrderEvent::DeliveryInTransit => "delivery-in-transit",
            OrderEvent::DeliveryDelivered => "delivery-delivered",
            OrderEvent::FinalPaymentInitiated => "final-payment-initiated",
            OrderEvent::FinalPaymentCompleted => "final-payment-completed",
            OrderEvent::Cancel => "cancel",
        }
    }
}

impl fmt::Display for OrderEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The order transition table. Every status change in the system goes
/// through here; anything not listed is an `InvalidTransition`.
pub fn next_status(current: OrderStatus, event: OrderEvent) -> Result<OrderStatus, DomainError> {
    use OrderEvent as E;
    use OrderStatus as S;

    if current.is_terminal() {
        return Err(DomainError::invalid_transition(current, event));
    }

    let next = match (current, event) {
        (S::Pending, E::FarmerSign) => S::FarmerAgreed,
        (S::Pending, E::FarmerReject) => S::Rejected,
        (S::FarmerAgreed, E::TraderSign) => S::BothAgreed,
        (S::BothAgreed, E::AdvancePaymentCompleted) => S::AdvancePaid,
        (S::AdvancePaid | S::Accepted, E::MarkReady) => S::ReadyForPickup,
        (S::ReadyForPickup, E::TransportAccept) => S::TransportAssigned,
        (S::TransportAssigned, E::DeliveryInTransit) => S::InTransit,
        (S::InTransit, E::DeliveryDelivered) => S::Delivered,
        (S::Delivered, E::FinalPaymentInitiated) => S::AwaitingFinalPayment,
        (S::Delivered | S::AwaitingFinalPayment, E::FinalPaymentCompleted) => S::Completed,
        (S::Pending | S::FarmerAgreed | S::BothAgreed, E::Cancel) => S::Cancelled,
        _ => return Err(DomainError::invalid_transition(current, event)),
    };
    Ok(next)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
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
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    pub notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_party(&self, user_id: Uuid) -> bool {
        self.farmer_id == user_id || self.trader_id == user_id || self.transport_id == Some(user_id)
    }
}

/// A fully priced order ready to be stored; the reservation against the
/// crop happens in the same write.
#[derive(Debug, Clone)]
pub struct NewOrder {
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
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PlaceOrderInput {
    pub crop_id: Uuid,
    pub quantity: i32,
    pub delivery_address: String,
    pub expected_delivery_date: Option<NaiveDate>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub participant: Option<Uuid>,
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Clone)]
pub struct ListResult {
    pub items: Vec<Order>,
    pub total: i64,
}

/// Rows to skip for a 1-based page. Saturates instead of overflowing, so an
/// absurd page number is simply past the end.
pub fn page_offset(page: i64, limit: i64) -> i64 {
    page.max(1).saturating_sub(1).saturating_mul(limit.max(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_offset_saturates() {
        assert_eq!(page_offset(1, 20), 0);
        assert_eq!(page_offset(3, 20), 40);
        assert_eq!(page_offset(0, 20), 0);
        assert_eq!(page_offset(i64::MAX, 100), i64::MAX);
    }

    #[test]
    fn happy_path_walks_the_table() {
        let steps = [
            (OrderEvent::FarmerSign, OrderStatus::FarmerAgreed),
            (OrderEvent::TraderSign, OrderStatus::BothAgreed),
            (OrderEvent::AdvancePaymentCompleted, OrderStatus::AdvancePaid),
            (OrderEvent::MarkReady, OrderStatus::ReadyForPickup),
            (OrderEvent::TransportAccept, OrderStatus::TransportAssigned),
            (OrderEvent::DeliveryInTransit, OrderStatus::InTransit),
            (OrderEvent::DeliveryDelivered, OrderStatus::Delivered),
            (OrderEvent::FinalPaymentInitiated, OrderStatus::AwaitingFinalPayment),
            (OrderEvent::FinalPaymentCompleted, OrderStatus::Completed),
        ];
        let mut status = OrderStatus::Pending;
        for (event, expected) in steps {
            status = next_status(status, event).expect("transition in table");
            assert_eq!(status, expected);
        }
    }

    #[test]
    fn terminal_statuses_accept_nothing() {
        for status in [
            OrderStatus::Completed,
            OrderStatus::Rejected,
            OrderStatus::Cancelled,
        ] {
            assert!(status.allowed_events().is_empty(), "{status} should be terminal");
            for event in OrderEvent::ALL {
                assert!(matches!(
                    next_status(status, event),
                    Err(DomainError::InvalidTransition { .. })
                ));
            }
        }
    }

    #[test]
    fn cancel_only_before_payment() {
        for status in OrderStatus::ALL {
            let result = next_status(status, OrderEvent::Cancel);
            assert_eq!(result.is_ok(), status.is_pre_payment(), "{status}");
        }
    }

    #[test]
    fn invalid_transition_names_current_state_and_event() {
        let err = next_status(OrderStatus::Pending, OrderEvent::TraderSign).unwrap_err();
        match &err {
            DomainError::InvalidTransition { current, attempted } => {
                assert_eq!(current, "Pending");
                assert_eq!(attempted, "trader-sign");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(err.to_string(), "Cannot trader-sign while order is Pending");
    }

    #[test]
    fn final_payment_can_complete_straight_from_delivered() {
        assert_eq!(
            next_status(OrderStatus::Delivered, OrderEvent::FinalPaymentCompleted).unwrap(),
            OrderStatus::Completed
        );
    }

    #[test]
    fn legacy_accepted_can_be_marked_ready() {
        assert_eq!(
            OrderStatus::Accepted.allowed_events(),
            vec![OrderEvent::MarkReady]
        );
    }

    #[test]
    fn no_event_leads_back_to_pending() {
        for status in OrderStatus::ALL {
            for event in OrderEvent::ALL {
                if let Ok(next) = next_status(status, event) {
                    assert_ne!(next, OrderStatus::Pending);
                    assert_ne!(next, status, "{status} re-entered via {event}");
                }
            }
        }
    }

    #[test]
    fn status_strings_parse_back() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!(matches!(
            "Shipped".parse::<OrderStatus>(),
            Err(DomainError::Internal(_))
        ));
        assert!("Paid".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn serde_uses_display_names() {
        let json = serde_json::to_string(&OrderStatus::ReadyForPickup).unwrap();
        assert_eq!(json, "\"Ready for Pickup\"");
        let json = serde_json::to_string(&OrderEvent::AdvancePaymentCompleted).unwrap();
        assert_eq!(json, "\"advance-payment-completed\"");
    }
}
