use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;
use super::order::OrderEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryStatus {
    Assigned,
    #[serde(rename = "Picked Up")]
    PickedUp,
    #[serde(rename = "In Transit")]
    InTransit,
    Delivered,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Assigned => "Assigned",
            DeliveryStatus::PickedUp => "Picked Up",
            DeliveryStatus::InTransit => "In Transit",
            DeliveryStatus::Delivered => "Delivered",
            DeliveryStatus::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Failed)
    }

    /// Order event this delivery status is mirrored as, if any.
    pub fn order_event(&self) -> Option<OrderEvent> {
        match self {
            DeliveryStatus::InTransit => Some(OrderEvent::DeliveryInTransit),
            DeliveryStatus::Delivered => Some(OrderEvent::DeliveryDelivered),
            _ => None,
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Assigned" => Ok(DeliveryStatus::Assigned),
            "Picked Up" => Ok(DeliveryStatus::PickedUp),
            "In Transit" => Ok(DeliveryStatus::InTransit),
            "Delivered" => Ok(DeliveryStatus::Delivered),
            "Failed" => Ok(DeliveryStatus::Failed),
            other => Err(DomainError::Internal(format!(
                "unknown delivery status '{other}'"
            ))),
        }
    }
}

/// Forward-only, one step at a time; `Failed` is reachable from any
/// non-terminal status.
pub fn next_delivery_status(
    current: DeliveryStatus,
    requested: DeliveryStatus,
) -> Result<DeliveryStatus, DomainError> {
    use DeliveryStatus as D;

    let allowed = match (current, requested) {
        (D::Assigned, D::PickedUp) | (D::PickedUp, D::InTransit) | (D::InTransit, D::Delivered) => {
            true
        }
        (from, D::Failed) => !from.is_terminal(),
        _ => false,
    };

    if allowed {
        Ok(requested)
    } else {
        Err(DomainError::InvalidTransition {
            current: format!("delivery {current}"),
            attempted: format!("move delivery to {requested}"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    pub id: Uuid,
    pub order_id: Uuid,
    pub transport_user_id: Uuid,
    pub vehicle_type: String,
    pub vehicle_number: String,
    pub delivery_fee: BigDecimal,
    pub status: DeliveryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Delivery {
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}

#[derive(Debug, Clone)]
pub struct NewDelivery {
    pub id: Uuid,
    pub order_id: Uuid,
    pub transport_user_id: Uuid,
    pub vehicle_type: String,
    pub vehicle_number: String,
    pub delivery_fee: BigDecimal,
}

#[derive(Debug, Clone)]
pub struct AcceptDeliveryInput {
    pub vehicle_type: String,
    pub vehicle_number: String,
    pub delivery_fee: BigDecimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progresses_one_step_at_a_time() {
        use DeliveryStatus as D;
        assert_eq!(next_delivery_status(D::Assigned, D::PickedUp).unwrap(), D::PickedUp);
        assert_eq!(next_delivery_status(D::PickedUp, D::InTransit).unwrap(), D::InTransit);
        assert_eq!(next_delivery_status(D::InTransit, D::Delivered).unwrap(), D::Delivered);
        assert!(next_delivery_status(D::Assigned, D::Delivered).is_err());
        assert!(next_delivery_status(D::InTransit, D::PickedUp).is_err());
        assert!(next_delivery_status(D::PickedUp, D::PickedUp).is_err());
    }

    #[test]
    fn failed_is_a_side_exit_from_active_states_only() {
        use DeliveryStatus as D;
        for from in [D::Assigned, D::PickedUp, D::InTransit] {
            assert_eq!(next_delivery_status(from, D::Failed).unwrap(), D::Failed);
        }
        assert!(next_delivery_status(D::Delivered, D::Failed).is_err());
        assert!(next_delivery_status(D::Failed, D::Failed).is_err());
    }

    #[test]
    fn only_transit_and_delivered_mirror_into_the_order() {
        assert_eq!(
            DeliveryStatus::InTransit.order_event(),
            Some(OrderEvent::DeliveryInTransit)
        );
        assert_eq!(
            DeliveryStatus::Delivered.order_event(),
            Some(OrderEvent::DeliveryDelivered)
        );
        assert_eq!(DeliveryStatus::PickedUp.order_event(), None);
        assert_eq!(DeliveryStatus::Failed.order_event(), None);
    }
}
