use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

pub const ADVANCE_PERCENTAGE: i32 = 30;
pub const FINAL_PERCENTAGE: i32 = 70;
pub const TRANSPORT_PERCENTAGE: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Advance,
    Final,
    Transport,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Advance => "advance",
            PaymentType::Final => "final",
            PaymentType::Transport => "transport",
        }
    }

    pub fn percentage(&self) -> i32 {
        match self {
            PaymentType::Advance => ADVANCE_PERCENTAGE,
            PaymentType::Final => FINAL_PERCENTAGE,
            PaymentType::Transport => TRANSPORT_PERCENTAGE,
        }
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "advance" => Ok(PaymentType::Advance),
            "final" => Ok(PaymentType::Final),
            "transport" => Ok(PaymentType::Transport),
            other => Err(DomainError::Internal(format!("unknown payment type '{other}'"))),
        }
    }
}

/// Status of an individual payment record (as opposed to the order-level
/// `PaymentStatus` summary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentRecordStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
}

impl PaymentRecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentRecordStatus::Pending => "pending",
            PaymentRecordStatus::Processing => "processing",
            PaymentRecordStatus::Completed => "completed",
            PaymentRecordStatus::Failed => "failed",
            PaymentRecordStatus::Refunded => "refunded",
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(
            self,
            PaymentRecordStatus::Pending | PaymentRecordStatus::Processing
        )
    }
}

impl fmt::Display for PaymentRecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentRecordStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentRecordStatus::Pending),
            "processing" => Ok(PaymentRecordStatus::Processing),
            "completed" => Ok(PaymentRecordStatus::Completed),
            "failed" => Ok(PaymentRecordStatus::Failed),
            "refunded" => Ok(PaymentRecordStatus::Refunded),
            other => Err(DomainError::Internal(format!(
                "unknown payment record status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub paid_by: Uuid,
    pub paid_to: Uuid,
    #[serde(rename = "type")]
    pub payment_type: PaymentType,
    pub amount: BigDecimal,
    pub percentage: i32,
    pub status: PaymentRecordStatus,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub paid_by: Uuid,
    pub paid_to: Uuid,
    pub payment_type: PaymentType,
    pub amount: BigDecimal,
    pub percentage: i32,
    pub status: PaymentRecordStatus,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
}

/// Advance share of an order total: 30%, rounded half-up to whole units.
pub fn advance_amount(total_price: &BigDecimal) -> BigDecimal {
    let raw = total_price * BigDecimal::new(ADVANCE_PERCENTAGE.into(), 2);
    round_half_up(&raw)
}

/// What is left to pay once `advance_paid` has been settled.
pub fn final_amount(total_price: &BigDecimal, advance_paid: &BigDecimal) -> BigDecimal {
    total_price - advance_paid
}

fn round_half_up(value: &BigDecimal) -> BigDecimal {
    // amounts are never negative, so truncating after adding a half rounds up
    (value + BigDecimal::new(5.into(), 1)).with_scale(0)
}

/// Callback status reported by the payment gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayStatus {
    Processing,
    Completed,
    Failed,
}

impl GatewayStatus {
    /// Payment record status this callback settles the payment into.
    pub fn record_status(&self) -> PaymentRecordStatus {
        match self {
            GatewayStatus::Processing => PaymentRecordStatus::Processing,
            GatewayStatus::Completed => PaymentRecordStatus::Completed,
            GatewayStatus::Failed => PaymentRecordStatus::Failed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayEvent {
    pub order_id: Uuid,
    pub payment_type: PaymentType,
    pub status: GatewayStatus,
    pub gateway_payment_id: String,
    pub amount: Option<BigDecimal>,
}

#[derive(Debug, Clone)]
pub enum WebhookOutcome {
    Applied(Payment),
    Duplicate(Payment),
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn advance_is_thirty_percent() {
        assert_eq!(advance_amount(&dec("1000")), dec("300"));
        assert_eq!(advance_amount(&dec("1000.00")), dec("300"));
    }

    #[test]
    fn advance_rounds_half_up() {
        // 30% of 1005 is 301.5
        assert_eq!(advance_amount(&dec("1005")), dec("302"));
        // 30% of 1001 is 300.3
        assert_eq!(advance_amount(&dec("1001")), dec("300"));
    }

    #[test]
    fn advance_and_final_sum_to_total() {
        for total in ["1000", "1005", "999.99", "7"] {
            let total = dec(total);
            let advance = advance_amount(&total);
            assert_eq!(&advance + final_amount(&total, &advance), total);
        }
    }

    #[test]
    fn only_pending_and_processing_are_open() {
        assert!(PaymentRecordStatus::Pending.is_open());
        assert!(PaymentRecordStatus::Processing.is_open());
        assert!(!PaymentRecordStatus::Completed.is_open());
        assert!(!PaymentRecordStatus::Failed.is_open());
        assert!(!PaymentRecordStatus::Refunded.is_open());
    }

    #[test]
    fn payment_type_percentages() {
        assert_eq!(PaymentType::Advance.percentage(), 30);
        assert_eq!(PaymentType::Final.percentage(), 70);
        assert_eq!(PaymentType::Transport.percentage(), 100);
        assert_eq!("final".parse::<PaymentType>().unwrap(), PaymentType::Final);
    }
}
