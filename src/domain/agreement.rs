use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmerAgreement {
    pub quality_commitment: String,
    pub quality_grade: String,
    pub quality_description: Option<String>,
    pub digital_signature: String,
    pub signed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraderAgreement {
    pub digital_signature: String,
    pub signed_at: DateTime<Utc>,
}

/// Paired farmer and trader commitment for one order.
///
/// The record only exists once the farmer has signed. Signatures are plain
/// typed attestations; they are never overwritten, and a cancelled order
/// keeps its agreement with `voided_at` set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Agreement {
    pub order_id: Uuid,
    pub farmer_agreement: Option<FarmerAgreement>,
    pub trader_agreement: Option<TraderAgreement>,
    pub voided_at: Option<DateTime<Utc>>,
    pub void_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Agreement {
    pub fn is_fully_signed(&self) -> bool {
        self.farmer_agreement.is_some() && self.trader_agreement.is_some()
    }

    pub fn is_void(&self) -> bool {
        self.voided_at.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct FarmerSignInput {
    pub quality_commitment: String,
    pub quality_grade: String,
    pub quality_description: Option<String>,
    pub digital_signature: String,
}
