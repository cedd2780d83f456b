use chrono::Utc;
use uuid::Uuid;

use crate::domain::agreement::{Agreement, FarmerAgreement, FarmerSignInput, TraderAgreement};
use crate::domain::errors::DomainError;
use crate::domain::events::OutboxMessage;
use crate::domain::order::{Order, OrderEvent};
use crate::domain::ports::{Effect, MarketplaceStore};

use super::order_service::{cancel_order, require_farmer, require_trader};
use super::{begin, commit, load_order, require_text};

/// Two-party signing handshake that gates every payment. The farmer signs
/// first with a quality commitment, then the trader countersigns.
#[derive(Clone)]
pub struct AgreementService<S> {
    store: S,
}

/// Signing failures are reported as `InvalidState`, with the transition
/// table's explanation kept in the message.
fn as_invalid_state(err: DomainError) -> DomainError {
    match err {
        DomainError::InvalidTransition { .. } => DomainError::InvalidState(err.to_string()),
        other => other,
    }
}

impl<S: MarketplaceStore> AgreementService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn farmer_sign(
        &self,
        order_id: Uuid,
        signer_id: Uuid,
        input: FarmerSignInput,
    ) -> Result<Agreement, DomainError> {
        require_text("qualityCommitment", &input.quality_commitment)?;
        require_text("qualityGrade", &input.quality_grade)?;
        require_text("digitalSignature", &input.digital_signature)?;

        let order = load_order(&self.store, order_id)?;
        require_farmer(&order, signer_id)?;

        if let Some(existing) = self.store.find_agreement(order_id)? {
            if existing.farmer_agreement.is_some() {
                return Err(DomainError::InvalidState(format!(
                    "farmer has already signed the agreement for order {order_id}"
                )));
            }
        }

        let transition = begin(&order, OrderEvent::FarmerSign, Some(signer_id))
            .map_err(as_invalid_state)?
            .with(Effect::RecordFarmerSignature(FarmerAgreement {
                quality_commitment: input.quality_commitment.trim().to_string(),
                quality_grade: input.quality_grade.trim().to_string(),
                quality_description: input.quality_description,
                digital_signature: input.digital_signature.trim().to_string(),
                signed_at: Utc::now(),
            }))
            .emit(OutboxMessage::agreement_updated(
                order_id,
                "farmer-signed",
                signer_id,
            ));
        commit(&self.store, transition)?;

        self.get_agreement_record(order_id)
    }

    pub fn trader_sign(
        &self,
        order_id: Uuid,
        signer_id: Uuid,
        digital_signature: String,
    ) -> Result<Agreement, DomainError> {
        require_text("digitalSignature", &digital_signature)?;

        let order = load_order(&self.store, order_id)?;
        require_trader(&order, signer_id)?;

        match self.store.find_agreement(order_id)? {
            Some(a) if a.farmer_agreement.is_none() || a.is_void() => {
                return Err(DomainError::InvalidState(format!(
                    "agreement for order {order_id} is not open for the trader"
                )));
            }
            Some(a) if a.trader_agreement.is_some() => {
                return Err(DomainError::InvalidState(format!(
                    "trader has already signed the agreement for order {order_id}"
                )));
            }
            Some(_) => {}
            None => {
                return Err(DomainError::InvalidState(format!(
                    "farmer must sign the agreement for order {order_id} first"
                )));
            }
        }

        let transition = begin(&order, OrderEvent::TraderSign, Some(signer_id))
            .map_err(as_invalid_state)?
            .with(Effect::RecordTraderSignature(TraderAgreement {
                digital_signature: digital_signature.trim().to_string(),
                signed_at: Utc::now(),
            }))
            .emit(OutboxMessage::agreement_updated(
                order_id,
                "trader-signed",
                signer_id,
            ));
        commit(&self.store, transition)?;

        self.get_agreement_record(order_id)
    }

    pub fn cancel(&self, order_id: Uuid, signer_id: Uuid, reason: &str) -> Result<Order, DomainError> {
        cancel_order(&self.store, order_id, signer_id, reason)
    }

    /// Agreement for an order the viewer is a party to.
    pub fn get_agreement(&self, order_id: Uuid, viewer_id: Uuid) -> Result<Agreement, DomainError> {
        let order = load_order(&self.store, order_id)?;
        if !order.is_party(viewer_id) {
            return Err(DomainError::Unauthorized(format!(
                "not a party to order {order_id}"
            )));
        }
        self.get_agreement_record(order_id)
    }

    fn get_agreement_record(&self, order_id: Uuid) -> Result<Agreement, DomainError> {
        self.store
            .find_agreement(order_id)?
            .ok_or_else(|| DomainError::NotFound(format!("agreement for order {order_id}")))
    }
}
