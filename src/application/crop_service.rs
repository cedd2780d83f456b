use bigdecimal::BigDecimal;
use uuid::Uuid;

use crate::domain::crop::{Crop, NewCrop};
use crate::domain::errors::DomainError;
use crate::domain::events::OutboxMessage;
use crate::domain::ports::MarketplaceStore;

use super::require_text;

#[derive(Debug, Clone)]
pub struct ListCropInput {
    pub name: String,
    pub unit: String,
    pub quantity: i32,
    pub price_per_unit: BigDecimal,
}

#[derive(Clone)]
pub struct CropService<S> {
    store: S,
}

impl<S: MarketplaceStore> CropService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn list_crop(&self, farmer_id: Uuid, input: ListCropInput) -> Result<Crop, DomainError> {
        require_text("name", &input.name)?;
        require_text("unit", &input.unit)?;
        if input.quantity <= 0 {
            return Err(DomainError::Validation(
                "quantity must be positive".to_string(),
            ));
        }
        if input.price_per_unit < BigDecimal::from(0) {
            return Err(DomainError::Validation(
                "pricePerUnit must not be negative".to_string(),
            ));
        }

        let crop = NewCrop {
            id: Uuid::new_v4(),
            farmer_id,
            name: input.name.trim().to_string(),
            unit: input.unit.trim().to_string(),
            quantity: input.quantity,
            price_per_unit: input.price_per_unit,
        };
        let event = OutboxMessage::crop_listed(&crop);
        let crop = self.store.insert_crop(crop, event)?;
        log::info!("crop {} listed by farmer {}", crop.id, farmer_id);
        Ok(crop)
    }

    pub fn get_crop(&self, id: Uuid) -> Result<Crop, DomainError> {
        self.store
            .find_crop(id)?
            .ok_or_else(|| DomainError::NotFound(format!("crop {id}")))
    }
}
