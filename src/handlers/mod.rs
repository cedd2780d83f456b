pub mod agreements;
pub mod crops;
pub mod health;
pub mod orders;
pub mod payments;
pub mod transport;

use std::str::FromStr;

use bigdecimal::BigDecimal;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::errors::AppError;

/// Body shared by reject and cancel.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReasonRequest {
    pub reason: String,
}

/// Money travels as decimal strings, e.g. "12.50".
pub(crate) fn parse_money(field: &str, value: &str) -> Result<BigDecimal, AppError> {
    BigDecimal::from_str(value.trim())
        .map_err(|_| AppError::Validation(format!("{field} '{value}' is not a decimal amount")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_strings() {
        assert_eq!(parse_money("price", " 12.50 ").unwrap(), BigDecimal::from_str("12.5").unwrap());
        assert!(matches!(
            parse_money("price", "twelve"),
            Err(AppError::Validation(_))
        ));
    }
}
