//! Validation utilities for the consignment settlement platform

use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Commission rates are fractions of the sales total
pub fn validate_commission_rate(rate: Decimal) -> Result<(), &'static str> {
    if rate < Decimal::ZERO {
        return Err("Commission rate cannot be negative");
    }
    if rate > Decimal::ONE {
        return Err("Commission rate must be a fraction between 0 and 1");
    }
    if rate.normalize().scale() > 4 {
        return Err("Commission rate supports at most 4 decimal places");
    }
    Ok(())
}

/// The next settlement cannot be scheduled before the current one
pub fn validate_settlement_dates(
    settlement_date: NaiveDate,
    next_settlement_date: Option<NaiveDate>,
) -> Result<(), &'static str> {
    match next_settlement_date {
        Some(next) if next < settlement_date => {
            Err("Next settlement date cannot be before the settlement date")
        }
        _ => Ok(()),
    }
}

/// Validate an optional date window used for listing
pub fn validate_date_window(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<(), &'static str> {
    match (from, to) {
        (Some(from), Some(to)) if from > to => Err("Start date must not be after end date"),
        _ => Ok(()),
    }
}

/// Payment methods accepted on point-of-sale notes
pub const PAYMENT_METHODS: &[&str] = &["dinheiro", "pix", "cartao_credito", "cartao_debito"];

/// Validate a point-of-sale payment method
pub fn validate_payment_method(method: &str) -> Result<(), &'static str> {
    if PAYMENT_METHODS.contains(&method) {
        Ok(())
    } else {
        Err("Unknown payment method")
    }
}
