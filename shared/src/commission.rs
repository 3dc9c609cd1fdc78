//! Seller commission calculation
//!
//! Sales totals and commissions are computed with `rust_decimal` so the same
//! item set and rate always produce the same amounts, digit for digit.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Decimal places stored for commission amounts: two for prices plus four for rates
pub const COMMISSION_SCALE: u32 = 6;

/// Rate applied when a seller has no commission rate on file (30%)
pub fn default_commission_rate() -> Decimal {
    Decimal::new(3, 1)
}

/// Totals for one settlement
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommissionSummary {
    pub items_sold: usize,
    pub total_sales: Decimal,
    pub commission_rate: Decimal,
    pub commission_amount: Decimal,
}

/// Computes sales totals and the seller's commission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommissionCalculator {
    fallback_rate: Decimal,
}

impl Default for CommissionCalculator {
    fn default() -> Self {
        Self::new(default_commission_rate())
    }
}

impl CommissionCalculator {
    pub fn new(fallback_rate: Decimal) -> Self {
        Self { fallback_rate }
    }

    pub fn fallback_rate(&self) -> Decimal {
        self.fallback_rate
    }

    /// The seller's own rate, or the fallback when none is set
    pub fn effective_rate(&self, seller_rate: Option<Decimal>) -> Decimal {
        seller_rate.unwrap_or(self.fallback_rate)
    }

    /// Sum unit prices of the sold items and apply the commission rate.
    ///
    /// Each suitcase item counts once at its unit price; quantity is not
    /// multiplied in.
    pub fn calculate<I>(&self, sold_prices: I, seller_rate: Option<Decimal>) -> CommissionSummary
    where
        I: IntoIterator<Item = Decimal>,
    {
        let (items_sold, total_sales) = sold_prices
            .into_iter()
            .fold((0usize, Decimal::ZERO), |(count, total), price| {
                (count + 1, total + price)
            });
        let commission_rate = self.effective_rate(seller_rate);

        CommissionSummary {
            items_sold,
            total_sales,
            commission_rate,
            commission_amount: total_sales * commission_rate,
        }
    }
}
