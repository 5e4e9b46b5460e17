//! Order pricing.
//!
//! Pricing is a pure function of the resolved line snapshots and a [`PricingConfig`]: the same
//! inputs always produce the same [`PricingBreakdown`], which is what makes a failed checkout
//! safe to retry. Line totals are exact integer cents; the only place rounding can occur is the
//! tax calculation, which rounds half-up to the nearest cent.

use std::{env, str::FromStr};

use commerce_common::{Money, MoneyConversionError};
use log::{info, warn};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::db_types::PricedLine;

pub const TAX_RATE_ENV: &str = "SOE_TAX_RATE";
pub const FREE_SHIPPING_LIMIT_ENV: &str = "SOE_FREE_SHIPPING_LIMIT";
pub const FLAT_SHIPPING_FEE_ENV: &str = "SOE_FLAT_SHIPPING_FEE";

//--------------------------------------   PricingConfig    ----------------------------------------------------------
/// The configuration inputs to the pricing engine. Tax rate and shipping rules are deployment
/// configuration, not business logic baked into the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Fractional tax rate applied to the order subtotal, e.g. 0.075 for 7.5%.
    pub tax_rate: Decimal,
    /// Orders with a subtotal at or above this amount ship free.
    pub free_shipping_threshold: Money,
    /// The flat fee charged on orders below the free-shipping threshold.
    pub flat_shipping_fee: Money,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(75, 3),
            free_shipping_threshold: Money::from_whole(500),
            flat_shipping_fee: Money::from_whole(20),
        }
    }
}

impl PricingConfig {
    pub fn new(tax_rate: Decimal, free_shipping_threshold: Money, flat_shipping_fee: Money) -> Self {
        Self { tax_rate, free_shipping_threshold, flat_shipping_fee }
    }

    /// Builds the configuration from `SOE_TAX_RATE`, `SOE_FREE_SHIPPING_LIMIT` and
    /// `SOE_FLAT_SHIPPING_FEE`, keeping the compiled default for any variable that is missing
    /// or unparseable.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        match env::var(TAX_RATE_ENV) {
            Ok(v) => match Decimal::from_str(v.trim()) {
                Ok(rate) => config.tax_rate = rate,
                Err(e) => warn!("{TAX_RATE_ENV} is set but invalid ({e}). Using the default."),
            },
            Err(_) => info!("{TAX_RATE_ENV} is not set. Using the default."),
        }
        match env::var(FREE_SHIPPING_LIMIT_ENV) {
            Ok(v) => match Money::from_str(&v) {
                Ok(limit) => config.free_shipping_threshold = limit,
                Err(e) => warn!("{FREE_SHIPPING_LIMIT_ENV} is set but invalid ({e}). Using the default."),
            },
            Err(_) => info!("{FREE_SHIPPING_LIMIT_ENV} is not set. Using the default."),
        }
        match env::var(FLAT_SHIPPING_FEE_ENV) {
            Ok(v) => match Money::from_str(&v) {
                Ok(fee) => config.flat_shipping_fee = fee,
                Err(e) => warn!("{FLAT_SHIPPING_FEE_ENV} is set but invalid ({e}). Using the default."),
            },
            Err(_) => info!("{FLAT_SHIPPING_FEE_ENV} is not set. Using the default."),
        }
        config
    }
}

//--------------------------------------  PricingBreakdown  ----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingBreakdown {
    pub sub_total: Money,
    pub tax_amount: Money,
    pub shipping_cost: Money,
    pub total_amount: Money,
}

/// Price a set of resolved order lines.
///
/// `sub_total` is the sum of the line totals. Tax is `sub_total * tax_rate`, rounded half-up to
/// the nearest cent. Shipping is the flat fee, or zero once the subtotal reaches the
/// free-shipping threshold. The grand total is the sum of the three.
pub fn price_lines(lines: &[PricedLine], config: &PricingConfig) -> Result<PricingBreakdown, MoneyConversionError> {
    let sub_total: Money = lines.iter().map(|l| l.line_total).sum();
    let tax_amount = tax_on(sub_total, config.tax_rate)?;
    let shipping_cost =
        if sub_total >= config.free_shipping_threshold { Money::default() } else { config.flat_shipping_fee };
    let total_amount = sub_total + tax_amount + shipping_cost;
    Ok(PricingBreakdown { sub_total, tax_amount, shipping_cost, total_amount })
}

fn tax_on(amount: Money, rate: Decimal) -> Result<Money, MoneyConversionError> {
    let tax = (amount.to_decimal() * rate).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    Money::try_from(tax)
}

#[cfg(test)]
mod test {
    use commerce_common::Money;
    use rust_decimal::Decimal;

    use super::*;
    use crate::db_types::PricedLine;

    fn line(product_id: i64, quantity: i64, unit_price_cents: i64) -> PricedLine {
        PricedLine {
            product_id,
            product_name: format!("product-{product_id}"),
            quantity,
            unit_price: Money::from_cents(unit_price_cents),
            line_total: Money::from_cents(unit_price_cents) * quantity,
        }
    }

    #[test]
    fn two_units_at_100_with_flat_shipping() {
        let config = PricingConfig::default();
        let breakdown = price_lines(&[line(1, 2, 10_000)], &config).unwrap();
        assert_eq!(breakdown.sub_total, Money::from_cents(20_000));
        assert_eq!(breakdown.tax_amount, Money::from_cents(1500));
        assert_eq!(breakdown.shipping_cost, Money::from_cents(2000));
        assert_eq!(breakdown.total_amount, Money::from_cents(23_500));
    }

    #[test]
    fn subtotal_at_threshold_ships_free() {
        let config = PricingConfig::default();
        let breakdown = price_lines(&[line(1, 6, 10_000)], &config).unwrap();
        assert_eq!(breakdown.sub_total, Money::from_cents(60_000));
        assert_eq!(breakdown.shipping_cost, Money::default());
        assert_eq!(breakdown.total_amount, breakdown.sub_total + breakdown.tax_amount);
    }

    #[test]
    fn tax_rounds_half_up() {
        // 7.5% of $0.30 is $0.0225, which rounds up to $0.03
        let config = PricingConfig::default();
        let breakdown = price_lines(&[line(1, 1, 30)], &config).unwrap();
        assert_eq!(breakdown.tax_amount, Money::from_cents(3));

        // 7.5% of $0.10 is $0.0075, which rounds up to $0.01
        let breakdown = price_lines(&[line(1, 1, 10)], &config).unwrap();
        assert_eq!(breakdown.tax_amount, Money::from_cents(1));
    }

    #[test]
    fn pricing_is_deterministic() {
        let config = PricingConfig::new(Decimal::new(15, 2), Money::from_whole(100), Money::from_whole(5));
        let lines = vec![line(1, 3, 3333), line(2, 1, 49_99)];
        let first = price_lines(&lines, &config).unwrap();
        let second = price_lines(&lines, &config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_line_set_prices_to_shipping_only() {
        // the checkout API rejects empty orders before pricing ever sees one
        let config = PricingConfig::default();
        let breakdown = price_lines(&[], &config).unwrap();
        assert_eq!(breakdown.sub_total, Money::default());
        assert_eq!(breakdown.tax_amount, Money::default());
        assert_eq!(breakdown.shipping_cost, config.flat_shipping_fee);
    }
}
