//! A basic price calculator.
//!
//! Every line item is priced on its own and the results are summed:
//!
//! 1. The line amount is `price × quantity`.
//! 2. A valid coupon that applies to the item's product type takes its percentage off the line amount.
//! 3. The tax rate is the item's own `vat` if it has one, otherwise the first tax rule matching the destination country
//!    and product type.
//! 4. If shop prices already include taxes, the tax is carved out of the discounted amount and the subtotal is reduced
//!    by the same amount. Otherwise the tax is added on top.
//!
//! All divisions round half up. The result always satisfies `total == subtotal + taxes - discount`.
use chrono::{DateTime, Utc};
use log::*;

use crate::{
    db_types::{Coupon, LineItem, MinorUnits, Price, PriceSettings},
    traits::PricingError,
};

pub fn calculate(
    settings: &PriceSettings,
    coupon: Option<&Coupon>,
    country: &str,
    currency: &str,
    items: &[LineItem],
    now: DateTime<Utc>,
) -> Result<Price, PricingError> {
    trace!("🏷️ Pricing {} line items in {currency} for delivery to '{country}'", items.len());
    let coupon = coupon.filter(|c| {
        let valid = c.is_valid_at(now);
        if !valid {
            debug!("🏷️ Coupon {} is not valid at {now}. Ignoring it.", c.code);
        }
        valid
    });
    let mut subtotal = 0i128;
    let mut taxes = 0i128;
    let mut discount = 0i128;
    for item in items {
        if item.price.is_negative() {
            return Err(PricingError::Calculation(format!("{} has a negative price", item.sku)));
        }
        let line = i128::from(item.price.value()) * i128::from(item.quantity);
        let item_discount = coupon
            .filter(|c| c.applies_to(&item.product_type))
            .map(|c| div_round(line * i128::from(c.percentage.min(100)), 100))
            .unwrap_or_default();
        let discounted = line - item_discount;
        let rate = i128::from(tax_rate(settings, country, item));
        let (item_subtotal, item_tax) = if settings.prices_include_taxes {
            let tax = div_round(discounted * rate, 100 + rate);
            (line - tax, tax)
        } else {
            (line, div_round(discounted * rate, 100))
        };
        subtotal += item_subtotal;
        taxes += item_tax;
        discount += item_discount;
    }
    let total = subtotal + taxes - discount;
    Ok(Price {
        subtotal: to_minor(subtotal)?,
        taxes: to_minor(taxes)?,
        discount: to_minor(discount)?,
        total: to_minor(total)?,
    })
}

fn tax_rate(settings: &PriceSettings, country: &str, item: &LineItem) -> u32 {
    if item.vat > 0 {
        return item.vat;
    }
    settings.taxes.iter().find(|rule| rule.matches(country, &item.product_type)).map(|rule| rule.percentage).unwrap_or(0)
}

/// `num / den`, rounded half up. Both arguments are non-negative.
fn div_round(num: i128, den: i128) -> i128 {
    (2 * num + den) / (2 * den)
}

fn to_minor(value: i128) -> Result<MinorUnits, PricingError> {
    i64::try_from(value)
        .map(MinorUnits::from)
        .map_err(|_| PricingError::Calculation(format!("{value} is out of range for an amount of money")))
}
