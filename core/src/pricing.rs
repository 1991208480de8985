use crate::material::{MaterialId, MaterialRecord};
use serde::{Deserialize, Serialize};

/// (minimum days, discount) from highest threshold down. Only the first match applies.
const DURATION_TIERS: &[(u32, f64)] = &[(90, 0.20), (30, 0.10), (7, 0.05)];
/// (minimum units, discount), same single-tier rule.
const QUANTITY_TIERS: &[(u32, f64)] = &[(100, 0.15), (50, 0.10), (20, 0.05)];
/// Ceiling on duration + quantity discount.
pub const MAX_TOTAL_DISCOUNT: f64 = 0.30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingQuote {
    pub material_id: MaterialId,
    pub material_name: String,
    pub base_price_per_day: f64,
    pub discounted_price_per_day: f64,
    pub duration_discount_percent: f64,
    pub quantity_discount_percent: f64,
    pub total_discount_percent: f64,
    pub quantity: u32,
    pub lease_duration_days: u32,
    pub total_cost: f64,
    pub savings: f64,
}

fn tier_discount(tiers: &[(u32, f64)], value: u32) -> f64 {
    tiers
        .iter()
        .find(|(min, _)| value >= *min)
        .map(|(_, d)| *d)
        .unwrap_or(0.0)
}

pub fn duration_discount(lease_duration_days: u32) -> f64 {
    tier_discount(DURATION_TIERS, lease_duration_days)
}

pub fn quantity_discount(quantity: u32) -> f64 {
    tier_discount(QUANTITY_TIERS, quantity)
}

/// Best tier on each axis, summed, then capped.
pub fn total_discount(lease_duration_days: u32, quantity: u32) -> f64 {
    (duration_discount(lease_duration_days) + quantity_discount(quantity)).min(MAX_TOTAL_DISCOUNT)
}

/// Round to `places` decimals, exact halves to even.
fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round_ties_even() / factor
}

/// Quote a lease of `quantity` units for `lease_duration_days`. Arithmetic is
/// done unrounded; money is rounded to cents and percentages to one decimal.
pub fn quote(material: &MaterialRecord, lease_duration_days: u32, quantity: u32) -> PricingQuote {
    let base = material.price_per_day;
    let duration = duration_discount(lease_duration_days);
    let qty = quantity_discount(quantity);
    let total = (duration + qty).min(MAX_TOTAL_DISCOUNT);
    let discounted = base * (1.0 - total);
    let units = quantity as f64 * lease_duration_days as f64;

    PricingQuote {
        material_id: material.id,
        material_name: material.name.clone(),
        base_price_per_day: base,
        discounted_price_per_day: round_to(discounted, 2),
        duration_discount_percent: round_to(duration * 100.0, 1),
        quantity_discount_percent: round_to(qty * 100.0, 1),
        total_discount_percent: round_to(total * 100.0, 1),
        quantity,
        lease_duration_days,
        total_cost: round_to(discounted * units, 2),
        savings: round_to((base - discounted) * units, 2),
    }
}
