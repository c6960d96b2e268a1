use serde::Serialize;

use super::capacity::CapacityMetrics;
use super::types::{CostsInput, clamp_or, non_negative_or};

pub const DEFAULT_CURRENCY_SYMBOL: &str = "€";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostMetrics {
    /// Manual effective tax rate as a fraction.
    pub tax_rate: f64,
    pub fixed_costs: f64,
    pub variable_cost_per_day: f64,
    pub annual_variable_costs: f64,
    pub vat_rate: f64,
    /// Price buffer as a fraction, applied on top of base prices.
    pub buffer: f64,
    pub currency_symbol: String,
}

pub fn derive_costs(costs: &CostsInput, capacity: &CapacityMetrics) -> CostMetrics {
    let variable_cost_per_day = non_negative_or(costs.variable_cost_per_day, 0.0);
    let currency_symbol = costs
        .currency_symbol
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_CURRENCY_SYMBOL)
        .to_string();

    CostMetrics {
        tax_rate: clamp_or(costs.tax_rate_percent, 0.0, 0.0, 100.0) / 100.0,
        fixed_costs: non_negative_or(costs.fixed_costs, 0.0),
        variable_cost_per_day,
        annual_variable_costs: variable_cost_per_day * capacity.billable_days_after_travel,
        vat_rate: clamp_or(costs.vat_rate_percent, 0.0, 0.0, 100.0) / 100.0,
        buffer: clamp_or(costs.buffer_percent, 0.0, 0.0, 100.0) / 100.0,
        currency_symbol,
    }
}
