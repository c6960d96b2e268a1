use serde::Serialize;

use super::capacity::{CapacityMetrics, MONTHS_PER_YEAR, WEEKS_PER_YEAR};
use super::types::{IncomeBasis, IncomeMode, IncomeTargetsInput, non_negative_or, ratio_or_zero};

/// Canonical annual target, re-expressed at every basis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeTargets {
    pub mode: IncomeMode,
    pub basis: IncomeBasis,
    pub target_annual: f64,
    pub year: f64,
    pub week: f64,
    pub month: f64,
    pub avg_week: f64,
    pub avg_month: f64,
}

/// Number of `basis` periods in a year. Average bases use the full calendar,
/// the others the active working calendar.
pub fn periods_per_year(basis: IncomeBasis, capacity: &CapacityMetrics) -> f64 {
    match basis {
        IncomeBasis::Year => 1.0,
        IncomeBasis::Week => capacity.working_weeks,
        IncomeBasis::Month => capacity.active_months,
        IncomeBasis::AvgWeek => WEEKS_PER_YEAR,
        IncomeBasis::AvgMonth => MONTHS_PER_YEAR,
    }
}

pub fn to_annual(value: f64, basis: IncomeBasis, capacity: &CapacityMetrics) -> f64 {
    let annual = value * periods_per_year(basis, capacity);
    if annual.is_finite() { annual.max(0.0) } else { 0.0 }
}

pub fn from_annual(annual: f64, basis: IncomeBasis, capacity: &CapacityMetrics) -> f64 {
    ratio_or_zero(annual, periods_per_year(basis, capacity))
}

pub fn resolve_income_targets(
    input: &IncomeTargetsInput,
    capacity: &CapacityMetrics,
) -> IncomeTargets {
    let entered = non_negative_or(input.value_at(input.basis), 0.0);
    let target_annual = to_annual(entered, input.basis, capacity);

    IncomeTargets {
        mode: input.mode,
        basis: input.basis,
        target_annual,
        year: target_annual,
        week: from_annual(target_annual, IncomeBasis::Week, capacity),
        month: from_annual(target_annual, IncomeBasis::Month, capacity),
        avg_week: from_annual(target_annual, IncomeBasis::AvgWeek, capacity),
        avg_month: from_annual(target_annual, IncomeBasis::AvgMonth, capacity),
    }
}
