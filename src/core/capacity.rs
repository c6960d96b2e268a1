use serde::Serialize;

use super::types::{CapacityInput, ModifiersInput, clamp_or, non_negative_or, ratio_or_zero};

pub const BASE_WORK_DAYS_PER_WEEK: f64 = 5.0;
pub const WEEKS_PER_CYCLE: f64 = 4.0;
pub const WEEKS_PER_YEAR: f64 = 52.0;
pub const MONTHS_PER_YEAR: f64 = 12.0;
const MIN_SEASONALITY_PENALTY: f64 = 0.1;
const MAX_SEASONALITY: f64 = 0.99;

/// Working-time metrics for one scenario evaluation.
///
/// `billable_days_after_travel <= billable_days_per_year <= working_days_per_year`
/// holds for every input, and every field is finite and non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityMetrics {
    pub active_months: f64,
    pub working_weeks: f64,
    pub working_days_per_week: f64,
    pub working_days_per_year: f64,
    pub billable_days_per_year: f64,
    pub billable_days_after_travel: f64,
    /// `None` when no session length is configured.
    pub billable_hours_per_year: Option<f64>,
    pub session_length: Option<f64>,
    pub travel_allowance_days: f64,
    pub travel_friction_multiplier: f64,
    pub utilization_rate: f64,
    pub seasonality_penalty: f64,
}

pub fn derive_capacity(capacity: &CapacityInput, modifiers: &ModifiersInput) -> CapacityMetrics {
    let months_off = clamp_or(capacity.months_off, 0.0, 0.0, MONTHS_PER_YEAR);
    let weeks_off = clamp_or(capacity.weeks_off_cycle, 0.0, 0.0, WEEKS_PER_CYCLE);
    let days_off = clamp_or(capacity.days_off_week, 0.0, 0.0, BASE_WORK_DAYS_PER_WEEK);

    let active_months = MONTHS_PER_YEAR - months_off;
    let active_month_share = active_months / MONTHS_PER_YEAR;
    let weeks_share = (WEEKS_PER_CYCLE - weeks_off) / WEEKS_PER_CYCLE;
    let working_days_per_week = BASE_WORK_DAYS_PER_WEEK - days_off;

    let seasonality = clamp_or(modifiers.seasonality_percent, 0.0, 0.0, 100.0) / 100.0;
    let seasonality_penalty = (1.0 - seasonality.min(MAX_SEASONALITY)).max(MIN_SEASONALITY_PENALTY);

    let working_weeks = WEEKS_PER_YEAR * active_month_share * weeks_share * seasonality_penalty;
    let working_days_per_year = working_weeks * working_days_per_week;

    let utilization = clamp_or(capacity.utilization_percent, 100.0, 0.0, 100.0) / 100.0;
    let utilization_rate = (utilization * seasonality_penalty).clamp(0.0, 1.0);
    let billable_days_per_year = working_days_per_year * utilization_rate;

    let travel_friction = non_negative_or(modifiers.travel_friction_percent, 0.0) / 100.0;
    let travel_friction_multiplier = 1.0 + travel_friction;
    let travel_base = base_travel_days(modifiers, active_months, working_weeks);
    let travel_allowance_days = (travel_base * travel_friction_multiplier).min(working_days_per_year);
    let billable_days_after_travel = (billable_days_per_year - travel_allowance_days).max(0.0);

    let session_length = capacity
        .session_length
        .filter(|hours| hours.is_finite() && *hours > 0.0);
    let billable_hours_per_year = session_length.map(|hours| billable_days_after_travel * hours);

    CapacityMetrics {
        active_months,
        working_weeks,
        working_days_per_week,
        working_days_per_year,
        billable_days_per_year,
        billable_days_after_travel,
        billable_hours_per_year,
        session_length,
        travel_allowance_days,
        travel_friction_multiplier,
        utilization_rate,
        seasonality_penalty,
    }
}

/// Annual travel days before friction: explicit annual figure first, then the
/// monthly rate over active months, then the per-cycle rate over working cycles.
fn base_travel_days(modifiers: &ModifiersInput, active_months: f64, working_weeks: f64) -> f64 {
    let per_year = non_negative_or(modifiers.travel_days_per_year, 0.0);
    if per_year > 0.0 {
        return per_year;
    }
    let per_month = non_negative_or(modifiers.travel_days_per_month, 0.0);
    if per_month > 0.0 {
        return per_month * active_months;
    }
    let per_cycle = non_negative_or(modifiers.travel_days_per_cycle, 0.0);
    per_cycle * ratio_or_zero(working_weeks, WEEKS_PER_CYCLE)
}
