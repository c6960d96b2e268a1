use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::capacity::{CapacityMetrics, derive_capacity};
use super::costs::{CostMetrics, derive_costs};
use super::income::{IncomeTargets, resolve_income_targets};
use super::optimizer::{OptimizerContext, PortfolioSolution, optimize_service_mix};
use super::services::{ServiceConfig, resolve_service_configs};
use super::tax::{TaxBreakdown, calculate_tax_reserve, net_target, portfolio_tax_rate};
use super::types::{ScenarioInput, ratio_or_zero};

/// Everything derived from one scenario, in pipeline order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioReport {
    pub capacity: CapacityMetrics,
    pub costs: CostMetrics,
    pub income: IncomeTargets,
    pub tax: TaxBreakdown,
    pub target_net: f64,
    pub portfolio_tax_rate: f64,
    pub requirement: RevenueRequirement,
    pub services: Vec<ServiceConfig>,
    pub portfolio: PortfolioSolution,
}

/// Revenue needed to fund the tax-inclusive profit plus all costs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueRequirement {
    pub profit_before_tax: f64,
    pub fixed_costs: f64,
    pub variable_costs: f64,
    pub required_revenue: f64,
    pub required_revenue_incl_vat: f64,
    pub required_day_rate: Option<f64>,
    pub required_hourly_rate: Option<f64>,
}

pub fn revenue_requirement(
    capacity: &CapacityMetrics,
    costs: &CostMetrics,
    tax: &TaxBreakdown,
) -> RevenueRequirement {
    let required_revenue = tax.profit_before_tax + costs.fixed_costs + costs.annual_variable_costs;
    let per = |units: f64| (units > 0.0).then(|| ratio_or_zero(required_revenue, units));

    RevenueRequirement {
        profit_before_tax: tax.profit_before_tax,
        fixed_costs: costs.fixed_costs,
        variable_costs: costs.annual_variable_costs,
        required_revenue,
        required_revenue_incl_vat: required_revenue * (1.0 + costs.vat_rate),
        required_day_rate: per(capacity.billable_days_after_travel),
        required_hourly_rate: capacity.billable_hours_per_year.and_then(per),
    }
}

/// Runs the whole pipeline: capacity, costs, income, tax, then the service mix search.
pub fn solve_scenario(scenario: &ScenarioInput, top_n: usize) -> ScenarioReport {
    let capacity = derive_capacity(&scenario.capacity, &scenario.modifiers);
    let costs = derive_costs(&scenario.costs, &capacity);
    let income = resolve_income_targets(&scenario.income_targets, &capacity);
    let tax = calculate_tax_reserve(&scenario.tax, &costs, &income);
    let target_net = net_target(&income, &tax);
    let tax_rate = portfolio_tax_rate(scenario.tax.mode, &costs, &tax);
    let requirement = revenue_requirement(&capacity, &costs, &tax);

    let services = resolve_service_configs(&scenario.services);
    let ctx = OptimizerContext::new(scenario, &capacity, &costs, tax_rate, target_net);
    let portfolio = optimize_service_mix(&services, &ctx, top_n);

    debug!(
        target_net,
        tax_rate,
        billable_days = capacity.billable_days_after_travel,
        best_net = portfolio.best.totals.net,
        "scenario solved"
    );

    ScenarioReport {
        capacity,
        costs,
        income,
        tax,
        target_net,
        portfolio_tax_rate: tax_rate,
        requirement,
        services,
        portfolio,
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SweepParameter {
    UtilizationPercent,
    MonthsOff,
    /// Income target at the scenario's selected basis.
    TargetValue,
    TaxRatePercent,
    FixedCosts,
}

impl SweepParameter {
    pub fn apply(self, scenario: &mut ScenarioInput, value: f64) {
        match self {
            SweepParameter::UtilizationPercent => scenario.capacity.utilization_percent = Some(value),
            SweepParameter::MonthsOff => scenario.capacity.months_off = Some(value),
            SweepParameter::TargetValue => {
                let basis = scenario.income_targets.basis;
                scenario.income_targets.set_value_at(basis, value);
            }
            SweepParameter::TaxRatePercent => scenario.costs.tax_rate_percent = Some(value),
            SweepParameter::FixedCosts => scenario.costs.fixed_costs = Some(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepPoint {
    pub value: f64,
    pub best_net: f64,
    pub net_gap: f64,
    pub meets_target: bool,
    pub violation_count: usize,
    pub required_day_rate: Option<f64>,
}

/// Re-solves the scenario once per value with `parameter` replaced.
/// Points come back in the order of `values`.
pub fn run_sensitivity_sweep(
    scenario: &ScenarioInput,
    parameter: SweepParameter,
    values: &[f64],
) -> Vec<SweepPoint> {
    values
        .par_iter()
        .map(|&value| {
            let mut variant = scenario.clone();
            parameter.apply(&mut variant, value);
            let report = solve_scenario(&variant, 1);
            let best = &report.portfolio.best;
            SweepPoint {
                value,
                best_net: best.totals.net,
                net_gap: best.totals.net_gap,
                meets_target: best.meets_target,
                violation_count: best.violation_count,
                required_day_rate: report.requirement.required_day_rate,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{IncomeBasis, TaxMode};

    fn assert_approx_tol(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn reference_scenario() -> ScenarioInput {
        serde_json::from_str(
            r#"{
                "capacity": {
                    "monthsOff": 2,
                    "weeksOffCycle": 0,
                    "daysOffWeek": 0,
                    "utilizationPercent": 100,
                    "sessionLength": 1.5
                },
                "incomeTargets": { "mode": "net", "basis": "year", "year": 50000 },
                "tax": { "mode": "simple" },
                "costs": {
                    "taxRatePercent": 40,
                    "fixedCosts": 12000,
                    "variableCostPerClass": 10,
                    "vatRatePercent": 21,
                    "bufferPercent": 15
                }
            }"#,
        )
        .expect("reference scenario parses")
    }

    #[test]
    fn reference_scenario_reaches_the_target_without_violations() {
        let report = solve_scenario(&reference_scenario(), 1);

        assert_approx_tol(report.capacity.active_months, 10.0, 1e-12);
        assert_approx_tol(report.capacity.working_weeks, 52.0 * 10.0 / 12.0, 1e-9);
        assert_eq!(report.target_net, 50_000.0);
        assert_approx_tol(report.portfolio_tax_rate, 0.4, 1e-12);

        let best = &report.portfolio.best;
        assert_eq!(best.services.len(), 5);
        assert!(best.violations.is_empty(), "{:?}", best.violations);
        assert_eq!(best.violation_count, 0);
        assert!(best.meets_target);
        assert!(best.totals.net - 50_000.0 < 2_000.0, "{:?}", best.totals);
        assert_approx_tol(best.totals.vat, best.totals.revenue * 0.21, 1e-6);
    }

    #[test]
    fn revenue_requirement_adds_costs_to_profit() {
        let report = solve_scenario(&reference_scenario(), 1);
        let requirement = report.requirement;
        let billable = report.capacity.billable_days_after_travel;

        assert_approx_tol(requirement.profit_before_tax, 50_000.0 / 0.6, 1e-6);
        assert_approx_tol(requirement.variable_costs, 10.0 * billable, 1e-9);
        assert_approx_tol(
            requirement.required_revenue,
            50_000.0 / 0.6 + 12_000.0 + 10.0 * billable,
            1e-6,
        );
        assert_approx_tol(
            requirement.required_revenue_incl_vat,
            requirement.required_revenue * 1.21,
            1e-6,
        );
        let day_rate = requirement.required_day_rate.expect("billable days");
        assert_approx_tol(day_rate, requirement.required_revenue / billable, 1e-9);
        let hourly = requirement.required_hourly_rate.expect("session length set");
        assert_approx_tol(hourly, requirement.required_revenue / (billable * 1.5), 1e-9);
    }

    #[test]
    fn requirement_rates_are_absent_without_capacity() {
        let mut scenario = reference_scenario();
        scenario.capacity.months_off = Some(12.0);
        let report = solve_scenario(&scenario, 1);

        assert_eq!(report.requirement.required_day_rate, None);
        assert!(report.portfolio.best.services.is_empty());
        assert!(!report.portfolio.best.meets_target);
    }

    #[test]
    fn dutch_mode_uses_the_effective_rate_of_the_solved_profit() {
        let mut scenario = reference_scenario();
        scenario.tax.mode = TaxMode::Dutch2025;
        let report = solve_scenario(&scenario, 1);

        assert!(report.tax.converged);
        assert_approx_tol(report.tax.net_income, 50_000.0, 0.5);
        assert_approx_tol(report.portfolio_tax_rate, report.tax.effective_tax_rate, 1e-12);
        assert!(report.portfolio_tax_rate > 0.0 && report.portfolio_tax_rate < 0.5);
    }

    #[test]
    fn saturated_simple_rate_still_lets_the_mix_reach_the_target() {
        let mut scenario = reference_scenario();
        scenario.costs.tax_rate_percent = Some(100.0);
        let report = solve_scenario(&scenario, 1);

        assert_eq!(report.tax.tax_reserve, 0.0);
        assert_eq!(report.portfolio_tax_rate, 0.0);
        assert!(report.portfolio.best.meets_target);
        assert_eq!(report.portfolio.best.totals.tax, 0.0);
    }

    #[test]
    fn sweep_points_follow_input_order() {
        let values = [60.0, 100.0, 20.0, 80.0];
        let points = run_sensitivity_sweep(
            &reference_scenario(),
            SweepParameter::UtilizationPercent,
            &values,
        );

        let swept: Vec<f64> = points.iter().map(|p| p.value).collect();
        assert_eq!(swept, values.to_vec());
        let rate_at = |i: usize| points[i].required_day_rate.expect("billable days");
        assert!(rate_at(2) > rate_at(0));
        assert!(rate_at(0) > rate_at(3));
        assert!(rate_at(3) > rate_at(1));
    }

    #[test]
    fn sweeping_the_target_changes_the_gap_at_the_selected_basis() {
        let mut scenario = reference_scenario();
        scenario.income_targets.basis = IncomeBasis::Month;
        let points = run_sensitivity_sweep(&scenario, SweepParameter::TargetValue, &[0.0, 4_000.0]);

        assert!(points[0].meets_target);
        let solo = {
            let mut variant = scenario.clone();
            SweepParameter::TargetValue.apply(&mut variant, 4_000.0);
            solve_scenario(&variant, 1)
        };
        assert_eq!(solo.target_net, 40_000.0);
        assert_eq!(points[1].best_net, solo.portfolio.best.totals.net);
    }

    #[test]
    fn sweep_parameters_read_camel_case() {
        let parameter: SweepParameter =
            serde_json::from_str("\"taxRatePercent\"").expect("known parameter");
        assert_eq!(parameter, SweepParameter::TaxRatePercent);

        let mut scenario = ScenarioInput::default();
        SweepParameter::FixedCosts.apply(&mut scenario, 900.0);
        SweepParameter::MonthsOff.apply(&mut scenario, 1.0);
        assert_eq!(scenario.costs.fixed_costs, Some(900.0));
        assert_eq!(scenario.capacity.months_off, Some(1.0));
    }

    #[test]
    fn report_serializes_with_camel_case_keys() {
        let report = solve_scenario(&reference_scenario(), 3);
        let json = serde_json::to_value(&report).expect("serialize");

        assert!(json["capacity"]["billableDaysAfterTravel"].is_number());
        assert!(json["requirement"]["requiredDayRate"].is_number());
        assert_eq!(json["portfolio"]["top"].as_array().map(Vec::len), Some(3));
        assert!(json["portfolio"]["diagnostics"]["candidateCounts"]["intel"].is_number());
        assert_eq!(json["services"][0]["id"], "representation");
    }
}
