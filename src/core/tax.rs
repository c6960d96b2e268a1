use serde::Serialize;
use tracing::{debug, warn};

use super::costs::CostMetrics;
use super::income::IncomeTargets;
use super::types::{IncomeMode, TaxInput, TaxMode, ratio_or_zero};

pub const ZELFSTANDIGENAFTREK_2025: f64 = 2_470.0;
pub const STARTERSAFTREK_2025: f64 = 2_123.0;
pub const MKB_VRIJSTELLING_RATE_2025: f64 = 0.1331;
pub const ZVW_RATE_2025: f64 = 0.0532;
pub const ZVW_INCOME_CAP_2025: f64 = 80_000.0;
pub const INCOME_TAX_BRACKETS_2025: [TaxBracket; 2] = [
    TaxBracket {
        upper: 75_518.0,
        rate: 0.3697,
    },
    TaxBracket {
        upper: f64::INFINITY,
        rate: 0.495,
    },
];

/// Net-income tolerance of the bisection, in currency units.
pub const NET_TOLERANCE: f64 = 0.5;
pub const MAX_EXPANSION_STEPS: u32 = 25;
pub const MAX_BISECTION_STEPS: u32 = 60;
const EXPANSION_FACTOR: f64 = 1.5;
const SIMPLE_RATE_CEILING: f64 = 0.999;
const MAX_SEED_RATE: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaxBracket {
    /// Upper bound of the bracket; the lower bound is the previous bracket's upper bound.
    pub upper: f64,
    pub rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DutchDeductions {
    pub zelfstandigenaftrek: bool,
    pub startersaftrek: bool,
    pub mkb_vrijstelling: bool,
    pub zvw: bool,
}

impl Default for DutchDeductions {
    fn default() -> Self {
        Self {
            zelfstandigenaftrek: true,
            startersaftrek: false,
            mkb_vrijstelling: true,
            zvw: true,
        }
    }
}

impl DutchDeductions {
    pub fn from_input(input: &TaxInput) -> Self {
        let defaults = Self::default();
        Self {
            zelfstandigenaftrek: input
                .zelfstandigenaftrek
                .unwrap_or(defaults.zelfstandigenaftrek),
            startersaftrek: input.startersaftrek.unwrap_or(defaults.startersaftrek),
            mkb_vrijstelling: input.mkb_vrijstelling.unwrap_or(defaults.mkb_vrijstelling),
            zvw: input.zvw.unwrap_or(defaults.zvw),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxBreakdown {
    pub mode: TaxMode,
    pub profit_before_tax: f64,
    pub zelfstandigenaftrek: f64,
    pub startersaftrek: f64,
    pub taxable_before_mkb: f64,
    pub mkb_vrijstelling: f64,
    pub taxable_profit_after_mkb: f64,
    pub income_tax: f64,
    pub zvw_contribution: f64,
    pub tax_reserve: f64,
    pub net_income: f64,
    pub effective_tax_rate: f64,
    pub solver_iterations: u32,
    pub converged: bool,
    /// `net_income` minus the requested net; 0 when nothing was solved for.
    pub residual: f64,
}

impl TaxBreakdown {
    fn with_solve_stats(self, iterations: u32, converged: bool, target_net: f64) -> Self {
        Self {
            solver_iterations: iterations,
            converged,
            residual: self.net_income - target_net,
            ..self
        }
    }
}

/// Tax reserve for the scenario's income target under the selected tax mode.
pub fn calculate_tax_reserve(
    tax: &TaxInput,
    costs: &CostMetrics,
    income: &IncomeTargets,
) -> TaxBreakdown {
    let target = income.target_annual;
    match (tax.mode, income.mode) {
        (TaxMode::Simple, IncomeMode::Net) => simple_from_net(target, costs.tax_rate),
        (TaxMode::Simple, IncomeMode::Gross) => simple_from_profit(target, costs.tax_rate),
        (TaxMode::Dutch2025, IncomeMode::Net) => {
            solve_profit_for_net(target, DutchDeductions::from_input(tax), costs.tax_rate)
        }
        (TaxMode::Dutch2025, IncomeMode::Gross) => {
            compute_tax_breakdown(target, DutchDeductions::from_input(tax))
        }
    }
}

/// Net income the portfolio must reach: the entered figure in net mode, the
/// after-tax result of the entered profit in gross mode.
pub fn net_target(income: &IncomeTargets, breakdown: &TaxBreakdown) -> f64 {
    match income.mode {
        IncomeMode::Net => income.target_annual,
        IncomeMode::Gross => breakdown.net_income,
    }
}

/// Tax rate applied to service-level profit by the optimizer.
///
/// A simple rate at or above the ceiling reserves nothing in the breakdown, and
/// the optimizer follows the breakdown's effective rate so both agree.
pub fn portfolio_tax_rate(mode: TaxMode, costs: &CostMetrics, breakdown: &TaxBreakdown) -> f64 {
    match mode {
        TaxMode::Simple if costs.tax_rate < SIMPLE_RATE_CEILING => costs.tax_rate,
        TaxMode::Simple | TaxMode::Dutch2025 => breakdown.effective_tax_rate,
    }
}

fn simple_from_net(target_net: f64, rate: f64) -> TaxBreakdown {
    let target_net = target_net.max(0.0);
    let rate = rate.clamp(0.0, 1.0);
    let profit = if rate < SIMPLE_RATE_CEILING {
        target_net / (1.0 - rate)
    } else {
        target_net
    };
    let reserve = (profit - target_net).max(0.0);
    simple_breakdown(profit, reserve)
}

fn simple_from_profit(profit: f64, rate: f64) -> TaxBreakdown {
    let profit = profit.max(0.0);
    simple_breakdown(profit, profit * rate.clamp(0.0, 1.0))
}

fn simple_breakdown(profit: f64, reserve: f64) -> TaxBreakdown {
    TaxBreakdown {
        mode: TaxMode::Simple,
        profit_before_tax: profit,
        zelfstandigenaftrek: 0.0,
        startersaftrek: 0.0,
        taxable_before_mkb: profit,
        mkb_vrijstelling: 0.0,
        taxable_profit_after_mkb: profit,
        income_tax: reserve,
        zvw_contribution: 0.0,
        tax_reserve: reserve,
        net_income: profit - reserve,
        effective_tax_rate: ratio_or_zero(reserve, profit),
        solver_iterations: 0,
        converged: true,
        residual: 0.0,
    }
}

/// Dutch 2025 forward model: profit before tax to net income.
pub fn compute_tax_breakdown(profit_before_tax: f64, deductions: DutchDeductions) -> TaxBreakdown {
    let profit = if profit_before_tax.is_finite() {
        profit_before_tax.max(0.0)
    } else {
        0.0
    };

    let zelfstandigenaftrek = if deductions.zelfstandigenaftrek {
        ZELFSTANDIGENAFTREK_2025.min(profit)
    } else {
        0.0
    };
    let startersaftrek = if deductions.startersaftrek {
        STARTERSAFTREK_2025.min((profit - zelfstandigenaftrek).max(0.0))
    } else {
        0.0
    };
    let taxable_before_mkb = (profit - zelfstandigenaftrek - startersaftrek).max(0.0);
    let mkb_vrijstelling = if deductions.mkb_vrijstelling {
        taxable_before_mkb * MKB_VRIJSTELLING_RATE_2025
    } else {
        0.0
    };
    let taxable_profit_after_mkb = taxable_before_mkb - mkb_vrijstelling;

    let income_tax = progressive_tax(taxable_profit_after_mkb, &INCOME_TAX_BRACKETS_2025);
    let zvw_contribution = if deductions.zvw {
        taxable_before_mkb.min(ZVW_INCOME_CAP_2025) * ZVW_RATE_2025
    } else {
        0.0
    };
    let tax_reserve = income_tax + zvw_contribution;

    TaxBreakdown {
        mode: TaxMode::Dutch2025,
        profit_before_tax: profit,
        zelfstandigenaftrek,
        startersaftrek,
        taxable_before_mkb,
        mkb_vrijstelling,
        taxable_profit_after_mkb,
        income_tax,
        zvw_contribution,
        tax_reserve,
        net_income: profit - tax_reserve,
        effective_tax_rate: ratio_or_zero(tax_reserve, profit),
        solver_iterations: 0,
        converged: true,
        residual: 0.0,
    }
}

/// Tax over `brackets`, walking each bracket from the previous upper bound.
pub fn progressive_tax(income: f64, brackets: &[TaxBracket]) -> f64 {
    let income = income.max(0.0);
    let mut lower = 0.0;
    let mut tax = 0.0;
    for bracket in brackets {
        if income <= lower {
            break;
        }
        let span = (income.min(bracket.upper) - lower).max(0.0);
        tax += span * bracket.rate;
        lower = bracket.upper.max(lower);
    }
    tax
}

/// Finds the profit before tax whose Dutch net income equals `target_net`.
///
/// Net income is monotonically increasing in profit but has no closed-form
/// inverse, so the root is bracketed and bisected. `manual_rate` only seeds
/// the upper bracket. When the iteration caps are hit the last evaluated
/// breakdown is returned with `converged == false`.
pub fn solve_profit_for_net(
    target_net: f64,
    deductions: DutchDeductions,
    manual_rate: f64,
) -> TaxBreakdown {
    if !target_net.is_finite() || target_net <= 0.0 {
        return compute_tax_breakdown(0.0, deductions);
    }

    let seed_rate = if manual_rate.is_finite() {
        manual_rate.clamp(0.0, MAX_SEED_RATE)
    } else {
        0.0
    };
    let mut lo = target_net;
    let mut hi = (target_net / (1.0 - seed_rate)).max(target_net);
    let mut it = 0;

    let mut last = compute_tax_breakdown(hi, deductions);
    let mut expansions = 0;
    while last.net_income < target_net && expansions < MAX_EXPANSION_STEPS {
        expansions += 1;
        it += 1;
        lo = hi;
        hi *= EXPANSION_FACTOR;
        last = compute_tax_breakdown(hi, deductions);
    }

    let mut converged = (last.net_income - target_net).abs() <= NET_TOLERANCE;
    let mut bisections = 0;
    while !converged && bisections < MAX_BISECTION_STEPS {
        bisections += 1;
        it += 1;
        let mid = (lo + hi) * 0.5;
        last = compute_tax_breakdown(mid, deductions);
        let gap = last.net_income - target_net;
        if gap.abs() <= NET_TOLERANCE {
            converged = true;
        } else if gap < 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    if converged {
        debug!(
            target_net,
            profit = last.profit_before_tax,
            iterations = it,
            "tax reserve solved"
        );
    } else {
        warn!(
            target_net,
            profit = last.profit_before_tax,
            iterations = it,
            "tax reserve bisection hit its iteration cap; returning best estimate"
        );
    }

    last.with_solve_stats(it, converged, target_net)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::IncomeBasis;
    use proptest::prelude::{any, prop_assert, proptest};

    fn assert_approx_tol(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn no_deductions() -> DutchDeductions {
        DutchDeductions {
            zelfstandigenaftrek: false,
            startersaftrek: false,
            mkb_vrijstelling: false,
            zvw: false,
        }
    }

    fn costs_with_rate(rate: f64) -> CostMetrics {
        CostMetrics {
            tax_rate: rate,
            fixed_costs: 0.0,
            variable_cost_per_day: 0.0,
            annual_variable_costs: 0.0,
            vat_rate: 0.0,
            buffer: 0.0,
            currency_symbol: "€".to_string(),
        }
    }

    fn targets(mode: IncomeMode, annual: f64) -> IncomeTargets {
        IncomeTargets {
            mode,
            basis: IncomeBasis::Year,
            target_annual: annual,
            year: annual,
            week: 0.0,
            month: 0.0,
            avg_week: annual / 52.0,
            avg_month: annual / 12.0,
        }
    }

    #[test]
    fn progressive_tax_walks_brackets_without_double_counting() {
        assert_approx_tol(progressive_tax(0.0, &INCOME_TAX_BRACKETS_2025), 0.0, 1e-9);
        assert_approx_tol(
            progressive_tax(50_000.0, &INCOME_TAX_BRACKETS_2025),
            50_000.0 * 0.3697,
            1e-6,
        );
        assert_approx_tol(
            progressive_tax(100_000.0, &INCOME_TAX_BRACKETS_2025),
            40_037.5946,
            1e-6,
        );
    }

    #[test]
    fn progressive_tax_handles_zero_span_brackets() {
        let brackets = [
            TaxBracket {
                upper: 10_000.0,
                rate: 0.1,
            },
            TaxBracket {
                upper: 10_000.0,
                rate: 0.9,
            },
            TaxBracket {
                upper: f64::INFINITY,
                rate: 0.5,
            },
        ];
        assert_approx_tol(progressive_tax(20_000.0, &brackets), 1_000.0 + 5_000.0, 1e-9);
    }

    #[test]
    fn dutch_breakdown_with_default_deductions() {
        let breakdown = compute_tax_breakdown(50_000.0, DutchDeductions::default());

        assert_approx_tol(breakdown.zelfstandigenaftrek, 2_470.0, 1e-9);
        assert_approx_tol(breakdown.startersaftrek, 0.0, 1e-9);
        assert_approx_tol(breakdown.taxable_before_mkb, 47_530.0, 1e-9);
        assert_approx_tol(breakdown.mkb_vrijstelling, 6_326.243, 1e-6);
        assert_approx_tol(breakdown.taxable_profit_after_mkb, 41_203.757, 1e-6);
        assert_approx_tol(breakdown.income_tax, 15_233.0289629, 1e-4);
        assert_approx_tol(breakdown.zvw_contribution, 2_528.596, 1e-6);
        assert_approx_tol(breakdown.net_income, 32_238.3750371, 1e-4);
        assert_approx_tol(
            breakdown.effective_tax_rate,
            breakdown.tax_reserve / 50_000.0,
            1e-12,
        );
    }

    #[test]
    fn dutch_breakdown_crosses_top_bracket_and_caps_zvw() {
        let deductions = DutchDeductions {
            startersaftrek: true,
            ..DutchDeductions::default()
        };
        let breakdown = compute_tax_breakdown(120_000.0, deductions);

        assert_approx_tol(breakdown.startersaftrek, 2_123.0, 1e-9);
        assert_approx_tol(breakdown.taxable_before_mkb, 115_407.0, 1e-9);
        assert_approx_tol(breakdown.zvw_contribution, 4_256.0, 1e-9);
        assert_approx_tol(breakdown.income_tax, 40_060.5271085, 1e-4);
        assert_approx_tol(breakdown.net_income, 75_683.4728915, 1e-4);
    }

    #[test]
    fn small_profits_are_fully_absorbed_by_deductions() {
        let breakdown = compute_tax_breakdown(1_500.0, DutchDeductions::default());
        assert_approx_tol(breakdown.tax_reserve, 0.0, 1e-9);
        assert_approx_tol(breakdown.net_income, 1_500.0, 1e-9);
        assert_approx_tol(breakdown.effective_tax_rate, 0.0, 1e-12);
    }

    #[test]
    fn solver_inverts_the_forward_model() {
        let breakdown = solve_profit_for_net(50_000.0, DutchDeductions::default(), 0.4);
        assert!(breakdown.converged);
        assert!(breakdown.solver_iterations <= MAX_EXPANSION_STEPS + MAX_BISECTION_STEPS);
        assert_approx_tol(breakdown.net_income, 50_000.0, NET_TOLERANCE);
        assert_approx_tol(breakdown.residual, breakdown.net_income - 50_000.0, 1e-9);
        let forward = compute_tax_breakdown(breakdown.profit_before_tax, DutchDeductions::default());
        assert_approx_tol(forward.net_income, breakdown.net_income, 1e-9);
    }

    #[test]
    fn solver_grows_the_bracket_from_a_zero_manual_rate() {
        let breakdown = solve_profit_for_net(250_000.0, no_deductions(), 0.0);
        assert!(breakdown.converged);
        assert_approx_tol(breakdown.net_income, 250_000.0, NET_TOLERANCE);
    }

    #[test]
    fn non_positive_target_short_circuits_to_zero_profit() {
        for target in [0.0, -100.0, f64::NAN] {
            let breakdown = solve_profit_for_net(target, DutchDeductions::default(), 0.4);
            assert_eq!(breakdown.profit_before_tax, 0.0);
            assert_eq!(breakdown.tax_reserve, 0.0);
            assert_eq!(breakdown.solver_iterations, 0);
        }
    }

    #[test]
    fn simple_mode_uses_linear_rate() {
        let breakdown = calculate_tax_reserve(
            &TaxInput::default(),
            &costs_with_rate(0.4),
            &targets(IncomeMode::Net, 60_000.0),
        );
        assert_eq!(breakdown.mode, TaxMode::Simple);
        assert_approx_tol(breakdown.profit_before_tax, 100_000.0, 1e-6);
        assert_approx_tol(breakdown.tax_reserve, 40_000.0, 1e-6);
        assert_approx_tol(breakdown.net_income, 60_000.0, 1e-6);
        assert_approx_tol(breakdown.effective_tax_rate, 0.4, 1e-12);
    }

    #[test]
    fn simple_mode_rate_at_ceiling_reserves_nothing() {
        let breakdown = calculate_tax_reserve(
            &TaxInput::default(),
            &costs_with_rate(1.0),
            &targets(IncomeMode::Net, 60_000.0),
        );
        assert_approx_tol(breakdown.profit_before_tax, 60_000.0, 1e-9);
        assert_approx_tol(breakdown.tax_reserve, 0.0, 1e-9);
    }

    #[test]
    fn gross_mode_evaluates_forward_and_feeds_net_target() {
        let simple = calculate_tax_reserve(
            &TaxInput::default(),
            &costs_with_rate(0.3),
            &targets(IncomeMode::Gross, 80_000.0),
        );
        assert_approx_tol(simple.net_income, 56_000.0, 1e-6);
        assert_approx_tol(
            net_target(&targets(IncomeMode::Gross, 80_000.0), &simple),
            56_000.0,
            1e-6,
        );

        let dutch_input = TaxInput {
            mode: TaxMode::Dutch2025,
            ..TaxInput::default()
        };
        let dutch = calculate_tax_reserve(
            &dutch_input,
            &costs_with_rate(0.3),
            &targets(IncomeMode::Gross, 50_000.0),
        );
        assert_approx_tol(dutch.net_income, 32_238.3750371, 1e-4);
    }

    #[test]
    fn portfolio_rate_follows_tax_mode() {
        let costs = costs_with_rate(0.25);
        let breakdown = compute_tax_breakdown(90_000.0, DutchDeductions::default());
        assert_approx_tol(portfolio_tax_rate(TaxMode::Simple, &costs, &breakdown), 0.25, 1e-12);
        assert_approx_tol(
            portfolio_tax_rate(TaxMode::Dutch2025, &costs, &breakdown),
            breakdown.effective_tax_rate,
            1e-12,
        );
    }

    #[test]
    fn saturated_simple_rate_reserves_nothing_and_taxes_nothing() {
        let costs = costs_with_rate(1.0);
        let breakdown = calculate_tax_reserve(
            &TaxInput::default(),
            &costs,
            &targets(IncomeMode::Net, 40_000.0),
        );
        assert_eq!(breakdown.tax_reserve, 0.0);
        assert_eq!(breakdown.effective_tax_rate, 0.0);
        assert_eq!(portfolio_tax_rate(TaxMode::Simple, &costs, &breakdown), 0.0);

        let gross = calculate_tax_reserve(
            &TaxInput::default(),
            &costs,
            &targets(IncomeMode::Gross, 40_000.0),
        );
        assert_approx_tol(portfolio_tax_rate(TaxMode::Simple, &costs, &gross), 1.0, 1e-12);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(256))]

        #[test]
        fn prop_net_income_is_non_decreasing_in_profit(
            profit in 0.0f64..600_000.0,
            delta in 0.0f64..20_000.0,
            zelf in any::<bool>(),
            starters in any::<bool>(),
            mkb in any::<bool>(),
            zvw in any::<bool>()
        ) {
            let deductions = DutchDeductions {
                zelfstandigenaftrek: zelf,
                startersaftrek: starters,
                mkb_vrijstelling: mkb,
                zvw,
            };
            let lower = compute_tax_breakdown(profit, deductions);
            let upper = compute_tax_breakdown(profit + delta, deductions);
            prop_assert!(upper.net_income + 1e-9 >= lower.net_income);
            prop_assert!(lower.tax_reserve >= 0.0);
        }

        #[test]
        fn prop_solver_hits_target_within_tolerance(
            target in 0.0f64..500_000.0,
            manual_rate in 0.0f64..1.0,
            zelf in any::<bool>(),
            starters in any::<bool>(),
            mkb in any::<bool>(),
            zvw in any::<bool>()
        ) {
            let deductions = DutchDeductions {
                zelfstandigenaftrek: zelf,
                startersaftrek: starters,
                mkb_vrijstelling: mkb,
                zvw,
            };
            let breakdown = solve_profit_for_net(target, deductions, manual_rate);
            prop_assert!(breakdown.converged);
            prop_assert!((breakdown.net_income - target).abs() <= NET_TOLERANCE);
            prop_assert!(breakdown.profit_before_tax + 1e-9 >= target);
        }
    }
}
