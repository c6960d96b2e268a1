use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::debug;

use super::capacity::CapacityMetrics;
use super::costs::CostMetrics;
use super::services::{
    ConfigSource, ServiceConfig, ServiceId, resolve_cost_share, resolve_unit_price,
};
use super::types::{ScenarioInput, clamp_or, non_negative_or, ratio_or_zero};

pub const BASELINE_MULTIPLIERS: [f64; 5] = [0.5, 0.75, 1.0, 1.25, 1.5];
pub const DEFAULT_TOP_N: usize = 1;
pub const MAX_TOP_N: usize = 50;
const GRID_SEGMENTS: f64 = 5.0;
const MIN_GRID_STEP: f64 = 0.5;
const CAPACITY_HEADROOM: f64 = 1.1;
const BASELINE_HEADROOM: f64 = 1.5;
const BASELINE_MIN_SPAN: f64 = 2.0;
const DEFAULT_HANDS_ON_TOLERANCE_PERCENT: f64 = 15.0;
const CONSTRAINT_EPS: f64 = 1e-9;
const TARGET_EPS: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Violation {
    PriceBelowFloor {
        service: ServiceId,
        price: f64,
        floor: f64,
    },
    PriceAboveCeiling {
        service: ServiceId,
        price: f64,
        ceiling: f64,
    },
    /// `service` is `None` for the blended portfolio margin.
    ComfortMarginBreach {
        service: Option<ServiceId>,
        margin: f64,
        floor: f64,
    },
    ServiceDaysExceeded {
        days: f64,
        cap: f64,
    },
    TravelDaysExceeded {
        days: f64,
        cap: f64,
    },
    HandsOnOutOfBand {
        share: f64,
        min: f64,
        max: f64,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::PriceBelowFloor {
                service,
                price,
                floor,
            } => write!(
                f,
                "{}: price {price:.2} is below the floor of {floor:.2}",
                service.as_str()
            ),
            Violation::PriceAboveCeiling {
                service,
                price,
                ceiling,
            } => write!(
                f,
                "{}: price {price:.2} is above the stretch ceiling of {ceiling:.2}",
                service.as_str()
            ),
            Violation::ComfortMarginBreach {
                service,
                margin,
                floor,
            } => write!(
                f,
                "{}: gross margin {:.1}% is below the comfort floor of {:.1}%",
                service.map(ServiceId::as_str).unwrap_or("portfolio"),
                margin * 100.0,
                floor * 100.0
            ),
            Violation::ServiceDaysExceeded { days, cap } => {
                write!(f, "service days {days:.1} exceed the cap of {cap:.1}")
            }
            Violation::TravelDaysExceeded { days, cap } => {
                write!(f, "travel days {days:.1} exceed the allowance of {cap:.1}")
            }
            Violation::HandsOnOutOfBand { share, min, max } => write!(
                f,
                "hands-on share {:.1}% is outside {:.1}%..{:.1}%",
                share * 100.0,
                min * 100.0,
                max * 100.0
            ),
        }
    }
}

/// Everything the search needs besides the service configurations.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerContext {
    pub capacity: CapacityMetrics,
    pub fixed_costs: f64,
    pub annual_variable_costs: f64,
    pub buffer: f64,
    pub vat_rate: f64,
    pub tax_rate: f64,
    pub target_net: f64,
    pub comfort_margin: f64,
    pub hands_on_target: f64,
    pub hands_on_tolerance: f64,
    pub max_service_days: f64,
    pub max_travel_days: f64,
}

impl OptimizerContext {
    pub fn new(
        scenario: &ScenarioInput,
        capacity: &CapacityMetrics,
        costs: &CostMetrics,
        tax_rate: f64,
        target_net: f64,
    ) -> Self {
        let modifiers = &scenario.modifiers;
        let constraints = &scenario.constraints;
        Self {
            capacity: *capacity,
            fixed_costs: costs.fixed_costs,
            annual_variable_costs: costs.annual_variable_costs,
            buffer: costs.buffer,
            vat_rate: costs.vat_rate,
            tax_rate: clamp_or(Some(tax_rate), 0.0, 0.0, 1.0),
            target_net: non_negative_or(Some(target_net), 0.0),
            comfort_margin: clamp_or(modifiers.comfort_margin_percent, 0.0, 0.0, 100.0) / 100.0,
            hands_on_target: clamp_or(modifiers.hands_on_quota_percent, 0.0, 0.0, 100.0) / 100.0,
            hands_on_tolerance: clamp_or(
                modifiers.hands_on_tolerance_percent,
                DEFAULT_HANDS_ON_TOLERANCE_PERCENT,
                0.0,
                100.0,
            ) / 100.0,
            max_service_days: non_negative_or(
                constraints.max_service_days,
                capacity.billable_days_after_travel,
            ),
            max_travel_days: non_negative_or(
                constraints.max_travel_days,
                capacity.travel_allowance_days,
            ),
        }
    }
}

/// One evaluated unit-volume option for a service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCandidate {
    pub service: ServiceId,
    pub units_per_month: f64,
    pub annual_units: f64,
    pub price_per_unit: f64,
    pub price_source: ConfigSource,
    pub revenue: f64,
    /// Unit costs plus the allocated share of fixed and variable costs.
    pub direct_cost: f64,
    /// Fixed costs allocated to this line, included in `direct_cost`.
    pub fixed_cost: f64,
    /// Signed: a loss-making line offsets tax on the others.
    pub tax: f64,
    pub net: f64,
    pub service_days: f64,
    pub travel_days: f64,
    pub hands_on_days: f64,
    pub gross_margin: f64,
    pub violations: Vec<Violation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioTotals {
    pub revenue: f64,
    /// Includes `unallocated_fixed_costs`.
    pub direct_cost: f64,
    /// Fixed costs no selected line carries, e.g. the shares of disabled services.
    pub unallocated_fixed_costs: f64,
    pub tax: f64,
    pub net: f64,
    pub service_days: f64,
    pub travel_days: f64,
    pub hands_on_days: f64,
    pub hands_on_share: f64,
    pub gross_margin: f64,
    pub net_gap: f64,
    pub vat: f64,
    pub revenue_incl_vat: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioCandidate {
    pub services: Vec<ServiceCandidate>,
    pub totals: PortfolioTotals,
    /// Portfolio-level violations only; service-level ones stay on each service.
    pub violations: Vec<Violation>,
    /// Service-level plus portfolio-level violations.
    pub violation_count: usize,
    pub meets_target: bool,
    pub fit_score: f64,
}

impl PortfolioCandidate {
    fn outcome(&self) -> Outcome {
        Outcome {
            violation_count: self.violation_count,
            meets_target: self.meets_target,
            net_gap: self.totals.net_gap,
            net: self.totals.net,
        }
    }

    pub fn all_violations(&self) -> Vec<Violation> {
        self.services
            .iter()
            .flat_map(|service| service.violations.iter().cloned())
            .chain(self.violations.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchDiagnostics {
    pub candidate_counts: BTreeMap<ServiceId, usize>,
    pub combinations_total: u64,
    pub combinations_evaluated: u64,
    pub combinations_pruned: u64,
    pub iterations: u64,
    pub violations: Vec<Violation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSolution {
    pub best: PortfolioCandidate,
    pub top: Vec<PortfolioCandidate>,
    pub diagnostics: SearchDiagnostics,
}

/// Sort key of a full combination, shared by the search and `compare_candidates`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Outcome {
    violation_count: usize,
    meets_target: bool,
    net_gap: f64,
    net: f64,
}

/// Orders two portfolio candidates, best first.
///
/// Feasibility first, then target satisfaction with the least surplus; this is
/// deliberately not net maximization. Ties fall back to the lexicographically
/// smaller unit vector, so the order is total.
pub fn compare_candidates(a: &PortfolioCandidate, b: &PortfolioCandidate) -> Ordering {
    compare_outcomes(&a.outcome(), &b.outcome()).then_with(|| {
        let a_units = a.services.iter().map(|s| s.units_per_month);
        let b_units = b.services.iter().map(|s| s.units_per_month);
        compare_unit_vectors(a_units, b_units)
    })
}

fn compare_outcomes(a: &Outcome, b: &Outcome) -> Ordering {
    a.violation_count
        .cmp(&b.violation_count)
        .then_with(|| b.meets_target.cmp(&a.meets_target))
        // For two candidates that both meet the target this picks the smaller
        // surplus rather than the larger net.
        .then_with(|| a.net_gap.abs().total_cmp(&b.net_gap.abs()))
        .then_with(|| b.net.total_cmp(&a.net))
}

fn compare_unit_vectors(
    a: impl Iterator<Item = f64>,
    mut b: impl Iterator<Item = f64>,
) -> Ordering {
    for left in a {
        match b.next() {
            Some(right) => match left.total_cmp(&right) {
                Ordering::Equal => {}
                other => return other,
            },
            None => return Ordering::Greater,
        }
    }
    if b.next().is_some() {
        Ordering::Less
    } else {
        Ordering::Equal
    }
}

/// Discretized unit volumes (per active month) worth evaluating for one service.
///
/// Always contains 0, is sorted ascending, has no duplicates and every value
/// is rounded to two decimals.
pub fn build_unit_range(baseline: f64, capacity_implied: f64, explicit: Option<f64>) -> Vec<f64> {
    let baseline = finite_non_negative(baseline);
    let capacity_implied = finite_non_negative(capacity_implied);

    let mut values = Vec::with_capacity(16);
    values.push(0.0);
    values.extend(BASELINE_MULTIPLIERS.iter().map(|m| baseline * m));
    if let Some(explicit) = explicit.filter(|v| v.is_finite() && *v >= 0.0) {
        values.push(explicit);
    }

    let upper = (baseline * BASELINE_HEADROOM)
        .max(capacity_implied * CAPACITY_HEADROOM)
        .max(baseline + BASELINE_MIN_SPAN);
    let step = grid_step(upper);
    let mut k = 1u32;
    loop {
        let value = k as f64 * step;
        if value > upper + CONSTRAINT_EPS {
            break;
        }
        values.push(value);
        k += 1;
    }

    let mut values: Vec<f64> = values
        .into_iter()
        .map(round2)
        .filter(|v| v.is_finite() && *v >= 0.0)
        .collect();
    values.sort_by(|a, b| a.total_cmp(b));
    values.dedup_by(|a, b| (*a - *b).abs() < CONSTRAINT_EPS);
    if values.is_empty() {
        values.push(0.0);
    }
    values
}

fn grid_step(upper: f64) -> f64 {
    let raw = upper / GRID_SEGMENTS;
    ((raw * 2.0).ceil() / 2.0).max(MIN_GRID_STEP)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn finite_non_negative(value: f64) -> f64 {
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}

/// Units per month implied by the service's nominal share of billable days.
pub fn baseline_units_per_month(config: &ServiceConfig, capacity: &CapacityMetrics) -> f64 {
    let days = config.share_of_capacity.value * capacity.billable_days_after_travel;
    ratio_or_zero(ratio_or_zero(days, config.days_per_unit.value), capacity.active_months)
}

/// Units per month if the service took every billable day.
pub fn capacity_units_per_month(config: &ServiceConfig, capacity: &CapacityMetrics) -> f64 {
    ratio_or_zero(
        ratio_or_zero(capacity.billable_days_after_travel, config.days_per_unit.value),
        capacity.active_months,
    )
}

/// Explicit volume override, converted to units per active month.
pub fn explicit_units_per_month(config: &ServiceConfig, capacity: &CapacityMetrics) -> Option<f64> {
    config.units_per_month.or_else(|| {
        config
            .units_per_year
            .map(|per_year| ratio_or_zero(per_year, capacity.active_months))
    })
}

pub fn build_service_candidates(
    config: &ServiceConfig,
    ctx: &OptimizerContext,
) -> Vec<ServiceCandidate> {
    let range = build_unit_range(
        baseline_units_per_month(config, &ctx.capacity),
        capacity_units_per_month(config, &ctx.capacity),
        explicit_units_per_month(config, &ctx.capacity),
    );
    let mut candidates: Vec<ServiceCandidate> = range
        .into_iter()
        .map(|units| evaluate_service_option(config, units, ctx))
        .collect();
    if candidates.is_empty() {
        candidates.push(evaluate_service_option(config, 0.0, ctx));
    }
    candidates
}

pub fn evaluate_service_option(
    config: &ServiceConfig,
    units_per_month: f64,
    ctx: &OptimizerContext,
) -> ServiceCandidate {
    let units_per_month = finite_non_negative(units_per_month);
    let annual_units = units_per_month * ctx.capacity.active_months;
    let service_days = annual_units * config.days_per_unit.value;
    let travel_days = annual_units * config.travel_days_per_unit.value;
    let hands_on_days = service_days * config.hands_on_weight.value;

    let price = resolve_unit_price(config, ctx.buffer);
    let revenue = annual_units * price.value;

    let usage_share = ratio_or_zero(service_days, ctx.capacity.billable_days_after_travel);
    let fixed_share = resolve_cost_share(config.fixed_cost_share, usage_share);
    let variable_share = resolve_cost_share(config.variable_cost_share, usage_share);
    let fixed_cost = ctx.fixed_costs * fixed_share.value;
    let direct_cost = annual_units * config.direct_cost_per_unit.value
        + fixed_cost
        + ctx.annual_variable_costs * variable_share.value;

    let profit = revenue - direct_cost;
    let tax = profit * ctx.tax_rate;
    let net = profit - tax;
    let gross_margin = ratio_or_zero(profit, revenue);

    let mut violations = Vec::new();
    if annual_units > 0.0 {
        if let Some(floor) = config.pricing.min {
            if price.value < floor - CONSTRAINT_EPS {
                violations.push(Violation::PriceBelowFloor {
                    service: config.id,
                    price: price.value,
                    floor,
                });
            }
        }
        if let Some(ceiling) = config.pricing.stretch {
            if price.value > ceiling + CONSTRAINT_EPS {
                violations.push(Violation::PriceAboveCeiling {
                    service: config.id,
                    price: price.value,
                    ceiling,
                });
            }
        }
        if gross_margin < ctx.comfort_margin - CONSTRAINT_EPS {
            violations.push(Violation::ComfortMarginBreach {
                service: Some(config.id),
                margin: gross_margin,
                floor: ctx.comfort_margin,
            });
        }
    }

    ServiceCandidate {
        service: config.id,
        units_per_month,
        annual_units,
        price_per_unit: price.value,
        price_source: price.source,
        revenue,
        direct_cost,
        fixed_cost,
        tax,
        net,
        service_days,
        travel_days,
        hands_on_days,
        gross_margin,
        violations,
    }
}

pub fn solve_portfolio(configs: &[ServiceConfig], ctx: &OptimizerContext) -> PortfolioSolution {
    optimize_service_mix(configs, ctx, DEFAULT_TOP_N)
}

/// Exhaustive search over every combination of per-service candidates,
/// retaining the `top_n` best in comparator order.
pub fn optimize_service_mix(
    configs: &[ServiceConfig],
    ctx: &OptimizerContext,
    top_n: usize,
) -> PortfolioSolution {
    let top_n = top_n.clamp(1, MAX_TOP_N);
    let mut enabled: Vec<&ServiceConfig> = configs.iter().filter(|c| c.enabled).collect();
    // Unit vectors are compared in service order, whatever order the caller used.
    enabled.sort_by_key(|config| config.id);
    if enabled.is_empty() || ctx.capacity.working_days_per_year <= 0.0 {
        debug!(
            services = enabled.len(),
            working_days = ctx.capacity.working_days_per_year,
            "no services or no working time; returning the zero mix"
        );
        return zero_mix_solution(ctx);
    }

    let lists: Vec<Vec<ServiceCandidate>> = enabled
        .iter()
        .map(|config| build_service_candidates(config, ctx))
        .collect();
    let violation_counts: Vec<Vec<usize>> = lists
        .iter()
        .map(|list| list.iter().map(|c| c.violations.len()).collect())
        .collect();

    let mut diagnostics = SearchDiagnostics {
        candidate_counts: enabled
            .iter()
            .zip(&lists)
            .map(|(config, list)| (config.id, list.len()))
            .collect(),
        combinations_total: lists
            .iter()
            .map(|list| list.len() as u64)
            .fold(1u64, u64::saturating_mul),
        ..SearchDiagnostics::default()
    };

    let mut retained: Vec<(Outcome, Vec<usize>)> = Vec::with_capacity(top_n + 1);
    let mut counters = vec![0usize; lists.len()];
    let mut picks: Vec<&ServiceCandidate> = Vec::with_capacity(lists.len());

    'search: loop {
        let service_violations: usize = counters
            .iter()
            .enumerate()
            .map(|(service, &idx)| violation_counts[service][idx])
            .sum();

        let prune = retained.len() == top_n
            && retained
                .last()
                .is_some_and(|(worst, _)| service_violations > worst.violation_count);
        if prune {
            diagnostics.combinations_pruned += 1;
        } else {
            diagnostics.combinations_evaluated += 1;
            picks.clear();
            picks.extend(counters.iter().enumerate().map(|(s, &idx)| &lists[s][idx]));
            let (totals, portfolio_violations) = aggregate_totals(&picks, ctx);
            let outcome = Outcome {
                violation_count: service_violations + portfolio_violations.len(),
                meets_target: totals.net_gap >= -TARGET_EPS,
                net_gap: totals.net_gap,
                net: totals.net,
            };
            retain(&mut retained, outcome, &counters, top_n);
        }

        // Odometer advance: the last service turns fastest.
        let mut position = counters.len();
        loop {
            if position == 0 {
                break 'search;
            }
            position -= 1;
            counters[position] += 1;
            if counters[position] < lists[position].len() {
                break;
            }
            counters[position] = 0;
        }
    }
    diagnostics.iterations = diagnostics.combinations_evaluated + diagnostics.combinations_pruned;

    let top: Vec<PortfolioCandidate> = retained
        .iter()
        .map(|(_, indices)| {
            let services: Vec<ServiceCandidate> = indices
                .iter()
                .enumerate()
                .map(|(s, &idx)| lists[s][idx].clone())
                .collect();
            build_portfolio_candidate(services, ctx)
        })
        .collect();

    let best = top
        .first()
        .cloned()
        .unwrap_or_else(|| zero_mix_candidate(ctx));
    diagnostics.violations = best.all_violations();

    debug!(
        evaluated = diagnostics.combinations_evaluated,
        pruned = diagnostics.combinations_pruned,
        best_net = best.totals.net,
        target_net = ctx.target_net,
        violations = best.violation_count,
        "service mix search finished"
    );

    PortfolioSolution {
        best,
        top,
        diagnostics,
    }
}

/// Inserts a combination into the sorted retained list, keeping at most `top_n`.
/// Candidate lists are sorted by units, so index order equals unit order.
fn retain(
    retained: &mut Vec<(Outcome, Vec<usize>)>,
    outcome: Outcome,
    indices: &[usize],
    top_n: usize,
) {
    let position = retained.partition_point(|(other, other_indices)| {
        compare_outcomes(other, &outcome)
            .then_with(|| other_indices.as_slice().cmp(indices))
            == Ordering::Less
    });
    if position >= top_n {
        return;
    }
    retained.insert(position, (outcome, indices.to_vec()));
    retained.truncate(top_n);
}

fn aggregate_totals(
    picks: &[&ServiceCandidate],
    ctx: &OptimizerContext,
) -> (PortfolioTotals, Vec<Violation>) {
    let mut revenue = 0.0;
    let mut direct_cost = 0.0;
    let mut tax = 0.0;
    let mut service_days = 0.0;
    let mut travel_days = 0.0;
    let mut hands_on_days = 0.0;
    let mut allocated_fixed = 0.0;
    for pick in picks {
        revenue += pick.revenue;
        direct_cost += pick.direct_cost;
        tax += pick.tax;
        service_days += pick.service_days;
        travel_days += pick.travel_days;
        hands_on_days += pick.hands_on_days;
        allocated_fixed += pick.fixed_cost;
    }
    // The portfolio always carries the full fixed costs; the remainder is
    // deductible like any other cost.
    let unallocated_fixed_costs = (ctx.fixed_costs - allocated_fixed).max(0.0);
    let direct_cost = direct_cost + unallocated_fixed_costs;
    let tax = (tax - unallocated_fixed_costs * ctx.tax_rate).max(0.0);
    let net = revenue - direct_cost - tax;
    let vat = revenue * ctx.vat_rate;
    let totals = PortfolioTotals {
        revenue,
        direct_cost,
        unallocated_fixed_costs,
        tax,
        net,
        service_days,
        travel_days,
        hands_on_days,
        hands_on_share: ratio_or_zero(hands_on_days, service_days),
        gross_margin: ratio_or_zero(revenue - direct_cost, revenue),
        net_gap: net - ctx.target_net,
        vat,
        revenue_incl_vat: revenue + vat,
    };
    let violations = portfolio_violations(&totals, ctx);
    (totals, violations)
}

fn portfolio_violations(totals: &PortfolioTotals, ctx: &OptimizerContext) -> Vec<Violation> {
    let mut violations = Vec::new();
    if totals.service_days > ctx.max_service_days + CONSTRAINT_EPS {
        violations.push(Violation::ServiceDaysExceeded {
            days: totals.service_days,
            cap: ctx.max_service_days,
        });
    }
    if totals.travel_days > ctx.max_travel_days + CONSTRAINT_EPS {
        violations.push(Violation::TravelDaysExceeded {
            days: totals.travel_days,
            cap: ctx.max_travel_days,
        });
    }
    if ctx.hands_on_target > 0.0 && totals.service_days > 0.0 {
        let min = (ctx.hands_on_target - ctx.hands_on_tolerance).max(0.0);
        let max = (ctx.hands_on_target + ctx.hands_on_tolerance).min(1.0);
        if totals.hands_on_share < min - CONSTRAINT_EPS
            || totals.hands_on_share > max + CONSTRAINT_EPS
        {
            violations.push(Violation::HandsOnOutOfBand {
                share: totals.hands_on_share,
                min,
                max,
            });
        }
    }
    if totals.revenue > 0.0 && totals.gross_margin < ctx.comfort_margin - CONSTRAINT_EPS {
        violations.push(Violation::ComfortMarginBreach {
            service: None,
            margin: totals.gross_margin,
            floor: ctx.comfort_margin,
        });
    }
    violations
}

fn build_portfolio_candidate(
    services: Vec<ServiceCandidate>,
    ctx: &OptimizerContext,
) -> PortfolioCandidate {
    let picks: Vec<&ServiceCandidate> = services.iter().collect();
    let (totals, violations) = aggregate_totals(&picks, ctx);
    let service_violations: usize = services.iter().map(|s| s.violations.len()).sum();
    let violation_count = service_violations + violations.len();
    let meets_target = totals.net_gap >= -TARGET_EPS;
    PortfolioCandidate {
        services,
        fit_score: fit_score(&totals, violation_count, ctx.target_net),
        totals,
        violations,
        violation_count,
        meets_target,
    }
}

/// 1.0 for a violation-free mix exactly on target, shrinking with the relative
/// gap and with every violation.
fn fit_score(totals: &PortfolioTotals, violation_count: usize, target_net: f64) -> f64 {
    let closeness = if target_net > 0.0 {
        (1.0 - totals.net_gap.abs() / target_net).clamp(0.0, 1.0)
    } else if totals.net >= 0.0 {
        1.0
    } else {
        0.0
    };
    closeness / (1.0 + violation_count as f64)
}

pub fn zero_mix_candidate(ctx: &OptimizerContext) -> PortfolioCandidate {
    let totals = PortfolioTotals {
        net_gap: -ctx.target_net,
        ..PortfolioTotals::default()
    };
    PortfolioCandidate {
        services: Vec::new(),
        fit_score: fit_score(&totals, 0, ctx.target_net),
        totals,
        violations: Vec::new(),
        violation_count: 0,
        meets_target: ctx.target_net <= 0.0,
    }
}

fn zero_mix_solution(ctx: &OptimizerContext) -> PortfolioSolution {
    let best = zero_mix_candidate(ctx);
    PortfolioSolution {
        top: vec![best.clone()],
        best,
        diagnostics: SearchDiagnostics::default(),
    }
}
