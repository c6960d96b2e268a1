mod capacity;
mod costs;
mod income;
mod optimizer;
mod scenario;
mod services;
mod tax;
mod types;

pub use capacity::{CapacityMetrics, derive_capacity};
pub use costs::{CostMetrics, derive_costs};
pub use income::{IncomeTargets, resolve_income_targets};
pub use optimizer::{
    DEFAULT_TOP_N, MAX_TOP_N, OptimizerContext, PortfolioCandidate, PortfolioSolution,
    PortfolioTotals, SearchDiagnostics, ServiceCandidate, Violation, build_service_candidates,
    build_unit_range, compare_candidates, evaluate_service_option, optimize_service_mix,
    solve_portfolio,
};
pub use scenario::{
    RevenueRequirement, ScenarioReport, SweepParameter, SweepPoint, revenue_requirement,
    run_sensitivity_sweep, solve_scenario,
};
pub use services::{
    ConfigSource, Resolved, SERVICE_DEFAULTS, ServiceConfig, ServiceDefaults, ServiceId,
    resolve_service_configs, service_defaults,
};
pub use tax::{
    DutchDeductions, TaxBreakdown, calculate_tax_reserve, compute_tax_breakdown,
    solve_profit_for_net,
};
pub use types::{
    IncomeBasis, IncomeMode, IncomeTargetsInput, ScenarioInput, ServiceOverride, TaxMode,
};
