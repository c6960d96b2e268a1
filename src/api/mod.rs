use axum::{
    Router,
    extract::Query,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::core::{
    DEFAULT_TOP_N, IncomeBasis, IncomeMode, MAX_TOP_N, ScenarioInput, ScenarioReport,
    ServiceConfig, SweepParameter, SweepPoint, TaxMode, resolve_service_configs,
    run_sensitivity_sweep, solve_scenario,
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to read scenario file {path}: {source}")]
    ScenarioRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid scenario JSON: {0}")]
    ScenarioJson(#[from] serde_json::Error),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
    #[error("solver task failed: {0}")]
    Task(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::ScenarioJson(_) | AppError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            AppError::ScenarioRead { .. } | AppError::Server(_) | AppError::Task(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliIncomeMode {
    Net,
    Gross,
}

impl From<CliIncomeMode> for IncomeMode {
    fn from(value: CliIncomeMode) -> Self {
        match value {
            CliIncomeMode::Net => IncomeMode::Net,
            CliIncomeMode::Gross => IncomeMode::Gross,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliIncomeBasis {
    Year,
    Week,
    Month,
    AvgWeek,
    AvgMonth,
}

impl From<CliIncomeBasis> for IncomeBasis {
    fn from(value: CliIncomeBasis) -> Self {
        match value {
            CliIncomeBasis::Year => IncomeBasis::Year,
            CliIncomeBasis::Week => IncomeBasis::Week,
            CliIncomeBasis::Month => IncomeBasis::Month,
            CliIncomeBasis::AvgWeek => IncomeBasis::AvgWeek,
            CliIncomeBasis::AvgMonth => IncomeBasis::AvgMonth,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliTaxMode {
    Simple,
    #[value(alias = "dutch")]
    Dutch2025,
}

impl From<CliTaxMode> for TaxMode {
    fn from(value: CliTaxMode) -> Self {
        match value {
            CliTaxMode::Simple => TaxMode::Simple,
            CliTaxMode::Dutch2025 => TaxMode::Dutch2025,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliSweepParameter {
    Utilization,
    MonthsOff,
    Target,
    TaxRate,
    FixedCosts,
}

impl From<CliSweepParameter> for SweepParameter {
    fn from(value: CliSweepParameter) -> Self {
        match value {
            CliSweepParameter::Utilization => SweepParameter::UtilizationPercent,
            CliSweepParameter::MonthsOff => SweepParameter::MonthsOff,
            CliSweepParameter::Target => SweepParameter::TargetValue,
            CliSweepParameter::TaxRate => SweepParameter::TaxRatePercent,
            CliSweepParameter::FixedCosts => SweepParameter::FixedCosts,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "mixplan",
    about = "Service mix planner: capacity, tax reserve and the service portfolio that meets an income target"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Solve one scenario and print the report as JSON
    Solve(SolveArgs),
    /// Re-solve a scenario across values of one parameter
    Sweep(SweepArgs),
    /// Print the built-in service defaults
    Defaults {
        #[arg(long)]
        pretty: bool,
    },
    /// Start the JSON HTTP API
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

#[derive(Args, Debug, Clone, Default)]
struct ScenarioArgs {
    #[arg(long, help = "Scenario JSON file; built-in defaults when omitted")]
    scenario: Option<PathBuf>,
    #[arg(long, help = "Income target at the selected basis")]
    target: Option<f64>,
    #[arg(long, value_enum)]
    basis: Option<CliIncomeBasis>,
    #[arg(long, value_enum, help = "Whether the target is net income or gross profit")]
    mode: Option<CliIncomeMode>,
    #[arg(long, value_enum)]
    tax_mode: Option<CliTaxMode>,
    #[arg(long, help = "Utilization in percent of working days")]
    utilization: Option<f64>,
    #[arg(long)]
    months_off: Option<f64>,
}

#[derive(Args, Debug, Clone)]
struct SolveArgs {
    #[command(flatten)]
    scenario: ScenarioArgs,
    #[arg(long, default_value_t = DEFAULT_TOP_N, help = "Number of ranked mixes to return")]
    top: usize,
    #[arg(long)]
    pretty: bool,
}

#[derive(Args, Debug, Clone)]
struct SweepArgs {
    #[command(flatten)]
    scenario: ScenarioArgs,
    #[arg(long, value_enum)]
    parameter: CliSweepParameter,
    #[arg(long, value_delimiter = ',', num_args = 1.., required = true)]
    values: Vec<f64>,
    #[arg(long)]
    pretty: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SolveQuery {
    top_n: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SweepRequest {
    #[serde(default)]
    scenario: ScenarioInput,
    parameter: SweepParameter,
    values: Vec<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DefaultsResponse {
    default_top_n: usize,
    max_top_n: usize,
    services: Vec<ServiceConfig>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub const DEFAULT_LOG_FILTER: &str = "info";

/// Log filter from `RUST_LOG`, or `info` when it is unset or unparsable.
pub fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

pub async fn run(cli: Cli) -> Result<(), AppError> {
    match cli.command {
        Command::Solve(args) => {
            let report = solve_from_args(&args)?;
            print_json(&report, args.pretty)
        }
        Command::Sweep(args) => {
            let points = sweep_from_args(&args)?;
            print_json(&points, args.pretty)
        }
        Command::Defaults { pretty } => print_json(&defaults_response(), pretty),
        Command::Serve { port } => run_http_server(port).await,
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<(), AppError> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{text}");
    Ok(())
}

fn solve_from_args(args: &SolveArgs) -> Result<ScenarioReport, AppError> {
    validate_top_n(args.top).map_err(AppError::InvalidArgument)?;
    let scenario = load_scenario(&args.scenario)?;
    let report = solve_scenario(&scenario, args.top);

    let best = &report.portfolio.best;
    for violation in best.all_violations() {
        warn!(%violation, "best mix violates a constraint");
    }
    info!(
        net = best.totals.net,
        target_net = report.target_net,
        meets_target = best.meets_target,
        "scenario solved"
    );
    Ok(report)
}

fn sweep_from_args(args: &SweepArgs) -> Result<Vec<SweepPoint>, AppError> {
    validate_sweep_values(&args.values).map_err(AppError::InvalidArgument)?;
    let scenario = load_scenario(&args.scenario)?;
    Ok(run_sensitivity_sweep(
        &scenario,
        args.parameter.into(),
        &args.values,
    ))
}

/// Defaults, then the scenario file, then individual flags.
fn load_scenario(args: &ScenarioArgs) -> Result<ScenarioInput, AppError> {
    validate_overrides(args).map_err(AppError::InvalidArgument)?;
    let mut scenario = match &args.scenario {
        Some(path) => read_scenario_file(path)?,
        None => ScenarioInput::default(),
    };
    apply_overrides(&mut scenario, args);
    Ok(scenario)
}

fn read_scenario_file(path: &Path) -> Result<ScenarioInput, AppError> {
    let text = fs::read_to_string(path).map_err(|source| AppError::ScenarioRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&text)?)
}

fn validate_overrides(args: &ScenarioArgs) -> Result<(), String> {
    if let Some(target) = args.target {
        if !target.is_finite() || target < 0.0 {
            return Err("--target must be a number >= 0".to_string());
        }
    }
    if let Some(utilization) = args.utilization {
        if !(0.0..=100.0).contains(&utilization) {
            return Err("--utilization must be between 0 and 100".to_string());
        }
    }
    if let Some(months_off) = args.months_off {
        if !(0.0..=12.0).contains(&months_off) {
            return Err("--months-off must be between 0 and 12".to_string());
        }
    }
    Ok(())
}

fn validate_top_n(top_n: usize) -> Result<(), String> {
    if !(1..=MAX_TOP_N).contains(&top_n) {
        return Err(format!("--top must be between 1 and {MAX_TOP_N}"));
    }
    Ok(())
}

fn validate_sweep_values(values: &[f64]) -> Result<(), String> {
    if values.is_empty() {
        return Err("--values must list at least one number".to_string());
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err("--values must all be finite numbers".to_string());
    }
    Ok(())
}

fn apply_overrides(scenario: &mut ScenarioInput, args: &ScenarioArgs) {
    if let Some(mode) = args.mode {
        scenario.income_targets.mode = mode.into();
    }
    if let Some(basis) = args.basis {
        scenario.income_targets.basis = basis.into();
    }
    if let Some(target) = args.target {
        let basis = scenario.income_targets.basis;
        scenario.income_targets.set_value_at(basis, target);
    }
    if let Some(tax_mode) = args.tax_mode {
        scenario.tax.mode = tax_mode.into();
    }
    if let Some(utilization) = args.utilization {
        scenario.capacity.utilization_percent = Some(utilization);
    }
    if let Some(months_off) = args.months_off {
        scenario.capacity.months_off = Some(months_off);
    }
}

fn defaults_response() -> DefaultsResponse {
    DefaultsResponse {
        default_top_n: DEFAULT_TOP_N,
        max_top_n: MAX_TOP_N,
        services: resolve_service_configs(&BTreeMap::new()),
    }
}

fn app() -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/defaults", get(defaults_handler))
        .route("/api/solve", post(solve_handler))
        .route("/api/sweep", post(sweep_handler))
        .fallback(not_found_handler)
}

pub async fn run_http_server(port: u16) -> Result<(), AppError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "mixplan HTTP API listening");
    info!("local access: http://127.0.0.1:{port}/health");

    axum::serve(listener, app()).await?;
    Ok(())
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn defaults_handler() -> Response {
    json_response(StatusCode::OK, defaults_response())
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn solve_handler(Query(query): Query<SolveQuery>, body: String) -> Response {
    let result = match solve_request(&query, &body) {
        Ok((scenario, top_n)) => {
            run_blocking(move || solve_scenario(&scenario, top_n)).await
        }
        Err(err) => Err(err),
    };
    result_response(result)
}

async fn sweep_handler(body: String) -> Response {
    let result = match sweep_request(&body) {
        Ok(request) => {
            run_blocking(move || {
                run_sensitivity_sweep(&request.scenario, request.parameter, &request.values)
            })
            .await
        }
        Err(err) => Err(err),
    };
    result_response(result)
}

/// An empty body solves the built-in defaults.
fn solve_request(query: &SolveQuery, body: &str) -> Result<(ScenarioInput, usize), AppError> {
    let top_n = query.top_n.unwrap_or(DEFAULT_TOP_N);
    validate_top_n(top_n)
        .map_err(|msg| AppError::InvalidArgument(msg.replace("--top", "topN")))?;
    let scenario = if body.trim().is_empty() {
        ScenarioInput::default()
    } else {
        serde_json::from_str(body)?
    };
    Ok((scenario, top_n))
}

fn sweep_request(body: &str) -> Result<SweepRequest, AppError> {
    let request: SweepRequest = serde_json::from_str(body)?;
    validate_sweep_values(&request.values)
        .map_err(|msg| AppError::InvalidArgument(msg.replace("--values", "values")))?;
    Ok(request)
}

async fn run_blocking<T, F>(work: F) -> Result<T, AppError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| AppError::Task(err.to_string()))
}

fn result_response<T: Serialize>(result: Result<T, AppError>) -> Response {
    match result {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(err) => {
            let status = err.status();
            if status.is_server_error() {
                warn!(error = %err, "request failed");
            }
            error_response(status, &err.to_string())
        }
    }
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, axum::Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
