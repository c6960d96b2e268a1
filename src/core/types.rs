use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IncomeMode {
    #[default]
    Net,
    Gross,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IncomeBasis {
    #[default]
    Year,
    Week,
    Month,
    #[serde(alias = "avg-week", alias = "avg_week")]
    AvgWeek,
    #[serde(alias = "avg-month", alias = "avg_month")]
    AvgMonth,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
pub enum TaxMode {
    #[default]
    #[serde(rename = "simple", alias = "manual")]
    Simple,
    #[serde(rename = "dutch2025", alias = "dutch", alias = "dutch-2025")]
    Dutch2025,
}

/// Time-off and utilization inputs, as entered.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CapacityInput {
    #[serde(deserialize_with = "lenient_number")]
    pub months_off: Option<f64>,
    #[serde(deserialize_with = "lenient_number", alias = "weeksOffPerCycle")]
    pub weeks_off_cycle: Option<f64>,
    #[serde(deserialize_with = "lenient_number", alias = "daysOffPerWeek")]
    pub days_off_week: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub utilization_percent: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub session_length: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModifiersInput {
    #[serde(deserialize_with = "lenient_number")]
    pub seasonality_percent: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub travel_friction_percent: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub hands_on_quota_percent: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub hands_on_tolerance_percent: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub comfort_margin_percent: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub travel_days_per_year: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub travel_days_per_month: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub travel_days_per_cycle: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CostsInput {
    #[serde(deserialize_with = "lenient_number")]
    pub tax_rate_percent: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub fixed_costs: Option<f64>,
    #[serde(deserialize_with = "lenient_number", alias = "variableCostPerClass")]
    pub variable_cost_per_day: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub vat_rate_percent: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub buffer_percent: Option<f64>,
    #[serde(deserialize_with = "lenient_or_default")]
    pub currency_symbol: Option<String>,
}

/// Income target as entered at one basis; the other basis values are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IncomeTargetsInput {
    #[serde(deserialize_with = "lenient_or_default")]
    pub mode: IncomeMode,
    #[serde(deserialize_with = "lenient_or_default")]
    pub basis: IncomeBasis,
    #[serde(deserialize_with = "lenient_number")]
    pub year: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub week: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub month: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub avg_week: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub avg_month: Option<f64>,
}

impl IncomeTargetsInput {
    pub fn value_at(&self, basis: IncomeBasis) -> Option<f64> {
        match basis {
            IncomeBasis::Year => self.year,
            IncomeBasis::Week => self.week,
            IncomeBasis::Month => self.month,
            IncomeBasis::AvgWeek => self.avg_week,
            IncomeBasis::AvgMonth => self.avg_month,
        }
    }

    pub fn set_value_at(&mut self, basis: IncomeBasis, value: f64) {
        let slot = match basis {
            IncomeBasis::Year => &mut self.year,
            IncomeBasis::Week => &mut self.week,
            IncomeBasis::Month => &mut self.month,
            IncomeBasis::AvgWeek => &mut self.avg_week,
            IncomeBasis::AvgMonth => &mut self.avg_month,
        };
        *slot = Some(value);
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TaxInput {
    #[serde(deserialize_with = "lenient_or_default")]
    pub mode: TaxMode,
    #[serde(deserialize_with = "lenient_bool")]
    pub zelfstandigenaftrek: Option<bool>,
    #[serde(deserialize_with = "lenient_bool")]
    pub startersaftrek: Option<bool>,
    #[serde(deserialize_with = "lenient_bool")]
    pub mkb_vrijstelling: Option<bool>,
    #[serde(deserialize_with = "lenient_bool")]
    pub zvw: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PricingFence {
    #[serde(deserialize_with = "lenient_number")]
    pub min: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub target: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub stretch: Option<f64>,
}

/// User overrides for one service line. Unset fields keep the service default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceOverride {
    #[serde(deserialize_with = "lenient_bool")]
    pub enabled: Option<bool>,
    #[serde(deserialize_with = "lenient_number")]
    pub share_of_capacity: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub days_per_unit: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub base_price: Option<f64>,
    #[serde(deserialize_with = "lenient_number", alias = "lockedPrice")]
    pub price_per_unit: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub direct_cost_per_unit: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub fixed_cost_share: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub variable_cost_share: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub units_per_month: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub units_per_year: Option<f64>,
    #[serde(deserialize_with = "lenient_or_default")]
    pub pricing: Option<PricingFence>,
    #[serde(deserialize_with = "lenient_number")]
    pub hands_on_weight: Option<f64>,
    #[serde(deserialize_with = "lenient_bool")]
    pub hands_on: Option<bool>,
    #[serde(deserialize_with = "lenient_number")]
    pub travel_days_per_unit: Option<f64>,
}

/// Optimizer-level overrides of the portfolio constraints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConstraintsInput {
    #[serde(deserialize_with = "lenient_number")]
    pub max_service_days: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub max_travel_days: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScenarioInput {
    #[serde(deserialize_with = "lenient_or_default")]
    pub capacity: CapacityInput,
    #[serde(deserialize_with = "lenient_or_default")]
    pub modifiers: ModifiersInput,
    #[serde(deserialize_with = "lenient_or_default")]
    pub costs: CostsInput,
    #[serde(deserialize_with = "lenient_or_default")]
    pub income_targets: IncomeTargetsInput,
    #[serde(deserialize_with = "lenient_or_default")]
    pub tax: TaxInput,
    #[serde(deserialize_with = "lenient_map")]
    pub services: BTreeMap<String, ServiceOverride>,
    #[serde(deserialize_with = "lenient_or_default")]
    pub constraints: ConstraintsInput,
}

/// Finite, non-negative number or `fallback`.
pub(crate) fn non_negative_or(value: Option<f64>, fallback: f64) -> f64 {
    match value {
        Some(v) if v.is_finite() => v.max(0.0),
        _ => fallback,
    }
}

/// Finite number clamped into `[min, max]`, or `fallback` when missing.
pub(crate) fn clamp_or(value: Option<f64>, fallback: f64, min: f64, max: f64) -> f64 {
    match value {
        Some(v) if v.is_finite() => v.clamp(min, max),
        _ => fallback.clamp(min, max),
    }
}

/// `numerator / denominator`, or 0 when the denominator is not a positive finite number.
pub(crate) fn ratio_or_zero(numerator: f64, denominator: f64) -> f64 {
    if denominator.is_finite() && denominator > 0.0 && numerator.is_finite() {
        numerator / denominator
    } else {
        0.0
    }
}

pub(crate) fn number_from_value(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number_from_value(&value))
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => Some(b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

fn lenient_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

fn lenient_map<'de, D, T>(deserializer: D) -> Result<BTreeMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Object(entries) = value else {
        return Ok(BTreeMap::new());
    };
    Ok(entries
        .into_iter()
        .map(|(key, entry)| (key, T::deserialize(entry).unwrap_or_default()))
        .collect())
}
