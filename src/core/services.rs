use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{PricingFence, ServiceOverride};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceId {
    Representation,
    Ops,
    Qc,
    Training,
    Intel,
}

impl ServiceId {
    pub const ALL: [ServiceId; 5] = [
        ServiceId::Representation,
        ServiceId::Ops,
        ServiceId::Qc,
        ServiceId::Training,
        ServiceId::Intel,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ServiceId::Representation => "representation",
            ServiceId::Ops => "ops",
            ServiceId::Qc => "qc",
            ServiceId::Training => "training",
            ServiceId::Intel => "intel",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|id| id.as_str().eq_ignore_ascii_case(raw))
    }

    /// Services counted as hands-on work when nothing else is configured.
    pub fn hands_on_by_default(self) -> bool {
        matches!(self, ServiceId::Ops | ServiceId::Qc | ServiceId::Training)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServiceDefaults {
    pub id: ServiceId,
    pub label: &'static str,
    pub share_of_capacity: f64,
    pub days_per_unit: f64,
    pub base_price: f64,
    pub direct_cost_per_unit: f64,
    pub fixed_cost_share: f64,
    pub pricing: PricingFence,
    pub travel_days_per_unit: f64,
}

const fn fence(min: f64, target: f64, stretch: f64) -> PricingFence {
    PricingFence {
        min: Some(min),
        target: Some(target),
        stretch: Some(stretch),
    }
}

pub const SERVICE_DEFAULTS: [ServiceDefaults; 5] = [
    ServiceDefaults {
        id: ServiceId::Representation,
        label: "Representation",
        share_of_capacity: 0.25,
        days_per_unit: 1.0,
        base_price: 600.0,
        direct_cost_per_unit: 15.0,
        fixed_cost_share: 0.25,
        pricing: fence(450.0, 600.0, 950.0),
        travel_days_per_unit: 0.0,
    },
    ServiceDefaults {
        id: ServiceId::Ops,
        label: "Operations support",
        share_of_capacity: 0.25,
        days_per_unit: 0.5,
        base_price: 320.0,
        direct_cost_per_unit: 10.0,
        fixed_cost_share: 0.25,
        pricing: fence(240.0, 320.0, 520.0),
        travel_days_per_unit: 0.0,
    },
    ServiceDefaults {
        id: ServiceId::Qc,
        label: "Quality control",
        share_of_capacity: 0.20,
        days_per_unit: 0.5,
        base_price: 300.0,
        direct_cost_per_unit: 5.0,
        fixed_cost_share: 0.20,
        pricing: fence(220.0, 300.0, 480.0),
        travel_days_per_unit: 0.0,
    },
    ServiceDefaults {
        id: ServiceId::Training,
        label: "Training",
        share_of_capacity: 0.15,
        days_per_unit: 1.0,
        base_price: 750.0,
        direct_cost_per_unit: 40.0,
        fixed_cost_share: 0.15,
        pricing: fence(550.0, 750.0, 1_200.0),
        travel_days_per_unit: 0.0,
    },
    ServiceDefaults {
        id: ServiceId::Intel,
        label: "Market intelligence",
        share_of_capacity: 0.15,
        days_per_unit: 2.0,
        base_price: 1_100.0,
        direct_cost_per_unit: 25.0,
        fixed_cost_share: 0.15,
        pricing: fence(800.0, 1_100.0, 1_800.0),
        travel_days_per_unit: 0.0,
    },
];

pub fn service_defaults(id: ServiceId) -> &'static ServiceDefaults {
    SERVICE_DEFAULTS
        .iter()
        .find(|defaults| defaults.id == id)
        .unwrap_or(&SERVICE_DEFAULTS[0])
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfigSource {
    Override,
    Default,
    FenceTarget,
    Computed,
}

/// A configuration value together with where it came from.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct Resolved<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> Resolved<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Fully merged configuration of one service line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    pub id: ServiceId,
    pub label: &'static str,
    pub enabled: bool,
    pub share_of_capacity: Resolved<f64>,
    pub days_per_unit: Resolved<f64>,
    pub base_price: Resolved<f64>,
    /// Price that bypasses the buffer markup when set.
    pub locked_price: Option<f64>,
    pub direct_cost_per_unit: Resolved<f64>,
    pub fixed_cost_share: Option<Resolved<f64>>,
    pub variable_cost_share: Option<Resolved<f64>>,
    pub units_per_month: Option<f64>,
    pub units_per_year: Option<f64>,
    pub pricing: PricingFence,
    pub hands_on_weight: Resolved<f64>,
    pub travel_days_per_unit: Resolved<f64>,
}

impl ServiceConfig {
    pub fn from_defaults(defaults: &ServiceDefaults) -> Self {
        resolve_service_config(defaults, &ServiceOverride::default())
    }
}

/// Builds the merged configuration of every service, in `ServiceId::ALL` order.
pub fn resolve_service_configs(overrides: &BTreeMap<String, ServiceOverride>) -> Vec<ServiceConfig> {
    let mut by_id: BTreeMap<ServiceId, &ServiceOverride> = BTreeMap::new();
    for (key, service_override) in overrides {
        match ServiceId::parse(key) {
            Some(id) => {
                by_id.insert(id, service_override);
            }
            None => debug!(service = %key, "ignoring override for unknown service"),
        }
    }

    let empty = ServiceOverride::default();
    SERVICE_DEFAULTS
        .iter()
        .map(|defaults| {
            let service_override = by_id.get(&defaults.id).copied().unwrap_or(&empty);
            resolve_service_config(defaults, service_override)
        })
        .collect()
}

pub fn resolve_service_config(
    defaults: &ServiceDefaults,
    service_override: &ServiceOverride,
) -> ServiceConfig {
    let pricing = merge_fence(&defaults.pricing, service_override.pricing.as_ref());

    ServiceConfig {
        id: defaults.id,
        label: defaults.label,
        enabled: service_override.enabled.unwrap_or(true),
        share_of_capacity: merge_bounded(
            service_override.share_of_capacity,
            defaults.share_of_capacity,
            0.0,
            1.0,
        ),
        days_per_unit: resolve_days_per_unit(service_override.days_per_unit, defaults.days_per_unit),
        base_price: resolve_base_price(service_override.base_price, defaults.base_price, &pricing),
        locked_price: positive(service_override.price_per_unit),
        direct_cost_per_unit: merge_bounded(
            service_override.direct_cost_per_unit,
            defaults.direct_cost_per_unit,
            0.0,
            f64::MAX,
        ),
        // A negative override drops the configured share so usage decides.
        fixed_cost_share: match service_override.fixed_cost_share {
            Some(share) if share.is_finite() && share < 0.0 => None,
            share => Some(merge_bounded(share, defaults.fixed_cost_share, 0.0, 1.0)),
        },
        variable_cost_share: service_override
            .variable_cost_share
            .filter(|share| share.is_finite())
            .map(|share| Resolved::new(share.clamp(0.0, 1.0), ConfigSource::Override)),
        units_per_month: non_negative(service_override.units_per_month),
        units_per_year: non_negative(service_override.units_per_year),
        pricing,
        hands_on_weight: resolve_hands_on_weight(
            defaults.id,
            service_override.hands_on_weight,
            service_override.hands_on,
        ),
        travel_days_per_unit: merge_bounded(
            service_override.travel_days_per_unit,
            defaults.travel_days_per_unit,
            0.0,
            f64::MAX,
        ),
    }
}

/// Explicit weight first, then the boolean flag, then the built-in hands-on set.
pub fn resolve_hands_on_weight(
    id: ServiceId,
    weight: Option<f64>,
    hands_on: Option<bool>,
) -> Resolved<f64> {
    if let Some(weight) = weight.filter(|w| w.is_finite()) {
        return Resolved::new(weight.clamp(0.0, 1.0), ConfigSource::Override);
    }
    if let Some(flag) = hands_on {
        return Resolved::new(if flag { 1.0 } else { 0.0 }, ConfigSource::Override);
    }
    let weight = if id.hands_on_by_default() { 1.0 } else { 0.0 };
    Resolved::new(weight, ConfigSource::Default)
}

/// Base price, falling back to the fence target when no positive price is configured.
pub fn resolve_base_price(
    override_price: Option<f64>,
    default_price: f64,
    pricing: &PricingFence,
) -> Resolved<f64> {
    if let Some(price) = positive(override_price) {
        return Resolved::new(price, ConfigSource::Override);
    }
    if override_price.is_none() && default_price > 0.0 {
        return Resolved::new(default_price, ConfigSource::Default);
    }
    match positive(pricing.target) {
        Some(target) => Resolved::new(target, ConfigSource::FenceTarget),
        None => Resolved::new(0.0, ConfigSource::Computed),
    }
}

/// Per-unit selling price: a locked price as-is, otherwise base price plus buffer.
pub fn resolve_unit_price(config: &ServiceConfig, buffer: f64) -> Resolved<f64> {
    match config.locked_price {
        Some(price) => Resolved::new(price, ConfigSource::Override),
        None => Resolved::new(
            config.base_price.value * (1.0 + buffer.max(0.0)),
            ConfigSource::Computed,
        ),
    }
}

/// Configured cost share, or the service's share of billable days.
pub fn resolve_cost_share(configured: Option<Resolved<f64>>, usage_share: f64) -> Resolved<f64> {
    configured.unwrap_or_else(|| {
        let usage = if usage_share.is_finite() {
            usage_share.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Resolved::new(usage, ConfigSource::Computed)
    })
}

fn resolve_days_per_unit(override_days: Option<f64>, default_days: f64) -> Resolved<f64> {
    match positive(override_days) {
        Some(days) => Resolved::new(days, ConfigSource::Override),
        None => Resolved::new(default_days, ConfigSource::Default),
    }
}

fn merge_bounded(override_value: Option<f64>, default_value: f64, min: f64, max: f64) -> Resolved<f64> {
    match override_value.filter(|v| v.is_finite()) {
        Some(value) => Resolved::new(value.clamp(min, max), ConfigSource::Override),
        None => Resolved::new(default_value.clamp(min, max), ConfigSource::Default),
    }
}

fn merge_fence(defaults: &PricingFence, fence_override: Option<&PricingFence>) -> PricingFence {
    let Some(fence_override) = fence_override else {
        return *defaults;
    };
    PricingFence {
        min: non_negative(fence_override.min).or(defaults.min),
        target: non_negative(fence_override.target).or(defaults.target),
        stretch: non_negative(fence_override.stretch).or(defaults.stretch),
    }
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

fn non_negative(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v >= 0.0)
}
