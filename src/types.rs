use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::solver::SolverOptions;

/// A supplier with a finite output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub id: String,
    pub supply: u64,
    /// Cost per unit shipped to any sink without a per-pair override.
    pub unit_cost: f64,
}

/// A storage point that must receive exactly `demand` units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sink {
    pub id: String,
    pub demand: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u64>,
}

/// Whether a source may leave units unshipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SupplyPolicy {
    #[default]
    AtMost,
    Exact,
}

/// Source id → sink id → cost per unit.
pub type CostOverrides = BTreeMap<String, BTreeMap<String, f64>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemInstance {
    pub sources: Vec<Source>,
    pub sinks: Vec<Sink>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub costs: CostOverrides,
    #[serde(default)]
    pub supply_policy: SupplyPolicy,
}

impl ProblemInstance {
    pub fn new(sources: Vec<Source>, sinks: Vec<Sink>) -> Self {
        Self {
            sources,
            sinks,
            costs: BTreeMap::new(),
            supply_policy: SupplyPolicy::default(),
        }
    }

    /// Override the cost of one (source, sink) pair.
    pub fn with_cost(mut self, source: &str, sink: &str, cost: f64) -> Self {
        self.costs
            .entry(source.to_owned())
            .or_default()
            .insert(sink.to_owned(), cost);
        self
    }

    pub fn with_supply_policy(mut self, policy: SupplyPolicy) -> Self {
        self.supply_policy = policy;
        self
    }

    /// Cost per unit from `sources[source]` to `sinks[sink]`.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range.
    pub fn cost(&self, source: usize, sink: usize) -> f64 {
        let src = &self.sources[source];
        self.costs
            .get(&src.id)
            .and_then(|row| row.get(&self.sinks[sink].id))
            .copied()
            .unwrap_or(src.unit_cost)
    }

    /// Sum of all supplies, or `None` if it does not fit in a `u64`.
    pub fn total_supply(&self) -> Option<u64> {
        self.sources
            .iter()
            .try_fold(0u64, |total, s| total.checked_add(s.supply))
    }

    /// Sum of all demands, or `None` if it does not fit in a `u64`.
    pub fn total_demand(&self) -> Option<u64> {
        self.sinks
            .iter()
            .try_fold(0u64, |total, s| total.checked_add(s.demand))
    }
}

impl Source {
    pub fn new(id: impl Into<String>, supply: u64, unit_cost: f64) -> Self {
        Self {
            id: id.into(),
            supply,
            unit_cost,
        }
    }
}

impl Sink {
    pub fn new(id: impl Into<String>, demand: u64) -> Self {
        Self {
            id: id.into(),
            demand,
            capacity: None,
        }
    }

    pub fn with_capacity(mut self, capacity: u64) -> Self {
        self.capacity = Some(capacity);
        self
    }
}

/// A YAML input file: the instance plus an optional `solver:` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Input {
    #[serde(flatten)]
    pub instance: ProblemInstance,
    #[serde(default)]
    pub solver: SolverOptions,
}

/// The report handed to presentation layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Solution {
    #[serde(default)]
    pub shipments: BTreeMap<String, BTreeMap<String, u64>>,
    pub total_cost: f64,
    /// Units arriving at each sink.
    pub received: BTreeMap<String, u64>,
}
