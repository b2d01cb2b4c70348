//! Translation of a [`ProblemInstance`] into a linear program.
//!
//! One variable is created per (source, sink) pair and lives in a flat arena
//! at `source * sink_count + sink`. Each sink contributes an equality row,
//! each source a capacity row.

use std::collections::BTreeSet;

use crate::error::{SolveFailure, SolveResult};
use crate::types::{ProblemInstance, SupplyPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSense {
    Equal,
    AtMost,
}

/// What a constraint row stands for, used when reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Demand(usize),
    Supply(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub kind: RowKind,
    pub sense: RowSense,
    /// Sparse (variable, coefficient) pairs.
    pub terms: Vec<(usize, f64)>,
    pub rhs: f64,
}

/// The LP produced by [`build`]. Owned by a single solve.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearProgram {
    pub source_ids: Vec<String>,
    pub sink_ids: Vec<String>,
    pub supplies: Vec<u64>,
    pub demands: Vec<u64>,
    pub policy: SupplyPolicy,
    /// Dense cost vector, one entry per variable.
    pub objective: Vec<f64>,
    pub rows: Vec<Row>,
}

impl LinearProgram {
    pub fn source_count(&self) -> usize {
        self.source_ids.len()
    }

    pub fn sink_count(&self) -> usize {
        self.sink_ids.len()
    }

    pub fn variable_count(&self) -> usize {
        self.objective.len()
    }

    /// Arena index of `x[source][sink]`.
    pub fn variable(&self, source: usize, sink: usize) -> usize {
        source * self.sink_count() + sink
    }
}

/// Build the transportation LP for `instance`.
///
/// With `fail_fast` set, totals that can never balance are rejected here with
/// [`SolveFailure::InfeasibleByConstruction`] instead of being left to phase one.
pub fn build(instance: &ProblemInstance, fail_fast: bool) -> SolveResult<LinearProgram> {
    validate(instance)?;

    if fail_fast {
        check_totals(instance)?;
    }

    let sources = instance.sources.len();
    let sinks = instance.sinks.len();

    let objective: Vec<f64> = (0..sources)
        .flat_map(|i| (0..sinks).map(move |j| (i, j)))
        .map(|(i, j)| instance.cost(i, j))
        .collect();

    let demand_rows = instance.sinks.iter().enumerate().map(|(j, sink)| Row {
        kind: RowKind::Demand(j),
        sense: RowSense::Equal,
        terms: (0..sources).map(|i| (i * sinks + j, 1.0)).collect(),
        rhs: sink.demand as f64,
    });

    let supply_sense = match instance.supply_policy {
        SupplyPolicy::AtMost => RowSense::AtMost,
        SupplyPolicy::Exact => RowSense::Equal,
    };
    let supply_rows = instance.sources.iter().enumerate().map(|(i, source)| Row {
        kind: RowKind::Supply(i),
        sense: supply_sense,
        terms: (0..sinks).map(|j| (i * sinks + j, 1.0)).collect(),
        rhs: source.supply as f64,
    });

    let rows: Vec<Row> = demand_rows.chain(supply_rows).collect();

    log::debug!(
        "built transportation model: {} sources x {} sinks, {} variables, {} rows",
        sources,
        sinks,
        objective.len(),
        rows.len()
    );

    Ok(LinearProgram {
        source_ids: instance.sources.iter().map(|s| s.id.clone()).collect(),
        sink_ids: instance.sinks.iter().map(|s| s.id.clone()).collect(),
        supplies: instance.sources.iter().map(|s| s.supply).collect(),
        demands: instance.sinks.iter().map(|s| s.demand).collect(),
        policy: instance.supply_policy,
        objective,
        rows,
    })
}

/// Largest quantity, per party and in total, that converts to `f64` exactly.
pub const MAX_QUANTITY: u64 = 1 << 53;

fn invalid(message: String) -> SolveFailure {
    SolveFailure::InvalidInstance(message)
}

fn validate(instance: &ProblemInstance) -> SolveResult<()> {
    if instance.sources.is_empty() {
        return Err(invalid("at least one source is required".into()));
    }
    if instance.sinks.is_empty() {
        return Err(invalid("at least one sink is required".into()));
    }

    let source_ids = unique_ids("source", instance.sources.iter().map(|s| s.id.as_str()))?;
    let sink_ids = unique_ids("sink", instance.sinks.iter().map(|s| s.id.as_str()))?;

    for source in &instance.sources {
        check_cost(&source.id, "*", source.unit_cost)?;
    }

    for (source, row) in &instance.costs {
        if !source_ids.contains(source.as_str()) {
            return Err(invalid(format!("cost override names unknown source `{source}`")));
        }
        for (sink, &cost) in row {
            if !sink_ids.contains(sink.as_str()) {
                return Err(invalid(format!("cost override names unknown sink `{sink}`")));
            }
            check_cost(source, sink, cost)?;
        }
    }

    for source in &instance.sources {
        check_quantity("supply of source", &source.id, source.supply)?;
    }
    for sink in &instance.sinks {
        check_quantity("demand of sink", &sink.id, sink.demand)?;
    }
    let supply = instance
        .total_supply()
        .ok_or_else(|| invalid("total supply overflows u64".into()))?;
    let demand = instance
        .total_demand()
        .ok_or_else(|| invalid("total demand overflows u64".into()))?;
    check_quantity("total", "supply", supply)?;
    check_quantity("total", "demand", demand)?;

    for sink in &instance.sinks {
        if let Some(capacity) = sink.capacity.filter(|&c| sink.demand > c) {
            return Err(invalid(format!(
                "sink `{}` demands {} units but can only hold {}",
                sink.id, sink.demand, capacity
            )));
        }
    }

    Ok(())
}

fn unique_ids<'a>(
    what: &str,
    ids: impl Iterator<Item = &'a str>,
) -> SolveResult<BTreeSet<&'a str>> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if id.is_empty() {
            return Err(invalid(format!("{what} id must not be empty")));
        }
        if !seen.insert(id) {
            return Err(invalid(format!("duplicate {what} id `{id}`")));
        }
    }
    Ok(seen)
}

fn check_cost(source: &str, sink: &str, cost: f64) -> SolveResult<()> {
    if !cost.is_finite() || cost < 0.0 {
        return Err(invalid(format!(
            "cost {cost} from `{source}` to `{sink}` must be finite and non-negative"
        )));
    }
    Ok(())
}

fn check_quantity(what: &str, id: &str, quantity: u64) -> SolveResult<()> {
    if quantity > MAX_QUANTITY {
        return Err(invalid(format!(
            "{what} `{id}` is {quantity}, above the largest supported quantity {MAX_QUANTITY}"
        )));
    }
    Ok(())
}

/// Runs after `validate`, so both totals are known to fit.
fn check_totals(instance: &ProblemInstance) -> SolveResult<()> {
    let demand = instance.total_demand().unwrap_or(u64::MAX);
    let supply = instance.total_supply().unwrap_or(u64::MAX);
    let balanced = match instance.supply_policy {
        SupplyPolicy::AtMost => demand <= supply,
        SupplyPolicy::Exact => demand == supply,
    };
    if balanced {
        Ok(())
    } else {
        Err(SolveFailure::InfeasibleByConstruction { demand, supply })
    }
}
