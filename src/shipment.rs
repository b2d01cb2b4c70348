use std::collections::BTreeMap;

use crate::error::{SolveFailure, SolveResult};
use crate::model::LinearProgram;
use crate::simplex::Vertex;
use crate::types::{Solution, SupplyPolicy};

/// Units shipped from every source to every sink, with the cost of the plan.
///
/// Only produced by a successful solve, and always satisfies the demand and
/// supply constraints it was solved against.
#[derive(Debug, Clone, PartialEq)]
pub struct ShipmentMatrix {
    source_ids: Vec<String>,
    sink_ids: Vec<String>,
    /// Row-major, `source * sink_count + sink`.
    quantities: Vec<u64>,
    total_cost: f64,
    iterations: usize,
}

impl ShipmentMatrix {
    /// Round an optimal vertex to whole units and check it against `lp`.
    pub(crate) fn from_vertex(
        lp: &LinearProgram,
        vertex: &Vertex,
        integrality_tolerance: f64,
    ) -> SolveResult<Self> {
        let quantities = vertex
            .values
            .iter()
            .enumerate()
            .map(|(variable, &value)| round_quantity(variable, value, integrality_tolerance))
            .collect::<SolveResult<Vec<u64>>>()?;

        let total_cost: f64 = quantities
            .iter()
            .zip(&lp.objective)
            .map(|(&q, &cost)| q as f64 * cost)
            .sum();

        let matrix = ShipmentMatrix {
            source_ids: lp.source_ids.clone(),
            sink_ids: lp.sink_ids.clone(),
            quantities,
            total_cost,
            iterations: vertex.iterations,
        };
        matrix.check(lp)?;
        Ok(matrix)
    }

    fn check(&self, lp: &LinearProgram) -> SolveResult<()> {
        for (sink, &demand) in lp.demands.iter().enumerate() {
            let inbound = self.inbound(sink);
            if inbound != demand {
                return Err(SolveFailure::SolverInternalError(format!(
                    "sink `{}` receives {} units but demands {}",
                    self.sink_ids[sink], inbound, demand
                )));
            }
        }

        for (source, &supply) in lp.supplies.iter().enumerate() {
            let outbound = self.outbound(source);
            let within = match lp.policy {
                SupplyPolicy::AtMost => outbound <= supply,
                SupplyPolicy::Exact => outbound == supply,
            };
            if !within {
                return Err(SolveFailure::SolverInternalError(format!(
                    "source `{}` ships {} units against a supply of {}",
                    self.source_ids[source], outbound, supply
                )));
            }
        }

        Ok(())
    }

    /// Units shipped from `sources[source]` to `sinks[sink]`, by position.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range. Use [`ShipmentMatrix::get`] to
    /// look up by id instead.
    pub fn quantity(&self, source: usize, sink: usize) -> u64 {
        self.quantities[source * self.sink_ids.len() + sink]
    }

    /// Units shipped between two parties, by id.
    pub fn get(&self, source_id: &str, sink_id: &str) -> Option<u64> {
        let source = self.source_ids.iter().position(|id| id == source_id)?;
        let sink = self.sink_ids.iter().position(|id| id == sink_id)?;
        Some(self.quantity(source, sink))
    }

    /// Visit every (source, sink) pair in instance order, zeros included.
    pub fn for_each(&self, mut f: impl FnMut(&str, &str, u64)) {
        for (i, source) in self.source_ids.iter().enumerate() {
            for (j, sink) in self.sink_ids.iter().enumerate() {
                f(source, sink, self.quantity(i, j));
            }
        }
    }

    pub fn total_cost(&self) -> f64 {
        self.total_cost
    }

    /// Simplex pivots spent on the solve.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Units arriving at `sinks[sink]`, saturating at `u64::MAX`.
    pub fn inbound(&self, sink: usize) -> u64 {
        (0..self.source_ids.len())
            .map(|source| self.quantity(source, sink))
            .fold(0, u64::saturating_add)
    }

    /// Units leaving `sources[source]`, saturating at `u64::MAX`.
    pub fn outbound(&self, source: usize) -> u64 {
        (0..self.sink_ids.len())
            .map(|sink| self.quantity(source, sink))
            .fold(0, u64::saturating_add)
    }

    pub fn to_solution(&self) -> Solution {
        let mut shipments: BTreeMap<String, BTreeMap<String, u64>> = BTreeMap::new();
        self.for_each(|source, sink, quantity| {
            if quantity > 0 {
                shipments
                    .entry(source.to_owned())
                    .or_default()
                    .insert(sink.to_owned(), quantity);
            }
        });

        let received = self
            .sink_ids
            .iter()
            .enumerate()
            .map(|(sink, id)| (id.clone(), self.inbound(sink)))
            .collect();

        Solution {
            shipments,
            total_cost: self.total_cost,
            received,
        }
    }
}

fn round_quantity(variable: usize, value: f64, tolerance: f64) -> SolveResult<u64> {
    let rounded = value.round();
    if value < -tolerance || (value - rounded).abs() > tolerance {
        return Err(SolveFailure::SolverInternalError(format!(
            "variable {variable} has value {value}, expected a non-negative integer"
        )));
    }
    Ok(rounded.max(0.0) as u64)
}
