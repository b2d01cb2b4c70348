//! Dense two-phase simplex over a [`LinearProgram`].
//!
//! Column layout of the tableau: structural variables first, then one slack
//! per `AtMost` row, then one artificial per `Equal` row, then the right-hand
//! side. Pivoting follows Bland's rule throughout, so degenerate vertices
//! cannot cycle and repeated solves pivot identically.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{SolveFailure, SolveResult};
use crate::model::{LinearProgram, RowSense};

#[derive(Debug, Clone, Copy)]
pub struct Tolerances {
    /// Smallest magnitude accepted as a pivot or as a negative reduced cost.
    pub pivot: f64,
    /// Largest phase-one residual still treated as feasible. Supply and
    /// demand are integral, so a genuine shortfall is at least one unit.
    pub feasibility: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct Limits<'a> {
    pub max_iterations: usize,
    pub cancel: Option<&'a AtomicBool>,
}

/// An optimal basic feasible solution.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    /// Value of every structural variable.
    pub values: Vec<f64>,
    pub objective: f64,
    pub iterations: usize,
}

enum Outcome {
    Optimal,
    Unbounded(usize),
}

struct Tableau {
    /// Columns including the right-hand side.
    width: usize,
    cells: Vec<f64>,
    basis: Vec<usize>,
    /// Reduced costs; the last entry holds the negated objective.
    reduced: Vec<f64>,
    pivot_tolerance: f64,
}

impl Tableau {
    fn rhs(&self) -> usize {
        self.width - 1
    }

    fn at(&self, row: usize, col: usize) -> f64 {
        self.cells[row * self.width + col]
    }

    fn objective(&self) -> f64 {
        -self.reduced[self.rhs()]
    }

    /// Reset the reduced-cost row for `costs` against the current basis.
    fn price(&mut self, costs: &[f64]) {
        self.reduced.clear();
        self.reduced.extend_from_slice(costs);
        self.reduced.push(0.0);

        for (row, cells) in self.cells.chunks_exact(self.width).enumerate() {
            let basic_cost = costs[self.basis[row]];
            if basic_cost != 0.0 {
                for (d, &a) in self.reduced.iter_mut().zip(cells) {
                    *d -= basic_cost * a;
                }
            }
        }
    }

    fn pivot(&mut self, row: usize, col: usize) {
        let width = self.width;
        let tolerance = self.pivot_tolerance;

        let (before, rest) = self.cells.split_at_mut(row * width);
        let (pivot_row, after) = rest.split_at_mut(width);

        let pivot = pivot_row[col];
        for a in pivot_row.iter_mut() {
            *a /= pivot;
        }
        pivot_row[col] = 1.0;

        for other in before
            .chunks_exact_mut(width)
            .chain(after.chunks_exact_mut(width))
        {
            let factor = other[col];
            if factor == 0.0 {
                continue;
            }
            for (a, &p) in other.iter_mut().zip(pivot_row.iter()) {
                *a -= factor * p;
            }
            other[col] = 0.0;
            if other[width - 1].abs() < tolerance {
                other[width - 1] = 0.0;
            }
        }

        let factor = self.reduced[col];
        if factor != 0.0 {
            for (d, &p) in self.reduced.iter_mut().zip(pivot_row.iter()) {
                *d -= factor * p;
            }
            self.reduced[col] = 0.0;
        }

        self.basis[row] = col;
    }

    /// Minimum ratio test. Ties go to the row whose basic variable has the
    /// smallest index.
    fn leaving_row(&self, col: usize) -> Option<usize> {
        let tolerance = self.pivot_tolerance;
        let rhs = self.rhs();
        let mut best: Option<(usize, f64)> = None;

        for row in 0..self.basis.len() {
            let a = self.at(row, col);
            if a <= tolerance {
                continue;
            }
            let ratio = self.at(row, rhs) / a;
            best = match best {
                None => Some((row, ratio)),
                Some((current, current_ratio)) => {
                    let smaller = ratio < current_ratio - tolerance;
                    let tied = ratio <= current_ratio + tolerance;
                    if smaller || (tied && self.basis[row] < self.basis[current]) {
                        Some((row, ratio))
                    } else {
                        Some((current, current_ratio))
                    }
                }
            };
        }

        best.map(|(row, _)| row)
    }

    /// Pivot until no column below `entering` has a negative reduced cost.
    fn optimize(
        &mut self,
        entering: usize,
        limits: &Limits<'_>,
        iterations: &mut usize,
    ) -> SolveResult<Outcome> {
        loop {
            let tolerance = self.pivot_tolerance;
            let Some(col) = (0..entering).find(|&c| self.reduced[c] < -tolerance) else {
                return Ok(Outcome::Optimal);
            };

            if *iterations >= limits.max_iterations {
                return Err(SolveFailure::SolverDivergence {
                    iterations: *iterations,
                });
            }
            if limits.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                return Err(SolveFailure::Cancelled {
                    iterations: *iterations,
                });
            }

            let Some(row) = self.leaving_row(col) else {
                return Ok(Outcome::Unbounded(col));
            };

            log::trace!(
                "pivot {}: column {} enters, column {} leaves, objective {}",
                iterations,
                col,
                self.basis[row],
                self.objective()
            );
            self.pivot(row, col);
            *iterations += 1;
        }
    }

    /// Move artificials left in the basis after phase one out of it. Rows
    /// with nothing to pivot on are redundant and keep a zero artificial.
    fn expel_artificials(&mut self, first_artificial: usize) {
        for row in 0..self.basis.len() {
            if self.basis[row] < first_artificial {
                continue;
            }
            let replacement =
                (0..first_artificial).find(|&c| self.at(row, c).abs() > self.pivot_tolerance);
            match replacement {
                Some(col) => self.pivot(row, col),
                None => log::debug!("row {} is redundant", row),
            }
        }
    }
}

/// Solve `lp` to optimality.
pub fn solve(lp: &LinearProgram, tolerances: Tolerances, limits: &Limits<'_>) -> SolveResult<Vertex> {
    let variables = lp.variable_count();
    let rows = lp.rows.len();
    let slacks = lp.rows.iter().filter(|r| r.sense == RowSense::AtMost).count();
    let first_artificial = variables + slacks;
    let columns = first_artificial + (rows - slacks);
    let width = columns + 1;

    let mut cells = vec![0.0; rows * width];
    let mut basis = vec![0; rows];
    let mut next_slack = variables;
    let mut next_artificial = first_artificial;

    for (r, row) in lp.rows.iter().enumerate() {
        if row.rhs.is_nan() || row.rhs < 0.0 {
            return Err(SolveFailure::SolverInternalError(format!(
                "row {:?} has right-hand side {}",
                row.kind, row.rhs
            )));
        }
        let cells = &mut cells[r * width..(r + 1) * width];
        for &(variable, coefficient) in &row.terms {
            cells[variable] += coefficient;
        }
        cells[columns] = row.rhs;

        let auxiliary = match row.sense {
            RowSense::AtMost => &mut next_slack,
            RowSense::Equal => &mut next_artificial,
        };
        cells[*auxiliary] = 1.0;
        basis[r] = *auxiliary;
        *auxiliary += 1;
    }

    let mut tableau = Tableau {
        width,
        cells,
        basis,
        reduced: Vec::with_capacity(width),
        pivot_tolerance: tolerances.pivot,
    };
    let mut iterations = 0;

    if first_artificial < columns {
        let phase_one: Vec<f64> = (0..columns)
            .map(|c| if c >= first_artificial { 1.0 } else { 0.0 })
            .collect();
        tableau.price(&phase_one);

        if let Outcome::Unbounded(col) = tableau.optimize(columns, limits, &mut iterations)? {
            return Err(SolveFailure::SolverInternalError(format!(
                "phase one unbounded along column {col}"
            )));
        }

        let residual = tableau.objective();
        log::debug!(
            "phase one finished after {} pivots, residual {}",
            iterations,
            residual
        );
        if residual > tolerances.feasibility {
            return Err(SolveFailure::Infeasible);
        }
        tableau.expel_artificials(first_artificial);
    }

    let mut costs = lp.objective.clone();
    costs.resize(columns, 0.0);
    tableau.price(&costs);

    if let Outcome::Unbounded(col) = tableau.optimize(first_artificial, limits, &mut iterations)? {
        return Err(SolveFailure::SolverInternalError(format!(
            "objective unbounded along column {col}"
        )));
    }

    let mut values = vec![0.0; variables];
    for (row, &basic) in tableau.basis.iter().enumerate() {
        if basic < variables {
            values[basic] = tableau.at(row, columns);
        }
    }

    log::debug!(
        "phase two finished after {} pivots, objective {}",
        iterations,
        tableau.objective()
    );

    Ok(Vertex {
        values,
        objective: tableau.objective(),
        iterations,
    })
}
