mod error;
pub mod model;
mod shipment;
pub mod simplex;
mod solver;
mod types;

pub use crate::error::{SolveFailure, SolveResult};
pub use crate::model::{LinearProgram, build};
pub use crate::shipment::ShipmentMatrix;
pub use crate::solver::{Solver, SolverOptions};
pub use crate::types::{
    CostOverrides, Input, ProblemInstance, Sink, Solution, Source, SupplyPolicy,
};

/// Solve `instance` with default options.
pub fn solve_transportation(instance: &ProblemInstance) -> SolveResult<ShipmentMatrix> {
    Solver::default().solve(instance)
}

impl ProblemInstance {
    pub fn solve(&self) -> SolveResult<Solution> {
        solve_transportation(self).map(|matrix| matrix.to_solution())
    }
}

impl Input {
    /// Solve the instance with the options from the file's `solver:` section.
    pub fn solve(&self) -> SolveResult<Solution> {
        Solver::new(self.solver.clone())
            .solve(&self.instance)
            .map(|matrix| matrix.to_solution())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use good_lp::Solution as LpSolution;
    use good_lp::solvers::microlp::microlp;
    use good_lp::{Expression, SolverModel, variable, variables};
    use serde::Deserialize;
    use std::fs::{read_dir, read_to_string};
    use std::path::Path;

    #[derive(Deserialize)]
    struct Expected {
        solution: Solution,
    }

    // Helper function to run a test from a test file
    fn run_test_file(test_file: &Path) {
        println!("Running test for file: {:?}", test_file);

        let failure_message = format!("Failed to read test file: {}", test_file.display());
        let yaml_content = read_to_string(test_file).expect(&failure_message);

        // Split the file content at the "solution:" marker to separate input and expected output
        let parts: Vec<&str> = yaml_content.split("solution:").collect();

        let failure_message = format!("Failed to parse input YAML: {}", test_file.display());
        let input_yaml = parts.first().expect("No input found in test file").trim();
        let input: Input = serde_yaml::from_str(input_yaml).expect(&failure_message);

        let failure_message = format!("Failed to parse expected YAML: {}", test_file.display());
        let expected_yaml = format!("solution:{}", parts.get(1).expect(&failure_message));
        let expected: Expected = serde_yaml::from_str(&expected_yaml).expect(&failure_message);
        let expected = expected.solution;

        let failure_message = format!("Failed to solve test file: {}", test_file.display());
        let received = input.solve().expect(&failure_message);

        println!("expected: {:?}", expected);
        println!("received: {:?}", received);

        // Ties between equally cheap plans are legitimate, so only the cost
        // and what each sink receives are compared.
        assert!(
            (expected.total_cost - received.total_cost).abs() < 1e-6,
            "{}",
            test_file.display()
        );
        assert_eq!(expected.received, received.received, "{}", test_file.display());

        let instance = &input.instance;
        for source in &instance.sources {
            let shipped: u64 = received
                .shipments
                .get(&source.id)
                .map(|row| row.values().sum())
                .unwrap_or(0);
            match instance.supply_policy {
                SupplyPolicy::AtMost => assert!(shipped <= source.supply, "{}", source.id),
                SupplyPolicy::Exact => assert_eq!(shipped, source.supply, "{}", source.id),
            }
        }
        for sink in &instance.sinks {
            assert_eq!(received.received[&sink.id], sink.demand, "{}", sink.id);
        }
    }

    #[test]
    fn run_all_test_files() {
        // Read all files from the test_data directory
        let test_data_dir = Path::new("test_data");
        let mut entries: Vec<_> = read_dir(test_data_dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| {
                path.is_file() && path.extension().map(|ext| ext == "yaml").unwrap_or(false)
            })
            .collect();

        // Sort paths lexically by filename
        entries.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        assert!(!entries.is_empty());

        for path in entries {
            run_test_file(&path);
        }
    }

    /// Minimum cost according to good_lp, for cross-checking.
    fn reference_cost(instance: &ProblemInstance) -> f64 {
        let mut vars = variables!();
        let sinks = instance.sinks.len();
        let x: Vec<_> = (0..instance.sources.len() * sinks)
            .map(|_| vars.add(variable().min(0)))
            .collect();

        let objective = (0..x.len()).fold(Expression::from(0.0), |sum, v| {
            sum + x[v] * instance.cost(v / sinks, v % sinks)
        });

        let mut model = vars.minimise(objective).using(microlp);
        for (j, sink) in instance.sinks.iter().enumerate() {
            let inbound = (0..instance.sources.len())
                .fold(Expression::from(0.0), |sum, i| sum + x[i * sinks + j]);
            model = model.with(inbound.eq(sink.demand as f64));
        }
        for (i, source) in instance.sources.iter().enumerate() {
            let outbound = (0..sinks).fold(Expression::from(0.0), |sum, j| sum + x[i * sinks + j]);
            model = model.with(outbound.leq(source.supply as f64));
        }

        let solution = model.solve().expect("reference solver failed");
        x.iter()
            .enumerate()
            .map(|(v, &var)| solution.value(var) * instance.cost(v / sinks, v % sinks))
            .sum()
    }

    /// Deterministic instances with per-pair costs.
    fn generated_instances() -> Vec<ProblemInstance> {
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move |bound: u64| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state % bound
        };

        (0..12)
            .map(|n| {
                let source_count = 1 + (n % 4);
                let sink_count = 1 + (n % 5);
                let sinks: Vec<Sink> = (0..sink_count)
                    .map(|j| Sink::new(format!("sink-{j}"), next(50)))
                    .collect();
                let demand: u64 = sinks.iter().map(|s| s.demand).sum();

                // Top up the first source so supply always covers demand.
                let mut sources: Vec<Source> = (0..source_count)
                    .map(|i| Source::new(format!("source-{i}"), next(40), 0.0))
                    .collect();
                let supply: u64 = sources.iter().map(|s| s.supply).sum();
                if supply < demand {
                    sources[0].supply += demand - supply + next(10);
                }

                let mut instance = ProblemInstance::new(sources, sinks);
                for i in 0..source_count {
                    for j in 0..sink_count {
                        let cost = 1.0 + next(20) as f64;
                        instance = instance.with_cost(
                            &format!("source-{i}"),
                            &format!("sink-{j}"),
                            cost,
                        );
                    }
                }
                instance
            })
            .collect()
    }

    #[test]
    fn costs_agree_with_good_lp() {
        for instance in generated_instances() {
            let matrix = solve_transportation(&instance).expect("solve failed");
            let reference = reference_cost(&instance);
            assert!(
                (matrix.total_cost() - reference).abs() < 1e-6 * (1.0 + reference),
                "ours {} vs good_lp {} for {:?}",
                matrix.total_cost(),
                reference,
                instance
            );
        }
    }

    #[test]
    fn sample_instance_round_trips_through_yaml() {
        let yaml = "\
sources:
  - id: Supplier X
    supply: 600
    unitCost: 5
  - id: Supplier Y
    supply: 300
    unitCost: 7
sinks:
  - id: Storage A
    demand: 400
  - id: Storage B
    demand: 300
";
        let instance: ProblemInstance = serde_yaml::from_str(yaml).unwrap();
        let solution = instance.solve().unwrap();
        assert_eq!(solution.total_cost, 3700.0);
        assert_eq!(solution.received["Storage A"], 400);

        let printed = serde_yaml::to_string(&solution).unwrap();
        let parsed: Solution = serde_yaml::from_str(&printed).unwrap();
        assert_eq!(parsed, solution);
    }
}
