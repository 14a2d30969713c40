//! Optimisation drivers on top of the satisfaction core. Sum minimisation
//! tightens the objective aggregate's bound after every model and re-solves
//! with the learned clauses still in place; subset and ordered minimisation
//! re-solve under successively stronger assumptions. The core solving API is
//! unchanged by any of them.

use log::debug;

use crate::api::Solver;
use crate::basic_types::ResourceError;
use crate::branching::Brancher;
use crate::engine::SolverExecutionFlag;
use crate::results::OptimisationResult;
use crate::results::Solution;
use crate::termination::TerminationCondition;

impl Solver {
    /// Minimise the declared objective (the sum over the minimisation set).
    /// On every model the objective bound is tightened to one below the
    /// model's value, which also invalidates the model itself.
    pub fn minimise(
        &mut self,
        brancher: &mut impl Brancher,
        termination: &mut impl TerminationCondition,
    ) -> Result<OptimisationResult, ResourceError> {
        let objective = match self.minimisation_aggregate {
            Some(objective) => objective,
            None => panic!("minimise requires a declared minimisation objective"),
        };

        let mut best: Option<Solution> = None;
        loop {
            match self
                .satisfaction_solver
                .solve(termination, brancher)
            {
                SolverExecutionFlag::Feasible => {
                    let solution = self.extract_solution();
                    let value = self.objective_value(&solution);
                    debug!("objective improved to {value}");
                    best = Some(solution);
                    self.satisfaction_solver.restore_state_at_root(brancher);

                    self.satisfaction_solver
                        .modules
                        .aggregates
                        .tighten_bound(objective, value - 1);
                    if !self.satisfaction_solver.initialise_aggregates_at_root() {
                        // no solution below the bound: the last one is optimal
                        return Ok(OptimisationResult::Optimal(
                            best.expect("a model was just found"),
                        ));
                    }
                }
                SolverExecutionFlag::Infeasible => {
                    return Ok(match best {
                        Some(solution) => OptimisationResult::Optimal(solution),
                        None => OptimisationResult::Unsatisfiable,
                    });
                }
                SolverExecutionFlag::Timeout => {
                    self.satisfaction_solver.restore_state_at_root(brancher);
                    return Ok(match best {
                        Some(solution) => OptimisationResult::Satisfiable(solution),
                        None => OptimisationResult::Unknown,
                    });
                }
                SolverExecutionFlag::ResourceLimit => return Err(self.resource_error()),
            }
        }
    }

    /// Find a model in which the set of true literals among `literals` is
    /// subset-minimal: no model makes a strict subset of them true.
    pub fn minimise_subset(
        &mut self,
        literals: &[i32],
        brancher: &mut impl Brancher,
        termination: &mut impl TerminationCondition,
    ) -> Result<OptimisationResult, ResourceError> {
        let mut current: Option<Solution> = None;
        let mut assumptions: Vec<i32> = Vec::new();

        loop {
            let flag = {
                let assumption_literals: Vec<_> =
                    assumptions.iter().map(|&l| self.literal(l)).collect();
                self.satisfaction_solver.solve_under_assumptions(
                    &assumption_literals,
                    termination,
                    brancher,
                )
            };
            match flag {
                SolverExecutionFlag::Feasible => {
                    let solution = self.extract_solution();
                    self.satisfaction_solver.restore_state_at_root(brancher);

                    let true_literals: Vec<i32> = literals
                        .iter()
                        .copied()
                        .filter(|&literal| solution.literal_holds(literal))
                        .collect();
                    current = Some(solution);
                    if true_literals.is_empty() {
                        return Ok(OptimisationResult::Optimal(
                            current.expect("a model was just found"),
                        ));
                    }
                    // require a strict subset from now on
                    let strictly_smaller: Vec<crate::engine::variables::Literal> = true_literals
                        .iter()
                        .map(|&literal| self.literal(-literal))
                        .collect();
                    if self
                        .satisfaction_solver
                        .add_clause(strictly_smaller)
                        .is_err()
                    {
                        return Ok(OptimisationResult::Optimal(
                            current.expect("a model was just found"),
                        ));
                    }
                    // and keep everything that is already false
                    assumptions = literals
                        .iter()
                        .copied()
                        .filter(|&literal| {
                            current
                                .as_ref()
                                .map(|solution| !solution.literal_holds(literal))
                                .unwrap_or(false)
                        })
                        .map(|literal| -literal)
                        .collect();
                }
                SolverExecutionFlag::Infeasible => {
                    self.satisfaction_solver.restore_state_at_root(brancher);
                    return Ok(match current {
                        Some(solution) => OptimisationResult::Optimal(solution),
                        None => OptimisationResult::Unsatisfiable,
                    });
                }
                SolverExecutionFlag::Timeout => {
                    self.satisfaction_solver.restore_state_at_root(brancher);
                    return Ok(match current {
                        Some(solution) => OptimisationResult::Satisfiable(solution),
                        None => OptimisationResult::Unknown,
                    });
                }
                SolverExecutionFlag::ResourceLimit => return Err(self.resource_error()),
            }
        }
    }

    /// Lexicographic minimisation over an ordered list of literals: each
    /// literal in turn is fixed false when the problem stays satisfiable
    /// under the assignments fixed so far.
    pub fn minimise_ordered(
        &mut self,
        literals: &[i32],
        brancher: &mut impl Brancher,
        termination: &mut impl TerminationCondition,
    ) -> Result<OptimisationResult, ResourceError> {
        let mut fixed: Vec<i32> = Vec::new();
        let mut current: Option<Solution> = None;

        for &literal in literals {
            fixed.push(-literal);
            let flag = {
                let assumption_literals: Vec<_> =
                    fixed.iter().map(|&l| self.literal(l)).collect();
                self.satisfaction_solver.solve_under_assumptions(
                    &assumption_literals,
                    termination,
                    brancher,
                )
            };
            match flag {
                SolverExecutionFlag::Feasible => {
                    current = Some(self.extract_solution());
                    self.satisfaction_solver.restore_state_at_root(brancher);
                }
                SolverExecutionFlag::Infeasible => {
                    self.satisfaction_solver.restore_state_at_root(brancher);
                    if current.is_none() && fixed.len() == 1 && !self.is_satisfiable_at_all() {
                        return Ok(OptimisationResult::Unsatisfiable);
                    }
                    // the literal cannot be false: fix it true instead
                    let _ = fixed.pop();
                    fixed.push(literal);
                }
                SolverExecutionFlag::Timeout => {
                    self.satisfaction_solver.restore_state_at_root(brancher);
                    return Ok(match current {
                        Some(solution) => OptimisationResult::Satisfiable(solution),
                        None => OptimisationResult::Unknown,
                    });
                }
                SolverExecutionFlag::ResourceLimit => return Err(self.resource_error()),
            }
        }

        // the last feasible model may predate later fixings; solve once more
        // under the full prefix for the definitive model
        let flag = {
            let assumption_literals: Vec<_> = fixed.iter().map(|&l| self.literal(l)).collect();
            self.satisfaction_solver.solve_under_assumptions(
                &assumption_literals,
                termination,
                brancher,
            )
        };
        if flag == SolverExecutionFlag::Feasible {
            current = Some(self.extract_solution());
        }
        self.satisfaction_solver.restore_state_at_root(brancher);

        Ok(match current {
            Some(solution) => OptimisationResult::Optimal(solution),
            None => OptimisationResult::Unsatisfiable,
        })
    }

    fn is_satisfiable_at_all(&mut self) -> bool {
        !self.satisfaction_solver.state.is_infeasible()
    }
}
