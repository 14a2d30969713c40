//! Enumeration of solutions: after every model, a blocking clause over the
//! original variables is added and the search re-enters with the learned
//! clauses still in place, until no further model exists.

use crate::api::Solver;
use crate::branching::Brancher;
use crate::engine::variables::Literal;
use crate::engine::SolverExecutionFlag;
use crate::results::IteratedSolution;
use crate::termination::TerminationCondition;

#[derive(Debug)]
pub struct SolutionIterator<'solver, 'brancher, 'termination, B, T> {
    solver: &'solver mut Solver,
    brancher: &'brancher mut B,
    termination: &'termination mut T,
    assumptions: Vec<Literal>,
    finished: bool,
}

impl<'solver, 'brancher, 'termination, B, T> SolutionIterator<'solver, 'brancher, 'termination, B, T>
where
    B: Brancher,
    T: TerminationCondition,
{
    pub(crate) fn new(
        solver: &'solver mut Solver,
        brancher: &'brancher mut B,
        termination: &'termination mut T,
        assumptions: Vec<Literal>,
    ) -> Self {
        SolutionIterator {
            solver,
            brancher,
            termination,
            assumptions,
            finished: false,
        }
    }

    /// Find the next solution, blocking the previous one.
    pub fn next_solution(&mut self) -> IteratedSolution {
        if self.finished {
            return IteratedSolution::Finished;
        }
        match self.solver.satisfaction_solver.solve_under_assumptions(
            &self.assumptions,
            self.termination,
            self.brancher,
        ) {
            SolverExecutionFlag::Feasible => {
                let solution = self.solver.extract_solution();
                self.solver
                    .satisfaction_solver
                    .restore_state_at_root(self.brancher);
                if !self.solver.add_blocking_clause(&solution) {
                    // blocking failed: this was the last solution
                    self.finished = true;
                }
                IteratedSolution::Solution(solution)
            }
            SolverExecutionFlag::Infeasible => {
                self.finished = true;
                self.solver
                    .satisfaction_solver
                    .restore_state_at_root(self.brancher);
                IteratedSolution::Finished
            }
            SolverExecutionFlag::Timeout | SolverExecutionFlag::ResourceLimit => {
                self.finished = true;
                self.solver
                    .satisfaction_solver
                    .restore_state_at_root(self.brancher);
                IteratedSolution::Unknown
            }
        }
    }
}
