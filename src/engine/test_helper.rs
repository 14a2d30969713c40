#![cfg(test)]
//! Helpers for exercising the engine and the theory modules in tests. The
//! [`TestSolver`] drives a full solver without going through a model, so
//! tests can make decisions and observe propagations directly.

use crate::branching::VsidsBrancher;
use crate::engine::variables::Literal;
use crate::engine::SatisfactionSolver;
use crate::korat_assert_simple;

#[derive(Debug)]
pub(crate) struct TestSolver {
    pub(crate) solver: SatisfactionSolver,
    pub(crate) brancher: VsidsBrancher,
}

impl Default for TestSolver {
    fn default() -> Self {
        let solver = SatisfactionSolver::default();
        let brancher = solver.default_brancher();
        let mut test_solver = TestSolver { solver, brancher };
        test_solver.solver.register_modules(None, None);
        test_solver
    }
}

impl TestSolver {
    pub(crate) fn new_literals(&mut self, count: usize) -> Vec<Literal> {
        (0..count)
            .map(|_| {
                let variable = self.solver.new_variable(false, true, None);
                Literal::new(variable, true)
            })
            .collect()
    }

    pub(crate) fn add_clause(&mut self, literals: Vec<Literal>) -> bool {
        self.solver.add_clause(literals).is_ok()
    }

    /// Make a decision and propagate to fixpoint. Returns false when the
    /// propagation ran into a conflict.
    pub(crate) fn decide(&mut self, literal: Literal) -> bool {
        korat_assert_simple!(self.solver.assignments.is_literal_unassigned(literal));
        self.solver.declare_new_decision_level();
        self.solver.assignments.enqueue_decision_literal(literal);
        self.solver.propagate_enqueued();
        !self.solver.state.conflicting()
    }

    pub(crate) fn value(&self, literal: Literal) -> Option<bool> {
        self.solver.get_literal_value(literal)
    }

    pub(crate) fn backtrack_to_root(&mut self) {
        if self.solver.get_decision_level() > 0 {
            self.solver.backtrack(0, &mut self.brancher);
        }
    }
}
