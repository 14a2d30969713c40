//! Contains the representation of an unsatisfiable-under-assumptions
//! outcome.

use crate::branching::Brancher;
use crate::engine::SatisfactionSolver;

/// Allows the retrieval of an unsatisfiable core consisting of the
/// assumptions passed to
/// [`Solver::satisfy_under_assumptions`](crate::Solver::satisfy_under_assumptions).
/// When this struct is dropped the solver is restored to its root state.
#[derive(Debug)]
pub struct UnsatisfiableUnderAssumptions<'solver, 'brancher, B: Brancher> {
    pub(crate) solver: &'solver mut SatisfactionSolver,
    pub(crate) brancher: &'brancher mut B,
}

impl<'solver, 'brancher, B: Brancher> UnsatisfiableUnderAssumptions<'solver, 'brancher, B> {
    pub(crate) fn new(
        solver: &'solver mut SatisfactionSolver,
        brancher: &'brancher mut B,
    ) -> Self {
        UnsatisfiableUnderAssumptions { solver, brancher }
    }

    /// An unsatisfiable subset of the assumptions, as DIMACS-style literals.
    /// When the assumptions directly contain a complementary pair, that pair
    /// is the core.
    pub fn extract_core(&mut self) -> Vec<i32> {
        let to_dimacs = |literal: crate::engine::variables::Literal| {
            let index = literal.get_propositional_variable().get_index() as i32;
            if literal.is_positive() {
                index
            } else {
                -index
            }
        };
        match self.solver.extract_core(self.brancher) {
            Ok(core) => core.into_iter().map(to_dimacs).collect(),
            Err(violated) => vec![to_dimacs(violated), to_dimacs(!violated)],
        }
    }
}

impl<B: Brancher> Drop for UnsatisfiableUnderAssumptions<'_, '_, B> {
    fn drop(&mut self) {
        self.solver.restore_state_at_root(self.brancher)
    }
}
