pub(crate) mod solution_iterator;
pub(crate) mod unsatisfiable;

use crate::branching::Brancher;
use crate::results::Solution;
pub use solution_iterator::SolutionIterator;
pub use unsatisfiable::UnsatisfiableUnderAssumptions;

/// The result of a satisfaction call under assumptions. The unsatisfiable
/// case carries a handle for extracting an unsat core restricted to the
/// assumptions; dropping the handle restores the solver to its root state.
#[derive(Debug)]
#[allow(clippy::large_enum_variant)]
pub enum SatisfactionResultUnderAssumptions<'solver, 'brancher, B: Brancher> {
    Satisfiable(Solution),
    UnsatisfiableUnderAssumptions(UnsatisfiableUnderAssumptions<'solver, 'brancher, B>),
    Unsatisfiable,
    Unknown,
}
