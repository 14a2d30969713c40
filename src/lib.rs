//! korat is a CDCL-based solver for propositional theories extended with
//! inductive definitions (under completion, stable or well-founded
//! semantics), aggregates over weighted literal sets, and an optional
//! finite-domain constraint module.
//!
//! A problem is built up as a [`Model`], turned into a [`Solver`], and then
//! solved, enumerated or optimised:
//!
//! ```
//! use korat::options::SolverOptions;
//! use korat::results::SatisfactionResult;
//! use korat::termination::Indefinite;
//! use korat::Model;
//!
//! let mut model = Model::default();
//! model.add_clause([1, 2, 3]);
//! model.add_clause([-3]);
//!
//! let mut solver = model.into_solver(SolverOptions::default()).unwrap();
//! let mut brancher = solver.default_brancher();
//! let result = solver.satisfy(&mut brancher, &mut Indefinite).unwrap();
//! assert!(matches!(result, SatisfactionResult::Satisfiable(_)));
//! ```

pub mod asserts;
pub mod branching;
pub mod options;
pub mod results;
pub mod termination;

mod api;
mod basic_types;
mod engine;
mod model;
mod optimisation;
mod propagators;

#[cfg(test)]
mod tests;

pub use api::outputs::SatisfactionResultUnderAssumptions;
pub use api::outputs::SolutionIterator;
pub use api::outputs::UnsatisfiableUnderAssumptions;
pub use api::Solver;
pub use basic_types::ConstraintOperationError;
pub use basic_types::MalformedInputError;
pub use basic_types::ResourceError;
pub use basic_types::Weight;
pub use model::IntVariable;
pub use model::Model;
pub use model::ModelAggregate;
pub use model::ModelRule;
pub use propagators::aggregates::AggregateKind;
pub use propagators::aggregates::AggregateSemantics;
pub use propagators::aggregates::AggregateSign;
pub use propagators::definitions::DefinitionSemantics;
pub use propagators::finite_domain::LinearComparison;

/// Solver literals, exposed for assumption handling and custom branchers.
pub mod variables {
    pub use crate::engine::variables::Literal;
    pub use crate::engine::variables::PropositionalVariable;
}

/// Search statistic logging: configure once, then statistics are emitted as
/// `prefix name=value` lines by [`Solver::log_statistics`].
pub mod statistic_logging {
    pub use crate::basic_types::statistic_logging::configure;
    pub use crate::basic_types::statistic_logging::log_statistic;
    pub use crate::basic_types::statistic_logging::should_log_statistics;
}
