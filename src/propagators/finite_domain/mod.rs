//! An optional finite-domain constraint module: bounded integer variables
//! with reified linear, equality and disequality constraints, driven through
//! the same propagator interface as the other theory modules.

pub(crate) mod domain;
pub(crate) mod propagator;

pub(crate) use propagator::FdConstraintKind;
pub(crate) use propagator::FiniteDomainPropagator;
pub use propagator::LinearComparison;
