//! Inductive definitions under completion, stable or well-founded
//! semantics: rule storage, dependency analysis, justification maintenance,
//! unfounded-set search and loop-formula assertion.

pub(crate) mod dependency_graph;
pub(crate) mod propagator;
pub(crate) mod rule;

pub(crate) use propagator::DefinitionPropagator;
pub use rule::DefinitionSemantics;
pub(crate) use rule::Rule;
