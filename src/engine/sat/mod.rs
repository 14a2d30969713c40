mod assignments_propositional;
mod clausal_propagator;
mod clause;
mod clause_allocator;
mod explanation_clause_manager;
mod lbd_calculator;
mod learned_clause_manager;
mod restart_strategy;

pub(crate) use assignments_propositional::AssignmentsPropositional;
pub(crate) use clausal_propagator::ClausalPropagator;
pub(crate) use clause::Clause;
pub(crate) use clause_allocator::ClauseAllocator;
pub(crate) use clause_allocator::ClauseRelocationMap;
pub(crate) use explanation_clause_manager::ExplanationClauseManager;
pub(crate) use lbd_calculator::calculate_lbd;
pub(crate) use learned_clause_manager::LearnedClauseManager;
pub(crate) use restart_strategy::RestartStrategy;
