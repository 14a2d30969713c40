pub(crate) mod propagator;
pub(crate) mod reason_store;
pub(crate) mod theory_context;
pub(crate) mod watch_list;

pub(crate) use propagator::TheoryPropagator;
pub(crate) use reason_store::ReasonRef;
pub(crate) use reason_store::ReasonStore;
pub(crate) use theory_context::TheoryContext;
pub(crate) use watch_list::BooleanDomainEvent;
pub(crate) use watch_list::TheoryWatchList;

/// Identifies a theory module. Together with an opaque payload this forms
/// the theory reason tag stored as the antecedent of theory propagations.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub(crate) enum ModuleId {
    Aggregates,
    Definitions,
    FiniteDomain,
}
