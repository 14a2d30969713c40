use thiserror::Error;

/// Errors reported while a problem is being set up, before any solving
/// starts. All input validation is eager: a model that passes validation will
/// never surface one of these during search.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MalformedInputError {
    #[error("variable {0} is the head of more than one rule")]
    DuplicateDefinition(u32),
    #[error("rule heads must be positive literals (got head for variable {0})")]
    NegativeRuleHead(u32),
    #[error("the head of the rule for variable {0} occurs complemented in its own body")]
    HeadComplementInBody(u32),
    #[error("aggregate references set {0}, which was never declared")]
    UndefinedSet(u32),
    #[error("set {0} was declared twice")]
    DuplicateSet(u32),
    #[error("set {0} is empty")]
    EmptySet(u32),
    #[error("negative weight {weight} in set {set_id} used by a sum, cardinality or product aggregate")]
    NegativeWeight { set_id: u32, weight: i64 },
    #[error("zero weight in set {0} used by a product aggregate")]
    ZeroProductWeight(u32),
    #[error("the weights of set {0} exceed the supported precision")]
    WeightOutOfPrecision(u32),
    #[error("set {0} is used by a product aggregate but contains a literal and its complement")]
    ProductBothSigns(u32),
    #[error("literal references variable {0}, which was never declared")]
    UndefinedVariable(u32),
    #[error("constraint references integer variable {0}, which was never declared")]
    UndefinedIntegerVariable(u32),
    #[error("integer variable {0} has an empty initial domain")]
    EmptyDomain(u32),
    #[error("the lazy unfounded-set policy is only sound under stable semantics")]
    LazyCheckRequiresStable,
    #[error("aggregate heads must be positive literals (got head for variable {0})")]
    NegativeAggregateHead(u32),
    #[error("could not parse problem dump line: {0}")]
    InvalidDump(String),
}

/// Errors reported when posting constraints directly on a solver.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOperationError {
    #[error("adding the clause failed because the solver is in an infeasible state")]
    InfeasibleClause,
    #[error("the operation failed because the solver is in an infeasible state")]
    InfeasibleState,
}

/// The clause database ran out of its configured capacity during search. The
/// solver is left at the root level with a coherent trail and clause index;
/// the caller may shed learned clauses (by retrying with a larger capacity)
/// or abort.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("the clause database exceeded its configured capacity of {capacity} clauses")]
pub struct ResourceError {
    pub capacity: usize,
}
