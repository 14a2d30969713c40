use super::ConstraintReference;
use crate::engine::variables::Literal;

/// Description of a conflict discovered during propagation. A conflict is
/// never surfaced as an error to the caller; it is handed to conflict
/// analysis as a clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ConflictInfo {
    /// An enqueue hit a literal that is already assigned false. The reference
    /// is the antecedent the enqueue was attempted with.
    Propagation {
        literal: Literal,
        reference: ConstraintReference,
    },
    /// A theory module built the conflict clause itself. Every literal in the
    /// clause is false under the current assignment.
    Explanation { clause: Vec<Literal> },
}

/// The outcome of a propagation step: either quiescence or a conflict.
pub(crate) type PropagationStatus = Result<(), ConflictInfo>;
