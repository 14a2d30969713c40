//! Decision making. The [`Brancher`] trait is the seam between the search
//! loop and the variable/value selection heuristic; the default
//! implementation is VSIDS with phase saving.

mod vsids;

pub use vsids::VsidsBrancher;

use rand::rngs::SmallRng;

use crate::basic_types::KeyedVec;
use crate::engine::sat::AssignmentsPropositional;
use crate::engine::variables::Literal;
use crate::engine::variables::PropositionalVariable;

/// The default brancher used when no custom heuristic is supplied.
pub type DefaultBrancher = VsidsBrancher;

/// Per-variable search hints recorded at creation time.
#[derive(Clone, Copy, Debug)]
pub struct VariableFlags {
    /// The polarity to prefer before any phase has been saved.
    pub polarity_hint: bool,
    /// Whether the brancher may pick this variable. Auxiliary variables
    /// (Tseitin atoms and similar) are excluded: their values are always
    /// determined by propagation once the assignment is otherwise total.
    pub decidable: bool,
}

/// The queries a [`Brancher`] may pose while selecting the next decision.
#[derive(Debug)]
pub struct SelectionContext<'a> {
    assignments: &'a AssignmentsPropositional,
    variable_flags: &'a KeyedVec<PropositionalVariable, VariableFlags>,
    random: &'a mut SmallRng,
}

impl<'a> SelectionContext<'a> {
    pub(crate) fn new(
        assignments: &'a AssignmentsPropositional,
        variable_flags: &'a KeyedVec<PropositionalVariable, VariableFlags>,
        random: &'a mut SmallRng,
    ) -> Self {
        SelectionContext {
            assignments,
            variable_flags,
            random,
        }
    }

    pub fn is_variable_assigned(&self, variable: PropositionalVariable) -> bool {
        self.assignments.is_variable_assigned(variable)
    }

    pub fn is_variable_decidable(&self, variable: PropositionalVariable) -> bool {
        self.variable_flags
            .get(variable)
            .map(|flags| flags.decidable)
            .unwrap_or(false)
    }

    pub fn polarity_hint(&self, variable: PropositionalVariable) -> bool {
        self.variable_flags
            .get(variable)
            .map(|flags| flags.polarity_hint)
            .unwrap_or(false)
    }

    pub fn num_propositional_variables(&self) -> u32 {
        self.assignments.num_propositional_variables()
    }

    pub fn random(&mut self) -> &mut SmallRng {
        self.random
    }
}

/// Chooses the next decision literal. The search loop reports conflicts,
/// conflict participation and unassignments so that activity-based
/// implementations can maintain their scores.
pub trait Brancher {
    /// The next decision, or `None` when every decidable variable is
    /// assigned.
    fn next_decision(&mut self, context: &mut SelectionContext<'_>) -> Option<Literal>;

    /// Called once per conflict, after analysis.
    fn on_conflict(&mut self) {}

    /// Called for every literal appearing in a conflict during analysis.
    fn on_appearance_in_conflict_literal(&mut self, _literal: Literal) {}

    /// Called for every literal that is unassigned while backtracking.
    fn on_unassign_literal(&mut self, _literal: Literal) {}

    /// Called when the solver created new variables since the last call.
    fn grow(&mut self, _num_variables: u32) {}
}
