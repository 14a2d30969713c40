//! The assignment trail. This structure is the single owner of variable truth
//! values: every assignment, whether it originates from a decision, the
//! clausal propagator or a theory module, goes through the enqueue methods
//! here.

use crate::basic_types::ConflictInfo;
use crate::basic_types::ConstraintReference;
use crate::basic_types::KeyedVec;
use crate::engine::variables::Literal;
use crate::engine::variables::PropositionalVariable;
use crate::korat_assert_moderate;
use crate::korat_assert_simple;

#[derive(Debug)]
pub(crate) struct AssignmentsPropositional {
    assignment_info: KeyedVec<PropositionalVariable, AssignmentInfo>,
    current_decision_level: usize,
    trail: Vec<Literal>,
    /// `decision_level_limits[k]` is the trail length at which decision level
    /// `k + 1` began; the prefix below it is never mutated until the level is
    /// backtracked.
    decision_level_limits: Vec<usize>,
    pub(crate) true_literal: Literal,
    pub(crate) false_literal: Literal,
}

#[derive(Clone, Copy, Debug)]
struct AssignmentInfo {
    truth_value: Option<bool>,
    decision_level: usize,
    reference: ConstraintReference,
}

impl Default for AssignmentsPropositional {
    fn default() -> Self {
        let dummy_literal = Literal::new(PropositionalVariable::new(0), true);
        AssignmentsPropositional {
            assignment_info: KeyedVec::default(),
            current_decision_level: 0,
            trail: Vec::default(),
            decision_level_limits: Vec::default(),
            true_literal: dummy_literal,
            false_literal: !dummy_literal,
        }
    }
}

impl AssignmentsPropositional {
    pub(crate) fn grow(&mut self) -> PropositionalVariable {
        self.assignment_info.push(AssignmentInfo {
            truth_value: None,
            decision_level: 0,
            reference: ConstraintReference::NULL,
        })
    }

    pub(crate) fn num_propositional_variables(&self) -> u32 {
        self.assignment_info.len() as u32
    }

    pub(crate) fn get_propositional_variables(
        &self,
    ) -> impl Iterator<Item = PropositionalVariable> {
        self.assignment_info.keys()
    }

    pub(crate) fn get_decision_level(&self) -> usize {
        self.current_decision_level
    }

    pub(crate) fn is_at_the_root_level(&self) -> bool {
        self.current_decision_level == 0
    }

    pub(crate) fn num_trail_entries(&self) -> usize {
        self.trail.len()
    }

    pub(crate) fn get_trail_entry(&self, index: usize) -> Literal {
        self.trail[index]
    }

    /// The trail length at which the given decision level began.
    pub(crate) fn get_decision_level_limit(&self, level: usize) -> usize {
        korat_assert_simple!(level >= 1 && level <= self.current_decision_level);
        self.decision_level_limits[level - 1]
    }

    pub(crate) fn is_variable_assigned(&self, variable: PropositionalVariable) -> bool {
        self.assignment_info[variable].truth_value.is_some()
    }

    pub(crate) fn is_literal_assigned(&self, literal: Literal) -> bool {
        self.is_variable_assigned(literal.get_propositional_variable())
    }

    pub(crate) fn is_literal_unassigned(&self, literal: Literal) -> bool {
        !self.is_literal_assigned(literal)
    }

    pub(crate) fn is_literal_assigned_true(&self, literal: Literal) -> bool {
        self.assignment_info[literal.get_propositional_variable()].truth_value
            == Some(literal.is_positive())
    }

    pub(crate) fn is_literal_assigned_false(&self, literal: Literal) -> bool {
        self.assignment_info[literal.get_propositional_variable()].truth_value
            == Some(literal.is_negative())
    }

    pub(crate) fn is_literal_root_assignment(&self, literal: Literal) -> bool {
        self.is_literal_assigned(literal)
            && self.get_literal_assignment_level(literal) == 0
    }

    pub(crate) fn is_literal_decision(&self, literal: Literal) -> bool {
        self.is_literal_assigned(literal)
            && self.assignment_info[literal.get_propositional_variable()]
                .reference
                .is_null()
            && self.get_literal_assignment_level(literal) > 0
    }

    pub(crate) fn is_literal_propagated(&self, literal: Literal) -> bool {
        self.is_literal_assigned(literal)
            && !self.assignment_info[literal.get_propositional_variable()]
                .reference
                .is_null()
    }

    pub(crate) fn get_literal_assignment_level(&self, literal: Literal) -> usize {
        korat_assert_moderate!(self.is_literal_assigned(literal));
        self.assignment_info[literal.get_propositional_variable()].decision_level
    }

    pub(crate) fn get_variable_reason_constraint(
        &self,
        variable: PropositionalVariable,
    ) -> ConstraintReference {
        self.assignment_info[variable].reference
    }

    fn make_assignment(&mut self, true_literal: Literal, reference: ConstraintReference) {
        korat_assert_moderate!(self.is_literal_unassigned(true_literal));
        self.assignment_info[true_literal.get_propositional_variable()] = AssignmentInfo {
            truth_value: Some(true_literal.is_positive()),
            decision_level: self.current_decision_level,
            reference,
        };
        self.trail.push(true_literal);
    }

    pub(crate) fn enqueue_decision_literal(&mut self, decision_literal: Literal) {
        korat_assert_simple!(self.is_literal_unassigned(decision_literal));
        self.make_assignment(decision_literal, ConstraintReference::NULL);
    }

    /// Enqueue a propagated literal. Returns a conflict when the literal is
    /// already assigned false; enqueueing an already-true literal is a no-op.
    pub(crate) fn enqueue_propagated_literal(
        &mut self,
        propagated_literal: Literal,
        reference: ConstraintReference,
    ) -> Option<ConflictInfo> {
        if self.is_literal_assigned_true(propagated_literal) {
            None
        } else if self.is_literal_assigned_false(propagated_literal) {
            Some(ConflictInfo::Propagation {
                literal: propagated_literal,
                reference,
            })
        } else {
            self.make_assignment(propagated_literal, reference);
            None
        }
    }

    pub(crate) fn increase_decision_level(&mut self) {
        self.current_decision_level += 1;
        self.decision_level_limits.push(self.trail.len());
    }

    /// Backtrack to `new_decision_level`, unassigning everything above it.
    /// The unassigned literals are returned in pop order (deepest first) so
    /// that the brancher can restore saved phases.
    pub(crate) fn synchronise(&mut self, new_decision_level: usize) -> Vec<Literal> {
        korat_assert_simple!(new_decision_level < self.current_decision_level);

        let new_trail_length = self.decision_level_limits[new_decision_level];
        let mut unassigned = Vec::with_capacity(self.trail.len() - new_trail_length);
        while self.trail.len() > new_trail_length {
            let literal = self.trail.pop().expect("trail entries above the limit");
            self.assignment_info[literal.get_propositional_variable()] = AssignmentInfo {
                truth_value: None,
                decision_level: 0,
                reference: ConstraintReference::NULL,
            };
            unassigned.push(literal);
        }
        self.decision_level_limits.truncate(new_decision_level);
        self.current_decision_level = new_decision_level;
        unassigned
    }

    /// Rewrite clause antecedents of assigned variables after arena
    /// relocation.
    pub(crate) fn relocate(&mut self, map: &crate::engine::sat::ClauseRelocationMap) {
        for variable in self.assignment_info.keys().collect::<Vec<_>>() {
            if self.assignment_info[variable].truth_value.is_some() {
                self.assignment_info[variable].reference.relocate(map);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignments_with_variables(n: u32) -> AssignmentsPropositional {
        let mut assignments = AssignmentsPropositional::default();
        for _ in 0..n {
            let _ = assignments.grow();
        }
        assignments
    }

    #[test]
    fn enqueued_decision_is_true_at_the_current_level() {
        let mut assignments = assignments_with_variables(3);
        let literal = Literal::new(PropositionalVariable::new(1), true);

        assignments.increase_decision_level();
        assignments.enqueue_decision_literal(literal);

        assert!(assignments.is_literal_assigned_true(literal));
        assert!(assignments.is_literal_assigned_false(!literal));
        assert_eq!(assignments.get_literal_assignment_level(literal), 1);
        assert!(assignments.is_literal_decision(literal));
    }

    #[test]
    fn conflicting_enqueue_reports_the_conflict() {
        let mut assignments = assignments_with_variables(2);
        let literal = Literal::new(PropositionalVariable::new(1), true);

        assignments.enqueue_decision_literal(literal);
        let conflict =
            assignments.enqueue_propagated_literal(!literal, ConstraintReference::NULL);
        assert!(conflict.is_some());
    }

    #[test]
    fn trail_prefix_below_a_level_limit_survives_backtracking() {
        let mut assignments = assignments_with_variables(4);
        let root_literal = Literal::new(PropositionalVariable::new(1), true);
        let decision = Literal::new(PropositionalVariable::new(2), false);

        let _ = assignments.enqueue_propagated_literal(root_literal, ConstraintReference::NULL);
        assignments.increase_decision_level();
        assignments.enqueue_decision_literal(decision);

        let limit = assignments.get_decision_level_limit(1);
        assert_eq!(limit, 1);

        let unassigned = assignments.synchronise(0);
        assert_eq!(unassigned, vec![decision]);
        assert_eq!(assignments.num_trail_entries(), 1);
        assert!(assignments.is_literal_assigned_true(root_literal));
        assert!(assignments.is_literal_unassigned(decision));
    }
}
