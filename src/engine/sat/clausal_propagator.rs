//! Clausal propagation based on the two-watched-literal scheme. For every
//! literal the propagator keeps a list of `(clause, blocker)` pairs; the
//! clause is examined when the watched literal becomes false, and the blocker
//! short-circuits the examination when it is already true.

use log::warn;

use super::AssignmentsPropositional;
use super::ClauseAllocator;
use super::ClauseRelocationMap;
use crate::basic_types::ClauseReference;
use crate::basic_types::ConflictInfo;
use crate::basic_types::ConstraintOperationError;
use crate::basic_types::KeyedVec;
use crate::engine::preprocessor::Preprocessor;
use crate::engine::variables::Literal;
use crate::korat_assert_moderate;
use crate::korat_assert_simple;

#[derive(Clone, Copy, Debug)]
pub(crate) struct ClauseWatcher {
    /// A literal of the clause; when it is true the clause is satisfied and
    /// the watcher does not need to touch clause memory.
    blocker: Literal,
    clause_reference: ClauseReference,
}

#[derive(Default, Debug)]
pub(crate) struct ClausalPropagator {
    watch_lists: KeyedVec<Literal, Vec<ClauseWatcher>>,
    next_position_on_trail_to_propagate: usize,
    permanent_clauses: Vec<ClauseReference>,
    is_in_infeasible_state: bool,
}

impl ClausalPropagator {
    pub(crate) fn grow(&mut self) {
        // one watch list per polarity
        let _ = self.watch_lists.push(vec![]);
        let _ = self.watch_lists.push(vec![]);
    }

    pub(crate) fn is_propagation_complete(&self, trail_size: usize) -> bool {
        self.next_position_on_trail_to_propagate == trail_size
    }

    pub(crate) fn synchronise(&mut self, trail_size: usize) {
        korat_assert_simple!(self.next_position_on_trail_to_propagate >= trail_size);
        self.next_position_on_trail_to_propagate = trail_size;
    }

    pub(crate) fn get_literal_propagation_clause_reference(
        &self,
        propagated_literal: Literal,
        assignments: &AssignmentsPropositional,
    ) -> ClauseReference {
        let reference = assignments
            .get_variable_reason_constraint(propagated_literal.get_propositional_variable());
        korat_assert_moderate!(reference.is_clause());
        reference.as_clause_reference()
    }

    /// Add a problem clause. Must be called at the root level; the clause is
    /// simplified against the root assignment first.
    pub(crate) fn add_permanent_clause(
        &mut self,
        literals: Vec<Literal>,
        assignments: &mut AssignmentsPropositional,
        clause_allocator: &mut ClauseAllocator,
    ) -> Result<(), ConstraintOperationError> {
        korat_assert_simple!(assignments.is_at_the_root_level());

        if self.is_in_infeasible_state {
            return Err(ConstraintOperationError::InfeasibleState);
        }

        if literals.is_empty() {
            warn!("adding an empty clause, unusual!");
        }

        let literals = Preprocessor::preprocess_clause(literals, assignments);

        if literals.is_empty() {
            self.is_in_infeasible_state = true;
            return Err(ConstraintOperationError::InfeasibleClause);
        }

        if literals.len() == 1 {
            // unit clauses become root assignments rather than stored clauses
            if assignments.is_literal_assigned_false(literals[0]) {
                self.is_in_infeasible_state = true;
                return Err(ConstraintOperationError::InfeasibleClause);
            }
            if assignments.is_literal_unassigned(literals[0]) {
                assignments.enqueue_decision_literal(literals[0]);
                if self.propagate(assignments, clause_allocator).is_err() {
                    self.is_in_infeasible_state = true;
                    return Err(ConstraintOperationError::InfeasibleClause);
                }
            }
            return Ok(());
        }

        let reference = clause_allocator.create_clause(literals, false);
        self.permanent_clauses.push(reference);
        self.start_watching_clause(reference, clause_allocator);
        Ok(())
    }

    /// Attach a learned clause whose first literal is asserting under the
    /// current assignment (all other literals false), enqueue that literal,
    /// and return the clause reference. The second watch is moved to the
    /// most recently falsified literal so that backjumps re-propagate
    /// correctly.
    pub(crate) fn add_asserting_learned_clause(
        &mut self,
        mut literals: Vec<Literal>,
        assignments: &mut AssignmentsPropositional,
        clause_allocator: &mut ClauseAllocator,
    ) -> ClauseReference {
        korat_assert_simple!(literals.len() >= 2);
        korat_assert_moderate!(literals[1..]
            .iter()
            .all(|&lit| assignments.is_literal_assigned_false(lit)));

        let second_watch = (1..literals.len())
            .max_by_key(|&i| assignments.get_literal_assignment_level(literals[i]))
            .expect("at least two literals");
        literals.swap(1, second_watch);

        let asserting_literal = literals[0];
        let reference = self.add_clause_unchecked(literals, true, clause_allocator);
        let conflict = assignments.enqueue_propagated_literal(asserting_literal, reference.into());
        korat_assert_simple!(conflict.is_none(), "the learned clause must be asserting");
        reference
    }

    /// Attach a clause without any checks. The caller is responsible for the
    /// watch invariant: if the clause is not satisfied, positions 0 and 1
    /// must hold non-false literals or correctly encode the unit case.
    pub(crate) fn add_clause_unchecked(
        &mut self,
        literals: Vec<Literal>,
        is_learned: bool,
        clause_allocator: &mut ClauseAllocator,
    ) -> ClauseReference {
        korat_assert_moderate!(literals.len() >= 2);

        let reference = clause_allocator.create_clause(literals, is_learned);
        if !is_learned {
            self.permanent_clauses.push(reference);
        }
        self.start_watching_clause(reference, clause_allocator);
        reference
    }

    fn start_watching_clause(
        &mut self,
        reference: ClauseReference,
        clause_allocator: &ClauseAllocator,
    ) {
        let clause = clause_allocator.get_clause(reference);
        let first = clause[0];
        let second = clause[1];
        self.watch_lists[first].push(ClauseWatcher {
            blocker: second,
            clause_reference: reference,
        });
        self.watch_lists[second].push(ClauseWatcher {
            blocker: first,
            clause_reference: reference,
        });
    }

    /// Propagate until fixpoint or conflict, starting from the first trail
    /// entry that has not been propagated yet.
    pub(crate) fn propagate(
        &mut self,
        assignments: &mut AssignmentsPropositional,
        clause_allocator: &mut ClauseAllocator,
    ) -> Result<(), ConflictInfo> {
        korat_assert_simple!(!self.is_in_infeasible_state);

        while self.next_position_on_trail_to_propagate < assignments.num_trail_entries() {
            let true_literal =
                assignments.get_trail_entry(self.next_position_on_trail_to_propagate);
            korat_assert_moderate!(assignments.is_literal_assigned_true(true_literal));
            let false_literal = !true_literal;

            // each watcher of the falsified literal is inspected once; kept
            // watchers are written back in place, migrated watchers are
            // dropped from this list
            let mut kept: usize = 0;
            let mut current: usize = 0;
            let mut conflict = None;

            'watchers: while current < self.watch_lists[false_literal].len() {
                let watcher = self.watch_lists[false_literal][current];
                current += 1;

                if assignments.is_literal_assigned_true(watcher.blocker) {
                    self.watch_lists[false_literal][kept] = watcher;
                    kept += 1;
                    continue;
                }

                let reference = watcher.clause_reference;
                let clause = clause_allocator.get_mutable_clause(reference);

                // normalise so that the falsified watch sits at position 1
                if clause[0] == false_literal {
                    clause[0] = clause[1];
                    clause[1] = false_literal;
                }
                let other_watch = clause[0];

                if other_watch != watcher.blocker
                    && assignments.is_literal_assigned_true(other_watch)
                {
                    self.watch_lists[false_literal][kept] = ClauseWatcher {
                        blocker: other_watch,
                        clause_reference: reference,
                    };
                    kept += 1;
                    continue;
                }

                // look for a non-false literal to take over the watch
                for position in 2..clause.len() {
                    if !assignments.is_literal_assigned_false(clause[position]) {
                        clause[1] = clause[position];
                        clause[position] = false_literal;
                        let new_watch = clause[1];
                        self.watch_lists[new_watch].push(ClauseWatcher {
                            blocker: other_watch,
                            clause_reference: reference,
                        });
                        continue 'watchers;
                    }
                }

                // no replacement: the clause is unit or conflicting
                self.watch_lists[false_literal][kept] = ClauseWatcher {
                    blocker: other_watch,
                    clause_reference: reference,
                };
                kept += 1;

                if let Some(conflict_info) =
                    assignments.enqueue_propagated_literal(other_watch, reference.into())
                {
                    conflict = Some(conflict_info);
                    break;
                }
            }

            if conflict.is_some() {
                // keep the watchers that were not yet inspected
                while current < self.watch_lists[false_literal].len() {
                    self.watch_lists[false_literal][kept] =
                        self.watch_lists[false_literal][current];
                    kept += 1;
                    current += 1;
                }
            }
            self.watch_lists[false_literal].truncate(kept);

            if let Some(conflict_info) = conflict {
                return Err(conflict_info);
            }
            self.next_position_on_trail_to_propagate += 1;
        }

        Ok(())
    }

    /// Detach a clause from the watch index. The literal slice must be the
    /// clause's current literals (watches sit at positions 0 and 1).
    pub(crate) fn remove_clause_from_consideration(
        &mut self,
        clause: &[Literal],
        reference: ClauseReference,
    ) {
        for &watched in &clause[0..2] {
            let watchers = &mut self.watch_lists[watched];
            let position = watchers
                .iter()
                .position(|watcher| watcher.clause_reference == reference)
                .expect("the clause must be watched by both watch literals");
            let _ = watchers.swap_remove(position);
        }
    }

    pub(crate) fn relocate(&mut self, map: &ClauseRelocationMap) {
        for literal in self.watch_lists.keys().collect::<Vec<_>>() {
            for watcher in self.watch_lists[literal].iter_mut() {
                watcher.clause_reference = map.remap(watcher.clause_reference);
            }
        }
        for reference in self.permanent_clauses.iter_mut() {
            *reference = map.remap(*reference);
        }
    }

    /// Check the §3 watch invariant for every clause in the watch index.
    /// Used by debug assertions and tests only.
    pub(crate) fn debug_check_watch_invariant(
        &self,
        assignments: &AssignmentsPropositional,
        clause_allocator: &ClauseAllocator,
    ) -> bool {
        for literal in self.watch_lists.keys() {
            for watcher in &self.watch_lists[literal] {
                let clause = clause_allocator.get_clause(watcher.clause_reference);
                let satisfied = clause
                    .get_literal_slice()
                    .iter()
                    .any(|&lit| assignments.is_literal_assigned_true(lit));
                if satisfied {
                    continue;
                }
                let watch0_false = assignments.is_literal_assigned_false(clause[0]);
                let watch1_false = assignments.is_literal_assigned_false(clause[1]);
                // non-satisfied: both watches non-false, or the clause still
                // awaits propagation of its unit literal
                if watch0_false && watch1_false {
                    return false;
                }
                if (watch0_false || watch1_false)
                    && self.is_propagation_complete(assignments.num_trail_entries())
                {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::variables::PropositionalVariable;

    struct Setup {
        propagator: ClausalPropagator,
        assignments: AssignmentsPropositional,
        allocator: ClauseAllocator,
        literals: Vec<Literal>,
    }

    fn setup(num_variables: u32) -> Setup {
        let mut propagator = ClausalPropagator::default();
        let mut assignments = AssignmentsPropositional::default();
        let literals = (0..num_variables)
            .map(|_| {
                let variable = assignments.grow();
                propagator.grow();
                Literal::new(variable, true)
            })
            .collect();
        Setup {
            propagator,
            assignments,
            allocator: ClauseAllocator::default(),
            literals,
        }
    }

    #[test]
    fn unit_clause_becomes_a_root_assignment() {
        let Setup {
            mut propagator,
            mut assignments,
            mut allocator,
            literals,
        } = setup(3);

        let result =
            propagator.add_permanent_clause(vec![literals[1]], &mut assignments, &mut allocator);
        assert!(result.is_ok());
        assert!(assignments.is_literal_assigned_true(literals[1]));
        assert_eq!(allocator.num_clauses(), 0);
    }

    #[test]
    fn falsified_clause_at_root_is_infeasible() {
        let Setup {
            mut propagator,
            mut assignments,
            mut allocator,
            literals,
        } = setup(2);

        let _ =
            propagator.add_permanent_clause(vec![literals[0]], &mut assignments, &mut allocator);
        let result =
            propagator.add_permanent_clause(vec![!literals[0]], &mut assignments, &mut allocator);
        assert_eq!(result, Err(ConstraintOperationError::InfeasibleClause));
    }

    #[test]
    fn propagation_finds_the_unit_literal() {
        let Setup {
            mut propagator,
            mut assignments,
            mut allocator,
            literals,
        } = setup(3);

        let clause = vec![literals[0], literals[1], literals[2]];
        let _ = propagator.add_permanent_clause(clause, &mut assignments, &mut allocator);

        assignments.increase_decision_level();
        assignments.enqueue_decision_literal(!literals[0]);
        assignments.increase_decision_level();
        assignments.enqueue_decision_literal(!literals[2]);

        let result = propagator.propagate(&mut assignments, &mut allocator);
        assert!(result.is_ok());
        assert!(assignments.is_literal_assigned_true(literals[1]));
        assert!(propagator.debug_check_watch_invariant(&assignments, &allocator));
    }

    #[test]
    fn conflicting_clause_is_reported() {
        let Setup {
            mut propagator,
            mut assignments,
            mut allocator,
            literals,
        } = setup(3);

        let _ = propagator.add_permanent_clause(
            vec![literals[0], literals[1]],
            &mut assignments,
            &mut allocator,
        );
        let _ = propagator.add_permanent_clause(
            vec![literals[0], !literals[1]],
            &mut assignments,
            &mut allocator,
        );

        assignments.increase_decision_level();
        assignments.enqueue_decision_literal(!literals[0]);

        let result = propagator.propagate(&mut assignments, &mut allocator);
        assert!(result.is_err());
    }
}
