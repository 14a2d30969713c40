//! Bookkeeping for learned clauses: activities, decay, and the periodic
//! `reduce_db` pass that trims the database back to half its size.

use super::AssignmentsPropositional;
use super::ClausalPropagator;
use super::ClauseAllocator;
use super::ClauseRelocationMap;
use crate::basic_types::statistic_logging::log_statistic;
use crate::basic_types::ClauseReference;
use crate::engine::variables::Literal;
use crate::korat_assert_moderate;

const MAX_CLAUSE_ACTIVITY: f32 = 1e20;

#[derive(Debug)]
pub(crate) struct LearnedClauseManager {
    learned_clauses: Vec<ClauseReference>,
    clause_activity_increment: f32,
    clause_activity_decay: f32,
    /// The database is reduced once the number of learned clauses exceeds
    /// this; the limit grows after every reduction.
    num_learned_clauses_limit: usize,
    limit_growth_factor: f32,
    num_reductions: u64,
}

impl LearnedClauseManager {
    pub(crate) fn new(
        initial_limit: usize,
        limit_growth_factor: f32,
        clause_activity_decay: f32,
    ) -> Self {
        LearnedClauseManager {
            learned_clauses: Vec::default(),
            clause_activity_increment: 1.0,
            clause_activity_decay,
            num_learned_clauses_limit: initial_limit,
            limit_growth_factor,
            num_reductions: 0,
        }
    }

    pub(crate) fn num_learned_clauses(&self) -> usize {
        self.learned_clauses.len()
    }

    pub(crate) fn add_learned_clause(&mut self, reference: ClauseReference) {
        self.learned_clauses.push(reference);
    }

    pub(crate) fn should_reduce(&self) -> bool {
        self.learned_clauses.len() > self.num_learned_clauses_limit
    }

    pub(crate) fn bump_clause_activity(
        &mut self,
        reference: ClauseReference,
        clause_allocator: &mut ClauseAllocator,
    ) {
        let clause = clause_allocator.get_mutable_clause(reference);
        if !clause.is_learned() {
            return;
        }
        if clause.lbd() <= 3 {
            // glue clauses survive the next database reduction
            clause.mark_protection_against_deletion();
        }
        clause.increase_activity(self.clause_activity_increment);
        if clause.get_activity() > MAX_CLAUSE_ACTIVITY {
            for &learned in &self.learned_clauses {
                clause_allocator
                    .get_mutable_clause(learned)
                    .divide_activity(MAX_CLAUSE_ACTIVITY);
            }
            self.clause_activity_increment /= MAX_CLAUSE_ACTIVITY;
        }
    }

    pub(crate) fn decay_clause_activities(&mut self) {
        self.clause_activity_increment /= self.clause_activity_decay;
    }

    /// Whether the clause currently propagates its first literal; such
    /// clauses are antecedents on the trail and must not be deleted.
    fn is_clause_locked(
        reference: ClauseReference,
        clause_allocator: &ClauseAllocator,
        assignments: &AssignmentsPropositional,
    ) -> bool {
        let clause = clause_allocator.get_clause(reference);
        let propagated: Literal = clause[0];
        assignments.is_literal_assigned_true(propagated)
            && assignments
                .get_variable_reason_constraint(propagated.get_propositional_variable())
                .is_clause()
            && assignments
                .get_variable_reason_constraint(propagated.get_propositional_variable())
                .as_clause_reference()
                == reference
    }

    /// Remove roughly half of the learned clauses, keeping locked clauses,
    /// binary clauses and the most active half. Clauses protected against
    /// deletion survive one reduction and lose their protection.
    pub(crate) fn reduce(
        &mut self,
        clause_allocator: &mut ClauseAllocator,
        clausal_propagator: &mut ClausalPropagator,
        assignments: &AssignmentsPropositional,
    ) {
        self.num_reductions += 1;

        // sort so that the clauses we would rather keep come last: higher
        // activity wins, lower lbd breaks ties
        self.learned_clauses.sort_by(|&a, &b| {
            let clause_a = clause_allocator.get_clause(a);
            let clause_b = clause_allocator.get_clause(b);
            clause_a
                .get_activity()
                .total_cmp(&clause_b.get_activity())
                .then(clause_b.lbd().cmp(&clause_a.lbd()))
        });

        let mut kept: Vec<ClauseReference> = Vec::with_capacity(self.learned_clauses.len());
        let num_to_remove = self.learned_clauses.len() / 2;
        let mut num_removed = 0;

        for index in 0..self.learned_clauses.len() {
            let reference = self.learned_clauses[index];
            let keep = num_removed >= num_to_remove
                || clause_allocator.get_clause(reference).len() == 2
                || Self::is_clause_locked(reference, clause_allocator, assignments)
                || clause_allocator
                    .get_clause(reference)
                    .is_protected_against_deletion();

            if keep {
                clause_allocator
                    .get_mutable_clause(reference)
                    .clear_protection_against_deletion();
                kept.push(reference);
            } else {
                let literals = clause_allocator
                    .get_clause(reference)
                    .get_literal_slice()
                    .to_vec();
                clausal_propagator.remove_clause_from_consideration(&literals, reference);
                clause_allocator.delete_clause(reference);
                num_removed += 1;
            }
        }

        self.learned_clauses = kept;
        self.num_learned_clauses_limit =
            (self.num_learned_clauses_limit as f32 * self.limit_growth_factor) as usize;
        korat_assert_moderate!(self
            .learned_clauses
            .iter()
            .all(|&reference| !clause_allocator.get_clause(reference).is_deleted()));
    }

    pub(crate) fn relocate(&mut self, map: &ClauseRelocationMap) {
        for reference in self.learned_clauses.iter_mut() {
            *reference = map.remap(*reference);
        }
    }

    pub(crate) fn log_statistics(&self) {
        log_statistic("numberOfLearnedClauses", self.learned_clauses.len());
        log_statistic("numberOfDatabaseReductions", self.num_reductions);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::variables::PropositionalVariable;

    fn new_literal(index: u32) -> Literal {
        Literal::new(PropositionalVariable::new(index), true)
    }

    #[test]
    fn reduce_keeps_binary_clauses_and_the_active_half() {
        let mut manager = LearnedClauseManager::new(2, 1.5, 0.999);
        let mut allocator = ClauseAllocator::default();
        let mut propagator = ClausalPropagator::default();
        let mut assignments = AssignmentsPropositional::default();
        for _ in 0..10 {
            let _ = assignments.grow();
            propagator.grow();
        }

        let binary = propagator.add_clause_unchecked(
            vec![new_literal(1), new_literal(2)],
            true,
            &mut allocator,
        );
        let cold = propagator.add_clause_unchecked(
            vec![new_literal(3), new_literal(4), new_literal(5)],
            true,
            &mut allocator,
        );
        let hot = propagator.add_clause_unchecked(
            vec![new_literal(6), new_literal(7), new_literal(8)],
            true,
            &mut allocator,
        );
        manager.add_learned_clause(binary);
        manager.add_learned_clause(cold);
        manager.add_learned_clause(hot);

        manager.bump_clause_activity(hot, &mut allocator);

        manager.reduce(&mut allocator, &mut propagator, &assignments);

        assert!(!allocator.get_clause(binary).is_deleted());
        assert!(!allocator.get_clause(hot).is_deleted());
        assert!(allocator.get_clause(cold).is_deleted());
    }
}
