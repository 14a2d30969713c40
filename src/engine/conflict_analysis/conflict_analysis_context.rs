use crate::basic_types::ClauseReference;
use crate::basic_types::ConflictInfo;
use crate::branching::Brancher;
use crate::engine::propagation::ReasonStore;
use crate::engine::sat::AssignmentsPropositional;
use crate::engine::sat::ClausalPropagator;
use crate::engine::sat::ClauseAllocator;
use crate::engine::sat::ExplanationClauseManager;
use crate::engine::sat::LearnedClauseManager;
use crate::engine::solver::Counters;
use crate::engine::solver::TheoryModules;
use crate::engine::variables::Literal;
use crate::korat_assert_moderate;

/// Everything conflict analysis needs, borrowed from the solver for the
/// duration of one analysis. Theory antecedents are expanded on demand: the
/// owning module produces the reason clause, which is materialised as a
/// short-lived explanation clause.
pub(crate) struct ConflictAnalysisContext<'a> {
    pub(crate) assignments: &'a mut AssignmentsPropositional,
    pub(crate) clause_allocator: &'a mut ClauseAllocator,
    pub(crate) explanation_clause_manager: &'a mut ExplanationClauseManager,
    pub(crate) reason_store: &'a ReasonStore,
    pub(crate) modules: &'a TheoryModules,
    pub(crate) learned_clause_manager: &'a mut LearnedClauseManager,
    pub(crate) clausal_propagator: &'a ClausalPropagator,
    pub(crate) assumptions: &'a [Literal],
    pub(crate) conflict: &'a ConflictInfo,
    pub(crate) counters: &'a mut Counters,
    pub(crate) brancher: &'a mut dyn Brancher,
}

impl ConflictAnalysisContext<'_> {
    pub(crate) fn get_decision_level(&self) -> usize {
        self.assignments.get_decision_level()
    }

    /// The clause that propagated `literal`: the propagating clause itself
    /// when the antecedent is clausal, or a freshly materialised explanation
    /// clause when a theory module propagated it. The propagated literal is
    /// at position 0 in either case.
    pub(crate) fn get_propagation_clause_reference(
        &mut self,
        propagated_literal: Literal,
    ) -> ClauseReference {
        korat_assert_moderate!(
            !self
                .assignments
                .is_literal_root_assignment(propagated_literal),
            "reasons are not kept for root propagations"
        );
        korat_assert_moderate!(
            self.assignments.is_literal_assigned_true(propagated_literal),
            "reasons only make sense for true literals"
        );

        let reference = self
            .assignments
            .get_variable_reason_constraint(propagated_literal.get_propositional_variable());

        if reference.is_clause() {
            self.clausal_propagator
                .get_literal_propagation_clause_reference(propagated_literal, self.assignments)
        } else {
            let (module, payload) = self.reason_store.get(reference.get_reason_ref());
            let explanation =
                self.modules
                    .explain(module, self.assignments, propagated_literal, payload);
            self.materialise_explanation(explanation)
        }
    }

    /// The clause the analysis starts from: every literal in it is false
    /// under the current assignment.
    pub(crate) fn get_conflict_reason_clause_reference(&mut self) -> ClauseReference {
        match self.conflict {
            ConflictInfo::Propagation { literal, reference } => {
                if reference.is_clause() {
                    reference.as_clause_reference()
                } else {
                    let (module, payload) = self.reason_store.get(reference.get_reason_ref());
                    let explanation =
                        self.modules.explain(module, self.assignments, *literal, payload);
                    self.materialise_explanation(explanation)
                }
            }
            ConflictInfo::Explanation { clause } => {
                self.materialise_explanation(clause.clone())
            }
        }
    }

    fn materialise_explanation(&mut self, mut explanation: Vec<Literal>) -> ClauseReference {
        korat_assert_moderate!(explanation
            .iter()
            .skip(1)
            .all(|&literal| self.assignments.is_literal_assigned_false(literal)));
        // explanation clauses share the clause representation, which needs
        // at least two literals
        while explanation.len() < 2 {
            explanation.push(self.assignments.false_literal);
        }
        self.explanation_clause_manager
            .add_explanation_clause_unchecked(explanation, self.clause_allocator)
    }
}

impl Drop for ConflictAnalysisContext<'_> {
    fn drop(&mut self) {
        // explanation clauses only live for the duration of one analysis
        self.explanation_clause_manager
            .clean_up_explanation_clauses(self.clause_allocator);
    }
}
