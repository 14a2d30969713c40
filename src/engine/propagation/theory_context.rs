use super::ModuleId;
use super::ReasonStore;
use super::TheoryWatchList;
use crate::basic_types::ClauseReference;
use crate::basic_types::ConstraintReference;
use crate::basic_types::KeyedVec;
use crate::basic_types::PropagationStatus;
use crate::branching::VariableFlags;
use crate::engine::sat::AssignmentsPropositional;
use crate::engine::sat::ClausalPropagator;
use crate::engine::sat::ClauseAllocator;
use crate::engine::sat::LearnedClauseManager;
use crate::engine::variables::Literal;
use crate::engine::variables::PropositionalVariable;
use crate::korat_assert_simple;
use crate::propagators::aggregates::AggregatePropagator;

/// The interface through which a theory module talks to the rest of the
/// solver during propagation. All trail mutation goes through the enqueue
/// methods here, so the kernel keeps full control over antecedent
/// bookkeeping. Peer modules are only reachable through the well-typed query
/// handle the coordinator placed in the context.
#[derive(Debug)]
pub(crate) struct TheoryContext<'a> {
    pub(crate) assignments: &'a mut AssignmentsPropositional,
    pub(crate) reason_store: &'a mut ReasonStore,
    pub(crate) clause_allocator: &'a mut ClauseAllocator,
    pub(crate) clausal_propagator: &'a mut ClausalPropagator,
    pub(crate) learned_clause_manager: &'a mut LearnedClauseManager,
    pub(crate) theory_watch_list: &'a mut TheoryWatchList,
    pub(crate) variable_flags: &'a mut KeyedVec<PropositionalVariable, VariableFlags>,
    /// Query handle on the aggregate module for the definition module; `None`
    /// while the aggregate module itself is running.
    pub(crate) peer_aggregates: Option<&'a AggregatePropagator>,
    module: ModuleId,
}

impl<'a> TheoryContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        assignments: &'a mut AssignmentsPropositional,
        reason_store: &'a mut ReasonStore,
        clause_allocator: &'a mut ClauseAllocator,
        clausal_propagator: &'a mut ClausalPropagator,
        learned_clause_manager: &'a mut LearnedClauseManager,
        theory_watch_list: &'a mut TheoryWatchList,
        variable_flags: &'a mut KeyedVec<PropositionalVariable, VariableFlags>,
        peer_aggregates: Option<&'a AggregatePropagator>,
        module: ModuleId,
    ) -> Self {
        TheoryContext {
            assignments,
            reason_store,
            clause_allocator,
            clausal_propagator,
            learned_clause_manager,
            theory_watch_list,
            variable_flags,
            peer_aggregates,
            module,
        }
    }

    pub(crate) fn get_decision_level(&self) -> usize {
        self.assignments.get_decision_level()
    }

    /// Enqueue a theory propagation. The antecedent records the calling
    /// module together with `payload`, which the module will be handed back
    /// when the kernel requests an explanation.
    pub(crate) fn enqueue_propagated(
        &mut self,
        literal: Literal,
        payload: u32,
    ) -> PropagationStatus {
        let reason_ref = self.reason_store.push(self.module, payload);
        match self.assignments.enqueue_propagated_literal(
            literal,
            ConstraintReference::create_reason_reference(reason_ref),
        ) {
            None => Ok(()),
            Some(conflict_info) => Err(conflict_info),
        }
    }

    /// Enqueue a root-level fact. Root assignments keep no reason.
    pub(crate) fn enqueue_root(&mut self, literal: Literal) -> PropagationStatus {
        korat_assert_simple!(self.assignments.is_at_the_root_level());
        match self
            .assignments
            .enqueue_propagated_literal(literal, ConstraintReference::NULL)
        {
            None => Ok(()),
            Some(conflict_info) => Err(conflict_info),
        }
    }

    /// Hand a clause to the kernel as a learned clause whose first literal is
    /// asserting; the literal is enqueued with the clause as antecedent.
    pub(crate) fn add_asserting_learned_clause(
        &mut self,
        literals: Vec<Literal>,
    ) -> ClauseReference {
        let reference = self.clausal_propagator.add_asserting_learned_clause(
            literals,
            self.assignments,
            self.clause_allocator,
        );
        self.learned_clause_manager.add_learned_clause(reference);
        reference
    }

    /// Hand a satisfied or non-unit clause to the kernel as a learned clause
    /// without enqueueing anything.
    pub(crate) fn add_learned_clause_unchecked(
        &mut self,
        literals: Vec<Literal>,
    ) -> ClauseReference {
        let reference = self.clausal_propagator.add_clause_unchecked(
            literals,
            true,
            self.clause_allocator,
        );
        self.learned_clause_manager.add_learned_clause(reference);
        reference
    }

    /// Create a fresh auxiliary variable mid-search (used for Tseitin atoms
    /// introduced by large loop formulas). Auxiliary variables are not
    /// decidable and are hidden from reported models.
    pub(crate) fn create_new_propositional_variable(&mut self) -> PropositionalVariable {
        let variable = self.assignments.grow();
        self.clausal_propagator.grow();
        self.theory_watch_list.grow();
        let _ = self.variable_flags.push(VariableFlags {
            polarity_hint: false,
            decidable: false,
        });
        variable
    }
}
