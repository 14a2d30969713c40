use super::ConflictAnalysisContext;
use crate::basic_types::KeyedVec;
use crate::engine::sat::calculate_lbd;
use crate::engine::variables::Literal;
use crate::engine::variables::PropositionalVariable;
use crate::korat_assert_moderate;
use crate::korat_assert_simple;

/// The outcome of clause learning.
#[derive(Clone, Default, Debug)]
pub(crate) struct ConflictAnalysisResult {
    /// The learned clause with the asserting literal at index 0 and the
    /// literal with the next highest decision level at index 1.
    pub(crate) learned_literals: Vec<Literal>,
    /// The decision level to backtrack to.
    pub(crate) backjump_level: usize,
    pub(crate) lbd: u32,
}

/// First-UIP resolution over the implication graph. Antecedents of theory
/// propagations are expanded on demand through the owning module's
/// explanation.
#[derive(Default, Debug)]
pub(crate) struct ResolutionConflictAnalyser {
    seen: KeyedVec<PropositionalVariable, bool>,
    to_clear: Vec<PropositionalVariable>,
}

impl ResolutionConflictAnalyser {
    fn grow(&mut self, num_variables: u32) {
        while self.seen.len() < num_variables as usize {
            let _ = self.seen.push(false);
        }
    }

    fn mark(&mut self, variable: PropositionalVariable) {
        if !self.seen[variable] {
            self.seen[variable] = true;
            self.to_clear.push(variable);
        }
    }

    fn clear_marks(&mut self) {
        for variable in self.to_clear.drain(..) {
            self.seen[variable] = false;
        }
    }

    /// Compute the first-UIP clause for the current conflict: resolve
    /// backwards over the trail until exactly one literal of the current
    /// decision level remains.
    pub(crate) fn compute_1uip(
        &mut self,
        context: &mut ConflictAnalysisContext<'_>,
    ) -> ConflictAnalysisResult {
        self.grow(context.assignments.num_propositional_variables());
        korat_assert_simple!(self.to_clear.is_empty());

        let current_level = context.get_decision_level();
        korat_assert_simple!(current_level > 0);

        let mut learned: Vec<Literal> = vec![context.assignments.false_literal];
        let mut num_current_level = 0usize;
        let mut trail_index = context.assignments.num_trail_entries();
        let mut expanded_literal: Option<Literal> = None;
        let mut reason_reference = context.get_conflict_reason_clause_reference();

        loop {
            context
                .learned_clause_manager
                .bump_clause_activity(reason_reference, context.clause_allocator);

            let start = if expanded_literal.is_some() { 1 } else { 0 };
            let reason_literals: Vec<Literal> = context.clause_allocator[reason_reference]
                .get_literal_slice()
                .to_vec();
            for &literal in &reason_literals[start..] {
                korat_assert_moderate!(
                    context.assignments.is_literal_assigned_false(literal)
                );
                let variable = literal.get_propositional_variable();
                if self.seen[variable] {
                    continue;
                }
                let level = context.assignments.get_literal_assignment_level(literal);
                if level == 0 {
                    continue;
                }
                self.mark(variable);
                context.brancher.on_appearance_in_conflict_literal(literal);
                if level == current_level {
                    num_current_level += 1;
                } else {
                    learned.push(literal);
                }
            }

            // the next literal to resolve on is the most recent marked one
            loop {
                korat_assert_simple!(trail_index > 0);
                trail_index -= 1;
                let trail_literal = context.assignments.get_trail_entry(trail_index);
                if self.seen[trail_literal.get_propositional_variable()]
                    && context.assignments.get_literal_assignment_level(trail_literal)
                        == current_level
                {
                    expanded_literal = Some(trail_literal);
                    break;
                }
            }
            let pivot = expanded_literal.expect("a marked literal exists on the trail");
            num_current_level -= 1;
            if num_current_level == 0 {
                learned[0] = !pivot;
                break;
            }
            reason_reference = context.get_propagation_clause_reference(pivot);
        }

        self.minimise(context, &mut learned);

        // position the second watch on the literal of the next highest level
        let backjump_level = if learned.len() == 1 {
            0
        } else {
            let mut best = 1;
            for index in 2..learned.len() {
                if context.assignments.get_literal_assignment_level(learned[index])
                    > context.assignments.get_literal_assignment_level(learned[best])
                {
                    best = index;
                }
            }
            learned.swap(1, best);
            context.assignments.get_literal_assignment_level(learned[1])
        };

        let lbd = calculate_lbd(&learned, context.assignments);
        context
            .counters
            .average_learned_clause_length
            .add_term(learned.len() as u64);

        self.clear_marks();

        ConflictAnalysisResult {
            learned_literals: learned,
            backjump_level,
            lbd,
        }
    }

    /// Self-subsumption minimisation: a clause literal is redundant when its
    /// antecedent resolves entirely into literals already in the clause (or
    /// root assignments).
    fn minimise(&mut self, context: &mut ConflictAnalysisContext<'_>, learned: &mut Vec<Literal>) {
        let mut kept: Vec<Literal> = Vec::with_capacity(learned.len());
        kept.push(learned[0]);
        for index in 1..learned.len() {
            let literal = learned[index];
            let propagated = !literal;
            let reference = context
                .assignments
                .get_variable_reason_constraint(literal.get_propositional_variable());
            if reference.is_null() {
                kept.push(literal);
                continue;
            }
            let reason_reference = context.get_propagation_clause_reference(propagated);
            let redundant = context.clause_allocator[reason_reference]
                .get_literal_slice()[1..]
                .iter()
                .all(|&reason_literal| {
                    let variable = reason_literal.get_propositional_variable();
                    self.seen.get(variable).copied().unwrap_or(false)
                        || context
                            .assignments
                            .get_literal_assignment_level(reason_literal)
                            == 0
                });
            if !redundant {
                kept.push(literal);
            }
        }
        *learned = kept;
    }

    /// Extract an unsatisfiable core over the given assumptions, starting
    /// from the assumption whose complement was derived.
    ///
    /// Three cases: the assumption is already falsified at the root level;
    /// the assumptions directly contain a complementary pair (reported
    /// through `Err`); or the standard case, which resolves all implied
    /// assumptions back to assumption decisions.
    pub(crate) fn compute_clausal_core(
        &mut self,
        context: &mut ConflictAnalysisContext<'_>,
        violated_assumption: Literal,
    ) -> Result<Vec<Literal>, Literal> {
        korat_assert_simple!(context
            .assignments
            .is_literal_assigned_false(violated_assumption));

        if context
            .assignments
            .is_literal_root_assignment(violated_assumption)
        {
            return Ok(vec![violated_assumption]);
        }

        if !context
            .assignments
            .is_literal_propagated(!violated_assumption)
        {
            // the complement was decided, i.e. both x and ~x were assumed
            return Err(violated_assumption);
        }

        self.grow(context.assignments.num_propositional_variables());
        korat_assert_simple!(self.to_clear.is_empty());

        let mut core = vec![violated_assumption];
        let mut queue = vec![!violated_assumption];
        self.mark(violated_assumption.get_propositional_variable());

        while let Some(true_literal) = queue.pop() {
            korat_assert_moderate!(context
                .assignments
                .is_literal_assigned_true(true_literal));
            if context.assignments.is_literal_root_assignment(true_literal) {
                continue;
            }
            if !context.assignments.is_literal_propagated(true_literal) {
                // a decision below the assumption levels is an assumption
                korat_assert_moderate!(context.assumptions.contains(&true_literal));
                core.push(true_literal);
                continue;
            }
            let reason_reference = context.get_propagation_clause_reference(true_literal);
            let reason_literals: Vec<Literal> = context.clause_allocator[reason_reference]
                .get_literal_slice()[1..]
                .to_vec();
            for false_literal in reason_literals {
                let variable = false_literal.get_propositional_variable();
                if self.seen[variable] {
                    continue;
                }
                self.mark(variable);
                queue.push(!false_literal);
            }
        }

        self.clear_marks();
        Ok(core)
    }
}
