use super::ClauseAllocator;
use crate::basic_types::ClauseReference;
use crate::engine::variables::Literal;
use crate::korat_assert_moderate;

/// Scratch clauses built from theory explanations during conflict analysis.
/// They only live for the duration of one analysis and are deleted in bulk
/// when it finishes.
#[derive(Default, Debug)]
pub(crate) struct ExplanationClauseManager {
    explanation_clauses: Vec<ClauseReference>,
}

impl ExplanationClauseManager {
    pub(crate) fn is_empty(&self) -> bool {
        self.explanation_clauses.is_empty()
    }

    pub(crate) fn add_explanation_clause_unchecked(
        &mut self,
        explanation_literals: Vec<Literal>,
        clause_allocator: &mut ClauseAllocator,
    ) -> ClauseReference {
        korat_assert_moderate!(explanation_literals.len() >= 2);

        let clause_reference = clause_allocator.create_clause(explanation_literals, false);
        self.explanation_clauses.push(clause_reference);

        clause_reference
    }

    pub(crate) fn clean_up_explanation_clauses(&mut self, clause_allocator: &mut ClauseAllocator) {
        // deleted in reverse allocation order so a future arena can reclaim
        // the space as one block
        for clause_reference in self.explanation_clauses.iter().rev() {
            clause_allocator.delete_clause(*clause_reference);
        }
        self.explanation_clauses.clear();
    }
}
