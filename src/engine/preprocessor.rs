use crate::basic_types::HashSet;
use crate::engine::sat::AssignmentsPropositional;
use crate::engine::variables::Literal;
use crate::korat_assert_simple;

/// Root-level clause simplification.
#[derive(Debug, Copy, Clone)]
pub(crate) struct Preprocessor;

impl Preprocessor {
    /// Simplify a clause against the root assignment: duplicate literals are
    /// dropped, literals false at the root are removed, and a clause that is
    /// satisfied at the root or contains a complementary pair collapses to a
    /// unit clause with a root-satisfied literal. An empty result means the
    /// clause is falsified at the root.
    pub(crate) fn preprocess_clause(
        literals: Vec<Literal>,
        assignments: &AssignmentsPropositional,
    ) -> Vec<Literal> {
        korat_assert_simple!(assignments.is_at_the_root_level());

        let mut present: HashSet<Literal> = HashSet::default();
        let mut preprocessed = Vec::with_capacity(literals.len());

        for literal in literals {
            if assignments.is_literal_assigned_true(literal) {
                return vec![literal];
            }
            if assignments.is_literal_assigned_false(literal) || present.contains(&literal) {
                continue;
            }
            if present.contains(&!literal) {
                // {x, ~x}: the clause is a tautology
                return vec![assignments.true_literal];
            }
            let _ = present.insert(literal);
            preprocessed.push(literal);
        }

        preprocessed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic_types::ConstraintReference;
    use crate::engine::variables::PropositionalVariable;

    fn setup() -> (AssignmentsPropositional, Vec<Literal>) {
        let mut assignments = AssignmentsPropositional::default();
        let literals: Vec<Literal> = (0..4)
            .map(|_| Literal::new(assignments.grow(), true))
            .collect();
        (assignments, literals)
    }

    #[test]
    fn duplicates_are_removed() {
        let (assignments, lits) = setup();
        let clause = vec![lits[0], lits[1], lits[0]];
        assert_eq!(
            Preprocessor::preprocess_clause(clause, &assignments),
            vec![lits[0], lits[1]]
        );
    }

    #[test]
    fn complementary_pair_collapses_to_the_true_literal() {
        let (assignments, lits) = setup();
        let clause = vec![lits[0], !lits[0]];
        assert_eq!(
            Preprocessor::preprocess_clause(clause, &assignments),
            vec![assignments.true_literal]
        );
    }

    #[test]
    fn root_false_literals_are_dropped() {
        let (mut assignments, lits) = setup();
        let _ = assignments.enqueue_propagated_literal(!lits[2], ConstraintReference::NULL);

        let clause = vec![lits[1], lits[2]];
        assert_eq!(
            Preprocessor::preprocess_clause(clause, &assignments),
            vec![lits[1]]
        );
    }
}
