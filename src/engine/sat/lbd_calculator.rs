use super::AssignmentsPropositional;
use crate::basic_types::HashSet;
use crate::engine::variables::Literal;

/// Compute the literal block distance of a clause: the number of distinct
/// decision levels among its assigned literals, ignoring the root level.
pub(crate) fn calculate_lbd(clause: &[Literal], assignments: &AssignmentsPropositional) -> u32 {
    let mut levels: HashSet<usize> = HashSet::default();
    for &literal in clause {
        if assignments.is_literal_assigned(literal) {
            let level = assignments.get_literal_assignment_level(literal);
            if level > 0 {
                let _ = levels.insert(level);
            }
        }
    }
    levels.len() as u32
}
