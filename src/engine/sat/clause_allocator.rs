//! The clause arena. All clause allocation goes through the allocator; the
//! two exceptions are unit clauses (stored directly on the trail) and the
//! implicit binary encoding of the always-true variable. References stay
//! stable until an explicit [`ClauseAllocator::relocate`] pass, which
//! compacts deleted clauses out of the arena and produces a map with which
//! every outstanding reference must be rewritten.

use super::Clause;
use crate::basic_types::ClauseReference;
use crate::basic_types::KeyedVec;
use crate::basic_types::StorageKey;
use crate::engine::variables::Literal;
use crate::korat_assert_moderate;

#[derive(Default, Debug)]
pub(crate) struct ClauseAllocator {
    clauses: Vec<Clause>,
    num_deleted: usize,
}

impl ClauseAllocator {
    pub(crate) fn create_clause(
        &mut self,
        literals: Vec<Literal>,
        is_learned: bool,
    ) -> ClauseReference {
        self.clauses.push(Clause::new(literals, is_learned));
        ClauseReference::new(self.clauses.len() as u32 - 1)
    }

    pub(crate) fn get_clause(&self, reference: ClauseReference) -> &Clause {
        &self.clauses[reference.index()]
    }

    pub(crate) fn get_mutable_clause(&mut self, reference: ClauseReference) -> &mut Clause {
        &mut self.clauses[reference.index()]
    }

    pub(crate) fn delete_clause(&mut self, reference: ClauseReference) {
        korat_assert_moderate!(!self.clauses[reference.index()].is_deleted());
        self.clauses[reference.index()].mark_deleted();
        self.num_deleted += 1;
    }

    pub(crate) fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    pub(crate) fn num_live_clauses(&self) -> usize {
        self.clauses.len() - self.num_deleted
    }

    /// The fraction of the arena taken up by deleted clauses.
    pub(crate) fn waste_fraction(&self) -> f64 {
        if self.clauses.is_empty() {
            0.0
        } else {
            self.num_deleted as f64 / self.clauses.len() as f64
        }
    }

    /// Compact the arena by dropping deleted clauses. Every live clause gets
    /// a fresh reference; the returned map must be used to rewrite all
    /// outstanding references before the allocator is used again.
    pub(crate) fn relocate(&mut self) -> ClauseRelocationMap {
        let mut map = ClauseRelocationMap {
            new_references: KeyedVec::default(),
        };
        let old_clauses = std::mem::take(&mut self.clauses);
        for clause in old_clauses {
            if clause.is_deleted() {
                let _ = map.new_references.push(None);
            } else {
                self.clauses.push(clause);
                let _ = map
                    .new_references
                    .push(Some(ClauseReference::new(self.clauses.len() as u32 - 1)));
            }
        }
        self.num_deleted = 0;
        map
    }
}

impl std::ops::Index<ClauseReference> for ClauseAllocator {
    type Output = Clause;
    fn index(&self, reference: ClauseReference) -> &Clause {
        self.get_clause(reference)
    }
}

impl std::ops::IndexMut<ClauseReference> for ClauseAllocator {
    fn index_mut(&mut self, reference: ClauseReference) -> &mut Clause {
        self.get_mutable_clause(reference)
    }
}

/// The old-to-new reference map produced by a relocation pass.
#[derive(Debug)]
pub(crate) struct ClauseRelocationMap {
    new_references: KeyedVec<ClauseReference, Option<ClauseReference>>,
}

impl ClauseRelocationMap {
    /// Rewrite a reference. Relocating a reference to a deleted clause is a
    /// logic error: deleted clauses must have been detached everywhere before
    /// the relocation pass.
    pub(crate) fn remap(&self, reference: ClauseReference) -> ClauseReference {
        self.new_references[reference]
            .expect("no reference to a deleted clause may survive relocation")
    }

    /// Rewrite a reference that may legitimately point at a deleted clause
    /// (bookkeeping lists of learned clauses).
    pub(crate) fn try_remap(&self, reference: ClauseReference) -> Option<ClauseReference> {
        self.new_references[reference]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::variables::PropositionalVariable;

    fn literals(codes: &[u32]) -> Vec<Literal> {
        codes
            .iter()
            .map(|&code| {
                Literal::new(PropositionalVariable::new(code), true)
            })
            .collect()
    }

    #[test]
    fn relocation_compacts_deleted_clauses_and_remaps_survivors() {
        let mut allocator = ClauseAllocator::default();
        let first = allocator.create_clause(literals(&[1, 2]), false);
        let second = allocator.create_clause(literals(&[3, 4]), true);
        let third = allocator.create_clause(literals(&[5, 6]), true);

        allocator.delete_clause(second);
        assert_eq!(allocator.num_live_clauses(), 2);

        let map = allocator.relocate();
        let first = map.remap(first);
        let third = map.remap(third);

        assert_eq!(allocator.num_clauses(), 2);
        assert_eq!(allocator[first].get_literal_slice(), literals(&[1, 2]));
        assert_eq!(allocator[third].get_literal_slice(), literals(&[5, 6]));
    }

    #[test]
    fn waste_fraction_tracks_deletions() {
        let mut allocator = ClauseAllocator::default();
        let first = allocator.create_clause(literals(&[1, 2]), true);
        let _ = allocator.create_clause(literals(&[3, 4]), true);

        assert_eq!(allocator.waste_fraction(), 0.0);
        allocator.delete_clause(first);
        assert_eq!(allocator.waste_fraction(), 0.5);
    }
}
