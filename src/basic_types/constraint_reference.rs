use super::ClauseReference;
use crate::engine::propagation::ReasonRef;
use crate::korat_assert_moderate;

/// The antecedent of an assigned variable, packed into a single `u32`:
/// either a reference to the propagating clause, a reference to a theory
/// reason (module id plus opaque payload, resolved through the
/// [`ReasonStore`]), or the null reference for decisions and root
/// assignments.
///
/// [`ReasonStore`]: crate::engine::propagation::ReasonStore
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) struct ConstraintReference {
    code: u32,
}

const REASON_BIT: u32 = 1 << 31;

impl ConstraintReference {
    /// The reference used for decisions and root assignments, whose reason is
    /// never requested.
    pub(crate) const NULL: ConstraintReference = ConstraintReference { code: 0 };

    pub(crate) fn create_standard_reference(clause_reference: ClauseReference) -> Self {
        let index = clause_reference.get_index();
        korat_assert_moderate!(index < REASON_BIT - 1);
        ConstraintReference { code: index + 1 }
    }

    pub(crate) fn create_reason_reference(reason_ref: ReasonRef) -> Self {
        korat_assert_moderate!(reason_ref.0 < REASON_BIT);
        ConstraintReference {
            code: reason_ref.0 | REASON_BIT,
        }
    }

    pub(crate) fn is_null(&self) -> bool {
        self.code == 0
    }

    pub(crate) fn is_clause(&self) -> bool {
        !self.is_null() && (self.code & REASON_BIT) == 0
    }

    pub(crate) fn is_theory_reason(&self) -> bool {
        (self.code & REASON_BIT) != 0
    }

    pub(crate) fn as_clause_reference(&self) -> ClauseReference {
        korat_assert_moderate!(self.is_clause());
        ClauseReference::new(self.code - 1)
    }

    pub(crate) fn get_reason_ref(&self) -> ReasonRef {
        korat_assert_moderate!(self.is_theory_reason());
        ReasonRef(self.code & !REASON_BIT)
    }

    /// Rewrite a clause reference through a relocation map; theory reasons and
    /// the null reference are unaffected.
    pub(crate) fn relocate(
        &mut self,
        map: &crate::engine::sat::ClauseRelocationMap,
    ) {
        if self.is_clause() {
            *self = ConstraintReference::create_standard_reference(
                map.remap(self.as_clause_reference()),
            );
        }
    }
}

impl From<ClauseReference> for ConstraintReference {
    fn from(clause_reference: ClauseReference) -> Self {
        ConstraintReference::create_standard_reference(clause_reference)
    }
}

impl std::fmt::Debug for ConstraintReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_null() {
            write!(f, "null")
        } else if self.is_clause() {
            write!(f, "{:?}", self.as_clause_reference())
        } else {
            write!(f, "reason:{}", self.get_reason_ref().0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clause_reference_round_trips() {
        let reference = ConstraintReference::create_standard_reference(ClauseReference::new(17));
        assert!(reference.is_clause());
        assert!(!reference.is_theory_reason());
        assert!(!reference.is_null());
        assert_eq!(reference.as_clause_reference(), ClauseReference::new(17));
    }

    #[test]
    fn reason_reference_round_trips() {
        let reference = ConstraintReference::create_reason_reference(ReasonRef(3));
        assert!(reference.is_theory_reason());
        assert!(!reference.is_clause());
        assert_eq!(reference.get_reason_ref(), ReasonRef(3));
    }

    #[test]
    fn null_is_neither_clause_nor_reason() {
        assert!(ConstraintReference::NULL.is_null());
        assert!(!ConstraintReference::NULL.is_clause());
        assert!(!ConstraintReference::NULL.is_theory_reason());
    }
}
