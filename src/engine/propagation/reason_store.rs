use super::ModuleId;
use crate::korat_assert_moderate;
use crate::korat_assert_simple;

/// Reference to a theory reason: the index half of the `(module id, payload)`
/// antecedent tag stored for theory propagations.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct ReasonRef(pub(crate) u32);

/// Stores the `(module, payload)` tag of every theory propagation on the
/// trail. The payload is opaque to the solver; the owning module interprets
/// it when an explanation is requested. Entries follow the trail: they are
/// pushed in propagation order and truncated on backtracking.
#[derive(Default, Debug)]
pub(crate) struct ReasonStore {
    entries: Vec<(ModuleId, u32)>,
    decision_level_limits: Vec<usize>,
}

impl ReasonStore {
    pub(crate) fn push(&mut self, module: ModuleId, payload: u32) -> ReasonRef {
        self.entries.push((module, payload));
        korat_assert_simple!(self.entries.len() <= u32::MAX as usize);
        ReasonRef(self.entries.len() as u32 - 1)
    }

    pub(crate) fn get(&self, reference: ReasonRef) -> (ModuleId, u32) {
        self.entries[reference.0 as usize]
    }

    pub(crate) fn increase_decision_level(&mut self) {
        self.decision_level_limits.push(self.entries.len());
    }

    pub(crate) fn synchronise(&mut self, level: usize) {
        korat_assert_moderate!(level < self.decision_level_limits.len() + 1);
        if level < self.decision_level_limits.len() {
            self.entries.truncate(self.decision_level_limits[level]);
            self.decision_level_limits.truncate(level);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_truncated_on_synchronise() {
        let mut store = ReasonStore::default();
        let first = store.push(ModuleId::Aggregates, 7);
        store.increase_decision_level();
        let _ = store.push(ModuleId::Definitions, 9);

        assert_eq!(store.len(), 2);
        store.synchronise(0);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(first), (ModuleId::Aggregates, 7));
    }
}
