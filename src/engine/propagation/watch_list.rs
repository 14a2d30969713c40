use enumset::EnumSet;
use enumset::EnumSetType;

use super::ModuleId;
use crate::basic_types::KeyedVec;
use crate::engine::variables::Literal;

/// Events a theory module can subscribe to for a literal.
#[derive(EnumSetType, Debug)]
pub(crate) enum BooleanDomainEvent {
    AssignedTrue,
    AssignedFalse,
}

/// Maps trail literals to the modules that asked to be notified about them.
/// This is the coordinator's prefilter: a module only receives an incremental
/// `propagate(literal)` call for literals it registered.
#[derive(Default, Debug)]
pub(crate) struct TheoryWatchList {
    watchers: KeyedVec<Literal, Vec<ModuleId>>,
    is_watching_anything: bool,
}

impl TheoryWatchList {
    pub(crate) fn grow(&mut self) {
        let _ = self.watchers.push(vec![]);
        let _ = self.watchers.push(vec![]);
    }

    pub(crate) fn is_watching_anything(&self) -> bool {
        self.is_watching_anything
    }

    /// Subscribe `module` to the given events of `literal`. An
    /// `AssignedTrue` registration fires when `literal` itself appears on the
    /// trail, an `AssignedFalse` registration when its complement does.
    pub(crate) fn register(
        &mut self,
        literal: Literal,
        events: EnumSet<BooleanDomainEvent>,
        module: ModuleId,
    ) {
        for event in events {
            let trail_literal = match event {
                BooleanDomainEvent::AssignedTrue => literal,
                BooleanDomainEvent::AssignedFalse => !literal,
            };
            let watchers = &mut self.watchers[trail_literal];
            if !watchers.contains(&module) {
                watchers.push(module);
                self.is_watching_anything = true;
            }
        }
    }

    pub(crate) fn is_watching(&self, trail_literal: Literal, module: ModuleId) -> bool {
        self.watchers
            .get(trail_literal)
            .map(|watchers| watchers.contains(&module))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::variables::PropositionalVariable;

    #[test]
    fn registration_maps_events_to_trail_literals() {
        let mut watch_list = TheoryWatchList::default();
        watch_list.grow();
        watch_list.grow();

        let literal = Literal::new(PropositionalVariable::new(1), true);
        watch_list.register(
            literal,
            BooleanDomainEvent::AssignedFalse.into(),
            ModuleId::Aggregates,
        );

        assert!(!watch_list.is_watching(literal, ModuleId::Aggregates));
        assert!(watch_list.is_watching(!literal, ModuleId::Aggregates));
        assert!(!watch_list.is_watching(!literal, ModuleId::Definitions));
    }
}
