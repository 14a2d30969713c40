use rand::Rng;

use super::Brancher;
use super::SelectionContext;
use crate::basic_types::KeyedVec;
use crate::basic_types::StorageKey;
use crate::engine::variables::Literal;
use crate::engine::variables::PropositionalVariable;

const MAX_ACTIVITY: f64 = 1e100;

/// VSIDS variable selection combined with phase-saving value selection.
/// Activities are bumped for variables appearing in conflicts and decayed
/// once per conflict; the most active unassigned decidable variable is
/// decided next, assigned to its saved phase (or its polarity hint before
/// any phase was saved).
///
/// The heap is lazy: bumping pushes a fresh entry instead of updating in
/// place, and entries whose recorded activity is out of date are discarded
/// when popped. Every variable that unassigns is re-inserted, so the heap
/// always covers all unassigned variables.
#[derive(Debug)]
pub struct VsidsBrancher {
    activities: KeyedVec<PropositionalVariable, f64>,
    saved_phases: KeyedVec<PropositionalVariable, Option<bool>>,
    heap: Vec<(f64, PropositionalVariable)>,
    activity_increment: f64,
    activity_decay: f64,
    /// Fraction of decisions made on a uniformly random unassigned variable.
    random_decision_frequency: f64,
}

impl VsidsBrancher {
    pub fn new(activity_decay: f64, random_decision_frequency: f64) -> Self {
        VsidsBrancher {
            activities: KeyedVec::default(),
            saved_phases: KeyedVec::default(),
            heap: Vec::default(),
            activity_increment: 1.0,
            activity_decay,
            random_decision_frequency,
        }
    }

    fn bump_activity(&mut self, variable: PropositionalVariable) {
        if self.activities.get(variable).is_none() {
            return;
        }
        self.activities[variable] += self.activity_increment;
        if self.activities[variable] > MAX_ACTIVITY {
            for key in self.activities.keys().collect::<Vec<_>>() {
                self.activities[key] /= MAX_ACTIVITY;
            }
            self.activity_increment /= MAX_ACTIVITY;
            self.heap.clear();
            for key in self.activities.keys() {
                self.heap.push((self.activities[key], key));
            }
            // a descending array satisfies the max-heap property
            self.heap.sort_by(|a, b| b.0.total_cmp(&a.0));
            return;
        }
        self.push_heap(self.activities[variable], variable);
    }

    fn push_heap(&mut self, activity: f64, variable: PropositionalVariable) {
        self.heap.push((activity, variable));
        let mut index = self.heap.len() - 1;
        while index > 0 {
            let parent = (index - 1) / 2;
            if self.heap[parent].0.total_cmp(&self.heap[index].0).is_lt() {
                self.heap.swap(parent, index);
                index = parent;
            } else {
                break;
            }
        }
    }

    fn pop_heap(&mut self) -> Option<(f64, PropositionalVariable)> {
        if self.heap.is_empty() {
            return None;
        }
        let top = self.heap.swap_remove(0);
        let mut index = 0;
        loop {
            let left = 2 * index + 1;
            let right = 2 * index + 2;
            let mut largest = index;
            if left < self.heap.len()
                && self.heap[largest].0.total_cmp(&self.heap[left].0).is_lt()
            {
                largest = left;
            }
            if right < self.heap.len()
                && self.heap[largest].0.total_cmp(&self.heap[right].0).is_lt()
            {
                largest = right;
            }
            if largest == index {
                break;
            }
            self.heap.swap(index, largest);
            index = largest;
        }
        Some(top)
    }

    fn decision_literal(
        &self,
        variable: PropositionalVariable,
        context: &SelectionContext<'_>,
    ) -> Literal {
        let phase = self.saved_phases[variable].unwrap_or_else(|| context.polarity_hint(variable));
        Literal::new(variable, phase)
    }

    fn pick_random(&self, context: &mut SelectionContext<'_>) -> Option<Literal> {
        let candidates: Vec<PropositionalVariable> = (0..context.num_propositional_variables())
            .map(|index| PropositionalVariable::create_from_index(index as usize))
            .filter(|&variable| {
                !context.is_variable_assigned(variable) && context.is_variable_decidable(variable)
            })
            .collect();
        if candidates.is_empty() {
            return None;
        }
        let choice = candidates[context.random().gen_range(0..candidates.len())];
        Some(self.decision_literal(choice, context))
    }
}

impl Brancher for VsidsBrancher {
    fn next_decision(&mut self, context: &mut SelectionContext<'_>) -> Option<Literal> {
        self.grow(context.num_propositional_variables());

        if self.random_decision_frequency > 0.0
            && context.random().gen_bool(self.random_decision_frequency)
        {
            if let Some(literal) = self.pick_random(context) {
                return Some(literal);
            }
        }

        while let Some((activity, variable)) = self.pop_heap() {
            if activity != self.activities[variable] {
                // stale entry; a fresh one was pushed when the activity changed
                continue;
            }
            if context.is_variable_assigned(variable) || !context.is_variable_decidable(variable) {
                // assigned variables are re-inserted when they unassign
                continue;
            }
            return Some(self.decision_literal(variable, context));
        }

        None
    }

    fn on_conflict(&mut self) {
        self.activity_increment /= self.activity_decay;
    }

    fn on_appearance_in_conflict_literal(&mut self, literal: Literal) {
        self.bump_activity(literal.get_propositional_variable());
    }

    fn on_unassign_literal(&mut self, literal: Literal) {
        let variable = literal.get_propositional_variable();
        if self.saved_phases.get(variable).is_some() {
            self.saved_phases[variable] = Some(literal.is_positive());
            let activity = self.activities[variable];
            self.push_heap(activity, variable);
        }
    }

    fn grow(&mut self, num_variables: u32) {
        while self.activities.len() < num_variables as usize {
            let variable = self.activities.push(0.0);
            let _ = self.saved_phases.push(None);
            self.push_heap(0.0, variable);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branching::VariableFlags;
    use crate::engine::sat::AssignmentsPropositional;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn setup(
        num_variables: u32,
    ) -> (
        AssignmentsPropositional,
        KeyedVec<PropositionalVariable, VariableFlags>,
        SmallRng,
    ) {
        let mut assignments = AssignmentsPropositional::default();
        let mut flags = KeyedVec::default();
        for _ in 0..num_variables {
            let _ = assignments.grow();
            let _ = flags.push(VariableFlags {
                polarity_hint: false,
                decidable: true,
            });
        }
        (assignments, flags, SmallRng::seed_from_u64(7))
    }

    #[test]
    fn most_active_variable_is_decided_first() {
        let (assignments, flags, mut rng) = setup(3);
        let mut brancher = VsidsBrancher::new(0.95, 0.0);
        brancher.grow(3);

        let bumped = Literal::new(PropositionalVariable::new(2), true);
        brancher.on_appearance_in_conflict_literal(bumped);

        let mut context = SelectionContext::new(&assignments, &flags, &mut rng);
        let decision = brancher.next_decision(&mut context).expect("a decision");
        assert_eq!(
            decision.get_propositional_variable(),
            PropositionalVariable::new(2)
        );
    }

    #[test]
    fn saved_phase_is_restored_after_unassignment() {
        let (mut assignments, flags, mut rng) = setup(1);
        let mut brancher = VsidsBrancher::new(0.95, 0.0);
        brancher.grow(1);

        let variable = PropositionalVariable::new(0);
        let literal = Literal::new(variable, true);
        assignments.increase_decision_level();
        assignments.enqueue_decision_literal(literal);
        brancher.on_unassign_literal(literal);
        let _ = assignments.synchronise(0);

        let mut context = SelectionContext::new(&assignments, &flags, &mut rng);
        let decision = brancher.next_decision(&mut context).expect("a decision");
        assert_eq!(decision, literal);
    }

    #[test]
    fn no_decision_when_everything_is_assigned() {
        let (mut assignments, flags, mut rng) = setup(1);
        let mut brancher = VsidsBrancher::new(0.95, 0.0);
        brancher.grow(1);

        assignments.enqueue_decision_literal(Literal::new(PropositionalVariable::new(0), false));

        let mut context = SelectionContext::new(&assignments, &flags, &mut rng);
        assert!(brancher.next_decision(&mut context).is_none());
    }
}
