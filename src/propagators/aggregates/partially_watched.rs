//! The partially-watched discipline for cardinality and sum aggregates.
//! Instead of watching every set literal, the aggregate maintains witness
//! sets per (head-value x set-polarity) regime: while the head is unknown,
//! each witness holds enough literals to keep its regime satisfiable, or a
//! propagation has fired. When a watched literal falls, the reserve pool is
//! scanned for a replacement; failure to rebuild a witness is exactly the
//! condition under which the corresponding propagation is sound.
//!
//! Watches are generation-stamped: a rebuild bumps the generation and
//! registers fresh watches, and events carrying an older generation are
//! discarded lazily.

use super::kind::AggregateSign;
use super::weighted_set::AggregateSet;
use crate::basic_types::Weight;
use crate::engine::sat::AssignmentsPropositional;
use crate::engine::variables::Literal;

/// The two witness regimes of a partially-watched aggregate, in the
/// normalised lower-bound form.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PwRegime {
    /// Witnesses that the value can still reach the bound: a set of
    /// non-false literals with enough weight. Broken by falsifications.
    Reach,
    /// Witnesses that the value can still stay below the bound: a set of
    /// non-true literals keeping enough weight out. Broken by assignments
    /// to true.
    Avoid,
}

/// Everything a partially-watched scan decided: a conflict clause, forced
/// literals with their eager reasons, and which witness sets were rebuilt
/// (and therefore need their watches re-registered).
#[derive(Debug, Default)]
pub(crate) struct PwOutcome {
    pub(crate) conflict: Option<Vec<Literal>>,
    /// `(literal, reason_tail)`: enqueue `literal` with a reason clause
    /// `[literal] ++ reason_tail`, every tail literal false right now.
    pub(crate) enqueues: Vec<(Literal, Vec<Literal>)>,
    pub(crate) rebuilt_reach: bool,
    pub(crate) rebuilt_avoid: bool,
}

#[derive(Debug)]
pub(crate) struct PartiallyWatchedAggregate {
    pub(crate) aggregate: usize,
    pub(crate) set_index: usize,
    /// The aggregate normalised to `lb_head <-> value >= lb_bound`; an
    /// upper-bound aggregate flips the head and shifts the bound by one.
    lb_head: Literal,
    lb_bound: Weight,
    total: Weight,
    reach_watches: Vec<usize>,
    avoid_watches: Vec<usize>,
    reach_generation: u64,
    avoid_generation: u64,
}

impl PartiallyWatchedAggregate {
    pub(crate) fn new(
        aggregate: usize,
        set_index: usize,
        head: Literal,
        sign: AggregateSign,
        bound: Weight,
        set: &AggregateSet,
    ) -> Self {
        let (lb_head, lb_bound) = match sign {
            AggregateSign::LowerBound => (head, bound),
            AggregateSign::UpperBound => (!head, bound + 1),
        };
        let total = set
            .literals()
            .iter()
            .fold(set.empty_set_value(), |acc, wlit| acc + wlit.weight);
        PartiallyWatchedAggregate {
            aggregate,
            set_index,
            lb_head,
            lb_bound,
            total,
            reach_watches: Vec::default(),
            avoid_watches: Vec::default(),
            reach_generation: 0,
            avoid_generation: 0,
        }
    }

    pub(crate) fn generation(&self, regime: PwRegime) -> u64 {
        match regime {
            PwRegime::Reach => self.reach_generation,
            PwRegime::Avoid => self.avoid_generation,
        }
    }

    /// The literals whose events the current watch sets must observe, with
    /// the regime each belongs to. A reach watch on `l` fires when `l`
    /// becomes false, an avoid watch when it becomes true.
    pub(crate) fn watch_registrations(
        &self,
        set: &AggregateSet,
        regime: PwRegime,
    ) -> Vec<(Literal, PwRegime)> {
        let watches = match regime {
            PwRegime::Reach => &self.reach_watches,
            PwRegime::Avoid => &self.avoid_watches,
        };
        watches
            .iter()
            .map(|&index| {
                let literal = set.literals()[index].literal;
                match regime {
                    PwRegime::Reach => (!literal, PwRegime::Reach),
                    PwRegime::Avoid => (literal, PwRegime::Avoid),
                }
            })
            .collect()
    }

    fn head_value(&self, assignments: &AssignmentsPropositional) -> Option<bool> {
        if assignments.is_literal_assigned_true(self.lb_head) {
            Some(true)
        } else if assignments.is_literal_assigned_false(self.lb_head) {
            Some(false)
        } else {
            None
        }
    }

    /// All currently false set literals, as they appear in the set. These
    /// are the reason tail for reach-side propagations.
    fn false_literals(
        &self,
        set: &AggregateSet,
        assignments: &AssignmentsPropositional,
    ) -> Vec<Literal> {
        set.literals()
            .iter()
            .filter(|wlit| assignments.is_literal_assigned_false(wlit.literal))
            .map(|wlit| wlit.literal)
            .collect()
    }

    /// Complements of all currently true set literals: the reason tail for
    /// avoid-side propagations.
    fn negated_true_literals(
        &self,
        set: &AggregateSet,
        assignments: &AssignmentsPropositional,
    ) -> Vec<Literal> {
        set.literals()
            .iter()
            .filter(|wlit| assignments.is_literal_assigned_true(wlit.literal))
            .map(|wlit| !wlit.literal)
            .collect()
    }

    /// Handle a falsification in the reach witness (or (re)establish it).
    /// The witness is rebuilt on every path: the triggering watch was
    /// consumed, so leaving without fresh watches would lose wake-ups after
    /// backtracking.
    pub(crate) fn check_reach(
        &mut self,
        set: &AggregateSet,
        assignments: &AssignmentsPropositional,
    ) -> PwOutcome {
        let mut outcome = PwOutcome::default();
        let head = self.head_value(assignments);

        let wlits = set.literals();
        let non_false: Vec<usize> = (0..wlits.len())
            .filter(|&i| !assignments.is_literal_assigned_false(wlits[i].literal))
            .collect();
        let possible: Weight = non_false
            .iter()
            .fold(set.empty_set_value(), |acc, &i| acc + wlits[i].weight);

        if head != Some(false) && possible < self.lb_bound {
            // the bound is out of reach
            let tail = self.false_literals(set, assignments);
            match head {
                None => outcome.enqueues.push((!self.lb_head, tail)),
                Some(true) => {
                    let mut clause = vec![!self.lb_head];
                    clause.extend(tail);
                    outcome.conflict = Some(clause);
                }
                Some(false) => unreachable!("excluded above"),
            }
        } else if head == Some(true) {
            // any literal whose loss makes the bound unreachable is forced
            let mut tail = self.false_literals(set, assignments);
            tail.push(!self.lb_head);
            for &index in &non_false {
                if possible - wlits[index].weight < self.lb_bound
                    && assignments.is_literal_unassigned(wlits[index].literal)
                {
                    outcome
                        .enqueues
                        .push((wlits[index].literal, tail.clone()));
                }
            }
        }

        // rebuild the witness: heaviest non-false literals until the bound
        // is covered, plus one literal of slack
        let needed = self.lb_bound;
        self.reach_watches.clear();
        let mut covered = set.empty_set_value();
        for &index in non_false.iter().rev() {
            if covered >= needed && self.reach_watches.len() > 1 {
                break;
            }
            self.reach_watches.push(index);
            covered += wlits[index].weight;
        }
        self.reach_generation += 1;
        outcome.rebuilt_reach = true;
        outcome
    }

    /// Handle an assignment-to-true in the avoid witness (or (re)establish
    /// it). Like the reach side, the witness is rebuilt on every path.
    pub(crate) fn check_avoid(
        &mut self,
        set: &AggregateSet,
        assignments: &AssignmentsPropositional,
    ) -> PwOutcome {
        let mut outcome = PwOutcome::default();
        let head = self.head_value(assignments);

        let wlits = set.literals();
        let certain: Weight = wlits
            .iter()
            .filter(|wlit| assignments.is_literal_assigned_true(wlit.literal))
            .fold(set.empty_set_value(), |acc, wlit| acc + wlit.weight);

        if head != Some(true) && certain >= self.lb_bound {
            // the bound is certainly reached
            let tail = self.negated_true_literals(set, assignments);
            match head {
                None => outcome.enqueues.push((self.lb_head, tail)),
                Some(false) => {
                    let mut clause = vec![self.lb_head];
                    clause.extend(tail);
                    outcome.conflict = Some(clause);
                }
                Some(true) => unreachable!("excluded above"),
            }
        } else if head == Some(false) {
            // any literal that would push the certain value over is forced out
            let mut tail = self.negated_true_literals(set, assignments);
            tail.push(self.lb_head);
            for wlit in wlits.iter() {
                if assignments.is_literal_unassigned(wlit.literal)
                    && certain + wlit.weight >= self.lb_bound
                {
                    outcome.enqueues.push((!wlit.literal, tail.clone()));
                }
            }
        }

        // rebuild the witness: non-true literals holding back enough weight,
        // plus one literal of slack
        let margin = self.total - self.lb_bound;
        self.avoid_watches.clear();
        let mut held_back: Weight = 0;
        for (index, wlit) in wlits.iter().enumerate().rev() {
            if assignments.is_literal_assigned_true(wlit.literal) {
                continue;
            }
            if held_back > margin && self.avoid_watches.len() > 1 {
                break;
            }
            self.avoid_watches.push(index);
            held_back += wlit.weight;
        }
        self.avoid_generation += 1;
        outcome.rebuilt_avoid = true;
        outcome
    }

    /// Both checks; used at initialisation and when the head is assigned.
    pub(crate) fn check_both(
        &mut self,
        set: &AggregateSet,
        assignments: &AssignmentsPropositional,
    ) -> PwOutcome {
        let mut outcome = self.check_reach(set, assignments);
        if outcome.conflict.is_some() {
            return outcome;
        }
        let avoid = self.check_avoid(set, assignments);
        outcome.conflict = avoid.conflict;
        outcome.enqueues.extend(avoid.enqueues);
        outcome.rebuilt_avoid = avoid.rebuilt_avoid;
        outcome
    }
}
