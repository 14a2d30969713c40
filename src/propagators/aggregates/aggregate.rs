//! A single aggregate constraint over a weighted set, and the evaluation
//! rules that derive head and body propagations from the set's running
//! bounds.

use super::kind::AggregateKind;
use super::kind::AggregateSemantics;
use super::kind::AggregateSign;
use super::weighted_set::AggregateSet;
use crate::basic_types::Weight;
use crate::engine::variables::Literal;
use crate::korat_assert_moderate;

/// Which running bound justifies a propagation. Selects the subset of the
/// set's propagation stack that goes into the reason clause.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ReasonMode {
    /// Only literals whose becoming true drove `cc` across the bound.
    BasedOnCc,
    /// Only literals whose becoming false drove `cp` across the bound.
    BasedOnCp,
    /// Both lists together.
    CcAndCp,
}

/// How an aggregate is watched; the discipline is orthogonal to the kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum WatchDiscipline {
    FullyWatched,
    /// Index into the propagator's partially-watched states.
    PartiallyWatched(usize),
}

#[derive(Debug)]
pub(crate) struct Aggregate {
    pub(crate) head: Literal,
    pub(crate) kind: AggregateKind,
    pub(crate) sign: AggregateSign,
    pub(crate) bound: Weight,
    pub(crate) semantics: AggregateSemantics,
    pub(crate) set_index: usize,
    pub(crate) definition_id: Option<u32>,
    pub(crate) discipline: WatchDiscipline,
    pub(crate) head_value: Option<bool>,
    pub(crate) head_level: usize,
    /// Length of the set's propagation stack when the head was assigned;
    /// used to decide whether the head belongs in a reason built from a
    /// stack prefix.
    pub(crate) head_stack_index: usize,
}

/// A propagation the evaluation decided on. The propagator turns these into
/// enqueues with stack-prefix reasons.
#[derive(Debug)]
pub(crate) struct PlannedPropagation {
    pub(crate) literal: Literal,
    pub(crate) mode: ReasonMode,
    pub(crate) include_head: bool,
}

impl Aggregate {
    /// Can the head be decided from the current bounds? For monotone kinds
    /// the certain bound grows towards the possible bound from below; for
    /// MIN the roles are mirrored. Implication semantics never derives a
    /// true head.
    pub(crate) fn can_propagate_head(&self, set: &AggregateSet) -> Option<bool> {
        let cc = set.best_certain();
        let cp = set.best_possible();
        let result = if self.kind.is_monotone() {
            match self.sign {
                AggregateSign::UpperBound => {
                    if cc > self.bound {
                        Some(false)
                    } else if cp <= self.bound {
                        Some(true)
                    } else {
                        None
                    }
                }
                AggregateSign::LowerBound => {
                    if cp < self.bound {
                        Some(false)
                    } else if cc >= self.bound {
                        Some(true)
                    } else {
                        None
                    }
                }
            }
        } else {
            // MIN: cp <= value <= cc
            match self.sign {
                AggregateSign::UpperBound => {
                    if cp > self.bound {
                        Some(false)
                    } else if cc <= self.bound {
                        Some(true)
                    } else {
                        None
                    }
                }
                AggregateSign::LowerBound => {
                    if cc < self.bound {
                        Some(false)
                    } else if cp >= self.bound {
                        Some(true)
                    } else {
                        None
                    }
                }
            }
        };

        if self.semantics == AggregateSemantics::Implication && result == Some(true) {
            None
        } else {
            result
        }
    }

    /// The bound that triggered a head derivation decides the reason mode.
    pub(crate) fn head_reason_mode(&self, head_true: bool) -> ReasonMode {
        let via_certain = if self.kind.is_monotone() {
            // cc triggers: UB -> head false, LB -> head true
            match self.sign {
                AggregateSign::UpperBound => !head_true,
                AggregateSign::LowerBound => head_true,
            }
        } else {
            match self.sign {
                AggregateSign::UpperBound => head_true,
                AggregateSign::LowerBound => !head_true,
            }
        };
        if via_certain {
            ReasonMode::BasedOnCc
        } else {
            ReasonMode::BasedOnCp
        }
    }

    /// Body propagations available now that the head value is known. The
    /// caller guarantees `head_value` is set; under implication semantics a
    /// false head constrains nothing.
    pub(crate) fn propagate_body(&self, set: &AggregateSet) -> Vec<PlannedPropagation> {
        let head_true = self
            .head_value
            .expect("body propagation requires an assigned head");
        if self.semantics == AggregateSemantics::Implication && !head_true {
            return Vec::new();
        }
        match self.kind {
            AggregateKind::Max => self.propagate_body_max(set, head_true),
            AggregateKind::Min => self.propagate_body_min(set, head_true),
            AggregateKind::Sum | AggregateKind::Cardinality | AggregateKind::Product => {
                self.propagate_body_sum_product(set, head_true)
            }
        }
    }

    /// head true  && value <= bound: every literal heavier than the bound is false.
    /// head false && value >= bound: every literal at least as heavy as the bound is false.
    /// head true  && value >= bound: if exactly one candidate remains it must hold.
    /// head false && value <= bound: dual.
    fn propagate_body_max(&self, set: &AggregateSet, head_true: bool) -> Vec<PlannedPropagation> {
        let mut planned = Vec::new();
        let wlits = set.literals();
        let falsify_from_bound = match (head_true, self.sign) {
            (true, AggregateSign::UpperBound) => Some(true), // strict: w > bound
            (false, AggregateSign::LowerBound) => Some(false), // w >= bound
            _ => None,
        };

        if let Some(strict) = falsify_from_bound {
            for (index, wlit) in wlits.iter().enumerate().rev() {
                let above = if strict {
                    wlit.weight > self.bound
                } else {
                    wlit.weight >= self.bound
                };
                if !above {
                    break;
                }
                if set.value_of(index) != Some(false) {
                    planned.push(PlannedPropagation {
                        literal: !wlit.literal,
                        mode: ReasonMode::CcAndCp,
                        include_head: true,
                    });
                }
            }
            return planned;
        }

        // remaining cases: a candidate above the bound must become true
        let strict = match (head_true, self.sign) {
            (true, AggregateSign::LowerBound) => false, // w >= bound
            (false, AggregateSign::UpperBound) => true, // w > bound
            _ => unreachable!("covered by falsify_from_bound"),
        };
        self.force_last_candidate(
            set,
            &mut planned,
            &mut wlits.iter().enumerate().rev().take_while(|(_, wlit)| {
                if strict {
                    wlit.weight > self.bound
                } else {
                    wlit.weight >= self.bound
                }
            }),
        );
        planned
    }

    /// The mirror image of [`Aggregate::propagate_body_max`], scanning from
    /// the cheap end of the sorted set.
    fn propagate_body_min(&self, set: &AggregateSet, head_true: bool) -> Vec<PlannedPropagation> {
        let mut planned = Vec::new();
        let wlits = set.literals();
        let falsify_from_bound = match (head_true, self.sign) {
            (true, AggregateSign::LowerBound) => Some(true), // w < bound
            (false, AggregateSign::UpperBound) => Some(false), // w <= bound
            _ => None,
        };

        if let Some(strict) = falsify_from_bound {
            for (index, wlit) in wlits.iter().enumerate() {
                let below = if strict {
                    wlit.weight < self.bound
                } else {
                    wlit.weight <= self.bound
                };
                if !below {
                    break;
                }
                if set.value_of(index) != Some(false) {
                    planned.push(PlannedPropagation {
                        literal: !wlit.literal,
                        mode: ReasonMode::CcAndCp,
                        include_head: true,
                    });
                }
            }
            return planned;
        }

        let strict = match (head_true, self.sign) {
            (true, AggregateSign::UpperBound) => false, // w <= bound
            (false, AggregateSign::LowerBound) => true, // w < bound
            _ => unreachable!("covered by falsify_from_bound"),
        };
        self.force_last_candidate(
            set,
            &mut planned,
            &mut wlits.iter().enumerate().take_while(|(_, wlit)| {
                if strict {
                    wlit.weight < self.bound
                } else {
                    wlit.weight <= self.bound
                }
            }),
        );
        planned
    }

    /// If no candidate is true and exactly one is still open, that one is
    /// forced; with a true candidate the constraint is already witnessed.
    fn force_last_candidate<'a>(
        &self,
        set: &AggregateSet,
        planned: &mut Vec<PlannedPropagation>,
        candidates: &mut dyn Iterator<Item = (usize, &'a super::weighted_set::WeightedLiteral)>,
    ) {
        let mut last_open = None;
        for (index, wlit) in candidates {
            match set.value_of(index) {
                Some(true) => return,
                Some(false) => {}
                None => {
                    if last_open.is_some() {
                        return; // more than one open candidate
                    }
                    last_open = Some(wlit.literal);
                }
            }
        }
        if let Some(literal) = last_open {
            planned.push(PlannedPropagation {
                literal,
                mode: ReasonMode::BasedOnCp,
                include_head: true,
            });
        }
    }

    /// Threshold-based body propagation for the incrementally-maintained
    /// kinds. Because the set is sorted by weight, one binary search yields
    /// the first affected literal and everything heavier follows. The
    /// threshold adds one exactly when the comparison is strict after
    /// folding in the certain bound.
    fn propagate_body_sum_product(
        &self,
        set: &AggregateSet,
        head_true: bool,
    ) -> Vec<PlannedPropagation> {
        korat_assert_moderate!(self.kind.is_monotone());
        let family = self.kind.family();
        let lower = self.sign == AggregateSign::UpperBound;
        let cc = set.best_certain();
        let cp = set.best_possible();

        let threshold = if head_true {
            if lower {
                family.remove(self.bound, cc).saturating_add(1)
            } else {
                family.remove(cp, self.bound).saturating_add(1)
            }
        } else if lower {
            family.remove(cp, self.bound)
        } else {
            family.remove(self.bound, cc)
        };

        let wlits = set.literals();
        let start = wlits.partition_point(|wlit| wlit.weight < threshold);
        let mut planned = Vec::new();
        let (falsify, mode) = match (head_true, lower) {
            (true, true) => (true, ReasonMode::BasedOnCc),
            (true, false) => (false, ReasonMode::BasedOnCp),
            (false, true) => (false, ReasonMode::BasedOnCp),
            (false, false) => (true, ReasonMode::BasedOnCc),
        };
        for (index, wlit) in wlits.iter().enumerate().skip(start) {
            if set.value_of(index).is_none() {
                planned.push(PlannedPropagation {
                    literal: if falsify { !wlit.literal } else { wlit.literal },
                    mode,
                    include_head: true,
                });
            }
        }
        planned
    }
}
