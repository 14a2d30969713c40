//! The aggregate theory module. Owns the weighted sets and the aggregates
//! over them, watches the shared trail for set and head literals, propagates
//! in both directions, and reconstructs reason clauses on demand from its
//! propagation stacks.

use super::aggregate::Aggregate;
use super::aggregate::PlannedPropagation;
use super::aggregate::ReasonMode;
use super::aggregate::WatchDiscipline;
use super::kind::AggregateKind;
use super::kind::AggregateSemantics;
use super::kind::AggregateSign;
use super::kind::SetFamily;
use super::partially_watched::PartiallyWatchedAggregate;
use super::partially_watched::PwOutcome;
use super::partially_watched::PwRegime;
use super::weighted_set::AggregateSet;
use super::weighted_set::SetChange;
use super::weighted_set::WeightedLiteral;
use crate::basic_types::HashMap;
use crate::basic_types::KeyedVec;
use crate::basic_types::MalformedInputError;
use crate::basic_types::PropagationStatus;
use crate::basic_types::StorageKey;
use crate::basic_types::Weight;
use crate::engine::propagation::TheoryContext;
use crate::engine::propagation::TheoryPropagator;
use crate::engine::sat::AssignmentsPropositional;
use crate::engine::sat::ClauseRelocationMap;
use crate::engine::variables::Literal;
use crate::engine::variables::PropositionalVariable;
use crate::korat_assert_moderate;
use crate::korat_assert_simple;

#[derive(Clone, Copy, Debug)]
struct SetWatch {
    set_index: usize,
    wlit_index: usize,
    /// Whether the trail literal firing this watch makes the set literal
    /// true (as opposed to false).
    became_true: bool,
}

#[derive(Clone, Copy, Debug)]
struct PwWatch {
    pw_index: usize,
    regime: PwRegime,
    generation: u64,
}

/// Reasons are stored per propagation. Fully-watched aggregates keep a lazy
/// reference into the set's propagation stack; partially-watched ones record
/// the reason eagerly at propagation time.
#[derive(Debug)]
enum StoredReason {
    Stack {
        aggregate: usize,
        mode: ReasonMode,
        stack_length: usize,
        include_head: bool,
        decision_level: usize,
    },
    Eager {
        tail: Vec<Literal>,
        decision_level: usize,
    },
}

#[derive(Default, Debug)]
pub(crate) struct AggregatePropagator {
    sets: Vec<AggregateSet>,
    aggregates: Vec<Aggregate>,
    pw_aggregates: Vec<PartiallyWatchedAggregate>,
    set_watches: KeyedVec<Literal, Vec<SetWatch>>,
    head_watches: KeyedVec<Literal, Vec<usize>>,
    pw_watches: KeyedVec<Literal, Vec<PwWatch>>,
    reasons: Vec<StoredReason>,
    /// One typed set instance per (declared set, family) pair.
    set_instances: HashMap<(u32, SetFamily), usize>,
    /// Head variable of each definitional aggregate.
    defining_aggregate: HashMap<PropositionalVariable, usize>,
    /// Set variable -> heads of definitional aggregates whose set mentions it.
    occurrence_heads: HashMap<PropositionalVariable, Vec<PropositionalVariable>>,
}

impl AggregatePropagator {
    fn ensure_literal_capacity(&mut self, literal: Literal) {
        let needed = literal.index().max((!literal).index()) + 1;
        while self.set_watches.len() < needed {
            let _ = self.set_watches.push(vec![]);
            let _ = self.head_watches.push(vec![]);
            let _ = self.pw_watches.push(vec![]);
        }
    }

    /// Instantiate (or reuse) the typed set for `set_id` under `family`.
    fn instantiate_set(
        &mut self,
        set_id: u32,
        family: SetFamily,
        literals: &[WeightedLiteral],
    ) -> Result<usize, MalformedInputError> {
        if let Some(&index) = self.set_instances.get(&(set_id, family)) {
            return Ok(index);
        }
        let set = AggregateSet::new(set_id, family, literals)?;
        self.sets.push(set);
        let index = self.sets.len() - 1;
        let _ = self.set_instances.insert((set_id, family), index);
        Ok(index)
    }

    fn register_set_watches(&mut self, set_index: usize) {
        let wlits: Vec<Literal> = self.sets[set_index]
            .literals()
            .iter()
            .map(|wlit| wlit.literal)
            .collect();
        for (wlit_index, literal) in wlits.into_iter().enumerate() {
            self.ensure_literal_capacity(literal);
            self.set_watches[literal].push(SetWatch {
                set_index,
                wlit_index,
                became_true: true,
            });
            self.set_watches[!literal].push(SetWatch {
                set_index,
                wlit_index,
                became_true: false,
            });
        }
    }

    /// Add an aggregate over the declared set `set_id` with the given raw
    /// literal list. Returns the aggregate index. The watching discipline is
    /// chosen here: cardinality and sum aggregates with plain completion
    /// semantics whose minimal witness is small relative to the set size use
    /// the partially-watched scheme.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn add_aggregate(
        &mut self,
        head: Literal,
        kind: AggregateKind,
        sign: AggregateSign,
        bound: Weight,
        semantics: AggregateSemantics,
        set_id: u32,
        set_literals: &[WeightedLiteral],
        definition_id: Option<u32>,
        partial_watch_ratio: f64,
    ) -> Result<usize, MalformedInputError> {
        korat_assert_simple!(head.is_positive());

        let family = kind.family();
        let set_index = self.instantiate_set(set_id, family, set_literals)?;
        let aggregate_index = self.aggregates.len();

        let use_partial_watches = matches!(kind, AggregateKind::Sum | AggregateKind::Cardinality)
            && semantics == AggregateSemantics::Completion
            && Self::witness_fraction(&self.sets[set_index], sign, bound) <= partial_watch_ratio;

        let discipline = if use_partial_watches {
            let pw = PartiallyWatchedAggregate::new(
                aggregate_index,
                set_index,
                head,
                sign,
                bound,
                &self.sets[set_index],
            );
            self.pw_aggregates.push(pw);
            WatchDiscipline::PartiallyWatched(self.pw_aggregates.len() - 1)
        } else {
            // the first fully-watched aggregate on a set makes it fully
            // watched for good
            if self.sets[set_index].aggregates.is_empty() {
                self.register_set_watches(set_index);
            }
            WatchDiscipline::FullyWatched
        };

        if discipline == WatchDiscipline::FullyWatched {
            self.sets[set_index].aggregates.push(aggregate_index);
        }

        self.ensure_literal_capacity(head);
        self.head_watches[head].push(aggregate_index);
        self.head_watches[!head].push(aggregate_index);

        if semantics == AggregateSemantics::Definitional {
            let head_variable = head.get_propositional_variable();
            korat_assert_simple!(!self.defining_aggregate.contains_key(&head_variable));
            let _ = self.defining_aggregate.insert(head_variable, aggregate_index);
            for wlit in self.sets[set_index].literals() {
                self.occurrence_heads
                    .entry(wlit.literal.get_propositional_variable())
                    .or_default()
                    .push(head_variable);
            }
        }

        self.aggregates.push(Aggregate {
            head,
            kind,
            sign,
            bound,
            semantics,
            set_index,
            definition_id,
            discipline,
            head_value: None,
            head_level: 0,
            head_stack_index: 0,
        });
        Ok(aggregate_index)
    }

    /// Fraction of the set a minimal bound witness needs; small fractions
    /// favour the partially-watched scheme.
    fn witness_fraction(set: &AggregateSet, sign: AggregateSign, bound: Weight) -> f64 {
        let lb_bound = match sign {
            AggregateSign::LowerBound => bound,
            AggregateSign::UpperBound => bound + 1,
        };
        let mut covered = set.empty_set_value();
        let mut needed = 0usize;
        for wlit in set.literals().iter().rev() {
            if covered >= lb_bound {
                break;
            }
            covered += wlit.weight;
            needed += 1;
        }
        if set.literals().is_empty() {
            1.0
        } else {
            needed as f64 / set.literals().len() as f64
        }
    }

    /// The trail literals the coordinator should forward to this module.
    pub(crate) fn trail_literals_to_watch(&self) -> Vec<Literal> {
        let mut literals = Vec::new();
        for set in &self.sets {
            for wlit in set.literals() {
                literals.push(wlit.literal);
                literals.push(!wlit.literal);
            }
        }
        for pw in &self.pw_aggregates {
            for wlit in self.sets[pw.set_index].literals() {
                literals.push(wlit.literal);
                literals.push(!wlit.literal);
            }
        }
        for aggregate in &self.aggregates {
            literals.push(aggregate.head);
            literals.push(!aggregate.head);
        }
        literals.sort();
        literals.dedup();
        literals
    }

    /// Evaluate every aggregate once against the (root) assignment. Called
    /// after problem setup and again after minimisation tightens a bound.
    pub(crate) fn initialise_at_root(
        &mut self,
        context: &mut TheoryContext<'_>,
    ) -> PropagationStatus {
        korat_assert_simple!(context.assignments.is_at_the_root_level());

        for index in 0..self.aggregates.len() {
            // a head may already be assigned at the root (unit clauses, the
            // minimisation head)
            if self.aggregates[index].head_value.is_none() {
                let head = self.aggregates[index].head;
                if context.assignments.is_literal_assigned(head) {
                    let stack_len = self.sets[self.aggregates[index].set_index].stack().len();
                    let aggregate = &mut self.aggregates[index];
                    aggregate.head_value =
                        Some(context.assignments.is_literal_assigned_true(head));
                    aggregate.head_level = 0;
                    aggregate.head_stack_index = stack_len;
                }
            }
            match self.aggregates[index].discipline {
                WatchDiscipline::FullyWatched => self.evaluate_aggregate(index, context)?,
                WatchDiscipline::PartiallyWatched(pw_index) => {
                    let outcome = {
                        let (pw, set) = self.pw_state(pw_index);
                        pw.check_both(set, context.assignments)
                    };
                    self.apply_pw_outcome(pw_index, outcome, context)?;
                }
            }
        }
        Ok(())
    }

    fn pw_state(&mut self, pw_index: usize) -> (&mut PartiallyWatchedAggregate, &AggregateSet) {
        let set_index = self.pw_aggregates[pw_index].set_index;
        let (pw_aggregates, sets) = (&mut self.pw_aggregates, &self.sets);
        (&mut pw_aggregates[pw_index], &sets[set_index])
    }

    fn evaluate_aggregate(
        &mut self,
        aggregate_index: usize,
        context: &mut TheoryContext<'_>,
    ) -> PropagationStatus {
        enum Evaluation {
            Nothing,
            Head(Literal, ReasonMode, usize),
            Body(Vec<PlannedPropagation>),
        }

        let evaluation = {
            let aggregate = &self.aggregates[aggregate_index];
            let set = &self.sets[aggregate.set_index];
            if aggregate.head_value.is_some() {
                Evaluation::Body(aggregate.propagate_body(set))
            } else if let Some(value) = aggregate.can_propagate_head(set) {
                let literal = if value {
                    aggregate.head
                } else {
                    !aggregate.head
                };
                Evaluation::Head(
                    literal,
                    aggregate.head_reason_mode(value),
                    set.stack().len(),
                )
            } else {
                Evaluation::Nothing
            }
        };

        match evaluation {
            Evaluation::Nothing => Ok(()),
            Evaluation::Head(literal, mode, stack_length) => self.enqueue_with_stack_reason(
                context,
                literal,
                aggregate_index,
                mode,
                stack_length,
                false,
            ),
            Evaluation::Body(planned) => {
                let stack_length =
                    self.sets[self.aggregates[aggregate_index].set_index].stack().len();
                for propagation in planned {
                    self.enqueue_with_stack_reason(
                        context,
                        propagation.literal,
                        aggregate_index,
                        propagation.mode,
                        stack_length,
                        propagation.include_head,
                    )?;
                }
                Ok(())
            }
        }
    }

    fn enqueue_with_stack_reason(
        &mut self,
        context: &mut TheoryContext<'_>,
        literal: Literal,
        aggregate: usize,
        mode: ReasonMode,
        stack_length: usize,
        include_head: bool,
    ) -> PropagationStatus {
        if context.assignments.is_literal_assigned_true(literal) {
            return Ok(());
        }
        if context.assignments.is_at_the_root_level() {
            return context.enqueue_root(literal);
        }
        let payload = self.reasons.len() as u32;
        self.reasons.push(StoredReason::Stack {
            aggregate,
            mode,
            stack_length,
            include_head,
            decision_level: context.get_decision_level(),
        });
        context.enqueue_propagated(literal, payload)
    }

    fn enqueue_with_eager_reason(
        &mut self,
        context: &mut TheoryContext<'_>,
        literal: Literal,
        tail: Vec<Literal>,
    ) -> PropagationStatus {
        if context.assignments.is_literal_assigned_true(literal) {
            return Ok(());
        }
        if context.assignments.is_at_the_root_level() {
            return context.enqueue_root(literal);
        }
        korat_assert_moderate!(tail
            .iter()
            .all(|&lit| context.assignments.is_literal_assigned_false(lit)));
        let payload = self.reasons.len() as u32;
        self.reasons.push(StoredReason::Eager {
            tail,
            decision_level: context.get_decision_level(),
        });
        context.enqueue_propagated(literal, payload)
    }

    fn apply_pw_outcome(
        &mut self,
        pw_index: usize,
        outcome: PwOutcome,
        context: &mut TheoryContext<'_>,
    ) -> PropagationStatus {
        if outcome.rebuilt_reach {
            self.register_pw_watches(pw_index, PwRegime::Reach);
        }
        if outcome.rebuilt_avoid {
            self.register_pw_watches(pw_index, PwRegime::Avoid);
        }
        if let Some(clause) = outcome.conflict {
            return Err(crate::basic_types::ConflictInfo::Explanation { clause });
        }
        for (literal, tail) in outcome.enqueues {
            self.enqueue_with_eager_reason(context, literal, tail)?;
        }
        Ok(())
    }

    fn register_pw_watches(&mut self, pw_index: usize, regime: PwRegime) {
        let registrations = {
            let set_index = self.pw_aggregates[pw_index].set_index;
            self.pw_aggregates[pw_index].watch_registrations(&self.sets[set_index], regime)
        };
        let generation = self.pw_aggregates[pw_index].generation(regime);
        for (trigger_literal, regime) in registrations {
            self.ensure_literal_capacity(trigger_literal);
            self.pw_watches[trigger_literal].push(PwWatch {
                pw_index,
                regime,
                generation,
            });
        }
    }

    // ---- queries for the definition module -------------------------------

    /// The definitional aggregate defining `variable`, if any.
    pub(crate) fn defining_aggregate_of(&self, variable: PropositionalVariable) -> Option<usize> {
        self.defining_aggregate.get(&variable).copied()
    }

    /// Heads of definitional aggregates whose set mentions `variable`.
    pub(crate) fn heads_of_aggregates_containing(
        &self,
        variable: PropositionalVariable,
    ) -> &[PropositionalVariable] {
        self.occurrence_heads
            .get(&variable)
            .map(|heads| heads.as_slice())
            .unwrap_or(&[])
    }

    /// The set literals of the aggregate at `aggregate_index`.
    pub(crate) fn set_literals_of(&self, aggregate_index: usize) -> &[WeightedLiteral] {
        self.sets[self.aggregates[aggregate_index].set_index].literals()
    }

    /// Attempt to justify the head of a definitional aggregate with support
    /// from outside the unfounded-set candidates. `is_justified_atom`
    /// reflects the definition module's current justification counters;
    /// `real` requests a justification valid under the assignment alone.
    /// Returns `(justified, justifying literals, blocking atoms)`.
    pub(crate) fn can_justify_head(
        &self,
        assignments: &AssignmentsPropositional,
        aggregate_index: usize,
        is_justified_atom: &dyn Fn(PropositionalVariable) -> bool,
        real: bool,
    ) -> (bool, Vec<Literal>, Vec<PropositionalVariable>) {
        let aggregate = &self.aggregates[aggregate_index];
        let set = &self.sets[aggregate.set_index];
        let wlits = set.literals();
        let family = aggregate.kind.family();
        let mut jstf: Vec<Literal> = Vec::new();
        let mut nonjstf: Vec<PropositionalVariable> = Vec::new();
        let mut justified = false;

        let blocked = |index: usize, nonjstf: &mut Vec<PropositionalVariable>| {
            let variable = wlits[index].literal.get_propositional_variable();
            if real || !is_justified_atom(variable) {
                nonjstf.push(variable);
            }
        };

        match (aggregate.kind, aggregate.sign) {
            (AggregateKind::Max, AggregateSign::UpperBound) => {
                // every literal heavier than the bound must be falsifiable
                for index in (0..wlits.len()).rev() {
                    if wlits[index].weight <= aggregate.bound {
                        break;
                    }
                    if set.opposite_is_justified(assignments, index, is_justified_atom, real) {
                        jstf.push(!wlits[index].literal);
                    } else {
                        blocked(index, &mut nonjstf);
                    }
                }
                justified = nonjstf.is_empty();
            }
            (AggregateKind::Max, AggregateSign::LowerBound) => {
                // one literal at or above the bound suffices
                for index in (0..wlits.len()).rev() {
                    if wlits[index].weight < aggregate.bound {
                        break;
                    }
                    if set.is_justified(assignments, index, is_justified_atom, real) {
                        jstf.push(wlits[index].literal);
                        justified = true;
                        break;
                    }
                    blocked(index, &mut nonjstf);
                }
            }
            (AggregateKind::Min, AggregateSign::UpperBound) => {
                for (index, wlit) in wlits.iter().enumerate() {
                    if wlit.weight > aggregate.bound {
                        break;
                    }
                    if set.is_justified(assignments, index, is_justified_atom, real) {
                        jstf.push(wlit.literal);
                        justified = true;
                        break;
                    }
                    blocked(index, &mut nonjstf);
                }
            }
            (AggregateKind::Min, AggregateSign::LowerBound) => {
                for (index, wlit) in wlits.iter().enumerate() {
                    if wlit.weight >= aggregate.bound {
                        break;
                    }
                    if set.opposite_is_justified(assignments, index, is_justified_atom, real) {
                        jstf.push(!wlit.literal);
                    } else {
                        blocked(index, &mut nonjstf);
                    }
                }
                justified = nonjstf.is_empty();
            }
            (_, AggregateSign::LowerBound) => {
                // accumulate justified contributions until the bound is met
                let mut certain = set.empty_set_value();
                for (index, wlit) in wlits.iter().enumerate() {
                    if set.is_justified(assignments, index, is_justified_atom, real) {
                        jstf.push(wlit.literal);
                        certain = family.add(certain, wlit.weight);
                        if certain >= aggregate.bound {
                            justified = true;
                            break;
                        }
                    } else {
                        blocked(index, &mut nonjstf);
                    }
                }
            }
            (_, AggregateSign::UpperBound) => {
                // exclude justified-out literals until the rest fits
                let mut possible = wlits
                    .iter()
                    .fold(set.empty_set_value(), |acc, wlit| family.add(acc, wlit.weight));
                if possible <= aggregate.bound {
                    justified = true;
                }
                for (index, wlit) in wlits.iter().enumerate() {
                    if justified {
                        break;
                    }
                    if set.opposite_is_justified(assignments, index, is_justified_atom, real) {
                        jstf.push(!wlit.literal);
                        possible = family.remove(possible, wlit.weight);
                        if possible <= aggregate.bound {
                            justified = true;
                        }
                    } else {
                        blocked(index, &mut nonjstf);
                    }
                }
            }
        }

        if !justified
            && matches!(
                (aggregate.kind, aggregate.sign),
                (AggregateKind::Max, AggregateSign::LowerBound)
                    | (AggregateKind::Min, AggregateSign::UpperBound)
            )
        {
            jstf.clear();
        }
        (justified, jstf, nonjstf)
    }

    /// Push the literals that could support the head of this aggregate from
    /// outside the unfounded set. The caller filters out unfounded-set
    /// members and duplicates.
    pub(crate) fn loop_formula_candidates(
        &self,
        aggregate_index: usize,
        out: &mut Vec<Literal>,
    ) {
        let aggregate = &self.aggregates[aggregate_index];
        let set = &self.sets[aggregate.set_index];
        let wlits = set.literals();
        match (aggregate.kind, aggregate.sign) {
            (AggregateKind::Max, AggregateSign::LowerBound) => {
                for wlit in wlits.iter().rev() {
                    if wlit.weight < aggregate.bound {
                        break;
                    }
                    out.push(wlit.literal);
                }
            }
            (AggregateKind::Max, AggregateSign::UpperBound) => {
                for wlit in wlits.iter().rev() {
                    if wlit.weight <= aggregate.bound {
                        break;
                    }
                    out.push(!wlit.literal);
                }
            }
            (AggregateKind::Min, AggregateSign::UpperBound) => {
                for wlit in wlits.iter() {
                    if wlit.weight > aggregate.bound {
                        break;
                    }
                    out.push(wlit.literal);
                }
            }
            (AggregateKind::Min, AggregateSign::LowerBound) => {
                for wlit in wlits.iter() {
                    if wlit.weight >= aggregate.bound {
                        break;
                    }
                    out.push(!wlit.literal);
                }
            }
            (_, AggregateSign::LowerBound) => {
                out.extend(wlits.iter().map(|wlit| wlit.literal));
            }
            (_, AggregateSign::UpperBound) => {
                out.extend(wlits.iter().map(|wlit| !wlit.literal));
            }
        }
    }

    /// Tighten the bound of an upper-bound aggregate during minimisation.
    /// Only called at the root, between solves.
    pub(crate) fn tighten_bound(&mut self, aggregate_index: usize, new_bound: Weight) {
        korat_assert_simple!(self.aggregates[aggregate_index].sign == AggregateSign::UpperBound);
        korat_assert_simple!(new_bound < self.aggregates[aggregate_index].bound);
        self.aggregates[aggregate_index].bound = new_bound;
    }
}

impl TheoryPropagator for AggregatePropagator {
    fn name(&self) -> &str {
        "Aggregates"
    }

    fn propagate(
        &mut self,
        context: &mut TheoryContext<'_>,
        trail_literal: Literal,
    ) -> PropagationStatus {
        let level = context.assignments.get_decision_level();

        let set_events: Vec<SetWatch> = self
            .set_watches
            .get(trail_literal)
            .map(|watches| watches.clone())
            .unwrap_or_default();
        for watch in set_events {
            if self.sets[watch.set_index].value_of(watch.wlit_index).is_some() {
                continue;
            }
            self.sets[watch.set_index].on_literal_assigned(
                trail_literal,
                watch.wlit_index,
                watch.became_true,
                level,
            );
            let affected = self.sets[watch.set_index].aggregates.clone();
            for aggregate_index in affected {
                self.evaluate_aggregate(aggregate_index, context)?;
            }
        }

        let head_events: Vec<usize> = self
            .head_watches
            .get(trail_literal)
            .map(|heads| heads.clone())
            .unwrap_or_default();
        for aggregate_index in head_events {
            if self.aggregates[aggregate_index].head_value.is_some() {
                continue;
            }
            let head = self.aggregates[aggregate_index].head;
            let head_true = trail_literal == head;
            korat_assert_moderate!(head_true || trail_literal == !head);
            let stack_len = self.sets[self.aggregates[aggregate_index].set_index]
                .stack()
                .len();
            {
                let aggregate = &mut self.aggregates[aggregate_index];
                aggregate.head_value = Some(head_true);
                aggregate.head_level = level;
                aggregate.head_stack_index = stack_len;
            }
            match self.aggregates[aggregate_index].discipline {
                WatchDiscipline::FullyWatched => {
                    self.evaluate_aggregate(aggregate_index, context)?;
                }
                WatchDiscipline::PartiallyWatched(pw_index) => {
                    let outcome = {
                        let (pw, set) = self.pw_state(pw_index);
                        pw.check_both(set, context.assignments)
                    };
                    self.apply_pw_outcome(pw_index, outcome, context)?;
                }
            }
        }

        let pw_events: Vec<PwWatch> = if self.pw_watches.get(trail_literal).is_some() {
            std::mem::take(&mut self.pw_watches[trail_literal])
        } else {
            Vec::new()
        };
        for watch in pw_events {
            if watch.generation != self.pw_aggregates[watch.pw_index].generation(watch.regime) {
                continue; // stale: rebuilt since registration
            }
            let outcome = {
                let (pw, set) = self.pw_state(watch.pw_index);
                match watch.regime {
                    PwRegime::Reach => pw.check_reach(set, context.assignments),
                    PwRegime::Avoid => pw.check_avoid(set, context.assignments),
                }
            };
            self.apply_pw_outcome(watch.pw_index, outcome, context)?;
        }

        Ok(())
    }

    fn propagate_fixpoint(&mut self, _context: &mut TheoryContext<'_>) -> PropagationStatus {
        // aggregate propagation is fully incremental
        Ok(())
    }

    fn explain(
        &self,
        _assignments: &AssignmentsPropositional,
        literal: Literal,
        payload: u32,
    ) -> Vec<Literal> {
        match &self.reasons[payload as usize] {
            StoredReason::Stack {
                aggregate,
                mode,
                stack_length,
                include_head,
                ..
            } => {
                let agg = &self.aggregates[*aggregate];
                let set = &self.sets[agg.set_index];
                let mut clause = vec![literal];
                if *include_head {
                    clause.push(if agg.head_value == Some(true) {
                        !agg.head
                    } else {
                        agg.head
                    });
                }
                for record in &set.stack()[..*stack_length] {
                    let relevant = match mode {
                        ReasonMode::BasedOnCc => record.change == SetChange::BecameTrue,
                        ReasonMode::BasedOnCp => record.change == SetChange::BecameFalse,
                        ReasonMode::CcAndCp => true,
                    };
                    if relevant {
                        clause.push(!record.trail_literal);
                    }
                }
                clause
            }
            StoredReason::Eager { tail, .. } => {
                let mut clause = vec![literal];
                clause.extend(tail.iter().copied());
                clause
            }
        }
    }

    fn notify_new_decision_level(&mut self) {}

    fn notify_backtrack(&mut self, level: usize) {
        for set in self.sets.iter_mut() {
            set.backtrack(level);
        }
        for aggregate in self.aggregates.iter_mut() {
            if aggregate.head_value.is_some() && aggregate.head_level > level {
                aggregate.head_value = None;
            }
        }
        while let Some(reason) = self.reasons.last() {
            let reason_level = match reason {
                StoredReason::Stack { decision_level, .. } => *decision_level,
                StoredReason::Eager { decision_level, .. } => *decision_level,
            };
            if reason_level <= level {
                break;
            }
            let _ = self.reasons.pop();
        }
    }

    fn relocate(&mut self, _map: &ClauseRelocationMap) {
        // the aggregate module retains no clause references
    }
}
