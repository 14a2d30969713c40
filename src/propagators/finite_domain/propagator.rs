//! The finite-domain theory module: bounded integer variables with reified
//! linear-sum, equality and disequality constraints. Propagation is bounds
//! consistency in both directions (head to bounds, bounds to head);
//! explanations are coarse, citing the module-relevant literals assigned
//! before the propagation. At a total Boolean assignment a small labelling
//! search certifies that the integer variables can actually be assigned.

use super::domain::DomainStore;
use crate::basic_types::ConflictInfo;
use crate::basic_types::HashMap;
use crate::basic_types::HashSet;
use crate::basic_types::PropagationStatus;
use crate::engine::propagation::TheoryContext;
use crate::engine::propagation::TheoryPropagator;
use crate::engine::sat::AssignmentsPropositional;
use crate::engine::sat::ClauseRelocationMap;
use crate::engine::variables::Literal;
use crate::korat_assert_simple;

/// Direction of a reified linear comparison `sum(variables) <> bound`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum LinearComparison {
    GreaterOrEqual,
    LessOrEqual,
}

#[derive(Clone, Debug)]
pub(crate) enum FdConstraintKind {
    Linear {
        variables: Vec<usize>,
        comparison: LinearComparison,
        bound: i64,
    },
    Equals {
        variable: usize,
        value: i64,
    },
    NotEquals {
        first: usize,
        second: usize,
    },
}

#[derive(Clone, Debug)]
struct FdConstraint {
    head: Literal,
    kind: FdConstraintKind,
}

#[derive(Default, Debug)]
pub(crate) struct FiniteDomainPropagator {
    domains: DomainStore,
    constraints: Vec<FdConstraint>,
    is_head: HashMap<Literal, Vec<usize>>,
    /// Module-relevant literals in assignment order, with their levels. A
    /// propagation's explanation is the negation of a prefix of this trail,
    /// so every literal that influenced the domains must be on it before
    /// the next propagation fires.
    module_trail: Vec<(Literal, usize)>,
    module_trail_members: HashSet<Literal>,
    /// Reason payloads: module-trail prefix lengths.
    reasons: Vec<(usize, usize)>,
    /// Values found by the labelling search at the last total assignment.
    labelled_values: Option<Vec<i64>>,
}

impl FiniteDomainPropagator {
    pub(crate) fn new_integer_variable(&mut self, lower_bound: i64, upper_bound: i64) -> usize {
        self.domains.new_domain(lower_bound, upper_bound)
    }

    pub(crate) fn num_integer_variables(&self) -> usize {
        self.domains.num_domains()
    }

    pub(crate) fn add_constraint(&mut self, head: Literal, kind: FdConstraintKind) {
        let index = self.constraints.len();
        self.constraints.push(FdConstraint { head, kind });
        self.is_head.entry(head).or_default().push(index);
        self.is_head.entry(!head).or_default().push(index);
    }

    pub(crate) fn has_constraints(&self) -> bool {
        !self.constraints.is_empty()
    }

    pub(crate) fn trail_literals_to_watch(&self) -> Vec<Literal> {
        let mut literals: Vec<Literal> = self.is_head.keys().copied().collect();
        literals.sort();
        literals.dedup();
        literals
    }

    /// The value of an integer variable for solution reporting: the labelled
    /// value when a labelling search ran, the fixed value otherwise, and the
    /// lower bound as a fallback.
    pub(crate) fn value_of(&self, variable: usize) -> i64 {
        if let Some(values) = &self.labelled_values {
            return values[variable];
        }
        self.domains
            .fixed_value(variable)
            .unwrap_or_else(|| self.domains.lower_bound(variable))
    }

    fn head_value(
        &self,
        assignments: &AssignmentsPropositional,
        constraint: &FdConstraint,
    ) -> Option<bool> {
        if assignments.is_literal_assigned_true(constraint.head) {
            Some(true)
        } else if assignments.is_literal_assigned_false(constraint.head) {
            Some(false)
        } else {
            None
        }
    }

    fn conflict_clause(&self) -> ConflictInfo {
        ConflictInfo::Explanation {
            clause: self
                .module_trail
                .iter()
                .map(|&(literal, _)| !literal)
                .collect(),
        }
    }

    fn record_on_module_trail(&mut self, literal: Literal, decision_level: usize) {
        if self.module_trail_members.insert(literal) {
            self.module_trail.push((literal, decision_level));
        }
    }

    fn enqueue_head(
        &mut self,
        context: &mut TheoryContext<'_>,
        literal: Literal,
    ) -> PropagationStatus {
        if context.assignments.is_literal_assigned_true(literal) {
            // already observed through the incremental notification
            return Ok(());
        }
        if context.assignments.is_at_the_root_level() {
            return context.enqueue_root(literal);
        }
        let payload = self.reasons.len() as u32;
        self.reasons
            .push((self.module_trail.len(), context.get_decision_level()));
        context.enqueue_propagated(literal, payload)?;
        self.record_on_module_trail(literal, context.get_decision_level());
        Ok(())
    }

    /// Run all constraints to a local fixpoint: entail heads from bounds and
    /// prune bounds from assigned heads.
    fn run_fixpoint(&mut self, context: &mut TheoryContext<'_>) -> PropagationStatus {
        let level = context.assignments.get_decision_level();
        loop {
            let mut changed = false;
            for index in 0..self.constraints.len() {
                let constraint = self.constraints[index].clone();
                let head_value = self.head_value(context.assignments, &constraint);

                match constraint.kind {
                    FdConstraintKind::Linear {
                        ref variables,
                        comparison,
                        bound,
                    } => {
                        let sum_lower: i64 = variables
                            .iter()
                            .map(|&variable| self.domains.lower_bound(variable))
                            .sum();
                        let sum_upper: i64 = variables
                            .iter()
                            .map(|&variable| self.domains.upper_bound(variable))
                            .sum();
                        let (certainly_true, certainly_false) = match comparison {
                            LinearComparison::GreaterOrEqual => {
                                (sum_lower >= bound, sum_upper < bound)
                            }
                            LinearComparison::LessOrEqual => {
                                (sum_upper <= bound, sum_lower > bound)
                            }
                        };
                        if head_value.is_none() {
                            if certainly_true {
                                self.enqueue_head(context, constraint.head)?;
                                changed = true;
                            } else if certainly_false {
                                self.enqueue_head(context, !constraint.head)?;
                                changed = true;
                            }
                            continue;
                        }
                        // an assigned head enforces the (negated) comparison
                        let (enforce_geq, enforced_bound) =
                            match (head_value == Some(true), comparison) {
                                (true, LinearComparison::GreaterOrEqual) => (true, bound),
                                (true, LinearComparison::LessOrEqual) => (false, bound),
                                (false, LinearComparison::GreaterOrEqual) => (false, bound - 1),
                                (false, LinearComparison::LessOrEqual) => (true, bound + 1),
                            };
                        for &variable in variables {
                            let result = if enforce_geq {
                                let others =
                                    sum_upper - self.domains.upper_bound(variable);
                                self.domains.tighten_lower_bound(
                                    variable,
                                    enforced_bound - others,
                                    level,
                                )
                            } else {
                                let others =
                                    sum_lower - self.domains.lower_bound(variable);
                                self.domains.tighten_upper_bound(
                                    variable,
                                    enforced_bound - others,
                                    level,
                                )
                            };
                            match result {
                                Ok(tightened) => changed |= tightened,
                                Err(_) => return Err(self.conflict_clause()),
                            }
                        }
                    }
                    FdConstraintKind::Equals { variable, value } => {
                        let lower = self.domains.lower_bound(variable);
                        let upper = self.domains.upper_bound(variable);
                        match head_value {
                            None => {
                                if value < lower || value > upper {
                                    self.enqueue_head(context, !constraint.head)?;
                                    changed = true;
                                } else if lower == upper {
                                    self.enqueue_head(context, constraint.head)?;
                                    changed = true;
                                }
                            }
                            Some(true) => {
                                match self.domains.tighten_lower_bound(variable, value, level) {
                                    Ok(tightened) => changed |= tightened,
                                    Err(_) => return Err(self.conflict_clause()),
                                }
                                match self.domains.tighten_upper_bound(variable, value, level) {
                                    Ok(tightened) => changed |= tightened,
                                    Err(_) => return Err(self.conflict_clause()),
                                }
                            }
                            Some(false) => {
                                if lower == upper && lower == value {
                                    return Err(self.conflict_clause());
                                }
                                if lower == value {
                                    match self.domains.tighten_lower_bound(
                                        variable,
                                        value + 1,
                                        level,
                                    ) {
                                        Ok(tightened) => changed |= tightened,
                                        Err(_) => return Err(self.conflict_clause()),
                                    }
                                }
                                if upper == value {
                                    match self.domains.tighten_upper_bound(
                                        variable,
                                        value - 1,
                                        level,
                                    ) {
                                        Ok(tightened) => changed |= tightened,
                                        Err(_) => return Err(self.conflict_clause()),
                                    }
                                }
                            }
                        }
                    }
                    FdConstraintKind::NotEquals { first, second } => {
                        let first_fixed = self.domains.fixed_value(first);
                        let second_fixed = self.domains.fixed_value(second);
                        match head_value {
                            None => match (first_fixed, second_fixed) {
                                (Some(a), Some(b)) if a == b => {
                                    self.enqueue_head(context, !constraint.head)?;
                                    changed = true;
                                }
                                (Some(a), Some(b)) if a != b => {
                                    self.enqueue_head(context, constraint.head)?;
                                    changed = true;
                                }
                                _ => {}
                            },
                            Some(true) => {
                                // x != y: a fixed side prunes the other's bounds
                                for (fixed, other) in
                                    [(first_fixed, second), (second_fixed, first)]
                                {
                                    if let Some(value) = fixed {
                                        if self.domains.fixed_value(other) == Some(value) {
                                            return Err(self.conflict_clause());
                                        }
                                        if self.domains.lower_bound(other) == value {
                                            match self.domains.tighten_lower_bound(
                                                other,
                                                value + 1,
                                                level,
                                            ) {
                                                Ok(tightened) => changed |= tightened,
                                                Err(_) => {
                                                    return Err(self.conflict_clause())
                                                }
                                            }
                                        }
                                        if self.domains.upper_bound(other) == value {
                                            match self.domains.tighten_upper_bound(
                                                other,
                                                value - 1,
                                                level,
                                            ) {
                                                Ok(tightened) => changed |= tightened,
                                                Err(_) => {
                                                    return Err(self.conflict_clause())
                                                }
                                            }
                                        }
                                    }
                                }
                            }
                            Some(false) => {
                                // x == y: intersect the bounds
                                let lower = self
                                    .domains
                                    .lower_bound(first)
                                    .max(self.domains.lower_bound(second));
                                let upper = self
                                    .domains
                                    .upper_bound(first)
                                    .min(self.domains.upper_bound(second));
                                for variable in [first, second] {
                                    match self.domains.tighten_lower_bound(variable, lower, level)
                                    {
                                        Ok(tightened) => changed |= tightened,
                                        Err(_) => return Err(self.conflict_clause()),
                                    }
                                    match self.domains.tighten_upper_bound(variable, upper, level)
                                    {
                                        Ok(tightened) => changed |= tightened,
                                        Err(_) => return Err(self.conflict_clause()),
                                    }
                                }
                            }
                        }
                    }
                }
            }
            if !changed {
                return Ok(());
            }
        }
    }

    /// Check that an integer assignment exists within the current bounds
    /// satisfying every constraint whose head is decided, by depth-first
    /// labelling. Most variables are already fixed by propagation when the
    /// model channels them through equality literals.
    fn labelling_search(
        &self,
        assignments: &AssignmentsPropositional,
    ) -> Option<Vec<i64>> {
        let num_variables = self.domains.num_domains();
        let mut values: Vec<Option<i64>> = (0..num_variables)
            .map(|variable| self.domains.fixed_value(variable))
            .collect();

        let decided: Vec<(bool, &FdConstraint)> = self
            .constraints
            .iter()
            .filter_map(|constraint| {
                if assignments.is_literal_assigned_true(constraint.head) {
                    Some((true, constraint))
                } else if assignments.is_literal_assigned_false(constraint.head) {
                    Some((false, constraint))
                } else {
                    None
                }
            })
            .collect();

        fn consistent(
            domains: &DomainStore,
            values: &[Option<i64>],
            decided: &[(bool, &FdConstraint)],
        ) -> bool {
            let low = |v: usize| values[v].unwrap_or_else(|| domains.lower_bound(v));
            let high = |v: usize| values[v].unwrap_or_else(|| domains.upper_bound(v));
            decided.iter().all(|&(holds, constraint)| {
                match &constraint.kind {
                    FdConstraintKind::Linear {
                        variables,
                        comparison,
                        bound,
                    } => {
                        let min: i64 = variables.iter().map(|&v| low(v)).sum();
                        let max: i64 = variables.iter().map(|&v| high(v)).sum();
                        match (holds, comparison) {
                            (true, LinearComparison::GreaterOrEqual) => max >= *bound,
                            (true, LinearComparison::LessOrEqual) => min <= *bound,
                            (false, LinearComparison::GreaterOrEqual) => min < *bound,
                            (false, LinearComparison::LessOrEqual) => max > *bound,
                        }
                    }
                    FdConstraintKind::Equals { variable, value } => {
                        if holds {
                            low(*variable) <= *value && *value <= high(*variable)
                        } else {
                            !(values[*variable] == Some(*value))
                        }
                    }
                    FdConstraintKind::NotEquals { first, second } => {
                        match (values[*first], values[*second]) {
                            (Some(a), Some(b)) => {
                                if holds {
                                    a != b
                                } else {
                                    a == b
                                }
                            }
                            _ => true,
                        }
                    }
                }
            })
        }

        fn search(
            domains: &DomainStore,
            values: &mut Vec<Option<i64>>,
            decided: &[(bool, &FdConstraint)],
        ) -> bool {
            if !consistent(domains, values, decided) {
                return false;
            }
            let unfixed = (0..values.len()).find(|&variable| values[variable].is_none());
            let variable = match unfixed {
                Some(variable) => variable,
                None => return true,
            };
            for value in domains.lower_bound(variable)..=domains.upper_bound(variable) {
                values[variable] = Some(value);
                if search(domains, values, decided) {
                    return true;
                }
            }
            values[variable] = None;
            false
        }

        if search(&self.domains, &mut values, &decided) {
            Some(values.into_iter().map(|value| value.expect("total")).collect())
        } else {
            None
        }
    }
}

impl TheoryPropagator for FiniteDomainPropagator {
    fn name(&self) -> &str {
        "FiniteDomain"
    }

    fn propagate(
        &mut self,
        context: &mut TheoryContext<'_>,
        literal: Literal,
    ) -> PropagationStatus {
        if self.is_head.contains_key(&literal) {
            self.record_on_module_trail(literal, context.assignments.get_decision_level());
        }
        Ok(())
    }

    fn propagate_fixpoint(&mut self, context: &mut TheoryContext<'_>) -> PropagationStatus {
        if !self.has_constraints() {
            return Ok(());
        }
        self.run_fixpoint(context)
    }

    fn propagate_total_assignment(
        &mut self,
        context: &mut TheoryContext<'_>,
    ) -> PropagationStatus {
        if !self.has_constraints() {
            return Ok(());
        }
        let trail_before = context.assignments.num_trail_entries();
        self.run_fixpoint(context)?;
        if context.assignments.num_trail_entries() != trail_before {
            return Ok(());
        }
        match self.labelling_search(context.assignments) {
            Some(values) => {
                self.labelled_values = Some(values);
                Ok(())
            }
            None => {
                let mut clause = Vec::new();
                for index in 0..context.assignments.num_trail_entries() {
                    let literal = context.assignments.get_trail_entry(index);
                    if context.assignments.is_literal_decision(literal) {
                        clause.push(!literal);
                    }
                }
                Err(ConflictInfo::Explanation { clause })
            }
        }
    }

    fn explain(
        &self,
        assignments: &AssignmentsPropositional,
        literal: Literal,
        payload: u32,
    ) -> Vec<Literal> {
        let (prefix, _) = self.reasons[payload as usize];
        let mut clause = vec![literal];
        for &(trail_literal, _) in &self.module_trail[..prefix] {
            korat_assert_simple!(assignments.is_literal_assigned_true(trail_literal));
            clause.push(!trail_literal);
        }
        clause
    }

    fn notify_new_decision_level(&mut self) {}

    fn notify_backtrack(&mut self, level: usize) {
        self.domains.backtrack(level);
        while let Some(&(literal, entry_level)) = self.module_trail.last() {
            if entry_level <= level {
                break;
            }
            let _ = self.module_trail_members.remove(&literal);
            let _ = self.module_trail.pop();
        }
        while let Some(&(_, reason_level)) = self.reasons.last() {
            if reason_level <= level {
                break;
            }
            let _ = self.reasons.pop();
        }
        self.labelled_values = None;
    }

    fn relocate(&mut self, _map: &ClauseRelocationMap) {
        // the finite-domain module retains no clause references
    }
}
