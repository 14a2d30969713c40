//! The definition theory module: enforces stable or well-founded semantics
//! for inductive definitions on top of their Clark completion. The module
//! maintains a justification for every tracked defined atom, detects cycle
//! sources when justifications lose support, searches for unfounded sets
//! from those sources, and asserts loop formulas.

use std::collections::VecDeque;

use log::debug;

use super::dependency_graph::strongly_connected_components;
use super::dependency_graph::SccPartition;
use super::rule::DefinedOccurrence;
use super::rule::DefinitionSemantics;
use super::rule::DefinitionType;
use super::rule::Rule;
use crate::basic_types::ClauseReference;
use crate::basic_types::ConflictInfo;
use crate::basic_types::HashMap;
use crate::basic_types::HashSet;
use crate::basic_types::PropagationStatus;
use crate::engine::propagation::TheoryContext;
use crate::engine::propagation::TheoryPropagator;
use crate::engine::sat::AssignmentsPropositional;
use crate::engine::sat::ClauseRelocationMap;
use crate::engine::variables::Literal;
use crate::engine::variables::PropositionalVariable;
use crate::korat_assert_moderate;
use crate::korat_assert_simple;
use crate::options::UnfoundedCheckPolicy;
use crate::options::UnfoundedSearchStrategy;
use crate::propagators::aggregates::AggregatePropagator;

#[derive(Debug)]
pub(crate) struct DefinitionPropagator {
    rules: HashMap<PropositionalVariable, Rule>,
    /// Aggregate-defined atoms: head -> (definition id, aggregate index).
    aggregate_heads: HashMap<PropositionalVariable, (u32, usize)>,
    semantics: HashMap<u32, DefinitionSemantics>,
    def_type: HashMap<PropositionalVariable, DefinitionType>,
    def_occ: HashMap<PropositionalVariable, DefinedOccurrence>,
    /// Atoms on a positive loop: the candidates of unfounded-set search.
    tracked: Vec<PropositionalVariable>,
    /// Atoms on a mixed loop under well-founded semantics.
    mixed_tracked: Vec<PropositionalVariable>,
    pos_scc: SccPartition,
    disj_occurs: HashMap<Literal, Vec<PropositionalVariable>>,
    conj_occurs: HashMap<Literal, Vec<PropositionalVariable>>,
    /// Current support for each tracked disjunctive or aggregate atom.
    justification: HashMap<PropositionalVariable, Vec<Literal>>,
    is_cycle_source: HashSet<PropositionalVariable>,
    cycle_sources: Vec<PropositionalVariable>,
    /// Justification counters during bootstrap and unfounded-set search;
    /// zero means justified.
    seen: HashMap<PropositionalVariable, u32>,
    recent_assignments: Vec<Literal>,
    needs_full_scan: bool,
    policy: UnfoundedCheckPolicy,
    search_strategy: UnfoundedSearchStrategy,
    tseitin_threshold: usize,
    adaption_total: u64,
    adaption_current: u64,
    /// Guard against enqueueing the same pivot twice at one level.
    asserted_pivots: Vec<(PropositionalVariable, usize)>,
    loop_formula_references: Vec<ClauseReference>,
    has_positive_loops: bool,
    num_unfounded_sets: u64,
}

enum Justifiability {
    Justified(Vec<Literal>),
    Blocked(Vec<PropositionalVariable>),
}

impl DefinitionPropagator {
    pub(crate) fn new(
        policy: UnfoundedCheckPolicy,
        search_strategy: UnfoundedSearchStrategy,
        tseitin_threshold: usize,
    ) -> Self {
        DefinitionPropagator {
            rules: HashMap::default(),
            aggregate_heads: HashMap::default(),
            semantics: HashMap::default(),
            def_type: HashMap::default(),
            def_occ: HashMap::default(),
            tracked: Vec::default(),
            mixed_tracked: Vec::default(),
            pos_scc: SccPartition::default(),
            disj_occurs: HashMap::default(),
            conj_occurs: HashMap::default(),
            justification: HashMap::default(),
            is_cycle_source: HashSet::default(),
            cycle_sources: Vec::default(),
            seen: HashMap::default(),
            recent_assignments: Vec::default(),
            needs_full_scan: false,
            policy,
            search_strategy,
            tseitin_threshold,
            adaption_total: 0,
            adaption_current: 0,
            asserted_pivots: Vec::default(),
            loop_formula_references: Vec::default(),
            has_positive_loops: false,
            num_unfounded_sets: 0,
        }
    }

    pub(crate) fn set_semantics(&mut self, definition_id: u32, semantics: DefinitionSemantics) {
        let _ = self.semantics.insert(definition_id, semantics);
    }

    fn semantics_of(&self, definition_id: u32) -> DefinitionSemantics {
        self.semantics
            .get(&definition_id)
            .copied()
            .unwrap_or(DefinitionSemantics::WellFounded)
    }

    /// Register a rule. One rule per defined atom; the model layer validates
    /// this and normalises single-literal bodies to conjunctions.
    pub(crate) fn add_rule(&mut self, rule: Rule) {
        korat_assert_simple!(!self.rules.contains_key(&rule.head));
        korat_assert_simple!(!self.aggregate_heads.contains_key(&rule.head));
        let _ = self.def_type.insert(
            rule.head,
            if rule.conjunctive {
                DefinitionType::Conjunctive
            } else {
                DefinitionType::Disjunctive
            },
        );
        let _ = self.rules.insert(rule.head, rule);
    }

    /// Register an aggregate-defined atom; the aggregate itself lives in the
    /// aggregate module.
    pub(crate) fn add_aggregate_head(
        &mut self,
        head: PropositionalVariable,
        definition_id: u32,
        aggregate_index: usize,
    ) {
        korat_assert_simple!(!self.rules.contains_key(&head));
        let _ = self.def_type.insert(head, DefinitionType::Aggregate);
        let _ = self
            .aggregate_heads
            .insert(head, (definition_id, aggregate_index));
    }

    fn tracks_loops_of(&self, head: PropositionalVariable) -> bool {
        let definition_id = match self.rules.get(&head) {
            Some(rule) => rule.definition_id,
            None => match self.aggregate_heads.get(&head) {
                Some(&(definition_id, _)) => definition_id,
                None => return false,
            },
        };
        self.semantics_of(definition_id) != DefinitionSemantics::Completion
    }

    fn body_successors(
        &self,
        head: PropositionalVariable,
        aggregates: &AggregatePropagator,
    ) -> Vec<(PropositionalVariable, bool)> {
        match self.def_type[&head] {
            DefinitionType::Disjunctive | DefinitionType::Conjunctive => self.rules[&head]
                .body
                .iter()
                .map(|literal| (literal.get_propositional_variable(), literal.is_positive()))
                .collect(),
            DefinitionType::Aggregate => {
                let (_, aggregate_index) = self.aggregate_heads[&head];
                // set literals can occur under either sign in justifications,
                // so all edges count as positive here
                aggregates
                    .set_literals_of(aggregate_index)
                    .iter()
                    .map(|wlit| (wlit.literal.get_propositional_variable(), true))
                    .collect()
            }
        }
    }

    /// Emit the completion, compute the dependency partitions, classify
    /// every defined atom, bootstrap a cycle-free justification and force
    /// never-justifiable atoms false at the root.
    pub(crate) fn initialise(&mut self, context: &mut TheoryContext<'_>) -> PropagationStatus {
        korat_assert_simple!(context.assignments.is_at_the_root_level());
        let aggregates = context
            .peer_aggregates
            .expect("the aggregate module is registered before the definition module");

        // 1. Clark completion of every rule
        let rules: Vec<Rule> = self.rules.values().cloned().collect();
        for rule in &rules {
            let head_literal = Literal::new(rule.head, true);
            let long_clause: Vec<Literal> = if rule.conjunctive {
                std::iter::once(head_literal)
                    .chain(rule.body.iter().map(|&literal| !literal))
                    .collect()
            } else {
                std::iter::once(!head_literal)
                    .chain(rule.body.iter().copied())
                    .collect()
            };
            if context
                .clausal_propagator
                .add_permanent_clause(long_clause, context.assignments, context.clause_allocator)
                .is_err()
            {
                return Err(ConflictInfo::Explanation { clause: vec![] });
            }
            for &body_literal in &rule.body {
                let binary = if rule.conjunctive {
                    vec![!head_literal, body_literal]
                } else {
                    vec![head_literal, !body_literal]
                };
                if context
                    .clausal_propagator
                    .add_permanent_clause(binary, context.assignments, context.clause_allocator)
                    .is_err()
                {
                    return Err(ConflictInfo::Explanation { clause: vec![] });
                }
            }
        }
        if let Err(conflict) = context
            .clausal_propagator
            .propagate(context.assignments, context.clause_allocator)
        {
            return Err(conflict);
        }

        // 2. SCCs of the positive subgraph and mixed loops of the full graph
        let nodes: Vec<PropositionalVariable> = self
            .def_type
            .keys()
            .copied()
            .filter(|&head| self.tracks_loops_of(head))
            .collect();

        let mut positive_successors: HashMap<PropositionalVariable, Vec<PropositionalVariable>> =
            HashMap::default();
        let mut full_successors: HashMap<PropositionalVariable, Vec<PropositionalVariable>> =
            HashMap::default();
        let mut negative_edges: Vec<(PropositionalVariable, PropositionalVariable)> = Vec::new();
        for &head in &nodes {
            for (successor, positive) in self.body_successors(head, aggregates) {
                full_successors.entry(head).or_default().push(successor);
                if positive {
                    positive_successors.entry(head).or_default().push(successor);
                } else {
                    negative_edges.push((head, successor));
                }
            }
        }

        self.pos_scc = strongly_connected_components(&nodes, &positive_successors);
        let full_scc = strongly_connected_components(&nodes, &full_successors);

        let mut mixed_components: HashSet<usize> = HashSet::default();
        for &(from, to) in &negative_edges {
            if full_scc.same_component(from, to) {
                let _ = mixed_components.insert(
                    full_scc.component_of(from).expect("from is a node"),
                );
            }
        }

        // 3. classify defined occurrences and reduce the tracked sets
        self.tracked.clear();
        self.mixed_tracked.clear();
        for &head in &nodes {
            let in_positive_loop = self
                .body_successors(head, aggregates)
                .iter()
                .any(|&(successor, positive)| {
                    positive && self.pos_scc.same_component(head, successor)
                });
            let in_mixed_loop = full_scc
                .component_of(head)
                .map(|component| mixed_components.contains(&component))
                .unwrap_or(false);
            let occurrence = match (in_positive_loop, in_mixed_loop) {
                (false, false) => DefinedOccurrence::None,
                (true, false) => DefinedOccurrence::PosLoop,
                (false, true) => DefinedOccurrence::MixedLoop,
                (true, true) => DefinedOccurrence::BothLoop,
            };
            let _ = self.def_occ.insert(head, occurrence);
            if occurrence.in_positive_loop() {
                self.tracked.push(head);
            }
            if occurrence.in_mixed_loop() {
                self.mixed_tracked.push(head);
            }
        }
        self.tracked.sort();
        self.mixed_tracked.sort();
        self.has_positive_loops = !self.tracked.is_empty();

        // 4. occurrence lists over tracked atoms
        self.disj_occurs.clear();
        self.conj_occurs.clear();
        for &head in &self.tracked {
            if let Some(rule) = self.rules.get(&head) {
                let head_literal = Literal::new(head, true);
                let occurs = if rule.conjunctive {
                    &mut self.conj_occurs
                } else {
                    &mut self.disj_occurs
                };
                for &body_literal in &rule.body {
                    if body_literal != head_literal {
                        occurs.entry(body_literal).or_default().push(head);
                    }
                }
            }
        }

        // 5. bootstrap a cycle-free justification
        self.bootstrap_justification(context, aggregates)
    }

    /// Seed a queue with all literals that are trivially safe from positive
    /// cycles (negative literals and atoms outside the positive graph) and
    /// propagate safeness through the rules. Atoms left unjustified can
    /// never become true and are forced false at the root.
    fn bootstrap_justification(
        &mut self,
        context: &mut TheoryContext<'_>,
        aggregates: &AggregatePropagator,
    ) -> PropagationStatus {
        self.seen.clear();
        for &head in &self.tracked {
            let counter = match self.def_type[&head] {
                DefinitionType::Disjunctive | DefinitionType::Aggregate => 1,
                DefinitionType::Conjunctive => self.rules[&head].body.len() as u32,
            };
            let _ = self.seen.insert(head, counter);
        }

        let mut queue: Vec<Literal> = Vec::new();
        for index in 0..context.assignments.num_propositional_variables() {
            let variable = PropositionalVariable::new(index);
            let negative = Literal::new(variable, false);
            if !context.assignments.is_literal_assigned_false(negative) {
                queue.push(negative);
            }
            let positive = Literal::new(variable, true);
            let in_positive_graph = self
                .def_occ
                .get(&variable)
                .map(|occ| occ.in_positive_loop())
                .unwrap_or(false);
            if !in_positive_graph && !context.assignments.is_literal_assigned_false(positive) {
                queue.push(positive);
            }
        }

        while let Some(literal) = queue.pop() {
            let mut newly_justified: Vec<(PropositionalVariable, Vec<Literal>)> = Vec::new();
            self.propagate_justification_step(context.assignments, aggregates, literal, &mut newly_justified);
            for (head, support) in newly_justified {
                let _ = self.seen.insert(head, 0);
                if self.def_type[&head] != DefinitionType::Conjunctive {
                    let _ = self.justification.insert(head, support);
                }
                queue.push(Literal::new(head, true));
            }
        }

        // atoms that remain unjustified can never become true
        let unjustified: Vec<PropositionalVariable> = self
            .tracked
            .iter()
            .copied()
            .filter(|head| self.seen.get(head).copied().unwrap_or(0) > 0)
            .collect();
        for &head in &unjustified {
            let positive = Literal::new(head, true);
            if context.assignments.is_literal_assigned_true(positive) {
                debug!("defined atom {head} has no justification but is true at the root");
                return Err(ConflictInfo::Explanation { clause: vec![] });
            }
            context.enqueue_root(!positive)?;

            match self.def_occ[&head] {
                DefinedOccurrence::PosLoop => {
                    let _ = self.def_occ.insert(head, DefinedOccurrence::None);
                }
                DefinedOccurrence::BothLoop => {
                    let _ = self.def_occ.insert(head, DefinedOccurrence::MixedLoop);
                }
                _ => {}
            }
        }
        self.tracked
            .retain(|head| self.def_occ[head].in_positive_loop());
        self.has_positive_loops = !self.tracked.is_empty();
        self.seen.clear();

        korat_assert_moderate!(self.tracked.iter().all(|head| {
            self.def_type[head] == DefinitionType::Conjunctive
                || !self.justification[head].is_empty()
        }));

        // propagation between now and the first fixpoint is not observed
        // incrementally yet, so the first cycle-source pass scans everything
        self.needs_full_scan = true;

        Ok(())
    }

    /// `literal` has become safe; collect the heads this justifies, together
    /// with their supports. Counters in `self.seen` are updated for
    /// conjunctive heads.
    fn propagate_justification_step(
        &mut self,
        assignments: &AssignmentsPropositional,
        aggregates: &AggregatePropagator,
        literal: Literal,
        newly_justified: &mut Vec<(PropositionalVariable, Vec<Literal>)>,
    ) {
        if let Some(heads) = self.disj_occurs.get(&literal) {
            for &head in heads {
                if assignments.is_literal_assigned_false(Literal::new(head, true)) {
                    continue;
                }
                if self.seen.get(&head).copied().unwrap_or(0) > 0 {
                    newly_justified.push((head, vec![literal]));
                    let _ = self.seen.insert(head, 0);
                }
            }
        }
        if let Some(heads) = self.conj_occurs.get(&literal) {
            let heads = heads.clone();
            for &head in heads.iter() {
                if assignments.is_literal_assigned_false(Literal::new(head, true)) {
                    continue;
                }
                let counter = self.seen.get(&head).copied().unwrap_or(0);
                if counter > 0 {
                    let _ = self.seen.insert(head, counter - 1);
                    if counter == 1 {
                        newly_justified.push((head, Vec::new()));
                    }
                }
            }
        }
        let variable = literal.get_propositional_variable();
        for &head in aggregates.heads_of_aggregates_containing(variable) {
            if self.seen.get(&head).copied().unwrap_or(0) == 0 {
                continue;
            }
            if assignments.is_literal_assigned_false(Literal::new(head, true)) {
                continue;
            }
            let (_, aggregate_index) = self.aggregate_heads[&head];
            let seen = &self.seen;
            let (justified, support, _) = aggregates.can_justify_head(
                assignments,
                aggregate_index,
                &|atom| seen.get(&atom).copied().unwrap_or(0) == 0,
                false,
            );
            if justified {
                newly_justified.push((head, support));
                let _ = self.seen.insert(head, 0);
            }
        }
    }

    /// The trail literals whose assignment may invalidate a justification.
    pub(crate) fn trail_literals_to_watch(
        &self,
        aggregates: &AggregatePropagator,
    ) -> Vec<Literal> {
        let mut literals = Vec::new();
        for &head in &self.tracked {
            match self.def_type[&head] {
                DefinitionType::Disjunctive | DefinitionType::Conjunctive => {
                    for &body_literal in &self.rules[&head].body {
                        literals.push(!body_literal);
                    }
                }
                DefinitionType::Aggregate => {
                    let (_, aggregate_index) = self.aggregate_heads[&head];
                    for wlit in aggregates.set_literals_of(aggregate_index) {
                        literals.push(!wlit.literal);
                        literals.push(wlit.literal);
                    }
                }
            }
            literals.push(Literal::new(head, true));
            literals.push(Literal::new(head, false));
        }
        literals.sort();
        literals.dedup();
        literals
    }

    fn indirect_propagate_now(&mut self, total_assignment: bool) -> bool {
        if total_assignment {
            return true;
        }
        match self.policy {
            UnfoundedCheckPolicy::Always => true,
            UnfoundedCheckPolicy::Lazy => false,
            UnfoundedCheckPolicy::Adaptive => {
                if self.adaption_current < self.adaption_total {
                    self.adaption_current += 1;
                    false
                } else {
                    true
                }
            }
        }
    }

    /// Cycle sources are defined atoms whose justification lost a literal to
    /// falsification and for which only a same-component replacement exists.
    fn find_cycle_sources(
        &mut self,
        assignments: &AssignmentsPropositional,
        aggregates: &AggregatePropagator,
    ) {
        self.cycle_sources
            .retain(|head| self.is_cycle_source.contains(head));

        if !self.needs_full_scan {
            let recent = std::mem::take(&mut self.recent_assignments);
            for &literal in &recent {
                let falsified = !literal;
                let disjunctive_heads: Vec<PropositionalVariable> = self
                    .disj_occurs
                    .get(&falsified)
                    .cloned()
                    .unwrap_or_default();
                for head in disjunctive_heads {
                    self.check_justification(assignments, aggregates, head, Some(falsified));
                }
                let variable = falsified.get_propositional_variable();
                let aggregate_heads =
                    aggregates.heads_of_aggregates_containing(variable).to_vec();
                for head in aggregate_heads {
                    self.check_justification(assignments, aggregates, head, Some(falsified));
                }
            }
        } else {
            self.recent_assignments.clear();
            self.needs_full_scan = false;
            for head in self.tracked.clone() {
                match self.def_type[&head] {
                    DefinitionType::Disjunctive | DefinitionType::Aggregate => {
                        self.check_justification(assignments, aggregates, head, None);
                    }
                    DefinitionType::Conjunctive => {}
                }
            }
        }
    }

    fn check_justification(
        &mut self,
        assignments: &AssignmentsPropositional,
        aggregates: &AggregatePropagator,
        head: PropositionalVariable,
        falsified: Option<Literal>,
    ) {
        if self.is_cycle_source.contains(&head)
            || !self
                .def_occ
                .get(&head)
                .map(|occ| occ.in_positive_loop())
                .unwrap_or(false)
        {
            return;
        }
        let head_literal = Literal::new(head, true);
        if assignments.is_literal_assigned_false(head_literal) {
            return;
        }
        let justification = match self.justification.get(&head) {
            Some(justification) => justification,
            None => return,
        };
        let depends = match falsified {
            Some(literal) => justification.contains(&literal),
            None => justification
                .iter()
                .any(|&literal| assignments.is_literal_assigned_false(literal)),
        };
        if !depends {
            return;
        }
        self.handle_possible_cycle_source(assignments, aggregates, head);
    }

    /// Try to replace a lost justification; a replacement inside the atom's
    /// own positive component makes the atom a cycle source.
    fn handle_possible_cycle_source(
        &mut self,
        assignments: &AssignmentsPropositional,
        aggregates: &AggregatePropagator,
        head: PropositionalVariable,
    ) {
        match self.def_type[&head] {
            DefinitionType::Disjunctive => {
                let head_literal = Literal::new(head, true);
                let rule = &self.rules[&head];
                let mut candidate = None;
                let mut external = false;
                for &body_literal in &rule.body {
                    if body_literal == head_literal
                        || assignments.is_literal_assigned_false(body_literal)
                    {
                        continue;
                    }
                    candidate = Some(body_literal);
                    if !(body_literal.is_positive()
                        && self
                            .pos_scc
                            .same_component(head, body_literal.get_propositional_variable()))
                    {
                        external = true;
                        break;
                    }
                }
                korat_assert_moderate!(candidate.is_some());
                if external {
                    if let Some(replacement) = candidate {
                        let _ = self.justification.insert(head, vec![replacement]);
                    }
                    return;
                }
                self.mark_cycle_source(head);
            }
            DefinitionType::Aggregate => {
                let (_, aggregate_index) = self.aggregate_heads[&head];
                let (justified, support, _) =
                    aggregates.can_justify_head(assignments, aggregate_index, &|_| true, true);
                korat_assert_moderate!(justified);
                let external = support.iter().all(|&literal| {
                    !(literal.is_positive()
                        && self
                            .pos_scc
                            .same_component(head, literal.get_propositional_variable()))
                });
                if external {
                    let _ = self.justification.insert(head, support);
                } else {
                    self.mark_cycle_source(head);
                }
            }
            DefinitionType::Conjunctive => {
                unreachable!("conjunctive atoms are not direct cycle sources")
            }
        }
    }

    fn mark_cycle_source(&mut self, head: PropositionalVariable) {
        if self.is_cycle_source.insert(head) {
            self.cycle_sources.push(head);
        }
    }

    /// Mark all justification ancestors of `cycle_source` inside its
    /// component as unjustified.
    fn mark_non_justified(
        &mut self,
        aggregates: &AggregatePropagator,
        cycle_source: PropositionalVariable,
    ) {
        let mut queue = VecDeque::from([cycle_source]);
        while let Some(atom) = queue.pop_front() {
            let positive = Literal::new(atom, true);
            let mark = |head: PropositionalVariable,
                            seen: &mut HashMap<PropositionalVariable, u32>,
                            queue: &mut VecDeque<PropositionalVariable>,
                            pos_scc: &SccPartition| {
                if seen.get(&head).copied().unwrap_or(0) == 0
                    && pos_scc.same_component(head, cycle_source)
                {
                    let _ = seen.insert(head, 1);
                    queue.push_back(head);
                }
            };
            if let Some(heads) = self.disj_occurs.get(&positive) {
                for &head in heads {
                    if self
                        .justification
                        .get(&head)
                        .and_then(|justification| justification.first())
                        .map(|first| first.get_propositional_variable() == atom)
                        .unwrap_or(false)
                    {
                        mark(head, &mut self.seen, &mut queue, &self.pos_scc);
                    }
                }
            }
            if let Some(heads) = self.conj_occurs.get(&positive) {
                for &head in heads {
                    mark(head, &mut self.seen, &mut queue, &self.pos_scc);
                }
            }
            for &head in aggregates.heads_of_aggregates_containing(atom) {
                if self
                    .justification
                    .get(&head)
                    .map(|justification| justification.contains(&positive))
                    .unwrap_or(false)
                {
                    mark(head, &mut self.seen, &mut queue, &self.pos_scc);
                }
            }
        }
    }

    fn directly_justifiable(
        &mut self,
        assignments: &AssignmentsPropositional,
        aggregates: &AggregatePropagator,
        atom: PropositionalVariable,
    ) -> Justifiability {
        match self.def_type[&atom] {
            DefinitionType::Conjunctive => {
                let rule = &self.rules[&atom];
                let mut blocking = Vec::new();
                for &body_literal in &rule.body {
                    let variable = body_literal.get_propositional_variable();
                    if body_literal.is_positive()
                        && self.seen.get(&variable).copied().unwrap_or(0) > 0
                    {
                        blocking.push(variable);
                    }
                }
                let _ = self.seen.insert(atom, blocking.len() as u32);
                if blocking.is_empty() {
                    Justifiability::Justified(Vec::new())
                } else {
                    Justifiability::Blocked(blocking)
                }
            }
            DefinitionType::Disjunctive => {
                let head_literal = Literal::new(atom, true);
                let rule = &self.rules[&atom];
                let mut blocking = Vec::new();
                let mut support = None;
                for &body_literal in &rule.body {
                    if body_literal == head_literal
                        || assignments.is_literal_assigned_false(body_literal)
                    {
                        continue;
                    }
                    let variable = body_literal.get_propositional_variable();
                    if body_literal.is_negative()
                        || self.seen.get(&variable).copied().unwrap_or(0) == 0
                    {
                        support = Some(body_literal);
                        if !self.pos_scc.same_component(atom, variable) {
                            break;
                        }
                    } else {
                        blocking.push(variable);
                    }
                }
                match support {
                    Some(literal) => {
                        let _ = self.seen.insert(atom, 0);
                        Justifiability::Justified(vec![literal])
                    }
                    None => Justifiability::Blocked(blocking),
                }
            }
            DefinitionType::Aggregate => {
                let (_, aggregate_index) = self.aggregate_heads[&atom];
                let seen = &self.seen;
                let (justified, support, blocking) = aggregates.can_justify_head(
                    assignments,
                    aggregate_index,
                    &|variable| seen.get(&variable).copied().unwrap_or(0) == 0,
                    false,
                );
                if justified {
                    let _ = self.seen.insert(atom, 0);
                    Justifiability::Justified(support)
                } else {
                    Justifiability::Blocked(blocking)
                }
            }
        }
    }

    /// The atom `justified_atom` has found a justification; propagate this
    /// fact to its ancestors. Returns true when the original cycle source
    /// itself became justified.
    fn propagate_justified(
        &mut self,
        assignments: &AssignmentsPropositional,
        aggregates: &AggregatePropagator,
        justified_atom: PropositionalVariable,
        cycle_source: PropositionalVariable,
        unfounded: &mut HashSet<PropositionalVariable>,
    ) -> bool {
        let mut queue = vec![justified_atom];
        while let Some(atom) = queue.pop() {
            let _ = unfounded.remove(&atom);
            let _ = self.is_cycle_source.remove(&atom);
            if atom == cycle_source {
                return true;
            }

            let mut newly_justified = Vec::new();
            self.propagate_justification_step(
                assignments,
                aggregates,
                Literal::new(atom, true),
                &mut newly_justified,
            );
            for (head, support) in newly_justified {
                let _ = self.seen.insert(head, 0);
                if self.def_type[&head] != DefinitionType::Conjunctive {
                    let _ = self.justification.insert(head, support);
                }
                queue.push(head);
            }
        }
        false
    }

    /// Unfounded-set search from a cycle source: grow a candidate set of
    /// unjustified same-component atoms until either the source becomes
    /// justified (no unfounded set) or the candidates close under
    /// non-justifiability.
    fn unfounded(
        &mut self,
        assignments: &AssignmentsPropositional,
        aggregates: &AggregatePropagator,
        cycle_source: PropositionalVariable,
    ) -> Option<Vec<PropositionalVariable>> {
        self.seen.clear();
        self.mark_non_justified(aggregates, cycle_source);
        let _ = self.seen.insert(cycle_source, 1);

        let mut unfounded: HashSet<PropositionalVariable> = HashSet::default();
        let _ = unfounded.insert(cycle_source);
        let mut queue: VecDeque<PropositionalVariable> = VecDeque::from([cycle_source]);
        let mut source_is_justified = false;

        while !source_is_justified {
            let atom = match self.search_strategy {
                UnfoundedSearchStrategy::BreadthFirst => queue.pop_front(),
                UnfoundedSearchStrategy::DepthFirst => queue.pop_back(),
            };
            let atom = match atom {
                Some(atom) => atom,
                None => break,
            };
            if self.seen.get(&atom).copied().unwrap_or(0) == 0 {
                continue; // justified in the meantime
            }
            match self.directly_justifiable(assignments, aggregates, atom) {
                Justifiability::Justified(support) => {
                    if self.def_type[&atom] != DefinitionType::Conjunctive {
                        let _ = self.justification.insert(atom, support);
                    }
                    if self.propagate_justified(
                        assignments,
                        aggregates,
                        atom,
                        cycle_source,
                        &mut unfounded,
                    ) {
                        source_is_justified = true;
                    }
                }
                Justifiability::Blocked(blocking) => {
                    for variable in blocking {
                        korat_assert_moderate!(
                            self.seen.get(&variable).copied().unwrap_or(0) > 0
                        );
                        if self.pos_scc.same_component(variable, atom)
                            && unfounded.insert(variable)
                        {
                            queue.push_back(variable);
                        }
                    }
                }
            }
        }

        self.seen.clear();
        if source_is_justified {
            None
        } else {
            let mut members: Vec<PropositionalVariable> = unfounded.into_iter().collect();
            members.sort();
            korat_assert_simple!(!members.is_empty());
            Some(members)
        }
    }

    /// Collect the external support literals of the unfounded set: every
    /// body literal of a member that is not itself about a member.
    fn external_support(
        &self,
        aggregates: &AggregatePropagator,
        unfounded: &[PropositionalVariable],
    ) -> Vec<Literal> {
        let members: HashSet<PropositionalVariable> = unfounded.iter().copied().collect();
        let mut externals = Vec::new();
        let mut present: HashSet<Literal> = HashSet::default();
        for &member in unfounded {
            match self.def_type[&member] {
                DefinitionType::Conjunctive => {}
                DefinitionType::Disjunctive => {
                    let head_literal = Literal::new(member, true);
                    for &body_literal in &self.rules[&member].body {
                        if body_literal == head_literal
                            || members.contains(&body_literal.get_propositional_variable())
                        {
                            continue;
                        }
                        if present.insert(body_literal) {
                            externals.push(body_literal);
                        }
                    }
                }
                DefinitionType::Aggregate => {
                    let (_, aggregate_index) = self.aggregate_heads[&member];
                    let mut candidates = Vec::new();
                    aggregates.loop_formula_candidates(aggregate_index, &mut candidates);
                    for candidate in candidates {
                        if candidate.get_propositional_variable() == member
                            || members.contains(&candidate.get_propositional_variable())
                        {
                            continue;
                        }
                        if present.insert(candidate) {
                            externals.push(candidate);
                        }
                    }
                }
            }
        }
        externals
    }

    /// Assert the loop formulas of an unfounded set: a conflict clause when
    /// a member is already true, otherwise one asserting clause per open
    /// member (with a Tseitin split when the formulas grow too large).
    fn assert_unfounded_set(
        &mut self,
        context: &mut TheoryContext<'_>,
        aggregates: &AggregatePropagator,
        unfounded: Vec<PropositionalVariable>,
    ) -> PropagationStatus {
        debug!("found an unfounded set of size {}", unfounded.len());
        let externals = self.external_support(aggregates, &unfounded);
        let all_externals_false = externals
            .iter()
            .all(|&literal| context.assignments.is_literal_assigned_false(literal));

        // a true member makes the loop formula a conflict clause
        for &member in &unfounded {
            let positive = Literal::new(member, true);
            if context.assignments.is_literal_assigned_true(positive) {
                if all_externals_false {
                    let mut clause = vec![!positive];
                    clause.extend(externals.iter().copied());
                    return Err(ConflictInfo::Explanation { clause });
                }
                // a non-false external can only come from an aggregate body;
                // the loop formula is then too weak to conflict here
                return Ok(());
            }
        }

        if !all_externals_false {
            // still a valid lemma, but not asserting; only attach it when
            // the watch invariant can be established
            for &member in &unfounded {
                let positive = Literal::new(member, true);
                if context.assignments.is_literal_assigned_false(positive) {
                    continue;
                }
                let mut clause = vec![!positive];
                clause.extend(externals.iter().copied());
                clause.sort_by_key(|&literal| {
                    context.assignments.is_literal_assigned_false(literal)
                });
                if clause.len() >= 2
                    && !context.assignments.is_literal_assigned_false(clause[1])
                {
                    let reference = context.add_learned_clause_unchecked(clause);
                    self.loop_formula_references.push(reference);
                }
            }
            return Ok(());
        }

        let level = context.get_decision_level();
        let open_members: Vec<PropositionalVariable> = unfounded
            .iter()
            .copied()
            .filter(|&member| {
                let positive = Literal::new(member, true);
                context.assignments.is_literal_unassigned(positive)
                    && !self.asserted_pivots.contains(&(member, level))
            })
            .collect();

        if open_members.len() * externals.len() > self.tseitin_threshold {
            // t <-> \/ externals, then one binary per member
            let tseitin = context.create_new_propositional_variable();
            let tseitin_literal = Literal::new(tseitin, true);

            let mut long_clause = vec![!tseitin_literal];
            long_clause.extend(externals.iter().copied());
            let reference = context.add_asserting_learned_clause(long_clause);
            self.loop_formula_references.push(reference);
            for &external in &externals {
                let reference =
                    context.add_learned_clause_unchecked(vec![!external, tseitin_literal]);
                self.loop_formula_references.push(reference);
            }
            for &member in &open_members {
                let positive = Literal::new(member, true);
                let reference =
                    context.add_asserting_learned_clause(vec![!positive, tseitin_literal]);
                self.loop_formula_references.push(reference);
                self.asserted_pivots.push((member, level));
                let _ = self.is_cycle_source.remove(&member);
            }
        } else {
            for &member in &open_members {
                let positive = Literal::new(member, true);
                let mut clause = vec![!positive];
                clause.extend(externals.iter().copied());
                if clause.len() == 1 {
                    context.enqueue_root(!positive)?;
                } else if context.assignments.is_at_the_root_level() {
                    context.enqueue_root(!positive)?;
                } else {
                    let reference = context.add_asserting_learned_clause(clause);
                    self.loop_formula_references.push(reference);
                }
                self.asserted_pivots.push((member, level));
                let _ = self.is_cycle_source.remove(&member);
            }
        }
        Ok(())
    }

    fn run_unfounded_pass(
        &mut self,
        context: &mut TheoryContext<'_>,
        total_assignment: bool,
    ) -> PropagationStatus {
        if !self.has_positive_loops {
            self.recent_assignments.clear();
            return Ok(());
        }
        if !self.indirect_propagate_now(total_assignment) {
            return Ok(());
        }

        let aggregates = context
            .peer_aggregates
            .expect("the aggregate module is available during definition propagation");

        self.find_cycle_sources(context.assignments, aggregates);

        let sources = self.cycle_sources.clone();
        for source in sources {
            if !self.is_cycle_source.contains(&source) {
                continue;
            }
            if let Some(unfounded) = self.unfounded(context.assignments, aggregates, source) {
                self.num_unfounded_sets += 1;
                if self.policy == UnfoundedCheckPolicy::Adaptive {
                    self.adaption_current += 1;
                }
                return self.assert_unfounded_set(context, aggregates, unfounded);
            }
        }

        // no unfounded set this round; adapt the skip interval
        if self.policy == UnfoundedCheckPolicy::Adaptive {
            if self.adaption_current == self.adaption_total {
                self.adaption_total += 1;
            } else {
                self.adaption_total = self.adaption_total.saturating_sub(1);
            }
            self.adaption_current = 0;
        }
        Ok(())
    }

    /// A total assignment under well-founded semantics must agree with the
    /// well-founded model of the definition when mixed loops are present;
    /// the check computes the alternating fixpoint with the open atoms fixed
    /// by the assignment.
    fn check_well_founded_total(
        &self,
        context: &mut TheoryContext<'_>,
    ) -> PropagationStatus {
        let checked: Vec<PropositionalVariable> = self
            .mixed_tracked
            .iter()
            .copied()
            .filter(|head| {
                self.rules
                    .get(head)
                    .map(|rule| {
                        self.semantics_of(rule.definition_id) == DefinitionSemantics::WellFounded
                    })
                    .unwrap_or(false)
            })
            .collect();
        if checked.is_empty() {
            return Ok(());
        }
        let defined: HashSet<PropositionalVariable> = checked.iter().copied().collect();
        let assignments = &context.assignments;

        // least model of the reduct where negated defined atoms are read
        // from `upper`
        let least_model = |upper: &HashSet<PropositionalVariable>| {
            let mut derived: HashSet<PropositionalVariable> = HashSet::default();
            let mut changed = true;
            while changed {
                changed = false;
                for &head in &checked {
                    if derived.contains(&head) {
                        continue;
                    }
                    let rule = &self.rules[&head];
                    let literal_holds = |literal: Literal| {
                        let variable = literal.get_propositional_variable();
                        if defined.contains(&variable) {
                            if literal.is_positive() {
                                derived.contains(&variable)
                            } else {
                                !upper.contains(&variable)
                            }
                        } else {
                            assignments.is_literal_assigned_true(literal)
                        }
                    };
                    let body_holds = if rule.conjunctive {
                        rule.body.iter().all(|&literal| literal_holds(literal))
                    } else {
                        rule.body.iter().any(|&literal| literal_holds(literal))
                    };
                    if body_holds {
                        let _ = derived.insert(head);
                        changed = true;
                    }
                }
            }
            derived
        };

        let mut lower: HashSet<PropositionalVariable> = HashSet::default();
        let mut upper: HashSet<PropositionalVariable> = defined.clone();
        loop {
            let new_lower = least_model(&upper);
            let new_upper = least_model(&lower);
            if new_lower == lower && new_upper == upper {
                break;
            }
            lower = new_lower;
            upper = new_upper;
        }

        let agrees = checked.iter().all(|&head| {
            let positive = Literal::new(head, true);
            if context.assignments.is_literal_assigned_true(positive) {
                lower.contains(&head)
            } else {
                !upper.contains(&head)
            }
        });
        if agrees {
            return Ok(());
        }

        // reject this total assignment
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

impl TheoryPropagator for DefinitionPropagator {
    fn name(&self) -> &str {
        "Definitions"
    }

    fn propagate(
        &mut self,
        _context: &mut TheoryContext<'_>,
        literal: Literal,
    ) -> PropagationStatus {
        self.recent_assignments.push(literal);
        Ok(())
    }

    fn propagate_fixpoint(&mut self, context: &mut TheoryContext<'_>) -> PropagationStatus {
        self.run_unfounded_pass(context, false)
    }

    fn propagate_total_assignment(
        &mut self,
        context: &mut TheoryContext<'_>,
    ) -> PropagationStatus {
        let trail_before = context.assignments.num_trail_entries();
        self.run_unfounded_pass(context, true)?;
        if context.assignments.num_trail_entries() != trail_before {
            return Ok(());
        }
        self.check_well_founded_total(context)
    }

    fn explain(
        &self,
        _assignments: &AssignmentsPropositional,
        _literal: Literal,
        _payload: u32,
    ) -> Vec<Literal> {
        // loop formulas are handed to the kernel as learned clauses, so the
        // kernel never requests an explanation from this module
        unreachable!("definition propagations carry clause antecedents")
    }

    fn notify_new_decision_level(&mut self) {}

    fn notify_backtrack(&mut self, level: usize) {
        self.recent_assignments.clear();
        self.needs_full_scan = true;
        self.is_cycle_source.clear();
        self.cycle_sources.clear();
        self.asserted_pivots
            .retain(|&(_, pivot_level)| pivot_level <= level);
    }

    fn relocate(&mut self, map: &ClauseRelocationMap) {
        // loop formulas are learned clauses, so the database reduction may
        // have deleted some of them in the meantime
        self.loop_formula_references = self
            .loop_formula_references
            .iter()
            .filter_map(|&reference| map.try_remap(reference))
            .collect();
    }
}
