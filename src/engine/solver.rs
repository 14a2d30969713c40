//! The satisfaction solver: owner of the trail and clause arena, driver of
//! the CDCL search, and coordinator of the theory modules. Modules observe
//! the trail through watches, propagate through the kernel's enqueue entry
//! point, and hand clauses back for learning; on clausal fixpoint the
//! coordinator polls each module in priority order and restarts the loop at
//! the clausal propagator whenever a module propagates.

use std::cmp::min;
use std::time::Instant;

use crate::basic_types::statistic_logging::log_statistic;
use crate::basic_types::ConflictInfo;
use crate::basic_types::ConstraintOperationError;
use crate::basic_types::ConstraintReference;
use crate::basic_types::KeyedVec;
use crate::basic_types::PropagationStatus;
use crate::branching::Brancher;
use crate::branching::SelectionContext;
use crate::branching::VariableFlags;
use crate::branching::VsidsBrancher;
use crate::engine::conflict_analysis::ConflictAnalysisContext;
use crate::engine::conflict_analysis::ResolutionConflictAnalyser;
use crate::engine::propagation::ModuleId;
use crate::engine::propagation::ReasonStore;
use crate::engine::propagation::TheoryContext;
use crate::engine::propagation::TheoryPropagator;
use crate::engine::propagation::TheoryWatchList;
use crate::engine::sat::AssignmentsPropositional;
use crate::engine::sat::ClausalPropagator;
use crate::engine::sat::ClauseAllocator;
use crate::engine::sat::ExplanationClauseManager;
use crate::engine::sat::LearnedClauseManager;
use crate::engine::sat::RestartStrategy;
use crate::engine::variable_names::VariableNames;
use crate::engine::variables::Literal;
use crate::engine::variables::PropositionalVariable;
use crate::korat_assert_extreme;
use crate::korat_assert_moderate;
use crate::korat_assert_simple;
use crate::options::SolverOptions;
use crate::propagators::aggregates::AggregatePropagator;
use crate::propagators::definitions::DefinitionPropagator;
use crate::propagators::finite_domain::FiniteDomainPropagator;
use crate::termination::TerminationCondition;

/// The result of one call to [`SatisfactionSolver::solve_under_assumptions`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum SolverExecutionFlag {
    Feasible,
    Infeasible,
    Timeout,
    /// The clause database exceeded its configured capacity; the solver is
    /// back at the root in a coherent, re-enterable state.
    ResourceLimit,
}

/// The theory modules, owned by value. Cross-module queries go through the
/// coordinator: the aggregate module is handed to the definition module as a
/// read-only peer inside the propagation context.
#[derive(Default, Debug)]
pub(crate) struct TheoryModules {
    pub(crate) aggregates: AggregatePropagator,
    pub(crate) definitions: Option<DefinitionPropagator>,
    pub(crate) finite_domain: Option<FiniteDomainPropagator>,
    /// Modules in priority order; polls happen in this order, backtrack
    /// notifications in reverse.
    pub(crate) registration_order: Vec<ModuleId>,
}

impl TheoryModules {
    pub(crate) fn explain(
        &self,
        module: ModuleId,
        assignments: &AssignmentsPropositional,
        literal: Literal,
        payload: u32,
    ) -> Vec<Literal> {
        match module {
            ModuleId::Aggregates => self.aggregates.explain(assignments, literal, payload),
            ModuleId::Definitions => self
                .definitions
                .as_ref()
                .expect("explanation requested from an unregistered module")
                .explain(assignments, literal, payload),
            ModuleId::FiniteDomain => self
                .finite_domain
                .as_ref()
                .expect("explanation requested from an unregistered module")
                .explain(assignments, literal, payload),
        }
    }

    fn notify_new_decision_level(&mut self) {
        for &module in &self.registration_order {
            match module {
                ModuleId::Aggregates => self.aggregates.notify_new_decision_level(),
                ModuleId::Definitions => {
                    if let Some(definitions) = self.definitions.as_mut() {
                        definitions.notify_new_decision_level();
                    }
                }
                ModuleId::FiniteDomain => {
                    if let Some(finite_domain) = self.finite_domain.as_mut() {
                        finite_domain.notify_new_decision_level();
                    }
                }
            }
        }
    }

    fn notify_backtrack(&mut self, level: usize) {
        for &module in self.registration_order.iter().rev() {
            match module {
                ModuleId::Aggregates => self.aggregates.notify_backtrack(level),
                ModuleId::Definitions => {
                    if let Some(definitions) = self.definitions.as_mut() {
                        definitions.notify_backtrack(level);
                    }
                }
                ModuleId::FiniteDomain => {
                    if let Some(finite_domain) = self.finite_domain.as_mut() {
                        finite_domain.notify_backtrack(level);
                    }
                }
            }
        }
    }

    fn relocate(&mut self, map: &crate::engine::sat::ClauseRelocationMap) {
        for &module in &self.registration_order {
            match module {
                ModuleId::Aggregates => self.aggregates.relocate(map),
                ModuleId::Definitions => {
                    if let Some(definitions) = self.definitions.as_mut() {
                        definitions.relocate(map);
                    }
                }
                ModuleId::FiniteDomain => {
                    if let Some(finite_domain) = self.finite_domain.as_mut() {
                        finite_domain.relocate(map);
                    }
                }
            }
        }
    }
}

enum ModuleAction {
    Propagate(Literal),
    Fixpoint,
    TotalAssignment,
}

pub(crate) struct SatisfactionSolver {
    pub(crate) state: SolverState,
    pub(crate) assignments: AssignmentsPropositional,
    clausal_propagator: ClausalPropagator,
    pub(crate) clause_allocator: ClauseAllocator,
    learned_clause_manager: LearnedClauseManager,
    restart_strategy: RestartStrategy,
    conflict_analyser: ResolutionConflictAnalyser,
    explanation_clause_manager: ExplanationClauseManager,
    reason_store: ReasonStore,
    pub(crate) modules: TheoryModules,
    theory_watch_list: TheoryWatchList,
    /// Per registered module: the next trail entry it has not yet observed.
    module_trail_positions: Vec<usize>,
    assumptions: Vec<Literal>,
    pub(crate) variable_flags: KeyedVec<PropositionalVariable, VariableFlags>,
    variable_names: VariableNames,
    counters: Counters,
    pub(crate) internal_parameters: SolverOptions,
    pub(crate) true_literal: Literal,
    pub(crate) false_literal: Literal,
}

impl std::fmt::Debug for SatisfactionSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SatisfactionSolver")
            .field("state", &self.state)
            .field("assumptions", &self.assumptions)
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}

impl Default for SatisfactionSolver {
    fn default() -> Self {
        SatisfactionSolver::new(SolverOptions::default())
    }
}

impl SatisfactionSolver {
    pub(crate) fn new(options: SolverOptions) -> Self {
        let dummy_literal = Literal::new(PropositionalVariable::new(0), true);

        let mut solver = SatisfactionSolver {
            state: SolverState::default(),
            assignments: AssignmentsPropositional::default(),
            clausal_propagator: ClausalPropagator::default(),
            clause_allocator: ClauseAllocator::default(),
            learned_clause_manager: LearnedClauseManager::new(
                options.learned_clause_limit,
                options.learned_clause_limit_growth,
                options.clause_activity_decay,
            ),
            restart_strategy: RestartStrategy::new(options.restart_schedule),
            conflict_analyser: ResolutionConflictAnalyser::default(),
            explanation_clause_manager: ExplanationClauseManager::default(),
            reason_store: ReasonStore::default(),
            modules: TheoryModules::default(),
            theory_watch_list: TheoryWatchList::default(),
            module_trail_positions: Vec::default(),
            assumptions: Vec::default(),
            variable_flags: KeyedVec::default(),
            variable_names: VariableNames::default(),
            counters: Counters::default(),
            internal_parameters: options,
            true_literal: dummy_literal,
            false_literal: !dummy_literal,
        };

        // variable 0 is the always-true convenience variable; it gives every
        // module a literal that is guaranteed true for corner cases
        let root_variable = solver.new_variable(true, false, Some("true".to_owned()));
        let true_literal = Literal::new(root_variable, true);
        solver.assignments.true_literal = true_literal;
        solver.assignments.false_literal = !true_literal;
        solver.true_literal = true_literal;
        solver.false_literal = !true_literal;
        solver.assignments.enqueue_decision_literal(true_literal);

        solver
    }

    pub(crate) fn new_variable(
        &mut self,
        polarity_hint: bool,
        decidable: bool,
        name: Option<String>,
    ) -> PropositionalVariable {
        let variable = self.assignments.grow();
        self.clausal_propagator.grow();
        self.theory_watch_list.grow();
        let _ = self.variable_flags.push(VariableFlags {
            polarity_hint,
            decidable,
        });
        if let Some(name) = name {
            self.variable_names.add(variable, name);
        }
        variable
    }

    pub(crate) fn num_propositional_variables(&self) -> u32 {
        self.assignments.num_propositional_variables()
    }

    pub(crate) fn get_variable_name(&self, variable: PropositionalVariable) -> Option<&str> {
        self.variable_names.get_name(variable)
    }

    pub(crate) fn default_brancher(&self) -> VsidsBrancher {
        let mut brancher = VsidsBrancher::new(
            self.internal_parameters.variable_activity_decay,
            self.internal_parameters.random_decision_frequency,
        );
        brancher.grow(self.num_propositional_variables());
        brancher
    }

    /// Register the theory modules. Must be called before solving; the
    /// aggregate module is always present, the others only when the problem
    /// uses them.
    pub(crate) fn register_modules(
        &mut self,
        definitions: Option<DefinitionPropagator>,
        finite_domain: Option<FiniteDomainPropagator>,
    ) {
        let mut order = Vec::new();
        if finite_domain.is_some() {
            order.push(ModuleId::FiniteDomain);
        }
        order.push(ModuleId::Aggregates);
        if definitions.is_some() {
            order.push(ModuleId::Definitions);
        }
        self.modules.definitions = definitions;
        self.modules.finite_domain = finite_domain;
        self.modules.registration_order = order;
        self.module_trail_positions = vec![0; self.modules.registration_order.len()];
    }

    /// Subscribe a module to the given trail literals.
    pub(crate) fn watch_trail_literals(&mut self, module: ModuleId, literals: &[Literal]) {
        for &literal in literals {
            self.theory_watch_list.register(
                literal,
                crate::engine::propagation::BooleanDomainEvent::AssignedTrue.into(),
                module,
            );
        }
    }

    /// Add a problem clause. Only valid at the root level.
    pub(crate) fn add_clause(
        &mut self,
        literals: Vec<Literal>,
    ) -> Result<(), ConstraintOperationError> {
        korat_assert_moderate!(!self.state.is_infeasible_under_assumptions());

        if self.state.is_infeasible() {
            return Err(ConstraintOperationError::InfeasibleState);
        }

        let result = self.clausal_propagator.add_permanent_clause(
            literals,
            &mut self.assignments,
            &mut self.clause_allocator,
        );

        if result.is_err() {
            self.state.declare_infeasible();
            return Err(ConstraintOperationError::InfeasibleClause);
        }

        self.propagate_enqueued();

        if self.state.conflicting() {
            self.state.declare_infeasible();
            return Err(ConstraintOperationError::InfeasibleClause);
        }

        Ok(())
    }

    /// Evaluate every aggregate against the root assignment. Returns false
    /// (and declares infeasibility) when this already yields a conflict.
    pub(crate) fn initialise_aggregates_at_root(&mut self) -> bool {
        let SatisfactionSolver {
            assignments,
            clausal_propagator,
            clause_allocator,
            learned_clause_manager,
            reason_store,
            theory_watch_list,
            variable_flags,
            modules,
            ..
        } = self;
        let mut context = TheoryContext::new(
            assignments,
            reason_store,
            clause_allocator,
            clausal_propagator,
            learned_clause_manager,
            theory_watch_list,
            variable_flags,
            None,
            ModuleId::Aggregates,
        );
        if modules.aggregates.initialise_at_root(&mut context).is_err() {
            self.state.declare_infeasible();
            return false;
        }
        self.propagate_enqueued();
        if self.state.conflicting() {
            self.state.declare_infeasible();
            return false;
        }
        true
    }

    /// Initialise the definition module: completion clauses, dependency
    /// analysis and the justification bootstrap. Returns false (and declares
    /// infeasibility) on a root conflict.
    pub(crate) fn initialise_definitions_at_root(&mut self) -> bool {
        let SatisfactionSolver {
            assignments,
            clausal_propagator,
            clause_allocator,
            learned_clause_manager,
            reason_store,
            theory_watch_list,
            variable_flags,
            modules,
            ..
        } = self;
        let TheoryModules {
            aggregates,
            definitions,
            ..
        } = modules;
        let definitions = match definitions.as_mut() {
            Some(definitions) => definitions,
            None => return true,
        };
        let mut context = TheoryContext::new(
            assignments,
            reason_store,
            clause_allocator,
            clausal_propagator,
            learned_clause_manager,
            theory_watch_list,
            variable_flags,
            Some(aggregates),
            ModuleId::Definitions,
        );
        if definitions.initialise(&mut context).is_err() {
            self.state.declare_infeasible();
            return false;
        }
        self.propagate_enqueued();
        if self.state.conflicting() {
            self.state.declare_infeasible();
            return false;
        }
        true
    }

    pub(crate) fn solve(
        &mut self,
        termination: &mut dyn TerminationCondition,
        brancher: &mut dyn Brancher,
    ) -> SolverExecutionFlag {
        self.solve_under_assumptions(&[], termination, brancher)
    }

    pub(crate) fn solve_under_assumptions(
        &mut self,
        assumptions: &[Literal],
        termination: &mut dyn TerminationCondition,
        brancher: &mut dyn Brancher,
    ) -> SolverExecutionFlag {
        if self.state.is_infeasible() {
            return SolverExecutionFlag::Infeasible;
        }

        let start_time = Instant::now();
        self.state.declare_solving();
        assumptions.clone_into(&mut self.assumptions);
        brancher.grow(self.num_propositional_variables());

        let result = self.solve_internal(termination, brancher);

        self.counters.time_spent_in_solver += start_time.elapsed().as_millis() as u64;
        result
    }

    fn solve_internal(
        &mut self,
        termination: &mut dyn TerminationCondition,
        brancher: &mut dyn Brancher,
    ) -> SolverExecutionFlag {
        loop {
            if termination.should_stop() {
                self.state.declare_timeout();
                return SolverExecutionFlag::Timeout;
            }

            // a total-assignment check may already have left a conflict
            if !self.state.conflicting() {
                self.propagate_enqueued();
            }

            if self.state.conflicting() {
                self.restart_strategy.notify_conflict();

                if self.get_decision_level() == 0 {
                    self.state.declare_infeasible();
                    return SolverExecutionFlag::Infeasible;
                }

                self.resolve_conflict(brancher);
                if self.state.is_infeasible() {
                    return SolverExecutionFlag::Infeasible;
                }

                brancher.on_conflict();
                self.learned_clause_manager.decay_clause_activities();

                if self.learned_clause_manager.should_reduce() {
                    self.learned_clause_manager.reduce(
                        &mut self.clause_allocator,
                        &mut self.clausal_propagator,
                        &self.assignments,
                    );
                    self.try_garbage_collect();
                }
                if self.exceeded_clause_capacity() {
                    self.restore_state_at_root(brancher);
                    return SolverExecutionFlag::ResourceLimit;
                }
                continue;
            }

            if self.restart_strategy.should_restart() && self.get_decision_level() > 0 {
                self.backtrack(0, brancher);
                self.restart_strategy.notify_restart();
                self.counters.num_restarts += 1;
                continue;
            }

            match self.next_decision(brancher) {
                NextDecision::Assumption(literal) => {
                    if !self.enqueue_assumption_literal(literal) {
                        return SolverExecutionFlag::Infeasible;
                    }
                }
                NextDecision::Decision(literal) => {
                    self.counters.num_decisions += 1;
                    self.declare_new_decision_level();
                    self.assignments.enqueue_decision_literal(literal);
                }
                NextDecision::AllAssigned => {
                    if self.run_total_assignment_checks() {
                        continue;
                    }
                    self.state.declare_solution_found();
                    return SolverExecutionFlag::Feasible;
                }
            }
        }
    }

    fn next_decision(&mut self, brancher: &mut dyn Brancher) -> NextDecision {
        // by convention the i-th assumption is decided at level i + 1
        if self.get_decision_level() < self.assumptions.len() {
            return NextDecision::Assumption(self.assumptions[self.get_decision_level()]);
        }
        let mut context = SelectionContext::new(
            &self.assignments,
            &self.variable_flags,
            &mut self.internal_parameters.random_generator,
        );
        match brancher.next_decision(&mut context) {
            Some(literal) => NextDecision::Decision(literal),
            None => NextDecision::AllAssigned,
        }
    }

    /// Returns false when the assumption is in conflict with the current
    /// assignment, in which case the solver is left in the
    /// infeasible-under-assumptions state for core extraction.
    fn enqueue_assumption_literal(&mut self, assumption_literal: Literal) -> bool {
        if self.assignments.is_literal_unassigned(assumption_literal) {
            self.declare_new_decision_level();
            self.assignments
                .enqueue_decision_literal(assumption_literal);
            true
        } else if self
            .assignments
            .is_literal_assigned_true(assumption_literal)
        {
            // already propagated by earlier assumptions; the level is still
            // increased to keep the assumption-to-level convention
            self.declare_new_decision_level();
            true
        } else {
            self.state
                .declare_infeasible_under_assumptions(assumption_literal);
            false
        }
    }

    pub(crate) fn declare_new_decision_level(&mut self) {
        self.assignments.increase_decision_level();
        self.reason_store.increase_decision_level();
        self.modules.notify_new_decision_level();
    }

    pub(crate) fn get_decision_level(&self) -> usize {
        self.assignments.get_decision_level()
    }

    pub(crate) fn backtrack(&mut self, backtrack_level: usize, brancher: &mut dyn Brancher) {
        korat_assert_simple!(backtrack_level < self.get_decision_level());

        let unassigned_literals = self.assignments.synchronise(backtrack_level);
        for literal in unassigned_literals {
            brancher.on_unassign_literal(literal);
        }

        self.clausal_propagator
            .synchronise(self.assignments.num_trail_entries());
        for position in self.module_trail_positions.iter_mut() {
            *position = min(*position, self.assignments.num_trail_entries());
        }
        self.reason_store.synchronise(backtrack_level);
        // modules release their antecedents above the level before returning
        self.modules.notify_backtrack(backtrack_level);
    }

    pub(crate) fn restore_state_at_root(&mut self, brancher: &mut dyn Brancher) {
        if self.get_decision_level() > 0 {
            self.backtrack(0, brancher);
        }
        if !self.state.is_infeasible() {
            self.state.declare_ready();
        }
    }

    /// Main propagation loop: clausal fixpoint, incremental theory
    /// notifications in trail order, then fixpoint polls in priority order;
    /// any theory propagation restarts the loop at the clausal propagator.
    pub(crate) fn propagate_enqueued(&mut self) {
        let num_trail_entries_old = self.assignments.num_trail_entries();

        loop {
            if let Err(conflict_info) = self
                .clausal_propagator
                .propagate(&mut self.assignments, &mut self.clause_allocator)
            {
                self.state.declare_conflict(conflict_info);
                break;
            }

            match self.notify_theory_propagators() {
                Err(conflict_info) => {
                    self.state.declare_conflict(conflict_info);
                    break;
                }
                Ok(true) => continue,
                Ok(false) => {}
            }

            match self.poll_theory_fixpoints() {
                Err(conflict_info) => {
                    self.state.declare_conflict(conflict_info);
                    break;
                }
                Ok(true) => continue,
                Ok(false) => break,
            }
        }

        self.counters.num_conflicts += self.state.conflicting() as u64;
        self.counters.num_propagations +=
            (self.assignments.num_trail_entries() - num_trail_entries_old) as u64;

        korat_assert_extreme!(
            self.state.conflicting()
                || self
                    .clausal_propagator
                    .debug_check_watch_invariant(&self.assignments, &self.clause_allocator)
        );
    }

    /// Deliver fresh trail entries to the modules watching them. Returns
    /// whether any module enqueued a propagation.
    fn notify_theory_propagators(&mut self) -> Result<bool, ConflictInfo> {
        if !self.theory_watch_list.is_watching_anything() {
            for position in self.module_trail_positions.iter_mut() {
                *position = self.assignments.num_trail_entries();
            }
            return Ok(false);
        }

        let trail_size_before = self.assignments.num_trail_entries();
        for index in 0..self.modules.registration_order.len() {
            let module = self.modules.registration_order[index];
            while self.module_trail_positions[index] < self.assignments.num_trail_entries() {
                let position = self.module_trail_positions[index];
                let literal = self.assignments.get_trail_entry(position);
                self.module_trail_positions[index] = position + 1;
                if !self.theory_watch_list.is_watching(literal, module) {
                    continue;
                }
                self.dispatch(module, ModuleAction::Propagate(literal))?;
            }
        }
        Ok(self.assignments.num_trail_entries() > trail_size_before)
    }

    /// Poll each module's fixpoint routine in priority order; stop at the
    /// first one that propagates so the clausal propagator goes next.
    fn poll_theory_fixpoints(&mut self) -> Result<bool, ConflictInfo> {
        for index in 0..self.modules.registration_order.len() {
            let module = self.modules.registration_order[index];
            let trail_size_before = self.assignments.num_trail_entries();
            self.dispatch(module, ModuleAction::Fixpoint)?;
            if self.assignments.num_trail_entries() > trail_size_before {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Give each module a chance to act on the total assignment (lazy
    /// unfounded-set checks, integer labelling). Returns true when search
    /// must continue (a propagation or conflict happened).
    fn run_total_assignment_checks(&mut self) -> bool {
        for index in 0..self.modules.registration_order.len() {
            let module = self.modules.registration_order[index];
            let trail_size_before = self.assignments.num_trail_entries();
            match self.dispatch(module, ModuleAction::TotalAssignment) {
                Err(conflict_info) => {
                    self.state.declare_conflict(conflict_info);
                    return true;
                }
                Ok(()) => {
                    if self.assignments.num_trail_entries() > trail_size_before {
                        return true;
                    }
                }
            }
        }
        false
    }

    fn dispatch(&mut self, module: ModuleId, action: ModuleAction) -> PropagationStatus {
        let SatisfactionSolver {
            assignments,
            clausal_propagator,
            clause_allocator,
            learned_clause_manager,
            reason_store,
            theory_watch_list,
            variable_flags,
            modules,
            ..
        } = self;
        let TheoryModules {
            aggregates,
            definitions,
            finite_domain,
            ..
        } = modules;

        match module {
            ModuleId::Aggregates => {
                let mut context = TheoryContext::new(
                    assignments,
                    reason_store,
                    clause_allocator,
                    clausal_propagator,
                    learned_clause_manager,
                    theory_watch_list,
                    variable_flags,
                    None,
                    ModuleId::Aggregates,
                );
                match action {
                    ModuleAction::Propagate(literal) => aggregates.propagate(&mut context, literal),
                    ModuleAction::Fixpoint => aggregates.propagate_fixpoint(&mut context),
                    ModuleAction::TotalAssignment => {
                        aggregates.propagate_total_assignment(&mut context)
                    }
                }
            }
            ModuleId::Definitions => {
                let definitions = definitions
                    .as_mut()
                    .expect("dispatch only targets registered modules");
                let mut context = TheoryContext::new(
                    assignments,
                    reason_store,
                    clause_allocator,
                    clausal_propagator,
                    learned_clause_manager,
                    theory_watch_list,
                    variable_flags,
                    Some(aggregates),
                    ModuleId::Definitions,
                );
                match action {
                    ModuleAction::Propagate(literal) => {
                        definitions.propagate(&mut context, literal)
                    }
                    ModuleAction::Fixpoint => definitions.propagate_fixpoint(&mut context),
                    ModuleAction::TotalAssignment => {
                        definitions.propagate_total_assignment(&mut context)
                    }
                }
            }
            ModuleId::FiniteDomain => {
                let finite_domain = finite_domain
                    .as_mut()
                    .expect("dispatch only targets registered modules");
                let mut context = TheoryContext::new(
                    assignments,
                    reason_store,
                    clause_allocator,
                    clausal_propagator,
                    learned_clause_manager,
                    theory_watch_list,
                    variable_flags,
                    None,
                    ModuleId::FiniteDomain,
                );
                match action {
                    ModuleAction::Propagate(literal) => {
                        finite_domain.propagate(&mut context, literal)
                    }
                    ModuleAction::Fixpoint => finite_domain.propagate_fixpoint(&mut context),
                    ModuleAction::TotalAssignment => {
                        finite_domain.propagate_total_assignment(&mut context)
                    }
                }
            }
        }
    }

    /// Analyse the stored conflict, learn a clause, backjump and attach it.
    fn resolve_conflict(&mut self, brancher: &mut dyn Brancher) {
        korat_assert_moderate!(self.state.conflicting());
        let conflict = self.state.take_conflict_info();

        // Materialise the conflict into a clause of falsified literals up
        // front: a backjump below the current level would invalidate theory
        // reason references.
        let conflict = match conflict {
            ConflictInfo::Explanation { clause } => ConflictInfo::Explanation { clause },
            ConflictInfo::Propagation { literal, reference } => {
                let clause: Vec<Literal> = if reference.is_clause() {
                    self.learned_clause_manager.bump_clause_activity(
                        reference.as_clause_reference(),
                        &mut self.clause_allocator,
                    );
                    self.clause_allocator[reference.as_clause_reference()]
                        .get_literal_slice()
                        .to_vec()
                } else {
                    let (module, payload) = self.reason_store.get(reference.get_reason_ref());
                    self.modules
                        .explain(module, &self.assignments, literal, payload)
                };
                ConflictInfo::Explanation { clause }
            }
        };

        // the conflict clause may live entirely below the current level;
        // back up to where it became falsified first
        let conflict_level = match &conflict {
            ConflictInfo::Explanation { clause } => clause
                .iter()
                .map(|&literal| self.assignments.get_literal_assignment_level(literal))
                .max()
                .unwrap_or(0),
            ConflictInfo::Propagation { .. } => unreachable!("materialised above"),
        };
        if conflict_level == 0 {
            self.state.declare_infeasible();
            return;
        }
        if conflict_level < self.get_decision_level() {
            self.backtrack(conflict_level, brancher);
        }

        let analysis_result = {
            let SatisfactionSolver {
                assignments,
                clause_allocator,
                explanation_clause_manager,
                reason_store,
                modules,
                learned_clause_manager,
                clausal_propagator,
                assumptions,
                counters,
                conflict_analyser,
                ..
            } = self;
            let mut context = ConflictAnalysisContext {
                assignments,
                clause_allocator,
                explanation_clause_manager,
                reason_store,
                modules,
                learned_clause_manager,
                clausal_propagator,
                assumptions,
                conflict: &conflict,
                counters,
                brancher,
            };
            conflict_analyser.compute_1uip(&mut context)
        };

        self.counters
            .average_conflict_size
            .add_term(analysis_result.learned_literals.len() as u64);
        self.counters.average_backtrack_amount.add_term(
            (self.get_decision_level() - analysis_result.backjump_level) as u64,
        );

        if analysis_result.learned_literals.len() == 1 {
            // unit learned clauses become root assignments
            self.backtrack(0, brancher);
            let asserting_literal = analysis_result.learned_literals[0];
            self.counters.num_unit_clauses_learned += 1;
            if self
                .assignments
                .enqueue_propagated_literal(asserting_literal, ConstraintReference::NULL)
                .is_some()
            {
                self.state.declare_infeasible();
                return;
            }
        } else {
            self.backtrack(analysis_result.backjump_level, brancher);
            let reference = self.clausal_propagator.add_asserting_learned_clause(
                analysis_result.learned_literals,
                &mut self.assignments,
                &mut self.clause_allocator,
            );
            self.clause_allocator[reference].update_lbd(analysis_result.lbd);
            self.learned_clause_manager.add_learned_clause(reference);
        }

        self.state.declare_solving();
    }

    /// Extract an unsat core after `solve_under_assumptions` reported
    /// infeasibility under the given assumptions.
    pub(crate) fn extract_core(
        &mut self,
        brancher: &mut dyn Brancher,
    ) -> Result<Vec<Literal>, Literal> {
        korat_assert_simple!(self.state.is_infeasible_under_assumptions());
        let violated_assumption = self.state.get_violated_assumption();
        let dummy_conflict = ConflictInfo::Explanation { clause: vec![] };

        let SatisfactionSolver {
            assignments,
            clause_allocator,
            explanation_clause_manager,
            reason_store,
            modules,
            learned_clause_manager,
            clausal_propagator,
            assumptions,
            counters,
            conflict_analyser,
            ..
        } = self;
        let mut context = ConflictAnalysisContext {
            assignments,
            clause_allocator,
            explanation_clause_manager,
            reason_store,
            modules,
            learned_clause_manager,
            clausal_propagator,
            assumptions,
            conflict: &dummy_conflict,
            counters,
            brancher,
        };
        conflict_analyser.compute_clausal_core(&mut context, violated_assumption)
    }

    fn exceeded_clause_capacity(&self) -> bool {
        self.internal_parameters
            .clause_database_capacity
            .map(|capacity| self.clause_allocator.num_live_clauses() > capacity)
            .unwrap_or(false)
    }

    /// Relocate the clause arena when enough of it is deleted clauses, and
    /// rewrite every outstanding reference: the watch index, the variable
    /// antecedents, and all module-held references.
    fn try_garbage_collect(&mut self) {
        if self.clause_allocator.waste_fraction() <= self.internal_parameters.arena_waste_fraction
        {
            return;
        }
        korat_assert_simple!(self.explanation_clause_manager.is_empty());
        let map = self.clause_allocator.relocate();
        self.clausal_propagator.relocate(&map);
        self.assignments.relocate(&map);
        self.learned_clause_manager.relocate(&map);
        self.modules.relocate(&map);
        self.counters.num_garbage_collections += 1;
    }

    pub(crate) fn get_literal_value(&self, literal: Literal) -> Option<bool> {
        if self.assignments.is_literal_assigned(literal) {
            Some(self.assignments.is_literal_assigned_true(literal))
        } else {
            None
        }
    }

    pub(crate) fn log_statistics(&self) {
        self.counters.log_statistics();
        self.learned_clause_manager.log_statistics();
        log_statistic("numberOfRestarts", self.restart_strategy.num_restarts());
    }
}

enum NextDecision {
    Assumption(Literal),
    Decision(Literal),
    AllAssigned,
}

#[derive(Default, Debug, Copy, Clone)]
pub(crate) struct CumulativeMovingAverage {
    sum: u64,
    num_terms: u64,
}

impl CumulativeMovingAverage {
    pub(crate) fn add_term(&mut self, new_term: u64) {
        self.sum += new_term;
        self.num_terms += 1
    }

    pub(crate) fn value(&self) -> f64 {
        if self.num_terms > 0 {
            (self.sum as f64) / (self.num_terms as f64)
        } else {
            0.0
        }
    }
}

/// Counters updated during the search.
#[derive(Default, Debug, Copy, Clone)]
pub(crate) struct Counters {
    pub(crate) num_decisions: u64,
    pub(crate) num_conflicts: u64,
    pub(crate) num_restarts: u64,
    pub(crate) num_propagations: u64,
    pub(crate) num_unit_clauses_learned: u64,
    pub(crate) num_garbage_collections: u64,
    pub(crate) average_conflict_size: CumulativeMovingAverage,
    pub(crate) average_learned_clause_length: CumulativeMovingAverage,
    pub(crate) average_backtrack_amount: CumulativeMovingAverage,
    pub(crate) time_spent_in_solver: u64,
}

impl Counters {
    fn log_statistics(&self) {
        log_statistic("numberOfDecisions", self.num_decisions);
        log_statistic("numberOfConflicts", self.num_conflicts);
        log_statistic("numberOfPropagations", self.num_propagations);
        log_statistic("numberOfLearnedUnitClauses", self.num_unit_clauses_learned);
        log_statistic("numberOfGarbageCollections", self.num_garbage_collections);
        log_statistic(
            "averageSizeOfConflictExplanation",
            self.average_conflict_size.value(),
        );
        log_statistic(
            "averageLearnedClauseLength",
            self.average_learned_clause_length.value(),
        );
        log_statistic(
            "averageBacktrackAmount",
            self.average_backtrack_amount.value(),
        );
        log_statistic("timeSpentInSolverInMilliseconds", self.time_spent_in_solver);
    }
}

#[derive(Default, Debug)]
enum SolverStateInternal {
    #[default]
    Ready,
    Solving,
    ContainsSolution,
    Conflict {
        conflict_info: ConflictInfo,
    },
    Infeasible,
    InfeasibleUnderAssumptions {
        violated_assumption: Literal,
    },
    Timeout,
}

#[derive(Default, Debug)]
pub(crate) struct SolverState {
    internal_state: SolverStateInternal,
}

impl SolverState {
    #[allow(unused)]
    pub(crate) fn is_ready(&self) -> bool {
        matches!(self.internal_state, SolverStateInternal::Ready)
    }

    pub(crate) fn conflicting(&self) -> bool {
        matches!(
            self.internal_state,
            SolverStateInternal::Conflict { conflict_info: _ }
        )
    }

    pub(crate) fn is_infeasible(&self) -> bool {
        matches!(self.internal_state, SolverStateInternal::Infeasible)
    }

    pub(crate) fn is_infeasible_under_assumptions(&self) -> bool {
        matches!(
            self.internal_state,
            SolverStateInternal::InfeasibleUnderAssumptions {
                violated_assumption: _
            }
        )
    }

    #[allow(unused)]
    pub(crate) fn has_solution(&self) -> bool {
        matches!(self.internal_state, SolverStateInternal::ContainsSolution)
    }

    pub(crate) fn get_violated_assumption(&self) -> Literal {
        if let SolverStateInternal::InfeasibleUnderAssumptions {
            violated_assumption,
        } = self.internal_state
        {
            violated_assumption
        } else {
            panic!("no violated assumption outside the infeasible-under-assumptions state");
        }
    }

    fn take_conflict_info(&mut self) -> ConflictInfo {
        match std::mem::replace(&mut self.internal_state, SolverStateInternal::Solving) {
            SolverStateInternal::Conflict { conflict_info } => conflict_info,
            _ => panic!("no conflict to take outside the conflicting state"),
        }
    }

    pub(crate) fn declare_ready(&mut self) {
        self.internal_state = SolverStateInternal::Ready;
    }

    pub(crate) fn declare_solving(&mut self) {
        korat_assert_simple!(!self.is_infeasible());
        self.internal_state = SolverStateInternal::Solving;
    }

    pub(crate) fn declare_infeasible(&mut self) {
        self.internal_state = SolverStateInternal::Infeasible;
    }

    pub(crate) fn declare_conflict(&mut self, conflict_info: ConflictInfo) {
        korat_assert_simple!(!self.conflicting());
        self.internal_state = SolverStateInternal::Conflict { conflict_info };
    }

    fn declare_solution_found(&mut self) {
        korat_assert_simple!(!self.is_infeasible());
        self.internal_state = SolverStateInternal::ContainsSolution;
    }

    fn declare_timeout(&mut self) {
        korat_assert_simple!(!self.is_infeasible());
        self.internal_state = SolverStateInternal::Timeout;
    }

    fn declare_infeasible_under_assumptions(&mut self, violated_assumption: Literal) {
        korat_assert_simple!(!self.is_infeasible());
        self.internal_state = SolverStateInternal::InfeasibleUnderAssumptions {
            violated_assumption,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::test_helper::TestSolver;

    #[test]
    fn unit_propagation_chains_through_clauses() {
        let mut test_solver = TestSolver::default();
        let literals = test_solver.new_literals(3);

        assert!(test_solver.add_clause(vec![!literals[0], literals[1]]));
        assert!(test_solver.add_clause(vec![!literals[1], literals[2]]));

        assert!(test_solver.decide(literals[0]));
        assert_eq!(test_solver.value(literals[1]), Some(true));
        assert_eq!(test_solver.value(literals[2]), Some(true));
    }

    #[test]
    fn backtracking_unassigns_only_the_levels_above_the_target() {
        let mut test_solver = TestSolver::default();
        let literals = test_solver.new_literals(3);

        assert!(test_solver.add_clause(vec![literals[0], literals[1]]));
        assert!(test_solver.decide(!literals[0]));
        let limit = test_solver.solver.assignments.get_decision_level_limit(1);

        test_solver.backtrack_to_root();
        assert_eq!(test_solver.solver.assignments.num_trail_entries(), limit);
        assert_eq!(test_solver.value(literals[0]), None);
        assert_eq!(test_solver.value(literals[1]), None);
    }

    #[test]
    fn conflicting_decisions_are_reported() {
        let mut test_solver = TestSolver::default();
        let literals = test_solver.new_literals(2);

        assert!(test_solver.add_clause(vec![!literals[0], literals[1]]));
        assert!(test_solver.add_clause(vec![!literals[0], !literals[1]]));

        assert!(!test_solver.decide(literals[0]));
    }
}
