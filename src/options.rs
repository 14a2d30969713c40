//! Solver configuration. Everything that influences search behaviour lives
//! in one struct threaded explicitly through the engine; there is no global
//! mutable state.

use rand::rngs::SmallRng;
use rand::SeedableRng;

/// The restart schedule of the SAT kernel.
#[derive(Clone, Copy, Debug)]
pub enum RestartSchedule {
    /// The Luby sequence scaled by `unit` conflicts.
    Luby { unit: u64 },
    /// `base * factor^k` conflicts before the `k`-th restart.
    Geometric { base: u64, factor: f64 },
}

/// When the definition module runs its unfounded-set search.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum UnfoundedCheckPolicy {
    /// At every propagation fixpoint.
    Always,
    /// Skip an adaptive number of fixpoints between searches: the interval
    /// doubles on empty runs and shrinks on hits.
    Adaptive,
    /// Only at total assignments. Sound under stable semantics only.
    Lazy,
}

/// The traversal order of the unfounded-set search.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum UnfoundedSearchStrategy {
    BreadthFirst,
    DepthFirst,
}

/// Options for the solver which determine how it behaves.
#[derive(Debug)]
pub struct SolverOptions {
    pub restart_schedule: RestartSchedule,
    /// Initial learned-clause limit before a database reduction triggers.
    pub learned_clause_limit: usize,
    /// Growth factor applied to the limit after every reduction.
    pub learned_clause_limit_growth: f32,
    /// Clause activities decay independently from variable activities.
    pub clause_activity_decay: f32,
    pub variable_activity_decay: f64,
    /// Fraction of decisions made on a random unassigned variable.
    pub random_decision_frequency: f64,
    /// Relocate the clause arena once this fraction of it is deleted
    /// clauses.
    pub arena_waste_fraction: f64,
    /// Hard cap on live clauses; exceeding it surfaces a resource error.
    pub clause_database_capacity: Option<usize>,
    pub unfounded_check_policy: UnfoundedCheckPolicy,
    pub unfounded_search_strategy: UnfoundedSearchStrategy,
    /// Loop formulas larger than this (unfounded atoms times external
    /// supports) are split through a fresh Tseitin atom.
    pub loop_formula_tseitin_threshold: usize,
    /// Cardinality and sum aggregates whose minimal bound witness covers at
    /// most this fraction of the set are watched partially.
    pub partial_watch_ratio: f64,
    /// A random generator used by the solver; passing it as an option allows
    /// seeding of the randomisation.
    pub random_generator: SmallRng,
}

impl Default for SolverOptions {
    fn default() -> Self {
        SolverOptions {
            restart_schedule: RestartSchedule::Luby { unit: 100 },
            learned_clause_limit: 2000,
            learned_clause_limit_growth: 1.5,
            clause_activity_decay: 0.999,
            variable_activity_decay: 0.95,
            random_decision_frequency: 0.02,
            arena_waste_fraction: 0.3,
            clause_database_capacity: None,
            unfounded_check_policy: UnfoundedCheckPolicy::Always,
            unfounded_search_strategy: UnfoundedSearchStrategy::BreadthFirst,
            loop_formula_tseitin_threshold: 16,
            partial_watch_ratio: 0.25,
            random_generator: SmallRng::seed_from_u64(42),
        }
    }
}
