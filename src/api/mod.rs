//! The user-facing solver handle.

pub(crate) mod outputs;

use crate::basic_types::ResourceError;
use crate::basic_types::Weight;
use crate::branching::Brancher;
use crate::branching::DefaultBrancher;
use crate::engine::variables::Literal;
use crate::engine::variables::PropositionalVariable;
use crate::engine::SatisfactionSolver;
use crate::engine::SolverExecutionFlag;
use crate::propagators::aggregates::WeightedLiteral;
use crate::results::SatisfactionResult;
use crate::results::Solution;
use crate::termination::TerminationCondition;
use self::outputs::SatisfactionResultUnderAssumptions;
use self::outputs::SolutionIterator;
use self::outputs::UnsatisfiableUnderAssumptions;

/// The solver over a finished problem. Obtained from
/// [`Model::into_solver`](crate::Model::into_solver).
#[derive(Debug)]
pub struct Solver {
    pub(crate) satisfaction_solver: SatisfactionSolver,
    /// Variables beyond this were introduced internally and are hidden from
    /// reported solutions.
    pub(crate) num_original_variables: u32,
    pub(crate) minimisation_aggregate: Option<usize>,
    pub(crate) minimisation_set: Option<Vec<WeightedLiteral>>,
}

impl Solver {
    pub(crate) fn new(
        satisfaction_solver: SatisfactionSolver,
        num_original_variables: u32,
        minimisation_aggregate: Option<usize>,
        minimisation_set: Option<Vec<WeightedLiteral>>,
    ) -> Self {
        Solver {
            satisfaction_solver,
            num_original_variables,
            minimisation_aggregate,
            minimisation_set,
        }
    }

    /// The default VSIDS brancher with phase saving.
    pub fn default_brancher(&self) -> DefaultBrancher {
        self.satisfaction_solver.default_brancher()
    }

    /// The name of a problem variable, if one was recorded.
    pub fn variable_name(&self, variable: u32) -> Option<&str> {
        self.satisfaction_solver
            .get_variable_name(PropositionalVariable::new(variable))
    }

    /// Translate a DIMACS-style literal into a solver literal.
    pub fn literal(&self, literal: i32) -> Literal {
        assert!(
            literal != 0 && literal.unsigned_abs() <= self.num_original_variables,
            "literal out of range"
        );
        Literal::new(
            PropositionalVariable::new(literal.unsigned_abs()),
            literal > 0,
        )
    }

    pub(crate) fn extract_solution(&self) -> Solution {
        let values = (1..=self.num_original_variables)
            .map(|index| {
                let literal = Literal::new(PropositionalVariable::new(index), true);
                self.satisfaction_solver
                    .get_literal_value(literal)
                    .expect("total assignment over the original variables")
            })
            .collect();
        let integer_values = match self.satisfaction_solver.modules.finite_domain.as_ref() {
            Some(finite_domain) => (0..finite_domain.num_integer_variables())
                .map(|variable| finite_domain.value_of(variable))
                .collect(),
            None => Vec::new(),
        };
        Solution::new(values, integer_values)
    }

    /// Decide satisfiability of the problem.
    pub fn satisfy(
        &mut self,
        brancher: &mut impl Brancher,
        termination: &mut impl TerminationCondition,
    ) -> Result<SatisfactionResult, ResourceError> {
        match self
            .satisfaction_solver
            .solve(termination, brancher)
        {
            SolverExecutionFlag::Feasible => {
                let solution = self.extract_solution();
                self.satisfaction_solver.restore_state_at_root(brancher);
                Ok(SatisfactionResult::Satisfiable(solution))
            }
            SolverExecutionFlag::Infeasible => Ok(SatisfactionResult::Unsatisfiable),
            SolverExecutionFlag::Timeout => {
                self.satisfaction_solver.restore_state_at_root(brancher);
                Ok(SatisfactionResult::Unknown)
            }
            SolverExecutionFlag::ResourceLimit => Err(self.resource_error()),
        }
    }

    /// Decide satisfiability under the given assumptions. An unsatisfiable
    /// outcome carries a handle from which the core over the assumptions can
    /// be extracted.
    pub fn satisfy_under_assumptions<'this, 'brancher, B: Brancher>(
        &'this mut self,
        brancher: &'brancher mut B,
        termination: &mut impl TerminationCondition,
        assumptions: &[i32],
    ) -> Result<SatisfactionResultUnderAssumptions<'this, 'brancher, B>, ResourceError> {
        let assumption_literals: Vec<Literal> = assumptions
            .iter()
            .map(|&literal| self.literal(literal))
            .collect();
        match self.satisfaction_solver.solve_under_assumptions(
            &assumption_literals,
            termination,
            brancher,
        ) {
            SolverExecutionFlag::Feasible => {
                let solution = self.extract_solution();
                self.satisfaction_solver.restore_state_at_root(brancher);
                Ok(SatisfactionResultUnderAssumptions::Satisfiable(solution))
            }
            SolverExecutionFlag::Infeasible => {
                if self
                    .satisfaction_solver
                    .state
                    .is_infeasible_under_assumptions()
                {
                    Ok(
                        SatisfactionResultUnderAssumptions::UnsatisfiableUnderAssumptions(
                            UnsatisfiableUnderAssumptions::new(
                                &mut self.satisfaction_solver,
                                brancher,
                            ),
                        ),
                    )
                } else {
                    Ok(SatisfactionResultUnderAssumptions::Unsatisfiable)
                }
            }
            SolverExecutionFlag::Timeout => {
                self.satisfaction_solver.restore_state_at_root(brancher);
                Ok(SatisfactionResultUnderAssumptions::Unknown)
            }
            SolverExecutionFlag::ResourceLimit => Err(self.resource_error()),
        }
    }

    /// Enumerate the solutions of the problem (optionally under
    /// assumptions), each a distinct assignment over the original variables.
    pub fn solution_iterator<'this, 'brancher, 'termination, B, T>(
        &'this mut self,
        brancher: &'brancher mut B,
        termination: &'termination mut T,
        assumptions: &[i32],
    ) -> SolutionIterator<'this, 'brancher, 'termination, B, T>
    where
        B: Brancher,
        T: TerminationCondition,
    {
        let assumption_literals: Vec<Literal> = assumptions
            .iter()
            .map(|&literal| self.literal(literal))
            .collect();
        SolutionIterator::new(self, brancher, termination, assumption_literals)
    }

    /// Block the given solution: some original variable must differ.
    pub(crate) fn add_blocking_clause(&mut self, solution: &Solution) -> bool {
        let blocking: Vec<Literal> = (1..=self.num_original_variables)
            .map(|index| {
                let variable = PropositionalVariable::new(index);
                Literal::new(variable, !solution.value(index))
            })
            .collect();
        if blocking.is_empty() {
            return false;
        }
        self.satisfaction_solver.add_clause(blocking).is_ok()
    }

    pub(crate) fn resource_error(&self) -> ResourceError {
        ResourceError {
            capacity: self
                .satisfaction_solver
                .internal_parameters
                .clause_database_capacity
                .unwrap_or(0),
        }
    }

    pub(crate) fn objective_value(&self, solution: &Solution) -> Weight {
        let set = self
            .minimisation_set
            .as_ref()
            .expect("an objective was declared");
        set.iter()
            .filter(|wlit| {
                let variable = wlit.literal.get_propositional_variable().get_index();
                solution.value(variable) == wlit.literal.is_positive()
            })
            .map(|wlit| wlit.weight)
            .sum()
    }

    pub fn log_statistics(&self) {
        self.satisfaction_solver.log_statistics();
    }
}
