//! The results returned by the solving drivers.

use crate::model::IntVariable;

/// A total assignment over the original problem variables. Internal
/// auxiliaries (Tseitin atoms introduced by loop formulas) are hidden.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Solution {
    values: Vec<bool>,
    integer_values: Vec<i64>,
}

impl Solution {
    pub(crate) fn new(values: Vec<bool>, integer_values: Vec<i64>) -> Self {
        Solution {
            values,
            integer_values,
        }
    }

    pub fn num_variables(&self) -> u32 {
        self.values.len() as u32
    }

    /// The truth value of a (1-based) problem variable.
    pub fn value(&self, variable: u32) -> bool {
        self.values[variable as usize - 1]
    }

    /// Whether the given DIMACS-style literal holds in the solution.
    pub fn literal_holds(&self, literal: i32) -> bool {
        self.value(literal.unsigned_abs()) == (literal > 0)
    }

    pub fn integer_value(&self, variable: IntVariable) -> i64 {
        self.integer_values[variable.0 as usize]
    }
}

/// The result of a satisfaction call.
#[derive(Debug, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum SatisfactionResult {
    Satisfiable(Solution),
    Unsatisfiable,
    Unknown,
}

/// The result of an optimisation call.
#[derive(Debug, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum OptimisationResult {
    /// The best solution found, proven optimal.
    Optimal(Solution),
    /// A solution was found but the search ended before proving optimality.
    Satisfiable(Solution),
    Unsatisfiable,
    Unknown,
}

/// One step of model enumeration.
#[derive(Debug, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum IteratedSolution {
    Solution(Solution),
    /// All solutions have been enumerated.
    Finished,
    /// The search ended before the enumeration completed.
    Unknown,
}
