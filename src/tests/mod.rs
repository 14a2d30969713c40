//! Integration-style tests driving the full solver through the model API.

mod aggregates;
mod definitions;
mod dump;
mod enumeration;
mod scenarios;

use crate::options::SolverOptions;
use crate::results::IteratedSolution;
use crate::results::SatisfactionResult;
use crate::results::Solution;
use crate::termination::Indefinite;
use crate::Model;

pub(crate) fn solve(model: Model) -> SatisfactionResult {
    let mut solver = model
        .into_solver(SolverOptions::default())
        .expect("well-formed model");
    let mut brancher = solver.default_brancher();
    solver
        .satisfy(&mut brancher, &mut Indefinite)
        .expect("no resource limit configured")
}

pub(crate) fn expect_model(model: Model) -> Solution {
    match solve(model) {
        SatisfactionResult::Satisfiable(solution) => solution,
        other => panic!("expected a model, got {other:?}"),
    }
}

pub(crate) fn expect_unsatisfiable(model: Model) {
    match solve(model) {
        SatisfactionResult::Unsatisfiable => {}
        other => panic!("expected unsatisfiable, got {other:?}"),
    }
}

pub(crate) fn enumerate_models(model: Model, assumptions: &[i32]) -> Vec<Solution> {
    let mut solver = model
        .into_solver(SolverOptions::default())
        .expect("well-formed model");
    let mut brancher = solver.default_brancher();
    let mut termination = Indefinite;
    let mut iterator = solver.solution_iterator(&mut brancher, &mut termination, assumptions);

    let mut solutions = Vec::new();
    loop {
        match iterator.next_solution() {
            IteratedSolution::Solution(solution) => solutions.push(solution),
            IteratedSolution::Finished => return solutions,
            IteratedSolution::Unknown => panic!("enumeration did not finish"),
        }
    }
}
