//! Model enumeration and assumption handling: distinct models until
//! exhaustion, and unsat cores restricted to the assumptions.

use super::enumerate_models;
use crate::options::SolverOptions;
use crate::termination::Indefinite;
use crate::Model;
use crate::SatisfactionResultUnderAssumptions;

#[test]
fn enumeration_produces_distinct_models_until_exhaustion() {
    let mut model = Model::default();
    model.add_clause([1, 2]);

    let solutions = enumerate_models(model, &[]);
    assert_eq!(solutions.len(), 3);
    for (index, solution) in solutions.iter().enumerate() {
        for other in &solutions[index + 1..] {
            assert_ne!(solution, other);
        }
    }
}

#[test]
fn enumeration_respects_assumptions() {
    let mut model = Model::default();
    model.add_clause([1, 2, 3]);

    let solutions = enumerate_models(model, &[-3]);
    assert_eq!(solutions.len(), 3);
    assert!(solutions.iter().all(|solution| !solution.value(3)));
}

#[test]
fn unsat_core_is_restricted_to_the_assumptions() {
    let mut model = Model::default();
    model.add_clause([-1, 2]);

    let mut solver = model
        .into_solver(SolverOptions::default())
        .expect("well-formed model");
    let mut brancher = solver.default_brancher();
    let result = solver
        .satisfy_under_assumptions(&mut brancher, &mut Indefinite, &[1, -2])
        .expect("no resource limit configured");

    match result {
        SatisfactionResultUnderAssumptions::UnsatisfiableUnderAssumptions(mut unsatisfiable) => {
            let mut core = unsatisfiable.extract_core();
            core.sort_unstable();
            assert_eq!(core, vec![-2, 1]);
        }
        other => panic!("expected infeasibility under the assumptions, got {other:?}"),
    }
}

#[test]
fn complementary_assumptions_form_their_own_core() {
    let mut model = Model::default();
    model.add_clause([1, 2]);

    let mut solver = model
        .into_solver(SolverOptions::default())
        .expect("well-formed model");
    let mut brancher = solver.default_brancher();
    let result = solver
        .satisfy_under_assumptions(&mut brancher, &mut Indefinite, &[1, -1])
        .expect("no resource limit configured");

    match result {
        SatisfactionResultUnderAssumptions::UnsatisfiableUnderAssumptions(mut unsatisfiable) => {
            let mut core = unsatisfiable.extract_core();
            core.sort_unstable();
            assert_eq!(core, vec![-1, 1]);
        }
        other => panic!("expected infeasibility under the assumptions, got {other:?}"),
    }
}

#[test]
fn solver_is_reusable_after_core_extraction() {
    let mut model = Model::default();
    model.add_clause([-1, 2]);

    let mut solver = model
        .into_solver(SolverOptions::default())
        .expect("well-formed model");
    let mut brancher = solver.default_brancher();
    {
        let result = solver
            .satisfy_under_assumptions(&mut brancher, &mut Indefinite, &[1, -2])
            .expect("no resource limit configured");
        assert!(matches!(
            result,
            SatisfactionResultUnderAssumptions::UnsatisfiableUnderAssumptions(_)
        ));
    }

    // dropping the handle restored the root state; solving again succeeds
    let result = solver
        .satisfy(&mut brancher, &mut Indefinite)
        .expect("no resource limit configured");
    assert!(matches!(
        result,
        crate::results::SatisfactionResult::Satisfiable(_)
    ));
}
