//! Propagation behaviour of each aggregate kind and sign, the two watching
//! disciplines, and the optimisation drivers built on aggregate bounds.

use super::enumerate_models;
use crate::options::SolverOptions;
use crate::results::OptimisationResult;
use crate::termination::Indefinite;
use crate::AggregateKind;
use crate::AggregateSemantics;
use crate::AggregateSign;
use crate::Model;
use crate::ModelAggregate;

fn aggregate_model(
    set: Vec<(i32, i64)>,
    head: u32,
    kind: AggregateKind,
    sign: AggregateSign,
    bound: i64,
) -> Model {
    let mut model = Model::default();
    model.add_weighted_set(0, set);
    model.add_aggregate(ModelAggregate {
        head,
        kind,
        sign,
        bound,
        semantics: AggregateSemantics::Completion,
        set_id: 0,
        definition_id: None,
    });
    model
}

#[test]
fn sum_upper_bound_forces_heavy_literals_out() {
    // head <-> 3*l1 + 4*l2 <= 5
    let model = aggregate_model(
        vec![(1, 3), (2, 4)],
        3,
        AggregateKind::Sum,
        AggregateSign::UpperBound,
        5,
    );

    let with_head = enumerate_models(model.clone(), &[3]);
    assert_eq!(with_head.len(), 3);
    assert!(with_head
        .iter()
        .all(|solution| !(solution.value(1) && solution.value(2))));

    let without_head = enumerate_models(model, &[-3]);
    assert_eq!(without_head.len(), 1);
    assert!(without_head[0].value(1) && without_head[0].value(2));
}

#[test]
fn sum_boundary_is_strict_after_folding_the_certain_bound() {
    // head <-> 3*l1 + 3*l2 <= 6: both may be true exactly at the bound
    let model = aggregate_model(
        vec![(1, 3), (2, 3)],
        3,
        AggregateKind::Sum,
        AggregateSign::UpperBound,
        6,
    );
    let with_head = enumerate_models(model.clone(), &[3]);
    assert_eq!(with_head.len(), 4);

    let without_head = enumerate_models(model, &[-3]);
    assert!(without_head.is_empty());
}

#[test]
fn cardinality_lower_bound_counts_models() {
    // head <-> at least two of three
    let model = aggregate_model(
        vec![(1, 1), (2, 1), (3, 1)],
        4,
        AggregateKind::Cardinality,
        AggregateSign::LowerBound,
        2,
    );

    assert_eq!(enumerate_models(model.clone(), &[4]).len(), 4);
    assert_eq!(enumerate_models(model, &[-4]).len(), 4);
}

#[test]
fn product_lower_bound_requires_all_factors() {
    // head <-> 3*l1 * 4*l2 >= 12 (empty product is 1)
    let model = aggregate_model(
        vec![(1, 3), (2, 4)],
        3,
        AggregateKind::Product,
        AggregateSign::LowerBound,
        12,
    );

    let with_head = enumerate_models(model.clone(), &[3]);
    assert_eq!(with_head.len(), 1);
    assert!(with_head[0].value(1) && with_head[0].value(2));

    assert_eq!(enumerate_models(model, &[-3]).len(), 3);
}

#[test]
fn max_upper_bound_excludes_heavy_literals() {
    // head <-> max is at most 3: equivalent to l2 (weight 5) being false
    let model = aggregate_model(
        vec![(1, 1), (2, 5)],
        3,
        AggregateKind::Max,
        AggregateSign::UpperBound,
        3,
    );

    for solution in enumerate_models(model, &[]) {
        assert_eq!(solution.value(3), !solution.value(2));
    }
}

#[test]
fn min_lower_bound_mirrors_max() {
    // head <-> min is at least 2: equivalent to l1 (weight 1) being false
    let model = aggregate_model(
        vec![(1, 1), (2, 5)],
        3,
        AggregateKind::Min,
        AggregateSign::LowerBound,
        2,
    );

    let solutions = enumerate_models(model, &[]);
    assert_eq!(solutions.len(), 4);
    for solution in solutions {
        assert_eq!(solution.value(3), !solution.value(1));
    }
}

#[test]
fn watching_disciplines_agree_on_model_counts() {
    let build = || {
        aggregate_model(
            vec![(1, 1), (2, 1), (3, 1), (4, 1), (5, 1)],
            6,
            AggregateKind::Cardinality,
            AggregateSign::LowerBound,
            2,
        )
    };

    let count_with_ratio = |ratio: f64| {
        let mut solver = build()
            .into_solver(SolverOptions {
                partial_watch_ratio: ratio,
                ..Default::default()
            })
            .expect("well-formed model");
        let mut brancher = solver.default_brancher();
        let mut termination = Indefinite;
        let mut iterator = solver.solution_iterator(&mut brancher, &mut termination, &[]);
        let mut count = 0;
        while let crate::results::IteratedSolution::Solution(_) = iterator.next_solution() {
            count += 1;
        }
        count
    };

    // everything fully watched vs. the partially-watched scheme
    assert_eq!(count_with_ratio(0.0), 32);
    assert_eq!(count_with_ratio(1.0), 32);
}

#[test]
fn sum_minimisation_tightens_to_the_optimum() {
    let mut model = Model::default();
    model.add_clause([1, 2, 3]);
    model.add_weighted_set(0, vec![(1, 3), (2, 1), (3, 2)]);
    model.add_minimisation(0);

    let mut solver = model
        .into_solver(SolverOptions::default())
        .expect("well-formed model");
    let mut brancher = solver.default_brancher();
    match solver
        .minimise(&mut brancher, &mut Indefinite)
        .expect("no resource limit")
    {
        OptimisationResult::Optimal(solution) => {
            assert!(solution.value(2));
            assert!(!solution.value(1));
            assert!(!solution.value(3));
        }
        other => panic!("expected an optimum, got {other:?}"),
    }
}

#[test]
fn subset_minimisation_drops_to_a_minimal_true_set() {
    let mut model = Model::default();
    model.add_clause([1, 2]);

    let mut solver = model
        .into_solver(SolverOptions::default())
        .expect("well-formed model");
    let mut brancher = solver.default_brancher();
    match solver
        .minimise_subset(&[1, 2], &mut brancher, &mut Indefinite)
        .expect("no resource limit")
    {
        OptimisationResult::Optimal(solution) => {
            assert!(solution.value(1) ^ solution.value(2));
        }
        other => panic!("expected an optimum, got {other:?}"),
    }
}

#[test]
fn ordered_minimisation_is_lexicographic() {
    let mut model = Model::default();
    model.add_clause([1, 2]);

    let mut solver = model
        .into_solver(SolverOptions::default())
        .expect("well-formed model");
    let mut brancher = solver.default_brancher();
    match solver
        .minimise_ordered(&[1, 2], &mut brancher, &mut Indefinite)
        .expect("no resource limit")
    {
        OptimisationResult::Optimal(solution) => {
            assert!(!solution.value(1));
            assert!(solution.value(2));
        }
        other => panic!("expected an optimum, got {other:?}"),
    }
}

#[test]
fn exhausting_the_clause_database_is_recoverable() {
    let build = || {
        let mut model = Model::default();
        model.add_clause([-1, 2]);
        model.add_clause([-1, -2]);
        model.add_clause([1, 2]);
        model.add_clause([1, -2]);
        model
    };

    let mut starved = build()
        .into_solver(SolverOptions {
            clause_database_capacity: Some(0),
            ..Default::default()
        })
        .expect("well-formed model");
    let mut brancher = starved.default_brancher();
    assert!(starved.satisfy(&mut brancher, &mut Indefinite).is_err());

    // shedding the limit and retrying terminates normally
    let mut unlimited = build()
        .into_solver(SolverOptions::default())
        .expect("well-formed model");
    let mut brancher = unlimited.default_brancher();
    assert!(matches!(
        unlimited.satisfy(&mut brancher, &mut Indefinite),
        Ok(crate::results::SatisfactionResult::Unsatisfiable)
    ));
}
