//! Inductive definitions: loop handling under the different semantics,
//! external support, the Tseitin split for large loop formulas, and
//! aggregate-defined atoms.

use super::enumerate_models;
use super::expect_model;
use crate::options::SolverOptions;
use crate::options::UnfoundedCheckPolicy;
use crate::options::UnfoundedSearchStrategy;
use crate::results::IteratedSolution;
use crate::termination::Indefinite;
use crate::AggregateKind;
use crate::AggregateSemantics;
use crate::AggregateSign;
use crate::DefinitionSemantics;
use crate::Model;
use crate::ModelAggregate;

fn count_models_with_options(model: Model, options: SolverOptions) -> usize {
    let mut solver = model.into_solver(options).expect("well-formed model");
    let mut brancher = solver.default_brancher();
    let mut termination = Indefinite;
    let mut iterator = solver.solution_iterator(&mut brancher, &mut termination, &[]);
    let mut count = 0;
    loop {
        match iterator.next_solution() {
            IteratedSolution::Solution(_) => count += 1,
            IteratedSolution::Finished => return count,
            IteratedSolution::Unknown => panic!("enumeration did not finish"),
        }
    }
}

/// p <- q \/ a, q <- p: under stable semantics the loop {p, q} is only
/// true when the external support a holds.
fn supported_loop(semantics: DefinitionSemantics) -> Model {
    let mut model = Model::default();
    let p = model.new_variable();
    let q = model.new_variable();
    let a = model.new_variable();
    model.add_rule(p, vec![q as i32, a as i32], false, 0);
    model.add_rule(q, vec![p as i32], false, 0);
    model.set_definition_semantics(0, semantics);
    model
}

#[test]
fn loop_with_external_support_under_stable_semantics() {
    let solutions = enumerate_models(supported_loop(DefinitionSemantics::Stable), &[]);
    assert_eq!(solutions.len(), 2);
    for solution in solutions {
        assert_eq!(solution.value(1), solution.value(3));
        assert_eq!(solution.value(2), solution.value(3));
    }
}

#[test]
fn completion_semantics_admits_the_unsupported_loop() {
    let solutions = enumerate_models(supported_loop(DefinitionSemantics::Completion), &[]);
    // the self-supporting model {p, q} with a false is allowed here
    assert_eq!(solutions.len(), 3);
}

#[test]
fn conjunctive_loop_is_forced_false_at_the_root() {
    let mut model = Model::default();
    let p = model.new_variable();
    let q = model.new_variable();
    let a = model.new_variable();
    model.add_rule(p, vec![q as i32, a as i32], true, 0);
    model.add_rule(q, vec![p as i32], false, 0);

    let solutions = enumerate_models(model, &[]);
    // a remains free, p and q are never true
    assert_eq!(solutions.len(), 2);
    for solution in solutions {
        assert!(!solution.value(p));
        assert!(!solution.value(q));
    }
}

fn three_cycle() -> Model {
    let mut model = Model::default();
    let atoms: Vec<u32> = (0..3).map(|_| model.new_variable()).collect();
    let externals: Vec<u32> = (0..3).map(|_| model.new_variable()).collect();
    for index in 0..3 {
        let next = atoms[(index + 1) % 3];
        model.add_rule(
            atoms[index],
            vec![next as i32, externals[index] as i32],
            false,
            0,
        );
    }
    model
}

#[test]
fn cycle_models_match_across_loop_formula_encodings() {
    // any external support lifts the whole cycle: 8 external combinations
    let plain = count_models_with_options(three_cycle(), SolverOptions::default());
    let tseitin = count_models_with_options(
        three_cycle(),
        SolverOptions {
            loop_formula_tseitin_threshold: 0,
            ..Default::default()
        },
    );
    assert_eq!(plain, 8);
    assert_eq!(tseitin, 8);
}

#[test]
fn cycle_models_match_across_policies_and_strategies() {
    for policy in [UnfoundedCheckPolicy::Always, UnfoundedCheckPolicy::Adaptive] {
        for strategy in [
            UnfoundedSearchStrategy::BreadthFirst,
            UnfoundedSearchStrategy::DepthFirst,
        ] {
            let count = count_models_with_options(
                three_cycle(),
                SolverOptions {
                    unfounded_check_policy: policy,
                    unfounded_search_strategy: strategy,
                    ..Default::default()
                },
            );
            assert_eq!(count, 8);
        }
    }
}

#[test]
fn lazy_policy_is_sound_under_stable_semantics() {
    let mut model = three_cycle();
    model.set_definition_semantics(0, DefinitionSemantics::Stable);
    let count = count_models_with_options(
        model,
        SolverOptions {
            unfounded_check_policy: UnfoundedCheckPolicy::Lazy,
            ..Default::default()
        },
    );
    assert_eq!(count, 8);
}

#[test]
fn lazy_policy_is_rejected_for_well_founded_definitions() {
    let model = three_cycle();
    let result = model.into_solver(SolverOptions {
        unfounded_check_policy: UnfoundedCheckPolicy::Lazy,
        ..Default::default()
    });
    assert!(matches!(
        result,
        Err(crate::MalformedInputError::LazyCheckRequiresStable)
    ));
}

#[test]
fn self_supporting_aggregate_head_is_forced_false() {
    let mut model = Model::default();
    let a = model.new_variable();
    let _free = model.new_variable();
    model.add_weighted_set(0, vec![(a as i32, 1)]);
    model.add_aggregate(ModelAggregate {
        head: a,
        kind: AggregateKind::Cardinality,
        sign: AggregateSign::LowerBound,
        bound: 1,
        semantics: AggregateSemantics::Definitional,
        set_id: 0,
        definition_id: Some(0),
    });

    let solutions = enumerate_models(model, &[]);
    assert_eq!(solutions.len(), 2);
    for solution in solutions {
        assert!(!solution.value(a));
    }
}

#[test]
fn aggregate_defined_head_follows_external_support() {
    let mut model = Model::default();
    let a = model.new_variable();
    let b = model.new_variable();
    model.add_weighted_set(0, vec![(b as i32, 1)]);
    model.add_aggregate(ModelAggregate {
        head: a,
        kind: AggregateKind::Cardinality,
        sign: AggregateSign::LowerBound,
        bound: 1,
        semantics: AggregateSemantics::Definitional,
        set_id: 0,
        definition_id: Some(0),
    });

    let solutions = enumerate_models(model, &[]);
    assert_eq!(solutions.len(), 2);
    for solution in solutions {
        assert_eq!(solution.value(a), solution.value(b));
    }
}

/// A mixed loop: p <- not q, q <- not p. Both stable models exist and the
/// well-founded check accepts them (the well-founded model is not total, so
/// the definition is reported unsatisfiable under well-founded semantics).
#[test]
fn mixed_negative_loop_under_stable_semantics_has_two_models() {
    let mut model = Model::default();
    let p = model.new_variable();
    let q = model.new_variable();
    model.add_rule(p, vec![-(q as i32)], false, 0);
    model.add_rule(q, vec![-(p as i32)], false, 0);
    model.set_definition_semantics(0, DefinitionSemantics::Stable);

    let solutions = enumerate_models(model, &[]);
    assert_eq!(solutions.len(), 2);
    for solution in solutions {
        assert_ne!(solution.value(p), solution.value(q));
    }
}

#[test]
fn mixed_negative_loop_under_well_founded_semantics_has_no_model() {
    let mut model = Model::default();
    let p = model.new_variable();
    let q = model.new_variable();
    model.add_rule(p, vec![-(q as i32)], false, 0);
    model.add_rule(q, vec![-(p as i32)], false, 0);
    model.set_definition_semantics(0, DefinitionSemantics::WellFounded);

    let solutions = enumerate_models(model, &[]);
    assert!(solutions.is_empty());
}

#[test]
fn single_atom_positive_loop_is_removed() {
    // p <- p has no external support
    let mut model = Model::default();
    let p = model.new_variable();
    let a = model.new_variable();
    model.add_rule(p, vec![p as i32], false, 0);
    let _ = a;

    let solution = expect_model(model);
    assert!(!solution.value(p));
}
