//! End-to-end scenarios mixing clauses, aggregates, definitions and the
//! finite-domain module.

use super::enumerate_models;
use super::expect_model;
use super::expect_unsatisfiable;
use crate::propagators::finite_domain::LinearComparison;
use crate::Model;

/// The reified sum cannot reach its bound, which forces variable 1 false and
/// collapses the clauses.
#[test]
fn unreachable_integer_sum_forces_unsatisfiability() {
    let mut model = Model::default();
    model.add_clause([1, 2, 3]);
    model.add_clause([1, -2, 3]);
    model.add_clause([-3]);

    let v1 = model.new_integer_variable(-3, 7);
    let v2 = model.new_integer_variable(7, 10);
    model.add_reified_linear(1, vec![v1, v2], LinearComparison::GreaterOrEqual, 18);

    expect_unsatisfiable(model);
}

/// Magic sequence: `s_i` counts the occurrences of value `i` among the
/// sequence itself, channelled through equality literals and cardinality
/// aggregates, with the redundant weighted-sum constraints over the same
/// literals. No magic sequence of length 6 exists.
#[test]
fn magic_sequence_of_length_six_has_no_model() {
    let n: i64 = 6;
    let mut model = Model::default();

    let sequence: Vec<_> = (0..n).map(|_| model.new_integer_variable(0, n)).collect();

    // equality[j][i] <-> s_j = i, with every variable taking some value
    let mut equality = Vec::new();
    for &variable in &sequence {
        let row: Vec<u32> = (0..=n)
            .map(|value| {
                let head = model.new_variable();
                model.add_reified_equals(head as i32, variable, value);
                head
            })
            .collect();
        model.add_clause(row.iter().map(|&head| head as i32).collect::<Vec<_>>());
        equality.push(row);
    }

    let mut next_set_id = 0u32;
    // s_i = |{ j : s_j = i }| via cardinality bounds on the columns
    for (value, &counter) in sequence.iter().enumerate() {
        let column: Vec<(i32, i64)> = equality
            .iter()
            .map(|row| (row[value] as i32, 1))
            .collect();
        let set_id = next_set_id;
        next_set_id += 1;
        model.add_weighted_set(set_id, column);

        for bound in 1..=n {
            // count >= bound <-> s_i >= bound
            let count_head = model.new_variable();
            model.add_aggregate(crate::ModelAggregate {
                head: count_head,
                kind: crate::AggregateKind::Cardinality,
                sign: crate::AggregateSign::LowerBound,
                bound,
                semantics: crate::AggregateSemantics::Completion,
                set_id,
                definition_id: None,
            });
            let counter_head = model.new_variable();
            model.add_reified_linear(
                counter_head as i32,
                vec![counter],
                LinearComparison::GreaterOrEqual,
                bound,
            );
            model.add_clause([-(count_head as i32), counter_head as i32]);
            model.add_clause([count_head as i32, -(counter_head as i32)]);
        }
    }

    // sum s_j = n over the integer variables
    let sum_head = model.new_variable();
    model.add_reified_linear(
        sum_head as i32,
        sequence.clone(),
        LinearComparison::GreaterOrEqual,
        n,
    );
    model.add_clause([sum_head as i32]);
    let sum_cap = model.new_variable();
    model.add_reified_linear(
        sum_cap as i32,
        sequence.clone(),
        LinearComparison::LessOrEqual,
        n,
    );
    model.add_clause([sum_cap as i32]);

    // the weighted identity sum i * s_i = n, over the equality literals
    let mut weighted: Vec<(i32, i64)> = Vec::new();
    for row in &equality {
        for (value, &literal) in row.iter().enumerate() {
            if value > 0 {
                weighted.push((literal as i32, value as i64));
            }
        }
    }
    let weighted_set = next_set_id;
    model.add_weighted_set(weighted_set, weighted);
    let lower = model.new_variable();
    model.add_aggregate(crate::ModelAggregate {
        head: lower,
        kind: crate::AggregateKind::Sum,
        sign: crate::AggregateSign::LowerBound,
        bound: n,
        semantics: crate::AggregateSemantics::Completion,
        set_id: weighted_set,
        definition_id: None,
    });
    model.add_clause([lower as i32]);
    let upper = model.new_variable();
    model.add_aggregate(crate::ModelAggregate {
        head: upper,
        kind: crate::AggregateKind::Sum,
        sign: crate::AggregateSign::UpperBound,
        bound: n,
        semantics: crate::AggregateSemantics::Completion,
        set_id: weighted_set,
        definition_id: None,
    });
    model.add_clause([upper as i32]);

    expect_unsatisfiable(model);
}

/// All-different over three variables in `[1, 3]`, but posing `v_i != v_j`
/// for all nine ordered pairs including `i = j`.
#[test]
fn all_different_with_self_pairs_is_unsatisfiable() {
    let mut model = Model::default();
    let variables: Vec<_> = (0..3).map(|_| model.new_integer_variable(1, 3)).collect();

    for &first in &variables {
        for &second in &variables {
            let head = model.new_variable();
            model.add_reified_not_equals(head as i32, first, second);
            model.add_clause([head as i32]);
        }
    }

    expect_unsatisfiable(model);
}

fn single_disjunction_model() -> Model {
    let mut model = Model::default();
    model.add_clause([1, 2, 3]);
    model
}

#[test]
fn disjunction_under_negative_assumption_has_three_models() {
    let solutions = enumerate_models(single_disjunction_model(), &[-2]);
    assert_eq!(solutions.len(), 3);
    assert!(solutions.iter().all(|solution| !solution.value(2)));
}

#[test]
fn disjunction_under_other_assumption_has_three_models() {
    let solutions = enumerate_models(single_disjunction_model(), &[-1]);
    assert_eq!(solutions.len(), 3);
    assert!(solutions.iter().all(|solution| !solution.value(1)));
}

#[test]
fn disjunction_without_assumptions_has_seven_models() {
    let solutions = enumerate_models(single_disjunction_model(), &[]);
    assert_eq!(solutions.len(), 7);
}

/// Two mutually dependent rules without external support: both atoms are
/// forced false at the root.
#[test]
fn mutually_dependent_rules_are_forced_false() {
    let mut model = Model::default();
    let p = model.new_variable();
    let q = model.new_variable();
    model.add_rule(p, vec![q as i32], false, 0);
    model.add_rule(q, vec![p as i32], false, 0);
    model.set_definition_semantics(0, crate::DefinitionSemantics::WellFounded);

    let solution = expect_model(model);
    assert!(!solution.value(p));
    assert!(!solution.value(q));
}
