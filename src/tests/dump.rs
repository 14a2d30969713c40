//! The dump round-trip law: parsing a dump yields an equivalent problem.

use super::expect_model;
use crate::propagators::finite_domain::LinearComparison;
use crate::AggregateKind;
use crate::AggregateSemantics;
use crate::AggregateSign;
use crate::DefinitionSemantics;
use crate::Model;
use crate::ModelAggregate;

fn mixed_model() -> Model {
    let mut model = Model::default();
    model.add_clause([1, -2, 3]);
    model.add_clause([4]);
    model.add_rule(5, vec![1, -3], false, 0);
    model.add_rule(6, vec![5], true, 0);
    model.set_definition_semantics(0, DefinitionSemantics::Stable);
    model.add_weighted_set(7, vec![(1, 2), (-2, 3), (4, 1)]);
    model.add_aggregate(ModelAggregate {
        head: 8,
        kind: AggregateKind::Sum,
        sign: AggregateSign::LowerBound,
        bound: 3,
        semantics: AggregateSemantics::Completion,
        set_id: 7,
        definition_id: None,
    });
    let x = model.new_integer_variable(-2, 9);
    let y = model.new_integer_variable(0, 4);
    model.add_reified_linear(9, vec![x, y], LinearComparison::LessOrEqual, 10);
    model.add_reified_equals(-10, x, 3);
    model.add_reified_not_equals(2, x, y);
    model.add_minimisation(7);
    model
}

#[test]
fn dump_and_reparse_yield_an_equivalent_problem() {
    let model = mixed_model();
    let dumped = model.dump();
    let reparsed = Model::parse(&dumped).expect("the dump parses back");
    assert_eq!(model, reparsed);
}

#[test]
fn dumping_is_stable_under_reparsing() {
    let model = mixed_model();
    let dumped = model.dump();
    let reparsed = Model::parse(&dumped).expect("the dump parses back");
    assert_eq!(dumped, reparsed.dump());
}

#[test]
fn a_reparsed_problem_solves_like_the_original() {
    let mut model = Model::default();
    model.add_clause([1, 2]);
    model.add_clause([-1, 2]);

    let reparsed = Model::parse(&model.dump()).expect("the dump parses back");
    let solution = expect_model(reparsed);
    assert!(solution.value(2));
}

#[test]
fn comment_lines_are_ignored() {
    let input = "c a comment\np korat 2 0\n1 2 0\n";
    let model = Model::parse(input).expect("parses");
    assert_eq!(model.num_variables(), 2);
    assert_eq!(model.clauses.len(), 1);
}

#[test]
fn malformed_lines_are_rejected() {
    assert!(Model::parse("a nonsense line").is_err());
    assert!(Model::parse("1 2").is_err());
}
