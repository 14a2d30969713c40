//! A line-oriented, reproducible dump of a [`Model`], and the matching
//! parser. Dumping and reparsing yields an equivalent problem (modulo the
//! ordering of sets and literals).

use std::fmt::Write as _;

use super::IntVariable;
use super::Model;
use super::ModelAggregate;
use super::ModelFdConstraint;
use crate::basic_types::MalformedInputError;
use crate::basic_types::Weight;
use crate::propagators::aggregates::AggregateKind;
use crate::propagators::aggregates::AggregateSemantics;
use crate::propagators::aggregates::AggregateSign;
use crate::propagators::definitions::DefinitionSemantics;
use crate::propagators::finite_domain::LinearComparison;

fn kind_token(kind: AggregateKind) -> &'static str {
    match kind {
        AggregateKind::Sum => "sum",
        AggregateKind::Product => "prod",
        AggregateKind::Cardinality => "card",
        AggregateKind::Min => "min",
        AggregateKind::Max => "max",
    }
}

fn sign_token(sign: AggregateSign) -> &'static str {
    match sign {
        AggregateSign::UpperBound => "ub",
        AggregateSign::LowerBound => "lb",
    }
}

fn semantics_token(semantics: AggregateSemantics) -> &'static str {
    match semantics {
        AggregateSemantics::Completion => "comp",
        AggregateSemantics::Definitional => "def",
        AggregateSemantics::Implication => "impl",
    }
}

fn definition_semantics_token(semantics: DefinitionSemantics) -> &'static str {
    match semantics {
        DefinitionSemantics::Completion => "comp",
        DefinitionSemantics::Stable => "stable",
        DefinitionSemantics::WellFounded => "wf",
    }
}

impl Model {
    /// Serialise the problem into the dump format.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "p korat {} {}",
            self.num_variables,
            self.integer_variables.len()
        );
        for &(definition_id, semantics) in &self.definition_semantics {
            let _ = writeln!(
                out,
                "ds {definition_id} {}",
                definition_semantics_token(semantics)
            );
        }
        for clause in &self.clauses {
            for &literal in clause {
                let _ = write!(out, "{literal} ");
            }
            let _ = writeln!(out, "0");
        }
        for rule in &self.rules {
            let kind = if rule.conjunctive { "c" } else { "d" };
            let _ = write!(out, "r {kind} {} {}", rule.definition_id, rule.head);
            for &literal in &rule.body {
                let _ = write!(out, " {literal}");
            }
            let _ = writeln!(out, " 0");
        }
        for (set_id, literals) in &self.sets {
            let _ = write!(out, "s {set_id}");
            for &(literal, weight) in literals {
                let _ = write!(out, " {literal} {weight}");
            }
            let _ = writeln!(out, " 0");
        }
        for aggregate in &self.aggregates {
            let _ = write!(
                out,
                "a {} {} {} {} {} {}",
                kind_token(aggregate.kind),
                sign_token(aggregate.sign),
                semantics_token(aggregate.semantics),
                aggregate.head,
                aggregate.set_id,
                aggregate.bound,
            );
            match aggregate.definition_id {
                Some(definition_id) => {
                    let _ = writeln!(out, " {definition_id}");
                }
                None => {
                    let _ = writeln!(out, " -");
                }
            }
        }
        for &(lower_bound, upper_bound) in &self.integer_variables {
            let _ = writeln!(out, "iv {lower_bound} {upper_bound}");
        }
        for constraint in &self.fd_constraints {
            match constraint {
                ModelFdConstraint::Linear {
                    head,
                    variables,
                    comparison,
                    bound,
                } => {
                    let comparison = match comparison {
                        LinearComparison::GreaterOrEqual => "ge",
                        LinearComparison::LessOrEqual => "le",
                    };
                    let _ = write!(out, "ic l {head} {comparison} {bound}");
                    for variable in variables {
                        let _ = write!(out, " {}", variable.0);
                    }
                    let _ = writeln!(out, " 0");
                }
                ModelFdConstraint::Equals {
                    head,
                    variable,
                    value,
                } => {
                    let _ = writeln!(out, "ic e {head} {} {value}", variable.0);
                }
                ModelFdConstraint::NotEquals {
                    head,
                    first,
                    second,
                } => {
                    let _ = writeln!(out, "ic n {head} {} {}", first.0, second.0);
                }
            }
        }
        if let Some(set_id) = self.minimisation {
            let _ = writeln!(out, "min {set_id}");
        }
        out
    }

    /// Parse a problem from the dump format.
    pub fn parse(input: &str) -> Result<Model, MalformedInputError> {
        let error = |line: &str| MalformedInputError::InvalidDump(line.to_owned());
        let mut model = Model::default();

        for line in input.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('c') {
                continue;
            }
            let tokens: Vec<&str> = line.split_whitespace().collect();
            match tokens[0] {
                "p" => {
                    let num_variables: u32 = tokens
                        .get(2)
                        .and_then(|token| token.parse().ok())
                        .ok_or_else(|| error(line))?;
                    model.num_variables = num_variables;
                }
                "ds" => {
                    let definition_id: u32 = tokens
                        .get(1)
                        .and_then(|token| token.parse().ok())
                        .ok_or_else(|| error(line))?;
                    let semantics = match tokens.get(2).copied() {
                        Some("comp") => DefinitionSemantics::Completion,
                        Some("stable") => DefinitionSemantics::Stable,
                        Some("wf") => DefinitionSemantics::WellFounded,
                        _ => return Err(error(line)),
                    };
                    model.set_definition_semantics(definition_id, semantics);
                }
                "r" => {
                    let conjunctive = match tokens.get(1).copied() {
                        Some("c") => true,
                        Some("d") => false,
                        _ => return Err(error(line)),
                    };
                    let definition_id: u32 = tokens
                        .get(2)
                        .and_then(|token| token.parse().ok())
                        .ok_or_else(|| error(line))?;
                    let head: u32 = tokens
                        .get(3)
                        .and_then(|token| token.parse().ok())
                        .ok_or_else(|| error(line))?;
                    let body = parse_literals(&tokens[4..]).ok_or_else(|| error(line))?;
                    model.add_rule(head, body, conjunctive, definition_id);
                }
                "s" => {
                    let set_id: u32 = tokens
                        .get(1)
                        .and_then(|token| token.parse().ok())
                        .ok_or_else(|| error(line))?;
                    let mut literals: Vec<(i32, Weight)> = Vec::new();
                    let mut rest = &tokens[2..];
                    loop {
                        match rest {
                            ["0"] => break,
                            [literal, weight, tail @ ..] => {
                                let literal: i32 =
                                    literal.parse().map_err(|_| error(line))?;
                                let weight: Weight =
                                    weight.parse().map_err(|_| error(line))?;
                                literals.push((literal, weight));
                                rest = tail;
                            }
                            _ => return Err(error(line)),
                        }
                    }
                    model.add_weighted_set(set_id, literals);
                }
                "a" => {
                    let kind = match tokens.get(1).copied() {
                        Some("sum") => AggregateKind::Sum,
                        Some("prod") => AggregateKind::Product,
                        Some("card") => AggregateKind::Cardinality,
                        Some("min") => AggregateKind::Min,
                        Some("max") => AggregateKind::Max,
                        _ => return Err(error(line)),
                    };
                    let sign = match tokens.get(2).copied() {
                        Some("ub") => AggregateSign::UpperBound,
                        Some("lb") => AggregateSign::LowerBound,
                        _ => return Err(error(line)),
                    };
                    let semantics = match tokens.get(3).copied() {
                        Some("comp") => AggregateSemantics::Completion,
                        Some("def") => AggregateSemantics::Definitional,
                        Some("impl") => AggregateSemantics::Implication,
                        _ => return Err(error(line)),
                    };
                    let head: u32 = tokens
                        .get(4)
                        .and_then(|token| token.parse().ok())
                        .ok_or_else(|| error(line))?;
                    let set_id: u32 = tokens
                        .get(5)
                        .and_then(|token| token.parse().ok())
                        .ok_or_else(|| error(line))?;
                    let bound: Weight = tokens
                        .get(6)
                        .and_then(|token| token.parse().ok())
                        .ok_or_else(|| error(line))?;
                    let definition_id = match tokens.get(7).copied() {
                        Some("-") | None => None,
                        Some(token) => Some(token.parse().map_err(|_| error(line))?),
                    };
                    model.add_aggregate(ModelAggregate {
                        head,
                        kind,
                        sign,
                        bound,
                        semantics,
                        set_id,
                        definition_id,
                    });
                }
                "iv" => {
                    let lower_bound: i64 = tokens
                        .get(1)
                        .and_then(|token| token.parse().ok())
                        .ok_or_else(|| error(line))?;
                    let upper_bound: i64 = tokens
                        .get(2)
                        .and_then(|token| token.parse().ok())
                        .ok_or_else(|| error(line))?;
                    let _ = model.new_integer_variable(lower_bound, upper_bound);
                }
                "ic" => match tokens.get(1).copied() {
                    Some("l") => {
                        let head: i32 = tokens
                            .get(2)
                            .and_then(|token| token.parse().ok())
                            .ok_or_else(|| error(line))?;
                        let comparison = match tokens.get(3).copied() {
                            Some("ge") => LinearComparison::GreaterOrEqual,
                            Some("le") => LinearComparison::LessOrEqual,
                            _ => return Err(error(line)),
                        };
                        let bound: i64 = tokens
                            .get(4)
                            .and_then(|token| token.parse().ok())
                            .ok_or_else(|| error(line))?;
                        let mut variables = Vec::new();
                        for token in &tokens[5..] {
                            if *token == "0" {
                                break;
                            }
                            let index: u32 = token.parse().map_err(|_| error(line))?;
                            variables.push(IntVariable(index));
                        }
                        model.add_reified_linear(head, variables, comparison, bound);
                    }
                    Some("e") => {
                        let head: i32 = tokens
                            .get(2)
                            .and_then(|token| token.parse().ok())
                            .ok_or_else(|| error(line))?;
                        let variable: u32 = tokens
                            .get(3)
                            .and_then(|token| token.parse().ok())
                            .ok_or_else(|| error(line))?;
                        let value: i64 = tokens
                            .get(4)
                            .and_then(|token| token.parse().ok())
                            .ok_or_else(|| error(line))?;
                        model.add_reified_equals(head, IntVariable(variable), value);
                    }
                    Some("n") => {
                        let head: i32 = tokens
                            .get(2)
                            .and_then(|token| token.parse().ok())
                            .ok_or_else(|| error(line))?;
                        let first: u32 = tokens
                            .get(3)
                            .and_then(|token| token.parse().ok())
                            .ok_or_else(|| error(line))?;
                        let second: u32 = tokens
                            .get(4)
                            .and_then(|token| token.parse().ok())
                            .ok_or_else(|| error(line))?;
                        model.add_reified_not_equals(
                            head,
                            IntVariable(first),
                            IntVariable(second),
                        );
                    }
                    _ => return Err(error(line)),
                },
                "min" => {
                    let set_id: u32 = tokens
                        .get(1)
                        .and_then(|token| token.parse().ok())
                        .ok_or_else(|| error(line))?;
                    model.add_minimisation(set_id);
                }
                _ => {
                    // a clause line: literals terminated by 0
                    let literals = parse_literals(&tokens).ok_or_else(|| error(line))?;
                    model.add_clause(literals);
                }
            }
        }
        Ok(model)
    }
}

fn parse_literals(tokens: &[&str]) -> Option<Vec<i32>> {
    let mut literals = Vec::new();
    for (index, token) in tokens.iter().enumerate() {
        let value: i32 = token.parse().ok()?;
        if value == 0 {
            return if index == tokens.len() - 1 {
                Some(literals)
            } else {
                None
            };
        }
        literals.push(value);
    }
    None
}
