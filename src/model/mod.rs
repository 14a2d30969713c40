//! Problem intake. A [`Model`] is built up from clauses, rules, weighted
//! sets, aggregates and finite-domain constraints; literals use the DIMACS
//! convention (`k` is variable `k` positive, `-k` its complement, variables
//! are 1-based). All input validation happens eagerly here, before any
//! solving starts.

pub(crate) mod dump;

use crate::api::Solver;
use crate::basic_types::checked_add;
use crate::basic_types::checked_mul;
use crate::basic_types::HashSet;
use crate::basic_types::MalformedInputError;
use crate::basic_types::Weight;
use crate::engine::variables::Literal;
use crate::engine::variables::PropositionalVariable;
use crate::engine::SatisfactionSolver;
use crate::options::SolverOptions;
use crate::options::UnfoundedCheckPolicy;
use crate::propagators::aggregates::AggregateKind;
use crate::propagators::aggregates::AggregateSemantics;
use crate::propagators::aggregates::AggregateSign;
use crate::propagators::aggregates::WeightedLiteral;
use crate::propagators::definitions::DefinitionPropagator;
use crate::propagators::definitions::DefinitionSemantics;
use crate::propagators::definitions::Rule;
use crate::propagators::finite_domain::FdConstraintKind;
use crate::propagators::finite_domain::FiniteDomainPropagator;
use crate::propagators::finite_domain::LinearComparison;

/// A bounded integer variable of the model.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct IntVariable(pub(crate) u32);

/// A rule of an inductive definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelRule {
    /// The defined atom; rule heads are positive.
    pub head: u32,
    pub body: Vec<i32>,
    pub conjunctive: bool,
    pub definition_id: u32,
}

/// An aggregate constraint over a declared set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModelAggregate {
    /// The head atom; aggregate heads are positive.
    pub head: u32,
    pub kind: AggregateKind,
    pub sign: AggregateSign,
    pub bound: Weight,
    pub semantics: AggregateSemantics,
    pub set_id: u32,
    pub definition_id: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ModelFdConstraint {
    Linear {
        head: i32,
        variables: Vec<IntVariable>,
        comparison: LinearComparison,
        bound: i64,
    },
    Equals {
        head: i32,
        variable: IntVariable,
        value: i64,
    },
    NotEquals {
        head: i32,
        first: IntVariable,
        second: IntVariable,
    },
}

/// Builds up the problem, from which a solver can be constructed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Model {
    pub(crate) num_variables: u32,
    pub(crate) clauses: Vec<Vec<i32>>,
    pub(crate) rules: Vec<ModelRule>,
    pub(crate) sets: Vec<(u32, Vec<(i32, Weight)>)>,
    pub(crate) aggregates: Vec<ModelAggregate>,
    pub(crate) definition_semantics: Vec<(u32, DefinitionSemantics)>,
    pub(crate) integer_variables: Vec<(i64, i64)>,
    pub(crate) fd_constraints: Vec<ModelFdConstraint>,
    pub(crate) minimisation: Option<u32>,
}

impl Model {
    /// Create a fresh variable. Mentioning a higher-numbered variable in a
    /// clause also creates everything up to it.
    pub fn new_variable(&mut self) -> u32 {
        self.num_variables += 1;
        self.num_variables
    }

    fn mention(&mut self, literal: i32) {
        self.num_variables = self.num_variables.max(literal.unsigned_abs());
    }

    pub fn add_clause(&mut self, literals: impl IntoIterator<Item = i32>) {
        let literals: Vec<i32> = literals.into_iter().collect();
        for &literal in &literals {
            self.mention(literal);
        }
        self.clauses.push(literals);
    }

    pub fn add_rule(&mut self, head: u32, body: Vec<i32>, conjunctive: bool, definition_id: u32) {
        self.mention(head as i32);
        for &literal in &body {
            self.mention(literal);
        }
        self.rules.push(ModelRule {
            head,
            body,
            conjunctive,
            definition_id,
        });
    }

    pub fn add_weighted_set(&mut self, set_id: u32, literals: Vec<(i32, Weight)>) {
        for &(literal, _) in &literals {
            self.mention(literal);
        }
        self.sets.push((set_id, literals));
    }

    pub fn add_aggregate(&mut self, aggregate: ModelAggregate) {
        self.mention(aggregate.head as i32);
        self.aggregates.push(aggregate);
    }

    pub fn set_definition_semantics(&mut self, definition_id: u32, semantics: DefinitionSemantics) {
        self.definition_semantics.push((definition_id, semantics));
    }

    pub fn new_integer_variable(&mut self, lower_bound: i64, upper_bound: i64) -> IntVariable {
        self.integer_variables.push((lower_bound, upper_bound));
        IntVariable(self.integer_variables.len() as u32 - 1)
    }

    pub fn add_reified_linear(
        &mut self,
        head: i32,
        variables: Vec<IntVariable>,
        comparison: LinearComparison,
        bound: i64,
    ) {
        self.mention(head);
        self.fd_constraints.push(ModelFdConstraint::Linear {
            head,
            variables,
            comparison,
            bound,
        });
    }

    pub fn add_reified_equals(&mut self, head: i32, variable: IntVariable, value: i64) {
        self.mention(head);
        self.fd_constraints.push(ModelFdConstraint::Equals {
            head,
            variable,
            value,
        });
    }

    pub fn add_reified_not_equals(&mut self, head: i32, first: IntVariable, second: IntVariable) {
        self.mention(head);
        self.fd_constraints.push(ModelFdConstraint::NotEquals {
            head,
            first,
            second,
        });
    }

    /// Declare that the sum over the given set is to be minimised.
    pub fn add_minimisation(&mut self, set_id: u32) {
        self.minimisation = Some(set_id);
    }

    pub fn num_variables(&self) -> u32 {
        self.num_variables
    }

    fn set_literals(&self, set_id: u32) -> Option<&[(i32, Weight)]> {
        self.sets
            .iter()
            .find(|(id, _)| *id == set_id)
            .map(|(_, literals)| literals.as_slice())
    }

    fn semantics_of(&self, definition_id: u32) -> DefinitionSemantics {
        self.definition_semantics
            .iter()
            .rev()
            .find(|(id, _)| *id == definition_id)
            .map(|&(_, semantics)| semantics)
            .unwrap_or(DefinitionSemantics::WellFounded)
    }

    /// Eager validation of the entire problem: every malformed-input case is
    /// reported here and never reaches the solving machinery.
    pub fn validate(&self) -> Result<(), MalformedInputError> {
        let check_literal = |literal: i32| {
            if literal == 0 {
                Err(MalformedInputError::UndefinedVariable(0))
            } else {
                Ok(())
            }
        };
        for clause in &self.clauses {
            for &literal in clause {
                check_literal(literal)?;
            }
        }

        let mut set_ids: HashSet<u32> = HashSet::default();
        for (set_id, literals) in &self.sets {
            if !set_ids.insert(*set_id) {
                return Err(MalformedInputError::DuplicateSet(*set_id));
            }
            if literals.is_empty() {
                return Err(MalformedInputError::EmptySet(*set_id));
            }
            for &(literal, _) in literals {
                check_literal(literal)?;
            }
        }

        let mut heads: HashSet<u32> = HashSet::default();
        for rule in &self.rules {
            if rule.head == 0 {
                return Err(MalformedInputError::NegativeRuleHead(rule.head));
            }
            if !heads.insert(rule.head) {
                return Err(MalformedInputError::DuplicateDefinition(rule.head));
            }
            for &literal in &rule.body {
                check_literal(literal)?;
                if literal == -(rule.head as i32) {
                    return Err(MalformedInputError::HeadComplementInBody(rule.head));
                }
            }
        }

        for aggregate in &self.aggregates {
            if aggregate.head == 0 {
                return Err(MalformedInputError::NegativeAggregateHead(aggregate.head));
            }
            let literals = self
                .set_literals(aggregate.set_id)
                .ok_or(MalformedInputError::UndefinedSet(aggregate.set_id))?;

            match aggregate.kind {
                AggregateKind::Sum | AggregateKind::Cardinality | AggregateKind::Product => {
                    let mut accumulated: Weight = match aggregate.kind {
                        AggregateKind::Product => 1,
                        _ => 0,
                    };
                    let mut variables: HashSet<u32> = HashSet::default();
                    for &(literal, weight) in literals {
                        if weight < 0 {
                            return Err(MalformedInputError::NegativeWeight {
                                set_id: aggregate.set_id,
                                weight,
                            });
                        }
                        if weight == 0 && aggregate.kind == AggregateKind::Product {
                            return Err(MalformedInputError::ZeroProductWeight(aggregate.set_id));
                        }
                        if !variables.insert(literal.unsigned_abs())
                            && aggregate.kind == AggregateKind::Product
                            && literals
                                .iter()
                                .any(|&(other, _)| other == -literal)
                        {
                            return Err(MalformedInputError::ProductBothSigns(aggregate.set_id));
                        }
                        accumulated = match aggregate.kind {
                            AggregateKind::Product => checked_mul(accumulated, weight),
                            _ => checked_add(accumulated, weight),
                        }
                        .map_err(|_| {
                            MalformedInputError::WeightOutOfPrecision(aggregate.set_id)
                        })?;
                    }
                }
                AggregateKind::Min | AggregateKind::Max => {}
            }

            if aggregate.semantics == AggregateSemantics::Definitional {
                if !heads.insert(aggregate.head) {
                    return Err(MalformedInputError::DuplicateDefinition(aggregate.head));
                }
            }
        }

        if let Some(set_id) = self.minimisation {
            let _ = self
                .set_literals(set_id)
                .ok_or(MalformedInputError::UndefinedSet(set_id))?;
        }

        for (index, &(lower_bound, upper_bound)) in self.integer_variables.iter().enumerate() {
            if lower_bound > upper_bound {
                return Err(MalformedInputError::EmptyDomain(index as u32));
            }
        }
        for constraint in &self.fd_constraints {
            let head = match constraint {
                ModelFdConstraint::Linear { head, .. } => *head,
                ModelFdConstraint::Equals { head, .. } => *head,
                ModelFdConstraint::NotEquals { head, .. } => *head,
            };
            check_literal(head)?;
            let variables: Vec<IntVariable> = match constraint {
                ModelFdConstraint::Linear { variables, .. } => variables.clone(),
                ModelFdConstraint::Equals { variable, .. } => vec![*variable],
                ModelFdConstraint::NotEquals { first, second, .. } => vec![*first, *second],
            };
            for variable in variables {
                if variable.0 as usize >= self.integer_variables.len() {
                    return Err(MalformedInputError::UndefinedIntegerVariable(variable.0));
                }
            }
        }

        Ok(())
    }

    /// Create a solver instance from this model. Root-level inconsistency is
    /// not an error: the returned solver reports unsatisfiability.
    pub fn into_solver(self, options: SolverOptions) -> Result<Solver, MalformedInputError> {
        self.validate()?;

        let uses_definitions = !self.rules.is_empty()
            || self
                .aggregates
                .iter()
                .any(|aggregate| aggregate.semantics == AggregateSemantics::Definitional);

        if options.unfounded_check_policy == UnfoundedCheckPolicy::Lazy && uses_definitions {
            let all_stable = self
                .rules
                .iter()
                .map(|rule| rule.definition_id)
                .chain(
                    self.aggregates
                        .iter()
                        .filter(|aggregate| {
                            aggregate.semantics == AggregateSemantics::Definitional
                        })
                        .map(|aggregate| aggregate.definition_id.unwrap_or(0)),
                )
                .all(|definition_id| {
                    self.semantics_of(definition_id) == DefinitionSemantics::Stable
                });
            if !all_stable {
                return Err(MalformedInputError::LazyCheckRequiresStable);
            }
        }

        let mut engine = SatisfactionSolver::new(options);
        for _ in 0..self.num_variables {
            let _ = engine.new_variable(false, true, None);
        }

        let to_engine_literal = |literal: i32| {
            Literal::new(
                PropositionalVariable::new(literal.unsigned_abs()),
                literal > 0,
            )
        };

        // clauses; a root conflict leaves the solver infeasible but the
        // remaining structure is still built
        for clause in &self.clauses {
            if engine.state.is_infeasible() {
                break;
            }
            let literals: Vec<Literal> = clause.iter().map(|&l| to_engine_literal(l)).collect();
            let _ = engine.add_clause(literals);
        }

        // finite-domain module
        let finite_domain = if self.integer_variables.is_empty() {
            None
        } else {
            let mut module = FiniteDomainPropagator::default();
            for &(lower_bound, upper_bound) in &self.integer_variables {
                let _ = module.new_integer_variable(lower_bound, upper_bound);
            }
            for constraint in &self.fd_constraints {
                match constraint {
                    ModelFdConstraint::Linear {
                        head,
                        variables,
                        comparison,
                        bound,
                    } => module.add_constraint(
                        to_engine_literal(*head),
                        FdConstraintKind::Linear {
                            variables: variables.iter().map(|v| v.0 as usize).collect(),
                            comparison: *comparison,
                            bound: *bound,
                        },
                    ),
                    ModelFdConstraint::Equals {
                        head,
                        variable,
                        value,
                    } => module.add_constraint(
                        to_engine_literal(*head),
                        FdConstraintKind::Equals {
                            variable: variable.0 as usize,
                            value: *value,
                        },
                    ),
                    ModelFdConstraint::NotEquals {
                        head,
                        first,
                        second,
                    } => module.add_constraint(
                        to_engine_literal(*head),
                        FdConstraintKind::NotEquals {
                            first: first.0 as usize,
                            second: second.0 as usize,
                        },
                    ),
                }
            }
            Some(module)
        };

        // aggregates
        let partial_watch_ratio = engine.internal_parameters.partial_watch_ratio;
        let mut definitional_aggregates: Vec<(PropositionalVariable, u32, usize)> = Vec::new();
        for aggregate in &self.aggregates {
            let literals: Vec<WeightedLiteral> = self
                .set_literals(aggregate.set_id)
                .expect("validated")
                .iter()
                .map(|&(literal, weight)| WeightedLiteral {
                    literal: to_engine_literal(literal),
                    weight,
                })
                .collect();
            let head = Literal::new(PropositionalVariable::new(aggregate.head), true);
            let index = engine.modules.aggregates.add_aggregate(
                head,
                aggregate.kind,
                aggregate.sign,
                aggregate.bound,
                aggregate.semantics,
                aggregate.set_id,
                &literals,
                aggregate.definition_id,
                partial_watch_ratio,
            )?;
            if aggregate.semantics == AggregateSemantics::Definitional {
                definitional_aggregates.push((
                    head.get_propositional_variable(),
                    aggregate.definition_id.unwrap_or(0),
                    index,
                ));
            }
        }

        // the minimisation objective is an upper-bound sum aggregate whose
        // head is the always-true literal; the driver tightens its bound
        let mut minimisation_aggregate = None;
        let mut minimisation_set = None;
        if let Some(set_id) = self.minimisation {
            let raw = self.set_literals(set_id).expect("validated");
            let literals: Vec<WeightedLiteral> = raw
                .iter()
                .map(|&(literal, weight)| WeightedLiteral {
                    literal: to_engine_literal(literal),
                    weight,
                })
                .collect();
            let initial_bound: Weight = raw.iter().map(|&(_, weight)| weight.max(0)).sum();
            let index = engine.modules.aggregates.add_aggregate(
                engine.true_literal,
                AggregateKind::Sum,
                AggregateSign::UpperBound,
                initial_bound,
                AggregateSemantics::Implication,
                set_id,
                &literals,
                None,
                // the objective must observe every set literal
                0.0,
            )?;
            minimisation_aggregate = Some(index);
            minimisation_set = Some(literals);
        }

        // definitions
        let definitions = if uses_definitions {
            let mut module = DefinitionPropagator::new(
                engine.internal_parameters.unfounded_check_policy,
                engine.internal_parameters.unfounded_search_strategy,
                engine.internal_parameters.loop_formula_tseitin_threshold,
            );
            for &(definition_id, semantics) in &self.definition_semantics {
                module.set_semantics(definition_id, semantics);
            }
            for rule in &self.rules {
                let head = PropositionalVariable::new(rule.head);
                let body: Vec<Literal> =
                    rule.body.iter().map(|&l| to_engine_literal(l)).collect();
                // single-literal bodies behave conjunctively; empty bodies
                // keep their connective (an empty disjunction is false, an
                // empty conjunction is true)
                let conjunctive = rule.conjunctive || body.len() == 1;
                module.add_rule(Rule {
                    head,
                    body,
                    conjunctive,
                    definition_id: rule.definition_id,
                });
            }
            for &(head, definition_id, aggregate_index) in &definitional_aggregates {
                module.add_aggregate_head(head, definition_id, aggregate_index);
            }
            Some(module)
        } else {
            None
        };

        engine.register_modules(definitions, finite_domain);

        // coordinator watch registration before any theory propagation
        let aggregate_watches = engine.modules.aggregates.trail_literals_to_watch();
        engine.watch_trail_literals(
            crate::engine::propagation::ModuleId::Aggregates,
            &aggregate_watches,
        );
        let finite_domain_watches = engine
            .modules
            .finite_domain
            .as_ref()
            .map(|finite_domain| finite_domain.trail_literals_to_watch());
        if let Some(watches) = finite_domain_watches {
            engine.watch_trail_literals(
                crate::engine::propagation::ModuleId::FiniteDomain,
                &watches,
            );
        }

        if !engine.state.is_infeasible() {
            // completion clauses, dependency analysis, justification bootstrap
            let _ = engine.initialise_definitions_at_root();
        }
        let definition_watches = engine
            .modules
            .definitions
            .as_ref()
            .map(|definitions| definitions.trail_literals_to_watch(&engine.modules.aggregates));
        if let Some(watches) = definition_watches {
            engine.watch_trail_literals(
                crate::engine::propagation::ModuleId::Definitions,
                &watches,
            );
        }
        if !engine.state.is_infeasible() {
            let _ = engine.initialise_aggregates_at_root();
        }
        if !engine.state.is_infeasible() {
            engine.propagate_enqueued();
            if engine.state.conflicting() {
                engine.state.declare_infeasible();
            }
        }

        Ok(Solver::new(
            engine,
            self.num_variables,
            minimisation_aggregate,
            minimisation_set,
        ))
    }
}
