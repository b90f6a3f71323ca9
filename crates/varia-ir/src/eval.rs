//! Three-valued evaluation of constraints against partial assignments.
//!
//! A partial assignment fixes values for some parameters and leaves the
//! rest open. Conditions evaluate with Kleene logic: a comparison on an
//! open parameter is `Unknown`, `False AND x` is `False`, `True OR x` is
//! `True`. A constraint is reported `Unsatisfied` only when every
//! completion of the assignment violates it.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::expr::{CompareOp, Condition, Constraint, ConstraintKind};
use crate::types::{Model, ModelError, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Truth {
    True,
    False,
    Unknown,
}

impl Truth {
    pub fn and(self, other: Truth) -> Truth {
        match (self, other) {
            (Truth::False, _) | (_, Truth::False) => Truth::False,
            (Truth::True, Truth::True) => Truth::True,
            _ => Truth::Unknown,
        }
    }

    pub fn or(self, other: Truth) -> Truth {
        match (self, other) {
            (Truth::True, _) | (_, Truth::True) => Truth::True,
            (Truth::False, Truth::False) => Truth::False,
            _ => Truth::Unknown,
        }
    }

    pub fn negate(self) -> Truth {
        match self {
            Truth::True => Truth::False,
            Truth::False => Truth::True,
            Truth::Unknown => Truth::Unknown,
        }
    }
}

impl From<bool> for Truth {
    fn from(b: bool) -> Self {
        if b {
            Truth::True
        } else {
            Truth::False
        }
    }
}

/// Outcome of checking one constraint against a (possibly partial) assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintEvaluation {
    Satisfied,
    Unsatisfied,
    /// The assignment leaves open parameters the verdict depends on.
    InsufficientData,
}

impl From<Truth> for ConstraintEvaluation {
    fn from(t: Truth) -> Self {
        match t {
            Truth::True => ConstraintEvaluation::Satisfied,
            Truth::False => ConstraintEvaluation::Unsatisfied,
            Truth::Unknown => ConstraintEvaluation::InsufficientData,
        }
    }
}

/// Source of parameter values, indexed by parameter position.
pub trait Assignment {
    /// The value assigned to `parameter`, or `None` if it is still open.
    fn value_of(&self, parameter: usize) -> Option<&Value>;
}

impl Assignment for BTreeMap<usize, Value> {
    fn value_of(&self, parameter: usize) -> Option<&Value> {
        self.get(&parameter)
    }
}

impl Assignment for [Option<Value>] {
    fn value_of(&self, parameter: usize) -> Option<&Value> {
        self.get(parameter).and_then(Option::as_ref)
    }
}

impl Assignment for Vec<Option<Value>> {
    fn value_of(&self, parameter: usize) -> Option<&Value> {
        self.as_slice().value_of(parameter)
    }
}

/// A condition with parameter names resolved to positions.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundCondition {
    Always,
    Never,
    Compare {
        parameter: usize,
        op: CompareOp,
        value: Value,
    },
    CompareParameters {
        left: usize,
        op: CompareOp,
        right: usize,
    },
    OneOf {
        parameter: usize,
        values: Vec<Value>,
    },
    All(Vec<BoundCondition>),
    Any(Vec<BoundCondition>),
    Not(Box<BoundCondition>),
}

fn apply_op(op: CompareOp, lhs: &Value, rhs: &Value) -> bool {
    let ord = lhs.compare(rhs);
    match op {
        CompareOp::Eq => lhs == rhs,
        CompareOp::Ne => lhs != rhs,
        CompareOp::Lt => ord == Some(Ordering::Less),
        CompareOp::Le => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
        CompareOp::Gt => ord == Some(Ordering::Greater),
        CompareOp::Ge => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
    }
}

impl BoundCondition {
    pub fn bind(condition: &Condition, model: &Model, label: &str) -> Result<Self, ModelError> {
        let resolve = |name: &str| {
            model
                .parameter_index(name)
                .ok_or_else(|| ModelError::UnknownParameter {
                    constraint: label.to_string(),
                    parameter: name.to_string(),
                })
        };

        Ok(match condition {
            Condition::Always => BoundCondition::Always,
            Condition::Never => BoundCondition::Never,
            Condition::Compare {
                parameter,
                op,
                value,
            } => BoundCondition::Compare {
                parameter: resolve(parameter.as_str())?,
                op: *op,
                value: value.clone(),
            },
            Condition::CompareParameters { left, op, right } => BoundCondition::CompareParameters {
                left: resolve(left.as_str())?,
                op: *op,
                right: resolve(right.as_str())?,
            },
            Condition::OneOf { parameter, values } => BoundCondition::OneOf {
                parameter: resolve(parameter.as_str())?,
                values: values.clone(),
            },
            Condition::All(args) => BoundCondition::All(
                args.iter()
                    .map(|a| BoundCondition::bind(a, model, label))
                    .collect::<Result<_, _>>()?,
            ),
            Condition::Any(args) => BoundCondition::Any(
                args.iter()
                    .map(|a| BoundCondition::bind(a, model, label))
                    .collect::<Result<_, _>>()?,
            ),
            Condition::Not(inner) => {
                BoundCondition::Not(Box::new(BoundCondition::bind(inner, model, label)?))
            }
        })
    }

    pub fn evaluate<A: Assignment + ?Sized>(&self, assignment: &A) -> Truth {
        match self {
            BoundCondition::Always => Truth::True,
            BoundCondition::Never => Truth::False,
            BoundCondition::Compare {
                parameter,
                op,
                value,
            } => match assignment.value_of(*parameter) {
                Some(actual) => apply_op(*op, actual, value).into(),
                None => Truth::Unknown,
            },
            BoundCondition::CompareParameters { left, op, right } => {
                match (assignment.value_of(*left), assignment.value_of(*right)) {
                    (Some(l), Some(r)) => apply_op(*op, l, r).into(),
                    _ => Truth::Unknown,
                }
            }
            BoundCondition::OneOf { parameter, values } => match assignment.value_of(*parameter) {
                Some(actual) => values.contains(actual).into(),
                None => Truth::Unknown,
            },
            BoundCondition::All(args) => args
                .iter()
                .fold(Truth::True, |acc, a| acc.and(a.evaluate(assignment))),
            BoundCondition::Any(args) => args
                .iter()
                .fold(Truth::False, |acc, a| acc.or(a.evaluate(assignment))),
            BoundCondition::Not(inner) => inner.evaluate(assignment).negate(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoundKind {
    Predicate(BoundCondition),
    IfThen(BoundCondition, BoundCondition),
    IfThenElse(BoundCondition, BoundCondition, BoundCondition),
}

/// A constraint bound to a specific model.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundConstraint {
    /// Name or position, for diagnostics.
    pub label: String,
    /// Referenced parameter positions, ascending.
    pub parameters: Vec<usize>,
    pub kind: BoundKind,
}

impl BoundConstraint {
    pub fn bind(constraint: &Constraint, position: usize, model: &Model) -> Result<Self, ModelError> {
        let label = constraint.label(position);
        let bind = |c: &Condition| BoundCondition::bind(c, model, &label);

        let kind = match &constraint.kind {
            ConstraintKind::Predicate { condition } => BoundKind::Predicate(bind(condition)?),
            ConstraintKind::IfThen { condition, then } => {
                BoundKind::IfThen(bind(condition)?, bind(then)?)
            }
            ConstraintKind::IfThenElse {
                condition,
                then,
                otherwise,
            } => BoundKind::IfThenElse(bind(condition)?, bind(then)?, bind(otherwise)?),
        };

        let mut parameters: Vec<usize> = constraint
            .parameters()
            .into_iter()
            .filter_map(|name| model.parameter_index(name))
            .collect();
        parameters.sort_unstable();
        parameters.dedup();

        Ok(Self {
            label,
            parameters,
            kind,
        })
    }

    pub fn evaluate<A: Assignment + ?Sized>(&self, assignment: &A) -> ConstraintEvaluation {
        let truth = match &self.kind {
            BoundKind::Predicate(c) => c.evaluate(assignment),
            BoundKind::IfThen(c, t) => c.evaluate(assignment).negate().or(t.evaluate(assignment)),
            BoundKind::IfThenElse(c, t, e) => {
                let cond = c.evaluate(assignment);
                cond.and(t.evaluate(assignment))
                    .or(cond.negate().and(e.evaluate(assignment)))
            }
        };
        truth.into()
    }
}

/// Bind every constraint of `model`, in declaration order.
pub fn bind_constraints(model: &Model) -> Result<Vec<BoundConstraint>, ModelError> {
    model
        .constraints
        .iter()
        .enumerate()
        .map(|(position, c)| BoundConstraint::bind(c, position, model))
        .collect()
}
