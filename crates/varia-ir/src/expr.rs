use serde::{Deserialize, Serialize};

use crate::types::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Boolean expression over the values of one prospective variation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Always,
    Never,
    /// Parameter value compared against a literal.
    Compare {
        parameter: String,
        op: CompareOp,
        value: Value,
    },
    /// Two parameter values compared against each other.
    CompareParameters {
        left: String,
        op: CompareOp,
        right: String,
    },
    /// Parameter value is one of the listed literals.
    OneOf {
        parameter: String,
        values: Vec<Value>,
    },
    All(Vec<Condition>),
    Any(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    pub fn compare(parameter: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Condition::Compare {
            parameter: parameter.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(parameter: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(parameter, CompareOp::Eq, value)
    }

    pub fn ne(parameter: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(parameter, CompareOp::Ne, value)
    }

    pub fn lt(parameter: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(parameter, CompareOp::Lt, value)
    }

    pub fn le(parameter: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(parameter, CompareOp::Le, value)
    }

    pub fn gt(parameter: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(parameter, CompareOp::Gt, value)
    }

    pub fn ge(parameter: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(parameter, CompareOp::Ge, value)
    }

    pub fn parameters_compare(
        left: impl Into<String>,
        op: CompareOp,
        right: impl Into<String>,
    ) -> Self {
        Condition::CompareParameters {
            left: left.into(),
            op,
            right: right.into(),
        }
    }

    pub fn one_of<I, V>(parameter: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Condition::OneOf {
            parameter: parameter.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Conjunction, flattening nested `All`.
    pub fn and(self, other: Condition) -> Self {
        match self {
            Condition::All(mut args) => {
                args.push(other);
                Condition::All(args)
            }
            first => Condition::All(vec![first, other]),
        }
    }

    /// Disjunction, flattening nested `Any`.
    pub fn or(self, other: Condition) -> Self {
        match self {
            Condition::Any(mut args) => {
                args.push(other);
                Condition::Any(args)
            }
            first => Condition::Any(vec![first, other]),
        }
    }

    /// Referenced parameter names, in first-appearance order.
    pub fn parameters(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_parameters(&mut out);
        out
    }

    fn collect_parameters<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Condition::Always | Condition::Never => {}
            Condition::Compare { parameter, .. } | Condition::OneOf { parameter, .. } => {
                push_unique(out, parameter);
            }
            Condition::CompareParameters { left, right, .. } => {
                push_unique(out, left);
                push_unique(out, right);
            }
            Condition::All(args) | Condition::Any(args) => {
                for arg in args {
                    arg.collect_parameters(out);
                }
            }
            Condition::Not(inner) => inner.collect_parameters(out),
        }
    }
}

fn push_unique<'a>(out: &mut Vec<&'a str>, name: &'a str) {
    if !out.contains(&name) {
        out.push(name);
    }
}

impl std::ops::Not for Condition {
    type Output = Condition;

    fn not(self) -> Condition {
        Condition::Not(Box::new(self))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConstraintKind {
    /// The condition must hold.
    Predicate { condition: Condition },
    /// When `condition` holds, `then` must hold.
    IfThen { condition: Condition, then: Condition },
    /// When `condition` holds, `then` must hold; otherwise `otherwise` must.
    IfThenElse {
        condition: Condition,
        then: Condition,
        otherwise: Condition,
    },
}

/// A rule restricting which value combinations may appear together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub kind: ConstraintKind,
}

impl Constraint {
    pub fn predicate(condition: Condition) -> Self {
        Self {
            name: None,
            kind: ConstraintKind::Predicate { condition },
        }
    }

    /// Start an if-then constraint.
    pub fn when(condition: Condition) -> When {
        When { condition }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Referenced parameter names, in first-appearance order.
    pub fn parameters(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        let parts: Vec<&Condition> = match &self.kind {
            ConstraintKind::Predicate { condition } => vec![condition],
            ConstraintKind::IfThen { condition, then } => vec![condition, then],
            ConstraintKind::IfThenElse {
                condition,
                then,
                otherwise,
            } => vec![condition, then, otherwise],
        };
        for part in parts {
            part.collect_parameters(&mut out);
        }
        out
    }

    /// Human-readable label: the name if present, else the position.
    pub fn label(&self, position: usize) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("#{position}"),
        }
    }
}

/// `If(condition)` half of an if-then constraint.
#[derive(Debug, Clone)]
pub struct When {
    condition: Condition,
}

impl When {
    pub fn then(self, then: Condition) -> WhenThen {
        WhenThen {
            condition: self.condition,
            then,
            name: None,
        }
    }
}

/// A complete if-then constraint that may still take an else branch.
#[derive(Debug, Clone)]
pub struct WhenThen {
    condition: Condition,
    then: Condition,
    name: Option<String>,
}

impl WhenThen {
    pub fn otherwise(self, otherwise: Condition) -> Constraint {
        Constraint {
            name: self.name,
            kind: ConstraintKind::IfThenElse {
                condition: self.condition,
                then: self.then,
                otherwise,
            },
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl From<WhenThen> for Constraint {
    fn from(w: WhenThen) -> Self {
        Constraint {
            name: w.name,
            kind: ConstraintKind::IfThen {
                condition: w.condition,
                then: w.then,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_if_then() {
        let c: Constraint = Constraint::when(Condition::eq("X", 0))
            .then(Condition::eq("Y", 1))
            .into();
        assert!(matches!(c.kind, ConstraintKind::IfThen { .. }));
        assert_eq!(c.parameters(), vec!["X", "Y"]);
    }

    #[test]
    fn test_builder_if_then_else() {
        let c = Constraint::when(Condition::eq("X", 0))
            .then(Condition::eq("Y", 1))
            .otherwise(Condition::eq("Z", 2).and(Condition::ne("X", 3)));
        assert!(matches!(c.kind, ConstraintKind::IfThenElse { .. }));
        assert_eq!(c.parameters(), vec!["X", "Y", "Z"]);
    }

    #[test]
    fn test_and_or_flatten() {
        let c = Condition::eq("A", 1)
            .and(Condition::eq("B", 1))
            .and(Condition::eq("C", 1));
        match c {
            Condition::All(args) => assert_eq!(args.len(), 3),
            other => panic!("expected All, got {other:?}"),
        }
        let d = Condition::eq("A", 1).or(Condition::eq("B", 1)).or(!Condition::Always);
        match d {
            Condition::Any(args) => assert_eq!(args.len(), 3),
            other => panic!("expected Any, got {other:?}"),
        }
    }

    #[test]
    fn test_constraint_json_shape() {
        let c = Constraint::predicate(Condition::ne("OS", "A")).named("no_a");
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["type"], "predicate");
        assert_eq!(json["name"], "no_a");
        assert_eq!(json["condition"]["compare"]["op"], "ne");

        let back: Constraint = serde_json::from_value(json).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn test_parameters_compare_lists_both() {
        let c = Condition::parameters_compare("A", CompareOp::Lt, "B");
        assert_eq!(c.parameters(), vec!["A", "B"]);
    }
}
