use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::expr::Constraint;

/// A concrete parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Name of the value kind, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Str(_) => "string",
        }
    }

    /// Ordering between two values of the same kind. Values of different
    /// kinds are unordered.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

/// Default selection weight of a parameter value.
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// A value in a parameter's domain, optionally weighted and tagged.
///
/// The weight is a relative preference used to break ties during generation.
/// A tag marks every variation the value lands in; at most one tagged value
/// (tag differing from the model's default tag) appears per variation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawParameterValue")]
pub struct ParameterValue {
    pub value: Value,
    pub weight: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<Value>,
}

impl ParameterValue {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            weight: DEFAULT_WEIGHT,
            tag: None,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<Value>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// The value's tag if it is distinct from `default_tag`.
    pub fn distinguishing_tag(&self, default_tag: Option<&Value>) -> Option<&Value> {
        match &self.tag {
            Some(tag) if Some(tag) != default_tag => Some(tag),
            _ => None,
        }
    }
}

macro_rules! parameter_value_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ParameterValue {
                fn from(value: $ty) -> Self {
                    ParameterValue::new(value)
                }
            }
        )*
    };
}

parameter_value_from!(Value, bool, i64, i32, u32, &str, String);

/// JSON accepts either a bare value or a `{ value, weight, tag }` object.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawParameterValue {
    Bare(Value),
    Wrapped {
        value: Value,
        #[serde(default = "default_weight")]
        weight: f64,
        #[serde(default)]
        tag: Option<Value>,
    },
}

fn default_weight() -> f64 {
    DEFAULT_WEIGHT
}

impl From<RawParameterValue> for ParameterValue {
    fn from(raw: RawParameterValue) -> Self {
        match raw {
            RawParameterValue::Bare(value) => ParameterValue::new(value),
            RawParameterValue::Wrapped { value, weight, tag } => ParameterValue { value, weight, tag },
        }
    }
}

/// A named variable and its ordered domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub values: Vec<ParameterValue>,
}

impl Parameter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
        }
    }

    /// Append plain values.
    pub fn with_values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ParameterValue>,
    {
        self.values.extend(values.into_iter().map(Into::into));
        self
    }

    /// Append a single (possibly weighted or tagged) value.
    pub fn with_value(mut self, value: impl Into<ParameterValue>) -> Self {
        self.values.push(value.into());
        self
    }

    pub fn count(&self) -> usize {
        self.values.len()
    }

    pub fn get_at(&self, index: usize) -> Option<&ParameterValue> {
        self.values.get(index)
    }

    /// Whether any value of this parameter carries a tag distinct from `default_tag`.
    pub fn has_distinguishing_tags(&self, default_tag: Option<&Value>) -> bool {
        self.values
            .iter()
            .any(|v| v.distinguishing_tag(default_tag).is_some())
    }
}

/// Errors in model configuration. These are caller mistakes and surface
/// before any generation work starts.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("parameter at position {position} has an empty name")]
    EmptyParameterName { position: usize },

    #[error("duplicate parameter name '{0}'")]
    DuplicateParameter(String),

    #[error("parameter '{0}' has no values")]
    EmptyParameter(String),

    #[error("value {index} of parameter '{parameter}' has invalid weight {weight}")]
    InvalidWeight {
        parameter: String,
        index: usize,
        weight: f64,
    },

    #[error("value {index} of parameter '{parameter}' repeats an earlier value")]
    DuplicateValue { parameter: String, index: usize },

    #[error("constraint '{constraint}' references unknown parameter '{parameter}'")]
    UnknownParameter { constraint: String, parameter: String },
}

/// Parameters, the constraints between them and the tag reported by
/// variations that contain no tagged value.
///
/// Parameter order is significant: a parameter's position is the index the
/// engine uses for it everywhere.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub default_tag: Option<Value>,
}

impl Model {
    pub fn new(parameters: Vec<Parameter>) -> Self {
        Self {
            parameters,
            constraints: Vec::new(),
            default_tag: None,
        }
    }

    pub fn with_constraint(mut self, constraint: impl Into<Constraint>) -> Self {
        self.constraints.push(constraint.into());
        self
    }

    pub fn with_constraints(mut self, constraints: impl IntoIterator<Item = Constraint>) -> Self {
        self.constraints.extend(constraints);
        self
    }

    pub fn with_default_tag(mut self, tag: impl Into<Value>) -> Self {
        self.default_tag = Some(tag.into());
        self
    }

    pub fn parameter_index(&self, name: &str) -> Option<usize> {
        self.parameters.iter().position(|p| p.name == name)
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Number of variations in the full cartesian product, saturating at `usize::MAX`.
    pub fn exhaustive_count(&self) -> usize {
        self.parameters
            .iter()
            .fold(1usize, |acc, p| acc.saturating_mul(p.count()))
    }

    /// Check names, domains, weights and constraint references.
    pub fn validate(&self) -> Result<(), ModelError> {
        let mut seen = HashSet::new();
        for (position, parameter) in self.parameters.iter().enumerate() {
            if parameter.name.is_empty() {
                return Err(ModelError::EmptyParameterName { position });
            }
            if !seen.insert(parameter.name.as_str()) {
                return Err(ModelError::DuplicateParameter(parameter.name.clone()));
            }
            if parameter.values.is_empty() {
                return Err(ModelError::EmptyParameter(parameter.name.clone()));
            }
            let mut values = HashSet::new();
            for (index, value) in parameter.values.iter().enumerate() {
                if !values.insert(&value.value) {
                    return Err(ModelError::DuplicateValue {
                        parameter: parameter.name.clone(),
                        index,
                    });
                }
                if !value.weight.is_finite() || value.weight < 0.0 {
                    return Err(ModelError::InvalidWeight {
                        parameter: parameter.name.clone(),
                        index,
                        weight: value.weight,
                    });
                }
            }
        }

        for (position, constraint) in self.constraints.iter().enumerate() {
            for name in constraint.parameters() {
                if self.parameter_index(name).is_none() {
                    return Err(ModelError::UnknownParameter {
                        constraint: constraint.label(position),
                        parameter: name.to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Condition;

    fn os_mem() -> Model {
        Model::new(vec![
            Parameter::new("OS").with_values(["A", "B"]),
            Parameter::new("Mem").with_values([1, 2]),
        ])
    }

    #[test]
    fn test_exhaustive_count() {
        assert_eq!(os_mem().exhaustive_count(), 4);
    }

    #[test]
    fn test_validate_ok() {
        assert!(os_mem().validate().is_ok());
    }

    #[test]
    fn test_validate_duplicate() {
        let mut model = os_mem();
        model.parameters.push(Parameter::new("OS").with_values(["C"]));
        assert_eq!(
            model.validate(),
            Err(ModelError::DuplicateParameter("OS".into()))
        );
    }

    #[test]
    fn test_validate_duplicate_value() {
        let model = Model::new(vec![
            Parameter::new("X")
                .with_value(1)
                .with_value(ParameterValue::new(1).with_weight(2.0)),
            Parameter::new("Y").with_values([0, 1]),
        ]);
        assert_eq!(
            model.validate(),
            Err(ModelError::DuplicateValue {
                parameter: "X".into(),
                index: 1
            })
        );
    }

    #[test]
    fn test_validate_empty_domain() {
        let mut model = os_mem();
        model.parameters.push(Parameter::new("Disk"));
        assert_eq!(model.validate(), Err(ModelError::EmptyParameter("Disk".into())));
    }

    #[test]
    fn test_validate_bad_weight() {
        let model = Model::new(vec![Parameter::new("X")
            .with_value(ParameterValue::new(0).with_weight(-1.0))]);
        assert!(matches!(
            model.validate(),
            Err(ModelError::InvalidWeight { index: 0, .. })
        ));
    }

    #[test]
    fn test_validate_unknown_constraint_parameter() {
        let model = os_mem().with_constraint(
            Constraint::when(Condition::eq("OS", "A")).then(Condition::eq("Cpu", 4)),
        );
        assert!(matches!(
            model.validate(),
            Err(ModelError::UnknownParameter { ref parameter, .. }) if parameter == "Cpu"
        ));
    }

    #[test]
    fn test_value_compare_mixed_kinds() {
        assert_eq!(Value::Int(1).compare(&Value::Str("1".into())), None);
        assert_eq!(Value::Int(1).compare(&Value::Int(2)), Some(Ordering::Less));
    }

    #[test]
    fn test_distinguishing_tag() {
        let default = Value::Bool(false);
        let plain = ParameterValue::new(1).with_tag(false);
        let tagged = ParameterValue::new(2).with_tag(true);
        assert_eq!(plain.distinguishing_tag(Some(&default)), None);
        assert_eq!(tagged.distinguishing_tag(Some(&default)), Some(&Value::Bool(true)));
        assert_eq!(ParameterValue::new(3).distinguishing_tag(None), None);
    }
}
