//! Turning value-index rows back into named variations, and optionally into
//! caller-defined typed results.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use varia_ir::{Model, Value};

/// One generated test configuration: a value per parameter, in model order,
/// plus the variation's tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variation {
    pub values: IndexMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<Value>,
}

impl Variation {
    /// Build from one value index per parameter.
    ///
    /// The tag is the single distinguishing tag among the chosen values, or
    /// the model's default tag when no chosen value carries one.
    pub(crate) fn from_indices(model: &Model, indices: &[usize]) -> Self {
        let default_tag = model.default_tag.as_ref();
        let mut values = IndexMap::with_capacity(indices.len());
        let mut tag = None;
        for (parameter, &index) in model.parameters.iter().zip(indices) {
            let pv = &parameter.values[index];
            if let Some(t) = pv.distinguishing_tag(default_tag) {
                tag = Some(t.clone());
            }
            values.insert(parameter.name.clone(), pv.value.clone());
        }
        Self {
            values,
            tag: tag.or_else(|| model.default_tag.clone()),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MappingError {
    #[error("parameter '{parameter}' has no matching field on {target}")]
    UnmatchedParameter {
        parameter: String,
        target: &'static str,
    },

    #[error("field '{field}' cannot hold value {value}: {reason}")]
    InvalidValue {
        field: String,
        value: Value,
        reason: String,
    },
}

impl MappingError {
    /// Convenience for `assign` implementations rejecting a value's kind.
    pub fn invalid(field: &str, value: &Value, expected: &str) -> Self {
        MappingError::InvalidValue {
            field: field.to_string(),
            value: value.clone(),
            reason: format!("expected {expected}, got {}", value.kind()),
        }
    }
}

/// A result type that variations can be written into field by field.
///
/// Parameters are matched to `FIELDS` case-insensitively; `assign` receives
/// the field name as spelled in `FIELDS`.
pub trait FromVariation: Default {
    const FIELDS: &'static [&'static str];

    fn assign(&mut self, field: &str, value: &Value) -> Result<(), MappingError>;
}

/// Field of `T` that a parameter name maps to.
pub fn field_for<T: FromVariation>(parameter: &str) -> Result<&'static str, MappingError> {
    T::FIELDS
        .iter()
        .copied()
        .find(|f| f.eq_ignore_ascii_case(parameter))
        .ok_or_else(|| MappingError::UnmatchedParameter {
            parameter: parameter.to_string(),
            target: std::any::type_name::<T>(),
        })
}

/// A typed result together with the tag of the variation it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedVariation<T> {
    pub value: T,
    pub tag: Option<Value>,
}

/// Write every variation into a fresh `T`.
///
/// Every model parameter must match a field of `T`, checked before any
/// variation is mapped.
pub fn map_variations<T: FromVariation>(
    model: &Model,
    variations: &[Variation],
) -> Result<Vec<TypedVariation<T>>, MappingError> {
    let fields = model
        .parameters
        .iter()
        .map(|p| Ok((p.name.as_str(), field_for::<T>(&p.name)?)))
        .collect::<Result<Vec<_>, MappingError>>()?;

    variations
        .iter()
        .map(|variation| {
            let mut value = T::default();
            for &(parameter, field) in &fields {
                if let Some(v) = variation.get(parameter) {
                    value.assign(field, v)?;
                }
            }
            Ok(TypedVariation {
                value,
                tag: variation.tag.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use varia_ir::{Parameter, ParameterValue};

    #[derive(Debug, Default, PartialEq)]
    struct Machine {
        os: String,
        memory: i64,
    }

    impl FromVariation for Machine {
        const FIELDS: &'static [&'static str] = &["os", "memory"];

        fn assign(&mut self, field: &str, value: &Value) -> Result<(), MappingError> {
            match field {
                "os" => {
                    self.os = value
                        .as_str()
                        .ok_or_else(|| MappingError::invalid(field, value, "string"))?
                        .to_string()
                }
                "memory" => {
                    self.memory = value
                        .as_int()
                        .ok_or_else(|| MappingError::invalid(field, value, "integer"))?
                }
                _ => {}
            }
            Ok(())
        }
    }

    fn model() -> Model {
        Model::new(vec![
            Parameter::new("OS").with_values(["Win", "Linux"]),
            Parameter::new("Memory")
                .with_value(1024)
                .with_value(ParameterValue::new(0).with_tag("invalid")),
        ])
        .with_default_tag("valid")
    }

    #[test]
    fn test_from_indices_unwraps_values_and_tags() {
        let model = model();
        let plain = Variation::from_indices(&model, &[1, 0]);
        assert_eq!(plain.get("OS"), Some(&Value::from("Linux")));
        assert_eq!(plain.get("Memory"), Some(&Value::Int(1024)));
        assert_eq!(plain.tag, Some(Value::from("valid")));

        let tagged = Variation::from_indices(&model, &[0, 1]);
        assert_eq!(tagged.tag, Some(Value::from("invalid")));
        let names: Vec<&str> = tagged.values.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["OS", "Memory"]);
    }

    #[test]
    fn test_map_matches_case_insensitively() {
        let model = model();
        let variations = vec![Variation::from_indices(&model, &[0, 0])];
        let typed = map_variations::<Machine>(&model, &variations).unwrap();
        assert_eq!(
            typed[0].value,
            Machine {
                os: "Win".into(),
                memory: 1024
            }
        );
        assert_eq!(typed[0].tag, Some(Value::from("valid")));
    }

    #[test]
    fn test_unmatched_parameter() {
        let model = Model::new(vec![Parameter::new("Cpu").with_values([1])]);
        let err = map_variations::<Machine>(&model, &[]).unwrap_err();
        assert!(matches!(err, MappingError::UnmatchedParameter { ref parameter, .. } if parameter == "Cpu"));
    }

    #[test]
    fn test_wrong_kind_rejected() {
        let model = Model::new(vec![Parameter::new("memory").with_values(["lots"])]);
        let variations = vec![Variation::from_indices(&model, &[0])];
        let err = map_variations::<Machine>(&model, &variations).unwrap_err();
        assert!(matches!(err, MappingError::InvalidValue { .. }));
    }

    #[test]
    fn test_variation_json_shape() {
        let model = model();
        let json = serde_json::to_value(Variation::from_indices(&model, &[0, 1])).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"values": {"OS": "Win", "Memory": 0}, "tag": "invalid"})
        );
    }
}
