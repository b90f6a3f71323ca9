//! Declarative model description.
//!
//! A schema lists result fields in order. Each field contributes its plain
//! values, plus one value drawn from each of its equivalence classes. Draws
//! use the equivalence-class RNG stage, so a schema builds the same model
//! for the same seed.

use rand::Rng;
use serde::{Deserialize, Serialize};
use varia_ir::{Constraint, Model, ModelError, Parameter, ParameterValue, Value};

use crate::mapping::{field_for, FromVariation, MappingError};
use crate::rng::{stage_rng, Stage};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(default)]
    pub values: Vec<ParameterValue>,
    /// Interchangeable values; one per class is used.
    #[serde(default)]
    pub equivalence_classes: Vec<Vec<ParameterValue>>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
            equivalence_classes: Vec::new(),
        }
    }

    pub fn with_values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ParameterValue>,
    {
        self.values.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn with_equivalence_class<I, V>(mut self, class: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ParameterValue>,
    {
        self.equivalence_classes
            .push(class.into_iter().map(Into::into).collect());
        self
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("field '{field}': equivalence class {class} is empty")]
    EmptyEquivalenceClass { field: String, class: usize },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Mapping(#[from] MappingError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSchema {
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub default_tag: Option<Value>,
}

impl ModelSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    pub fn with_constraint(mut self, constraint: impl Into<Constraint>) -> Self {
        self.constraints.push(constraint.into());
        self
    }

    pub fn with_default_tag(mut self, tag: impl Into<Value>) -> Self {
        self.default_tag = Some(tag.into());
        self
    }

    /// Build a validated model, drawing equivalence-class representatives
    /// with `seed`.
    pub fn build(&self, seed: u64) -> Result<Model, SchemaError> {
        let mut rng = stage_rng(seed, Stage::EquivalenceClasses);
        let mut parameters = Vec::with_capacity(self.fields.len());

        for field in &self.fields {
            let mut values = field.values.clone();
            for (class, members) in field.equivalence_classes.iter().enumerate() {
                if members.is_empty() {
                    return Err(SchemaError::EmptyEquivalenceClass {
                        field: field.name.clone(),
                        class,
                    });
                }
                let pick = rng.gen_range(0..members.len());
                values.push(members[pick].clone());
            }
            parameters.push(Parameter {
                name: field.name.clone(),
                values,
            });
        }

        let model = Model {
            parameters,
            constraints: self.constraints.clone(),
            default_tag: self.default_tag.clone(),
        };
        model.validate()?;
        Ok(model)
    }

    /// [`build`](Self::build), also requiring every field to exist on `T`.
    pub fn build_for<T: FromVariation>(&self, seed: u64) -> Result<Model, SchemaError> {
        for field in &self.fields {
            field_for::<T>(&field.name)?;
        }
        self.build(seed)
    }
}
