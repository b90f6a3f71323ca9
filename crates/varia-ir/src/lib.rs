//! Parameter model for combinatorial variation generation: parameters and
//! their value domains, constraints between them, and the three-valued
//! constraint evaluation the generation engine builds on.

pub mod eval;
pub mod expr;
pub mod parse;
pub mod types;

pub use eval::{Assignment, BoundConstraint, ConstraintEvaluation, Truth};
pub use expr::{CompareOp, Condition, Constraint, ConstraintKind};
pub use parse::{parse_model, ParseError};
pub use types::{Model, ModelError, Parameter, ParameterValue, Value, DEFAULT_WEIGHT};
