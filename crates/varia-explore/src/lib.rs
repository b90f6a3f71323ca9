//! Combinatorial variation generation.
//!
//! Given a [`Model`](varia_ir::Model), produces a small set of variations in
//! which every `order`-wise combination of parameter values that the
//! constraints allow appears at least once, and no disallowed combination
//! appears at all.
//!
//! ```no_run
//! use varia_explore::GenerateVariations;
//! use varia_ir::{Model, Parameter};
//!
//! let model = Model::new(vec![
//!     Parameter::new("OS").with_values(["Windows", "Linux"]),
//!     Parameter::new("Memory").with_values([1024, 2048]),
//! ]);
//! for variation in model.generate_variations(2)? {
//!     println!("{:?}", variation.values);
//! }
//! # Ok::<(), varia_explore::GenerationError>(())
//! ```

pub mod combinatorics;
pub mod coverage;
pub mod mapping;
pub mod pipeline;
pub mod resolve;
pub mod rng;
pub mod schema;
pub mod search;
pub mod table;
pub mod weighted;

pub use coverage::{find_violations, verify_coverage, CoveragePoint, CoverageSummary, Violation};
pub use mapping::{map_variations, FromVariation, MappingError, TypedVariation, Variation};
pub use pipeline::{
    generate, generate_with_report, GenerateVariations, GenerationConfig, GenerationError,
    GenerationReport, DEFAULT_ORDER,
};
pub use resolve::ResolutionStats;
pub use rng::DEFAULT_SEED;
pub use schema::{FieldSpec, ModelSchema, SchemaError};
pub use search::InternalFault;

/// [`GenerateVariations::generate_variations`] as a free function.
pub fn generate_variations(
    model: &varia_ir::Model,
    order: usize,
) -> Result<Vec<Variation>, GenerationError> {
    model.generate_variations(order)
}

/// [`GenerateVariations::generate_variations_with_seed`] as a free function.
pub fn generate_variations_with_seed(
    model: &varia_ir::Model,
    order: usize,
    seed: u64,
) -> Result<Vec<Variation>, GenerationError> {
    model.generate_variations_with_seed(order, seed)
}
