//! End-to-end generation: validate -> build table -> resolve -> search -> map.

use serde::{Deserialize, Serialize};
use varia_ir::{Model, ModelError};

use crate::coverage::CoverageSummary;
use crate::mapping::Variation;
use crate::resolve::{collect_rules, resolve, ResolutionStats, Rule};
use crate::rng::DEFAULT_SEED;
use crate::search::{InternalFault, VariationSearch};
use crate::table::InteractionTable;

/// Pairwise.
pub const DEFAULT_ORDER: usize = 2;

/// Generation settings, loadable from JSON.
///
/// ```json
/// { "order": 3, "seed": 42 }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_order")]
    pub order: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_order() -> usize {
    DEFAULT_ORDER
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            order: DEFAULT_ORDER,
            seed: DEFAULT_SEED,
        }
    }
}

impl GenerationConfig {
    pub fn with_order(order: usize) -> Self {
        Self {
            order,
            ..Self::default()
        }
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationError {
    #[error("invalid model: {0}")]
    Model(#[from] ModelError),

    #[error("order {order} is out of range 1..={parameters}")]
    OrderOutOfRange { order: usize, parameters: usize },

    #[error("internal fault: {0}")]
    Internal(#[from] InternalFault),
}

impl GenerationError {
    /// A defect in the engine rather than a problem with the input.
    pub fn is_internal(&self) -> bool {
        matches!(self, GenerationError::Internal(_))
    }
}

/// Output of [`generate_with_report`].
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationReport {
    pub variations: Vec<Variation>,
    pub coverage: CoverageSummary,
    pub resolution: ResolutionStats,
}

/// Validate the model and order, then build and resolve the interaction table.
pub(crate) fn prepare(
    model: &Model,
    order: usize,
) -> Result<(InteractionTable, Vec<Rule>, ResolutionStats), GenerationError> {
    model.validate()?;
    let parameters = model.parameters.len();
    if order == 0 || order > parameters {
        return Err(GenerationError::OrderOutOfRange { order, parameters });
    }

    let rules = collect_rules(model)?;
    let mut table = InteractionTable::build(model, order);
    tracing::debug!(
        parameters,
        order,
        interactions = table.interactions.len(),
        combinations = table.combination_count(),
        rules = rules.len(),
        "built interaction table"
    );

    let stats = resolve(&mut table, &rules, model);
    Ok((table, rules, stats))
}

/// Generate variations and report how the table ended up.
pub fn generate_with_report(
    model: &Model,
    config: &GenerationConfig,
) -> Result<GenerationReport, GenerationError> {
    let (table, rules, resolution) = prepare(model, config.order)?;
    let (rows, table) = VariationSearch::new(model, table, &rules, config.seed).run()?;

    let variations: Vec<Variation> = rows
        .iter()
        .map(|indices| Variation::from_indices(model, indices))
        .collect();
    let coverage = CoverageSummary::of(&table);
    tracing::info!(
        variations = variations.len(),
        covered = coverage.covered,
        excluded = coverage.excluded,
        order = config.order,
        seed = config.seed,
        "generation complete"
    );

    Ok(GenerationReport {
        variations,
        coverage,
        resolution,
    })
}

pub fn generate(model: &Model, config: &GenerationConfig) -> Result<Vec<Variation>, GenerationError> {
    generate_with_report(model, config).map(|report| report.variations)
}

/// Generation entry points on [`Model`].
pub trait GenerateVariations {
    /// Generate `order`-wise variations with [`DEFAULT_SEED`].
    fn generate_variations(&self, order: usize) -> Result<Vec<Variation>, GenerationError>;

    fn generate_variations_with_seed(
        &self,
        order: usize,
        seed: u64,
    ) -> Result<Vec<Variation>, GenerationError>;
}

impl GenerateVariations for Model {
    fn generate_variations(&self, order: usize) -> Result<Vec<Variation>, GenerationError> {
        self.generate_variations_with_seed(order, DEFAULT_SEED)
    }

    fn generate_variations_with_seed(
        &self,
        order: usize,
        seed: u64,
    ) -> Result<Vec<Variation>, GenerationError> {
        generate(self, &GenerationConfig::with_order(order).seed(seed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use varia_ir::Parameter;

    fn model() -> Model {
        Model::new(vec![
            Parameter::new("A").with_values([0, 1]),
            Parameter::new("B").with_values([0, 1, 2]),
        ])
    }

    #[test]
    fn test_config_defaults() {
        let config: GenerationConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, GenerationConfig::default());
        assert_eq!(config.order, 2);
        assert_eq!(config.seed, DEFAULT_SEED);

        let config: GenerationConfig = serde_json::from_str(r#"{"seed": 9}"#).unwrap();
        assert_eq!(config, GenerationConfig::with_order(2).seed(9));
    }

    #[test]
    fn test_order_bounds() {
        let model = model();
        for order in [0, 3] {
            let err = model.generate_variations(order).unwrap_err();
            assert_eq!(err, GenerationError::OrderOutOfRange { order, parameters: 2 });
            assert!(!err.is_internal());
        }
        assert!(model.generate_variations(1).is_ok());
        assert!(model.generate_variations(2).is_ok());
    }

    #[test]
    fn test_invalid_model_rejected() {
        let model = Model::new(vec![Parameter::new("A")]);
        let err = model.generate_variations(1).unwrap_err();
        assert!(matches!(err, GenerationError::Model(ModelError::EmptyParameter(_))));
    }

    #[test]
    fn test_report_counts() {
        let report = generate_with_report(&model(), &GenerationConfig::default()).unwrap();
        assert_eq!(report.variations.len(), 6);
        assert_eq!(report.coverage.covered, 6);
        assert_eq!(report.coverage.uncovered, 0);
        assert_eq!(report.coverage.ratio(), 1.0);
        assert_eq!(report.resolution, ResolutionStats::default());
    }

    #[test]
    fn test_internal_classification() {
        let err = GenerationError::from(InternalFault::ExhaustiveBoundExceeded {
            generated: 5,
            bound: 4,
        });
        assert!(err.is_internal());
    }
}
