//! Coverage accounting and independent checks of generated variations.
//!
//! - **summary**: per-state combination counts of a finished table.
//! - **verify**: rebuilds the resolved table and lists every non-excluded
//!   combination no variation contains.
//! - **violations**: evaluates every rule against every variation.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use varia_ir::{ConstraintEvaluation, Model, Value};

use crate::mapping::Variation;
use crate::pipeline::{prepare, GenerationError};
use crate::resolve::collect_rules;
use crate::table::{CombinationState, InteractionTable};

/// Combination counts of an interaction table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageSummary {
    pub order: usize,
    pub interactions: usize,
    pub higher_order: usize,
    pub combinations: usize,
    pub covered: usize,
    pub uncovered: usize,
    pub excluded: usize,
}

impl CoverageSummary {
    pub fn of(table: &InteractionTable) -> Self {
        Self {
            order: table.order,
            interactions: table.interactions.len(),
            higher_order: table.higher_order.len(),
            combinations: table.combination_count(),
            covered: table.count(CombinationState::Covered),
            uncovered: table.count(CombinationState::Uncovered),
            excluded: table.count(CombinationState::Excluded),
        }
    }

    /// Share of non-excluded combinations that are covered; 1.0 when there
    /// are none.
    pub fn ratio(&self) -> f64 {
        let coverable = self.covered + self.uncovered;
        if coverable == 0 {
            1.0
        } else {
            self.covered as f64 / coverable as f64
        }
    }
}

/// A combination of named parameter values that must appear in some variation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoveragePoint {
    pub assignments: IndexMap<String, Value>,
}

/// A variation that breaks a rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// Position of the variation in the checked slice.
    pub variation: usize,
    /// Label of the broken rule.
    pub rule: String,
}

/// Value indices of a variation, or `None` for parameters it lacks or whose
/// value is not in the domain. Values are unique within a validated parameter.
fn slots_of(model: &Model, variation: &Variation) -> Vec<Option<usize>> {
    model
        .parameters
        .iter()
        .map(|p| {
            let value = variation.get(&p.name)?;
            p.values.iter().position(|pv| &pv.value == value)
        })
        .collect()
}

/// Non-excluded `order`-wise combinations that none of `variations` contains.
pub fn verify_coverage(
    model: &Model,
    order: usize,
    variations: &[Variation],
) -> Result<Vec<CoveragePoint>, GenerationError> {
    let (table, _, _) = prepare(model, order)?;
    let rows: Vec<Vec<Option<usize>>> = variations.iter().map(|v| slots_of(model, v)).collect();

    let mut missing = Vec::new();
    for interaction in &table.interactions {
        for combination in &interaction.combinations {
            if combination.is_excluded() || rows.iter().any(|slots| combination.matches(slots)) {
                continue;
            }
            let assignments = combination
                .values
                .iter()
                .map(|(&p, &v)| {
                    let parameter = &model.parameters[p];
                    (parameter.name.clone(), parameter.values[v].value.clone())
                })
                .collect();
            missing.push(CoveragePoint { assignments });
        }
    }

    if !missing.is_empty() {
        tracing::debug!(missing = missing.len(), order, "coverage incomplete");
    }
    Ok(missing)
}

/// Every (variation, rule) pair where the rule evaluates Unsatisfied.
pub fn find_violations(
    model: &Model,
    variations: &[Variation],
) -> Result<Vec<Violation>, GenerationError> {
    model.validate()?;
    let rules = collect_rules(model)?;

    let mut violations = Vec::new();
    for (index, variation) in variations.iter().enumerate() {
        let slots = slots_of(model, variation);
        for rule in &rules {
            if rule.evaluate(model, &slots) == ConstraintEvaluation::Unsatisfied {
                violations.push(Violation {
                    variation: index,
                    rule: rule.label().to_string(),
                });
            }
        }
    }
    Ok(violations)
}
