//! Interaction table: every `order`-wise parameter subset together with the
//! full cross-product of its values.
//!
//! Each row ([`ValueCombination`]) moves through a small lifecycle:
//! - created **Uncovered** when the table is built,
//! - flipped to **Excluded** if it can never appear in a legal variation
//!   (conflicting tags at construction, constraints during resolution),
//! - flipped to **Covered** once a generated variation contains it.

use std::collections::BTreeMap;

use varia_ir::{Model, Value};

use crate::combinatorics::{cartesian, product, subsets};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CombinationState {
    Uncovered,
    Covered,
    Excluded,
}

/// One assignment of value indices to the parameters of an interaction.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueCombination {
    /// Parameter index -> value index.
    pub values: BTreeMap<usize, usize>,
    pub state: CombinationState,
    /// Sum of the weights of the referenced values.
    pub weight: f64,
    /// The single distinguishing tag among the referenced values, if any.
    pub tag: Option<Value>,
}

impl ValueCombination {
    /// Every referenced parameter is assigned, to this combination's value.
    pub fn matches(&self, slots: &[Option<usize>]) -> bool {
        self.values.iter().all(|(&p, &v)| slots[p] == Some(v))
    }

    /// No referenced parameter is assigned to a different value.
    pub fn is_compatible(&self, slots: &[Option<usize>]) -> bool {
        self.values
            .iter()
            .all(|(&p, &v)| slots[p].map_or(true, |assigned| assigned == v))
    }

    pub fn is_excluded(&self) -> bool {
        self.state == CombinationState::Excluded
    }
}

/// A parameter subset with its full value cross-product, in odometer order
/// (last parameter varying fastest).
#[derive(Debug, Clone)]
pub struct ParameterInteraction {
    /// Parameter indices, ascending.
    pub parameters: Vec<usize>,
    pub combinations: Vec<ValueCombination>,
    strides: Vec<usize>,
}

/// Interactions are identified by their parameter set.
impl PartialEq for ParameterInteraction {
    fn eq(&self, other: &Self) -> bool {
        self.parameters == other.parameters
    }
}

impl ParameterInteraction {
    /// Build the cross-product over `parameters` (which must be ascending).
    ///
    /// Rows pick up weight and tag bookkeeping from the values they reference;
    /// a row holding more than one distinguishing tag starts out Excluded.
    pub fn cartesian(parameters: Vec<usize>, model: &Model) -> Self {
        let radices: Vec<usize> = parameters
            .iter()
            .map(|&p| model.parameters[p].count())
            .collect();

        let mut strides = vec![1usize; parameters.len()];
        for i in (0..parameters.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1].saturating_mul(radices[i + 1]);
        }

        let default_tag = model.default_tag.as_ref();
        let mut combinations = Vec::with_capacity(product(&radices));
        for row in cartesian(&radices) {
            let mut values = BTreeMap::new();
            let mut weight = 0.0;
            let mut tag: Option<Value> = None;
            let mut tagged = 0usize;

            for (&p, &v) in parameters.iter().zip(row.iter()) {
                values.insert(p, v);
                let pv = &model.parameters[p].values[v];
                weight += pv.weight;
                if let Some(t) = pv.distinguishing_tag(default_tag) {
                    tagged += 1;
                    tag = Some(t.clone());
                }
            }

            let state = if tagged > 1 {
                tag = None;
                CombinationState::Excluded
            } else {
                CombinationState::Uncovered
            };

            combinations.push(ValueCombination {
                values,
                state,
                weight,
                tag,
            });
        }

        Self {
            parameters,
            combinations,
            strides,
        }
    }

    /// Row index for the values `lookup` gives each parameter, or `None` if
    /// some parameter of this interaction has no value.
    pub fn index_with(&self, lookup: impl Fn(usize) -> Option<usize>) -> Option<usize> {
        let mut index = 0usize;
        for (&p, &stride) in self.parameters.iter().zip(self.strides.iter()) {
            index += lookup(p)? * stride;
        }
        Some(index)
    }

    pub fn index_of(&self, slots: &[Option<usize>]) -> Option<usize> {
        self.index_with(|p| slots[p])
    }

    /// Row matching the given combination's values on this interaction's
    /// parameters; the combination must reference all of them.
    pub fn index_of_values(&self, values: &BTreeMap<usize, usize>) -> Option<usize> {
        self.index_with(|p| values.get(&p).copied())
    }

    pub fn is_determined_by(&self, slots: &[Option<usize>]) -> bool {
        self.parameters.iter().all(|&p| slots[p].is_some())
    }

    pub fn touches(&self, slots: &[Option<usize>]) -> bool {
        self.parameters.iter().any(|&p| slots[p].is_some())
    }

    /// Some row compatible with `slots` is not Excluded.
    pub fn admits(&self, slots: &[Option<usize>]) -> bool {
        match self.index_of(slots) {
            Some(index) => !self.combinations[index].is_excluded(),
            None => self
                .combinations
                .iter()
                .any(|c| !c.is_excluded() && c.is_compatible(slots)),
        }
    }

    pub fn count(&self, state: CombinationState) -> usize {
        self.combinations.iter().filter(|c| c.state == state).count()
    }

    pub fn all_excluded(&self) -> bool {
        self.combinations.iter().all(ValueCombination::is_excluded)
    }

    pub fn is_subset_of(&self, other: &ParameterInteraction) -> bool {
        self.parameters
            .iter()
            .all(|p| other.parameters.binary_search(p).is_ok())
    }

    /// Mark every row Excluded that is Excluded in `other`, which must have
    /// the same parameters. Returns how many rows changed.
    pub fn absorb_exclusions(&mut self, other: &ParameterInteraction) -> usize {
        let mut changed = 0;
        for (mine, theirs) in self.combinations.iter_mut().zip(other.combinations.iter()) {
            if theirs.is_excluded() && !mine.is_excluded() {
                mine.state = CombinationState::Excluded;
                changed += 1;
            }
        }
        changed
    }
}

/// All `order`-wise interactions of a model, plus excluded-combination
/// tables wider than `order` kept for subset matching.
#[derive(Debug, Clone)]
pub struct InteractionTable {
    pub order: usize,
    pub interactions: Vec<ParameterInteraction>,
    pub higher_order: Vec<ParameterInteraction>,
}

impl InteractionTable {
    /// One interaction per `order`-element parameter subset, in ascending
    /// lexicographic order. `order` must be in `1..=parameter count`.
    pub fn build(model: &Model, order: usize) -> Self {
        let interactions = subsets(model.parameters.len(), order)
            .map(|parameters| ParameterInteraction::cartesian(parameters, model))
            .collect();

        Self {
            order,
            interactions,
            higher_order: Vec::new(),
        }
    }

    pub fn find(&self, parameters: &[usize]) -> Option<usize> {
        self.interactions
            .iter()
            .position(|i| i.parameters == parameters)
    }

    pub fn has_uncovered(&self) -> bool {
        self.interactions.iter().any(|i| {
            i.combinations
                .iter()
                .any(|c| c.state == CombinationState::Uncovered)
        })
    }

    pub fn count(&self, state: CombinationState) -> usize {
        self.interactions.iter().map(|i| i.count(state)).sum()
    }

    pub fn combination_count(&self) -> usize {
        self.interactions.iter().map(|i| i.combinations.len()).sum()
    }

    /// Exclude every row that is not already Excluded. Returns how many changed.
    pub fn exclude_all(&mut self) -> usize {
        let mut changed = 0;
        for interaction in &mut self.interactions {
            for c in &mut interaction.combinations {
                if !c.is_excluded() {
                    c.state = CombinationState::Excluded;
                    changed += 1;
                }
            }
        }
        changed
    }
}
