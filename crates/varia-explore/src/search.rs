//! Greedy variation search over a resolved interaction table.
//!
//! Variations are built one at a time until no Uncovered combination is
//! left. Each variation starts from an Uncovered combination of the
//! interaction with the most Uncovered rows, then repeatedly adopts the
//! compatible Uncovered combination that newly covers the most rows
//! (ties go to the heavier combination). Any extension that would leave
//! some interaction with no non-Excluded row matching the variation is
//! skipped. When no Uncovered combination fits, the next open parameter
//! takes a weighted random value instead.

use rand_chacha::ChaCha8Rng;
use varia_ir::{Model, Value};

use crate::resolve::Rule;
use crate::rng::{stage_rng, Stage};
use crate::table::{CombinationState, InteractionTable};
use crate::weighted::pick_weighted;

/// Defects in the engine itself. Callers cannot recover from these by
/// changing input; they abort generation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InternalFault {
    #[error("generated {generated} variations, more than the exhaustive count {bound}")]
    ExhaustiveBoundExceeded { generated: usize, bound: usize },

    #[error(
        "no value of parameter '{parameter}' avoids excluded combinations \
         (assigned so far: {assigned:?}; constraints involved: {constraints:?})"
    )]
    NoSafeCandidate {
        parameter: String,
        assigned: Vec<(String, Value)>,
        constraints: Vec<String>,
    },

    #[error("candidate variation is inconsistent with the interaction table: {0}")]
    InconsistentCandidate(String),
}

/// Builds variations, as value indices per parameter, from a resolved table.
pub struct VariationSearch<'a> {
    model: &'a Model,
    state: SearchState,
    rng: ChaCha8Rng,
    /// Labels of the rules touching each parameter, for diagnostics.
    rule_labels: Vec<Vec<String>>,
    bound: usize,
}

/// Table plus the indexes the search reads on every step.
struct SearchState {
    table: InteractionTable,
    /// Parameter -> interactions containing it.
    by_parameter: Vec<Vec<usize>>,
    /// Parameter -> higher-order interactions containing it.
    higher_by_parameter: Vec<Vec<usize>>,
    uncovered: Vec<usize>,
}

/// Best extension found so far: (newly covered rows, weight, interaction, row).
type Extension = (usize, f64, usize, usize);

impl SearchState {
    fn new(table: InteractionTable, width: usize) -> Self {
        let mut by_parameter = vec![Vec::new(); width];
        for (i, interaction) in table.interactions.iter().enumerate() {
            for &p in &interaction.parameters {
                by_parameter[p].push(i);
            }
        }
        let mut higher_by_parameter = vec![Vec::new(); width];
        for (i, interaction) in table.higher_order.iter().enumerate() {
            for &p in &interaction.parameters {
                higher_by_parameter[p].push(i);
            }
        }
        let uncovered = table
            .interactions
            .iter()
            .map(|i| i.count(CombinationState::Uncovered))
            .collect();

        Self {
            table,
            by_parameter,
            higher_by_parameter,
            uncovered,
        }
    }

    fn remaining(&self) -> usize {
        self.uncovered.iter().sum()
    }

    /// Interactions (table, higher-order) touching any of `parameters`, deduplicated.
    fn touched(&self, parameters: &[usize]) -> (Vec<usize>, Vec<usize>) {
        let mut table: Vec<usize> = parameters
            .iter()
            .flat_map(|&p| self.by_parameter[p].iter().copied())
            .collect();
        table.sort_unstable();
        table.dedup();

        let mut higher: Vec<usize> = parameters
            .iter()
            .flat_map(|&p| self.higher_by_parameter[p].iter().copied())
            .collect();
        higher.sort_unstable();
        higher.dedup();

        (table, higher)
    }

    /// After assigning `changed`, every interaction touching them still has a
    /// non-Excluded row compatible with `slots`.
    fn admissible(&self, slots: &[Option<usize>], changed: &[usize]) -> bool {
        let (table, higher) = self.touched(changed);
        table
            .iter()
            .all(|&i| self.table.interactions[i].admits(slots))
            && higher
                .iter()
                .all(|&i| self.table.higher_order[i].admits(slots))
    }

    /// Uncovered rows that become fully matched once `changed` are assigned.
    fn newly_covered(&self, slots: &[Option<usize>], changed: &[usize]) -> usize {
        let (table, _) = self.touched(changed);
        table
            .iter()
            .filter(|&&i| {
                let interaction = &self.table.interactions[i];
                interaction.index_of(slots).map_or(false, |r| {
                    interaction.combinations[r].state == CombinationState::Uncovered
                })
            })
            .count()
    }

    /// Interaction with the most Uncovered rows (first on ties), and its
    /// heaviest Uncovered row (first on ties).
    fn seed(&self) -> Option<(usize, usize)> {
        let mut best: Option<usize> = None;
        for (i, &count) in self.uncovered.iter().enumerate() {
            if count > 0 && best.map_or(true, |b| count > self.uncovered[b]) {
                best = Some(i);
            }
        }
        let interaction = best?;

        let mut row: Option<(usize, f64)> = None;
        for (r, c) in self.table.interactions[interaction]
            .combinations
            .iter()
            .enumerate()
        {
            if c.state == CombinationState::Uncovered && row.map_or(true, |(_, w)| c.weight > w) {
                row = Some((r, c.weight));
            }
        }
        row.map(|(r, _)| (interaction, r))
    }

    /// Best Uncovered combination that can safely extend `slots`.
    fn best_extension(&self, slots: &mut [Option<usize>]) -> Option<Extension> {
        let mut best: Option<Extension> = None;

        for (i, interaction) in self.table.interactions.iter().enumerate() {
            if self.uncovered[i] == 0 || interaction.is_determined_by(slots) {
                continue;
            }
            for (r, combination) in interaction.combinations.iter().enumerate() {
                if combination.state != CombinationState::Uncovered
                    || !combination.is_compatible(slots)
                {
                    continue;
                }
                let changed: Vec<usize> = combination
                    .values
                    .keys()
                    .copied()
                    .filter(|&p| slots[p].is_none())
                    .collect();
                for &p in &changed {
                    slots[p] = Some(combination.values[&p]);
                }
                let safe = self.admissible(slots, &changed);
                let gain = if safe {
                    self.newly_covered(slots, &changed)
                } else {
                    0
                };
                for &p in &changed {
                    slots[p] = None;
                }
                if !safe {
                    continue;
                }

                let better = match best {
                    None => true,
                    Some((g, w, _, _)) => gain > g || (gain == g && combination.weight > w),
                };
                if better {
                    best = Some((gain, combination.weight, i, r));
                }
            }
        }

        best
    }

    /// Mark every row the finished variation matches as Covered.
    fn cover(&mut self, slots: &[Option<usize>]) -> Result<usize, InternalFault> {
        let mut covered = 0;
        for (i, interaction) in self.table.interactions.iter_mut().enumerate() {
            let Some(r) = interaction.index_of(slots) else {
                return Err(InternalFault::InconsistentCandidate(format!(
                    "interaction {:?} is not determined by a complete variation",
                    interaction.parameters
                )));
            };
            let combination = &mut interaction.combinations[r];
            match combination.state {
                CombinationState::Uncovered => {
                    combination.state = CombinationState::Covered;
                    self.uncovered[i] -= 1;
                    covered += 1;
                }
                CombinationState::Covered => {}
                CombinationState::Excluded => {
                    return Err(InternalFault::InconsistentCandidate(format!(
                        "variation contains excluded combination {:?}",
                        combination.values
                    )));
                }
            }
        }
        Ok(covered)
    }
}

impl<'a> VariationSearch<'a> {
    pub fn new(model: &'a Model, table: InteractionTable, rules: &[Rule], seed: u64) -> Self {
        let width = model.parameters.len();
        let mut rule_labels = vec![Vec::new(); width];
        for rule in rules {
            for &p in rule.parameters() {
                rule_labels[p].push(rule.label().to_string());
            }
        }

        Self {
            model,
            state: SearchState::new(table, width),
            rng: stage_rng(seed, Stage::Generation),
            rule_labels,
            bound: model.exhaustive_count(),
        }
    }

    /// Generate variations until every non-excluded combination is covered.
    pub fn run(mut self) -> Result<(Vec<Vec<usize>>, InteractionTable), InternalFault> {
        let mut variations = Vec::new();

        while let Some((interaction, row)) = self.state.seed() {
            let variation = self.build(interaction, row)?;
            let covered = self.state.cover(&variation)?;
            tracing::trace!(
                index = variations.len(),
                covered,
                remaining = self.state.remaining(),
                "variation complete"
            );

            variations.push(variation.into_iter().flatten().collect());
            if variations.len() > self.bound {
                let fault = InternalFault::ExhaustiveBoundExceeded {
                    generated: variations.len(),
                    bound: self.bound,
                };
                tracing::warn!(%fault, "aborting generation");
                return Err(fault);
            }
        }

        Ok((variations, self.state.table))
    }

    /// Build one complete variation starting from the given seed row.
    fn build(&mut self, interaction: usize, row: usize) -> Result<Vec<Option<usize>>, InternalFault> {
        let width = self.model.parameters.len();
        let mut slots: Vec<Option<usize>> = vec![None; width];

        let seed = &self.state.table.interactions[interaction].combinations[row];
        let seeded: Vec<usize> = seed.values.keys().copied().collect();
        for (&p, &v) in &seed.values {
            slots[p] = Some(v);
        }
        if !self.state.admissible(&slots, &seeded) {
            return Err(InternalFault::InconsistentCandidate(format!(
                "uncovered seed combination {:?} has no legal completion",
                seed.values
            )));
        }

        while slots.iter().any(Option::is_none) {
            match self.state.best_extension(&mut slots) {
                Some((_, _, i, r)) => {
                    let combination = &self.state.table.interactions[i].combinations[r];
                    for (&p, &v) in &combination.values {
                        slots[p] = Some(v);
                    }
                }
                None => self.fallback(&mut slots)?,
            }
        }

        Ok(slots)
    }

    /// Assign the first open parameter a weighted random value that keeps
    /// the variation legal.
    ///
    /// Draws from the parameter's own values rather than from Covered rows:
    /// every interaction touching the parameter has been resolved exactly,
    /// so a value passing the admissibility check always lies in some
    /// non-Excluded compatible row and the two candidate sets coincide.
    fn fallback(&mut self, slots: &mut [Option<usize>]) -> Result<(), InternalFault> {
        let Some(p) = slots.iter().position(Option::is_none) else {
            return Ok(());
        };
        let candidates: Vec<(usize, f64)> = self.model.parameters[p]
            .values
            .iter()
            .enumerate()
            .map(|(v, pv)| (v, pv.weight))
            .collect();

        let state = &self.state;
        let picked = pick_weighted(&mut self.rng, &candidates, |v| {
            slots[p] = Some(v);
            let ok = state.admissible(slots, &[p]);
            slots[p] = None;
            ok
        });

        match picked {
            Some(v) => {
                tracing::trace!(parameter = %self.model.parameters[p].name, value = v, "weighted fallback");
                slots[p] = Some(v);
                Ok(())
            }
            None => {
                let fault = InternalFault::NoSafeCandidate {
                    parameter: self.model.parameters[p].name.clone(),
                    assigned: slots
                        .iter()
                        .enumerate()
                        .filter_map(|(q, v)| {
                            let v = (*v)?;
                            let parameter = &self.model.parameters[q];
                            Some((parameter.name.clone(), parameter.values[v].value.clone()))
                        })
                        .collect(),
                    constraints: self.rule_labels[p].clone(),
                };
                tracing::warn!(%fault, "aborting generation");
                Err(fault)
            }
        }
    }
}
