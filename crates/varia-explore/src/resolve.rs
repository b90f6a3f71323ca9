//! Constraint resolution: folds every constraint into the interaction table.
//!
//! 1. Each rule (declared constraint, plus the implicit single-tag rule)
//!    produces its own interaction over the parameters it references, with
//!    violating rows Excluded.
//! 2. Rule interactions are merged into the table: same parameter set ->
//!    row-wise exclusion; wider than the order -> kept as a higher-order
//!    interaction; narrower -> exclusion pushed down to every superset.
//! 3. Remaining Uncovered rows are checked against every rule directly.
//! 4. Rules sharing parameters are grouped into connected components. Each
//!    component's union cross-product is evaluated against all its rules, and
//!    any row whose projection onto the component has no legal completion is
//!    Excluded. This catches exclusions no single rule implies.
//! 5. If some interaction ends up entirely Excluded the model is infeasible
//!    at this order and every row is Excluded.

use std::collections::{BTreeMap, HashSet};

use varia_ir::eval::bind_constraints;
use varia_ir::{Assignment, BoundConstraint, ConstraintEvaluation, Model, ModelError, Value};

use crate::table::{CombinationState, InteractionTable, ParameterInteraction};

/// Label of the implicit single-tag rule.
pub const SINGLE_TAG_RULE: &str = "single-tag";

/// A rule restricting value combinations.
#[derive(Debug, Clone)]
pub enum Rule {
    /// A constraint declared on the model.
    Declared(BoundConstraint),
    /// At most one value with a distinguishing tag per variation.
    SingleTag {
        /// Parameters that have at least one tagged value, ascending.
        parameters: Vec<usize>,
        /// Per entry of `parameters`: which value indices are tagged.
        tagged: Vec<Vec<bool>>,
    },
}

impl Rule {
    pub fn parameters(&self) -> &[usize] {
        match self {
            Rule::Declared(c) => &c.parameters,
            Rule::SingleTag { parameters, .. } => parameters,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Rule::Declared(c) => &c.label,
            Rule::SingleTag { .. } => SINGLE_TAG_RULE,
        }
    }

    pub fn evaluate(&self, model: &Model, slots: &[Option<usize>]) -> ConstraintEvaluation {
        match self {
            Rule::Declared(c) => c.evaluate(&SlotAssignment { model, slots }),
            Rule::SingleTag { parameters, tagged } => {
                let mut count = 0;
                let mut open = false;
                for (&p, flags) in parameters.iter().zip(tagged.iter()) {
                    match slots[p] {
                        Some(v) if flags[v] => count += 1,
                        Some(_) => {}
                        None => open = true,
                    }
                }
                if count > 1 {
                    ConstraintEvaluation::Unsatisfied
                } else if open {
                    ConstraintEvaluation::InsufficientData
                } else {
                    ConstraintEvaluation::Satisfied
                }
            }
        }
    }
}

/// Views value-index slots as parameter values.
pub struct SlotAssignment<'a> {
    pub model: &'a Model,
    pub slots: &'a [Option<usize>],
}

impl Assignment for SlotAssignment<'_> {
    fn value_of(&self, parameter: usize) -> Option<&Value> {
        let v = (*self.slots.get(parameter)?)?;
        Some(&self.model.parameters[parameter].values[v].value)
    }
}

/// Bind the model's constraints and add the single-tag rule when more than
/// one parameter carries tagged values.
pub fn collect_rules(model: &Model) -> Result<Vec<Rule>, ModelError> {
    let mut rules: Vec<Rule> = bind_constraints(model)?
        .into_iter()
        .map(Rule::Declared)
        .collect();

    let default_tag = model.default_tag.as_ref();
    let mut parameters = Vec::new();
    let mut tagged = Vec::new();
    for (p, parameter) in model.parameters.iter().enumerate() {
        if parameter.has_distinguishing_tags(default_tag) {
            parameters.push(p);
            tagged.push(
                parameter
                    .values
                    .iter()
                    .map(|v| v.distinguishing_tag(default_tag).is_some())
                    .collect(),
            );
        }
    }
    if parameters.len() > 1 {
        rules.push(Rule::SingleTag { parameters, tagged });
    }

    Ok(rules)
}

/// Exclusion counts per resolution step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionStats {
    pub merged: usize,
    pub direct: usize,
    pub dependent: usize,
    pub infeasible: bool,
}

/// Slots for a row, sized for the whole model.
fn row_slots(values: &BTreeMap<usize, usize>, width: usize) -> Vec<Option<usize>> {
    let mut slots = vec![None; width];
    for (&p, &v) in values {
        slots[p] = Some(v);
    }
    slots
}

/// Cross-product over `parameters` with rows violating any of `rules` Excluded.
fn rule_interaction(parameters: &[usize], rules: &[&Rule], model: &Model) -> ParameterInteraction {
    let width = model.parameters.len();
    let mut interaction = ParameterInteraction::cartesian(parameters.to_vec(), model);
    for combination in &mut interaction.combinations {
        if combination.is_excluded() {
            continue;
        }
        let slots = row_slots(&combination.values, width);
        if rules
            .iter()
            .any(|r| r.evaluate(model, &slots) == ConstraintEvaluation::Unsatisfied)
        {
            combination.state = CombinationState::Excluded;
        }
    }
    interaction
}

/// Merge a rule interaction's exclusions into the table.
fn merge(table: &mut InteractionTable, incoming: ParameterInteraction) -> usize {
    if let Some(index) = table.find(&incoming.parameters) {
        return table.interactions[index].absorb_exclusions(&incoming);
    }

    if incoming.parameters.len() > table.order {
        match table.higher_order.iter_mut().find(|h| **h == incoming) {
            Some(existing) => {
                existing.absorb_exclusions(&incoming);
            }
            None => table.higher_order.push(incoming),
        }
        return 0;
    }

    let mut changed = 0;
    for interaction in &mut table.interactions {
        if !incoming.is_subset_of(interaction) {
            continue;
        }
        for combination in &mut interaction.combinations {
            if combination.is_excluded() {
                continue;
            }
            let excluded = incoming
                .index_of_values(&combination.values)
                .map_or(false, |i| incoming.combinations[i].is_excluded());
            if excluded {
                combination.state = CombinationState::Excluded;
                changed += 1;
            }
        }
    }
    changed
}

/// Check every non-excluded row against every rule directly.
fn exclude_direct(table: &mut InteractionTable, rules: &[Rule], model: &Model) -> usize {
    let width = model.parameters.len();
    let mut changed = 0;
    for interaction in &mut table.interactions {
        for combination in &mut interaction.combinations {
            if combination.is_excluded() {
                continue;
            }
            let slots = row_slots(&combination.values, width);
            if let Some(rule) = rules
                .iter()
                .find(|r| r.evaluate(model, &slots) == ConstraintEvaluation::Unsatisfied)
            {
                tracing::trace!(rule = rule.label(), values = ?combination.values, "excluded directly");
                combination.state = CombinationState::Excluded;
                changed += 1;
            }
        }
    }
    changed
}

/// Union-find over parameter indices.
struct DisjointSets {
    parent: Vec<usize>,
}

impl DisjointSets {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            // Lower index becomes the root so grouping order is stable.
            let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[child] = root;
        }
    }
}

/// A set of rules connected through shared parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleGroup {
    /// Union of the rules' parameters, ascending.
    pub parameters: Vec<usize>,
    /// Indices into the rule list.
    pub rules: Vec<usize>,
}

/// Group rules into connected components by shared parameters. Rules with
/// no parameters are not grouped.
pub fn group_rules(rules: &[Rule], parameter_count: usize) -> Vec<RuleGroup> {
    let mut sets = DisjointSets::new(parameter_count);
    for rule in rules {
        if let Some((&first, rest)) = rule.parameters().split_first() {
            for &p in rest {
                sets.union(first, p);
            }
        }
    }

    let mut groups: BTreeMap<usize, RuleGroup> = BTreeMap::new();
    for (index, rule) in rules.iter().enumerate() {
        let Some(&first) = rule.parameters().first() else {
            continue;
        };
        let root = sets.find(first);
        let group = groups.entry(root).or_insert_with(|| RuleGroup {
            parameters: Vec::new(),
            rules: Vec::new(),
        });
        group.rules.push(index);
        group.parameters.extend_from_slice(rule.parameters());
    }

    groups
        .into_values()
        .map(|mut g| {
            g.parameters.sort_unstable();
            g.parameters.dedup();
            g
        })
        .collect()
}

/// Exclude rows whose projection onto a group has no legal completion.
fn exclude_dependent(
    table: &mut InteractionTable,
    rules: &[Rule],
    groups: &[RuleGroup],
    model: &Model,
) -> usize {
    let mut changed = 0;

    for group in groups {
        let members: Vec<&Rule> = group.rules.iter().map(|&i| &rules[i]).collect();
        let union = rule_interaction(&group.parameters, &members, model);
        tracing::debug!(
            parameters = ?group.parameters,
            rules = members.len(),
            rows = union.combinations.len(),
            excluded = union.count(CombinationState::Excluded),
            "evaluated dependent rule group"
        );

        for interaction in &mut table.interactions {
            let shared: Vec<usize> = interaction
                .parameters
                .iter()
                .copied()
                .filter(|p| group.parameters.binary_search(p).is_ok())
                .collect();
            if shared.is_empty() {
                continue;
            }

            let legal: HashSet<Vec<usize>> = union
                .combinations
                .iter()
                .filter(|c| !c.is_excluded())
                .map(|c| shared.iter().map(|p| c.values[p]).collect())
                .collect();

            for combination in &mut interaction.combinations {
                if combination.is_excluded() {
                    continue;
                }
                let key: Vec<usize> = shared.iter().map(|p| combination.values[p]).collect();
                if !legal.contains(&key) {
                    combination.state = CombinationState::Excluded;
                    changed += 1;
                }
            }
        }

        if group.parameters.len() > table.order {
            // The union table subsumes any narrower rule table it contains.
            table.higher_order.retain(|h| !h.is_subset_of(&union));
            table.higher_order.push(union);
        }
    }

    changed
}

/// Fold `rules` into `table`.
pub fn resolve(table: &mut InteractionTable, rules: &[Rule], model: &Model) -> ResolutionStats {
    let mut stats = ResolutionStats::default();

    for rule in rules {
        let interaction = rule_interaction(rule.parameters(), &[rule], model);
        stats.merged += merge(table, interaction);
    }
    tracing::debug!(excluded = stats.merged, "merged rule interactions");

    stats.direct = exclude_direct(table, rules, model);
    tracing::debug!(excluded = stats.direct, "checked rows against rules");

    let groups = group_rules(rules, model.parameters.len());
    stats.dependent = exclude_dependent(table, rules, &groups, model);
    tracing::debug!(
        groups = groups.len(),
        excluded = stats.dependent,
        "propagated dependent rules"
    );

    let dead = table
        .interactions
        .iter()
        .chain(table.higher_order.iter())
        .find(|i| !i.combinations.is_empty() && i.all_excluded());
    if let Some(dead) = dead {
        tracing::warn!(
            parameters = ?dead.parameters,
            order = table.order,
            "every combination of an interaction is excluded; model is infeasible"
        );
        table.exclude_all();
        stats.infeasible = true;
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use varia_ir::{Condition, Constraint, Parameter, ParameterValue};

    fn binary(names: &[&str]) -> Vec<Parameter> {
        names
            .iter()
            .map(|n| Parameter::new(*n).with_values([0, 1]))
            .collect()
    }

    fn resolved(model: &Model, order: usize) -> (InteractionTable, ResolutionStats) {
        let rules = collect_rules(model).unwrap();
        let mut table = InteractionTable::build(model, order);
        let stats = resolve(&mut table, &rules, model);
        (table, stats)
    }

    fn row_state(table: &InteractionTable, values: &[(usize, usize)]) -> CombinationState {
        let params: Vec<usize> = values.iter().map(|(p, _)| *p).collect();
        let map: BTreeMap<usize, usize> = values.iter().copied().collect();
        let interaction = &table.interactions[table.find(&params).unwrap()];
        interaction.combinations[interaction.index_of_values(&map).unwrap()].state
    }

    #[test]
    fn test_if_then_excludes_pair() {
        let model = Model::new(binary(&["X", "Y"])).with_constraint(
            Constraint::when(Condition::eq("X", 0)).then(Condition::eq("Y", 1)),
        );
        let (table, stats) = resolved(&model, 2);
        assert_eq!(row_state(&table, &[(0, 0), (1, 0)]), CombinationState::Excluded);
        assert_eq!(table.count(CombinationState::Excluded), 1);
        assert_eq!(stats.merged, 1);
        assert!(!stats.infeasible);
    }

    #[test]
    fn test_narrow_constraint_pushed_to_supersets() {
        let model = Model::new(binary(&["A", "B", "C"]))
            .with_constraint(Constraint::predicate(Condition::ne("A", 0)));
        let (table, _) = resolved(&model, 2);
        assert_eq!(row_state(&table, &[(0, 0), (1, 0)]), CombinationState::Excluded);
        assert_eq!(row_state(&table, &[(0, 0), (2, 1)]), CombinationState::Excluded);
        assert_eq!(row_state(&table, &[(0, 1), (2, 1)]), CombinationState::Uncovered);
        assert_eq!(row_state(&table, &[(1, 0), (2, 0)]), CombinationState::Uncovered);
    }

    #[test]
    fn test_wide_constraint_kept_as_higher_order() {
        let model = Model::new(binary(&["A", "B", "C"])).with_constraint(
            Constraint::predicate(
                !(Condition::eq("A", 0)
                    .and(Condition::eq("B", 0))
                    .and(Condition::eq("C", 0))),
            ),
        );
        let (table, _) = resolved(&model, 2);
        assert_eq!(table.higher_order.len(), 1);
        assert_eq!(table.higher_order[0].parameters, vec![0, 1, 2]);
        assert_eq!(table.higher_order[0].count(CombinationState::Excluded), 1);
        // No pair is excluded by a single forbidden triple.
        assert_eq!(table.count(CombinationState::Excluded), 0);
    }

    #[test]
    fn test_dependent_constraints_exclude_transitively() {
        let model = Model::new(binary(&["A", "B", "C"])).with_constraints([
            Constraint::when(Condition::eq("A", 0))
                .then(Condition::eq("B", 0))
                .into(),
            Constraint::when(Condition::eq("B", 0))
                .then(Condition::eq("C", 0))
                .into(),
            Constraint::when(Condition::eq("C", 0))
                .then(Condition::eq("A", 1))
                .into(),
        ]);
        let (table, stats) = resolved(&model, 2);
        for b in 0..2 {
            assert_eq!(row_state(&table, &[(0, 0), (1, b)]), CombinationState::Excluded);
        }
        for c in 0..2 {
            assert_eq!(row_state(&table, &[(0, 0), (2, c)]), CombinationState::Excluded);
        }
        assert!(stats.dependent > 0);
        assert_eq!(row_state(&table, &[(0, 1), (1, 0)]), CombinationState::Uncovered);
    }

    #[test]
    fn test_single_constraint_without_legal_completion() {
        // A=0 forces B=5, which B cannot take, so A=0 is infeasible even
        // in interactions that do not mention B.
        let model = Model::new(binary(&["A", "B", "C"])).with_constraint(
            Constraint::when(Condition::eq("A", 0)).then(Condition::eq("B", 5)),
        );
        let (table, _) = resolved(&model, 2);
        assert_eq!(row_state(&table, &[(0, 0), (2, 0)]), CombinationState::Excluded);
        assert_eq!(row_state(&table, &[(0, 0), (2, 1)]), CombinationState::Excluded);
    }

    #[test]
    fn test_infeasible_model_excludes_everything() {
        let model = Model::new(binary(&["A", "B"])).with_constraints([
            Constraint::predicate(Condition::eq("A", 0)),
            Constraint::predicate(Condition::eq("A", 1)),
        ]);
        let (table, stats) = resolved(&model, 2);
        assert!(stats.infeasible);
        assert!(!table.has_uncovered());
    }

    #[test]
    fn test_never_predicate_is_infeasible() {
        let model =
            Model::new(binary(&["A", "B"])).with_constraint(Constraint::predicate(Condition::Never));
        let (table, stats) = resolved(&model, 1);
        assert!(stats.infeasible);
        assert_eq!(table.count(CombinationState::Uncovered), 0);
    }

    #[test]
    fn test_single_tag_rule_at_order_one() {
        let model = Model::new(vec![
            Parameter::new("A")
                .with_value(0)
                .with_value(ParameterValue::new(9).with_tag("neg")),
            Parameter::new("B")
                .with_value(0)
                .with_value(ParameterValue::new(9).with_tag("neg")),
        ]);
        let rules = collect_rules(&model).unwrap();
        assert!(matches!(rules.last(), Some(Rule::SingleTag { .. })));

        let mut table = InteractionTable::build(&model, 1);
        resolve(&mut table, &rules, &model);
        // Tagged values stay individually coverable...
        assert_eq!(table.count(CombinationState::Excluded), 0);
        // ...but the pair of them is forbidden at the higher order.
        assert_eq!(table.higher_order.len(), 1);
        let pair = &table.higher_order[0];
        assert_eq!(pair.count(CombinationState::Excluded), 1);
        assert!(pair.combinations[3].is_excluded());
    }

    #[test]
    fn test_group_rules_components() {
        let model = Model::new(binary(&["A", "B", "C", "D", "E"])).with_constraints([
            Constraint::predicate(Condition::parameters_compare(
                "A",
                varia_ir::CompareOp::Ne,
                "B",
            )),
            Constraint::predicate(Condition::ne("D", 0)),
            Constraint::when(Condition::eq("B", 1))
                .then(Condition::eq("C", 1))
                .into(),
        ]);
        let rules = collect_rules(&model).unwrap();
        let groups = group_rules(&rules, 5);
        assert_eq!(
            groups,
            vec![
                RuleGroup {
                    parameters: vec![0, 1, 2],
                    rules: vec![0, 2],
                },
                RuleGroup {
                    parameters: vec![3],
                    rules: vec![1],
                },
            ]
        );
    }
}
