//! Tiered tranche research: skill values, category factors, upgrade-factor
//! caches, and per-tick progress distribution.

use std::collections::HashMap;

use crate::catalog::{Catalog, CombineRule, ResearchTreeDef, SkillCategory};
use crate::production::{geometric_exponential_factor, weighted_sum_factor};
use crate::types::{Event, GameState, SkillId, TierState, TreeId};

/// Geometric mean of a slice of values.
pub(crate) fn geometric_mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 1.0;
    }
    let product: f64 = values.iter().product();
    product.powf(1.0 / values.len() as f64)
}

/// Multiplier a single tree currently contributes to its skill:
/// `Π_tiers multiplier^(tranches_done / tranches_total)`.
fn tree_factor(catalog: &Catalog, tree: &ResearchTreeDef, tiers: &[TierState]) -> f64 {
    let mut factor = 1.0;
    for (index, tier) in tiers.iter().enumerate() {
        if index >= tree.tiers.len() || tier.tranches_completed == 0 {
            continue;
        }
        let tranches = f64::from(catalog.tier_tranches(tree, index));
        let fraction = f64::from(tier.tranches_completed) / tranches;
        factor *= catalog.tier_multiplier(tree, index).powf(fraction);
    }
    factor
}

fn has_progress(tiers: &[TierState]) -> bool {
    tiers.iter().any(|tier| tier.tranches_completed > 0)
}

/// Creates tier state for every catalog tree that lacks it, enabling the
/// first tier of new trees. Existing tier state is left untouched except
/// that the vector is extended to the catalog's tier count.
pub fn ensure_tiers(state: &mut GameState, catalog: &Catalog) {
    let mut tree_ids: Vec<&TreeId> = catalog.research_trees.keys().collect();
    tree_ids.sort();
    for tree_id in tree_ids {
        let tree = &catalog.research_trees[tree_id];
        let tiers = state.tech.research.entry(tree_id.clone()).or_default();
        let fresh = tiers.is_empty();
        while tiers.len() < tree.tiers.len() {
            tiers.push(TierState::default());
        }
        if fresh {
            if let Some(first) = tiers.first_mut() {
                first.enabled = true;
            }
        }
    }
}

/// Post-load normalization: tiers already `enabled` stay enabled; tiers with
/// all tranches done are marked `completed`; nothing else is mutated.
pub fn normalize_loaded(state: &mut GameState, catalog: &Catalog) {
    ensure_tiers(state, catalog);
    let mut tree_ids: Vec<TreeId> = state.tech.research.keys().cloned().collect();
    tree_ids.sort();
    for tree_id in tree_ids {
        let Some(tree) = catalog.tree(&tree_id) else {
            continue;
        };
        let tiers = state.tech.research.get_mut(&tree_id).expect("just listed");
        for index in 0..tiers.len().min(tree.tiers.len()) {
            if tiers[index].tranches_completed >= catalog.tier_tranches(tree, index) {
                tiers[index].completed = true;
            }
        }
    }
}

/// Recomputes the skill cache, category factors, and upgrade-factor caches.
/// Runs at the start of every tick, before any production system.
pub fn refresh_factors(state: &mut GameState, catalog: &Catalog) {
    let mut skills: HashMap<SkillId, f64> = HashMap::new();
    let mut by_category: HashMap<SkillCategory, Vec<f64>> = HashMap::new();

    let mut tree_ids: Vec<&TreeId> = catalog.research_trees.keys().collect();
    tree_ids.sort();
    for tree_id in tree_ids {
        let tree = &catalog.research_trees[tree_id];
        let factor = state
            .tech
            .research
            .get(tree_id)
            .map_or(1.0, |tiers| tree_factor(catalog, tree, tiers));
        by_category.entry(tree.category).or_default().push(factor);
        let researched = state
            .tech
            .research
            .get(tree_id)
            .is_some_and(|tiers| has_progress(tiers));
        if researched {
            *skills.entry(tree.skill.clone()).or_insert(1.0) *= factor;
        }
    }

    state.tech.category_factors.dexterity = geometric_mean(
        by_category
            .get(&SkillCategory::Dexterity)
            .map_or(&[][..], Vec::as_slice),
    ) * (1.0 + state.bonuses.dexterity_bonus);
    state.tech.category_factors.intelligence = geometric_mean(
        by_category
            .get(&SkillCategory::Intelligence)
            .map_or(&[][..], Vec::as_slice),
    );
    state.tech.category_factors.energy = geometric_mean(
        by_category
            .get(&SkillCategory::Energy)
            .map_or(&[][..], Vec::as_slice),
    );

    state.tech.skills = skills;
    refresh_upgrade_factors(state, catalog);
}

fn refresh_upgrade_factors(state: &mut GameState, catalog: &Catalog) {
    let mut performance: HashMap<String, f64> = HashMap::new();
    let mut cost: HashMap<String, f64> = HashMap::new();

    let mut categories: Vec<&String> = catalog.rules.factor_rules.keys().collect();
    categories.sort();
    for category in categories {
        let rule = &catalog.rules.factor_rules[category];
        let alpha_cost = (rule.alpha_performance + catalog.rules.alpha_cost_scaling) / 2.0;
        let (perf, cost_factor) = match rule.combine {
            CombineRule::WeightedSum => {
                let terms: Vec<(f64, f64)> = rule
                    .skills
                    .iter()
                    .map(|term| (term.weight, state.tech.skill(&term.skill)))
                    .collect();
                let factor = weighted_sum_factor(&terms);
                (factor, factor)
            }
            CombineRule::GeometricExponential => {
                let values: Vec<f64> = rule
                    .skills
                    .iter()
                    .map(|term| term.coefficient * state.tech.skill(&term.skill))
                    .collect();
                (
                    geometric_exponential_factor(&values, rule.alpha_performance),
                    geometric_exponential_factor(&values, alpha_cost),
                )
            }
        };
        performance.insert(category.clone(), perf);
        cost.insert(category.clone(), cost_factor);
    }

    // Session skill bonuses fold into the cached factors.
    let bonuses = state.bonuses;
    for (category, bonus) in [
        ("probe_mining", bonuses.mining_rate_bonus),
        ("probe_build", bonuses.replication_rate_bonus),
        ("energy_generation", bonuses.energy_bonus),
    ] {
        *performance.entry(category.to_string()).or_insert(1.0) *= 1.0 + bonus;
    }

    state.factors.performance = performance;
    state.factors.cost = cost;
}

/// Distributes `intelligence_flops × Δt` FLOP·days across enabled,
/// incomplete tiers, weighted per tree (equal split inside a tree).
pub fn tick_progress(
    state: &mut GameState,
    catalog: &Catalog,
    intelligence_flops: f64,
    dt: f64,
    events: &mut Vec<crate::types::EventEnvelope>,
) {
    let budget = intelligence_flops * dt;
    if budget <= 0.0 {
        return;
    }

    // Eligible tiers, sorted for determinism.
    let mut eligible: Vec<(TreeId, usize, f64)> = Vec::new();
    let mut tree_ids: Vec<TreeId> = state.tech.research.keys().cloned().collect();
    tree_ids.sort();
    for tree_id in &tree_ids {
        let Some(tree_def) = catalog.tree(tree_id) else {
            continue;
        };
        let tiers = &state.tech.research[tree_id];
        let open: Vec<usize> = tiers
            .iter()
            .enumerate()
            .take(tree_def.tiers.len())
            .filter(|(_, tier)| tier.enabled && !tier.completed)
            .map(|(index, _)| index)
            .collect();
        if open.is_empty() {
            continue;
        }
        let tree_weight = state.tech.weights.get(tree_id).copied().unwrap_or(1.0);
        if tree_weight <= 0.0 {
            continue;
        }
        let per_tier = tree_weight / open.len() as f64;
        for index in open {
            eligible.push((tree_id.clone(), index, per_tier));
        }
    }

    let total_weight: f64 = eligible.iter().map(|(_, _, weight)| weight).sum();
    if total_weight <= 0.0 {
        return;
    }

    let current_tick = state.meta.tick;
    let mut applied_total = 0.0;
    let mut completions: Vec<(TreeId, usize)> = Vec::new();

    for (tree_id, tier_index, weight) in eligible {
        let tree = catalog.tree(&tree_id).expect("filtered above");
        let total_cost = catalog.tier_cost_flop_days(tree, tier_index);
        let tranches_total = catalog.tier_tranches(tree, tier_index);
        let share = budget * weight / total_weight;

        let tier = &mut state.tech.research.get_mut(&tree_id).expect("listed")[tier_index];
        let before = tier.progress;
        tier.progress = (tier.progress + share).min(total_cost);
        applied_total += tier.progress - before;

        let tranche_cost = total_cost / f64::from(tranches_total);
        let done = if tranche_cost > 0.0 {
            (tier.progress / tranche_cost).floor() as u32
        } else {
            tranches_total
        };
        // A completed tranche never regresses.
        tier.tranches_completed = tier.tranches_completed.max(done.min(tranches_total));

        if tier.progress >= total_cost && !tier.completed {
            tier.completed = true;
            tier.tranches_completed = tranches_total;
            completions.push((tree_id.clone(), tier_index));
        }
    }

    state.cumulative.research_flop_days += applied_total;

    for (tree_id, tier_index) in completions {
        events.push(crate::emit(
            &mut state.counters,
            current_tick,
            Event::TierCompleted {
                tree: tree_id.clone(),
                tier: tier_index,
            },
        ));
        // Completion auto-enables the next tier in the same tree.
        let tiers = state.tech.research.get_mut(&tree_id).expect("listed");
        if let Some(next) = tiers.get_mut(tier_index + 1) {
            if !next.enabled {
                next.enabled = true;
                events.push(crate::emit(
                    &mut state.counters,
                    current_tick,
                    Event::TierEnabled {
                        tree: tree_id,
                        tier: tier_index + 1,
                    },
                ));
            }
        }
    }
}
