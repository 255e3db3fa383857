//! Pure production formulas: upgrade-factor combination rules, probe and
//! structure rates, extraction efficiency, crowding and count-scaling
//! penalties.
//!
//! Everything here is a read-only function of state + catalog. Saturating
//! math throughout; no panics on degenerate inputs.

use crate::catalog::{Catalog, ZoneDef};
use crate::types::{GameState, ZoneId};

/// Weighted-sum upgrade factor: `1 + Σ wᵢ (sᵢ − 1)`.
///
/// Terms with a non-positive skill value contribute zero.
pub fn weighted_sum_factor(terms: &[(f64, f64)]) -> f64 {
    1.0 + terms
        .iter()
        .filter(|(_, skill)| *skill > 0.0)
        .map(|(weight, skill)| weight * (skill - 1.0))
        .sum::<f64>()
}

/// Geometric-exponential upgrade factor: `(Π vᵢ)^(α/n)`, equivalently
/// `exp(α · mean(ln vᵢ))`. Non-positive values are dropped; an empty set
/// yields 1.
pub fn geometric_exponential_factor(values: &[f64], alpha: f64) -> f64 {
    let positive: Vec<f64> = values.iter().copied().filter(|v| *v > 0.0).collect();
    if positive.is_empty() {
        return 1.0;
    }
    let mean_log =
        positive.iter().map(|v| v.ln()).sum::<f64>() / positive.len() as f64;
    (alpha * mean_log).exp()
}

/// Zone crowding penalty. Decays exponentially once the probe-mass ratio
/// (against the catalog's total zone mass) exceeds the threshold. The Dyson
/// zone is exempt — callers skip it.
pub fn crowding_factor(probe_mass: f64, zone_total_mass_kg: f64, catalog: &Catalog) -> f64 {
    let rules = &catalog.rules.crowding;
    if zone_total_mass_kg <= 0.0 {
        return 1.0;
    }
    let ratio = probe_mass / zone_total_mass_kg;
    if ratio <= rules.threshold_ratio {
        return 1.0;
    }
    (-rules.decay_rate * (ratio - rules.threshold_ratio)).exp()
}

/// Probe-count scaling exponent β for the given number of completed autonomy
/// tiers. Absent table means β = 1 (naive linear).
pub fn scaling_beta(completed_autonomy_tiers: usize, catalog: &Catalog) -> f64 {
    let exponents = &catalog.rules.crowding.exponents;
    if exponents.is_empty() {
        return 1.0;
    }
    let index = completed_autonomy_tiers.min(exponents.len() - 1);
    exponents[index]
}

/// Sub-linear effective probe count `n^β`.
pub fn effective_probe_count(count: f64, beta: f64) -> f64 {
    if count <= 0.0 {
        0.0
    } else {
        count.powf(beta)
    }
}

fn completed_autonomy_tiers(state: &GameState) -> usize {
    state
        .tech
        .research
        .get(&crate::types::TreeId("autonomy".to_string()))
        .map_or(0, |tiers| tiers.iter().filter(|t| t.completed).count())
}

/// Probe mining rate in kg/day for `count` probes working a zone.
/// The Dyson zone yields zero.
pub fn probe_mining_rate(state: &GameState, catalog: &Catalog, zone: &ZoneDef, count: f64) -> f64 {
    if zone.is_dyson || count <= 0.0 {
        return 0.0;
    }
    count
        * catalog.rules.probe_base_rates.mining_kg_per_day
        * zone.mining_multiplier
        * state.factors.perf("probe_mining")
}

/// Probe building rate in kg/day: count scaling, crowding (unless exempt),
/// and the probe-build upgrade factor.
pub fn probe_building_rate(
    state: &GameState,
    catalog: &Catalog,
    zone: &ZoneDef,
    count: f64,
    crowding_exempt: bool,
) -> f64 {
    if count <= 0.0 {
        return 0.0;
    }
    let beta = scaling_beta(completed_autonomy_tiers(state), catalog);
    let effective = effective_probe_count(count, beta);
    let crowding = if crowding_exempt || zone.is_dyson {
        1.0
    } else {
        let probe_mass = state
            .zones
            .get(&zone.id)
            .map_or(0.0, |z| z.probe_mass);
        crowding_factor(probe_mass, zone.total_mass_kg, catalog)
    };
    effective
        * catalog.rules.probe_base_rates.build_kg_per_day
        * state.factors.perf("probe_build")
        * crowding
}

/// Sum of refinery extraction bonuses installed in a zone.
pub fn refinery_extraction_bonus(state: &GameState, catalog: &Catalog, zone: &ZoneId) -> f64 {
    let Some(by_building) = state.structures.get(zone) else {
        return 0.0;
    };
    let mut ids: Vec<_> = by_building.keys().collect();
    ids.sort();
    ids.iter()
        .filter_map(|id| {
            let count = by_building[*id];
            catalog
                .building(id)
                .filter(|def| def.extraction_bonus > 0.0 && count > 0)
                .map(|def| def.extraction_bonus * f64::from(count))
        })
        .sum()
}

/// Metal extraction efficiency η for a zone, clamped to `[0, 1]`.
///
/// The recycling-skill term only activates once the skill has research
/// behind it; an unresearched skill contributes nothing.
pub fn extraction_efficiency(state: &GameState, catalog: &Catalog, zone: &ZoneDef) -> f64 {
    let recycling = state.tech.skill_or_zero("recycling");
    let skill_bonus = (recycling - 0.75).max(0.0) * 0.5;
    let refinery_bonus = refinery_extraction_bonus(state, catalog, &zone.id);
    (zone.metal_percentage + skill_bonus + refinery_bonus).clamp(0.0, 1.0)
}

fn structure_rate(
    state: &GameState,
    catalog: &Catalog,
    zone: &ZoneId,
    perf: f64,
    base_rate_of: impl Fn(&crate::catalog::BuildingDef) -> f64,
) -> f64 {
    let Some(by_building) = state.structures.get(zone) else {
        return 0.0;
    };
    let mut ids: Vec<_> = by_building.keys().collect();
    ids.sort();

    let mut total = 0.0;
    for id in ids {
        let count = by_building[id];
        if count == 0 {
            continue;
        }
        let Some(def) = catalog.building(id) else {
            continue;
        };
        let base = base_rate_of(def);
        if base <= 0.0 {
            continue;
        }
        let gamma = def
            .scaling_exponent
            .unwrap_or(catalog.rules.structure_scaling.rate_exponent);
        total += base * f64::from(count).powf(gamma) * def.orbital_efficiency(zone) * perf;
    }
    total
}

/// Aggregate mining rate of a zone's structures in kg/day.
pub fn structure_mining_rate(state: &GameState, catalog: &Catalog, zone: &ZoneId) -> f64 {
    let base_per_probe = catalog.rules.probe_base_rates.mining_kg_per_day;
    structure_rate(
        state,
        catalog,
        zone,
        state.factors.perf("structure_mining"),
        |def| {
            if def.mining_rate_multiplier > 0.0 {
                def.mining_rate_multiplier * base_per_probe
            } else {
                def.effects.map_or(0.0, |e| e.mining_kg_per_day)
            }
        },
    )
}

/// Aggregate probe-fabrication rate of a zone's factories in kg/day.
pub fn structure_building_rate(state: &GameState, catalog: &Catalog, zone: &ZoneId) -> f64 {
    let base_per_probe = catalog.rules.probe_base_rates.build_kg_per_day;
    structure_rate(
        state,
        catalog,
        zone,
        state.factors.perf("factory_replicate"),
        |def| {
            if def.build_rate_multiplier > 0.0 {
                def.build_rate_multiplier * base_per_probe
            } else {
                def.effects.map_or(0.0, |e| e.build_kg_per_day)
            }
        },
    )
}

/// Research compute contributed by a zone's structures, in FLOPS.
pub fn structure_intelligence_flops(state: &GameState, catalog: &Catalog, zone: &ZoneId) -> f64 {
    let Some(by_building) = state.structures.get(zone) else {
        return 0.0;
    };
    let mut ids: Vec<_> = by_building.keys().collect();
    ids.sort();

    let exponent = catalog.rules.structure_scaling.energy_exponent;
    let mut total = 0.0;
    for id in ids {
        let count = by_building[id];
        if count == 0 {
            continue;
        }
        let Some(def) = catalog.building(id) else {
            continue;
        };
        if def.intelligence_eflops <= 0.0 {
            continue;
        }
        let gamma = def.scaling_exponent.unwrap_or(exponent);
        total += def.intelligence_eflops * 1e18 * f64::from(count).powf(gamma);
    }
    total * state.tech.category_factors.intelligence
}

/// Count of mass drivers installed in a zone.
pub fn mass_driver_count(state: &GameState, catalog: &Catalog, zone: &ZoneId) -> u32 {
    let Some(by_building) = state.structures.get(zone) else {
        return 0;
    };
    by_building
        .iter()
        .filter(|(id, _)| catalog.building(id).is_some_and(|d| d.is_mass_driver))
        .map(|(_, count)| *count)
        .sum()
}

/// Displayed metal launch capacity for a zone in kg/day:
/// `100 GT/day × drivers × transport factor × energy_transport × √strength × √locomotion`.
pub fn metal_transfer_capacity(state: &GameState, catalog: &Catalog, zone: &ZoneId) -> f64 {
    let drivers = mass_driver_count(state, catalog, zone);
    if drivers == 0 {
        return 0.0;
    }
    let skills = &state.tech;
    catalog.rules.transfer.metal_capacity_gt_per_day
        * 1e12
        * f64::from(drivers)
        * state.factors.perf("transport")
        * skills.skill("energy_transport")
        * skills.skill("strength").max(0.0).sqrt()
        * skills.skill("locomotion").max(0.0).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_sum_is_identity_at_baseline() {
        let factor = weighted_sum_factor(&[(0.5, 1.0), (0.5, 1.0)]);
        assert!((factor - 1.0).abs() < 1e-12);
    }

    #[test]
    fn weighted_sum_skips_invalid_skills() {
        // The zero-valued skill contributes nothing, not −w.
        let factor = weighted_sum_factor(&[(0.5, 2.0), (0.5, 0.0)]);
        assert!((factor - 1.5).abs() < 1e-12);
    }

    #[test]
    fn geometric_exponential_matches_log_mean_form() {
        let values = [2.0, 8.0];
        let alpha = 0.5;
        let factor = geometric_exponential_factor(&values, alpha);
        // (2·8)^(0.5/2) = 16^0.25 = 2
        assert!((factor - 2.0).abs() < 1e-12);
    }

    #[test]
    fn geometric_exponential_empty_is_one() {
        assert!((geometric_exponential_factor(&[], 2.0) - 1.0).abs() < 1e-12);
        assert!((geometric_exponential_factor(&[-1.0, 0.0], 2.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn effective_count_is_linear_at_beta_one() {
        assert!((effective_probe_count(1000.0, 1.0) - 1000.0).abs() < 1e-9);
        assert!(effective_probe_count(0.0, 0.8).abs() < 1e-12);
        assert!(effective_probe_count(1000.0, 0.8) < 1000.0);
    }
}
