//! Per-tick energy balance: production and consumption sums and the
//! throttle scalar threaded into every rate-producing system.

use crate::catalog::Catalog;
use crate::types::GameState;

/// Throttle floor when production is ten orders of magnitude short.
pub const THROTTLE_FLOOR: f64 = 0.05;

#[derive(Debug, Clone, Copy)]
pub struct EnergyBalance {
    pub production_w: f64,
    pub consumption_w: f64,
    pub throttle: f64,
    /// Total Dyson power before the compute/economy split.
    pub dyson_total_w: f64,
}

/// Total Dyson power output in watts: `mass × (base / r_AU²) × energy factor`.
pub fn dyson_total_power(state: &GameState, catalog: &Catalog) -> f64 {
    let Some(dyson_zone) = catalog.dyson_zone() else {
        return 0.0;
    };
    let r2 = dyson_zone.radius_au * dyson_zone.radius_au;
    if r2 <= 0.0 {
        return 0.0;
    }
    state.dyson.mass * (catalog.rules.dyson_power_per_kg_au2 / r2)
        * state.factors.perf("energy_generation")
}

fn structure_terms(state: &GameState, catalog: &Catalog) -> (f64, f64) {
    let rules = &catalog.rules;
    let mut production = 0.0;
    let mut consumption = 0.0;

    for zone_def in &catalog.zones {
        let Some(by_building) = state.structures.get(&zone_def.id) else {
            continue;
        };
        let mut ids: Vec<_> = by_building.keys().collect();
        ids.sort();
        for id in ids {
            let count = by_building[id];
            if count == 0 {
                continue;
            }
            let Some(def) = catalog.building(id) else {
                continue;
            };
            let k = f64::from(count).powf(
                def.scaling_exponent
                    .unwrap_or(rules.structure_scaling.energy_exponent),
            );

            if def.power_output_mw > 0.0 {
                let solar = if def.uses_solar {
                    zone_def.solar_irradiance_factor
                } else {
                    1.0
                };
                production += def.power_output_mw * 1e6
                    * k
                    * solar
                    * state.factors.perf("structure_energy");
            }

            let base_draw_w =
                def.base_power_consumption_mw * 1e6 + def.energy_cost_multiplier * rules.base_structure_cost_w;
            if base_draw_w > 0.0 {
                let mut draw = base_draw_w * k / state.factors.cost("structure_energy").max(1e-9);
                if def.is_mass_driver {
                    draw /= state.tech.skill("energy_transport").max(1e-9);
                }
                consumption += draw;
            }
        }
    }
    (production, consumption)
}

fn probe_terms(state: &GameState, catalog: &Catalog) -> (f64, f64) {
    let rules = &catalog.rules.probe_base_rates;
    let mut production = 0.0;
    let mut consumption = 0.0;

    for zone_def in &catalog.zones {
        let count = state.probe_count(&zone_def.id);
        if count <= 0.0 {
            continue;
        }
        production += count * rules.energy_production_w * state.factors.perf("energy_generation");

        // Only harvest and recycle activity draws power.
        let alloc = state.allocation(&zone_def.id);
        let mining_denominator =
            (state.factors.cost("probe_mining") * state.tech.skill("production")).max(1e-9);
        consumption += count * alloc.harvest * rules.mining_power_w / mining_denominator;

        let recycle_denominator = (state.factors.cost("refinery_mine")
            * state.tech.skill("recycling")
            * state.tech.skill("materials"))
        .max(1e-9);
        consumption += count * alloc.recycle * rules.recycle_power_w / recycle_denominator;
    }
    (production, consumption)
}

/// Throttle θ ∈ `[0.05, 1]`: smooth exponential decay in the log-ratio of
/// consumption to production, flooring at 5% when production is ten orders
/// of magnitude short.
pub fn throttle(production_w: f64, consumption_w: f64) -> f64 {
    if consumption_w <= 0.0 || production_w >= consumption_w {
        return 1.0;
    }
    if production_w <= 0.0 {
        return THROTTLE_FLOOR;
    }
    let shortfall = (consumption_w / production_w).log10();
    THROTTLE_FLOOR.max(THROTTLE_FLOOR.powf(shortfall / 10.0))
}

pub fn balance(state: &GameState, catalog: &Catalog) -> EnergyBalance {
    let (probe_production, probe_consumption) = probe_terms(state, catalog);
    let (structure_production, structure_consumption) = structure_terms(state, catalog);

    let dyson_total_w = dyson_total_power(state, catalog);
    let dyson_economy_w = (1.0 - state.dyson.power_allocation.clamp(0.0, 1.0)) * dyson_total_w;

    let production_w =
        state.base_energy_production_w + probe_production + structure_production + dyson_economy_w;
    let consumption_w = probe_consumption + structure_consumption;

    EnergyBalance {
        production_w,
        consumption_w,
        throttle: throttle(production_w, consumption_w),
        dyson_total_w,
    }
}
