//! Dyson-zone construction and the compute/economy power split.

use crate::catalog::Catalog;
use crate::energy::dyson_total_power;
use crate::production::{probe_building_rate, structure_intelligence_flops};
use crate::types::{EventEnvelope, GameState};

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DysonTotals {
    pub dyson_kg_added: f64,
    pub metal_consumed_kg: f64,
}

/// Converts Dyson-zone stored metal into sphere mass at the configured
/// ratio. Crowding-exempt; throttled by energy like everything else.
pub(crate) fn tick(
    state: &mut GameState,
    catalog: &Catalog,
    throttle: f64,
    dt: f64,
    _events: &mut Vec<EventEnvelope>,
) -> DysonTotals {
    let mut totals = DysonTotals::default();
    let Some(zone_def) = catalog.dyson_zone() else {
        return totals;
    };
    let zone_id = zone_def.id.clone();
    state.ensure_zone(&zone_id, zone_def.total_mass_kg);

    let count = state.probe_count(&zone_id) * state.allocation(&zone_id).dyson;
    let build_rate = probe_building_rate(state, catalog, zone_def, count, true)
        * state.factors.perf("dyson_build")
        * throttle;
    if build_rate <= 0.0 {
        state.dyson.update_progress();
        return totals;
    }

    let metal_per_kg = catalog.rules.metal_per_dyson_kg;
    let desired_metal = build_rate * dt * metal_per_kg;
    let zone = state.zones.get_mut(&zone_id).expect("ensured");
    let consumed = desired_metal.min(zone.stored_metal);
    if consumed > 0.0 {
        zone.stored_metal -= consumed;
        let added = consumed / metal_per_kg;
        state.dyson.mass += added;
        totals.dyson_kg_added = added;
        totals.metal_consumed_kg = consumed;
    }
    state.dyson.update_progress();
    totals
}

/// Research compute in FLOPS: the Dyson compute split (1 W → 1 FLOPS) plus
/// structure compute, both scaled by the intelligence category factor.
pub(crate) fn intelligence_production(state: &GameState, catalog: &Catalog) -> f64 {
    let alpha = state.dyson.power_allocation.clamp(0.0, 1.0);
    let dyson_flops = alpha
        * dyson_total_power(state, catalog)
        * (1.0 + state.bonuses.compute_bonus)
        * state.tech.category_factors.intelligence;

    let structure_flops: f64 = catalog
        .zones
        .iter()
        .map(|zone| structure_intelligence_flops(state, catalog, &zone.id))
        .sum();

    dyson_flops + structure_flops
}
