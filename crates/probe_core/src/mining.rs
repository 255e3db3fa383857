//! Per-zone mass extraction and slag reprocessing.

use crate::catalog::Catalog;
use crate::production::{
    extraction_efficiency, probe_mining_rate, structure_mining_rate,
};
use crate::types::{Event, EventEnvelope, GameState};

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct MiningTotals {
    pub mass_extracted_kg: f64,
    pub metal_kg: f64,
    pub slag_kg: f64,
    pub slag_processed_kg: f64,
    pub metal_recovered_kg: f64,
}

/// Extracts mass from every live, non-Dyson zone. Probes on the harvest
/// allocation and mining structures contribute; extraction is capped by the
/// remaining zone mass.
pub(crate) fn tick(
    state: &mut GameState,
    catalog: &Catalog,
    throttle: f64,
    dt: f64,
    events: &mut Vec<EventEnvelope>,
) -> MiningTotals {
    let mut totals = MiningTotals::default();
    let current_tick = state.meta.tick;

    for zone_def in &catalog.zones {
        if zone_def.is_dyson {
            continue;
        }
        state.ensure_zone(&zone_def.id, zone_def.total_mass_kg);
        let zone = &state.zones[&zone_def.id];
        if zone.depleted {
            continue;
        }

        let harvesting = state.probe_count(&zone_def.id) * state.allocation(&zone_def.id).harvest;
        let probe_rate = probe_mining_rate(state, catalog, zone_def, harvesting);
        let structure_rate = structure_mining_rate(state, catalog, &zone_def.id);
        let gross = (probe_rate + structure_rate) * throttle * dt;
        if gross <= 0.0 {
            continue;
        }

        let efficiency = extraction_efficiency(state, catalog, zone_def);
        let zone = state.zones.get_mut(&zone_def.id).expect("ensured above");
        let extracted = gross.min(zone.mass_remaining);
        let metal = extracted * efficiency;
        let slag = extracted - metal;

        zone.mass_remaining -= extracted;
        zone.stored_metal += metal;
        zone.slag_mass += slag;
        if zone.mass_remaining <= 0.0 {
            zone.mass_remaining = 0.0;
            zone.depleted = true;
            events.push(crate::emit(
                &mut state.counters,
                current_tick,
                Event::ZoneDepleted {
                    zone: zone_def.id.clone(),
                },
            ));
        }

        totals.mass_extracted_kg += extracted;
        totals.metal_kg += metal;
        totals.slag_kg += slag;
    }

    totals.slag_processed_kg = 0.0;
    totals.metal_recovered_kg = 0.0;
    tick_slag_recycling(state, catalog, throttle, dt, &mut totals);
    totals
}

/// Probes on the recycle allocation reprocess accumulated slag. Only the
/// recovered fraction moves from slag to stored metal; the rest stays slag,
/// so the zone's mass pools are conserved.
fn tick_slag_recycling(
    state: &mut GameState,
    catalog: &Catalog,
    throttle: f64,
    dt: f64,
    totals: &mut MiningTotals,
) {
    let rules = catalog.rules.slag_recycling;

    for zone_def in &catalog.zones {
        if zone_def.is_dyson {
            continue;
        }
        let recycling = state.probe_count(&zone_def.id) * state.allocation(&zone_def.id).recycle;
        if recycling <= 0.0 {
            continue;
        }

        let rate = recycling
            * catalog.rules.probe_base_rates.mining_kg_per_day
            * state.factors.perf("refinery_mine")
            * throttle;
        let recycling_skill = state.tech.skill("recycling");
        let recovery = (rules.base_recovery + (recycling_skill - 1.0).max(0.0) * rules.skill_gain)
            .clamp(0.0, rules.max_recovery);

        let Some(zone) = state.zones.get_mut(&zone_def.id) else {
            continue;
        };
        let processed = (rate * dt).min(zone.slag_mass);
        if processed <= 0.0 {
            continue;
        }
        let recovered = processed * recovery;
        zone.slag_mass -= recovered;
        zone.stored_metal += recovered;

        totals.slag_processed_kg += processed;
        totals.metal_recovered_kg += recovered;
    }
}
