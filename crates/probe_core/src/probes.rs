//! Probe replication against zone-local metal and mass-ratio caps, and
//! automatic decommissioning above the recycle-probes mass limit.

use crate::catalog::Catalog;
use crate::production::{probe_building_rate, structure_building_rate};
use crate::types::{Event, EventEnvelope, GameState, ProbeTypeId, DEFAULT_PROBE_TYPE};

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ProbeTotals {
    pub replication_kg: f64,
    pub metal_consumed_kg: f64,
    pub probes_built: u64,
    pub probes_scrapped: u64,
}

/// Ramp toward zero as the tracked ratio approaches its limit: zero at or
/// above the limit, linear within the last 10% of headroom, 1 otherwise.
pub(crate) fn mass_ratio_throttle(ratio: f64, limit: f64) -> f64 {
    if ratio >= limit {
        return 0.0;
    }
    let headroom = limit - ratio;
    let threshold = 0.1 * limit;
    if threshold > 0.0 && headroom < threshold {
        headroom / threshold
    } else {
        1.0
    }
}

pub(crate) fn tick(
    state: &mut GameState,
    catalog: &Catalog,
    throttle: f64,
    dt: f64,
    events: &mut Vec<EventEnvelope>,
) -> ProbeTotals {
    let mut totals = ProbeTotals::default();
    let probe_type = ProbeTypeId(DEFAULT_PROBE_TYPE.to_string());

    for zone_def in &catalog.zones {
        state.ensure_zone(&zone_def.id, zone_def.total_mass_kg);
        replicate_in_zone(state, catalog, zone_def, &probe_type, throttle, dt, &mut totals, events);
        decommission_in_zone(state, catalog, zone_def, &probe_type, throttle, dt, &mut totals, events);
    }
    totals
}

#[allow(clippy::too_many_arguments)]
fn replicate_in_zone(
    state: &mut GameState,
    catalog: &Catalog,
    zone_def: &crate::catalog::ZoneDef,
    probe_type: &ProbeTypeId,
    throttle: f64,
    dt: f64,
    totals: &mut ProbeTotals,
    events: &mut Vec<EventEnvelope>,
) {
    let probe_mass_kg = catalog.rules.probe_base_rates.probe_mass_kg;
    let count = state.probe_count(&zone_def.id);
    let alloc = state.allocation(&zone_def.id).replicate;

    let probe_rate = probe_building_rate(state, catalog, zone_def, count * alloc, false);
    let factory_rate = structure_building_rate(state, catalog, &zone_def.id);
    if probe_rate + factory_rate <= 0.0 {
        return;
    }

    let zone = &state.zones[&zone_def.id];
    let ratio_throttle =
        mass_ratio_throttle(zone.probe_mass_ratio(), state.mass_limit(&zone_def.id).replicate);
    let gross = (probe_rate + factory_rate) * throttle * ratio_throttle * dt;
    if gross <= 0.0 {
        return;
    }

    // Progress is metal-limited at 1 kg metal per kg of probe mass.
    let stored_metal = zone.stored_metal;
    let actual = gross * (stored_metal / gross).min(1.0);
    if actual <= 0.0 {
        return;
    }

    let zone = state.zones.get_mut(&zone_def.id).expect("ensured");
    zone.stored_metal -= actual;

    let committed = {
        let accumulator = state
            .construction
            .probe_progress
            .entry(zone_def.id.clone())
            .or_default()
            .entry(probe_type.clone())
            .or_insert(0.0);
        *accumulator += actual;
        let committed = (*accumulator / probe_mass_kg).floor();
        if committed >= 1.0 {
            *accumulator -= committed * probe_mass_kg;
        }
        committed
    };
    if committed >= 1.0 {
        state.add_probes(&zone_def.id, probe_type, committed);
        let zone = state.zones.get_mut(&zone_def.id).expect("ensured");
        zone.probe_mass += committed * probe_mass_kg;

        totals.probes_built += committed as u64;
        let current_tick = state.meta.tick;
        events.push(crate::emit(
            &mut state.counters,
            current_tick,
            Event::ProbesReplicated {
                zone: zone_def.id.clone(),
                count: committed as u64,
            },
        ));
    }

    totals.replication_kg += actual;
    totals.metal_consumed_kg += actual;
}

/// Scraps whole probes back into stored metal while the probe-mass ratio
/// sits above the recycle-probes limit, bounded by the zone's build
/// throughput this tick.
#[allow(clippy::too_many_arguments)]
fn decommission_in_zone(
    state: &mut GameState,
    catalog: &Catalog,
    zone_def: &crate::catalog::ZoneDef,
    probe_type: &ProbeTypeId,
    throttle: f64,
    dt: f64,
    totals: &mut ProbeTotals,
    events: &mut Vec<EventEnvelope>,
) {
    let limit = state.mass_limit(&zone_def.id).recycle_probes;
    if limit >= 1.0 {
        return;
    }
    let probe_mass_kg = catalog.rules.probe_base_rates.probe_mass_kg;
    let zone = &state.zones[&zone_def.id];
    let total = zone.total_mass();
    if total <= 0.0 || zone.probe_mass_ratio() <= limit {
        return;
    }
    let excess_kg = zone.probe_mass - limit * total;

    let count = state.probe_count(&zone_def.id);
    let work_kg = probe_building_rate(state, catalog, zone_def, count, false) * throttle * dt;
    let available = state
        .probes
        .get(&zone_def.id)
        .and_then(|by_type| by_type.get(probe_type))
        .copied()
        .unwrap_or(0.0);

    let scrap = (excess_kg.min(work_kg) / probe_mass_kg)
        .floor()
        .min(available.floor());
    if scrap < 1.0 {
        return;
    }

    state.remove_probes(&zone_def.id, probe_type, scrap);
    let zone = state.zones.get_mut(&zone_def.id).expect("ensured");
    let mass = scrap * probe_mass_kg;
    zone.probe_mass -= mass;
    zone.stored_metal += mass;

    totals.probes_scrapped += scrap as u64;
    let current_tick = state.meta.tick;
    events.push(crate::emit(
        &mut state.counters,
        current_tick,
        Event::ProbesDecommissioned {
            zone: zone_def.id.clone(),
            count: scrap as u64,
        },
    ));
}
