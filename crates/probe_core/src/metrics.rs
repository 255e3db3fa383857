//! End-of-tick observation rollup: realized rates, per-zone derived values,
//! cumulative stats, and the bounded stats-history ring.

use crate::catalog::Catalog;
use crate::construction::ConstructionTotals;
use crate::dyson::DysonTotals;
use crate::energy::EnergyBalance;
use crate::mining::MiningTotals;
use crate::probes::ProbeTotals;
use crate::production::metal_transfer_capacity;
use crate::transfer::{self, TransferTotals};
use crate::types::{GameState, Rates, RatesSample, ZoneDerived};

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TickTotals {
    pub mining: MiningTotals,
    pub probes: ProbeTotals,
    pub construction: ConstructionTotals,
    pub transfers: TransferTotals,
    pub dyson: DysonTotals,
    pub intelligence_flops: f64,
}

pub(crate) fn rollup(
    state: &mut GameState,
    catalog: &Catalog,
    balance: &EnergyBalance,
    totals: &TickTotals,
    dt: f64,
) {
    let per_day = if dt > 0.0 { 1.0 / dt } else { 0.0 };

    let capacity: f64 = catalog
        .zones
        .iter()
        .map(|zone| metal_transfer_capacity(state, catalog, &zone.id))
        .sum();

    state.rates = Rates {
        energy_production_w: balance.production_w,
        energy_consumption_w: balance.consumption_w,
        throttle: balance.throttle,
        mass_mining_kg_per_day: totals.mining.mass_extracted_kg * per_day,
        metal_mining_kg_per_day: totals.mining.metal_kg * per_day,
        slag_kg_per_day: totals.mining.slag_kg * per_day,
        slag_recycling_kg_per_day: totals.mining.slag_processed_kg * per_day,
        replication_kg_per_day: totals.probes.replication_kg * per_day,
        construction_kg_per_day: totals.construction.construction_kg * per_day,
        dyson_kg_per_day: totals.dyson.dyson_kg_added * per_day,
        dyson_power_w: balance.dyson_total_w,
        intelligence_flops: totals.intelligence_flops,
        metal_transfer_capacity_kg_per_day: capacity,
    };

    state.cumulative.mass_mined_kg += totals.mining.mass_extracted_kg;
    state.cumulative.metal_refined_kg += totals.mining.metal_kg + totals.mining.metal_recovered_kg;
    state.cumulative.slag_recycled_kg += totals.mining.slag_processed_kg;
    state.cumulative.probes_built += totals.probes.probes_built;
    state.cumulative.probes_scrapped += totals.probes.probes_scrapped;
    state.cumulative.structures_built += totals.construction.structures_built;
    state.cumulative.mass_launched_kg += totals.transfers.departed_kg;
    state.cumulative.mass_delivered_kg += totals.transfers.arrived_kg;

    refresh_derived(state, catalog);

    let every = state.history.every_ticks;
    if every > 0 && state.meta.tick % every == 0 {
        let sample = RatesSample {
            tick: state.meta.tick,
            time_days: state.meta.time_days,
            rates: state.rates.clone(),
            total_mass_kg: state.derived.total_mass_kg,
            dyson_mass_kg: state.dyson.mass,
            total_probes: state.derived.total_probes,
        };
        state.history.push_sample(sample);
    }
}

/// Per-zone and total observables, including in-flight transfer mass.
pub(crate) fn refresh_derived(state: &mut GameState, catalog: &Catalog) {
    let mut total_mass = 0.0;
    let mut total_metal = 0.0;
    let mut total_probes = 0.0;
    let mut per_zone = std::collections::HashMap::new();

    for zone_def in &catalog.zones {
        let Some(zone) = state.zones.get(&zone_def.id) else {
            continue;
        };
        let probe_count = state.probe_count(&zone_def.id);
        let harvest = state.allocation(&zone_def.id).harvest;
        let mining = crate::production::probe_mining_rate(
            state,
            catalog,
            zone_def,
            probe_count * harvest,
        ) + crate::production::structure_mining_rate(state, catalog, &zone_def.id);
        let efficiency = crate::production::extraction_efficiency(state, catalog, zone_def);

        per_zone.insert(
            zone_def.id.clone(),
            ZoneDerived {
                probe_count,
                total_mass_kg: zone.total_mass(),
                probe_mass_ratio: zone.probe_mass_ratio(),
                mining_kg_per_day: mining,
                metal_kg_per_day: mining * efficiency,
            },
        );
        total_mass += zone.total_mass();
        total_metal += zone.stored_metal;
        total_probes += probe_count;
    }

    let in_flight = transfer::in_flight_kg(state, catalog);
    state.derived = crate::types::Derived {
        per_zone,
        total_mass_kg: total_mass + in_flight,
        total_metal_kg: total_metal,
        total_probes,
        in_flight_kg: in_flight,
    };
}
