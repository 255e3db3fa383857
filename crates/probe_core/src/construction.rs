//! Structure construction: probes on the construct allocation work the
//! enabled site queue, consuming stored metal 1:1 into building progress.

use crate::catalog::Catalog;
use crate::probes::mass_ratio_throttle;
use crate::production::probe_building_rate;
use crate::types::{Event, EventEnvelope, GameState, SiteKey};

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ConstructionTotals {
    pub construction_kg: f64,
    pub metal_consumed_kg: f64,
    pub structures_built: u64,
}

pub(crate) fn tick(
    state: &mut GameState,
    catalog: &Catalog,
    throttle: f64,
    dt: f64,
    events: &mut Vec<EventEnvelope>,
) -> ConstructionTotals {
    let mut totals = ConstructionTotals::default();

    for zone_def in &catalog.zones {
        let alloc = state.allocation(&zone_def.id).construct;
        if alloc <= 0.0 {
            continue;
        }
        // Sites for this zone, queue order.
        let sites: Vec<SiteKey> = state
            .construction
            .enabled
            .iter()
            .filter(|site| site.zone().as_ref() == Some(&zone_def.id))
            .cloned()
            .collect();
        if sites.is_empty() {
            continue;
        }

        state.ensure_zone(&zone_def.id, zone_def.total_mass_kg);
        let count = state.probe_count(&zone_def.id);
        let rate = probe_building_rate(state, catalog, zone_def, count * alloc, false);
        if rate <= 0.0 {
            continue;
        }

        let zone = &state.zones[&zone_def.id];
        let ratio = if zone.total_mass() > 0.0 {
            zone.structure_mass / zone.total_mass()
        } else {
            0.0
        };
        let limit = state.mass_limit(&zone_def.id).construct;
        let gross = rate * throttle * mass_ratio_throttle(ratio, limit) * dt;
        if gross <= 0.0 {
            continue;
        }

        // Metal-limited, 1 kg metal per kg of progress.
        let budget = gross.min(zone.stored_metal);
        if budget <= 0.0 {
            continue;
        }

        let consumed = distribute_to_sites(state, catalog, &sites, budget, &mut totals, events);
        if consumed > 0.0 {
            let zone = state.zones.get_mut(&zone_def.id).expect("ensured");
            zone.stored_metal -= consumed;
            totals.construction_kg += consumed;
            totals.metal_consumed_kg += consumed;
        }
    }
    totals
}

/// Splits a zone's build budget evenly across its enabled sites (queue
/// order), committing whole building units as targets are reached; partial
/// progress carries between ticks.
fn distribute_to_sites(
    state: &mut GameState,
    catalog: &Catalog,
    sites: &[SiteKey],
    budget: f64,
    totals: &mut ConstructionTotals,
    events: &mut Vec<EventEnvelope>,
) -> f64 {
    let current_tick = state.meta.tick;

    let valid: Vec<(&SiteKey, f64)> = sites
        .iter()
        .filter_map(|site| {
            let building_id = site.building()?;
            let def = catalog.building(&building_id)?;
            let target = state
                .construction
                .targets
                .get(site)
                .copied()
                .unwrap_or(def.mass_kg);
            (target > 0.0).then_some((site, target))
        })
        .collect();
    if valid.is_empty() {
        return 0.0;
    }
    let share = budget / valid.len() as f64;

    for (site, target) in valid {
        let (Some(zone_id), Some(building_id)) = (site.zone(), site.building()) else {
            continue;
        };

        let completed = {
            let progress = state.construction.progress.entry(site.clone()).or_insert(0.0);
            *progress += share;
            let completed = (*progress / target).floor();
            if completed >= 1.0 {
                *progress -= completed * target;
            }
            completed
        };

        if completed >= 1.0 {
            let units = completed as u32;
            let by_building = state.structures.entry(zone_id.clone()).or_default();
            let count = by_building.entry(building_id.clone()).or_insert(0);
            *count += units;
            let new_count = *count;

            let zone = state
                .zones
                .get_mut(&zone_id)
                .expect("construction only runs on ensured zones");
            zone.structure_mass += completed * target;

            totals.structures_built += u64::from(units);
            events.push(crate::emit(
                &mut state.counters,
                current_tick,
                Event::StructureCompleted {
                    zone: zone_id,
                    building: building_id,
                    count: new_count,
                },
            ));
        }
    }
    budget
}
