//! The per-tick pipeline.

use crate::actions::apply_actions;
use crate::catalog::Catalog;
use crate::metrics::TickTotals;
use crate::types::{ActionEnvelope, EventEnvelope, GameState};
use crate::{construction, dyson, energy, mining, probes, research, transfer};

/// Advance the simulation by one tick.
///
/// Order of operations:
/// 1. Drain queued actions FIFO (each applies atomically or is rejected).
/// 2. Advance simulated time by `Δt = speed / 60` days.
/// 3. Refresh skill and upgrade-factor caches from the tech tree.
/// 4. Compute the energy balance; its throttle scales every system below.
/// 5. Mining and slag recycling per zone.
/// 6. Probe replication and decommissioning.
/// 7. Structure construction.
/// 8. Transfers: continuous departures, then arrivals, then one-time purge.
/// 9. Dyson construction.
/// 10. Research progress from intelligence production.
/// 11. Rates / derived / cumulative rollup and history sampling.
///
/// Returns all events produced this tick.
pub fn tick(
    state: &mut GameState,
    actions: &[ActionEnvelope],
    catalog: &Catalog,
) -> Vec<EventEnvelope> {
    let mut events = Vec::new();

    apply_actions(state, actions, catalog, &mut events);

    let dt = state.meta.delta_days();
    state.meta.time_days += dt;

    research::ensure_tiers(state, catalog);
    research::refresh_factors(state, catalog);

    let balance = energy::balance(state, catalog);

    let mut totals = TickTotals {
        mining: mining::tick(state, catalog, balance.throttle, dt, &mut events),
        ..TickTotals::default()
    };
    totals.probes = probes::tick(state, catalog, balance.throttle, dt, &mut events);
    totals.construction = construction::tick(state, catalog, balance.throttle, dt, &mut events);
    totals.transfers = transfer::tick(state, catalog, balance.throttle, dt, &mut events);
    totals.dyson = dyson::tick(state, catalog, balance.throttle, dt, &mut events);

    totals.intelligence_flops = dyson::intelligence_production(state, catalog);
    research::tick_progress(state, catalog, totals.intelligence_flops, dt, &mut events);

    crate::metrics::rollup(state, catalog, &balance, &totals, dt);

    state.meta.tick += 1;
    events
}
