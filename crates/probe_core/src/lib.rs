//! `probe_core` — deterministic simulation tick.
//!
//! No IO, no wall clock, no process-wide state. One tick is one atomic
//! transformation of the authoritative `GameState`; collaborators read
//! committed snapshots and post actions between ticks.

mod actions;
mod catalog;
mod construction;
mod dyson;
mod energy;
mod engine;
mod invariants;
pub(crate) mod metrics;
mod mining;
mod probes;
mod production;
mod research;
mod transfer;
mod types;

pub use actions::ActionError;
pub use catalog::*;
pub use energy::{balance, dyson_total_power, throttle, EnergyBalance, THROTTLE_FLOOR};
pub use engine::tick;
pub use invariants::{check_invariants, InvariantError};
pub use production::{
    crowding_factor, effective_probe_count, extraction_efficiency, geometric_exponential_factor,
    mass_driver_count, metal_transfer_capacity, probe_building_rate, probe_mining_rate,
    scaling_beta, structure_building_rate, structure_mining_rate, weighted_sum_factor,
};
pub use research::{ensure_tiers, normalize_loaded, refresh_factors};
pub use transfer::{speed_multiplier, transfer_time};
pub use types::*;

pub(crate) fn emit(counters: &mut Counters, tick: u64, event: Event) -> EventEnvelope {
    let id = EventId(format!("evt_{:06}", counters.next_event_id));
    counters.next_event_id += 1;
    EventEnvelope { id, tick, event }
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_fixtures;

#[cfg(test)]
mod tests;
