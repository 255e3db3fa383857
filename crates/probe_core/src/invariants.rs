//! Post-tick invariant checks.
//!
//! A violation here means a committed tick produced an impossible state;
//! drivers treat it as fatal and keep serving the last good snapshot.

use thiserror::Error;

use crate::catalog::Catalog;
use crate::energy::THROTTLE_FLOOR;
use crate::types::{GameState, TransferId, TransferKind, TreeId, ZoneId};

#[derive(Debug, Clone, Error)]
pub enum InvariantError {
    #[error("zone '{zone}' field {field} is {value}")]
    BadMassPool {
        zone: ZoneId,
        field: &'static str,
        value: f64,
    },
    #[error("zone '{zone}' allocation sum {sum} exceeds 1")]
    AllocationSum { zone: ZoneId, sum: f64 },
    #[error("zone '{zone}' is exhausted but not flagged depleted")]
    MissingDepletedFlag { zone: ZoneId },
    #[error("dyson progress {progress} does not match mass/target {expected}")]
    DysonProgress { progress: f64, expected: f64 },
    #[error("throttle {0} outside [0.05, 1]")]
    ThrottleOutOfBounds(f64),
    #[error("transfer '{transfer}' has a batch arriving before departing")]
    BatchTimeInverted { transfer: TransferId },
    #[error("transfer '{transfer}' has an in-flight batch outside the current window")]
    BatchOutsideWindow { transfer: TransferId },
    #[error("tree '{tree}' tier {tier} exceeds its tranche total")]
    ResearchOverrun { tree: TreeId, tier: usize },
}

fn check_pool(zone: &ZoneId, field: &'static str, value: f64) -> Result<(), InvariantError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(InvariantError::BadMassPool {
            zone: zone.clone(),
            field,
            value,
        })
    }
}

/// Verifies the committed-state invariants. Intended to run between ticks.
#[allow(clippy::too_many_lines)]
pub fn check_invariants(state: &GameState, catalog: &Catalog) -> Result<(), InvariantError> {
    let mut zone_ids: Vec<&ZoneId> = state.zones.keys().collect();
    zone_ids.sort();
    for zone_id in zone_ids {
        let zone = &state.zones[zone_id];
        check_pool(zone_id, "mass_remaining", zone.mass_remaining)?;
        check_pool(zone_id, "stored_metal", zone.stored_metal)?;
        check_pool(zone_id, "probe_mass", zone.probe_mass)?;
        check_pool(zone_id, "structure_mass", zone.structure_mass)?;
        check_pool(zone_id, "slag_mass", zone.slag_mass)?;
        check_pool(zone_id, "methalox", zone.methalox)?;
        if zone.mass_remaining <= 0.0 && !zone.depleted {
            return Err(InvariantError::MissingDepletedFlag {
                zone: zone_id.clone(),
            });
        }
    }

    let mut alloc_zones: Vec<&ZoneId> = state.allocations.keys().collect();
    alloc_zones.sort();
    for zone_id in alloc_zones {
        let alloc = &state.allocations[zone_id];
        let sum = alloc.sum();
        if sum > 1.0 + 1e-9 || alloc.values().iter().any(|v| !(0.0..=1.0).contains(v)) {
            return Err(InvariantError::AllocationSum {
                zone: zone_id.clone(),
                sum,
            });
        }
    }

    let expected = if state.dyson.target_mass > 0.0 {
        (state.dyson.mass / state.dyson.target_mass).clamp(0.0, 1.0)
    } else {
        0.0
    };
    if (state.dyson.progress - expected).abs() > 1e-9 {
        return Err(InvariantError::DysonProgress {
            progress: state.dyson.progress,
            expected,
        });
    }

    let throttle = state.rates.throttle;
    if !(THROTTLE_FLOOR..=1.0).contains(&throttle) {
        return Err(InvariantError::ThrottleOutOfBounds(throttle));
    }

    let now = state.meta.time_days;
    for transfer in &state.transfers {
        let batches = match &transfer.kind {
            TransferKind::ContinuousProbe { in_transit, .. }
            | TransferKind::ContinuousMetal { in_transit, .. } => in_transit.as_slice(),
            _ => &[],
        };
        for batch in batches {
            if batch.arrival_time < batch.departure_time {
                return Err(InvariantError::BatchTimeInverted {
                    transfer: transfer.id.clone(),
                });
            }
            if batch.departure_time > now + 1e-9 {
                return Err(InvariantError::BatchOutsideWindow {
                    transfer: transfer.id.clone(),
                });
            }
        }
    }

    let mut tree_ids: Vec<&TreeId> = state.tech.research.keys().collect();
    tree_ids.sort();
    for tree_id in tree_ids {
        let Some(tree_def) = catalog.tree(tree_id) else {
            continue;
        };
        let tiers = &state.tech.research[tree_id];
        for (index, tier) in tiers.iter().enumerate().take(tree_def.tiers.len()) {
            if tier.tranches_completed > catalog.tier_tranches(tree_def, index) {
                return Err(InvariantError::ResearchOverrun {
                    tree: tree_id.clone(),
                    tier: index,
                });
            }
        }
    }

    Ok(())
}
