//! Action validation and application.
//!
//! Actions arrive queued from the collaborator and drain FIFO at the tick
//! boundary. Each either fully applies or fails atomically; failures are
//! reported through `ActionCompleted` events and never abort the tick.

use thiserror::Error;

use crate::catalog::Catalog;
use crate::transfer;
use crate::types::{
    Action, ActionEnvelope, Event, EventEnvelope, GameState, SiteKey, TransferId, ZoneId,
};

#[derive(Debug, Clone, Error)]
pub enum ActionError {
    #[error("unknown zone '{0}'")]
    UnknownZone(ZoneId),
    #[error("unknown building '{0}'")]
    UnknownBuilding(crate::types::BuildingId),
    #[error("unknown research tree '{0}'")]
    UnknownTree(crate::types::TreeId),
    #[error("tree '{tree}' has no tier {tier}")]
    UnknownTier {
        tree: crate::types::TreeId,
        tier: usize,
    },
    #[error("unknown transfer '{0}'")]
    UnknownTransfer(TransferId),
    #[error("allocation out of range: {0}")]
    AllocationOutOfRange(f64),
    #[error("allocation sum {0} exceeds 1")]
    AllocationSumExceeded(f64),
    #[error("mass limit out of range: {0}")]
    MassLimitOutOfRange(f64),
    #[error("source and destination zone are the same")]
    SameZoneTransfer,
    #[error("no transfer route between '{0}' and '{1}'")]
    NoRoute(ZoneId, ZoneId),
    #[error("metal transfers require a mass driver in '{0}'")]
    MassDriverRequired(ZoneId),
    #[error("transfer time {0} is not positive")]
    InvalidTransferTime(f64),
    #[error("invalid amount: {0}")]
    InvalidAmount(f64),
    #[error("invalid rate: {0}")]
    InvalidRate(f64),
    #[error("zone '{zone}' has {available} probes, {requested} requested")]
    InsufficientProbes {
        zone: ZoneId,
        requested: u32,
        available: f64,
    },
    #[error("zone '{zone}' has {available} kg metal, {requested} kg requested")]
    InsufficientMetal {
        zone: ZoneId,
        requested: f64,
        available: f64,
    },
    #[error("transfer '{0}' is not continuous")]
    NotContinuous(TransferId),
    #[error("value out of range: {0}")]
    OutOfRange(f64),
}

/// Drains the action queue in FIFO order, reporting each outcome.
pub(crate) fn apply_actions(
    state: &mut GameState,
    actions: &[ActionEnvelope],
    catalog: &Catalog,
    events: &mut Vec<EventEnvelope>,
) {
    for envelope in actions {
        let result = apply_action(state, &envelope.action, catalog);
        let current_tick = state.meta.tick;
        events.push(crate::emit(
            &mut state.counters,
            current_tick,
            Event::ActionCompleted {
                action_id: envelope.id.clone(),
                success: result.is_ok(),
                error: result.err().map(|error| error.to_string()),
            },
        ));
    }
}

fn in_unit_range(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

#[allow(clippy::too_many_lines)]
fn apply_action(
    state: &mut GameState,
    action: &Action,
    catalog: &Catalog,
) -> Result<(), ActionError> {
    match action {
        Action::SetZoneAllocation { zone, allocations } => {
            catalog
                .zone(zone)
                .ok_or_else(|| ActionError::UnknownZone(zone.clone()))?;
            for value in allocations.values() {
                if !in_unit_range(value) {
                    return Err(ActionError::AllocationOutOfRange(value));
                }
            }
            let sum = allocations.sum();
            if sum > 1.0 + 1e-9 {
                return Err(ActionError::AllocationSumExceeded(sum));
            }
            state.allocations.insert(zone.clone(), *allocations);
            Ok(())
        }
        Action::SetZoneMassLimit { zone, limits } => {
            catalog
                .zone(zone)
                .ok_or_else(|| ActionError::UnknownZone(zone.clone()))?;
            for value in [limits.replicate, limits.construct, limits.recycle_probes] {
                if !in_unit_range(value) {
                    return Err(ActionError::MassLimitOutOfRange(value));
                }
            }
            state.mass_limits.insert(zone.clone(), *limits);
            Ok(())
        }
        Action::EnableTier { tree, tier } => set_tier_enabled(state, catalog, tree, *tier, true),
        Action::DisableTier { tree, tier } => set_tier_enabled(state, catalog, tree, *tier, false),
        Action::EnableConstruction { zone, building } => {
            catalog
                .zone(zone)
                .ok_or_else(|| ActionError::UnknownZone(zone.clone()))?;
            let def = catalog
                .building(building)
                .ok_or_else(|| ActionError::UnknownBuilding(building.clone()))?;
            let site = SiteKey::new(zone, building);
            if !state.construction.enabled.contains(&site) {
                state.construction.enabled.push(site.clone());
                state
                    .construction
                    .targets
                    .entry(site.clone())
                    .or_insert(def.mass_kg);
                state
                    .construction
                    .start_times
                    .entry(site)
                    .or_insert(state.meta.time_days);
            }
            Ok(())
        }
        Action::DisableConstruction { zone, building } => {
            catalog
                .zone(zone)
                .ok_or_else(|| ActionError::UnknownZone(zone.clone()))?;
            catalog
                .building(building)
                .ok_or_else(|| ActionError::UnknownBuilding(building.clone()))?;
            let site = SiteKey::new(zone, building);
            state.construction.enabled.retain(|entry| entry != &site);
            Ok(())
        }
        Action::CreateTransfer { spec } => transfer::create(state, catalog, spec).map(|_| ()),
        Action::PauseTransfer { transfer } => transfer::set_paused(state, transfer, true),
        Action::ResumeTransfer { transfer } => transfer::set_paused(state, transfer, false),
        Action::DeleteTransfer { transfer } => transfer::delete(state, catalog, transfer),
        Action::UpdateTransferRate { transfer, rate } => {
            transfer::update_rate(state, transfer, *rate)
        }
        Action::SetDysonPowerAllocation { allocation } => {
            if !in_unit_range(*allocation) {
                return Err(ActionError::OutOfRange(*allocation));
            }
            state.dyson.power_allocation = *allocation;
            Ok(())
        }
        Action::SetTimeSpeed { speed } => {
            if !speed.is_finite() || *speed <= 0.0 {
                return Err(ActionError::OutOfRange(*speed));
            }
            state.meta.set_speed(*speed);
            Ok(())
        }
        Action::SetResearchWeight { tree, weight } => {
            catalog
                .tree(tree)
                .ok_or_else(|| ActionError::UnknownTree(tree.clone()))?;
            if !weight.is_finite() || *weight < 0.0 {
                return Err(ActionError::OutOfRange(*weight));
            }
            state.tech.weights.insert(tree.clone(), *weight);
            Ok(())
        }
    }
}

/// Toggles a tier's enabled bit without touching its tranche progress.
fn set_tier_enabled(
    state: &mut GameState,
    catalog: &Catalog,
    tree: &crate::types::TreeId,
    tier: usize,
    enabled: bool,
) -> Result<(), ActionError> {
    let tree_def = catalog
        .tree(tree)
        .ok_or_else(|| ActionError::UnknownTree(tree.clone()))?;
    if tier >= tree_def.tiers.len() {
        return Err(ActionError::UnknownTier {
            tree: tree.clone(),
            tier,
        });
    }
    let tiers = state.tech.research.entry(tree.clone()).or_default();
    while tiers.len() < tree_def.tiers.len() {
        tiers.push(crate::types::TierState::default());
    }
    tiers[tier].enabled = enabled;
    Ok(())
}
