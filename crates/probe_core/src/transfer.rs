//! Inter-zone transfers: one-time payloads and continuous flows with
//! in-flight batch queues.
//!
//! Continuous transfers drain stock from the source into a fractional
//! accumulator every tick; whole batches depart once the accumulator clears
//! the minimum batch size. Deleting a transfer refunds the accumulator and
//! every undelivered batch, so zone mass is conserved end to end.

use smallvec::SmallVec;

use crate::actions::ActionError;
use crate::catalog::Catalog;
use crate::production::{mass_driver_count, probe_building_rate};
use crate::types::{
    Batch, Event, EventEnvelope, GameState, ProbeTypeId, Transfer, TransferId, TransferKind,
    TransferPayload, TransferSpec, TransferStatus, ZoneId, DEFAULT_PROBE_TYPE,
};

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TransferTotals {
    pub departed_kg: f64,
    pub arrived_kg: f64,
}

/// Mass-driver launch assist: `floor + (1 − floor)·e^(−decay·k)`, so one
/// driver already cuts trip time to ~75% and the floor is 5%.
pub fn speed_multiplier(drivers: u32, catalog: &Catalog) -> f64 {
    if drivers == 0 {
        return 1.0;
    }
    let rules = &catalog.rules.transfer;
    rules.mass_driver_floor
        + (1.0 - rules.mass_driver_floor) * (-rules.mass_driver_decay * f64::from(drivers)).exp()
}

/// Trip duration in days and Δv cost between two zones, for the current
/// propulsion research and mass-driver count. `None` when no leg exists.
pub fn transfer_time(
    state: &GameState,
    catalog: &Catalog,
    from: &ZoneId,
    to: &ZoneId,
    is_metal: bool,
) -> Option<(f64, f64)> {
    let leg = catalog.leg(from, to)?;
    let propulsion = state.tech.skill("propulsion").max(1e-9);
    let dv_bonus = if is_metal {
        state.bonuses.mass_driver_dv_bonus
    } else {
        state.bonuses.probe_dv_bonus
    };
    let mut days = leg.hohmann_days / propulsion / (1.0 + dv_bonus).max(1e-9);
    let drivers = mass_driver_count(state, catalog, from);
    if drivers >= 1 {
        days *= speed_multiplier(drivers, catalog);
    }
    Some((days, leg.delta_v_km_s))
}

fn default_probe_type() -> ProbeTypeId {
    ProbeTypeId(DEFAULT_PROBE_TYPE.to_string())
}

/// Validates and creates a transfer; one-time payloads leave the source zone
/// immediately.
#[allow(clippy::too_many_lines)]
pub(crate) fn create(
    state: &mut GameState,
    catalog: &Catalog,
    spec: &TransferSpec,
) -> Result<TransferId, ActionError> {
    if spec.from_zone == spec.to_zone {
        return Err(ActionError::SameZoneTransfer);
    }
    let from_def = catalog
        .zone(&spec.from_zone)
        .ok_or_else(|| ActionError::UnknownZone(spec.from_zone.clone()))?;
    let _to_def = catalog
        .zone(&spec.to_zone)
        .ok_or_else(|| ActionError::UnknownZone(spec.to_zone.clone()))?;

    let is_metal = matches!(
        spec.payload,
        TransferPayload::OneTimeMetal { .. } | TransferPayload::ContinuousMetal { .. }
    );
    if is_metal && mass_driver_count(state, catalog, &spec.from_zone) == 0 {
        return Err(ActionError::MassDriverRequired(spec.from_zone.clone()));
    }

    let (days, delta_v) = transfer_time(state, catalog, &spec.from_zone, &spec.to_zone, is_metal)
        .ok_or_else(|| ActionError::NoRoute(spec.from_zone.clone(), spec.to_zone.clone()))?;
    if !(days.is_finite() && days > 0.0) {
        return Err(ActionError::InvalidTransferTime(days));
    }

    let probe_mass_kg = catalog.rules.probe_base_rates.probe_mass_kg;
    state.ensure_zone(&spec.from_zone, from_def.total_mass_kg);

    let kind = match &spec.payload {
        TransferPayload::OneTimeProbe {
            probe_type,
            probe_count,
        } => {
            if *probe_count == 0 {
                return Err(ActionError::InvalidAmount(0.0));
            }
            let available = state
                .probes
                .get(&spec.from_zone)
                .and_then(|by_type| by_type.get(probe_type))
                .copied()
                .unwrap_or(0.0);
            if available.floor() < f64::from(*probe_count) {
                return Err(ActionError::InsufficientProbes {
                    zone: spec.from_zone.clone(),
                    requested: *probe_count,
                    available: available.floor(),
                });
            }
            let count = f64::from(*probe_count);
            state.remove_probes(&spec.from_zone, probe_type, count);
            let zone = state.zones.get_mut(&spec.from_zone).expect("ensured");
            zone.probe_mass = (zone.probe_mass - count * probe_mass_kg).max(0.0);
            TransferKind::OneTimeProbe {
                probe_type: probe_type.clone(),
                probe_count: *probe_count,
            }
        }
        TransferPayload::OneTimeMetal { metal_kg } => {
            if !(metal_kg.is_finite() && *metal_kg > 0.0) {
                return Err(ActionError::InvalidAmount(*metal_kg));
            }
            let zone = state.zones.get_mut(&spec.from_zone).expect("ensured");
            if zone.stored_metal < *metal_kg {
                return Err(ActionError::InsufficientMetal {
                    zone: spec.from_zone.clone(),
                    requested: *metal_kg,
                    available: zone.stored_metal,
                });
            }
            zone.stored_metal -= metal_kg;
            TransferKind::OneTimeMetal {
                metal_kg: *metal_kg,
            }
        }
        TransferPayload::ContinuousProbe { rate_percentage } => {
            if !(rate_percentage.is_finite() && (0.0..=100.0).contains(rate_percentage)) {
                return Err(ActionError::InvalidRate(*rate_percentage));
            }
            TransferKind::ContinuousProbe {
                rate_percentage: *rate_percentage,
                accumulator: 0.0,
                in_transit: SmallVec::new(),
            }
        }
        TransferPayload::ContinuousMetal {
            metal_rate_kg_per_day,
        } => {
            if !(metal_rate_kg_per_day.is_finite() && *metal_rate_kg_per_day >= 0.0) {
                return Err(ActionError::InvalidRate(*metal_rate_kg_per_day));
            }
            TransferKind::ContinuousMetal {
                metal_rate_kg_per_day: *metal_rate_kg_per_day,
                accumulator: 0.0,
                in_transit: SmallVec::new(),
            }
        }
    };

    let id = TransferId(format!("transfer_{:04}", state.counters.next_transfer_id));
    state.counters.next_transfer_id += 1;
    let now = state.meta.time_days;
    state.transfers.push(Transfer {
        id: id.clone(),
        from_zone: spec.from_zone.clone(),
        to_zone: spec.to_zone.clone(),
        departure_time: now,
        arrival_time: now + days,
        transfer_time: days,
        delta_v_cost: delta_v,
        status: TransferStatus::Traveling,
        kind,
    });
    Ok(id)
}

fn transfer_position(state: &GameState, id: &TransferId) -> Result<usize, ActionError> {
    state
        .transfers
        .iter()
        .position(|t| &t.id == id)
        .ok_or_else(|| ActionError::UnknownTransfer(id.clone()))
}

pub(crate) fn set_paused(
    state: &mut GameState,
    id: &TransferId,
    paused: bool,
) -> Result<(), ActionError> {
    let position = transfer_position(state, id)?;
    let transfer = &mut state.transfers[position];
    if !transfer.kind.is_continuous() {
        return Err(ActionError::NotContinuous(id.clone()));
    }
    transfer.status = if paused {
        TransferStatus::Paused
    } else {
        TransferStatus::Traveling
    };
    Ok(())
}

pub(crate) fn update_rate(
    state: &mut GameState,
    id: &TransferId,
    rate: f64,
) -> Result<(), ActionError> {
    let position = transfer_position(state, id)?;
    let transfer = &mut state.transfers[position];
    match &mut transfer.kind {
        TransferKind::ContinuousProbe {
            rate_percentage, ..
        } => {
            if !(rate.is_finite() && (0.0..=100.0).contains(&rate)) {
                return Err(ActionError::InvalidRate(rate));
            }
            *rate_percentage = rate;
            Ok(())
        }
        TransferKind::ContinuousMetal {
            metal_rate_kg_per_day,
            ..
        } => {
            if !(rate.is_finite() && rate >= 0.0) {
                return Err(ActionError::InvalidRate(rate));
            }
            *metal_rate_kg_per_day = rate;
            Ok(())
        }
        _ => Err(ActionError::NotContinuous(id.clone())),
    }
}

/// Removes a transfer, returning all undelivered stock to the source zone.
pub(crate) fn delete(
    state: &mut GameState,
    catalog: &Catalog,
    id: &TransferId,
) -> Result<(), ActionError> {
    let position = transfer_position(state, id)?;
    let transfer = state.transfers.remove(position);
    let probe_mass_kg = catalog.rules.probe_base_rates.probe_mass_kg;
    let from_mass = catalog
        .zone(&transfer.from_zone)
        .map_or(0.0, |z| z.total_mass_kg);
    state.ensure_zone(&transfer.from_zone, from_mass);

    match transfer.kind {
        TransferKind::OneTimeProbe {
            probe_type,
            probe_count,
        } => {
            if transfer.status == TransferStatus::Traveling {
                let count = f64::from(probe_count);
                state.add_probes(&transfer.from_zone, &probe_type, count);
                let zone = state.zones.get_mut(&transfer.from_zone).expect("ensured");
                zone.probe_mass += count * probe_mass_kg;
            }
        }
        TransferKind::OneTimeMetal { metal_kg } => {
            if transfer.status == TransferStatus::Traveling {
                let zone = state.zones.get_mut(&transfer.from_zone).expect("ensured");
                zone.stored_metal += metal_kg;
            }
        }
        TransferKind::ContinuousProbe {
            accumulator,
            in_transit,
            ..
        } => {
            let total: f64 = accumulator + in_transit.iter().map(|b| b.amount).sum::<f64>();
            if total > 0.0 {
                state.add_probes(&transfer.from_zone, &default_probe_type(), total);
                let zone = state.zones.get_mut(&transfer.from_zone).expect("ensured");
                zone.probe_mass += total * probe_mass_kg;
            }
        }
        TransferKind::ContinuousMetal {
            accumulator,
            in_transit,
            ..
        } => {
            let total: f64 = accumulator + in_transit.iter().map(|b| b.amount).sum::<f64>();
            if total > 0.0 {
                let zone = state.zones.get_mut(&transfer.from_zone).expect("ensured");
                zone.stored_metal += total;
            }
        }
    }
    Ok(())
}

/// Mass currently outside any zone pool: one-time payloads in flight plus
/// continuous accumulators and batch queues.
pub(crate) fn in_flight_kg(state: &GameState, catalog: &Catalog) -> f64 {
    let probe_mass_kg = catalog.rules.probe_base_rates.probe_mass_kg;
    state
        .transfers
        .iter()
        .map(|transfer| match &transfer.kind {
            TransferKind::OneTimeProbe { probe_count, .. } => {
                if transfer.status == TransferStatus::Traveling {
                    f64::from(*probe_count) * probe_mass_kg
                } else {
                    0.0
                }
            }
            TransferKind::OneTimeMetal { metal_kg } => {
                if transfer.status == TransferStatus::Traveling {
                    *metal_kg
                } else {
                    0.0
                }
            }
            TransferKind::ContinuousProbe {
                accumulator,
                in_transit,
                ..
            } => {
                (accumulator + in_transit.iter().map(|b| b.amount).sum::<f64>()) * probe_mass_kg
            }
            TransferKind::ContinuousMetal {
                accumulator,
                in_transit,
                ..
            } => accumulator + in_transit.iter().map(|b| b.amount).sum::<f64>(),
        })
        .sum()
}

/// Per-tick transfer processing: continuous departures, then arrivals, then
/// completed one-time purging.
pub(crate) fn tick(
    state: &mut GameState,
    catalog: &Catalog,
    throttle: f64,
    dt: f64,
    events: &mut Vec<EventEnvelope>,
) -> TransferTotals {
    let mut totals = TransferTotals::default();
    let now = state.meta.time_days;
    let probe_mass_kg = catalog.rules.probe_base_rates.probe_mass_kg;
    let probe_type = default_probe_type();

    let mut transfers = std::mem::take(&mut state.transfers);
    for transfer in &mut transfers {
        if transfer.kind.is_continuous() {
            // Propulsion research and new mass drivers speed in-flight
            // traffic: recompute the base trip every tick.
            let is_metal = transfer.kind.is_metal();
            if let Some((days, _)) =
                transfer_time(state, catalog, &transfer.from_zone, &transfer.to_zone, is_metal)
            {
                transfer.transfer_time = days;
                transfer.arrival_time = transfer.departure_time + days;
            }

            if transfer.status != TransferStatus::Paused {
                process_continuous_departures(
                    state, catalog, transfer, throttle, dt, now, &probe_type, probe_mass_kg,
                    &mut totals, events,
                );
            }
            process_continuous_arrivals(
                state, catalog, transfer, now, &probe_type, probe_mass_kg, &mut totals, events,
            );
        } else if transfer.status == TransferStatus::Traveling && transfer.arrival_time <= now {
            deliver_one_time(state, catalog, transfer, &mut totals, events);
        }
    }

    // Completed one-time transfers leave the active list.
    transfers.retain(|transfer| {
        !(transfer.status == TransferStatus::Completed && !transfer.kind.is_continuous())
    });
    state.transfers = transfers;
    totals
}

#[allow(clippy::too_many_arguments, clippy::too_many_lines)]
fn process_continuous_departures(
    state: &mut GameState,
    catalog: &Catalog,
    transfer: &mut Transfer,
    throttle: f64,
    dt: f64,
    now: f64,
    probe_type: &ProbeTypeId,
    probe_mass_kg: f64,
    totals: &mut TransferTotals,
    events: &mut Vec<EventEnvelope>,
) {
    let rules = catalog.rules.transfer;
    let trip_days = transfer.transfer_time;

    match &mut transfer.kind {
        TransferKind::ContinuousProbe {
            rate_percentage,
            accumulator,
            in_transit,
        } => {
            // Send rate is a share of the source zone's probe production.
            let send_rate = if let Some(zone_def) = catalog.zone(&transfer.from_zone) {
                let count = state.probe_count(&transfer.from_zone);
                let replicate = state.allocation(&transfer.from_zone).replicate;
                probe_building_rate(state, catalog, zone_def, count * replicate, false)
                    * throttle
                    / probe_mass_kg
                    * (*rate_percentage / 100.0)
            } else {
                0.0
            };

            // Drain fractional probes from the source into the accumulator.
            let available = state
                .probes
                .get(&transfer.from_zone)
                .and_then(|by_type| by_type.get(probe_type))
                .copied()
                .unwrap_or(0.0);
            let take = (send_rate * dt).min(available).max(0.0);
            if take > 0.0 {
                state.remove_probes(&transfer.from_zone, probe_type, take);
                if let Some(zone) = state.zones.get_mut(&transfer.from_zone) {
                    zone.probe_mass = (zone.probe_mass - take * probe_mass_kg).max(0.0);
                }
                *accumulator += take;
            }

            while *accumulator >= rules.min_probe_batch {
                let amount = accumulator.floor();
                if amount < rules.min_probe_batch {
                    break;
                }
                *accumulator -= amount;
                in_transit.push(Batch {
                    amount,
                    departure_time: now,
                    arrival_time: now + trip_days,
                });
                totals.departed_kg += amount * probe_mass_kg;
                events.push(crate::emit(
                    &mut state.counters,
                    state.meta.tick,
                    Event::TransferDeparted {
                        transfer: transfer.id.clone(),
                        amount,
                    },
                ));
            }
        }
        TransferKind::ContinuousMetal {
            metal_rate_kg_per_day,
            accumulator,
            in_transit,
        } => {
            // Metal launches require a live mass driver.
            if mass_driver_count(state, catalog, &transfer.from_zone) == 0 {
                return;
            }
            let available = state
                .zones
                .get(&transfer.from_zone)
                .map_or(0.0, |z| z.stored_metal);
            let take = (*metal_rate_kg_per_day * dt).min(available).max(0.0);
            if take > 0.0 {
                if let Some(zone) = state.zones.get_mut(&transfer.from_zone) {
                    zone.stored_metal -= take;
                }
                *accumulator += take;
            }

            while *accumulator >= rules.min_metal_batch_kg {
                let amount = accumulator.floor();
                if amount < rules.min_metal_batch_kg {
                    break;
                }
                *accumulator -= amount;
                in_transit.push(Batch {
                    amount,
                    departure_time: now,
                    arrival_time: now + trip_days,
                });
                totals.departed_kg += amount;
                events.push(crate::emit(
                    &mut state.counters,
                    state.meta.tick,
                    Event::TransferDeparted {
                        transfer: transfer.id.clone(),
                        amount,
                    },
                ));
            }
        }
        _ => {}
    }
}

#[allow(clippy::too_many_arguments)]
fn process_continuous_arrivals(
    state: &mut GameState,
    catalog: &Catalog,
    transfer: &mut Transfer,
    now: f64,
    probe_type: &ProbeTypeId,
    probe_mass_kg: f64,
    totals: &mut TransferTotals,
    events: &mut Vec<EventEnvelope>,
) {
    let to_mass = catalog
        .zone(&transfer.to_zone)
        .map_or(0.0, |z| z.total_mass_kg);
    let is_metal = transfer.kind.is_metal();
    let (in_transit, id, to_zone) = match &mut transfer.kind {
        TransferKind::ContinuousProbe { in_transit, .. }
        | TransferKind::ContinuousMetal { in_transit, .. } => {
            (in_transit, transfer.id.clone(), transfer.to_zone.clone())
        }
        _ => return,
    };

    let mut index = 0;
    while index < in_transit.len() {
        if in_transit[index].arrival_time > now {
            index += 1;
            continue;
        }
        let batch = in_transit.remove(index);
        state.ensure_zone(&to_zone, to_mass);
        if is_metal {
            let zone = state.zones.get_mut(&to_zone).expect("ensured");
            zone.stored_metal += batch.amount;
            totals.arrived_kg += batch.amount;
        } else {
            state.add_probes(&to_zone, probe_type, batch.amount);
            let zone = state.zones.get_mut(&to_zone).expect("ensured");
            zone.probe_mass += batch.amount * probe_mass_kg;
            totals.arrived_kg += batch.amount * probe_mass_kg;
        }
        events.push(crate::emit(
            &mut state.counters,
            state.meta.tick,
            Event::TransferArrived {
                transfer: id.clone(),
                amount: batch.amount,
            },
        ));
    }
}

fn deliver_one_time(
    state: &mut GameState,
    catalog: &Catalog,
    transfer: &mut Transfer,
    totals: &mut TransferTotals,
    events: &mut Vec<EventEnvelope>,
) {
    let to_mass = catalog
        .zone(&transfer.to_zone)
        .map_or(0.0, |z| z.total_mass_kg);
    state.ensure_zone(&transfer.to_zone, to_mass);
    let probe_mass_kg = catalog.rules.probe_base_rates.probe_mass_kg;

    let amount = match &transfer.kind {
        TransferKind::OneTimeProbe {
            probe_type,
            probe_count,
        } => {
            let count = f64::from(*probe_count);
            state.add_probes(&transfer.to_zone, probe_type, count);
            let zone = state.zones.get_mut(&transfer.to_zone).expect("ensured");
            zone.probe_mass += count * probe_mass_kg;
            totals.arrived_kg += count * probe_mass_kg;
            count
        }
        TransferKind::OneTimeMetal { metal_kg } => {
            let zone = state.zones.get_mut(&transfer.to_zone).expect("ensured");
            zone.stored_metal += metal_kg;
            totals.arrived_kg += metal_kg;
            *metal_kg
        }
        _ => return,
    };

    transfer.status = TransferStatus::Completed;
    state.cumulative.transfers_completed += 1;
    events.push(crate::emit(
        &mut state.counters,
        state.meta.tick,
        Event::TransferArrived {
            transfer: transfer.id.clone(),
            amount,
        },
    ));
    events.push(crate::emit(
        &mut state.counters,
        state.meta.tick,
        Event::TransferCompleted {
            transfer: transfer.id.clone(),
        },
    ));
}
