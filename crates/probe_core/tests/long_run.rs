//! Long-horizon integration run: thousands of ticks across the full
//! pipeline with invariants checked throughout.

use probe_core::test_fixtures::*;
use probe_core::*;

fn conserved_sum(state: &GameState, catalog: &Catalog) -> f64 {
    let zones: f64 = state.zones.values().map(ZoneState::total_mass).sum();
    let probe_progress: f64 = state
        .construction
        .probe_progress
        .values()
        .flat_map(|by_type| by_type.values())
        .sum();
    let site_progress: f64 = state.construction.progress.values().sum();
    zones
        + probe_progress
        + site_progress
        + state.derived.in_flight_kg
        + state.dyson.mass * catalog.rules.metal_per_dyson_kg
}

#[test]
fn five_thousand_ticks_of_full_expansion() {
    let catalog = base_catalog();
    let mut state = base_state(&catalog);
    state.base_energy_production_w = 1e12;
    state.history.every_ticks = 60;
    place_probes(&mut state, &catalog, &earth(), 199.0);
    state.zones.get_mut(&earth()).unwrap().stored_metal = 1e6;
    state
        .structures
        .entry(earth())
        .or_default()
        .extend([
            (BuildingId("mass_driver".to_string()), 1),
            (BuildingId("compute_cluster".to_string()), 2),
        ]);
    set_allocation(
        &mut state,
        &earth(),
        ProbeAllocations {
            harvest: 0.5,
            replicate: 0.4,
            recycle: 0.1,
            ..Default::default()
        },
    );
    set_allocation(
        &mut state,
        &dyson_zone(),
        ProbeAllocations {
            dyson: 1.0,
            ..Default::default()
        },
    );

    let setup = [
        act(
            1,
            Action::CreateTransfer {
                spec: TransferSpec {
                    from_zone: earth(),
                    to_zone: dyson_zone(),
                    payload: TransferPayload::ContinuousMetal {
                        metal_rate_kg_per_day: 20_000.0,
                    },
                },
            },
        ),
        act(
            2,
            Action::CreateTransfer {
                spec: TransferSpec {
                    from_zone: earth(),
                    to_zone: dyson_zone(),
                    payload: TransferPayload::ContinuousProbe {
                        rate_percentage: 25.0,
                    },
                },
            },
        ),
        act(3, Action::SetTimeSpeed { speed: 10.0 }),
    ];
    let events = tick(&mut state, &setup, &catalog);
    assert!(
        events.iter().all(|e| !matches!(
            &e.event,
            Event::ActionCompleted { success: false, .. }
        )),
        "setup actions must all apply"
    );

    let mut previous = conserved_sum(&state, &catalog);
    for round in 0..5_000u32 {
        tick(&mut state, &[], &catalog);
        if round % 50 == 0 {
            check_invariants(&state, &catalog).expect("invariants hold");
            let current = conserved_sum(&state, &catalog);
            assert!(
                current <= previous + previous.abs() * 1e-9,
                "tracked mass grew at round {round}: {previous} -> {current}"
            );
            previous = current;
        }
    }

    // 5000 ticks at speed 10 ≈ 833 days: the swarm grew, metal reached the
    // Dyson zone, and shell mass exists.
    assert!(state.probe_count(&earth()) > 200.0, "swarm should grow");
    assert!(
        state.dyson.mass > 0.0,
        "delivered metal should become shell mass"
    );
    assert!(state.cumulative.probes_built > 0);
    assert!(state.cumulative.mass_mined_kg > 0.0);
    assert!(!state.history.samples.is_empty());
    let last = state.history.samples.back().unwrap();
    assert!(last.total_probes > 0.0);
    assert!(last.rates.throttle >= THROTTLE_FLOOR);
}
