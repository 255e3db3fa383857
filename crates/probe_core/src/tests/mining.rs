//! Mining, extraction efficiency, and slag recycling.

use crate::test_fixtures::*;
use crate::*;

const DT: f64 = 1.0 / 60.0;

#[test]
fn zone_mining_multiplier_applies() {
    let catalog = base_catalog();
    let mut state = base_state(&catalog);
    place_probes(&mut state, &catalog, &luna(), 10.0);
    set_allocation(
        &mut state,
        &luna(),
        ProbeAllocations {
            harvest: 1.0,
            ..Default::default()
        },
    );

    tick(&mut state, &[], &catalog);

    // Luna mines at 1.5×: 10 probes × 100 × 1.5 = 1500 kg/day.
    let zone = &state.zones[&luna()];
    assert!((zone.mass_remaining - (5e11 - 1_500.0 * DT)).abs() < 1e-4);
}

#[test]
fn refineries_raise_extraction_efficiency() {
    let catalog = base_catalog();
    let mut state = base_state(&catalog);
    state
        .structures
        .entry(earth())
        .or_default()
        .insert(BuildingId("refinery".to_string()), 4);

    let zone_def = catalog.zone(&earth()).unwrap();
    let efficiency = extraction_efficiency(&state, &catalog, zone_def);
    // 0.3 base + 4 × 0.05 refinery bonus.
    assert!((efficiency - 0.5).abs() < 1e-12);
}

#[test]
fn extraction_efficiency_clamps_at_one() {
    let catalog = base_catalog();
    let mut state = base_state(&catalog);
    state
        .structures
        .entry(earth())
        .or_default()
        .insert(BuildingId("refinery".to_string()), 100);
    let zone_def = catalog.zone(&earth()).unwrap();
    assert!((extraction_efficiency(&state, &catalog, zone_def) - 1.0).abs() < 1e-12);
}

#[test]
fn structure_mining_contributes_geometrically() {
    let catalog = base_catalog();
    let mut state = base_state(&catalog);
    // Ample power so the rigs run unthrottled.
    state.base_energy_production_w = 1e9;
    state
        .structures
        .entry(earth())
        .or_default()
        .insert(BuildingId("mining_rig".to_string()), 3);

    // Rig base = 50 × 100 kg/day; three rigs scale by 3^2.1.
    let expected = 50.0 * 100.0 * 3f64.powf(2.1);
    let rate = structure_mining_rate(&state, &catalog, &earth());
    assert!((rate - expected).abs() < 1e-6);

    tick(&mut state, &[], &catalog);
    // Structures mine even with zero harvest allocation.
    assert!((state.rates.mass_mining_kg_per_day - expected).abs() < 1e-3);
}

#[test]
fn mining_never_overdraws_the_zone() {
    let catalog = base_catalog();
    let mut state = base_state(&catalog);
    place_probes(&mut state, &catalog, &earth(), 999_999.0);
    state.zones.get_mut(&earth()).unwrap().mass_remaining = 10.0;
    set_allocation(
        &mut state,
        &earth(),
        ProbeAllocations {
            harvest: 1.0,
            ..Default::default()
        },
    );

    tick(&mut state, &[], &catalog);
    let zone = &state.zones[&earth()];
    assert!(zone.mass_remaining.abs() < 1e-12);
    assert!(zone.depleted);
    // Exactly the 10 kg that existed was split into metal and slag.
    assert!((zone.stored_metal + zone.slag_mass - 10.0).abs() < 1e-9);
}

#[test]
fn recycle_allocation_recovers_metal_from_slag() {
    let catalog = base_catalog();
    let mut state = base_state(&catalog);
    state.base_energy_production_w = 1e9;
    place_probes(&mut state, &catalog, &earth(), 99.0); // 100 probes
    state.zones.get_mut(&earth()).unwrap().slag_mass = 1e6;
    set_allocation(
        &mut state,
        &earth(),
        ProbeAllocations {
            recycle: 1.0,
            ..Default::default()
        },
    );

    tick(&mut state, &[], &catalog);

    // 100 probes × 100 kg/day processed, 10% recovered without research.
    let processed = 100.0 * 100.0 * DT;
    let recovered = processed * 0.1;
    let zone = &state.zones[&earth()];
    assert!((zone.stored_metal - recovered).abs() < 1e-9);
    assert!((zone.slag_mass - (1e6 - recovered)).abs() < 1e-6);
    assert!((state.rates.slag_recycling_kg_per_day - 10_000.0).abs() < 1e-6);
}

#[test]
fn recycling_conserves_zone_mass() {
    let catalog = base_catalog();
    let mut state = base_state(&catalog);
    state.base_energy_production_w = 1e9;
    place_probes(&mut state, &catalog, &earth(), 49.0);
    state.zones.get_mut(&earth()).unwrap().slag_mass = 500.0;
    set_allocation(
        &mut state,
        &earth(),
        ProbeAllocations {
            recycle: 1.0,
            ..Default::default()
        },
    );

    let before = state.zones[&earth()].total_mass();
    run_ticks(&mut state, &catalog, 30);
    let after = state.zones[&earth()].total_mass();
    assert!((before - after).abs() < 1e-6);
}

#[test]
fn dyson_zone_never_mines() {
    let catalog = base_catalog();
    let mut state = base_state(&catalog);
    place_probes(&mut state, &catalog, &dyson_zone(), 100.0);
    set_allocation(
        &mut state,
        &dyson_zone(),
        ProbeAllocations {
            harvest: 1.0,
            ..Default::default()
        },
    );
    tick(&mut state, &[], &catalog);
    assert!((state.rates.mass_mining_kg_per_day).abs() < 1e-12);
}
