//! Structure construction: the enabled-site queue, metal consumption, and
//! unit completion.

use crate::test_fixtures::*;
use crate::*;

fn earth_construction_state(catalog: &Catalog, probes: f64, metal: f64) -> GameState {
    let mut state = base_state(catalog);
    state.base_energy_production_w = 1e12;
    place_probes(&mut state, catalog, &earth(), probes - 1.0);
    state.zones.get_mut(&earth()).unwrap().stored_metal = metal;
    set_allocation(
        &mut state,
        &earth(),
        ProbeAllocations {
            construct: 1.0,
            ..Default::default()
        },
    );
    state
}

#[test]
fn enable_construction_registers_the_site() {
    let catalog = base_catalog();
    let mut state = base_state(&catalog);
    let enable = act(
        1,
        Action::EnableConstruction {
            zone: earth(),
            building: BuildingId("solar_array".to_string()),
        },
    );
    tick(&mut state, &[enable], &catalog);

    let site = SiteKey::new(&earth(), &BuildingId("solar_array".to_string()));
    assert!(state.construction.enabled.contains(&site));
    assert!((state.construction.targets[&site] - 2e5).abs() < 1e-9);
    assert!(state.construction.start_times.contains_key(&site));
}

#[test]
fn construction_accumulates_and_consumes_metal() {
    let catalog = base_catalog();
    let mut state = earth_construction_state(&catalog, 1_000.0, 1e9);
    let enable = act(
        1,
        Action::EnableConstruction {
            zone: earth(),
            building: BuildingId("solar_array".to_string()),
        },
    );
    tick(&mut state, &[enable], &catalog);

    // 1000 probes × 20 kg/day over 1/60 day.
    let expected = 1_000.0 * 20.0 / 60.0;
    let site = SiteKey::new(&earth(), &BuildingId("solar_array".to_string()));
    assert!((state.construction.progress[&site] - expected).abs() < 1e-6);
    assert!((state.zones[&earth()].stored_metal - (1e9 - expected)).abs() < 1e-3);
    assert!((state.rates.construction_kg_per_day - 20_000.0).abs() < 1e-6);
}

#[test]
fn construction_completes_units_and_adds_structure_mass() {
    let catalog = base_catalog();
    let mut state = earth_construction_state(&catalog, 1_000.0, 1e9);
    let enable = act(
        1,
        Action::EnableConstruction {
            zone: earth(),
            building: BuildingId("solar_array".to_string()),
        },
    );
    tick(&mut state, &[enable], &catalog);
    // 2e5 kg target at 333.33 kg/tick ⇒ done within 601 ticks.
    run_ticks(&mut state, &catalog, 650);

    let count = state.structure_count(&earth(), &BuildingId("solar_array".to_string()));
    assert!(count >= 1, "expected at least one completed solar array");
    assert!(state.zones[&earth()].structure_mass >= 2e5);
    assert!(state.cumulative.structures_built >= 1);
}

#[test]
fn budget_splits_across_enabled_sites() {
    let catalog = base_catalog();
    let mut state = earth_construction_state(&catalog, 1_000.0, 1e9);
    let enable_a = act(
        1,
        Action::EnableConstruction {
            zone: earth(),
            building: BuildingId("solar_array".to_string()),
        },
    );
    let enable_b = act(
        2,
        Action::EnableConstruction {
            zone: earth(),
            building: BuildingId("refinery".to_string()),
        },
    );
    tick(&mut state, &[enable_a, enable_b], &catalog);

    let expected_each = 1_000.0 * 20.0 / 60.0 / 2.0;
    let site_a = SiteKey::new(&earth(), &BuildingId("solar_array".to_string()));
    let site_b = SiteKey::new(&earth(), &BuildingId("refinery".to_string()));
    assert!((state.construction.progress[&site_a] - expected_each).abs() < 1e-6);
    assert!((state.construction.progress[&site_b] - expected_each).abs() < 1e-6);
}

#[test]
fn disable_construction_stops_progress_but_keeps_partial_work() {
    let catalog = base_catalog();
    let mut state = earth_construction_state(&catalog, 1_000.0, 1e9);
    let building = BuildingId("solar_array".to_string());
    let enable = act(
        1,
        Action::EnableConstruction {
            zone: earth(),
            building: building.clone(),
        },
    );
    tick(&mut state, &[enable], &catalog);
    let site = SiteKey::new(&earth(), &building);
    let partial = state.construction.progress[&site];
    assert!(partial > 0.0);

    let disable = act(
        2,
        Action::DisableConstruction {
            zone: earth(),
            building,
        },
    );
    tick(&mut state, &[disable], &catalog);
    let frozen = state.construction.progress[&site];
    tick(&mut state, &[], &catalog);

    assert!((state.construction.progress[&site] - frozen).abs() < 1e-12);
    assert!(frozen >= partial);
}

#[test]
fn construction_without_metal_does_nothing() {
    let catalog = base_catalog();
    let mut state = earth_construction_state(&catalog, 1_000.0, 0.0);
    let enable = act(
        1,
        Action::EnableConstruction {
            zone: earth(),
            building: BuildingId("solar_array".to_string()),
        },
    );
    tick(&mut state, &[enable], &catalog);
    let site = SiteKey::new(&earth(), &BuildingId("solar_array".to_string()));
    assert!(state
        .construction
        .progress
        .get(&site)
        .copied()
        .unwrap_or(0.0)
        .abs()
        < 1e-12);
}
