//! Energy balance: structure production/consumption scaling and the
//! throttle path through the tick.

use crate::test_fixtures::*;
use crate::*;

#[test]
fn solar_structures_scale_superlinearly() {
    let catalog = base_catalog();
    let mut state = base_state(&catalog);
    state
        .structures
        .entry(earth())
        .or_default()
        .insert(BuildingId("solar_array".to_string()), 2);

    let balance = balance(&state, &catalog);
    // 100 MW × 2^3.2 × irradiance 1, plus endowment and one probe's trickle.
    let expected_solar = 100.0 * 1e6 * 2f64.powf(3.2);
    let expected = 100_000.0 + 10.0 + expected_solar;
    assert!((balance.production_w - expected).abs() < 1.0);
}

#[test]
fn solar_irradiance_scales_with_zone() {
    let mut catalog = base_catalog();
    catalog.zones[0].solar_irradiance_factor = 2.0;
    catalog.init_caches();

    let mut state = base_state(&catalog);
    state
        .structures
        .entry(earth())
        .or_default()
        .insert(BuildingId("solar_array".to_string()), 1);

    let balance = balance(&state, &catalog);
    assert!((balance.production_w - (100_000.0 + 10.0 + 2.0 * 100.0 * 1e6)).abs() < 1.0);
}

#[test]
fn mass_driver_draw_counts_against_consumption() {
    let catalog = base_catalog();
    let mut state = base_state(&catalog);
    state
        .structures
        .entry(earth())
        .or_default()
        .insert(BuildingId("mass_driver".to_string()), 1);

    let balance = balance(&state, &catalog);
    assert!((balance.consumption_w - 10.0 * 1e6).abs() < 1e-6);
    assert!(balance.throttle < 1.0, "10 MW draw exceeds the endowment");
}

#[test]
fn idle_probes_draw_nothing() {
    let catalog = base_catalog();
    let mut state = base_state(&catalog);
    place_probes(&mut state, &catalog, &earth(), 999.0);
    // Replication and construction allocations do not consume energy.
    set_allocation(
        &mut state,
        &earth(),
        ProbeAllocations {
            replicate: 0.5,
            construct: 0.5,
            ..Default::default()
        },
    );
    let balance = balance(&state, &catalog);
    assert!(balance.consumption_w.abs() < 1e-9);
    assert!((balance.throttle - 1.0).abs() < 1e-12);
}

#[test]
fn harvest_and_recycle_allocations_draw_power() {
    let catalog = base_catalog();
    let mut state = base_state(&catalog);
    place_probes(&mut state, &catalog, &earth(), 9.0); // 10 probes
    set_allocation(
        &mut state,
        &earth(),
        ProbeAllocations {
            harvest: 0.5,
            recycle: 0.5,
            ..Default::default()
        },
    );
    let balance = balance(&state, &catalog);
    // 5 probes × 1000 W mining + 5 probes × 2000 W recycling.
    assert!((balance.consumption_w - (5.0 * 1_000.0 + 5.0 * 2_000.0)).abs() < 1e-6);
}

#[test]
fn dyson_economy_share_feeds_production() {
    let catalog = base_catalog();
    let mut state = base_state(&catalog);
    state.dyson.mass = 1_000.0;
    state.dyson.power_allocation = 0.25;

    let balance = balance(&state, &catalog);
    // 5000 / 0.29² ≈ 59 453 W/kg; 75% of it feeds the economy.
    let per_kg = 5_000.0 / (0.29 * 0.29);
    let expected_dyson = 1_000.0 * per_kg;
    assert!((balance.dyson_total_w - expected_dyson).abs() < 1e-3);
    assert!(
        (balance.production_w - (100_000.0 + 10.0 + 0.75 * expected_dyson)).abs() < 1e-3
    );
}

#[test]
fn throttle_lands_in_rates_every_tick() {
    let catalog = base_catalog();
    let mut state = base_state(&catalog);
    run_ticks(&mut state, &catalog, 5);
    assert!((THROTTLE_FLOOR..=1.0).contains(&state.rates.throttle));
}
