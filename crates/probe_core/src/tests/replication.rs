//! Probe replication: commits, metal limiting, mass-ratio throttling,
//! factory assist, and decommissioning.

use crate::test_fixtures::*;
use crate::*;

#[test]
fn replication_commits_whole_probes() {
    let catalog = base_catalog();
    let mut state = base_state(&catalog);
    place_probes(&mut state, &catalog, &earth(), 999.0); // 1000 probes
    state.zones.get_mut(&earth()).unwrap().stored_metal = 1e9;
    set_allocation(
        &mut state,
        &earth(),
        ProbeAllocations {
            replicate: 1.0,
            ..Default::default()
        },
    );

    let events = tick(&mut state, &[], &catalog);

    // 1000 × 20 kg/day over 1/60 day = 333.33 kg ⇒ 3 probes, 33.33 carried.
    assert!((state.probe_count(&earth()) - 1_003.0).abs() < 1e-9);
    assert!((state.zones[&earth()].probe_mass - 100_300.0).abs() < 1e-9);
    assert_eq!(state.cumulative.probes_built, 3);
    let carried = state.construction.probe_progress[&earth()][&probe_type()];
    assert!((carried - 100.0 / 3.0).abs() < 1e-6);
    assert!(events.iter().any(|e| matches!(
        &e.event,
        Event::ProbesReplicated { count: 3, .. }
    )));
}

#[test]
fn replication_is_metal_limited() {
    let catalog = base_catalog();
    let mut state = base_state(&catalog);
    place_probes(&mut state, &catalog, &earth(), 999.0);
    state.zones.get_mut(&earth()).unwrap().stored_metal = 10.0;
    set_allocation(
        &mut state,
        &earth(),
        ProbeAllocations {
            replicate: 1.0,
            ..Default::default()
        },
    );

    tick(&mut state, &[], &catalog);

    // Only 10 kg of metal existed, so only 10 kg of progress happened.
    assert!(state.zones[&earth()].stored_metal.abs() < 1e-9);
    let carried = state.construction.probe_progress[&earth()][&probe_type()];
    assert!((carried - 10.0).abs() < 1e-9);
    assert!((state.probe_count(&earth()) - 1_000.0).abs() < 1e-9);
}

#[test]
fn replication_halts_at_mass_ratio_limit() {
    let catalog = base_catalog();
    let mut state = base_state(&catalog);
    place_probes(&mut state, &catalog, &earth(), 99.0);
    state.zones.get_mut(&earth()).unwrap().stored_metal = 1e6;
    state.mass_limits.insert(
        earth(),
        ZoneMassLimits {
            replicate: 1e-12,
            ..Default::default()
        },
    );
    set_allocation(
        &mut state,
        &earth(),
        ProbeAllocations {
            replicate: 1.0,
            ..Default::default()
        },
    );

    tick(&mut state, &[], &catalog);

    // Ratio is already far above the limit: nothing replicates.
    assert!((state.probe_count(&earth()) - 100.0).abs() < 1e-9);
    assert!((state.zones[&earth()].stored_metal - 1e6).abs() < 1e-9);
    assert!(state.rates.replication_kg_per_day.abs() < 1e-12);
}

#[test]
fn mass_throttle_ramps_near_the_limit() {
    // Ratio 9.5e-5 against limit 1e-4 leaves half the 10% ramp.
    let throttle = crate::probes::mass_ratio_throttle(9.5e-5, 1e-4);
    assert!((throttle - 0.5).abs() < 1e-9);
}

#[test]
fn factories_replicate_without_probe_allocation() {
    let catalog = base_catalog();
    let mut state = base_state(&catalog);
    state.base_energy_production_w = 1e9;
    state.zones.get_mut(&earth()).unwrap().stored_metal = 1e9;
    state
        .structures
        .entry(earth())
        .or_default()
        .insert(BuildingId("factory".to_string()), 1);

    tick(&mut state, &[], &catalog);

    // Factory base = 25 × 20 = 500 kg/day ⇒ 8.33 kg on the first tick.
    let carried = state.construction.probe_progress[&earth()][&probe_type()];
    assert!((carried - 500.0 / 60.0).abs() < 1e-6);
}

#[test]
fn probes_above_recycle_limit_are_scrapped_for_metal() {
    let catalog = base_catalog();
    let mut state = base_state(&catalog);
    place_probes(&mut state, &catalog, &earth(), 999.0); // 1000 probes
    state.mass_limits.insert(
        earth(),
        ZoneMassLimits {
            recycle_probes: 1e-12,
            ..Default::default()
        },
    );

    let events = tick(&mut state, &[], &catalog);

    // Scrapping is bounded by build throughput: 20 000 kg/day over 1/60 day
    // = 333 kg ⇒ 3 whole probes back to metal.
    assert!((state.probe_count(&earth()) - 997.0).abs() < 1e-9);
    let zone = &state.zones[&earth()];
    assert!((zone.probe_mass - 99_700.0).abs() < 1e-9);
    assert!((zone.stored_metal - 300.0).abs() < 1e-9);
    assert!(events.iter().any(|e| matches!(
        &e.event,
        Event::ProbesDecommissioned { count: 3, .. }
    )));
}

#[test]
fn no_scrapping_at_default_limits() {
    let catalog = base_catalog();
    let mut state = base_state(&catalog);
    place_probes(&mut state, &catalog, &earth(), 999.0);
    run_ticks(&mut state, &catalog, 10);
    assert!((state.probe_count(&earth()) - 1_000.0).abs() < 1e-9);
    assert_eq!(state.cumulative.probes_scrapped, 0);
}
