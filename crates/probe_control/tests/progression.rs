//! Progression regression tests.
//!
//! These run the full tick loop under the autopilot and verify expansion
//! milestones land within expected windows. They catch rate regressions from
//! catalog retuning.

use probe_control::{ActionSource, AutopilotController};
use probe_core::test_fixtures::{base_catalog, dyson_zone, earth, place_probes};
use probe_core::{BuildingId, ProbeAllocations, StartConfig, TransferKind};
use probe_world::build_initial_state;

fn start_config() -> StartConfig {
    StartConfig {
        initial_metal: 0.0,
        base_energy_production: 1e9,
        dyson_target_mass: 2e23,
        skill_bonuses: probe_core::SkillBonuses::default(),
        default_zone: earth(),
        initial_probes: 10,
        history_every_ticks: 0,
    }
}

#[test]
fn autopilot_grows_the_swarm_within_a_simulated_quarter() {
    let catalog = base_catalog();
    let mut state = build_initial_state(&catalog, &start_config());
    let mut autopilot = AutopilotController;
    let mut next_action_id = 0;

    // 90 days at speed 1 is 5400 ticks.
    for _ in 0..5_400 {
        let actions = autopilot.generate_actions(&state, &catalog, &mut next_action_id);
        probe_core::tick(&mut state, &actions, &catalog);
    }

    probe_core::check_invariants(&state, &catalog).expect("autopilot run stays valid");
    assert!(
        state.probe_count(&earth()) > 10.0,
        "the swarm should replicate beyond the endowment, got {}",
        state.probe_count(&earth())
    );
    assert!(state.cumulative.mass_mined_kg > 0.0);
    assert!(
        (state.allocation(&earth()).harvest - 0.6).abs() < 1e-12,
        "autopilot should have seeded the harvest/replicate split"
    );
}

#[test]
fn autopilot_feeds_the_dyson_shell_once_a_driver_exists() {
    let catalog = base_catalog();
    let mut state = build_initial_state(&catalog, &start_config());
    place_probes(&mut state, &catalog, &dyson_zone(), 100.0);
    state
        .structures
        .entry(earth())
        .or_default()
        .insert(BuildingId("mass_driver".to_string()), 1);
    state.zones.get_mut(&earth()).unwrap().stored_metal = 5e5;
    state.allocations.insert(
        earth(),
        ProbeAllocations {
            harvest: 1.0,
            ..Default::default()
        },
    );

    let mut autopilot = AutopilotController;
    let mut next_action_id = 0;
    for _ in 0..10 {
        let actions = autopilot.generate_actions(&state, &catalog, &mut next_action_id);
        probe_core::tick(&mut state, &actions, &catalog);
    }

    assert!(
        state
            .transfers
            .iter()
            .any(|t| matches!(t.kind, TransferKind::ContinuousMetal { .. })
                && t.to_zone == dyson_zone()),
        "a metal feed to the shell should be open"
    );

    // Run long enough for the first batches to land and become shell mass.
    let speed = probe_core::test_fixtures::act(
        9_999,
        probe_core::Action::SetTimeSpeed { speed: 1000.0 },
    );
    probe_core::tick(&mut state, &[speed], &catalog);
    for _ in 0..20 {
        let actions = autopilot.generate_actions(&state, &catalog, &mut next_action_id);
        probe_core::tick(&mut state, &actions, &catalog);
    }

    assert!(
        state.dyson.mass > 0.0,
        "delivered metal should have become shell mass"
    );
    probe_core::check_invariants(&state, &catalog).expect("long feed run stays valid");
}
