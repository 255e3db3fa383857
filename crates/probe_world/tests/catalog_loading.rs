//! Loads a complete catalog from JSON files on disk and drives the engine
//! with it, end to end.

use std::fs;

use probe_core::{Action, ActionEnvelope, ActionId, ProbeAllocations, StartConfig, ZoneId};
use probe_world::{build_initial_state, load_catalog};

fn write_catalog_files(dir: &std::path::Path) {
    fs::write(
        dir.join("orbital_zones.json"),
        serde_json::json!({
            "catalog_version": "it-1",
            "zones": [
                {
                    "id": "earth",
                    "name": "Earth Orbit",
                    "radius_au": 1.0,
                    "total_mass_kg": 1e12,
                    "metal_percentage": 0.3
                },
                {
                    "id": "belt",
                    "name": "Main Belt",
                    "radius_au": 2.7,
                    "total_mass_kg": 3e21,
                    "metal_percentage": 0.45,
                    "solar_irradiance_factor": 0.14,
                    "mining_multiplier": 2.0
                },
                {
                    "id": "dyson",
                    "name": "Dyson Shell",
                    "radius_au": 0.29,
                    "total_mass_kg": 0.0,
                    "metal_percentage": 0.0,
                    "solar_irradiance_factor": 11.9,
                    "mining_multiplier": 0.0,
                    "is_dyson": true
                }
            ]
        })
        .to_string(),
    )
    .unwrap();

    fs::write(
        dir.join("buildings.json"),
        serde_json::json!([
            {
                "id": "mass_driver",
                "name": "Mass Driver",
                "mass_kg": 1e6,
                "base_power_consumption_mw": 10.0,
                "is_mass_driver": true
            },
            {
                "id": "solar_array",
                "name": "Solar Array",
                "mass_kg": 2e5,
                "power_output_mw": 100.0,
                "uses_solar": true,
                "orbital_efficiency": {"belt": 0.2}
            }
        ])
        .to_string(),
    )
    .unwrap();

    fs::write(
        dir.join("research_trees.json"),
        serde_json::json!({
            "trees": [
                {
                    "id": "mining",
                    "name": "Mining Productivity",
                    "category": "dexterity",
                    "skill": "production",
                    "tiers": [{"tranches": 10}, {"tranches": 10}]
                },
                {
                    "id": "solar",
                    "name": "Energy Collection",
                    "category": "energy",
                    // Legacy alias, canonicalized at load.
                    "skill": "energy_collection",
                    "tiers": [{"tranches": 10}]
                }
            ]
        })
        .to_string(),
    )
    .unwrap();

    fs::write(
        dir.join("economic_rules.json"),
        serde_json::json!({
            "factor_rules": {
                "probe_mining": {
                    "combine": "weighted_sum",
                    "skills": [{"skill": "production", "weight": 0.8}]
                },
                "energy_generation": {
                    "combine": "geometric_exponential",
                    "skills": [{"skill": "solar_pv", "coefficient": 1.0}],
                    "alpha_performance": 0.6
                }
            }
        })
        .to_string(),
    )
    .unwrap();

    fs::write(
        dir.join("transfer_times.json"),
        serde_json::json!({
            "legs": [
                {"from": "earth", "to": "belt", "delta_v_km_s": 6.0, "hohmann_days": 450.0},
                {"from": "earth", "to": "dyson", "delta_v_km_s": 12.0, "hohmann_days": 100.0},
                {"from": "belt", "to": "dyson", "delta_v_km_s": 15.0, "hohmann_days": 520.0}
            ]
        })
        .to_string(),
    )
    .unwrap();
}

#[test]
fn catalog_loads_and_drives_the_engine() {
    let dir = tempfile::tempdir().unwrap();
    write_catalog_files(dir.path());

    let catalog = load_catalog(dir.path().to_str().unwrap()).unwrap();
    assert_eq!(catalog.catalog_version, "it-1");
    assert_eq!(catalog.zones.len(), 3);
    assert!(catalog.dyson_zone().is_some());
    // The alias-declared tree reaches the factor rule under its canonical name.
    assert_eq!(
        catalog
            .tree(&probe_core::TreeId("solar".to_string()))
            .unwrap()
            .skill,
        "solar_pv"
    );

    let config = StartConfig {
        initial_metal: 0.0,
        base_energy_production: 100_000.0,
        dyson_target_mass: 2e23,
        skill_bonuses: probe_core::SkillBonuses::default(),
        default_zone: ZoneId("earth".to_string()),
        initial_probes: 1,
        history_every_ticks: 0,
    };
    let mut state = build_initial_state(&catalog, &config);

    let harvest = ActionEnvelope {
        id: ActionId("act_0001".to_string()),
        action: Action::SetZoneAllocation {
            zone: ZoneId("earth".to_string()),
            allocations: ProbeAllocations {
                harvest: 1.0,
                ..Default::default()
            },
        },
    };
    probe_core::tick(&mut state, &[harvest], &catalog);
    for _ in 0..59 {
        probe_core::tick(&mut state, &[], &catalog);
    }

    // One probe harvesting for one simulated day at 100 kg/day.
    let zone = &state.zones[&ZoneId("earth".to_string())];
    assert!((zone.stored_metal - 30.0).abs() < 1e-6);
    assert!((zone.slag_mass - 70.0).abs() < 1e-6);
    probe_core::check_invariants(&state, &catalog).unwrap();
}

#[test]
fn missing_file_is_a_context_error() {
    let dir = tempfile::tempdir().unwrap();
    write_catalog_files(dir.path());
    fs::remove_file(dir.path().join("economic_rules.json")).unwrap();

    let error = load_catalog(dir.path().to_str().unwrap()).unwrap_err();
    assert!(format!("{error:#}").contains("economic_rules.json"));
}
