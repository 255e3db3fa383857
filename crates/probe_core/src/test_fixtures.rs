//! Shared test fixtures for `probe_core` and downstream crates.
//!
//! `base_catalog()` provides a small three-zone system (earth, luna, dyson)
//! with no factor rules, so base-rate arithmetic stays exact in tests.
//! `base_state()` starts one probe at earth with the default endowment.

use std::collections::{HashMap, VecDeque};

use crate::{
    Action, ActionEnvelope, ActionId, BuildingDef, BuildingId, Catalog, Counters, DysonSphere,
    EconomicRules, GameState, MetaState, ProbeAllocations, ProbeTypeId, ResearchTreeDef,
    SkillCategory, StatsHistory, TierDef, TransferLegDef, TreeId, ZoneDef, ZoneId,
    DEFAULT_PROBE_TYPE,
};

pub fn earth() -> ZoneId {
    ZoneId("earth".to_string())
}

pub fn luna() -> ZoneId {
    ZoneId("luna".to_string())
}

pub fn dyson_zone() -> ZoneId {
    ZoneId("dyson".to_string())
}

pub fn probe_type() -> ProbeTypeId {
    ProbeTypeId(DEFAULT_PROBE_TYPE.to_string())
}

fn building(id: &str, name: &str, mass_kg: f64) -> BuildingDef {
    BuildingDef {
        id: BuildingId(id.to_string()),
        name: name.to_string(),
        mass_kg,
        power_output_mw: 0.0,
        base_power_consumption_mw: 0.0,
        energy_cost_multiplier: 0.0,
        mining_rate_multiplier: 0.0,
        build_rate_multiplier: 0.0,
        uses_solar: false,
        is_mass_driver: false,
        extraction_bonus: 0.0,
        intelligence_eflops: 0.0,
        scaling_exponent: None,
        orbital_efficiency: HashMap::new(),
        effects: None,
    }
}

fn tier(cost_eflops_days: Option<f64>) -> TierDef {
    TierDef {
        tranches: Some(10),
        tier_multiplier: None,
        tier_cost_eflops_days: cost_eflops_days,
    }
}

fn tree(id: &str, skill: &str, category: SkillCategory, tiers: usize) -> ResearchTreeDef {
    ResearchTreeDef {
        id: TreeId(id.to_string()),
        name: id.to_string(),
        category,
        skill: skill.to_string(),
        // Tiny costs so progress tests finish in a handful of ticks.
        tiers: (0..tiers).map(|_| tier(Some(1e-15))).collect(),
    }
}

/// Three zones, a handful of buildings, five small research trees, default
/// economic rules, and symmetric transfer legs.
#[allow(clippy::too_many_lines)]
pub fn base_catalog() -> Catalog {
    let zones = vec![
        ZoneDef {
            id: earth(),
            name: "Earth Orbit".to_string(),
            radius_au: 1.0,
            total_mass_kg: 1e12,
            metal_percentage: 0.3,
            solar_irradiance_factor: 1.0,
            mining_multiplier: 1.0,
            is_dyson: false,
        },
        ZoneDef {
            id: luna(),
            name: "Luna".to_string(),
            radius_au: 1.0,
            total_mass_kg: 5e11,
            metal_percentage: 0.2,
            solar_irradiance_factor: 1.0,
            mining_multiplier: 1.5,
            is_dyson: false,
        },
        ZoneDef {
            id: dyson_zone(),
            name: "Dyson Shell".to_string(),
            radius_au: 0.29,
            total_mass_kg: 0.0,
            metal_percentage: 0.0,
            solar_irradiance_factor: 11.9,
            mining_multiplier: 0.0,
            is_dyson: true,
        },
    ];

    let buildings = HashMap::from([
        (BuildingId("mass_driver".to_string()), {
            let mut b = building("mass_driver", "Mass Driver", 1e6);
            b.is_mass_driver = true;
            b.base_power_consumption_mw = 10.0;
            b
        }),
        (BuildingId("refinery".to_string()), {
            let mut b = building("refinery", "Refinery", 5e5);
            b.extraction_bonus = 0.05;
            b.base_power_consumption_mw = 5.0;
            b
        }),
        (BuildingId("solar_array".to_string()), {
            let mut b = building("solar_array", "Solar Array", 2e5);
            b.power_output_mw = 100.0;
            b.uses_solar = true;
            b
        }),
        (BuildingId("mining_rig".to_string()), {
            let mut b = building("mining_rig", "Mining Rig", 8e5);
            b.mining_rate_multiplier = 50.0;
            b.base_power_consumption_mw = 2.0;
            b
        }),
        (BuildingId("factory".to_string()), {
            let mut b = building("factory", "Probe Factory", 1e6);
            b.build_rate_multiplier = 25.0;
            b.base_power_consumption_mw = 2.0;
            b
        }),
        (BuildingId("compute_cluster".to_string()), {
            let mut b = building("compute_cluster", "Compute Cluster", 3e5);
            b.intelligence_eflops = 1e-15;
            b.base_power_consumption_mw = 1.0;
            b
        }),
    ]);

    let research_trees = HashMap::from([
        (
            TreeId("mining".to_string()),
            tree("mining", "production", SkillCategory::Dexterity, 3),
        ),
        (
            TreeId("recycling".to_string()),
            tree("recycling", "recycling", SkillCategory::Dexterity, 3),
        ),
        (
            TreeId("propulsion".to_string()),
            tree("propulsion", "propulsion", SkillCategory::Dexterity, 3),
        ),
        (
            TreeId("autonomy".to_string()),
            tree("autonomy", "autonomy", SkillCategory::Intelligence, 3),
        ),
        (
            TreeId("solar".to_string()),
            // Declared under a legacy alias; the catalog canonicalizes it.
            tree("solar", "energy_collection", SkillCategory::Energy, 3),
        ),
    ]);

    let transfer_legs = vec![
        TransferLegDef {
            from: earth(),
            to: luna(),
            delta_v_km_s: 3.0,
            hohmann_days: 5.0,
        },
        TransferLegDef {
            from: earth(),
            to: dyson_zone(),
            delta_v_km_s: 12.0,
            hohmann_days: 100.0,
        },
        TransferLegDef {
            from: luna(),
            to: dyson_zone(),
            delta_v_km_s: 10.0,
            hohmann_days: 95.0,
        },
    ];

    Catalog::new(
        "test".to_string(),
        zones,
        buildings,
        research_trees,
        EconomicRules::default(),
        transfer_legs,
    )
}

/// One probe at earth, default endowment, history sampling off.
pub fn base_state(catalog: &Catalog) -> GameState {
    let probe_mass = catalog.rules.probe_base_rates.probe_mass_kg;
    let mut state = GameState {
        meta: MetaState {
            tick: 0,
            time_days: 0.0,
            speed: 1.0,
            schema_version: 1,
            catalog_version: catalog.catalog_version.clone(),
        },
        zones: HashMap::new(),
        probes: HashMap::from([(
            earth(),
            HashMap::from([(probe_type(), 1.0)]),
        )]),
        allocations: HashMap::new(),
        mass_limits: HashMap::new(),
        structures: HashMap::new(),
        construction: crate::ConstructionState::default(),
        dyson: DysonSphere::with_target(2e23),
        transfers: Vec::new(),
        tech: crate::TechTreeState::default(),
        factors: crate::UpgradeFactors::default(),
        rates: crate::Rates::default(),
        derived: crate::Derived::default(),
        cumulative: crate::CumulativeStats::default(),
        history: StatsHistory {
            every_ticks: 0,
            samples: VecDeque::new(),
        },
        base_energy_production_w: 100_000.0,
        bonuses: crate::SkillBonuses::default(),
        counters: Counters {
            next_event_id: 0,
            next_transfer_id: 0,
        },
    };
    let zone = state.ensure_zone(&earth(), 1e12);
    zone.probe_mass = probe_mass;
    crate::ensure_tiers(&mut state, catalog);
    state
}

/// Sets a zone's allocation directly, bypassing action validation.
pub fn set_allocation(state: &mut GameState, zone: &ZoneId, alloc: ProbeAllocations) {
    state.allocations.insert(zone.clone(), alloc);
}

/// Adds whole probes to a zone with consistent probe-mass accounting.
pub fn place_probes(state: &mut GameState, catalog: &Catalog, zone: &ZoneId, count: f64) {
    let total = catalog.zone(zone).map_or(0.0, |z| z.total_mass_kg);
    let probe_mass = catalog.rules.probe_base_rates.probe_mass_kg;
    state.ensure_zone(zone, total);
    state.add_probes(zone, &probe_type(), count);
    state.zones.get_mut(zone).expect("ensured").probe_mass += count * probe_mass;
}

/// Wraps an action in a numbered envelope.
pub fn act(sequence: u64, action: Action) -> ActionEnvelope {
    ActionEnvelope {
        id: ActionId(format!("act_{sequence:04}")),
        action,
    }
}

/// Runs `count` ticks with no actions.
pub fn run_ticks(state: &mut GameState, catalog: &Catalog, count: u64) {
    for _ in 0..count {
        crate::tick(state, &[], catalog);
    }
}
