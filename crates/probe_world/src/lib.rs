//! Catalog loading, validation, and initial-state construction shared
//! between `probe_cli` and `probe_daemon`.

use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use probe_core::{
    BuildingDef, BuildingId, Catalog, Counters, DysonSphere, EconomicRules, GameState, MetaState,
    ProbeTypeId, ResearchTreeDef, StartConfig, StatsHistory, TransferLegDef, TreeId, ZoneDef,
    DEFAULT_PROBE_TYPE,
};

#[derive(Deserialize)]
struct ZonesFile {
    catalog_version: String,
    zones: Vec<ZoneDef>,
}

#[derive(Deserialize)]
struct TreesFile {
    trees: Vec<ResearchTreeDef>,
}

#[derive(Deserialize)]
struct LegsFile {
    legs: Vec<TransferLegDef>,
}

/// Validates cross-references in a loaded catalog, panicking on any
/// authoring error.
///
/// Catches mistakes like: a transfer leg pointing at an unknown zone, a
/// factor rule naming a skill no research tree produces, or two zones
/// claiming the Dyson role.
#[allow(clippy::too_many_lines)]
pub fn validate_catalog(catalog: &Catalog) {
    let mut zone_ids: HashSet<&str> = HashSet::new();
    for zone in &catalog.zones {
        assert!(
            zone_ids.insert(zone.id.0.as_str()),
            "duplicate zone id '{}'",
            zone.id.0,
        );
        assert!(
            (0.0..=1.0).contains(&zone.metal_percentage),
            "zone '{}' metal_percentage {} outside [0, 1]",
            zone.id.0,
            zone.metal_percentage,
        );
        assert!(
            zone.total_mass_kg >= 0.0 && zone.radius_au > 0.0,
            "zone '{}' has non-physical mass or radius",
            zone.id.0,
        );
    }

    let dyson_count = catalog.zones.iter().filter(|zone| zone.is_dyson).count();
    assert!(
        dyson_count <= 1,
        "at most one Dyson zone is supported, found {dyson_count}",
    );

    for building in catalog.buildings.values() {
        assert!(
            building.mass_kg > 0.0,
            "building '{}' needs a positive construction mass",
            building.id.0,
        );
        for zone in building.orbital_efficiency.keys() {
            assert!(
                zone_ids.contains(zone.0.as_str()),
                "building '{}' orbital_efficiency references unknown zone '{}'",
                building.id.0,
                zone.0,
            );
        }
    }

    for leg in &catalog.transfer_legs {
        for zone in [&leg.from, &leg.to] {
            assert!(
                zone_ids.contains(zone.0.as_str()),
                "transfer leg references unknown zone '{}'",
                zone.0,
            );
        }
        assert!(
            leg.hohmann_days > 0.0,
            "transfer leg {} -> {} has non-positive trip time",
            leg.from.0,
            leg.to.0,
        );
    }

    let tree_skills: HashSet<&str> = catalog
        .research_trees
        .values()
        .map(|tree| tree.skill.as_str())
        .collect();
    for tree in catalog.research_trees.values() {
        assert!(
            !tree.tiers.is_empty(),
            "research tree '{}' has no tiers",
            tree.id.0,
        );
    }
    for (category, rule) in &catalog.rules.factor_rules {
        for term in &rule.skills {
            assert!(
                tree_skills.contains(term.skill.as_str()),
                "factor rule '{category}' references skill '{}' no tree produces",
                term.skill,
            );
        }
    }
}

/// Panics if a loaded state is internally inconsistent.
pub fn validate_state(state: &GameState, catalog: &Catalog) {
    if let Err(error) = probe_core::check_invariants(state, catalog) {
        panic!("loaded state violates invariants: {error}");
    }
}

fn read_json<T: serde::de::DeserializeOwned>(dir: &Path, file: &str) -> Result<T> {
    let path = dir.join(file);
    serde_json::from_str(
        &std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?,
    )
    .with_context(|| format!("parsing {}", path.display()))
}

pub fn load_catalog(catalog_dir: &str) -> Result<Catalog> {
    let dir = Path::new(catalog_dir);
    let zones_file: ZonesFile = read_json(dir, "orbital_zones.json")?;
    let buildings: HashMap<BuildingId, BuildingDef> = {
        let defs: Vec<BuildingDef> = read_json(dir, "buildings.json")?;
        defs.into_iter().map(|d| (d.id.clone(), d)).collect()
    };
    let research_trees: HashMap<TreeId, ResearchTreeDef> = {
        let file: TreesFile = read_json(dir, "research_trees.json")?;
        file.trees.into_iter().map(|t| (t.id.clone(), t)).collect()
    };
    let rules: EconomicRules = read_json(dir, "economic_rules.json")?;
    let legs_file: LegsFile = read_json(dir, "transfer_times.json")?;

    let catalog = Catalog::new(
        zones_file.catalog_version,
        zones_file.zones,
        buildings,
        research_trees,
        rules,
        legs_file.legs,
    );
    validate_catalog(&catalog);
    Ok(catalog)
}

/// Builds the starting state for a session: the endowment probes in the
/// configured zone, tier 0 of every tree enabled, everything else empty.
pub fn build_initial_state(catalog: &Catalog, config: &StartConfig) -> GameState {
    let probe_mass_kg = catalog.rules.probe_base_rates.probe_mass_kg;
    let probe_type = ProbeTypeId(DEFAULT_PROBE_TYPE.to_string());

    let mut state = GameState {
        meta: MetaState {
            tick: 0,
            time_days: 0.0,
            speed: 1.0,
            schema_version: 1,
            catalog_version: catalog.catalog_version.clone(),
        },
        zones: HashMap::new(),
        probes: HashMap::new(),
        allocations: HashMap::new(),
        mass_limits: HashMap::new(),
        structures: HashMap::new(),
        construction: probe_core::ConstructionState::default(),
        dyson: DysonSphere::with_target(config.dyson_target_mass),
        transfers: Vec::new(),
        tech: probe_core::TechTreeState::default(),
        factors: probe_core::UpgradeFactors::default(),
        rates: probe_core::Rates::default(),
        derived: probe_core::Derived::default(),
        cumulative: probe_core::CumulativeStats::default(),
        history: StatsHistory {
            every_ticks: config.history_every_ticks,
            samples: std::collections::VecDeque::new(),
        },
        base_energy_production_w: config.base_energy_production,
        bonuses: config.skill_bonuses,
        counters: Counters {
            next_event_id: 0,
            next_transfer_id: 0,
        },
    };

    let home_mass = catalog
        .zone(&config.default_zone)
        .map_or(0.0, |zone| zone.total_mass_kg);
    let home = state.ensure_zone(&config.default_zone, home_mass);
    home.stored_metal = config.initial_metal;
    home.probe_mass = f64::from(config.initial_probes) * probe_mass_kg;
    state.add_probes(
        &config.default_zone,
        &probe_type,
        f64::from(config.initial_probes),
    );

    probe_core::ensure_tiers(&mut state, catalog);
    state
}

/// Loads a state snapshot, applying the post-load research normalization.
pub fn load_state(path: &str, catalog: &Catalog) -> Result<GameState> {
    let json =
        std::fs::read_to_string(path).with_context(|| format!("reading state file: {path}"))?;
    let mut state: GameState =
        serde_json::from_str(&json).with_context(|| format!("parsing state file: {path}"))?;
    probe_core::normalize_loaded(&mut state, catalog);
    validate_state(&state, catalog);
    Ok(state)
}

pub fn save_state(state: &GameState, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating state file: {}", path.display()))?;
    serde_json::to_writer_pretty(file, state)
        .with_context(|| format!("writing state file: {}", path.display()))?;
    Ok(())
}

/// Loads a snapshot or builds a fresh state from the config.
pub fn load_or_build_state(
    catalog: &Catalog,
    config: &StartConfig,
    state_file: Option<&str>,
) -> Result<GameState> {
    match state_file {
        Some(path) => load_state(path, catalog),
        None => Ok(build_initial_state(catalog, config)),
    }
}

// ---------------------------------------------------------------------------
// Run directory utilities
// ---------------------------------------------------------------------------

/// Generates a timestamped run ID like `20260801_143022`.
pub fn generate_run_id() -> String {
    chrono::Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Creates the `runs/<run_id>/` directory tree, returning the path.
pub fn create_run_dir(run_id: &str) -> Result<std::path::PathBuf> {
    let dir = std::path::PathBuf::from("runs").join(run_id);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("creating run directory: {}", dir.display()))?;
    Ok(dir)
}

/// Writes `run_info.json` into the run directory.
///
/// `runner_args` is an arbitrary JSON value containing runner-specific CLI
/// arguments.
#[allow(clippy::needless_pass_by_value)]
pub fn write_run_info(
    dir: &Path,
    run_id: &str,
    catalog_version: &str,
    config: &StartConfig,
    runner_args: serde_json::Value,
) -> Result<()> {
    let info = serde_json::json!({
        "run_id": run_id,
        "catalog_version": catalog_version,
        "config": config,
        "args": runner_args,
    });
    let path = dir.join("run_info.json");
    let file =
        std::fs::File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(file, &info)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
