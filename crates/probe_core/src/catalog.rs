//! Read-only data catalogs: orbital zones, buildings, research trees,
//! economic rules, and transfer legs.
//!
//! Loaded once by the world layer and passed by reference into every tick.
//! `init_caches` must run after deserialization; it builds the lookup indexes
//! and normalizes legacy skill aliases so only canonical names exist past
//! this boundary.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{BuildingId, CategoryId, SkillId, TreeId, ZoneId};

/// Legacy skill aliases accepted at the catalog boundary.
const SKILL_ALIASES: [(&str, &str); 5] = [
    ("energy_collection", "solar_pv"),
    ("robotic", "manipulation"),
    ("thermal_efficiency", "radiator"),
    ("energy_storage", "battery_density"),
    ("materials_science", "materials"),
];

fn canonical_skill(name: &str) -> String {
    for (alias, canonical) in SKILL_ALIASES {
        if name == alias {
            return canonical.to_string();
        }
    }
    name.to_string()
}

// ---------------------------------------------------------------------------
// Zone and building definitions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneDef {
    pub id: ZoneId,
    pub name: String,
    pub radius_au: f64,
    pub total_mass_kg: f64,
    /// Metal fraction of extracted mass before skill and refinery bonuses.
    pub metal_percentage: f64,
    #[serde(default = "one")]
    pub solar_irradiance_factor: f64,
    #[serde(default = "one")]
    pub mining_multiplier: f64,
    #[serde(default)]
    pub is_dyson: bool,
}

/// Legacy building rate fields, used when the rate multipliers are absent.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BuildingEffects {
    #[serde(default)]
    pub mining_kg_per_day: f64,
    #[serde(default)]
    pub build_kg_per_day: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingDef {
    pub id: BuildingId,
    pub name: String,
    /// kg of build progress to complete one unit.
    pub mass_kg: f64,
    #[serde(default)]
    pub power_output_mw: f64,
    #[serde(default)]
    pub base_power_consumption_mw: f64,
    #[serde(default)]
    pub energy_cost_multiplier: f64,
    #[serde(default)]
    pub mining_rate_multiplier: f64,
    #[serde(default)]
    pub build_rate_multiplier: f64,
    #[serde(default)]
    pub uses_solar: bool,
    #[serde(default)]
    pub is_mass_driver: bool,
    /// Additive metal-extraction bonus per refinery unit.
    #[serde(default)]
    pub extraction_bonus: f64,
    /// EFLOPS of research compute per unit before count scaling.
    #[serde(default)]
    pub intelligence_eflops: f64,
    /// Overrides the economic rules' geometric scaling exponent.
    #[serde(default)]
    pub scaling_exponent: Option<f64>,
    /// Per-zone efficiency multiplier; zones not listed run at 1.0.
    #[serde(default)]
    pub orbital_efficiency: HashMap<ZoneId, f64>,
    #[serde(default)]
    pub effects: Option<BuildingEffects>,
}

impl BuildingDef {
    pub fn orbital_efficiency(&self, zone: &ZoneId) -> f64 {
        self.orbital_efficiency.get(zone).copied().unwrap_or(1.0)
    }
}

// ---------------------------------------------------------------------------
// Research trees
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillCategory {
    Dexterity,
    Intelligence,
    Energy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierDef {
    #[serde(default)]
    pub tranches: Option<u32>,
    #[serde(default)]
    pub tier_multiplier: Option<f64>,
    #[serde(default)]
    pub tier_cost_eflops_days: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchTreeDef {
    pub id: TreeId,
    pub name: String,
    pub category: SkillCategory,
    /// The skill this tree's multiplier feeds.
    pub skill: SkillId,
    pub tiers: Vec<TierDef>,
}

// ---------------------------------------------------------------------------
// Economic rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeBaseRates {
    pub mining_kg_per_day: f64,
    pub build_kg_per_day: f64,
    pub probe_mass_kg: f64,
    pub energy_production_w: f64,
    pub mining_power_w: f64,
    pub recycle_power_w: f64,
}

impl Default for ProbeBaseRates {
    fn default() -> Self {
        ProbeBaseRates {
            mining_kg_per_day: 100.0,
            build_kg_per_day: 20.0,
            probe_mass_kg: 100.0,
            energy_production_w: 10.0,
            mining_power_w: 1_000.0,
            recycle_power_w: 2_000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineRule {
    WeightedSum,
    GeometricExponential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillTerm {
    pub skill: SkillId,
    #[serde(default = "one")]
    pub coefficient: f64,
    #[serde(default = "one")]
    pub weight: f64,
}

/// How one production category aggregates skill values into its upgrade
/// factor. `alpha_performance` only matters for the geometric rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorRule {
    pub combine: CombineRule,
    pub skills: Vec<SkillTerm>,
    #[serde(default = "one")]
    pub alpha_performance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrowdingRules {
    pub threshold_ratio: f64,
    pub decay_rate: f64,
    /// Probe-count scaling exponent β indexed by completed autonomy tiers;
    /// the last entry applies beyond the end. Empty means β = 1.
    #[serde(default)]
    pub exponents: Vec<f64>,
}

impl Default for CrowdingRules {
    fn default() -> Self {
        CrowdingRules {
            threshold_ratio: 0.01,
            decay_rate: 4.395,
            exponents: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureScaling {
    pub rate_exponent: f64,
    pub energy_exponent: f64,
}

impl Default for StructureScaling {
    fn default() -> Self {
        StructureScaling {
            rate_exponent: 2.1,
            energy_exponent: 3.2,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchRules {
    pub base_cost_eflops_days: f64,
    pub tier_cost_growth: f64,
    pub default_tranches: u32,
    pub default_tier_multiplier: f64,
    /// Costs below this are treated as legacy per-tranche values.
    pub legacy_per_tranche_threshold_eflops_days: f64,
}

impl Default for ResearchRules {
    fn default() -> Self {
        ResearchRules {
            base_cost_eflops_days: 1_000.0,
            tier_cost_growth: 150.0,
            default_tranches: 10,
            default_tier_multiplier: 1.2,
            legacy_per_tranche_threshold_eflops_days: 50.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferRules {
    pub min_metal_batch_kg: f64,
    pub min_probe_batch: f64,
    pub mass_driver_decay: f64,
    pub mass_driver_floor: f64,
    pub metal_capacity_gt_per_day: f64,
}

impl Default for TransferRules {
    fn default() -> Self {
        TransferRules {
            min_metal_batch_kg: 100.0,
            min_probe_batch: 1.0,
            mass_driver_decay: 0.3,
            mass_driver_floor: 0.05,
            metal_capacity_gt_per_day: 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SlagRecyclingRules {
    pub base_recovery: f64,
    pub skill_gain: f64,
    pub max_recovery: f64,
}

impl Default for SlagRecyclingRules {
    fn default() -> Self {
        SlagRecyclingRules {
            base_recovery: 0.1,
            skill_gain: 0.5,
            max_recovery: 0.95,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomicRules {
    #[serde(default)]
    pub probe_base_rates: ProbeBaseRates,
    #[serde(default = "one")]
    pub alpha_cost_scaling: f64,
    #[serde(default)]
    pub factor_rules: HashMap<CategoryId, FactorRule>,
    #[serde(default)]
    pub crowding: CrowdingRules,
    #[serde(default)]
    pub structure_scaling: StructureScaling,
    #[serde(default = "default_structure_cost")]
    pub base_structure_cost_w: f64,
    #[serde(default = "default_metal_per_dyson")]
    pub metal_per_dyson_kg: f64,
    #[serde(default = "default_dyson_power")]
    pub dyson_power_per_kg_au2: f64,
    #[serde(default)]
    pub research: ResearchRules,
    #[serde(default)]
    pub transfer: TransferRules,
    #[serde(default)]
    pub slag_recycling: SlagRecyclingRules,
}

impl Default for EconomicRules {
    fn default() -> Self {
        EconomicRules {
            probe_base_rates: ProbeBaseRates::default(),
            alpha_cost_scaling: 1.0,
            factor_rules: HashMap::new(),
            crowding: CrowdingRules::default(),
            structure_scaling: StructureScaling::default(),
            base_structure_cost_w: default_structure_cost(),
            metal_per_dyson_kg: default_metal_per_dyson(),
            dyson_power_per_kg_au2: default_dyson_power(),
            research: ResearchRules::default(),
            transfer: TransferRules::default(),
            slag_recycling: SlagRecyclingRules::default(),
        }
    }
}

fn one() -> f64 {
    1.0
}

fn default_structure_cost() -> f64 {
    1_000_000.0
}

fn default_metal_per_dyson() -> f64 {
    2.0
}

fn default_dyson_power() -> f64 {
    5_000.0
}

// ---------------------------------------------------------------------------
// Transfer legs
// ---------------------------------------------------------------------------

/// Nominal Hohmann trip between two zones, symmetric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferLegDef {
    pub from: ZoneId,
    pub to: ZoneId,
    pub delta_v_km_s: f64,
    pub hohmann_days: f64,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub catalog_version: String,
    pub zones: Vec<ZoneDef>,
    pub buildings: HashMap<BuildingId, BuildingDef>,
    pub research_trees: HashMap<TreeId, ResearchTreeDef>,
    #[serde(default)]
    pub rules: EconomicRules,
    #[serde(default)]
    pub transfer_legs: Vec<TransferLegDef>,
    #[serde(skip)]
    zone_index: ahash::AHashMap<ZoneId, usize>,
    #[serde(skip)]
    leg_index: ahash::AHashMap<(ZoneId, ZoneId), usize>,
}

impl Catalog {
    pub fn new(
        catalog_version: String,
        zones: Vec<ZoneDef>,
        buildings: HashMap<BuildingId, BuildingDef>,
        research_trees: HashMap<TreeId, ResearchTreeDef>,
        rules: EconomicRules,
        transfer_legs: Vec<TransferLegDef>,
    ) -> Self {
        let mut catalog = Catalog {
            catalog_version,
            zones,
            buildings,
            research_trees,
            rules,
            transfer_legs,
            zone_index: ahash::AHashMap::new(),
            leg_index: ahash::AHashMap::new(),
        };
        catalog.init_caches();
        catalog
    }

    /// Builds lookup indexes and normalizes skill aliases and legacy research
    /// costs. Must run after deserialization and before any tick.
    pub fn init_caches(&mut self) {
        self.zone_index = self
            .zones
            .iter()
            .enumerate()
            .map(|(index, zone)| (zone.id.clone(), index))
            .collect();

        self.leg_index.clear();
        for (index, leg) in self.transfer_legs.iter().enumerate() {
            self.leg_index
                .insert((leg.from.clone(), leg.to.clone()), index);
            self.leg_index
                .insert((leg.to.clone(), leg.from.clone()), index);
        }

        for tree in self.research_trees.values_mut() {
            tree.skill = canonical_skill(&tree.skill);
        }
        for rule in self.rules.factor_rules.values_mut() {
            for term in &mut rule.skills {
                term.skill = canonical_skill(&term.skill);
            }
        }
    }

    /// Returns `None` for unknown zone IDs.
    pub fn zone(&self, id: &ZoneId) -> Option<&ZoneDef> {
        self.zone_index.get(id).map(|&index| &self.zones[index])
    }

    pub fn building(&self, id: &BuildingId) -> Option<&BuildingDef> {
        self.buildings.get(id)
    }

    pub fn tree(&self, id: &TreeId) -> Option<&ResearchTreeDef> {
        self.research_trees.get(id)
    }

    /// The Dyson construction zone, if the catalog defines one.
    pub fn dyson_zone(&self) -> Option<&ZoneDef> {
        self.zones.iter().find(|zone| zone.is_dyson)
    }

    /// Transfer leg between two zones, direction-agnostic.
    pub fn leg(&self, from: &ZoneId, to: &ZoneId) -> Option<&TransferLegDef> {
        self.leg_index
            .get(&(from.clone(), to.clone()))
            .map(|&index| &self.transfer_legs[index])
    }

    /// Total FLOP·days to complete a tier, resolving defaults and the legacy
    /// per-tranche unit heuristic.
    pub fn tier_cost_flop_days(&self, tree: &ResearchTreeDef, tier_index: usize) -> f64 {
        let rules = &self.rules.research;
        let tier = &tree.tiers[tier_index];
        let tranches = f64::from(self.tier_tranches(tree, tier_index));
        let eflop_days = match tier.tier_cost_eflops_days {
            Some(cost) if cost < rules.legacy_per_tranche_threshold_eflops_days => {
                // Legacy per-tranche value: scale to the tier total.
                cost * tranches
            }
            Some(cost) => cost,
            None => rules.base_cost_eflops_days * rules.tier_cost_growth.powi(tier_index as i32),
        };
        eflop_days * 1e18
    }

    pub fn tier_tranches(&self, tree: &ResearchTreeDef, tier_index: usize) -> u32 {
        tree.tiers[tier_index]
            .tranches
            .unwrap_or(self.rules.research.default_tranches)
    }

    pub fn tier_multiplier(&self, tree: &ResearchTreeDef, tier_index: usize) -> f64 {
        tree.tiers[tier_index]
            .tier_multiplier
            .unwrap_or(self.rules.research.default_tier_multiplier)
    }
}
