//! Type definitions for `probe_core`.
//!
//! All public state, action, and event types used by the simulation.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

// ---------------------------------------------------------------------------
// Type aliases
// ---------------------------------------------------------------------------

pub type SkillId = String;
pub type CategoryId = String;

/// The default self-replicating probe type.
pub const DEFAULT_PROBE_TYPE: &str = "probe";

/// Logical ticks per simulated day at speed 1.
pub const TICKS_PER_DAY: f64 = 60.0;

pub const SPEED_MIN: f64 = 0.1;
pub const SPEED_MAX: f64 = 1000.0;

/// Maximum number of rate samples kept in `StatsHistory`.
pub const MAX_STATS_HISTORY: usize = 10_000;

// ---------------------------------------------------------------------------
// ID newtypes
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(ZoneId);
string_id!(BuildingId);
string_id!(TreeId);
string_id!(ProbeTypeId);
string_id!(TransferId);
string_id!(ActionId);
string_id!(EventId);

/// Construction site key in `"zone::building"` form, as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SiteKey(pub String);

impl SiteKey {
    pub fn new(zone: &ZoneId, building: &BuildingId) -> Self {
        SiteKey(format!("{}::{}", zone.0, building.0))
    }

    pub fn zone(&self) -> Option<ZoneId> {
        self.0.split_once("::").map(|(z, _)| ZoneId(z.to_string()))
    }

    pub fn building(&self) -> Option<BuildingId> {
        self.0
            .split_once("::")
            .map(|(_, b)| BuildingId(b.to_string()))
    }
}

impl std::fmt::Display for SiteKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaState {
    pub tick: u64,
    /// Simulated time in days.
    pub time_days: f64,
    /// Time-speed scalar over logical ticks, clamped to `[0.1, 1000]`.
    pub speed: f64,
    pub schema_version: u32,
    pub catalog_version: String,
}

impl MetaState {
    /// Simulated days elapsed by one tick at the current speed.
    pub fn delta_days(&self) -> f64 {
        self.speed / TICKS_PER_DAY
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed.clamp(SPEED_MIN, SPEED_MAX);
    }
}

// ---------------------------------------------------------------------------
// Zones
// ---------------------------------------------------------------------------

/// Per-zone mass pools, all in kg.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneState {
    pub mass_remaining: f64,
    pub stored_metal: f64,
    pub probe_mass: f64,
    pub structure_mass: f64,
    pub slag_mass: f64,
    #[serde(default)]
    pub methalox: f64,
    #[serde(default)]
    pub depleted: bool,
}

impl ZoneState {
    pub fn with_mass(mass_remaining: f64) -> Self {
        ZoneState {
            mass_remaining,
            stored_metal: 0.0,
            probe_mass: 0.0,
            structure_mass: 0.0,
            slag_mass: 0.0,
            methalox: 0.0,
            depleted: mass_remaining <= 0.0,
        }
    }

    /// Sum of all mass pools currently held in the zone.
    pub fn total_mass(&self) -> f64 {
        self.mass_remaining + self.stored_metal + self.probe_mass + self.structure_mass
            + self.slag_mass
    }

    /// Probe-mass fraction of total zone mass; 0 when the zone is empty.
    pub fn probe_mass_ratio(&self) -> f64 {
        let total = self.total_mass();
        if total > 0.0 {
            self.probe_mass / total
        } else {
            0.0
        }
    }
}

/// Fractions of a zone's probes assigned to each activity; each in `[0, 1]`,
/// sum at most 1.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ProbeAllocations {
    #[serde(default)]
    pub harvest: f64,
    #[serde(default)]
    pub replicate: f64,
    #[serde(default)]
    pub recycle: f64,
    #[serde(default)]
    pub dyson: f64,
    #[serde(default)]
    pub construct: f64,
}

impl ProbeAllocations {
    pub fn sum(&self) -> f64 {
        self.harvest + self.replicate + self.recycle + self.dyson + self.construct
    }

    pub fn values(&self) -> [f64; 5] {
        [
            self.harvest,
            self.replicate,
            self.recycle,
            self.dyson,
            self.construct,
        ]
    }
}

/// Caps on the probe-mass fraction of total zone mass per activity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ZoneMassLimits {
    #[serde(default = "one")]
    pub replicate: f64,
    #[serde(default = "one")]
    pub construct: f64,
    #[serde(default = "one")]
    pub recycle_probes: f64,
}

fn one() -> f64 {
    1.0
}

impl Default for ZoneMassLimits {
    fn default() -> Self {
        ZoneMassLimits {
            replicate: 1.0,
            construct: 1.0,
            recycle_probes: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstructionState {
    /// Enabled sites in queue order; a zone's throughput goes to its earliest
    /// enabled site first.
    #[serde(default)]
    pub enabled: Vec<SiteKey>,
    /// Accumulated kg of build progress per site.
    #[serde(default)]
    pub progress: HashMap<SiteKey, f64>,
    /// kg required to complete one unit at each site.
    #[serde(default)]
    pub targets: HashMap<SiteKey, f64>,
    /// Simulated day each site was enabled.
    #[serde(default)]
    pub start_times: HashMap<SiteKey, f64>,
    /// Fractional probe-replication progress in kg, per zone and probe type.
    #[serde(default)]
    pub probe_progress: HashMap<ZoneId, HashMap<ProbeTypeId, f64>>,
}

// ---------------------------------------------------------------------------
// Dyson sphere
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DysonSphere {
    pub target_mass: f64,
    pub mass: f64,
    /// `clamp(mass / target_mass, 0, 1)`.
    pub progress: f64,
    /// Fraction of Dyson power routed to compute; the rest feeds the economy.
    #[serde(default)]
    pub power_allocation: f64,
}

impl DysonSphere {
    pub fn with_target(target_mass: f64) -> Self {
        DysonSphere {
            target_mass,
            mass: 0.0,
            progress: 0.0,
            power_allocation: 0.0,
        }
    }

    pub fn update_progress(&mut self) {
        self.progress = if self.target_mass > 0.0 {
            (self.mass / self.target_mass).clamp(0.0, 1.0)
        } else {
            0.0
        };
    }
}

// ---------------------------------------------------------------------------
// Transfers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Traveling,
    Paused,
    Completed,
}

/// A departed payload in flight between two zones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    /// Probes (whole number) or kg of metal, by the parent transfer's resource.
    pub amount: f64,
    pub departure_time: f64,
    pub arrival_time: f64,
}

/// Payload variants; continuous variants carry their own departure queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransferKind {
    OneTimeProbe {
        probe_type: ProbeTypeId,
        probe_count: u32,
    },
    OneTimeMetal {
        metal_kg: f64,
    },
    ContinuousProbe {
        /// Percent of the source zone's probe production rate, `[0, 100]`.
        rate_percentage: f64,
        #[serde(default)]
        accumulator: f64,
        #[serde(default)]
        in_transit: SmallVec<[Batch; 4]>,
    },
    ContinuousMetal {
        metal_rate_kg_per_day: f64,
        #[serde(default)]
        accumulator: f64,
        #[serde(default)]
        in_transit: SmallVec<[Batch; 4]>,
    },
}

impl TransferKind {
    pub fn is_continuous(&self) -> bool {
        matches!(
            self,
            TransferKind::ContinuousProbe { .. } | TransferKind::ContinuousMetal { .. }
        )
    }

    pub fn is_metal(&self) -> bool {
        matches!(
            self,
            TransferKind::OneTimeMetal { .. } | TransferKind::ContinuousMetal { .. }
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    pub id: TransferId,
    pub from_zone: ZoneId,
    pub to_zone: ZoneId,
    pub departure_time: f64,
    /// For one-time transfers, when the payload lands. Continuous transfers
    /// track arrival per batch; this mirrors `departure + transfer_time`.
    pub arrival_time: f64,
    pub transfer_time: f64,
    pub delta_v_cost: f64,
    pub status: TransferStatus,
    #[serde(flatten)]
    pub kind: TransferKind,
}

impl Transfer {
    /// Position between the endpoint orbits in AU, clamped linear
    /// interpolation by elapsed fraction of the trip.
    pub fn transit_position_au(&self, now: f64, from_au: f64, to_au: f64) -> f64 {
        let span = self.arrival_time - self.departure_time;
        let fraction = if span > 0.0 {
            ((now - self.departure_time) / span).clamp(0.0, 1.0)
        } else {
            1.0
        };
        from_au + (to_au - from_au) * fraction
    }
}

// ---------------------------------------------------------------------------
// Research
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TierState {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub tranches_completed: u32,
    /// Accumulated FLOP·days toward this tier's total cost.
    #[serde(default)]
    pub progress: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CategoryFactors {
    pub dexterity: f64,
    pub intelligence: f64,
    pub energy: f64,
}

impl Default for CategoryFactors {
    fn default() -> Self {
        CategoryFactors {
            dexterity: 1.0,
            intelligence: 1.0,
            energy: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TechTreeState {
    /// Tier states per tree, indexed by tier position.
    pub research: HashMap<TreeId, Vec<TierState>>,
    /// Per-tree share of intelligence production; missing trees weigh 1.
    #[serde(default)]
    pub weights: HashMap<TreeId, f64>,
    /// Skill-value cache, rewritten each tick. Only trees with at least one
    /// completed tranche appear here.
    #[serde(default)]
    pub skills: HashMap<SkillId, f64>,
    #[serde(default)]
    pub category_factors: CategoryFactors,
}

impl TechTreeState {
    /// Cached skill value, or 1.0 for skills with no research yet.
    pub fn skill(&self, id: &str) -> f64 {
        self.skills.get(id).copied().unwrap_or(1.0)
    }

    /// Cached skill value, or 0.0 when the skill has no research yet.
    /// Used by formulas whose bonus term only activates once researched.
    pub fn skill_or_zero(&self, id: &str) -> f64 {
        self.skills.get(id).copied().unwrap_or(0.0)
    }
}

/// Derived upgrade-factor caches, rewritten at the start of every tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpgradeFactors {
    pub performance: HashMap<CategoryId, f64>,
    pub cost: HashMap<CategoryId, f64>,
}

impl UpgradeFactors {
    pub fn perf(&self, category: &str) -> f64 {
        self.performance.get(category).copied().unwrap_or(1.0)
    }

    pub fn cost(&self, category: &str) -> f64 {
        self.cost.get(category).copied().unwrap_or(1.0)
    }
}

// ---------------------------------------------------------------------------
// Observation outputs
// ---------------------------------------------------------------------------

/// Realized rates for the latest committed tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rates {
    pub energy_production_w: f64,
    pub energy_consumption_w: f64,
    pub throttle: f64,
    pub mass_mining_kg_per_day: f64,
    pub metal_mining_kg_per_day: f64,
    pub slag_kg_per_day: f64,
    pub slag_recycling_kg_per_day: f64,
    pub replication_kg_per_day: f64,
    pub construction_kg_per_day: f64,
    pub dyson_kg_per_day: f64,
    pub dyson_power_w: f64,
    pub intelligence_flops: f64,
    pub metal_transfer_capacity_kg_per_day: f64,
}

impl Default for Rates {
    fn default() -> Self {
        Rates {
            energy_production_w: 0.0,
            energy_consumption_w: 0.0,
            throttle: 1.0,
            mass_mining_kg_per_day: 0.0,
            metal_mining_kg_per_day: 0.0,
            slag_kg_per_day: 0.0,
            slag_recycling_kg_per_day: 0.0,
            replication_kg_per_day: 0.0,
            construction_kg_per_day: 0.0,
            dyson_kg_per_day: 0.0,
            dyson_power_w: 0.0,
            intelligence_flops: 0.0,
            metal_transfer_capacity_kg_per_day: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZoneDerived {
    pub probe_count: f64,
    pub total_mass_kg: f64,
    pub probe_mass_ratio: f64,
    pub mining_kg_per_day: f64,
    pub metal_kg_per_day: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Derived {
    pub per_zone: HashMap<ZoneId, ZoneDerived>,
    pub total_mass_kg: f64,
    pub total_metal_kg: f64,
    pub total_probes: f64,
    /// Mass currently riding in transfer batches, outside any zone pool.
    pub in_flight_kg: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CumulativeStats {
    pub mass_mined_kg: f64,
    pub metal_refined_kg: f64,
    pub slag_recycled_kg: f64,
    pub probes_built: u64,
    pub probes_scrapped: u64,
    pub structures_built: u64,
    pub research_flop_days: f64,
    pub transfers_completed: u64,
    pub mass_launched_kg: f64,
    pub mass_delivered_kg: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatesSample {
    pub tick: u64,
    pub time_days: f64,
    pub rates: Rates,
    pub total_mass_kg: f64,
    pub dyson_mass_kg: f64,
    pub total_probes: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsHistory {
    /// Sample interval in ticks; 0 disables sampling.
    pub every_ticks: u64,
    #[serde(default)]
    pub samples: VecDeque<RatesSample>,
}

impl Default for StatsHistory {
    fn default() -> Self {
        StatsHistory {
            every_ticks: 60,
            samples: VecDeque::new(),
        }
    }
}

impl StatsHistory {
    pub fn push_sample(&mut self, sample: RatesSample) {
        if self.samples.len() >= MAX_STATS_HISTORY {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Flat starting bonuses from the session config, applied on top of research.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SkillBonuses {
    #[serde(default)]
    pub mass_driver_dv_bonus: f64,
    #[serde(default)]
    pub probe_dv_bonus: f64,
    #[serde(default)]
    pub mining_rate_bonus: f64,
    #[serde(default)]
    pub replication_rate_bonus: f64,
    #[serde(default)]
    pub compute_bonus: f64,
    #[serde(default)]
    pub energy_bonus: f64,
    #[serde(default)]
    pub dexterity_bonus: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartConfig {
    #[serde(default)]
    pub initial_metal: f64,
    #[serde(default = "default_base_energy")]
    pub base_energy_production: f64,
    #[serde(default = "default_dyson_target")]
    pub dyson_target_mass: f64,
    #[serde(default)]
    pub skill_bonuses: SkillBonuses,
    pub default_zone: ZoneId,
    #[serde(default = "default_initial_probes")]
    pub initial_probes: u32,
    #[serde(default = "default_history_every")]
    pub history_every_ticks: u64,
}

fn default_base_energy() -> f64 {
    100_000.0
}

fn default_dyson_target() -> f64 {
    2e23
}

fn default_initial_probes() -> u32 {
    1
}

fn default_history_every() -> u64 {
    60
}

// ---------------------------------------------------------------------------
// Game state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counters {
    pub next_event_id: u64,
    pub next_transfer_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub meta: MetaState,
    pub zones: HashMap<ZoneId, ZoneState>,
    /// Committed probe counts are whole numbers; fractional accumulation
    /// lives in `construction.probe_progress`.
    pub probes: HashMap<ZoneId, HashMap<ProbeTypeId, f64>>,
    #[serde(default)]
    pub allocations: HashMap<ZoneId, ProbeAllocations>,
    #[serde(default)]
    pub mass_limits: HashMap<ZoneId, ZoneMassLimits>,
    #[serde(default)]
    pub structures: HashMap<ZoneId, HashMap<BuildingId, u32>>,
    #[serde(default)]
    pub construction: ConstructionState,
    pub dyson: DysonSphere,
    #[serde(default)]
    pub transfers: Vec<Transfer>,
    #[serde(default)]
    pub tech: TechTreeState,
    #[serde(default)]
    pub factors: UpgradeFactors,
    #[serde(default)]
    pub rates: Rates,
    #[serde(default)]
    pub derived: Derived,
    #[serde(default)]
    pub cumulative: CumulativeStats,
    #[serde(default)]
    pub history: StatsHistory,
    pub base_energy_production_w: f64,
    #[serde(default)]
    pub bonuses: SkillBonuses,
    pub counters: Counters,
}

impl GameState {
    /// Total probes of all types in a zone.
    pub fn probe_count(&self, zone: &ZoneId) -> f64 {
        self.probes
            .get(zone)
            .map_or(0.0, |by_type| by_type.values().sum())
    }

    pub fn allocation(&self, zone: &ZoneId) -> ProbeAllocations {
        self.allocations.get(zone).copied().unwrap_or_default()
    }

    pub fn mass_limit(&self, zone: &ZoneId) -> ZoneMassLimits {
        self.mass_limits.get(zone).copied().unwrap_or_default()
    }

    pub fn structure_count(&self, zone: &ZoneId, building: &BuildingId) -> u32 {
        self.structures
            .get(zone)
            .and_then(|by_building| by_building.get(building))
            .copied()
            .unwrap_or(0)
    }

    /// Zone entry, created lazily from the catalog's total mass on first
    /// reference. Never destroyed afterwards, only depleted.
    pub fn ensure_zone(&mut self, id: &ZoneId, total_mass_kg: f64) -> &mut ZoneState {
        self.zones
            .entry(id.clone())
            .or_insert_with(|| ZoneState::with_mass(total_mass_kg))
    }

    pub fn add_probes(&mut self, zone: &ZoneId, probe_type: &ProbeTypeId, count: f64) {
        *self
            .probes
            .entry(zone.clone())
            .or_default()
            .entry(probe_type.clone())
            .or_insert(0.0) += count;
    }

    pub fn remove_probes(&mut self, zone: &ZoneId, probe_type: &ProbeTypeId, count: f64) {
        if let Some(by_type) = self.probes.get_mut(zone) {
            if let Some(existing) = by_type.get_mut(probe_type) {
                *existing = (*existing - count).max(0.0);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionEnvelope {
    pub id: ActionId,
    pub action: Action,
}

/// Payload for `CreateTransfer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferSpec {
    pub from_zone: ZoneId,
    pub to_zone: ZoneId,
    #[serde(flatten)]
    pub payload: TransferPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransferPayload {
    OneTimeProbe {
        #[serde(default = "default_probe_type")]
        probe_type: ProbeTypeId,
        probe_count: u32,
    },
    OneTimeMetal {
        metal_kg: f64,
    },
    ContinuousProbe {
        rate_percentage: f64,
    },
    ContinuousMetal {
        metal_rate_kg_per_day: f64,
    },
}

fn default_probe_type() -> ProbeTypeId {
    ProbeTypeId(DEFAULT_PROBE_TYPE.to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    SetZoneAllocation {
        zone: ZoneId,
        allocations: ProbeAllocations,
    },
    SetZoneMassLimit {
        zone: ZoneId,
        limits: ZoneMassLimits,
    },
    EnableTier {
        tree: TreeId,
        tier: usize,
    },
    DisableTier {
        tree: TreeId,
        tier: usize,
    },
    EnableConstruction {
        zone: ZoneId,
        building: BuildingId,
    },
    DisableConstruction {
        zone: ZoneId,
        building: BuildingId,
    },
    CreateTransfer {
        spec: TransferSpec,
    },
    PauseTransfer {
        transfer: TransferId,
    },
    ResumeTransfer {
        transfer: TransferId,
    },
    DeleteTransfer {
        transfer: TransferId,
    },
    UpdateTransferRate {
        transfer: TransferId,
        rate: f64,
    },
    SetDysonPowerAllocation {
        allocation: f64,
    },
    SetTimeSpeed {
        speed: f64,
    },
    SetResearchWeight {
        tree: TreeId,
        weight: f64,
    },
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: EventId,
    pub tick: u64,
    pub event: Event,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    ActionCompleted {
        action_id: ActionId,
        success: bool,
        error: Option<String>,
    },
    ZoneDepleted {
        zone: ZoneId,
    },
    ProbesReplicated {
        zone: ZoneId,
        count: u64,
    },
    ProbesDecommissioned {
        zone: ZoneId,
        count: u64,
    },
    StructureCompleted {
        zone: ZoneId,
        building: BuildingId,
        count: u32,
    },
    TransferDeparted {
        transfer: TransferId,
        amount: f64,
    },
    TransferArrived {
        transfer: TransferId,
        amount: f64,
    },
    TransferCompleted {
        transfer: TransferId,
    },
    TierEnabled {
        tree: TreeId,
        tier: usize,
    },
    TierCompleted {
        tree: TreeId,
        tier: usize,
    },
}
