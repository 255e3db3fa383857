use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::Arc;

use parking_lot::Mutex;
use probe_control::AutopilotController;
use probe_core::{ActionEnvelope, Catalog, EventEnvelope, GameState};
use tokio::sync::broadcast;

pub struct SimState {
    pub game_state: GameState,
    pub catalog: Catalog,
    pub autopilot: Option<AutopilotController>,
    pub next_action_id: u64,
    /// How often (in ticks) the loop verifies invariants; 0 disables.
    pub check_every: u64,
    /// Set when an invariant breach halted the loop; the snapshot then
    /// stays frozen at the last good tick.
    pub halted: Option<String>,
}

pub type SharedSim = Arc<Mutex<SimState>>;
pub type ActionQueue = Arc<Mutex<Vec<ActionEnvelope>>>;
pub type EventTx = broadcast::Sender<Vec<EventEnvelope>>;

#[derive(Clone)]
pub struct AppState {
    pub sim: SharedSim,
    pub queue: ActionQueue,
    pub event_tx: EventTx,
    /// Wall-clock pacing in ticks/sec, stored as f64 bits; 0 = unlimited.
    pub ticks_per_sec: Arc<AtomicU64>,
    pub run_dir: Option<PathBuf>,
    pub paused: Arc<AtomicBool>,
    /// `stop` was requested: no further actions, no further ticks.
    pub stopped: Arc<AtomicBool>,
}
