mod routes;
mod state;
mod tick_loop;

use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::Mutex;
use probe_control::AutopilotController;
use probe_core::StartConfig;
use probe_world::{build_initial_state, load_catalog, load_state};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "probe_daemon", about = "Probe Swarm Sim daemon")]
struct Args {
    #[arg(long, default_value = "./catalog")]
    catalog_dir: String,
    /// Start config JSON file; defaults are used when omitted.
    #[arg(long)]
    config: Option<String>,
    /// Load a GameState snapshot instead of starting fresh.
    #[arg(long = "state")]
    state_file: Option<String>,
    #[arg(long, default_value_t = 8797)]
    port: u16,
    /// Wall-clock pacing in ticks/sec; 0 runs unlimited.
    #[arg(long, default_value_t = 60.0)]
    ticks_per_sec: f64,
    /// Stop automatically after this many ticks.
    #[arg(long)]
    max_ticks: Option<u64>,
    /// Verify invariants every N ticks (0 disables).
    #[arg(long, default_value_t = 60)]
    check_every: u64,
    /// Drive the run with the expansion autopilot.
    #[arg(long)]
    autopilot: bool,
    /// Disable the runs/ output directory (and the save endpoint).
    #[arg(long)]
    no_runs: bool,
    #[arg(long, default_value = "http://localhost:5173")]
    cors_origin: String,
}

fn default_config(catalog: &probe_core::Catalog) -> Result<StartConfig> {
    let zone = catalog
        .zones
        .iter()
        .find(|zone| !zone.is_dyson)
        .context("catalog has no startable zone")?;
    Ok(serde_json::from_value(serde_json::json!({
        "default_zone": zone.id.0,
    }))?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let catalog = load_catalog(&args.catalog_dir)?;
    let config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading config: {path}"))?;
            serde_json::from_str(&json).with_context(|| format!("parsing config: {path}"))?
        }
        None => default_config(&catalog)?,
    };

    let game_state = match &args.state_file {
        Some(path) => load_state(path, &catalog)?,
        None => build_initial_state(&catalog, &config),
    };

    let mut run_dir = None;
    if !args.no_runs {
        let run_id = probe_world::generate_run_id();
        let dir = probe_world::create_run_dir(&run_id)?;
        probe_world::write_run_info(
            &dir,
            &run_id,
            &catalog.catalog_version,
            &config,
            serde_json::json!({
                "runner": "probe_daemon",
                "ticks_per_sec": args.ticks_per_sec,
                "max_ticks": args.max_ticks,
            }),
        )?;
        tracing::info!("run directory: {}", dir.display());
        run_dir = Some(dir);
    }

    let (event_tx, _) = tokio::sync::broadcast::channel(1024);
    let app_state = state::AppState {
        sim: Arc::new(Mutex::new(state::SimState {
            game_state,
            catalog,
            autopilot: args.autopilot.then_some(AutopilotController),
            next_action_id: 0,
            check_every: args.check_every,
            halted: None,
        })),
        queue: Arc::new(Mutex::new(Vec::new())),
        event_tx: event_tx.clone(),
        ticks_per_sec: Arc::new(AtomicU64::new(args.ticks_per_sec.max(0.0).to_bits())),
        run_dir,
        paused: Arc::new(AtomicBool::new(false)),
        stopped: Arc::new(AtomicBool::new(false)),
    };

    tokio::spawn(tick_loop::run_tick_loop(
        app_state.sim.clone(),
        app_state.queue.clone(),
        event_tx,
        app_state.ticks_per_sec.clone(),
        args.max_ticks,
        app_state.paused.clone(),
        app_state.stopped.clone(),
    ));

    let router = routes::make_router_with_cors(app_state, &args.cors_origin);
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], args.port));
    tracing::info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, router).await.context("serving")?;
    Ok(())
}
