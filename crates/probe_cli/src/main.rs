use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use probe_control::{ActionSource, AutopilotController, ScenarioSource};
use probe_core::{GameState, StartConfig};
use probe_world::{build_initial_state, load_catalog, load_state};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "probe_cli", about = "Probe Swarm Sim CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the simulation for a fixed number of ticks.
    Run {
        #[arg(long)]
        ticks: u64,
        #[arg(long, default_value = "./catalog")]
        catalog_dir: String,
        /// Start config JSON file; defaults are used when omitted.
        #[arg(long)]
        config: Option<String>,
        /// Load a GameState snapshot instead of starting fresh.
        #[arg(long = "state")]
        state_file: Option<String>,
        /// Drive the run with the expansion autopilot.
        #[arg(long)]
        autopilot: bool,
        /// Replay a scripted scenario (tick -> actions JSON).
        #[arg(long, conflicts_with = "autopilot")]
        scenario: Option<String>,
        #[arg(long, default_value_t = 600)]
        print_every: u64,
        /// Verify state invariants every N ticks (0 disables).
        #[arg(long, default_value_t = 60)]
        check_every: u64,
        /// Append a rates CSV row every N ticks into runs/ (0 disables).
        #[arg(long, default_value_t = 60)]
        rates_every: u64,
        /// Disable the runs/ output directory entirely.
        #[arg(long)]
        no_runs: bool,
    },
}

// ---------------------------------------------------------------------------
// Rates CSV
// ---------------------------------------------------------------------------

struct RatesCsv {
    file: std::fs::File,
}

impl RatesCsv {
    fn create(dir: &std::path::Path) -> Result<Self> {
        use std::io::Write;
        let path = dir.join("rates.csv");
        let mut file = std::fs::File::create(&path)
            .with_context(|| format!("creating {}", path.display()))?;
        writeln!(
            file,
            "tick,time_days,throttle,energy_production_w,energy_consumption_w,\
             mass_mining_kg_per_day,metal_mining_kg_per_day,replication_kg_per_day,\
             construction_kg_per_day,dyson_kg_per_day,dyson_power_w,intelligence_flops,\
             total_probes,total_mass_kg,dyson_mass_kg"
        )?;
        Ok(RatesCsv { file })
    }

    fn write_row(&mut self, state: &GameState) -> Result<()> {
        use std::io::Write;
        let r = &state.rates;
        writeln!(
            self.file,
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            state.meta.tick,
            state.meta.time_days,
            r.throttle,
            r.energy_production_w,
            r.energy_consumption_w,
            r.mass_mining_kg_per_day,
            r.metal_mining_kg_per_day,
            r.replication_kg_per_day,
            r.construction_kg_per_day,
            r.dyson_kg_per_day,
            r.dyson_power_w,
            r.intelligence_flops,
            state.derived.total_probes,
            state.derived.total_mass_kg,
            state.dyson.mass,
        )?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

fn load_config(path: Option<&str>, catalog: &probe_core::Catalog) -> Result<StartConfig> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading config: {path}"))?;
            serde_json::from_str(&json).with_context(|| format!("parsing config: {path}"))
        }
        None => {
            // Default to the first non-Dyson zone as the starting point.
            let Some(zone) = catalog.zones.iter().find(|zone| !zone.is_dyson) else {
                bail!("catalog has no startable zone");
            };
            Ok(serde_json::from_value(serde_json::json!({
                "default_zone": zone.id.0,
            }))?)
        }
    }
}

#[allow(clippy::too_many_arguments, clippy::too_many_lines)]
fn run(
    ticks: u64,
    catalog_dir: &str,
    config_path: Option<String>,
    state_file: Option<String>,
    source: Option<Box<dyn ActionSource>>,
    print_every: u64,
    check_every: u64,
    rates_every: u64,
    no_runs: bool,
) -> Result<()> {
    let catalog = load_catalog(catalog_dir)?;
    let config = load_config(config_path.as_deref(), &catalog)?;

    let mut state = match state_file {
        Some(path) => load_state(&path, &catalog)?,
        None => build_initial_state(&catalog, &config),
    };

    let mut rates_csv = None;
    if !no_runs {
        let run_id = probe_world::generate_run_id();
        let run_dir = probe_world::create_run_dir(&run_id)?;
        probe_world::write_run_info(
            &run_dir,
            &run_id,
            &catalog.catalog_version,
            &config,
            serde_json::json!({
                "runner": "probe_cli",
                "ticks": ticks,
                "print_every": print_every,
                "rates_every": rates_every,
            }),
        )?;
        if rates_every > 0 {
            rates_csv = Some(RatesCsv::create(&run_dir)?);
        }
        println!("Run directory: {}", run_dir.display());
    }

    let mut source = source;
    let mut next_action_id = 0u64;

    println!(
        "Starting simulation: ticks={ticks} zones={} catalog_version={}",
        catalog.zones.len(),
        catalog.catalog_version,
    );
    println!("{}", "-".repeat(80));

    for _ in 0..ticks {
        let actions = match source.as_deref_mut() {
            Some(source) => source.generate_actions(&state, &catalog, &mut next_action_id),
            None => Vec::new(),
        };
        let events = probe_core::tick(&mut state, &actions, &catalog);

        // Print notable events regardless of print_every.
        for event in &events {
            match &event.event {
                probe_core::Event::TierCompleted { tree, tier } => {
                    println!(
                        "*** TIER COMPLETED: {tree} tier {tier} at tick={:06} ***",
                        state.meta.tick
                    );
                }
                probe_core::Event::ZoneDepleted { zone } => {
                    println!("*** ZONE DEPLETED: {zone} at tick={:06} ***", state.meta.tick);
                }
                _ => {}
            }
        }

        if check_every > 0 && state.meta.tick % check_every == 0 {
            if let Err(error) = probe_core::check_invariants(&state, &catalog) {
                bail!("invariant violated at tick {}: {error}", state.meta.tick);
            }
        }

        if print_every > 0 && state.meta.tick % print_every == 0 {
            print_status(&state);
        }

        if rates_every > 0 && state.meta.tick % rates_every == 0 {
            if let Some(ref mut csv) = rates_csv {
                csv.write_row(&state).context("writing rates row")?;
            }
        }
    }

    println!("{}", "-".repeat(80));
    println!("Done. Final state at tick {}:", state.meta.tick);
    print_status(&state);
    Ok(())
}

fn print_status(state: &GameState) {
    println!(
        "[tick={tick:06}  day={day:9.2}]  probes={probes:10.0}  metal={metal:12.3e}  \
         dyson={dyson:10.3e}  θ={throttle:4.2}  transfers={transfers:2}",
        tick = state.meta.tick,
        day = state.meta.time_days,
        probes = state.derived.total_probes,
        metal = state.derived.total_metal_kg,
        dyson = state.dyson.mass,
        throttle = state.rates.throttle,
        transfers = state.transfers.len(),
    );
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            ticks,
            catalog_dir,
            config,
            state_file,
            autopilot,
            scenario,
            print_every,
            check_every,
            rates_every,
            no_runs,
        } => {
            let source: Option<Box<dyn ActionSource>> = if autopilot {
                Some(Box::new(AutopilotController))
            } else if let Some(path) = scenario {
                let json = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading scenario: {path}"))?;
                Some(Box::new(
                    ScenarioSource::from_json(&json)
                        .with_context(|| format!("parsing scenario: {path}"))?,
                ))
            } else {
                None
            };
            run(
                ticks,
                &catalog_dir,
                config,
                state_file,
                source,
                print_every,
                check_every,
                rates_every,
                no_runs,
            )?;
        }
    }
    Ok(())
}
