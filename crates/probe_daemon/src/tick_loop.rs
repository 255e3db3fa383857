use crate::state::{ActionQueue, EventTx, SharedSim, SimState};
use probe_control::ActionSource;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How often the tick loop yields to the tokio runtime when running flat-out.
/// Lower = more responsive HTTP/SSE but more overhead. 1ms is a good balance.
const YIELD_INTERVAL: Duration = Duration::from_millis(1);

/// How often to log throughput stats.
const PERF_LOG_INTERVAL: Duration = Duration::from_secs(5);

pub async fn run_tick_loop(
    sim: SharedSim,
    queue: ActionQueue,
    event_tx: EventTx,
    ticks_per_sec: Arc<AtomicU64>,
    max_ticks: Option<u64>,
    paused: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
) {
    let mut next_tick_at: Option<Instant> = None;
    let mut last_yield_at = Instant::now();
    let mut perf_window_start = Instant::now();
    let mut perf_window_ticks: u64 = 0;

    loop {
        if stopped.load(Ordering::Relaxed) {
            break;
        }
        while paused.load(Ordering::Relaxed) {
            tokio::time::sleep(Duration::from_millis(50)).await;
            next_tick_at = None;
            last_yield_at = Instant::now();
            perf_window_start = Instant::now();
            perf_window_ticks = 0;
            if stopped.load(Ordering::Relaxed) {
                return;
            }
        }

        // --- Pacing ---
        let rate = f64::from_bits(ticks_per_sec.load(Ordering::Relaxed));
        if rate > 0.0 {
            let now = Instant::now();
            let target = next_tick_at.unwrap_or(now);
            if now < target {
                // Ahead of schedule — sleep until the next tick is due.
                tokio::time::sleep(target - now).await;
                last_yield_at = Instant::now();
            } else if now.duration_since(last_yield_at) >= YIELD_INTERVAL {
                // Behind schedule but haven't yielded recently — yield so
                // tokio can service HTTP/SSE handlers without starving them.
                tokio::task::yield_now().await;
                last_yield_at = Instant::now();
            }
            next_tick_at = Some(
                next_tick_at
                    .unwrap_or(now)
                    .checked_add(Duration::from_secs_f64(1.0 / rate))
                    .unwrap_or(now),
            );
        } else {
            // Unlimited — yield periodically instead of every tick.
            let now = Instant::now();
            if now.duration_since(last_yield_at) >= YIELD_INTERVAL {
                tokio::task::yield_now().await;
                last_yield_at = Instant::now();
            }
            next_tick_at = None;
        }

        // --- Execute one tick ---
        let (events, done) = {
            let mut guard = sim.lock();
            if guard.halted.is_some() {
                break;
            }

            let mut actions: Vec<probe_core::ActionEnvelope> =
                queue.lock().drain(..).collect();
            let SimState {
                ref game_state,
                ref catalog,
                ref mut autopilot,
                ref mut next_action_id,
                ..
            } = *guard;
            if let Some(autopilot) = autopilot.as_mut() {
                actions.extend(autopilot.generate_actions(game_state, catalog, next_action_id));
            }

            let SimState {
                ref mut game_state,
                ref catalog,
                ..
            } = *guard;
            let events = probe_core::tick(game_state, &actions, catalog);

            let tick = guard.game_state.meta.tick;
            if guard.check_every > 0 && tick % guard.check_every == 0 {
                if let Err(error) =
                    probe_core::check_invariants(&guard.game_state, &guard.catalog)
                {
                    tracing::error!("invariant breach at tick {tick}: {error}; halting");
                    guard.halted = Some(error.to_string());
                }
            }

            let done = guard.halted.is_some()
                || max_ticks.is_some_and(|max| guard.game_state.meta.tick >= max);
            (events, done)
        };

        let _ = event_tx.send(events);

        // --- Performance logging ---
        perf_window_ticks += 1;
        let elapsed = perf_window_start.elapsed();
        if elapsed >= PERF_LOG_INTERVAL {
            let tps = perf_window_ticks as f64 / elapsed.as_secs_f64();
            tracing::info!(
                tps = format_args!("{tps:.0}"),
                ticks = perf_window_ticks,
                "tick loop throughput"
            );
            perf_window_start = Instant::now();
            perf_window_ticks = 0;
        }

        if done {
            break;
        }
    }
}
