use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::{
        sse::{Event, Sse},
        Json,
    },
    routing::{get, post},
    Router,
};
use probe_core::EventEnvelope;
use std::convert::Infallible;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[cfg(test)]
pub fn make_router(state: AppState) -> Router {
    make_router_with_cors(state, "http://localhost:5173")
}

pub fn make_router_with_cors(state: AppState, cors_origin: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(cors_origin.parse::<axum::http::HeaderValue>().unwrap())
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/meta", get(meta_handler))
        .route("/api/v1/snapshot", get(snapshot_handler))
        .route("/api/v1/rates", get(rates_handler))
        .route("/api/v1/stream", get(stream_handler))
        .route("/api/v1/actions", post(actions_handler))
        .route("/api/v1/speed", post(speed_handler))
        .route("/api/v1/pace", post(pace_handler))
        .route("/api/v1/save", post(save_handler))
        .route("/api/v1/pause", post(pause_handler))
        .route("/api/v1/resume", post(resume_handler))
        .route("/api/v1/stop", post(stop_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn meta_handler(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    let sim = app_state.sim.lock();
    let paused = app_state.paused.load(Ordering::Relaxed);
    let stopped = app_state.stopped.load(Ordering::Relaxed);
    let ticks_per_sec = f64::from_bits(app_state.ticks_per_sec.load(Ordering::Relaxed));
    Json(serde_json::json!({
        "tick": sim.game_state.meta.tick,
        "time_days": sim.game_state.meta.time_days,
        "speed": sim.game_state.meta.speed,
        "catalog_version": sim.game_state.meta.catalog_version,
        "ticks_per_sec": ticks_per_sec,
        "paused": paused,
        "stopped": stopped,
        "halted": sim.halted.clone(),
    }))
}

pub async fn snapshot_handler(
    State(app_state): State<AppState>,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], String) {
    let sim = app_state.sim.lock();
    match serde_json::to_string(&sim.game_state) {
        Ok(json) => {
            drop(sim);
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                json,
            )
        }
        Err(err) => {
            tracing::error!("snapshot serialization failed: {err}");
            drop(sim);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "application/json")],
                r#"{"error":"serialization failed"}"#.to_string(),
            )
        }
    }
}

pub async fn rates_handler(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    let sim = app_state.sim.lock();
    Json(serde_json::json!({
        "rates": sim.game_state.rates,
        "cumulative": sim.game_state.cumulative,
        "history": sim.game_state.history.samples,
    }))
}

/// Enqueues collaborator actions for the next tick boundary. Outcomes arrive
/// as `ActionCompleted` events on the stream, keyed by the returned ids.
pub async fn actions_handler(
    State(app_state): State<AppState>,
    Json(actions): Json<Vec<probe_core::Action>>,
) -> (StatusCode, Json<serde_json::Value>) {
    if app_state.stopped.load(Ordering::Relaxed) {
        return (
            StatusCode::CONFLICT,
            Json(serde_json::json!({"error": "engine is stopped"})),
        );
    }

    let mut ids = Vec::with_capacity(actions.len());
    {
        let mut sim = app_state.sim.lock();
        let mut queue = app_state.queue.lock();
        for action in actions {
            let id = probe_core::ActionId(format!("act_{:06}", sim.next_action_id));
            sim.next_action_id += 1;
            queue.push(probe_core::ActionEnvelope {
                id: id.clone(),
                action,
            });
            ids.push(id);
        }
    }
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "action_ids": ids })),
    )
}

#[derive(serde::Deserialize)]
pub struct SpeedRequest {
    pub speed: f64,
}

/// Sets the simulated time-speed scalar (an engine action, applied at the
/// next tick boundary).
pub async fn speed_handler(
    State(app_state): State<AppState>,
    Json(request): Json<SpeedRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    actions_handler(
        State(app_state),
        Json(vec![probe_core::Action::SetTimeSpeed {
            speed: request.speed,
        }]),
    )
    .await
}

#[derive(serde::Deserialize)]
pub struct PaceRequest {
    pub ticks_per_sec: f64,
}

/// Sets wall-clock pacing. This is daemon-side only and independent of the
/// simulated speed scalar.
pub async fn pace_handler(
    State(app_state): State<AppState>,
    Json(request): Json<PaceRequest>,
) -> Json<serde_json::Value> {
    let rate = request.ticks_per_sec.max(0.0);
    app_state
        .ticks_per_sec
        .store(rate.to_bits(), Ordering::Relaxed);
    Json(serde_json::json!({"ticks_per_sec": rate}))
}

pub async fn save_handler(
    State(app_state): State<AppState>,
) -> (StatusCode, Json<serde_json::Value>) {
    let run_dir = match &app_state.run_dir {
        Some(dir) => dir.clone(),
        None => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({"error": "no run directory (started with --no-runs?)"})),
            );
        }
    };

    let sim = app_state.sim.lock();
    let tick = sim.game_state.meta.tick;
    let body = match serde_json::to_string_pretty(&sim.game_state) {
        Ok(json) => json,
        Err(err) => {
            tracing::error!("save serialization failed: {err}");
            drop(sim);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "serialization failed"})),
            );
        }
    };
    drop(sim);

    let saves_dir = run_dir.join("saves");
    if let Err(err) = std::fs::create_dir_all(&saves_dir) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": format!("create saves dir: {err}")})),
        );
    }

    let filename = format!("save_{tick}.json");
    let path = saves_dir.join(&filename);
    if let Err(err) = std::fs::write(&path, body) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": format!("write save: {err}")})),
        );
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({"path": path.display().to_string(), "tick": tick})),
    )
}

pub async fn pause_handler(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    app_state.paused.store(true, Ordering::Relaxed);
    Json(serde_json::json!({"paused": true}))
}

pub async fn resume_handler(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    app_state.paused.store(false, Ordering::Relaxed);
    Json(serde_json::json!({"paused": false}))
}

/// Stops the engine: tick scheduling ends and further actions are refused.
/// The last committed snapshot keeps being served.
pub async fn stop_handler(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    app_state.stopped.store(true, Ordering::Relaxed);
    Json(serde_json::json!({"stopped": true}))
}

pub async fn stream_handler(
    State(app_state): State<AppState>,
) -> Sse<impl futures_core::Stream<Item = Result<Event, Infallible>>> {
    let mut rx = app_state.event_tx.subscribe();
    let sim = app_state.sim.clone();

    let stream = async_stream::stream! {
        let mut heartbeat = tokio::time::interval(Duration::from_millis(200));
        heartbeat.tick().await; // discard the immediate first tick
        let mut flush = tokio::time::interval(Duration::from_millis(50));
        flush.tick().await; // discard the immediate first tick
        let mut pending: Vec<EventEnvelope> = Vec::new();
        loop {
            tokio::select! {
                result = rx.recv() => {
                    match result {
                        Ok(events) => pending.extend(events),
                        Err(broadcast::error::RecvError::Lagged(_)) => {}
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                _ = flush.tick() => {
                    if !pending.is_empty() {
                        let data = serde_json::to_string(&pending).unwrap_or_default();
                        pending.clear();
                        yield Ok(Event::default().data(data));
                    }
                }
                _ = heartbeat.tick() => {
                    let tick = sim.lock().game_state.meta.tick;
                    let hb = serde_json::json!({"heartbeat": true, "tick": tick});
                    yield Ok(Event::default().data(hb.to_string()));
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("ping"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SimState;
    use http_body_util::BodyExt;
    use parking_lot::Mutex;
    use probe_core::test_fixtures::{base_catalog, base_state};
    use std::sync::atomic::AtomicBool;
    use std::sync::atomic::AtomicU64;
    use std::sync::Arc;
    use tokio::sync::broadcast;
    use tower::util::ServiceExt;

    fn make_app() -> (AppState, Router) {
        let catalog = base_catalog();
        let game_state = base_state(&catalog);
        let (event_tx, _) = broadcast::channel(64);
        let app_state = AppState {
            sim: Arc::new(Mutex::new(SimState {
                game_state,
                catalog,
                autopilot: None,
                next_action_id: 0,
                check_every: 60,
                halted: None,
            })),
            queue: Arc::new(Mutex::new(Vec::new())),
            event_tx,
            ticks_per_sec: Arc::new(AtomicU64::new(0.0_f64.to_bits())),
            run_dir: None,
            paused: Arc::new(AtomicBool::new(false)),
            stopped: Arc::new(AtomicBool::new(false)),
        };
        let router = make_router(app_state.clone());
        (app_state, router)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn meta_reports_tick_and_flags() {
        let (_, router) = make_app();
        let response = router
            .oneshot(
                axum::http::Request::get("/api/v1/meta")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["tick"], 0);
        assert_eq!(json["paused"], false);
        assert_eq!(json["stopped"], false);
    }

    #[tokio::test]
    async fn snapshot_returns_the_full_state() {
        let (_, router) = make_app();
        let response = router
            .oneshot(
                axum::http::Request::get("/api/v1/snapshot")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert!(json["zones"]["earth"].is_object());
        assert!(json["dyson"]["target_mass"].is_number());
    }

    #[tokio::test]
    async fn actions_are_queued_with_assigned_ids() {
        let (app_state, router) = make_app();
        let body = serde_json::json!([
            {"kind": "set_dyson_power_allocation", "allocation": 0.3}
        ]);
        let response = router
            .oneshot(
                axum::http::Request::post("/api/v1/actions")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(axum::body::Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let json = body_json(response).await;
        assert_eq!(json["action_ids"].as_array().unwrap().len(), 1);
        assert_eq!(app_state.queue.lock().len(), 1);
    }

    #[tokio::test]
    async fn stopped_engine_refuses_actions() {
        let (app_state, router) = make_app();
        app_state.stopped.store(true, Ordering::Relaxed);
        let response = router
            .oneshot(
                axum::http::Request::post("/api/v1/actions")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(axum::body::Body::from("[]"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn pace_updates_wall_clock_rate() {
        let (app_state, router) = make_app();
        let response = router
            .oneshot(
                axum::http::Request::post("/api/v1/pace")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(axum::body::Body::from(r#"{"ticks_per_sec": 60.0}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let stored = f64::from_bits(app_state.ticks_per_sec.load(Ordering::Relaxed));
        assert!((stored - 60.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn save_without_run_dir_is_unavailable() {
        let (_, router) = make_app();
        let response = router
            .oneshot(
                axum::http::Request::post("/api/v1/save")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
