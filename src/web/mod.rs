mod error;

use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::broadcast};
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};

use crate::{
    collector::{CollectOutcome, CollectRequest, RejectReason},
    engine::Engine,
    flags::RESOURCES_ENABLED,
    players::{NewPlayer, RegisterError},
    spatial::{valid_latitude, valid_longitude, BoundingBox},
    world::{NodeId, PlayerId},
};

pub use error::AppError;

pub const PLAYER_TOKEN_HEADER: &str = "x-player-token";

/// Pushed to `/api/events` subscribers.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HarvestEvent {
    Collect { outcome: CollectOutcome },
    Respawn { count: usize },
}

#[derive(Clone)]
pub struct AppState {
    engine: Engine,
    broadcaster: broadcast::Sender<String>,
    max_request_amount: u32,
}

impl AppState {
    pub fn new(engine: Engine, max_request_amount: u32) -> Self {
        let (broadcaster, _) = broadcast::channel::<String>(512);
        Self {
            engine,
            broadcaster,
            max_request_amount,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.broadcaster.subscribe()
    }

    fn publish(&self, event: HarvestEvent) {
        if let Ok(payload) = serde_json::to_string(&event) {
            let _ = self.broadcaster.send(payload);
        }
    }
}

pub struct WebServerConfig {
    pub host: String,
    pub port: u16,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/version", get(version))
        .route("/healthz", get(healthz))
        .route("/api/resources", get(list_resources))
        .route("/api/resources/:id/collect", post(collect))
        .route("/api/players", get(list_players).post(create_player))
        .route("/api/players/:id", get(get_player))
        .route("/api/players/:id/inventory", get(player_inventory))
        .route("/api/featureflags", get(list_flags))
        .route("/api/featureflags/:key", get(get_flag))
        .route("/api/events", get(stream_events))
        .with_state(Arc::new(state))
}

pub async fn run(state: AppState, config: WebServerConfig) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.host, config.port))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "geoharvest API listening (Ctrl+C to stop)");

    serve(listener, state, shutdown_signal()).await
}

/// Serves the API on an already-bound listener until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutting down API");
}

#[derive(Serialize)]
struct VersionInfo {
    name: &'static str,
    version: &'static str,
}

async fn version() -> Json<VersionInfo> {
    Json(VersionInfo {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn healthz() -> &'static str {
    "ok"
}

async fn resources_enabled(state: &AppState) -> Result<bool, AppError> {
    Ok(state.engine.flags.is_enabled(RESOURCES_ENABLED).await? == Some(true))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxParams {
    pub min_lat: f64,
    pub min_lng: f64,
    pub max_lat: f64,
    pub max_lng: f64,
}

async fn list_resources(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BoxParams>,
) -> Result<Response, AppError> {
    if !resources_enabled(&state).await? {
        return Ok(StatusCode::NOT_FOUND.into_response());
    }
    let bbox = match BoundingBox::new(params.min_lat, params.min_lng, params.max_lat, params.max_lng) {
        Ok(bbox) => bbox,
        Err(err) => return Ok((StatusCode::BAD_REQUEST, err.to_string()).into_response()),
    };
    let (refilled, resources) = state.engine.query.refill_and_list(bbox)?;
    if refilled > 0 {
        state.publish(HarvestEvent::Respawn { count: refilled });
    }
    Ok(Json(resources).into_response())
}

fn validate_collect(request: &CollectRequest, max_amount: u32) -> Option<String> {
    if !valid_latitude(request.player_latitude) || !valid_longitude(request.player_longitude) {
        return Some("player position is out of range".into());
    }
    if request.amount < 1 || request.amount > max_amount {
        return Some(format!("amount must be between 1 and {max_amount}"));
    }
    None
}

pub fn status_for(outcome: &CollectOutcome) -> StatusCode {
    match outcome.reason {
        None => StatusCode::OK,
        Some(RejectReason::Unauthorized) => StatusCode::UNAUTHORIZED,
        Some(RejectReason::Disabled) | Some(RejectReason::NotFound) => StatusCode::NOT_FOUND,
        Some(RejectReason::Cooldown) => StatusCode::TOO_MANY_REQUESTS,
        Some(RejectReason::Respawning)
        | Some(RejectReason::TooFar)
        | Some(RejectReason::DepletedOrRace) => StatusCode::BAD_REQUEST,
    }
}

async fn collect(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<CollectRequest>,
) -> Result<Response, AppError> {
    let Ok(node_id) = id.parse::<NodeId>() else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };
    if let Some(problem) = validate_collect(&request, state.max_request_amount) {
        return Ok((StatusCode::BAD_REQUEST, problem).into_response());
    }

    let token = headers
        .get(PLAYER_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());
    let identity = state.engine.players.resolve_token(token)?;
    let outcome = state
        .engine
        .collector
        .collect(identity, node_id, &request)
        .await?;

    let status = status_for(&outcome);
    if outcome.reason != Some(RejectReason::Unauthorized) {
        state.publish(HarvestEvent::Collect {
            outcome: outcome.clone(),
        });
    }
    Ok((status, Json(outcome)).into_response())
}

async fn list_players(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    Ok(Json(state.engine.players.recent()?).into_response())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatedPlayer {
    id: PlayerId,
    username: String,
    latitude: f64,
    longitude: f64,
    api_token: String,
    created_utc: chrono::DateTime<chrono::Utc>,
}

async fn create_player(
    State(state): State<Arc<AppState>>,
    Json(new_player): Json<NewPlayer>,
) -> Result<Response, AppError> {
    match state.engine.players.register(new_player) {
        Ok(player) => Ok((
            StatusCode::CREATED,
            Json(CreatedPlayer {
                id: player.id,
                username: player.username,
                latitude: player.latitude,
                longitude: player.longitude,
                api_token: player.api_token,
                created_utc: player.created_utc,
            }),
        )
            .into_response()),
        Err(RegisterError::Store(err)) => Err(err.into()),
        Err(RegisterError::Duplicate) => Ok((StatusCode::CONFLICT, RegisterError::Duplicate.to_string()).into_response()),
        Err(err) => Ok((StatusCode::BAD_REQUEST, err.to_string()).into_response()),
    }
}

async fn get_player(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let Ok(player_id) = id.parse::<PlayerId>() else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };
    match state.engine.players.get(player_id)? {
        Some(player) => Ok(Json(player).into_response()),
        None => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}

async fn player_inventory(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let Ok(player_id) = id.parse::<PlayerId>() else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };
    Ok(Json(state.engine.inventory.aggregated(player_id)?).into_response())
}

#[derive(Serialize)]
struct FlagView {
    key: String,
    enabled: bool,
}

async fn list_flags(State(state): State<Arc<AppState>>) -> Result<Json<Vec<FlagView>>, AppError> {
    let flags = state.engine.flags.all().await?;
    Ok(Json(
        flags
            .into_iter()
            .map(|(key, enabled)| FlagView { key, enabled })
            .collect(),
    ))
}

async fn get_flag(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    match state.engine.flags.is_enabled(&key).await? {
        Some(enabled) => Ok(Json(FlagView {
            key: key.trim().to_string(),
            enabled,
        })
        .into_response()),
        None => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}

async fn stream_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(payload) => Some(Ok(Event::default().data(payload))),
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
