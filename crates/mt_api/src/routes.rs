//! HTTP 命令面

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use mt_core::entity::Side;
use mt_core::event::{DomainEvent, WillingnessEvent, WillingnessEventKind};
use mt_core::game::{GameConfig, Outcome};
use mt_core::ids::{EntityId, GameId, PlayerId};
use mt_core::record::CommandResolution;
use mt_engine::{
    CommandRequest, GameHistory, GameSnapshot, MutinyService, PersuasionRequest,
    PersuasionResult,
};
use mt_judgment::{DailyUsage, GameUsage};

use crate::error::ApiError;

/// 玩家会话请求头
pub const SESSION_HEADER: &str = "x-session-id";

pub type AppState = Arc<MutinyService>;

type ApiResult<T> = Result<Json<T>, ApiError>;

/// 从 `x-session-id` 提取的玩家身份
#[derive(Debug, Clone)]
pub struct Session(pub PlayerId);

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| Session(PlayerId::new(value)))
            .ok_or_else(ApiError::missing_session)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateGameBody {
    #[serde(default)]
    pub config: GameConfig,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JoinResponse {
    pub side: Side,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OutcomeResponse {
    pub outcome: Option<Outcome>,
}

#[derive(Debug, Deserialize)]
pub struct CommandBody {
    pub entity_id: EntityId,
    pub target: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub expected_ply: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct PersuadeBody {
    pub entity_id: EntityId,
    pub target: String,
    pub text: String,
    #[serde(default)]
    pub is_voice: bool,
}

#[derive(Debug, Deserialize)]
pub struct PromiseBody {
    pub entity_id: EntityId,
    pub kept: bool,
}

#[derive(Debug, Deserialize)]
pub struct ObservedEventBody {
    pub entity_id: EntityId,
    pub kind: WillingnessEventKind,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DrainQuery {
    pub max: Option<usize>,
}

/// 构建命令面路由
pub fn build_router(service: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/games", post(create_game))
        .route("/games/:id", get(snapshot))
        .route("/games/:id/join", post(join_game))
        .route("/games/:id/start", post(start_game))
        .route("/games/:id/command", post(submit_command))
        .route("/games/:id/persuade", post(submit_persuasion))
        .route("/games/:id/resign", post(resign))
        .route("/games/:id/draw", post(agree_draw))
        .route("/games/:id/abandon", post(abandon))
        .route("/games/:id/timeout", post(record_timeout))
        .route("/games/:id/promise", post(record_promise))
        .route("/games/:id/events", post(record_event))
        .route("/games/:id/history", get(history))
        .route("/games/:id/usage", get(game_usage))
        .route("/usage", get(daily_usage))
        .route("/outbox", get(drain_outbox))
        .with_state(service)
}

async fn health() -> &'static str {
    "ok"
}

async fn create_game(
    State(service): State<AppState>,
    Session(player): Session,
    body: Option<Json<CreateGameBody>>,
) -> Result<(StatusCode, Json<GameSnapshot>), ApiError> {
    let config = body.map(|Json(body)| body.config).unwrap_or_default();
    let snapshot = service.create_game(player, config).await?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

async fn snapshot(State(service): State<AppState>, Path(id): Path<GameId>) -> ApiResult<GameSnapshot> {
    Ok(Json(service.snapshot(id).await?))
}

async fn join_game(
    State(service): State<AppState>,
    Path(id): Path<GameId>,
    Session(player): Session,
) -> ApiResult<JoinResponse> {
    let side = service.join_game(id, player).await?;
    Ok(Json(JoinResponse { side }))
}

async fn start_game(
    State(service): State<AppState>,
    Path(id): Path<GameId>,
    Session(player): Session,
) -> ApiResult<GameSnapshot> {
    service.start_game(id, player).await?;
    Ok(Json(service.snapshot(id).await?))
}

async fn submit_command(
    State(service): State<AppState>,
    Path(id): Path<GameId>,
    Session(issuer): Session,
    Json(body): Json<CommandBody>,
) -> ApiResult<CommandResolution> {
    let request = CommandRequest {
        issuer,
        entity_id: body.entity_id,
        target: body.target,
        note: body.note,
        expected_ply: body.expected_ply,
    };
    Ok(Json(service.submit_command(id, request).await?))
}

async fn submit_persuasion(
    State(service): State<AppState>,
    Path(id): Path<GameId>,
    Session(issuer): Session,
    Json(body): Json<PersuadeBody>,
) -> ApiResult<PersuasionResult> {
    let request = PersuasionRequest {
        issuer,
        entity_id: body.entity_id,
        target: body.target,
        text: body.text,
        is_voice: body.is_voice,
    };
    Ok(Json(service.submit_persuasion(id, request).await?))
}

async fn resign(
    State(service): State<AppState>,
    Path(id): Path<GameId>,
    Session(player): Session,
) -> ApiResult<Outcome> {
    Ok(Json(service.resign(id, player).await?))
}

async fn agree_draw(
    State(service): State<AppState>,
    Path(id): Path<GameId>,
    Session(player): Session,
) -> ApiResult<OutcomeResponse> {
    let outcome = service.agree_draw(id, player).await?;
    Ok(Json(OutcomeResponse { outcome }))
}

async fn abandon(
    State(service): State<AppState>,
    Path(id): Path<GameId>,
    Session(player): Session,
) -> ApiResult<OutcomeResponse> {
    let outcome = service.abandon(id, player).await?;
    Ok(Json(OutcomeResponse { outcome }))
}

/// 由外部计时器调用
async fn record_timeout(State(service): State<AppState>, Path(id): Path<GameId>) -> ApiResult<Outcome> {
    Ok(Json(service.record_timeout(id).await?))
}

async fn record_promise(
    State(service): State<AppState>,
    Path(id): Path<GameId>,
    Session(issuer): Session,
    Json(body): Json<PromiseBody>,
) -> ApiResult<Option<WillingnessEvent>> {
    let event = service
        .record_promise(id, issuer, body.entity_id, body.kept)
        .await?;
    Ok(Json(event))
}

async fn record_event(
    State(service): State<AppState>,
    Session(player): Session,
    Path(id): Path<GameId>,
    Json(body): Json<ObservedEventBody>,
) -> ApiResult<Vec<WillingnessEvent>> {
    let events = service
        .record_event(id, player, body.entity_id, body.kind, body.note)
        .await?;
    Ok(Json(events))
}

async fn history(State(service): State<AppState>, Path(id): Path<GameId>) -> ApiResult<GameHistory> {
    Ok(Json(service.history(id).await?))
}

async fn game_usage(State(service): State<AppState>, Path(id): Path<GameId>) -> ApiResult<GameUsage> {
    let usage = service.judgment_usage(id).await?;
    usage.map(Json).ok_or_else(ApiError::usage_unavailable)
}

/// 当日实时裁决用量与对局名额
async fn daily_usage(State(service): State<AppState>) -> ApiResult<DailyUsage> {
    service
        .daily_usage()
        .map(Json)
        .ok_or_else(ApiError::usage_unavailable)
}

/// 取出待投递记录，取出即视为已交付
async fn drain_outbox(
    State(service): State<AppState>,
    Query(query): Query<DrainQuery>,
) -> Json<Vec<DomainEvent>> {
    let outbox = service.outbox();
    let max = query.max.unwrap_or(outbox.config().drain_batch_size);
    Json(outbox.drain(max).await)
}
