//! 全局错误处理机制

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::WillingnessEventKind;
use crate::game::GameStatus;
use crate::ids::{EntityId, GameId};
use crate::square::Square;

/// Mutiny 统一错误类型
///
/// 拒绝执行与说服失败不是错误，它们是正常的决议结果。
/// 裁决降级 (超时/预算/熔断) 在网关内部被吸收，同样不会出现在这里。
#[derive(Error, Debug)]
pub enum MutinyError {
    #[error("Game not found: {0}")]
    GameNotFound(GameId),

    #[error("Unknown entity: {0}")]
    UnknownEntity(EntityId),

    #[error("Entity has been removed from the board: {0}")]
    EntityRemoved(EntityId),

    #[error("Not your turn")]
    NotYourTurn,

    #[error("Entity {0} does not belong to the issuing side")]
    NotYourEntity(EntityId),

    #[error("Malformed target square: {0:?}")]
    MalformedTarget(String),

    #[error("Game is not active: {0}")]
    GameNotActive(GameId),

    #[error("Invalid game status transition: {from} -> {to}")]
    InvalidTransition { from: GameStatus, to: GameStatus },

    #[error("Illegal move: {from} -> {to}")]
    IllegalTransition { from: Square, to: Square },

    #[error("Player is not seated in this game")]
    NotAPlayer,

    #[error("Event kind {0} is derived by the engine and cannot be reported")]
    NotObservable(WillingnessEventKind),

    #[error("Game already has two players")]
    GameFull,

    #[error("Stale game state: expected ply {expected}, current ply {actual}")]
    ConcurrencyConflict { expected: u32, actual: u32 },

    #[error("External collaborator unavailable: {0}")]
    ExternalUnavailable(String),

    #[error("Request cancelled by caller")]
    Cancelled,

    #[error("Actor error: {0}")]
    Actor(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 错误分类，供接口层映射状态码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// 校验失败，无副作用
    Validation,
    /// 对局或实体不存在
    NotFound,
    /// 状态过期或生命周期冲突，调用方应重新拉取
    Conflict,
    /// 规则预言机 / 局面校验器不可达，调用方可重试
    ExternalUnavailable,
    Internal,
}

impl MutinyError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            MutinyError::GameNotFound(_) | MutinyError::UnknownEntity(_) => ErrorCategory::NotFound,
            MutinyError::EntityRemoved(_)
            | MutinyError::NotYourTurn
            | MutinyError::NotYourEntity(_)
            | MutinyError::MalformedTarget(_)
            | MutinyError::GameNotActive(_)
            | MutinyError::IllegalTransition { .. }
            | MutinyError::NotAPlayer
            | MutinyError::NotObservable(_) => ErrorCategory::Validation,
            MutinyError::InvalidTransition { .. }
            | MutinyError::GameFull
            | MutinyError::ConcurrencyConflict { .. } => ErrorCategory::Conflict,
            MutinyError::ExternalUnavailable(_) => ErrorCategory::ExternalUnavailable,
            MutinyError::Cancelled
            | MutinyError::Actor(_)
            | MutinyError::Config(_)
            | MutinyError::Io(_)
            | MutinyError::Serialization(_) => ErrorCategory::Internal,
        }
    }

    /// 机器可读的错误码
    pub fn code(&self) -> &'static str {
        match self {
            MutinyError::GameNotFound(_) => "game_not_found",
            MutinyError::UnknownEntity(_) => "unknown_entity",
            MutinyError::EntityRemoved(_) => "entity_removed",
            MutinyError::NotYourTurn => "not_your_turn",
            MutinyError::NotYourEntity(_) => "not_your_entity",
            MutinyError::MalformedTarget(_) => "malformed_target",
            MutinyError::GameNotActive(_) => "game_not_active",
            MutinyError::InvalidTransition { .. } => "invalid_transition",
            MutinyError::IllegalTransition { .. } => "illegal_transition",
            MutinyError::NotAPlayer => "not_a_player",
            MutinyError::NotObservable(_) => "not_observable",
            MutinyError::GameFull => "game_full",
            MutinyError::ConcurrencyConflict { .. } => "concurrency_conflict",
            MutinyError::ExternalUnavailable(_) => "external_unavailable",
            MutinyError::Cancelled => "cancelled",
            MutinyError::Actor(_) => "actor",
            MutinyError::Config(_) => "config",
            MutinyError::Io(_) => "io",
            MutinyError::Serialization(_) => "serialization",
        }
    }
}

/// 统一 Result 类型别名
pub type Result<T> = std::result::Result<T, MutinyError>;
