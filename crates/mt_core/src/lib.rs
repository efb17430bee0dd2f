//! # mt_core - Mutiny Core Primitives
//!
//! 核心原语层，定义实体、对局、意愿事件、领域记录与全局错误处理机制。
//! 此 crate 是整个项目的基础依赖，不依赖其他业务 crate。

pub mod board;
pub mod entity;
pub mod error;
pub mod event;
pub mod game;
pub mod ids;
pub mod record;
pub mod square;

pub use board::{BoardHandle, BoardSituation, CompanionMove, RiskAssessment};
pub use entity::{Entity, EntityKind, Personality, Side, Willingness, WillingnessCategory};
pub use error::{ErrorCategory, MutinyError, Result};
pub use event::{DomainEvent, DomainEventKind, WillingnessEvent, WillingnessEventKind};
pub use game::{
    Difficulty, Game, GameConfig, GameResult, GameStatus, Outcome, OutcomeReason, RiskTolerance,
    TrustHistory,
};
pub use ids::{CommandId, EntityId, GameId, PlayerId};
pub use record::{
    CommandResolution, DegradedReason, PersuasionAttempt, PersuasionBreakdown, ResolutionOutcome,
    TerminationReason, VerdictSource,
};
pub use square::Square;
