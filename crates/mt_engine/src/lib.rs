//! # mt_engine - Mutiny Resolution Engine
//!
//! 指挥与说服的决议引擎。
//!
//! - [`ledger`]: 意愿账本，有界分数与只追加事件历史
//! - [`obedience`]: 服从决策
//! - [`persuasion`]: 说服仲裁与成功阈值策略
//! - [`resolver`]: 指令校验、原子提交与终态记录
//! - [`turn`]: 对局生命周期与回合归属
//! - [`actor`] / [`service`]: 每局串行执行的 Actor 与对外命令 API
//!
//! 规则判定、局面校验与自然语言生成都由外部协作方提供，见 [`oracle`]。

pub mod actor;
pub mod commentary;
pub mod ledger;
pub mod obedience;
pub mod oracle;
pub mod persuasion;
pub mod resolver;
pub mod roster;
pub mod session;
pub mod service;
pub mod turn;

pub use actor::{GameActor, GameMsg, PersuasionResult};
pub use commentary::{Commentary, Followup, FollowupResult, Taunt};
pub use ledger::{EventContext, WillingnessLedger};
pub use obedience::{ObedienceDecision, ObedienceService};
pub use oracle::{BoardTruthChecker, FixedTruthChecker, GridBoard, GridOracle, LegalityOracle};
pub use persuasion::{PersuasionArbiter, PersuasionOutcome, ThresholdPolicy};
pub use resolver::{CommandRequest, CommandResolver, PersuasionRequest, StatusChange};
pub use session::{GameHistory, GameSession, GameSnapshot, PendingCommand, ValidatedCommand};
pub use service::{EngineConfig, MutinyService};
