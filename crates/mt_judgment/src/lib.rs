//! # mt_judgment - Mutiny Judgment Gateway
//!
//! 外部裁决能力 (AI) 的统一网关。
//!
//! 负责：
//! - 按请求指纹缓存裁决 (分析类 5 分钟，嘲讽 30 分钟)
//! - 每指令 / 每局调用预算 (原子 CAS 计数)，以及每日实时裁决对局名额
//! - 按局、按日累计调用次数、token 与费用
//! - 单次调用超时与按请求类型的熔断
//! - 所有降级路径回落到纯函数的确定性兜底裁决
//!
//! 降级永远不会以错误形式离开网关，调用方总能拿到一个可用的裁决。

pub mod breaker;
pub mod budget;
pub mod cache;
pub mod capability;
pub mod error;
pub mod fallback;
pub mod gateway;
pub mod request;
pub mod rubric;
pub mod templates;
pub mod usage;
pub mod verdict;

pub use breaker::{BreakerConfig, BreakerSet, CircuitBreaker, CircuitState};
pub use budget::{BudgetConfig, BudgetScope, BudgetStats, CallBudget, DailyGames};
pub use cache::{CacheConfig, VerdictCache};
pub use capability::{
    CapabilityError, HttpCapabilityConfig, HttpJudgmentCapability, JudgmentCapability,
    MeteredVerdict, UnavailableCapability,
};
pub use error::JudgmentError;
pub use gateway::{GatewayConfig, Judge, JudgmentGateway};
pub use request::{
    AnalysisContext, JudgmentRequest, ObedienceContext, PersonaSnapshot, PersuasionContext,
    RequestKind, TauntContext, TauntTrigger,
};
pub use usage::{
    DailyUsage, GameUsage, TokenUsage, UsageKind, UsagePricing, UsageTotals, UsageTracker,
};
pub use verdict::{
    AnalysisVerdict, Judgment, ObedienceVerdict, PersuasionVerdict, TauntVerdict, Verdict,
};
