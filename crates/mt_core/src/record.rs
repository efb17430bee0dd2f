//! 决议记录与审计轨迹

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::EntityKind;
use crate::event::WillingnessEvent;
use crate::ids::{CommandId, EntityId, GameId, PlayerId};
use crate::square::Square;

/// 裁决降级原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradedReason {
    Timeout,
    BudgetExceeded,
    CircuitOpen,
    CapabilityError,
    InvalidResponse,
}

impl DegradedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DegradedReason::Timeout => "timeout",
            DegradedReason::BudgetExceeded => "budget_exceeded",
            DegradedReason::CircuitOpen => "circuit_open",
            DegradedReason::CapabilityError => "capability_error",
            DegradedReason::InvalidResponse => "invalid_response",
        }
    }
}

/// 裁决来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "reason", rename_all = "snake_case")]
pub enum VerdictSource {
    /// 本地规则直接判定，未询问外部裁决
    Rule,
    Live,
    Cached,
    Fallback(DegradedReason),
}

impl VerdictSource {
    pub fn is_degraded(&self) -> bool {
        matches!(self, VerdictSource::Fallback(_))
    }
}

/// 指令决议结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionOutcome {
    Applied,
    Refused,
    Terminated,
}

impl ResolutionOutcome {
    /// 是否为终态 (Refused 仍可进入说服流程)
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ResolutionOutcome::Refused)
    }
}

/// 终止原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TerminationReason {
    PersuasionFailed,
    Superseded,
    GameEnded,
}

/// 一条指令的决议记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResolution {
    pub command_id: CommandId,
    pub game_id: GameId,
    pub entity_id: EntityId,
    pub from: Square,
    pub to: Square,
    pub outcome: ResolutionOutcome,
    /// 棋子的回应
    pub narrative: String,
    pub willingness_before: u8,
    pub willingness_after: u8,
    /// 本次决议产生的意愿事件
    pub events: Vec<WillingnessEvent>,
    pub captured: Option<EntityKind>,
    pub promoted_to: Option<EntityKind>,
    /// 决议后的半回合数
    pub ply: u32,
    pub source: VerdictSource,
    pub termination: Option<TerminationReason>,
    pub resolved_at: DateTime<Utc>,
}

/// 说服评分明细
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersuasionBreakdown {
    /// 逻辑分 0..=25
    pub logic: u8,
    /// 性格契合分 0..=15
    pub personality: u8,
    /// 意愿修正 -20..=20
    pub willingness_modifier: i32,
    /// 信任修正 -15..=10
    pub trust_modifier: i32,
    /// 紧迫度 0..=10
    pub urgency: u8,
}

impl PersuasionBreakdown {
    /// 各项之和 (百分点)
    pub fn total_points(&self) -> i32 {
        self.logic as i32
            + self.personality as i32
            + self.willingness_modifier
            + self.trust_modifier
            + self.urgency as i32
    }
}

/// 说服尝试 (无论成败都会留档)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersuasionAttempt {
    pub id: Uuid,
    pub game_id: GameId,
    pub command_id: CommandId,
    pub entity_id: EntityId,
    pub issuer: PlayerId,
    pub justification: String,
    pub is_voice: bool,
    pub succeeded: bool,
    pub probability: f64,
    pub breakdown: PersuasionBreakdown,
    pub narrative: String,
    pub source: VerdictSource,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_source_serialization() {
        let json = serde_json::to_value(VerdictSource::Fallback(DegradedReason::Timeout)).unwrap();
        assert_eq!(json["source"], "fallback");
        assert_eq!(json["reason"], "timeout");
        let json = serde_json::to_value(VerdictSource::Live).unwrap();
        assert_eq!(json["source"], "live");
    }

    #[test]
    fn test_breakdown_points() {
        let breakdown = PersuasionBreakdown {
            logic: 20,
            personality: 10,
            willingness_modifier: -5,
            trust_modifier: 0,
            urgency: 5,
        };
        assert_eq!(breakdown.total_points(), 30);
    }

    #[test]
    fn test_refused_is_not_terminal() {
        assert!(!ResolutionOutcome::Refused.is_terminal());
        assert!(ResolutionOutcome::Applied.is_terminal());
        assert!(ResolutionOutcome::Terminated.is_terminal());
    }
}
