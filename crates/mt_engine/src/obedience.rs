//! 服从决策服务
//!
//! 只给出裁决，不写账本。意愿增量建议由 Move Applier 在终态时提交。

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use mt_core::game::RiskTolerance;
use mt_core::record::VerdictSource;
use mt_judgment::templates::{self, pick};
use mt_judgment::{BudgetScope, Judge, JudgmentRequest, ObedienceContext};

/// 自动服从所需的最低意愿
pub const AUTO_ACCEPT_WILLINGNESS: u8 = 40;
/// 意愿增量建议上限 (绝对值)
pub const MAX_SUGGESTION: i32 = 15;
/// 自动服从时的意愿增量建议
pub const AUTO_ACCEPT_SUGGESTION: i32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObedienceDecision {
    pub will_obey: bool,
    pub narrative: String,
    pub willingness_delta_suggestion: i32,
    pub source: VerdictSource,
}

pub struct ObedienceService {
    judge: Arc<dyn Judge>,
}

impl ObedienceService {
    pub fn new(judge: Arc<dyn Judge>) -> Self {
        Self { judge }
    }

    /// 安全走子、意愿足够且非 surprise 模式时无需外部裁决
    pub fn auto_accepts(ctx: &ObedienceContext) -> bool {
        ctx.risk_tolerance == RiskTolerance::Standard
            && !ctx.risk.is_risky
            && ctx.persona.willingness >= AUTO_ACCEPT_WILLINGNESS
    }

    pub async fn decide(&self, ctx: ObedienceContext, scope: BudgetScope) -> ObedienceDecision {
        if Self::auto_accepts(&ctx) {
            let lines = templates::voice_lines(ctx.persona.kind);
            let seed = format!("{}|{}|{}", ctx.board, ctx.from, ctx.to);
            tracing::debug!(
                game_id = %scope.game_id,
                willingness = ctx.persona.willingness,
                "Safe command auto-accepted"
            );
            return ObedienceDecision {
                will_obey: true,
                narrative: pick(lines.accept, &seed).to_string(),
                willingness_delta_suggestion: AUTO_ACCEPT_SUGGESTION,
                source: VerdictSource::Rule,
            };
        }

        let (verdict, source) = self
            .judge
            .judge(&JudgmentRequest::Obedience(ctx.clone()), scope)
            .await
            .into_obedience(&ctx);
        tracing::debug!(
            game_id = %scope.game_id,
            will_obey = verdict.will_obey,
            source = ?source,
            "Obedience decided"
        );

        ObedienceDecision {
            will_obey: verdict.will_obey,
            narrative: verdict.narrative,
            willingness_delta_suggestion: verdict
                .willingness_delta
                .clamp(-MAX_SUGGESTION, MAX_SUGGESTION),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use mt_core::board::{BoardHandle, RiskAssessment};
    use mt_core::entity::{EntityKind, Willingness};
    use mt_core::game::Difficulty;
    use mt_core::ids::GameId;
    use mt_core::record::DegradedReason;
    use mt_judgment::{Judgment, JudgmentGateway, ObedienceVerdict, PersonaSnapshot, Verdict};

    use super::*;

    struct Stubborn;

    #[async_trait]
    impl Judge for Stubborn {
        async fn judge(&self, _request: &JudgmentRequest, _scope: BudgetScope) -> Judgment {
            Judgment::new(
                Verdict::Obedience(ObedienceVerdict {
                    will_obey: false,
                    narrative: "Absolutely not.".into(),
                    willingness_delta: -40,
                }),
                VerdictSource::Live,
            )
        }
    }

    fn ctx(willingness: u8, is_risky: bool, tolerance: RiskTolerance) -> ObedienceContext {
        let personality = mt_core::Personality::default_for(EntityKind::Knight);
        ObedienceContext {
            board: BoardHandle::new("w|0|g1=wN"),
            persona: PersonaSnapshot {
                kind: EntityKind::Knight,
                archetype: personality.archetype,
                traits: personality.traits,
                tone: personality.tone,
                willingness,
            },
            from: "g1".parse().unwrap(),
            to: "f3".parse().unwrap(),
            base_rate: Willingness::clamped(willingness as i32).base_rate(),
            risk: RiskAssessment {
                is_risky,
                ..Default::default()
            },
            note: None,
            difficulty: Difficulty::Medium,
            risk_tolerance: tolerance,
        }
    }

    fn scope() -> BudgetScope {
        BudgetScope::new(GameId::new(), 0)
    }

    #[tokio::test]
    async fn test_safe_command_skips_judgment() {
        let service = ObedienceService::new(Arc::new(Stubborn));
        let decision = service.decide(ctx(45, false, RiskTolerance::Standard), scope()).await;

        assert!(decision.will_obey);
        assert_eq!(decision.source, VerdictSource::Rule);
        assert_eq!(decision.willingness_delta_suggestion, 5);
    }

    #[tokio::test]
    async fn test_surprise_mode_always_asks_and_clamps() {
        let service = ObedienceService::new(Arc::new(Stubborn));
        let decision = service.decide(ctx(95, false, RiskTolerance::Surprise), scope()).await;

        assert!(!decision.will_obey);
        assert_eq!(decision.source, VerdictSource::Live);
        assert_eq!(decision.willingness_delta_suggestion, -15);
    }

    #[tokio::test]
    async fn test_risky_command_uses_fallback_without_capability() {
        let service = ObedienceService::new(Arc::new(JudgmentGateway::fallback_only()));

        let refused = service.decide(ctx(60, true, RiskTolerance::Standard), scope()).await;
        assert!(!refused.will_obey);
        assert_eq!(refused.willingness_delta_suggestion, -2);
        assert_eq!(
            refused.source,
            VerdictSource::Fallback(DegradedReason::CapabilityError)
        );

        let brave = service.decide(ctx(92, true, RiskTolerance::Standard), scope()).await;
        assert!(brave.will_obey);
        assert_eq!(brave.willingness_delta_suggestion, 5);
    }
}
