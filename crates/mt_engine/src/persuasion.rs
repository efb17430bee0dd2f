//! 说服仲裁
//!
//! ```text
//! probability = base_rate(willingness)
//!     + (logic + personality + willingness_mod + trust_mod + urgency) / 100
//! ```
//!
//! 截断到 [0, 1]，`probability >= threshold` 即说服成功。

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use mt_core::board::BoardSituation;
use mt_core::entity::{Side, Willingness};
use mt_core::game::TrustHistory;
use mt_core::record::{PersuasionBreakdown, VerdictSource};
use mt_judgment::templates::{self, pick};
use mt_judgment::{BudgetScope, Judge, JudgmentRequest, PersuasionContext};

/// 紧迫度上限
pub const MAX_URGENCY: u8 = 10;
/// 超过该半回合数后视为残局
pub const LATE_GAME_PLY: u32 = 40;

/// 成功阈值的取法
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum ThresholdPolicy {
    Fixed(f64),
    /// 由种子与尝试指纹哈希得出，可复现
    Seeded(u64),
    #[default]
    Random,
}

impl ThresholdPolicy {
    pub fn threshold(&self, fingerprint: &str) -> f64 {
        match self {
            ThresholdPolicy::Fixed(t) => t.clamp(0.0, 1.0),
            ThresholdPolicy::Seeded(seed) => {
                let mut hasher = Sha256::new();
                hasher.update(seed.to_be_bytes());
                hasher.update(fingerprint.as_bytes());
                let digest = hasher.finalize();
                let mut head = [0u8; 8];
                head.copy_from_slice(&digest[..8]);
                u64::from_be_bytes(head) as f64 / u64::MAX as f64
            }
            ThresholdPolicy::Random => rand::random::<f64>(),
        }
    }
}

pub fn willingness_modifier(willingness: u8) -> i32 {
    match willingness {
        80.. => 20,
        60..=79 => 10,
        40..=59 => 0,
        20..=39 => -10,
        _ => -20,
    }
}

pub fn trust_modifier(trust: &TrustHistory) -> i32 {
    let ratio = trust.ratio();
    if ratio >= 0.8 {
        10
    } else if ratio >= 0.6 {
        5
    } else if ratio >= 0.4 {
        0
    } else if ratio >= 0.2 {
        -8
    } else {
        -15
    }
}

/// 行动方视角的紧迫度
pub fn urgency(situation: &BoardSituation, acting: Side, ply: u32) -> u8 {
    let mut urgency = 0u8;
    if situation.in_check {
        urgency += 5;
    }
    let balance = match acting {
        Side::White => situation.material_balance,
        Side::Black => -situation.material_balance,
    };
    if balance < -3 {
        urgency += 3;
    } else if balance < 0 {
        urgency += 1;
    }
    if ply > LATE_GAME_PLY {
        urgency += 2;
    }
    urgency.min(MAX_URGENCY)
}

pub fn probability(base_rate: f64, breakdown: &PersuasionBreakdown) -> f64 {
    (base_rate + breakdown.total_points() as f64 / 100.0).clamp(0.0, 1.0)
}

/// 仲裁时的局面输入
#[derive(Debug, Clone, Copy)]
pub struct ArbiterInputs<'a> {
    pub trust: &'a TrustHistory,
    pub situation: &'a BoardSituation,
    pub acting: Side,
    pub ply: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersuasionOutcome {
    pub succeeded: bool,
    pub probability: f64,
    pub threshold: f64,
    pub breakdown: PersuasionBreakdown,
    pub narrative: String,
    pub source: VerdictSource,
}

pub struct PersuasionArbiter {
    judge: Arc<dyn Judge>,
    policy: ThresholdPolicy,
}

impl PersuasionArbiter {
    pub fn new(judge: Arc<dyn Judge>, policy: ThresholdPolicy) -> Self {
        Self { judge, policy }
    }

    pub fn policy(&self) -> ThresholdPolicy {
        self.policy
    }

    pub async fn evaluate(
        &self,
        ctx: PersuasionContext,
        scope: BudgetScope,
        inputs: ArbiterInputs<'_>,
    ) -> PersuasionOutcome {
        let request = JudgmentRequest::Persuasion(ctx.clone());
        let fingerprint = request.fingerprint();
        let (verdict, source) = self.judge.judge(&request, scope).await.into_persuasion(&ctx);

        let willingness = ctx.persona.willingness;
        let breakdown = PersuasionBreakdown {
            logic: verdict.logic.clamp(0, 25) as u8,
            personality: verdict.personality.clamp(0, 15) as u8,
            willingness_modifier: willingness_modifier(willingness),
            trust_modifier: trust_modifier(inputs.trust),
            urgency: urgency(inputs.situation, inputs.acting, inputs.ply),
        };
        let base_rate = Willingness::clamped(willingness as i32).base_rate();
        let probability = probability(base_rate, &breakdown);
        let threshold = self.policy.threshold(&fingerprint);
        let succeeded = probability >= threshold;

        let narrative = if succeeded {
            verdict.narrative
        } else {
            verdict.rebuttal.unwrap_or_else(|| {
                let lines = templates::voice_lines(ctx.persona.kind);
                pick(lines.refuse, &fingerprint).to_string()
            })
        };

        tracing::debug!(
            game_id = %scope.game_id,
            probability,
            threshold,
            succeeded,
            "Persuasion evaluated"
        );

        PersuasionOutcome {
            succeeded,
            probability,
            threshold,
            breakdown,
            narrative,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use mt_core::board::BoardHandle;
    use mt_core::entity::EntityKind;
    use mt_core::ids::GameId;
    use mt_judgment::{Judgment, PersonaSnapshot, PersuasionVerdict, Verdict};
    use proptest::prelude::*;

    use super::*;

    struct FixedScores {
        logic: i32,
        personality: i32,
    }

    #[async_trait]
    impl Judge for FixedScores {
        async fn judge(&self, _request: &JudgmentRequest, _scope: BudgetScope) -> Judgment {
            Judgment::new(
                Verdict::Persuasion(PersuasionVerdict {
                    logic: self.logic,
                    personality: self.personality,
                    narrative: "Fine, I'll go.".into(),
                    rebuttal: Some("Not a chance.".into()),
                }),
                VerdictSource::Live,
            )
        }
    }

    fn ctx(willingness: u8) -> PersuasionContext {
        PersuasionContext {
            board: BoardHandle::new("w|12|c1=wB"),
            persona: PersonaSnapshot {
                kind: EntityKind::Bishop,
                archetype: "Strategist".into(),
                traits: vec![],
                tone: "Measured".into(),
                willingness,
            },
            from: "c1".parse().unwrap(),
            to: "h6".parse().unwrap(),
            is_risky: true,
            argument: "The diagonal is open and the rook is pinned".into(),
            is_voice: false,
            claim_accuracy: 0.9,
        }
    }

    #[test]
    fn test_breakdown_sums_to_fifty_five_percent() {
        let breakdown = PersuasionBreakdown {
            logic: 20,
            personality: 10,
            willingness_modifier: -5,
            trust_modifier: 0,
            urgency: 5,
        };
        let p = probability(0.25, &breakdown);
        assert!((p - 0.55).abs() < 1e-9);
    }

    #[test]
    fn test_modifier_tables() {
        assert_eq!(willingness_modifier(85), 20);
        assert_eq!(willingness_modifier(30), -10);
        assert_eq!(willingness_modifier(5), -20);
        assert_eq!(trust_modifier(&TrustHistory::default()), 0);
        assert_eq!(trust_modifier(&TrustHistory { kept: 4, broken: 1 }), 10);
        assert_eq!(trust_modifier(&TrustHistory { kept: 0, broken: 3 }), -15);
    }

    #[test]
    fn test_urgency_from_acting_side() {
        let situation = BoardSituation {
            in_check: true,
            material_balance: 5,
            outcome: None,
        };
        assert_eq!(urgency(&situation, Side::Black, 50), 10);
        assert_eq!(urgency(&situation, Side::White, 10), 5);
    }

    #[test]
    fn test_seeded_threshold_is_reproducible() {
        let policy = ThresholdPolicy::Seeded(7);
        let a = policy.threshold("abc");
        assert_eq!(a, policy.threshold("abc"));
        assert!((0.0..=1.0).contains(&a));
        assert_eq!(ThresholdPolicy::Fixed(1.7).threshold("abc"), 1.0);
    }

    #[tokio::test]
    async fn test_probability_breakdown_and_outcome() {
        // w=30 -> base 0.25, modifier -10; trust 0; not in check
        let arbiter = PersuasionArbiter::new(
            Arc::new(FixedScores {
                logic: 20,
                personality: 10,
            }),
            ThresholdPolicy::Fixed(0.5),
        );
        let situation = BoardSituation::default();
        let trust = TrustHistory::default();
        let inputs = ArbiterInputs {
            trust: &trust,
            situation: &situation,
            acting: Side::White,
            ply: 12,
        };

        let outcome = arbiter
            .evaluate(ctx(30), BudgetScope::new(GameId::new(), 12), inputs)
            .await;
        assert!((outcome.probability - 0.45).abs() < 1e-9);
        assert!(!outcome.succeeded);
        assert_eq!(outcome.narrative, "Not a chance.");

        let outcome = arbiter
            .evaluate(ctx(60), BudgetScope::new(GameId::new(), 12), inputs)
            .await;
        assert!(outcome.succeeded);
        assert_eq!(outcome.narrative, "Fine, I'll go.");
    }

    fn breakdown_for(logic: u8, willingness: u8) -> PersuasionBreakdown {
        PersuasionBreakdown {
            logic,
            personality: 7,
            willingness_modifier: willingness_modifier(willingness),
            trust_modifier: 0,
            urgency: 0,
        }
    }

    proptest! {
        #[test]
        fn prop_probability_monotone_in_logic(a in 0u8..=25, b in 0u8..=25, w in 0u8..=100) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let base = Willingness::clamped(w as i32).base_rate();
            prop_assert!(probability(base, &breakdown_for(lo, w)) <= probability(base, &breakdown_for(hi, w)));
        }

        #[test]
        fn prop_probability_monotone_in_willingness(a in 0u8..=100, b in 0u8..=100, logic in 0u8..=25) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let p = |w: u8| probability(Willingness::clamped(w as i32).base_rate(), &breakdown_for(logic, w));
            prop_assert!(p(lo) <= p(hi));
            prop_assert!((0.0..=1.0).contains(&p(hi)));
        }
    }
}
