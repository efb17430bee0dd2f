//! 裁决结果 (与请求类型一一对应的变体)

use serde::{Deserialize, Serialize};

use mt_core::record::VerdictSource;

use crate::error::{JudgmentError, Result};
use crate::fallback;
use crate::request::{
    AnalysisContext, ObedienceContext, PersuasionContext, RequestKind, TauntContext,
};

/// 服从裁决
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObedienceVerdict {
    pub will_obey: bool,
    pub narrative: String,
    /// 建议的意愿增量 -15..=15
    #[serde(default)]
    pub willingness_delta: i32,
}

/// 说服评分
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersuasionVerdict {
    /// 逻辑分 0..=25
    pub logic: i32,
    /// 性格契合分 0..=15
    pub personality: i32,
    /// 被说服时的回应
    pub narrative: String,
    /// 未被说服时的回应
    #[serde(default)]
    pub rebuttal: Option<String>,
}

/// 走子点评
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisVerdict {
    /// 走子质量 1..=10
    pub quality: i32,
    pub commentary: String,
}

impl AnalysisVerdict {
    pub fn is_blunder(&self) -> bool {
        self.quality <= 3
    }
}

/// 嘲讽
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TauntVerdict {
    pub text: String,
    /// 强度 1..=5
    pub intensity: i32,
}

/// 裁决
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Verdict {
    Obedience(ObedienceVerdict),
    Persuasion(PersuasionVerdict),
    Analysis(AnalysisVerdict),
    Taunt(TauntVerdict),
}

impl Verdict {
    pub fn kind(&self) -> RequestKind {
        match self {
            Verdict::Obedience(_) => RequestKind::Obedience,
            Verdict::Persuasion(_) => RequestKind::Persuasion,
            Verdict::Analysis(_) => RequestKind::Analysis,
            Verdict::Taunt(_) => RequestKind::Taunt,
        }
    }

    fn text(&self) -> &str {
        match self {
            Verdict::Obedience(v) => &v.narrative,
            Verdict::Persuasion(v) => &v.narrative,
            Verdict::Analysis(v) => &v.commentary,
            Verdict::Taunt(v) => &v.text,
        }
    }

    /// 把数值分数截断到文档规定的范围
    pub fn sanitize(self) -> Self {
        match self {
            Verdict::Obedience(mut v) => {
                v.willingness_delta = v.willingness_delta.clamp(-15, 15);
                Verdict::Obedience(v)
            }
            Verdict::Persuasion(mut v) => {
                v.logic = v.logic.clamp(0, 25);
                v.personality = v.personality.clamp(0, 15);
                Verdict::Persuasion(v)
            }
            Verdict::Analysis(mut v) => {
                v.quality = v.quality.clamp(1, 10);
                Verdict::Analysis(v)
            }
            Verdict::Taunt(mut v) => {
                v.intensity = v.intensity.clamp(1, 5);
                Verdict::Taunt(v)
            }
        }
    }

    /// 校验实时裁决：变体必须与请求类型一致，文本不能为空
    pub fn validated_for(self, kind: RequestKind) -> Result<Self> {
        if self.kind() != kind {
            return Err(JudgmentError::InvalidResponse(format!(
                "expected {kind} verdict, got {}",
                self.kind()
            )));
        }
        if self.text().trim().is_empty() {
            return Err(JudgmentError::InvalidResponse(format!(
                "{kind} verdict has empty text"
            )));
        }
        Ok(self.sanitize())
    }
}

/// 带来源的裁决
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Judgment {
    pub verdict: Verdict,
    pub source: VerdictSource,
}

impl Judgment {
    pub fn new(verdict: Verdict, source: VerdictSource) -> Self {
        Self { verdict, source }
    }

    // 网关保证变体与请求一致；不一致时仍以兜底裁决补位。

    pub fn into_obedience(self, ctx: &ObedienceContext) -> (ObedienceVerdict, VerdictSource) {
        match self.verdict {
            Verdict::Obedience(v) => (v, self.source),
            _ => (fallback::obedience(ctx), self.source),
        }
    }

    pub fn into_persuasion(self, ctx: &PersuasionContext) -> (PersuasionVerdict, VerdictSource) {
        match self.verdict {
            Verdict::Persuasion(v) => (v, self.source),
            _ => (fallback::persuasion(ctx), self.source),
        }
    }

    pub fn into_analysis(self, ctx: &AnalysisContext) -> (AnalysisVerdict, VerdictSource) {
        match self.verdict {
            Verdict::Analysis(v) => (v, self.source),
            _ => (fallback::analysis(ctx), self.source),
        }
    }

    pub fn into_taunt(self, ctx: &TauntContext) -> (TauntVerdict, VerdictSource) {
        match self.verdict {
            Verdict::Taunt(v) => (v, self.source),
            _ => (fallback::taunt(ctx), self.source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatched_variant_is_invalid() {
        let verdict = Verdict::Taunt(TauntVerdict {
            text: "Run!".into(),
            intensity: 3,
        });
        assert!(matches!(
            verdict.validated_for(RequestKind::Obedience),
            Err(JudgmentError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_empty_text_is_invalid() {
        let verdict = Verdict::Obedience(ObedienceVerdict {
            will_obey: true,
            narrative: "   ".into(),
            willingness_delta: 3,
        });
        assert!(verdict.validated_for(RequestKind::Obedience).is_err());
    }

    #[test]
    fn test_scores_are_clamped() {
        let verdict = Verdict::Persuasion(PersuasionVerdict {
            logic: 40,
            personality: -3,
            narrative: "Fine.".into(),
            rebuttal: None,
        })
        .validated_for(RequestKind::Persuasion)
        .unwrap();
        assert_eq!(
            verdict,
            Verdict::Persuasion(PersuasionVerdict {
                logic: 25,
                personality: 0,
                narrative: "Fine.".into(),
                rebuttal: None,
            })
        );
    }

    #[test]
    fn test_verdict_wire_format() {
        let json = serde_json::json!({
            "kind": "obedience",
            "will_obey": false,
            "narrative": "No way!",
            "willingness_delta": -2
        });
        let verdict: Verdict = serde_json::from_value(json).unwrap();
        assert_eq!(verdict.kind(), RequestKind::Obedience);
    }
}
