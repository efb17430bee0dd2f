//! 裁决请求 (封闭的带标签变体)

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use mt_core::board::{BoardHandle, RiskAssessment};
use mt_core::entity::{Entity, EntityKind, Side};
use mt_core::game::{Difficulty, RiskTolerance};
use mt_core::square::Square;

/// 请求类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Obedience,
    Persuasion,
    /// 走子后的点评
    Analysis,
    /// 对手国王的嘲讽
    Taunt,
}

impl RequestKind {
    pub const ALL: [RequestKind; 4] = [
        RequestKind::Obedience,
        RequestKind::Persuasion,
        RequestKind::Analysis,
        RequestKind::Taunt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Obedience => "obedience",
            RequestKind::Persuasion => "persuasion",
            RequestKind::Analysis => "analysis",
            RequestKind::Taunt => "taunt",
        }
    }

    pub fn is_taunt(&self) -> bool {
        matches!(self, RequestKind::Taunt)
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 实体的性格与意愿快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaSnapshot {
    pub kind: EntityKind,
    pub archetype: String,
    pub traits: Vec<String>,
    pub tone: String,
    pub willingness: u8,
}

impl From<&Entity> for PersonaSnapshot {
    fn from(entity: &Entity) -> Self {
        Self {
            kind: entity.effective_kind(),
            archetype: entity.personality.archetype.clone(),
            traits: entity.personality.traits.clone(),
            tone: entity.personality.tone.clone(),
            willingness: entity.willingness.value(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObedienceContext {
    pub board: BoardHandle,
    pub persona: PersonaSnapshot,
    pub from: Square,
    pub to: Square,
    pub base_rate: f64,
    pub risk: RiskAssessment,
    pub note: Option<String>,
    pub difficulty: Difficulty,
    pub risk_tolerance: RiskTolerance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersuasionContext {
    pub board: BoardHandle,
    pub persona: PersonaSnapshot,
    pub from: Square,
    pub to: Square,
    pub is_risky: bool,
    pub argument: String,
    pub is_voice: bool,
    /// 局面校验器给出的论据准确度 [0, 1]
    pub claim_accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisContext {
    /// 走子后的局面
    pub board: BoardHandle,
    pub mover: EntityKind,
    pub side: Side,
    pub from: Square,
    pub to: Square,
    pub captured: Option<EntityKind>,
    pub is_risky: bool,
    /// 走子后对方被将军
    pub gives_check: bool,
    /// 子力差 (走子方为正)
    pub material_balance: i32,
    pub ply: u32,
}

/// 嘲讽触发类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TauntTrigger {
    PieceCaptured,
    Blunder,
    Check,
    Winning,
    Losing,
    GreatMove,
    GameStart,
    OpponentResigned,
}

impl TauntTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            TauntTrigger::PieceCaptured => "piece_captured",
            TauntTrigger::Blunder => "blunder",
            TauntTrigger::Check => "check",
            TauntTrigger::Winning => "winning",
            TauntTrigger::Losing => "losing",
            TauntTrigger::GreatMove => "great_move",
            TauntTrigger::GameStart => "game_start",
            TauntTrigger::OpponentResigned => "opponent_resigned",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TauntContext {
    pub board: BoardHandle,
    pub trigger: TauntTrigger,
    /// 嘲讽方
    pub taunter: Side,
    /// 子力差 (嘲讽方为正)
    pub material_balance: i32,
    /// 相关棋子 (如被吃掉的棋子)
    pub piece: Option<EntityKind>,
    pub ply: u32,
}

/// 裁决请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "context", rename_all = "snake_case")]
pub enum JudgmentRequest {
    Obedience(ObedienceContext),
    Persuasion(PersuasionContext),
    Analysis(AnalysisContext),
    Taunt(TauntContext),
}

impl JudgmentRequest {
    pub fn kind(&self) -> RequestKind {
        match self {
            JudgmentRequest::Obedience(_) => RequestKind::Obedience,
            JudgmentRequest::Persuasion(_) => RequestKind::Persuasion,
            JudgmentRequest::Analysis(_) => RequestKind::Analysis,
            JudgmentRequest::Taunt(_) => RequestKind::Taunt,
        }
    }

    pub fn board(&self) -> &BoardHandle {
        match self {
            JudgmentRequest::Obedience(ctx) => &ctx.board,
            JudgmentRequest::Persuasion(ctx) => &ctx.board,
            JudgmentRequest::Analysis(ctx) => &ctx.board,
            JudgmentRequest::Taunt(ctx) => &ctx.board,
        }
    }

    /// 上下文的规范化 JSON (对象键有序)
    pub fn canonical_context(&self) -> String {
        let value = match self {
            JudgmentRequest::Obedience(ctx) => serde_json::to_value(ctx),
            JudgmentRequest::Persuasion(ctx) => serde_json::to_value(ctx),
            JudgmentRequest::Analysis(ctx) => serde_json::to_value(ctx),
            JudgmentRequest::Taunt(ctx) => serde_json::to_value(ctx),
        };
        value.map(|v| v.to_string()).unwrap_or_default()
    }

    /// 请求指纹: SHA-256(局面哈希, 请求类型, 规范化上下文)
    pub fn fingerprint(&self) -> String {
        let board_hash = Sha256::digest(self.board().as_str().as_bytes());

        let mut hasher = Sha256::new();
        hasher.update(board_hash);
        hasher.update(self.kind().as_str().as_bytes());
        hasher.update(self.canonical_context().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn persona(kind: EntityKind, willingness: u8) -> PersonaSnapshot {
        let personality = mt_core::entity::Personality::default_for(kind);
        PersonaSnapshot {
            kind,
            archetype: personality.archetype,
            traits: personality.traits,
            tone: personality.tone,
            willingness,
        }
    }

    pub fn obedience(willingness: u8, is_risky: bool) -> ObedienceContext {
        ObedienceContext {
            board: BoardHandle::new("white|0|e2=wP"),
            persona: persona(EntityKind::Pawn, willingness),
            from: "e2".parse().unwrap(),
            to: "e4".parse().unwrap(),
            base_rate: mt_core::Willingness::clamped(willingness as i32).base_rate(),
            risk: RiskAssessment {
                is_risky,
                ..Default::default()
            },
            note: None,
            difficulty: Difficulty::Medium,
            risk_tolerance: RiskTolerance::Standard,
        }
    }

    pub fn persuasion(argument: &str, accuracy: f64, is_risky: bool) -> PersuasionContext {
        PersuasionContext {
            board: BoardHandle::new("white|0|e2=wP"),
            persona: persona(EntityKind::Bishop, 30),
            from: "c1".parse().unwrap(),
            to: "h6".parse().unwrap(),
            is_risky,
            argument: argument.to_string(),
            is_voice: false,
            claim_accuracy: accuracy,
        }
    }

    pub fn taunt(trigger: TauntTrigger, material_balance: i32) -> TauntContext {
        TauntContext {
            board: BoardHandle::new("black|5|e8=bK"),
            trigger,
            taunter: Side::Black,
            material_balance,
            piece: Some(EntityKind::Knight),
            ply: 5,
        }
    }
}
