//! 走子点评与对手嘲讽
//!
//! 两类裁决都不在决议关键路径上：决议完成后派生任务并发请求，
//! 结果回投到对局邮箱再写入发件箱。

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use mt_core::board::{BoardHandle, BoardSituation, RiskAssessment};
use mt_core::entity::{EntityKind, Side};
use mt_core::ids::{CommandId, EntityId, GameId};
use mt_core::record::VerdictSource;
use mt_core::square::Square;
use mt_judgment::{
    AnalysisContext, AnalysisVerdict, BudgetScope, Judge, JudgmentRequest, TauntContext,
    TauntTrigger, TauntVerdict,
};

/// 触发 `clever-tactic` 的最低走子质量
pub const CLEVER_TACTIC_QUALITY: i32 = 8;
/// 判定为领先的子力差
pub const WINNING_MARGIN: i32 = 3;

/// 一次已生效走子的描述
#[derive(Debug, Clone)]
pub struct AppliedMove {
    pub board: BoardHandle,
    pub mover: EntityKind,
    pub side: Side,
    pub from: Square,
    pub to: Square,
    pub ply: u32,
}

/// 待派生的场外裁决
#[derive(Debug, Clone)]
pub struct Followup {
    pub game_id: GameId,
    pub command_id: CommandId,
    pub entity_id: EntityId,
    pub scope: BudgetScope,
    pub analysis: Option<AnalysisContext>,
    pub taunt: Option<TauntContext>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commentary {
    pub command_id: CommandId,
    pub entity_id: EntityId,
    pub quality: i32,
    pub text: String,
    pub source: VerdictSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Taunt {
    pub command_id: Option<CommandId>,
    pub trigger: TauntTrigger,
    pub taunter: Side,
    pub text: String,
    pub intensity: i32,
    pub source: VerdictSource,
}

/// 场外裁决结果
#[derive(Debug, Clone)]
pub struct FollowupResult {
    pub game_id: GameId,
    pub command_id: CommandId,
    pub entity_id: EntityId,
    pub scope: BudgetScope,
    pub commentary: Option<Commentary>,
    pub taunt: Option<Taunt>,
}

impl FollowupResult {
    /// 点评质量足够高时为走子方记一次 clever-tactic
    pub fn is_clever(&self) -> bool {
        self.commentary
            .as_ref()
            .map_or(false, |c| c.quality >= CLEVER_TACTIC_QUALITY)
    }
}

fn balance_for(situation: &BoardSituation, side: Side) -> i32 {
    match side {
        Side::White => situation.material_balance,
        Side::Black => -situation.material_balance,
    }
}

/// 选择嘲讽触发器：将军 > 吃子 > 冒进 > 大优
pub fn choose_taunt(
    mv: &AppliedMove,
    risk: &RiskAssessment,
    situation: &BoardSituation,
) -> Option<TauntContext> {
    let mover_balance = balance_for(situation, mv.side);
    let (trigger, taunter, piece) = if situation.in_check {
        (TauntTrigger::Check, mv.side, None)
    } else if let Some(captured) = risk.captured_kind {
        (TauntTrigger::PieceCaptured, mv.side, Some(captured))
    } else if risk.is_risky {
        (TauntTrigger::Blunder, mv.side.opposite(), Some(mv.mover))
    } else if mover_balance.abs() > WINNING_MARGIN {
        let leader = if mover_balance > 0 {
            mv.side
        } else {
            mv.side.opposite()
        };
        (TauntTrigger::Winning, leader, None)
    } else {
        return None;
    };

    Some(TauntContext {
        board: mv.board.clone(),
        trigger,
        taunter,
        material_balance: balance_for(situation, taunter),
        piece,
        ply: mv.ply,
    })
}

pub fn analysis_for(
    mv: &AppliedMove,
    risk: &RiskAssessment,
    situation: &BoardSituation,
) -> AnalysisContext {
    AnalysisContext {
        board: mv.board.clone(),
        mover: mv.mover,
        side: mv.side,
        from: mv.from,
        to: mv.to,
        captured: risk.captured_kind,
        is_risky: risk.is_risky,
        gives_check: situation.in_check,
        material_balance: balance_for(situation, mv.side),
        ply: mv.ply,
    }
}

/// 开局嘲讽，由黑方发出
pub fn match_start_taunt(board: &BoardHandle) -> TauntContext {
    TauntContext {
        board: board.clone(),
        trigger: TauntTrigger::GameStart,
        taunter: Side::Black,
        material_balance: 0,
        piece: None,
        ply: 0,
    }
}

pub fn resignation_taunt(board: &BoardHandle, winner: Side, ply: u32) -> TauntContext {
    TauntContext {
        board: board.clone(),
        trigger: TauntTrigger::OpponentResigned,
        taunter: winner,
        material_balance: 0,
        piece: None,
        ply,
    }
}

pub async fn request_taunt(
    judge: &dyn Judge,
    ctx: TauntContext,
    scope: BudgetScope,
    command_id: Option<CommandId>,
) -> Taunt {
    let (TauntVerdict { text, intensity }, source) = judge
        .judge(&JudgmentRequest::Taunt(ctx.clone()), scope)
        .await
        .into_taunt(&ctx);
    Taunt {
        command_id,
        trigger: ctx.trigger,
        taunter: ctx.taunter,
        text,
        intensity,
        source,
    }
}

/// 并发请求点评与嘲讽
pub async fn run_followup(judge: Arc<dyn Judge>, followup: Followup) -> FollowupResult {
    let Followup {
        game_id,
        command_id,
        entity_id,
        scope,
        analysis,
        taunt,
    } = followup;

    let commentary = async {
        let ctx = analysis?;
        let (AnalysisVerdict { quality, commentary }, source) = judge
            .judge(&JudgmentRequest::Analysis(ctx.clone()), scope)
            .await
            .into_analysis(&ctx);
        Some(Commentary {
            command_id,
            entity_id,
            quality,
            text: commentary,
            source,
        })
    };
    let taunt = async {
        match taunt {
            Some(ctx) => Some(request_taunt(judge.as_ref(), ctx, scope, Some(command_id)).await),
            None => None,
        }
    };
    let (commentary, taunt) = futures::future::join(commentary, taunt).await;

    FollowupResult {
        game_id,
        command_id,
        entity_id,
        scope,
        commentary,
        taunt,
    }
}
