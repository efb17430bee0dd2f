//! 确定性兜底裁决
//!
//! 全部是纯函数：不做 I/O，不用随机数，模板由输入哈希选出。

use crate::request::{
    AnalysisContext, JudgmentRequest, ObedienceContext, PersuasionContext, TauntContext,
    TauntTrigger,
};
use crate::rubric;
use crate::templates::{self, pick};
use crate::verdict::{AnalysisVerdict, ObedienceVerdict, PersuasionVerdict, TauntVerdict, Verdict};

/// 兜底服从：w >= 90，或 w >= 40 且走子无风险
pub fn obedience(ctx: &ObedienceContext) -> ObedienceVerdict {
    let w = ctx.persona.willingness;
    let will_obey = w >= 90 || (w >= 40 && !ctx.risk.is_risky);
    let lines = templates::voice_lines(ctx.persona.kind);
    let seed = format!("{}|{}|{}|{}", ctx.board, ctx.from, ctx.to, w);

    let (narrative, willingness_delta) = if will_obey {
        let pool = if w >= 70 { lines.high_spirits } else { lines.accept };
        (pick(pool, &seed), 5)
    } else {
        let pool = if w <= 30 { lines.low_spirits } else { lines.refuse };
        (pick(pool, &seed), -2)
    };

    ObedienceVerdict {
        will_obey,
        narrative: narrative.to_string(),
        willingness_delta,
    }
}

pub fn persuasion(ctx: &PersuasionContext) -> PersuasionVerdict {
    let lines = templates::voice_lines(ctx.persona.kind);
    let seed = format!("{}|{}|{}|{}", ctx.board, ctx.from, ctx.to, ctx.argument);

    PersuasionVerdict {
        logic: rubric::logic_score(&ctx.argument, ctx.claim_accuracy, ctx.is_risky),
        personality: rubric::personality_score(&ctx.argument, &ctx.persona),
        narrative: pick(lines.persuaded, &seed).to_string(),
        rebuttal: Some(pick(lines.refuse, &seed).to_string()),
    }
}

pub fn analysis(ctx: &AnalysisContext) -> AnalysisVerdict {
    let mut quality = 6;
    if ctx.captured.is_some() {
        quality += 2;
    } else if ctx.is_risky {
        quality -= 3;
    }
    if ctx.gives_check {
        quality += 1;
    }

    let pool = if ctx.captured.is_some() {
        templates::ANALYSIS_CAPTURE
    } else if ctx.is_risky {
        templates::ANALYSIS_RISKY
    } else {
        templates::ANALYSIS
    };
    let seed = format!("{}|{}|{}|{}", ctx.board, ctx.from, ctx.to, ctx.ply);

    AnalysisVerdict {
        quality: quality.clamp(1, 10),
        commentary: format!("{} ({}-{})", pick(pool, &seed), ctx.from, ctx.to),
    }
}

/// 嘲讽强度 1..=5
pub fn taunt_intensity(trigger: TauntTrigger, material_balance: i32) -> i32 {
    let mut intensity = match trigger {
        TauntTrigger::Check | TauntTrigger::Blunder => 4,
        TauntTrigger::PieceCaptured => 3,
        TauntTrigger::GreatMove => 1,
        _ => 2,
    };
    if material_balance > 5 {
        intensity = (intensity + 1).min(5);
    }
    intensity
}

pub fn taunt(ctx: &TauntContext) -> TauntVerdict {
    let seed = format!("{}|{}|{}", ctx.board, ctx.trigger.as_str(), ctx.ply);
    let piece = ctx
        .piece
        .map(|kind| {
            let name = kind.as_str();
            let mut chars = name.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .unwrap_or_else(|| "piece".to_string());

    TauntVerdict {
        text: pick(templates::taunts(ctx.trigger), &seed).replace("{piece}", &piece),
        intensity: taunt_intensity(ctx.trigger, ctx.material_balance),
    }
}

/// 任一请求的兜底裁决
pub fn for_request(request: &JudgmentRequest) -> Verdict {
    match request {
        JudgmentRequest::Obedience(ctx) => Verdict::Obedience(obedience(ctx)),
        JudgmentRequest::Persuasion(ctx) => Verdict::Persuasion(persuasion(ctx)),
        JudgmentRequest::Analysis(ctx) => Verdict::Analysis(analysis(ctx)),
        JudgmentRequest::Taunt(ctx) => Verdict::Taunt(taunt(ctx)),
    }
}
