//! 说服评分规则 (兜底路径)

use mt_core::entity::EntityKind;

use crate::request::PersonaSnapshot;

/// 承认风险的词
pub const RISK_WORDS: &[&str] = &["risky", "dangerous", "sacrifice", "trade"];

const RECRUIT: &[&str] = &[
    "team",
    "together",
    "duty",
    "advance",
    "promotion",
    "sacrifice",
    "greater good",
];
const MAVERICK: &[&str] = &[
    "glory", "brave", "heroic", "charge", "honor", "adventure", "flashy",
];
const STRATEGIST: &[&str] = &[
    "logic",
    "tactic",
    "strategy",
    "position",
    "calculated",
    "reason",
    "smart",
];
const SOLDIER: &[&str] = &[
    "duty",
    "order",
    "discipline",
    "defend",
    "hold",
    "strong",
    "fortress",
];
const DIVA: &[&str] = &[
    "power",
    "protect",
    "important",
    "safe",
    "value",
    "worth",
    "deserve",
];
const SOVEREIGN: &[&str] = &["survive", "protect", "safety", "castle", "kingdom", "careful"];

/// 按原型标签选择关键词表，未知原型回落到兵种默认表
pub fn archetype_keywords(archetype: &str, kind: EntityKind) -> &'static [&'static str] {
    let label = archetype.to_lowercase();
    if label.contains("recruit") {
        RECRUIT
    } else if label.contains("maverick") {
        MAVERICK
    } else if label.contains("strategist") {
        STRATEGIST
    } else if label.contains("soldier") {
        SOLDIER
    } else if label.contains("diva") {
        DIVA
    } else if label.contains("leader") || label.contains("sovereign") || label.contains("king") {
        SOVEREIGN
    } else {
        match kind {
            EntityKind::Pawn => RECRUIT,
            EntityKind::Knight => MAVERICK,
            EntityKind::Bishop => STRATEGIST,
            EntityKind::Rook => SOLDIER,
            EntityKind::Queen => DIVA,
            EntityKind::King => SOVEREIGN,
        }
    }
}

/// 逻辑分 0..=25
pub fn logic_score(argument: &str, claim_accuracy: f64, is_risky: bool) -> i32 {
    let mut score = 5;

    if claim_accuracy >= 0.5 {
        score += 10;
    } else {
        score -= 5;
    }

    let words = argument.split_whitespace().count();
    if words >= 10 {
        score += 5;
    } else if words >= 5 {
        score += 3;
    }

    let lowered = argument.to_lowercase();
    if is_risky && RISK_WORDS.iter().any(|w| lowered.contains(w)) {
        score += 5;
    }

    score.clamp(0, 25)
}

/// 性格契合分 0..=15，按命中的不同关键词数计分
pub fn personality_score(argument: &str, persona: &PersonaSnapshot) -> i32 {
    let lowered = argument.to_lowercase();
    let mut keywords: Vec<String> = archetype_keywords(&persona.archetype, persona.kind)
        .iter()
        .map(|k| k.to_string())
        .collect();
    for t in &persona.traits {
        let t = t.to_lowercase();
        if !t.is_empty() && !keywords.contains(&t) {
            keywords.push(t);
        }
    }

    let hits = keywords
        .iter()
        .filter(|k| lowered.contains(k.as_str()))
        .count();
    match hits {
        0 => 2,
        1 => 7,
        2 => 10,
        _ => 15,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::fixtures::persona;

    #[test]
    fn test_logic_score_components() {
        // 准确、较长、承认风险
        let argument = "This is risky but the trade wins their queen in two moves, trust me";
        assert_eq!(logic_score(argument, 0.9, true), 25);
        // 不准确、很短
        assert_eq!(logic_score("go", 0.1, false), 0);
        // 准确、五个词、不承认风险
        assert_eq!(logic_score("it is safe over there", 0.8, true), 18);
    }

    #[test]
    fn test_personality_rubric() {
        let bishop = persona(EntityKind::Bishop, 50);
        assert_eq!(personality_score("just do it", &bishop), 2);
        assert_eq!(personality_score("it is the logical choice", &bishop), 7);
        assert_eq!(
            personality_score("a calculated strategy with sound logic", &bishop),
            15
        );
    }

    #[test]
    fn test_traits_count_as_keywords() {
        let pawn = persona(EntityKind::Pawn, 50);
        // "loyal" 是默认特质，"team" 是原型关键词
        assert_eq!(personality_score("a loyal member of the team", &pawn), 10);
    }

    #[test]
    fn test_unknown_archetype_uses_kind_defaults() {
        assert_eq!(archetype_keywords("Grumpy Veteran", EntityKind::Rook), SOLDIER);
        assert_eq!(archetype_keywords("Nervous Leader", EntityKind::Pawn), SOVEREIGN);
    }
}
