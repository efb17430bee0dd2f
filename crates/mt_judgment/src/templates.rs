//! 兜底叙事模板
//!
//! 模板选择只依赖输入哈希，保证兜底裁决是纯函数。

use sha2::{Digest, Sha256};

use mt_core::entity::EntityKind;

use crate::request::TauntTrigger;

/// 某一兵种的回应模板
pub struct VoiceLines {
    pub accept: &'static [&'static str],
    pub refuse: &'static [&'static str],
    pub high_spirits: &'static [&'static str],
    pub low_spirits: &'static [&'static str],
    pub persuaded: &'static [&'static str],
}

const PAWN: VoiceLines = VoiceLines {
    accept: &["Okay, moving!", "Yes sir!", "On my way!", "For the team!", "I'll do my best!"],
    refuse: &[
        "That's too dangerous!",
        "I don't want to go there!",
        "No way!",
        "I'll get captured!",
        "Can someone else do it?",
    ],
    high_spirits: &["Let's go! I'm feeling great!", "Unstoppable!", "To glory!"],
    low_spirits: &["Do I have to?", "Fine... whatever.", "I guess..."],
    persuaded: &["Okay... for the team. Don't forget about me!", "If you say so, I trust you!"],
};

const KNIGHT: VoiceLines = VoiceLines {
    accept: &["Let's ride!", "Easy!", "Watch this!", "A worthy challenge!", "Time to shine!"],
    refuse: &[
        "That's beneath me.",
        "Find another way.",
        "Nope.",
        "That's a waste of my talents.",
        "I don't retreat!",
    ],
    high_spirits: &["Nobody can stop me!", "Born for this!", "Watch and learn!"],
    low_spirits: &["My lance feels heavy today.", "If you insist...", "This had better work."],
    persuaded: &["Fine, but only because it'll look spectacular.", "A daring plan. I like it."],
};

const BISHOP: VoiceLines = VoiceLines {
    accept: &[
        "Strategically sound.",
        "A calculated move.",
        "I concur with this approach.",
        "The diagonal looks promising.",
        "Logical.",
    ],
    refuse: &[
        "That's tactically unsound.",
        "I need a logical reason.",
        "The risk-reward ratio is poor.",
        "I advise against this.",
        "Explain your reasoning.",
    ],
    high_spirits: &["A brilliant strategy!", "I see the whole picture!", "Masterful positioning!"],
    low_spirits: &[
        "This position is deteriorating.",
        "I question our strategy.",
        "Hmm... if you insist.",
    ],
    persuaded: &["Your reasoning holds. Proceeding.", "Very well, the logic is sound."],
};

const ROOK: VoiceLines = VoiceLines {
    accept: &["Yes, commander.", "Moving out.", "Consider it done.", "As ordered.", "Holding position."],
    refuse: &[
        "I cannot comply.",
        "That goes against protocol.",
        "Negative.",
        "Too risky, sir.",
        "I need backup first.",
    ],
    high_spirits: &["Ready for anything!", "The fortress stands!", "Reporting for duty!"],
    low_spirits: &["Morale is low...", "Running on fumes.", "Acknowledged... reluctantly."],
    persuaded: &["Understood. Orders accepted.", "Copy that. Moving out."],
};

const QUEEN: VoiceLines = VoiceLines {
    accept: &[
        "About time you asked!",
        "A queen's work is never done.",
        "Naturally.",
        "I'll handle this personally.",
        "As I intended.",
    ],
    refuse: &[
        "Absolutely not.",
        "Do you know what I'm worth?!",
        "That's a suicide mission!",
        "I refuse to be sacrificed.",
        "Find someone expendable.",
    ],
    high_spirits: &["I AM this army!", "Nobody can match me!", "Bow before my power!"],
    low_spirits: &[
        "I've been neglected...",
        "Is anyone protecting ME?",
        "I expected better leadership.",
    ],
    persuaded: &["...Fine. But you better be right about this.", "Only because I'm magnanimous."],
};

const KING: VoiceLines = VoiceLines {
    accept: &["If I must.", "For the kingdom.", "Very well.", "I'll be careful."],
    refuse: &[
        "Are you TRYING to get me killed?!",
        "TOO DANGEROUS!",
        "I'm the KING!",
        "Find another way!",
        "PROTECT ME!",
    ],
    high_spirits: &["My army is strong!", "We will prevail!", "I trust my pieces!"],
    low_spirits: &["We're doomed...", "Is it time to resign?", "PANIC!"],
    persuaded: &["...Fine. But you better be right about this.", "For the kingdom, then."],
};

pub fn voice_lines(kind: EntityKind) -> &'static VoiceLines {
    match kind {
        EntityKind::Pawn => &PAWN,
        EntityKind::Knight => &KNIGHT,
        EntityKind::Bishop => &BISHOP,
        EntityKind::Rook => &ROOK,
        EntityKind::Queen => &QUEEN,
        EntityKind::King => &KING,
    }
}

pub const ANALYSIS: &[&str] = &[
    "Decent move. Position looks stable.",
    "Careful, your pieces need better coordination.",
    "The position is roughly equal.",
    "Consider developing your remaining pieces.",
    "Good move! Centralizing pieces is always smart.",
];

pub const ANALYSIS_CAPTURE: &[&str] = &[
    "Material won. Keep the pressure on.",
    "A clean capture, the balance shifts.",
];

pub const ANALYSIS_RISKY: &[&str] = &[
    "Risky. That square is under attack.",
    "That piece is hanging now, watch out.",
];

pub fn taunts(trigger: TauntTrigger) -> &'static [&'static str] {
    match trigger {
        TauntTrigger::PieceCaptured => &[
            "Lost your {piece}? How careless.",
            "Down material already? Tsk tsk.",
            "Your {piece} won't be missed... by me.",
            "One less piece for you to worry about!",
            "That {piece} had so much potential. Had.",
        ],
        TauntTrigger::Blunder => &[
            "Did you just hang your {piece}? Wow.",
            "Even my Pawns saw that coming.",
            "Are you trying to lose? Impressive blunder.",
            "I almost feel bad. Almost.",
            "That was... a choice. A terrible one.",
        ],
        TauntTrigger::Check => &[
            "Run, little King, run!",
            "Nowhere to hide!",
            "Check! How does that feel?",
            "Your King is sweating, I can tell.",
            "Better find cover, your Majesty!",
        ],
        TauntTrigger::Winning => &[
            "This is almost too easy.",
            "Should we just call it?",
            "I can do this all day.",
            "Your army is crumbling.",
            "Resistance is futile at this point.",
        ],
        TauntTrigger::Losing => &[
            "A lucky move. This isn't over.",
            "I've come back from worse.",
            "Don't celebrate yet.",
            "Enjoy it while it lasts.",
            "One good move doesn't make you a champion.",
        ],
        TauntTrigger::GreatMove => &[
            "...I'll admit, that was decent.",
            "Lucky shot. Won't happen again.",
            "Okay, you have SOME skill.",
            "Not bad. For an amateur.",
        ],
        TauntTrigger::GameStart => &[
            "Ready to lose?",
            "Let's see what you've got.",
            "May the best player win. That's me.",
            "I've already planned your defeat.",
        ],
        TauntTrigger::OpponentResigned => &["Running away? Smart choice.", "I accept your surrender."],
    }
}

/// 按种子哈希选择一条模板
pub fn pick(lines: &'static [&'static str], seed: &str) -> &'static str {
    if lines.is_empty() {
        return "";
    }
    let digest = Sha256::digest(seed.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    let index = u64::from_be_bytes(prefix) % lines.len() as u64;
    lines[index as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_is_deterministic() {
        let a = pick(PAWN.refuse, "game-1|e2|e4");
        let b = pick(PAWN.refuse, "game-1|e2|e4");
        assert_eq!(a, b);
        assert!(PAWN.refuse.contains(&a));
    }

    #[test]
    fn test_every_kind_has_lines() {
        for kind in [
            EntityKind::Pawn,
            EntityKind::Knight,
            EntityKind::Bishop,
            EntityKind::Rook,
            EntityKind::Queen,
            EntityKind::King,
        ] {
            let lines = voice_lines(kind);
            assert!(!lines.accept.is_empty());
            assert!(!lines.refuse.is_empty());
            assert!(!lines.persuaded.is_empty());
        }
    }
}
