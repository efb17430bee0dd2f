//! 意愿事件与领域事件定义

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::EntityKind;
use crate::ids::{CommandId, EntityId, GameId};

/// 意愿事件类型 (封闭枚举)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WillingnessEventKind {
    EnemyCaptured,
    AllyLost,
    Endangered,
    Protected,
    BlunderNearby,
    IdleStreak,
    Compliment,
    Promoted,
    GoodPosition,
    CleverTactic,
    MatchStart,
    PersuasionSucceeded,
    PersuasionFailed,
    BrokenPromise,
}

impl WillingnessEventKind {
    pub const ALL: [WillingnessEventKind; 14] = [
        WillingnessEventKind::EnemyCaptured,
        WillingnessEventKind::AllyLost,
        WillingnessEventKind::Endangered,
        WillingnessEventKind::Protected,
        WillingnessEventKind::BlunderNearby,
        WillingnessEventKind::IdleStreak,
        WillingnessEventKind::Compliment,
        WillingnessEventKind::Promoted,
        WillingnessEventKind::GoodPosition,
        WillingnessEventKind::CleverTactic,
        WillingnessEventKind::MatchStart,
        WillingnessEventKind::PersuasionSucceeded,
        WillingnessEventKind::PersuasionFailed,
        WillingnessEventKind::BrokenPromise,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WillingnessEventKind::EnemyCaptured => "enemy-captured",
            WillingnessEventKind::AllyLost => "ally-lost",
            WillingnessEventKind::Endangered => "endangered",
            WillingnessEventKind::Protected => "protected",
            WillingnessEventKind::BlunderNearby => "blunder-nearby",
            WillingnessEventKind::IdleStreak => "idle-streak",
            WillingnessEventKind::Compliment => "compliment",
            WillingnessEventKind::Promoted => "promoted",
            WillingnessEventKind::GoodPosition => "good-position",
            WillingnessEventKind::CleverTactic => "clever-tactic",
            WillingnessEventKind::MatchStart => "match-start",
            WillingnessEventKind::PersuasionSucceeded => "persuasion-succeeded",
            WillingnessEventKind::PersuasionFailed => "persuasion-failed",
            WillingnessEventKind::BrokenPromise => "broken-promise",
        }
    }

    /// 可由外部观察者上报的事件；其余种类只由引擎在决议中推导
    pub fn is_observable(&self) -> bool {
        matches!(
            self,
            WillingnessEventKind::AllyLost
                | WillingnessEventKind::Endangered
                | WillingnessEventKind::Protected
                | WillingnessEventKind::BlunderNearby
                | WillingnessEventKind::Compliment
                | WillingnessEventKind::CleverTactic
        )
    }

    /// 基础意愿增量表
    pub fn base_delta(&self) -> i32 {
        match self {
            WillingnessEventKind::EnemyCaptured => 15,
            WillingnessEventKind::AllyLost => -10,
            WillingnessEventKind::Endangered => -8,
            WillingnessEventKind::Protected => 10,
            WillingnessEventKind::BlunderNearby => -5,
            WillingnessEventKind::IdleStreak => -5,
            WillingnessEventKind::Compliment => 5,
            WillingnessEventKind::Promoted => 30,
            WillingnessEventKind::GoodPosition => 5,
            WillingnessEventKind::CleverTactic => 10,
            WillingnessEventKind::MatchStart => 0,
            WillingnessEventKind::PersuasionSucceeded => 5,
            WillingnessEventKind::PersuasionFailed => -3,
            WillingnessEventKind::BrokenPromise => -15,
        }
    }

    /// 人类可读的事件描述
    pub fn describe(&self, kind: EntityKind, delta: i32, score_after: u8) -> String {
        let name = capitalize(kind.as_str());
        let magnitude = delta.abs();
        match self {
            WillingnessEventKind::EnemyCaptured => {
                format!("{name} feels empowered after the capture! (+{magnitude})")
            }
            WillingnessEventKind::AllyLost => format!("{name} mourns a fallen ally ({delta})"),
            WillingnessEventKind::Endangered => {
                format!("{name} feels threatened and unsafe ({delta})")
            }
            WillingnessEventKind::Protected => {
                format!("{name} feels safe and supported (+{magnitude})")
            }
            WillingnessEventKind::BlunderNearby => {
                format!("The bad move shakes everyone's confidence ({delta})")
            }
            WillingnessEventKind::IdleStreak => {
                format!("{name} is restless from sitting idle ({delta})")
            }
            WillingnessEventKind::Compliment => {
                format!("{name} appreciates the kind words (+{magnitude})")
            }
            WillingnessEventKind::Promoted => {
                format!("{name} is thrilled about the promotion!! (+{magnitude})")
            }
            WillingnessEventKind::GoodPosition => {
                format!("{name} likes this strategic position (+{magnitude})")
            }
            WillingnessEventKind::CleverTactic => {
                format!("{name} is impressed by the clever play (+{magnitude})")
            }
            WillingnessEventKind::MatchStart => {
                format!("{name} takes the field (willingness {score_after})")
            }
            WillingnessEventKind::PersuasionSucceeded => {
                format!("{name} feels heard and valued (+{magnitude})")
            }
            WillingnessEventKind::PersuasionFailed => {
                format!("{name} is frustrated by the failed argument ({delta})")
            }
            WillingnessEventKind::BrokenPromise => {
                format!("{name} feels betrayed, you broke your promise! ({delta})")
            }
        }
    }
}

impl fmt::Display for WillingnessEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// 意愿事件 (只追加，不可改写)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WillingnessEvent {
    pub id: Uuid,
    pub game_id: GameId,
    pub entity_id: EntityId,
    pub kind: WillingnessEventKind,
    /// 应用的增量 (性格覆盖之后、截断之前)
    pub delta: i32,
    pub score_before: u8,
    /// 截断后的结果分数
    pub score_after: u8,
    pub description: String,
    /// 因果关系: 触发此事件的指令
    pub command_id: Option<CommandId>,
    pub timestamp: DateTime<Utc>,
}

/// 领域事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainEventKind {
    CommandResolved,
    WillingnessChanged,
    PersuasionAttempted,
    CommentaryAttached,
    TauntAttached,
    GameStatusChanged,
}

impl DomainEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainEventKind::CommandResolved => "command_resolved",
            DomainEventKind::WillingnessChanged => "willingness_changed",
            DomainEventKind::PersuasionAttempted => "persuasion_attempted",
            DomainEventKind::CommentaryAttached => "commentary_attached",
            DomainEventKind::TauntAttached => "taunt_attached",
            DomainEventKind::GameStatusChanged => "game_status_changed",
        }
    }
}

/// 发件箱中的不可变领域记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    /// 事件唯一标识
    pub id: Uuid,
    /// 事件类型
    pub kind: DomainEventKind,
    /// 所属对局
    pub game_id: GameId,
    /// 事件时间戳
    pub timestamp: DateTime<Utc>,
    /// 事件载荷 (JSON)
    pub payload: serde_json::Value,
    /// 因果关系: 触发此事件的指令 ID
    pub causation_id: Option<CommandId>,
}

impl DomainEvent {
    /// 创建新事件
    pub fn new(kind: DomainEventKind, game_id: GameId, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            game_id,
            timestamp: Utc::now(),
            payload,
            causation_id: None,
        }
    }

    /// 从可序列化记录构造
    pub fn from_record<T: Serialize>(
        kind: DomainEventKind,
        game_id: GameId,
        record: &T,
    ) -> crate::Result<Self> {
        Ok(Self::new(kind, game_id, serde_json::to_value(record)?))
    }

    /// 设置因果关系
    pub fn with_causation(mut self, command_id: CommandId) -> Self {
        self.causation_id = Some(command_id);
        self
    }
}
