//! 对局与生命周期定义

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::board::BoardHandle;
use crate::entity::Side;
use crate::error::{MutinyError, Result};
use crate::ids::{GameId, PlayerId};

/// 对局生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Waiting,
    Setup,
    Active,
    Completed,
    Abandoned,
}

impl GameStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::Waiting => "waiting",
            GameStatus::Setup => "setup",
            GameStatus::Active => "active",
            GameStatus::Completed => "completed",
            GameStatus::Abandoned => "abandoned",
        }
    }

    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, GameStatus::Completed | GameStatus::Abandoned)
    }

    /// 允许的状态迁移边
    pub fn can_transition_to(&self, next: GameStatus) -> bool {
        use GameStatus::*;
        matches!(
            (self, next),
            (Waiting, Setup)
                | (Setup, Active)
                | (Active, Active)
                | (Active, Completed)
                | (Active, Abandoned)
                | (Waiting, Abandoned)
                | (Setup, Abandoned)
        )
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 对局结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GameResult {
    WhiteWins,
    BlackWins,
    Draw,
}

impl GameResult {
    pub fn win_for(side: Side) -> Self {
        match side {
            Side::White => GameResult::WhiteWins,
            Side::Black => GameResult::BlackWins,
        }
    }
}

/// 结果原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeReason {
    Checkmate,
    Stalemate,
    Resignation,
    Agreement,
    Timeout,
    Abandonment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub result: GameResult,
    pub reason: OutcomeReason,
}

impl Outcome {
    pub fn new(result: GameResult, reason: OutcomeReason) -> Self {
        Self { result, reason }
    }
}

/// 风险容忍模式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTolerance {
    /// 安全走子且意愿足够时自动服从
    #[default]
    Standard,
    /// 每一步都交给裁决
    Surprise,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

/// 对局配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default)]
    pub risk_tolerance: RiskTolerance,
    /// 回合时限 (秒)
    #[serde(default)]
    pub turn_time_limit_secs: Option<u64>,
    #[serde(default)]
    pub difficulty: Difficulty,
}

/// 玩家的承诺履约历史
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustHistory {
    pub kept: u32,
    pub broken: u32,
}

impl TrustHistory {
    /// 履约率，无历史时为 0.5
    pub fn ratio(&self) -> f64 {
        let total = self.kept + self.broken;
        if total == 0 {
            0.5
        } else {
            self.kept as f64 / total as f64
        }
    }

    pub fn record(&mut self, kept: bool) {
        if kept {
            self.kept += 1;
        } else {
            self.broken += 1;
        }
    }
}

/// 对局
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub status: GameStatus,
    pub side_to_move: Side,
    pub board: BoardHandle,
    pub outcome: Option<Outcome>,
    pub config: GameConfig,
    pub white: PlayerId,
    pub black: Option<PlayerId>,
    /// 已执行的半回合数
    pub ply: u32,
    /// 当前回合开始时间
    pub turn_started_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// 各玩家的承诺履约历史
    #[serde(default)]
    pub trust: HashMap<PlayerId, TrustHistory>,
}

impl Game {
    pub fn new(white: PlayerId, board: BoardHandle, config: GameConfig) -> Self {
        let now = Utc::now();
        Self {
            id: GameId::new(),
            status: GameStatus::Waiting,
            side_to_move: Side::White,
            board,
            outcome: None,
            config,
            white,
            black: None,
            ply: 0,
            turn_started_at: now,
            created_at: now,
            updated_at: now,
            trust: HashMap::new(),
        }
    }

    /// 玩家所执的阵营
    pub fn side_of(&self, player: &PlayerId) -> Option<Side> {
        if &self.white == player {
            Some(Side::White)
        } else if self.black.as_ref() == Some(player) {
            Some(Side::Black)
        } else {
            None
        }
    }

    pub fn player_of(&self, side: Side) -> Option<&PlayerId> {
        match side {
            Side::White => Some(&self.white),
            Side::Black => self.black.as_ref(),
        }
    }

    pub fn trust_of(&self, player: &PlayerId) -> TrustHistory {
        self.trust.get(player).copied().unwrap_or_default()
    }

    /// 沿合法边迁移状态
    pub fn transition(&mut self, next: GameStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(MutinyError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// 当前回合截止时间 (未配置时限时为 None)
    pub fn turn_deadline(&self) -> Option<DateTime<Utc>> {
        let limit = self.config.turn_time_limit_secs?;
        Some(self.turn_started_at + Duration::seconds(limit as i64))
    }
}
