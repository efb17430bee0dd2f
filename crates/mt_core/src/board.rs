//! 外部规则预言机的数据契约
//!
//! 棋盘状态由外部预言机拥有，引擎只持有一个不透明句柄。

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::EntityKind;
use crate::game::Outcome;
use crate::square::Square;

/// 不透明的棋盘状态句柄 (如 FEN)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoardHandle(pub String);

impl BoardHandle {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BoardHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 一步走子的风险评估
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// 落点是否受到攻击
    pub is_risky: bool,
    /// 若为吃子，被吃的兵种
    pub captured_kind: Option<EntityKind>,
    /// 若为升变，升变后的兵种
    pub promotes_to: Option<EntityKind>,
    /// 被吃子所在格；缺省为落点，吃过路兵时不同
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<Square>,
    /// 同一步中随之移动的己方棋子 (王车易位的车)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub companion: Option<CompanionMove>,
}

impl RiskAssessment {
    pub fn is_capture(&self) -> bool {
        self.captured_kind.is_some()
    }

    /// 被吃子所在格
    pub fn capture_square(&self, to: Square) -> Option<Square> {
        self.is_capture().then(|| self.captured_at.unwrap_or(to))
    }
}

/// 随行走子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanionMove {
    pub from: Square,
    pub to: Square,
}

/// 局面概况
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSituation {
    /// 行棋方是否被将军
    pub in_check: bool,
    /// 子力差 (白方为正)
    pub material_balance: i32,
    /// 若对局已结束 (将死/逼和)，给出结果
    pub outcome: Option<Outcome>,
}
