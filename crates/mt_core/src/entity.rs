//! 可指挥实体 (棋子) 定义

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MutinyError, Result};
use crate::event::WillingnessEventKind;
use crate::ids::EntityId;
use crate::square::Square;

/// 默认初始意愿值
pub const DEFAULT_STARTING_WILLINGNESS: u8 = 70;

/// 阵营
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::White => "white",
            Side::Black => "black",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 实体种类 (对引擎而言只影响默认性格与叙事)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Pawn => "pawn",
            EntityKind::Knight => "knight",
            EntityKind::Bishop => "bishop",
            EntityKind::Rook => "rook",
            EntityKind::Queen => "queen",
            EntityKind::King => "king",
        }
    }

    /// 子力价值，用于叙事与嘲讽强度
    pub fn material_value(&self) -> i32 {
        match self {
            EntityKind::Pawn => 1,
            EntityKind::Knight | EntityKind::Bishop => 3,
            EntityKind::Rook => 5,
            EntityKind::Queen => 9,
            EntityKind::King => 0,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 意愿值，恒在 [0, 100]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Willingness(u8);

impl Willingness {
    pub const MIN: u8 = 0;
    pub const MAX: u8 = 100;

    /// 从任意整数构造，超界部分被截断
    pub fn clamped(value: i32) -> Self {
        Self(value.clamp(Self::MIN as i32, Self::MAX as i32) as u8)
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    /// 叠加一个有符号增量并截断
    pub fn apply(self, delta: i32) -> Self {
        Self::clamped(self.0 as i32 + delta)
    }

    /// 按区间给出的基础服从率
    pub fn base_rate(&self) -> f64 {
        match self.0 {
            80.. => 0.90,
            60..=79 => 0.70,
            40..=59 => 0.45,
            20..=39 => 0.25,
            _ => 0.10,
        }
    }

    pub fn category(&self) -> WillingnessCategory {
        match self.0 {
            80.. => WillingnessCategory::Enthusiastic,
            60..=79 => WillingnessCategory::Normal,
            40..=59 => WillingnessCategory::Reluctant,
            20..=39 => WillingnessCategory::Demoralized,
            _ => WillingnessCategory::Mutinous,
        }
    }
}

impl Default for Willingness {
    fn default() -> Self {
        Self(DEFAULT_STARTING_WILLINGNESS)
    }
}

impl fmt::Display for Willingness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 意愿区间标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WillingnessCategory {
    Enthusiastic,
    Normal,
    Reluctant,
    Demoralized,
    Mutinous,
}

impl WillingnessCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            WillingnessCategory::Enthusiastic => "enthusiastic",
            WillingnessCategory::Normal => "normal",
            WillingnessCategory::Reluctant => "reluctant",
            WillingnessCategory::Demoralized => "demoralized",
            WillingnessCategory::Mutinous => "mutinous",
        }
    }
}

/// 性格档案
///
/// 原型标签对引擎是不透明的，未知原型原样透传；
/// `overrides` 按事件类型覆盖基础意愿增量。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Personality {
    /// 原型标签 (如 "Naive Recruit")
    pub archetype: String,
    /// 性格特质
    pub traits: Vec<String>,
    /// 语气标签
    pub tone: String,
    /// 按事件类型覆盖的意愿增量
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub overrides: BTreeMap<WillingnessEventKind, i32>,
}

impl Personality {
    pub fn new(
        archetype: impl Into<String>,
        traits: &[&str],
        tone: impl Into<String>,
    ) -> Self {
        Self {
            archetype: archetype.into(),
            traits: traits.iter().map(|t| t.to_string()).collect(),
            tone: tone.into(),
            overrides: BTreeMap::new(),
        }
    }

    /// 追加一个事件增量覆盖
    pub fn with_override(mut self, kind: WillingnessEventKind, delta: i32) -> Self {
        self.overrides.insert(kind, delta);
        self
    }

    pub fn override_for(&self, kind: WillingnessEventKind) -> Option<i32> {
        self.overrides.get(&kind).copied()
    }

    /// 各兵种的默认性格
    pub fn default_for(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Pawn => Self::new(
                "Naive Recruit",
                &["eager", "nervous", "loyal"],
                "Enthusiastic, anxious",
            ),
            EntityKind::Knight => Self::new(
                "Cocky Maverick",
                &["boastful", "adventurous", "impatient"],
                "Confident, dramatic",
            ),
            EntityKind::Bishop => Self::new(
                "Intellectual Strategist",
                &["analytical", "cautious", "eloquent"],
                "Measured, logical",
            ),
            EntityKind::Rook => Self::new(
                "Loyal Soldier",
                &["disciplined", "stoic", "reliable"],
                "Military, direct",
            ),
            EntityKind::Queen => Self::new(
                "Confident Diva",
                &["commanding", "dramatic", "self-assured"],
                "Regal, demanding",
            ),
            EntityKind::King => Self::new(
                "Nervous Leader",
                &["anxious", "grateful", "commanding"],
                "Worried, authoritative",
            ),
        }
    }
}

/// 棋子实体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub side: Side,
    pub kind: EntityKind,
    /// 当前位置，被吃掉后为 None
    pub position: Option<Square>,
    /// 最后所在位置 (被移除后仍保留，用于邻域扇出)
    pub last_position: Square,
    pub willingness: Willingness,
    pub personality: Personality,
    pub removed: bool,
    pub promoted: bool,
    pub promoted_kind: Option<EntityKind>,
    /// 己方连续走子而本实体未动的回合数
    pub idle_turns: u32,
}

impl Entity {
    pub fn new(side: Side, kind: EntityKind, position: Square) -> Self {
        Self {
            id: EntityId::new(),
            side,
            kind,
            position: Some(position),
            last_position: position,
            willingness: Willingness::default(),
            personality: Personality::default_for(kind),
            removed: false,
            promoted: false,
            promoted_kind: None,
            idle_turns: 0,
        }
    }

    pub fn with_willingness(mut self, willingness: u8) -> Self {
        self.willingness = Willingness::clamped(willingness as i32);
        self
    }

    pub fn with_personality(mut self, personality: Personality) -> Self {
        self.personality = personality;
        self
    }

    /// 当前生效的兵种 (升变后为升变兵种)
    pub fn effective_kind(&self) -> EntityKind {
        self.promoted_kind.unwrap_or(self.kind)
    }

    pub fn is_active(&self) -> bool {
        !self.removed
    }

    /// 移动到新位置，被移除的实体不允许再放置
    pub fn place(&mut self, square: Square) -> Result<()> {
        if self.removed {
            return Err(MutinyError::EntityRemoved(self.id));
        }
        self.position = Some(square);
        self.last_position = square;
        Ok(())
    }

    /// 逻辑移除 (被吃)，实体记录在对局存续期间保留
    pub fn remove(&mut self) {
        if let Some(square) = self.position.take() {
            self.last_position = square;
        }
        self.removed = true;
    }

    pub fn promote(&mut self, kind: EntityKind) {
        self.promoted = true;
        self.promoted_kind = Some(kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    #[test]
    fn test_willingness_clamps() {
        assert_eq!(Willingness::clamped(150).value(), 100);
        assert_eq!(Willingness::clamped(-20).value(), 0);
        assert_eq!(Willingness::clamped(95).apply(15).value(), 100);
        assert_eq!(Willingness::clamped(5).apply(-15).value(), 0);
    }

    #[test]
    fn test_willingness_brackets() {
        assert_eq!(Willingness::clamped(100).base_rate(), 0.90);
        assert_eq!(Willingness::clamped(79).base_rate(), 0.70);
        assert_eq!(Willingness::clamped(40).base_rate(), 0.45);
        assert_eq!(Willingness::clamped(30).base_rate(), 0.25);
        assert_eq!(Willingness::clamped(19).base_rate(), 0.10);
        assert_eq!(
            Willingness::clamped(15).category(),
            WillingnessCategory::Mutinous
        );
        assert_eq!(
            Willingness::clamped(65).category(),
            WillingnessCategory::Normal
        );
    }

    #[test]
    fn test_removed_entity_cannot_be_placed() {
        let mut knight = Entity::new(Side::White, EntityKind::Knight, sq("g1"));
        knight.place(sq("f3")).unwrap();
        knight.remove();
        assert!(knight.position.is_none());
        assert_eq!(knight.last_position, sq("f3"));
        assert!(matches!(
            knight.place(sq("e5")),
            Err(MutinyError::EntityRemoved(_))
        ));
        assert!(knight.position.is_none());
    }

    #[test]
    fn test_default_personalities() {
        let pawn = Personality::default_for(EntityKind::Pawn);
        assert_eq!(pawn.archetype, "Naive Recruit");
        assert_eq!(pawn.traits, vec!["eager", "nervous", "loyal"]);
        let king = Personality::default_for(EntityKind::King)
            .with_override(WillingnessEventKind::AllyLost, -20);
        assert_eq!(king.override_for(WillingnessEventKind::AllyLost), Some(-20));
        assert_eq!(king.override_for(WillingnessEventKind::Compliment), None);
    }
}
