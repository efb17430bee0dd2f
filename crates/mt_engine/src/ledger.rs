//! 意愿账本
//!
//! 持有对局内所有实体与只追加的意愿事件历史。纯状态，不做 I/O。
//! 增量顺序：基础表 (或显式增量提示) -> 性格覆盖 -> 截断到 [0, 100]。

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mt_core::entity::{Entity, EntityKind, Side, Willingness};
use mt_core::event::{WillingnessEvent, WillingnessEventKind};
use mt_core::ids::{CommandId, EntityId, GameId};
use mt_core::square::Square;
use mt_core::{MutinyError, Result};

/// 说服失败的最终惩罚下限
pub const PERSUASION_FAILED_FLOOR: i32 = -10;
/// 触发 idle-streak 的连续闲置回合数
pub const IDLE_STREAK_TURNS: u32 = 5;
/// ally-lost 的影响半径 (切比雪夫距离)
pub const ALLY_LOST_RADIUS: u8 = 2;

/// 事件上下文
#[derive(Debug, Clone, Default)]
pub struct EventContext {
    /// 显式增量提示 (替代基础表)
    pub delta_hint: Option<i32>,
    pub command_id: Option<CommandId>,
}

impl EventContext {
    pub fn for_command(command_id: CommandId) -> Self {
        Self {
            delta_hint: None,
            command_id: Some(command_id),
        }
    }

    pub fn with_hint(mut self, delta: i32) -> Self {
        self.delta_hint = Some(delta);
        self
    }
}

/// 回滚点
pub struct LedgerCheckpoint {
    entities: BTreeMap<EntityId, Entity>,
    history_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WillingnessLedger {
    game_id: GameId,
    entities: BTreeMap<EntityId, Entity>,
    history: Vec<WillingnessEvent>,
}

impl WillingnessLedger {
    pub fn new(game_id: GameId, entities: impl IntoIterator<Item = Entity>) -> Self {
        Self {
            game_id,
            entities: entities.into_iter().map(|e| (e.id, e)).collect(),
            history: Vec::new(),
        }
    }

    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// 某格上的在场实体
    pub fn entity_at(&self, square: Square) -> Option<&Entity> {
        self.entities
            .values()
            .find(|e| !e.removed && e.position == Some(square))
    }

    pub fn willingness(&self, id: EntityId) -> Option<u8> {
        self.entities.get(&id).map(|e| e.willingness.value())
    }

    fn live_mut(&mut self, id: EntityId) -> Result<&mut Entity> {
        match self.entities.get_mut(&id) {
            Some(entity) if !entity.removed => Ok(entity),
            _ => Err(MutinyError::UnknownEntity(id)),
        }
    }

    /// 记录一条意愿事件
    pub fn apply_event(
        &mut self,
        entity_id: EntityId,
        kind: WillingnessEventKind,
        ctx: &EventContext,
    ) -> Result<WillingnessEvent> {
        let game_id = self.game_id;
        let entity = self.live_mut(entity_id)?;

        let mut delta = ctx.delta_hint.unwrap_or_else(|| kind.base_delta());
        if let Some(overridden) = entity.personality.override_for(kind) {
            delta = overridden;
        }
        if kind == WillingnessEventKind::PersuasionFailed {
            delta = delta.max(PERSUASION_FAILED_FLOOR);
        }

        let before = entity.willingness;
        let after = before.apply(delta);
        entity.willingness = after;

        let event = WillingnessEvent {
            id: Uuid::new_v4(),
            game_id,
            entity_id,
            kind,
            delta,
            score_before: before.value(),
            score_after: after.value(),
            description: kind.describe(entity.effective_kind(), delta, after.value()),
            command_id: ctx.command_id,
            timestamp: Utc::now(),
        };
        tracing::debug!(
            game_id = %game_id,
            entity_id = %entity_id,
            kind = kind.as_str(),
            delta,
            score = after.value(),
            "Willingness event recorded"
        );
        self.history.push(event.clone());
        Ok(event)
    }

    /// 阵亡实体的友方邻居 (其最后位置切比雪夫距离 2 以内) 记录 ally-lost
    pub fn apply_ally_lost(
        &mut self,
        fallen: EntityId,
        command_id: Option<CommandId>,
    ) -> Result<Vec<WillingnessEvent>> {
        let fallen_entity = self
            .entities
            .get(&fallen)
            .ok_or(MutinyError::UnknownEntity(fallen))?;
        let (side, origin) = (fallen_entity.side, fallen_entity.last_position);

        let neighbours: Vec<EntityId> = self
            .entities
            .values()
            .filter(|e| e.id != fallen && e.side == side && !e.removed)
            .filter(|e| {
                e.position
                    .map_or(false, |p| p.distance(&origin) <= ALLY_LOST_RADIUS)
            })
            .map(|e| e.id)
            .collect();

        let ctx = EventContext {
            delta_hint: None,
            command_id,
        };
        neighbours
            .into_iter()
            .map(|id| self.apply_event(id, WillingnessEventKind::AllyLost, &ctx))
            .collect()
    }

    /// 己方所有在场实体 (除 `except`) 记录 blunder-nearby
    pub fn apply_blunder(
        &mut self,
        side: Side,
        except: Option<EntityId>,
        command_id: Option<CommandId>,
    ) -> Result<Vec<WillingnessEvent>> {
        let targets = self.live_ids(side, except);
        let ctx = EventContext {
            delta_hint: None,
            command_id,
        };
        targets
            .into_iter()
            .map(|id| self.apply_event(id, WillingnessEventKind::BlunderNearby, &ctx))
            .collect()
    }

    /// 己方走子后更新闲置计数，满 5 回合记录 idle-streak 并清零
    pub fn tick_idle(
        &mut self,
        side: Side,
        mover: EntityId,
        command_id: Option<CommandId>,
    ) -> Result<Vec<WillingnessEvent>> {
        let mut restless = Vec::new();
        for entity in self.entities.values_mut() {
            if entity.side != side || entity.removed {
                continue;
            }
            if entity.id == mover {
                entity.idle_turns = 0;
                continue;
            }
            entity.idle_turns += 1;
            if entity.idle_turns >= IDLE_STREAK_TURNS {
                entity.idle_turns = 0;
                restless.push(entity.id);
            }
        }

        let ctx = EventContext {
            delta_hint: None,
            command_id,
        };
        restless
            .into_iter()
            .map(|id| self.apply_event(id, WillingnessEventKind::IdleStreak, &ctx))
            .collect()
    }

    fn live_ids(&self, side: Side, except: Option<EntityId>) -> Vec<EntityId> {
        self.entities
            .values()
            .filter(|e| e.side == side && !e.removed && Some(e.id) != except)
            .map(|e| e.id)
            .collect()
    }

    /// 移动实体
    pub fn place(&mut self, id: EntityId, square: Square) -> Result<()> {
        match self.entities.get_mut(&id) {
            Some(entity) => entity.place(square),
            None => Err(MutinyError::UnknownEntity(id)),
        }
    }

    /// 移除实体 (被吃)
    pub fn remove(&mut self, id: EntityId) -> Result<()> {
        self.live_mut(id)?.remove();
        Ok(())
    }

    /// 升变，并记录 promoted
    pub fn promote(
        &mut self,
        id: EntityId,
        kind: EntityKind,
        command_id: Option<CommandId>,
    ) -> Result<WillingnessEvent> {
        self.live_mut(id)?.promote(kind);
        let ctx = EventContext {
            delta_hint: None,
            command_id,
        };
        self.apply_event(id, WillingnessEventKind::Promoted, &ctx)
    }

    pub fn history(&self) -> &[WillingnessEvent] {
        &self.history
    }

    pub fn history_of(&self, id: EntityId) -> Vec<&WillingnessEvent> {
        self.history.iter().filter(|e| e.entity_id == id).collect()
    }

    pub fn checkpoint(&self) -> LedgerCheckpoint {
        LedgerCheckpoint {
            entities: self.entities.clone(),
            history_len: self.history.len(),
        }
    }

    /// 回滚到检查点，丢弃之后的全部写入
    pub fn rollback(&mut self, checkpoint: LedgerCheckpoint) {
        self.entities = checkpoint.entities;
        self.history.truncate(checkpoint.history_len);
    }

    /// 从事件历史重建分数 (审计用)
    pub fn replay(
        starting: &HashMap<EntityId, u8>,
        events: &[WillingnessEvent],
    ) -> HashMap<EntityId, u8> {
        let mut scores = starting.clone();
        for event in events {
            let current = scores.entry(event.entity_id).or_insert(event.score_before);
            *current = Willingness::clamped(*current as i32).apply(event.delta).value();
        }
        scores
    }
}
