//! 单局会话状态
//!
//! 只被所属 GameActor 持有和修改，因此无需加锁。

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mt_core::board::RiskAssessment;
use mt_core::entity::{Entity, Side};
use mt_core::event::WillingnessEvent;
use mt_core::game::Game;
use mt_core::ids::{CommandId, EntityId, GameId, PlayerId};
use mt_core::record::{CommandResolution, PersuasionAttempt};
use mt_core::square::Square;
use mt_core::{MutinyError, Result};

use crate::ledger::WillingnessLedger;

/// 通过校验的指令
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedCommand {
    pub id: CommandId,
    pub issuer: PlayerId,
    pub side: Side,
    pub entity_id: EntityId,
    pub from: Square,
    pub to: Square,
    pub note: Option<String>,
}

/// 被拒绝、等待说服的指令
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingCommand {
    pub command: ValidatedCommand,
    pub risk: RiskAssessment,
    pub refused_at: DateTime<Utc>,
}

impl PendingCommand {
    pub fn matches(&self, issuer: &PlayerId, entity_id: EntityId, to: Square) -> bool {
        &self.command.issuer == issuer && self.command.entity_id == entity_id && self.command.to == to
    }
}

/// 对局快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub game: Game,
    pub entities: Vec<Entity>,
    pub pending: Option<PendingCommand>,
    pub deadline: Option<DateTime<Utc>>,
    pub attempts: usize,
}

/// 对局历史：指令决议、说服尝试与意愿事件，均按发生顺序排列
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameHistory {
    pub game_id: GameId,
    pub ply: u32,
    pub resolutions: Vec<CommandResolution>,
    pub attempts: Vec<PersuasionAttempt>,
    pub events: Vec<WillingnessEvent>,
}

pub struct GameSession {
    pub game: Game,
    pub ledger: WillingnessLedger,
    pub pending: Option<PendingCommand>,
    pub draw_offers: BTreeSet<Side>,
    pub attempts: Vec<PersuasionAttempt>,
    /// 已发布的决议 (含拒绝)
    pub resolutions: Vec<CommandResolution>,
    resolved: HashSet<CommandId>,
}

impl GameSession {
    pub fn new(game: Game, entities: Vec<Entity>) -> Self {
        let ledger = WillingnessLedger::new(game.id, entities);
        Self {
            game,
            ledger,
            pending: None,
            draw_offers: BTreeSet::new(),
            attempts: Vec::new(),
            resolutions: Vec::new(),
            resolved: HashSet::new(),
        }
    }

    pub fn is_resolved(&self, command_id: CommandId) -> bool {
        self.resolved.contains(&command_id)
    }

    /// 登记终态，同一指令第二次登记视为错误
    pub fn mark_resolved(&mut self, command_id: CommandId) -> Result<()> {
        if !self.resolved.insert(command_id) {
            return Err(MutinyError::Actor(format!(
                "command {command_id} already has a terminal resolution"
            )));
        }
        Ok(())
    }

    /// 取出匹配的待说服指令
    pub fn take_pending_for(
        &mut self,
        issuer: &PlayerId,
        entity_id: EntityId,
        to: Square,
    ) -> Option<PendingCommand> {
        match &self.pending {
            Some(pending) if pending.matches(issuer, entity_id, to) => self.pending.take(),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            game: self.game.clone(),
            entities: self.ledger.entities().cloned().collect(),
            pending: self.pending.clone(),
            deadline: self.game.turn_deadline(),
            attempts: self.attempts.len(),
        }
    }

    pub fn history(&self) -> GameHistory {
        GameHistory {
            game_id: self.game.id,
            ply: self.game.ply,
            resolutions: self.resolutions.clone(),
            attempts: self.attempts.clone(),
            events: self.ledger.history().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use mt_core::board::BoardHandle;
    use mt_core::game::GameConfig;

    use super::*;

    fn session() -> GameSession {
        let game = Game::new(
            PlayerId::from("alice"),
            BoardHandle::new("w|0|"),
            GameConfig::default(),
        );
        GameSession::new(game, vec![])
    }

    #[test]
    fn test_terminal_resolution_recorded_once() {
        let mut session = session();
        let id = CommandId::new();
        assert!(!session.is_resolved(id));
        session.mark_resolved(id).unwrap();
        assert!(session.is_resolved(id));
        assert!(session.mark_resolved(id).is_err());
    }

    #[test]
    fn test_pending_only_taken_when_matching() {
        let mut session = session();
        let entity_id = EntityId::new();
        let to: Square = "e4".parse().unwrap();
        session.pending = Some(PendingCommand {
            command: ValidatedCommand {
                id: CommandId::new(),
                issuer: PlayerId::from("alice"),
                side: Side::White,
                entity_id,
                from: "e2".parse().unwrap(),
                to,
                note: None,
            },
            risk: RiskAssessment::default(),
            refused_at: Utc::now(),
        });

        assert!(session
            .take_pending_for(&PlayerId::from("alice"), entity_id, "e3".parse().unwrap())
            .is_none());
        assert!(session.pending.is_some());
        assert!(session
            .take_pending_for(&PlayerId::from("alice"), entity_id, to)
            .is_some());
        assert!(session.pending.is_none());
    }
}
