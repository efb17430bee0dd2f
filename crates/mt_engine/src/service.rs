//! MutinyService - 引擎对外的命令 API
//!
//! 每个对局对应一个 [`GameActor`]，服务只负责路由消息与等待回复。

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use mt_core::entity::{Side, DEFAULT_STARTING_WILLINGNESS};
use mt_core::event::{WillingnessEvent, WillingnessEventKind};
use mt_core::game::{Game, GameConfig, Outcome};
use mt_core::ids::{EntityId, GameId, PlayerId};
use mt_core::record::CommandResolution;
use mt_core::{MutinyError, Result};
use mt_durable::{ActorMesh, Outbox};
use mt_judgment::{DailyUsage, GameUsage, Judge};

use crate::actor::{GameActor, GameMsg, PersuasionResult};
use crate::oracle::{BoardTruthChecker, LegalityOracle};
use crate::persuasion::ThresholdPolicy;
use crate::resolver::{CommandRequest, CommandResolver, PersuasionRequest};
use crate::roster;
use crate::session::{GameHistory, GameSession, GameSnapshot};

/// 引擎配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 新对局实体的初始意愿
    pub starting_willingness: u8,
    pub threshold: ThresholdPolicy,
    /// 每局邮箱容量
    pub mailbox_capacity: usize,
    /// 对局结束后 Actor 继续响应快照的毫秒数
    pub finished_game_grace_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            starting_willingness: DEFAULT_STARTING_WILLINGNESS,
            threshold: ThresholdPolicy::default(),
            mailbox_capacity: 64,
            finished_game_grace_ms: 30_000,
        }
    }
}

pub struct MutinyService {
    config: EngineConfig,
    resolver: Arc<CommandResolver>,
    mesh: ActorMesh<GameId, GameMsg>,
}

impl MutinyService {
    pub fn new(
        config: EngineConfig,
        oracle: Arc<dyn LegalityOracle>,
        truth: Arc<dyn BoardTruthChecker>,
        judge: Arc<dyn Judge>,
        outbox: Arc<Outbox>,
    ) -> Self {
        let resolver = Arc::new(CommandResolver::new(
            oracle,
            truth,
            judge,
            config.threshold,
            outbox,
        ));
        Self {
            mesh: ActorMesh::new(config.mailbox_capacity),
            config,
            resolver,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn outbox(&self) -> Arc<Outbox> {
        self.resolver.outbox().clone()
    }

    /// 仍驻留的对局 Actor 数 (含宽限期内已结束的对局)
    pub async fn game_count(&self) -> usize {
        self.mesh.count().await
    }

    async fn ask<T>(
        &self,
        game_id: GameId,
        build: impl FnOnce(oneshot::Sender<T>) -> GameMsg,
    ) -> Result<T> {
        let address = self
            .mesh
            .address(&game_id)
            .await
            .ok_or(MutinyError::GameNotFound(game_id))?;
        let (tx, rx) = oneshot::channel();
        address.send(build(tx)).await?;
        rx.await
            .map_err(|_| MutinyError::Actor(format!("game {game_id} dropped the reply")))
    }

    /// 创建对局，创建者执白
    pub async fn create_game(&self, creator: PlayerId, config: GameConfig) -> Result<GameSnapshot> {
        let board = self.resolver.oracle().start_position().await?;
        let game = Game::new(creator, board, config);
        let game_id = game.id;
        let session = GameSession::new(
            game,
            roster::classic_roster(self.config.starting_willingness),
        );
        let snapshot = session.snapshot();

        if !self.resolver.judge().admit_game(game_id) {
            tracing::warn!(
                game_id = %game_id,
                "Daily judgment game cap reached, game will use fallback verdicts"
            );
        }
        self.resolver.publish_status(&snapshot.game).await;
        self.mesh
            .spawn(
                game_id,
                GameActor::new(
                    session,
                    self.resolver.clone(),
                    Duration::from_millis(self.config.finished_game_grace_ms),
                ),
            )
            .await?;
        tracing::info!(game_id = %game_id, "Game created");
        Ok(snapshot)
    }

    pub async fn join_game(&self, game_id: GameId, player: PlayerId) -> Result<Side> {
        self.ask(game_id, |reply| GameMsg::Join { player, reply })
            .await?
    }

    pub async fn start_game(&self, game_id: GameId, player: PlayerId) -> Result<()> {
        self.ask(game_id, |reply| GameMsg::Start { player, reply })
            .await?
    }

    pub async fn submit_command(
        &self,
        game_id: GameId,
        request: CommandRequest,
    ) -> Result<CommandResolution> {
        self.ask(game_id, |reply| GameMsg::Command { request, reply })
            .await?
    }

    /// 提交说服；调用方在裁决返回前放弃等待时，裁决被丢弃
    pub async fn submit_persuasion(
        &self,
        game_id: GameId,
        request: PersuasionRequest,
    ) -> Result<PersuasionResult> {
        self.ask(game_id, |reply| GameMsg::Persuade { request, reply })
            .await?
    }

    pub async fn resign(&self, game_id: GameId, player: PlayerId) -> Result<Outcome> {
        self.ask(game_id, |reply| GameMsg::Resign { player, reply })
            .await?
    }

    pub async fn agree_draw(&self, game_id: GameId, player: PlayerId) -> Result<Option<Outcome>> {
        self.ask(game_id, |reply| GameMsg::AgreeDraw { player, reply })
            .await?
    }

    pub async fn abandon(&self, game_id: GameId, player: PlayerId) -> Result<Option<Outcome>> {
        self.ask(game_id, |reply| GameMsg::Abandon { player, reply })
            .await?
    }

    /// 外部计时器判定当前行动方超时
    pub async fn record_timeout(&self, game_id: GameId) -> Result<Outcome> {
        self.ask(game_id, |reply| GameMsg::Timeout { reply }).await?
    }

    pub async fn snapshot(&self, game_id: GameId) -> Result<GameSnapshot> {
        self.ask(game_id, |reply| GameMsg::Snapshot { reply }).await
    }

    /// 指令决议、说服尝试与意愿事件的完整记录
    pub async fn history(&self, game_id: GameId) -> Result<GameHistory> {
        self.ask(game_id, |reply| GameMsg::History { reply }).await
    }

    /// 单局裁决用量；裁决方不计量时为 `None`
    pub async fn judgment_usage(&self, game_id: GameId) -> Result<Option<GameUsage>> {
        if self.mesh.address(&game_id).await.is_none() {
            return Err(MutinyError::GameNotFound(game_id));
        }
        Ok(self.resolver.judge().game_usage(game_id))
    }

    pub fn daily_usage(&self) -> Option<DailyUsage> {
        self.resolver.judge().daily_usage()
    }

    pub async fn record_promise(
        &self,
        game_id: GameId,
        issuer: PlayerId,
        entity_id: EntityId,
        kept: bool,
    ) -> Result<Option<WillingnessEvent>> {
        self.ask(game_id, |reply| GameMsg::Promise {
            issuer,
            entity_id,
            kept,
            reply,
        })
        .await?
    }

    /// 记录入座玩家上报的场上观察 (protected、compliment 等)
    pub async fn record_event(
        &self,
        game_id: GameId,
        reporter: PlayerId,
        entity_id: EntityId,
        kind: WillingnessEventKind,
        note: Option<String>,
    ) -> Result<Vec<WillingnessEvent>> {
        self.ask(game_id, |reply| GameMsg::Observe {
            reporter,
            entity_id,
            kind,
            note,
            reply,
        })
        .await?
    }
}
