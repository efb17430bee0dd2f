//! 每局一个 GameActor
//!
//! 同一对局的所有消息在一个邮箱里排队，逐条处理，决议之间不会交错。
//! 场外裁决在派生任务里执行，结果作为消息回投，后续账本写入仍然串行。
//! 对局进入终态后，Actor 在宽限期结束时退出并从 mesh 注销。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;

use mt_core::entity::Side;
use mt_core::event::{DomainEventKind, WillingnessEvent, WillingnessEventKind};
use mt_core::game::{GameStatus, Outcome};
use mt_core::ids::{EntityId, PlayerId};
use mt_core::record::CommandResolution;
use mt_core::{MutinyError, Result};
use mt_durable::{Actor, ActorContext, ActorFlow};
use mt_judgment::{BudgetScope, TauntContext};

use crate::commentary::{self, Followup, FollowupResult, Taunt};
use crate::ledger::EventContext;
use crate::resolver::{record, CommandRequest, CommandResolver, PersuasionRequest};
use crate::session::{GameHistory, GameSession, GameSnapshot};
use crate::turn;

/// 说服结果
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PersuasionResult {
    pub attempt: mt_core::record::PersuasionAttempt,
    pub resolution: CommandResolution,
}

type Reply<T> = oneshot::Sender<Result<T>>;

pub enum GameMsg {
    Command {
        request: CommandRequest,
        reply: Reply<CommandResolution>,
    },
    Persuade {
        request: PersuasionRequest,
        reply: Reply<PersuasionResult>,
    },
    Join {
        player: PlayerId,
        reply: Reply<Side>,
    },
    Start {
        player: PlayerId,
        reply: Reply<()>,
    },
    Resign {
        player: PlayerId,
        reply: Reply<Outcome>,
    },
    AgreeDraw {
        player: PlayerId,
        reply: Reply<Option<Outcome>>,
    },
    Abandon {
        player: PlayerId,
        reply: Reply<Option<Outcome>>,
    },
    Timeout {
        reply: Reply<Outcome>,
    },
    Promise {
        issuer: PlayerId,
        entity_id: EntityId,
        kept: bool,
        reply: Reply<Option<WillingnessEvent>>,
    },
    Observe {
        reporter: PlayerId,
        entity_id: EntityId,
        kind: WillingnessEventKind,
        note: Option<String>,
        reply: Reply<Vec<WillingnessEvent>>,
    },
    Snapshot {
        reply: oneshot::Sender<GameSnapshot>,
    },
    History {
        reply: oneshot::Sender<GameHistory>,
    },
    /// 场外点评/嘲讽完成
    Followup(FollowupResult),
    /// 不属于任何指令的嘲讽 (开局、认输)
    Taunt(Taunt),
    /// 终态宽限期结束
    Retire,
}

pub struct GameActor {
    session: GameSession,
    resolver: Arc<CommandResolver>,
    /// 终态后仍保留快照读取的时长
    retire_after: Duration,
    retiring: bool,
}

impl GameActor {
    pub fn new(
        session: GameSession,
        resolver: Arc<CommandResolver>,
        retire_after: Duration,
    ) -> Self {
        Self {
            session,
            resolver,
            retire_after,
            retiring: false,
        }
    }

    /// 对局首次进入终态时安排退出
    fn schedule_retirement(&mut self, ctx: &ActorContext<GameMsg>) {
        if self.retiring || !self.session.game.status.is_terminal() {
            return;
        }
        let Some(address) = ctx.address() else {
            return;
        };
        self.retiring = true;
        let delay = self.retire_after;
        tracing::debug!(
            game_id = %self.session.game.id,
            grace_ms = delay.as_millis() as u64,
            "Game finished, actor retiring"
        );
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = address.send(GameMsg::Retire).await;
        });
    }

    fn side_of(&self, player: &PlayerId) -> Result<Side> {
        self.session
            .game
            .side_of(player)
            .ok_or(MutinyError::NotAPlayer)
    }

    fn spawn_followup(&self, followup: Option<Followup>, ctx: &ActorContext<GameMsg>) {
        let (Some(followup), Some(address)) = (followup, ctx.address()) else {
            return;
        };
        let judge = self.resolver.judge();
        tokio::spawn(async move {
            let result = commentary::run_followup(judge, followup).await;
            if address.send(GameMsg::Followup(result)).await.is_err() {
                tracing::debug!("Game actor gone before followup arrived");
            }
        });
    }

    /// 派生一次独立嘲讽；`release` 为真时完成后释放该局预算
    fn spawn_taunt(&self, taunt: TauntContext, release: bool, ctx: &ActorContext<GameMsg>) {
        let Some(address) = ctx.address() else {
            return;
        };
        let judge = self.resolver.judge();
        let game_id = self.session.game.id;
        let scope = BudgetScope::new(game_id, self.session.game.ply);
        tokio::spawn(async move {
            let taunt = commentary::request_taunt(judge.as_ref(), taunt, scope, None).await;
            if release {
                judge.forget_game(game_id);
            }
            if address.send(GameMsg::Taunt(taunt)).await.is_err() {
                tracing::debug!("Game actor gone before taunt arrived");
            }
        });
    }

    async fn start(&mut self, player: PlayerId, ctx: &ActorContext<GameMsg>) -> Result<()> {
        turn::start(&mut self.session.game, &player)?;

        let ids: Vec<EntityId> = self.session.ledger.entities().map(|e| e.id).collect();
        let mut events = Vec::with_capacity(ids.len());
        for id in ids {
            events.push(self.session.ledger.apply_event(
                id,
                WillingnessEventKind::MatchStart,
                &EventContext::default(),
            )?);
        }
        tracing::info!(game_id = %self.session.game.id, "Game started");
        self.resolver.publish_status(&self.session.game).await;
        self.resolver
            .publish_events(self.session.game.id, &events)
            .await;
        self.spawn_taunt(
            commentary::match_start_taunt(&self.session.game.board),
            false,
            ctx,
        );
        Ok(())
    }

    async fn resign(&mut self, player: PlayerId, ctx: &ActorContext<GameMsg>) -> Result<Outcome> {
        let side = self.side_of(&player)?;
        let outcome = turn::resign(&mut self.session.game, side)?;
        self.resolver.conclude(&mut self.session).await;
        let taunt = commentary::resignation_taunt(
            &self.session.game.board,
            side.opposite(),
            self.session.game.ply,
        );
        self.spawn_taunt(taunt, true, ctx);
        Ok(outcome)
    }

    async fn agree_draw(&mut self, player: PlayerId) -> Result<Option<Outcome>> {
        let side = self.side_of(&player)?;
        let session = &mut self.session;
        let outcome = turn::agree_draw(&mut session.game, &mut session.draw_offers, side)?;
        if outcome.is_some() {
            self.resolver.conclude(&mut self.session).await;
        }
        Ok(outcome)
    }

    async fn abandon(&mut self, player: PlayerId) -> Result<Option<Outcome>> {
        let side = self.side_of(&player)?;
        let outcome = turn::abandon(&mut self.session.game, side)?;
        self.resolver.conclude(&mut self.session).await;
        Ok(outcome)
    }

    async fn timeout(&mut self) -> Result<Outcome> {
        let outcome = turn::timeout(&mut self.session.game)?;
        self.resolver.conclude(&mut self.session).await;
        Ok(outcome)
    }

    async fn join(&mut self, player: PlayerId) -> Result<Side> {
        let side = turn::join(&mut self.session.game, player)?;
        self.resolver.publish_status(&self.session.game).await;
        Ok(side)
    }

    /// 承诺履约：更新信任，违约时记 broken-promise
    async fn promise(
        &mut self,
        issuer: PlayerId,
        entity_id: EntityId,
        kept: bool,
    ) -> Result<Option<WillingnessEvent>> {
        let side = self.side_of(&issuer)?;
        let entity = self
            .session
            .ledger
            .entity(entity_id)
            .ok_or(MutinyError::UnknownEntity(entity_id))?;
        if entity.side != side {
            return Err(MutinyError::NotYourEntity(entity_id));
        }

        let event = if kept {
            None
        } else {
            Some(self.session.ledger.apply_event(
                entity_id,
                WillingnessEventKind::BrokenPromise,
                &EventContext::default(),
            )?)
        };
        self.session
            .game
            .trust
            .entry(issuer)
            .or_default()
            .record(kept);

        if let Some(event) = &event {
            self.resolver
                .publish_events(self.session.game.id, std::slice::from_ref(event))
                .await;
        }
        Ok(event)
    }

    /// 外部观察到的事件；ally-lost 以 `entity_id` 为阵亡者向邻居扇出
    async fn observe(
        &mut self,
        reporter: PlayerId,
        entity_id: EntityId,
        kind: WillingnessEventKind,
        note: Option<String>,
    ) -> Result<Vec<WillingnessEvent>> {
        turn::ensure_active(&self.session.game)?;
        self.side_of(&reporter)?;
        if !kind.is_observable() {
            return Err(MutinyError::NotObservable(kind));
        }
        let ledger = &mut self.session.ledger;
        let events = match kind {
            WillingnessEventKind::AllyLost => ledger.apply_ally_lost(entity_id, None)?,
            _ => vec![ledger.apply_event(entity_id, kind, &EventContext::default())?],
        };
        tracing::debug!(
            game_id = %self.session.game.id,
            entity_id = %entity_id,
            kind = kind.as_str(),
            note = note.as_deref().unwrap_or_default(),
            "External event recorded"
        );
        self.resolver
            .publish_events(self.session.game.id, &events)
            .await;
        Ok(events)
    }

    async fn attach_followup(&mut self, result: FollowupResult) {
        let game_id = self.session.game.id;
        let mut records = Vec::new();
        if let Some(commentary) = &result.commentary {
            records.push(record(
                DomainEventKind::CommentaryAttached,
                game_id,
                commentary,
                Some(result.command_id),
            ));
        }
        if let Some(taunt) = &result.taunt {
            records.push(record(
                DomainEventKind::TauntAttached,
                game_id,
                taunt,
                Some(result.command_id),
            ));
        }
        self.resolver.publish(records).await;
        self.resolver.judge().forget_command(result.scope);

        if !result.is_clever() || self.session.game.status.is_terminal() {
            return;
        }
        match self.session.ledger.apply_event(
            result.entity_id,
            WillingnessEventKind::CleverTactic,
            &EventContext::for_command(result.command_id),
        ) {
            Ok(event) => {
                self.resolver
                    .publish_events(game_id, std::slice::from_ref(&event))
                    .await;
            }
            Err(e) => {
                tracing::debug!(
                    game_id = %game_id,
                    entity_id = %result.entity_id,
                    error = %e,
                    "Clever tactic not recorded"
                );
            }
        }
    }
}

#[async_trait]
impl Actor for GameActor {
    type Message = GameMsg;

    fn type_name(&self) -> &'static str {
        "GameActor"
    }

    async fn handle(&mut self, msg: GameMsg, ctx: &ActorContext<GameMsg>) -> ActorFlow {
        match msg {
            GameMsg::Command { request, reply } => {
                let result = self.resolver.resolve(&mut self.session, request).await;
                let result = match result {
                    Ok(resolved) => {
                        self.spawn_followup(resolved.followup, ctx);
                        Ok(resolved.resolution)
                    }
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            GameMsg::Persuade { request, reply } => {
                let result = self
                    .resolver
                    .persuade(&mut self.session, request, || reply.is_closed())
                    .await;
                let result = match result {
                    Ok(persuaded) => {
                        self.spawn_followup(persuaded.followup, ctx);
                        Ok(PersuasionResult {
                            attempt: persuaded.attempt,
                            resolution: persuaded.resolution,
                        })
                    }
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            GameMsg::Join { player, reply } => {
                let _ = reply.send(self.join(player).await);
            }
            GameMsg::Start { player, reply } => {
                let _ = reply.send(self.start(player, ctx).await);
            }
            GameMsg::Resign { player, reply } => {
                let _ = reply.send(self.resign(player, ctx).await);
            }
            GameMsg::AgreeDraw { player, reply } => {
                let _ = reply.send(self.agree_draw(player).await);
            }
            GameMsg::Abandon { player, reply } => {
                let _ = reply.send(self.abandon(player).await);
            }
            GameMsg::Timeout { reply } => {
                let _ = reply.send(self.timeout().await);
            }
            GameMsg::Promise {
                issuer,
                entity_id,
                kept,
                reply,
            } => {
                let _ = reply.send(self.promise(issuer, entity_id, kept).await);
            }
            GameMsg::Observe {
                reporter,
                entity_id,
                kind,
                note,
                reply,
            } => {
                let _ = reply.send(self.observe(reporter, entity_id, kind, note).await);
            }
            GameMsg::Snapshot { reply } => {
                let _ = reply.send(self.session.snapshot());
            }
            GameMsg::History { reply } => {
                let _ = reply.send(self.session.history());
            }
            GameMsg::Followup(result) => self.attach_followup(result).await,
            GameMsg::Taunt(taunt) => {
                let game_id = self.session.game.id;
                self.resolver
                    .publish(vec![record(DomainEventKind::TauntAttached, game_id, &taunt, None)])
                    .await;
            }
            GameMsg::Retire => return ActorFlow::Stop,
        }
        self.schedule_retirement(ctx);
        ActorFlow::Continue
    }

    async fn on_stop(&mut self) {
        if self.session.game.status == GameStatus::Active {
            tracing::warn!(game_id = %self.session.game.id, "Game actor stopped mid-game");
        }
    }
}
