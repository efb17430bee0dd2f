//! 指令决议与走子提交
//!
//! 单条指令的状态机：
//!
//! ```text
//! Received -> Validated -> Decided -> Applied
//!                                  -> Refused -> PersuasionPending -> Applied | Terminated
//! ```
//!
//! 提交顺序：先调用预言机 `apply` (唯一可能失败的外部步骤)，成功后才写
//! 实体位置、吃子、升变、意愿事件与回合推进；任何一步失败都整体回滚。
//! 每条指令恰好产生一条终态记录。

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mt_core::board::{BoardHandle, BoardSituation, RiskAssessment};
use mt_core::event::{DomainEvent, DomainEventKind, WillingnessEvent, WillingnessEventKind};
use mt_core::game::{Game, GameStatus, Outcome};
use mt_core::ids::{CommandId, EntityId, GameId, PlayerId};
use mt_core::record::{
    CommandResolution, PersuasionAttempt, ResolutionOutcome, TerminationReason, VerdictSource,
};
use mt_core::square::Square;
use mt_core::{MutinyError, Result};
use mt_durable::Outbox;
use mt_judgment::{BudgetScope, Judge, ObedienceContext, PersonaSnapshot, PersuasionContext};

use crate::commentary::{self, AppliedMove, Followup};
use crate::ledger::EventContext;
use crate::obedience::ObedienceService;
use crate::oracle::{BoardTruthChecker, LegalityOracle};
use crate::persuasion::{ArbiterInputs, PersuasionArbiter, PersuasionOutcome, ThresholdPolicy};
use crate::session::{GameSession, PendingCommand, ValidatedCommand};
use crate::turn;

/// 指令备注中视为称赞的词
pub const PRAISE_WORDS: &[&str] = &[
    "good", "great", "brilliant", "brave", "excellent", "well done", "proud", "thank",
];

/// 走子指令
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    pub issuer: PlayerId,
    pub entity_id: EntityId,
    pub target: String,
    #[serde(default)]
    pub note: Option<String>,
    /// 调用方看到的半回合数，不一致时拒绝
    #[serde(default)]
    pub expected_ply: Option<u32>,
}

/// 说服请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersuasionRequest {
    pub issuer: PlayerId,
    pub entity_id: EntityId,
    pub target: String,
    pub text: String,
    #[serde(default)]
    pub is_voice: bool,
}

#[derive(Debug, Clone)]
pub struct Resolved {
    pub resolution: CommandResolution,
    pub followup: Option<Followup>,
}

#[derive(Debug, Clone)]
pub struct Persuaded {
    pub attempt: PersuasionAttempt,
    pub resolution: CommandResolution,
    pub followup: Option<Followup>,
}

/// 对局状态变更记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: GameStatus,
    pub outcome: Option<Outcome>,
    pub ply: u32,
}

impl StatusChange {
    pub fn of(game: &Game) -> Self {
        Self {
            status: game.status,
            outcome: game.outcome,
            ply: game.ply,
        }
    }
}

/// 提交路径携带的裁决
struct CommitVerdict {
    narrative: String,
    /// good-position 的增量提示
    hint: Option<i32>,
    source: VerdictSource,
    persuaded: bool,
}

pub fn contains_praise(note: &str) -> bool {
    let lowered = note.to_lowercase();
    PRAISE_WORDS.iter().any(|word| lowered.contains(word))
}

fn scope_of(game: &Game) -> BudgetScope {
    BudgetScope::new(game.id, game.ply)
}

pub struct CommandResolver {
    oracle: Arc<dyn LegalityOracle>,
    truth: Arc<dyn BoardTruthChecker>,
    judge: Arc<dyn Judge>,
    obedience: ObedienceService,
    arbiter: PersuasionArbiter,
    outbox: Arc<Outbox>,
}

impl CommandResolver {
    pub fn new(
        oracle: Arc<dyn LegalityOracle>,
        truth: Arc<dyn BoardTruthChecker>,
        judge: Arc<dyn Judge>,
        policy: ThresholdPolicy,
        outbox: Arc<Outbox>,
    ) -> Self {
        Self {
            obedience: ObedienceService::new(judge.clone()),
            arbiter: PersuasionArbiter::new(judge.clone(), policy),
            oracle,
            truth,
            judge,
            outbox,
        }
    }

    pub fn judge(&self) -> Arc<dyn Judge> {
        self.judge.clone()
    }

    pub fn oracle(&self) -> &Arc<dyn LegalityOracle> {
        &self.oracle
    }

    pub fn outbox(&self) -> &Arc<Outbox> {
        &self.outbox
    }

    /// 校验指令 (无副作用)，最后询问预言机是否合法
    async fn validate(
        &self,
        session: &GameSession,
        issuer: &PlayerId,
        entity_id: EntityId,
        target: &str,
        note: Option<String>,
        expected_ply: Option<u32>,
    ) -> Result<ValidatedCommand> {
        let game = &session.game;
        turn::ensure_active(game)?;
        let side = game.side_of(issuer).ok_or(MutinyError::NotAPlayer)?;
        if side != game.side_to_move {
            return Err(MutinyError::NotYourTurn);
        }

        let entity = session
            .ledger
            .entity(entity_id)
            .ok_or(MutinyError::UnknownEntity(entity_id))?;
        if entity.side != side {
            return Err(MutinyError::NotYourEntity(entity_id));
        }
        let from = match entity.position {
            Some(square) if !entity.removed => square,
            _ => return Err(MutinyError::EntityRemoved(entity_id)),
        };
        let to: Square = target.parse()?;
        if let Some(expected) = expected_ply {
            if expected != game.ply {
                return Err(MutinyError::ConcurrencyConflict {
                    expected,
                    actual: game.ply,
                });
            }
        }

        if !self.oracle.is_legal(&game.board, from, to).await? {
            return Err(MutinyError::IllegalTransition { from, to });
        }

        Ok(ValidatedCommand {
            id: CommandId::new(),
            issuer: issuer.clone(),
            side,
            entity_id,
            from,
            to,
            note,
        })
    }

    /// 决议一条走子指令
    pub async fn resolve(
        &self,
        session: &mut GameSession,
        request: CommandRequest,
    ) -> Result<Resolved> {
        let command = self
            .validate(
                session,
                &request.issuer,
                request.entity_id,
                &request.target,
                request.note,
                request.expected_ply,
            )
            .await?;
        let risk = self
            .oracle
            .risk_of(&session.game.board, command.from, command.to)
            .await?;
        self.supersede(session).await;

        let entity = session
            .ledger
            .entity(command.entity_id)
            .ok_or(MutinyError::UnknownEntity(command.entity_id))?;
        let ctx = ObedienceContext {
            board: session.game.board.clone(),
            persona: PersonaSnapshot::from(entity),
            from: command.from,
            to: command.to,
            base_rate: entity.willingness.base_rate(),
            risk: risk.clone(),
            note: command.note.clone(),
            difficulty: session.game.config.difficulty,
            risk_tolerance: session.game.config.risk_tolerance,
        };
        let willingness = entity.willingness.value();
        let decision = self.obedience.decide(ctx, scope_of(&session.game)).await;

        if decision.will_obey {
            let verdict = CommitVerdict {
                narrative: decision.narrative,
                hint: Some(decision.willingness_delta_suggestion),
                source: decision.source,
                persuaded: false,
            };
            return self.commit(session, command, risk, verdict).await;
        }

        let resolution = CommandResolution {
            command_id: command.id,
            game_id: session.game.id,
            entity_id: command.entity_id,
            from: command.from,
            to: command.to,
            outcome: ResolutionOutcome::Refused,
            narrative: decision.narrative,
            willingness_before: willingness,
            willingness_after: willingness,
            events: Vec::new(),
            captured: None,
            promoted_to: None,
            ply: session.game.ply,
            source: decision.source,
            termination: None,
            resolved_at: Utc::now(),
        };
        tracing::info!(
            game_id = %session.game.id,
            command_id = %command.id,
            willingness,
            "Command refused, awaiting persuasion"
        );
        session.pending = Some(PendingCommand {
            command,
            risk,
            refused_at: Utc::now(),
        });
        self.publish_resolution(session, &resolution).await;

        Ok(Resolved {
            resolution,
            followup: None,
        })
    }

    /// 说服：优先使用同一实体同一目标的待说服指令，否则重新校验一条
    ///
    /// `is_cancelled` 在写入前检查，调用方已离开时丢弃裁决，指令保持待说服。
    pub async fn persuade<F>(
        &self,
        session: &mut GameSession,
        request: PersuasionRequest,
        is_cancelled: F,
    ) -> Result<Persuaded>
    where
        F: Fn() -> bool + Send + Sync,
    {
        turn::ensure_active(&session.game)?;
        let to: Square = request.target.parse()?;

        // 只有先前被拒绝的指令在失败后回到待说服状态
        let taken = session.take_pending_for(&request.issuer, request.entity_id, to);
        let (pending, refused) = match taken {
            Some(pending) => (pending, true),
            None => {
                let command = self
                    .validate(
                        session,
                        &request.issuer,
                        request.entity_id,
                        &request.target,
                        None,
                        None,
                    )
                    .await?;
                let risk = self
                    .oracle
                    .risk_of(&session.game.board, command.from, command.to)
                    .await?;
                self.supersede(session).await;
                let pending = PendingCommand {
                    command,
                    risk,
                    refused_at: Utc::now(),
                };
                (pending, false)
            }
        };

        let outcome = match self.arbitrate(session, &pending, &request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                if refused {
                    session.pending = Some(pending);
                }
                return Err(e);
            }
        };

        if is_cancelled() {
            tracing::info!(
                game_id = %session.game.id,
                command_id = %pending.command.id,
                "Persuasion caller went away, verdict discarded"
            );
            session.pending = Some(pending);
            return Err(MutinyError::Cancelled);
        }

        let attempt = PersuasionAttempt {
            id: Uuid::new_v4(),
            game_id: session.game.id,
            command_id: pending.command.id,
            entity_id: pending.command.entity_id,
            issuer: request.issuer,
            justification: request.text,
            is_voice: request.is_voice,
            succeeded: outcome.succeeded,
            probability: outcome.probability,
            breakdown: outcome.breakdown,
            narrative: outcome.narrative.clone(),
            source: outcome.source,
            timestamp: Utc::now(),
        };
        session.attempts.push(attempt.clone());
        self.publish(vec![record(
            DomainEventKind::PersuasionAttempted,
            session.game.id,
            &attempt,
            Some(attempt.command_id),
        )])
        .await;

        if outcome.succeeded {
            let verdict = CommitVerdict {
                narrative: outcome.narrative,
                hint: None,
                source: outcome.source,
                persuaded: true,
            };
            return match self
                .commit(session, pending.command.clone(), pending.risk.clone(), verdict)
                .await
            {
                Ok(resolved) => Ok(Persuaded {
                    attempt,
                    resolution: resolved.resolution,
                    followup: resolved.followup,
                }),
                Err(e) => {
                    if refused {
                        session.pending = Some(pending);
                    }
                    Err(e)
                }
            };
        }

        let resolution = self.reject(session, pending, outcome.narrative, outcome.source)?;
        self.publish_resolution(session, &resolution).await;
        Ok(Persuaded {
            attempt,
            resolution,
            followup: None,
        })
    }

    async fn arbitrate(
        &self,
        session: &GameSession,
        pending: &PendingCommand,
        request: &PersuasionRequest,
    ) -> Result<PersuasionOutcome> {
        let game = &session.game;
        let command = &pending.command;
        let entity = session
            .ledger
            .entity(command.entity_id)
            .ok_or(MutinyError::UnknownEntity(command.entity_id))?;

        let situation = self.oracle.situation(&game.board).await?;
        let claim_accuracy = self.truth.verify_claim(&game.board, &request.text).await?;
        let ctx = PersuasionContext {
            board: game.board.clone(),
            persona: PersonaSnapshot::from(entity),
            from: command.from,
            to: command.to,
            is_risky: pending.risk.is_risky,
            argument: request.text.clone(),
            is_voice: request.is_voice,
            claim_accuracy,
        };
        let trust = game.trust_of(&command.issuer);
        let inputs = ArbiterInputs {
            trust: &trust,
            situation: &situation,
            acting: command.side,
            ply: game.ply,
        };
        Ok(self.arbiter.evaluate(ctx, scope_of(game), inputs).await)
    }

    /// 说服失败：记录 persuasion-failed 并终止指令
    fn reject(
        &self,
        session: &mut GameSession,
        pending: PendingCommand,
        narrative: String,
        source: VerdictSource,
    ) -> Result<CommandResolution> {
        let command = pending.command;
        let before = session
            .ledger
            .willingness(command.entity_id)
            .ok_or(MutinyError::UnknownEntity(command.entity_id))?;

        session.mark_resolved(command.id)?;
        self.judge.forget_command(scope_of(&session.game));
        let event = session.ledger.apply_event(
            command.entity_id,
            WillingnessEventKind::PersuasionFailed,
            &EventContext::for_command(command.id),
        )?;
        tracing::info!(
            game_id = %session.game.id,
            command_id = %command.id,
            "Persuasion failed, command terminated"
        );

        Ok(CommandResolution {
            command_id: command.id,
            game_id: session.game.id,
            entity_id: command.entity_id,
            from: command.from,
            to: command.to,
            outcome: ResolutionOutcome::Terminated,
            narrative,
            willingness_before: before,
            willingness_after: event.score_after,
            events: vec![event],
            captured: None,
            promoted_to: None,
            ply: session.game.ply,
            source,
            termination: Some(TerminationReason::PersuasionFailed),
            resolved_at: Utc::now(),
        })
    }

    /// 原子提交
    async fn commit(
        &self,
        session: &mut GameSession,
        command: ValidatedCommand,
        risk: RiskAssessment,
        verdict: CommitVerdict,
    ) -> Result<Resolved> {
        if session.is_resolved(command.id) {
            return Err(MutinyError::Actor(format!(
                "command {} already has a terminal resolution",
                command.id
            )));
        }

        let board = self
            .oracle
            .apply(&session.game.board, command.from, command.to)
            .await?;
        let situation = self.oracle.situation(&board).await?;
        let before = session
            .ledger
            .willingness(command.entity_id)
            .ok_or(MutinyError::UnknownEntity(command.entity_id))?;

        let scope = scope_of(&session.game);
        let checkpoint = session.ledger.checkpoint();
        let game_before = session.game.clone();
        let (events, ended) =
            match write_effects(session, &command, &risk, &verdict, board.clone(), &situation) {
                Ok(written) => written,
                Err(e) => {
                    session.ledger.rollback(checkpoint);
                    session.game = game_before;
                    tracing::warn!(
                        game_id = %session.game.id,
                        command_id = %command.id,
                        error = %e,
                        "Commit rolled back"
                    );
                    return Err(e);
                }
            };

        let mover = session.ledger.entity(command.entity_id);
        let after = mover.map_or(before, |e| e.willingness.value());
        let mover_kind = mover.map(|e| e.effective_kind());
        let resolution = CommandResolution {
            command_id: command.id,
            game_id: session.game.id,
            entity_id: command.entity_id,
            from: command.from,
            to: command.to,
            outcome: ResolutionOutcome::Applied,
            narrative: verdict.narrative,
            willingness_before: before,
            willingness_after: after,
            events,
            captured: risk.captured_kind,
            promoted_to: risk.promotes_to,
            ply: session.game.ply,
            source: verdict.source,
            termination: None,
            resolved_at: Utc::now(),
        };
        tracing::info!(
            game_id = %session.game.id,
            command_id = %command.id,
            from = %command.from,
            to = %command.to,
            ply = session.game.ply,
            persuaded = verdict.persuaded,
            "Command applied"
        );
        self.publish_resolution(session, &resolution).await;

        if ended.is_some() {
            self.conclude(session).await;
            return Ok(Resolved {
                resolution,
                followup: None,
            });
        }

        let followup = mover_kind.map(|mover| {
            let mv = AppliedMove {
                board,
                mover,
                side: command.side,
                from: command.from,
                to: command.to,
                ply: session.game.ply,
            };
            Followup {
                game_id: session.game.id,
                command_id: command.id,
                entity_id: command.entity_id,
                scope,
                analysis: Some(commentary::analysis_for(&mv, &risk, &situation)),
                taunt: commentary::choose_taunt(&mv, &risk, &situation),
            }
        });
        if followup.is_none() {
            self.judge.forget_command(scope);
        }

        Ok(Resolved {
            resolution,
            followup,
        })
    }

    /// 以 superseded 终止当前待说服指令
    pub async fn supersede(&self, session: &mut GameSession) {
        if let Some(pending) = session.pending.take() {
            self.terminate(session, pending, TerminationReason::Superseded)
                .await;
        }
    }

    async fn terminate(
        &self,
        session: &mut GameSession,
        pending: PendingCommand,
        reason: TerminationReason,
    ) {
        let command = pending.command;
        if let Err(e) = session.mark_resolved(command.id) {
            tracing::warn!(command_id = %command.id, error = %e, "Skipping duplicate termination");
            return;
        }
        let willingness = session
            .ledger
            .willingness(command.entity_id)
            .unwrap_or_default();
        let narrative = match reason {
            TerminationReason::Superseded => "The order was withdrawn for a new one.",
            TerminationReason::GameEnded => "The game ended before the order was carried out.",
            TerminationReason::PersuasionFailed => "The order was refused.",
        };
        let resolution = CommandResolution {
            command_id: command.id,
            game_id: session.game.id,
            entity_id: command.entity_id,
            from: command.from,
            to: command.to,
            outcome: ResolutionOutcome::Terminated,
            narrative: narrative.to_string(),
            willingness_before: willingness,
            willingness_after: willingness,
            events: Vec::new(),
            captured: None,
            promoted_to: None,
            ply: session.game.ply,
            source: VerdictSource::Rule,
            termination: Some(reason),
            resolved_at: Utc::now(),
        };
        tracing::debug!(
            game_id = %session.game.id,
            command_id = %command.id,
            reason = ?reason,
            "Pending command terminated"
        );
        self.publish_resolution(session, &resolution).await;
        self.judge.forget_command(scope_of(&session.game));
    }

    /// 对局进入终态后的收尾：终止待说服指令，释放预算，广播状态
    pub async fn conclude(&self, session: &mut GameSession) {
        if let Some(pending) = session.pending.take() {
            self.terminate(session, pending, TerminationReason::GameEnded)
                .await;
        }
        session.draw_offers.clear();
        self.judge.forget_game(session.game.id);
        tracing::info!(
            game_id = %session.game.id,
            status = %session.game.status,
            outcome = ?session.game.outcome,
            "Game concluded"
        );
        self.publish_status(&session.game).await;
    }

    pub async fn publish_status(&self, game: &Game) {
        self.publish(vec![record(
            DomainEventKind::GameStatusChanged,
            game.id,
            &StatusChange::of(game),
            None,
        )])
        .await;
    }

    pub async fn publish_events(&self, game_id: GameId, events: &[WillingnessEvent]) {
        let records = events
            .iter()
            .map(|event| {
                record(
                    DomainEventKind::WillingnessChanged,
                    game_id,
                    event,
                    event.command_id,
                )
            })
            .collect();
        self.publish(records).await;
    }

    /// 记入会话历史并写入发件箱
    async fn publish_resolution(
        &self,
        session: &mut GameSession,
        resolution: &CommandResolution,
    ) {
        session.resolutions.push(resolution.clone());
        let mut records = vec![record(
            DomainEventKind::CommandResolved,
            resolution.game_id,
            resolution,
            Some(resolution.command_id),
        )];
        records.extend(resolution.events.iter().map(|event| {
            record(
                DomainEventKind::WillingnessChanged,
                resolution.game_id,
                event,
                event.command_id,
            )
        }));
        self.publish(records).await;
    }

    /// 写入发件箱，不等待投递确认，失败只记日志
    pub async fn publish(&self, records: Vec<Option<DomainEvent>>) {
        let batch: Vec<DomainEvent> = records.into_iter().flatten().collect();
        if let Err(e) = self.outbox.append_batch(batch).await {
            tracing::warn!(error = %e, "Failed to append records to outbox");
        }
    }
}

/// 构造领域记录，序列化失败时记日志并跳过
pub fn record<T: Serialize>(
    kind: DomainEventKind,
    game_id: GameId,
    payload: &T,
    cause: Option<CommandId>,
) -> Option<DomainEvent> {
    match DomainEvent::from_record(kind, game_id, payload) {
        Ok(event) => Some(match cause {
            Some(command_id) => event.with_causation(command_id),
            None => event,
        }),
        Err(e) => {
            tracing::warn!(kind = kind.as_str(), error = %e, "Failed to encode domain record");
            None
        }
    }
}

/// 提交的同步部分：账本效果、回合推进、终态登记
fn write_effects(
    session: &mut GameSession,
    command: &ValidatedCommand,
    risk: &RiskAssessment,
    verdict: &CommitVerdict,
    board: BoardHandle,
    situation: &BoardSituation,
) -> Result<(Vec<WillingnessEvent>, Option<Outcome>)> {
    let ledger = &mut session.ledger;
    let cause = Some(command.id);
    let ctx = EventContext::for_command(command.id);
    let mut events = Vec::new();

    if let Some(square) = risk.capture_square(command.to) {
        let victim = ledger
            .entity_at(square)
            .filter(|e| e.side != command.side)
            .map(|e| e.id);
        if let Some(victim) = victim {
            ledger.remove(victim)?;
            events.extend(ledger.apply_ally_lost(victim, cause)?);
        }
    }

    ledger.place(command.entity_id, command.to)?;
    if let Some(companion) = risk.companion {
        let rook = ledger
            .entity_at(companion.from)
            .filter(|e| e.side == command.side)
            .map(|e| e.id);
        if let Some(rook) = rook {
            ledger.place(rook, companion.to)?;
        }
    }
    if let Some(kind) = risk.promotes_to {
        events.push(ledger.promote(command.entity_id, kind, cause)?);
    }

    let (kind, hint) = if risk.is_capture() {
        (WillingnessEventKind::EnemyCaptured, None)
    } else if risk.is_risky {
        (WillingnessEventKind::Endangered, None)
    } else {
        (WillingnessEventKind::GoodPosition, verdict.hint)
    };
    let mover_ctx = match hint {
        Some(delta) => ctx.clone().with_hint(delta),
        None => ctx.clone(),
    };
    events.push(ledger.apply_event(command.entity_id, kind, &mover_ctx)?);

    if verdict.persuaded {
        events.push(ledger.apply_event(
            command.entity_id,
            WillingnessEventKind::PersuasionSucceeded,
            &ctx,
        )?);
    }
    if risk.is_risky && !risk.is_capture() {
        events.extend(ledger.apply_blunder(command.side, Some(command.entity_id), cause)?);
    }
    events.extend(ledger.tick_idle(command.side, command.entity_id, cause)?);
    if command.note.as_deref().map_or(false, contains_praise) {
        events.push(ledger.apply_event(
            command.entity_id,
            WillingnessEventKind::Compliment,
            &ctx,
        )?);
    }

    session.draw_offers.clear();
    let ended = turn::advance(&mut session.game, board, situation)?;
    session.mark_resolved(command.id)?;
    Ok((events, ended))
}
