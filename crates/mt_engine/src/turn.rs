//! 回合状态机
//!
//! `waiting -> setup -> active -> completed | abandoned`，每次 Applied 走子
//! 走 `active -> active` 边。所有迁移都经 [`Game::transition`] 校验。

use std::collections::BTreeSet;

use chrono::Utc;

use mt_core::board::{BoardHandle, BoardSituation};
use mt_core::entity::Side;
use mt_core::game::{Game, GameResult, GameStatus, Outcome, OutcomeReason};
use mt_core::ids::PlayerId;
use mt_core::{MutinyError, Result};

pub fn ensure_active(game: &Game) -> Result<()> {
    if game.status != GameStatus::Active {
        return Err(MutinyError::GameNotActive(game.id));
    }
    Ok(())
}

/// 第二位玩家加入，执黑
pub fn join(game: &mut Game, player: PlayerId) -> Result<Side> {
    if game.black.is_some() || game.white == player {
        return Err(MutinyError::GameFull);
    }
    game.transition(GameStatus::Setup)?;
    game.black = Some(player);
    Ok(Side::Black)
}

pub fn start(game: &mut Game, player: &PlayerId) -> Result<()> {
    if game.side_of(player).is_none() {
        return Err(MutinyError::NotAPlayer);
    }
    game.transition(GameStatus::Active)?;
    game.turn_started_at = Utc::now();
    Ok(())
}

/// 走子生效后推进回合，预言机判定终局时结束对局
pub fn advance(
    game: &mut Game,
    board: BoardHandle,
    situation: &BoardSituation,
) -> Result<Option<Outcome>> {
    game.transition(GameStatus::Active)?;
    game.board = board;
    game.side_to_move = game.side_to_move.opposite();
    game.ply += 1;
    game.turn_started_at = Utc::now();

    match situation.outcome {
        Some(outcome) => {
            finish(game, outcome)?;
            Ok(Some(outcome))
        }
        None => Ok(None),
    }
}

pub fn finish(game: &mut Game, outcome: Outcome) -> Result<()> {
    game.transition(GameStatus::Completed)?;
    game.outcome = Some(outcome);
    Ok(())
}

pub fn resign(game: &mut Game, side: Side) -> Result<Outcome> {
    ensure_active(game)?;
    let outcome = Outcome::new(GameResult::win_for(side.opposite()), OutcomeReason::Resignation);
    finish(game, outcome)?;
    Ok(outcome)
}

/// 记录一方的和棋意向，双方都同意时以和棋结束
pub fn agree_draw(
    game: &mut Game,
    offers: &mut BTreeSet<Side>,
    side: Side,
) -> Result<Option<Outcome>> {
    ensure_active(game)?;
    offers.insert(side);
    if offers.len() < 2 {
        return Ok(None);
    }
    let outcome = Outcome::new(GameResult::Draw, OutcomeReason::Agreement);
    finish(game, outcome)?;
    Ok(Some(outcome))
}

/// 行动方超时判负
pub fn timeout(game: &mut Game) -> Result<Outcome> {
    ensure_active(game)?;
    let loser = game.side_to_move;
    let outcome = Outcome::new(GameResult::win_for(loser.opposite()), OutcomeReason::Timeout);
    finish(game, outcome)?;
    Ok(outcome)
}

/// 放弃对局。进行中的对局判对方胜，未开始的对局没有结果
pub fn abandon(game: &mut Game, by: Side) -> Result<Option<Outcome>> {
    let outcome = (game.status == GameStatus::Active).then(|| {
        Outcome::new(GameResult::win_for(by.opposite()), OutcomeReason::Abandonment)
    });
    game.transition(GameStatus::Abandoned)?;
    game.outcome = outcome;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use mt_core::game::GameConfig;

    use super::*;

    fn game() -> Game {
        Game::new(
            PlayerId::from("alice"),
            BoardHandle::new("w|0|e1=wK,e8=bK"),
            GameConfig::default(),
        )
    }

    fn active_game() -> Game {
        let mut game = game();
        join(&mut game, PlayerId::from("bob")).unwrap();
        start(&mut game, &PlayerId::from("alice")).unwrap();
        game
    }

    #[test]
    fn test_lifecycle_to_checkmate() {
        let mut game = game();
        assert!(matches!(
            start(&mut game, &PlayerId::from("alice")),
            Err(MutinyError::InvalidTransition { .. })
        ));

        assert_eq!(join(&mut game, PlayerId::from("bob")).unwrap(), Side::Black);
        assert!(matches!(
            join(&mut game, PlayerId::from("carol")),
            Err(MutinyError::GameFull)
        ));
        assert!(matches!(
            start(&mut game, &PlayerId::from("carol")),
            Err(MutinyError::NotAPlayer)
        ));
        start(&mut game, &PlayerId::from("bob")).unwrap();

        let quiet = BoardSituation::default();
        assert_eq!(advance(&mut game, BoardHandle::new("b|1|"), &quiet).unwrap(), None);
        assert_eq!(game.side_to_move, Side::Black);
        assert_eq!(game.ply, 1);

        let mate = BoardSituation {
            outcome: Some(Outcome::new(GameResult::BlackWins, OutcomeReason::Checkmate)),
            ..Default::default()
        };
        let outcome = advance(&mut game, BoardHandle::new("w|2|"), &mate).unwrap();
        assert_eq!(outcome.map(|o| o.reason), Some(OutcomeReason::Checkmate));
        assert_eq!(game.status, GameStatus::Completed);
        assert!(matches!(ensure_active(&game), Err(MutinyError::GameNotActive(_))));
    }

    #[test]
    fn test_draw_needs_both_sides() {
        let mut game = active_game();
        let mut offers = BTreeSet::new();

        assert_eq!(agree_draw(&mut game, &mut offers, Side::White).unwrap(), None);
        assert_eq!(agree_draw(&mut game, &mut offers, Side::White).unwrap(), None);
        let outcome = agree_draw(&mut game, &mut offers, Side::Black).unwrap().unwrap();
        assert_eq!(outcome.result, GameResult::Draw);
        assert_eq!(game.status, GameStatus::Completed);
    }

    #[test]
    fn test_resign_timeout_and_abandon() {
        let mut game = active_game();
        let outcome = resign(&mut game, Side::White).unwrap();
        assert_eq!(outcome.result, GameResult::BlackWins);
        assert!(resign(&mut game, Side::Black).is_err());

        let mut game = active_game();
        let outcome = timeout(&mut game).unwrap();
        assert_eq!(outcome.result, GameResult::BlackWins);
        assert_eq!(outcome.reason, OutcomeReason::Timeout);

        let mut game = active_game();
        let outcome = abandon(&mut game, Side::Black).unwrap();
        assert_eq!(outcome.map(|o| o.result), Some(GameResult::WhiteWins));
        assert_eq!(game.status, GameStatus::Abandoned);

        let mut waiting = self::game();
        assert_eq!(abandon(&mut waiting, Side::White).unwrap(), None);
        assert!(abandon(&mut waiting, Side::White).is_err());
    }
}
