//! 外部协作方接口：规则预言机与局面校验器
//!
//! 引擎不理解走子规则。`GridOracle` 是一个只检查占位的内存实现，
//! 供开发模式与测试使用；正式部署通过 HTTP 客户端接入外部预言机。

use std::collections::BTreeMap;

use async_trait::async_trait;

use mt_core::board::{BoardHandle, BoardSituation, CompanionMove, RiskAssessment};
use mt_core::entity::{EntityKind, Side};
use mt_core::game::{GameResult, Outcome, OutcomeReason};
use mt_core::square::Square;
use mt_core::{MutinyError, Result};

use crate::roster;

/// 规则预言机
///
/// 不可达时返回 `MutinyError::ExternalUnavailable`。
#[async_trait]
pub trait LegalityOracle: Send + Sync {
    /// 开局局面
    async fn start_position(&self) -> Result<BoardHandle>;

    async fn is_legal(&self, board: &BoardHandle, from: Square, to: Square) -> Result<bool>;

    async fn apply(&self, board: &BoardHandle, from: Square, to: Square) -> Result<BoardHandle>;

    async fn risk_of(&self, board: &BoardHandle, from: Square, to: Square)
        -> Result<RiskAssessment>;

    async fn situation(&self, board: &BoardHandle) -> Result<BoardSituation>;
}

/// 局面校验器：论据与棋盘事实的符合度
#[async_trait]
pub trait BoardTruthChecker: Send + Sync {
    /// 返回 [0, 1] 的准确度
    async fn verify_claim(&self, board: &BoardHandle, claim: &str) -> Result<f64>;
}

/// 固定返回同一准确度的校验器
#[derive(Debug, Clone, Copy)]
pub struct FixedTruthChecker(pub f64);

impl Default for FixedTruthChecker {
    fn default() -> Self {
        Self(0.5)
    }
}

#[async_trait]
impl BoardTruthChecker for FixedTruthChecker {
    async fn verify_claim(&self, _board: &BoardHandle, _claim: &str) -> Result<f64> {
        Ok(self.0.clamp(0.0, 1.0))
    }
}

type Piece = (Side, EntityKind);

/// `GridOracle` 的棋盘编码: `<side>|<ply>|<square>=<piece>,...`，如 `w|0|e1=wK,e2=wP`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridBoard {
    pub side_to_move: Side,
    pub ply: u32,
    pub pieces: BTreeMap<Square, Piece>,
}

fn side_code(side: Side) -> char {
    match side {
        Side::White => 'w',
        Side::Black => 'b',
    }
}

fn kind_code(kind: EntityKind) -> char {
    match kind {
        EntityKind::Pawn => 'P',
        EntityKind::Knight => 'N',
        EntityKind::Bishop => 'B',
        EntityKind::Rook => 'R',
        EntityKind::Queen => 'Q',
        EntityKind::King => 'K',
    }
}

fn parse_side(c: char) -> Option<Side> {
    match c {
        'w' => Some(Side::White),
        'b' => Some(Side::Black),
        _ => None,
    }
}

fn parse_kind(c: char) -> Option<EntityKind> {
    match c {
        'P' => Some(EntityKind::Pawn),
        'N' => Some(EntityKind::Knight),
        'B' => Some(EntityKind::Bishop),
        'R' => Some(EntityKind::Rook),
        'Q' => Some(EntityKind::Queen),
        'K' => Some(EntityKind::King),
        _ => None,
    }
}

impl GridBoard {
    pub fn classic() -> Self {
        Self {
            side_to_move: Side::White,
            ply: 0,
            pieces: roster::classic_layout()
                .into_iter()
                .map(|(side, kind, square)| (square, (side, kind)))
                .collect(),
        }
    }

    pub fn encode(&self) -> BoardHandle {
        let pieces: Vec<String> = self
            .pieces
            .iter()
            .map(|(sq, (side, kind))| format!("{sq}={}{}", side_code(*side), kind_code(*kind)))
            .collect();
        BoardHandle::new(format!(
            "{}|{}|{}",
            side_code(self.side_to_move),
            self.ply,
            pieces.join(",")
        ))
    }

    pub fn decode(handle: &BoardHandle) -> Result<Self> {
        let malformed = || MutinyError::ExternalUnavailable(format!("malformed board handle: {handle}"));
        let mut parts = handle.as_str().splitn(3, '|');
        let side = parts
            .next()
            .and_then(|s| s.chars().next())
            .and_then(parse_side)
            .ok_or_else(malformed)?;
        let ply = parts
            .next()
            .and_then(|s| s.parse::<u32>().ok())
            .ok_or_else(malformed)?;

        let mut pieces = BTreeMap::new();
        for entry in parts.next().unwrap_or_default().split(',').filter(|e| !e.is_empty()) {
            let (sq, code) = entry.split_once('=').ok_or_else(malformed)?;
            let square: Square = sq.parse().map_err(|_| malformed())?;
            let mut chars = code.chars();
            let side = chars.next().and_then(parse_side).ok_or_else(malformed)?;
            let kind = chars.next().and_then(parse_kind).ok_or_else(malformed)?;
            pieces.insert(square, (side, kind));
        }

        Ok(Self {
            side_to_move: side,
            ply,
            pieces,
        })
    }

    fn is_legal(&self, from: Square, to: Square) -> bool {
        if from == to {
            return false;
        }
        match (self.pieces.get(&from), self.pieces.get(&to)) {
            (Some((side, _)), target) => {
                *side == self.side_to_move && target.map_or(true, |(s, _)| s != side)
            }
            (None, _) => false,
        }
    }

    fn promotion(&self, from: Square, to: Square) -> Option<EntityKind> {
        let (side, kind) = self.pieces.get(&from)?;
        let last_rank = match side {
            Side::White => 7,
            Side::Black => 0,
        };
        (*kind == EntityKind::Pawn && to.rank() == last_rank).then_some(EntityKind::Queen)
    }

    /// 王从初始格横移两格且角上有己方车时视为易位，返回车的走法
    fn castling_rook(&self, from: Square, to: Square) -> Option<CompanionMove> {
        let (side, kind) = self.pieces.get(&from)?;
        let home = match side {
            Side::White => 0,
            Side::Black => 7,
        };
        if *kind != EntityKind::King || from != Square::new(4, home)? || to.rank() != home {
            return None;
        }
        let (rook_file, rook_to) = match to.file() {
            6 => (7, 5),
            2 => (0, 3),
            _ => return None,
        };
        let rook = CompanionMove {
            from: Square::new(rook_file, home)?,
            to: Square::new(rook_to, home)?,
        };
        (self.pieces.get(&rook.from) == Some(&(*side, EntityKind::Rook))).then_some(rook)
    }

    /// 兵从第五横线斜进到空格且身旁是敌兵时吃过路兵，返回被吃兵所在格
    fn en_passant_victim(&self, from: Square, to: Square) -> Option<Square> {
        let (side, kind) = self.pieces.get(&from)?;
        let (rank, next) = match side {
            Side::White => (4, 5),
            Side::Black => (3, 2),
        };
        if *kind != EntityKind::Pawn
            || from.rank() != rank
            || to.rank() != next
            || from.file().abs_diff(to.file()) != 1
            || self.pieces.contains_key(&to)
        {
            return None;
        }
        let victim = Square::new(to.file(), rank)?;
        matches!(self.pieces.get(&victim), Some((s, EntityKind::Pawn)) if s != side)
            .then_some(victim)
    }

    fn attacked_by(&self, square: Square, attacker: Side, ignore: Option<Square>) -> bool {
        self.pieces.iter().any(|(sq, (side, _))| {
            *side == attacker && Some(*sq) != ignore && *sq != square && sq.distance(&square) <= 1
        })
    }

    fn king_of(&self, side: Side) -> Option<Square> {
        self.pieces
            .iter()
            .find(|(_, (s, k))| *s == side && *k == EntityKind::King)
            .map(|(sq, _)| *sq)
    }
}

/// 只检查占位的内存规则预言机
///
/// - 合法：起点是行棋方的子，终点不是己方子
/// - 风险：终点与任一敌子相邻
/// - 兵到底线升变为后；王被吃即判将死
/// - 识别王车易位与吃过路兵
#[derive(Debug, Default, Clone, Copy)]
pub struct GridOracle;

#[async_trait]
impl LegalityOracle for GridOracle {
    async fn start_position(&self) -> Result<BoardHandle> {
        Ok(GridBoard::classic().encode())
    }

    async fn is_legal(&self, board: &BoardHandle, from: Square, to: Square) -> Result<bool> {
        Ok(GridBoard::decode(board)?.is_legal(from, to))
    }

    async fn apply(&self, board: &BoardHandle, from: Square, to: Square) -> Result<BoardHandle> {
        let mut grid = GridBoard::decode(board)?;
        if !grid.is_legal(from, to) {
            return Err(MutinyError::IllegalTransition { from, to });
        }
        let promotion = grid.promotion(from, to);
        let companion = grid.castling_rook(from, to);
        if let Some(victim) = grid.en_passant_victim(from, to) {
            grid.pieces.remove(&victim);
        }
        if let Some((side, kind)) = grid.pieces.remove(&from) {
            grid.pieces.insert(to, (side, promotion.unwrap_or(kind)));
        }
        if let Some(rook) = companion {
            if let Some(piece) = grid.pieces.remove(&rook.from) {
                grid.pieces.insert(rook.to, piece);
            }
        }
        grid.side_to_move = grid.side_to_move.opposite();
        grid.ply += 1;
        Ok(grid.encode())
    }

    async fn risk_of(
        &self,
        board: &BoardHandle,
        from: Square,
        to: Square,
    ) -> Result<RiskAssessment> {
        let grid = GridBoard::decode(board)?;
        let mover = grid
            .pieces
            .get(&from)
            .map(|(side, _)| *side)
            .unwrap_or(grid.side_to_move);
        let en_passant = grid.en_passant_victim(from, to);
        let captured_kind = grid
            .pieces
            .get(&en_passant.unwrap_or(to))
            .filter(|(side, _)| *side != mover)
            .map(|(_, kind)| *kind);

        Ok(RiskAssessment {
            is_risky: grid.attacked_by(to, mover.opposite(), Some(to)),
            captured_kind,
            promotes_to: grid.promotion(from, to),
            captured_at: en_passant,
            companion: grid.castling_rook(from, to),
        })
    }

    async fn situation(&self, board: &BoardHandle) -> Result<BoardSituation> {
        let grid = GridBoard::decode(board)?;
        let material_balance = grid
            .pieces
            .values()
            .map(|(side, kind)| match side {
                Side::White => kind.material_value(),
                Side::Black => -kind.material_value(),
            })
            .sum();

        let outcome = match (grid.king_of(Side::White), grid.king_of(Side::Black)) {
            (None, _) => Some(Outcome::new(GameResult::BlackWins, OutcomeReason::Checkmate)),
            (_, None) => Some(Outcome::new(GameResult::WhiteWins, OutcomeReason::Checkmate)),
            _ => None,
        };
        let in_check = grid
            .king_of(grid.side_to_move)
            .map(|king| grid.attacked_by(king, grid.side_to_move.opposite(), None))
            .unwrap_or(false);

        Ok(BoardSituation {
            in_check,
            material_balance,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_encode_decode_round_trip() {
        let board = GridBoard::classic();
        let decoded = GridBoard::decode(&board.encode()).unwrap();
        assert_eq!(decoded, board);
        assert!(GridBoard::decode(&BoardHandle::new("garbage")).is_err());
    }

    #[tokio::test]
    async fn test_legality_and_apply() {
        let oracle = GridOracle;
        let board = oracle.start_position().await.unwrap();
        assert!(oracle.is_legal(&board, sq("e2"), sq("e4")).await.unwrap());
        assert!(!oracle.is_legal(&board, sq("e7"), sq("e5")).await.unwrap());
        assert!(!oracle.is_legal(&board, sq("e1"), sq("d1")).await.unwrap());
        assert!(!oracle.is_legal(&board, sq("e4"), sq("e5")).await.unwrap());

        let next = oracle.apply(&board, sq("e2"), sq("e4")).await.unwrap();
        let grid = GridBoard::decode(&next).unwrap();
        assert_eq!(grid.side_to_move, Side::Black);
        assert_eq!(grid.ply, 1);
        assert!(grid.pieces.contains_key(&sq("e4")));
        assert!(matches!(
            oracle.apply(&next, sq("e4"), sq("e5")).await,
            Err(MutinyError::IllegalTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_risk_capture_and_promotion() {
        let oracle = GridOracle;
        let board = BoardHandle::new("w|10|a7=wP,b8=bN,e1=wK,e8=bK,d5=bP,d4=wQ");

        let risk = oracle.risk_of(&board, sq("a7"), sq("a8")).await.unwrap();
        assert!(risk.is_risky);
        assert_eq!(risk.promotes_to, Some(EntityKind::Queen));

        let risk = oracle.risk_of(&board, sq("d4"), sq("d5")).await.unwrap();
        assert_eq!(risk.captured_kind, Some(EntityKind::Pawn));
        assert!(!risk.is_risky);

        let risk = oracle.risk_of(&board, sq("e1"), sq("f1")).await.unwrap();
        assert_eq!(risk, RiskAssessment::default());
    }

    #[tokio::test]
    async fn test_castling_and_en_passant() {
        let oracle = GridOracle;
        let board = BoardHandle::new("w|12|e1=wK,h1=wR,a1=wR,e8=bK,e5=wP,d5=bP");

        let risk = oracle.risk_of(&board, sq("e1"), sq("g1")).await.unwrap();
        assert_eq!(
            risk.companion,
            Some(CompanionMove {
                from: sq("h1"),
                to: sq("f1")
            })
        );
        let next = GridBoard::decode(&oracle.apply(&board, sq("e1"), sq("c1")).await.unwrap())
            .unwrap();
        assert_eq!(next.pieces.get(&sq("d1")), Some(&(Side::White, EntityKind::Rook)));
        assert!(!next.pieces.contains_key(&sq("a1")));

        let risk = oracle.risk_of(&board, sq("e5"), sq("d6")).await.unwrap();
        assert_eq!(risk.captured_kind, Some(EntityKind::Pawn));
        assert_eq!(risk.captured_at, Some(sq("d5")));
        assert_eq!(risk.capture_square(sq("d6")), Some(sq("d5")));
        let next = GridBoard::decode(&oracle.apply(&board, sq("e5"), sq("d6")).await.unwrap())
            .unwrap();
        assert!(!next.pieces.contains_key(&sq("d5")));
        assert_eq!(next.pieces.get(&sq("d6")), Some(&(Side::White, EntityKind::Pawn)));

        // 普通斜进不是吃过路兵
        let risk = oracle.risk_of(&board, sq("e5"), sq("f6")).await.unwrap();
        assert!(!risk.is_capture());
        assert!(risk.companion.is_none());
    }

    #[tokio::test]
    async fn test_situation() {
        let oracle = GridOracle;
        let board = BoardHandle::new("b|20|e1=wK,e8=bK,e7=wQ");
        let situation = oracle.situation(&board).await.unwrap();
        assert!(situation.in_check);
        assert_eq!(situation.material_balance, 9);
        assert!(situation.outcome.is_none());

        let board = BoardHandle::new("b|21|e1=wK,e8=wQ");
        let situation = oracle.situation(&board).await.unwrap();
        assert_eq!(
            situation.outcome,
            Some(Outcome::new(GameResult::WhiteWins, OutcomeReason::Checkmate))
        );
    }
}
