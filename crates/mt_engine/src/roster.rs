//! 标准开局阵容

use mt_core::entity::{Entity, EntityKind, Side};
use mt_core::square::Square;

const BACK_RANK: [EntityKind; 8] = [
    EntityKind::Rook,
    EntityKind::Knight,
    EntityKind::Bishop,
    EntityKind::Queen,
    EntityKind::King,
    EntityKind::Bishop,
    EntityKind::Knight,
    EntityKind::Rook,
];

/// 标准 32 子布局 (阵营, 兵种, 格子)
pub fn classic_layout() -> Vec<(Side, EntityKind, Square)> {
    let mut layout = Vec::with_capacity(32);
    for (side, back, pawns) in [(Side::White, 0u8, 1u8), (Side::Black, 7, 6)] {
        for file in 0..8u8 {
            if let Some(square) = Square::new(file, back) {
                layout.push((side, BACK_RANK[file as usize], square));
            }
            if let Some(square) = Square::new(file, pawns) {
                layout.push((side, EntityKind::Pawn, square));
            }
        }
    }
    layout
}

/// 按标准布局生成实体，全部使用默认性格
pub fn classic_roster(starting_willingness: u8) -> Vec<Entity> {
    classic_layout()
        .into_iter()
        .map(|(side, kind, square)| {
            Entity::new(side, kind, square).with_willingness(starting_willingness)
        })
        .collect()
}
