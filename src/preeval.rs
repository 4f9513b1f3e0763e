//! 局面预评价
//!
//! 按子力构成把开中局和残局的子力位置价值表插值成当前局面的价值表，
//! 同时算出进攻威胁相关的罚分表。每次子力构成变化较大时重算一次，
//! 不在每个结点上做。

use crate::position::{
    both_bitpiece, piece_type, side_tag, Position, ADVISOR_BITPIECE, BISHOP_BITPIECE,
    CANNON_BITPIECE, CANNON_FROM, KNIGHT_BITPIECE, KNIGHT_FROM, PAWN_BITPIECE, PAWN_TO,
    ROOK_BITPIECE, ROOK_TO,
};
use crate::pregen::{black_half, in_board, square_flip, white_half};

/// 局面预评价数据：插值后的子力位置价值表和威胁罚分表
#[derive(Clone)]
pub struct PreEval {
    /// 是否允许仕(相)升变
    pub promotion: bool,
    /// 先行权分值
    pub vl_advanced: i32,
    /// 红方和黑方每种棋子在每个格子上的价值
    pub white_pieces: [[u8; 256]; 7],
    pub black_pieces: [[u8; 256]; 7],

    /// 缺仕(士)怕双车的罚分
    pub white_advisor_leakage: i32,
    pub black_advisor_leakage: i32,
    /// 空头炮的威胁分值(按红方视角的行号)
    pub hollow_threat: [i32; 16],
    /// 炮镇窝心马的威胁分值
    pub central_threat: [i32; 16],
    /// 沉底炮的威胁分值(按列号)
    pub white_bottom_threat: [i32; 16],
    pub black_bottom_threat: [i32; 16],
}

impl Default for PreEval {
    fn default() -> Self {
        PreEval {
            promotion: false,
            vl_advanced: 0,
            white_pieces: [[0; 256]; 7],
            black_pieces: [[0; 256]; 7],
            white_advisor_leakage: 0,
            black_advisor_leakage: 0,
            hollow_threat: [0; 16],
            central_threat: [0; 16],
            white_bottom_threat: [0; 16],
            black_bottom_threat: [0; 16],
        }
    }
}

// 子力位置价值表，数值参照“梦入神蛋”，以红方在下的方位给出

// 1. 开中局、有进攻机会的帅(将)和兵(卒)
static KING_PAWN_MIDGAME_ATTACKING: [u8; 256] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 9, 9, 9, 11, 13, 11, 9, 9, 9, 0, 0, 0, 0, //
    0, 0, 0, 39, 49, 69, 84, 89, 84, 69, 49, 39, 0, 0, 0, 0, //
    0, 0, 0, 39, 49, 64, 74, 74, 74, 64, 49, 39, 0, 0, 0, 0, //
    0, 0, 0, 39, 46, 54, 59, 61, 59, 54, 46, 39, 0, 0, 0, 0, //
    0, 0, 0, 29, 37, 41, 54, 59, 54, 41, 37, 29, 0, 0, 0, 0, //
    0, 0, 0, 7, 0, 13, 0, 16, 0, 13, 0, 7, 0, 0, 0, 0, //
    0, 0, 0, 7, 0, 7, 0, 15, 0, 7, 0, 7, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 2, 2, 2, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 11, 15, 11, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

// 2. 开中局、没有进攻机会的帅(将)和兵(卒)
static KING_PAWN_MIDGAME_ATTACKLESS: [u8; 256] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 9, 9, 9, 11, 13, 11, 9, 9, 9, 0, 0, 0, 0, //
    0, 0, 0, 19, 24, 34, 42, 44, 42, 34, 24, 19, 0, 0, 0, 0, //
    0, 0, 0, 19, 24, 32, 37, 37, 37, 32, 24, 19, 0, 0, 0, 0, //
    0, 0, 0, 19, 23, 27, 29, 30, 29, 27, 23, 19, 0, 0, 0, 0, //
    0, 0, 0, 14, 18, 20, 27, 29, 27, 20, 18, 14, 0, 0, 0, 0, //
    0, 0, 0, 7, 0, 13, 0, 16, 0, 13, 0, 7, 0, 0, 0, 0, //
    0, 0, 0, 7, 0, 7, 0, 15, 0, 7, 0, 7, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 2, 2, 2, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 11, 15, 11, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

// 3. 残局、有进攻机会的帅(将)和兵(卒)
static KING_PAWN_ENDGAME_ATTACKING: [u8; 256] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 10, 10, 10, 15, 15, 15, 10, 10, 10, 0, 0, 0, 0, //
    0, 0, 0, 50, 55, 60, 85, 100, 85, 60, 55, 50, 0, 0, 0, 0, //
    0, 0, 0, 65, 70, 70, 75, 75, 75, 70, 70, 65, 0, 0, 0, 0, //
    0, 0, 0, 75, 80, 80, 80, 80, 80, 80, 80, 75, 0, 0, 0, 0, //
    0, 0, 0, 70, 70, 65, 70, 70, 70, 65, 70, 70, 0, 0, 0, 0, //
    0, 0, 0, 45, 0, 40, 45, 45, 45, 40, 0, 45, 0, 0, 0, 0, //
    0, 0, 0, 40, 0, 35, 40, 40, 40, 35, 0, 40, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 5, 5, 15, 5, 5, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 3, 3, 13, 3, 3, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 1, 1, 11, 1, 1, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

// 4. 残局、没有进攻机会的帅(将)和兵(卒)
static KING_PAWN_ENDGAME_ATTACKLESS: [u8; 256] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 10, 10, 10, 15, 15, 15, 10, 10, 10, 0, 0, 0, 0, //
    0, 0, 0, 10, 15, 20, 45, 60, 45, 20, 15, 10, 0, 0, 0, 0, //
    0, 0, 0, 25, 30, 30, 35, 35, 35, 30, 30, 25, 0, 0, 0, 0, //
    0, 0, 0, 35, 40, 40, 45, 45, 45, 40, 40, 35, 0, 0, 0, 0, //
    0, 0, 0, 25, 30, 30, 35, 35, 35, 30, 30, 25, 0, 0, 0, 0, //
    0, 0, 0, 25, 0, 25, 25, 25, 25, 25, 0, 25, 0, 0, 0, 0, //
    0, 0, 0, 20, 0, 20, 20, 20, 20, 20, 0, 20, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 5, 5, 13, 5, 5, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 3, 3, 12, 3, 3, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 1, 1, 11, 1, 1, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

// 5. 没受威胁的仕(士)和相(象)
static ADVISOR_BISHOP_THREATLESS: [u8; 256] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 20, 0, 0, 0, 20, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 18, 0, 0, 20, 23, 20, 0, 0, 18, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 23, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 20, 20, 0, 20, 20, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

// 5'. 可升变的、没受威胁的仕(士)和相(象)
static ADVISOR_BISHOP_PROMOTION_THREATLESS: [u8; 256] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 30, 0, 0, 0, 30, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 28, 0, 0, 30, 33, 30, 0, 0, 28, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 33, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 30, 30, 0, 30, 30, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

// 6. 受到威胁的仕(士)和相(象)
static ADVISOR_BISHOP_THREATENED: [u8; 256] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 40, 0, 0, 0, 40, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 38, 0, 0, 40, 43, 40, 0, 0, 38, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 43, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 40, 40, 0, 40, 40, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

// 7. 开中局的马
static KNIGHT_MIDGAME: [u8; 256] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 90, 90, 90, 96, 90, 96, 90, 90, 90, 0, 0, 0, 0, //
    0, 0, 0, 90, 96, 103, 97, 94, 97, 103, 96, 90, 0, 0, 0, 0, //
    0, 0, 0, 92, 98, 99, 103, 99, 103, 99, 98, 92, 0, 0, 0, 0, //
    0, 0, 0, 93, 108, 100, 107, 100, 107, 100, 108, 93, 0, 0, 0, 0, //
    0, 0, 0, 90, 100, 99, 103, 104, 103, 99, 100, 90, 0, 0, 0, 0, //
    0, 0, 0, 90, 98, 101, 102, 103, 102, 101, 98, 90, 0, 0, 0, 0, //
    0, 0, 0, 92, 94, 98, 95, 98, 95, 98, 94, 92, 0, 0, 0, 0, //
    0, 0, 0, 93, 92, 94, 95, 92, 95, 94, 92, 93, 0, 0, 0, 0, //
    0, 0, 0, 85, 90, 92, 93, 78, 93, 92, 90, 85, 0, 0, 0, 0, //
    0, 0, 0, 88, 85, 90, 88, 90, 88, 90, 85, 88, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

// 8. 残局的马
static KNIGHT_ENDGAME: [u8; 256] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 92, 94, 96, 96, 96, 96, 96, 94, 92, 0, 0, 0, 0, //
    0, 0, 0, 94, 96, 98, 98, 98, 98, 98, 96, 94, 0, 0, 0, 0, //
    0, 0, 0, 96, 98, 100, 100, 100, 100, 100, 98, 96, 0, 0, 0, 0, //
    0, 0, 0, 96, 98, 100, 100, 100, 100, 100, 98, 96, 0, 0, 0, 0, //
    0, 0, 0, 96, 98, 100, 100, 100, 100, 100, 98, 96, 0, 0, 0, 0, //
    0, 0, 0, 94, 96, 98, 98, 98, 98, 98, 96, 94, 0, 0, 0, 0, //
    0, 0, 0, 94, 96, 98, 98, 98, 98, 98, 96, 94, 0, 0, 0, 0, //
    0, 0, 0, 92, 94, 96, 96, 96, 96, 96, 94, 92, 0, 0, 0, 0, //
    0, 0, 0, 90, 92, 94, 92, 92, 92, 94, 92, 90, 0, 0, 0, 0, //
    0, 0, 0, 88, 90, 92, 90, 90, 90, 92, 90, 88, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

// 9. 开中局的车
static ROOK_MIDGAME: [u8; 256] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 206, 208, 207, 213, 214, 213, 207, 208, 206, 0, 0, 0, 0, //
    0, 0, 0, 206, 212, 209, 216, 233, 216, 209, 212, 206, 0, 0, 0, 0, //
    0, 0, 0, 206, 208, 207, 214, 216, 214, 207, 208, 206, 0, 0, 0, 0, //
    0, 0, 0, 206, 213, 213, 216, 216, 216, 213, 213, 206, 0, 0, 0, 0, //
    0, 0, 0, 208, 211, 211, 214, 215, 214, 211, 211, 208, 0, 0, 0, 0, //
    0, 0, 0, 208, 212, 212, 214, 215, 214, 212, 212, 208, 0, 0, 0, 0, //
    0, 0, 0, 204, 209, 204, 212, 214, 212, 204, 209, 204, 0, 0, 0, 0, //
    0, 0, 0, 198, 208, 204, 212, 212, 212, 204, 208, 198, 0, 0, 0, 0, //
    0, 0, 0, 200, 208, 206, 212, 200, 212, 206, 208, 200, 0, 0, 0, 0, //
    0, 0, 0, 194, 206, 204, 212, 200, 212, 204, 206, 194, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

// 10. 残局的车
static ROOK_ENDGAME: [u8; 256] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 182, 182, 182, 184, 186, 184, 182, 182, 182, 0, 0, 0, 0, //
    0, 0, 0, 184, 184, 184, 186, 190, 186, 184, 184, 184, 0, 0, 0, 0, //
    0, 0, 0, 182, 182, 182, 184, 186, 184, 182, 182, 182, 0, 0, 0, 0, //
    0, 0, 0, 180, 180, 180, 182, 184, 182, 180, 180, 180, 0, 0, 0, 0, //
    0, 0, 0, 180, 180, 180, 182, 184, 182, 180, 180, 180, 0, 0, 0, 0, //
    0, 0, 0, 180, 180, 180, 182, 184, 182, 180, 180, 180, 0, 0, 0, 0, //
    0, 0, 0, 180, 180, 180, 182, 184, 182, 180, 180, 180, 0, 0, 0, 0, //
    0, 0, 0, 180, 180, 180, 182, 184, 182, 180, 180, 180, 0, 0, 0, 0, //
    0, 0, 0, 180, 180, 180, 182, 184, 182, 180, 180, 180, 0, 0, 0, 0, //
    0, 0, 0, 180, 180, 180, 182, 184, 182, 180, 180, 180, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

// 11. 开中局的炮
static CANNON_MIDGAME: [u8; 256] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 100, 100, 96, 91, 90, 91, 96, 100, 100, 0, 0, 0, 0, //
    0, 0, 0, 98, 98, 96, 92, 89, 92, 96, 98, 98, 0, 0, 0, 0, //
    0, 0, 0, 97, 97, 96, 91, 92, 91, 96, 97, 97, 0, 0, 0, 0, //
    0, 0, 0, 96, 99, 99, 98, 100, 98, 99, 99, 96, 0, 0, 0, 0, //
    0, 0, 0, 96, 96, 96, 96, 100, 96, 96, 96, 96, 0, 0, 0, 0, //
    0, 0, 0, 95, 96, 99, 96, 100, 96, 99, 96, 95, 0, 0, 0, 0, //
    0, 0, 0, 96, 96, 96, 96, 96, 96, 96, 96, 96, 0, 0, 0, 0, //
    0, 0, 0, 97, 96, 100, 99, 101, 99, 100, 96, 97, 0, 0, 0, 0, //
    0, 0, 0, 96, 97, 98, 98, 98, 98, 98, 97, 96, 0, 0, 0, 0, //
    0, 0, 0, 96, 96, 97, 99, 99, 99, 97, 96, 96, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

// 12. 残局的炮
static CANNON_ENDGAME: [u8; 256] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 100, 100, 100, 100, 100, 100, 100, 100, 100, 0, 0, 0, 0, //
    0, 0, 0, 100, 100, 100, 100, 100, 100, 100, 100, 100, 0, 0, 0, 0, //
    0, 0, 0, 100, 100, 100, 100, 100, 100, 100, 100, 100, 0, 0, 0, 0, //
    0, 0, 0, 100, 100, 100, 102, 104, 102, 100, 100, 100, 0, 0, 0, 0, //
    0, 0, 0, 100, 100, 100, 102, 104, 102, 100, 100, 100, 0, 0, 0, 0, //
    0, 0, 0, 100, 100, 100, 102, 104, 102, 100, 100, 100, 0, 0, 0, 0, //
    0, 0, 0, 100, 100, 100, 102, 104, 102, 100, 100, 100, 0, 0, 0, 0, //
    0, 0, 0, 100, 100, 100, 102, 104, 102, 100, 100, 100, 0, 0, 0, 0, //
    0, 0, 0, 100, 100, 100, 104, 106, 104, 100, 100, 100, 0, 0, 0, 0, //
    0, 0, 0, 100, 100, 100, 104, 106, 104, 100, 100, 100, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

// 空头炮的威胁分值，下标是对红方来说的行号，位置越高威胁越大；残局时减少
static HOLLOW_THREAT: [i32; 16] = [0, 0, 0, 0, 0, 0, 60, 65, 70, 75, 80, 80, 80, 0, 0, 0];

// 炮镇窝心马的威胁分值，高度越低威胁越大；没有窝心马时取四分之一
static CENTRAL_THREAT: [i32; 16] = [0, 0, 0, 0, 0, 0, 50, 45, 40, 35, 30, 30, 30, 0, 0, 0];

// 沉底炮的威胁分值，下标是列号，越靠近边线威胁越大
static BOTTOM_THREAT: [i32; 16] = [0, 0, 0, 40, 30, 0, 0, 0, 0, 0, 30, 40, 0, 0, 0, 0];

// 局势阶段的权重：车 6、马炮 3、其它 1
const ROOK_MIDGAME_VALUE: i32 = 6;
const KNIGHT_CANNON_MIDGAME_VALUE: i32 = 3;
const OTHER_MIDGAME_VALUE: i32 = 1;
const TOTAL_MIDGAME_VALUE: i32 =
    ROOK_MIDGAME_VALUE * 4 + KNIGHT_CANNON_MIDGAME_VALUE * 8 + OTHER_MIDGAME_VALUE * 18;
const TOTAL_ADVANCED_VALUE: i32 = 4;
const TOTAL_ATTACK_VALUE: i32 = 8;
const ADVISOR_BISHOP_ATTACKLESS_VALUE: i32 = 80;
const TOTAL_ADVISOR_LEAKAGE: i32 = 80;

impl Position {
    /// 局面预评价：判断局势阶段和双方的进攻状态，
    /// 插值生成本局面使用的子力位置价值表，并重算双方的子力价值
    pub fn pre_evaluate(&mut self) {
        // 先判断局势处于开中局还是残局阶段
        let mut midgame_value = (self.bit_piece
            & both_bitpiece(ADVISOR_BITPIECE | BISHOP_BITPIECE | PAWN_BITPIECE))
        .count_ones() as i32
            * OTHER_MIDGAME_VALUE;
        midgame_value += (self.bit_piece & both_bitpiece(KNIGHT_BITPIECE | CANNON_BITPIECE))
            .count_ones() as i32
            * KNIGHT_CANNON_MIDGAME_VALUE;
        midgame_value +=
            (self.bit_piece & both_bitpiece(ROOK_BITPIECE)).count_ones() as i32 * ROOK_MIDGAME_VALUE;
        // 使用二次函数，子力很少时才认为接近残局
        midgame_value =
            (2 * TOTAL_MIDGAME_VALUE - midgame_value) * midgame_value / TOTAL_MIDGAME_VALUE;
        self.pre_eval.vl_advanced =
            (TOTAL_ADVANCED_VALUE * midgame_value + TOTAL_ADVANCED_VALUE / 2) / TOTAL_MIDGAME_VALUE;

        let mut pawn_attacking = [0u8; 256];
        let mut pawn_attackless = [0u8; 256];
        for sq in 0..256 {
            if !in_board(sq) {
                continue;
            }
            let blend = |mid: u8, end: u8| -> u8 {
                ((mid as i32 * midgame_value
                    + end as i32 * (TOTAL_MIDGAME_VALUE - midgame_value))
                    / TOTAL_MIDGAME_VALUE) as u8
            };
            let flip = square_flip(sq);
            let vl = blend(KING_PAWN_MIDGAME_ATTACKING[sq], KING_PAWN_ENDGAME_ATTACKING[sq]);
            self.pre_eval.white_pieces[0][sq] = vl;
            self.pre_eval.black_pieces[0][flip] = vl;
            let vl = blend(KNIGHT_MIDGAME[sq], KNIGHT_ENDGAME[sq]);
            self.pre_eval.white_pieces[3][sq] = vl;
            self.pre_eval.black_pieces[3][flip] = vl;
            let vl = blend(ROOK_MIDGAME[sq], ROOK_ENDGAME[sq]);
            self.pre_eval.white_pieces[4][sq] = vl;
            self.pre_eval.black_pieces[4][flip] = vl;
            let vl = blend(CANNON_MIDGAME[sq], CANNON_ENDGAME[sq]);
            self.pre_eval.white_pieces[5][sq] = vl;
            self.pre_eval.black_pieces[5][flip] = vl;
            pawn_attacking[sq] = self.pre_eval.white_pieces[0][sq];
            pawn_attackless[sq] = blend(
                KING_PAWN_MIDGAME_ATTACKLESS[sq],
                KING_PAWN_ENDGAME_ATTACKLESS[sq],
            );
        }
        for i in 0..16 {
            self.pre_eval.hollow_threat[i] =
                HOLLOW_THREAT[i] * (midgame_value + TOTAL_MIDGAME_VALUE) / (TOTAL_MIDGAME_VALUE * 2);
            self.pre_eval.central_threat[i] = CENTRAL_THREAT[i];
        }

        // 然后判断各方是否处于进攻状态：过河的车马算 2、炮兵算 1
        let mut white_attacks = 0;
        let mut black_attacks = 0;
        for i in (side_tag(0) + KNIGHT_FROM)..=(side_tag(0) + ROOK_TO) {
            let sq = self.pieces[i] as usize;
            if sq != 0 && black_half(sq) {
                white_attacks += 2;
            }
        }
        for i in (side_tag(0) + CANNON_FROM)..=(side_tag(0) + PAWN_TO) {
            let sq = self.pieces[i] as usize;
            if sq != 0 && black_half(sq) {
                white_attacks += 1;
            }
        }
        for i in (side_tag(1) + KNIGHT_FROM)..=(side_tag(1) + ROOK_TO) {
            let sq = self.pieces[i] as usize;
            if sq != 0 && white_half(sq) {
                black_attacks += 2;
            }
        }
        for i in (side_tag(1) + CANNON_FROM)..=(side_tag(1) + PAWN_TO) {
            let sq = self.pieces[i] as usize;
            if sq != 0 && white_half(sq) {
                black_attacks += 1;
            }
        }
        // 轻子数占优也计入威胁值(车算 2 个轻子)，总威胁值不超过 8
        let white_simple = (self.bit_piece_side(0) & ROOK_BITPIECE).count_ones() as i32 * 2
            + (self.bit_piece_side(0) & (KNIGHT_BITPIECE | CANNON_BITPIECE)).count_ones() as i32;
        let black_simple = (self.bit_piece_side(1) & ROOK_BITPIECE).count_ones() as i32 * 2
            + (self.bit_piece_side(1) & (KNIGHT_BITPIECE | CANNON_BITPIECE)).count_ones() as i32;
        if white_simple > black_simple {
            white_attacks += (white_simple - black_simple) * 2;
        } else {
            black_attacks += (black_simple - white_simple) * 2;
        }
        let white_attacks = white_attacks.min(TOTAL_ATTACK_VALUE);
        let black_attacks = black_attacks.min(TOTAL_ATTACK_VALUE);
        self.pre_eval.black_advisor_leakage =
            TOTAL_ADVISOR_LEAKAGE * white_attacks / TOTAL_ATTACK_VALUE;
        self.pre_eval.white_advisor_leakage =
            TOTAL_ADVISOR_LEAKAGE * black_attacks / TOTAL_ATTACK_VALUE;

        for sq in 0..256 {
            if !in_board(sq) {
                continue;
            }
            let flip = square_flip(sq);
            let threatless = if self.pre_eval.promotion {
                &ADVISOR_BISHOP_PROMOTION_THREATLESS
            } else {
                &ADVISOR_BISHOP_THREATLESS
            };
            let vl = ((ADVISOR_BISHOP_THREATENED[sq] as i32 * black_attacks
                + threatless[sq] as i32 * (TOTAL_ATTACK_VALUE - black_attacks))
                / TOTAL_ATTACK_VALUE) as u8;
            self.pre_eval.white_pieces[1][sq] = vl;
            self.pre_eval.white_pieces[2][sq] = vl;
            let vl = ((ADVISOR_BISHOP_THREATENED[flip] as i32 * white_attacks
                + threatless[flip] as i32 * (TOTAL_ATTACK_VALUE - white_attacks))
                / TOTAL_ATTACK_VALUE) as u8;
            self.pre_eval.black_pieces[1][sq] = vl;
            self.pre_eval.black_pieces[2][sq] = vl;
            self.pre_eval.white_pieces[6][sq] = ((pawn_attacking[sq] as i32 * white_attacks
                + pawn_attackless[sq] as i32 * (TOTAL_ATTACK_VALUE - white_attacks))
                / TOTAL_ATTACK_VALUE) as u8;
            self.pre_eval.black_pieces[6][sq] = ((pawn_attacking[flip] as i32 * black_attacks
                + pawn_attackless[flip] as i32 * (TOTAL_ATTACK_VALUE - black_attacks))
                / TOTAL_ATTACK_VALUE) as u8;
        }
        for i in 0..16 {
            self.pre_eval.white_bottom_threat[i] = BOTTOM_THREAT[i] * black_attacks / TOTAL_ATTACK_VALUE;
            self.pre_eval.black_bottom_threat[i] = BOTTOM_THREAT[i] * white_attacks / TOTAL_ATTACK_VALUE;
        }

        // 不受威胁方少掉的仕(士)相(象)分值作为基础分
        self.vl_white =
            ADVISOR_BISHOP_ATTACKLESS_VALUE * (TOTAL_ATTACK_VALUE - black_attacks) / TOTAL_ATTACK_VALUE;
        self.vl_black =
            ADVISOR_BISHOP_ATTACKLESS_VALUE * (TOTAL_ATTACK_VALUE - white_attacks) / TOTAL_ATTACK_VALUE;
        if self.pre_eval.promotion {
            self.vl_white /= 2;
            self.vl_black /= 2;
        }
        // 最后按新的价值表重算子力位置分
        for pc in 16..32 {
            let sq = self.pieces[pc] as usize;
            if sq != 0 {
                self.vl_white += self.pre_eval.white_pieces[piece_type(pc)][sq] as i32;
            }
        }
        for pc in 32..48 {
            let sq = self.pieces[pc] as usize;
            if sq != 0 {
                self.vl_black += self.pre_eval.black_pieces[piece_type(pc)][sq] as i32;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::{Position, START_FEN};
    use crate::pregen::{square_mirror, FILE_LEFT, FILE_RIGHT};

    #[test]
    fn test_tables_are_mirror_symmetric() {
        let pos = Position::from_fen(START_FEN).unwrap();
        for sq in 0..256 {
            if !in_board(sq) {
                continue;
            }
            for i in 0..7 {
                assert_eq!(
                    pos.pre_eval.white_pieces[i][sq],
                    pos.pre_eval.white_pieces[i][square_mirror(sq)]
                );
                assert_eq!(
                    pos.pre_eval.black_pieces[i][sq],
                    pos.pre_eval.black_pieces[i][square_mirror(sq)]
                );
            }
        }
        for x in FILE_LEFT..=FILE_RIGHT {
            assert_eq!(
                pos.pre_eval.white_bottom_threat[x],
                pos.pre_eval.white_bottom_threat[14 - x]
            );
        }
    }

    #[test]
    fn test_start_position_is_balanced() {
        let pos = Position::from_fen(START_FEN).unwrap();
        assert_eq!(pos.vl_white, pos.vl_black);
        assert!(pos.vl_white > 0);
        // 起始局面材料分对称，只差先行权
        assert_eq!(pos.material(), pos.pre_eval.vl_advanced);
    }

    #[test]
    fn test_endgame_phase_changes_tables() {
        let mid = Position::from_fen(START_FEN).unwrap();
        let end = Position::from_fen("4k4/9/9/9/9/9/9/9/9/4K3R w").unwrap();
        // 残局的车价值表和开中局不同
        assert_ne!(
            mid.pre_eval.white_pieces[4][0x77],
            end.pre_eval.white_pieces[4][0x77]
        );
    }
}
