//! 局面表示
//!
//! 格子-棋子双向数组、位行位列、增量子力分值、Zobrist 签名、
//! 回滚着法栈和重复局面检测。着法执行(MakeMove)失败时保证完全回滚。

use crate::moves::Move;
use crate::pregen::{
    self, advisor_span, bishop_pin, bishop_span, can_promote, coord_xy, file_x, in_board, in_fort,
    king_span, knight_pin, opp_side, rank_y, same_half, square_forward,
    square_mirror, tables, SlideMask, SlideMove, Zobrist, FILE_LEFT, FILE_RIGHT, RANK_BOTTOM,
    RANK_TOP,
};

// ============================================================================
// 常数
// ============================================================================

/// 局面能容纳的回滚着法数
pub const MAX_MOVE_NUM: usize = 1024;
/// 默认的和棋着法数(50 回合即 100 步，将军和应将不计入)
pub const DRAW_MOVES: i16 = 100;
/// 判断重复局面的迷你置换表长度
pub const REP_HASH_MASK: usize = 4095;

/// 最高分值，即将死的分值
pub const MATE_VALUE: i32 = 10000;
/// 长将判负的分值，低于该值将不写入置换表
pub const BAN_VALUE: i32 = MATE_VALUE - 100;
/// 搜索出胜负的分值界限，超出此值就说明已经搜索出杀棋了
pub const WIN_VALUE: i32 = MATE_VALUE - 200;
/// 空着裁剪可以不检验的子力价值边界
pub const NULLOKAY_MARGIN: i32 = 200;
/// 允许使用空着裁剪的条件的子力价值边界
pub const NULLSAFE_MARGIN: i32 = 400;
/// 和棋时返回的分数(取负值)
pub const DRAW_VALUE: i32 = 20;

/// 被多个子将军
pub const CHECK_MULTI: u8 = 48;

// 每种子力的类型编号
pub const KING_TYPE: usize = 0;
pub const ADVISOR_TYPE: usize = 1;
pub const BISHOP_TYPE: usize = 2;
pub const KNIGHT_TYPE: usize = 3;
pub const ROOK_TYPE: usize = 4;
pub const CANNON_TYPE: usize = 5;
pub const PAWN_TYPE: usize = 6;

// 每种子力的开始序号和结束序号
pub const KING_FROM: usize = 0;
pub const ADVISOR_FROM: usize = 1;
pub const ADVISOR_TO: usize = 2;
pub const BISHOP_FROM: usize = 3;
pub const BISHOP_TO: usize = 4;
pub const KNIGHT_FROM: usize = 5;
pub const KNIGHT_TO: usize = 6;
pub const ROOK_FROM: usize = 7;
pub const ROOK_TO: usize = 8;
pub const CANNON_FROM: usize = 9;
pub const CANNON_TO: usize = 10;
pub const PAWN_FROM: usize = 11;
pub const PAWN_TO: usize = 15;

// 各种子力的屏蔽位
pub const KING_BITPIECE: u32 = 1 << KING_FROM;
pub const ADVISOR_BITPIECE: u32 = (1 << ADVISOR_FROM) | (1 << ADVISOR_TO);
pub const BISHOP_BITPIECE: u32 = (1 << BISHOP_FROM) | (1 << BISHOP_TO);
pub const KNIGHT_BITPIECE: u32 = (1 << KNIGHT_FROM) | (1 << KNIGHT_TO);
pub const ROOK_BITPIECE: u32 = (1 << ROOK_FROM) | (1 << ROOK_TO);
pub const CANNON_BITPIECE: u32 = (1 << CANNON_FROM) | (1 << CANNON_TO);
pub const PAWN_BITPIECE: u32 = (1 << PAWN_FROM)
    | (1 << (PAWN_FROM + 1))
    | (1 << (PAWN_FROM + 2))
    | (1 << (PAWN_FROM + 3))
    | (1 << PAWN_TO);
pub const ATTACK_BITPIECE: u32 = KNIGHT_BITPIECE | ROOK_BITPIECE | CANNON_BITPIECE | PAWN_BITPIECE;

#[inline]
pub const fn bit_piece(pc: usize) -> u32 {
    1 << (pc - 16)
}

#[inline]
pub const fn both_bitpiece(mask: u32) -> u32 {
    mask + (mask << 16)
}

/// 红方棋子序号从 16 开始，黑方从 32 开始
#[inline]
pub const fn side_tag(sd: usize) -> usize {
    16 + (sd << 4)
}

#[inline]
pub const fn opp_side_tag(sd: usize) -> usize {
    32 - (sd << 4)
}

#[inline]
pub fn side_value(sd: usize, vl: i32) -> i32 {
    if sd == 0 {
        vl
    } else {
        -vl
    }
}

#[inline]
pub fn piece_index(pc: usize) -> usize {
    pc & 15
}

/// 棋子序号对应的棋子类型
pub static PIECE_TYPES: [usize; 48] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 6, 6, 6, //
    0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 6, 6, 6,
];

/// 棋子的简单分值，只在简单比较时作参考
pub static SIMPLE_VALUES: [i32; 48] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    5, 1, 1, 1, 1, 3, 3, 4, 4, 3, 3, 2, 2, 2, 2, 2, //
    5, 1, 1, 1, 1, 3, 3, 4, 4, 3, 3, 2, 2, 2, 2, 2,
];

#[inline]
pub fn piece_type(pc: usize) -> usize {
    PIECE_TYPES[pc]
}

#[inline]
pub fn simple_value(pc: usize) -> i32 {
    SIMPLE_VALUES[pc]
}

/// 起始局面的 FEN 串
pub const START_FEN: &str = "rnbakabnr/9/1c5c1/p1p1p1p1p/9/9/P1P1P1P1P/1C5C1/9/RNBAKABNR w";

const PIECE_BYTES: &[u8; 7] = b"KABNRCP";

#[inline]
pub fn piece_byte(pt: usize) -> char {
    PIECE_BYTES[pt] as char
}

/// FEN 串中的棋子标识(只认大写字母)
pub fn fen_piece(c: char) -> Option<usize> {
    match c {
        'K' => Some(0),
        'A' => Some(1),
        'B' | 'E' => Some(2),
        'N' | 'H' => Some(3),
        'R' => Some(4),
        'C' => Some(5),
        'P' => Some(6),
        _ => None,
    }
}

// ============================================================================
// 回滚记录
// ============================================================================

/// 将军/被捉标注，保存在每步着法的回滚记录中
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ChkChs {
    #[default]
    None,
    /// 将军，记录将军棋子的序号(CHECK_MULTI 表示多子将军)
    Check(u8),
    /// 被捉，记录被捉棋子的序号(1 到 15)
    Chase(u8),
}

impl ChkChs {
    #[inline]
    pub fn is_check(self) -> bool {
        matches!(self, ChkChs::Check(_))
    }
}

/// 回滚记录：着法执行前的签名和子力分值，加上着法本身的标注
#[derive(Clone, Copy, Default)]
pub struct Rollback {
    pub zobr: Zobrist,
    pub vl_white: i32,
    pub vl_black: i32,
    pub mv: Move,
    /// 被吃子序号，0 表示没有吃子
    pub captured: u8,
    /// 连续可逆着法数(吃子清零，将军和应将不累计)
    pub reversible: i16,
    pub chk_chs: ChkChs,
}

/// 重复局面检测结果
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RepStatus {
    None,
    Draw,
    /// 走子方长打，判负
    Loss,
    /// 对方长打，判胜
    Win,
}

// ============================================================================
// 局面
// ============================================================================

use crate::preeval::PreEval;

#[derive(Clone)]
pub struct Position {
    /// 轮到哪方走，0 表示红方，1 表示黑方
    pub sd_player: usize,
    /// 每个格子放的棋子，0 表示没有棋子
    pub squares: [u8; 256],
    /// 每个棋子放的位置，0 表示被吃
    pub pieces: [u8; 48],
    pub zobr: Zobrist,

    /// 32 位棋子位，0 到 31 位依次表示序号为 16 到 47 的棋子是否在棋盘上
    pub bit_piece: u32,
    /// 位行数组，用法是 bit_ranks[rank_y(sq)]
    pub bit_ranks: [u16; 16],
    /// 位列数组，用法是 bit_files[file_x(sq)]
    pub bit_files: [u16; 16],

    /// 红方和黑方的子力价值
    pub vl_white: i32,
    pub vl_black: i32,

    /// 搜索深度(距离根结点的步数)
    pub distance: i32,
    rollback: Vec<Rollback>,
    /// 判断重复局面的迷你置换表，记录每个签名最后出现的历史深度
    rep_hash: Vec<u16>,

    /// 局面预评价数据(随子力构成变化而重算)
    pub pre_eval: PreEval,
}

impl Position {
    /// 空棋盘
    pub fn new_empty() -> Position {
        let mut pos = Position {
            sd_player: 0,
            squares: [0; 256],
            pieces: [0; 48],
            zobr: Zobrist::default(),
            bit_piece: 0,
            bit_ranks: [0; 16],
            bit_files: [0; 16],
            vl_white: 0,
            vl_black: 0,
            distance: 0,
            rollback: Vec::with_capacity(MAX_MOVE_NUM),
            rep_hash: vec![0; REP_HASH_MASK + 1],
            pre_eval: PreEval::default(),
        };
        pos.set_irrev();
        pos
    }

    // ------------------------------------------------------------------
    // 预置表访问
    // ------------------------------------------------------------------

    #[inline]
    pub fn rank_move(&self, x: usize, y: usize) -> &'static SlideMove {
        &tables().rank_move_tab[x - FILE_LEFT][self.bit_ranks[y] as usize]
    }

    #[inline]
    pub fn file_move(&self, x: usize, y: usize) -> &'static SlideMove {
        &tables().file_move_tab[y - RANK_TOP][self.bit_files[x] as usize]
    }

    #[inline]
    pub fn rank_mask(&self, x: usize, y: usize) -> &'static SlideMask {
        &tables().rank_mask_tab[x - FILE_LEFT][self.bit_ranks[y] as usize]
    }

    #[inline]
    pub fn file_mask(&self, x: usize, y: usize) -> &'static SlideMask {
        &tables().file_mask_tab[y - RANK_TOP][self.bit_files[x] as usize]
    }

    #[inline]
    pub fn bit_piece_side(&self, sd: usize) -> u32 {
        (self.bit_piece >> (sd << 4)) & 0xffff
    }

    // ------------------------------------------------------------------
    // 棋盘处理
    // ------------------------------------------------------------------

    fn change_side(&mut self) {
        self.sd_player = opp_side(self.sd_player);
        self.zobr.xor(&tables().zobr_player);
    }

    /// 棋盘上增加(del = false)或拿走(del = true)棋子
    pub fn add_piece(&mut self, sq: usize, pc: usize, del: bool) {
        debug_assert!(in_board(sq));
        debug_assert!((16..48).contains(&pc));
        if del {
            self.squares[sq] = 0;
            self.pieces[pc] = 0;
        } else {
            self.squares[sq] = pc as u8;
            self.pieces[pc] = sq as u8;
        }
        self.bit_ranks[rank_y(sq)] ^= tables().bit_rank_mask[sq];
        self.bit_files[file_x(sq)] ^= tables().bit_file_mask[sq];
        self.bit_piece ^= bit_piece(pc);
        let mut pt = piece_type(pc);
        if pc < 32 {
            let vl = self.pre_eval.white_pieces[pt][sq] as i32;
            self.vl_white += if del { -vl } else { vl };
        } else {
            let vl = self.pre_eval.black_pieces[pt][sq] as i32;
            self.vl_black += if del { -vl } else { vl };
            pt += 7;
        }
        self.zobr.xor(&tables().zobr_table[pt][sq]);
    }

    /// 移动棋子，返回被吃的棋子序号
    fn move_piece(&mut self, mv: Move) -> usize {
        let sq_src = mv.src();
        let sq_dst = mv.dst();
        let pc_moved = self.squares[sq_src] as usize;
        let pc_captured = self.squares[sq_dst] as usize;
        debug_assert!((16..48).contains(&pc_moved));
        if pc_captured == 0 {
            // 没有被吃的棋子时，目标格的位行和位列才需要更新
            self.bit_ranks[rank_y(sq_dst)] ^= tables().bit_rank_mask[sq_dst];
            self.bit_files[file_x(sq_dst)] ^= tables().bit_file_mask[sq_dst];
        } else {
            // 有被吃的棋子时，从棋子表中清除它，同时更新子力价值和签名
            self.pieces[pc_captured] = 0;
            self.bit_piece ^= bit_piece(pc_captured);
            let mut pt = piece_type(pc_captured);
            if pc_captured < 32 {
                self.vl_white -= self.pre_eval.white_pieces[pt][sq_dst] as i32;
            } else {
                self.vl_black -= self.pre_eval.black_pieces[pt][sq_dst] as i32;
                pt += 7;
            }
            self.zobr.xor(&tables().zobr_table[pt][sq_dst]);
        }
        self.squares[sq_src] = 0;
        self.squares[sq_dst] = pc_moved as u8;
        self.pieces[pc_moved] = sq_dst as u8;
        self.bit_ranks[rank_y(sq_src)] ^= tables().bit_rank_mask[sq_src];
        self.bit_files[file_x(sq_src)] ^= tables().bit_file_mask[sq_src];
        let mut pt = piece_type(pc_moved);
        if pc_moved < 32 {
            let tab = &self.pre_eval.white_pieces[pt];
            self.vl_white += tab[sq_dst] as i32 - tab[sq_src] as i32;
        } else {
            let tab = &self.pre_eval.black_pieces[pt];
            self.vl_black += tab[sq_dst] as i32 - tab[sq_src] as i32;
            pt += 7;
        }
        self.zobr
            .xor2(&tables().zobr_table[pt][sq_dst], &tables().zobr_table[pt][sq_src]);
        pc_captured
    }

    /// 撤消移动棋子
    fn undo_move_piece(&mut self, mv: Move, pc_captured: usize) {
        let sq_src = mv.src();
        let sq_dst = mv.dst();
        let pc_moved = self.squares[sq_dst] as usize;
        debug_assert!((16..48).contains(&pc_moved));
        self.squares[sq_src] = pc_moved as u8;
        self.pieces[pc_moved] = sq_src as u8;
        self.bit_ranks[rank_y(sq_src)] ^= tables().bit_rank_mask[sq_src];
        self.bit_files[file_x(sq_src)] ^= tables().bit_file_mask[sq_src];
        if pc_captured > 0 {
            self.squares[sq_dst] = pc_captured as u8;
            self.pieces[pc_captured] = sq_dst as u8;
            self.bit_piece ^= bit_piece(pc_captured);
        } else {
            self.squares[sq_dst] = 0;
            self.bit_ranks[rank_y(sq_dst)] ^= tables().bit_rank_mask[sq_dst];
            self.bit_files[file_x(sq_dst)] ^= tables().bit_file_mask[sq_dst];
        }
    }

    /// 仕(相)升变为兵，返回升变前的棋子序号
    fn promote_piece(&mut self, sq: usize) -> usize {
        debug_assert!(self.can_promote() && can_promote(sq));
        let pc_captured = self.squares[sq] as usize;
        debug_assert!((16..48).contains(&pc_captured));
        let free_pawn =
            (!self.bit_piece_side(self.sd_player) & PAWN_BITPIECE).trailing_zeros() as usize;
        let pc_promoted = side_tag(self.sd_player) + free_pawn;
        debug_assert!(self.pieces[pc_promoted] == 0);
        self.bit_piece ^= bit_piece(pc_promoted) ^ bit_piece(pc_captured);
        self.pieces[pc_captured] = 0;
        let mut pt = piece_type(pc_captured);
        if pc_captured < 32 {
            self.vl_white -= self.pre_eval.white_pieces[pt][sq] as i32;
        } else {
            self.vl_black -= self.pre_eval.black_pieces[pt][sq] as i32;
            pt += 7;
        }
        self.zobr.xor(&tables().zobr_table[pt][sq]);
        self.squares[sq] = pc_promoted as u8;
        self.pieces[pc_promoted] = sq as u8;
        let mut pt = piece_type(pc_promoted);
        if pc_promoted < 32 {
            self.vl_white += self.pre_eval.white_pieces[pt][sq] as i32;
        } else {
            self.vl_black += self.pre_eval.black_pieces[pt][sq] as i32;
            pt += 7;
        }
        self.zobr.xor(&tables().zobr_table[pt][sq]);
        pc_captured
    }

    /// 撤消升变
    fn undo_promote_piece(&mut self, sq: usize, pc_captured: usize) {
        let pc_promoted = self.squares[sq] as usize;
        debug_assert!(piece_type(pc_promoted) == PAWN_TYPE);
        self.pieces[pc_promoted] = 0;
        self.squares[sq] = pc_captured as u8;
        self.pieces[pc_captured] = sq as u8;
        self.bit_piece ^= bit_piece(pc_promoted) ^ bit_piece(pc_captured);
    }

    // ------------------------------------------------------------------
    // 着法处理
    // ------------------------------------------------------------------

    /// 前一步着法的回滚记录(保存了局面的将军状态)
    #[inline]
    pub fn last_move(&self) -> Rollback {
        self.rollback[self.rollback.len() - 1]
    }

    /// 走子方当前是否被将军
    #[inline]
    pub fn in_check(&self) -> bool {
        self.last_move().chk_chs.is_check()
    }

    #[inline]
    pub fn move_num(&self) -> usize {
        self.rollback.len()
    }

    /// 执行一个着法；走后被将军(或历史栈已满)时撤消并返回 false
    pub fn make_move(&mut self, mv: Move) -> bool {
        if self.rollback.len() == MAX_MOVE_NUM {
            return false;
        }
        let old_key = self.zobr.key;
        let mut rb = Rollback {
            zobr: self.zobr,
            vl_white: self.vl_white,
            vl_black: self.vl_black,
            mv,
            captured: 0,
            reversible: 0,
            chk_chs: ChkChs::None,
        };

        let sq_src = mv.src();
        let pc_captured = if sq_src == mv.dst() {
            self.promote_piece(sq_src)
        } else {
            let pc_captured = self.move_piece(mv);
            if self.checked_by(true) > 0 {
                self.undo_move_piece(mv, pc_captured);
                self.zobr = rb.zobr;
                self.vl_white = rb.vl_white;
                self.vl_black = rb.vl_black;
                return false;
            }
            pc_captured
        };

        self.change_side();

        // 原来的签名记入重复检测的迷你置换表(已占用的表项不覆盖)
        let slot = (old_key as usize) & REP_HASH_MASK;
        if self.rep_hash[slot] == 0 {
            self.rep_hash[slot] = self.rollback.len() as u16;
        }

        let chk = self.checked_by(false);
        if chk > 0 {
            rb.chk_chs = ChkChs::Check(chk);
        }
        if pc_captured == 0 {
            if rb.chk_chs == ChkChs::None {
                let chased = self.chased_by(mv);
                if chased > 0 {
                    rb.chk_chs = ChkChs::Chase(chased);
                }
            }
            let prev = self.last_move();
            let base = if prev.captured > 0 { 0 } else { prev.reversible };
            let step = if rb.chk_chs.is_check() || prev.chk_chs.is_check() {
                0
            } else {
                1
            };
            rb.reversible = (base + step).min(DRAW_MOVES);
        } else {
            rb.captured = pc_captured as u8;
        }

        self.rollback.push(rb);
        self.distance += 1;
        true
    }

    /// 撤消上一个着法，必须和 make_move 严格配对
    pub fn undo_move(&mut self) {
        let rb = self.rollback.pop().expect("undo without make");
        self.distance -= 1;
        let sq_src = rb.mv.src();
        if sq_src == rb.mv.dst() {
            self.undo_promote_piece(sq_src, rb.captured as usize);
        } else {
            self.undo_move_piece(rb.mv, rb.captured as usize);
        }
        self.sd_player = opp_side(self.sd_player);
        self.zobr = rb.zobr;
        self.vl_white = rb.vl_white;
        self.vl_black = rb.vl_black;
        let slot = (self.zobr.key as usize) & REP_HASH_MASK;
        if self.rep_hash[slot] == self.rollback.len() as u16 {
            self.rep_hash[slot] = 0;
        }
        debug_assert!(!self.rollback.is_empty());
    }

    /// 执行一个空着，只用于空着裁剪；被将军时不允许调用
    pub fn null_move(&mut self) {
        debug_assert!(!self.in_check());
        debug_assert!(self.rollback.len() < MAX_MOVE_NUM);
        let slot = (self.zobr.key as usize) & REP_HASH_MASK;
        if self.rep_hash[slot] == 0 {
            self.rep_hash[slot] = self.rollback.len() as u16;
        }
        let rb = Rollback {
            zobr: self.zobr,
            vl_white: self.vl_white,
            vl_black: self.vl_black,
            mv: Move::NONE,
            captured: 0,
            reversible: 0,
            chk_chs: ChkChs::None,
        };
        self.change_side();
        self.rollback.push(rb);
        self.distance += 1;
    }

    /// 撤消一个空着
    pub fn undo_null_move(&mut self) {
        let rb = self.rollback.pop().expect("undo without null move");
        self.distance -= 1;
        self.sd_player = opp_side(self.sd_player);
        self.zobr = rb.zobr;
        self.vl_white = rb.vl_white;
        self.vl_black = rb.vl_black;
        let slot = (self.zobr.key as usize) & REP_HASH_MASK;
        if self.rep_hash[slot] == self.rollback.len() as u16 {
            self.rep_hash[slot] = 0;
        }
        debug_assert!(!self.rollback.is_empty());
    }

    /// 把局面设成“不可逆”，清除回滚历史
    pub fn set_irrev(&mut self) {
        let chk = self.checked_by(false);
        self.rollback.clear();
        self.rollback.push(Rollback {
            zobr: self.zobr,
            vl_white: self.vl_white,
            vl_black: self.vl_black,
            mv: Move::NONE,
            captured: 0,
            reversible: 0,
            chk_chs: if chk > 0 {
                ChkChs::Check(chk)
            } else {
                ChkChs::None
            },
        });
        self.distance = 0;
        self.rep_hash.fill(0);
    }

    // ------------------------------------------------------------------
    // 着法检测
    // ------------------------------------------------------------------

    /// 好的吃子着法检测，这样的着法不记录到历史表和杀手着法表中
    pub fn good_cap(&self, mv: Move) -> bool {
        let pc_captured = self.squares[mv.dst()] as usize;
        if pc_captured == 0 {
            return false;
        }
        if !self.protected(opp_side(self.sd_player), mv.dst(), 0) {
            return true;
        }
        let pc_moved = self.squares[mv.src()] as usize;
        simple_value(pc_captured) > simple_value(pc_moved)
    }

    /// 判断是否能升变：在底线且兵(卒)不全，并且不处于被将军状态
    pub fn can_promote(&self) -> bool {
        self.bit_piece_side(self.sd_player) & PAWN_BITPIECE != PAWN_BITPIECE && !self.in_check()
    }

    /// 允许使用空着裁剪的条件
    #[inline]
    pub fn null_okay(&self) -> bool {
        (if self.sd_player == 0 {
            self.vl_white
        } else {
            self.vl_black
        }) > NULLOKAY_MARGIN
    }

    /// 空着裁剪可以不检验的条件
    #[inline]
    pub fn null_safe(&self) -> bool {
        (if self.sd_player == 0 {
            self.vl_white
        } else {
            self.vl_black
        }) > NULLSAFE_MARGIN
    }

    /// 着法合理性检测(不检验走后是否被将军，那是 make_move 的事)
    pub fn legal_move(&self, mv: Move) -> bool {
        let n_side_tag = side_tag(self.sd_player);
        let sq_src = mv.src();
        let sq_dst = mv.dst();
        let pc_moved = self.squares[sq_src] as usize;
        // 要走的子必须存在且属于走子方
        if pc_moved & n_side_tag == 0 {
            return false;
        }
        // 吃到的子必须是对方棋子(升变除外)
        let pc_captured = self.squares[sq_dst] as usize;
        if sq_src != sq_dst && pc_captured & n_side_tag != 0 {
            return false;
        }
        match piece_index(pc_moved) {
            KING_FROM => in_fort(sq_dst) && king_span(sq_src, sq_dst),
            ADVISOR_FROM | ADVISOR_TO => {
                if sq_src == sq_dst {
                    can_promote(sq_src) && self.can_promote()
                } else {
                    in_fort(sq_dst) && advisor_span(sq_src, sq_dst)
                }
            }
            BISHOP_FROM | BISHOP_TO => {
                if sq_src == sq_dst {
                    can_promote(sq_src) && self.can_promote()
                } else {
                    same_half(sq_src, sq_dst)
                        && bishop_span(sq_src, sq_dst)
                        && self.squares[bishop_pin(sq_src, sq_dst)] == 0
                }
            }
            KNIGHT_FROM | KNIGHT_TO => {
                let sq_pin = knight_pin(sq_src, sq_dst);
                sq_pin != sq_src && self.squares[sq_pin] == 0
            }
            ROOK_FROM | ROOK_TO => {
                let x = file_x(sq_src);
                let y = rank_y(sq_src);
                if x == file_x(sq_dst) {
                    let sms = self.file_mask(x, y);
                    if pc_captured == 0 {
                        sms.non_cap & tables().bit_file_mask[sq_dst] != 0
                    } else {
                        sms.rook_cap & tables().bit_file_mask[sq_dst] != 0
                    }
                } else if y == rank_y(sq_dst) {
                    let sms = self.rank_mask(x, y);
                    if pc_captured == 0 {
                        sms.non_cap & tables().bit_rank_mask[sq_dst] != 0
                    } else {
                        sms.rook_cap & tables().bit_rank_mask[sq_dst] != 0
                    }
                } else {
                    false
                }
            }
            CANNON_FROM | CANNON_TO => {
                let x = file_x(sq_src);
                let y = rank_y(sq_src);
                if x == file_x(sq_dst) {
                    let sms = self.file_mask(x, y);
                    if pc_captured == 0 {
                        sms.non_cap & tables().bit_file_mask[sq_dst] != 0
                    } else {
                        sms.cannon_cap & tables().bit_file_mask[sq_dst] != 0
                    }
                } else if y == rank_y(sq_dst) {
                    let sms = self.rank_mask(x, y);
                    if pc_captured == 0 {
                        sms.non_cap & tables().bit_rank_mask[sq_dst] != 0
                    } else {
                        sms.cannon_cap & tables().bit_rank_mask[sq_dst] != 0
                    }
                } else {
                    false
                }
            }
            _ => {
                // 兵(卒)：过河后可以横走一格，否则只能前进
                if pregen::away_half(sq_dst, self.sd_player)
                    && (sq_dst == sq_src - 1 || sq_dst == sq_src + 1)
                {
                    true
                } else {
                    sq_dst == square_forward(sq_src, self.sd_player)
                }
            }
        }
    }

    /// 将军检测：返回将军棋子的序号，0 表示没被将军，CHECK_MULTI 表示多子将军。
    /// lazy 为 true 时找到第一个将军子就返回
    pub fn checked_by(&self, lazy: bool) -> u8 {
        let n_opp_side_tag = opp_side_tag(self.sd_player);
        let sq_src = self.pieces[side_tag(self.sd_player)] as usize;
        if sq_src == 0 {
            return 0;
        }
        let mut pc_checked_by = 0u8;

        let x = file_x(sq_src);
        let y = rank_y(sq_src);
        let sms_rank = self.rank_mask(x, y);
        let sms_file = self.file_mask(x, y);

        // 将帅对脸
        let sq_dst = self.pieces[n_opp_side_tag + KING_FROM] as usize;
        if sq_dst != 0
            && x == file_x(sq_dst)
            && sms_file.rook_cap & tables().bit_file_mask[sq_dst] != 0
        {
            return CHECK_MULTI;
        }

        // 马
        for i in KNIGHT_FROM..=KNIGHT_TO {
            let sq_dst = self.pieces[n_opp_side_tag + i] as usize;
            if sq_dst != 0 {
                // 注意马腿是从将军子的方向看的
                let sq_pin = knight_pin(sq_dst, sq_src);
                if sq_pin != sq_dst && self.squares[sq_pin] == 0 {
                    if lazy || pc_checked_by > 0 {
                        return CHECK_MULTI;
                    }
                    pc_checked_by = (n_opp_side_tag + i) as u8;
                }
            }
        }

        // 车
        for i in ROOK_FROM..=ROOK_TO {
            let sq_dst = self.pieces[n_opp_side_tag + i] as usize;
            if sq_dst != 0 {
                if x == file_x(sq_dst) {
                    if sms_file.rook_cap & tables().bit_file_mask[sq_dst] != 0 {
                        if lazy || pc_checked_by > 0 {
                            return CHECK_MULTI;
                        }
                        pc_checked_by = (n_opp_side_tag + i) as u8;
                    }
                } else if y == rank_y(sq_dst)
                    && sms_rank.rook_cap & tables().bit_rank_mask[sq_dst] != 0
                {
                    if lazy || pc_checked_by > 0 {
                        return CHECK_MULTI;
                    }
                    pc_checked_by = (n_opp_side_tag + i) as u8;
                }
            }
        }

        // 炮
        for i in CANNON_FROM..=CANNON_TO {
            let sq_dst = self.pieces[n_opp_side_tag + i] as usize;
            if sq_dst != 0 {
                if x == file_x(sq_dst) {
                    if sms_file.cannon_cap & tables().bit_file_mask[sq_dst] != 0 {
                        if lazy || pc_checked_by > 0 {
                            return CHECK_MULTI;
                        }
                        pc_checked_by = (n_opp_side_tag + i) as u8;
                    }
                } else if y == rank_y(sq_dst)
                    && sms_rank.cannon_cap & tables().bit_rank_mask[sq_dst] != 0
                {
                    if lazy || pc_checked_by > 0 {
                        return CHECK_MULTI;
                    }
                    pc_checked_by = (n_opp_side_tag + i) as u8;
                }
            }
        }

        // 兵(卒)：帅(将)两侧和正前方
        for sq_dst in [sq_src - 1, sq_src + 1] {
            let pc = self.squares[sq_dst] as usize;
            if pc & n_opp_side_tag != 0 && piece_index(pc) >= PAWN_FROM {
                if lazy || pc_checked_by > 0 {
                    return CHECK_MULTI;
                }
                pc_checked_by = pc as u8;
            }
        }
        let pc = self.squares[square_forward(sq_src, self.sd_player)] as usize;
        if pc & n_opp_side_tag != 0 && piece_index(pc) >= PAWN_FROM {
            if lazy || pc_checked_by > 0 {
                return CHECK_MULTI;
            }
            pc_checked_by = pc as u8;
        }
        pc_checked_by
    }

    /// 判断是否已被将死(困毙)
    pub fn is_mate(&mut self) -> bool {
        let mut mvs = crate::moves::MoveList::new();
        self.gen_cap_moves(&mut mvs);
        for i in 0..mvs.len() {
            if self.make_move(mvs[i].mv) {
                self.undo_move();
                return false;
            }
        }
        // 着法生成分两部分做，这样可以节约时间
        mvs.clear();
        self.gen_noncap_moves(&mut mvs);
        for i in 0..mvs.len() {
            if self.make_move(mvs[i].mv) {
                self.undo_move();
                return false;
            }
        }
        true
    }

    /// 和棋判断
    pub fn is_draw(&self) -> bool {
        (!self.pre_eval.promotion && self.bit_piece & both_bitpiece(ATTACK_BITPIECE) == 0)
            || self.last_move().reversible >= DRAW_MOVES
            || self.rollback.len() == MAX_MOVE_NUM
    }

    /// 和棋的分值(对走子方而言)
    #[inline]
    pub fn draw_value(&self) -> i32 {
        if self.distance & 1 == 0 {
            -DRAW_VALUE
        } else {
            DRAW_VALUE
        }
    }

    /// 重复局面的分值
    pub fn rep_value(&self, rep: RepStatus) -> i32 {
        match rep {
            RepStatus::Loss => self.distance - BAN_VALUE,
            RepStatus::Win => BAN_VALUE - self.distance,
            _ => self.draw_value(),
        }
    }

    /// 子力平衡(包括先行权因素)
    #[inline]
    pub fn material(&self) -> i32 {
        side_value(self.sd_player, self.vl_white - self.vl_black) + self.pre_eval.vl_advanced
    }

    /// 重复局面检测。recur 是要求的重复次数：搜索内部取 1，根结点取 3
    pub fn rep_status(&self, mut recur: i32) -> RepStatus {
        // 迷你置换表说当前签名从未出现过，就不用扫描了
        if self.rep_hash[(self.zobr.key as usize) & REP_HASH_MASK] == 0 {
            return RepStatus::None;
        }

        // 双方的长打级别：0 表示无长打，0xffff 表示长捉，0x10000 表示长将
        fn set_perp_check(perp: &mut u32, chk_chs: ChkChs) {
            match chk_chs {
                ChkChs::None => *perp = 0,
                ChkChs::Check(_) => *perp &= 0x10000,
                ChkChs::Chase(pc) => *perp &= 1 << pc,
            }
        }

        let mut sd = opp_side(self.sd_player);
        let mut perp_check = 0x1ffffu32;
        let mut opp_perp_check = 0x1ffffu32;
        for rb in self.rollback.iter().rev() {
            // 空着或吃子着法之前不可能有重复
            if rb.mv.is_none() || rb.captured > 0 {
                break;
            }
            if sd == self.sd_player {
                set_perp_check(&mut perp_check, rb.chk_chs);
                if rb.zobr.lock0 == self.zobr.lock0 && rb.zobr.lock1 == self.zobr.lock1 {
                    recur -= 1;
                    if recur == 0 {
                        let norm = |perp: u32| if perp & 0xffff == 0 { perp } else { 0xffff };
                        let mine = norm(perp_check);
                        let opp = norm(opp_perp_check);
                        return if mine > opp {
                            RepStatus::Loss
                        } else if mine < opp {
                            RepStatus::Win
                        } else {
                            RepStatus::Draw
                        };
                    }
                }
            } else {
                set_perp_check(&mut opp_perp_check, rb.chk_chs);
            }
            sd = opp_side(sd);
        }
        RepStatus::None
    }

    // ------------------------------------------------------------------
    // FEN 和镜像
    // ------------------------------------------------------------------

    /// 从 FEN 串构造局面
    pub fn from_fen(fen: &str) -> Result<Position, String> {
        let fen = fen.trim();
        if fen.is_empty() {
            return Err("empty FEN".to_string());
        }
        let mut pos = Position::new_empty();
        // 每个兵种即将占有的棋子序号，添满后多余的棋子被忽略
        let mut pc_white = [
            side_tag(0) + KING_FROM,
            side_tag(0) + ADVISOR_FROM,
            side_tag(0) + BISHOP_FROM,
            side_tag(0) + KNIGHT_FROM,
            side_tag(0) + ROOK_FROM,
            side_tag(0) + CANNON_FROM,
            side_tag(0) + PAWN_FROM,
        ];
        let mut pc_black = pc_white.map(|pc| pc + 16);
        // 每个兵种占用序号的上界，填满后多余的棋子被忽略
        const PC_LIMIT: [usize; 7] = [
            side_tag(0) + KING_FROM + 1,
            side_tag(0) + ADVISOR_TO + 1,
            side_tag(0) + BISHOP_TO + 1,
            side_tag(0) + KNIGHT_TO + 1,
            side_tag(0) + ROOK_TO + 1,
            side_tag(0) + CANNON_TO + 1,
            side_tag(0) + PAWN_TO + 1,
        ];

        let mut chars = fen.chars();
        let mut y = RANK_TOP;
        let mut x = FILE_LEFT;
        for c in chars.by_ref() {
            if c == ' ' {
                break;
            }
            if c == '/' {
                x = FILE_LEFT;
                y += 1;
                if y > RANK_BOTTOM {
                    break;
                }
            } else if c.is_ascii_digit() {
                x += c as usize - '0' as usize;
            } else if c.is_ascii_uppercase() {
                if x <= FILE_RIGHT {
                    if let Some(k) = fen_piece(c) {
                        if pc_white[k] < PC_LIMIT[k] && pos.pieces[pc_white[k]] == 0 {
                            pos.add_piece(coord_xy(x, y), pc_white[k], false);
                            pc_white[k] += 1;
                        }
                    } else {
                        return Err(format!("bad piece letter: {}", c));
                    }
                    x += 1;
                }
            } else if c.is_ascii_lowercase() {
                if x <= FILE_RIGHT {
                    if let Some(k) = fen_piece(c.to_ascii_uppercase()) {
                        if pc_black[k] < PC_LIMIT[k] + 16 && pos.pieces[pc_black[k]] == 0 {
                            pos.add_piece(coord_xy(x, y), pc_black[k], false);
                            pc_black[k] += 1;
                        }
                    } else {
                        return Err(format!("bad piece letter: {}", c));
                    }
                    x += 1;
                }
            } else {
                return Err(format!("bad FEN char: {}", c));
            }
        }
        match chars.as_str().trim().chars().next() {
            Some('b') => pos.change_side(),
            Some('w') | Some('r') | None => {}
            Some(c) => return Err(format!("bad side to move: {}", c)),
        }
        pos.pre_evaluate();
        pos.set_irrev();
        Ok(pos)
    }

    /// 生成 FEN 串
    pub fn to_fen(&self) -> String {
        let mut fen = String::new();
        for y in RANK_TOP..=RANK_BOTTOM {
            let mut k = 0u8;
            for x in FILE_LEFT..=FILE_RIGHT {
                let pc = self.squares[coord_xy(x, y)] as usize;
                if pc != 0 {
                    if k > 0 {
                        fen.push((b'0' + k) as char);
                        k = 0;
                    }
                    let c = piece_byte(piece_type(pc));
                    fen.push(if pc < 32 { c } else { c.to_ascii_lowercase() });
                } else {
                    k += 1;
                }
            }
            if k > 0 {
                fen.push((b'0' + k) as char);
            }
            fen.push('/');
        }
        fen.pop();
        fen.push(' ');
        fen.push(if self.sd_player == 0 { 'w' } else { 'b' });
        fen
    }

    /// 局面的左右镜像(历史被清除)
    pub fn mirror(&self) -> Position {
        let mut pos = Position::new_empty();
        pos.pre_eval.promotion = self.pre_eval.promotion;
        for pc in 16..48 {
            let sq = self.pieces[pc] as usize;
            if sq != 0 {
                pos.add_piece(square_mirror(sq), pc, false);
            }
        }
        if self.sd_player == 1 {
            pos.change_side();
        }
        pos.pre_evaluate();
        pos.set_irrev();
        pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_position() {
        let pos = Position::from_fen(START_FEN).unwrap();
        assert_eq!(pos.sd_player, 0);
        // 32 个棋子都在
        assert_eq!(pos.bit_piece, 0xffff_ffff);
        // 红帅在 e0
        assert_eq!(pos.pieces[side_tag(0) + KING_FROM] as usize, 0xc7);
        assert_eq!(pos.pieces[side_tag(1) + KING_FROM] as usize, 0x37);
        assert!(!pos.in_check());
    }

    #[test]
    fn test_fen_round_trip() {
        for fen in [
            START_FEN,
            "4k4/9/9/9/9/9/9/9/9/4K4 w",
            "4k4/9/9/9/9/9/9/9/9/4K4 b",
            "2ba1k3/4a4/4b4/9/2n6/9/9/4B4/4A4/2BAK4 b",
            "3k5/9/9/9/9/9/9/9/9/R3K4 w",
        ] {
            let pos = Position::from_fen(fen).unwrap();
            assert_eq!(pos.to_fen(), fen);
        }
    }

    #[test]
    fn test_bad_fen() {
        assert!(Position::from_fen("").is_err());
        assert!(Position::from_fen("zzz w").is_err());
    }

    #[test]
    fn test_make_unmake_restores_position() {
        let mut pos = Position::from_fen(START_FEN).unwrap();
        let squares = pos.squares;
        let pieces = pos.pieces;
        let zobr = pos.zobr;
        let bit_ranks = pos.bit_ranks;
        let bit_files = pos.bit_files;
        let (vl_white, vl_black) = (pos.vl_white, pos.vl_black);

        // 炮二平五、马8进7、车一进一
        for coord in ["h2e2", "h9g7", "i0i1"] {
            let mv = Move::from_coord(coord).unwrap();
            assert!(pos.legal_move(mv), "move {} should be legal", coord);
            assert!(pos.make_move(mv));
        }
        for _ in 0..3 {
            pos.undo_move();
        }

        assert_eq!(pos.squares, squares);
        assert_eq!(pos.pieces, pieces);
        assert_eq!(pos.zobr, zobr);
        assert_eq!(pos.bit_ranks, bit_ranks);
        assert_eq!(pos.bit_files, bit_files);
        assert_eq!((pos.vl_white, pos.vl_black), (vl_white, vl_black));
        assert_eq!(pos.distance, 0);
    }

    #[test]
    fn test_zobrist_incremental_matches_rebuild() {
        let mut pos = Position::from_fen(START_FEN).unwrap();
        for coord in ["c3c4", "c6c5", "c4c5", "b9c7"] {
            let mv = Move::from_coord(coord).unwrap();
            assert!(pos.make_move(mv));
        }
        let rebuilt = Position::from_fen(&pos.to_fen()).unwrap();
        assert_eq!(pos.zobr, rebuilt.zobr);
    }

    #[test]
    fn test_illegal_self_check_rolls_back() {
        // 红帅和黑车同列，中间隔一个红车：红车离线就是送将
        let mut pos = Position::from_fen("4k4/9/4r4/9/9/9/9/9/4R4/4K4 w").unwrap();
        let snapshot = pos.zobr;
        let mv = Move::from_coord("e1d1").unwrap();
        // 结构上合理，但走后被将军，必须完全回滚
        assert!(pos.legal_move(mv));
        assert!(!pos.make_move(mv));
        assert_eq!(pos.zobr, snapshot);
        assert_eq!(pos.distance, 0);
        assert_eq!(pos.move_num(), 1);
    }

    #[test]
    fn test_check_detection() {
        // 黑将被红车将军
        let pos = Position::from_fen("4k4/9/9/9/9/9/9/9/9/3KR4 b").unwrap();
        assert!(pos.checked_by(true) > 0);
        // 马腿被塞住就不是将军
        let pos = Position::from_fen("4k4/5p3/5N3/9/9/9/9/9/9/4K4 b").unwrap();
        assert_eq!(pos.checked_by(true), 0);
    }

    #[test]
    fn test_flying_king_illegal() {
        // 将帅对脸
        let mut pos = Position::from_fen("4k4/9/9/9/9/9/9/9/9/3K5 w").unwrap();
        let mv = Move::from_coord("d0e0").unwrap();
        assert!(pos.legal_move(mv));
        assert!(!pos.make_move(mv));
    }

    #[test]
    fn test_rep_status_draw() {
        // 双车来回：普通重复，和棋
        let mut pos = Position::from_fen("4k4/9/9/9/9/9/9/9/r8/R3K4 w").unwrap();
        let seq = ["a0b0", "a1b1", "b0a0", "b1a1", "a0b0", "a1b1", "b0a0", "b1a1"];
        let mut rep = RepStatus::None;
        for (i, coord) in seq.iter().enumerate() {
            let mv = Move::from_coord(coord).unwrap();
            assert!(pos.make_move(mv), "move {} ({})", i, coord);
            rep = pos.rep_status(1);
            if rep != RepStatus::None {
                break;
            }
        }
        assert_eq!(rep, RepStatus::Draw);
    }

    #[test]
    fn test_rep_status_perpetual_check_loses() {
        // 红车长将
        let mut pos = Position::from_fen("3k5/9/9/9/9/9/9/9/9/R4K3 w").unwrap();
        let checks = ["a0d0", "d9e9", "d0e0", "e9d9", "e0d0", "d9e9", "d0e0", "e9d9"];
        let mut rep = RepStatus::None;
        for coord in checks {
            let mv = Move::from_coord(coord).unwrap();
            assert!(pos.make_move(mv), "move {}", coord);
            rep = pos.rep_status(1);
            if rep != RepStatus::None {
                break;
            }
        }
        // 轮到红方走时检测到重复，红方一直在将军，判负
        assert_eq!(rep, RepStatus::Loss);
    }

    #[test]
    fn test_mirror() {
        let pos = Position::from_fen(START_FEN).unwrap();
        let mirror = pos.mirror();
        // 起始局面左右对称
        assert_eq!(mirror.zobr.lock1, pos.zobr.lock1);
        let pos = Position::from_fen("4k4/9/9/9/9/9/9/9/9/R3K4 w").unwrap();
        let mirror = pos.mirror();
        assert_eq!(mirror.to_fen(), "4k4/9/9/9/9/9/9/9/9/4K3R w");
    }

    #[test]
    fn test_null_move_round_trip() {
        let mut pos = Position::from_fen(START_FEN).unwrap();
        let zobr = pos.zobr;
        pos.null_move();
        assert_eq!(pos.sd_player, 1);
        pos.undo_null_move();
        assert_eq!(pos.sd_player, 0);
        assert_eq!(pos.zobr, zobr);
    }
}
