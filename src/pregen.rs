//! 预生成表
//!
//! 棋盘几何表、“位行/位列”滑动着法表和 Zobrist 键值表。
//! 全部表只在进程启动时构造一次，此后只读。

use rand::prelude::*;

// 16x16 棋盘的有效区域边界
pub const RANK_TOP: usize = 3;
pub const RANK_BOTTOM: usize = 12;
pub const FILE_LEFT: usize = 3;
pub const FILE_CENTER: usize = 7;
pub const FILE_RIGHT: usize = 11;

/// 棋盘区域表
pub static IN_BOARD: [bool; 256] = build_in_board();
/// 九宫区域表
pub static IN_FORT: [bool; 256] = build_in_fort();
/// 升变区域表（双方底线）
pub static CAN_PROMOTE: [bool; 256] = build_can_promote();
/// 合理着法跨度表，下标是 dst - src + 256
pub static LEGAL_SPAN: [i8; 512] = build_legal_span();
/// 马腿表，下标同上，值是马腿相对于起点的位移
pub static KNIGHT_PIN_TAB: [i8; 512] = build_knight_pin();
/// 坐标的左右镜像表
pub static SQUARE_MIRROR_TAB: [u8; 256] = build_mirror();

const fn build_in_board() -> [bool; 256] {
    let mut tab = [false; 256];
    let mut sq = 0;
    while sq < 256 {
        let x = sq & 15;
        let y = sq >> 4;
        tab[sq] = x >= FILE_LEFT && x <= FILE_RIGHT && y >= RANK_TOP && y <= RANK_BOTTOM;
        sq += 1;
    }
    tab
}

const fn build_in_fort() -> [bool; 256] {
    let mut tab = [false; 256];
    let mut sq = 0;
    while sq < 256 {
        let x = sq & 15;
        let y = sq >> 4;
        tab[sq] = x >= 6 && x <= 8 && ((y >= 3 && y <= 5) || (y >= 10 && y <= 12));
        sq += 1;
    }
    tab
}

const fn build_can_promote() -> [bool; 256] {
    let mut tab = [false; 256];
    let mut sq = 0;
    while sq < 256 {
        let x = sq & 15;
        let y = sq >> 4;
        tab[sq] = x >= FILE_LEFT && x <= FILE_RIGHT && (y == RANK_TOP || y == RANK_BOTTOM);
        sq += 1;
    }
    tab
}

const fn build_legal_span() -> [i8; 512] {
    let mut tab = [0i8; 512];
    // 帅(将)一步、仕(士)斜一步、相(象)田字
    tab[256 - 16] = 1;
    tab[256 - 1] = 1;
    tab[256 + 1] = 1;
    tab[256 + 16] = 1;
    tab[256 - 17] = 2;
    tab[256 - 15] = 2;
    tab[256 + 15] = 2;
    tab[256 + 17] = 2;
    tab[256 - 34] = 3;
    tab[256 - 30] = 3;
    tab[256 + 30] = 3;
    tab[256 + 34] = 3;
    tab
}

const fn build_knight_pin() -> [i8; 512] {
    let mut tab = [0i8; 512];
    tab[256 - 33] = -16;
    tab[256 - 31] = -16;
    tab[256 - 18] = -1;
    tab[256 - 14] = 1;
    tab[256 + 14] = -1;
    tab[256 + 18] = 1;
    tab[256 + 31] = 16;
    tab[256 + 33] = 16;
    tab
}

const fn build_mirror() -> [u8; 256] {
    let mut tab = [0u8; 256];
    let mut sq = 0;
    while sq < 256 {
        let x = sq & 15;
        let y = sq >> 4;
        if x >= FILE_LEFT && x <= FILE_RIGHT && y >= RANK_TOP && y <= RANK_BOTTOM {
            tab[sq] = ((14 - x) + (y << 4)) as u8;
        }
        sq += 1;
    }
    tab
}

#[inline]
pub fn in_board(sq: usize) -> bool {
    IN_BOARD[sq]
}

#[inline]
pub fn in_fort(sq: usize) -> bool {
    IN_FORT[sq]
}

#[inline]
pub fn can_promote(sq: usize) -> bool {
    CAN_PROMOTE[sq]
}

#[inline]
pub fn rank_y(sq: usize) -> usize {
    sq >> 4
}

#[inline]
pub fn file_x(sq: usize) -> usize {
    sq & 15
}

#[inline]
pub fn coord_xy(x: usize, y: usize) -> usize {
    x + (y << 4)
}

#[inline]
pub fn square_flip(sq: usize) -> usize {
    254 - sq
}

#[inline]
pub fn file_flip(x: usize) -> usize {
    14 - x
}

#[inline]
pub fn rank_flip(y: usize) -> usize {
    15 - y
}

#[inline]
pub fn opp_side(sd: usize) -> usize {
    1 - sd
}

/// 兵(卒)前进一格
#[inline]
pub fn square_forward(sq: usize, sd: usize) -> usize {
    (sq as isize - 16 + ((sd as isize) << 5)) as usize
}

#[inline]
pub fn square_backward(sq: usize, sd: usize) -> usize {
    (sq as isize + 16 - ((sd as isize) << 5)) as usize
}

#[inline]
fn span_disp(sq_src: usize, sq_dst: usize) -> usize {
    sq_dst + 256 - sq_src
}

#[inline]
pub fn king_span(sq_src: usize, sq_dst: usize) -> bool {
    LEGAL_SPAN[span_disp(sq_src, sq_dst)] == 1
}

#[inline]
pub fn advisor_span(sq_src: usize, sq_dst: usize) -> bool {
    LEGAL_SPAN[span_disp(sq_src, sq_dst)] == 2
}

#[inline]
pub fn bishop_span(sq_src: usize, sq_dst: usize) -> bool {
    LEGAL_SPAN[span_disp(sq_src, sq_dst)] == 3
}

/// 象眼位置
#[inline]
pub fn bishop_pin(sq_src: usize, sq_dst: usize) -> usize {
    (sq_src + sq_dst) >> 1
}

/// 马腿位置，若着法不是马的跨度则返回起点本身
#[inline]
pub fn knight_pin(sq_src: usize, sq_dst: usize) -> usize {
    (sq_src as isize + KNIGHT_PIN_TAB[span_disp(sq_src, sq_dst)] as isize) as usize
}

#[inline]
pub fn white_half(sq: usize) -> bool {
    (sq & 0x80) != 0
}

#[inline]
pub fn black_half(sq: usize) -> bool {
    (sq & 0x80) == 0
}

#[inline]
pub fn home_half(sq: usize, sd: usize) -> bool {
    (sq & 0x80) != (sd << 7)
}

#[inline]
pub fn away_half(sq: usize, sd: usize) -> bool {
    (sq & 0x80) == (sd << 7)
}

#[inline]
pub fn same_half(sq_src: usize, sq_dst: usize) -> bool {
    ((sq_src ^ sq_dst) & 0x80) == 0
}

#[inline]
pub fn rank_disp(y: usize) -> usize {
    y << 4
}

#[inline]
pub fn file_disp(x: usize) -> usize {
    x
}

#[inline]
pub fn square_mirror(sq: usize) -> usize {
    SQUARE_MIRROR_TAB[sq] as usize
}

// ============================================================================
// 滑动着法预置结构
// ============================================================================

/// 借助“位行/位列”生成车炮着法的预置结构
/// [0] 是向右/向下的最远一格，[1] 是向左/向上的最远一格
#[derive(Clone, Copy, Default)]
pub struct SlideMove {
    pub non_cap: [u8; 2],
    pub rook_cap: [u8; 2],
    pub cannon_cap: [u8; 2],
    pub super_cap: [u8; 2],
}

/// 借助“位行/位列”判断车炮着法合理性的屏蔽位结构
#[derive(Clone, Copy, Default)]
pub struct SlideMask {
    pub non_cap: u16,
    pub rook_cap: u16,
    pub cannon_cap: u16,
    pub super_cap: u16,
}

// ============================================================================
// Zobrist
// ============================================================================

/// 96 位 Zobrist 签名：一个索引键加两个校验锁
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct Zobrist {
    pub key: u32,
    pub lock0: u32,
    pub lock1: u32,
}

impl Zobrist {
    fn from_rng(rng: &mut StdRng) -> Self {
        Zobrist {
            key: rng.gen(),
            lock0: rng.gen(),
            lock1: rng.gen(),
        }
    }

    #[inline]
    pub fn xor(&mut self, other: &Zobrist) {
        self.key ^= other.key;
        self.lock0 ^= other.lock0;
        self.lock1 ^= other.lock1;
    }

    #[inline]
    pub fn xor2(&mut self, z1: &Zobrist, z2: &Zobrist) {
        self.key ^= z1.key ^ z2.key;
        self.lock0 ^= z1.lock0 ^ z2.lock0;
        self.lock1 ^= z1.lock1 ^ z2.lock1;
    }
}

// ============================================================================
// 预生成表本体
// ============================================================================

/// 一次性构造的只读表集合
pub struct Tables {
    /// 走子方键值
    pub zobr_player: Zobrist,
    /// 14 种棋子(红 7 + 黑 7)在每个格子上的键值
    pub zobr_table: Vec<[Zobrist; 256]>,

    /// 每个格子在位行中的屏蔽位
    pub bit_rank_mask: [u16; 256],
    /// 每个格子在位列中的屏蔽位
    pub bit_file_mask: [u16; 256],

    /// 车炮横向着法表 [x - FILE_LEFT][位行]
    pub rank_move_tab: Vec<[SlideMove; 512]>,
    /// 车炮纵向着法表 [y - RANK_TOP][位列]
    pub file_move_tab: Vec<[SlideMove; 1024]>,
    pub rank_mask_tab: Vec<[SlideMask; 512]>,
    pub file_mask_tab: Vec<[SlideMask; 1024]>,

    /// 其余棋子的着法目标表，以 0 结尾
    pub king_moves: Vec<[u8; 8]>,
    pub advisor_moves: Vec<[u8; 8]>,
    pub bishop_moves: Vec<[u8; 8]>,
    pub bishop_pins: Vec<[u8; 4]>,
    pub knight_moves: Vec<[u8; 12]>,
    pub knight_pins: Vec<[u8; 8]>,
    pub pawn_moves: [Vec<[u8; 4]>; 2],
}

// 走子方向偏移表
const KING_MOVE_TAB: [isize; 4] = [-0x10, -0x01, 0x01, 0x10];
const ADVISOR_MOVE_TAB: [isize; 4] = [-0x11, -0x0f, 0x0f, 0x11];
const BISHOP_MOVE_TAB: [isize; 4] = [-0x22, -0x1e, 0x1e, 0x22];
const KNIGHT_MOVE_TAB: [isize; 8] = [-0x21, -0x1f, -0x12, -0x0e, 0x0e, 0x12, 0x1f, 0x21];

impl Tables {
    pub fn new() -> Self {
        // Zobrist 键值表用固定种子生成，保证跨进程可复现(开局库依赖该键值)
        let mut rng = StdRng::seed_from_u64(0x0f0f_0f0f_0f0f_0f0f);
        let zobr_player = Zobrist::from_rng(&mut rng);
        let mut zobr_table = vec![[Zobrist::default(); 256]; 14];
        for row in zobr_table.iter_mut() {
            for z in row.iter_mut() {
                *z = Zobrist::from_rng(&mut rng);
            }
        }

        // 位行和位列不包括棋盘以外的位
        let mut bit_rank_mask = [0u16; 256];
        let mut bit_file_mask = [0u16; 256];
        for sq in 0..256 {
            if in_board(sq) {
                bit_rank_mask[sq] = 1 << (file_x(sq) - FILE_LEFT);
                bit_file_mask[sq] = 1 << (rank_y(sq) - RANK_TOP);
            }
        }

        // 横向滑动表：9 列起点 x 512 种位行
        let mut rank_move_tab = vec![[SlideMove::default(); 512]; 9];
        let mut rank_mask_tab = vec![[SlideMask::default(); 512]; 9];
        for i in 0..9usize {
            for j in 0..512usize {
                let mut smv = SlideMove::default();
                let mut sms = SlideMask::default();
                let start = (i + FILE_LEFT) as u8;
                smv.non_cap = [start; 2];
                smv.rook_cap = [start; 2];
                smv.cannon_cap = [start; 2];
                smv.super_cap = [start; 2];
                // 向右([0])依次找到不吃子、车吃、炮吃和隔两子吃的最远格
                let mut k = i + 1;
                while k <= 8 {
                    if j & (1 << k) != 0 {
                        smv.rook_cap[0] = file_disp(k + FILE_LEFT) as u8;
                        sms.rook_cap |= 1 << k;
                        break;
                    }
                    smv.non_cap[0] = file_disp(k + FILE_LEFT) as u8;
                    sms.non_cap |= 1 << k;
                    k += 1;
                }
                k += 1;
                while k <= 8 {
                    if j & (1 << k) != 0 {
                        smv.cannon_cap[0] = file_disp(k + FILE_LEFT) as u8;
                        sms.cannon_cap |= 1 << k;
                        break;
                    }
                    k += 1;
                }
                k += 1;
                while k <= 8 {
                    if j & (1 << k) != 0 {
                        smv.super_cap[0] = file_disp(k + FILE_LEFT) as u8;
                        sms.super_cap |= 1 << k;
                        break;
                    }
                    k += 1;
                }
                // 向左([1])同理
                let mut k = i as isize - 1;
                while k >= 0 {
                    if j & (1 << k) != 0 {
                        smv.rook_cap[1] = file_disp(k as usize + FILE_LEFT) as u8;
                        sms.rook_cap |= 1 << k;
                        break;
                    }
                    smv.non_cap[1] = file_disp(k as usize + FILE_LEFT) as u8;
                    sms.non_cap |= 1 << k;
                    k -= 1;
                }
                k -= 1;
                while k >= 0 {
                    if j & (1 << k) != 0 {
                        smv.cannon_cap[1] = file_disp(k as usize + FILE_LEFT) as u8;
                        sms.cannon_cap |= 1 << k;
                        break;
                    }
                    k -= 1;
                }
                k -= 1;
                while k >= 0 {
                    if j & (1 << k) != 0 {
                        smv.super_cap[1] = file_disp(k as usize + FILE_LEFT) as u8;
                        sms.super_cap |= 1 << k;
                        break;
                    }
                    k -= 1;
                }
                rank_move_tab[i][j] = smv;
                rank_mask_tab[i][j] = sms;
            }
        }

        // 纵向滑动表：10 行起点 x 1024 种位列
        let mut file_move_tab = vec![[SlideMove::default(); 1024]; 10];
        let mut file_mask_tab = vec![[SlideMask::default(); 1024]; 10];
        for i in 0..10usize {
            for j in 0..1024usize {
                let mut smv = SlideMove::default();
                let mut sms = SlideMask::default();
                let start = (((i + RANK_TOP) << 4) & 0xff) as u8;
                smv.non_cap = [start; 2];
                smv.rook_cap = [start; 2];
                smv.cannon_cap = [start; 2];
                smv.super_cap = [start; 2];
                let mut k = i + 1;
                while k <= 9 {
                    if j & (1 << k) != 0 {
                        smv.rook_cap[0] = rank_disp(k + RANK_TOP) as u8;
                        sms.rook_cap |= 1 << k;
                        break;
                    }
                    smv.non_cap[0] = rank_disp(k + RANK_TOP) as u8;
                    sms.non_cap |= 1 << k;
                    k += 1;
                }
                k += 1;
                while k <= 9 {
                    if j & (1 << k) != 0 {
                        smv.cannon_cap[0] = rank_disp(k + RANK_TOP) as u8;
                        sms.cannon_cap |= 1 << k;
                        break;
                    }
                    k += 1;
                }
                k += 1;
                while k <= 9 {
                    if j & (1 << k) != 0 {
                        smv.super_cap[0] = rank_disp(k + RANK_TOP) as u8;
                        sms.super_cap |= 1 << k;
                        break;
                    }
                    k += 1;
                }
                let mut k = i as isize - 1;
                while k >= 0 {
                    if j & (1 << k) != 0 {
                        smv.rook_cap[1] = rank_disp(k as usize + RANK_TOP) as u8;
                        sms.rook_cap |= 1 << k;
                        break;
                    }
                    smv.non_cap[1] = rank_disp(k as usize + RANK_TOP) as u8;
                    sms.non_cap |= 1 << k;
                    k -= 1;
                }
                k -= 1;
                while k >= 0 {
                    if j & (1 << k) != 0 {
                        smv.cannon_cap[1] = rank_disp(k as usize + RANK_TOP) as u8;
                        sms.cannon_cap |= 1 << k;
                        break;
                    }
                    k -= 1;
                }
                k -= 1;
                while k >= 0 {
                    if j & (1 << k) != 0 {
                        smv.super_cap[1] = rank_disp(k as usize + RANK_TOP) as u8;
                        sms.super_cap |= 1 << k;
                        break;
                    }
                    k -= 1;
                }
                file_move_tab[i][j] = smv;
                file_mask_tab[i][j] = sms;
            }
        }

        // 步进棋子的着法目标表
        let mut king_moves = vec![[0u8; 8]; 256];
        let mut advisor_moves = vec![[0u8; 8]; 256];
        let mut bishop_moves = vec![[0u8; 8]; 256];
        let mut bishop_pins = vec![[0u8; 4]; 256];
        let mut knight_moves = vec![[0u8; 12]; 256];
        let mut knight_pins = vec![[0u8; 8]; 256];
        let mut pawn_moves = [vec![[0u8; 4]; 256], vec![[0u8; 4]; 256]];
        for sq_src in 0..256usize {
            if !in_board(sq_src) {
                continue;
            }
            let mut n = 0;
            for &delta in KING_MOVE_TAB.iter() {
                let sq_dst = (sq_src as isize + delta) as usize;
                if in_fort(sq_dst) {
                    king_moves[sq_src][n] = sq_dst as u8;
                    n += 1;
                }
            }
            let mut n = 0;
            for &delta in ADVISOR_MOVE_TAB.iter() {
                let sq_dst = (sq_src as isize + delta) as usize;
                if in_fort(sq_dst) {
                    advisor_moves[sq_src][n] = sq_dst as u8;
                    n += 1;
                }
            }
            let mut n = 0;
            for &delta in BISHOP_MOVE_TAB.iter() {
                let sq_dst = (sq_src as isize + delta) as usize;
                if sq_dst < 256 && in_board(sq_dst) && same_half(sq_src, sq_dst) {
                    bishop_moves[sq_src][n] = sq_dst as u8;
                    bishop_pins[sq_src][n] = bishop_pin(sq_src, sq_dst) as u8;
                    n += 1;
                }
            }
            let mut n = 0;
            for &delta in KNIGHT_MOVE_TAB.iter() {
                let sq_dst = (sq_src as isize + delta) as usize;
                if sq_dst < 256 && in_board(sq_dst) {
                    knight_moves[sq_src][n] = sq_dst as u8;
                    knight_pins[sq_src][n] = knight_pin(sq_src, sq_dst) as u8;
                    n += 1;
                }
            }
            for sd in 0..2usize {
                let mut n = 0;
                let sq_dst = square_forward(sq_src, sd);
                if sq_dst < 256 && in_board(sq_dst) {
                    pawn_moves[sd][sq_src][n] = sq_dst as u8;
                    n += 1;
                }
                if away_half(sq_src, sd) {
                    for delta in [-1isize, 1] {
                        let sq_dst = (sq_src as isize + delta) as usize;
                        if in_board(sq_dst) {
                            pawn_moves[sd][sq_src][n] = sq_dst as u8;
                            n += 1;
                        }
                    }
                }
            }
        }

        Tables {
            zobr_player,
            zobr_table,
            bit_rank_mask,
            bit_file_mask,
            rank_move_tab,
            file_move_tab,
            rank_mask_tab,
            file_mask_tab,
            king_moves,
            advisor_moves,
            bishop_moves,
            bishop_pins,
            knight_moves,
            knight_pins,
            pawn_moves,
        }
    }
}

impl Default for Tables {
    fn default() -> Self {
        Tables::new()
    }
}

lazy_static::lazy_static! {
    static ref TABLES: Tables = Tables::new();
}

/// 全局只读表，首次访问时构造
#[inline]
pub fn tables() -> &'static Tables {
    &TABLES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_board_geometry() {
        assert!(in_board(0x33));
        assert!(in_board(0xcb));
        assert!(!in_board(0x32));
        assert!(!in_board(0x00));
        assert!(in_fort(0xc7));
        assert!(in_fort(0x37));
        assert!(!in_fort(0x77));
        assert_eq!(coord_xy(7, 11), 0xb7);
        assert_eq!(file_x(0xb7), 7);
        assert_eq!(rank_y(0xb7), 11);
    }

    #[test]
    fn test_spans() {
        assert!(king_span(0xc7, 0xb7));
        assert!(!king_span(0xc7, 0xa7));
        assert!(advisor_span(0xc8, 0xb7));
        assert!(bishop_span(0xc7, 0xa5));
        assert_eq!(bishop_pin(0xc7, 0xa5), 0xb6);
        // 马腿：从 0xc7 跳到 0xa6，腿在 0xb7
        assert_eq!(knight_pin(0xc7, 0xa6), 0xb7);
        // 不是马的跨度时返回起点
        assert_eq!(knight_pin(0xc7, 0xc8), 0xc7);
    }

    #[test]
    fn test_mirror() {
        assert_eq!(square_mirror(0x33), 0x3b);
        assert_eq!(square_mirror(0x37), 0x37);
        assert_eq!(square_mirror(square_mirror(0xc6)), 0xc6);
    }

    #[test]
    fn test_slide_tables() {
        let tab = tables();
        // 初始局面红炮所在列的位列是 1010000101b(从上往下第 0 位是黑方底线)
        // 起点在第 2 行(下标)，炮吃子的目标应该是第 9 行
        let bits: usize = 0b1010000101;
        let smv = &tab.file_move_tab[2][bits];
        assert_eq!(rank_y(smv.cannon_cap[0] as usize), 9 + RANK_TOP);
        // 车吃子的目标是第 7 行
        assert_eq!(rank_y(smv.rook_cap[0] as usize), 7 + RANK_TOP);
        // 不吃子最远到第 6 行
        assert_eq!(rank_y(smv.non_cap[0] as usize), 6 + RANK_TOP);
    }

    #[test]
    fn test_pawn_moves() {
        let tab = tables();
        // 红兵在己方半场只能前进
        let sq = coord_xy(3, 9); // 红方兵线
        assert_eq!(tab.pawn_moves[0][sq][0] as usize, sq - 16);
        assert_eq!(tab.pawn_moves[0][sq][1], 0);
        // 过河后可以横走
        let sq = coord_xy(7, 6);
        let targets: Vec<usize> = tab.pawn_moves[0][sq]
            .iter()
            .take_while(|&&s| s != 0)
            .map(|&s| s as usize)
            .collect();
        assert_eq!(targets.len(), 3);
    }
}
