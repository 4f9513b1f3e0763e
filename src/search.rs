//! 搜索
//!
//! 迭代加深的 Alpha-Beta 搜索：零窗口完全搜索和主要变例搜索互相递归，
//! 叶子结点进入只展开吃子(被将军时展开应将)的静态搜索。
//! 中断检查只在固定结点间隔的轮询点做，停止信号沿递归栈一路提前返回。

use crate::book::get_book_moves;
use crate::hash::{HashTable, DEFAULT_HASH_MB, HASH_ALPHA, HASH_BETA, HASH_PV, NULL_DEPTH};
use crate::moves::Move;
use crate::movesort::{
    clear_killers, set_best_move, HistoryTable, KillerTable, MoveSort, LIMIT_DEPTH,
};
use crate::position::{Position, RepStatus, MATE_VALUE, WIN_VALUE};
use log::debug;
use rand::prelude::*;
use std::path::PathBuf;
use std::time::Instant;

/// 内部迭代加深的深度
const IID_DEPTH: i32 = 2;
/// “未改变最佳着法”触发时限减半的层数
const UNCHANGED_DEPTH: i32 = 4;

/// 落后的分值
const DROPDOWN_VALUE: i32 = 20;
/// 认输的分值
const RESIGN_VALUE: i32 = 300;
/// 提和的分值
const DRAW_OFFER_VALUE: i32 = 40;

/// UCCI 引擎思考的极限深度
pub const UCCI_MAX_DEPTH: i32 = 32;

/// 搜索的时间/结点预算
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GoMode {
    Infinite,
    Nodes(i64),
    Timer { proper_ms: i64, max_ms: i64 },
}

/// 搜索过程中从指令通道收到的信号
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Signal {
    Stop,
    PonderHit,
    PonderHitDraw,
    Quit,
}

/// 非阻塞指令源。搜索只在轮询点调用，耗时必须可忽略；
/// 与搜索无关的指令(如 isready)由实现方自行消化
pub trait ControlSource {
    fn poll(&mut self) -> Option<Signal>;
}

/// 不接外部指令时的空指令源
pub struct NullControl;

impl ControlSource for NullControl {
    fn poll(&mut self) -> Option<Signal> {
        None
    }
}

/// 引擎选项(setoption 可改)
#[derive(Clone, Debug)]
pub struct EngineOptions {
    pub use_hash: bool,
    pub use_book: bool,
    pub null_move: bool,
    pub knowledge: bool,
    /// 随机性屏蔽位，0 表示不随机
    pub random_mask: u32,
    pub hash_mb: usize,
    pub book_file: Option<PathBuf>,
    pub debug: bool,
    /// 中断轮询的结点数掩码
    pub count_mask: i64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            use_hash: true,
            use_book: true,
            null_move: true,
            knowledge: true,
            random_mask: 0,
            hash_mb: DEFAULT_HASH_MB,
            book_file: None,
            debug: false,
            count_mask: 4095,
        }
    }
}

/// 一次 go 的参数
#[derive(Clone, Debug)]
pub struct GoParams {
    pub mode: GoMode,
    pub depth: i32,
    pub ponder: bool,
    pub draw_offered: bool,
    pub ban_moves: Vec<Move>,
}

impl Default for GoParams {
    fn default() -> Self {
        GoParams {
            mode: GoMode::Infinite,
            depth: UCCI_MAX_DEPTH,
            ponder: false,
            draw_offered: false,
            ban_moves: Vec::new(),
        }
    }
}

/// 搜索结果；best 为 None 表示没有着法可走(和棋或被将死)
#[derive(Clone, Debug, Default)]
pub struct SearchResult {
    pub best: Option<Move>,
    pub ponder: Option<Move>,
    pub vl: i32,
    pub resign: bool,
    pub draw_offer: bool,
    pub pv: Vec<Move>,
    /// 搜索中收到了 quit
    pub quit: bool,
    pub nodes: i64,
}

/// 引擎：局面加上搜索要用的全部表和状态，单线程独占
pub struct Engine {
    pub pos: Position,
    pub opts: EngineOptions,
    hash: HashTable,
    history: HistoryTable,
    killers: KillerTable,
    rng: StdRng,

    // 每次 go 重置的状态
    start_time: Instant,
    all_nodes: i64,
    main_nodes: i64,
    unchanged: i32,
    stop: bool,
    ponder_stop: bool,
    quit: bool,
    ponder: bool,
    draw_offered: bool,
    go_mode: GoMode,
    pv_line: Vec<Move>,
    root: Option<MoveSort>,
    // info 输出控制
    emit_info: bool,
    pop_pv: bool,
    pop_curr_move: bool,
    pop_depth: i32,
    pop_value: i32,
}

impl Engine {
    pub fn new(opts: EngineOptions) -> Self {
        let hash_mb = opts.hash_mb;
        Engine {
            pos: Position::from_fen(crate::position::START_FEN).expect("start fen"),
            opts,
            hash: HashTable::new(hash_mb),
            history: HistoryTable::new(),
            killers: [[Move::NONE; 2]; LIMIT_DEPTH],
            rng: StdRng::from_entropy(),
            start_time: Instant::now(),
            all_nodes: 0,
            main_nodes: 0,
            unchanged: 0,
            stop: false,
            ponder_stop: false,
            quit: false,
            ponder: false,
            draw_offered: false,
            go_mode: GoMode::Infinite,
            pv_line: Vec::new(),
            root: None,
            emit_info: false,
            pop_pv: false,
            pop_curr_move: false,
            pop_depth: 0,
            pop_value: 0,
        }
    }

    /// 换置换表大小(setoption hashsize)
    pub fn resize_hash(&mut self, mb: usize) {
        self.opts.hash_mb = mb;
        self.hash = HashTable::new(mb);
    }

    /// 新对局：清空置换表
    pub fn new_game(&mut self) {
        self.hash.clear();
        self.history.clear();
        clear_killers(&mut self.killers);
    }

    /// probe 指令：输出置换表中指定局面的信息
    pub fn pop_hash(&self, pos: &Position) -> Option<crate::hash::PopHashInfo> {
        self.hash.pop_hash(pos)
    }

    #[inline]
    fn elapsed_ms(&self) -> i64 {
        self.start_time.elapsed().as_millis() as i64
    }

    // ------------------------------------------------------------------
    // 中断
    // ------------------------------------------------------------------

    fn interrupt(&mut self, ctl: &mut dyn ControlSource) -> bool {
        match self.go_mode {
            GoMode::Nodes(nodes) => {
                if !self.ponder && self.all_nodes > nodes * 4 {
                    self.stop = true;
                    return true;
                }
            }
            GoMode::Timer { max_ms, .. } => {
                if !self.ponder && self.elapsed_ms() > max_ms {
                    self.stop = true;
                    return true;
                }
            }
            GoMode::Infinite => {}
        }
        match ctl.poll() {
            None => false,
            Some(Signal::Stop) => {
                self.stop = true;
                true
            }
            Some(Signal::PonderHit) => {
                // ponderhit 启动计时；如果已经搜索了足够时间就立即中止
                if self.ponder_stop {
                    self.stop = true;
                    true
                } else {
                    self.ponder = false;
                    false
                }
            }
            Some(Signal::PonderHitDraw) => {
                self.draw_offered = true;
                if self.ponder_stop {
                    self.stop = true;
                    true
                } else {
                    self.ponder = false;
                    false
                }
            }
            Some(Signal::Quit) => {
                self.quit = true;
                self.stop = true;
                true
            }
        }
    }

    // ------------------------------------------------------------------
    // 裁剪和评价
    // ------------------------------------------------------------------

    /// 无害裁剪：杀棋步数、和棋和重复局面
    fn harmless_pruning(&self, vl_beta: i32) -> i32 {
        let vl = self.pos.distance - MATE_VALUE;
        if vl >= vl_beta {
            return vl;
        }
        if self.pos.is_draw() {
            // 安全起见不用 draw_value()
            return 0;
        }
        let rep = self.pos.rep_status(1);
        if rep != RepStatus::None {
            return self.pos.rep_value(rep);
        }
        -MATE_VALUE
    }

    /// 调整型局面评价：避开和棋分
    fn evaluate(&self, vl_alpha: i32, vl_beta: i32) -> i32 {
        let vl = if self.opts.knowledge {
            self.pos.evaluate(vl_alpha, vl_beta)
        } else {
            self.pos.material()
        };
        if vl == self.pos.draw_value() {
            vl - 1
        } else {
            vl
        }
    }

    // ------------------------------------------------------------------
    // 静态搜索
    // ------------------------------------------------------------------

    fn search_quiesc(&mut self, mut vl_alpha: i32, vl_beta: i32) -> i32 {
        self.all_nodes += 1;

        // 1. 无害裁剪
        let vl = self.harmless_pruning(vl_beta);
        if vl > -MATE_VALUE {
            return vl;
        }

        // 2. 达到极限深度，直接返回评价值
        if self.pos.distance == LIMIT_DEPTH as i32 {
            return self.evaluate(vl_alpha, vl_beta);
        }

        let mut vl_best = -MATE_VALUE;
        let in_check = self.pos.in_check();

        let mut ms = if in_check {
            // 3. 被将军时生成全部应将着法
            MoveSort::new_all(&self.pos, &self.history)
        } else {
            // 4. 未被将军时先尝试空着(即对局面作评价)
            let vl = self.evaluate(vl_alpha, vl_beta);
            if vl >= vl_beta {
                return vl;
            }
            vl_best = vl;
            vl_alpha = vl_alpha.max(vl);
            // 5. 然后生成并排序所有吃子着法
            MoveSort::new_quiesc(&self.pos)
        };

        // 6. 沿吃子序列(或应将着法)搜索
        loop {
            let mv = ms.next_quiesc(in_check);
            if mv.is_none() {
                break;
            }
            if self.pos.make_move(mv) {
                let vl = -self.search_quiesc(-vl_beta, -vl_alpha);
                self.pos.undo_move();
                if vl > vl_best {
                    if vl >= vl_beta {
                        return vl;
                    }
                    vl_best = vl;
                    vl_alpha = vl_alpha.max(vl);
                }
            }
        }

        // 7. 被将死时返回杀棋分
        if vl_best == -MATE_VALUE {
            self.pos.distance - MATE_VALUE
        } else {
            vl_best
        }
    }

    // ------------------------------------------------------------------
    // 零窗口完全搜索
    // ------------------------------------------------------------------

    fn search_cut(
        &mut self,
        ctl: &mut dyn ControlSource,
        vl_beta: i32,
        depth: i32,
        no_null: bool,
    ) -> i32 {
        // 1. 叶子结点调用静态搜索
        if depth <= 0 {
            return self.search_quiesc(vl_beta - 1, vl_beta);
        }
        self.all_nodes += 1;

        // 2. 无害裁剪
        let vl = self.harmless_pruning(vl_beta);
        if vl > -MATE_VALUE {
            return vl;
        }

        // 3. 置换裁剪
        let (vl, mv_hash) = self.hash.probe(&mut self.pos, vl_beta - 1, vl_beta, depth, no_null);
        if self.opts.use_hash && vl > -MATE_VALUE {
            return vl;
        }

        // 4. 达到极限深度，直接返回评价值
        if self.pos.distance == LIMIT_DEPTH as i32 {
            return self.evaluate(vl_beta - 1, vl_beta);
        }

        // 5. 中断调用
        self.main_nodes += 1;
        let mut vl_best = -MATE_VALUE;
        if self.main_nodes & self.opts.count_mask == 0 && self.interrupt(ctl) {
            return vl_best;
        }

        // 6. 尝试空着裁剪
        if self.opts.null_move && !no_null && !self.pos.in_check() && self.pos.null_okay() {
            self.pos.null_move();
            let vl = -self.search_cut(ctl, 1 - vl_beta, depth - NULL_DEPTH - 1, true);
            self.pos.undo_null_move();
            if self.stop {
                return vl_best;
            }
            if vl >= vl_beta {
                if self.pos.null_safe() {
                    // 不带检验的空着裁剪，记录深度至少是 NULL_DEPTH + 1
                    self.hash.record(
                        &self.pos,
                        HASH_BETA,
                        vl,
                        depth.max(NULL_DEPTH + 1),
                        Move::NONE,
                    );
                    return vl;
                } else if self.search_cut(ctl, vl_beta, depth - NULL_DEPTH, true) >= vl_beta {
                    // 带检验的空着裁剪，记录深度至少是 NULL_DEPTH
                    self.hash
                        .record(&self.pos, HASH_BETA, vl, depth.max(NULL_DEPTH), Move::NONE);
                    return vl;
                }
            }
        }

        // 7. 被将军时生成全部应将着法，否则用正常的分阶段着法列表
        let killers = self.killers[self.pos.distance as usize];
        let (mut ms, mv_evade) = if self.pos.in_check() {
            MoveSort::new_evade(&mut self.pos, mv_hash, &killers, &self.history)
        } else {
            (MoveSort::new_full(mv_hash, &killers), Move::NONE)
        };

        // 8. 逐一搜索
        loop {
            let mv = ms.next_full(&self.pos, &self.history);
            if mv.is_none() {
                break;
            }
            if !self.pos.make_move(mv) {
                continue;
            }
            // 9. 将军延伸(或唯一应将延伸)
            let new_depth = if self.pos.in_check() || !mv_evade.is_none() {
                depth
            } else {
                depth - 1
            };
            // 10. 零窗口搜索
            let vl = -self.search_cut(ctl, 1 - vl_beta, new_depth, false);
            self.pos.undo_move();
            if self.stop {
                return vl_best;
            }
            // 11. 截断判定
            if vl > vl_best {
                vl_best = vl;
                if vl >= vl_beta {
                    self.hash.record(&self.pos, HASH_BETA, vl_best, depth, mv);
                    if !ms.good_cap(&self.pos, mv) {
                        set_best_move(
                            &mut self.history,
                            &mut self.killers[self.pos.distance as usize],
                            mv,
                            depth,
                        );
                    }
                    return vl_best;
                }
            }
        }

        // 12. 不截断措施
        if vl_best == -MATE_VALUE {
            self.pos.distance - MATE_VALUE
        } else {
            self.hash
                .record(&self.pos, HASH_ALPHA, vl_best, depth, mv_evade);
            vl_best
        }
    }

    // ------------------------------------------------------------------
    // 主要变例完全搜索
    // ------------------------------------------------------------------

    /* 和零窗口完全搜索的区别：
     * 1. 启用内部迭代加深启发；
     * 2. 不使用有负面影响的裁剪(空着裁剪等)；
     * 3. Alpha-Beta 边界判定复杂；
     * 4. PV 结点要获取主要变例；
     * 5. 置换表裁剪对 PV 结点也是安全的(不会截断 PV 路线)。
     */
    fn search_pv(
        &mut self,
        ctl: &mut dyn ControlSource,
        mut vl_alpha: i32,
        vl_beta: i32,
        depth: i32,
        pv: &mut Vec<Move>,
    ) -> i32 {
        pv.clear();
        // 1. 叶子结点调用静态搜索
        if depth <= 0 {
            return self.search_quiesc(vl_alpha, vl_beta);
        }
        self.all_nodes += 1;

        // 2. 无害裁剪
        let vl = self.harmless_pruning(vl_beta);
        if vl > -MATE_VALUE {
            return vl;
        }

        // 3. 置换裁剪
        let (vl, mut mv_hash) = self.hash.probe(&mut self.pos, vl_alpha, vl_beta, depth, true);
        if self.opts.use_hash && vl > -MATE_VALUE {
            return vl;
        }

        // 4. 达到极限深度，直接返回评价值
        if self.pos.distance == LIMIT_DEPTH as i32 {
            return self.evaluate(vl_alpha, vl_beta);
        }

        // 5. 中断调用
        self.main_nodes += 1;
        let mut vl_best = -MATE_VALUE;
        if self.main_nodes & self.opts.count_mask == 0 && self.interrupt(ctl) {
            return vl_best;
        }

        // 6. 内部迭代加深启发
        let mut iid_pv = Vec::new();
        if depth > IID_DEPTH && mv_hash.is_none() {
            let vl = self.search_pv(ctl, vl_alpha, vl_beta, depth / 2, &mut iid_pv);
            if vl <= vl_alpha {
                self.search_pv(ctl, -MATE_VALUE, vl_beta, depth / 2, &mut iid_pv);
            }
            if self.stop {
                return vl_best;
            }
            mv_hash = iid_pv.first().copied().unwrap_or(Move::NONE);
        }

        // 7. 着法顺序初始化
        let killers = self.killers[self.pos.distance as usize];
        let (mut ms, mv_evade) = if self.pos.in_check() {
            MoveSort::new_evade(&mut self.pos, mv_hash, &killers, &self.history)
        } else {
            (MoveSort::new_full(mv_hash, &killers), Move::NONE)
        };

        let mut mv_best = Move::NONE;
        let mut hash_flag = HASH_ALPHA;
        let mut child_pv = Vec::new();

        // 8. 逐一搜索
        loop {
            let mv = ms.next_full(&self.pos, &self.history);
            if mv.is_none() {
                break;
            }
            if !self.pos.make_move(mv) {
                continue;
            }
            // 9. 将军延伸
            let new_depth = if self.pos.in_check() || !mv_evade.is_none() {
                depth
            } else {
                depth - 1
            };
            // 10. 第一个着法用全窗口，其后着法先用零窗口试探
            let vl = if vl_best == -MATE_VALUE {
                -self.search_pv(ctl, -vl_beta, -vl_alpha, new_depth, &mut child_pv)
            } else {
                let vl = -self.search_cut(ctl, -vl_alpha, new_depth, false);
                if vl > vl_alpha && vl < vl_beta {
                    -self.search_pv(ctl, -vl_beta, -vl_alpha, new_depth, &mut child_pv)
                } else {
                    vl
                }
            };
            self.pos.undo_move();
            if self.stop {
                return vl_best;
            }
            // 11. Alpha-Beta 边界判定
            if vl > vl_best {
                vl_best = vl;
                if vl >= vl_beta {
                    mv_best = mv;
                    hash_flag = HASH_BETA;
                    break;
                }
                if vl > vl_alpha {
                    vl_alpha = vl;
                    mv_best = mv;
                    hash_flag = HASH_PV;
                    pv.clear();
                    pv.push(mv);
                    pv.extend_from_slice(&child_pv);
                }
            }
        }

        // 12. 更新置换表、历史表和杀手着法表
        if vl_best == -MATE_VALUE {
            self.pos.distance - MATE_VALUE
        } else {
            let mv_record = if mv_evade.is_none() { mv_best } else { mv_evade };
            self.hash.record(&self.pos, hash_flag, vl_best, depth, mv_record);
            if !mv_best.is_none() && !ms.good_cap(&self.pos, mv_best) {
                set_best_move(
                    &mut self.history,
                    &mut self.killers[self.pos.distance as usize],
                    mv_best,
                    depth,
                );
            }
            vl_best
        }
    }

    // ------------------------------------------------------------------
    // 根结点搜索
    // ------------------------------------------------------------------

    /* 和完全搜索的区别：
     * 1. 省略无害裁剪和置换表裁剪；
     * 2. 不使用空着裁剪；
     * 3. 选择性延伸只用将军延伸；
     * 4. 禁止着法已在着法列表里滤掉；
     * 5. 搜索到最佳着法时立即记录主要变例并重排结点；
     * 6. 不更新历史表和杀手着法表。
     */
    fn search_root(&mut self, ctl: &mut dyn ControlSource, depth: i32) -> i32 {
        let mut vl_best = -MATE_VALUE;
        let mut root = self.root.take().expect("root moves not initialized");
        root.reset_root(false);

        let mut child_pv = Vec::new();
        let mut curr_move = 0;
        loop {
            let mv = root.next_root();
            if mv.is_none() {
                break;
            }
            if !self.pos.make_move(mv) {
                continue;
            }
            if self.emit_info && self.pop_curr_move {
                curr_move += 1;
                println!("info currmove {} currmovenumber {}", mv, curr_move);
            }
            // 将军延伸
            let new_depth = if self.pos.in_check() { depth } else { depth - 1 };
            // 第一个着法用全窗口，其后着法先用零窗口试探
            let vl = if vl_best == -MATE_VALUE {
                -self.search_pv(ctl, -MATE_VALUE, MATE_VALUE, new_depth, &mut child_pv)
            } else {
                let vl = -self.search_cut(ctl, -vl_best, new_depth, false);
                if vl > vl_best {
                    -self.search_pv(ctl, -MATE_VALUE, -vl_best, new_depth, &mut child_pv)
                } else {
                    vl
                }
            };
            self.pos.undo_move();
            if self.stop {
                self.root = Some(root);
                return vl_best;
            }
            if vl > vl_best {
                // 第一个着法之外的改进清零“未改变”计数器
                self.unchanged = if vl_best == -MATE_VALUE {
                    self.unchanged + 1
                } else {
                    0
                };
                vl_best = vl;
                // 立即记录主要变例
                self.pv_line.clear();
                self.pv_line.push(mv);
                self.pv_line.extend_from_slice(&child_pv);
                self.pop_pv_line(depth, vl);
                // 随机性：分值作随机浮动，搜出杀棋后不再浮动
                if vl_best > -WIN_VALUE && vl_best < WIN_VALUE && self.opts.random_mask != 0 {
                    let mask = self.opts.random_mask;
                    vl_best += (self.rng.gen::<u32>() & mask) as i32
                        - (self.rng.gen::<u32>() & mask) as i32;
                    if vl_best == self.pos.draw_value() {
                        vl_best -= 1;
                    }
                }
                // 重排根结点着法列表
                root.update_root(mv);
            }
        }
        self.root = Some(root);
        vl_best
    }

    /// 唯一着法检验：把最佳着法之外的着法用 (-WIN, 1-WIN) 的窗口重搜一遍，
    /// 全部低出边界就说明其他着法都是送死，不必再往深搜
    fn search_unique(&mut self, ctl: &mut dyn ControlSource, vl_beta: i32, depth: i32) -> bool {
        let mut root = self.root.take().expect("root moves not initialized");
        root.reset_root(true);
        loop {
            let mv = root.next_root();
            if mv.is_none() {
                break;
            }
            if !self.pos.make_move(mv) {
                continue;
            }
            let new_depth = if self.pos.in_check() { depth } else { depth - 1 };
            let vl = -self.search_cut(ctl, 1 - vl_beta, new_depth, false);
            self.pos.undo_move();
            if self.stop || vl >= vl_beta {
                self.root = Some(root);
                return false;
            }
        }
        self.root = Some(root);
        true
    }

    // ------------------------------------------------------------------
    // 输出
    // ------------------------------------------------------------------

    /// 输出主要变例。搜索时间不长时先记下来，搜索结束时补输出
    fn pop_pv_line(&mut self, depth: i32, vl: i32) {
        if !self.emit_info {
            return;
        }
        if depth > 0 && !self.pop_pv && !self.opts.debug {
            self.pop_depth = depth;
            self.pop_value = vl;
            return;
        }
        println!("info time {} nodes {}", self.elapsed_ms(), self.all_nodes);
        let (depth, vl) = if depth == 0 {
            if self.pop_depth == 0 {
                return;
            }
            (self.pop_depth, self.pop_value)
        } else {
            self.pop_depth = 0;
            self.pop_value = 0;
            (depth, vl)
        };
        let mut line = format!("info depth {} score {} pv", depth, vl);
        for mv in &self.pv_line {
            line.push(' ');
            line.push_str(&mv.to_coord());
        }
        println!("{}", line);
    }

    // ------------------------------------------------------------------
    // 主搜索例程
    // ------------------------------------------------------------------

    /// 迭代加深的主搜索。emit_info 为 true 时按 UCCI 格式输出 info 行；
    /// bestmove/nobestmove 行由调用方根据结果输出
    pub fn search_main(
        &mut self,
        go: GoParams,
        ctl: &mut dyn ControlSource,
        emit_info: bool,
    ) -> SearchResult {
        let mut result = SearchResult::default();
        self.emit_info = emit_info;
        self.ponder = go.ponder;
        self.draw_offered = go.draw_offered;
        self.go_mode = go.mode;

        // 1. 和棋或重复局面直接认和
        if self.pos.is_draw() || self.pos.rep_status(3) != RepStatus::None {
            return result;
        }

        // 2. 从开局库中搜索着法
        if self.opts.use_book {
            if let Some(path) = self.opts.book_file.clone() {
                if let Some(res) = self.try_book(&path) {
                    return res;
                }
            }
        }

        // 3. 深度为零只返回静态搜索值
        if go.depth == 0 {
            self.all_nodes = 0;
            let vl = self.search_quiesc(-MATE_VALUE, MATE_VALUE);
            if emit_info {
                println!("info depth 0 score {}", vl);
            }
            result.vl = vl;
            return result;
        }

        // 4. 生成根结点着法(过滤禁着)
        self.root = Some(MoveSort::new_root(&self.pos, &go.ban_moves));

        // 5. 初始化时间和计数器
        self.stop = false;
        self.ponder_stop = false;
        self.quit = false;
        self.pop_pv = false;
        self.pop_curr_move = false;
        self.pop_depth = 0;
        self.pop_value = 0;
        self.all_nodes = 0;
        self.main_nodes = 0;
        self.unchanged = 0;
        self.pv_line.clear();
        clear_killers(&mut self.killers);
        self.history.clear();
        self.hash.clear();
        // 清空置换表要消耗一点时间，计时从这以后开始
        self.start_time = Instant::now();
        let mut vl_last = 0;
        // 走了 10 个回合的无用着法就允许主动提和，以后每隔 8 个回合提一次
        let futile = self.pos.last_move().reversible as i32;
        if futile > 5 && ((futile - 4) / 2) % 8 == 0 {
            self.draw_offered = true;
        }
        let mut unique = false;
        let mut curr_timer = 0i64;

        // 6. 迭代加深
        for depth in 1..=go.depth {
            if self.emit_info && (self.pop_pv || self.opts.debug) {
                println!("info depth {}", depth);
            }
            // 搜索了一段时间后才输出主要变例和当前着法
            self.pop_pv = curr_timer > 300;
            self.pop_curr_move = curr_timer > 3000;

            // 7. 搜索根结点
            let vl = self.search_root(ctl, depth);
            if self.stop {
                if vl > -MATE_VALUE {
                    // 跳出前记下最近的可靠值，认输和提和要用
                    vl_last = vl;
                }
                break;
            }

            curr_timer = self.elapsed_ms();
            // 8. 超过适当时限就不再往深搜
            match self.go_mode {
                GoMode::Timer { proper_ms, .. } => {
                    // 没有空着裁剪时分枝因子加倍，适当时限减半；
                    // 分值没有比上一层落后很多、或最佳着法连续多层不变，同样减半
                    let mut limit = if self.opts.null_move {
                        proper_ms
                    } else {
                        proper_ms / 2
                    };
                    if vl + DROPDOWN_VALUE >= vl_last {
                        limit /= 2;
                    }
                    if self.unchanged >= UNCHANGED_DEPTH {
                        limit /= 2;
                    }
                    if curr_timer > limit {
                        if self.ponder {
                            // 后台思考模式下只是记住“已经到时”，等 ponderhit 再停
                            self.ponder_stop = true;
                        } else {
                            vl_last = vl;
                            break;
                        }
                    }
                }
                GoMode::Nodes(nodes) => {
                    let mut limit = if self.opts.null_move { nodes } else { nodes / 2 };
                    if vl + DROPDOWN_VALUE >= vl_last {
                        limit /= 2;
                    }
                    if self.unchanged >= UNCHANGED_DEPTH {
                        limit /= 2;
                    }
                    if self.all_nodes > limit {
                        vl_last = vl;
                        break;
                    }
                }
                GoMode::Infinite => {}
            }
            vl_last = vl;

            // 9. 搜索到杀棋就终止
            if vl_last > WIN_VALUE || vl_last < -WIN_VALUE {
                break;
            }

            // 10. 唯一着法也终止
            if self.search_unique(ctl, 1 - WIN_VALUE, depth) {
                unique = true;
                break;
            }
        }

        debug!(
            "search finished: depth value {}, nodes {}, time {}ms",
            vl_last,
            self.all_nodes,
            self.elapsed_ms()
        );

        // 11. 输出最佳着法及其最佳应对(作为后台思考的猜测着法)
        result.vl = vl_last;
        result.quit = self.quit;
        result.nodes = self.all_nodes;
        if let Some(&best) = self.pv_line.first() {
            self.pop_pv_line(0, 0);
            result.best = Some(best);
            result.ponder = self.pv_line.get(1).copied();
            result.pv = self.pv_line.clone();
            // 12. 认输或提和；经过唯一着法检验的不适用(搜索深度不够)
            if !unique {
                if vl_last > -WIN_VALUE && vl_last < -RESIGN_VALUE {
                    result.resign = true;
                } else if self.draw_offered
                    && !self.pos.null_safe()
                    && vl_last < DRAW_OFFER_VALUE * 2
                {
                    result.draw_offer = true;
                }
            }
        }
        result
    }

    /// 开局库着法：按权重随机选择，会走进重复局面的不选
    fn try_book(&mut self, path: &std::path::Path) -> Option<SearchResult> {
        let books = match get_book_moves(&self.pos, path) {
            Ok(bks) if !bks.is_empty() => bks,
            _ => return None,
        };
        let mut total = 0u32;
        for bk in &books {
            total += bk.vl as u32;
            if self.emit_info {
                println!("info depth 0 score {} pv {}", bk.vl, bk.mv);
            }
        }
        if total == 0 {
            return None;
        }
        let mut pick = (self.rng.gen::<u32>() % total) as i64;
        let mut chosen = books[0].mv;
        for bk in &books {
            pick -= bk.vl as i64;
            if pick < 0 {
                chosen = bk.mv;
                break;
            }
        }
        if !self.pos.make_move(chosen) {
            return None;
        }
        if self.pos.rep_status(3) != RepStatus::None {
            self.pos.undo_move();
            return None;
        }
        // 后台思考的猜测着法取后续局面权重最大的开局库着法
        let ponder = get_book_moves(&self.pos, path)
            .ok()
            .and_then(|bks| bks.first().map(|bk| bk.mv));
        self.pos.undo_move();
        Some(SearchResult {
            best: Some(chosen),
            ponder,
            ..SearchResult::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_engine() -> Engine {
        let mut opts = EngineOptions::default();
        opts.use_book = false;
        opts.hash_mb = 4;
        Engine::new(opts)
    }

    fn go_depth(depth: i32) -> GoParams {
        GoParams {
            mode: GoMode::Infinite,
            depth,
            ..GoParams::default()
        }
    }

    #[test]
    fn test_start_position_depth_4() {
        let mut engine = quick_engine();
        let result = engine.search_main(go_depth(4), &mut NullControl, false);
        // 起始局面接近均势，必须给出一个结构合理的着法
        let best = result.best.expect("must find a move");
        assert!(engine.pos.legal_move(best));
        assert!(result.vl.abs() < RESIGN_VALUE, "vl = {}", result.vl);
        assert!(!result.resign);
    }

    #[test]
    fn test_finds_mate_in_one() {
        // 黑将 d9 被红帅封住 e 列，车平 d 线即将死
        let mut engine = quick_engine();
        engine.pos = Position::from_fen("3k5/9/9/9/R8/9/9/9/9/4K4 w").unwrap();
        let result = engine.search_main(go_depth(4), &mut NullControl, false);
        let best = result.best.expect("must find mate");
        // 分值在杀棋分值带内
        assert!(result.vl > WIN_VALUE, "vl = {}", result.vl);
        assert_eq!(best, Move::from_coord("a5d5").unwrap());
        assert!(engine.pos.make_move(best));
        assert!(engine.pos.is_mate());
    }

    #[test]
    fn test_search_with_and_without_hash_agree() {
        let fen = "2bak4/9/4b4/4p4/9/4P4/9/4B4/4A4/2B1KA3 w";
        let mut e1 = quick_engine();
        e1.pos = Position::from_fen(fen).unwrap();
        let r1 = e1.search_main(go_depth(3), &mut NullControl, false);
        let mut e2 = quick_engine();
        e2.opts.use_hash = false;
        e2.pos = Position::from_fen(fen).unwrap();
        let r2 = e2.search_main(go_depth(3), &mut NullControl, false);
        // 置换表只该改变速度，分值不该偏出小边界之外
        assert!(r1.best.is_some() && r2.best.is_some());
        assert!((r1.vl - r2.vl).abs() <= 32, "{} vs {}", r1.vl, r2.vl);
    }

    #[test]
    fn test_node_budget_stops_search() {
        let mut engine = quick_engine();
        let go = GoParams {
            mode: GoMode::Nodes(500),
            depth: UCCI_MAX_DEPTH,
            ..GoParams::default()
        };
        let result = engine.search_main(go, &mut NullControl, false);
        assert!(result.best.is_some());
        // 结点预算是软限制，超出量以轮询间隔为界
        assert!(result.nodes < 500_000, "nodes = {}", result.nodes);
    }

    #[test]
    fn test_banned_move_is_avoided() {
        let mut engine = quick_engine();
        let first = engine
            .search_main(go_depth(3), &mut NullControl, false)
            .best
            .unwrap();
        let mut engine = quick_engine();
        let go = GoParams {
            ban_moves: vec![first],
            ..go_depth(3)
        };
        let result = engine.search_main(go, &mut NullControl, false);
        assert_ne!(result.best, Some(first));
    }

    #[test]
    fn test_draw_position_returns_no_move() {
        let mut engine = quick_engine();
        // 双方只剩将帅和仕相：无进攻子力，直接判和
        engine.pos = Position::from_fen("3ak4/4a4/9/9/9/9/9/9/4A4/3AK4 w").unwrap();
        let result = engine.search_main(go_depth(4), &mut NullControl, false);
        assert!(result.best.is_none());
    }

    #[test]
    fn test_stop_signal_aborts() {
        struct StopAfter(u32);
        impl ControlSource for StopAfter {
            fn poll(&mut self) -> Option<Signal> {
                if self.0 == 0 {
                    Some(Signal::Stop)
                } else {
                    self.0 -= 1;
                    None
                }
            }
        }
        let mut engine = quick_engine();
        let mut ctl = StopAfter(2);
        let result = engine.search_main(go_depth(UCCI_MAX_DEPTH), &mut ctl, false);
        // 停止后仍然返回已经找到的最好结果
        assert!(result.best.is_some());
    }
}
