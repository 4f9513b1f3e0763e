//! 置换表
//!
//! 多层置换表。表项信息夹在两个 Zobrist 校验锁中间，锁不匹配按未命中处理；
//! Alpha 和 Beta 两个边界各自带深度。接近杀棋的分值按到根结点的距离调整，
//! 长将区间内的分值不写入置换表(除非带着最佳着法)。

use crate::moves::Move;
use crate::position::{Position, BAN_VALUE, MATE_VALUE, WIN_VALUE};
use std::mem;

// 置换表标志，只用在 record() 中
pub const HASH_BETA: u8 = 1;
pub const HASH_ALPHA: u8 = 2;
pub const HASH_PV: u8 = HASH_ALPHA | HASH_BETA;

/// 置换表的层数
pub const HASH_LAYERS: usize = 2;
/// 空着裁剪的深度
pub const NULL_DEPTH: i32 = 2;

/// 默认置换表大小(兆字节)
pub const DEFAULT_HASH_MB: usize = 16;

#[derive(Clone, Copy, Default)]
struct HashEntry {
    lock0: u32,
    lock1: u32,
    /// 最佳着法
    mv: Move,
    /// 上边界和下边界各自的深度
    alpha_depth: u8,
    beta_depth: u8,
    vl_alpha: i16,
    vl_beta: i16,
}

impl HashEntry {
    #[inline]
    fn matches(&self, pos: &Position) -> bool {
        self.lock0 == pos.zobr.lock0 && self.lock1 == pos.zobr.lock1
    }
}

pub struct HashTable {
    mask: usize,
    items: Vec<HashEntry>,
}

/// probe 指令输出用的表项信息：最佳着法和两个边界(分值, 深度)
#[derive(Clone, Copy, Debug)]
pub struct PopHashInfo {
    pub mv: Move,
    pub beta: Option<(i32, i32)>,
    pub alpha: Option<(i32, i32)>,
}

/* 获取置换表分值要符合的条件，按四个区间处理：
 * 一、分值在 WIN_VALUE 以内：只取满足深度要求的；
 * 二、分值在 WIN_VALUE 和 BAN_VALUE 之间：不取分值(防止长将导致的置换表不稳定)；
 * 三、分值在 BAN_VALUE 以外：已经证明是杀棋，不必考虑深度，但要调整杀棋步数；
 * 四、分值恰好是和棋分：同第二种情况。
 */
fn value_adjust(pos: &Position, vl: i16) -> (i32, bool, bool) {
    let mut vl = vl as i32;
    let mut ban_node = false;
    let mut mate_node = false;
    if vl > WIN_VALUE {
        if vl <= BAN_VALUE {
            ban_node = true;
        } else {
            mate_node = true;
            vl -= pos.distance;
        }
    } else if vl < -WIN_VALUE {
        if vl >= -BAN_VALUE {
            ban_node = true;
        } else {
            mate_node = true;
            vl += pos.distance;
        }
    } else if vl == pos.draw_value() {
        ban_node = true;
    }
    (vl, ban_node, mate_node)
}

impl HashTable {
    /// 分配置换表，表项数取不超过 size_mb 兆字节的 2 的幂
    pub fn new(size_mb: usize) -> Self {
        let bytes = size_mb.max(1) << 20;
        let entries = ((bytes / mem::size_of::<HashEntry>()) + 1).next_power_of_two() / 2;
        let entries = entries.max(1 << 10);
        HashTable {
            mask: entries - 1,
            items: vec![HashEntry::default(); entries],
        }
    }

    pub fn clear(&mut self) {
        self.items.fill(HashEntry::default());
    }

    #[inline]
    fn index(&self, pos: &Position, layer: usize) -> usize {
        (pos.zobr.key as usize + layer) & self.mask
    }

    /// 存储置换表局面信息
    pub fn record(&mut self, pos: &Position, flag: u8, vl: i32, depth: i32, mv: Move) {
        debug_assert!(vl > -MATE_VALUE && vl < MATE_VALUE);
        // 1. 对分值做杀棋步数调整；导致长将的局面如果连最佳着法都没有，就不写入
        let mut vl = vl;
        if vl > WIN_VALUE {
            if mv.is_none() && vl <= BAN_VALUE {
                return;
            }
            vl += pos.distance;
        } else if vl < -WIN_VALUE {
            if mv.is_none() && vl >= -BAN_VALUE {
                return;
            }
            vl -= pos.distance;
        } else if vl == pos.draw_value() && mv.is_none() {
            return;
        }

        // 2. 逐层试探置换表
        let mut min_depth = 512;
        let mut min_layer = 0;
        for layer in 0..HASH_LAYERS {
            let idx = self.index(pos, layer);
            let mut entry = self.items[idx];

            // 3. 试探到一样的局面，更新置换表信息即可
            if entry.matches(pos) {
                // 深度更深或者边界缩小，都可以更新置换表的值
                if flag & HASH_ALPHA != 0
                    && (entry.alpha_depth as i32 <= depth || entry.vl_alpha as i32 >= vl)
                {
                    entry.alpha_depth = depth as u8;
                    entry.vl_alpha = vl as i16;
                }
                // Beta 结点不要用空着裁剪的结点覆盖正常的结点
                if flag & HASH_BETA != 0
                    && (entry.beta_depth as i32 <= depth || entry.vl_beta as i32 <= vl)
                    && (!mv.is_none() || entry.mv.is_none())
                {
                    entry.beta_depth = depth as u8;
                    entry.vl_beta = vl as i16;
                }
                // 最佳着法是始终覆盖的
                if !mv.is_none() {
                    entry.mv = mv;
                }
                self.items[idx] = entry;
                return;
            }

            // 4. 不一样的局面，记下深度最小的层
            let entry_depth = (if entry.alpha_depth == 0 {
                0
            } else {
                entry.alpha_depth as i32 + 256
            })
            .max(if entry.mv.is_none() {
                entry.beta_depth as i32
            } else {
                entry.beta_depth as i32 + 256
            });
            if entry_depth < min_depth {
                min_depth = entry_depth;
                min_layer = layer;
            }
        }

        // 5. 覆盖深度最小的表项
        let mut entry = HashEntry {
            lock0: pos.zobr.lock0,
            lock1: pos.zobr.lock1,
            mv,
            ..HashEntry::default()
        };
        if flag & HASH_ALPHA != 0 {
            entry.alpha_depth = depth as u8;
            entry.vl_alpha = vl as i16;
        }
        if flag & HASH_BETA != 0 {
            entry.beta_depth = depth as u8;
            entry.vl_beta = vl as i16;
        }
        let idx = self.index(pos, min_layer);
        self.items[idx] = entry;
    }

    /// 获取置换表局面信息；没有命中时分值是 -MATE_VALUE，
    /// 命中但不满足裁剪条件时只返回最佳着法供参考
    pub fn probe(
        &self,
        pos: &mut Position,
        vl_alpha: i32,
        vl_beta: i32,
        depth: i32,
        no_null: bool,
    ) -> (i32, Move) {
        // 1. 逐层获取置换表项
        let mut found = None;
        for layer in 0..HASH_LAYERS {
            let entry = self.items[self.index(pos, layer)];
            if entry.matches(pos) {
                found = Some(entry);
                break;
            }
        }
        let entry = match found {
            Some(entry) => entry,
            None => return (-MATE_VALUE, Move::NONE),
        };
        let mv = entry.mv;

        // 2. 判断是否符合 Beta 边界
        if entry.beta_depth > 0 {
            let (vl, ban_node, mate_node) = value_adjust(pos, entry.vl_beta);
            if !ban_node
                && !(entry.mv.is_none() && no_null)
                && (entry.beta_depth as i32 >= depth || mate_node)
                && vl >= vl_beta
                && (entry.mv.is_none() || self.pos_stable(pos, entry.mv))
            {
                return (vl, mv);
            }
        }

        // 3. 判断是否符合 Alpha 边界
        if entry.alpha_depth > 0 {
            let (vl, ban_node, mate_node) = value_adjust(pos, entry.vl_alpha);
            if !ban_node
                && (entry.alpha_depth as i32 >= depth || mate_node)
                && vl <= vl_alpha
                && (entry.mv.is_none() || self.pos_stable(pos, entry.mv))
            {
                return (vl, mv);
            }
        }
        (-MATE_VALUE, mv)
    }

    /// 输出置换表中某个局面的信息(probe 指令用)
    pub fn pop_hash(&self, pos: &Position) -> Option<PopHashInfo> {
        for layer in 0..HASH_LAYERS {
            let entry = self.items[self.index(pos, layer)];
            if entry.matches(pos) {
                return Some(PopHashInfo {
                    mv: entry.mv,
                    beta: if entry.beta_depth > 0 {
                        Some((entry.vl_beta as i32, entry.beta_depth as i32))
                    } else {
                        None
                    },
                    alpha: if entry.alpha_depth > 0 {
                        Some((entry.vl_alpha as i32, entry.alpha_depth as i32))
                    } else {
                        None
                    },
                });
            }
        }
        None
    }

    /// 检测置换表着法展开的后续路线是否稳定(不是循环路线)，
    /// 用来减少长将引起的置换表不稳定性
    fn pos_stable(&self, pos: &mut Position, mv: Move) -> bool {
        let mut mv = mv;
        let mut made = 0;
        let mut stable = true;
        loop {
            // 吃子着法是稳定的；没有后续着法，或路线超出历史栈上限被截断，也算稳定
            if mv.is_none() || pos.squares[mv.dst()] != 0 {
                break;
            }
            debug_assert!(pos.legal_move(mv));
            if !pos.make_move(mv) {
                break;
            }
            made += 1;
            // 产生循环就终止路线，并确认该路线不稳定
            if pos.rep_status(1) != crate::position::RepStatus::None {
                stable = false;
                break;
            }
            // 逐层获取后续局面的置换表着法
            mv = Move::NONE;
            for layer in 0..HASH_LAYERS {
                let entry = self.items[self.index(pos, layer)];
                if entry.matches(pos) {
                    mv = entry.mv;
                    break;
                }
            }
        }
        for _ in 0..made {
            pos.undo_move();
        }
        stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::{Position, START_FEN};

    #[test]
    fn test_record_and_probe() {
        let mut pos = Position::from_fen(START_FEN).unwrap();
        let mut tt = HashTable::new(1);
        let mv = Move::from_coord("h2e2").unwrap();
        tt.record(&pos, HASH_BETA, 30, 5, mv);
        // 深度要求满足时命中 Beta 边界
        let (vl, hash_mv) = tt.probe(&mut pos, -100, 20, 5, false);
        assert_eq!(vl, 30);
        assert_eq!(hash_mv, mv);
        // 深度不足时不裁剪，但给出最佳着法
        let (vl, hash_mv) = tt.probe(&mut pos, -100, 20, 8, false);
        assert_eq!(vl, -MATE_VALUE);
        assert_eq!(hash_mv, mv);
    }

    #[test]
    fn test_lock_mismatch_is_miss() {
        let mut pos = Position::from_fen(START_FEN).unwrap();
        let mut tt = HashTable::new(1);
        tt.record(&pos, HASH_PV, 10, 3, Move::from_coord("h2e2").unwrap());
        // 换一个局面探测，锁不匹配
        let mut other = Position::from_fen("4k4/9/9/9/9/9/9/9/9/4K4 w").unwrap();
        let (vl, mv) = tt.probe(&mut other, -100, 100, 1, false);
        assert_eq!(vl, -MATE_VALUE);
        assert!(mv.is_none());
    }

    #[test]
    fn test_mate_value_rebased_on_probe() {
        let mut pos = Position::from_fen(START_FEN).unwrap();
        let mut tt = HashTable::new(1);
        // 模拟在 distance = 2 处找到的杀棋分
        assert!(pos.make_move(Move::from_coord("h2e2").unwrap()));
        assert!(pos.make_move(Move::from_coord("h9g7").unwrap()));
        let vl_mate = MATE_VALUE - 5;
        tt.record(&pos, HASH_BETA, vl_mate, 3, Move::from_coord("h0g2").unwrap());
        // 同一局面、相同 distance 探测应还原同一分值；杀棋分不受深度限制
        let (vl, _) = tt.probe(&mut pos, -MATE_VALUE, vl_mate, 10, false);
        assert_eq!(vl, vl_mate);
    }

    #[test]
    fn test_ban_range_without_move_not_stored() {
        let mut pos = Position::from_fen(START_FEN).unwrap();
        let mut tt = HashTable::new(1);
        // 长将区间的分值不带最佳着法时拒绝存储
        tt.record(&pos, HASH_BETA, BAN_VALUE - 10, 3, Move::NONE);
        let (vl, mv) = tt.probe(&mut pos, -MATE_VALUE, -MATE_VALUE + 1, 0, false);
        assert_eq!(vl, -MATE_VALUE);
        assert!(mv.is_none());
    }

    #[test]
    fn test_depth_preferred_eviction() {
        let mut deep = Position::from_fen(START_FEN).unwrap();
        let mut tt = HashTable::new(1);
        let mv = Move::from_coord("h2e2").unwrap();
        tt.record(&deep, HASH_BETA, 50, 10, mv);
        // 同一个桶里塞进两个浅的不同局面后，深的结果还要在
        let mut shallow1 = Position::from_fen("4k4/9/9/9/9/9/9/9/9/4K4 w").unwrap();
        shallow1.zobr.key = deep.zobr.key;
        tt.record(&shallow1, HASH_BETA, 5, 1, Move::NONE);
        let mut shallow2 = Position::from_fen("3k5/9/9/9/9/9/9/9/9/4K4 w").unwrap();
        shallow2.zobr.key = deep.zobr.key;
        tt.record(&shallow2, HASH_BETA, 5, 1, Move::NONE);
        let (vl, _) = tt.probe(&mut deep, -100, 40, 10, false);
        assert_eq!(vl, 50);
    }
}
