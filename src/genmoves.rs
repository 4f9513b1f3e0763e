//! 着法生成
//!
//! 吃子和不吃子着法分两个生成器；车炮的着法直接查位行位列预置表，
//! 步进棋子走预生成目标表。另外提供保护判断和“捉”的检测。

use crate::moves::{Move, MoveList};
use crate::position::{
    opp_side_tag, piece_index, side_tag, simple_value, Position, ADVISOR_FROM, ADVISOR_TO,
    BISHOP_FROM, BISHOP_TO, CANNON_FROM, CANNON_TO, KING_FROM, KNIGHT_FROM, KNIGHT_TO, PAWN_FROM,
    PAWN_TO, ROOK_FROM, ROOK_TO,
};
use crate::pregen::{
    advisor_span, away_half, bishop_pin, bishop_span, can_promote, file_disp, file_x, home_half,
    in_fort, king_span, knight_pin, opp_side, rank_disp, rank_y, square_backward, tables,
};

impl Position {
    /// 棋子保护判断。sq_except 用来排除一个特定保护子(0 表示不排除)，
    /// 考虑被牵制子的保护时要排除牵制目标子
    pub fn protected(&self, sd: usize, sq_src: usize, sq_except: usize) -> bool {
        let n_side_tag = side_tag(sd);
        if home_half(sq_src, sd) {
            if in_fort(sq_src) {
                // 帅(将)的保护
                let sq_dst = self.pieces[n_side_tag + KING_FROM] as usize;
                if sq_dst != 0 && sq_dst != sq_except && king_span(sq_src, sq_dst) {
                    return true;
                }
                // 仕(士)的保护
                for i in ADVISOR_FROM..=ADVISOR_TO {
                    let sq_dst = self.pieces[n_side_tag + i] as usize;
                    if sq_dst != 0 && sq_dst != sq_except && advisor_span(sq_src, sq_dst) {
                        return true;
                    }
                }
            }
            // 相(象)的保护
            for i in BISHOP_FROM..=BISHOP_TO {
                let sq_dst = self.pieces[n_side_tag + i] as usize;
                if sq_dst != 0
                    && sq_dst != sq_except
                    && bishop_span(sq_src, sq_dst)
                    && self.squares[bishop_pin(sq_src, sq_dst)] == 0
                {
                    return true;
                }
            }
        } else {
            // 过河兵(卒)横向的保护
            for sq_dst in [sq_src - 1, sq_src + 1] {
                if sq_dst != sq_except {
                    let pc = self.squares[sq_dst] as usize;
                    if pc & n_side_tag != 0 && piece_index(pc) >= PAWN_FROM {
                        return true;
                    }
                }
            }
        }

        // 兵(卒)纵向的保护
        let sq_dst = square_backward(sq_src, sd);
        if sq_dst != sq_except {
            let pc = self.squares[sq_dst] as usize;
            if pc & n_side_tag != 0 && piece_index(pc) >= PAWN_FROM {
                return true;
            }
        }

        // 马的保护
        for i in KNIGHT_FROM..=KNIGHT_TO {
            let sq_dst = self.pieces[n_side_tag + i] as usize;
            if sq_dst != 0 && sq_dst != sq_except {
                let sq_pin = knight_pin(sq_dst, sq_src);
                if sq_pin != sq_dst && self.squares[sq_pin] == 0 {
                    return true;
                }
            }
        }

        let x = file_x(sq_src);
        let y = rank_y(sq_src);
        let sms_rank = self.rank_mask(x, y);
        let sms_file = self.file_mask(x, y);

        // 车的保护
        for i in ROOK_FROM..=ROOK_TO {
            let sq_dst = self.pieces[n_side_tag + i] as usize;
            if sq_dst != 0 && sq_dst != sq_src && sq_dst != sq_except {
                if x == file_x(sq_dst) {
                    if sms_file.rook_cap & tables().bit_file_mask[sq_dst] != 0 {
                        return true;
                    }
                } else if y == rank_y(sq_dst)
                    && sms_rank.rook_cap & tables().bit_rank_mask[sq_dst] != 0
                {
                    return true;
                }
            }
        }

        // 炮的保护
        for i in CANNON_FROM..=CANNON_TO {
            let sq_dst = self.pieces[n_side_tag + i] as usize;
            if sq_dst != 0 && sq_dst != sq_src && sq_dst != sq_except {
                if x == file_x(sq_dst) {
                    if sms_file.cannon_cap & tables().bit_file_mask[sq_dst] != 0 {
                        return true;
                    }
                } else if y == rank_y(sq_dst)
                    && sms_rank.cannon_cap & tables().bit_rank_mask[sq_dst] != 0
                {
                    return true;
                }
            }
        }
        false
    }

    /// 计算 MVV(LVA) 值：被吃子无保护记 MVV，有保护记 MVV-LVA。
    /// 结果再加 1，于是大于 1 说明吃子表面上是赚的，等于 1 说明仍值得一试，
    /// 等于 0 的吃子静态搜索不予考虑
    pub fn mvv_lva(&self, sq_dst: usize, pc_captured: usize, lva: i32) -> i32 {
        let mvv = simple_value(pc_captured);
        let lva_adjust = if self.protected(opp_side(self.sd_player), sq_dst, 0) {
            lva
        } else {
            0
        };
        if mvv >= lva_adjust {
            mvv - lva_adjust + 1
        } else if mvv >= 3 || home_half(sq_dst, self.sd_player) {
            1
        } else {
            0
        }
    }

    /// 吃子着法生成器，按 MVV(LVA) 设定分值
    pub fn gen_cap_moves(&self, mvs: &mut MoveList) {
        let n_side_tag = side_tag(self.sd_player);
        let n_opp_side_tag = opp_side_tag(self.sd_player);
        let can_promote_now = self.pre_eval.promotion && self.can_promote();

        // 帅(将)
        let sq_src = self.pieces[n_side_tag + KING_FROM] as usize;
        if sq_src != 0 {
            for &sq_dst in tables().king_moves[sq_src].iter() {
                let sq_dst = sq_dst as usize;
                if sq_dst == 0 {
                    break;
                }
                let pc_captured = self.squares[sq_dst] as usize;
                if pc_captured & n_opp_side_tag != 0 {
                    mvs.push(Move::new(sq_src, sq_dst), self.mvv_lva(sq_dst, pc_captured, 5));
                }
            }
        }

        // 仕(士)
        for i in ADVISOR_FROM..=ADVISOR_TO {
            let sq_src = self.pieces[n_side_tag + i] as usize;
            if sq_src != 0 {
                for &sq_dst in tables().advisor_moves[sq_src].iter() {
                    let sq_dst = sq_dst as usize;
                    if sq_dst == 0 {
                        break;
                    }
                    let pc_captured = self.squares[sq_dst] as usize;
                    if pc_captured & n_opp_side_tag != 0 {
                        mvs.push(Move::new(sq_src, sq_dst), self.mvv_lva(sq_dst, pc_captured, 1));
                    }
                }
                if can_promote_now && can_promote(sq_src) {
                    mvs.push(Move::new(sq_src, sq_src), 0);
                }
            }
        }

        // 相(象)
        for i in BISHOP_FROM..=BISHOP_TO {
            let sq_src = self.pieces[n_side_tag + i] as usize;
            if sq_src != 0 {
                let moves = &tables().bishop_moves[sq_src];
                let pins = &tables().bishop_pins[sq_src];
                for (n, &sq_dst) in moves.iter().enumerate() {
                    let sq_dst = sq_dst as usize;
                    if sq_dst == 0 {
                        break;
                    }
                    if self.squares[pins[n] as usize] == 0 {
                        let pc_captured = self.squares[sq_dst] as usize;
                        if pc_captured & n_opp_side_tag != 0 {
                            mvs.push(
                                Move::new(sq_src, sq_dst),
                                self.mvv_lva(sq_dst, pc_captured, 1),
                            );
                        }
                    }
                }
                if can_promote_now && can_promote(sq_src) {
                    mvs.push(Move::new(sq_src, sq_src), 0);
                }
            }
        }

        // 马
        for i in KNIGHT_FROM..=KNIGHT_TO {
            let sq_src = self.pieces[n_side_tag + i] as usize;
            if sq_src != 0 {
                let moves = &tables().knight_moves[sq_src];
                let pins = &tables().knight_pins[sq_src];
                for (n, &sq_dst) in moves.iter().enumerate() {
                    let sq_dst = sq_dst as usize;
                    if sq_dst == 0 {
                        break;
                    }
                    if self.squares[pins[n] as usize] == 0 {
                        let pc_captured = self.squares[sq_dst] as usize;
                        if pc_captured & n_opp_side_tag != 0 {
                            mvs.push(
                                Move::new(sq_src, sq_dst),
                                self.mvv_lva(sq_dst, pc_captured, 3),
                            );
                        }
                    }
                }
            }
        }

        // 车
        for i in ROOK_FROM..=ROOK_TO {
            let sq_src = self.pieces[n_side_tag + i] as usize;
            if sq_src != 0 {
                let x = file_x(sq_src);
                let y = rank_y(sq_src);
                let smv = self.rank_move(x, y);
                for dir in 0..2 {
                    let sq_dst = smv.rook_cap[dir] as usize + rank_disp(y);
                    if sq_dst != sq_src {
                        let pc_captured = self.squares[sq_dst] as usize;
                        if pc_captured & n_opp_side_tag != 0 {
                            mvs.push(
                                Move::new(sq_src, sq_dst),
                                self.mvv_lva(sq_dst, pc_captured, 4),
                            );
                        }
                    }
                }
                let smv = self.file_move(x, y);
                for dir in 0..2 {
                    let sq_dst = smv.rook_cap[dir] as usize + file_disp(x);
                    if sq_dst != sq_src {
                        let pc_captured = self.squares[sq_dst] as usize;
                        if pc_captured & n_opp_side_tag != 0 {
                            mvs.push(
                                Move::new(sq_src, sq_dst),
                                self.mvv_lva(sq_dst, pc_captured, 4),
                            );
                        }
                    }
                }
            }
        }

        // 炮
        for i in CANNON_FROM..=CANNON_TO {
            let sq_src = self.pieces[n_side_tag + i] as usize;
            if sq_src != 0 {
                let x = file_x(sq_src);
                let y = rank_y(sq_src);
                let smv = self.rank_move(x, y);
                for dir in 0..2 {
                    let sq_dst = smv.cannon_cap[dir] as usize + rank_disp(y);
                    if sq_dst != sq_src {
                        let pc_captured = self.squares[sq_dst] as usize;
                        if pc_captured & n_opp_side_tag != 0 {
                            mvs.push(
                                Move::new(sq_src, sq_dst),
                                self.mvv_lva(sq_dst, pc_captured, 3),
                            );
                        }
                    }
                }
                let smv = self.file_move(x, y);
                for dir in 0..2 {
                    let sq_dst = smv.cannon_cap[dir] as usize + file_disp(x);
                    if sq_dst != sq_src {
                        let pc_captured = self.squares[sq_dst] as usize;
                        if pc_captured & n_opp_side_tag != 0 {
                            mvs.push(
                                Move::new(sq_src, sq_dst),
                                self.mvv_lva(sq_dst, pc_captured, 3),
                            );
                        }
                    }
                }
            }
        }

        // 兵(卒)
        for i in PAWN_FROM..=PAWN_TO {
            let sq_src = self.pieces[n_side_tag + i] as usize;
            if sq_src != 0 {
                for &sq_dst in tables().pawn_moves[self.sd_player][sq_src].iter() {
                    let sq_dst = sq_dst as usize;
                    if sq_dst == 0 {
                        break;
                    }
                    let pc_captured = self.squares[sq_dst] as usize;
                    if pc_captured & n_opp_side_tag != 0 {
                        mvs.push(Move::new(sq_src, sq_dst), self.mvv_lva(sq_dst, pc_captured, 2));
                    }
                }
            }
        }
    }

    /// 不吃子着法生成器
    pub fn gen_noncap_moves(&self, mvs: &mut MoveList) {
        let n_side_tag = side_tag(self.sd_player);

        // 帅(将)
        let sq_src = self.pieces[n_side_tag + KING_FROM] as usize;
        if sq_src != 0 {
            for &sq_dst in tables().king_moves[sq_src].iter() {
                let sq_dst = sq_dst as usize;
                if sq_dst == 0 {
                    break;
                }
                if self.squares[sq_dst] == 0 {
                    mvs.push(Move::new(sq_src, sq_dst), 0);
                }
            }
        }

        // 仕(士)
        for i in ADVISOR_FROM..=ADVISOR_TO {
            let sq_src = self.pieces[n_side_tag + i] as usize;
            if sq_src != 0 {
                for &sq_dst in tables().advisor_moves[sq_src].iter() {
                    let sq_dst = sq_dst as usize;
                    if sq_dst == 0 {
                        break;
                    }
                    if self.squares[sq_dst] == 0 {
                        mvs.push(Move::new(sq_src, sq_dst), 0);
                    }
                }
            }
        }

        // 相(象)
        for i in BISHOP_FROM..=BISHOP_TO {
            let sq_src = self.pieces[n_side_tag + i] as usize;
            if sq_src != 0 {
                let moves = &tables().bishop_moves[sq_src];
                let pins = &tables().bishop_pins[sq_src];
                for (n, &sq_dst) in moves.iter().enumerate() {
                    let sq_dst = sq_dst as usize;
                    if sq_dst == 0 {
                        break;
                    }
                    if self.squares[pins[n] as usize] == 0 && self.squares[sq_dst] == 0 {
                        mvs.push(Move::new(sq_src, sq_dst), 0);
                    }
                }
            }
        }

        // 马
        for i in KNIGHT_FROM..=KNIGHT_TO {
            let sq_src = self.pieces[n_side_tag + i] as usize;
            if sq_src != 0 {
                let moves = &tables().knight_moves[sq_src];
                let pins = &tables().knight_pins[sq_src];
                for (n, &sq_dst) in moves.iter().enumerate() {
                    let sq_dst = sq_dst as usize;
                    if sq_dst == 0 {
                        break;
                    }
                    if self.squares[pins[n] as usize] == 0 && self.squares[sq_dst] == 0 {
                        mvs.push(Move::new(sq_src, sq_dst), 0);
                    }
                }
            }
        }

        // 车和炮，不吃子着法是一样的
        for i in ROOK_FROM..=CANNON_TO {
            let sq_src = self.pieces[n_side_tag + i] as usize;
            if sq_src != 0 {
                let x = file_x(sq_src);
                let y = rank_y(sq_src);
                let smv = self.rank_move(x, y);
                let mut sq_dst = smv.non_cap[0] as usize + rank_disp(y);
                while sq_dst != sq_src {
                    mvs.push(Move::new(sq_src, sq_dst), 0);
                    sq_dst -= 1;
                }
                let mut sq_dst = smv.non_cap[1] as usize + rank_disp(y);
                while sq_dst != sq_src {
                    mvs.push(Move::new(sq_src, sq_dst), 0);
                    sq_dst += 1;
                }
                let smv = self.file_move(x, y);
                let mut sq_dst = smv.non_cap[0] as usize + file_disp(x);
                while sq_dst != sq_src {
                    mvs.push(Move::new(sq_src, sq_dst), 0);
                    sq_dst -= 16;
                }
                let mut sq_dst = smv.non_cap[1] as usize + file_disp(x);
                while sq_dst != sq_src {
                    mvs.push(Move::new(sq_src, sq_dst), 0);
                    sq_dst += 16;
                }
            }
        }

        // 兵(卒)
        for i in PAWN_FROM..=PAWN_TO {
            let sq_src = self.pieces[n_side_tag + i] as usize;
            if sq_src != 0 {
                for &sq_dst in tables().pawn_moves[self.sd_player][sq_src].iter() {
                    let sq_dst = sq_dst as usize;
                    if sq_dst == 0 {
                        break;
                    }
                    if self.squares[sq_dst] == 0 {
                        mvs.push(Move::new(sq_src, sq_dst), 0);
                    }
                }
            }
        }
    }

    /// 全部着法生成器，吃子着法在前
    pub fn gen_all_moves(&self, mvs: &mut MoveList) {
        self.gen_cap_moves(mvs);
        self.gen_noncap_moves(mvs);
    }

    /// “捉”的检测：着法 mv 执行(且已交换走子方)后，判断刚走的子是否捉住了
    /// 无根的车马炮或过河兵(卒)。返回被捉子的序号(1 到 15)，0 表示没捉
    pub(crate) fn chased_by(&self, mv: Move) -> u8 {
        let sq_src = mv.dst();
        let pc_moved = self.squares[sq_src] as usize;
        let n_side_tag = side_tag(self.sd_player);

        // 马捉的目标要过滤：捉车直接算，捉炮和过河兵(卒)要求无根
        let knight_victim = |pos: &Position, sq_dst: usize, pc: usize| -> u8 {
            if pc <= ROOK_TO {
                if pc >= ROOK_FROM {
                    return pc as u8;
                }
            } else if pc <= CANNON_TO {
                if !pos.protected(pos.sd_player, sq_dst, 0) {
                    return pc as u8;
                }
            } else if away_half(sq_dst, pos.sd_player) && !pos.protected(pos.sd_player, sq_dst, 0) {
                return pc as u8;
            }
            0
        };
        // 车捉马炮和过河兵(卒)都要求无根，车捉车不算
        let rook_victim = |pos: &Position, sq_dst: usize, pc: usize| -> u8 {
            if pc <= ROOK_TO {
                if (KNIGHT_FROM..=KNIGHT_TO).contains(&pc)
                    && !pos.protected(pos.sd_player, sq_dst, 0)
                {
                    return pc as u8;
                }
            } else if pc <= CANNON_TO {
                if !pos.protected(pos.sd_player, sq_dst, 0) {
                    return pc as u8;
                }
            } else if away_half(sq_dst, pos.sd_player) && !pos.protected(pos.sd_player, sq_dst, 0) {
                return pc as u8;
            }
            0
        };
        // 炮捉车直接算，捉马和过河兵(卒)要求无根，炮捉炮不算
        let cannon_victim = |pos: &Position, sq_dst: usize, pc: usize| -> u8 {
            if pc <= ROOK_TO {
                if pc >= KNIGHT_FROM {
                    if pc <= KNIGHT_TO {
                        if !pos.protected(pos.sd_player, sq_dst, 0) {
                            return pc as u8;
                        }
                    } else {
                        return pc as u8;
                    }
                }
            } else if pc >= PAWN_FROM
                && away_half(sq_dst, pos.sd_player)
                && !pos.protected(pos.sd_player, sq_dst, 0)
            {
                return pc as u8;
            }
            0
        };

        match pc_moved - opp_side_tag(self.sd_player) {
            KNIGHT_FROM | KNIGHT_TO => {
                let moves = &tables().knight_moves[sq_src];
                let pins = &tables().knight_pins[sq_src];
                for (n, &sq_dst) in moves.iter().enumerate() {
                    let sq_dst = sq_dst as usize;
                    if sq_dst == 0 {
                        break;
                    }
                    if self.squares[pins[n] as usize] == 0 {
                        let pc = self.squares[sq_dst] as usize;
                        if pc & n_side_tag != 0 {
                            let chased = knight_victim(self, sq_dst, pc - n_side_tag);
                            if chased > 0 {
                                return chased;
                            }
                        }
                    }
                }
            }
            ROOK_FROM | ROOK_TO => {
                let x = file_x(sq_src);
                let y = rank_y(sq_src);
                if (mv.src() ^ sq_src) & 0xf == 0 {
                    // 车纵向移动了，判断横向吃到的子
                    let smv = self.rank_move(x, y);
                    for dir in 0..2 {
                        let sq_dst = smv.rook_cap[dir] as usize + rank_disp(y);
                        if sq_dst != sq_src {
                            let pc = self.squares[sq_dst] as usize;
                            if pc & n_side_tag != 0 {
                                let chased = rook_victim(self, sq_dst, pc - n_side_tag);
                                if chased > 0 {
                                    return chased;
                                }
                            }
                        }
                    }
                } else {
                    let smv = self.file_move(x, y);
                    for dir in 0..2 {
                        let sq_dst = smv.rook_cap[dir] as usize + file_disp(x);
                        if sq_dst != sq_src {
                            let pc = self.squares[sq_dst] as usize;
                            if pc & n_side_tag != 0 {
                                let chased = rook_victim(self, sq_dst, pc - n_side_tag);
                                if chased > 0 {
                                    return chased;
                                }
                            }
                        }
                    }
                }
            }
            CANNON_FROM | CANNON_TO => {
                let x = file_x(sq_src);
                let y = rank_y(sq_src);
                if (mv.src() ^ sq_src) & 0xf == 0 {
                    let smv = self.rank_move(x, y);
                    for dir in 0..2 {
                        let sq_dst = smv.cannon_cap[dir] as usize + rank_disp(y);
                        if sq_dst != sq_src {
                            let pc = self.squares[sq_dst] as usize;
                            if pc & n_side_tag != 0 {
                                let chased = cannon_victim(self, sq_dst, pc - n_side_tag);
                                if chased > 0 {
                                    return chased;
                                }
                            }
                        }
                    }
                } else {
                    let smv = self.file_move(x, y);
                    for dir in 0..2 {
                        let sq_dst = smv.cannon_cap[dir] as usize + file_disp(x);
                        if sq_dst != sq_src {
                            let pc = self.squares[sq_dst] as usize;
                            if pc & n_side_tag != 0 {
                                let chased = cannon_victim(self, sq_dst, pc - n_side_tag);
                                if chased > 0 {
                                    return chased;
                                }
                            }
                        }
                    }
                }
            }
            _ => {}
        }
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::{Position, START_FEN};

    fn legal_move_count(pos: &mut Position) -> usize {
        let mut mvs = MoveList::new();
        pos.gen_all_moves(&mut mvs);
        let mut n = 0;
        for i in 0..mvs.len() {
            if pos.make_move(mvs[i].mv) {
                pos.undo_move();
                n += 1;
            }
        }
        n
    }

    #[test]
    fn test_start_position_has_44_moves() {
        let mut pos = Position::from_fen(START_FEN).unwrap();
        assert_eq!(legal_move_count(&mut pos), 44);
    }

    #[test]
    fn test_generated_moves_are_legal() {
        let pos = Position::from_fen(START_FEN).unwrap();
        let mut mvs = MoveList::new();
        pos.gen_all_moves(&mut mvs);
        for sm in mvs.iter() {
            assert!(pos.legal_move(sm.mv), "{} should be legal", sm.mv);
        }
    }

    #[test]
    fn test_bishop_eye_block() {
        // 相眼被塞住，相不能飞
        let pos = Position::from_fen("4k4/9/9/9/9/9/9/9/4p4/3B1K3 w").unwrap();
        let mut mvs = MoveList::new();
        pos.gen_all_moves(&mut mvs);
        // 相在 d0：f2 方向的相眼 e1 被黑卒塞住，b2 方向可飞
        let blocked = Move::from_coord("d0f2").unwrap();
        assert!(mvs.iter().all(|sm| sm.mv != blocked));
        let open = Move::from_coord("d0b2").unwrap();
        assert!(mvs.iter().any(|sm| sm.mv == open));
    }

    #[test]
    fn test_knight_leg_block() {
        // 马腿被塞住
        let pos = Position::from_fen("4k4/9/9/9/9/9/9/9/5p3/4KN3 w").unwrap();
        let mut mvs = MoveList::new();
        pos.gen_all_moves(&mut mvs);
        // 马在 f0：e2 和 g2 共用的马腿 f1 被黑卒塞住，h1 可走
        let blocked = Move::from_coord("f0e2").unwrap();
        assert!(mvs.iter().all(|sm| sm.mv != blocked));
        let open = Move::from_coord("f0h1").unwrap();
        assert!(mvs.iter().any(|sm| sm.mv == open));
    }

    #[test]
    fn test_cannon_screen_capture() {
        // 炮隔一个屏风才能吃子；打到自己的子不算
        let pos = Position::from_fen("4k4/9/9/9/9/9/9/9/9/C1p1K4 w").unwrap();
        let mut mvs = MoveList::new();
        pos.gen_cap_moves(&mut mvs);
        assert!(mvs.is_empty());
        // 有炮架的局面：炮 a0、架 b0 黑卒、目标 c0 黑马
        let pos = Position::from_fen("4k4/9/9/9/9/9/9/9/9/Cpn1K4 w").unwrap();
        let mut mvs = MoveList::new();
        pos.gen_cap_moves(&mut mvs);
        let cap = Move::from_coord("a0c0").unwrap();
        assert!(mvs.iter().any(|sm| sm.mv == cap));
    }

    #[test]
    fn test_check_evasion_only_legal_moves() {
        // 被车将军，数应将着法
        let mut pos = Position::from_fen("4k4/9/9/9/9/9/9/9/9/3KR3r b").unwrap();
        // 黑方被 e0 车将军? e 列：e9 将、e0 车，将军
        assert!(pos.in_check() || pos.checked_by(true) > 0);
        let n = legal_move_count(&mut pos);
        assert!(n > 0);
        let mut mvs = MoveList::new();
        pos.gen_all_moves(&mut mvs);
        for i in 0..mvs.len() {
            if pos.make_move(mvs[i].mv) {
                // 应将后不能仍被将军
                pos.undo_move();
            }
        }
    }

    #[test]
    fn test_mvv_lva_ordering() {
        // 车可以吃无根炮，也可以吃有根兵：吃炮的分值应更高
        let pos = Position::from_fen("4k4/9/9/9/9/9/9/2c6/9/2R1K4 w").unwrap();
        let mut mvs = MoveList::new();
        pos.gen_cap_moves(&mut mvs);
        let cap_cannon = mvs
            .iter()
            .find(|sm| sm.mv == Move::from_coord("c0c2").unwrap());
        assert!(cap_cannon.is_some());
        // 无根炮：MVV=3，无保护，分值 3+1=4
        assert_eq!(cap_cannon.unwrap().vl, 4);
    }

    #[test]
    fn test_protected() {
        let pos = Position::from_fen("4k4/9/9/9/9/9/9/9/4A4/4K4 w").unwrap();
        // 仕在 e1 受帅保护
        assert!(pos.protected(0, Move::from_coord("e1e1").unwrap().src(), 0));
        // 排除帅后就无保护
        let king_sq = pos.pieces[side_tag(0) + KING_FROM] as usize;
        assert!(!pos.protected(0, Move::from_coord("e1e1").unwrap().src(), king_sq));
    }

    #[test]
    fn test_chased_by_rook_chasing_knight() {
        // 红车平移后捉住无根黑马
        let mut pos = Position::from_fen("4k4/9/9/9/4n4/9/9/9/9/R3K4 w").unwrap();
        // 黑马 e5(过河)，红车 a0 平 e0? 那是将军线……改成捉马：车 a0 -> a5
        let mv = Move::from_coord("a0a5").unwrap();
        assert!(pos.make_move(mv));
        // 走完后轮到黑方，刚走的红车在同一行捉住黑马
        let last = pos.last_move();
        assert!(matches!(last.chk_chs, crate::position::ChkChs::Chase(_)));
    }
}
