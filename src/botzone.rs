//! botzone 适配器
//!
//! 单回合 JSON 协议：一行输入带着 (source, target) 坐标对的完整历史，
//! 重放到当前局面后在固定时间预算内搜索，输出一个 response 对象。
//! "-1" 是“没有上一步”的哨兵(第一回合的红方会收到)。

use crate::moves::Move;
use crate::pregen::{coord_xy, in_board, FILE_LEFT, RANK_TOP};
use crate::position::{Position, START_FEN};
use crate::search::{Engine, EngineOptions, GoMode, GoParams, NullControl, UCCI_MAX_DEPTH};
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead};

/// botzone 的固定思考时间(毫秒)
const BOTZONE_TIMER_MS: i64 = 950;

#[derive(Deserialize)]
struct BotzoneInput {
    #[serde(default)]
    requests: Vec<CoordPair>,
    #[serde(default)]
    responses: Vec<CoordPair>,
}

#[derive(Serialize, Deserialize, Clone)]
struct CoordPair {
    source: String,
    target: String,
}

#[derive(Serialize)]
struct BotzoneOutput {
    response: CoordPair,
}

/// "h2e2" 风格坐标对解析成着法
fn pair_to_move(pair: &CoordPair) -> Result<Move, String> {
    let parse = |s: &str| -> Result<usize, String> {
        let b = s.as_bytes();
        if b.len() != 2 {
            return Err(format!("bad coordinate: {}", s));
        }
        if !(b'a'..=b'i').contains(&b[0]) || !(b'0'..=b'9').contains(&b[1]) {
            return Err(format!("bad coordinate: {}", s));
        }
        let sq = coord_xy(
            (b[0] - b'a') as usize + FILE_LEFT,
            (b'9' - b[1]) as usize + RANK_TOP,
        );
        if !in_board(sq) {
            return Err(format!("coordinate off board: {}", s));
        }
        Ok(sq)
    };
    let sq_src = parse(&pair.source)?;
    let sq_dst = parse(&pair.target)?;
    Ok(Move::new(sq_src, sq_dst))
}

fn move_to_pair(mv: Move) -> CoordPair {
    let coord = mv.to_coord();
    CoordPair {
        source: coord[0..2].to_string(),
        target: coord[2..4].to_string(),
    }
}

/// 把一个坐标对重放进局面；吃子后截断回滚历史
fn apply_pair(pos: &mut Position, pair: &CoordPair) -> Result<(), String> {
    let mv = pair_to_move(pair)?;
    if !pos.legal_move(mv) || !pos.make_move(mv) {
        return Err(format!("illegal move in history: {}{}", pair.source, pair.target));
    }
    if pos.last_move().captured > 0 {
        pos.set_irrev();
    }
    Ok(())
}

/// 从请求历史恢复局面。requests 和 responses 交替重放，
/// 只有第一条 request 允许是 "-1"(表示我方执红先行)
fn replay_history(input: &BotzoneInput) -> Result<Position, String> {
    let mut pos = Position::from_fen(START_FEN)?;
    let turn_id = input.responses.len();
    if input.requests.len() <= turn_id {
        return Err("missing current request".to_string());
    }
    for j in 0..turn_id {
        if input.requests[j].source != "-1" {
            apply_pair(&mut pos, &input.requests[j])?;
        }
        apply_pair(&mut pos, &input.responses[j])?;
    }
    if input.requests[turn_id].source != "-1" {
        apply_pair(&mut pos, &input.requests[turn_id])?;
    }
    pos.distance = 0;
    pos.pre_evaluate();
    Ok(pos)
}

fn output(pair: CoordPair) {
    let out = BotzoneOutput { response: pair };
    println!("{}", serde_json::to_string(&out).expect("serialize response"));
}

fn output_none() {
    output(CoordPair {
        source: "-1".to_string(),
        target: "-1".to_string(),
    });
}

/// 读一行 JSON 请求，搜索并输出应着。历史非法时返回错误交由调用方处理
pub fn run_botzone() -> Result<(), String> {
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| format!("read request: {}", e))?;
    let input: BotzoneInput =
        serde_json::from_str(&line).map_err(|e| format!("bad request JSON: {}", e))?;

    let pos = replay_history(&input)?;
    let mut opts = EngineOptions::default();
    opts.use_book = false;
    let mut engine = Engine::new(opts);
    engine.pos = pos;

    let go = GoParams {
        mode: GoMode::Timer {
            proper_ms: BOTZONE_TIMER_MS,
            max_ms: BOTZONE_TIMER_MS,
        },
        depth: UCCI_MAX_DEPTH,
        ..GoParams::default()
    };
    let result = engine.search_main(go, &mut NullControl, false);
    match result.best {
        Some(best) => output(move_to_pair(best)),
        None => output_none(),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(s: &str, t: &str) -> CoordPair {
        CoordPair {
            source: s.to_string(),
            target: t.to_string(),
        }
    }

    #[test]
    fn test_replay_first_turn_as_red() {
        // 第一回合收到 "-1"，我方执红，局面就是起始局面
        let input = BotzoneInput {
            requests: vec![pair("-1", "-1")],
            responses: vec![],
        };
        let pos = replay_history(&input).unwrap();
        assert_eq!(pos.sd_player, 0);
        assert_eq!(pos.to_fen(), START_FEN);
    }

    #[test]
    fn test_replay_as_black_after_one_move() {
        let input = BotzoneInput {
            requests: vec![pair("h2", "e2")],
            responses: vec![],
        };
        let pos = replay_history(&input).unwrap();
        assert_eq!(pos.sd_player, 1);
    }

    #[test]
    fn test_replay_multi_turn() {
        let input = BotzoneInput {
            requests: vec![pair("-1", "-1"), pair("h9", "g7")],
            responses: vec![pair("h2", "e2")],
        };
        let pos = replay_history(&input).unwrap();
        assert_eq!(pos.sd_player, 0);
        assert_eq!(pos.distance, 0);
    }

    #[test]
    fn test_replay_rejects_illegal_history() {
        let input = BotzoneInput {
            requests: vec![pair("a0", "a9")],
            responses: vec![],
        };
        assert!(replay_history(&input).is_err());
    }

    #[test]
    fn test_move_pair_round_trip() {
        let mv = Move::from_coord("h2e2").unwrap();
        let pair = move_to_pair(mv);
        assert_eq!(pair.source, "h2");
        assert_eq!(pair.target, "e2");
        assert_eq!(pair_to_move(&pair).unwrap(), mv);
    }
}
