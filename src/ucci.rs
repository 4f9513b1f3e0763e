//! UCCI 协议
//!
//! 行式指令协议：解释器把一行文本解释成指令记录，引擎主循环消费它们。
//! 标准输入由一个读取线程喂进通道，搜索中只在轮询点非阻塞地取指令。

use crate::moves::Move;
use crate::position::{Position, START_FEN};
use crate::search::{
    ControlSource, Engine, EngineOptions, GoMode, GoParams, SearchResult, Signal, UCCI_MAX_DEPTH,
};
use log::warn;
use std::collections::VecDeque;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::thread;

/// 选项的设定等级(pruning、knowledge、randomness)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Grade {
    None,
    Tiny,
    Small,
    Medium,
    Large,
    Huge,
}

impl Grade {
    fn parse(s: &str) -> Option<Grade> {
        match s {
            "none" => Some(Grade::None),
            "tiny" => Some(Grade::Tiny),
            "small" => Some(Grade::Small),
            "medium" => Some(Grade::Medium),
            "large" => Some(Grade::Large),
            "huge" => Some(Grade::Huge),
            _ => None,
        }
    }

    /// 随机性等级对应的分值屏蔽位
    fn random_mask(self) -> u32 {
        match self {
            Grade::None => 0,
            Grade::Tiny => 1,
            Grade::Small => 3,
            Grade::Medium => 7,
            Grade::Large => 15,
            Grade::Huge => 31,
        }
    }
}

/// go 指令的时间模式
#[derive(Clone, Debug)]
pub enum GoSpec {
    Depth(i32),
    Nodes(i64),
    /// 时段制：限定时间内走完 moves_to_go 步
    TimeMovesToGo { time_ms: i64, moves_to_go: i64 },
    /// 加时制：走完一步加 increment
    TimeIncrement { time_ms: i64, increment_ms: i64 },
    Infinite,
}

/// 解释后的指令记录
#[derive(Clone, Debug)]
pub enum UcciCommand {
    Ucci,
    IsReady,
    PonderHit,
    PonderHitDraw,
    Stop,
    Quit,
    SetOption {
        name: String,
        value: String,
    },
    Position {
        fen: String,
        moves: Vec<Move>,
    },
    BanMoves(Vec<Move>),
    Go {
        spec: GoSpec,
        ponder: bool,
        draw: bool,
    },
    Probe {
        fen: String,
        moves: Vec<Move>,
    },
    Unknown(String),
}

/// 解释一行指令
pub fn parse_line(line: &str) -> UcciCommand {
    let line = line.trim();
    let mut tokens = line.split_whitespace();
    let cmd = match tokens.next() {
        Some(t) => t,
        None => return UcciCommand::Unknown(String::new()),
    };
    match cmd {
        "ucci" => UcciCommand::Ucci,
        "isready" => UcciCommand::IsReady,
        "ponderhit" => {
            if tokens.next() == Some("draw") {
                UcciCommand::PonderHitDraw
            } else {
                UcciCommand::PonderHit
            }
        }
        "stop" => UcciCommand::Stop,
        "quit" => UcciCommand::Quit,
        "setoption" => {
            let name = tokens.next().unwrap_or("").to_string();
            let value = tokens.collect::<Vec<_>>().join(" ");
            UcciCommand::SetOption { name, value }
        }
        "banmoves" => UcciCommand::BanMoves(parse_move_list(&mut tokens)),
        "position" | "probe" => {
            let (fen, moves) = parse_position_body(&mut tokens);
            if cmd == "position" {
                UcciCommand::Position { fen, moves }
            } else {
                UcciCommand::Probe { fen, moves }
            }
        }
        "go" => {
            let mut ponder = false;
            let mut draw = false;
            let mut spec = GoSpec::Infinite;
            while let Some(tok) = tokens.next() {
                match tok {
                    "ponder" => ponder = true,
                    "draw" => draw = true,
                    "depth" => {
                        if let Some(d) = tokens.next().and_then(|t| t.parse().ok()) {
                            spec = GoSpec::Depth(d);
                        }
                    }
                    "nodes" => {
                        if let Some(n) = tokens.next().and_then(|t| t.parse().ok()) {
                            spec = GoSpec::Nodes(n);
                        }
                    }
                    "time" => {
                        let time_ms: i64 =
                            tokens.next().and_then(|t| t.parse().ok()).unwrap_or(0);
                        // 缺省按时段制处理，每时段只走这一步
                        spec = GoSpec::TimeMovesToGo {
                            time_ms,
                            moves_to_go: 1,
                        };
                    }
                    "movestogo" => {
                        if let (GoSpec::TimeMovesToGo { time_ms, .. }, Some(m)) =
                            (spec.clone(), tokens.next().and_then(|t| t.parse().ok()))
                        {
                            spec = GoSpec::TimeMovesToGo {
                                time_ms,
                                moves_to_go: m,
                            };
                        }
                    }
                    "increment" => {
                        if let (GoSpec::TimeMovesToGo { time_ms, .. }, Some(inc)) =
                            (spec.clone(), tokens.next().and_then(|t| t.parse().ok()))
                        {
                            spec = GoSpec::TimeIncrement {
                                time_ms,
                                increment_ms: inc,
                            };
                        }
                    }
                    "infinite" => spec = GoSpec::Infinite,
                    _ => {}
                }
            }
            UcciCommand::Go { spec, ponder, draw }
        }
        _ => UcciCommand::Unknown(line.to_string()),
    }
}

fn parse_move_list<'a, I: Iterator<Item = &'a str>>(tokens: &mut I) -> Vec<Move> {
    let mut moves = Vec::new();
    for tok in tokens {
        match Move::from_coord(tok) {
            Some(mv) => moves.push(mv),
            None => break,
        }
    }
    moves
}

/// position/probe 的正文："fen <FEN 各字段> [moves ...]" 或 "startpos [moves ...]"
fn parse_position_body<'a, I: Iterator<Item = &'a str>>(tokens: &mut I) -> (String, Vec<Move>) {
    let mut fen = String::new();
    let mut moves = Vec::new();
    match tokens.next() {
        Some("startpos") => fen = START_FEN.to_string(),
        Some("fen") => {
            let mut parts: Vec<&str> = Vec::new();
            while let Some(tok) = tokens.next() {
                if tok == "moves" {
                    return (parts.join(" "), parse_move_list(tokens));
                }
                parts.push(tok);
            }
            return (parts.join(" "), moves);
        }
        _ => return (fen, moves),
    }
    if tokens.next() == Some("moves") {
        moves = parse_move_list(tokens);
    }
    (fen, moves)
}

/// 从 FEN 加后续着法构造局面。吃子着法之后历史被截断，
/// 使回滚历史始终只包含可逆着法
pub fn build_position(
    fen: &str,
    moves: &[Move],
    promotion: bool,
) -> Result<Position, String> {
    let mut pos = Position::from_fen(fen)?;
    if promotion {
        pos.pre_eval.promotion = true;
        pos.pre_evaluate();
        pos.set_irrev();
    }
    for (i, &mv) in moves.iter().enumerate() {
        if !pos.legal_move(mv) || !pos.make_move(mv) {
            return Err(format!("illegal move {} at ply {}", mv, i + 1));
        }
        if pos.last_move().captured > 0 {
            pos.set_irrev();
        }
    }
    // 搜索从这里算起；子力构成可能已经变了，预评价重算一遍
    pos.distance = 0;
    pos.pre_evaluate();
    Ok(pos)
}

// ============================================================================
// 指令通道
// ============================================================================

/// 标准输入的行通道：读取线程阻塞在 stdin 上，消费端非阻塞取行
pub struct CommandChannel {
    rx: Receiver<String>,
}

impl CommandChannel {
    pub fn spawn_stdin() -> CommandChannel {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("stdin-reader".to_string())
            .spawn(move || {
                let stdin = io::stdin();
                for line in stdin.lock().lines() {
                    match line {
                        Ok(l) => {
                            if tx.send(l).is_err() {
                                break;
                            }
                        }
                        Err(_) => break,
                    }
                }
            })
            .expect("spawn stdin reader");
        CommandChannel { rx }
    }

    pub fn try_recv(&self) -> Option<String> {
        self.rx.try_recv().ok()
    }

    pub fn recv_blocking(&self) -> Option<String> {
        self.rx.recv().ok()
    }
}

/// 搜索期间的指令源：stop/ponderhit/quit 变成信号，
/// isready 就地应答，其余指令排队到搜索结束后处理
struct BusyControl<'a> {
    chan: &'a CommandChannel,
    pending: &'a mut VecDeque<UcciCommand>,
    batch: bool,
}

impl ControlSource for BusyControl<'_> {
    fn poll(&mut self) -> Option<Signal> {
        if self.batch {
            return None;
        }
        while let Some(line) = self.chan.try_recv() {
            match parse_line(&line) {
                UcciCommand::IsReady => {
                    println!("readyok");
                }
                UcciCommand::Stop => return Some(Signal::Stop),
                UcciCommand::PonderHit => return Some(Signal::PonderHit),
                UcciCommand::PonderHitDraw => return Some(Signal::PonderHitDraw),
                UcciCommand::Quit => return Some(Signal::Quit),
                UcciCommand::Unknown(_) => {}
                other => self.pending.push_back(other),
            }
        }
        None
    }
}

// ============================================================================
// 引擎主循环
// ============================================================================

fn parse_bool(value: &str) -> bool {
    matches!(value, "on" | "true" | "1")
}

/// 在可执行文件旁边找默认开局库
fn locate_book() -> Option<PathBuf> {
    let mut path = std::env::current_exe().ok()?;
    path.set_file_name("BOOK.DAT");
    if path.exists() {
        Some(path)
    } else {
        None
    }
}

fn emit_best_move(result: &SearchResult) {
    match result.best {
        Some(best) => {
            let mut line = format!("bestmove {}", best);
            if let Some(ponder) = result.ponder {
                line.push_str(&format!(" ponder {}", ponder));
            }
            if result.resign {
                line.push_str(" resign");
            } else if result.draw_offer {
                line.push_str(" draw");
            }
            println!("{}", line);
        }
        None => println!("nobestmove"),
    }
}

fn go_params(spec: &GoSpec, ponder: bool, draw: bool, ban_moves: Vec<Move>) -> GoParams {
    let (mode, depth) = match *spec {
        GoSpec::Depth(d) => (GoMode::Infinite, d.min(UCCI_MAX_DEPTH)),
        GoSpec::Nodes(n) => (GoMode::Nodes(n), UCCI_MAX_DEPTH),
        GoSpec::TimeMovesToGo {
            time_ms,
            moves_to_go,
        } => {
            // 时段制：平均分配剩余时间，上限是一半的剩余时间
            let proper = time_ms / moves_to_go.max(1);
            (
                GoMode::Timer {
                    proper_ms: proper,
                    max_ms: (time_ms / 2).max(proper),
                },
                UCCI_MAX_DEPTH,
            )
        }
        GoSpec::TimeIncrement {
            time_ms,
            increment_ms,
        } => {
            // 加时制：按 20 步用完存量，加上每步增量
            let proper = time_ms / 20 + increment_ms;
            (
                GoMode::Timer {
                    proper_ms: proper,
                    max_ms: (time_ms / 2).max(proper),
                },
                UCCI_MAX_DEPTH,
            )
        }
        GoSpec::Infinite => (GoMode::Infinite, UCCI_MAX_DEPTH),
    };
    GoParams {
        mode,
        depth,
        ponder,
        draw_offered: draw,
        ban_moves,
    }
}

/// UCCI 主循环：第一条指令只认 ucci，quit 退出
pub fn run_ucci() {
    let chan = CommandChannel::spawn_stdin();

    // 启动行
    loop {
        let line = match chan.recv_blocking() {
            Some(l) => l,
            None => return,
        };
        match parse_line(&line) {
            UcciCommand::Ucci => break,
            UcciCommand::Quit => return,
            _ => {}
        }
    }
    println!("id name {} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    println!("option batch type check default false");
    println!("option debug type check default false");
    println!("option usehash type check default true");
    println!("option usebook type check default true");
    println!("option bookfiles type string");
    println!("option hashsize type spin min 1 max 1024 default 16");
    println!("option promotion type check default false");
    println!("option knowledge type combo vars none|small|medium|large default large");
    println!("option pruning type combo vars none|small|medium|large default large");
    println!("option randomness type combo vars none|tiny|small|medium|large|huge default none");
    println!("option newgame type button");
    println!("ucciok");

    let mut opts = EngineOptions::default();
    opts.book_file = locate_book();
    let mut engine = Engine::new(opts);
    let mut batch = false;
    let mut promotion = false;
    let mut ban_moves: Vec<Move> = Vec::new();
    let mut pending: VecDeque<UcciCommand> = VecDeque::new();

    loop {
        let cmd = match pending.pop_front() {
            Some(cmd) => cmd,
            None => match chan.recv_blocking() {
                Some(line) => parse_line(&line),
                None => break,
            },
        };
        match cmd {
            UcciCommand::IsReady => println!("readyok"),
            UcciCommand::Ucci => {}
            UcciCommand::SetOption { name, value } => match name.as_str() {
                "batch" => batch = parse_bool(&value),
                "debug" => engine.opts.debug = parse_bool(&value),
                "usehash" => engine.opts.use_hash = parse_bool(&value),
                "usebook" => engine.opts.use_book = parse_bool(&value),
                "bookfiles" => {
                    engine.opts.book_file = if value.is_empty() {
                        None
                    } else {
                        Some(PathBuf::from(value))
                    }
                }
                "hashsize" => {
                    if let Ok(mb) = value.parse::<usize>() {
                        engine.resize_hash(mb.clamp(1, 1024));
                    }
                }
                "promotion" => {
                    promotion = parse_bool(&value);
                    engine.pos.pre_eval.promotion = promotion;
                    engine.pos.pre_evaluate();
                    engine.pos.set_irrev();
                }
                "knowledge" => {
                    if let Some(grade) = Grade::parse(&value) {
                        engine.opts.knowledge = grade > Grade::None;
                    }
                }
                "pruning" => {
                    if let Some(grade) = Grade::parse(&value) {
                        engine.opts.null_move = grade > Grade::None;
                    }
                }
                "randomness" => {
                    if let Some(grade) = Grade::parse(&value) {
                        engine.opts.random_mask = grade.random_mask();
                    }
                }
                "newgame" => engine.new_game(),
                // ponder/threads/idle/style 这些选项接受但不起作用
                _ => {}
            },
            UcciCommand::Position { fen, moves } => {
                match build_position(&fen, &moves, promotion) {
                    Ok(pos) => {
                        engine.pos = pos;
                        ban_moves.clear();
                    }
                    Err(e) => warn!("position rejected: {}", e),
                }
            }
            UcciCommand::BanMoves(list) => ban_moves = list,
            UcciCommand::Go { spec, ponder, draw } => {
                let params = go_params(&spec, ponder, draw, ban_moves.clone());
                let mut ctl = BusyControl {
                    chan: &chan,
                    pending: &mut pending,
                    batch,
                };
                let result = engine.search_main(params, &mut ctl, true);
                emit_best_move(&result);
                if result.quit {
                    break;
                }
            }
            UcciCommand::Probe { fen, moves } => match build_position(&fen, &moves, promotion) {
                Ok(pos) => match engine.pop_hash(&pos) {
                    Some(info) => {
                        let mut line = "pophash".to_string();
                        if !info.mv.is_none() {
                            line.push_str(&format!(" bestmove {}", info.mv));
                        }
                        if let Some((vl, depth)) = info.beta {
                            line.push_str(&format!(" lowerbound {} depth {}", vl, depth));
                        }
                        if let Some((vl, depth)) = info.alpha {
                            line.push_str(&format!(" upperbound {} depth {}", vl, depth));
                        }
                        println!("{}", line);
                    }
                    None => println!("pophash"),
                },
                Err(e) => warn!("probe rejected: {}", e),
            },
            UcciCommand::PonderHit | UcciCommand::PonderHitDraw | UcciCommand::Stop => {}
            UcciCommand::Quit => break,
            UcciCommand::Unknown(line) => {
                if !line.is_empty() {
                    warn!("unknown command: {}", line);
                }
            }
        }
    }
    println!("bye");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_position_startpos_moves() {
        let cmd = parse_line("position startpos moves h2e2 h9g7");
        match cmd {
            UcciCommand::Position { fen, moves } => {
                assert_eq!(fen, START_FEN);
                assert_eq!(moves.len(), 2);
                assert_eq!(moves[0], Move::from_coord("h2e2").unwrap());
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn test_parse_position_fen() {
        let cmd = parse_line("position fen 4k4/9/9/9/9/9/9/9/9/4K4 w - - 0 1 moves e0e1");
        match cmd {
            UcciCommand::Position { fen, moves } => {
                assert!(fen.starts_with("4k4/"));
                assert_eq!(moves.len(), 1);
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn test_parse_go_variants() {
        match parse_line("go depth 8") {
            UcciCommand::Go {
                spec: GoSpec::Depth(8),
                ponder: false,
                ..
            } => {}
            other => panic!("{:?}", other),
        }
        match parse_line("go ponder time 30000 movestogo 10") {
            UcciCommand::Go {
                spec:
                    GoSpec::TimeMovesToGo {
                        time_ms: 30000,
                        moves_to_go: 10,
                    },
                ponder: true,
                ..
            } => {}
            other => panic!("{:?}", other),
        }
        match parse_line("go draw time 60000 increment 1000") {
            UcciCommand::Go {
                spec:
                    GoSpec::TimeIncrement {
                        time_ms: 60000,
                        increment_ms: 1000,
                    },
                draw: true,
                ..
            } => {}
            other => panic!("{:?}", other),
        }
    }

    #[test]
    fn test_parse_banmoves() {
        match parse_line("banmoves h2e2 b2e2") {
            UcciCommand::BanMoves(list) => assert_eq!(list.len(), 2),
            other => panic!("{:?}", other),
        }
    }

    #[test]
    fn test_build_position_truncates_on_capture() {
        // 吃子后历史被截断
        let pos = build_position(
            START_FEN,
            &[
                Move::from_coord("h2e2").unwrap(),
                Move::from_coord("h9g7").unwrap(),
                Move::from_coord("e2e6").unwrap(), // 炮打卒
            ],
            false,
        )
        .unwrap();
        assert_eq!(pos.move_num(), 1);
    }

    #[test]
    fn test_build_position_rejects_illegal() {
        assert!(build_position(START_FEN, &[Move::from_coord("a0a9").unwrap()], false).is_err());
    }
}
