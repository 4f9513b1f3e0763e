//! Xiangqi Engine CLI
//!
//! 缺省进入 UCCI 协议循环；另外提供 botzone 适配和几个调试用的单次命令。

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::time::Instant;
use xiangqi_engine::{
    build_position, Engine, EngineOptions, GoMode, GoParams, MoveList, NullControl, Position,
    MATE_VALUE, UCCI_MAX_DEPTH,
};

#[derive(Parser)]
#[command(name = "xiangqi-engine")]
#[command(about = "Xiangqi (Chinese chess) UCCI engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// UCCI 协议循环(缺省)
    Ucci,

    /// botzone 单回合 JSON 协议
    Botzone,

    /// 列出合法着法
    Moves {
        /// FEN 字符串
        #[arg(long)]
        fen: String,
    },

    /// 静态评估局面
    Eval {
        /// FEN 字符串
        #[arg(long)]
        fen: String,

        /// JSON 输出
        #[arg(long)]
        json: bool,
    },

    /// 搜索最佳着法
    Best {
        /// FEN 字符串
        #[arg(long)]
        fen: String,

        /// 搜索深度
        #[arg(long, default_value_t = 8)]
        depth: i32,

        /// 时间限制(毫秒)，给定时覆盖深度限制
        #[arg(long)]
        time_limit: Option<i64>,

        /// JSON 输出
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct EvalResponse {
    fen: String,
    side: &'static str,
    score: i32,
}

#[derive(Serialize)]
struct BestResponse {
    #[serde(rename = "move")]
    mv: String,
    score: i32,
    depth_limit: i32,
    nodes: i64,
    elapsed_ms: u128,
    pv: Vec<String>,
}

fn side_to_str(sd: usize) -> &'static str {
    if sd == 0 {
        "red"
    } else {
        "black"
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Ucci) {
        Commands::Ucci => xiangqi_engine::run_ucci(),

        Commands::Botzone => {
            if let Err(e) = xiangqi_engine::botzone::run_botzone() {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }

        Commands::Moves { fen } => match build_position(&fen, &[], false) {
            Ok(mut pos) => {
                let mut mvs = MoveList::new();
                pos.gen_all_moves(&mut mvs);
                let legal: Vec<String> = (0..mvs.len())
                    .filter_map(|i| {
                        let mv = mvs[i].mv;
                        if pos.make_move(mv) {
                            pos.undo_move();
                            Some(mv.to_coord())
                        } else {
                            None
                        }
                    })
                    .collect();
                println!("Legal moves ({}):", legal.len());
                for mv in legal {
                    println!("  {}", mv);
                }
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },

        Commands::Eval { fen, json } => match Position::from_fen(&fen) {
            Ok(pos) => {
                let score = pos.evaluate(-MATE_VALUE, MATE_VALUE);
                if json {
                    let response = EvalResponse {
                        fen: pos.to_fen(),
                        side: side_to_str(pos.sd_player),
                        score,
                    };
                    println!("{}", serde_json::to_string_pretty(&response).unwrap());
                } else {
                    println!("eval ({} to move): {}", side_to_str(pos.sd_player), score);
                }
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },

        Commands::Best {
            fen,
            depth,
            time_limit,
            json,
        } => {
            let pos = match build_position(&fen, &[], false) {
                Ok(pos) => pos,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            };
            let mut opts = EngineOptions::default();
            opts.use_book = false;
            let mut engine = Engine::new(opts);
            engine.pos = pos;

            let go = match time_limit {
                Some(ms) => GoParams {
                    mode: GoMode::Timer {
                        proper_ms: ms,
                        max_ms: ms,
                    },
                    depth: UCCI_MAX_DEPTH,
                    ..GoParams::default()
                },
                None => GoParams {
                    mode: GoMode::Infinite,
                    depth: depth.min(UCCI_MAX_DEPTH),
                    ..GoParams::default()
                },
            };

            let start = Instant::now();
            let result = engine.search_main(go, &mut NullControl, false);
            let elapsed = start.elapsed();

            match result.best {
                Some(best) => {
                    if json {
                        let response = BestResponse {
                            mv: best.to_coord(),
                            score: result.vl,
                            depth_limit: depth,
                            nodes: result.nodes,
                            elapsed_ms: elapsed.as_millis(),
                            pv: result.pv.iter().map(|mv| mv.to_coord()).collect(),
                        };
                        println!("{}", serde_json::to_string_pretty(&response).unwrap());
                    } else {
                        println!("bestmove {} (score: {})", best, result.vl);
                        println!(
                            "Stats: nodes={}, time={:.3}s",
                            result.nodes,
                            elapsed.as_secs_f64()
                        );
                    }
                }
                None => println!("nobestmove"),
            }
        }
    }
}
