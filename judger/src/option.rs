use std::{io::Write, path::PathBuf};

use chrono::Local;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(name = "judger", version, about = "Judges every player of a local contest")]
pub struct JudgerOpt {
    /// For loading Opt from .env file
    #[arg(long, default_value = ".env")]
    pub env_path: PathBuf,

    /// Contest root holding contest.yaml, data/ and src/
    #[arg(long, env = "CONTEST_PATH", default_value = ".")]
    pub contest: PathBuf,

    /// How long the host waits for the worker once all events are drained
    #[arg(long, env = "WAIT_TIMEOUT_SECS", default_value = "30")]
    pub wait_timeout_secs: u64,

    /// Request a stop once this many cells have finished
    #[arg(long)]
    pub stop_after: Option<usize>,

    #[command(subcommand)]
    pub cmd: JudgerCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum JudgerCommand {
    /// Judge every cell of the contest, player by player
    JudgeAll,
    /// Judge all problems of one player
    JudgePlayer { name: String },
    /// Judge the given cells in order
    JudgeCells {
        /// Cells written as player:problem
        #[arg(required = true)]
        cells: Vec<String>,
    },
    /// Load the contest and validate every problem without judging
    Check,
}

/// Try to load env from a .env file, if not found, fallback to ENV
pub fn load_option() -> JudgerOpt {
    // First load env_path from Args
    let opt = JudgerOpt::parse();
    if opt.env_path.exists() {
        dotenv::from_path(&opt.env_path).ok();
    } else {
        dotenv::dotenv().ok();
    }

    setup_logger();

    // Load opt again with ENV
    let opt = JudgerOpt::parse();
    log::debug!("load opt: {:?}", opt);
    opt
}

fn setup_logger() {
    let env = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(env)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {:5} [{}:{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.file().unwrap_or("<unknown>"),
                record.line().unwrap_or(0),
                &record.args()
            )
        })
        .init();
}
