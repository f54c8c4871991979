use std::{io, path::PathBuf};

use judge_core::error::JudgeCoreError;

#[derive(Debug, thiserror::Error)]
pub enum JudgerError {
    #[error("{0}")]
    Core(#[from] JudgeCoreError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid contest manifest: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("failed to serialize report: {0}")]
    Report(#[from] serde_json::Error),

    #[error("a judging batch is already running")]
    BatchAlreadyRunning,
    #[error("cell (player {player}, problem {problem}) is out of range")]
    InvalidCell { player: usize, problem: usize },
    #[error("unknown {kind} '{name}'")]
    UnknownName { kind: &'static str, name: String },
    #[error("source directory {0:?} does not exist")]
    MissingSourceRoot(PathBuf),
    #[error("problem '{problem}' cannot be judged: {reason}")]
    Configuration { problem: String, reason: String },
    #[error("judge worker panicked")]
    WorkerPanicked,
}
