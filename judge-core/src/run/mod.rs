use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde_derive::Serialize;

use crate::error::JudgeCoreError;

pub mod process;

pub use process::ProcessRunner;

/// Everything needed to start one child process under limits.
#[derive(Debug, Clone, Serialize)]
pub struct RunRequest {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    /// `None` closes stdin
    pub stdin: Option<PathBuf>,
    /// `None` discards the stream
    pub stdout: Option<PathBuf>,
    pub stderr: Option<PathBuf>,
    pub time_limit: Duration,
    pub memory_limit_bytes: Option<u64>,
}

impl RunRequest {
    pub fn new(program: PathBuf, working_dir: &Path, time_limit: Duration) -> Self {
        Self {
            program,
            args: vec![],
            working_dir: working_dir.to_path_buf(),
            stdin: None,
            stdout: None,
            stderr: None,
            time_limit,
            memory_limit_bytes: None,
        }
    }

    /// Runs `cmd` through the platform shell.
    pub fn shell(cmd: &str, working_dir: &Path, time_limit: Duration) -> Self {
        let (shell, flag) = if cfg!(windows) {
            ("cmd", "/C")
        } else {
            ("sh", "-c")
        };
        let mut request = Self::new(PathBuf::from(shell), working_dir, time_limit);
        request.args = vec![flag.to_owned(), cmd.to_owned()];
        request
    }

    pub fn args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn stdin(mut self, path: PathBuf) -> Self {
        self.stdin = Some(path);
        self
    }

    pub fn stdout(mut self, path: PathBuf) -> Self {
        self.stdout = Some(path);
        self
    }

    pub fn stderr(mut self, path: PathBuf) -> Self {
        self.stderr = Some(path);
        self
    }

    pub fn memory_limit(mut self, bytes: u64) -> Self {
        self.memory_limit_bytes = Some(bytes);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitKind {
    Exited(i32),
    Signaled,
    TimedOut,
    /// Only reported by runners that account memory usage
    MemoryLimitExceeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub exit: ExitKind,
    pub time_usage: Duration,
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        self.exit == ExitKind::Exited(0)
    }
}

/// Process execution layer used by the judgers for compiling, running the
/// submission and running custom checkers.
pub trait Runner: Send + Sync {
    fn run(&self, request: &RunRequest) -> Result<RunOutcome, JudgeCoreError>;
}
