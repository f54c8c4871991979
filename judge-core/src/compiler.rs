use std::{fs, path::Path, time::Duration};

use crate::{
    error::JudgeCoreError,
    problem::Compiler,
    run::{ExitKind, RunRequest, Runner},
};

const COMPILE_STDOUT: &str = "compile.stdout";
const COMPILE_STDERR: &str = "compile.stderr";
const MAX_MESSAGE_LEN: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    Success,
    /// Compiler diagnostics
    Failed(String),
    TimedOut,
}

/// Runs the compiler command inside `work_dir`, where the source file has
/// already been placed.
pub fn compile(
    runner: &dyn Runner,
    compiler: &Compiler,
    work_dir: &Path,
) -> Result<CompileOutcome, JudgeCoreError> {
    let request = RunRequest::shell(
        compiler.cmd(),
        work_dir,
        Duration::from_secs(compiler.time_limit()),
    )
    .stdout(work_dir.join(COMPILE_STDOUT))
    .stderr(work_dir.join(COMPILE_STDERR));
    log::debug!("Compiling with `{}` in {:?}", compiler.cmd(), work_dir);

    let outcome = runner.run(&request)?;
    Ok(match outcome.exit {
        ExitKind::Exited(0) => CompileOutcome::Success,
        ExitKind::TimedOut => CompileOutcome::TimedOut,
        ExitKind::Exited(_) | ExitKind::Signaled | ExitKind::MemoryLimitExceeded => {
            CompileOutcome::Failed(collect_message(work_dir))
        }
    })
}

fn collect_message(work_dir: &Path) -> String {
    let mut message = String::new();
    for name in [COMPILE_STDOUT, COMPILE_STDERR] {
        if let Ok(content) = fs::read(work_dir.join(name)) {
            message.push_str(&String::from_utf8_lossy(&content));
        }
    }
    if message.len() > MAX_MESSAGE_LEN {
        let mut end = MAX_MESSAGE_LEN;
        while !message.is_char_boundary(end) {
            end -= 1;
        }
        message.truncate(end);
        message.push_str("\n...");
    }
    message
}
