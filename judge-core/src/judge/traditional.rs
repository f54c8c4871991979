use std::{fs, path::Path, path::PathBuf, time::Duration};

use crate::{
    checker::add_exe_suffix,
    compiler::{compile, CompileOutcome},
    event::JudgeEvent,
    problem::TestCase,
    result::{ResultStatus, ResultSummary, TestCaseInfo, TestCaseVerdict},
    run::{ExitKind, RunRequest},
    utils::remove_file_if_exists,
};

use super::{
    common::{case_info, Session},
    BaseJudger, JudgeInput,
};

const STDOUT_FILE: &str = "stdout";

/// Compiles the player's source, runs it on every test case and compares the
/// produced output with the answer.
pub struct TraditionalJudger<'a> {
    session: Session<'a>,
}

impl<'a> TraditionalJudger<'a> {
    pub fn new(input: JudgeInput<'a>) -> Self {
        Self {
            session: Session::new(input),
        }
    }

    /// Returns the compiled executable or the summary to finish with.
    fn build(&mut self) -> Result<PathBuf, ResultSummary> {
        let s = &mut self.session;
        let problem = s.problem();
        let source_dir = s.source_path();

        let compiler = match problem.compiler_for(&source_dir) {
            Some(compiler) => compiler,
            None => {
                return Err(s.finish_early(
                    ResultStatus::NoSubmission,
                    "Source file not found",
                    &source_dir.display().to_string(),
                ))
            }
        };
        let source = source_dir.join(compiler.source_file());

        let source_len = fs::metadata(&source).map(|m| m.len()).unwrap_or(0);
        if source_len as f64 / 1024.0 > problem.code_length_limit() {
            return Err(s.finish_early(
                ResultStatus::CodeLengthExceeded,
                "Code length limit exceeded",
                &format!(
                    "{:.2} KiB > {:.2} KiB",
                    source_len as f64 / 1024.0,
                    problem.code_length_limit()
                ),
            ));
        }

        let prepared = s.prepare_work_dir().and_then(|_| {
            fs::copy(&source, s.work_path().join(compiler.source_file()))?;
            Ok(())
        });
        if let Err(e) = prepared {
            log::warn!("Failed to prepare {:?}: {}", s.work_path(), e);
            return Err(s.finish_early(
                ResultStatus::CompileError,
                "Failed to prepare working directory",
                &e.to_string(),
            ));
        }

        s.note("Compiling", compiler.cmd());
        let outcome = compile(s.input.runner, compiler, s.work_path());
        match outcome {
            Ok(CompileOutcome::Success) => {}
            Ok(CompileOutcome::Failed(message)) => {
                return Err(s.finish_early(ResultStatus::CompileError, "Compile error", &message))
            }
            Ok(CompileOutcome::TimedOut) => {
                return Err(s.finish_early(
                    ResultStatus::CompileError,
                    "Compile time limit exceeded",
                    &format!("{} s", compiler.time_limit()),
                ))
            }
            Err(e) => {
                return Err(s.finish_early(
                    ResultStatus::CompileError,
                    "Failed to run compiler",
                    &e.to_string(),
                ))
            }
        }

        let executable = s
            .work_path()
            .join(add_exe_suffix(problem.executable_file()));
        if !executable.is_file() {
            return Err(s.finish_early(
                ResultStatus::CompileError,
                "Executable not produced",
                &executable.display().to_string(),
            ));
        }
        Ok(executable)
    }
}

fn run_case(s: &mut Session, executable: &Path, idx: usize, case: &TestCase) -> TestCaseInfo {
    let problem = s.problem();
    let input = s.data_path().join(case.in_file());
    let time_limit = match Duration::try_from_secs_f64(case.time_limit()) {
        Ok(limit) => limit,
        Err(e) => {
            return case_info(
                idx,
                TestCaseVerdict::RuntimeError,
                None,
                format!("invalid time limit {}: {}", case.time_limit(), e),
            )
        }
    };
    let mut request = RunRequest::new(executable.to_path_buf(), s.work_path(), time_limit)
        .memory_limit((case.memory_limit() * 1024.0 * 1024.0) as u64);

    let output = if problem.in_file().is_empty() {
        let output = s.work_path().join(STDOUT_FILE);
        request = request.stdin(input).stdout(output.clone());
        output
    } else {
        if let Err(e) = fs::copy(&input, s.work_path().join(problem.in_file())) {
            return case_info(
                idx,
                TestCaseVerdict::RuntimeError,
                None,
                format!("failed to provide input file: {}", e),
            );
        }
        s.work_path().join(problem.out_file())
    };
    if let Err(e) = remove_file_if_exists(&output) {
        log::warn!("Failed to remove stale output {:?}: {}", output, e);
    }

    let outcome = match s.input.runner.run(&request) {
        Ok(outcome) => outcome,
        Err(e) => {
            return case_info(
                idx,
                TestCaseVerdict::RuntimeError,
                None,
                format!("failed to start program: {}", e),
            )
        }
    };
    let time = Some(outcome.time_usage);

    match outcome.exit {
        ExitKind::TimedOut => case_info(idx, TestCaseVerdict::TimeLimitExceeded, time, ""),
        _ if outcome.time_usage > time_limit => {
            case_info(idx, TestCaseVerdict::TimeLimitExceeded, time, "")
        }
        ExitKind::MemoryLimitExceeded => {
            case_info(idx, TestCaseVerdict::MemoryLimitExceeded, time, "")
        }
        ExitKind::Signaled => case_info(
            idx,
            TestCaseVerdict::RuntimeError,
            time,
            "terminated by signal",
        ),
        ExitKind::Exited(code) if code != 0 => case_info(
            idx,
            TestCaseVerdict::RuntimeError,
            time,
            format!("exit code {}", code),
        ),
        ExitKind::Exited(_) if !output.is_file() => case_info(
            idx,
            TestCaseVerdict::NoOutput,
            time,
            "output file not found",
        ),
        ExitKind::Exited(_) => {
            let checked = s.check(case, &output);
            case_info(idx, checked.verdict, time, checked.message)
        }
    }
}

impl BaseJudger for TraditionalJudger<'_> {
    fn judge(&mut self) -> ResultSummary {
        self.session.title();
        let executable = match self.build() {
            Ok(executable) => executable,
            Err(summary) => return summary,
        };
        self.session
            .judge_cases(|s, idx, case| run_case(s, &executable, idx, case))
    }

    fn stop_judge(&self) {
        self.session.input.stop.request();
    }

    fn record(&self) -> &[JudgeEvent] {
        self.session.record()
    }
}
