use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    checker::{self, CheckOutcome},
    error::JudgeCoreError,
    event::{JudgeEvent, ScoreDetail},
    problem::{Problem, TestCase},
    result::{ResultStatus, ResultSummary, TestCaseInfo, TestCaseVerdict},
    run::{ExitKind, RunRequest},
    utils::{absolute_path, get_pathbuf_str},
};

use super::JudgeInput;

const CHECKER_REPORT: &str = "checker.report";

/// State shared by both judger variants: the borrowed input, the record of
/// everything reported and the resolved directories.
pub struct Session<'a> {
    pub input: JudgeInput<'a>,
    record: Vec<JudgeEvent>,
    data_path: PathBuf,
    work_path: PathBuf,
}

impl<'a> Session<'a> {
    pub fn new(input: JudgeInput<'a>) -> Self {
        let data_path = input.problem.data_path(input.contest_path);
        let data_path = absolute_path(&data_path).unwrap_or(data_path);
        let work_path =
            absolute_path(&input.work_path).unwrap_or_else(|_| input.work_path.clone());
        Self {
            input,
            record: vec![],
            data_path,
            work_path,
        }
    }

    pub fn problem(&self) -> &'a Problem {
        self.input.problem
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub fn work_path(&self) -> &Path {
        &self.work_path
    }

    /// Player's submission directory for this problem
    pub fn source_path(&self) -> PathBuf {
        let path = self
            .problem()
            .source_path(self.input.contest_path, self.input.player);
        absolute_path(&path).unwrap_or(path)
    }

    pub fn record(&self) -> &[JudgeEvent] {
        &self.record
    }

    pub fn report(&mut self, event: JudgeEvent) {
        self.record.push(event.clone());
        self.input.events.emit(event);
    }

    pub fn title(&mut self) {
        let problem = self.problem();
        let title = format!(
            "{} ({}) - {}",
            problem.name(),
            problem.builtin_checker_name(),
            self.input.player
        );
        self.report(JudgeEvent::Title(title));
    }

    pub fn note(&mut self, text: &str, detail: &str) {
        log::debug!("[{}/{}] {}", self.input.player, self.problem().name(), text);
        self.report(JudgeEvent::Note {
            text: text.to_owned(),
            detail: detail.to_owned(),
        });
    }

    /// Finishes the cell without evaluating any test case.
    pub fn finish_early(
        &mut self,
        status: ResultStatus,
        text: &str,
        detail: &str,
    ) -> ResultSummary {
        self.note(text, detail);
        ResultSummary::new(0, self.problem().score(), status)
    }

    pub fn prepare_work_dir(&self) -> Result<(), JudgeCoreError> {
        crate::utils::prepare_dir(&self.work_path)?;
        Ok(())
    }

    /// Evaluates the test cases in declaration order and folds the verdicts
    /// into subtask scores.
    ///
    /// A subtask awards `floor(score * r)` where `r` is the lowest ratio among
    /// its cases. Cases that only feed subtasks already at zero are skipped.
    /// A stop request is honoured before each case; unfinished subtasks award
    /// nothing.
    pub fn judge_cases<F>(&mut self, mut evaluate: F) -> ResultSummary
    where
        F: FnMut(&mut Self, usize, &'a TestCase) -> TestCaseInfo,
    {
        let problem = self.problem();
        let subtasks = problem.subtasks();
        let mut owners: Vec<Vec<usize>> = vec![vec![]; problem.test_cases().len()];
        for (s, subtask) in subtasks.iter().enumerate() {
            for &c in subtask.cases() {
                if let Some(owner) = owners.get_mut(c) {
                    owner.push(s);
                }
            }
        }
        let mut remaining: Vec<usize> = subtasks.iter().map(|s| s.size()).collect();
        let mut ratios: Vec<f64> = vec![1.0; subtasks.len()];
        let mut running_score = 0;
        let mut stopped = false;

        for (idx, case) in problem.test_cases().iter().enumerate() {
            if self.input.stop.is_requested() {
                log::info!(
                    "Stop requested, leaving {} before test case {}",
                    problem.name(),
                    idx + 1
                );
                stopped = true;
                break;
            }

            let skip = !owners[idx].is_empty() && owners[idx].iter().all(|&s| ratios[s] <= 0.0);
            let info = if skip {
                TestCaseInfo {
                    index: idx,
                    verdict: TestCaseVerdict::Skipped,
                    time_usage: None,
                    message: String::from("skipped, subtask already failed"),
                }
            } else {
                evaluate(self, idx, case)
            };
            let ratio = info.verdict.ratio();
            self.report(JudgeEvent::PointDetail(info));

            for &s in &owners[idx] {
                ratios[s] = ratios[s].min(ratio);
                remaining[s] -= 1;
                if remaining[s] == 0 {
                    let max_score = subtasks[s].score();
                    let awarded = (max_score as f64 * ratios[s] + 1e-9).floor() as i64;
                    running_score += awarded;
                    self.report(JudgeEvent::ScoreDetail(ScoreDetail {
                        subtask: s,
                        awarded,
                        max_score,
                        running_score,
                    }));
                }
            }
        }

        let status = if stopped {
            ResultStatus::Stopped
        } else {
            ResultStatus::Judged
        };
        let summary = ResultSummary::new(running_score, problem.score(), status);
        let text = if stopped { "Stopped" } else { "Finished" };
        self.note(
            text,
            &format!("score {} / {}", summary.score, summary.max_score),
        );
        summary
    }

    /// Compares `output` with the case's answer using the problem's checker.
    pub fn check(&self, case: &TestCase, output: &Path) -> CheckOutcome {
        let input = self.data_path.join(case.in_file());
        let answer = self.data_path.join(case.out_file());
        let problem = self.problem();

        if let Some(builtin) = checker::find_builtin(problem.checker()) {
            return checker::check_builtin(builtin, output, &answer).unwrap_or_else(|e| {
                CheckOutcome {
                    verdict: TestCaseVerdict::CheckerError,
                    message: format!("failed to read files: {}", e),
                }
            });
        }

        match self.run_custom_checker(&input, output, &answer) {
            Ok(outcome) => outcome,
            Err(e) => CheckOutcome {
                verdict: TestCaseVerdict::CheckerError,
                message: format!("failed to run checker: {}", e),
            },
        }
    }

    fn run_custom_checker(
        &self,
        input: &Path,
        output: &Path,
        answer: &Path,
    ) -> Result<CheckOutcome, JudgeCoreError> {
        let problem = self.problem();
        let checker_path = absolute_path(&problem.checker_path(self.input.contest_path))?;
        let report_path = self.work_path.join(CHECKER_REPORT);
        crate::utils::remove_file_if_exists(&report_path)?;

        let request = RunRequest::new(
            checker_path,
            &self.work_path,
            Duration::from_secs(problem.checker_time_limit()),
        )
        .args(vec![
            get_pathbuf_str(input)?,
            get_pathbuf_str(output)?,
            get_pathbuf_str(answer)?,
            get_pathbuf_str(&report_path)?,
        ]);
        let outcome = self.input.runner.run(&request)?;
        let report = fs::read_to_string(&report_path).unwrap_or_default();
        Ok(match outcome.exit {
            ExitKind::TimedOut => CheckOutcome {
                verdict: TestCaseVerdict::CheckerError,
                message: String::from("checker time limit exceeded"),
            },
            ExitKind::Exited(code) => checker::interpret_checker_exit(Some(code), &report),
            ExitKind::Signaled | ExitKind::MemoryLimitExceeded => {
                checker::interpret_checker_exit(None, &report)
            }
        })
    }
}

pub fn case_info(
    index: usize,
    verdict: TestCaseVerdict,
    time_usage: Option<Duration>,
    message: impl Into<String>,
) -> TestCaseInfo {
    TestCaseInfo {
        index,
        verdict,
        time_usage,
        message: message.into(),
    }
}
