use crate::{
    event::JudgeEvent,
    result::{ResultStatus, ResultSummary, TestCaseVerdict},
};

use super::{
    common::{case_info, Session},
    BaseJudger, JudgeInput,
};

/// Checks the answer files the player submitted directly; nothing is compiled
/// or run except a custom checker.
pub struct AnswerOnlyJudger<'a> {
    session: Session<'a>,
}

impl<'a> AnswerOnlyJudger<'a> {
    pub fn new(input: JudgeInput<'a>) -> Self {
        Self {
            session: Session::new(input),
        }
    }
}

impl BaseJudger for AnswerOnlyJudger<'_> {
    fn judge(&mut self) -> ResultSummary {
        let s = &mut self.session;
        s.title();

        let problem = s.problem();
        let source_dir = s.source_path();
        let submitted = problem
            .test_cases()
            .iter()
            .any(|case| source_dir.join(case.submit_file()).is_file());
        if !submitted {
            return s.finish_early(
                ResultStatus::NoSubmission,
                "Submission not found",
                &source_dir.display().to_string(),
            );
        }
        if let Err(e) = s.prepare_work_dir() {
            log::warn!("Failed to prepare {:?}: {}", s.work_path(), e);
        }

        s.judge_cases(|s, idx, case| {
            let answer = source_dir.join(case.submit_file());
            if !answer.is_file() {
                return case_info(
                    idx,
                    TestCaseVerdict::NoOutput,
                    None,
                    format!("{} not submitted", case.submit_file()),
                );
            }
            let checked = s.check(case, &answer);
            case_info(idx, checked.verdict, None, checked.message)
        })
    }

    fn stop_judge(&self) {
        self.session.input.stop.request();
    }

    fn record(&self) -> &[JudgeEvent] {
        self.session.record()
    }
}
