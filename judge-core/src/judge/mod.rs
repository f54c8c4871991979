use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use crate::{
    event::{EventSink, JudgeEvent},
    problem::{Problem, ProblemType},
    result::ResultSummary,
    run::Runner,
};

pub mod answer_only;
pub mod common;
pub mod traditional;

pub use answer_only::AnswerOnlyJudger;
pub use traditional::TraditionalJudger;

/// Cooperative cancellation flag. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What a judger needs to evaluate one player's submission for one problem.
/// The problem is borrowed and never mutated.
pub struct JudgeInput<'a> {
    pub contest_path: &'a Path,
    /// Scratch directory owned by this evaluation
    pub work_path: PathBuf,
    pub player: &'a str,
    pub problem: &'a Problem,
    pub runner: &'a dyn Runner,
    pub events: EventSink,
    pub stop: StopSignal,
}

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::TraditionalJudger<'_> {}
    impl Sealed for super::AnswerOnlyJudger<'_> {}
}

/// Evaluates one submission against one problem.
///
/// `judge` always returns a valid summary: compile failures, missing
/// submissions and per test case failures are part of the result, and a stop
/// request only shortens the run at the next test case boundary.
pub trait BaseJudger: sealed::Sealed {
    fn judge(&mut self) -> ResultSummary;

    /// Asks a running `judge` to return after the current test case.
    fn stop_judge(&self);

    /// Progress events emitted so far, in emission order
    fn record(&self) -> &[JudgeEvent];
}

/// Builds the judger matching the problem type.
pub fn new_judger<'a>(input: JudgeInput<'a>) -> Box<dyn BaseJudger + 'a> {
    match input.problem.problem_type() {
        ProblemType::Traditional => Box::new(TraditionalJudger::new(input)),
        ProblemType::AnswersOnly => Box::new(AnswerOnlyJudger::new(input)),
    }
}
