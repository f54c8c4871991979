use std::{
    fmt,
    ops::{AddAssign, SubAssign},
    time::Duration,
};

use serde_derive::{Deserialize, Serialize};

/// Terminal outcome of one test case.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TestCaseVerdict {
    Accepted,
    /// Ratio in `[0, 1]` reported by the checker
    PartiallyCorrect(f64),
    WrongAnswer,
    PresentationError,
    TimeLimitExceeded,
    MemoryLimitExceeded,
    RuntimeError,
    CheckerError,
    /// The program (or the contestant, for answer-only problems) produced no output file
    NoOutput,
    Skipped,
}

impl TestCaseVerdict {
    pub fn ratio(&self) -> f64 {
        match self {
            TestCaseVerdict::Accepted => 1.0,
            TestCaseVerdict::PartiallyCorrect(ratio) => ratio.clamp(0.0, 1.0),
            _ => 0.0,
        }
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            TestCaseVerdict::Accepted => "AC",
            TestCaseVerdict::PartiallyCorrect(_) => "PC",
            TestCaseVerdict::WrongAnswer => "WA",
            TestCaseVerdict::PresentationError => "PE",
            TestCaseVerdict::TimeLimitExceeded => "TLE",
            TestCaseVerdict::MemoryLimitExceeded => "MLE",
            TestCaseVerdict::RuntimeError => "RE",
            TestCaseVerdict::CheckerError => "CKE",
            TestCaseVerdict::NoOutput => "NO",
            TestCaseVerdict::Skipped => "SKIP",
        }
    }
}

impl fmt::Display for TestCaseVerdict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Per test case detail streamed while a cell is judged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseInfo {
    pub index: usize,
    pub verdict: TestCaseVerdict,
    pub time_usage: Option<Duration>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultStatus {
    #[default]
    Untested,
    Judged,
    /// Judging was stopped between test cases; the score covers finished work only
    Stopped,
    NoSubmission,
    CompileError,
    CodeLengthExceeded,
}

/// Outcome of judging one (player, problem) cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub score: i64,
    pub max_score: i64,
    pub status: ResultStatus,
}

impl ResultSummary {
    pub fn new(score: i64, max_score: i64, status: ResultStatus) -> Self {
        Self {
            score,
            max_score,
            status,
        }
    }

    pub fn untested() -> Self {
        Self::default()
    }

    pub fn is_untested(&self) -> bool {
        self.status == ResultStatus::Untested
    }

    fn judged_count(&self) -> i64 {
        if self.is_untested() {
            0
        } else {
            1
        }
    }
}

/// Running total of a player's cells. Adding and subtracting the same summary
/// is exact, so a stale result can be swapped for a fresh one without drift.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreTotal {
    pub score: i64,
    pub max_score: i64,
    pub judged: i64,
}

impl ScoreTotal {
    pub fn is_untested(&self) -> bool {
        self.judged == 0
    }
}

impl AddAssign<&ResultSummary> for ScoreTotal {
    fn add_assign(&mut self, res: &ResultSummary) {
        self.score += res.score;
        self.max_score += res.max_score;
        self.judged += res.judged_count();
    }
}

impl SubAssign<&ResultSummary> for ScoreTotal {
    fn sub_assign(&mut self, res: &ResultSummary) {
        self.score -= res.score;
        self.max_score -= res.max_score;
        self.judged -= res.judged_count();
    }
}
