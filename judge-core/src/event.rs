use crossbeam_channel::Sender;
use serde_derive::{Deserialize, Serialize};

use crate::result::{ResultSummary, ScoreTotal, TestCaseInfo};

/// One (player, problem) judging unit, addressed by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub player: usize,
    pub problem: usize,
}

impl Cell {
    pub fn new(player: usize, problem: usize) -> Self {
        Self { player, problem }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelStyle {
    None,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreDetail {
    pub subtask: usize,
    pub awarded: i64,
    pub max_score: i64,
    /// Sum of the subtasks finished so far
    pub running_score: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JudgeEvent {
    LabelChanged {
        cell: Cell,
        glyph: String,
        text: String,
        style: LabelStyle,
    },
    Title(String),
    Note {
        text: String,
        detail: String,
    },
    PointDetail(TestCaseInfo),
    ScoreDetail(ScoreDetail),
    CellChanged {
        cell: Cell,
        summary: ResultSummary,
    },
    TotalChanged {
        player: usize,
        total: ScoreTotal,
    },
    CellFinished(Cell),
    BatchFinished {
        stopped: bool,
        text: String,
    },
}

/// Fire-and-forget outlet for events. Sending never blocks and a vanished
/// receiver is ignored.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    sender: Option<Sender<JudgeEvent>>,
}

impl EventSink {
    pub fn new(sender: Sender<JudgeEvent>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    pub fn disconnected() -> Self {
        Self { sender: None }
    }

    pub fn emit(&self, event: JudgeEvent) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(event);
        }
    }
}
