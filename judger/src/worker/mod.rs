use std::{
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use judge_core::{
    event::{Cell, EventSink, JudgeEvent, LabelStyle},
    judge::{new_judger, JudgeInput},
    run::Runner,
};

use crate::{
    contest::{Contest, Scoreboard},
    context::{BatchGuard, JudgeContext},
    error::JudgerError,
    report,
};

pub const FINISHED_TEXT: &str = "- Judging finished -";
pub const STOPPED_TEXT: &str = "- Judging stopped -";

/// What a batch judges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JudgeTask {
    /// Every problem of one player, in the contest's problem order. All cells
    /// of the row are cleaned before the first one is judged.
    Player(usize),
    /// Explicit cells in the given order, each cleaned right before judging.
    Cells(Vec<Cell>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub stopped: bool,
    /// Cells that produced a result, in judging order
    pub finished: Vec<Cell>,
}

pub struct JudgeWorker {
    contest: Arc<Contest>,
    board: Arc<Scoreboard>,
    context: Arc<JudgeContext>,
    runner: Arc<dyn Runner>,
    events: EventSink,
    task: JudgeTask,
    stop_after: Option<usize>,
}

impl JudgeWorker {
    pub fn new(
        contest: Arc<Contest>,
        board: Arc<Scoreboard>,
        context: Arc<JudgeContext>,
        runner: Arc<dyn Runner>,
        events: EventSink,
        task: JudgeTask,
    ) -> Self {
        Self {
            contest,
            board,
            context,
            runner,
            events,
            task,
            stop_after: None,
        }
    }

    /// Requests a stop once `cells` cells have finished, at the same boundary
    /// where a host stop is honoured, so the next cell never starts.
    pub fn stop_after(mut self, cells: usize) -> Self {
        self.stop_after = Some(cells);
        self
    }

    /// Cells the task resolves to, in judging order
    pub fn targets(&self) -> Vec<Cell> {
        match &self.task {
            JudgeTask::Player(player) => self
                .contest
                .problem_order()
                .iter()
                .map(|&problem| Cell::new(*player, problem))
                .collect(),
            JudgeTask::Cells(cells) => cells.clone(),
        }
    }

    /// Rejects the batch before anything is touched: unknown cells, a missing
    /// source root or a problem that cannot be judged.
    pub fn validate(&self) -> Result<(), JudgerError> {
        let targets = self.targets();
        if let JudgeTask::Player(player) = self.task {
            if self.contest.player_name(player).is_none() {
                return Err(JudgerError::InvalidCell { player, problem: 0 });
            }
        }
        if let Some(cell) = targets.iter().find(|c| !self.contest.contains(c)) {
            return Err(JudgerError::InvalidCell {
                player: cell.player,
                problem: cell.problem,
            });
        }
        let source_root = self.contest.source_root();
        if !targets.is_empty() && !source_root.is_dir() {
            return Err(JudgerError::MissingSourceRoot(source_root));
        }
        for cell in targets.iter() {
            if let Some(problem) = self.contest.problem(cell.problem) {
                problem
                    .validate()
                    .map_err(|e| JudgerError::Configuration {
                        problem: problem.name().to_owned(),
                        reason: e.to_string(),
                    })?;
            }
        }
        Ok(())
    }

    /// Validates, claims the context and judges the batch on a new thread.
    pub fn spawn(self) -> Result<JudgeHandle, JudgerError> {
        self.validate()?;
        let guard = self.context.begin_batch()?;
        let (done_sender, done) = crossbeam_channel::bounded(1);
        let thread = thread::Builder::new()
            .name("judge-worker".to_owned())
            .spawn(move || {
                let outcome = self.execute(guard);
                let _ = done_sender.send(outcome);
            })?;
        Ok(JudgeHandle {
            done,
            thread: Some(thread),
            outcome: None,
            finished: false,
        })
    }

    /// Same as `spawn` but judges on the calling thread.
    pub fn run_blocking(self) -> Result<BatchOutcome, JudgerError> {
        self.validate()?;
        let guard = self.context.begin_batch()?;
        Ok(self.execute(guard))
    }

    fn execute(&self, guard: BatchGuard) -> BatchOutcome {
        let targets = self.targets();
        log::info!("Judge batch started with {} cells", targets.len());

        if let JudgeTask::Player(_) = self.task {
            for &cell in targets.iter() {
                self.clean_cell(cell);
            }
        }

        let mut finished = vec![];
        for &cell in targets.iter() {
            if let JudgeTask::Cells(_) = self.task {
                self.clean_cell(cell);
            }
            self.judge_cell(cell);
            finished.push(cell);
            self.events.emit(JudgeEvent::CellFinished(cell));
            if self.stop_after.map_or(false, |n| finished.len() >= n) {
                self.context.request_stop();
            }
            if self.context.is_stop_requested() {
                log::info!("Judge batch stopped after {} cells", finished.len());
                break;
            }
        }

        let stopped = self.context.is_stop_requested();
        let text = if stopped { STOPPED_TEXT } else { FINISHED_TEXT };
        // Listeners of BatchFinished must already see the context idle
        drop(guard);
        self.events.emit(JudgeEvent::BatchFinished {
            stopped,
            text: text.to_owned(),
        });
        log::info!("{}", text);
        BatchOutcome { stopped, finished }
    }

    /// Returns the cell to Untested and deletes its artifact. Safe to repeat.
    fn clean_cell(&self, cell: Cell) {
        self.events.emit(JudgeEvent::LabelChanged {
            cell,
            glyph: String::new(),
            text: "Untested".to_owned(),
            style: LabelStyle::None,
        });
        if let Some(total) = self.board.reset_cell(cell) {
            self.events.emit(JudgeEvent::TotalChanged {
                player: cell.player,
                total,
            });
        }
        if let Err(e) = report::remove_cell_artifact(&self.contest, cell) {
            log::warn!("Failed to remove artifact of {:?}: {}", cell, e);
        }
    }

    fn judge_cell(&self, cell: Cell) {
        let (player, problem) = match (
            self.contest.player_name(cell.player),
            self.contest.problem(cell.problem),
        ) {
            (Some(player), Some(problem)) => (player, problem),
            _ => return,
        };
        log::info!("Judging {} / {}", player, problem.name());
        self.events.emit(JudgeEvent::LabelChanged {
            cell,
            glyph: "~".to_owned(),
            text: "Judging...".to_owned(),
            style: LabelStyle::Running,
        });

        let (summary, details) = {
            let mut judger = new_judger(JudgeInput {
                contest_path: self.contest.path(),
                work_path: self.contest.work_path(player, problem),
                player,
                problem,
                runner: self.runner.as_ref(),
                events: self.events.clone(),
                stop: self.context.stop_signal(),
            });
            let summary = judger.judge();
            (summary, judger.record().to_vec())
        };
        log::info!(
            "{} / {}: {} of {} ({:?})",
            player,
            problem.name(),
            summary.score,
            summary.max_score,
            summary.status
        );

        if let Some(total) = self.board.set_cell(cell, summary) {
            self.events.emit(JudgeEvent::CellChanged { cell, summary });
            self.events.emit(JudgeEvent::TotalChanged {
                player: cell.player,
                total,
            });
        }
        if let Err(e) = report::save_cell_artifact(&self.contest, cell, summary, details) {
            log::warn!("Failed to save artifact of {:?}: {}", cell, e);
        }
        if let Err(e) = report::save_player_report(&self.contest, &self.board, cell.player) {
            log::warn!("Failed to save report of {}: {}", player, e);
        }
    }
}

/// Host side of a spawned batch.
pub struct JudgeHandle {
    done: Receiver<BatchOutcome>,
    thread: Option<JoinHandle<()>>,
    outcome: Option<BatchOutcome>,
    finished: bool,
}

impl JudgeHandle {
    /// Waits up to `timeout` and reports whether the worker has finished.
    pub fn wait_for_finished(&mut self, timeout: Duration) -> bool {
        if self.finished {
            return true;
        }
        match self.done.recv_timeout(timeout) {
            Ok(outcome) => {
                self.outcome = Some(outcome);
                self.finished = true;
            }
            // Sender dropped without a result: the worker panicked
            Err(RecvTimeoutError::Disconnected) => self.finished = true,
            Err(RecvTimeoutError::Timeout) => {}
        }
        self.finished
    }

    /// Blocks until the worker is done.
    pub fn join(mut self) -> Result<BatchOutcome, JudgerError> {
        let outcome = match self.outcome.take() {
            Some(outcome) => Some(outcome),
            None => self.done.recv().ok(),
        };
        if let Some(thread) = self.thread.take() {
            thread.join().map_err(|_| JudgerError::WorkerPanicked)?;
        }
        outcome.ok_or(JudgerError::WorkerPanicked)
    }
}
