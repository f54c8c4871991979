use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use crossbeam_channel::Receiver;
use judge_core::{
    error::JudgeCoreError,
    event::{Cell, EventSink, JudgeEvent, LabelStyle},
    problem::{Problem, ProblemType},
    result::ResultStatus,
    run::{ExitKind, RunOutcome, RunRequest, Runner},
};
use judger::{
    contest::{Contest, Scoreboard},
    context::JudgeContext,
    error::JudgerError,
    report,
    worker::{JudgeTask, JudgeWorker, FINISHED_TEXT, STOPPED_TEXT},
};

const TEST_TEMP_PATH: &str = "tests/temp";

const ALICE: usize = 0;
const BOB: usize = 1;
const P1: usize = 0;
const P2: usize = 1;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Accepts every custom checker call and can request a stop while doing so.
struct CheckerRunner {
    stop_context: Option<Arc<JudgeContext>>,
    calls: AtomicUsize,
}

impl CheckerRunner {
    fn new(stop_context: Option<Arc<JudgeContext>>) -> Self {
        Self {
            stop_context,
            calls: AtomicUsize::new(0),
        }
    }
}

impl Runner for CheckerRunner {
    fn run(&self, _request: &RunRequest) -> Result<RunOutcome, JudgeCoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(context) = &self.stop_context {
            context.request_stop();
        }
        Ok(RunOutcome {
            exit: ExitKind::Exited(0),
            time_usage: Duration::ZERO,
        })
    }
}

fn write(path: PathBuf, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn answers_only(root: &Path, name: &str) -> Problem {
    let mut problem = Problem::new(name);
    problem.set_type(ProblemType::AnswersOnly);
    problem.reset_test_cases(root, 1.0, 256.0).unwrap();
    problem
}

/// Two answers-only problems with two cases worth 50 each.
/// alice: p1 100, p2 50. bob: p1 missing, p2 100.
fn setup(name: &str) -> Contest {
    let root = PathBuf::from(TEST_TEMP_PATH).join(name);
    if root.exists() {
        fs::remove_dir_all(&root).unwrap();
    }
    for problem in ["p1", "p2"] {
        for (stem, answer) in [("1", "1\n"), ("2", "2\n")] {
            write(root.join(format!("data/{}/{}.in", problem, stem)), "");
            write(root.join(format!("data/{}/{}.out", problem, stem)), answer);
        }
    }
    write(root.join("src/alice/p1/1.out"), "1\n");
    write(root.join("src/alice/p1/2.out"), "2\n");
    write(root.join("src/alice/p2/1.out"), "1\n");
    write(root.join("src/alice/p2/2.out"), "3\n");
    write(root.join("src/bob/p2/1.out"), "1\n");
    write(root.join("src/bob/p2/2.out"), "2\n");

    let problems = vec![answers_only(&root, "p1"), answers_only(&root, "p2")];
    Contest::new(&root, problems, vec!["alice".to_owned(), "bob".to_owned()])
}

struct Harness {
    contest: Arc<Contest>,
    board: Arc<Scoreboard>,
    context: Arc<JudgeContext>,
    runner: Arc<CheckerRunner>,
}

impl Harness {
    fn new(contest: Contest) -> Self {
        let board = Arc::new(Scoreboard::new(&contest));
        Self {
            contest: Arc::new(contest),
            board,
            context: JudgeContext::new(),
            runner: Arc::new(CheckerRunner::new(None)),
        }
    }

    fn worker(&self, task: JudgeTask) -> (JudgeWorker, Receiver<JudgeEvent>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let worker = JudgeWorker::new(
            self.contest.clone(),
            self.board.clone(),
            self.context.clone(),
            self.runner.clone(),
            EventSink::new(sender),
            task,
        );
        (worker, receiver)
    }
}

fn finished_cells(events: &[JudgeEvent]) -> Vec<Cell> {
    events
        .iter()
        .filter_map(|e| match e {
            JudgeEvent::CellFinished(cell) => Some(*cell),
            _ => None,
        })
        .collect()
}

#[test]
fn test_judge_player_row() {
    init();
    let harness = Harness::new(setup("worker_player_row"));
    let (worker, receiver) = harness.worker(JudgeTask::Player(ALICE));
    let outcome = worker.run_blocking().unwrap();
    let events: Vec<JudgeEvent> = receiver.try_iter().collect();

    assert!(!outcome.stopped);
    assert_eq!(outcome.finished, vec![Cell::new(ALICE, P1), Cell::new(ALICE, P2)]);
    assert_eq!(finished_cells(&events), outcome.finished);
    assert_eq!(
        events.last(),
        Some(&JudgeEvent::BatchFinished {
            stopped: false,
            text: FINISHED_TEXT.to_owned()
        })
    );

    // Both cells are cleaned before the first one is judged
    let labels: Vec<(Cell, &str)> = events
        .iter()
        .filter_map(|e| match e {
            JudgeEvent::LabelChanged { cell, text, .. } => Some((*cell, text.as_str())),
            _ => None,
        })
        .collect();
    assert_eq!(
        labels,
        vec![
            (Cell::new(ALICE, P1), "Untested"),
            (Cell::new(ALICE, P2), "Untested"),
            (Cell::new(ALICE, P1), "Judging..."),
            (Cell::new(ALICE, P2), "Judging..."),
        ]
    );

    let p1 = harness.board.cell(Cell::new(ALICE, P1)).unwrap();
    assert_eq!((p1.score, p1.status), (100, ResultStatus::Judged));
    let p2 = harness.board.cell(Cell::new(ALICE, P2)).unwrap();
    assert_eq!(p2.score, 50);
    let total = harness.board.total(ALICE).unwrap();
    assert_eq!((total.score, total.max_score, total.judged), (150, 200, 2));
    assert!(harness.board.total(BOB).unwrap().is_untested());
    assert!(!harness.context.is_judging());

    let artifact = report::load_cell_artifact(&harness.contest, Cell::new(ALICE, P2)).unwrap();
    assert_eq!(artifact.summary, p2);
    assert!(matches!(artifact.details.first(), Some(JudgeEvent::Title(_))));
    assert!(report::player_report_path(&harness.contest, "alice").is_file());
    assert_eq!(harness.runner.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_explicit_cells_keep_order() {
    init();
    let harness = Harness::new(setup("worker_explicit_cells"));
    let cells = vec![Cell::new(BOB, P2), Cell::new(ALICE, P1), Cell::new(BOB, P1)];
    let (worker, receiver) = harness.worker(JudgeTask::Cells(cells.clone()));
    let outcome = worker.run_blocking().unwrap();
    let events: Vec<JudgeEvent> = receiver.try_iter().collect();

    assert_eq!(outcome.finished, cells);
    assert_eq!(finished_cells(&events), cells);

    // Each cell is cleaned right before it is judged
    let first_running = events.iter().position(|e| {
        matches!(e, JudgeEvent::LabelChanged { style: LabelStyle::Running, .. })
    });
    let second_clean = events
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, JudgeEvent::LabelChanged { style: LabelStyle::None, .. }))
        .nth(1)
        .map(|(idx, _)| idx);
    assert!(first_running.unwrap() < second_clean.unwrap());

    let missing = harness.board.cell(Cell::new(BOB, P1)).unwrap();
    assert_eq!(missing.status, ResultStatus::NoSubmission);
    assert_eq!((missing.score, missing.max_score), (0, 100));
    let total = harness.board.total(BOB).unwrap();
    assert_eq!((total.score, total.max_score, total.judged), (100, 200, 2));
    let total = harness.board.total(ALICE).unwrap();
    assert_eq!((total.score, total.max_score, total.judged), (100, 100, 1));
}

#[test]
fn test_rejudge_replaces_previous_result() {
    init();
    let harness = Harness::new(setup("worker_rejudge"));
    let all = harness.contest.all_cells();
    for _ in 0..2 {
        let (worker, _receiver) = harness.worker(JudgeTask::Cells(all.clone()));
        worker.run_blocking().unwrap();
        let total = harness.board.total(ALICE).unwrap();
        assert_eq!((total.score, total.max_score, total.judged), (150, 200, 2));
    }

    fs::write(
        harness.contest.path().join("src/alice/p2/2.out"),
        "2\n",
    )
    .unwrap();
    let (worker, _receiver) = harness.worker(JudgeTask::Cells(vec![Cell::new(ALICE, P2)]));
    worker.run_blocking().unwrap();
    let total = harness.board.total(ALICE).unwrap();
    assert_eq!((total.score, total.max_score, total.judged), (200, 200, 2));

    fs::remove_dir_all(harness.contest.path().join("src/alice/p2")).unwrap();
    let (worker, _receiver) = harness.worker(JudgeTask::Cells(vec![Cell::new(ALICE, P2)]));
    worker.run_blocking().unwrap();
    let total = harness.board.total(ALICE).unwrap();
    assert_eq!((total.score, total.max_score, total.judged), (100, 200, 2));
    let artifact = report::load_cell_artifact(&harness.contest, Cell::new(ALICE, P2)).unwrap();
    assert_eq!(artifact.summary.status, ResultStatus::NoSubmission);
}

#[test]
fn test_stop_after_first_cell() {
    init();
    let mut contest = setup("worker_stop");
    let root = contest.path().to_path_buf();
    let mut problems = contest.problems().to_vec();
    problems[P1].set_checker("chk");
    contest = Contest::new(&root, problems, contest.players().to_vec());

    let mut harness = Harness::new(contest);
    harness.runner = Arc::new(CheckerRunner::new(Some(harness.context.clone())));
    let cells = vec![Cell::new(ALICE, P1), Cell::new(ALICE, P2), Cell::new(BOB, P2)];
    let (worker, receiver) = harness.worker(JudgeTask::Cells(cells));
    let mut handle = worker.spawn().unwrap();

    let events: Vec<JudgeEvent> = receiver.iter().collect();
    assert!(handle.wait_for_finished(Duration::from_secs(10)));
    let outcome = handle.join().unwrap();

    assert!(outcome.stopped);
    assert_eq!(outcome.finished, vec![Cell::new(ALICE, P1)]);
    assert_eq!(finished_cells(&events), outcome.finished);
    assert_eq!(
        events.last(),
        Some(&JudgeEvent::BatchFinished {
            stopped: true,
            text: STOPPED_TEXT.to_owned()
        })
    );

    // The interrupted cell still holds a valid result, later cells stay untested
    let first = harness.board.cell(Cell::new(ALICE, P1)).unwrap();
    assert_eq!(first.status, ResultStatus::Stopped);
    assert_eq!(first.max_score, 100);
    assert!(harness.board.cell(Cell::new(ALICE, P2)).unwrap().is_untested());
    assert!(harness.board.total(BOB).unwrap().is_untested());
    assert_eq!(harness.runner.calls.load(Ordering::SeqCst), 1);
    assert!(!harness.context.is_judging());
}

#[test]
fn test_cell_limit_stops_before_next_cell() {
    init();
    let harness = Harness::new(setup("worker_cell_limit"));
    let cells = vec![Cell::new(ALICE, P1), Cell::new(ALICE, P2), Cell::new(BOB, P2)];
    let (worker, receiver) = harness.worker(JudgeTask::Cells(cells));
    let mut handle = worker.stop_after(1).spawn().unwrap();
    let events: Vec<JudgeEvent> = receiver.iter().collect();
    assert!(handle.wait_for_finished(Duration::from_secs(10)));
    let outcome = handle.join().unwrap();

    assert!(outcome.stopped);
    assert_eq!(outcome.finished, vec![Cell::new(ALICE, P1)]);
    assert_eq!(finished_cells(&events), outcome.finished);
    let first = harness.board.cell(Cell::new(ALICE, P1)).unwrap();
    assert_eq!((first.score, first.status), (100, ResultStatus::Judged));
    // The second cell is never started, not even cleaned
    assert!(!events.iter().any(|e| matches!(
        e,
        JudgeEvent::LabelChanged { cell, .. } if *cell == Cell::new(ALICE, P2)
    )));
    assert!(harness.board.cell(Cell::new(ALICE, P2)).unwrap().is_untested());
    assert!(harness.board.total(BOB).unwrap().is_untested());
}

#[test]
fn test_single_active_batch() {
    init();
    let harness = Harness::new(setup("worker_single_batch"));
    let guard = harness.context.begin_batch().unwrap();
    let (worker, _receiver) = harness.worker(JudgeTask::Player(BOB));
    assert!(matches!(
        worker.spawn(),
        Err(JudgerError::BatchAlreadyRunning)
    ));
    assert!(harness.board.total(BOB).unwrap().is_untested());
    drop(guard);

    let (worker, receiver) = harness.worker(JudgeTask::Player(BOB));
    let mut handle = worker.spawn().unwrap();
    let finished = receiver
        .iter()
        .filter(|e| matches!(e, JudgeEvent::CellFinished(_)))
        .count();
    assert_eq!(finished, 2);
    assert!(handle.wait_for_finished(Duration::from_secs(10)));
    assert!(!harness.context.is_judging());
    assert!(!handle.join().unwrap().stopped);
}

#[test]
fn test_rejects_invalid_batches() {
    init();
    let harness = Harness::new(setup("worker_invalid"));
    let (worker, _receiver) = harness.worker(JudgeTask::Cells(vec![Cell::new(ALICE, 7)]));
    assert!(matches!(
        worker.run_blocking(),
        Err(JudgerError::InvalidCell { player: ALICE, problem: 7 })
    ));

    let (worker, _receiver) = harness.worker(JudgeTask::Player(5));
    assert!(matches!(
        worker.run_blocking(),
        Err(JudgerError::InvalidCell { player: 5, .. })
    ));

    fs::remove_dir_all(harness.contest.source_root()).unwrap();
    let (worker, _receiver) = harness.worker(JudgeTask::Player(ALICE));
    assert!(matches!(
        worker.run_blocking(),
        Err(JudgerError::MissingSourceRoot(_))
    ));
    assert!(!harness.context.is_judging());

    let root = harness.contest.path().to_path_buf();
    let broken = Contest::new(&root, vec![Problem::new("p1")], vec!["alice".to_owned()]);
    fs::create_dir_all(broken.source_root()).unwrap();
    let harness = Harness::new(broken);
    let (worker, _receiver) = harness.worker(JudgeTask::Player(0));
    assert!(matches!(
        worker.run_blocking(),
        Err(JudgerError::Configuration { .. })
    ));
}
