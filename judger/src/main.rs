mod option;

use std::{sync::Arc, time::Duration};

use judge_core::{
    event::{EventSink, JudgeEvent},
    run::ProcessRunner,
};
use judger::{
    contest::{Contest, Scoreboard},
    context::JudgeContext,
    worker::{JudgeTask, JudgeWorker},
};
use option::JudgerCommand;

fn print_event(contest: &Contest, event: &JudgeEvent) {
    match event {
        JudgeEvent::Title(title) => log::info!("== {} ==", title),
        JudgeEvent::Note { text, detail } if detail.is_empty() => log::info!("{}", text),
        JudgeEvent::Note { text, detail } => log::info!("{}: {}", text, detail),
        JudgeEvent::PointDetail(info) => log::info!(
            "  #{} {} {} {}",
            info.index + 1,
            info.verdict.short_name(),
            info.time_usage
                .map(|t| format!("{:.3}s", t.as_secs_f64()))
                .unwrap_or_default(),
            info.message
        ),
        JudgeEvent::ScoreDetail(detail) => log::info!(
            "  subtask {}: {} / {} (running {})",
            detail.subtask + 1,
            detail.awarded,
            detail.max_score,
            detail.running_score
        ),
        JudgeEvent::TotalChanged { player, total } => log::debug!(
            "{}: {} / {}",
            contest.player_name(*player).unwrap_or("?"),
            total.score,
            total.max_score
        ),
        JudgeEvent::BatchFinished { text, .. } => log::info!("{}", text),
        _ => log::trace!("{:?}", event),
    }
}

fn main() -> anyhow::Result<()> {
    let opt = option::load_option();

    let contest = Contest::load(&opt.contest)?;
    let task = match &opt.cmd {
        JudgerCommand::Check => {
            for problem in contest.problems() {
                match problem.validate() {
                    Ok(()) => log::info!("{}: ok", problem.name()),
                    Err(e) => log::error!("{}", e),
                }
                for case in problem.test_cases() {
                    log::debug!("  {}", problem.in_out_string(case));
                }
            }
            return Ok(());
        }
        JudgerCommand::JudgeAll => JudgeTask::Cells(contest.all_cells()),
        JudgerCommand::JudgePlayer { name } => JudgeTask::Player(contest.find_player(name)?),
        JudgerCommand::JudgeCells { cells } => JudgeTask::Cells(
            cells
                .iter()
                .map(|c| contest.parse_cell(c))
                .collect::<Result<_, _>>()?,
        ),
    };

    let contest = Arc::new(contest);
    let board = Arc::new(Scoreboard::new(&contest));
    let context = JudgeContext::new();
    let (sender, receiver) = crossbeam_channel::unbounded();
    let mut worker = JudgeWorker::new(
        contest.clone(),
        board.clone(),
        context,
        Arc::new(ProcessRunner::new()),
        EventSink::new(sender),
        task,
    );
    if let Some(cells) = opt.stop_after {
        worker = worker.stop_after(cells);
    }
    let mut handle = worker.spawn()?;

    for event in receiver.iter() {
        print_event(&contest, &event);
    }

    if !handle.wait_for_finished(Duration::from_secs(opt.wait_timeout_secs)) {
        anyhow::bail!("judge worker did not finish in {} s", opt.wait_timeout_secs);
    }
    let outcome = handle.join()?;
    log::info!(
        "{} cells judged{}",
        outcome.finished.len(),
        if outcome.stopped { ", stopped early" } else { "" }
    );
    for (idx, name) in contest.players().iter().enumerate() {
        if let Some(total) = board.total(idx) {
            if total.is_untested() {
                log::info!("{:<16} untested", name);
            } else {
                log::info!("{:<16} {} / {}", name, total.score, total.max_score);
            }
        }
    }
    Ok(())
}
