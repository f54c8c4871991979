use std::{fs, path::PathBuf};

use chrono::{DateTime, Local};
use judge_core::{
    event::{Cell, JudgeEvent},
    result::{ResultSummary, ScoreTotal},
    utils::remove_file_if_exists,
};
use serde_derive::{Deserialize, Serialize};

use crate::{
    contest::{Contest, Scoreboard},
    error::JudgerError,
};

pub const CELL_ARTIFACT_EXT: &str = "res";

/// Persisted result of one cell: the summary plus the judger's full record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellArtifact {
    pub player: String,
    pub problem: String,
    pub summary: ResultSummary,
    pub details: Vec<JudgeEvent>,
    pub judged_at: DateTime<Local>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemEntry {
    pub problem: String,
    pub summary: ResultSummary,
}

/// Per-player overview, rewritten after every judged cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerReport {
    pub player: String,
    pub total: ScoreTotal,
    pub problems: Vec<ProblemEntry>,
    pub generated_at: DateTime<Local>,
}

fn names(contest: &Contest, cell: Cell) -> Result<(&str, &str), JudgerError> {
    let invalid = || JudgerError::InvalidCell {
        player: cell.player,
        problem: cell.problem,
    };
    let player = contest.player_name(cell.player).ok_or_else(invalid)?;
    let problem = contest.problem(cell.problem).ok_or_else(invalid)?;
    Ok((player, problem.name()))
}

/// `<contest>/result/<problem>/<player>.res`
pub fn cell_artifact_path(contest: &Contest, cell: Cell) -> Result<PathBuf, JudgerError> {
    let (player, problem) = names(contest, cell)?;
    Ok(contest
        .result_path()
        .join(problem)
        .join(format!("{}.{}", player, CELL_ARTIFACT_EXT)))
}

/// `<contest>/result/<player>.json`
pub fn player_report_path(contest: &Contest, player: &str) -> PathBuf {
    contest.result_path().join(format!("{}.json", player))
}

/// Deletes the cell artifact; a missing artifact is not an error.
pub fn remove_cell_artifact(contest: &Contest, cell: Cell) -> Result<bool, JudgerError> {
    let path = cell_artifact_path(contest, cell)?;
    Ok(remove_file_if_exists(&path)?)
}

pub fn save_cell_artifact(
    contest: &Contest,
    cell: Cell,
    summary: ResultSummary,
    details: Vec<JudgeEvent>,
) -> Result<(), JudgerError> {
    let (player, problem) = names(contest, cell)?;
    let artifact = CellArtifact {
        player: player.to_owned(),
        problem: problem.to_owned(),
        summary,
        details,
        judged_at: Local::now(),
    };
    let path = cell_artifact_path(contest, cell)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, serde_json::to_string_pretty(&artifact)?)?;
    log::debug!("Saved cell artifact {:?}", path);
    Ok(())
}

pub fn load_cell_artifact(contest: &Contest, cell: Cell) -> Result<CellArtifact, JudgerError> {
    let path = cell_artifact_path(contest, cell)?;
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}

pub fn save_player_report(
    contest: &Contest,
    board: &Scoreboard,
    player: usize,
) -> Result<(), JudgerError> {
    let scores = board.player(player).ok_or(JudgerError::InvalidCell {
        player,
        problem: 0,
    })?;
    let problems = contest
        .problems()
        .iter()
        .zip(scores.cells.iter())
        .map(|(problem, summary)| ProblemEntry {
            problem: problem.name().to_owned(),
            summary: *summary,
        })
        .collect();
    let report = PlayerReport {
        player: scores.name,
        total: scores.total,
        problems,
        generated_at: Local::now(),
    };
    fs::create_dir_all(contest.result_path())?;
    let path = player_report_path(contest, &report.player);
    fs::write(&path, serde_json::to_string_pretty(&report)?)?;
    Ok(())
}
