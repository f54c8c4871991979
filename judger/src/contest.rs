use std::{
    fs,
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
};

use judge_core::{
    event::Cell,
    problem::{Problem, ProblemType, SOURCE_DIR},
    result::{ResultSummary, ScoreTotal},
};
use serde_derive::{Deserialize, Serialize};

use crate::error::JudgerError;

pub const MANIFEST_FILE: &str = "contest.yaml";
pub const RESULT_DIR: &str = "result";
pub const TMP_DIR: &str = "tmp";
pub const DEFAULT_CHECKER: &str = "lcmp";

fn default_time_limit() -> f64 {
    1.0
}

fn default_memory_limit() -> f64 {
    256.0
}

/// On-disk description of a contest, `contest.yaml` at the contest root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContestManifest {
    #[serde(default)]
    pub problems: Vec<Problem>,
    /// Player names; empty means every directory under `src/`
    #[serde(default)]
    pub players: Vec<String>,
    /// Indices into `problems` giving the judging order; empty means list order
    #[serde(default)]
    pub problem_order: Vec<usize>,
    /// Seconds, used when test cases are rebuilt from the data directory
    #[serde(default = "default_time_limit")]
    pub default_time_limit: f64,
    /// MiB
    #[serde(default = "default_memory_limit")]
    pub default_memory_limit: f64,
}

/// Read-only view of a contest while it is judged.
#[derive(Debug, Clone)]
pub struct Contest {
    path: PathBuf,
    problems: Vec<Problem>,
    problem_order: Vec<usize>,
    players: Vec<String>,
}

impl Contest {
    pub fn new(path: &Path, problems: Vec<Problem>, players: Vec<String>) -> Self {
        let problem_order = (0..problems.len()).collect();
        Self {
            path: path.to_path_buf(),
            problems,
            problem_order,
            players,
        }
    }

    /// Loads `contest.yaml` and fills in whatever it leaves out.
    pub fn load(path: &Path) -> Result<Self, JudgerError> {
        let manifest_path = path.join(MANIFEST_FILE);
        log::debug!("Loading contest manifest {:?}", manifest_path);
        let manifest: ContestManifest = serde_yaml::from_str(&fs::read_to_string(&manifest_path)?)?;
        Self::from_manifest(path, manifest)
    }

    pub fn from_manifest(path: &Path, manifest: ContestManifest) -> Result<Self, JudgerError> {
        let mut problems = manifest.problems;
        for problem in problems.iter_mut() {
            auto_configure(
                path,
                problem,
                manifest.default_time_limit,
                manifest.default_memory_limit,
            )?;
        }

        let players = if manifest.players.is_empty() {
            scan_players(path)?
        } else {
            manifest.players
        };

        let mut contest = Self::new(path, problems, players);
        if !manifest.problem_order.is_empty() {
            contest.set_problem_order(manifest.problem_order)?;
        }
        log::info!(
            "Loaded contest {:?}: {} problems, {} players",
            path,
            contest.problems.len(),
            contest.players.len()
        );
        Ok(contest)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    pub fn problem(&self, idx: usize) -> Option<&Problem> {
        self.problems.get(idx)
    }

    pub fn problem_order(&self) -> &[usize] {
        &self.problem_order
    }

    pub fn set_problem_order(&mut self, order: Vec<usize>) -> Result<(), JudgerError> {
        if let Some(&bad) = order.iter().find(|&&idx| idx >= self.problems.len()) {
            return Err(JudgerError::UnknownName {
                kind: "problem index",
                name: bad.to_string(),
            });
        }
        self.problem_order = order;
        Ok(())
    }

    pub fn players(&self) -> &[String] {
        &self.players
    }

    pub fn player_name(&self, idx: usize) -> Option<&str> {
        self.players.get(idx).map(String::as_str)
    }

    pub fn find_player(&self, name: &str) -> Result<usize, JudgerError> {
        self.players
            .iter()
            .position(|p| p == name)
            .ok_or_else(|| JudgerError::UnknownName {
                kind: "player",
                name: name.to_owned(),
            })
    }

    pub fn find_problem(&self, name: &str) -> Result<usize, JudgerError> {
        self.problems
            .iter()
            .position(|p| p.name() == name)
            .ok_or_else(|| JudgerError::UnknownName {
                kind: "problem",
                name: name.to_owned(),
            })
    }

    /// Parses `player:problem` into a cell.
    pub fn parse_cell(&self, text: &str) -> Result<Cell, JudgerError> {
        let (player, problem) = text.split_once(':').ok_or_else(|| JudgerError::UnknownName {
            kind: "cell",
            name: text.to_owned(),
        })?;
        Ok(Cell::new(
            self.find_player(player)?,
            self.find_problem(problem)?,
        ))
    }

    pub fn contains(&self, cell: &Cell) -> bool {
        cell.player < self.players.len() && cell.problem < self.problems.len()
    }

    /// Every cell, player by player, following the problem order
    pub fn all_cells(&self) -> Vec<Cell> {
        (0..self.players.len())
            .flat_map(|player| {
                self.problem_order
                    .iter()
                    .map(move |&problem| Cell::new(player, problem))
            })
            .collect()
    }

    pub fn source_root(&self) -> PathBuf {
        self.path.join(SOURCE_DIR)
    }

    pub fn result_path(&self) -> PathBuf {
        self.path.join(RESULT_DIR)
    }

    /// Scratch directory of one cell
    pub fn work_path(&self, player: &str, problem: &Problem) -> PathBuf {
        self.path.join(TMP_DIR).join(player).join(problem.name())
    }
}

fn auto_configure(
    contest_path: &Path,
    problem: &mut Problem,
    time_lim: f64,
    mem_lim: f64,
) -> Result<(), JudgerError> {
    if problem.checker().is_empty() {
        problem.set_checker(DEFAULT_CHECKER);
    }
    if problem.test_cases().is_empty() {
        log::debug!("Rebuilding test cases of {} from data", problem.name());
        problem.reset_test_cases(contest_path, time_lim, mem_lim)?;
    }
    if problem.problem_type() == ProblemType::Traditional && problem.compilers().is_empty() {
        problem.reset_compilers();
    }
    Ok(())
}

fn scan_players(contest_path: &Path) -> Result<Vec<String>, JudgerError> {
    let source_root = contest_path.join(SOURCE_DIR);
    if !source_root.is_dir() {
        return Ok(vec![]);
    }
    let mut players = vec![];
    for entry in fs::read_dir(&source_root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            players.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    players.sort();
    Ok(players)
}

/// Results of one player, one summary per problem in problem index order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerScores {
    pub name: String,
    pub cells: Vec<ResultSummary>,
    pub total: ScoreTotal,
}

/// Mutable result grid. The worker writes it, the host reads snapshots.
#[derive(Debug, Default)]
pub struct Scoreboard {
    players: RwLock<Vec<PlayerScores>>,
}

impl Scoreboard {
    pub fn new(contest: &Contest) -> Self {
        let players = contest
            .players()
            .iter()
            .map(|name| PlayerScores {
                name: name.clone(),
                cells: vec![ResultSummary::untested(); contest.problems().len()],
                total: ScoreTotal::default(),
            })
            .collect();
        Self {
            players: RwLock::new(players),
        }
    }

    pub fn cell(&self, cell: Cell) -> Option<ResultSummary> {
        let players = self.players.read().unwrap_or_else(PoisonError::into_inner);
        players.get(cell.player)?.cells.get(cell.problem).copied()
    }

    pub fn total(&self, player: usize) -> Option<ScoreTotal> {
        let players = self.players.read().unwrap_or_else(PoisonError::into_inner);
        players.get(player).map(|p| p.total)
    }

    pub fn player(&self, player: usize) -> Option<PlayerScores> {
        let players = self.players.read().unwrap_or_else(PoisonError::into_inner);
        players.get(player).cloned()
    }

    /// Replaces the cell's summary and keeps the player total consistent.
    /// Returns the new total.
    pub fn set_cell(&self, cell: Cell, summary: ResultSummary) -> Option<ScoreTotal> {
        let mut players = self.players.write().unwrap_or_else(PoisonError::into_inner);
        let player = players.get_mut(cell.player)?;
        let slot = player.cells.get_mut(cell.problem)?;
        player.total -= &*slot;
        *slot = summary;
        player.total += &summary;
        Some(player.total)
    }

    /// Returns the cell to Untested; the player total loses its contribution.
    pub fn reset_cell(&self, cell: Cell) -> Option<ScoreTotal> {
        self.set_cell(cell, ResultSummary::untested())
    }
}
