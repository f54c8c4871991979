use std::{
    cmp::Ordering,
    fs, io,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde_derive::{Deserialize, Serialize};

use crate::{
    checker,
    error::{configuration_error, JudgeCoreError},
};

pub const DATA_DIR: &str = "data";
pub const SOURCE_DIR: &str = "src";

/// Compiler command templates shipped with the judge, `%1` stands for the
/// problem's executable name.
pub const BUILTIN_COMPILERS: &[(&str, &str)] = &[
    ("gcc -o %1 %1.c -lm -static", "%1.c"),
    ("g++ -o %1 %1.cpp -lm -static", "%1.cpp"),
    ("fpc %1.pas", "%1.pas"),
];

const DEFAULT_COMPILE_TIME_LIMIT: u64 = 10;

/// Seconds
pub const MAX_TIME_LIMIT: f64 = 3600.0;
/// MiB
pub const MAX_MEMORY_LIMIT: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemType {
    #[default]
    Traditional,
    AnswersOnly,
}

impl FromStr for ProblemType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "traditional" => Ok(Self::Traditional),
            "answers_only" | "answer" => Ok(Self::AnswersOnly),
            _ => Err(anyhow::anyhow!("Problem type not found: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compiler {
    cmd: String,
    file: String,
    #[serde(default = "default_compile_time_limit")]
    time_lim: u64,
}

fn default_compile_time_limit() -> u64 {
    DEFAULT_COMPILE_TIME_LIMIT
}

impl Compiler {
    pub fn new(cmd: impl Into<String>, file: impl Into<String>, time_lim: u64) -> Self {
        Self {
            cmd: cmd.into(),
            file: file.into(),
            time_lim,
        }
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    pub fn source_file(&self) -> &str {
        &self.file
    }

    /// Compile budget in seconds
    pub fn time_limit(&self) -> u64 {
        self.time_lim
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    /// Seconds
    time_lim: f64,
    /// MiB
    mem_lim: f64,
    #[serde(rename = "input")]
    in_file: String,
    #[serde(rename = "output")]
    out_file: String,
    #[serde(rename = "submit", default, skip_serializing_if = "String::is_empty")]
    sub_file: String,
}

impl TestCase {
    pub fn new(time_lim: f64, mem_lim: f64, input: &str, output: &str) -> Self {
        Self {
            time_lim,
            mem_lim,
            in_file: input.to_owned(),
            out_file: output.to_owned(),
            sub_file: String::new(),
        }
    }

    pub fn with_submit_file(mut self, submit: &str) -> Self {
        self.sub_file = submit.to_owned();
        self
    }

    pub fn time_limit(&self) -> f64 {
        self.time_lim
    }

    pub fn memory_limit(&self) -> f64 {
        self.mem_lim
    }

    pub fn in_file(&self) -> &str {
        &self.in_file
    }

    pub fn out_file(&self) -> &str {
        &self.out_file
    }

    pub fn submit_file(&self) -> &str {
        &self.sub_file
    }

    pub fn set_time_limit(&mut self, lim: f64) {
        self.time_lim = lim;
    }

    pub fn set_memory_limit(&mut self, lim: f64) {
        self.mem_lim = lim;
    }

    pub fn set_in_file(&mut self, input: &str) {
        self.in_file = input.to_owned();
    }

    pub fn set_out_file(&mut self, output: &str) {
        self.out_file = output.to_owned();
    }

    pub fn set_submit_file(&mut self, submit: &str) {
        self.sub_file = submit.to_owned();
    }
}

/// A scored group of test cases, referenced by their index in the owning problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    score: i64,
    cases: Vec<usize>,
}

impl Subtask {
    pub fn new(score: i64) -> Self {
        Self {
            score,
            cases: vec![],
        }
    }

    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn size(&self) -> usize {
        self.cases.len()
    }

    pub fn append(&mut self, case_index: usize) {
        self.cases.push(case_index);
    }

    pub fn cases(&self) -> &[usize] {
        &self.cases
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    name: String,
    #[serde(rename = "type", default)]
    problem_type: ProblemType,
    #[serde(default)]
    dir: String,
    #[serde(default)]
    exe: String,
    #[serde(default)]
    checker: String,
    #[serde(default)]
    in_file: String,
    #[serde(default)]
    out_file: String,
    #[serde(default = "default_score")]
    score: i64,
    /// Seconds
    #[serde(default = "default_checker_time_limit")]
    checker_time_lim: u64,
    /// KiB
    #[serde(default = "default_code_length_limit")]
    code_len_lim: f64,
    #[serde(default)]
    cases: Vec<TestCase>,
    #[serde(default)]
    subtasks: Vec<Subtask>,
    #[serde(default)]
    compilers: Vec<Compiler>,
}

fn default_score() -> i64 {
    100
}

fn default_checker_time_limit() -> u64 {
    10
}

fn default_code_length_limit() -> f64 {
    100.0
}

impl Problem {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            problem_type: ProblemType::Traditional,
            dir: String::new(),
            exe: String::new(),
            checker: String::from("lcmp"),
            in_file: String::new(),
            out_file: String::new(),
            score: default_score(),
            checker_time_lim: default_checker_time_limit(),
            code_len_lim: default_code_length_limit(),
            cases: vec![],
            subtasks: vec![],
            compilers: vec![],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn problem_type(&self) -> ProblemType {
        self.problem_type
    }

    /// Test data directory name, the problem name unless configured otherwise
    pub fn directory(&self) -> &str {
        if self.dir.is_empty() {
            &self.name
        } else {
            &self.dir
        }
    }

    pub fn executable_file(&self) -> &str {
        if self.exe.is_empty() {
            &self.name
        } else {
            &self.exe
        }
    }

    pub fn checker(&self) -> &str {
        &self.checker
    }

    pub fn in_file(&self) -> &str {
        &self.in_file
    }

    pub fn out_file(&self) -> &str {
        &self.out_file
    }

    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn checker_time_limit(&self) -> u64 {
        self.checker_time_lim
    }

    pub fn code_length_limit(&self) -> f64 {
        self.code_len_lim
    }

    pub fn set_type(&mut self, problem_type: ProblemType) {
        self.problem_type = problem_type;
    }

    pub fn set_directory(&mut self, dir: &str) {
        self.dir = dir.to_owned();
    }

    pub fn set_executable_file(&mut self, exe: &str) {
        self.exe = exe.to_owned();
    }

    pub fn set_checker(&mut self, checker: &str) {
        self.checker = checker.to_owned();
    }

    /// Empty names mean standard input / output
    pub fn set_io_files(&mut self, in_file: &str, out_file: &str) {
        self.in_file = in_file.to_owned();
        self.out_file = out_file.to_owned();
    }

    pub fn set_score(&mut self, score: i64) {
        self.score = score;
    }

    pub fn set_checker_time_limit(&mut self, secs: u64) {
        self.checker_time_lim = secs;
    }

    pub fn set_code_length_limit(&mut self, kib: f64) {
        self.code_len_lim = kib;
    }

    pub fn test_cases(&self) -> &[TestCase] {
        &self.cases
    }

    pub fn subtasks(&self) -> &[Subtask] {
        &self.subtasks
    }

    pub fn compilers(&self) -> &[Compiler] {
        &self.compilers
    }

    pub fn test_case_at(&self, idx: usize) -> Option<&TestCase> {
        self.cases.get(idx)
    }

    /// Returns the index of the new case
    pub fn push_test_case(&mut self, case: TestCase) -> usize {
        self.cases.push(case);
        self.cases.len() - 1
    }

    pub fn push_subtask(&mut self, subtask: Subtask) {
        self.subtasks.push(subtask);
    }

    pub fn insert_compiler(&mut self, pos: usize, compiler: Compiler) {
        let pos = pos.min(self.compilers.len());
        self.compilers.insert(pos, compiler);
    }

    pub fn remove_compiler(&mut self, pos: usize) -> Option<Compiler> {
        if pos < self.compilers.len() {
            Some(self.compilers.remove(pos))
        } else {
            None
        }
    }

    pub fn move_compiler(&mut self, from: usize, to: usize) {
        if from >= self.compilers.len() || to >= self.compilers.len() {
            return;
        }
        let compiler = self.compilers.remove(from);
        self.compilers.insert(to, compiler);
    }

    pub fn clear_compilers(&mut self) {
        self.compilers.clear();
    }

    /// Subtasks index into the case list, so they go together
    pub fn clear_test_cases(&mut self) {
        self.cases.clear();
        self.subtasks.clear();
    }

    pub fn clear(&mut self) {
        self.clear_test_cases();
        self.clear_compilers();
    }

    pub fn reset_compilers(&mut self) {
        let exe = checker::remove_exe_suffix(self.executable_file());
        self.compilers = BUILTIN_COMPILERS
            .iter()
            .map(|(cmd, file)| {
                Compiler::new(
                    cmd.replace("%1", &exe),
                    file.replace("%1", &exe),
                    DEFAULT_COMPILE_TIME_LIMIT,
                )
            })
            .collect();
    }

    pub fn data_path(&self, contest_path: &Path) -> PathBuf {
        contest_path.join(DATA_DIR).join(self.directory())
    }

    /// Directory holding one player's submission for this problem
    pub fn source_path(&self, contest_path: &Path, player: &str) -> PathBuf {
        contest_path.join(SOURCE_DIR).join(player).join(&self.name)
    }

    pub fn checker_path(&self, contest_path: &Path) -> PathBuf {
        self.data_path(contest_path)
            .join(checker::add_exe_suffix(&self.checker))
    }

    /// Rebuilds the case list from the `<stem>.in` / `<stem>.out` (or `.ans`)
    /// pairs in the data directory, one subtask per case.
    pub fn reset_test_cases(
        &mut self,
        contest_path: &Path,
        time_lim: f64,
        mem_lim: f64,
    ) -> io::Result<()> {
        self.clear_test_cases();
        let pairs = find_in_out_pairs(&self.data_path(contest_path))?;
        log::debug!("Found {} test data pairs for {}", pairs.len(), self.name);

        let count = pairs.len() as i64;
        for (idx, (input, output)) in pairs.iter().enumerate() {
            let mut case = TestCase::new(time_lim, mem_lim, input, output);
            if self.problem_type == ProblemType::AnswersOnly {
                case.set_submit_file(&submit_name_for(output));
            }
            let case_index = self.push_test_case(case);

            let idx = idx as i64;
            let mut score = self.score / count;
            if idx >= count - self.score % count {
                score += 1;
            }
            let mut subtask = Subtask::new(score);
            subtask.append(case_index);
            self.subtasks.push(subtask);
        }
        Ok(())
    }

    /// Changes type, limits and checker while keeping the existing cases.
    pub fn configure(
        &mut self,
        problem_type: ProblemType,
        time_lim: f64,
        mem_lim: f64,
        checker: &str,
    ) {
        self.problem_type = problem_type;
        self.checker = checker.to_owned();
        for case in self.cases.iter_mut() {
            case.set_time_limit(time_lim);
            case.set_memory_limit(mem_lim);
            match problem_type {
                ProblemType::Traditional => case.set_submit_file(""),
                ProblemType::AnswersOnly if case.submit_file().is_empty() => {
                    let submit = submit_name_for(case.out_file());
                    case.set_submit_file(&submit);
                }
                ProblemType::AnswersOnly => {}
            }
        }
        if problem_type == ProblemType::Traditional && self.compilers.is_empty() {
            self.reset_compilers();
        }
    }

    /// Drops the previous configuration and rebuilds it from the data directory.
    pub fn configure_new(
        &mut self,
        contest_path: &Path,
        problem_type: ProblemType,
        time_lim: f64,
        mem_lim: f64,
        checker: &str,
    ) -> io::Result<()> {
        self.clear();
        self.problem_type = problem_type;
        self.reset_test_cases(contest_path, time_lim, mem_lim)?;
        self.configure(problem_type, time_lim, mem_lim, checker);
        Ok(())
    }

    /// Picks the first compiler, in list order, whose source file the player submitted.
    pub fn compiler_for(&self, source_dir: &Path) -> Option<&Compiler> {
        self.compilers
            .iter()
            .find(|c| source_dir.join(c.source_file()).is_file())
    }

    pub fn is_builtin_checker(&self) -> bool {
        checker::is_builtin_checker(&self.checker)
    }

    /// Display name of a builtin checker, or the checker file itself
    pub fn builtin_checker_name(&self) -> String {
        match checker::find_builtin(&self.checker) {
            Some(c) => c.name.to_owned(),
            None => self.checker.clone(),
        }
    }

    pub fn in_out_string(&self, case: &TestCase) -> String {
        let mut s = format!(
            "input: \"{}\" answer: \"{}\"",
            case.in_file(),
            case.out_file()
        );
        if self.problem_type == ProblemType::AnswersOnly {
            s.push_str(&format!(" submit: \"{}\"", case.submit_file()));
        }
        s
    }

    /// Checks that the problem can be judged at all.
    pub fn validate(&self) -> Result<(), JudgeCoreError> {
        if self.checker.is_empty() {
            return Err(configuration_error(&self.name, "no checker configured"));
        }
        if self.cases.is_empty() {
            return Err(configuration_error(&self.name, "no test data"));
        }
        if self.problem_type == ProblemType::Traditional && self.compilers.is_empty() {
            return Err(configuration_error(&self.name, "no compiler configured"));
        }
        for (idx, case) in self.cases.iter().enumerate() {
            if !(case.time_limit() > 0.0) || !(case.memory_limit() > 0.0) {
                return Err(configuration_error(
                    &self.name,
                    format!("test case {} has a non-positive limit", idx + 1),
                ));
            }
            let bounded =
                case.time_limit() <= MAX_TIME_LIMIT && case.memory_limit() <= MAX_MEMORY_LIMIT;
            if !bounded {
                return Err(configuration_error(
                    &self.name,
                    format!(
                        "test case {} has a limit above {} s or {} MiB",
                        idx + 1,
                        MAX_TIME_LIMIT,
                        MAX_MEMORY_LIMIT
                    ),
                ));
            }
            match self.problem_type {
                ProblemType::Traditional if !case.submit_file().is_empty() => {
                    return Err(configuration_error(
                        &self.name,
                        format!("test case {} names a submit file", idx + 1),
                    ));
                }
                ProblemType::AnswersOnly if case.submit_file().is_empty() => {
                    return Err(configuration_error(
                        &self.name,
                        format!("test case {} has no submit file", idx + 1),
                    ));
                }
                _ => {}
            }
        }
        for (idx, subtask) in self.subtasks.iter().enumerate() {
            if subtask.size() == 0 {
                return Err(configuration_error(
                    &self.name,
                    format!("subtask {} has no test case", idx + 1),
                ));
            }
            if let Some(bad) = subtask.cases().iter().find(|&&c| c >= self.cases.len()) {
                return Err(configuration_error(
                    &self.name,
                    format!("subtask {} refers to missing test case {}", idx + 1, bad + 1),
                ));
            }
        }
        let total: i64 = self.subtasks.iter().map(Subtask::score).sum();
        if total != self.score {
            return Err(configuration_error(
                &self.name,
                format!("subtask scores sum to {} instead of {}", total, self.score),
            ));
        }
        Ok(())
    }
}

fn submit_name_for(output: &str) -> String {
    Path::new(output)
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| output.to_owned())
}

fn find_in_out_pairs(dir: &Path) -> io::Result<Vec<(String, String)>> {
    let mut pairs = vec![];
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || path.extension().map_or(true, |ext| ext != "in") {
            continue;
        }
        let stem = match path.file_stem() {
            Some(stem) => stem.to_string_lossy().into_owned(),
            None => continue,
        };
        let answer = ["out", "ans"]
            .iter()
            .map(|ext| format!("{}.{}", stem, ext))
            .find(|name| dir.join(name).is_file());
        if let Some(answer) = answer {
            pairs.push((format!("{}.in", stem), answer));
        }
    }
    pairs.sort_by(|a, b| natural_cmp(&a.0, &b.0));
    Ok(pairs)
}

/// Orders `a2` before `a10`.
fn natural_cmp(a: &str, b: &str) -> Ordering {
    fn chunks(s: &str) -> Vec<(bool, String)> {
        let mut out: Vec<(bool, String)> = vec![];
        for ch in s.chars() {
            let digit = ch.is_ascii_digit();
            match out.last_mut() {
                Some((d, chunk)) if *d == digit => chunk.push(ch),
                _ => out.push((digit, ch.to_string())),
            }
        }
        out
    }
    let (ca, cb) = (chunks(a), chunks(b));
    for ((da, sa), (db, sb)) in ca.iter().zip(cb.iter()) {
        let ord = if *da && *db {
            let ta = sa.trim_start_matches('0');
            let tb = sb.trim_start_matches('0');
            ta.len().cmp(&tb.len()).then_with(|| ta.cmp(tb))
        } else {
            sa.cmp(sb)
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    ca.len().cmp(&cb.len())
}
