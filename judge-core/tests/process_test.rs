#![cfg(unix)]

use std::{fs, os::unix::fs::PermissionsExt, path::PathBuf};

use judge_core::{
    event::{EventSink, JudgeEvent},
    judge::{new_judger, JudgeInput, StopSignal},
    problem::{Compiler, Problem, Subtask, TestCase},
    result::{ResultStatus, TestCaseVerdict},
    run::ProcessRunner,
};

const TEST_TEMP_PATH: &str = "tests/temp";

const SUM_SCRIPT: &str = "#!/bin/sh\nread a b\necho $((a + b))\n";
// Doubles a string until allocation fails
const HOG_SCRIPT: &str = "#!/bin/sh\nexec awk 'BEGIN { s = \"x\"; while (1) s = s s }'\n";
const CHECKER_SCRIPT: &str = "#!/bin/sh
if cmp -s \"$2\" \"$3\"; then echo ok > \"$4\"; exit 0; fi
echo differs > \"$4\"
exit 1
";

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn make_executable(path: &PathBuf, content: &str) {
    fs::write(path, content).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

fn verdicts(record: &[JudgeEvent]) -> Vec<TestCaseVerdict> {
    record
        .iter()
        .filter_map(|e| match e {
            JudgeEvent::PointDetail(info) => Some(info.verdict),
            _ => None,
        })
        .collect()
}

// One test function so only one thread forks children in this binary
#[test]
fn test_judge_shell_program() {
    init();
    let root = PathBuf::from(TEST_TEMP_PATH).join("process_shell_program");
    if root.exists() {
        fs::remove_dir_all(&root).unwrap();
    }
    let data = root.join("data/sum");
    let src = root.join("src/bob/sum");
    fs::create_dir_all(&data).unwrap();
    fs::create_dir_all(&src).unwrap();
    fs::write(data.join("1.in"), "1 2\n").unwrap();
    fs::write(data.join("1.out"), "3\n").unwrap();
    fs::write(data.join("2.in"), "20 22\n").unwrap();
    fs::write(data.join("2.out"), "42\n").unwrap();
    make_executable(&data.join("check.sh"), CHECKER_SCRIPT);
    fs::write(src.join("sum.sh"), SUM_SCRIPT).unwrap();

    let mut problem = Problem::new("sum");
    problem.reset_test_cases(&root, 2.0, 256.0).unwrap();
    assert_eq!(problem.test_cases().len(), 2);
    problem.insert_compiler(0, Compiler::new("cp sum.sh sum && chmod +x sum", "sum.sh", 10));
    problem.validate().unwrap();

    let runner = ProcessRunner::new();
    for checker in ["lcmp", "check.sh"] {
        problem.set_checker(checker);
        let mut judger = new_judger(JudgeInput {
            contest_path: &root,
            work_path: root.join("tmp/bob/sum"),
            player: "bob",
            problem: &problem,
            runner: &runner,
            events: EventSink::disconnected(),
            stop: StopSignal::new(),
        });
        let res = judger.judge();
        log::info!("{} -> {:?}", checker, res);
        assert_eq!(res.status, ResultStatus::Judged);
        assert_eq!(res.score, 100, "checker {}", checker);
    }

    let mut slow = Problem::new("sum");
    slow.push_test_case(TestCase::new(0.5, 256.0, "1.in", "1.out"));
    let mut subtask = Subtask::new(100);
    subtask.append(0);
    slow.push_subtask(subtask);
    slow.insert_compiler(
        0,
        Compiler::new("printf '#!/bin/sh\\nsleep 5\\n' > sum && chmod +x sum", "sum.sh", 10),
    );
    slow.validate().unwrap();
    let mut judger = new_judger(JudgeInput {
        contest_path: &root,
        work_path: root.join("tmp/bob/slow"),
        player: "bob",
        problem: &slow,
        runner: &runner,
        events: EventSink::disconnected(),
        stop: StopSignal::new(),
    });
    let res = judger.judge();
    assert_eq!(res.score, 0);
    assert_eq!(res.status, ResultStatus::Judged);
    assert_eq!(verdicts(judger.record()), vec![TestCaseVerdict::TimeLimitExceeded]);

    let hog_data = root.join("data/hog");
    let hog_src = root.join("src/bob/hog");
    fs::create_dir_all(&hog_data).unwrap();
    fs::create_dir_all(&hog_src).unwrap();
    fs::write(hog_data.join("1.in"), "").unwrap();
    fs::write(hog_data.join("1.out"), "").unwrap();
    fs::write(hog_src.join("hog.sh"), HOG_SCRIPT).unwrap();
    let mut hog = Problem::new("hog");
    hog.push_test_case(TestCase::new(5.0, 16.0, "1.in", "1.out"));
    let mut subtask = Subtask::new(100);
    subtask.append(0);
    hog.push_subtask(subtask);
    hog.insert_compiler(0, Compiler::new("cp hog.sh hog && chmod +x hog", "hog.sh", 10));
    hog.validate().unwrap();
    let mut judger = new_judger(JudgeInput {
        contest_path: &root,
        work_path: root.join("tmp/bob/hog"),
        player: "bob",
        problem: &hog,
        runner: &runner,
        events: EventSink::disconnected(),
        stop: StopSignal::new(),
    });
    let res = judger.judge();
    assert_eq!(res.score, 0);
    assert_eq!(res.status, ResultStatus::Judged);
    assert_eq!(verdicts(judger.record()), vec![TestCaseVerdict::MemoryLimitExceeded]);
}
