use std::{fs, io, path::Path};

use serde_derive::{Deserialize, Serialize};

use crate::result::TestCaseVerdict;

/// A checker shipped with the judge, addressed by its canonical identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinChecker {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub const BUILTIN_CHECKERS: &[BuiltinChecker] = &[
    BuiltinChecker {
        id: "fulltext",
        name: "Full text",
        description: "Byte-for-byte comparison of output and answer",
    },
    BuiltinChecker {
        id: "lcmp",
        name: "Lines",
        description: "Compare line by line, ignoring extra whitespace",
    },
    BuiltinChecker {
        id: "wcmp",
        name: "Tokens",
        description: "Compare the sequences of whitespace separated tokens",
    },
    BuiltinChecker {
        id: "ncmp",
        name: "Integers",
        description: "Compare the sequences of signed 64-bit integers",
    },
    BuiltinChecker {
        id: "rcmp6",
        name: "Reals (1e-6)",
        description: "Compare real numbers with absolute or relative error 1e-6",
    },
    BuiltinChecker {
        id: "rcmp9",
        name: "Reals (1e-9)",
        description: "Compare real numbers with absolute or relative error 1e-9",
    },
];

#[cfg(windows)]
const EXE_SUFFIX: &str = ".exe";

pub fn add_exe_suffix(file: &str) -> String {
    #[cfg(windows)]
    {
        if !file.ends_with(EXE_SUFFIX) {
            return format!("{}{}", file, EXE_SUFFIX);
        }
    }
    file.to_owned()
}

pub fn remove_exe_suffix(file: &str) -> String {
    #[cfg(windows)]
    {
        if let Some(stripped) = file.strip_suffix(EXE_SUFFIX) {
            return stripped.to_owned();
        }
    }
    file.to_owned()
}

pub fn find_builtin(checker: &str) -> Option<&'static BuiltinChecker> {
    let id = remove_exe_suffix(checker);
    BUILTIN_CHECKERS.iter().find(|c| c.id == id)
}

pub fn is_builtin_checker(checker: &str) -> bool {
    find_builtin(checker).is_some()
}

/// Maps a display name back to its checker file name. Anything that is not the
/// name of a builtin checker is returned unchanged.
pub fn from_builtin_checker_name(name: &str) -> String {
    match BUILTIN_CHECKERS.iter().find(|c| c.name == name) {
        Some(c) => add_exe_suffix(c.id),
        None => name.to_owned(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub verdict: TestCaseVerdict,
    pub message: String,
}

impl CheckOutcome {
    fn accepted() -> Self {
        Self {
            verdict: TestCaseVerdict::Accepted,
            message: String::from("ok"),
        }
    }

    fn wrong(message: String) -> Self {
        Self {
            verdict: TestCaseVerdict::WrongAnswer,
            message,
        }
    }

    fn presentation(message: String) -> Self {
        Self {
            verdict: TestCaseVerdict::PresentationError,
            message,
        }
    }
}

/// Runs a builtin comparison between the contestant output and the answer.
pub fn check_builtin(
    checker: &BuiltinChecker,
    output: &Path,
    answer: &Path,
) -> io::Result<CheckOutcome> {
    let out_bytes = fs::read(output)?;
    let ans_bytes = fs::read(answer)?;
    log::debug!(
        "Builtin checker {} comparing {:?} with {:?}",
        checker.id,
        output,
        answer
    );
    if checker.id == "fulltext" {
        return Ok(compare_full_text(&out_bytes, &ans_bytes));
    }

    let out = String::from_utf8_lossy(&out_bytes);
    let ans = String::from_utf8_lossy(&ans_bytes);
    Ok(match checker.id {
        "lcmp" => compare_lines(&out, &ans),
        "wcmp" => compare_tokens(&out, &ans),
        "ncmp" => compare_integers(&out, &ans),
        "rcmp6" => compare_reals(&out, &ans, 1e-6),
        "rcmp9" => compare_reals(&out, &ans, 1e-9),
        other => CheckOutcome {
            verdict: TestCaseVerdict::CheckerError,
            message: format!("unknown builtin checker {}", other),
        },
    })
}

fn compare_full_text(out: &[u8], ans: &[u8]) -> CheckOutcome {
    match out.iter().zip(ans.iter()).position(|(a, b)| a != b) {
        Some(pos) => CheckOutcome::wrong(format!("files differ at byte {}", pos + 1)),
        None if out.len() != ans.len() => CheckOutcome::wrong(format!(
            "length differs: expected {} bytes, found {}",
            ans.len(),
            out.len()
        )),
        None => CheckOutcome::accepted(),
    }
}

fn significant_lines(text: &str) -> Vec<Vec<&str>> {
    let mut lines: Vec<Vec<&str>> = text
        .lines()
        .map(|line| line.split_whitespace().collect())
        .collect();
    while lines.last().map_or(false, |l| l.is_empty()) {
        lines.pop();
    }
    lines
}

fn compare_lines(out: &str, ans: &str) -> CheckOutcome {
    let out_lines = significant_lines(out);
    let ans_lines = significant_lines(ans);
    for (idx, (o, a)) in out_lines.iter().zip(ans_lines.iter()).enumerate() {
        if o != a {
            return CheckOutcome::wrong(format!("line {} differs", idx + 1));
        }
    }
    if out_lines.len() != ans_lines.len() {
        return CheckOutcome::wrong(format!(
            "expected {} lines, found {}",
            ans_lines.len(),
            out_lines.len()
        ));
    }
    CheckOutcome::accepted()
}

fn compare_tokens(out: &str, ans: &str) -> CheckOutcome {
    let out_tokens: Vec<&str> = out.split_whitespace().collect();
    let ans_tokens: Vec<&str> = ans.split_whitespace().collect();
    for (idx, (o, a)) in out_tokens.iter().zip(ans_tokens.iter()).enumerate() {
        if o != a {
            return CheckOutcome::wrong(format!(
                "token {}: expected '{}', found '{}'",
                idx + 1,
                a,
                o
            ));
        }
    }
    if out_tokens.len() != ans_tokens.len() {
        return CheckOutcome::wrong(format!(
            "expected {} tokens, found {}",
            ans_tokens.len(),
            out_tokens.len()
        ));
    }
    CheckOutcome::accepted()
}

fn compare_integers(out: &str, ans: &str) -> CheckOutcome {
    compare_parsed(out, ans, |o: &i64, a: &i64| o == a)
}

fn compare_reals(out: &str, ans: &str, eps: f64) -> CheckOutcome {
    compare_parsed(out, ans, |o: &f64, a: &f64| {
        let diff = (o - a).abs();
        diff <= eps || diff <= eps * a.abs()
    })
}

fn compare_parsed<T, F>(out: &str, ans: &str, equal: F) -> CheckOutcome
where
    T: std::str::FromStr + std::fmt::Display,
    F: Fn(&T, &T) -> bool,
{
    let mut ans_values = Vec::new();
    for token in ans.split_whitespace() {
        match token.parse::<T>() {
            Ok(v) => ans_values.push(v),
            Err(_) => {
                return CheckOutcome {
                    verdict: TestCaseVerdict::CheckerError,
                    message: format!("answer file contains malformed number '{}'", token),
                }
            }
        }
    }
    let mut count = 0;
    for (idx, token) in out.split_whitespace().enumerate() {
        let value = match token.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                return CheckOutcome::presentation(format!(
                    "token {} is not a number: '{}'",
                    idx + 1,
                    token
                ))
            }
        };
        match ans_values.get(idx) {
            Some(expected) if equal(&value, expected) => {}
            Some(expected) => {
                return CheckOutcome::wrong(format!(
                    "number {}: expected {}, found {}",
                    idx + 1,
                    expected,
                    value
                ))
            }
            None => {
                return CheckOutcome::wrong(format!(
                    "expected {} numbers, found more",
                    ans_values.len()
                ))
            }
        }
        count += 1;
    }
    if count != ans_values.len() {
        return CheckOutcome::wrong(format!(
            "expected {} numbers, found {}",
            ans_values.len(),
            count
        ));
    }
    CheckOutcome::accepted()
}

/// Interprets a testlib style checker exit code. `report` is the content the
/// checker wrote to its result file.
pub fn interpret_checker_exit(code: Option<i32>, report: &str) -> CheckOutcome {
    let message = report.trim().to_owned();
    match code {
        Some(0) => CheckOutcome {
            verdict: TestCaseVerdict::Accepted,
            message,
        },
        Some(1) => CheckOutcome::wrong(message),
        Some(2) => CheckOutcome::presentation(message),
        Some(7) => match parse_partial_ratio(&message) {
            Some(ratio) => CheckOutcome {
                verdict: TestCaseVerdict::PartiallyCorrect(ratio),
                message,
            },
            None => CheckOutcome {
                verdict: TestCaseVerdict::CheckerError,
                message: format!("checker reported partial score without ratio: {}", message),
            },
        },
        Some(other) => CheckOutcome {
            verdict: TestCaseVerdict::CheckerError,
            message: format!("checker exited with code {}: {}", other, message),
        },
        None => CheckOutcome {
            verdict: TestCaseVerdict::CheckerError,
            message: String::from("checker was killed by a signal"),
        },
    }
}

fn parse_partial_ratio(report: &str) -> Option<f64> {
    report
        .split_whitespace()
        .filter_map(|token| token.parse::<f64>().ok())
        .find(|ratio| ratio.is_finite())
        .map(|ratio| ratio.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup_is_suffix_normalized() {
        assert!(is_builtin_checker("lcmp"));
        assert!(is_builtin_checker(&add_exe_suffix("ncmp")));
        assert!(!is_builtin_checker("my_checker"));
        assert_eq!(find_builtin("wcmp").map(|c| c.name), Some("Tokens"));
    }

    #[test]
    fn test_builtin_name_round_trip() {
        for checker in BUILTIN_CHECKERS {
            let file = from_builtin_checker_name(checker.name);
            assert_eq!(remove_exe_suffix(&file), checker.id);
        }
        assert_eq!(from_builtin_checker_name("spj.exe"), "spj.exe");
    }

    #[test]
    fn test_compare_lines_ignores_trailing_whitespace() {
        let outcome = compare_lines("1 2  3 \n4\n\n", "1 2 3\n4");
        assert_eq!(outcome.verdict, TestCaseVerdict::Accepted);
        let outcome = compare_lines("1 2\n4\n", "1 2 3\n4\n");
        assert_eq!(outcome.verdict, TestCaseVerdict::WrongAnswer);
    }

    #[test]
    fn test_compare_full_text_is_exact() {
        assert_eq!(
            compare_full_text(b"abc\n", b"abc\n").verdict,
            TestCaseVerdict::Accepted
        );
        assert_eq!(
            compare_full_text(b"abc", b"abc\n").verdict,
            TestCaseVerdict::WrongAnswer
        );
    }

    #[test]
    fn test_compare_numbers() {
        assert_eq!(
            compare_integers("1 -2\n3", "1 -2 3").verdict,
            TestCaseVerdict::Accepted
        );
        assert_eq!(
            compare_integers("1 x 3", "1 2 3").verdict,
            TestCaseVerdict::PresentationError
        );
        assert_eq!(
            compare_reals("0.3333334", "0.3333333", 1e-6).verdict,
            TestCaseVerdict::Accepted
        );
        assert_eq!(
            compare_reals("0.34", "0.3333333", 1e-6).verdict,
            TestCaseVerdict::WrongAnswer
        );
    }

    #[test]
    fn test_interpret_checker_exit() {
        assert_eq!(
            interpret_checker_exit(Some(0), "ok").verdict,
            TestCaseVerdict::Accepted
        );
        assert_eq!(
            interpret_checker_exit(Some(7), "points 0.25").verdict,
            TestCaseVerdict::PartiallyCorrect(0.25)
        );
        assert_eq!(
            interpret_checker_exit(Some(3), "fail").verdict,
            TestCaseVerdict::CheckerError
        );
        assert_eq!(
            interpret_checker_exit(None, "").verdict,
            TestCaseVerdict::CheckerError
        );
    }
}
