use std::fmt;
use std::io;

#[derive(Debug)]
pub enum JudgeCoreError {
    #[cfg(unix)]
    NixErrno(nix::errno::Errno),
    IOError(io::Error),
    SerdeJsonError(serde_json::Error),
    AnyhowError(anyhow::Error),
    /// The problem is not fully configured and must not be judged
    ConfigurationError(String),
    CompileError(String),
}

impl fmt::Display for JudgeCoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            #[cfg(unix)]
            JudgeCoreError::NixErrno(e) => write!(f, "system call failed: {}", e),
            JudgeCoreError::IOError(e) => write!(f, "io error: {}", e),
            JudgeCoreError::SerdeJsonError(e) => write!(f, "json error: {}", e),
            JudgeCoreError::AnyhowError(e) => write!(f, "{}", e),
            JudgeCoreError::ConfigurationError(msg) => write!(f, "configuration error: {}", msg),
            JudgeCoreError::CompileError(msg) => write!(f, "compile error: {}", msg),
        }
    }
}

impl std::error::Error for JudgeCoreError {}

#[cfg(unix)]
impl From<nix::errno::Errno> for JudgeCoreError {
    fn from(error: nix::errno::Errno) -> JudgeCoreError {
        JudgeCoreError::NixErrno(error)
    }
}

impl From<io::Error> for JudgeCoreError {
    fn from(error: io::Error) -> JudgeCoreError {
        JudgeCoreError::IOError(error)
    }
}

impl From<anyhow::Error> for JudgeCoreError {
    fn from(error: anyhow::Error) -> JudgeCoreError {
        JudgeCoreError::AnyhowError(error)
    }
}

impl From<serde_json::Error> for JudgeCoreError {
    fn from(error: serde_json::Error) -> JudgeCoreError {
        JudgeCoreError::SerdeJsonError(error)
    }
}

pub fn configuration_error(problem: &str, reason: impl fmt::Display) -> JudgeCoreError {
    JudgeCoreError::ConfigurationError(format!("problem '{}': {}", problem, reason))
}
