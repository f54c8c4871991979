use anyhow::anyhow;
use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

use crate::error::JudgeCoreError;

pub fn get_pathbuf_str(path: &Path) -> Result<String, JudgeCoreError> {
    match path.to_str() {
        Some(path_str) => Ok(path_str.to_owned()),
        None => Err(JudgeCoreError::AnyhowError(anyhow!(
            "PathBuf to str failed: {:?}",
            path
        ))),
    }
}

/// Child processes run in their own working directory, so every path handed
/// to them must not depend on ours.
pub fn absolute_path(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(env::current_dir()?.join(path))
    }
}

/// Leaves `dir` existing and empty.
pub fn prepare_dir(dir: &Path) -> io::Result<()> {
    if dir.exists() {
        log::debug!("cleaning dir: {:?}", dir);
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)
}

/// Returns whether a file was actually removed. A missing file is not an error.
pub fn remove_file_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_missing_file_is_ok() {
        let path = PathBuf::from("tests/temp/utils/never_created.res");
        assert!(!remove_file_if_exists(&path).unwrap());
    }

    #[test]
    fn test_absolute_path() {
        let path = absolute_path(Path::new("a/b")).unwrap();
        assert!(path.is_absolute());
        assert!(path.ends_with("a/b"));
    }
}
