//! Read-only view of the externally maintained "currently shed" list.
//!
//! The shed script writes one consumer name per line. The daemon never
//! writes or validates this file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShedState {
    pub can_restore: bool,
    pub stopped_count: usize,
    pub stopped: Vec<String>,
    pub state_file_exists: bool,
    pub state_file: PathBuf,
}

/// Non-blank trimmed lines of `path`. Missing or unreadable files read as
/// empty.
pub fn read_stopped(path: &Path) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(data) => data
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect(),
        Err(_) => Vec::new(),
    }
}

pub fn read_state(path: &Path) -> ShedState {
    let stopped = read_stopped(path);
    ShedState {
        can_restore: !stopped.is_empty(),
        stopped_count: stopped.len(),
        stopped,
        state_file_exists: path.exists(),
        state_file: path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reads_empty() {
        let state = read_state(Path::new("/nonexistent/gpu-shed.stopped"));
        assert!(!state.can_restore);
        assert_eq!(state.stopped_count, 0);
        assert!(!state.state_file_exists);
    }

    #[test]
    fn blank_lines_are_dropped() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("gpu-shed.stopped");
        std::fs::write(&path, "ollama\n\n  vllm  \n").unwrap();

        let state = read_state(&path);
        assert!(state.can_restore);
        assert_eq!(state.stopped, vec!["ollama", "vllm"]);
        assert_eq!(state.stopped_count, 2);
        assert!(state.state_file_exists);
    }

    #[test]
    fn empty_file_exists_but_cannot_restore() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("gpu-shed.stopped");
        std::fs::write(&path, "\n").unwrap();

        let state = read_state(&path);
        assert!(state.state_file_exists);
        assert!(!state.can_restore);
    }
}
