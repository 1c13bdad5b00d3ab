//! On-disk layout of a storage root
//!
//! ```text
//! <root>/teams/<team>/config.json
//! <root>/teams/<team>/inboxes/<agent>.json
//! <root>/tasks/<team>/<id>.json
//! <root>/tasks/<team>/.lock
//! ```

use std::path::{Path, PathBuf};

/// Path helper rooted at a storage directory (normally `~/.claude`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Layout under [`crate::home::default_storage_root`].
    pub fn from_home() -> anyhow::Result<Self> {
        Ok(Self::new(crate::home::default_storage_root()?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn team_dir(&self, team: &str) -> PathBuf {
        self.root.join("teams").join(team)
    }

    pub fn team_config_path(&self, team: &str) -> PathBuf {
        self.team_dir(team).join("config.json")
    }

    pub fn inboxes_dir(&self, team: &str) -> PathBuf {
        self.team_dir(team).join("inboxes")
    }

    pub fn inbox_path(&self, team: &str, agent: &str) -> PathBuf {
        self.inboxes_dir(team).join(format!("{agent}.json"))
    }

    pub fn tasks_dir(&self, team: &str) -> PathBuf {
        self.root.join("tasks").join(team)
    }

    pub fn task_path(&self, team: &str, id: &str) -> PathBuf {
        self.tasks_dir(team).join(format!("{id}.json"))
    }

    pub fn tasks_lock_path(&self, team: &str) -> PathBuf {
        self.tasks_dir(team).join(".lock")
    }
}

/// Whether `name` is usable as a team or agent name (a single path component).
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
        && name.trim() == name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let layout = StorageLayout::new("/data");
        assert_eq!(
            layout.team_config_path("alpha"),
            PathBuf::from("/data/teams/alpha/config.json")
        );
        assert_eq!(
            layout.inbox_path("alpha", "w1"),
            PathBuf::from("/data/teams/alpha/inboxes/w1.json")
        );
        assert_eq!(
            layout.task_path("alpha", "3"),
            PathBuf::from("/data/tasks/alpha/3.json")
        );
        assert_eq!(
            layout.tasks_lock_path("alpha"),
            PathBuf::from("/data/tasks/alpha/.lock")
        );
    }

    #[test]
    fn test_name_validation() {
        assert!(is_valid_name("w1"));
        assert!(is_valid_name("code-reviewer_2"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name(".."));
        assert!(!is_valid_name(".hidden"));
        assert!(!is_valid_name("a/b"));
        assert!(!is_valid_name("a\\b"));
        assert!(!is_valid_name(" w1"));
    }
}
