use super::{StoreError, read_json, remove_dir_if_present, write_json};
use crate::io::lock::{DEFAULT_LOCK_RETRIES, FileLock, acquire_lock};
use crate::paths::StorageLayout;
use crate::schema::{TaskItem, TaskStatus, now_timestamp};
use std::collections::HashMap;
use tracing::debug;

/// Fields of a task to create
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub subject: String,
    pub description: String,
    pub active_form: Option<String>,
    pub owner: Option<String>,
    pub blocks: Vec<String>,
    pub blocked_by: Vec<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl NewTask {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..Default::default()
        }
    }
}

/// Task documents at `<root>/tasks/<team>/<id>.json`
///
/// Ids are sequential decimal strings starting at `"1"`; allocation and
/// updates are serialized by `<root>/tasks/<team>/.lock`.
#[derive(Debug, Clone)]
pub struct TaskStore {
    layout: StorageLayout,
}

impl TaskStore {
    pub fn new(layout: StorageLayout) -> Self {
        Self { layout }
    }

    /// Create the team's task directory if missing.
    pub fn ensure_team(&self, team: &str) -> Result<(), StoreError> {
        let dir = self.layout.tasks_dir(team);
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))
    }

    /// Create a task with the next free id.
    pub fn create(&self, team: &str, new: NewTask) -> Result<TaskItem, StoreError> {
        let _lock = self.lock(team)?;

        let id = (self.max_id(team)? + 1).to_string();
        let now = now_timestamp();
        let task = TaskItem {
            id,
            subject: new.subject,
            description: new.description,
            active_form: new.active_form,
            status: TaskStatus::Pending,
            owner: new.owner,
            blocks: new.blocks,
            blocked_by: new.blocked_by,
            metadata: new.metadata,
            created_at: Some(now.clone()),
            updated_at: Some(now),
            unknown_fields: HashMap::new(),
        };

        write_json(&self.layout.task_path(team, &task.id), &task)?;
        debug!(team, task_id = %task.id, "Created task");
        Ok(task)
    }

    /// Read one task.
    pub fn get(&self, team: &str, id: &str) -> Result<TaskItem, StoreError> {
        validate_id(id)?;
        read_json(&self.layout.task_path(team, id), || format!("task {id} in {team}"))
    }

    /// Locked read-modify-write of one task; stamps `updatedAt`.
    pub fn update<F>(&self, team: &str, id: &str, modify_fn: F) -> Result<TaskItem, StoreError>
    where
        F: FnOnce(&mut TaskItem),
    {
        validate_id(id)?;
        let _lock = self.lock(team)?;

        let path = self.layout.task_path(team, id);
        let mut task: TaskItem = read_json(&path, || format!("task {id} in {team}"))?;
        modify_fn(&mut task);
        task.id = id.to_string();
        task.updated_at = Some(now_timestamp());
        write_json(&path, &task)?;
        Ok(task)
    }

    /// Every task of the team, ordered by numeric id.
    pub fn list(&self, team: &str) -> Result<Vec<TaskItem>, StoreError> {
        let mut tasks = Vec::new();
        for id in self.ids(team)? {
            tasks.push(self.get(team, &id.to_string())?);
        }
        Ok(tasks)
    }

    /// Delete the team's task directory.
    pub fn delete_team(&self, team: &str) -> Result<(), StoreError> {
        remove_dir_if_present(&self.layout.tasks_dir(team))
    }

    fn lock(&self, team: &str) -> Result<FileLock, StoreError> {
        let dir = self.layout.tasks_dir(team);
        if !dir.is_dir() {
            return Err(StoreError::NotFound(format!("tasks for team {team}")));
        }
        Ok(acquire_lock(
            &self.layout.tasks_lock_path(team),
            DEFAULT_LOCK_RETRIES,
        )?)
    }

    fn max_id(&self, team: &str) -> Result<u64, StoreError> {
        Ok(self.ids(team)?.last().copied().unwrap_or(0))
    }

    fn ids(&self, team: &str) -> Result<Vec<u64>, StoreError> {
        let dir = self.layout.tasks_dir(team);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(format!("tasks for team {team}")));
            }
            Err(e) => return Err(StoreError::io(&dir, e)),
        };

        let mut ids: Vec<u64> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name();
                let stem = name.to_str()?.strip_suffix(".json")?;
                stem.parse().ok()
            })
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

fn validate_id(id: &str) -> Result<(), StoreError> {
    if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(StoreError::InvalidId(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, TaskStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = TaskStore::new(StorageLayout::new(temp_dir.path()));
        store.ensure_team("alpha").unwrap();
        (temp_dir, store)
    }

    #[test]
    fn test_ids_are_sequential_from_one() {
        let (_temp_dir, store) = store();
        let first = store.create("alpha", NewTask::new("first")).unwrap();
        let second = store.create("alpha", NewTask::new("second")).unwrap();

        assert_eq!(first.id, "1");
        assert_eq!(second.id, "2");
        assert_eq!(first.status, TaskStatus::Pending);
        assert!(first.created_at.is_some());
    }

    #[test]
    fn test_ids_follow_numeric_not_lexical_order() {
        let (_temp_dir, store) = store();
        for i in 0..10 {
            store.create("alpha", NewTask::new(format!("t{i}"))).unwrap();
        }
        let next = store.create("alpha", NewTask::new("eleventh")).unwrap();
        assert_eq!(next.id, "11");

        let listed: Vec<_> = store.list("alpha").unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(listed.first().map(String::as_str), Some("1"));
        assert_eq!(listed.last().map(String::as_str), Some("11"));
        assert_eq!(listed.len(), 11);
    }

    #[test]
    fn test_get_and_update() {
        let (temp_dir, store) = store();
        let mut new = NewTask::new("review");
        new.owner = Some("w2".into());
        store.create("alpha", new).unwrap();

        let updated = store
            .update("alpha", "1", |task| task.status = TaskStatus::InProgress)
            .unwrap();
        assert_eq!(updated.status, TaskStatus::InProgress);
        assert_eq!(store.get("alpha", "1").unwrap().owner.as_deref(), Some("w2"));

        let raw = std::fs::read_to_string(temp_dir.path().join("tasks/alpha/1.json")).unwrap();
        assert!(raw.contains("\"status\": \"in_progress\""));
    }

    #[test]
    fn test_missing_task_and_invalid_id() {
        let (_temp_dir, store) = store();
        assert!(matches!(store.get("alpha", "9"), Err(StoreError::NotFound(_))));
        assert!(matches!(
            store.get("alpha", "../config"),
            Err(StoreError::InvalidId(_))
        ));
        assert!(matches!(
            store.update("alpha", "", |_| {}),
            Err(StoreError::InvalidId(_))
        ));
    }

    #[test]
    fn test_unknown_team_is_not_found() {
        let (_temp_dir, store) = store();
        assert!(matches!(
            store.create("ghost", NewTask::new("x")),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(store.list("ghost"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_delete_team_removes_tasks() {
        let (_temp_dir, store) = store();
        store.create("alpha", NewTask::new("x")).unwrap();
        store.delete_team("alpha").unwrap();
        assert!(matches!(store.get("alpha", "1"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_concurrent_creates_allocate_distinct_ids() {
        let (_temp_dir, store) = store();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    store
                        .create("alpha", NewTask::new(format!("t{i}")))
                        .unwrap()
                        .id
                })
            })
            .collect();
        let mut ids: Vec<u64> = handles
            .into_iter()
            .map(|h| h.join().unwrap().parse().unwrap())
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }
}
