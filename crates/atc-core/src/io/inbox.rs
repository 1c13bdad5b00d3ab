//! Inbox file operations with atomic writes and conflict detection

use crate::io::atomic::atomic_swap;
use crate::io::error::InboxError;
use crate::io::hash::compute_hash;
use crate::io::lock::{DEFAULT_LOCK_RETRIES, acquire_lock};
use crate::schema::InboxMessage;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Outcome of an inbox write operation
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// Clean write with no conflicts detected
    Success,

    /// A writer bypassed the lock; its entries were merged back in
    ConflictResolved { merged_messages: usize },
}

/// Atomically append a message to an inbox
///
/// The message is stored with `read = false` regardless of the flag it
/// carries. A missing inbox file is created; the parent directory must exist.
pub fn inbox_append(inbox_path: &Path, message: &InboxMessage) -> Result<WriteOutcome, InboxError> {
    let mut entry = message.clone();
    entry.read = false;
    atomic_write_with_conflict_check(inbox_path, true, |messages| {
        messages.push(entry);
        true
    })
}

/// Read every entry of an inbox in append order without modifying it.
pub fn inbox_read(inbox_path: &Path) -> Result<Vec<InboxMessage>, InboxError> {
    let content = fs::read(inbox_path).map_err(|e| InboxError::io(inbox_path, e))?;
    parse_messages(inbox_path, &content)
}

/// Return unread entries in append order and mark them read, in one step
///
/// Runs under the inbox lock so two cooperating readers never receive the
/// same entry. Fails with [`InboxError::NotFound`] when the inbox is missing.
pub fn inbox_take_unread(inbox_path: &Path) -> Result<Vec<InboxMessage>, InboxError> {
    let mut taken = Vec::new();
    atomic_write_with_conflict_check(inbox_path, false, |messages| {
        for message in messages.iter_mut().filter(|m| !m.read) {
            taken.push(message.clone());
            message.read = true;
        }
        !taken.is_empty()
    })?;
    Ok(taken)
}

/// Create an empty inbox (`[]`) if none exists.
pub fn inbox_ensure(inbox_path: &Path) -> Result<(), InboxError> {
    if inbox_path.exists() {
        return Ok(());
    }
    let lock_path = inbox_path.with_extension("lock");
    let _lock = acquire_lock(&lock_path, DEFAULT_LOCK_RETRIES)?;
    if !inbox_path.exists() {
        write_synced(&inbox_path.with_extension("tmp"), b"[]")?;
        fs::rename(inbox_path.with_extension("tmp"), inbox_path)
            .map_err(|e| InboxError::io(inbox_path, e))?;
    }
    Ok(())
}

fn parse_messages(path: &Path, content: &[u8]) -> Result<Vec<InboxMessage>, InboxError> {
    // A zero-length file is an inbox created by a writer that has not
    // flushed its first array yet.
    if content.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    serde_json::from_slice(content).map_err(|e| InboxError::Json {
        path: path.to_path_buf(),
        source: e,
    })
}

fn write_synced(path: &Path, content: &[u8]) -> Result<(), InboxError> {
    let mut file = fs::File::create(path).map_err(|e| InboxError::io(path, e))?;
    file.write_all(content).map_err(|e| InboxError::io(path, e))?;
    file.sync_all().map_err(|e| InboxError::io(path, e))
}

/// Shared atomic write logic for inbox operations
///
/// Acquires the lock, reads the current file, applies `modify_fn`, writes the
/// result to a sibling `.tmp` file and exchanges it with the inbox. The
/// displaced file is then hashed; if it differs from what was read, a writer
/// bypassed the lock and its new entries are merged back in.
///
/// `modify_fn` returns `false` to skip the write.
fn atomic_write_with_conflict_check<F>(
    inbox_path: &Path,
    create: bool,
    modify_fn: F,
) -> Result<WriteOutcome, InboxError>
where
    F: FnOnce(&mut Vec<InboxMessage>) -> bool,
{
    let lock_path = inbox_path.with_extension("lock");
    let tmp_path = inbox_path.with_extension("tmp");

    if !create && !inbox_path.exists() {
        return Err(InboxError::NotFound {
            path: inbox_path.to_path_buf(),
        });
    }

    let _lock = acquire_lock(&lock_path, DEFAULT_LOCK_RETRIES)?;

    let existed = inbox_path.exists();
    let (mut messages, original_hash) = if existed {
        let content = fs::read(inbox_path).map_err(|e| InboxError::io(inbox_path, e))?;
        (parse_messages(inbox_path, &content)?, compute_hash(&content))
    } else if create {
        (Vec::new(), String::new())
    } else {
        return Err(InboxError::NotFound {
            path: inbox_path.to_path_buf(),
        });
    };

    if !modify_fn(&mut messages) {
        return Ok(WriteOutcome::Success);
    }

    let new_content = serde_json::to_vec_pretty(&messages).map_err(|e| InboxError::Json {
        path: tmp_path.clone(),
        source: e,
    })?;
    write_synced(&tmp_path, &new_content)?;

    if !existed {
        fs::rename(&tmp_path, inbox_path).map_err(|e| InboxError::io(inbox_path, e))?;
        return Ok(WriteOutcome::Success);
    }

    atomic_swap(inbox_path, &tmp_path)?;

    let displaced_content = fs::read(&tmp_path).map_err(|e| InboxError::io(&tmp_path, e))?;
    let outcome = if compute_hash(&displaced_content) != original_hash {
        let displaced = parse_messages(&tmp_path, &displaced_content)?;
        let merged = merge_messages(&messages, &displaced);
        let merged_messages = merged.len() - messages.len();
        debug!(
            "Merged {merged_messages} concurrent entries into {}",
            inbox_path.display()
        );

        let merged_content = serde_json::to_vec_pretty(&merged).map_err(|e| InboxError::Json {
            path: tmp_path.clone(),
            source: e,
        })?;
        write_synced(&tmp_path, &merged_content)?;
        atomic_swap(inbox_path, &tmp_path)?;

        WriteOutcome::ConflictResolved { merged_messages }
    } else {
        WriteOutcome::Success
    };

    let _ = fs::remove_file(&tmp_path);

    Ok(outcome)
}

/// Append entries from `theirs` that `ours` lacks, keeping their `read` flag
///
/// Entries are identified by sender, text and timestamp. Order is ours first,
/// then theirs in their original order.
fn merge_messages(ours: &[InboxMessage], theirs: &[InboxMessage]) -> Vec<InboxMessage> {
    let mut merged = ours.to_vec();
    for message in theirs {
        if !ours.iter().any(|m| m.same_entry(message)) {
            merged.push(message.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn message(from: &str, text: &str, ts: &str) -> InboxMessage {
        let mut m = InboxMessage::new(from, text);
        m.timestamp = ts.to_string();
        m
    }

    #[test]
    fn test_inbox_append_creates_file() {
        let temp_dir = TempDir::new().unwrap();
        let inbox_path = temp_dir.path().join("w1.json");

        let outcome = inbox_append(&inbox_path, &InboxMessage::new("controller", "hello")).unwrap();
        assert_eq!(outcome, WriteOutcome::Success);

        let messages = inbox_read(&inbox_path).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].from, "controller");
        assert!(!messages[0].read);
        assert!(!temp_dir.path().join("w1.tmp").exists());
    }

    #[test]
    fn test_inbox_append_forces_unread_and_keeps_order() {
        let temp_dir = TempDir::new().unwrap();
        let inbox_path = temp_dir.path().join("w1.json");

        let mut first = message("controller", "one", "2026-02-11T14:30:02.000Z");
        first.read = true;
        inbox_append(&inbox_path, &first).unwrap();
        // Earlier timestamp written later still lands last
        inbox_append(&inbox_path, &message("w2", "two", "2026-02-11T14:30:01.000Z")).unwrap();

        let messages = inbox_read(&inbox_path).unwrap();
        let texts: Vec<_> = messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two"]);
        assert!(messages.iter().all(|m| !m.read));
    }

    #[test]
    fn test_take_unread_marks_read_once() {
        let temp_dir = TempDir::new().unwrap();
        let inbox_path = temp_dir.path().join("controller.json");

        inbox_append(&inbox_path, &InboxMessage::new("w1", "a")).unwrap();
        inbox_append(&inbox_path, &InboxMessage::new("w2", "b")).unwrap();

        let first = inbox_take_unread(&inbox_path).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].text, "a");
        assert_eq!(first[1].text, "b");
        assert!(first.iter().all(|m| !m.read));

        assert!(inbox_take_unread(&inbox_path).unwrap().is_empty());

        inbox_append(&inbox_path, &InboxMessage::new("w1", "c")).unwrap();
        let third = inbox_take_unread(&inbox_path).unwrap();
        assert_eq!(third.len(), 1);
        assert_eq!(third[0].text, "c");

        let all = inbox_read(&inbox_path).unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|m| m.read));
    }

    #[test]
    fn test_take_unread_missing_inbox_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let result = inbox_take_unread(&temp_dir.path().join("ghost.json"));
        assert!(matches!(result, Err(InboxError::NotFound { .. })));
        assert!(matches!(
            inbox_read(&temp_dir.path().join("ghost.json")),
            Err(InboxError::NotFound { .. })
        ));
    }

    #[test]
    fn test_ensure_creates_empty_inbox_once() {
        let temp_dir = TempDir::new().unwrap();
        let inbox_path = temp_dir.path().join("w1.json");

        inbox_ensure(&inbox_path).unwrap();
        assert_eq!(fs::read_to_string(&inbox_path).unwrap(), "[]");

        inbox_append(&inbox_path, &InboxMessage::new("controller", "keep")).unwrap();
        inbox_ensure(&inbox_path).unwrap();
        assert_eq!(inbox_read(&inbox_path).unwrap().len(), 1);
    }

    #[test]
    fn test_empty_file_reads_as_empty_inbox() {
        let temp_dir = TempDir::new().unwrap();
        let inbox_path = temp_dir.path().join("w1.json");
        fs::write(&inbox_path, "").unwrap();

        assert!(inbox_read(&inbox_path).unwrap().is_empty());
        inbox_append(&inbox_path, &InboxMessage::new("controller", "x")).unwrap();
        assert_eq!(inbox_read(&inbox_path).unwrap().len(), 1);
    }

    #[test]
    fn test_corrupt_inbox_is_json_error() {
        let temp_dir = TempDir::new().unwrap();
        let inbox_path = temp_dir.path().join("w1.json");
        fs::write(&inbox_path, "{not an array").unwrap();

        assert!(matches!(inbox_read(&inbox_path), Err(InboxError::Json { .. })));
        assert!(matches!(
            inbox_take_unread(&inbox_path),
            Err(InboxError::Json { .. })
        ));
    }

    #[test]
    fn test_unknown_fields_survive_take_unread() {
        let temp_dir = TempDir::new().unwrap();
        let inbox_path = temp_dir.path().join("controller.json");
        fs::write(
            &inbox_path,
            r#"[{"from":"w1","text":"t","timestamp":"2026-02-11T14:30:00.000Z","read":false,"futureField":7}]"#,
        )
        .unwrap();

        let taken = inbox_take_unread(&inbox_path).unwrap();
        assert_eq!(taken[0].unknown_fields.get("futureField"), Some(&serde_json::json!(7)));

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&inbox_path).unwrap()).unwrap();
        assert_eq!(raw[0]["futureField"], 7);
        assert_eq!(raw[0]["read"], true);
    }

    #[test]
    fn test_merge_appends_missing_entries_with_their_flags() {
        let a = message("w1", "a", "t1");
        let mut a_read = a.clone();
        a_read.read = true;
        let mut b = message("w2", "b", "t2");
        b.read = true;
        let c = message("w3", "c", "t0");

        let merged = merge_messages(&[a_read.clone()], &[a, b.clone(), c.clone()]);
        assert_eq!(merged.len(), 3);
        assert!(merged[0].read);
        assert_eq!(merged[1], b);
        assert_eq!(merged[2], c);
    }

    #[test]
    fn test_concurrent_appends_lose_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let inbox_path = temp_dir.path().join("controller.json");
        inbox_ensure(&inbox_path).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let path = inbox_path.clone();
                std::thread::spawn(move || {
                    for j in 0..5 {
                        inbox_append(&path, &InboxMessage::new(format!("w{i}"), format!("{j}")))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(inbox_read(&inbox_path).unwrap().len(), 20);
    }
}
