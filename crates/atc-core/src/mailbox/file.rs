use super::{Mailbox, MailboxError};
use crate::io::{inbox_append, inbox_ensure, inbox_read, inbox_take_unread};
use crate::paths::StorageLayout;
use crate::schema::InboxMessage;
use std::fs;
use tracing::debug;

/// Mailboxes stored as JSON arrays at `<root>/teams/<team>/inboxes/<agent>.json`
#[derive(Debug, Clone)]
pub struct FileMailbox {
    layout: StorageLayout,
}

impl FileMailbox {
    pub fn new(layout: StorageLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    fn create_inboxes_dir(&self, team: &str) -> Result<(), MailboxError> {
        let dir = self.layout.inboxes_dir(team);
        fs::create_dir_all(&dir).map_err(|source| MailboxError::Io { path: dir, source })
    }
}

impl Mailbox for FileMailbox {
    fn write(&self, team: &str, agent: &str, entry: &InboxMessage) -> Result<(), MailboxError> {
        self.create_inboxes_dir(team)?;
        let path = self.layout.inbox_path(team, agent);
        let outcome =
            inbox_append(&path, entry).map_err(|e| MailboxError::from_inbox(team, agent, e))?;
        debug!(team, agent, ?outcome, "Wrote inbox entry");
        Ok(())
    }

    fn read_all(&self, team: &str, agent: &str) -> Result<Vec<InboxMessage>, MailboxError> {
        inbox_read(&self.layout.inbox_path(team, agent))
            .map_err(|e| MailboxError::from_inbox(team, agent, e))
    }

    fn read_unread(&self, team: &str, agent: &str) -> Result<Vec<InboxMessage>, MailboxError> {
        inbox_take_unread(&self.layout.inbox_path(team, agent))
            .map_err(|e| MailboxError::from_inbox(team, agent, e))
    }

    fn ensure_inbox(&self, team: &str, agent: &str) -> Result<(), MailboxError> {
        self.create_inboxes_dir(team)?;
        inbox_ensure(&self.layout.inbox_path(team, agent))
            .map_err(|e| MailboxError::from_inbox(team, agent, e))
    }

    fn remove_team(&self, team: &str) -> Result<(), MailboxError> {
        let dir = self.layout.inboxes_dir(team);
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(MailboxError::Io { path: dir, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn mailbox() -> (TempDir, FileMailbox) {
        let temp_dir = TempDir::new().unwrap();
        let mailbox = FileMailbox::new(StorageLayout::new(temp_dir.path()));
        (temp_dir, mailbox)
    }

    #[test]
    fn test_write_creates_missing_directories() {
        let (temp_dir, mailbox) = mailbox();
        mailbox
            .write("alpha", "w1", &InboxMessage::new("controller", "hi"))
            .unwrap();

        assert!(temp_dir.path().join("teams/alpha/inboxes/w1.json").exists());
        let entries = mailbox.read_all("alpha", "w1").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "hi");
    }

    #[test]
    fn test_read_unknown_team_or_agent_is_not_found() {
        let (_temp_dir, mailbox) = mailbox();
        assert!(mailbox.read_all("ghost", "w1").unwrap_err().is_not_found());

        mailbox.ensure_inbox("alpha", "w1").unwrap();
        let err = mailbox.read_unread("alpha", "w2").unwrap_err();
        assert!(matches!(
            err,
            MailboxError::NotFound { ref team, ref agent } if team == "alpha" && agent == "w2"
        ));
    }

    #[test]
    fn test_read_unread_delivers_each_entry_once() {
        let (_temp_dir, mailbox) = mailbox();
        mailbox.ensure_inbox("alpha", "controller").unwrap();
        assert!(mailbox.read_unread("alpha", "controller").unwrap().is_empty());

        mailbox
            .write("alpha", "controller", &InboxMessage::new("w1", "1"))
            .unwrap();
        mailbox
            .write("alpha", "controller", &InboxMessage::new("w1", "2"))
            .unwrap();

        let batch = mailbox.read_unread("alpha", "controller").unwrap();
        assert_eq!(batch.iter().map(|m| m.text.as_str()).collect::<Vec<_>>(), ["1", "2"]);
        assert!(mailbox.read_unread("alpha", "controller").unwrap().is_empty());
        assert!(mailbox
            .read_all("alpha", "controller")
            .unwrap()
            .iter()
            .all(|m| m.read));
    }

    #[test]
    fn test_remove_team_deletes_mailboxes() {
        let (_temp_dir, mailbox) = mailbox();
        mailbox
            .write("alpha", "w1", &InboxMessage::new("controller", "x"))
            .unwrap();
        mailbox.remove_team("alpha").unwrap();
        mailbox.remove_team("alpha").unwrap();

        assert!(mailbox.read_all("alpha", "w1").unwrap_err().is_not_found());
    }
}
