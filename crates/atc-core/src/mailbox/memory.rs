use super::{Mailbox, MailboxError};
use crate::schema::InboxMessage;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

type Boxes = HashMap<(String, String), Vec<InboxMessage>>;

/// Process-local mailboxes with the same contract as [`super::FileMailbox`]
#[derive(Debug, Default)]
pub struct MemoryMailbox {
    boxes: Mutex<Boxes>,
}

impl MemoryMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    fn boxes(&self) -> MutexGuard<'_, Boxes> {
        self.boxes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn key(team: &str, agent: &str) -> (String, String) {
        (team.to_string(), agent.to_string())
    }

    fn not_found(team: &str, agent: &str) -> MailboxError {
        MailboxError::NotFound {
            team: team.to_string(),
            agent: agent.to_string(),
        }
    }
}

impl Mailbox for MemoryMailbox {
    fn write(&self, team: &str, agent: &str, entry: &InboxMessage) -> Result<(), MailboxError> {
        let mut entry = entry.clone();
        entry.read = false;
        self.boxes()
            .entry(Self::key(team, agent))
            .or_default()
            .push(entry);
        Ok(())
    }

    fn read_all(&self, team: &str, agent: &str) -> Result<Vec<InboxMessage>, MailboxError> {
        self.boxes()
            .get(&Self::key(team, agent))
            .cloned()
            .ok_or_else(|| Self::not_found(team, agent))
    }

    fn read_unread(&self, team: &str, agent: &str) -> Result<Vec<InboxMessage>, MailboxError> {
        let mut boxes = self.boxes();
        let entries = boxes
            .get_mut(&Self::key(team, agent))
            .ok_or_else(|| Self::not_found(team, agent))?;

        let mut taken = Vec::new();
        for entry in entries.iter_mut().filter(|m| !m.read) {
            taken.push(entry.clone());
            entry.read = true;
        }
        Ok(taken)
    }

    fn ensure_inbox(&self, team: &str, agent: &str) -> Result<(), MailboxError> {
        self.boxes().entry(Self::key(team, agent)).or_default();
        Ok(())
    }

    fn remove_team(&self, team: &str) -> Result<(), MailboxError> {
        self.boxes().retain(|(t, _), _| t != team);
        Ok(())
    }
}
