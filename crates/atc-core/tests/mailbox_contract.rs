//! Behaviour shared by every `Mailbox` backend.

use agent_team_controller_core::paths::StorageLayout;
use agent_team_controller_core::protocol::{IdleNotification, StructuredMessage};
use agent_team_controller_core::{FileMailbox, InboxMessage, Mailbox, MemoryMailbox, decode, encode};
use tempfile::TempDir;

fn backends() -> Vec<(&'static str, Box<dyn Mailbox>, Option<TempDir>)> {
    let temp_dir = TempDir::new().unwrap();
    let file = FileMailbox::new(StorageLayout::new(temp_dir.path()));
    vec![
        ("file", Box::new(file), Some(temp_dir)),
        ("memory", Box::new(MemoryMailbox::new()), None),
    ]
}

#[test]
fn test_append_order_is_preserved() {
    for (name, mailbox, _guard) in backends() {
        for i in 0..5 {
            mailbox
                .write("alpha", "w1", &InboxMessage::new("controller", format!("m{i}")))
                .unwrap();
        }
        let texts: Vec<_> = mailbox
            .read_all("alpha", "w1")
            .unwrap()
            .into_iter()
            .map(|m| m.text)
            .collect();
        assert_eq!(texts, ["m0", "m1", "m2", "m3", "m4"], "backend {name}");
    }
}

#[test]
fn test_unread_entries_are_delivered_exactly_once() {
    for (name, mailbox, _guard) in backends() {
        mailbox.ensure_inbox("alpha", "controller").unwrap();
        mailbox
            .write("alpha", "controller", &InboxMessage::new("w1", "first"))
            .unwrap();

        let batch = mailbox.read_unread("alpha", "controller").unwrap();
        assert_eq!(batch.len(), 1, "backend {name}");

        mailbox
            .write("alpha", "controller", &InboxMessage::new("w2", "second"))
            .unwrap();
        let batch = mailbox.read_unread("alpha", "controller").unwrap();
        assert_eq!(batch.len(), 1, "backend {name}");
        assert_eq!(batch[0].text, "second", "backend {name}");

        assert!(mailbox.read_unread("alpha", "controller").unwrap().is_empty());
        assert_eq!(mailbox.read_all("alpha", "controller").unwrap().len(), 2);
    }
}

#[test]
fn test_structured_payload_survives_the_mailbox() {
    for (name, mailbox, _guard) in backends() {
        let idle = StructuredMessage::IdleNotification(IdleNotification {
            from: Some("w1".into()),
            idle_reason: Some("available".into()),
            summary: Some("done".into()),
            completed_task_id: Some("42".into()),
            ..Default::default()
        });
        mailbox
            .write("alpha", "controller", &InboxMessage::new("w1", encode(&idle)))
            .unwrap();

        let entries = mailbox.read_unread("alpha", "controller").unwrap();
        assert_eq!(decode(&entries[0]), idle, "backend {name}");
    }
}

#[test]
fn test_removed_team_reads_not_found() {
    for (name, mailbox, _guard) in backends() {
        mailbox
            .write("alpha", "w1", &InboxMessage::new("controller", "x"))
            .unwrap();
        mailbox.remove_team("alpha").unwrap();

        let err = mailbox.read_unread("alpha", "w1").unwrap_err();
        assert!(err.is_not_found(), "backend {name}: {err}");
    }
}
