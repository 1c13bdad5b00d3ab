//! Atomic file I/O operations for agent team inboxes
//!
//! This module provides safe, conflict-aware file operations for the
//! `<root>/teams/` file structure. Key features:
//!
//! - **Atomic swap**: Platform-specific atomic file exchange (macOS/Linux)
//! - **File locking**: Advisory locks with exponential backoff retry
//! - **Conflict detection**: BLAKE3 hashing to detect writers that bypassed the lock
//! - **Round-trip preservation**: Unknown JSON fields preserved on read-modify-write
//!
//! # Example
//!
//! ```rust,no_run
//! use agent_team_controller_core::io::{inbox_append, inbox_take_unread};
//! use agent_team_controller_core::InboxMessage;
//! use std::path::Path;
//!
//! let inbox_path = Path::new("/home/user/.claude/teams/my-team/inboxes/controller.json");
//! inbox_append(inbox_path, &InboxMessage::new("w1", "hello")).unwrap();
//!
//! for message in inbox_take_unread(inbox_path).unwrap() {
//!     println!("{}: {}", message.from, message.text);
//! }
//! ```

pub mod atomic;
pub mod error;
pub mod hash;
pub mod inbox;
pub mod lock;

pub use error::InboxError;
pub use inbox::{WriteOutcome, inbox_append, inbox_ensure, inbox_read, inbox_take_unread};
