use super::{StoreError, read_json, remove_dir_if_present, write_json};
use crate::io::lock::{DEFAULT_LOCK_RETRIES, acquire_lock};
use crate::paths::StorageLayout;
use crate::schema::{AgentMember, TeamConfig};
use std::collections::HashMap;
use tracing::debug;

/// Team configuration documents at `<root>/teams/<team>/config.json`
#[derive(Debug, Clone)]
pub struct TeamStore {
    layout: StorageLayout,
}

impl TeamStore {
    pub fn new(layout: StorageLayout) -> Self {
        Self { layout }
    }

    /// Provision a team directory with a fresh config led by `lead_name`
    ///
    /// An existing config is replaced; the returned config has no members.
    pub fn create(
        &self,
        team: &str,
        lead_name: &str,
        lead_session_id: &str,
        description: Option<String>,
    ) -> Result<TeamConfig, StoreError> {
        let dir = self.layout.team_dir(team);
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let config = TeamConfig {
            name: team.to_string(),
            description,
            created_at: crate::schema::now_millis(),
            lead_agent_id: crate::agent_id(lead_name, team),
            lead_session_id: lead_session_id.to_string(),
            members: Vec::new(),
            unknown_fields: HashMap::new(),
        };

        let path = self.layout.team_config_path(team);
        let _lock = acquire_lock(&path.with_extension("lock"), DEFAULT_LOCK_RETRIES)?;
        write_json(&path, &config)?;
        debug!(team, "Created team config");
        Ok(config)
    }

    /// Read a team's config.
    pub fn get(&self, team: &str) -> Result<TeamConfig, StoreError> {
        read_json(&self.layout.team_config_path(team), || format!("team {team}"))
    }

    /// Add a member, replacing any existing member with the same name.
    pub fn add_member(&self, team: &str, member: AgentMember) -> Result<TeamConfig, StoreError> {
        self.update(team, |config| {
            config.upsert_member(member);
            true
        })
    }

    /// Remove a member by name. Returns whether it was present.
    pub fn remove_member(&self, team: &str, name: &str) -> Result<bool, StoreError> {
        let mut removed = false;
        self.update(team, |config| {
            let before = config.members.len();
            config.members.retain(|m| m.name != name);
            removed = config.members.len() != before;
            removed
        })?;
        Ok(removed)
    }

    /// Delete the team directory, mailboxes included.
    pub fn delete(&self, team: &str) -> Result<(), StoreError> {
        remove_dir_if_present(&self.layout.team_dir(team))
    }

    /// Locked read-modify-write of a team config
    ///
    /// `modify_fn` returns `false` to skip the write.
    fn update<F>(&self, team: &str, modify_fn: F) -> Result<TeamConfig, StoreError>
    where
        F: FnOnce(&mut TeamConfig) -> bool,
    {
        let path = self.layout.team_config_path(team);
        if !path.exists() {
            return Err(StoreError::NotFound(format!("team {team}")));
        }
        let _lock = acquire_lock(&path.with_extension("lock"), DEFAULT_LOCK_RETRIES)?;

        let mut config: TeamConfig = read_json(&path, || format!("team {team}"))?;
        if modify_fn(&mut config) {
            write_json(&path, &config)?;
        }
        Ok(config)
    }
}
