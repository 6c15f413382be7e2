//! Config-seeded directory of communities, commands and workflows.
//!
//! Serves [`CommandRegistry`], [`CommunityStore`] and [`WorkflowStore`] from
//! rows loaded at startup. Community-scoped command rows shadow global rows
//! for the same command.

use std::collections::HashMap;

use async_trait::async_trait;
use cmdhub_config::{DirectoryConfig, WorkflowRow, WorkflowTriggerSpec};
use cmdhub_core::{
    CommandInfo, CommandRegistry, CommunityStore, HubResult, MessageType, TranslationConfig,
    TriggerFilter, WorkflowStore, WorkflowTrigger,
};
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    entities: HashMap<String, String>,
    global_commands: HashMap<String, CommandInfo>,
    community_commands: HashMap<(String, String), CommandInfo>,
    installations: HashMap<(String, String), bool>,
    translation: HashMap<String, TranslationConfig>,
    workflows: Vec<WorkflowRow>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &DirectoryConfig) -> Self {
        let mut dir = Self::new();
        for (entity, community) in &config.entities {
            dir = dir.with_entity(entity, community);
        }
        for row in &config.commands {
            dir = dir.with_command(row.community_id.as_deref(), row.info.clone());
        }
        for row in &config.installations {
            dir = dir.with_installation(&row.community_id, &row.module_name, row.enabled);
        }
        for (community, translation) in &config.translation {
            dir = dir.with_translation(community, translation.clone());
        }
        dir.workflows = config.workflows.clone();
        debug!(
            entities = dir.entities.len(),
            commands = dir.global_commands.len() + dir.community_commands.len(),
            workflows = dir.workflows.len(),
            "Directory loaded"
        );
        dir
    }

    pub fn with_entity(mut self, entity_id: &str, community_id: &str) -> Self {
        self.entities.insert(entity_id.to_string(), community_id.to_string());
        self
    }

    /// Register a command. `None` makes it available to every community.
    pub fn with_command(mut self, community_id: Option<&str>, mut info: CommandInfo) -> Self {
        info.command = info.command.to_lowercase();
        match community_id {
            Some(community) => {
                self.community_commands
                    .insert((community.to_string(), info.command.clone()), info);
            }
            None => {
                self.global_commands.insert(info.command.clone(), info);
            }
        }
        self
    }

    pub fn with_installation(mut self, community_id: &str, module_name: &str, enabled: bool) -> Self {
        self.installations
            .insert((community_id.to_string(), module_name.to_string()), enabled);
        self
    }

    pub fn with_translation(mut self, community_id: &str, config: TranslationConfig) -> Self {
        self.translation.insert(community_id.to_string(), config);
        self
    }

    pub fn with_workflow(mut self, row: WorkflowRow) -> Self {
        self.workflows.push(row);
        self
    }
}

fn trigger_matches(spec: &WorkflowTriggerSpec, filter: &TriggerFilter) -> bool {
    match (spec, filter) {
        (WorkflowTriggerSpec::Command { command }, TriggerFilter::Command { command: wanted, .. }) => {
            command.eq_ignore_ascii_case(wanted)
        }
        (
            WorkflowTriggerSpec::Event { message_type },
            TriggerFilter::MessageType { message_type: wanted, .. },
        ) => message_type == wanted,
        _ => false,
    }
}

#[async_trait]
impl CommandRegistry for StaticDirectory {
    async fn get_command(&self, command: &str, community_id: &str) -> HubResult<Option<CommandInfo>> {
        let command = command.to_lowercase();
        Ok(self
            .community_commands
            .get(&(community_id.to_string(), command.clone()))
            .or_else(|| self.global_commands.get(&command))
            .cloned())
    }
}

#[async_trait]
impl CommunityStore for StaticDirectory {
    async fn active_community(&self, entity_id: &str) -> HubResult<Option<String>> {
        Ok(self.entities.get(entity_id).cloned())
    }

    async fn module_installation(
        &self,
        community_id: &str,
        module_name: &str,
    ) -> HubResult<Option<bool>> {
        Ok(self
            .installations
            .get(&(community_id.to_string(), module_name.to_string()))
            .copied())
    }

    async fn translation_config(&self, community_id: &str) -> HubResult<Option<TranslationConfig>> {
        Ok(self.translation.get(community_id).cloned())
    }
}

#[async_trait]
impl WorkflowStore for StaticDirectory {
    async fn matching_workflows(&self, filter: &TriggerFilter) -> HubResult<Vec<WorkflowTrigger>> {
        Ok(self
            .workflows
            .iter()
            .filter(|wf| wf.active && wf.published && wf.entity_id == filter.entity_id())
            .filter(|wf| trigger_matches(&wf.trigger, filter))
            .map(|wf| WorkflowTrigger {
                workflow_id: wf.workflow_id.clone(),
                trigger_config: wf.trigger_config.clone(),
            })
            .collect())
    }
}

/// Convenience for building event-triggered rows in code.
pub fn event_workflow(workflow_id: &str, entity_id: &str, message_type: MessageType) -> WorkflowRow {
    WorkflowRow {
        workflow_id: workflow_id.to_string(),
        entity_id: entity_id.to_string(),
        trigger: WorkflowTriggerSpec::Event { message_type },
        trigger_config: serde_json::Value::Null,
        active: true,
        published: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn info(command: &str, module: &str) -> CommandInfo {
        CommandInfo {
            command: command.into(),
            module_name: module.into(),
            module_url: format!("http://{module}:8000"),
            is_enabled: true,
            cooldown_seconds: 0,
        }
    }

    fn command_workflow(id: &str, command: &str) -> WorkflowRow {
        WorkflowRow {
            workflow_id: id.into(),
            entity_id: "disc-1".into(),
            trigger: WorkflowTriggerSpec::Command { command: command.into() },
            trigger_config: json!({"note": id}),
            active: true,
            published: true,
        }
    }

    #[tokio::test]
    async fn community_rows_shadow_global_rows() {
        let dir = StaticDirectory::new()
            .with_command(None, info("!so", "shoutout"))
            .with_command(Some("community-2"), info("!SO", "custom-shoutout"));

        let global = dir.get_command("!so", "community-1").await.unwrap().unwrap();
        let scoped = dir.get_command("!so", "community-2").await.unwrap().unwrap();
        assert_eq!(global.module_name, "shoutout");
        assert_eq!(scoped.module_name, "custom-shoutout");
        assert!(dir.get_command("!nope", "community-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn community_records() {
        let dir = StaticDirectory::new()
            .with_entity("disc-1", "community-1")
            .with_installation("community-1", "quotes", false)
            .with_translation("community-1", TranslationConfig { enabled: true, ..Default::default() });

        assert_eq!(dir.active_community("disc-1").await.unwrap().as_deref(), Some("community-1"));
        assert!(dir.active_community("disc-2").await.unwrap().is_none());
        assert_eq!(dir.module_installation("community-1", "quotes").await.unwrap(), Some(false));
        assert_eq!(dir.module_installation("community-1", "shoutout").await.unwrap(), None);
        assert!(dir.translation_config("community-1").await.unwrap().unwrap().enabled);
    }

    #[tokio::test]
    async fn only_active_published_workflows_match() {
        let mut draft = command_workflow("wf-draft", "!so");
        draft.published = false;
        let mut inactive = command_workflow("wf-off", "!so");
        inactive.active = false;
        let dir = StaticDirectory::new()
            .with_workflow(command_workflow("wf-1", "!so"))
            .with_workflow(draft)
            .with_workflow(inactive)
            .with_workflow(command_workflow("wf-other", "!quote"))
            .with_workflow(event_workflow("wf-raid", "disc-1", MessageType::Raid));

        let filter = TriggerFilter::Command { entity_id: "disc-1".into(), command: "!so".into() };
        let hits = dir.matching_workflows(&filter).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].workflow_id, "wf-1");
        assert_eq!(hits[0].trigger_config, json!({"note": "wf-1"}));

        let raid = TriggerFilter::MessageType {
            entity_id: "disc-1".into(),
            message_type: MessageType::Raid,
        };
        assert_eq!(dir.matching_workflows(&raid).await.unwrap()[0].workflow_id, "wf-raid");

        let elsewhere = TriggerFilter::Command { entity_id: "disc-9".into(), command: "!so".into() };
        assert!(dir.matching_workflows(&elsewhere).await.unwrap().is_empty());
    }

    #[test]
    fn from_config_loads_rows() {
        let mut config = DirectoryConfig::default();
        config.entities.insert("disc-1".into(), "community-1".into());
        config.commands.push(cmdhub_config::CommandRow {
            community_id: None,
            info: info("!so", "shoutout"),
        });
        let dir = StaticDirectory::from_config(&config);
        assert_eq!(dir.entities.len(), 1);
        assert!(dir.global_commands.contains_key("!so"));
    }
}
