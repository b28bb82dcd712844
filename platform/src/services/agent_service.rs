use std::ops::RangeInclusive;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::db::models::{Agent, AgentPatch, EntityStatus};
use crate::error::AppError;
use crate::services::clock::Clock;
use crate::store::EntityStore;

const LOG_TARGET: &str = "agent_platform.agents";

pub const TEMPERATURE_RANGE: RangeInclusive<f32> = 0.0..=2.0;
pub const MAX_ITERATIONS_RANGE: RangeInclusive<u32> = 1..=20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOption {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub category: &'static str,
}

pub const TOOL_OPTIONS: [ToolOption; 5] = [
    ToolOption {
        id: "web_search",
        name: "Web Search",
        description: "Search the internet for information",
        category: "search",
    },
    ToolOption {
        id: "code_execution",
        name: "Code Execution",
        description: "Run code snippets in a sandbox",
        category: "development",
    },
    ToolOption {
        id: "terminal",
        name: "Terminal",
        description: "Execute shell commands",
        category: "development",
    },
    ToolOption {
        id: "file_operations",
        name: "File Operations",
        description: "Read and write files",
        category: "utility",
    },
    ToolOption {
        id: "api_calls",
        name: "API Calls",
        description: "Make HTTP requests to external APIs",
        category: "utility",
    },
];

/// Form state of the agent builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentDraft {
    pub name: String,
    pub description: String,
    /// Id of the selected model; empty until one is picked.
    pub model: String,
    pub system_prompt: String,
    pub tools: Vec<String>,
    pub temperature: f32,
    pub max_iterations: u32,
}

impl Default for AgentDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            model: String::new(),
            system_prompt: String::new(),
            tools: Vec::new(),
            temperature: 1.0,
            max_iterations: 5,
        }
    }
}

impl AgentDraft {
    pub fn toggle_tool(&mut self, tool_id: &str) {
        toggle(&mut self.tools, tool_id);
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() || self.model.trim().is_empty() {
            return Err(AppError::validation(
                if self.name.trim().is_empty() { "name" } else { "model" },
                "Please fill in required fields",
            ));
        }
        if !TEMPERATURE_RANGE.contains(&self.temperature) {
            return Err(AppError::validation(
                "temperature",
                "Temperature must be between 0 and 2",
            ));
        }
        if !MAX_ITERATIONS_RANGE.contains(&self.max_iterations) {
            return Err(AppError::validation(
                "maxIterations",
                "Max iterations must be between 1 and 20",
            ));
        }
        Ok(())
    }
}

fn toggle(tools: &mut Vec<String>, tool_id: &str) {
    if let Some(position) = tools.iter().position(|t| t == tool_id) {
        tools.remove(position);
    } else {
        tools.push(tool_id.to_string());
    }
}

#[derive(Clone)]
pub struct AgentBuilderService {
    store: EntityStore,
    clock: Arc<dyn Clock>,
}

impl AgentBuilderService {
    pub fn new(store: EntityStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn tool_options(&self) -> &'static [ToolOption] {
        &TOOL_OPTIONS
    }

    /// Creates an inactive agent from a validated draft and returns it.
    pub fn create_agent(&self, draft: AgentDraft) -> Result<Agent, AppError> {
        draft.validate()?;

        let mut tools = Vec::new();
        for tool in draft.tools {
            if !tools.contains(&tool) {
                tools.push(tool);
            }
        }

        let agent = Agent {
            id: format!("agent-{}", uuid::Uuid::new_v4()),
            name: draft.name.trim().to_string(),
            description: draft.description,
            model: draft.model.trim().to_string(),
            status: EntityStatus::Inactive,
            created_at: self.clock.now(),
            last_used: None,
            conversations: 0,
            system_prompt: draft.system_prompt,
            tools,
            temperature: draft.temperature,
            max_iterations: draft.max_iterations,
        };

        self.store.add_agent(agent.clone())?;
        crate::log_info!(LOG_TARGET, "Created agent {} ({})", agent.name, agent.id);
        Ok(agent)
    }

    pub fn toggle_tool(&self, agent_id: &str, tool_id: &str) -> Result<Agent, AppError> {
        let agent = self
            .store
            .agent(agent_id)
            .ok_or_else(|| AppError::not_found("agent", agent_id))?;
        let mut tools = agent.tools;
        toggle(&mut tools, tool_id);
        self.store.update_agent(
            agent_id,
            AgentPatch {
                tools: Some(tools),
                ..AgentPatch::default()
            },
        );
        self.store
            .agent(agent_id)
            .ok_or_else(|| AppError::not_found("agent", agent_id))
    }

    /// Makes the agent active and selects it for chat.
    pub fn activate_agent(&self, agent_id: &str) -> Result<(), AppError> {
        if self.store.agent(agent_id).is_none() {
            return Err(AppError::not_found("agent", agent_id));
        }
        self.store.update_agent(
            agent_id,
            AgentPatch {
                status: Some(EntityStatus::Active),
                ..AgentPatch::default()
            },
        );
        self.store.set_active_agent(Some(agent_id));
        Ok(())
    }

    pub fn delete_agent(&self, agent_id: &str) -> bool {
        let removed = self.store.remove_agent(agent_id);
        if removed {
            crate::log_info!(LOG_TARGET, "Deleted agent {}", agent_id);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::clock::TokioClock;

    fn draft() -> AgentDraft {
        AgentDraft {
            name: "Support Bot".into(),
            model: "gpt-4o".into(),
            ..AgentDraft::default()
        }
    }

    #[test]
    fn missing_name_or_model_is_rejected_without_mutation() {
        let store = EntityStore::new();
        let service = AgentBuilderService::new(store.clone(), Arc::new(TokioClock));

        let err = service
            .create_agent(AgentDraft {
                name: "   ".into(),
                ..draft()
            })
            .unwrap_err();
        assert_eq!(err.user_message(), "Please fill in required fields");

        assert!(service
            .create_agent(AgentDraft {
                model: String::new(),
                ..draft()
            })
            .is_err());
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn created_agent_starts_inactive_with_zero_conversations() {
        let store = EntityStore::new();
        let service = AgentBuilderService::new(store.clone(), Arc::new(TokioClock));

        let mut form = draft();
        form.toggle_tool("web_search");
        form.toggle_tool("terminal");
        form.toggle_tool("web_search");

        let agent = service.create_agent(form).unwrap();
        assert!(agent.id.starts_with("agent-"));
        assert_eq!(agent.status, EntityStatus::Inactive);
        assert_eq!(agent.conversations, 0);
        assert_eq!(agent.tools, vec!["terminal".to_string()]);
        assert_eq!(store.agents(), vec![agent]);
    }

    #[test]
    fn activate_and_delete_manage_active_pointer() {
        let store = EntityStore::new();
        let service = AgentBuilderService::new(store.clone(), Arc::new(TokioClock));
        let agent = service.create_agent(draft()).unwrap();

        service.activate_agent(&agent.id).unwrap();
        assert_eq!(store.active_agent().unwrap().status, EntityStatus::Active);

        let updated = service.toggle_tool(&agent.id, "api_calls").unwrap();
        assert_eq!(updated.tools, vec!["api_calls".to_string()]);

        assert!(service.delete_agent(&agent.id));
        assert!(store.snapshot().active_agent.is_none());
        assert!(matches!(
            service.activate_agent(&agent.id),
            Err(AppError::NotFound { .. })
        ));
    }

    #[test]
    fn out_of_range_tuning_is_rejected() {
        let mut form = draft();
        form.temperature = 2.5;
        assert!(form.validate().is_err());
        form.temperature = 0.7;
        form.max_iterations = 0;
        assert!(form.validate().is_err());
    }
}
