use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::{Agent, ChatMessage, Model, Settings};
use crate::error::AppError;
use crate::services::clock::Clock;
use crate::services::settings_service::SettingsService;
use crate::store::EntityStore;

pub const BUNDLE_VERSION: u32 = 1;

const LOG_TARGET: &str = "agent_platform.data";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    #[serde(default)]
    pub models: Vec<Model>,
    #[serde(default)]
    pub agents: Vec<Agent>,
    #[serde(default)]
    pub chat_history: BTreeMap<String, Vec<ChatMessage>>,
    /// API keys are always blank in exports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub models: usize,
    pub agents: usize,
    pub chat_histories: usize,
}

#[derive(Clone)]
pub struct DataService {
    store: EntityStore,
    settings: SettingsService,
    clock: Arc<dyn Clock>,
}

impl DataService {
    pub fn new(store: EntityStore, settings: SettingsService, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            settings,
            clock,
        }
    }

    pub async fn export(&self) -> Result<ExportBundle, AppError> {
        let mut settings = self.settings.load().await?;
        for secret in settings.secrets_mut() {
            secret.clear();
        }

        let snapshot = self.store.snapshot();
        Ok(ExportBundle {
            version: BUNDLE_VERSION,
            exported_at: self.clock.now(),
            models: snapshot.models,
            agents: snapshot.agents,
            chat_history: snapshot
                .chat_history
                .into_iter()
                .filter(|(_, messages)| !messages.is_empty())
                .collect(),
            settings: Some(settings),
        })
    }

    pub async fn export_json(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string_pretty(&self.export().await?)?)
    }

    /// Merges a bundle into the store without overwriting anything: models
    /// and agents with known ids are skipped, and histories are only restored
    /// for agents that have none. Settings in the bundle are ignored.
    pub fn import(&self, bundle: ExportBundle) -> Result<ImportSummary, AppError> {
        if bundle.version == 0 || bundle.version > BUNDLE_VERSION {
            return Err(AppError::validation(
                "version",
                format!("Unsupported export version {}", bundle.version),
            ));
        }

        let mut summary = ImportSummary::default();
        for model in bundle.models {
            if self.store.model(&model.id).is_none() && self.store.add_model(model).is_ok() {
                summary.models += 1;
            }
        }
        for agent in bundle.agents {
            if self.store.agent(&agent.id).is_none() && self.store.add_agent(agent).is_ok() {
                summary.agents += 1;
            }
        }
        for (agent_id, messages) in bundle.chat_history {
            if messages.is_empty() || !self.store.messages(&agent_id).is_empty() {
                continue;
            }
            if self.store.set_messages(&agent_id, messages).is_ok() {
                summary.chat_histories += 1;
            }
        }

        crate::log_info!(
            LOG_TARGET,
            "Imported {} models, {} agents, {} chat histories",
            summary.models,
            summary.agents,
            summary.chat_histories
        );
        Ok(summary)
    }

    pub fn import_json(&self, json: &str) -> Result<ImportSummary, AppError> {
        let bundle: ExportBundle = serde_json::from_str(json)
            .map_err(|e| AppError::from(e).context("parse export bundle"))?;
        self.import(bundle)
    }
}
