use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Local,
    Api,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    Active,
    Inactive,
    Error,
}

impl EntityStatus {
    pub fn toggled(self) -> Self {
        match self {
            Self::Active => Self::Inactive,
            Self::Inactive | Self::Error => Self::Active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSnapshot {
    pub latency_ms: u32,
    /// Tokens per second.
    pub throughput: u32,
    /// Percent, 0-100.
    pub uptime: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParameters {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            top_p: 0.95,
            max_tokens: 2048,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ModelKind,
    pub provider: String,
    pub model_id: String,
    pub status: EntityStatus,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance: Option<PerformanceSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<GenerationParameters>,
}

/// Partial update for a [`Model`]. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ModelPatch {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<ModelKind>,
    pub provider: Option<String>,
    pub model_id: Option<String>,
    pub status: Option<EntityStatus>,
    pub capabilities: Option<Vec<String>>,
    pub performance: Option<PerformanceSnapshot>,
    pub api_base: Option<String>,
    pub parameters: Option<GenerationParameters>,
}

impl ModelPatch {
    pub fn status(status: EntityStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn apply_to(self, model: &mut Model) {
        if let Some(name) = self.name {
            model.name = name;
        }
        if let Some(kind) = self.kind {
            model.kind = kind;
        }
        if let Some(provider) = self.provider {
            model.provider = provider;
        }
        if let Some(model_id) = self.model_id {
            model.model_id = model_id;
        }
        if let Some(status) = self.status {
            model.status = status;
        }
        if let Some(capabilities) = self.capabilities {
            model.capabilities = dedupe_preserving_order(capabilities);
        }
        if let Some(performance) = self.performance {
            model.performance = Some(performance);
        }
        if let Some(api_base) = self.api_base {
            model.api_base = Some(api_base);
        }
        if let Some(parameters) = self.parameters {
            model.parameters = Some(parameters);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Id of the backing [`Model`]. May dangle.
    pub model: String,
    pub status: EntityStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
    #[serde(default)]
    pub conversations: u64,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_temperature() -> f32 {
    1.0
}

fn default_max_iterations() -> u32 {
    5
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AgentPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub model: Option<String>,
    pub status: Option<EntityStatus>,
    pub last_used: Option<DateTime<Utc>>,
    pub conversations: Option<u64>,
    pub system_prompt: Option<String>,
    pub tools: Option<Vec<String>>,
    pub temperature: Option<f32>,
    pub max_iterations: Option<u32>,
}

impl AgentPatch {
    pub fn apply_to(self, agent: &mut Agent) {
        if let Some(name) = self.name {
            agent.name = name;
        }
        if let Some(description) = self.description {
            agent.description = description;
        }
        if let Some(model) = self.model {
            agent.model = model;
        }
        if let Some(status) = self.status {
            agent.status = status;
        }
        if let Some(last_used) = self.last_used {
            agent.last_used = Some(last_used);
        }
        if let Some(conversations) = self.conversations {
            agent.conversations = conversations;
        }
        if let Some(system_prompt) = self.system_prompt {
            agent.system_prompt = system_prompt;
        }
        if let Some(tools) = self.tools {
            agent.tools = dedupe_preserving_order(tools);
        }
        if let Some(temperature) = self.temperature {
            agent.temperature = temperature;
        }
        if let Some(max_iterations) = self.max_iterations {
            agent.max_iterations = max_iterations;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: format!("msg-{}", uuid::Uuid::new_v4()),
            role: Role::User,
            content: content.into(),
            timestamp,
            model: None,
        }
    }

    pub fn assistant(
        content: impl Into<String>,
        model: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: format!("msg-{}-ai", uuid::Uuid::new_v4()),
            role: Role::Assistant,
            content: content.into(),
            timestamp,
            model: Some(model.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginStatus {
    Available,
    Installed,
    Development,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginCatalogEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub rating: f32,
    #[serde(default)]
    pub downloads: u64,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub is_installed: bool,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default = "default_plugin_status")]
    pub status: PluginStatus,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub trending: bool,
    #[serde(default)]
    pub new: bool,
}

fn default_plugin_status() -> PluginStatus {
    PluginStatus::Available
}

impl PluginCatalogEntry {
    pub fn mark_installed(&mut self) {
        self.is_installed = true;
        if self.status == PluginStatus::Available {
            self.status = PluginStatus::Installed;
        }
    }

    pub fn mark_uninstalled(&mut self) {
        self.is_installed = false;
        self.is_active = false;
        if self.status == PluginStatus::Installed {
            self.status = PluginStatus::Available;
        }
    }

    /// Restore `is_active => is_installed` on entries arriving from a catalog.
    pub fn normalize(&mut self) {
        if !self.is_installed {
            self.is_active = false;
        }
        self.rating = self.rating.clamp(0.0, 5.0);
        if self.price < 0.0 {
            self.price = 0.0;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PluginPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    pub is_installed: Option<bool>,
    pub is_active: Option<bool>,
    pub status: Option<PluginStatus>,
    pub rating: Option<f32>,
    pub downloads: Option<u64>,
}

impl PluginPatch {
    pub fn apply_to(self, plugin: &mut PluginCatalogEntry) {
        if let Some(name) = self.name {
            plugin.name = name;
        }
        if let Some(description) = self.description {
            plugin.description = description;
        }
        if let Some(version) = self.version {
            plugin.version = version;
        }
        if let Some(status) = self.status {
            plugin.status = status;
        }
        if let Some(rating) = self.rating {
            plugin.rating = rating;
        }
        if let Some(downloads) = self.downloads {
            plugin.downloads = downloads;
        }
        match self.is_installed {
            Some(true) => plugin.mark_installed(),
            Some(false) => plugin.mark_uninstalled(),
            None => {}
        }
        if let Some(is_active) = self.is_active {
            plugin.is_active = is_active;
        }
        plugin.normalize();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketplaceListing {
    #[serde(default)]
    pub plugins: Vec<PluginCatalogEntry>,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginConfig {
    pub plugin_id: String,
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateCatalogEntry {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub difficulty: Difficulty,
    pub rating: f32,
    pub downloads: u64,
    pub estimated_time: String,
    pub node_count: u32,
    pub connections: u32,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub author: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CacheSize {
    #[serde(rename = "256MB")]
    Mb256,
    #[serde(rename = "512MB")]
    Mb512,
    #[default]
    #[serde(rename = "1GB")]
    Gb1,
    #[serde(rename = "2GB")]
    Gb2,
    #[serde(rename = "4GB")]
    Gb4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
}

pub const MAX_CONCURRENT_REQUESTS_RANGE: std::ops::RangeInclusive<u32> = 1..=20;
pub const REQUEST_TIMEOUT_MS_RANGE: std::ops::RangeInclusive<u64> = 5_000..=120_000;

/// User preferences persisted as a single JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub theme: Theme,
    pub default_model: String,
    pub auto_save: bool,
    pub show_tooltips: bool,
    pub compact_mode: bool,

    pub openai_key: String,
    pub anthropic_key: String,
    pub minimax_key: String,
    pub custom_api_base: String,

    pub max_concurrent_requests: u32,
    pub request_timeout_ms: u64,
    pub enable_caching: bool,
    pub cache_size: CacheSize,

    pub enable_encryption: bool,
    pub log_level: LogLevel,
    pub enable_metrics: bool,

    pub email_notifications: bool,
    pub desktop_notifications: bool,
    pub sound_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::Dark,
            default_model: "minimax-m2-api".to_string(),
            auto_save: true,
            show_tooltips: true,
            compact_mode: false,
            openai_key: String::new(),
            anthropic_key: String::new(),
            minimax_key: String::new(),
            custom_api_base: String::new(),
            max_concurrent_requests: 5,
            request_timeout_ms: 30_000,
            enable_caching: true,
            cache_size: CacheSize::Gb1,
            enable_encryption: true,
            log_level: LogLevel::Info,
            enable_metrics: true,
            email_notifications: false,
            desktop_notifications: true,
            sound_enabled: false,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), AppError> {
        if !MAX_CONCURRENT_REQUESTS_RANGE.contains(&self.max_concurrent_requests) {
            return Err(AppError::validation(
                "maxConcurrentRequests",
                format!(
                    "Max concurrent requests must be between {} and {}",
                    MAX_CONCURRENT_REQUESTS_RANGE.start(),
                    MAX_CONCURRENT_REQUESTS_RANGE.end()
                ),
            ));
        }
        if !REQUEST_TIMEOUT_MS_RANGE.contains(&self.request_timeout_ms) {
            return Err(AppError::validation(
                "requestTimeout",
                format!(
                    "Request timeout must be between {} and {} ms",
                    REQUEST_TIMEOUT_MS_RANGE.start(),
                    REQUEST_TIMEOUT_MS_RANGE.end()
                ),
            ));
        }
        let base = self.custom_api_base.trim();
        if !base.is_empty() && !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(AppError::validation(
                "customApiBase",
                "Custom API base must be an http(s) URL",
            ));
        }
        Ok(())
    }

    /// Mutable handles to every secret field, in a fixed order.
    pub fn secrets_mut(&mut self) -> [&mut String; 3] {
        [
            &mut self.openai_key,
            &mut self.anthropic_key,
            &mut self.minimax_key,
        ]
    }
}

fn dedupe_preserving_order(values: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values
        .into_iter()
        .filter(|value| seen.insert(value.clone()))
        .collect()
}
