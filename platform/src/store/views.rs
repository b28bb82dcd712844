//! Pure projections over a [`StoreSnapshot`]. Nothing here mutates or fails.

use serde::{Deserialize, Serialize};

use super::{StoreSnapshot, ALL_CATEGORIES};
use crate::db::models::{
    Agent, ChatMessage, EntityStatus, PluginCatalogEntry, TemplateCatalogEntry,
};

pub const NO_MODEL_LABEL: &str = "No model selected";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_models: usize,
    pub active_models: usize,
    pub total_agents: usize,
    pub active_agents: usize,
    pub total_conversations: u64,
    pub installed_plugins: usize,
}

pub fn dashboard_stats(snapshot: &StoreSnapshot) -> DashboardStats {
    DashboardStats {
        total_models: snapshot.models.len(),
        active_models: snapshot
            .models
            .iter()
            .filter(|m| m.status == EntityStatus::Active)
            .count(),
        total_agents: snapshot.agents.len(),
        active_agents: snapshot
            .agents
            .iter()
            .filter(|a| a.status == EntityStatus::Active)
            .count(),
        total_conversations: snapshot.agents.iter().map(|a| a.conversations).sum(),
        installed_plugins: installed_plugins(&snapshot.plugins.catalog).len(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PluginFilter {
    pub query: String,
    pub category: String,
    pub installed_only: bool,
}

impl Default for PluginFilter {
    fn default() -> Self {
        Self {
            query: String::new(),
            category: ALL_CATEGORIES.to_string(),
            installed_only: false,
        }
    }
}

impl PluginFilter {
    /// The filter currently selected in the marketplace state.
    pub fn from_snapshot(snapshot: &StoreSnapshot) -> Self {
        Self {
            query: snapshot.plugins.search_query.clone(),
            category: snapshot.plugins.selected_category.clone(),
            installed_only: snapshot.plugins.installed_only,
        }
    }
}

/// Catalog order is preserved.
pub fn filtered_plugins(
    catalog: &[PluginCatalogEntry],
    filter: &PluginFilter,
) -> Vec<PluginCatalogEntry> {
    let needle = filter.query.trim().to_lowercase();
    catalog
        .iter()
        .filter(|plugin| {
            matches_text(&needle, &plugin.name, &plugin.description, &plugin.tags)
                && matches_selector(&filter.category, &plugin.category)
                && (!filter.installed_only || plugin.is_installed)
        })
        .cloned()
        .collect()
}

pub fn installed_plugins(catalog: &[PluginCatalogEntry]) -> Vec<PluginCatalogEntry> {
    catalog.iter().filter(|p| p.is_installed).cloned().collect()
}

pub fn active_plugins(catalog: &[PluginCatalogEntry]) -> Vec<PluginCatalogEntry> {
    catalog
        .iter()
        .filter(|p| p.is_installed && p.is_active)
        .cloned()
        .collect()
}

/// Categories as published by the catalog, falling back to the distinct
/// categories of its entries in first-seen order.
pub fn plugin_categories(snapshot: &StoreSnapshot) -> Vec<String> {
    if !snapshot.plugins.categories.is_empty() {
        return snapshot.plugins.categories.clone();
    }
    let mut categories: Vec<String> = Vec::new();
    for plugin in &snapshot.plugins.catalog {
        if !plugin.category.is_empty() && !categories.contains(&plugin.category) {
            categories.push(plugin.category.clone());
        }
    }
    categories
}

pub fn messages_for<'a>(snapshot: &'a StoreSnapshot, agent_id: &str) -> &'a [ChatMessage] {
    snapshot
        .chat_history
        .get(agent_id)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TemplateFilter {
    pub query: String,
    pub category: String,
    pub difficulty: String,
}

impl Default for TemplateFilter {
    fn default() -> Self {
        Self {
            query: String::new(),
            category: ALL_CATEGORIES.to_string(),
            difficulty: ALL_CATEGORIES.to_string(),
        }
    }
}

pub fn filtered_templates(
    templates: &[TemplateCatalogEntry],
    filter: &TemplateFilter,
) -> Vec<TemplateCatalogEntry> {
    let needle = filter.query.trim().to_lowercase();
    templates
        .iter()
        .filter(|template| {
            matches_text(&needle, &template.name, &template.description, &template.tags)
                && matches_selector(&filter.category, &template.category)
                && matches_selector(&filter.difficulty, template.difficulty.as_str())
        })
        .cloned()
        .collect()
}

pub fn active_agent(snapshot: &StoreSnapshot) -> Option<&Agent> {
    let id = snapshot.active_agent.as_deref()?;
    snapshot.agents.iter().find(|a| a.id == id)
}

/// Display name of the agent's model. Dangling references fall back to the
/// placeholder label.
pub fn agent_model_label(snapshot: &StoreSnapshot, agent: &Agent) -> String {
    snapshot
        .models
        .iter()
        .find(|m| m.id == agent.model)
        .map(|m| m.name.clone())
        .unwrap_or_else(|| NO_MODEL_LABEL.to_string())
}

fn matches_text(needle: &str, name: &str, description: &str, tags: &[String]) -> bool {
    needle.is_empty()
        || name.to_lowercase().contains(needle)
        || description.to_lowercase().contains(needle)
        || tags.iter().any(|tag| tag.to_lowercase().contains(needle))
}

fn matches_selector(selected: &str, value: &str) -> bool {
    let selected = selected.trim();
    selected.is_empty()
        || selected.eq_ignore_ascii_case(ALL_CATEGORIES)
        || selected.eq_ignore_ascii_case(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Difficulty;
    use crate::db::seed;
    use crate::store::EntityStore;

    fn catalog() -> Vec<PluginCatalogEntry> {
        seed::sample_plugins()
    }

    #[test]
    fn blank_filter_returns_whole_catalog_in_order() {
        let plugins = catalog();
        let filtered = filtered_plugins(&plugins, &PluginFilter::default());
        assert_eq!(filtered, plugins);
    }

    #[test]
    fn query_matches_name_description_and_tags_case_insensitively() {
        let plugins = catalog();
        let by_tag = filtered_plugins(
            &plugins,
            &PluginFilter {
                query: "RETRY".into(),
                ..PluginFilter::default()
            },
        );
        assert_eq!(by_tag.len(), 1);
        assert_eq!(by_tag[0].id, "webhook-handler");

        let by_description = filtered_plugins(
            &plugins,
            &PluginFilter {
                query: "vulnerability".into(),
                ..PluginFilter::default()
            },
        );
        assert_eq!(by_description[0].id, "security-scanner");
    }

    #[test]
    fn category_and_installed_only_combine() {
        let plugins = catalog();
        let filter = PluginFilter {
            query: String::new(),
            category: "Analytics".into(),
            installed_only: true,
        };
        let first = filtered_plugins(&plugins, &filter);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].id, "analytics-tracker");
        assert_eq!(filtered_plugins(&plugins, &filter), first);

        let none = filtered_plugins(
            &plugins,
            &PluginFilter {
                category: "communication".into(),
                installed_only: true,
                ..PluginFilter::default()
            },
        );
        assert!(none.is_empty());
    }

    #[test]
    fn installed_and_active_views() {
        let plugins = catalog();
        let installed: Vec<_> = installed_plugins(&plugins).into_iter().map(|p| p.id).collect();
        assert_eq!(installed, vec!["webhook-handler", "analytics-tracker"]);
        let active: Vec<_> = active_plugins(&plugins).into_iter().map(|p| p.id).collect();
        assert_eq!(active, vec!["webhook-handler"]);
    }

    #[test]
    fn template_filter_uses_all_sentinel_for_difficulty() {
        let templates = seed::sample_templates();
        let advanced = filtered_templates(
            &templates,
            &TemplateFilter {
                difficulty: Difficulty::Advanced.as_str().into(),
                ..TemplateFilter::default()
            },
        );
        assert_eq!(advanced.len(), 1);
        assert_eq!(advanced[0].id, "code-assistant");

        let email = filtered_templates(
            &templates,
            &TemplateFilter {
                query: "marketing".into(),
                category: "communication".into(),
                ..TemplateFilter::default()
            },
        );
        assert_eq!(email[0].id, "email-automation");
    }

    #[test]
    fn dashboard_counts_and_model_label() {
        let store = EntityStore::new();
        store.set_models(seed::sample_models()).unwrap();
        store.set_plugin_catalog(seed::sample_marketplace()).unwrap();
        let snapshot = store.snapshot();

        let stats = dashboard_stats(&snapshot);
        assert_eq!(stats.total_models, 4);
        assert_eq!(stats.active_models, 3);
        assert_eq!(stats.installed_plugins, 2);
        assert_eq!(stats.total_agents, 0);

        assert!(messages_for(&snapshot, "missing").is_empty());
        assert!(active_agent(&snapshot).is_none());
        assert_eq!(plugin_categories(&snapshot).len(), 6);
    }

    #[test]
    fn dangling_model_reference_uses_placeholder() {
        let mut snapshot = StoreSnapshot::default();
        snapshot.models = seed::sample_models();
        let agent = Agent {
            id: "a1".into(),
            name: "Helper".into(),
            description: String::new(),
            model: "gpt-4o".into(),
            status: EntityStatus::Active,
            created_at: chrono::Utc::now(),
            last_used: None,
            conversations: 3,
            system_prompt: String::new(),
            tools: Vec::new(),
            temperature: 1.0,
            max_iterations: 5,
        };
        assert_eq!(agent_model_label(&snapshot, &agent), "GPT-4o");

        let orphan = Agent {
            model: "deleted-model".into(),
            ..agent
        };
        assert_eq!(agent_model_label(&snapshot, &orphan), NO_MODEL_LABEL);
    }
}
