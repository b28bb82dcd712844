//! The entity store: the single owner of the session's models, agents, chat
//! history, plugin and template catalogs and UI flags.
//!
//! Every mutation goes through an [`EntityStore`] method. Mutators are
//! synchronous, never touch the network, and notify listeners with a full
//! snapshot once the write lock is released. Mutations that change nothing
//! (unknown ids, equal values) do not notify.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;

use crate::db::models::{
    Agent, AgentPatch, ChatMessage, MarketplaceListing, Model, ModelPatch, PluginCatalogEntry,
    PluginPatch, TemplateCatalogEntry, Theme,
};
use crate::error::AppError;

pub mod views;

pub const ALL_CATEGORIES: &str = "all";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginMarketplaceState {
    pub catalog: Vec<PluginCatalogEntry>,
    pub categories: Vec<String>,
    pub search_query: String,
    pub selected_category: String,
    pub installed_only: bool,
    pub is_loading: bool,
    pub error: Option<String>,
    pub installation_progress: BTreeMap<String, u8>,
}

impl Default for PluginMarketplaceState {
    fn default() -> Self {
        Self {
            catalog: Vec::new(),
            categories: Vec::new(),
            search_query: String::new(),
            selected_category: ALL_CATEGORIES.to_string(),
            installed_only: false,
            is_loading: false,
            error: None,
            installation_progress: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub theme: Theme,
    pub sidebar_collapsed: bool,
    pub right_panel_collapsed: bool,

    pub models: Vec<Model>,
    pub agents: Vec<Agent>,
    pub active_agent: Option<String>,
    pub chat_history: BTreeMap<String, Vec<ChatMessage>>,
    pub plugins: PluginMarketplaceState,
    pub templates: Vec<TemplateCatalogEntry>,

    pub is_loading_models: bool,
    pub is_loading_agents: bool,
    pub is_connecting: bool,
}

/// Which slice of the snapshot a mutation touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum StoreChange {
    Ui,
    Models,
    Agents,
    ActiveAgent,
    Chat(String),
    Plugins,
    PluginProgress(String),
    Templates,
}

#[derive(Debug, Clone)]
pub struct StoreEvent {
    /// Strictly increasing per store; lets consumers discard stale events.
    pub version: u64,
    pub change: StoreChange,
    pub snapshot: Arc<StoreSnapshot>,
}

pub trait StoreListener: Send + Sync {
    fn on_change(&self, event: &StoreEvent);

    /// Closed listeners are dropped on the next dispatch.
    fn is_closed(&self) -> bool {
        false
    }
}

impl<F> StoreListener for F
where
    F: Fn(&StoreEvent) + Send + Sync,
{
    fn on_change(&self, event: &StoreEvent) {
        self(event)
    }
}

struct ChannelListener {
    tx: flume::Sender<StoreEvent>,
}

impl StoreListener for ChannelListener {
    fn on_change(&self, event: &StoreEvent) {
        let _ = self.tx.send(event.clone());
    }

    fn is_closed(&self) -> bool {
        self.tx.is_disconnected()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct StoreInner {
    state: RwLock<StoreSnapshot>,
    version: AtomicU64,
    listeners: RwLock<Vec<(SubscriptionId, Arc<dyn StoreListener>)>>,
    next_listener: AtomicU64,
}

/// Cheaply cloneable handle; clones share the same state.
#[derive(Clone)]
pub struct EntityStore {
    inner: Arc<StoreInner>,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore {
    pub fn new() -> Self {
        Self::with_snapshot(StoreSnapshot::default())
    }

    pub fn with_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(snapshot),
                version: AtomicU64::new(0),
                listeners: RwLock::new(Vec::new()),
                next_listener: AtomicU64::new(1),
            }),
        }
    }

    // ---- reading ----------------------------------------------------------

    pub fn snapshot(&self) -> StoreSnapshot {
        self.read(Clone::clone)
    }

    pub fn read<R>(&self, f: impl FnOnce(&StoreSnapshot) -> R) -> R {
        let guard = self
            .inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::SeqCst)
    }

    // ---- subscriptions ----------------------------------------------------

    pub fn subscribe(&self, listener: Arc<dyn StoreListener>) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_listener.fetch_add(1, Ordering::SeqCst));
        self.inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self
            .inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Channel-backed subscription. Dropping the receiver unsubscribes.
    pub fn watch(&self) -> flume::Receiver<StoreEvent> {
        let (tx, rx) = flume::unbounded();
        self.subscribe(Arc::new(ChannelListener { tx }));
        rx
    }

    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn try_commit<F>(&self, change: StoreChange, f: F) -> Result<bool, AppError>
    where
        F: FnOnce(&mut StoreSnapshot) -> Result<bool, AppError>,
    {
        let event = {
            let mut state = self
                .inner
                .state
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if !f(&mut state)? {
                return Ok(false);
            }
            StoreEvent {
                version: self.inner.version.fetch_add(1, Ordering::SeqCst) + 1,
                change,
                snapshot: Arc::new(state.clone()),
            }
        };

        self.dispatch(&event);
        Ok(true)
    }

    fn commit<F>(&self, change: StoreChange, f: F) -> bool
    where
        F: FnOnce(&mut StoreSnapshot) -> bool,
    {
        self.try_commit(change, |state| Ok(f(state)))
            .unwrap_or(false)
    }

    fn dispatch(&self, event: &StoreEvent) {
        let listeners: Vec<Arc<dyn StoreListener>> = {
            let mut guard = self
                .inner
                .listeners
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            guard.retain(|(_, listener)| !listener.is_closed());
            guard.iter().map(|(_, listener)| Arc::clone(listener)).collect()
        };

        for listener in listeners {
            listener.on_change(event);
        }
    }

    // ---- UI flags ---------------------------------------------------------

    pub fn set_theme(&self, theme: Theme) -> bool {
        self.commit(StoreChange::Ui, |s| replace(&mut s.theme, theme))
    }

    pub fn set_sidebar_collapsed(&self, collapsed: bool) -> bool {
        self.commit(StoreChange::Ui, |s| {
            replace(&mut s.sidebar_collapsed, collapsed)
        })
    }

    pub fn set_right_panel_collapsed(&self, collapsed: bool) -> bool {
        self.commit(StoreChange::Ui, |s| {
            replace(&mut s.right_panel_collapsed, collapsed)
        })
    }

    pub fn set_loading_models(&self, loading: bool) -> bool {
        self.commit(StoreChange::Ui, |s| replace(&mut s.is_loading_models, loading))
    }

    pub fn set_loading_agents(&self, loading: bool) -> bool {
        self.commit(StoreChange::Ui, |s| replace(&mut s.is_loading_agents, loading))
    }

    pub fn set_connecting(&self, connecting: bool) -> bool {
        self.commit(StoreChange::Ui, |s| replace(&mut s.is_connecting, connecting))
    }

    // ---- models -----------------------------------------------------------

    pub fn models(&self) -> Vec<Model> {
        self.read(|s| s.models.clone())
    }

    pub fn model(&self, id: &str) -> Option<Model> {
        self.read(|s| s.models.iter().find(|m| m.id == id).cloned())
    }

    /// Rejects an id that is already present.
    pub fn add_model(&self, model: Model) -> Result<(), AppError> {
        self.try_commit(StoreChange::Models, |s| {
            if s.models.iter().any(|m| m.id == model.id) {
                return Err(AppError::duplicate("model", &model.id));
            }
            crate::log_info!("agent_platform.store", "Model added: {}", model.id);
            s.models.push(model);
            Ok(true)
        })
        .map(|_| ())
    }

    pub fn set_models(&self, models: Vec<Model>) -> Result<(), AppError> {
        ensure_unique("model", models.iter().map(|m| m.id.as_str()))?;
        self.try_commit(StoreChange::Models, |s| Ok(replace(&mut s.models, models)))
            .map(|_| ())
    }

    pub fn update_model(&self, id: &str, patch: ModelPatch) -> bool {
        self.commit(StoreChange::Models, |s| {
            let Some(model) = s.models.iter_mut().find(|m| m.id == id) else {
                return false;
            };
            let before = model.clone();
            patch.apply_to(model);
            *model != before
        })
    }

    pub fn remove_model(&self, id: &str) -> bool {
        self.commit(StoreChange::Models, |s| {
            let before = s.models.len();
            s.models.retain(|m| m.id != id);
            s.models.len() != before
        })
    }

    // ---- agents -----------------------------------------------------------

    pub fn agents(&self) -> Vec<Agent> {
        self.read(|s| s.agents.clone())
    }

    pub fn agent(&self, id: &str) -> Option<Agent> {
        self.read(|s| s.agents.iter().find(|a| a.id == id).cloned())
    }

    pub fn add_agent(&self, agent: Agent) -> Result<(), AppError> {
        self.try_commit(StoreChange::Agents, |s| {
            if s.agents.iter().any(|a| a.id == agent.id) {
                return Err(AppError::duplicate("agent", &agent.id));
            }
            crate::log_info!("agent_platform.store", "Agent added: {}", agent.id);
            s.agents.push(agent);
            Ok(true)
        })
        .map(|_| ())
    }

    /// Replaces the agent list; an active agent missing from the new list is
    /// cleared.
    pub fn set_agents(&self, agents: Vec<Agent>) -> Result<(), AppError> {
        ensure_unique("agent", agents.iter().map(|a| a.id.as_str()))?;
        self.try_commit(StoreChange::Agents, |s| {
            let changed = replace(&mut s.agents, agents);
            let dangling = s
                .active_agent
                .as_ref()
                .is_some_and(|id| !s.agents.iter().any(|a| &a.id == id));
            if dangling {
                s.active_agent = None;
            }
            Ok(changed || dangling)
        })
        .map(|_| ())
    }

    pub fn update_agent(&self, id: &str, patch: AgentPatch) -> bool {
        self.commit(StoreChange::Agents, |s| {
            let Some(agent) = s.agents.iter_mut().find(|a| a.id == id) else {
                return false;
            };
            let before = agent.clone();
            patch.apply_to(agent);
            *agent != before
        })
    }

    /// Removes the agent and clears the active-agent pointer if it referenced
    /// it. Chat history is kept until explicitly cleared.
    pub fn remove_agent(&self, id: &str) -> bool {
        self.commit(StoreChange::Agents, |s| {
            let before = s.agents.len();
            s.agents.retain(|a| a.id != id);
            if s.agents.len() == before {
                return false;
            }
            if s.active_agent.as_deref() == Some(id) {
                s.active_agent = None;
            }
            crate::log_info!("agent_platform.store", "Agent removed: {}", id);
            true
        })
    }

    /// Unknown ids leave the pointer unchanged.
    pub fn set_active_agent(&self, id: Option<&str>) -> bool {
        self.commit(StoreChange::ActiveAgent, |s| match id {
            Some(id) if !s.agents.iter().any(|a| a.id == id) => false,
            _ => replace(&mut s.active_agent, id.map(str::to_string)),
        })
    }

    pub fn active_agent(&self) -> Option<Agent> {
        self.read(|s| {
            let id = s.active_agent.as_ref()?;
            s.agents.iter().find(|a| &a.id == id).cloned()
        })
    }

    // ---- chat -------------------------------------------------------------

    pub fn messages(&self, agent_id: &str) -> Vec<ChatMessage> {
        self.read(|s| views::messages_for(s, agent_id).to_vec())
    }

    pub fn add_message(&self, agent_id: &str, message: ChatMessage) -> Result<(), AppError> {
        self.try_commit(StoreChange::Chat(agent_id.to_string()), |s| {
            let history = s.chat_history.entry(agent_id.to_string()).or_default();
            if history.iter().any(|m| m.id == message.id) {
                return Err(AppError::duplicate("chat message", &message.id));
            }
            history.push(message);
            Ok(true)
        })
        .map(|_| ())
    }

    pub fn clear_messages(&self, agent_id: &str) -> bool {
        self.commit(StoreChange::Chat(agent_id.to_string()), |s| {
            match s.chat_history.get_mut(agent_id) {
                Some(history) if !history.is_empty() => {
                    history.clear();
                    true
                }
                _ => false,
            }
        })
    }

    pub fn set_messages(&self, agent_id: &str, messages: Vec<ChatMessage>) -> Result<(), AppError> {
        ensure_unique("chat message", messages.iter().map(|m| m.id.as_str()))?;
        self.try_commit(StoreChange::Chat(agent_id.to_string()), |s| {
            let history = s.chat_history.entry(agent_id.to_string()).or_default();
            Ok(replace(history, messages))
        })
        .map(|_| ())
    }

    // ---- plugins ----------------------------------------------------------

    pub fn plugins(&self) -> Vec<PluginCatalogEntry> {
        self.read(|s| s.plugins.catalog.clone())
    }

    pub fn plugin(&self, id: &str) -> Option<PluginCatalogEntry> {
        self.read(|s| s.plugins.catalog.iter().find(|p| p.id == id).cloned())
    }

    /// Loads a catalog wholesale. Entries are normalized so that inactive
    /// follows from uninstalled, and progress for dropped ids is discarded.
    pub fn set_plugin_catalog(&self, listing: MarketplaceListing) -> Result<(), AppError> {
        ensure_unique("plugin", listing.plugins.iter().map(|p| p.id.as_str()))?;
        let MarketplaceListing {
            mut plugins,
            categories,
        } = listing;
        plugins.iter_mut().for_each(PluginCatalogEntry::normalize);

        self.try_commit(StoreChange::Plugins, |s| {
            let catalog_changed = replace(&mut s.plugins.catalog, plugins);
            let categories_changed = replace(&mut s.plugins.categories, categories);
            let catalog = &s.plugins.catalog;
            let tracked = s.plugins.installation_progress.len();
            s.plugins
                .installation_progress
                .retain(|id, _| catalog.iter().any(|p| &p.id == id));
            let progress_pruned = s.plugins.installation_progress.len() != tracked;
            Ok(catalog_changed || categories_changed || progress_pruned)
        })
        .map(|_| ())
    }

    pub fn add_plugin(&self, mut plugin: PluginCatalogEntry) -> Result<(), AppError> {
        plugin.normalize();
        self.try_commit(StoreChange::Plugins, |s| {
            if s.plugins.catalog.iter().any(|p| p.id == plugin.id) {
                return Err(AppError::duplicate("plugin", &plugin.id));
            }
            s.plugins.catalog.push(plugin);
            Ok(true)
        })
        .map(|_| ())
    }

    pub fn update_plugin(&self, id: &str, patch: PluginPatch) -> bool {
        self.commit(StoreChange::Plugins, |s| {
            let Some(plugin) = s.plugins.catalog.iter_mut().find(|p| p.id == id) else {
                return false;
            };
            let before = plugin.clone();
            patch.apply_to(plugin);
            *plugin != before
        })
    }

    pub fn remove_plugin(&self, id: &str) -> bool {
        self.commit(StoreChange::Plugins, |s| {
            let before = s.plugins.catalog.len();
            s.plugins.catalog.retain(|p| p.id != id);
            let removed = s.plugins.catalog.len() != before;
            if removed {
                s.plugins.installation_progress.remove(id);
            }
            removed
        })
    }

    pub fn set_plugin_search(&self, query: &str) -> bool {
        self.commit(StoreChange::Plugins, |s| {
            replace(&mut s.plugins.search_query, query.to_string())
        })
    }

    pub fn set_plugin_category(&self, category: &str) -> bool {
        self.commit(StoreChange::Plugins, |s| {
            replace(&mut s.plugins.selected_category, category.to_string())
        })
    }

    pub fn set_plugins_installed_only(&self, installed_only: bool) -> bool {
        self.commit(StoreChange::Plugins, |s| {
            replace(&mut s.plugins.installed_only, installed_only)
        })
    }

    pub fn set_plugins_loading(&self, loading: bool) -> bool {
        self.commit(StoreChange::Plugins, |s| replace(&mut s.plugins.is_loading, loading))
    }

    pub fn set_plugin_error(&self, error: Option<String>) -> bool {
        self.commit(StoreChange::Plugins, |s| replace(&mut s.plugins.error, error))
    }

    pub fn plugin_error(&self) -> Option<String> {
        self.read(|s| s.plugins.error.clone())
    }

    pub fn install_progress(&self, plugin_id: &str) -> Option<u8> {
        self.read(|s| s.plugins.installation_progress.get(plugin_id).copied())
    }

    /// Progress never moves backwards while an entry exists and is capped at
    /// 100. Values for plugins missing from the catalog are ignored.
    pub fn set_install_progress(&self, plugin_id: &str, progress: u8) -> bool {
        let progress = progress.min(100);
        self.commit(StoreChange::PluginProgress(plugin_id.to_string()), |s| {
            if !s.plugins.catalog.iter().any(|p| p.id == plugin_id) {
                return false;
            }
            match s.plugins.installation_progress.get_mut(plugin_id) {
                Some(current) if *current >= progress => false,
                Some(current) => {
                    *current = progress;
                    true
                }
                None => {
                    s.plugins
                        .installation_progress
                        .insert(plugin_id.to_string(), progress);
                    true
                }
            }
        })
    }

    pub fn clear_install_progress(&self, plugin_id: &str) -> bool {
        self.commit(StoreChange::PluginProgress(plugin_id.to_string()), |s| {
            s.plugins.installation_progress.remove(plugin_id).is_some()
        })
    }

    // ---- templates --------------------------------------------------------

    pub fn templates(&self) -> Vec<TemplateCatalogEntry> {
        self.read(|s| s.templates.clone())
    }

    pub fn template(&self, id: &str) -> Option<TemplateCatalogEntry> {
        self.read(|s| s.templates.iter().find(|t| t.id == id).cloned())
    }

    pub fn set_templates(&self, templates: Vec<TemplateCatalogEntry>) -> Result<(), AppError> {
        ensure_unique("template", templates.iter().map(|t| t.id.as_str()))?;
        self.try_commit(StoreChange::Templates, |s| {
            Ok(replace(&mut s.templates, templates))
        })
        .map(|_| ())
    }

    pub fn add_template(&self, template: TemplateCatalogEntry) -> Result<(), AppError> {
        self.try_commit(StoreChange::Templates, |s| {
            if s.templates.iter().any(|t| t.id == template.id) {
                return Err(AppError::duplicate("template", &template.id));
            }
            s.templates.push(template);
            Ok(true)
        })
        .map(|_| ())
    }

    pub fn remove_template(&self, id: &str) -> bool {
        self.commit(StoreChange::Templates, |s| {
            let before = s.templates.len();
            s.templates.retain(|t| t.id != id);
            s.templates.len() != before
        })
    }
}

/// Assigns and reports whether the value changed.
fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

fn ensure_unique<'a>(entity: &str, ids: impl Iterator<Item = &'a str>) -> Result<(), AppError> {
    let mut seen = std::collections::HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(AppError::duplicate(entity, id));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;

    use super::*;
    use crate::db::models::{EntityStatus, ModelKind, PluginStatus};
    use crate::db::seed;

    fn agent(id: &str) -> Agent {
        Agent {
            id: id.to_string(),
            name: format!("Agent {id}"),
            description: String::new(),
            model: "gpt-4o".to_string(),
            status: EntityStatus::Inactive,
            created_at: Utc::now(),
            last_used: None,
            conversations: 0,
            system_prompt: String::new(),
            tools: Vec::new(),
            temperature: 1.0,
            max_iterations: 5,
        }
    }

    fn model(id: &str) -> Model {
        Model {
            id: id.to_string(),
            name: id.to_uppercase(),
            kind: ModelKind::Api,
            provider: "openai".to_string(),
            model_id: id.to_string(),
            status: EntityStatus::Active,
            capabilities: vec!["chat".to_string()],
            performance: None,
            api_base: None,
            parameters: None,
        }
    }

    #[test]
    fn add_then_list_contains_one_record() {
        let store = EntityStore::new();
        store.add_model(model("gpt-4o")).unwrap();

        let err = store.add_model(model("gpt-4o")).unwrap_err();
        assert!(matches!(err, AppError::Duplicate { .. }));
        assert_eq!(
            store.models().iter().filter(|m| m.id == "gpt-4o").count(),
            1
        );

        store.add_agent(agent("a1")).unwrap();
        assert!(store.add_agent(agent("a1")).is_err());
        assert_eq!(store.agents().len(), 1);
    }

    #[test]
    fn unknown_ids_leave_snapshot_untouched() {
        let store = EntityStore::new();
        store.add_model(model("gpt-4o")).unwrap();
        store.add_agent(agent("a1")).unwrap();
        let before = store.snapshot();
        let version = store.version();

        assert!(!store.update_model("missing", ModelPatch::status(EntityStatus::Error)));
        assert!(!store.remove_model("missing"));
        assert!(!store.update_agent("missing", AgentPatch::default()));
        assert!(!store.remove_agent("missing"));
        assert!(!store.update_plugin("missing", PluginPatch::default()));
        assert!(!store.set_active_agent(Some("missing")));

        assert_eq!(store.snapshot(), before);
        assert_eq!(store.version(), version);
    }

    #[test]
    fn removing_active_agent_clears_pointer() {
        let store = EntityStore::new();
        store.add_agent(agent("a1")).unwrap();
        store.add_agent(agent("a2")).unwrap();
        assert!(store.set_active_agent(Some("a1")));

        store.remove_agent("a2");
        assert_eq!(store.snapshot().active_agent.as_deref(), Some("a1"));

        store.remove_agent("a1");
        assert_eq!(store.snapshot().active_agent, None);
        assert!(store.active_agent().is_none());
    }

    #[test]
    fn set_agents_drops_dangling_active_pointer() {
        let store = EntityStore::new();
        store.add_agent(agent("a1")).unwrap();
        store.set_active_agent(Some("a1"));

        store.set_agents(vec![agent("a2")]).unwrap();
        assert_eq!(store.snapshot().active_agent, None);

        assert!(store.set_agents(vec![agent("x"), agent("x")]).is_err());
        assert_eq!(store.agents()[0].id, "a2");
    }

    #[test]
    fn update_merges_only_provided_fields() {
        let store = EntityStore::new();
        store.add_agent(agent("a1")).unwrap();

        store.update_agent(
            "a1",
            AgentPatch {
                status: Some(EntityStatus::Active),
                ..AgentPatch::default()
            },
        );
        let updated = store.agent("a1").unwrap();
        assert_eq!(updated.status, EntityStatus::Active);
        assert_eq!(updated.name, "Agent a1");
        assert_eq!(updated.model, "gpt-4o");
    }

    #[test]
    fn chat_history_is_append_only_and_cleared_explicitly() {
        let store = EntityStore::new();
        let first = ChatMessage::user("hello", Utc::now());
        store.add_message("a1", first.clone()).unwrap();
        store
            .add_message("a1", ChatMessage::assistant("hi", "gpt-4o", Utc::now()))
            .unwrap();
        assert!(store.add_message("a1", first).is_err());

        let history = store.messages("a1");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "hello");
        assert!(store.messages("nobody").is_empty());

        assert!(store.clear_messages("a1"));
        assert!(store.messages("a1").is_empty());
        assert!(!store.clear_messages("a1"));
    }

    #[test]
    fn listeners_receive_full_snapshots_in_order() {
        let store = EntityStore::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = store.subscribe(Arc::new(move |event: &StoreEvent| {
            sink.lock()
                .unwrap()
                .push((event.version, event.change.clone(), event.snapshot.models.len()));
        }));

        store.add_model(model("gpt-4o")).unwrap();
        store.set_theme(Theme::Light);
        store.set_theme(Theme::Light);

        let events = seen.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![(1, StoreChange::Models, 1), (2, StoreChange::Ui, 1)]
        );

        assert!(store.unsubscribe(id));
        store.set_theme(Theme::Dark);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn watch_channel_unsubscribes_when_dropped() {
        let store = EntityStore::new();
        let rx = store.watch();
        store.set_sidebar_collapsed(true);

        let event = rx.try_recv().unwrap();
        assert!(event.snapshot.sidebar_collapsed);

        drop(rx);
        store.set_sidebar_collapsed(false);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn install_progress_is_monotonic_per_plugin() {
        let store = EntityStore::new();
        store.set_plugin_catalog(seed::sample_marketplace()).unwrap();

        assert!(store.set_install_progress("slack-integration", 30));
        assert!(!store.set_install_progress("slack-integration", 20));
        assert_eq!(store.install_progress("slack-integration"), Some(30));
        assert!(store.set_install_progress("slack-integration", 250));
        assert_eq!(store.install_progress("slack-integration"), Some(100));

        assert!(!store.set_install_progress("not-in-catalog", 10));
        assert!(store.clear_install_progress("slack-integration"));
        assert_eq!(store.install_progress("slack-integration"), None);
    }

    #[test]
    fn catalog_load_normalizes_active_flag() {
        let store = EntityStore::new();
        let mut listing = seed::sample_marketplace();
        listing.plugins[1].is_active = true;
        listing.plugins[1].is_installed = false;
        store.set_plugin_catalog(listing).unwrap();

        let slack = store.plugin("slack-integration").unwrap();
        assert!(!slack.is_active);

        store.update_plugin(
            "webhook-handler",
            PluginPatch {
                is_installed: Some(false),
                ..PluginPatch::default()
            },
        );
        let webhook = store.plugin("webhook-handler").unwrap();
        assert!(!webhook.is_active);
        assert_eq!(webhook.status, PluginStatus::Available);
    }

    #[test]
    fn catalog_reload_drops_progress_for_missing_plugins() {
        let store = EntityStore::new();
        store.set_plugin_catalog(seed::sample_marketplace()).unwrap();
        store.set_install_progress("slack-integration", 40);
        store.set_install_progress("auto-scheduler", 20);

        let mut listing = seed::sample_marketplace();
        listing.plugins.retain(|p| p.id != "slack-integration");
        store.set_plugin_catalog(listing.clone()).unwrap();
        assert_eq!(store.install_progress("slack-integration"), None);
        assert_eq!(store.install_progress("auto-scheduler"), Some(20));

        store
            .set_plugin_catalog(MarketplaceListing {
                plugins: Vec::new(),
                categories: listing.categories,
            })
            .unwrap();
        assert!(store.snapshot().plugins.installation_progress.is_empty());
    }
}
