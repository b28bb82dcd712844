use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use moka::future::Cache;
use tokio_util::sync::CancellationToken;

use crate::config::PlatformConfig;
use crate::db::models::{PluginCatalogEntry, PluginConfig, PluginPatch};
use crate::error::AppError;
use crate::services::clock::Clock;
use crate::services::gateway::PluginGateway;
use crate::services::Confirm;
use crate::store::views::{self, PluginFilter};
use crate::store::EntityStore;

const LOG_TARGET: &str = "agent_platform.plugins";

#[derive(Debug, Clone, Copy)]
pub struct InstallTiming {
    pub interval: Duration,
    pub step: u8,
    pub ceiling: u8,
    pub clear_delay: Duration,
}

impl From<&PlatformConfig> for InstallTiming {
    fn from(config: &PlatformConfig) -> Self {
        Self {
            interval: config.install_progress_interval,
            step: config.install_progress_step,
            ceiling: config.install_progress_ceiling,
            clear_delay: config.progress_clear_delay,
        }
    }
}

/// Tracks one install attempt. Dropping it removes the in-flight marker and
/// stops the progress ticker; an attempt that never settled also discards its
/// progress entry.
struct InFlightGuard {
    registry: Arc<DashMap<String, ()>>,
    store: EntityStore,
    ticker: CancellationToken,
    plugin_id: String,
    settled: bool,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.ticker.cancel();
        if !self.settled {
            self.store.clear_install_progress(&self.plugin_id);
            crate::log_warn!(LOG_TARGET, "Install of {} was abandoned", self.plugin_id);
        }
        self.registry.remove(&self.plugin_id);
    }
}

#[derive(Clone)]
pub struct PluginMarketplaceService {
    store: EntityStore,
    gateway: Arc<dyn PluginGateway>,
    clock: Arc<dyn Clock>,
    timing: InstallTiming,
    request_timeout: Duration,
    in_flight: Arc<DashMap<String, ()>>,
    config_cache: Cache<String, PluginConfig>,
    cancel_token: CancellationToken,
}

impl PluginMarketplaceService {
    pub fn new(
        store: EntityStore,
        gateway: Arc<dyn PluginGateway>,
        clock: Arc<dyn Clock>,
        config: &PlatformConfig,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            store,
            gateway,
            clock,
            timing: InstallTiming::from(config),
            request_timeout: config.request_timeout,
            in_flight: Arc::new(DashMap::new()),
            config_cache: Cache::builder()
                .time_to_live(config.plugin_config_ttl)
                .max_capacity(1_000)
                .build(),
            cancel_token,
        }
    }

    /// Bounds a gateway call by the request timeout. A new attempt clears the
    /// marketplace error field and a failure sets it.
    async fn call<T, F>(&self, action: &str, fut: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        self.store.set_plugin_error(None);
        let result = match tokio::time::timeout(self.request_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout(format!(
                "{action} did not complete within {}s",
                self.request_timeout.as_secs()
            ))),
        };

        if let Err(error) = &result {
            crate::log_error!(LOG_TARGET, "{} failed: {}", action, error);
            self.store.set_plugin_error(Some(error.user_message()));
        }
        result
    }

    fn require_plugin(&self, plugin_id: &str) -> Result<PluginCatalogEntry, AppError> {
        self.store
            .plugin(plugin_id)
            .ok_or_else(|| AppError::not_found("plugin", plugin_id))
    }

    pub async fn load_marketplace(&self) -> Result<(), AppError> {
        self.store.set_plugins_loading(true);

        let result = match self
            .call("Load marketplace", self.gateway.load_marketplace())
            .await
        {
            Ok(listing) => {
                let count = listing.plugins.len();
                let loaded = self.store.set_plugin_catalog(listing);
                match &loaded {
                    Ok(()) => crate::log_info!(LOG_TARGET, "Loaded {} marketplace plugins", count),
                    Err(error) => {
                        self.store.set_plugin_error(Some(error.user_message()));
                    }
                }
                loaded
            }
            Err(error) => Err(error),
        };

        self.store.set_plugins_loading(false);
        result
    }

    pub async fn refresh(&self) -> Result<(), AppError> {
        self.config_cache.invalidate_all();
        self.load_marketplace().await
    }

    pub fn search(&self, query: &str) {
        self.store.set_plugin_search(query);
    }

    pub fn filter_by_category(&self, category: &str) {
        self.store.set_plugin_category(category);
    }

    pub fn set_installed_only(&self, installed_only: bool) {
        self.store.set_plugins_installed_only(installed_only);
    }

    /// Catalog narrowed by the current search, category and installed-only
    /// selections.
    pub fn filtered(&self) -> Vec<PluginCatalogEntry> {
        self.store.read(|snapshot| {
            views::filtered_plugins(
                &snapshot.plugins.catalog,
                &PluginFilter::from_snapshot(snapshot),
            )
        })
    }

    pub fn is_installing(&self, plugin_id: &str) -> bool {
        self.in_flight.contains_key(plugin_id)
    }

    /// Installs through the gateway while a ticker reports simulated
    /// progress. Already installed or already installing ids are left alone.
    pub async fn install(&self, plugin_id: &str) -> Result<(), AppError> {
        let plugin = self.require_plugin(plugin_id)?;
        if plugin.is_installed {
            return Ok(());
        }

        let ticker_token = self.cancel_token.child_token();
        let mut guard = match self.in_flight.entry(plugin_id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => return Ok(()),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(());
                InFlightGuard {
                    registry: Arc::clone(&self.in_flight),
                    store: self.store.clone(),
                    ticker: ticker_token.clone(),
                    plugin_id: plugin_id.to_string(),
                    settled: false,
                }
            }
        };

        self.store.clear_install_progress(plugin_id);
        self.store.set_install_progress(plugin_id, 0);

        let ticker = self.spawn_progress_ticker(plugin_id, ticker_token.clone());

        let result = self.call("Install plugin", self.gateway.install(plugin_id)).await;

        ticker_token.cancel();
        let _ = ticker.await;
        guard.settled = true;

        match result {
            Ok(()) => {
                self.store.update_plugin(
                    plugin_id,
                    PluginPatch {
                        is_installed: Some(true),
                        ..PluginPatch::default()
                    },
                );
                self.store.set_install_progress(plugin_id, 100);
                self.spawn_progress_clear(plugin_id);
                self.config_cache.invalidate(plugin_id).await;
                crate::log_info!(LOG_TARGET, "Installed plugin {}", plugin_id);
                Ok(())
            }
            Err(error) => {
                self.store.clear_install_progress(plugin_id);
                Err(error)
            }
        }
    }

    fn spawn_progress_ticker(
        &self,
        plugin_id: &str,
        token: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let store = self.store.clone();
        let clock = Arc::clone(&self.clock);
        let timing = self.timing;
        let plugin_id = plugin_id.to_string();

        tokio::spawn(async move {
            let mut progress: u8 = 0;
            while progress < timing.ceiling {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = clock.sleep(timing.interval) => {
                        progress = progress.saturating_add(timing.step).min(timing.ceiling);
                        store.set_install_progress(&plugin_id, progress);
                    }
                }
            }
        })
    }

    fn spawn_progress_clear(&self, plugin_id: &str) {
        let store = self.store.clone();
        let clock = Arc::clone(&self.clock);
        let delay = self.timing.clear_delay;
        let in_flight = Arc::clone(&self.in_flight);
        let token = self.cancel_token.clone();
        let plugin_id = plugin_id.to_string();

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = clock.sleep(delay) => {
                    // A reinstall started meanwhile owns the entry now.
                    if !in_flight.contains_key(&plugin_id) {
                        store.clear_install_progress(&plugin_id);
                    }
                }
            }
        });
    }

    /// Returns `Ok(false)` when the user declines.
    pub async fn uninstall(&self, plugin_id: &str, confirm: &dyn Confirm) -> Result<bool, AppError> {
        let plugin = self.require_plugin(plugin_id)?;
        if !confirm.confirm(&format!("Are you sure you want to uninstall {}?", plugin.name)) {
            return Ok(false);
        }

        self.call("Uninstall plugin", self.gateway.uninstall(plugin_id))
            .await?;

        self.store.update_plugin(
            plugin_id,
            PluginPatch {
                is_installed: Some(false),
                ..PluginPatch::default()
            },
        );
        self.config_cache.invalidate(plugin_id).await;
        crate::log_info!(LOG_TARGET, "Uninstalled plugin {}", plugin_id);
        Ok(true)
    }

    pub async fn activate(&self, plugin_id: &str) -> Result<(), AppError> {
        let plugin = self.require_plugin(plugin_id)?;
        if !plugin.is_installed {
            return Err(AppError::validation(
                "pluginId",
                format!("{} must be installed before it can be activated", plugin.name),
            ));
        }
        if plugin.is_active {
            return Ok(());
        }

        self.call("Activate plugin", self.gateway.activate(plugin_id))
            .await?;
        self.store.update_plugin(
            plugin_id,
            PluginPatch {
                is_active: Some(true),
                ..PluginPatch::default()
            },
        );
        self.config_cache.invalidate(plugin_id).await;
        Ok(())
    }

    pub async fn deactivate(&self, plugin_id: &str) -> Result<(), AppError> {
        let plugin = self.require_plugin(plugin_id)?;
        if !plugin.is_active {
            return Ok(());
        }

        self.call("Deactivate plugin", self.gateway.deactivate(plugin_id))
            .await?;
        self.store.update_plugin(
            plugin_id,
            PluginPatch {
                is_active: Some(false),
                ..PluginPatch::default()
            },
        );
        self.config_cache.invalidate(plugin_id).await;
        Ok(())
    }

    pub async fn update_config(
        &self,
        plugin_id: &str,
        config: serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), AppError> {
        self.require_plugin(plugin_id)?;
        self.call(
            "Update plugin config",
            self.gateway.update_config(plugin_id, &config),
        )
        .await?;
        self.config_cache.invalidate(plugin_id).await;
        Ok(())
    }

    /// Cached for the configured TTL. Missing configs are not cached.
    pub async fn get_config(&self, plugin_id: &str) -> Result<Option<PluginConfig>, AppError> {
        if let Some(config) = self.config_cache.get(plugin_id).await {
            return Ok(Some(config));
        }

        let fetched = self
            .call("Get plugin config", self.gateway.get_config(plugin_id))
            .await?;
        if let Some(config) = &fetched {
            self.config_cache
                .insert(plugin_id.to_string(), config.clone())
                .await;
        }
        Ok(fetched)
    }

    pub fn clear_error(&self) {
        self.store.set_plugin_error(None);
    }
}
