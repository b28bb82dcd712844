//! Plugin marketplace boundary. The HTTP implementation talks to the
//! backend's `/api/plugins` routes; the catalog implementation serves the
//! built-in listing for offline sessions.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;

use crate::db::models::{MarketplaceListing, PluginConfig};
use crate::db::seed;
use crate::error::AppError;

type ConfigMap = serde_json::Map<String, serde_json::Value>;

#[async_trait]
pub trait PluginGateway: Send + Sync {
    async fn load_marketplace(&self) -> Result<MarketplaceListing, AppError>;

    async fn install(&self, plugin_id: &str) -> Result<(), AppError>;

    async fn uninstall(&self, plugin_id: &str) -> Result<(), AppError>;

    async fn activate(&self, plugin_id: &str) -> Result<(), AppError>;

    async fn deactivate(&self, plugin_id: &str) -> Result<(), AppError>;

    async fn update_config(&self, plugin_id: &str, config: &ConfigMap) -> Result<(), AppError>;

    /// `None` when the plugin has no stored configuration.
    async fn get_config(&self, plugin_id: &str) -> Result<Option<PluginConfig>, AppError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InstallRequest<'a> {
    plugin_id: &'a str,
}

#[derive(Serialize)]
struct ConfigRequest<'a> {
    config: &'a ConfigMap,
}

#[derive(Clone)]
pub struct HttpPluginGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPluginGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| {
                AppError::Config(format!("Failed to initialize HTTP client: {error}"))
            })?;

        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `/api/plugins/<segments..>` under the base URL. Each segment is
    /// percent-encoded, so a plugin id can never escape its path slot.
    fn url(&self, segments: &[&str]) -> Result<reqwest::Url, AppError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|error| AppError::Config(format!("Invalid API base URL: {error}")))?;
        url.path_segments_mut()
            .map_err(|_| {
                AppError::Config(format!("API base URL {} cannot carry a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(["api", "plugins"])
            .extend(segments);
        Ok(url)
    }

    async fn ensure_success(
        response: reqwest::Response,
        action: &str,
    ) -> Result<reqwest::Response, AppError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(AppError::Gateway(format!(
            "{action} failed with status {status}. {}",
            body.trim()
        )))
    }
}

#[async_trait]
impl PluginGateway for HttpPluginGateway {
    async fn load_marketplace(&self) -> Result<MarketplaceListing, AppError> {
        let response = self.client.get(self.url(&["marketplace"])?).send().await?;
        let response = Self::ensure_success(response, "Failed to load marketplace").await?;
        Ok(response.json::<MarketplaceListing>().await?)
    }

    async fn install(&self, plugin_id: &str) -> Result<(), AppError> {
        let response = self
            .client
            .post(self.url(&["install"])?)
            .json(&InstallRequest { plugin_id })
            .send()
            .await?;
        Self::ensure_success(response, "Installation").await?;
        Ok(())
    }

    async fn uninstall(&self, plugin_id: &str) -> Result<(), AppError> {
        let response = self
            .client
            .delete(self.url(&[plugin_id])?)
            .send()
            .await?;
        Self::ensure_success(response, "Uninstallation").await?;
        Ok(())
    }

    async fn activate(&self, plugin_id: &str) -> Result<(), AppError> {
        let response = self
            .client
            .post(self.url(&[plugin_id, "activate"])?)
            .send()
            .await?;
        Self::ensure_success(response, "Activation").await?;
        Ok(())
    }

    async fn deactivate(&self, plugin_id: &str) -> Result<(), AppError> {
        let response = self
            .client
            .post(self.url(&[plugin_id, "deactivate"])?)
            .send()
            .await?;
        Self::ensure_success(response, "Deactivation").await?;
        Ok(())
    }

    async fn update_config(&self, plugin_id: &str, config: &ConfigMap) -> Result<(), AppError> {
        let response = self
            .client
            .put(self.url(&[plugin_id, "config"])?)
            .json(&ConfigRequest { config })
            .send()
            .await?;
        Self::ensure_success(response, "Config update").await?;
        Ok(())
    }

    async fn get_config(&self, plugin_id: &str) -> Result<Option<PluginConfig>, AppError> {
        let response = self
            .client
            .get(self.url(&[plugin_id, "config"])?)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::ensure_success(response, "Config lookup").await?;
        Ok(Some(response.json::<PluginConfig>().await?))
    }
}

/// Serves the built-in catalog and keeps configs in memory.
#[derive(Clone)]
pub struct CatalogPluginGateway {
    listing: MarketplaceListing,
    configs: Arc<RwLock<HashMap<String, PluginConfig>>>,
}

impl Default for CatalogPluginGateway {
    fn default() -> Self {
        Self::new(seed::sample_marketplace())
    }
}

impl CatalogPluginGateway {
    pub fn new(listing: MarketplaceListing) -> Self {
        Self {
            listing,
            configs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn ensure_known(&self, plugin_id: &str) -> Result<(), AppError> {
        if self.listing.plugins.iter().any(|p| p.id == plugin_id) {
            Ok(())
        } else {
            Err(AppError::not_found("plugin", plugin_id))
        }
    }
}

#[async_trait]
impl PluginGateway for CatalogPluginGateway {
    async fn load_marketplace(&self) -> Result<MarketplaceListing, AppError> {
        Ok(self.listing.clone())
    }

    async fn install(&self, plugin_id: &str) -> Result<(), AppError> {
        self.ensure_known(plugin_id)?;
        let mut configs = self.configs.write().unwrap_or_else(PoisonError::into_inner);
        configs
            .entry(plugin_id.to_string())
            .or_insert_with(|| PluginConfig {
                plugin_id: plugin_id.to_string(),
                config: ConfigMap::new(),
                enabled: false,
                installed_at: Some(Utc::now()),
            });
        Ok(())
    }

    async fn uninstall(&self, plugin_id: &str) -> Result<(), AppError> {
        self.ensure_known(plugin_id)?;
        self.configs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(plugin_id);
        Ok(())
    }

    async fn activate(&self, plugin_id: &str) -> Result<(), AppError> {
        self.ensure_known(plugin_id)?;
        if let Some(config) = self
            .configs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(plugin_id)
        {
            config.enabled = true;
        }
        Ok(())
    }

    async fn deactivate(&self, plugin_id: &str) -> Result<(), AppError> {
        self.ensure_known(plugin_id)?;
        if let Some(config) = self
            .configs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(plugin_id)
        {
            config.enabled = false;
        }
        Ok(())
    }

    async fn update_config(&self, plugin_id: &str, config: &ConfigMap) -> Result<(), AppError> {
        self.ensure_known(plugin_id)?;
        let mut configs = self.configs.write().unwrap_or_else(PoisonError::into_inner);
        let entry = configs
            .entry(plugin_id.to_string())
            .or_insert_with(|| PluginConfig {
                plugin_id: plugin_id.to_string(),
                config: ConfigMap::new(),
                enabled: false,
                installed_at: None,
            });
        entry.config = config.clone();
        Ok(())
    }

    async fn get_config(&self, plugin_id: &str) -> Result<Option<PluginConfig>, AppError> {
        Ok(self
            .configs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(plugin_id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn catalog_gateway_tracks_configs() {
        let gateway = CatalogPluginGateway::default();
        assert_eq!(gateway.load_marketplace().await.unwrap().plugins.len(), 5);

        gateway.install("slack-integration").await.unwrap();
        gateway.activate("slack-integration").await.unwrap();
        let config = gateway.get_config("slack-integration").await.unwrap().unwrap();
        assert!(config.enabled);
        assert!(config.installed_at.is_some());

        gateway.uninstall("slack-integration").await.unwrap();
        assert!(gateway.get_config("slack-integration").await.unwrap().is_none());

        assert!(matches!(
            gateway.install("unknown").await,
            Err(AppError::NotFound { .. })
        ));
    }

    #[test]
    fn http_gateway_normalizes_base_url() {
        let gateway =
            HttpPluginGateway::new("http://localhost:8000/", Duration::from_secs(5)).unwrap();
        assert_eq!(
            gateway.url(&["marketplace"]).unwrap().as_str(),
            "http://localhost:8000/api/plugins/marketplace"
        );
    }

    #[test]
    fn plugin_ids_are_encoded_as_single_segments() {
        let gateway =
            HttpPluginGateway::new("http://localhost:8000/backend/", Duration::from_secs(5))
                .unwrap();
        assert_eq!(
            gateway.url(&["a/b?x=1", "config"]).unwrap().as_str(),
            "http://localhost:8000/backend/api/plugins/a%2Fb%3Fx=1/config"
        );
    }
}
