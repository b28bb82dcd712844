#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agent_platform_lib::db::models::{MarketplaceListing, PluginConfig};
use agent_platform_lib::db::seed;
use agent_platform_lib::services::gateway::PluginGateway;
use agent_platform_lib::{AppError, PlatformConfig};
use async_trait::async_trait;
use base64::Engine;

/// Gateway whose install takes `install_delay` and then succeeds or fails.
/// The next `activate_failures` activations fail before one succeeds.
pub struct ScriptedGateway {
    pub install_delay: Duration,
    pub install_error: Option<String>,
    pub install_calls: AtomicUsize,
    pub activate_failures: AtomicUsize,
}

impl ScriptedGateway {
    pub fn succeeding_after(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            install_delay: delay,
            install_error: None,
            install_calls: AtomicUsize::new(0),
            activate_failures: AtomicUsize::new(0),
        })
    }

    pub fn failing_after(delay: Duration, message: &str) -> Arc<Self> {
        Arc::new(Self {
            install_delay: delay,
            install_error: Some(message.to_string()),
            install_calls: AtomicUsize::new(0),
            activate_failures: AtomicUsize::new(0),
        })
    }

    pub fn install_calls(&self) -> usize {
        self.install_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PluginGateway for ScriptedGateway {
    async fn load_marketplace(&self) -> Result<MarketplaceListing, AppError> {
        Ok(seed::sample_marketplace())
    }

    async fn install(&self, _plugin_id: &str) -> Result<(), AppError> {
        self.install_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.install_delay).await;
        match &self.install_error {
            Some(message) => Err(AppError::Gateway(message.clone())),
            None => Ok(()),
        }
    }

    async fn uninstall(&self, _plugin_id: &str) -> Result<(), AppError> {
        Ok(())
    }

    async fn activate(&self, _plugin_id: &str) -> Result<(), AppError> {
        let failed = self
            .activate_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failed {
            return Err(AppError::Gateway("Activation failed with status 503".into()));
        }
        Ok(())
    }

    async fn deactivate(&self, _plugin_id: &str) -> Result<(), AppError> {
        Ok(())
    }

    async fn update_config(
        &self,
        _plugin_id: &str,
        _config: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), AppError> {
        Ok(())
    }

    async fn get_config(&self, _plugin_id: &str) -> Result<Option<PluginConfig>, AppError> {
        Ok(None)
    }
}

pub fn test_config() -> PlatformConfig {
    PlatformConfig {
        master_key_b64: Some(base64::engine::general_purpose::STANDARD.encode([42u8; 32])),
        offline_catalog: true,
        ..PlatformConfig::default()
    }
}
