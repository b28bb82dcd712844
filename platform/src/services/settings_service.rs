use zeroize::Zeroize;

use crate::db::models::{Settings, Theme};
use crate::error::AppError;
use crate::repositories::settings_repo::SettingsRepo;
use crate::services::crypto_service::CryptoService;
use crate::services::Confirm;
use crate::store::EntityStore;

/// Key under which the whole settings object is stored.
pub const SETTINGS_KEY: &str = "adk-settings";

const LOG_TARGET: &str = "agent_platform.settings";

#[derive(Clone)]
pub struct SettingsService {
    repo: SettingsRepo,
    crypto: CryptoService,
    store: EntityStore,
}

impl SettingsService {
    pub fn new(repo: SettingsRepo, crypto: CryptoService, store: EntityStore) -> Self {
        Self {
            repo,
            crypto,
            store,
        }
    }

    /// Persisted settings, or defaults when nothing was saved.
    pub async fn load(&self) -> Result<Settings, AppError> {
        let Some(entry) = self.repo.get(SETTINGS_KEY).await? else {
            return Ok(Settings::default());
        };

        let mut settings: Settings = serde_json::from_str(&entry.value)
            .map_err(|e| AppError::from(e).context("parse stored settings"))?;
        if entry.is_encrypted != 0 {
            for secret in settings.secrets_mut() {
                if !secret.is_empty() {
                    let mut sealed = std::mem::take(secret);
                    let opened = self.crypto.decrypt_string(&sealed);
                    sealed.zeroize();
                    *secret = opened.map_err(|e| e.context("decrypt stored API key"))?;
                }
            }
        }
        Ok(settings)
    }

    /// Validates, persists and applies the theme. API keys are sealed at rest
    /// when encryption is enabled.
    pub async fn save(&self, settings: &Settings) -> Result<(), AppError> {
        settings.validate()?;

        let mut stored = settings.clone();
        if stored.enable_encryption {
            for secret in stored.secrets_mut() {
                if !secret.is_empty() {
                    let sealed = self.crypto.encrypt_to_compact(secret.as_bytes())?;
                    secret.zeroize();
                    *secret = sealed;
                }
            }
        }

        let json = serde_json::to_string(&stored)?;
        stored
            .secrets_mut()
            .into_iter()
            .for_each(|secret| secret.zeroize());

        self.repo
            .put(SETTINGS_KEY, &json, settings.enable_encryption)
            .await?;
        self.apply_theme(settings.theme);
        crate::log_info!(LOG_TARGET, "Settings saved");
        Ok(())
    }

    /// Deletes the persisted entry and returns the defaults. `Ok(None)` when
    /// the user declines.
    pub async fn reset(&self, confirm: &dyn Confirm) -> Result<Option<Settings>, AppError> {
        if !confirm.confirm("Are you sure you want to reset all settings to defaults?") {
            return Ok(None);
        }

        self.repo.delete(SETTINGS_KEY).await?;
        let defaults = Settings::default();
        self.apply_theme(defaults.theme);
        crate::log_info!(LOG_TARGET, "Settings reset to defaults");
        Ok(Some(defaults))
    }

    pub fn apply_theme(&self, theme: Theme) {
        self.store.set_theme(theme);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn service() -> (SettingsService, SettingsRepo, EntityStore) {
        let db = Database::in_memory().await.unwrap();
        let repo = SettingsRepo::with_pools(db.read_pool().clone(), db.write_pool().clone());
        let store = EntityStore::new();
        let service = SettingsService::new(
            repo.clone(),
            CryptoService::from_key([3u8; 32]),
            store.clone(),
        );
        (service, repo, store)
    }

    #[tokio::test]
    async fn api_keys_are_sealed_at_rest() {
        let (service, repo, _store) = service().await;
        let settings = Settings {
            openai_key: "sk-live-abc".into(),
            ..Settings::default()
        };
        service.save(&settings).await.unwrap();

        let raw = repo.get(SETTINGS_KEY).await.unwrap().unwrap();
        assert_eq!(raw.is_encrypted, 1);
        assert!(!raw.value.contains("sk-live-abc"));

        assert_eq!(service.load().await.unwrap(), settings);
    }

    #[tokio::test]
    async fn plaintext_storage_when_encryption_disabled() {
        let (service, repo, store) = service().await;
        let settings = Settings {
            enable_encryption: false,
            minimax_key: "mm-key".into(),
            theme: Theme::Light,
            ..Settings::default()
        };
        service.save(&settings).await.unwrap();

        let raw = repo.get(SETTINGS_KEY).await.unwrap().unwrap();
        assert_eq!(raw.is_encrypted, 0);
        assert!(raw.value.contains("mm-key"));
        assert_eq!(store.snapshot().theme, Theme::Light);
    }

    #[tokio::test]
    async fn invalid_settings_are_not_persisted() {
        let (service, repo, _store) = service().await;
        let settings = Settings {
            max_concurrent_requests: 50,
            ..Settings::default()
        };
        assert!(matches!(
            service.save(&settings).await,
            Err(AppError::Validation { .. })
        ));
        assert!(repo.get(SETTINGS_KEY).await.unwrap().is_none());
    }
}
