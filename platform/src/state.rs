use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::config::PlatformConfig;
use crate::db::Database;
use crate::error::AppError;
use crate::log_info;
use crate::log_warn;
use crate::repositories::settings_repo::SettingsRepo;
use crate::services::agent_service::AgentBuilderService;
use crate::services::chat_service::ChatService;
use crate::services::clock::{Clock, TokioClock};
use crate::services::crypto_service::CryptoService;
use crate::services::data_service::DataService;
use crate::services::gateway::{CatalogPluginGateway, HttpPluginGateway, PluginGateway};
use crate::services::model_manager_service::ModelManagerService;
use crate::services::plugin_service::PluginMarketplaceService;
use crate::services::settings_service::SettingsService;
use crate::services::template_service::TemplateGalleryService;
use crate::store::EntityStore;

const LOG_TARGET: &str = "agent_platform.state";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<PlatformConfig>,
    pub db: Arc<Database>,
    pub store: EntityStore,
    pub clock: Arc<dyn Clock>,
    pub gateway: Arc<dyn PluginGateway>,

    pub settings_repo: Arc<SettingsRepo>,
    pub crypto: Arc<CryptoService>,

    pub agents: Arc<AgentBuilderService>,
    pub chat: Arc<ChatService>,
    pub models: Arc<ModelManagerService>,
    pub plugins: Arc<PluginMarketplaceService>,
    pub settings: Arc<SettingsService>,
    pub templates: Arc<TemplateGalleryService>,
    pub data: Arc<DataService>,

    cancel_token: CancellationToken,
}

impl AppState {
    /// Opens the on-disk database under `data_dir` and picks the HTTP or
    /// offline gateway from the config.
    pub async fn initialize(config: PlatformConfig) -> Result<Self, AppError> {
        let startup_clock = Instant::now();
        config.validate()?;

        let database = Database::new(&config.data_dir, config.max_read_connections).await?;
        let gateway: Arc<dyn PluginGateway> = if config.offline_catalog {
            Arc::new(CatalogPluginGateway::default())
        } else {
            Arc::new(HttpPluginGateway::new(
                &config.api_base_url,
                config.request_timeout,
            )?)
        };
        let crypto = CryptoService::from_config(&config).await?;

        let state = Self::from_parts(config, database, gateway, crypto, Arc::new(TokioClock));
        state.bootstrap().await;

        log_info!(
            LOG_TARGET,
            "Application state initialized in {} ms",
            startup_clock.elapsed().as_millis()
        );
        Ok(state)
    }

    /// In-memory database with the given gateway. The key comes from the
    /// config, or a key file in its data dir.
    pub async fn in_memory(
        config: PlatformConfig,
        gateway: Arc<dyn PluginGateway>,
    ) -> Result<Self, AppError> {
        config.validate()?;
        let database = Database::in_memory().await?;
        let crypto = CryptoService::from_config(&config).await?;

        let state = Self::from_parts(config, database, gateway, crypto, Arc::new(TokioClock));
        state.bootstrap().await;
        Ok(state)
    }

    pub fn from_parts(
        config: PlatformConfig,
        database: Database,
        gateway: Arc<dyn PluginGateway>,
        crypto: CryptoService,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cancel_token = CancellationToken::new();
        let store = EntityStore::new();

        let settings_repo = SettingsRepo::with_pools(
            database.read_pool().clone(),
            database.write_pool().clone(),
        );
        let settings = SettingsService::new(settings_repo.clone(), crypto.clone(), store.clone());

        let agents = AgentBuilderService::new(store.clone(), Arc::clone(&clock));
        let chat = ChatService::new(
            store.clone(),
            Arc::clone(&clock),
            &config,
            cancel_token.clone(),
        );
        let models = ModelManagerService::new(
            store.clone(),
            Arc::clone(&clock),
            config.model_test_delay,
            cancel_token.clone(),
        );
        let plugins = PluginMarketplaceService::new(
            store.clone(),
            Arc::clone(&gateway),
            Arc::clone(&clock),
            &config,
            cancel_token.clone(),
        );
        let templates = TemplateGalleryService::new(store.clone());
        let data = DataService::new(store.clone(), settings.clone(), Arc::clone(&clock));

        Self {
            config: Arc::new(config),
            db: Arc::new(database),
            store,
            clock,
            gateway,
            settings_repo: Arc::new(settings_repo),
            crypto: Arc::new(crypto),
            agents: Arc::new(agents),
            chat: Arc::new(chat),
            models: Arc::new(models),
            plugins: Arc::new(plugins),
            settings: Arc::new(settings),
            templates: Arc::new(templates),
            data: Arc::new(data),
            cancel_token,
        }
    }

    /// Applies the saved theme and loads the template library. Failures are
    /// logged; the session starts with defaults.
    async fn bootstrap(&self) {
        match self.settings.load().await {
            Ok(settings) => self.settings.apply_theme(settings.theme),
            Err(error) => log_warn!(LOG_TARGET, "Using default settings: {}", error),
        }
        if let Err(error) = self.templates.load_catalog() {
            log_warn!(LOG_TARGET, "Template catalog not loaded: {}", error);
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Cancels pending replies, installs and timers, then optimizes the
    /// database.
    pub async fn shutdown(&self) {
        self.cancel_token.cancel();
        self.db.optimize().await;
        log_info!(LOG_TARGET, "Application state shut down");
    }
}
