pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod repositories;
pub mod services;
pub mod state;
pub mod store;

pub use config::PlatformConfig;
pub use error::AppError;
pub use state::AppState;
pub use store::{EntityStore, StoreChange, StoreEvent, StoreListener, StoreSnapshot};

/// Installs tracing and the file log sink, then builds the application state.
pub async fn run(config: PlatformConfig) -> Result<AppState, AppError> {
    logging::init_tracing(&config.log_filter);
    if let Err(error) = logging::init_logging(&config.data_dir) {
        tracing::warn!("File logging disabled: {}", error);
    }

    AppState::initialize(config).await
}
