use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

const ENV_PREFIX: &str = "AGENT_PLATFORM_";

/// Runtime knobs for the state model. Durations drive the simulated delays
/// and the gateway timeout.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    pub data_dir: PathBuf,
    pub api_base_url: String,
    /// Serve the built-in plugin catalog instead of calling the backend.
    pub offline_catalog: bool,
    pub request_timeout: Duration,
    pub max_read_connections: u32,

    pub reply_delay: Duration,
    /// Upper bound of the extra delay added to every simulated reply.
    pub reply_jitter: Duration,
    pub default_reply_model: String,

    pub install_progress_interval: Duration,
    pub install_progress_step: u8,
    pub install_progress_ceiling: u8,
    pub progress_clear_delay: Duration,

    pub model_test_delay: Duration,
    pub plugin_config_ttl: Duration,

    /// Base64 AES-256 key. When absent a key file in `data_dir` is used.
    pub master_key_b64: Option<String>,
    pub log_filter: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".agent-platform"),
            api_base_url: "http://127.0.0.1:8000".to_string(),
            offline_catalog: false,
            request_timeout: Duration::from_secs(30),
            max_read_connections: 4,
            reply_delay: Duration::from_millis(1500),
            reply_jitter: Duration::from_millis(1000),
            default_reply_model: "MiniMax-M2".to_string(),
            install_progress_interval: Duration::from_millis(200),
            install_progress_step: 10,
            install_progress_ceiling: 90,
            progress_clear_delay: Duration::from_millis(1000),
            model_test_delay: Duration::from_millis(2000),
            plugin_config_ttl: Duration::from_secs(300),
            master_key_b64: None,
            log_filter: "warn,agent_platform_lib=info".to_string(),
        }
    }
}

impl PlatformConfig {
    /// Defaults overridden by `AGENT_PLATFORM_*` environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut config = Self::default();

        if let Some(dir) = get("DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(url) = get("API_BASE_URL") {
            config.api_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(value) = get("OFFLINE_CATALOG") {
            config.offline_catalog = parse("OFFLINE_CATALOG", &value)?;
        }
        if let Some(value) = get("REQUEST_TIMEOUT_MS") {
            config.request_timeout = millis("REQUEST_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = get("MAX_READ_CONNECTIONS") {
            config.max_read_connections = parse("MAX_READ_CONNECTIONS", &value)?;
        }
        if let Some(value) = get("REPLY_DELAY_MS") {
            config.reply_delay = millis("REPLY_DELAY_MS", &value)?;
        }
        if let Some(value) = get("REPLY_JITTER_MS") {
            config.reply_jitter = millis("REPLY_JITTER_MS", &value)?;
        }
        if let Some(model) = get("DEFAULT_REPLY_MODEL") {
            config.default_reply_model = model;
        }
        if let Some(value) = get("INSTALL_PROGRESS_INTERVAL_MS") {
            config.install_progress_interval = millis("INSTALL_PROGRESS_INTERVAL_MS", &value)?;
        }
        if let Some(value) = get("INSTALL_PROGRESS_STEP") {
            config.install_progress_step = parse("INSTALL_PROGRESS_STEP", &value)?;
        }
        if let Some(value) = get("INSTALL_PROGRESS_CEILING") {
            config.install_progress_ceiling = parse("INSTALL_PROGRESS_CEILING", &value)?;
        }
        if let Some(value) = get("PROGRESS_CLEAR_DELAY_MS") {
            config.progress_clear_delay = millis("PROGRESS_CLEAR_DELAY_MS", &value)?;
        }
        if let Some(value) = get("MODEL_TEST_DELAY_MS") {
            config.model_test_delay = millis("MODEL_TEST_DELAY_MS", &value)?;
        }
        if let Some(value) = get("PLUGIN_CONFIG_TTL_SECS") {
            config.plugin_config_ttl =
                Duration::from_secs(parse("PLUGIN_CONFIG_TTL_SECS", &value)?);
        }
        if let Some(key) = get("MASTER_KEY") {
            config.master_key_b64 = Some(key);
        }
        if let Some(filter) = get("LOG") {
            config.log_filter = filter;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.install_progress_step == 0 {
            return Err(AppError::Config(
                "install progress step must be positive".to_string(),
            ));
        }
        if self.install_progress_ceiling >= 100 {
            return Err(AppError::Config(
                "install progress ceiling must stay below 100".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(AppError::Config(
                "request timeout must be positive".to_string(),
            ));
        }
        if self.install_progress_interval.is_zero() {
            return Err(AppError::Config(
                "install progress interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse<T: FromStr>(name: &str, value: &str) -> Result<T, AppError> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::Config(format!("{ENV_PREFIX}{name} has invalid value '{value}'")))
}

fn millis(name: &str, value: &str) -> Result<Duration, AppError> {
    parse::<u64>(name, value).map(Duration::from_millis)
}
