use serde::Serialize;

#[derive(Debug, thiserror::Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum AppError {
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Duplicate {entity} with id {id}")]
    Duplicate { entity: String, id: String },

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Encryption error: {0}")]
    Crypto(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Duplicate {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Wrap an existing error with additional context message.
    pub fn context(self, msg: impl Into<String>) -> Self {
        let ctx = msg.into();
        match self {
            Self::Gateway(e) => Self::Gateway(format!("{ctx}: {e}")),
            Self::Timeout(e) => Self::Timeout(format!("{ctx}: {e}")),
            Self::Database(e) => Self::Database(format!("{ctx}: {e}")),
            Self::Io(e) => Self::Io(format!("{ctx}: {e}")),
            Self::Crypto(e) => Self::Crypto(format!("{ctx}: {e}")),
            Self::Config(e) => Self::Config(format!("{ctx}: {e}")),
            Self::Serialization(e) => Self::Serialization(format!("{ctx}: {e}")),
            Self::Internal(e) => Self::Internal(format!("{ctx}: {e}")),
            other => other, // Structured variants pass through unchanged
        }
    }

    /// Message suitable for the dismissible error banner.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(value: sqlx::Error) -> Self {
        match &value {
            sqlx::Error::PoolTimedOut => {
                Self::Timeout(format!("Database connection pool timed out: {value}"))
            }
            sqlx::Error::RowNotFound => Self::NotFound {
                entity: "row".to_string(),
                id: "unknown".to_string(),
            },
            _ => Self::Database(value.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(value: sqlx::migrate::MigrateError) -> Self {
        Self::Database(value.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            return Self::Timeout(value.to_string());
        }
        match value.status() {
            Some(status) => Self::Gateway(format!("HTTP {status}: {value}")),
            None => Self::Gateway(value.to_string()),
        }
    }
}

impl From<base64::DecodeError> for AppError {
    fn from(value: base64::DecodeError) -> Self {
        Self::Crypto(value.to_string())
    }
}

impl From<aes_gcm::Error> for AppError {
    fn from(_: aes_gcm::Error) -> Self {
        Self::Crypto("Invalid encrypted payload or key".to_string())
    }
}

impl From<tokio::time::error::Elapsed> for AppError {
    fn from(value: tokio::time::error::Elapsed) -> Self {
        Self::Timeout(value.to_string())
    }
}
