pub mod agent_service;
pub mod chat_service;
pub mod clock;
pub mod crypto_service;
pub mod data_service;
pub mod gateway;
pub mod model_manager_service;
pub mod plugin_service;
pub mod settings_service;
pub mod template_service;

/// Gate for destructive actions. Nothing is mutated and no gateway call is
/// made unless this returns true.
pub trait Confirm {
    fn confirm(&self, message: &str) -> bool;
}

impl Confirm for bool {
    fn confirm(&self, _message: &str) -> bool {
        *self
    }
}
