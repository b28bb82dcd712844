use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::db::models::{EntityStatus, Model, ModelPatch, PerformanceSnapshot};
use crate::db::seed;
use crate::error::AppError;
use crate::log_info;
use crate::services::clock::Clock;
use crate::services::Confirm;
use crate::store::EntityStore;

const LOG_TARGET: &str = "agent_platform.models";

#[derive(Clone)]
pub struct ModelManagerService {
    store: EntityStore,
    clock: Arc<dyn Clock>,
    testing: Arc<DashMap<String, ()>>,
    test_delay: Duration,
    cancel_token: CancellationToken,
}

impl ModelManagerService {
    pub fn new(
        store: EntityStore,
        clock: Arc<dyn Clock>,
        test_delay: Duration,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            store,
            clock,
            testing: Arc::new(DashMap::new()),
            test_delay,
            cancel_token,
        }
    }

    pub fn add_model(&self, mut model: Model) -> Result<(), AppError> {
        model.id = model.id.trim().to_string();
        model.name = model.name.trim().to_string();
        if model.id.is_empty() {
            return Err(AppError::validation("id", "Model id is required"));
        }
        if model.name.is_empty() {
            return Err(AppError::validation("name", "Model name is required"));
        }

        let id = model.id.clone();
        self.store.add_model(model)?;
        log_info!(LOG_TARGET, "Registered model {}", id);
        Ok(())
    }

    /// Adds the built-in sample set, skipping ids already registered.
    /// Returns how many were added.
    pub fn add_sample_models(&self) -> usize {
        let mut added = 0;
        for model in seed::sample_models() {
            if self.store.model(&model.id).is_some() {
                continue;
            }
            if self.store.add_model(model).is_ok() {
                added += 1;
            }
        }
        log_info!(LOG_TARGET, "Added {} sample models", added);
        added
    }

    /// Active becomes inactive; inactive and errored models become active.
    pub fn toggle_model(&self, model_id: &str) -> Result<EntityStatus, AppError> {
        let model = self
            .store
            .model(model_id)
            .ok_or_else(|| AppError::not_found("model", model_id))?;
        let status = model.status.toggled();
        self.store
            .update_model(model_id, ModelPatch::status(status));
        Ok(status)
    }

    /// Returns `Ok(false)` when the user declines.
    pub fn delete_model(&self, model_id: &str, confirm: &dyn Confirm) -> Result<bool, AppError> {
        let model = self
            .store
            .model(model_id)
            .ok_or_else(|| AppError::not_found("model", model_id))?;
        if !confirm.confirm(&format!("Are you sure you want to delete {}?", model.name)) {
            return Ok(false);
        }

        self.store.remove_model(model_id);
        log_info!(LOG_TARGET, "Deleted model {}", model_id);
        Ok(true)
    }

    pub fn is_testing(&self, model_id: &str) -> bool {
        self.testing.contains_key(model_id)
    }

    /// Runs a simulated health check. After the test delay the model gets a
    /// fresh performance snapshot and becomes active, unless it was removed
    /// in the meantime. A model already under test is rejected.
    pub fn test_model(&self, model_id: &str) -> Result<JoinHandle<()>, AppError> {
        if self.store.model(model_id).is_none() {
            return Err(AppError::not_found("model", model_id));
        }
        match self.testing.entry(model_id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(AppError::validation(
                    "modelId",
                    format!("{model_id} is already being tested"),
                ));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(());
            }
        }

        let store = self.store.clone();
        let clock = Arc::clone(&self.clock);
        let testing = Arc::clone(&self.testing);
        let token = self.cancel_token.clone();
        let delay = self.test_delay;
        let model_id = model_id.to_string();

        Ok(tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = clock.sleep(delay) => {
                    let seed = probe_seed(&model_id, clock.now().timestamp_millis());
                    store.update_model(
                        &model_id,
                        ModelPatch {
                            performance: Some(simulated_performance(seed)),
                            status: Some(EntityStatus::Active),
                            ..ModelPatch::default()
                        },
                    );
                }
            }
            testing.remove(&model_id);
        }))
    }
}

fn probe_seed(model_id: &str, at_millis: i64) -> u64 {
    let mut hasher = DefaultHasher::new();
    model_id.hash(&mut hasher);
    at_millis.hash(&mut hasher);
    hasher.finish()
}

/// Latency 50-249 ms, throughput 500-1499 tokens/s, uptime 95-99 %.
fn simulated_performance(seed: u64) -> PerformanceSnapshot {
    PerformanceSnapshot {
        latency_ms: 50 + (seed % 200) as u32,
        throughput: 500 + ((seed >> 16) % 1000) as u32,
        uptime: 95.0 + ((seed >> 32) % 5) as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::ModelKind;
    use crate::services::clock::TokioClock;

    fn service(store: &EntityStore) -> ModelManagerService {
        ModelManagerService::new(
            store.clone(),
            Arc::new(TokioClock),
            Duration::from_millis(2000),
            CancellationToken::new(),
        )
    }

    #[test]
    fn sample_models_are_added_once() {
        let store = EntityStore::new();
        let manager = service(&store);
        assert_eq!(manager.add_sample_models(), 4);
        assert_eq!(manager.add_sample_models(), 0);
        assert_eq!(store.models().len(), 4);
    }

    #[test]
    fn add_model_requires_id_and_name() {
        let store = EntityStore::new();
        let manager = service(&store);
        let mut model = seed::sample_models().remove(2);
        model.name = " ".into();
        assert!(matches!(
            manager.add_model(model.clone()),
            Err(AppError::Validation { .. })
        ));

        model.name = "GPT-4o".into();
        model.kind = ModelKind::Api;
        manager.add_model(model.clone()).unwrap();
        assert!(matches!(
            manager.add_model(model),
            Err(AppError::Duplicate { .. })
        ));
    }

    #[test]
    fn toggle_and_confirmed_delete() {
        let store = EntityStore::new();
        let manager = service(&store);
        manager.add_sample_models();

        assert_eq!(
            manager.toggle_model("claude-3-sonnet").unwrap(),
            EntityStatus::Active
        );
        assert_eq!(
            manager.toggle_model("claude-3-sonnet").unwrap(),
            EntityStatus::Inactive
        );

        assert!(!manager.delete_model("gpt-4o", &false).unwrap());
        assert!(store.model("gpt-4o").is_some());
        assert!(manager.delete_model("gpt-4o", &true).unwrap());
        assert!(store.model("gpt-4o").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_model_writes_performance_and_activates() {
        let store = EntityStore::new();
        let manager = service(&store);
        manager.add_sample_models();
        store.update_model("claude-3-sonnet", ModelPatch::status(EntityStatus::Error));

        let handle = manager.test_model("claude-3-sonnet").unwrap();
        assert!(manager.is_testing("claude-3-sonnet"));
        handle.await.unwrap();

        let model = store.model("claude-3-sonnet").unwrap();
        assert_eq!(model.status, EntityStatus::Active);
        let performance = model.performance.unwrap();
        assert!((50..250).contains(&performance.latency_ms));
        assert!((500..1500).contains(&performance.throughput));
        assert!(!manager.is_testing("claude-3-sonnet"));
    }

    #[tokio::test(start_paused = true)]
    async fn late_test_result_for_removed_model_is_dropped() {
        let store = EntityStore::new();
        let manager = service(&store);
        manager.add_sample_models();

        let handle = manager.test_model("gpt-4o").unwrap();
        store.remove_model("gpt-4o");
        handle.await.unwrap();

        assert!(store.model("gpt-4o").is_none());
        assert_eq!(store.models().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_test_of_same_model_is_rejected() {
        let store = EntityStore::new();
        let manager = service(&store);
        manager.add_sample_models();

        let first = manager.test_model("claude-3-sonnet").unwrap();
        assert!(matches!(
            manager.test_model("claude-3-sonnet"),
            Err(AppError::Validation { .. })
        ));
        assert!(manager.is_testing("claude-3-sonnet"));

        first.await.unwrap();
        assert!(!manager.is_testing("claude-3-sonnet"));
        manager.test_model("claude-3-sonnet").unwrap().await.unwrap();
    }
}
