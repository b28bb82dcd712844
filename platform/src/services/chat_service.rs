use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::PlatformConfig;
use crate::db::models::{Agent, AgentPatch, ChatMessage};
use crate::error::AppError;
use crate::services::clock::Clock;
use crate::store::EntityStore;

const LOG_TARGET: &str = "agent_platform.chat";

/// Produces the assistant side of a conversation.
pub trait ReplyGenerator: Send + Sync {
    fn reply(&self, agent_name: &str, prompt: &str) -> String;
}

/// Canned replies picked deterministically from the prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedReplyGenerator;

impl ReplyGenerator for SimulatedReplyGenerator {
    fn reply(&self, agent_name: &str, prompt: &str) -> String {
        let replies = [
            format!(
                "I understand you're asking about \"{prompt}\". As {agent_name}, I can help you with that using my advanced capabilities."
            ),
            format!(
                "That's an interesting question! Based on my training with MiniMax-M2, I can provide insights on \"{prompt}\". Let me think through this..."
            ),
            format!(
                "I'd be happy to help with \"{prompt}\". My agentic workflow capabilities allow me to break this down systematically."
            ),
            format!(
                "Great question! I'm processing \"{prompt}\" using my multi-step reasoning capabilities. Here's my analysis..."
            ),
            format!(
                "I'm analyzing \"{prompt}\" using my advanced AI capabilities. This is exactly the type of complex reasoning task I'm optimized for."
            ),
        ];
        let index = (content_hash(prompt) % replies.len() as u64) as usize;
        replies[index].clone()
    }
}

fn content_hash(content: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish()
}

#[derive(Clone)]
pub struct ChatService {
    store: EntityStore,
    clock: Arc<dyn Clock>,
    generator: Arc<dyn ReplyGenerator>,
    typing: Arc<DashMap<String, ()>>,
    reply_delay: Duration,
    reply_jitter: Duration,
    default_model: String,
    cancel_token: CancellationToken,
}

impl ChatService {
    pub fn new(
        store: EntityStore,
        clock: Arc<dyn Clock>,
        config: &PlatformConfig,
        cancel_token: CancellationToken,
    ) -> Self {
        Self::with_generator(
            store,
            clock,
            Arc::new(SimulatedReplyGenerator),
            config,
            cancel_token,
        )
    }

    pub fn with_generator(
        store: EntityStore,
        clock: Arc<dyn Clock>,
        generator: Arc<dyn ReplyGenerator>,
        config: &PlatformConfig,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            store,
            clock,
            generator,
            typing: Arc::new(DashMap::new()),
            reply_delay: config.reply_delay,
            reply_jitter: config.reply_jitter,
            default_model: config.default_reply_model.clone(),
            cancel_token,
        }
    }

    pub fn is_typing(&self, agent_id: &str) -> bool {
        self.typing.contains_key(agent_id)
    }

    pub fn history(&self, agent_id: &str) -> Vec<ChatMessage> {
        self.store.messages(agent_id)
    }

    /// Delay before the reply lands: the base delay plus a jitter derived
    /// from the content, never more than the configured jitter.
    pub fn reply_delay_for(&self, content: &str) -> Duration {
        let jitter_ms = self.reply_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            content_hash(content) % (jitter_ms + 1)
        };
        self.reply_delay + Duration::from_millis(jitter)
    }

    /// Appends the user message right away and schedules the reply. The
    /// returned handle resolves once the reply is in the store, or right away
    /// if the service is shut down first.
    pub fn send_message(&self, agent_id: &str, content: &str) -> Result<JoinHandle<()>, AppError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::validation("content", "Message cannot be empty"));
        }

        match self.typing.entry(agent_id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(AppError::validation(
                    "agentId",
                    "A reply is still pending for this agent",
                ));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(());
            }
        }

        let now = self.clock.now();
        let is_new_conversation = self.store.messages(agent_id).is_empty();
        if let Err(error) = self
            .store
            .add_message(agent_id, ChatMessage::user(content, now))
        {
            self.typing.remove(agent_id);
            return Err(error);
        }

        let agent = self.store.agent(agent_id);
        if let Some(agent) = &agent {
            self.store.update_agent(
                agent_id,
                AgentPatch {
                    last_used: Some(now),
                    conversations: is_new_conversation.then_some(agent.conversations + 1),
                    ..AgentPatch::default()
                },
            );
        }

        Ok(self.spawn_reply(agent_id, content, agent))
    }

    fn spawn_reply(&self, agent_id: &str, content: &str, agent: Option<Agent>) -> JoinHandle<()> {
        let store = self.store.clone();
        let clock = Arc::clone(&self.clock);
        let generator = Arc::clone(&self.generator);
        let typing = Arc::clone(&self.typing);
        let token = self.cancel_token.clone();
        let delay = self.reply_delay_for(content);
        let agent_id = agent_id.to_string();
        let prompt = content.to_string();
        let (agent_name, model) = match agent {
            Some(agent) => (agent.name, agent.model),
            None => ("Agent".to_string(), self.default_model.clone()),
        };

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!(target: LOG_TARGET, agent_id = %agent_id, "Reply cancelled on shutdown");
                }
                _ = clock.sleep(delay) => {
                    let reply = ChatMessage::assistant(
                        generator.reply(&agent_name, &prompt),
                        model,
                        clock.now(),
                    );
                    if let Err(error) = store.add_message(&agent_id, reply) {
                        crate::log_warn!(LOG_TARGET, "Dropped reply for {}: {}", agent_id, error);
                    }
                }
            }
            typing.remove(&agent_id);
        })
    }

    pub fn clear_history(&self, agent_id: &str) -> bool {
        self.store.clear_messages(agent_id)
    }
}
