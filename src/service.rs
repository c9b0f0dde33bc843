//! Service layer tying the core session to the providers
//!
//! Owns the single-in-flight guards for generation and chat, and owns the
//! fallback substitution: provider failures are logged and replaced with
//! canned content so the caller always gets a usable result.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;

use crate::models::{
    Category, ChatMessage, Core, Difficulty, Role, SessionResponse, Task,
};
use crate::providers::{
    CoachProvider, ContentProvider, TaskCandidate, EMPTY_REPLY, FALLBACK_REPLY, FALLBACK_TASKS,
};

/// How many suggestions a generation round may add, regardless of how many
/// the provider returns.
pub const MAX_GENERATED_TASKS: usize = 3;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("another request of this kind is already in flight")]
    Busy,
}

/// Application service over one session
#[derive(Clone)]
pub struct Service {
    core: Core,
    content: Arc<dyn ContentProvider>,
    coach: Arc<dyn CoachProvider>,
    generation_guard: Arc<Mutex<()>>,
    chat_guard: Arc<Mutex<()>>,
}

impl Service {
    pub fn new(core: Core, content: Arc<dyn ContentProvider>, coach: Arc<dyn CoachProvider>) -> Self {
        Self {
            core,
            content,
            coach,
            generation_guard: Arc::new(Mutex::new(())),
            chat_guard: Arc::new(Mutex::new(())),
        }
    }

    pub fn core(&self) -> &Core {
        &self.core
    }

    /// Ask the content provider for suggestions and add them to the session.
    ///
    /// At most one generation runs at a time; a second caller gets
    /// `ServiceError::Busy` instead of queueing. Provider failures fall back
    /// to the canned easy tasks.
    pub async fn request_generation(
        &self,
        category: Category,
        mood: &str,
    ) -> Result<SessionResponse<Vec<Task>>, ServiceError> {
        let _permit = self
            .generation_guard
            .try_lock()
            .map_err(|_| ServiceError::Busy)?;

        let candidates = match self.content.generate(category, mood).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!("content provider failed, using fallback tasks: {e}");
                FALLBACK_TASKS.clone()
            }
        };

        let tasks: Vec<Task> = candidates
            .into_iter()
            .take(MAX_GENERATED_TASKS)
            .map(|c| {
                Task::new(c.text, category, Difficulty::coerce(&c.difficulty))
            })
            .collect();

        let added = tasks.clone();
        let response = self.core.add_tasks(tasks);
        Ok(SessionResponse {
            res: added,
            stats: response.stats,
            garden_stage: response.garden_stage,
        })
    }

    /// Send one user message through the coach and record both sides.
    ///
    /// The user's message lands in the transcript before the provider call,
    /// so it survives a provider failure. The history handed to the coach is
    /// the transcript as it stood before this message.
    pub async fn send_chat_message(
        &self,
        message: &str,
    ) -> Result<SessionResponse<ChatMessage>, ServiceError> {
        let _permit = self.chat_guard.try_lock().map_err(|_| ServiceError::Busy)?;

        let history = self.core.chat_turns();
        self.core.append_message(Role::User, message.to_string());

        let reply = match self.coach.converse(message, &history).await {
            Ok(text) if text.trim().is_empty() => EMPTY_REPLY.to_string(),
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("coach provider failed, using fallback reply: {e}");
                FALLBACK_REPLY.to_string()
            }
        };

        Ok(self.core.append_message(Role::Model, reply))
    }
}
