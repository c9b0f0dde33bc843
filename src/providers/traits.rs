//! Provider traits and error type
//!
//! Everything downstream of these traits treats the model as an unreliable
//! collaborator: any call may fail, and callers are expected to substitute
//! canned content rather than surface the error to the user.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Category, ChatTurn};

/// Errors from a content or coaching provider
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider api error: {0}")]
    Api(String),
    #[error("malformed provider response: {0}")]
    Malformed(String),
    #[error("no api key configured")]
    MissingKey,
}

/// A task suggestion as it comes off the wire, before difficulty coercion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCandidate {
    pub text: String,
    pub difficulty: String,
}

/// Generates micro-task suggestions for a category and mood
#[async_trait]
pub trait ContentProvider: Send + Sync {
    async fn generate(
        &self,
        category: Category,
        mood: &str,
    ) -> Result<Vec<TaskCandidate>, ProviderError>;
}

/// Produces a coaching reply given the user's message and the prior transcript
#[async_trait]
pub trait CoachProvider: Send + Sync {
    async fn converse(
        &self,
        message: &str,
        history: &[ChatTurn],
    ) -> Result<String, ProviderError>;
}
