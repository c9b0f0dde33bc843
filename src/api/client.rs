//! API client module
//!
//! HTTP client for the rebloom API server, used by the CLI subcommands.

use std::sync::Arc;

use reqwest::{Client as ReqwestClient, Error as ReqwestError, StatusCode};
use serde::Deserialize;

use crate::api::server::{
    AddTaskRequest, ChatRequest, GenerateRequest, StreakRequest, ToggleTaskRequest,
};
use crate::models::{Category, ChatMessage, Difficulty, SessionResponse, Task};

/// API client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
        }
    }
}

/// Generic API response structure
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

/// Client errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] ReqwestError),

    #[error("API error: {0}")]
    Api(String),

    #[error("server is busy with another request")]
    Busy,

    #[error("Missing data in response")]
    MissingData,
}

/// API client for the rebloom service
#[derive(Debug, Clone)]
pub struct Client {
    http_client: Arc<ReqwestClient>,
    config: ClientConfig,
}

impl Client {
    /// Create a new client with default configuration
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            http_client: Arc::new(ReqwestClient::new()),
            config,
        }
    }

    async fn unwrap_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        if response.status() == StatusCode::CONFLICT {
            return Err(ClientError::Busy);
        }
        if !response.status().is_success() {
            let status = response.status();
            let api_response: ApiResponse<T> = response.json().await?;
            return Err(ClientError::Api(
                api_response
                    .error
                    .unwrap_or_else(|| format!("HTTP error: {status}")),
            ));
        }

        let api_response: ApiResponse<T> = response.json().await?;
        if api_response.success {
            api_response.data.ok_or(ClientError::MissingData)
        } else {
            Err(ClientError::Api(
                api_response
                    .error
                    .unwrap_or_else(|| "Unknown API error".to_string()),
            ))
        }
    }

    /// Fetch the task board
    pub async fn list_tasks(&self) -> Result<SessionResponse<Vec<Task>>, ClientError> {
        let url = format!("{}/api/tasks", self.config.base_url);
        let response = self.http_client.get(&url).send().await?;
        Self::unwrap_response(response).await
    }

    /// Add a task by hand
    pub async fn add_task(
        &self,
        text: String,
        category: Category,
        difficulty: Difficulty,
    ) -> Result<SessionResponse<usize>, ClientError> {
        let url = format!("{}/api/tasks", self.config.base_url);
        let request = AddTaskRequest {
            text,
            category,
            difficulty,
        };
        let response = self.http_client.post(&url).json(&request).send().await?;
        Self::unwrap_response(response).await
    }

    /// Toggle a task's completion state
    pub async fn toggle_task(
        &self,
        id: String,
    ) -> Result<SessionResponse<Option<bool>>, ClientError> {
        let url = format!("{}/api/tasks/toggle", self.config.base_url);
        let request = ToggleTaskRequest { id };
        let response = self.http_client.post(&url).json(&request).send().await?;
        Self::unwrap_response(response).await
    }

    /// Ask the server to generate task suggestions
    pub async fn generate(
        &self,
        category: Category,
        mood: String,
    ) -> Result<SessionResponse<Vec<Task>>, ClientError> {
        let url = format!("{}/api/generate", self.config.base_url);
        let request = GenerateRequest { category, mood };
        let response = self.http_client.post(&url).json(&request).send().await?;
        Self::unwrap_response(response).await
    }

    /// Fetch the stats snapshot
    pub async fn stats(&self) -> Result<SessionResponse<()>, ClientError> {
        let url = format!("{}/api/stats", self.config.base_url);
        let response = self.http_client.get(&url).send().await?;
        Self::unwrap_response(response).await
    }

    /// Fetch the chat transcript
    pub async fn transcript(&self) -> Result<SessionResponse<Vec<ChatMessage>>, ClientError> {
        let url = format!("{}/api/chat", self.config.base_url);
        let response = self.http_client.get(&url).send().await?;
        Self::unwrap_response(response).await
    }

    /// Send one chat message and get the coach's reply
    pub async fn chat(&self, message: String) -> Result<SessionResponse<ChatMessage>, ClientError> {
        let url = format!("{}/api/chat", self.config.base_url);
        let request = ChatRequest { message };
        let response = self.http_client.post(&url).json(&request).send().await?;
        Self::unwrap_response(response).await
    }

    /// Set the streak counter
    pub async fn set_streak(&self, days: u32) -> Result<SessionResponse<()>, ClientError> {
        let url = format!("{}/api/streak", self.config.base_url);
        let request = StreakRequest { days };
        let response = self.http_client.put(&url).json(&request).send().await?;
        Self::unwrap_response(response).await
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}
