//! Google Gemini provider
//!
//! One provider struct implements both the content-generation and coaching
//! contracts. The task generator runs in JSON mode with a response schema so
//! the model returns a bare array; the coach runs as plain text with a system
//! instruction describing the app's tone.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use super::types::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Part,
};
use super::{
    build_provider_client, strip_code_fences, CoachProvider, ContentProvider, ProviderError,
    TaskCandidate,
};
use crate::models::{Category, ChatTurn, Role};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

const TEMPERATURE: f64 = 0.7;
const MAX_OUTPUT_TOKENS: u32 = 8192;

const COACH_SYSTEM_INSTRUCTION: &str = "\
You are the AI coach inside an app called ReBloom. Your users have often been \
out of work, study, or social life for a long stretch and want to ease back in. \
Your role:
1. Empathize deeply with how the user feels and never judge them.
2. Encourage tiny micro-steps rather than pushing ambitious advice.
3. Keep a warm, gentle, respectful tone.
4. When the user shows any will to study or act, praise it and suggest something \
very easy, like a five-minute version of the task.";

/// Gemini provider backing both task generation and coaching chat.
pub struct GeminiProvider {
    api_key: Option<String>,
    model: String,
    client: Client,
}

impl GeminiProvider {
    /// Create a provider with the default model.
    ///
    /// Key resolution: explicit key, then `GEMINI_API_KEY`, then
    /// `GOOGLE_API_KEY`. A provider without a key is still constructible;
    /// every call returns `ProviderError::MissingKey`.
    pub fn new(api_key: Option<&str>) -> Self {
        let resolved_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok());

        Self {
            api_key: resolved_key,
            model: DEFAULT_MODEL.to_string(),
            client: build_provider_client(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn has_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn generation_prompt(category: Category, mood: &str) -> String {
        format!(
            "The user's current mood: {mood}\n\
             Category of interest: {category}\n\n\
             For someone feeling listless or trying to restart study or social life, \
             recommend 3 very small, doable micro-missions in that category. \
             They must be easy enough that failure feels impossible.\n\n\
             Return JSON."
        )
    }

    fn task_response_schema() -> serde_json::Value {
        json!({
            "type": "ARRAY",
            "items": {
                "type": "OBJECT",
                "properties": {
                    "text": { "type": "STRING", "description": "Task description" },
                    "difficulty": { "type": "STRING", "enum": ["easy", "medium", "hard"] }
                },
                "required": ["text", "difficulty"]
            }
        })
    }

    fn chat_contents(message: &str, history: &[ChatTurn]) -> Vec<Content> {
        let mut contents: Vec<Content> = history
            .iter()
            .map(|turn| Content {
                role: Some(
                    match turn.role {
                        Role::User => "user",
                        Role::Model => "model",
                    }
                    .to_string(),
                ),
                parts: vec![Part {
                    text: turn.text.clone(),
                }],
            })
            .collect();
        contents.push(Content {
            role: Some("user".to_string()),
            parts: vec![Part {
                text: message.to_string(),
            }],
        });
        contents
    }

    async fn call_api(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, ProviderError> {
        let api_key = self.api_key.as_ref().ok_or(ProviderError::MissingKey)?;

        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={api_key}",
            self.model
        );

        let response = self.client.post(&url).json(request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(format!("{status}: {error_text}")));
        }

        let result: GenerateContentResponse = response.json().await?;

        if let Some(err) = result.error {
            return Err(ProviderError::Api(err.message));
        }

        Ok(result)
    }

    fn extract_text(result: &GenerateContentResponse) -> Result<String, ProviderError> {
        let text = result
            .candidates
            .as_ref()
            .and_then(|c| c.first())
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ProviderError::Malformed("empty response".to_string()));
        }

        Ok(text)
    }

    fn parse_candidates(raw: &str) -> Result<Vec<TaskCandidate>, ProviderError> {
        let stripped = strip_code_fences(raw);
        serde_json::from_str(stripped).map_err(|e| ProviderError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl ContentProvider for GeminiProvider {
    async fn generate(
        &self,
        category: Category,
        mood: &str,
    ) -> Result<Vec<TaskCandidate>, ProviderError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Self::generation_prompt(category, mood),
                }],
            }],
            system_instruction: None,
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                max_output_tokens: MAX_OUTPUT_TOKENS,
                response_mime_type: Some("application/json".to_string()),
                response_schema: Some(Self::task_response_schema()),
            },
        };

        let result = self.call_api(&request).await?;
        let text = Self::extract_text(&result)?;
        Self::parse_candidates(&text)
    }
}

#[async_trait]
impl CoachProvider for GeminiProvider {
    async fn converse(
        &self,
        message: &str,
        history: &[ChatTurn],
    ) -> Result<String, ProviderError> {
        let request = GenerateContentRequest {
            contents: Self::chat_contents(message, history),
            system_instruction: Some(Content {
                role: None,
                parts: vec![Part {
                    text: COACH_SYSTEM_INSTRUCTION.to_string(),
                }],
            }),
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                max_output_tokens: MAX_OUTPUT_TOKENS,
                response_mime_type: None,
                response_schema: None,
            },
        };

        let result = self.call_api(&request).await?;
        Self::extract_text(&result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_creates_with_key() {
        let provider = GeminiProvider::new(Some("test-api-key"));
        assert!(provider.has_key());
        assert_eq!(provider.api_key.as_deref(), Some("test-api-key"));
    }

    #[test]
    fn generation_prompt_mentions_category_and_mood() {
        let prompt = GeminiProvider::generation_prompt(Category::Study, "tired");
        assert!(prompt.contains("tired"));
        assert!(prompt.contains("study"));
        assert!(prompt.contains("3"));
    }

    #[test]
    fn chat_contents_appends_message_after_history() {
        let history = vec![
            ChatTurn {
                role: Role::User,
                text: "hi".to_string(),
            },
            ChatTurn {
                role: Role::Model,
                text: "hello".to_string(),
            },
        ];
        let contents = GeminiProvider::chat_contents("how are you", &history);
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0].role.as_deref(), Some("user"));
        assert_eq!(contents[1].role.as_deref(), Some("model"));
        assert_eq!(contents[2].role.as_deref(), Some("user"));
        assert_eq!(contents[2].parts[0].text, "how are you");
    }

    #[test]
    fn task_schema_requires_text_and_difficulty() {
        let schema = GeminiProvider::task_response_schema();
        assert_eq!(schema["type"], "ARRAY");
        assert_eq!(
            schema["items"]["required"],
            serde_json::json!(["text", "difficulty"])
        );
    }

    #[test]
    fn parse_candidates_plain_json() {
        let raw = r#"[{"text": "Drink water", "difficulty": "easy"}]"#;
        let candidates = GeminiProvider::parse_candidates(raw).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].text, "Drink water");
        assert_eq!(candidates[0].difficulty, "easy");
    }

    #[test]
    fn parse_candidates_fenced_json() {
        let raw = "```json\n[{\"text\": \"Stretch\", \"difficulty\": \"medium\"}]\n```";
        let candidates = GeminiProvider::parse_candidates(raw).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].difficulty, "medium");
    }

    #[test]
    fn parse_candidates_rejects_garbage() {
        let err = GeminiProvider::parse_candidates("the model rambled instead");
        assert!(matches!(err, Err(ProviderError::Malformed(_))));
    }

    #[tokio::test]
    async fn missing_key_errors_without_network() {
        // Construct directly so ambient env vars cannot leak a key in.
        let provider = GeminiProvider {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            client: build_provider_client(),
        };
        let result = provider.generate(Category::Life, "ok").await;
        assert!(matches!(result, Err(ProviderError::MissingKey)));
    }
}
