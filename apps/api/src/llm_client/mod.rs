/// LLM Client: the single point of entry for all Claude API calls in the assistant.
///
/// ARCHITECTURAL RULE: No workflow node may call the Anthropic API directly.
/// Nodes receive an `Arc<dyn ChatModel>` and speak in role-tagged `Message`s;
/// `LlmClient` is the production implementation of that boundary.
///
/// Model: claude-sonnet-4-5 (hardcoded, not configurable)
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;
#[cfg(test)]
pub mod scripted;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for all LLM calls.
/// This is intentionally hardcoded to prevent accidental drift.
pub const MODEL: &str = "claude-sonnet-4-5";
const MAX_TOKENS: u32 = 4096;
const MAX_RETRIES: u32 = 3;
/// Sent ahead of a transcript whose first turn is the assistant's.
const OPENING_TURN: &str = "Please begin.";

/// Errors raised at the LLM boundary. Every variant is an external-service failure
/// from the workflow's point of view.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("Conversation has no user or assistant turns")]
    EmptyConversation,
}

// ────────────────────────────────────────────────────────────────────────────
// Conversation model
// ────────────────────────────────────────────────────────────────────────────

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    Human,
    Assistant,
}

/// One role-tagged turn. Transcripts are ordered and append-only within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A single text completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub content: String,
}

/// The chat-model boundary every workflow node talks to.
///
/// Carried by the workflows as `Arc<dyn ChatModel>`, so tests can swap in a
/// scripted model without touching node code.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Sends the ordered conversation and returns one completion. No streaming.
    async fn invoke(&self, messages: &[Message]) -> Result<Completion, LlmError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Anthropic wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "str::is_empty")]
    system: &'a str,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content from the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// Splits a transcript into the Anthropic `system` string and the user/assistant turns.
///
/// System messages may appear anywhere; they are concatenated in order.
/// The API wants strictly alternating turns that open with the user, so
/// back-to-back turns from one side are joined and a transcript that opens
/// with the assistant gets a short user turn in front.
fn split_system(messages: &[Message]) -> (String, Vec<AnthropicMessage>) {
    let system = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.trim())
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut turns: Vec<AnthropicMessage> = Vec::new();
    for m in messages {
        let role = match m.role {
            Role::System => continue,
            Role::Human => "user",
            Role::Assistant => "assistant",
        };
        match turns.last_mut() {
            Some(last) if last.role == role => {
                last.content.push_str("\n\n");
                last.content.push_str(&m.content);
            }
            None if role == "assistant" => {
                turns.push(AnthropicMessage {
                    role: "user",
                    content: OPENING_TURN.to_string(),
                });
                turns.push(AnthropicMessage {
                    role,
                    content: m.content.clone(),
                });
            }
            _ => turns.push(AnthropicMessage {
                role,
                content: m.content.clone(),
            }),
        }
    }

    (system, turns)
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

/// The production chat model.
/// Wraps the Anthropic Messages API with retry logic.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
}

impl LlmClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
        }
    }

    /// Makes a raw call to the Claude API, returning the full response object.
    /// Retries on 429 (rate limit), 5xx and transport errors with exponential backoff.
    pub async fn call(&self, messages: &[Message]) -> Result<LlmResponse, LlmError> {
        let (system, turns) = split_system(messages);
        if turns.is_empty() {
            return Err(LlmError::EmptyConversation);
        }

        let request_body = AnthropicRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system: &system,
            messages: turns,
        };

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(ANTHROPIC_API_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                // Try to parse error message
                let message = serde_json::from_str::<AnthropicError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let llm_response: LlmResponse = response.json().await?;

            debug!(
                "LLM call succeeded: input_tokens={}, output_tokens={}",
                llm_response.usage.input_tokens, llm_response.usage.output_tokens
            );

            return Ok(llm_response);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn invoke(&self, messages: &[Message]) -> Result<Completion, LlmError> {
        let response = self.call(messages).await?;
        let text = response.text().ok_or(LlmError::EmptyContent)?;
        Ok(Completion {
            content: text.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_system_joins_system_turns_in_order() {
        let messages = vec![
            Message::system("You review resumes."),
            Message::human("Rate this."),
            Message::system("Be brief."),
            Message::assistant("Looks fine."),
        ];
        let (system, turns) = split_system(&messages);

        assert_eq!(system, "You review resumes.\n\nBe brief.");
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, "user");
        assert_eq!(turns[0].content, "Rate this.");
        assert_eq!(turns[1].role, "assistant");
    }

    #[test]
    fn test_split_system_alternates_turns() {
        let messages = vec![
            Message::system("You interview candidates."),
            Message::assistant("Welcome."),
            Message::assistant("First question?"),
            Message::human("An answer."),
            Message::human("More detail."),
            Message::assistant("Next question?"),
        ];
        let (_, turns) = split_system(&messages);

        let roles: Vec<_> = turns.iter().map(|t| t.role).collect();
        assert_eq!(roles, vec!["user", "assistant", "user", "assistant"]);
        assert_eq!(turns[0].content, OPENING_TURN);
        assert_eq!(turns[1].content, "Welcome.\n\nFirst question?");
        assert_eq!(turns[2].content, "An answer.\n\nMore detail.");
        assert_eq!(turns[3].content, "Next question?");
    }

    #[test]
    fn test_split_system_without_system_turns() {
        let messages = vec![Message::human("hello")];
        let (system, turns) = split_system(&messages);
        assert!(system.is_empty());
        assert_eq!(turns.len(), 1);
    }

    #[test]
    fn test_request_omits_empty_system() {
        let messages = vec![Message::human("hello")];
        let (system, turns) = split_system(&messages);
        let body = AnthropicRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system: &system,
            messages: turns,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("system").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_response_text_picks_first_text_block() {
        let json = r#"{
            "content": [
                {"type": "tool_use", "text": null},
                {"type": "text", "text": "first"},
                {"type": "text", "text": "second"}
            ],
            "usage": {"input_tokens": 10, "output_tokens": 2}
        }"#;
        let response: LlmResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.text(), Some("first"));
    }

    #[test]
    fn test_message_roles_serialize_lowercase() {
        let json = serde_json::to_string(&Message::human("hi")).unwrap();
        assert_eq!(json, r#"{"role":"human","content":"hi"}"#);
    }

    #[tokio::test]
    async fn test_call_rejects_system_only_conversation() {
        let client = LlmClient::new("test-key".to_string());
        let result = client.call(&[Message::system("only system")]).await;
        assert!(matches!(result, Err(LlmError::EmptyConversation)));
    }
}
