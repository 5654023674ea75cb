use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{app_config::ModelConfig, HttpClient};

/// Send one system+user exchange to a chat-completions endpoint and return the
/// first choice's content.
pub async fn send_json_prompt(
    http_client: &HttpClient,
    model: &ModelConfig,
    api_key: &str,
    system_prompt: &str,
    user_prompt: &str,
) -> anyhow::Result<ChatAnswer> {
    let resp = http_client
        .post(&model.endpoint)
        .bearer_auth(api_key)
        .json(&json!(
          {
            "model": &model.id,
            "temperature": model.temperature,
            "messages": [
              {
                "role": "system",
                "content": system_prompt
              },
              {
                "role": "user",
                "content": user_prompt
              }
            ],
            "response_format": { "type": "json_object" }
          }
        ))
        .send()
        .await
        .context("Could not reach chat API")?
        .json::<serde_json::Value>()
        .await
        .context("Chat API returned a non-JSON body")?;

    let parsed = serde_json::from_value::<ChatApiResponseOrError>(resp.clone())
        .context(format!("Could not parse chat response: {}", resp))?;

    let parsed = match parsed {
        ChatApiResponseOrError::Error(error) => {
            return Err(anyhow!("Chat API error: {}", error.message));
        }
        ChatApiResponseOrError::NestedError { error } => {
            return Err(anyhow!("Chat API error: {}", error.message));
        }
        ChatApiResponseOrError::Response(parsed) => parsed,
    };

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .context("No choices in response")?;

    Ok(ChatAnswer {
        content: choice.message.content.unwrap_or_default(),
        token_usage: parsed.usage.map(|u| u.total_tokens).unwrap_or_default(),
    })
}

#[derive(Debug, Clone)]
pub struct ChatAnswer {
    pub content: String,
    pub token_usage: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PromptUsage {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ModelLength,
    Error,
    ToolCalls,
    /// Anything else an OpenAI-compatible endpoint reports, e.g. `content_filter`
    #[serde(other)]
    Other,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatChoice {
    pub index: i32,
    pub message: ChatMessage,
    pub finish_reason: Option<FinishReason>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatApiResponse {
    pub choices: Vec<ChatChoice>,
    pub usage: Option<PromptUsage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatApiError {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatApiResponseOrError {
    Response(ChatApiResponse),
    Error(ChatApiError),
    /// OpenAI-style `{"error": {"message": ...}}`
    NestedError { error: ChatApiError },
}
