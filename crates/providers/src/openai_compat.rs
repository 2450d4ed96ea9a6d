//! OpenAI-compatible adapter.
//!
//! Works with OpenAI, Azure-style gateways, Ollama, vLLM, and any
//! other endpoint that follows the chat completions contract.

use serde_json::Value;

use relay_domain::config::LlmConfig;
use relay_domain::prompt::PromptMessage;
use relay_domain::{Error, Result};

use crate::traits::CompletionProvider;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct OpenAiCompatProvider {
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: Option<f64>,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a provider from the deserialized config. The API key is
    /// read once from the environment variable the config names.
    pub fn from_config(cfg: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&cfg.api_key_env).ok();
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| Error::Provider {
                provider: "openai_compat".into(),
                message: format!("building http client: {e}"),
            })?;

        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            client,
        })
    }

    fn build_chat_body(&self, messages: &[PromptMessage]) -> Value {
        let messages: Vec<Value> = messages
            .iter()
            .map(|m| {
                serde_json::json!({
                    "role": m.role.as_str(),
                    "content": m.content,
                })
            })
            .collect();

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });
        if let Some(temp) = self.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        body
    }
}

#[async_trait::async_trait]
impl CompletionProvider for OpenAiCompatProvider {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(model = %self.model, messages = messages.len(), "sending chat completion");
        let mut req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&self.build_chat_body(messages));
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }

        let resp = req.send().await.map_err(|e| Error::Provider {
            provider: "openai_compat".into(),
            message: format!("request failed: {e}"),
        })?;

        let status = resp.status();
        let body: Value = resp.json().await.map_err(|e| Error::Provider {
            provider: "openai_compat".into(),
            message: format!("reading response body: {e}"),
        })?;

        if !status.is_success() {
            let detail = body
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .unwrap_or("no detail");
            return Err(Error::Provider {
                provider: "openai_compat".into(),
                message: format!("HTTP {status}: {detail}"),
            });
        }

        parse_chat_response(&body)
    }

    fn provider_id(&self) -> &str {
        "openai_compat"
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response deserialization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_chat_response(body: &Value) -> Result<String> {
    let message = body
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| Error::Provider {
            provider: "openai_compat".into(),
            message: "no choices in response".into(),
        })?;

    Ok(message
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_domain::prompt::PromptMessage;

    fn test_provider() -> OpenAiCompatProvider {
        let cfg = LlmConfig {
            base_url: "https://api.example.com/v1/".into(),
            api_key_env: "RELAY_TEST_UNSET_KEY".into(),
            model: "test-model".into(),
            temperature: Some(0.2),
            timeout_secs: 5,
        };
        OpenAiCompatProvider::from_config(&cfg).unwrap()
    }

    #[test]
    fn base_url_trailing_slash_stripped() {
        let p = test_provider();
        assert_eq!(p.base_url, "https://api.example.com/v1");
    }

    #[test]
    fn chat_body_carries_roles_in_order() {
        let p = test_provider();
        let body = p.build_chat_body(&[
            PromptMessage::system("primer"),
            PromptMessage::user("hello"),
            PromptMessage::assistant("hi"),
        ]);
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["temperature"], 0.2);
        let msgs = body["messages"].as_array().unwrap();
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0]["role"], "system");
        assert_eq!(msgs[1]["role"], "user");
        assert_eq!(msgs[1]["content"], "hello");
        assert_eq!(msgs[2]["role"], "assistant");
    }

    #[test]
    fn parse_response_extracts_content() {
        let body = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "Hi!" } }]
        });
        assert_eq!(parse_chat_response(&body).unwrap(), "Hi!");
    }

    #[test]
    fn parse_response_without_choices_is_error() {
        let body = serde_json::json!({ "object": "chat.completion" });
        assert!(parse_chat_response(&body).is_err());
    }

    #[test]
    fn parse_response_null_content_is_empty() {
        let body = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": null } }]
        });
        assert_eq!(parse_chat_response(&body).unwrap(), "");
    }
}
