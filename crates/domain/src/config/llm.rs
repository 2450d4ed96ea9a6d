use serde::{Deserialize, Serialize};

/// Completion-service connection settings (OpenAI-compatible endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "d_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key. Read once at startup.
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_model")]
    pub model: String,
    /// Sampling temperature. `None` lets the provider choose.
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default = "d_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            api_key_env: d_api_key_env(),
            model: d_model(),
            temperature: None,
            timeout_secs: d_timeout_secs(),
        }
    }
}

fn d_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn d_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}

fn d_model() -> String {
    "gpt-4o-mini".into()
}

fn d_timeout_secs() -> u64 {
    120
}
