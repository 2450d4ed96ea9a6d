use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Static context for prompt assembly and fetch-directive resolution:
/// the resource directory, the fixed prompt texts, and fetch limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Resource directory: symbolic name -> fetchable URL.
    #[serde(default = "d_resources")]
    pub resources: BTreeMap<String, String>,
    /// Business-context primer prepended to every prompt.
    #[serde(default = "d_business_primer")]
    pub business_primer: String,
    /// Cap on extracted plain text per fetched resource, in characters.
    #[serde(default = "d_max_fetch_chars")]
    pub max_fetch_chars: usize,
    #[serde(default = "d_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "d_max_fetch_bytes")]
    pub max_fetch_bytes: usize,
}

impl ContextConfig {
    /// Resolve a symbolic resource name to its URL.
    pub fn resolve_resource(&self, name: &str) -> Option<&str> {
        self.resources.get(name).map(String::as_str)
    }

    /// Behavioral system prompt: authorizes the `[fetch]<name>`
    /// directive and enumerates the legal resource names.
    pub fn behavior_instructions(&self) -> String {
        let names: Vec<&str> = self.resources.keys().map(String::as_str).collect();
        format!(
            "Answer the user's latest message using the conversation so far. \
             If you need the content of a reference resource before you can answer, \
             reply with exactly [fetch]<name> and nothing else, where <name> is one of: {}. \
             Once the resource content appears in the conversation as a system message, \
             use it to answer. Never invent resource names.",
            names.join(", ")
        )
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            resources: d_resources(),
            business_primer: d_business_primer(),
            max_fetch_chars: d_max_fetch_chars(),
            fetch_timeout_secs: d_fetch_timeout_secs(),
            max_fetch_bytes: d_max_fetch_bytes(),
        }
    }
}

fn d_resources() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("web-home".to_string(), "https://example.com/".to_string()),
        ("faq".to_string(), "https://example.com/faq".to_string()),
    ])
}

fn d_business_primer() -> String {
    "You are the virtual assistant for Relay Outfitters, an online retailer. \
     Be concise, accurate, and friendly. When you are unsure, say so rather \
     than guessing."
        .into()
}

fn d_max_fetch_chars() -> usize {
    2000
}

fn d_fetch_timeout_secs() -> u64 {
    20
}

fn d_max_fetch_bytes() -> usize {
    5 * 1024 * 1024
}
