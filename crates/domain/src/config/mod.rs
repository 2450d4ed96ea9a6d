mod context;
mod llm;
mod server;
mod store;

pub use context::*;
pub use llm::*;
pub use server::*;
pub use store::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Process-wide static configuration, loaded once at startup and
/// passed explicitly into the runtime — never read from ambient state.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub context: ContextConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut issues = Vec::new();

        if self.server.port == 0 {
            issues.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be non-zero".into(),
            });
        }

        if self.llm.base_url.trim().is_empty() {
            issues.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "llm.base_url".into(),
                message: "base_url must not be empty".into(),
            });
        }
        if std::env::var(&self.llm.api_key_env).is_err() {
            issues.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "llm.api_key_env".into(),
                message: format!(
                    "environment variable {} is unset; provider calls will be unauthenticated",
                    self.llm.api_key_env
                ),
            });
        }

        if self.context.resources.is_empty() {
            issues.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "context.resources".into(),
                message: "no resources configured; fetch directives will never resolve".into(),
            });
        }
        for (name, url) in &self.context.resources {
            if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
                issues.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("context.resources.{name}"),
                    message: "resource names may only contain [A-Za-z0-9_-]".into(),
                });
            }
            if !url.starts_with("http://") && !url.starts_with("https://") {
                issues.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("context.resources.{name}"),
                    message: format!("not an http(s) URL: {url}"),
                });
            }
        }
        if self.context.max_fetch_chars == 0 {
            issues.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "context.max_fetch_chars".into(),
                message: "must be non-zero".into(),
            });
        }

        issues
    }
}
