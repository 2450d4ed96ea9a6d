//! Shared startup wiring for the `serve` and `run` commands.

use std::sync::Arc;

use anyhow::Context;
use relay_domain::config::{Config, ConfigSeverity};
use relay_providers::{CompletionProvider, OpenAiCompatProvider};
use relay_store::ConversationStore;

use crate::fetch::{HttpContextFetcher, PlainTextFetcher};
use crate::runtime::directive::DirectiveParser;
use crate::state::AppState;

/// Validate the config and assemble the application state. Any
/// validation error aborts startup; warnings are logged and tolerated.
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let errors = issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count();
    if errors > 0 {
        anyhow::bail!("config validation failed with {errors} error(s)");
    }

    if let Some(parent) = config.store.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating store directory {}", parent.display()))?;
        }
    }
    let store = Arc::new(
        ConversationStore::open(&config.store.path).context("opening conversation store")?,
    );
    tracing::info!(path = %config.store.path.display(), "conversation store ready");

    let provider: Arc<dyn CompletionProvider> = Arc::new(
        OpenAiCompatProvider::from_config(&config.llm)
            .context("initializing completion provider")?,
    );
    tracing::info!(
        model = %config.llm.model,
        base_url = %config.llm.base_url,
        "completion provider ready"
    );

    let fetcher: Arc<dyn PlainTextFetcher> = Arc::new(
        HttpContextFetcher::new(&config.context).context("building context fetcher")?,
    );
    tracing::info!(resources = config.context.resources.len(), "context fetcher ready");

    Ok(AppState {
        config,
        store,
        provider,
        fetcher,
        directives: Arc::new(DirectiveParser::new()),
    })
}
