use std::sync::Arc;

use relay_domain::config::Config;
use relay_providers::CompletionProvider;
use relay_store::ConversationStore;

use crate::fetch::PlainTextFetcher;
use crate::runtime::directive::DirectiveParser;

/// Shared application state handed to every API handler.
///
/// Everything is behind an `Arc` so handlers and spawned delivery
/// tasks can clone it freely.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<ConversationStore>,
    pub provider: Arc<dyn CompletionProvider>,
    pub fetcher: Arc<dyn PlainTextFetcher>,
    /// Compiled once at startup.
    pub directives: Arc<DirectiveParser>,
}
