use relay_domain::prompt::PromptMessage;
use relay_domain::Result;

/// Trait the completion-service adapter must implement.
///
/// The orchestrator only needs one operation: ordered role-tagged
/// messages in, generated text out. Failures are reported, never
/// retried here.
#[async_trait::async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Send the assembled prompt and wait for the full reply text.
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String>;

    /// A unique identifier for this provider instance.
    fn provider_id(&self) -> &str;
}
