//! The turn-resolution loop.
//!
//! One call resolves one user turn end to end: persist the message,
//! then alternate completion calls with fetch-directive resolution
//! until the model produces a final answer or the depth bound runs
//! out. Every artifact of the exchange (the user message, reasoning
//! replies, fetched context) is persisted as it happens, so each
//! completion call rebuilds its prompt from the store and sees the
//! full record so far.

use relay_domain::config::ContextConfig;
use relay_domain::turn::NewTurn;
use relay_domain::Result;

use crate::runtime::directive::Reply;
use crate::runtime::prompt::assemble;
use crate::state::AppState;

/// How many fetch directives a single turn may resolve. The loop makes
/// at most `MAX_FETCH_DEPTH + 1` completion calls.
pub const MAX_FETCH_DEPTH: usize = 3;

/// Answer of last resort when the model keeps asking for resources
/// past the depth bound. Never persisted.
pub const FALLBACK_REPLY: &str =
    "I'm having trouble accessing the requested resource right now. \
     Please try again in a moment, or rephrase your question.";

/// Resolve one user turn and return the reply text to deliver.
///
/// The user message is persisted exactly once, up front, regardless of
/// how many fetch iterations follow.
pub async fn resolve_turn(
    state: &AppState,
    conversation_id: i64,
    user_message: &str,
) -> Result<String> {
    state
        .store
        .append_turn(NewTurn::user(conversation_id, user_message))
        .await?;

    let context = &state.config.context;

    for depth in 0..=MAX_FETCH_DEPTH {
        let history = state.store.list_turns(conversation_id).await?;
        let prompt = assemble(&system_prefix(context, conversation_id), &history);
        tracing::debug!(conversation_id, depth, messages = prompt.len(), "requesting completion");
        let raw = state.provider.complete(&prompt).await?;

        match state.directives.parse(&raw, context) {
            Reply::Final(text) => {
                state
                    .store
                    .append_turn(NewTurn::assistant(conversation_id, text.clone()))
                    .await?;
                tracing::info!(conversation_id, depth, "turn resolved");
                return Ok(text);
            }
            Reply::Fetch { resource } => {
                // The raw directive reply joins the record as a
                // reasoning turn so later calls see what was asked for.
                state
                    .store
                    .append_turn(NewTurn::reasoning(conversation_id, raw))
                    .await?;

                // The parser only yields names present in the
                // directory, so the lookup cannot miss.
                let url = context.resolve_resource(&resource).unwrap_or_default().to_string();
                let text = state.fetcher.fetch_plain_text(&url).await;
                tracing::info!(
                    conversation_id,
                    depth,
                    resource = %resource,
                    chars = text.len(),
                    "fetch directive resolved"
                );
                if !text.is_empty() {
                    state
                        .store
                        .append_turn(NewTurn::system(
                            conversation_id,
                            format!("[context:{resource}] {text}"),
                        ))
                        .await?;
                }
            }
        }
    }

    tracing::warn!(conversation_id, "fetch depth bound reached, returning fallback reply");
    Ok(FALLBACK_REPLY.to_string())
}

/// The synthetic system prefix fed to every completion call. These
/// turns are never persisted.
fn system_prefix(context: &ContextConfig, conversation_id: i64) -> Vec<NewTurn> {
    vec![
        NewTurn::system(conversation_id, context.business_primer.clone()),
        NewTurn::system(conversation_id, context.behavior_instructions()),
    ]
}
