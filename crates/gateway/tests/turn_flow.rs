//! End-to-end turn resolution against an in-memory store, a scripted
//! completion stub, and a canned fetcher.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use relay_domain::config::Config;
use relay_domain::prompt::{PromptMessage, PromptRole};
use relay_domain::turn::SenderType;
use relay_domain::{Error, Result};
use relay_gateway::api::chat::{chat, run_delivery, ChatRequest, DeliveryEvent};
use relay_gateway::fetch::PlainTextFetcher;
use relay_gateway::runtime::directive::DirectiveParser;
use relay_gateway::runtime::turn::{resolve_turn, FALLBACK_REPLY, MAX_FETCH_DEPTH};
use relay_gateway::state::AppState;
use relay_providers::CompletionProvider;
use relay_store::ConversationStore;

/// Scripted completion stub. Pops replies in order; once a single
/// reply remains it repeats forever. An empty script errors.
struct ScriptedProvider {
    replies: Mutex<Vec<String>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<PromptMessage>>>,
}

impl ScriptedProvider {
    fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|s| s.to_string()).collect()),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn prompt(&self, call: usize) -> Vec<PromptMessage> {
        self.seen.lock()[call].clone()
    }
}

#[async_trait::async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(messages.to_vec());
        let mut replies = self.replies.lock();
        match replies.len() {
            0 => Err(Error::Provider {
                provider: "scripted".into(),
                message: "script exhausted".into(),
            }),
            1 => Ok(replies[0].clone()),
            _ => Ok(replies.remove(0)),
        }
    }

    fn provider_id(&self) -> &str {
        "scripted"
    }
}

struct CannedFetcher(String);

#[async_trait::async_trait]
impl PlainTextFetcher for CannedFetcher {
    async fn fetch_plain_text(&self, _url: &str) -> String {
        self.0.clone()
    }
}

fn test_state(replies: &[&str], fetched: &str) -> (AppState, Arc<ScriptedProvider>) {
    let provider = Arc::new(ScriptedProvider::new(replies));
    let state = AppState {
        config: Arc::new(Config::default()),
        store: Arc::new(ConversationStore::in_memory().expect("in-memory store")),
        provider: provider.clone(),
        fetcher: Arc::new(CannedFetcher(fetched.to_string())),
        directives: Arc::new(DirectiveParser::new()),
    };
    (state, provider)
}

async fn roles(state: &AppState, conversation_id: i64) -> Vec<SenderType> {
    state
        .store
        .list_turns(conversation_id)
        .await
        .expect("list turns")
        .iter()
        .map(|t| t.role)
        .collect()
}

#[tokio::test]
async fn plain_reply_persists_user_then_assistant() {
    let (state, provider) = test_state(&["Hi there!"], "");
    let cid = state.store.create_conversation().await.unwrap();

    let reply = resolve_turn(&state, cid, "Hello").await.unwrap();

    assert_eq!(reply, "Hi there!");
    assert_eq!(provider.calls(), 1);
    assert_eq!(roles(&state, cid).await, vec![SenderType::User, SenderType::Assistant]);
}

#[tokio::test]
async fn prompt_carries_system_prefix_and_history() {
    let (state, provider) = test_state(&["ok"], "");
    let cid = state.store.create_conversation().await.unwrap();

    resolve_turn(&state, cid, "What is your return policy?").await.unwrap();

    let prompt = provider.prompt(0);
    assert!(prompt.len() >= 3);
    assert_eq!(prompt[0].role, PromptRole::System);
    assert_eq!(prompt[1].role, PromptRole::System);
    assert!(prompt[1].content.contains("[fetch]"));
    assert_eq!(prompt.last().unwrap().role, PromptRole::User);
    assert_eq!(prompt.last().unwrap().content, "What is your return policy?");
}

#[tokio::test]
async fn fetch_directive_gathers_context_then_answers() {
    let (state, provider) = test_state(
        &["[fetch]faq", "Per the FAQ, returns are accepted for 30 days."],
        "Returns are accepted within 30 days of delivery.",
    );
    let cid = state.store.create_conversation().await.unwrap();

    let reply = resolve_turn(&state, cid, "Can I return an order?").await.unwrap();

    assert_eq!(reply, "Per the FAQ, returns are accepted for 30 days.");
    assert_eq!(provider.calls(), 2);
    assert_eq!(
        roles(&state, cid).await,
        vec![
            SenderType::User,
            SenderType::AssistantReasoning,
            SenderType::System,
            SenderType::Assistant,
        ]
    );

    let turns = state.store.list_turns(cid).await.unwrap();
    let context = turns[2].content.as_deref().unwrap();
    assert!(context.starts_with("[context:faq] "));
    assert!(context.contains("30 days"));

    // The second completion call sees the directive as assistant text
    // and the fetched content as a system message.
    let prompt = provider.prompt(1);
    assert!(prompt
        .iter()
        .any(|m| m.role == PromptRole::Assistant && m.content == "[fetch]faq"));
    assert!(prompt
        .iter()
        .any(|m| m.role == PromptRole::System && m.content.contains("30 days")));
}

#[tokio::test]
async fn depth_bound_yields_fallback_without_persisting_it() {
    let (state, provider) = test_state(&["[fetch]faq"], "faq text");
    let cid = state.store.create_conversation().await.unwrap();

    let reply = resolve_turn(&state, cid, "loop forever").await.unwrap();

    assert_eq!(reply, FALLBACK_REPLY);
    assert_eq!(provider.calls(), MAX_FETCH_DEPTH + 1);
    let persisted = roles(&state, cid).await;
    assert!(!persisted.contains(&SenderType::Assistant));
    // One reasoning and one context turn per iteration, after the user turn.
    assert_eq!(persisted.len(), 1 + 2 * (MAX_FETCH_DEPTH + 1));
}

#[tokio::test]
async fn unknown_resource_directive_is_delivered_verbatim() {
    let (state, provider) = test_state(&["[fetch]warehouse-codes"], "");
    let cid = state.store.create_conversation().await.unwrap();

    let reply = resolve_turn(&state, cid, "hi").await.unwrap();

    assert_eq!(reply, "[fetch]warehouse-codes");
    assert_eq!(provider.calls(), 1);
    assert_eq!(roles(&state, cid).await, vec![SenderType::User, SenderType::Assistant]);
}

#[tokio::test]
async fn empty_fetch_result_skips_context_turn() {
    let (state, provider) = test_state(&["[fetch]faq", "best effort answer"], "");
    let cid = state.store.create_conversation().await.unwrap();

    let reply = resolve_turn(&state, cid, "hi").await.unwrap();

    assert_eq!(reply, "best effort answer");
    assert_eq!(provider.calls(), 2);
    // No system context turn: the fetch produced nothing.
    assert_eq!(
        roles(&state, cid).await,
        vec![SenderType::User, SenderType::AssistantReasoning, SenderType::Assistant]
    );
}

#[tokio::test]
async fn provider_failure_surfaces_after_user_turn_persisted() {
    let (state, _provider) = test_state(&[], "");
    let cid = state.store.create_conversation().await.unwrap();

    let err = resolve_turn(&state, cid, "hello").await.unwrap_err();

    assert!(matches!(err, Error::Provider { .. }));
    assert_eq!(roles(&state, cid).await, vec![SenderType::User]);
}

#[tokio::test]
async fn delivery_sends_ack_then_single_response() {
    let (state, _) = test_state(&["All set!"], "");
    let cid = state.store.create_conversation().await.unwrap();

    let (tx, mut rx) = mpsc::channel(8);
    run_delivery(state, cid, "hello".into(), tx).await;

    let first = serde_json::to_value(rx.recv().await.expect("ack event")).unwrap();
    assert_eq!(first["type"], "acknowledgment");
    assert_eq!(first["conversationId"], cid);

    let second = serde_json::to_value(rx.recv().await.expect("terminal event")).unwrap();
    assert_eq!(second["type"], "response");
    assert_eq!(second["status"], "completed");
    assert_eq!(second["reply"], "All set!");

    assert!(rx.recv().await.is_none(), "channel must close after the terminal event");
}

#[tokio::test]
async fn delivery_reports_provider_failure_as_error_event() {
    let (state, _) = test_state(&[], "");
    let cid = state.store.create_conversation().await.unwrap();

    let (tx, mut rx) = mpsc::channel(8);
    run_delivery(state, cid, "hello".into(), tx).await;

    let first = serde_json::to_value(rx.recv().await.unwrap()).unwrap();
    assert_eq!(first["type"], "acknowledgment");
    let second = serde_json::to_value(rx.recv().await.unwrap()).unwrap();
    assert_eq!(second["type"], "error");
    assert_eq!(second["status"], "error");
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn blank_content_rejected_before_any_side_effect() {
    let (state, provider) = test_state(&["never called"], "");

    for content in [None, Some(String::new()), Some("   ".to_string())] {
        let response = chat(
            State(state.clone()),
            Json(ChatRequest { content, conversation_id: None }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    assert_eq!(provider.calls(), 0);
    assert!(!state.store.conversation_exists(1).await.unwrap());
}

#[tokio::test]
async fn chat_opens_event_stream_for_valid_request() {
    let (state, _) = test_state(&["ok"], "");

    let response = chat(
        State(state),
        Json(ChatRequest { content: Some("hello".into()), conversation_id: None }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    assert!(content_type.starts_with("text/event-stream"));
}

#[tokio::test]
async fn delivery_event_enum_is_channel_payload() {
    // Guard the DeliveryEvent surface the stream serializes.
    let ack = DeliveryEvent::acknowledgment(1);
    let data = serde_json::to_string(&ack).unwrap();
    assert!(data.contains("\"type\":\"acknowledgment\""));
}
