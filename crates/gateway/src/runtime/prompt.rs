//! Prompt assembly: project persisted turns plus the synthetic system
//! prefix into the flat role-tagged message list providers accept.

use relay_domain::prompt::{PromptMessage, PromptRole};
use relay_domain::turn::{NewTurn, SenderType, Turn};

/// Build the provider message list: `prefix` first (in order), then
/// `history` (already ordered oldest-first by the store).
///
/// Reasoning turns collapse to the assistant role so the model sees
/// its own earlier directives as things it said. Entries whose content
/// is missing or whitespace-only are dropped.
pub fn assemble(prefix: &[NewTurn], history: &[Turn]) -> Vec<PromptMessage> {
    let mut out = Vec::with_capacity(prefix.len() + history.len());
    for t in prefix {
        push_entry(&mut out, t.role, Some(t.content.as_str()));
    }
    for t in history {
        push_entry(&mut out, t.role, t.content.as_deref());
    }
    out
}

fn push_entry(out: &mut Vec<PromptMessage>, role: SenderType, content: Option<&str>) {
    let Some(text) = content else { return };
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    let role = match role {
        SenderType::User => PromptRole::User,
        SenderType::System => PromptRole::System,
        SenderType::Assistant | SenderType::AssistantReasoning => PromptRole::Assistant,
    };
    out.push(PromptMessage { role, content: text.to_string() });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn turn(role: SenderType, content: Option<&str>) -> Turn {
        Turn {
            id: 0,
            conversation_id: 1,
            content: content.map(String::from),
            summary: None,
            role,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn prefix_precedes_history_in_order() {
        let prefix = [NewTurn::system(1, "primer"), NewTurn::system(1, "behavior")];
        let history = [turn(SenderType::User, Some("hello"))];
        let msgs = assemble(&prefix, &history);
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0].content, "primer");
        assert_eq!(msgs[1].content, "behavior");
        assert_eq!(msgs[2].content, "hello");
        assert_eq!(msgs[2].role, PromptRole::User);
    }

    #[test]
    fn reasoning_collapses_to_assistant() {
        let history = [turn(SenderType::AssistantReasoning, Some("[fetch]faq"))];
        let msgs = assemble(&[], &history);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].role, PromptRole::Assistant);
    }

    #[test]
    fn empty_and_missing_content_dropped() {
        let history = [
            turn(SenderType::User, Some("  ")),
            turn(SenderType::Assistant, None),
            turn(SenderType::User, Some("real")),
        ];
        let msgs = assemble(&[], &history);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].content, "real");
    }

    #[test]
    fn content_is_trimmed() {
        let history = [turn(SenderType::Assistant, Some("  hi \n"))];
        let msgs = assemble(&[], &history);
        assert_eq!(msgs[0].content, "hi");
    }
}
