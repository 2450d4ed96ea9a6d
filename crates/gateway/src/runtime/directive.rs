//! In-band fetch-directive detection.
//!
//! The model signals "I need resource X first" by emitting
//! `[fetch]<name>` anywhere in its reply. A match only counts when the
//! name resolves against the configured resource directory; anything
//! else is treated as final answer text and passed through verbatim.

use regex::Regex;
use relay_domain::config::ContextConfig;

/// Classification of a raw model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// No actionable directive: deliver the text as the answer.
    Final(String),
    /// The model asked for a configured resource before answering.
    Fetch { resource: String },
}

pub struct DirectiveParser {
    pattern: Regex,
}

impl DirectiveParser {
    pub fn new() -> Self {
        Self {
            // Resource names share the charset config validation
            // enforces on the directory keys.
            pattern: Regex::new(r"\[fetch\]([A-Za-z0-9_-]+)").expect("hardcoded pattern"),
        }
    }

    /// Scan `raw` for a fetch directive naming a known resource.
    pub fn parse(&self, raw: &str, context: &ContextConfig) -> Reply {
        if let Some(caps) = self.pattern.captures(raw) {
            let name = &caps[1];
            if context.resolve_resource(name).is_some() {
                return Reply::Fetch { resource: name.to_string() };
            }
            tracing::debug!(resource = name, "directive names unknown resource, passing through");
        }
        Reply::Final(raw.to_string())
    }
}

impl Default for DirectiveParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ContextConfig {
        ContextConfig::default()
    }

    #[test]
    fn plain_text_is_final() {
        let p = DirectiveParser::new();
        assert_eq!(
            p.parse("Our return window is 30 days.", &ctx()),
            Reply::Final("Our return window is 30 days.".into())
        );
    }

    #[test]
    fn bare_directive_is_fetch() {
        let p = DirectiveParser::new();
        assert_eq!(
            p.parse("[fetch]faq", &ctx()),
            Reply::Fetch { resource: "faq".into() }
        );
    }

    #[test]
    fn directive_embedded_in_prose_still_matches() {
        let p = DirectiveParser::new();
        assert_eq!(
            p.parse("Let me check. [fetch]web-home", &ctx()),
            Reply::Fetch { resource: "web-home".into() }
        );
    }

    #[test]
    fn unknown_resource_passes_through_verbatim() {
        let p = DirectiveParser::new();
        let raw = "[fetch]not-a-resource";
        assert_eq!(p.parse(raw, &ctx()), Reply::Final(raw.into()));
    }

    #[test]
    fn malformed_directive_is_final() {
        let p = DirectiveParser::new();
        for raw in ["[fetch]", "[fetch] faq", "fetch]faq", "[FETCH]faq"] {
            assert!(matches!(p.parse(raw, &ctx()), Reply::Final(_)), "{raw}");
        }
    }

    #[test]
    fn first_directive_wins() {
        let p = DirectiveParser::new();
        assert_eq!(
            p.parse("[fetch]faq [fetch]web-home", &ctx()),
            Reply::Fetch { resource: "faq".into() }
        );
    }
}
