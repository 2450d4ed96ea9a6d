//! Best-effort plain-text retrieval for fetch directives.
//!
//! The orchestrator treats resource content as optional enrichment:
//! whatever goes wrong here (timeout, bad status, oversized body,
//! unparseable markup) the caller gets an empty string and the turn
//! continues without the context.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use relay_domain::config::ContextConfig;
use relay_domain::{Error, Result};

const FETCHER_UA: &str = concat!("chatrelay/", env!("CARGO_PKG_VERSION"));
const MAX_REDIRECTS: usize = 5;

/// Resolves a URL to capped plain text. Implementations never fail
/// loudly: a fetch that cannot be completed yields `""`.
#[async_trait::async_trait]
pub trait PlainTextFetcher: Send + Sync {
    async fn fetch_plain_text(&self, url: &str) -> String;
}

/// HTTP-backed fetcher with byte and character caps from config.
pub struct HttpContextFetcher {
    client: reqwest::Client,
    max_bytes: usize,
    max_chars: usize,
}

impl HttpContextFetcher {
    pub fn new(cfg: &ContextConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.fetch_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| Error::Fetch(format!("building http client: {e}")))?;
        Ok(Self {
            client,
            max_bytes: cfg.max_fetch_bytes,
            max_chars: cfg.max_fetch_chars,
        })
    }

    async fn try_fetch(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .header(USER_AGENT, FETCHER_UA)
            .header(ACCEPT, "text/html,application/xhtml+xml,text/plain;q=0.9,*/*;q=0.5")
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("GET {url}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Fetch(format!("GET {url}: HTTP {status}")));
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        // Stream the body so an oversized response is abandoned early
        // instead of buffered whole.
        let mut body: Vec<u8> = Vec::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::Fetch(format!("reading body: {e}")))?;
            if body.len() + chunk.len() > self.max_bytes {
                return Err(Error::Fetch(format!(
                    "GET {url}: body exceeds {} bytes",
                    self.max_bytes
                )));
            }
            body.extend_from_slice(&chunk);
        }

        let raw = String::from_utf8_lossy(&body);
        let text = if content_type.contains("html") || looks_like_html(&raw) {
            html_to_text(&raw, self.max_chars)
        } else {
            truncate_chars(raw.trim(), self.max_chars)
        };
        Ok(text)
    }
}

#[async_trait::async_trait]
impl PlainTextFetcher for HttpContextFetcher {
    async fn fetch_plain_text(&self, url: &str) -> String {
        match self.try_fetch(url).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(url, error = %e, "context fetch failed, continuing without it");
                String::new()
            }
        }
    }
}

fn looks_like_html(raw: &str) -> bool {
    let head: String = raw.trim_start().chars().take(16).collect::<String>().to_ascii_lowercase();
    head.starts_with("<!doctype") || head.starts_with("<html")
}

/// Reduce an HTML document to readable plain text: drop tags, skip
/// script/style bodies, decode the common entities, collapse runs of
/// whitespace, and cap the result at `max_chars` characters.
fn html_to_text(html: &str, max_chars: usize) -> String {
    let mut text = String::new();
    let mut tag = String::new();
    let mut in_tag = false;
    // Set while inside <script> or <style>, holding the tag name we
    // are waiting to see closed.
    let mut suppressed: Option<&'static str> = None;

    for ch in html.chars() {
        if in_tag {
            if ch != '>' {
                tag.push(ch);
                continue;
            }
            in_tag = false;
            let closing = tag.starts_with('/');
            let name = tag
                .trim_start_matches('/')
                .split(|c: char| c.is_whitespace() || c == '/')
                .next()
                .unwrap_or("")
                .to_ascii_lowercase();
            match (name.as_str(), closing) {
                ("script", false) if suppressed.is_none() => suppressed = Some("script"),
                ("style", false) if suppressed.is_none() => suppressed = Some("style"),
                ("script", true) if suppressed == Some("script") => suppressed = None,
                ("style", true) if suppressed == Some("style") => suppressed = None,
                _ => {}
            }
            if suppressed.is_none() && is_block_tag(&name) {
                text.push('\n');
            }
            tag.clear();
            continue;
        }
        match ch {
            '<' => in_tag = true,
            _ if suppressed.is_some() => {}
            _ => text.push(ch),
        }
        // Scan cap: collect generously past the char limit to survive
        // entity decoding and whitespace collapsing, then stop.
        if text.len() > max_chars.saturating_mul(4).max(16 * 1024) {
            break;
        }
    }

    let decoded = decode_entities(&text);
    let mut out = String::new();
    for line in decoded.lines() {
        let compact = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if compact.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&compact);
    }
    truncate_chars(&out, max_chars)
}

fn is_block_tag(name: &str) -> bool {
    matches!(
        name,
        "p" | "div"
            | "br"
            | "li"
            | "ul"
            | "ol"
            | "tr"
            | "td"
            | "th"
            | "table"
            | "section"
            | "article"
            | "header"
            | "footer"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "blockquote"
            | "pre"
    )
}

fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.chars().take(max_chars).collect()
}
