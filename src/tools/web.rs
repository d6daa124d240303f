//! Web access tools: search and fetch URLs.

use std::time::Duration;

use async_trait::async_trait;

use super::{ParamType, Tool, ToolArgs, ToolSpec};

const USER_AGENT: &str = "Mozilla/5.0 (compatible; turnloop/0.1)";
const MAX_FETCH_CHARS: usize = 20_000;

/// Search the web through DuckDuckGo's HTML endpoint (no API key needed).
pub struct WebSearch {
    client: reqwest::Client,
    endpoint: String,
}

impl WebSearch {
    pub fn new() -> Self {
        Self::with_endpoint("https://html.duckduckgo.com/html/")
    }

    /// Point the tool at a different search endpoint.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

impl Default for WebSearch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebSearch {
    fn spec(&self) -> ToolSpec {
        ToolSpec::builder("web_search", "Search the web for current information.")
            .param("query", ParamType::of::<str>(), "The search query")
            .optional_param(
                "max_results",
                ParamType::of::<u64>(),
                "Maximum number of results",
                5,
            )
            .build()
    }

    async fn execute(&self, args: ToolArgs) -> anyhow::Result<String> {
        let query = args["query"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("'query' must be a string"))?;
        let max_results = args["max_results"].as_u64().unwrap_or(5) as usize;

        tracing::debug!("Searching DuckDuckGo for: {}", query);

        let url = format!("{}?q={}", self.endpoint, urlencoding::encode(query));
        let html = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let hits = extract_ddg_results(&html, max_results);
        tracing::debug!("DuckDuckGo returned {} results", hits.len());

        Ok(format_results(query, &hits))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SearchHit {
    title: String,
    snippet: String,
    url: String,
}

fn format_results(query: &str, hits: &[SearchHit]) -> String {
    let lines = hits
        .iter()
        .map(|h| format!("- {}: {} ({})", h.title, h.snippet, h.url))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Search results for '{}':\n{}", query, lines)
}

/// Extract search results from DuckDuckGo HTML.
fn extract_ddg_results(html: &str, limit: usize) -> Vec<SearchHit> {
    html.split("class=\"result__body\"")
        .skip(1)
        .filter_map(|chunk| {
            let title = inner_text_after(chunk, "class=\"result__a\"")?;
            if title.is_empty() {
                return None;
            }
            let snippet = inner_text_after(chunk, "class=\"result__snippet\"").unwrap_or_default();
            let url = inner_text_after(chunk, "class=\"result__url\"").unwrap_or_default();

            Some(SearchHit {
                title: html_decode(&title),
                snippet: html_decode(&snippet),
                url: url.trim().to_string(),
            })
        })
        .take(limit)
        .collect()
}

/// Text between the end of the tag containing `marker` and the next `<`.
fn inner_text_after(chunk: &str, marker: &str) -> Option<String> {
    chunk
        .split(marker)
        .nth(1)
        .and_then(|s| s.split('>').nth(1))
        .and_then(|s| s.split('<').next())
        .map(|s| s.trim().to_string())
}

/// Basic HTML entity decoding.
fn html_decode(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Fetch a URL and return its readable text.
pub struct FetchUrl {
    client: reqwest::Client,
}

impl FetchUrl {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for FetchUrl {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for FetchUrl {
    fn spec(&self) -> ToolSpec {
        ToolSpec::builder("fetch_url", "Fetch the content of a URL and return its text.")
            .param("url", ParamType::of::<str>(), "The URL to fetch")
            .build()
    }

    async fn execute(&self, args: ToolArgs) -> anyhow::Result<String> {
        let raw = args["url"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("'url' must be a string"))?;
        let url = url::Url::parse(raw).map_err(|e| anyhow::anyhow!("invalid URL '{}': {}", raw, e))?;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow::anyhow!("HTTP error: {}", status));
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("text/html"));

        let body = response.text().await?;
        let text = if is_html {
            extract_text_from_html(&body)
        } else {
            body
        };

        Ok(truncate_chars(text, MAX_FETCH_CHARS))
    }
}

fn truncate_chars(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!(
            "{}... [content truncated, showing first {} chars]",
            &text[..cut],
            max_chars
        ),
        None => text,
    }
}

/// Extract readable text from HTML: drop scripts, styles and tags, then
/// collapse whitespace.
fn extract_text_from_html(html: &str) -> String {
    let without_scripts = strip_blocks(html, "<script", "</script>");
    let stripped = strip_blocks(&without_scripts, "<style", "</style>");

    let mut text = String::with_capacity(stripped.len());
    let mut in_tag = false;
    for c in stripped.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                text.push(' ');
            }
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    html_decode(&text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_blocks(html: &str, open: &str, close: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(start) = rest.find(open) {
        out.push_str(&rest[..start]);
        match rest[start..].find(close) {
            Some(end) => rest = &rest[start + end + close.len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}
