//! HTTP GET tool returning readable page text

use anyhow::{Context, Result};
use async_trait::async_trait;
use llm_core::with_retry;
use scraper::{ElementRef, Html, Node, Selector};
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::{http_client, internal_address};
use crate::tools::{truncate_output, Tool, ToolContext};

/// Elements tried in order when looking for the main text of a page
const CONTENT_ROOTS: &[&str] = &["article", "main", "[role='main']", "#content", "body"];

/// Elements whose text never reaches the model
const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "nav", "footer", "svg"];

/// Elements that start a new line of output
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "br", "li", "tr", "pre", "blockquote", "section", "h1", "h2", "h3", "h4", "h5", "h6",
];

/// Characters that attach to the preceding word
const CLOSING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']'];

/// Turn the model's input into a public http(s) URL
fn parse_target(input: &str) -> Result<url::Url> {
    let raw = input
        .trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '<' | '>'));
    let url = url::Url::parse(raw).with_context(|| format!("Invalid URL: {}", raw))?;

    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("Only HTTP and HTTPS URLs are supported, got '{}'", url.scheme());
    }

    if url.host_str().is_none() {
        anyhow::bail!("URL has no host");
    }
    if let Some(ip) = internal_address(&url) {
        warn!(url = %url, ip = %ip, "Refusing to fetch internal address");
        anyhow::bail!("Fetching internal address {} is blocked", ip);
    }

    Ok(url)
}

/// Fetches a URL with HTTP GET
pub struct RequestsTool;

#[async_trait]
impl Tool for RequestsTool {
    fn name(&self) -> &str {
        "requests"
    }

    fn description(&self) -> &str {
        "Fetch a web page or API with HTTP GET. Input is the URL; output is the page as readable text."
    }

    #[instrument(skip(self, ctx), fields(tool = "requests"))]
    async fn invoke(&self, input: &str, ctx: &ToolContext) -> Result<String> {
        let url = parse_target(input)?;
        let timeout = Duration::from_secs(ctx.http_timeout_secs);

        let (content_type, body) = with_retry(&ctx.retry, "requests", || async {
            let response = http_client()
                .get(url.clone())
                .timeout(timeout)
                .send()
                .await
                .with_context(|| format!("Failed to fetch {}", url))?
                .error_for_status()?;

            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_lowercase)
                .unwrap_or_default();
            let body = response.text().await.context("Failed to read response body")?;
            Ok::<_, anyhow::Error>((content_type, body))
        })
        .await?;

        debug!(content_type = %content_type, bytes = body.len(), "Fetched URL");
        Ok(truncate_output(render(&content_type, body), ctx.max_output_len))
    }
}

/// Body as the model should see it
fn render(content_type: &str, body: String) -> String {
    if content_type.contains("html") {
        page_text(&body)
    } else if content_type.contains("json") {
        serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|json| serde_json::to_string_pretty(&json).ok())
            .unwrap_or(body)
    } else {
        body
    }
}

/// Readable text of an HTML page, one block element per line
fn page_text(html: &str) -> String {
    let document = Html::parse_document(html);

    for root in CONTENT_ROOTS {
        let Ok(selector) = Selector::parse(root) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let text = element_text(element);
            if !text.is_empty() {
                return text;
            }
        }
    }

    document
        .root_element()
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn element_text(element: ElementRef) -> String {
    let mut lines = vec![String::new()];
    collect_text(element, &mut lines);
    lines
        .into_iter()
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_text(element: ElementRef, lines: &mut Vec<String>) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let Some(line) = lines.last_mut() else {
                    continue;
                };
                for word in text.split_whitespace() {
                    if !line.is_empty() && !word.starts_with(CLOSING_PUNCTUATION) {
                        line.push(' ');
                    }
                    line.push_str(word);
                }
            }
            Node::Element(el) => {
                let tag = el.name();
                if SKIPPED_TAGS.contains(&tag) {
                    continue;
                }
                let block = BLOCK_TAGS.contains(&tag);
                if block {
                    lines.push(String::new());
                }
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, lines);
                }
                if block {
                    lines.push(String::new());
                }
            }
            _ => {}
        }
    }
}
